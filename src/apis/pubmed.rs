use super::{
    http_client, normalize_date, truncate_abstract, Article, ArticleSource, Source, SourceError,
    MAX_AUTHORS, PROVIDER_RESULT_CAP,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

const BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub struct PubmedClient {
    client: reqwest::Client,
    email: Option<String>,
}

impl PubmedClient {
    pub fn new(email: Option<String>) -> Self {
        Self {
            client: http_client(),
            email,
        }
    }

    fn etiquette_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", "medinsight".to_string())];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        params
    }
}

#[derive(Deserialize)]
struct EsearchResponse {
    esearchresult: Option<EsearchResult>,
}
#[derive(Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[async_trait]
impl ArticleSource for PubmedClient {
    fn source(&self) -> Source {
        Source::Pubmed
    }

    async fn search(
        &self,
        keyword: &str,
        count: u32,
        time_range_years: Option<u32>,
    ) -> Result<Vec<Article>, SourceError> {
        let mut term = keyword.to_string();
        if let Some(years) = time_range_years {
            let cutoff = Utc::now() - Duration::days(365 * years as i64);
            term.push_str(&format!(
                " AND ({}[PDAT] : {}[PDAT])",
                cutoff.format("%Y/%m/%d"),
                Utc::now().format("%Y/%m/%d")
            ));
        }

        let resp: EsearchResponse = self
            .client
            .get(format!("{}/esearch.fcgi", BASE_URL))
            .query(&[
                ("db", "pubmed"),
                ("term", term.as_str()),
                ("retmax", &count.min(PROVIDER_RESULT_CAP).to_string()),
                ("retmode", "json"),
                ("sort", "relevance"),
            ])
            .query(&self.etiquette_params())
            .send()
            .await?
            .json()
            .await?;

        let ids = resp.esearchresult.map(|r| r.idlist).unwrap_or_default();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // NCBI etiquette between consecutive E-utility calls
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let xml = self
            .client
            .get(format!("{}/efetch.fcgi", BASE_URL))
            .query(&[
                ("db", "pubmed"),
                ("id", ids.join(",").as_str()),
                ("rettype", "xml"),
                ("retmode", "xml"),
            ])
            .query(&self.etiquette_params())
            .send()
            .await?
            .text()
            .await?;

        parse_pubmed_set(&xml)
    }
}

fn parse_pubmed_set(xml: &str) -> Result<Vec<Article>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();
    let mut in_article = false;
    let mut in_author = false;
    let mut in_pubdate = false;
    let mut current_tag = String::new();
    let mut id_type = String::new();

    let mut pmid = String::new();
    let mut title = String::new();
    let mut abstract_text = String::new();
    let mut venue = String::new();
    let mut doi: Option<String> = None;
    let mut year = String::new();
    let mut month = String::new();
    let mut day = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut last_name = String::new();
    let mut initials = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "PubmedArticle" {
                    in_article = true;
                    pmid.clear();
                    title.clear();
                    abstract_text.clear();
                    venue.clear();
                    doi = None;
                    year.clear();
                    month.clear();
                    day.clear();
                    authors.clear();
                } else if in_article {
                    current_tag = tag.clone();
                    match tag.as_str() {
                        "Author" => {
                            in_author = true;
                            last_name.clear();
                            initials.clear();
                        }
                        "PubDate" => in_pubdate = true,
                        "ArticleId" | "ELocationID" => {
                            id_type.clear();
                            for attr in e.attributes().flatten() {
                                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                                if key == "IdType" || key == "EIdType" {
                                    id_type = String::from_utf8_lossy(&attr.value).to_string();
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(e)) if in_article => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_tag.as_str() {
                    "PMID" if pmid.is_empty() => pmid = text,
                    "ArticleTitle" => title.push_str(&text),
                    "AbstractText" => {
                        if !abstract_text.is_empty() {
                            abstract_text.push(' ');
                        }
                        abstract_text.push_str(&text);
                    }
                    "Title" => venue.push_str(&text),
                    "Year" if in_pubdate => year = text,
                    "Month" if in_pubdate => month = text,
                    "Day" if in_pubdate => day = text,
                    "LastName" if in_author => last_name = text,
                    "Initials" if in_author => initials = text,
                    "ArticleId" | "ELocationID" if id_type == "doi" && doi.is_none() => {
                        doi = Some(text)
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag.as_str() {
                    "PubmedArticle" if in_article => {
                        in_article = false;
                        if !abstract_text.trim().is_empty() && !pmid.is_empty() {
                            articles.push(Article {
                                source: Source::Pubmed,
                                title_en: title.trim().to_string(),
                                authors: authors.iter().take(MAX_AUTHORS).cloned().collect(),
                                publication_date: normalize_date(&year, &month, &day),
                                abstract_en: truncate_abstract(&abstract_text),
                                doi: doi.clone(),
                                url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
                                venue: venue.trim().to_string(),
                                paper_id: pmid.clone(),
                            });
                        }
                    }
                    "Author" if in_author => {
                        in_author = false;
                        if !last_name.is_empty() {
                            authors.push(format!("{} {}", last_name, initials).trim().to_string());
                        }
                    }
                    "PubDate" => in_pubdate = false,
                    _ => {}
                }
                if tag == current_tag {
                    current_tag.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000001</PMID>
      <Article>
        <Journal>
          <Title>BMJ</Title>
          <JournalIssue><PubDate><Year>2024</Year><Month>Feb</Month><Day>9</Day></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>SGLT2 Inhibitors and Renal Outcomes</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Renal decline is common in diabetes.</AbstractText>
          <AbstractText Label="RESULTS">SGLT2 inhibition slowed eGFR decline.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Ozturk</LastName><ForeName>Mehmet</ForeName><Initials>M</Initials></Author>
          <Author><LastName>Acar</LastName><ForeName>Elif</ForeName><Initials>E</Initials></Author>
        </AuthorList>
        <ELocationID EIdType="doi">10.1136/bmj.2024.77</ELocationID>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">38000001</ArticleId>
        <ArticleId IdType="doi">10.1136/bmj.2024.77</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000002</PMID>
      <Article>
        <Journal><Title>Nowhere</Title><JournalIssue><PubDate><Year>2024</Year></PubDate></JournalIssue></Journal>
        <ArticleTitle>Entry Without Abstract</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_pubmed_set() {
        let articles = parse_pubmed_set(SAMPLE).unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.paper_id, "38000001");
        assert_eq!(a.title_en, "SGLT2 Inhibitors and Renal Outcomes");
        assert_eq!(a.authors, vec!["Ozturk M", "Acar E"]);
        assert_eq!(a.publication_date, "2024-02-09");
        assert_eq!(a.doi.as_deref(), Some("10.1136/bmj.2024.77"));
        assert_eq!(a.url, "https://pubmed.ncbi.nlm.nih.gov/38000001/");
        assert_eq!(a.venue, "BMJ");
    }

    #[test]
    fn test_abstract_sections_joined() {
        let articles = parse_pubmed_set(SAMPLE).unwrap();
        assert!(articles[0].abstract_en.contains("Renal decline"));
        assert!(articles[0].abstract_en.contains("slowed eGFR decline"));
    }

    #[test]
    fn test_esearch_idlist_parsing() {
        let resp: EsearchResponse = serde_json::from_str(
            r#"{"esearchresult": {"idlist": ["38000001", "38000002"]}}"#,
        )
        .unwrap();
        assert_eq!(resp.esearchresult.unwrap().idlist.len(), 2);
    }
}
