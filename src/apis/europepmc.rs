use super::{
    current_year, cutoff_year, date_from_year, http_client, truncate_abstract, Article,
    ArticleSource, Source, SourceError, MAX_AUTHORS, PROVIDER_RESULT_CAP,
};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

pub struct EuropePmcClient {
    client: reqwest::Client,
}

impl EuropePmcClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for EuropePmcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResponse {
    result_list: Option<EpmcResultList>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResultList {
    result: Vec<EpmcResult>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResult {
    id: Option<String>,
    title: Option<String>,
    author_string: Option<String>,
    abstract_text: Option<String>,
    first_publication_date: Option<String>,
    pub_year: Option<String>,
    doi: Option<String>,
    pmid: Option<String>,
    journal_title: Option<String>,
    full_text_url_list: Option<EpmcFullTextUrlList>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcFullTextUrlList {
    full_text_url: Vec<EpmcFullTextUrl>,
}
#[derive(Deserialize)]
struct EpmcFullTextUrl {
    url: Option<String>,
}

fn epmc_to_article(r: &EpmcResult) -> Option<Article> {
    let abstract_text = r.abstract_text.as_deref().unwrap_or("").trim();
    if abstract_text.is_empty() {
        return None;
    }
    let authors = r
        .author_string
        .as_ref()
        .map(|a| {
            a.trim_end_matches('.')
                .split(", ")
                .map(|s| s.to_string())
                .take(MAX_AUTHORS)
                .collect()
        })
        .unwrap_or_default();
    let publication_date = r
        .first_publication_date
        .as_ref()
        .and_then(|d| d.get(..10))
        .map(|d| d.to_string())
        .or_else(|| r.pub_year.as_ref().map(|y| date_from_year(y)))
        .unwrap_or_default();
    let url = r
        .pmid
        .as_ref()
        .map(|p| format!("https://europepmc.org/article/MED/{}", p))
        .or_else(|| {
            r.full_text_url_list
                .as_ref()
                .and_then(|l| l.full_text_url.first())
                .and_then(|u| u.url.clone())
        })
        .unwrap_or_default();

    Some(Article {
        source: Source::EuropePmc,
        title_en: r.title.clone().unwrap_or_default(),
        authors,
        publication_date,
        abstract_en: truncate_abstract(abstract_text),
        doi: r.doi.clone(),
        url,
        venue: r.journal_title.clone().unwrap_or_default(),
        paper_id: r
            .pmid
            .clone()
            .or_else(|| r.id.clone())
            .unwrap_or_default(),
    })
}

#[async_trait]
impl ArticleSource for EuropePmcClient {
    fn source(&self) -> Source {
        Source::EuropePmc
    }

    async fn search(
        &self,
        keyword: &str,
        count: u32,
        time_range_years: Option<u32>,
    ) -> Result<Vec<Article>, SourceError> {
        let mut query = keyword.to_string();
        if let Some(years) = time_range_years {
            query.push_str(&format!(
                " AND PUB_YEAR:[{} TO {}]",
                cutoff_year(years),
                current_year()
            ));
        }
        let resp: EpmcResponse = self
            .client
            .get(format!("{}/search", BASE_URL))
            .query(&[
                ("query", query.as_str()),
                ("resultType", "core"),
                ("format", "json"),
                ("pageSize", &count.min(PROVIDER_RESULT_CAP).to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp
            .result_list
            .map(|rl| rl.result.iter().filter_map(epmc_to_article).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "resultList": {
            "result": [
                {
                    "id": "38012345",
                    "pmid": "38012345",
                    "title": "Statin Therapy in Elderly Patients.",
                    "authorString": "Yilmaz A, Kaya B, Demir C.",
                    "abstractText": "Background: statins reduce cardiovascular events in elderly cohorts.",
                    "firstPublicationDate": "2023-11-02",
                    "pubYear": "2023",
                    "doi": "10.1000/jama.2023.42",
                    "journalTitle": "JAMA"
                },
                {
                    "id": "38099999",
                    "pmid": "38099999",
                    "title": "Abstract-free entry",
                    "pubYear": "2023"
                }
            ]
        }
    }"#;

    #[test]
    fn test_map_core_result() {
        let resp: EpmcResponse = serde_json::from_str(SAMPLE).unwrap();
        let articles: Vec<Article> = resp
            .result_list
            .unwrap()
            .result
            .iter()
            .filter_map(epmc_to_article)
            .collect();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.authors, vec!["Yilmaz A", "Kaya B", "Demir C"]);
        assert_eq!(a.publication_date, "2023-11-02");
        assert_eq!(a.url, "https://europepmc.org/article/MED/38012345");
        assert_eq!(a.venue, "JAMA");
        assert_eq!(a.doi.as_deref(), Some("10.1000/jama.2023.42"));
    }

    #[test]
    fn test_pub_year_fallback() {
        let r: EpmcResult = serde_json::from_str(
            r#"{"id": "1", "abstractText": "Some text.", "pubYear": "2020"}"#,
        )
        .unwrap();
        let a = epmc_to_article(&r).unwrap();
        assert_eq!(a.publication_date, "2020-01-01");
        assert_eq!(a.paper_id, "1");
    }
}
