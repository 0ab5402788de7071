use super::{
    cutoff_year, http_client, truncate_abstract, Article, ArticleSource, Source, SourceError,
    MAX_AUTHORS, PROVIDER_RESULT_CAP,
};
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;

const BASE_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivClient {
    client: reqwest::Client,
}

impl ArxivClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for ArxivClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleSource for ArxivClient {
    fn source(&self) -> Source {
        Source::Arxiv
    }

    async fn search(
        &self,
        keyword: &str,
        count: u32,
        time_range_years: Option<u32>,
    ) -> Result<Vec<Article>, SourceError> {
        let mut search_query = format!("all:{}", keyword);
        if let Some(years) = time_range_years {
            search_query.push_str(&format!(
                " AND submittedDate:[{}0101 TO {}]",
                cutoff_year(years),
                Utc::now().format("%Y%m%d")
            ));
        }
        let url = format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
            BASE_URL,
            urlencoded(&search_query),
            count.min(PROVIDER_RESULT_CAP)
        );
        let resp = self.client.get(&url).send().await?.text().await?;
        // Respect rate limit: 1 req / 3s
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        parse_atom_feed(&resp)
    }
}

fn urlencoded(s: &str) -> String {
    s.replace(' ', "+")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('[', "%5B")
        .replace(']', "%5D")
}

fn parse_atom_feed(xml: &str) -> Result<Vec<Article>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();
    let mut in_entry = false;
    let mut current_tag = String::new();
    let mut title = String::new();
    let mut summary = String::new();
    let mut entry_id = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut published = String::new();
    let mut link_abs = String::new();
    let mut author_name = String::new();
    let mut in_author = false;
    let mut doi: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    in_entry = true;
                    title.clear();
                    summary.clear();
                    entry_id.clear();
                    authors.clear();
                    published.clear();
                    link_abs.clear();
                    doi = None;
                } else if in_entry {
                    current_tag = tag.clone();
                    if tag == "author" {
                        in_author = true;
                        author_name.clear();
                    }
                    if tag == "link" {
                        if let Some(href) = abs_link(&e) {
                            if link_abs.is_empty() {
                                link_abs = href;
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) if in_entry => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "link" {
                    if let Some(href) = abs_link(&e) {
                        if link_abs.is_empty() {
                            link_abs = href;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) if in_entry => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_tag.as_str() {
                    "title" => title.push_str(&text),
                    "summary" => summary.push_str(&text),
                    "id" if entry_id.is_empty() => entry_id = text,
                    "published" => published.push_str(&text),
                    "name" if in_author => author_name.push_str(&text),
                    _ if current_tag.contains("doi") => doi = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" && in_entry {
                    in_entry = false;
                    // arXiv ID is the last path segment of the entry URL
                    let id = entry_id
                        .rsplit('/')
                        .next()
                        .unwrap_or(&entry_id)
                        .to_string();
                    if !summary.trim().is_empty() {
                        articles.push(Article {
                            source: Source::Arxiv,
                            title_en: title.trim().replace('\n', " "),
                            authors: authors.iter().take(MAX_AUTHORS).cloned().collect(),
                            publication_date: published.get(..10).unwrap_or("").to_string(),
                            abstract_en: truncate_abstract(&summary.replace('\n', " ")),
                            doi: doi.clone(),
                            url: if link_abs.is_empty() {
                                entry_id.clone()
                            } else {
                                link_abs.clone()
                            },
                            venue: "arXiv".to_string(),
                            paper_id: id,
                        });
                    }
                } else if tag == "author" && in_author {
                    in_author = false;
                    if !author_name.trim().is_empty() {
                        authors.push(author_name.trim().to_string());
                    }
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

fn abs_link(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    let mut href = String::new();
    let mut rel = String::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let val = String::from_utf8_lossy(&attr.value).to_string();
        if key == "href" {
            href = val;
        } else if key == "rel" {
            rel = val;
        }
    }
    if !href.is_empty() && (rel == "alternate" || href.contains("/abs/")) {
        Some(href)
    } else {
        None
    }
}
