use super::{
    current_year, cutoff_year, date_from_year, http_client, truncate_abstract, Article,
    ArticleSource, Source, SourceError, MAX_AUTHORS, PROVIDER_RESULT_CAP,
};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://doaj.org/api/v2/search/articles";

pub struct DoajClient {
    client: reqwest::Client,
}

impl DoajClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for DoajClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct DoajResponse {
    results: Option<Vec<DoajResult>>,
}
#[derive(Deserialize)]
struct DoajResult {
    bibjson: DoajBibJson,
    id: Option<String>,
}
#[derive(Deserialize)]
struct DoajBibJson {
    title: Option<String>,
    author: Option<Vec<DoajAuthor>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<String>,
    month: Option<String>,
    identifier: Option<Vec<DoajIdentifier>>,
    link: Option<Vec<DoajLink>>,
    journal: Option<DoajJournal>,
}
#[derive(Deserialize)]
struct DoajAuthor {
    name: Option<String>,
}
#[derive(Deserialize)]
struct DoajIdentifier {
    #[serde(rename = "type")]
    id_type: Option<String>,
    id: Option<String>,
}
#[derive(Deserialize)]
struct DoajLink {
    url: Option<String>,
}
#[derive(Deserialize)]
struct DoajJournal {
    title: Option<String>,
}

fn doaj_to_article(r: &DoajResult) -> Option<Article> {
    let bib = &r.bibjson;
    let abstract_text = bib.abstract_text.as_deref().unwrap_or("").trim();
    if abstract_text.is_empty() {
        return None;
    }
    let doi = bib
        .identifier
        .as_ref()
        .and_then(|ids| ids.iter().find(|i| i.id_type.as_deref() == Some("doi")))
        .and_then(|i| i.id.clone());
    let url = bib
        .link
        .as_ref()
        .and_then(|links| links.first())
        .and_then(|l| l.url.clone())
        .unwrap_or_default();
    let publication_date = match (&bib.year, &bib.month) {
        (Some(y), Some(m)) => super::normalize_date(y, m, "01"),
        (Some(y), None) => date_from_year(y),
        _ => String::new(),
    };

    Some(Article {
        source: Source::Doaj,
        title_en: bib.title.clone().unwrap_or_default(),
        authors: bib
            .author
            .as_ref()
            .map(|a| a.iter().filter_map(|a| a.name.clone()).take(MAX_AUTHORS).collect())
            .unwrap_or_default(),
        publication_date,
        abstract_en: truncate_abstract(abstract_text),
        doi,
        url,
        venue: bib
            .journal
            .as_ref()
            .and_then(|j| j.title.clone())
            .unwrap_or_default(),
        paper_id: r.id.clone().unwrap_or_default(),
    })
}

#[async_trait]
impl ArticleSource for DoajClient {
    fn source(&self) -> Source {
        Source::Doaj
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
                " AND year:[{} TO {}]",
                cutoff_year(years),
                current_year()
            ));
        }
        let url = format!("{}/{}", BASE_URL, urlencoded(&query));
        let resp: DoajResponse = self
            .client
            .get(&url)
            .query(&[("pageSize", &count.min(PROVIDER_RESULT_CAP).to_string())])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp
            .results
            .unwrap_or_default()
            .iter()
            .filter_map(doaj_to_article)
            .collect())
    }
}

fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20").replace('[', "%5B").replace(']', "%5D")
}
