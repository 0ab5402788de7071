use super::{
    cutoff_year, date_from_year, http_client, truncate_abstract, Article, ArticleSource, Source,
    SourceError, MAX_AUTHORS, PROVIDER_RESULT_CAP,
};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";

const FIELDS: &str = "title,authors,year,abstract,url,externalIds,venue,publicationDate";

pub struct SemanticScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            api_key,
        }
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }
}

#[derive(Deserialize)]
struct S2SearchResponse {
    data: Option<Vec<S2Paper>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    authors: Option<Vec<S2Author>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<u32>,
    publication_date: Option<String>,
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
    venue: Option<String>,
}

#[derive(Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

/// Maps one search hit into the normalized shape; `None` when the paper
/// carries no abstract.
fn s2_to_article(p: &S2Paper) -> Option<Article> {
    let abstract_text = p.abstract_text.as_deref().unwrap_or("").trim();
    if abstract_text.is_empty() {
        return None;
    }
    let paper_id = p.paper_id.clone().unwrap_or_default();
    let publication_date = p
        .publication_date
        .clone()
        .filter(|d| !d.is_empty())
        .or_else(|| {
            p.year
                .map(|y| date_from_year(&y.to_string()))
                .filter(|d| !d.is_empty())
        })
        .unwrap_or_default();

    Some(Article {
        source: Source::SemanticScholar,
        title_en: p.title.clone().unwrap_or_default(),
        authors: p
            .authors
            .as_ref()
            .map(|a| a.iter().filter_map(|a| a.name.clone()).take(MAX_AUTHORS).collect())
            .unwrap_or_default(),
        publication_date,
        abstract_en: truncate_abstract(abstract_text),
        doi: p.external_ids.as_ref().and_then(|e| e.doi.clone()),
        url: p
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", paper_id)),
        venue: p.venue.clone().unwrap_or_default(),
        paper_id,
    })
}

#[async_trait]
impl ArticleSource for SemanticScholarClient {
    fn source(&self) -> Source {
        Source::SemanticScholar
    }

    async fn search(
        &self,
        keyword: &str,
        count: u32,
        time_range_years: Option<u32>,
    ) -> Result<Vec<Article>, SourceError> {
        let url = format!("{}/paper/search", BASE_URL);
        let limit = count.min(PROVIDER_RESULT_CAP).to_string();
        let mut params = vec![
            ("query", keyword.to_string()),
            ("limit", limit),
            ("fields", FIELDS.to_string()),
        ];
        if let Some(years) = time_range_years {
            // open-ended range: publications from the cutoff year onward
            params.push(("year", format!("{}-", cutoff_year(years))));
        }
        let resp: S2SearchResponse = self
            .add_auth(self.client.get(&url).query(&params))
            .send()
            .await?
            .json()
            .await?;
        Ok(resp
            .data
            .unwrap_or_default()
            .iter()
            .filter_map(s2_to_article)
            .collect())
    }
}
