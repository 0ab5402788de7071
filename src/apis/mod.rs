pub mod arxiv;
pub mod doaj;
pub mod europepmc;
pub mod pubmed;
pub mod semantic_scholar;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authors are cut to the first entries of the provider's list.
pub const MAX_AUTHORS: usize = 5;
/// Abstracts are char-truncated to this length before enrichment.
pub const MAX_ABSTRACT_CHARS: usize = 600;
/// Per-provider cap on requested results, regardless of caller input.
pub const PROVIDER_RESULT_CAP: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Arxiv,
    EuropePmc,
    Doaj,
    SemanticScholar,
    Pubmed,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Arxiv => "arxiv",
            Source::EuropePmc => "europe_pmc",
            Source::Doaj => "doaj",
            Source::SemanticScholar => "semantic_scholar",
            Source::Pubmed => "pubmed",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The common article shape every source adapter produces.
///
/// Adapters only emit articles with a non-empty `abstract_en`; entries
/// without an abstract are skipped during mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub source: Source,
    pub title_en: String,
    pub authors: Vec<String>,
    /// `YYYY-MM-DD` best effort, empty when the provider gives no date.
    pub publication_date: String,
    pub abstract_en: String,
    pub doi: Option<String>,
    pub url: String,
    pub venue: String,
    pub paper_id: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

/// One external literature provider.
///
/// `count` is capped internally at [`PROVIDER_RESULT_CAP`];
/// `time_range_years` restricts results to the last N publication years
/// using the provider's own date-filter syntax.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn source(&self) -> Source;

    async fn search(
        &self,
        keyword: &str,
        count: u32,
        time_range_years: Option<u32>,
    ) -> Result<Vec<Article>, SourceError>;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("medinsight/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap()
}

/// First calendar year inside the requested range.
pub(crate) fn cutoff_year(time_range_years: u32) -> i32 {
    Utc::now().year() - time_range_years as i32
}

pub(crate) fn current_year() -> i32 {
    Utc::now().year()
}

/// Char-truncate an abstract, appending an ellipsis marker when cut.
pub(crate) fn truncate_abstract(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > MAX_ABSTRACT_CHARS {
        let mut cut: String = text.chars().take(MAX_ABSTRACT_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

/// Assemble `YYYY-MM-DD` from loose components. Month names are mapped to
/// numbers and single-digit parts are zero-padded; missing month or day
/// default to `01`. An unusable year yields an empty date.
pub(crate) fn normalize_date(year: &str, month: &str, day: &str) -> String {
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return String::new();
    }
    format!("{}-{}-{}", year, pad_component(month), pad_component(day))
}

/// Date for providers that only report a publication year.
pub(crate) fn date_from_year(year: &str) -> String {
    normalize_date(year, "01", "01")
}

fn pad_component(part: &str) -> String {
    let part = part.trim();
    if let Some(n) = month_number(part) {
        return format!("{:02}", n);
    }
    match part.len() {
        0 => "01".to_string(),
        1 => format!("0{}", part),
        _ => part.to_string(),
    }
}

fn month_number(part: &str) -> Option<u32> {
    match part {
        "Jan" => Some(1),
        "Feb" => Some(2),
        "Mar" => Some(3),
        "Apr" => Some(4),
        "May" => Some(5),
        "Jun" => Some(6),
        "Jul" => Some(7),
        "Aug" => Some(8),
        "Sep" => Some(9),
        "Oct" => Some(10),
        "Nov" => Some(11),
        "Dec" => Some(12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_abstract_short_text_untouched() {
        assert_eq!(truncate_abstract("  brief abstract "), "brief abstract");
    }

    #[test]
    fn test_truncate_abstract_appends_marker() {
        let long = "a".repeat(700);
        let cut = truncate_abstract(&long);
        assert_eq!(cut.chars().count(), MAX_ABSTRACT_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_truncate_abstract_is_char_safe() {
        // multi-byte chars must not split
        let long = "ü".repeat(650);
        let cut = truncate_abstract(&long);
        assert!(cut.starts_with('ü'));
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_normalize_date_pads_components() {
        assert_eq!(normalize_date("2023", "3", "7"), "2023-03-07");
        assert_eq!(normalize_date("2023", "", ""), "2023-01-01");
        assert_eq!(normalize_date("2023", "Nov", "15"), "2023-11-15");
    }

    #[test]
    fn test_normalize_date_rejects_bad_year() {
        assert_eq!(normalize_date("", "01", "01"), "");
        assert_eq!(normalize_date("n/a", "01", "01"), "");
    }

    #[test]
    fn test_source_serde_names() {
        let json = serde_json::to_string(&Source::EuropePmc).unwrap();
        assert_eq!(json, "\"europe_pmc\"");
        let parsed: Source = serde_json::from_str("\"semantic_scholar\"").unwrap();
        assert_eq!(parsed, Source::SemanticScholar);
    }
}
