use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use crate::apis::{self, ArticleSource};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub semantic_scholar_api_key: Option<String>,
    pub pubmed_email: Option<String>,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub enabled_source_names: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables. Fails when the
    /// LLM API key is missing; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("MEDINSIGHT_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .context("MEDINSIGHT_ADDR is not a valid socket address")?;

        let openai_api_key =
            std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let semantic_scholar_api_key = std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok();
        let pubmed_email = std::env::var("PUBMED_EMAIL").ok();

        let enabled_source_names = std::env::var("MEDINSIGHT_SOURCES")
            .map(|s| s.split(',').map(|s| s.trim().to_lowercase()).collect())
            .unwrap_or_default();

        Ok(Self {
            addr,
            semantic_scholar_api_key,
            pubmed_email,
            openai_api_key,
            openai_base_url,
            openai_model,
            enabled_source_names,
        })
    }

    /// Build the list of constructed article sources based on configuration.
    /// An empty `MEDINSIGHT_SOURCES` means "construct everything"; which of
    /// these a request actually queries is decided per call.
    pub fn build_sources(&self) -> Vec<Arc<dyn ArticleSource>> {
        let filter = &self.enabled_source_names;
        let filter_active = !filter.is_empty();

        let should_enable =
            |name: &str| -> bool { !filter_active || filter.contains(&name.to_string()) };

        let mut sources: Vec<Arc<dyn ArticleSource>> = Vec::new();

        // Sources that don't need credentials
        if should_enable("arxiv") {
            sources.push(Arc::new(apis::arxiv::ArxivClient::new()));
        }
        if should_enable("europe_pmc") {
            sources.push(Arc::new(apis::europepmc::EuropePmcClient::new()));
        }
        if should_enable("doaj") {
            sources.push(Arc::new(apis::doaj::DoajClient::new()));
        }

        // Sources with optional credentials
        if should_enable("semantic_scholar") {
            sources.push(Arc::new(apis::semantic_scholar::SemanticScholarClient::new(
                self.semantic_scholar_api_key.clone(),
            )));
            if self.semantic_scholar_api_key.is_none() {
                tracing::warn!("semantic_scholar running without API key (rate limited)");
            }
        }
        if should_enable("pubmed") {
            sources.push(Arc::new(apis::pubmed::PubmedClient::new(
                self.pubmed_email.clone(),
            )));
        }

        sources
    }

    /// Status descriptions of all known sources, for the sources endpoint.
    pub fn source_status(&self) -> Vec<SourceStatus> {
        let mut statuses = vec![
            SourceStatus {
                name: "arxiv".into(),
                enabled: true,
                default: true,
                note: "No API key required".into(),
            },
            SourceStatus {
                name: "europe_pmc".into(),
                enabled: true,
                default: true,
                note: "No API key required".into(),
            },
            SourceStatus {
                name: "doaj".into(),
                enabled: true,
                default: true,
                note: "No API key required".into(),
            },
            SourceStatus {
                name: "semantic_scholar".into(),
                enabled: true,
                default: false,
                note: if self.semantic_scholar_api_key.is_some() {
                    "API key set".into()
                } else {
                    "No API key (rate limited)".into()
                },
            },
            SourceStatus {
                name: "pubmed".into(),
                enabled: true,
                default: false,
                note: if self.pubmed_email.is_some() {
                    "Contact email set".into()
                } else {
                    "No contact email (limited rate)".into()
                },
            },
        ];

        if !self.enabled_source_names.is_empty() {
            for s in &mut statuses {
                if !self.enabled_source_names.contains(&s.name) {
                    s.enabled = false;
                    s.note = "Disabled by MEDINSIGHT_SOURCES filter".into();
                }
            }
        }

        statuses
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub enabled: bool,
    /// Part of the default query set when a request names no sources.
    pub default: bool,
    pub note: String,
}
