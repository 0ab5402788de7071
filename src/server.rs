use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::apis::{ArticleSource, Source};
use crate::config::Config;
use crate::enrich::{enrich_all, EnrichError, EnrichedArticle, Transformer};
use crate::search::search_all_sources;

const MAX_ARTICLE_COUNT: u32 = 50;
const MAX_TIME_RANGE_YEARS: u32 = 20;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sources: Arc<Vec<Arc<dyn ArticleSource>>>,
    pub transformer: Arc<dyn Transformer>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub keyword: String,
    pub article_count: u32,
    #[serde(default)]
    pub time_range_years: Option<u32>,
    /// Overrides the default open-provider set for this request.
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
}

impl AnalyzeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.keyword.trim().is_empty() {
            return Err(ApiError::BadRequest("keyword must not be empty".into()));
        }
        if self.article_count < 1 || self.article_count > MAX_ARTICLE_COUNT {
            return Err(ApiError::BadRequest(format!(
                "article_count must be between 1 and {}",
                MAX_ARTICLE_COUNT
            )));
        }
        if let Some(years) = self.time_range_years {
            if years < 1 || years > MAX_TIME_RANGE_YEARS {
                return Err(ApiError::BadRequest(format!(
                    "time_range_years must be between 1 and {}",
                    MAX_TIME_RANGE_YEARS
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Hiçbir makale başarıyla işlenemedi. Lütfen farklı bir anahtar kelime deneyin.")]
    NothingEnriched,
}

impl From<EnrichError> for ApiError {
    fn from(e: EnrichError) -> Self {
        match e {
            EnrichError::AllFailed => ApiError::NothingEnriched,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NothingEnriched => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Build and return the full router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/sources", get(list_sources))
        .route("/api/analyze_articles", post(analyze_articles))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "MedInsight API çalışıyor",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "analyze_articles": "/api/analyze_articles",
            "sources": "/api/sources",
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn list_sources(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.source_status())
}

/// POST /api/analyze_articles: search the literature sources, then run
/// each surviving article through the Turkish enrichment pipeline.
async fn analyze_articles(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Vec<EnrichedArticle>>, ApiError> {
    request.validate()?;

    let articles = search_all_sources(
        &state.sources,
        request.keyword.trim(),
        request.article_count,
        request.time_range_years,
        request.sources.as_deref(),
    )
    .await;

    tracing::info!(
        keyword = %request.keyword,
        found = articles.len(),
        "search complete, starting enrichment"
    );

    let enriched = enrich_all(state.transformer.as_ref(), &articles).await?;
    Ok(Json(enriched))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(keyword: &str, count: u32, years: Option<u32>) -> AnalyzeRequest {
        AnalyzeRequest {
            keyword: keyword.to_string(),
            article_count: count,
            time_range_years: years,
            sources: None,
        }
    }

    #[test]
    fn test_validate_accepts_reasonable_request() {
        assert!(request("sepsis", 10, Some(5)).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_keyword() {
        assert!(request("   ", 10, None).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_count_out_of_range() {
        assert!(request("sepsis", 0, None).validate().is_err());
        assert!(request("sepsis", 51, None).validate().is_err());
        assert!(request("sepsis", 50, None).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_time_range_out_of_range() {
        assert!(request("sepsis", 5, Some(0)).validate().is_err());
        assert!(request("sepsis", 5, Some(21)).validate().is_err());
        assert!(request("sepsis", 5, Some(20)).validate().is_ok());
    }

    #[test]
    fn test_request_parses_source_names() {
        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"keyword": "sepsis", "article_count": 5, "sources": ["arxiv", "europe_pmc"]}"#,
        )
        .unwrap();
        assert_eq!(
            req.sources,
            Some(vec![Source::Arxiv, Source::EuropePmc])
        );
    }
}
