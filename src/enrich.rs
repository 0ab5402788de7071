use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::apis::{Article, Source};

/// Every digest carries exactly this many takeaways.
pub const TAKEAWAY_COUNT: usize = 3;

/// Fallback takeaway when the model yields fewer than three usable lines.
const TAKEAWAY_FILLER: &str = "Bu çalışmanın sonuçları klinik pratikte dikkate alınmalıdır.";

/// One step of the text-transformation pipeline. Each task fixes its own
/// prompt, input cap, output bound and sampling temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformTask {
    TranslateTitle,
    TranslateAbstract,
    Summarize,
    ExtractTakeaways,
}

impl TransformTask {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            TransformTask::TranslateTitle => "Tıbbi başlık çevir.",
            TransformTask::TranslateAbstract => "Tıbbi çevirmen. Kısa, öz çeviri yap.",
            TransformTask::Summarize => "Kısa özet oluştur (2-3 cümle).",
            TransformTask::ExtractTakeaways => {
                "3 kısa klinik çıkarım listele (her biri 1 cümle)."
            }
        }
    }

    pub fn user_prefix(&self) -> &'static str {
        match self {
            TransformTask::TranslateTitle | TransformTask::TranslateAbstract => "Çevir:",
            TransformTask::Summarize => "Özet:",
            TransformTask::ExtractTakeaways => "Çıkarımlar:",
        }
    }

    /// Char cap applied to the task input before prompting.
    pub fn input_cap(&self) -> usize {
        match self {
            TransformTask::TranslateTitle => 100,
            TransformTask::TranslateAbstract => 800,
            TransformTask::Summarize => 400,
            TransformTask::ExtractTakeaways => 300,
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            TransformTask::TranslateTitle => 100,
            TransformTask::TranslateAbstract => 400,
            TransformTask::Summarize => 150,
            TransformTask::ExtractTakeaways => 200,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            TransformTask::TranslateTitle | TransformTask::TranslateAbstract => 0.2,
            TransformTask::Summarize => 0.3,
            TransformTask::ExtractTakeaways => 0.4,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("empty completion")]
    EmptyCompletion,
}

/// External text-transformation capability; the pipeline only depends on
/// this seam, not on any particular model provider.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, text: &str, task: TransformTask)
        -> Result<String, TransformError>;
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("no article could be enriched")]
    AllFailed,
}

/// An article with its Turkish translation, summary and takeaways attached.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedArticle {
    pub paper_id: String,
    pub source: Source,
    pub title_en: String,
    pub title_tr: String,
    pub authors: Vec<String>,
    pub publication_date: String,
    pub doi: Option<String>,
    pub url: String,
    pub venue: String,
    pub abstract_tr: String,
    pub summary_tr: String,
    pub key_takeaways_tr: Vec<String>,
}

/// Run the four transform steps for one article.
///
/// Title and abstract translations have no data dependency and run
/// concurrently; the summary needs the translated abstract and the
/// takeaways need the summary.
pub async fn enrich_article<T>(
    transformer: &T,
    article: &Article,
) -> Result<EnrichedArticle, TransformError>
where
    T: Transformer + ?Sized,
{
    let (title_tr, abstract_tr) = tokio::try_join!(
        transformer.transform(&article.title_en, TransformTask::TranslateTitle),
        transformer.transform(&article.abstract_en, TransformTask::TranslateAbstract),
    )?;
    let summary_tr = transformer
        .transform(&abstract_tr, TransformTask::Summarize)
        .await?;
    let raw_takeaways = transformer
        .transform(&summary_tr, TransformTask::ExtractTakeaways)
        .await?;

    Ok(EnrichedArticle {
        paper_id: article.paper_id.clone(),
        source: article.source,
        title_en: article.title_en.clone(),
        title_tr,
        authors: article.authors.clone(),
        publication_date: article.publication_date.clone(),
        doi: article.doi.clone(),
        url: article.url.clone(),
        venue: article.venue.clone(),
        abstract_tr,
        summary_tr,
        key_takeaways_tr: normalize_takeaways(&raw_takeaways),
    })
}

/// Enrich a batch, skipping articles whose pipeline fails. An empty input
/// is not an error (no search matches); a non-empty input where every
/// article fails is.
pub async fn enrich_all<T>(
    transformer: &T,
    articles: &[Article],
) -> Result<Vec<EnrichedArticle>, EnrichError>
where
    T: Transformer + ?Sized,
{
    if articles.is_empty() {
        return Ok(Vec::new());
    }
    let mut enriched = Vec::with_capacity(articles.len());
    for article in articles {
        match enrich_article(transformer, article).await {
            Ok(e) => enriched.push(e),
            Err(e) => {
                tracing::warn!(
                    paper_id = %article.paper_id,
                    source = %article.source,
                    error = %e,
                    "enrichment failed, skipping article"
                );
            }
        }
    }
    if enriched.is_empty() {
        return Err(EnrichError::AllFailed);
    }
    Ok(enriched)
}

/// Shape the raw takeaway completion into exactly [`TAKEAWAY_COUNT`]
/// entries: strip list markers, drop short fragments, fall back to
/// sentence-splitting and finally pad with the filler sentence.
pub fn normalize_takeaways(raw: &str) -> Vec<String> {
    let mut takeaways: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = strip_list_marker(line.trim());
        if line.chars().count() > 15 {
            takeaways.push(line.to_string());
        }
    }

    if takeaways.len() < TAKEAWAY_COUNT {
        for sentence in raw.split('.') {
            let sentence = sentence.trim();
            if sentence.chars().count() > 20 {
                takeaways.push(sentence.to_string());
                if takeaways.len() >= TAKEAWAY_COUNT {
                    break;
                }
            }
        }
    }

    while takeaways.len() < TAKEAWAY_COUNT {
        takeaways.push(TAKEAWAY_FILLER.to_string());
    }
    takeaways.truncate(TAKEAWAY_COUNT);
    takeaways
}

fn strip_list_marker(line: &str) -> &str {
    let mut line = line;
    for marker in ["-", "*", "•", "1.", "2.", "3.", "4.", "5."] {
        if let Some(rest) = line.strip_prefix(marker) {
            line = rest.trim_start();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn article(id: &str) -> Article {
        Article {
            source: Source::EuropePmc,
            title_en: format!("Title {}", id),
            authors: vec!["Yilmaz A".to_string()],
            publication_date: "2024-01-01".to_string(),
            abstract_en: "An abstract long enough to translate.".to_string(),
            doi: None,
            url: format!("https://e/{}", id),
            venue: "JAMA".to_string(),
            paper_id: id.to_string(),
        }
    }

    /// Echoes the task back; optionally fails for configured paper inputs.
    struct FakeTransformer {
        fail_on: Option<String>,
        calls: Mutex<Vec<TransformTask>>,
    }

    impl FakeTransformer {
        fn new() -> Self {
            Self {
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(text: &str) -> Self {
            Self {
                fail_on: Some(text.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transformer for FakeTransformer {
        async fn transform(
            &self,
            text: &str,
            task: TransformTask,
        ) -> Result<String, TransformError> {
            self.calls.lock().unwrap().push(task);
            if let Some(fail) = &self.fail_on {
                if text.contains(fail.as_str()) {
                    return Err(TransformError::EmptyCompletion);
                }
            }
            Ok(match task {
                TransformTask::TranslateTitle => format!("TR başlık: {}", text),
                TransformTask::TranslateAbstract => format!("TR özet metni: {}", text),
                TransformTask::Summarize => format!("Kısa özet: {}", text),
                TransformTask::ExtractTakeaways => {
                    "- Birinci klinik çıkarım cümlesi.\n- İkinci klinik çıkarım cümlesi.\n- Üçüncü klinik çıkarım cümlesi.".to_string()
                }
            })
        }
    }

    #[tokio::test]
    async fn test_enrich_article_chains_steps() {
        let t = FakeTransformer::new();
        let enriched = enrich_article(&t, &article("1")).await.unwrap();
        assert!(enriched.title_tr.starts_with("TR başlık"));
        assert!(enriched.summary_tr.contains("TR özet metni"));
        assert_eq!(enriched.key_takeaways_tr.len(), TAKEAWAY_COUNT);

        // summarize must come after the abstract translation it consumes,
        // takeaways last
        let calls = t.calls.lock().unwrap();
        let summarize_pos = calls.iter().position(|c| *c == TransformTask::Summarize).unwrap();
        let takeaway_pos = calls
            .iter()
            .position(|c| *c == TransformTask::ExtractTakeaways)
            .unwrap();
        assert!(summarize_pos < takeaway_pos);
        assert_eq!(calls.len(), 4);
    }

    #[tokio::test]
    async fn test_enrich_all_skips_failed_articles() {
        let t = FakeTransformer::failing_on("Title bad");
        let articles = vec![article("good"), article("bad"), article("also-good")];
        let enriched = enrich_all(&t, &articles).await.unwrap();
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].paper_id, "good");
        assert_eq!(enriched[1].paper_id, "also-good");
    }

    #[tokio::test]
    async fn test_enrich_all_reports_total_failure() {
        let t = FakeTransformer::failing_on("Title");
        let articles = vec![article("a"), article("b")];
        let err = enrich_all(&t, &articles).await.unwrap_err();
        assert!(matches!(err, EnrichError::AllFailed));
    }

    #[tokio::test]
    async fn test_enrich_all_empty_input_is_not_an_error() {
        let t = FakeTransformer::failing_on("anything");
        let enriched = enrich_all(&t, &[]).await.unwrap();
        assert!(enriched.is_empty());
    }

    #[test]
    fn test_takeaways_strip_markers() {
        let raw = "1. Metformin mortaliteyi anlamlı şekilde azaltmaktadır.\n2. Yan etki profili kabul edilebilir düzeydedir.\n3. Doz titrasyonu yakın takip gerektirmektedir.";
        let takeaways = normalize_takeaways(raw);
        assert_eq!(takeaways.len(), 3);
        assert!(takeaways[0].starts_with("Metformin"));
        assert!(!takeaways.iter().any(|t| t.starts_with("1.")));
    }

    #[test]
    fn test_takeaways_padded_to_three() {
        let takeaways = normalize_takeaways("Tek kullanılabilir çıkarım cümlesi burada");
        assert_eq!(takeaways.len(), TAKEAWAY_COUNT);
        assert_eq!(takeaways[2], TAKEAWAY_FILLER);
    }

    #[test]
    fn test_takeaways_truncated_to_three() {
        let raw = "- Birinci uzun çıkarım cümlesi burada.\n- İkinci uzun çıkarım cümlesi burada.\n- Üçüncü uzun çıkarım cümlesi burada.\n- Dördüncü uzun çıkarım cümlesi burada.";
        let takeaways = normalize_takeaways(raw);
        assert_eq!(takeaways.len(), TAKEAWAY_COUNT);
    }

    #[test]
    fn test_takeaways_sentence_fallback() {
        // one usable line only; sentence splitting fills the remainder
        let raw = "kısa. Bu cümle yeterince uzun bir klinik çıkarım adayıdır. Bu da ikinci yeterince uzun adaydır.";
        let takeaways = normalize_takeaways(raw);
        assert_eq!(takeaways.len(), TAKEAWAY_COUNT);
        assert!(takeaways[0].contains("yeterince uzun"));
    }
}
