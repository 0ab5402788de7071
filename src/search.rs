use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::apis::{Article, ArticleSource, Source};

/// Sources queried when the caller does not name any: the purely open
/// providers. Semantic Scholar needs a registered key and PubMed predates
/// the multi-source setup, so both are opt-in.
pub const DEFAULT_SOURCES: [Source; 3] = [Source::Arxiv, Source::EuropePmc, Source::Doaj];

/// Fan out one keyword search to every enabled source, merge the results in
/// source order, deduplicate by identity key and cut to `total_count`.
///
/// Each source is asked for the full `total_count` rather than a share of
/// it, favoring result diversity over balanced quotas. A failing source is
/// logged and contributes nothing; if every source fails the result is
/// simply empty.
pub async fn search_all_sources(
    sources: &[Arc<dyn ArticleSource>],
    keyword: &str,
    total_count: u32,
    time_range_years: Option<u32>,
    enabled: Option<&[Source]>,
) -> Vec<Article> {
    let enabled = enabled.unwrap_or(&DEFAULT_SOURCES);
    let active: Vec<_> = sources
        .iter()
        .filter(|s| enabled.contains(&s.source()))
        .collect();

    if active.is_empty() {
        return Vec::new();
    }

    let handles: Vec<_> = active
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            let keyword = keyword.to_string();
            tokio::spawn(async move {
                let name = source.source();
                match source.search(&keyword, total_count, time_range_years).await {
                    Ok(articles) => {
                        tracing::debug!(source = %name, count = articles.len(), "source returned");
                        articles
                    }
                    Err(e) => {
                        tracing::warn!(source = %name, error = %e, "source search failed");
                        Vec::new()
                    }
                }
            })
        })
        .collect();

    let mut merged = Vec::new();
    for result in join_all(handles).await {
        match result {
            Ok(articles) => merged.extend(articles),
            Err(e) => tracing::warn!(error = %e, "source task panicked"),
        }
    }

    let mut unique = dedup_by_identity(merged);
    unique.truncate(total_count as usize);
    unique
}

/// Single pass over the merged list keeping the first occurrence of each
/// identity key. Records where no key can be computed are kept
/// unconditionally; sparse metadata must not cause false-positive drops,
/// even though that can admit true duplicates.
pub fn dedup_by_identity(articles: Vec<Article>) -> Vec<Article> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(articles.len());
    for article in articles {
        match identity_key(&article) {
            Some(key) => {
                if seen.insert(key.to_string()) {
                    unique.push(article);
                }
            }
            None => unique.push(article),
        }
    }
    unique
}

/// DOI first, then URL, then the provider id.
fn identity_key(article: &Article) -> Option<&str> {
    article
        .doi
        .as_deref()
        .filter(|d| !d.is_empty())
        .or_else(|| (!article.url.is_empty()).then_some(article.url.as_str()))
        .or_else(|| (!article.paper_id.is_empty()).then_some(article.paper_id.as_str()))
}
