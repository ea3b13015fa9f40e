use anyhow::{Context, Result};
use tracing::debug;

use cache::{CacheStats, CoalescingCache};
use grounding::{CitationExtractor, GroundingResult, normalize_spacing};
use resolve::{FuzzyIndex, MatchCandidate};

use crate::config::AssistantConfig;
use crate::keys::{RequestKind, chat_key, request_key};
use crate::retry::RetryPolicy;

/// The upstream generation seam: one call produces one grounded result.
///
/// Implementations own the transport and the prompt-to-vendor mapping; this
/// crate only assumes a call completes or fails exactly once.
pub trait Generator {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<GroundingResult>> + Send;
}

/// Ties the pieces together: resolve an entity with the fuzzy index, then
/// produce cached, citation-annotated text about it.
///
/// Every generated answer flows through the coalescing cache, so concurrent
/// requests for the same (entity, kind) share a single upstream call, and
/// repeat requests are served from memory.
pub struct Assistant<G> {
    generator: G,
    index: FuzzyIndex,
    cache: CoalescingCache,
    extractor: CitationExtractor,
    retry: RetryPolicy,
    config: AssistantConfig,
}

impl<G: Generator> Assistant<G> {
    pub fn new(generator: G, index: FuzzyIndex, config: AssistantConfig) -> Self {
        Self {
            cache: CoalescingCache::new(config.cache.max_entries),
            retry: RetryPolicy::from(&config.retry),
            extractor: CitationExtractor::default(),
            generator,
            index,
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: CitationExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Ranked entity candidates for a free-text query.
    pub fn resolve(&self, query: &str) -> Vec<MatchCandidate> {
        self.index.search(query, self.config.search.result_limit)
    }

    /// Autocomplete suggestions for a partial query.
    pub fn suggest(&self, query: &str) -> Vec<String> {
        self.index.suggest(query, self.config.search.suggestion_limit)
    }

    /// Cached, annotated answer for one (entity, kind) request.
    pub async fn answer(&self, entity_id: &str, kind: RequestKind, prompt: &str) -> Result<String> {
        self.answer_keyed(&request_key(entity_id, kind), prompt).await
    }

    /// Cached, annotated answer for one chat turn about an entity.
    pub async fn chat(&self, entity_id: &str, question: &str, prompt: &str) -> Result<String> {
        self.answer_keyed(&chat_key(entity_id, question), prompt).await
    }

    async fn answer_keyed(&self, key: &str, prompt: &str) -> Result<String> {
        debug!(key, "answering request");
        self.cache
            .get_or_compute(key, || async {
                let mut grounded = self
                    .retry
                    .run("generate", || self.generator.generate(prompt))
                    .await?;
                grounded.text = normalize_spacing(grounded.text.trim());
                Ok(self.extractor.annotate(&grounded))
            })
            .await
            .with_context(|| format!("failed to answer request `{key}`"))
    }

    /// Drop the cached answer for a (entity, kind) pair so the next request
    /// regenerates it. Fails while a generation for that key is in flight.
    pub fn refresh(&self, entity_id: &str, kind: RequestKind) -> Result<bool> {
        let key = request_key(entity_id, kind);
        self.cache
            .invalidate(&key)
            .with_context(|| format!("cannot refresh `{key}`"))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrySettings;
    use grounding::{SourceChunk, Support};
    use resolve::{EntityRecord, IndexConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    impl Generator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<GroundingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("quota exhausted");
            }
            Ok(GroundingResult {
                text: "Acme Capital raised $500million for its flagship fund.".to_string(),
                supports: vec![Support {
                    chunk_indices: vec![0, 1, 0],
                }],
                chunks: vec![
                    SourceChunk {
                        uri: Some("https://www.example.com/a".to_string()),
                    },
                    SourceChunk {
                        uri: Some(
                            "https://vertexaisearch.cloud.google.com/grounding/x".to_string(),
                        ),
                    },
                ],
            })
        }
    }

    fn record(id: &str, name: &str) -> EntityRecord {
        [
            ("id".to_string(), id.to_string()),
            ("name".to_string(), name.to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn sample_index() -> FuzzyIndex {
        let records = vec![record("1", "Acme Capital"), record("2", "Acme Ventures")];
        let config = IndexConfig::new(vec!["name".to_string()], "id")
            .with_display_fields(vec!["name".to_string()]);
        FuzzyIndex::build(records, config)
    }

    fn fast_config() -> AssistantConfig {
        AssistantConfig {
            retry: RetrySettings {
                max_retries: 1,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
            ..AssistantConfig::default()
        }
    }

    #[tokio::test]
    async fn resolve_then_answer_end_to_end() {
        let assistant = Assistant::new(StubGenerator::new(), sample_index(), fast_config());

        let candidates = assistant.resolve("Acme Cap");
        assert_eq!(candidates[0].record.get("id"), Some("1"));

        let answer = assistant
            .answer("1", RequestKind::Profile, "profile of Acme Capital")
            .await
            .unwrap();

        // Normalized prose plus a deduplicated bibliography, redirector dropped.
        assert!(answer.contains("$500 million"));
        assert!(answer.contains("\n\n## Sources\n1. [example.com](https://www.example.com/a)"));
        assert!(!answer.contains("vertexaisearch"));
    }

    #[tokio::test]
    async fn repeat_answers_come_from_cache() {
        let assistant = Assistant::new(StubGenerator::new(), sample_index(), fast_config());

        let first = assistant
            .answer("1", RequestKind::Profile, "p")
            .await
            .unwrap();
        let second = assistant
            .answer("1", RequestKind::Profile, "p")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_answers_share_one_generation() {
        let assistant = Assistant::new(StubGenerator::new(), sample_index(), fast_config());

        let (a, b, c) = tokio::join!(
            assistant.answer("1", RequestKind::News, "n"),
            assistant.answer("1", RequestKind::News, "n"),
            assistant.answer("1", RequestKind::News, "n"),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(c.unwrap(), assistant.answer("1", RequestKind::News, "n").await.unwrap());
        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn kinds_are_cached_independently() {
        let assistant = Assistant::new(StubGenerator::new(), sample_index(), fast_config());

        assistant.answer("1", RequestKind::Profile, "p").await.unwrap();
        assistant.answer("1", RequestKind::News, "n").await.unwrap();

        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(assistant.cache_stats().ready, 2);
    }

    #[tokio::test]
    async fn refresh_forces_regeneration() {
        let assistant = Assistant::new(StubGenerator::new(), sample_index(), fast_config());

        assistant.answer("1", RequestKind::News, "n").await.unwrap();
        assert!(assistant.refresh("1", RequestKind::News).unwrap());
        assistant.answer("1", RequestKind::News, "n").await.unwrap();

        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chat_turns_coalesce_by_question() {
        let assistant = Assistant::new(StubGenerator::new(), sample_index(), fast_config());

        assistant.chat("1", "what sectors?", "prompt a").await.unwrap();
        assistant.chat("1", "what sectors?", "prompt a").await.unwrap();
        assistant.chat("1", "who founded them?", "prompt b").await.unwrap();

        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn upstream_failure_surfaces_and_key_stays_retryable() {
        let assistant = Assistant::new(StubGenerator::failing(), sample_index(), fast_config());

        let err = assistant
            .answer("1", RequestKind::Profile, "p")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("quota exhausted"));
        // Initial attempt plus one retry.
        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 2);

        // The key was released, so a later request tries upstream again.
        let _ = assistant.answer("1", RequestKind::Profile, "p").await;
        assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 4);
    }
}
