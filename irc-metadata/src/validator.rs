//! Cache-backed metadata resolution.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use irc_cache::{CacheStats, MetadataCache};
use irc_core::{
    CachedOutcome, FetchError, IrcError, MetadataFetcher, ParameterError, RequestContext,
    TransientError,
};
use irc_schema::SchemaValidator;

/// Turns a raw path parameter into a cache key.
pub type KeyParser<K> = Box<dyn Fn(&str) -> Result<K, ParameterError> + Send + Sync>;

/// Resolves keys of type `K` to schema-checked, cached outcomes.
///
/// Owns its schema and cache exclusively; the only way to read or populate
/// the cache is [`MetadataValidator::resolve`].
///
/// Concurrent misses for the same key may both fetch. Both store the same
/// outcome, so the last write wins without changing what callers observe.
pub struct MetadataValidator<K> {
    name: String,
    schema: SchemaValidator,
    cache: MetadataCache<K, CachedOutcome>,
    parse_key: KeyParser<K>,
    fetcher: Arc<dyn MetadataFetcher<K>>,
}

impl<K> MetadataValidator<K>
where
    K: Hash + Eq + Clone + fmt::Display + Send + Sync + 'static,
{
    /// Creates a validator.
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in logs (e.g. the metadata standard)
    /// * `schema` - Compiled schema every fetched document must satisfy
    /// * `capacity` - Maximum number of cached outcomes, must be positive
    /// * `parse_key` - Extracts the key from a request path parameter
    /// * `fetcher` - Upstream source of raw metadata bytes
    ///
    /// # Errors
    ///
    /// Returns [`IrcError::ConfigError`] if `capacity` is zero.
    pub fn new<P>(
        name: impl Into<String>,
        schema: SchemaValidator,
        capacity: usize,
        parse_key: P,
        fetcher: Arc<dyn MetadataFetcher<K>>,
    ) -> Result<Self, IrcError>
    where
        P: Fn(&str) -> Result<K, ParameterError> + Send + Sync + 'static,
    {
        let name = name.into();
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            IrcError::ConfigError(format!("metadata cache size for {name} must be positive"))
        })?;

        Ok(Self {
            name,
            schema,
            cache: MetadataCache::new(capacity),
            parse_key: Box::new(parse_key),
            fetcher,
        })
    }

    /// Label of this validator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extracts the key from a raw path parameter.
    pub fn parse_key(&self, raw: &str) -> Result<K, ParameterError> {
        (self.parse_key)(raw)
    }

    /// Resolves `key` to its outcome.
    ///
    /// A cache hit returns immediately without fetching or validating. On a
    /// miss the fetch runs under `ctx`; terminal results are stored, while
    /// transient failures (including cancellation and deadline expiry) are
    /// returned to the caller and leave the cache untouched.
    #[instrument(skip_all, fields(validator = %self.name, key = %key))]
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        key: K,
    ) -> Result<CachedOutcome, TransientError> {
        if let Some(cached) = self.cache.get(&key) {
            debug!(outcome = cached.kind(), "Cache hit");
            return Ok(cached);
        }

        debug!("Cache miss, fetching");

        let outcome = match ctx.run(self.fetcher.fetch(ctx, &key)).await? {
            Ok(bytes) => self.classify(bytes),
            Err(FetchError::NotFound) => CachedOutcome::NotFound,
            Err(FetchError::Invalid(reason)) => {
                debug!(%reason, "Source reported unusable metadata");
                CachedOutcome::Invalid
            }
            Err(FetchError::Transient(err)) => {
                warn!(error = %err, "Metadata fetch failed");
                return Err(err);
            }
        };

        debug!(outcome = outcome.kind(), "Storing outcome");
        self.cache.insert(key, outcome.clone());
        Ok(outcome)
    }

    /// Classifies fetched bytes. The payload of a valid outcome is `bytes`
    /// itself, never a re-serialization.
    fn classify(&self, bytes: Bytes) -> CachedOutcome {
        let document: Value = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(e) => {
                debug!(error = %e, "Metadata is not valid JSON");
                return CachedOutcome::Invalid;
            }
        };

        match self.schema.validate(&document) {
            Ok(()) => CachedOutcome::Valid(bytes),
            Err(violation) => {
                debug!(violations = violation.violations.len(), "Metadata violates schema");
                CachedOutcome::Invalid
            }
        }
    }

    /// Returns statistics of the underlying cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl<K> fmt::Debug for MetadataValidator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataValidator")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Fetcher that replays a per-key script; the last scripted response repeats.
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<HashMap<u32, VecDeque<Result<Bytes, FetchError>>>>,
        calls: Mutex<HashMap<u32, usize>>,
        delay: Option<Duration>,
    }

    impl ScriptedFetcher {
        fn delayed(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn respond(&self, key: u32, response: Result<Bytes, FetchError>) -> &Self {
            self.script.lock().entry(key).or_default().push_back(response);
            self
        }

        fn calls(&self, key: u32) -> usize {
            self.calls.lock().get(&key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl MetadataFetcher<u32> for ScriptedFetcher {
        async fn fetch(&self, _ctx: &RequestContext, key: &u32) -> Result<Bytes, FetchError> {
            *self.calls.lock().entry(*key).or_default() += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            let mut script = self.script.lock();
            let queue = script.get_mut(key).ok_or(FetchError::NotFound)?;
            match queue.len() {
                0 => Err(FetchError::NotFound),
                1 => queue[0].clone(),
                _ => queue.pop_front().unwrap_or(Err(FetchError::NotFound)),
            }
        }
    }

    fn nft_schema() -> SchemaValidator {
        SchemaValidator::from_value(
            "irc27-test",
            &json!({
                "type": "object",
                "properties": {
                    "standard": { "const": "IRC27" },
                    "name": { "type": "string" }
                },
                "required": ["standard", "name"]
            }),
        )
        .unwrap()
    }

    fn validator(capacity: usize, fetcher: Arc<ScriptedFetcher>) -> MetadataValidator<u32> {
        MetadataValidator::new(
            "IRC27",
            nft_schema(),
            capacity,
            |raw: &str| {
                raw.parse::<u32>()
                    .map_err(|e| ParameterError::new("id", e.to_string()))
            },
            fetcher,
        )
        .unwrap()
    }

    fn valid_bytes() -> Bytes {
        Bytes::from_static(b"{\"standard\":\"IRC27\",\"name\":\"Shimmer OG\"}")
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond(1, Ok(valid_bytes()));
        let v = validator(8, fetcher.clone());
        let ctx = RequestContext::background();

        let first = v.resolve(&ctx, 1).await.unwrap();
        let second = v.resolve(&ctx, 1).await.unwrap();

        assert_eq!(first, CachedOutcome::Valid(valid_bytes()));
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(1), 1);
        assert_eq!(v.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_valid_payload_is_byte_exact() {
        let raw = Bytes::from_static(
            b"{ \"name\" :  \"Shimmer OG\",\n  \"standard\": \"IRC27\", \"extra\": 1.50 }",
        );
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond(1, Ok(raw.clone()));
        let v = validator(8, fetcher);

        let outcome = v.resolve(&RequestContext::background(), 1).await.unwrap();
        assert_eq!(outcome.payload().unwrap(), &raw);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond(5, Err(FetchError::NotFound));
        let v = validator(8, fetcher.clone());
        let ctx = RequestContext::background();

        for _ in 0..3 {
            assert_eq!(v.resolve(&ctx, 5).await, Ok(CachedOutcome::NotFound));
        }
        assert_eq!(fetcher.calls(5), 1);
    }

    #[tokio::test]
    async fn test_invalid_covers_parse_and_schema_failures() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher
            .respond(1, Ok(Bytes::from_static(b"not json at all")))
            .respond(2, Ok(Bytes::from_static(b"{\"standard\":\"IRC30\"}")))
            .respond(3, Err(FetchError::Invalid("no metadata feature".into())));
        let v = validator(8, fetcher.clone());
        let ctx = RequestContext::background();

        for key in 1..=3 {
            assert_eq!(v.resolve(&ctx, key).await, Ok(CachedOutcome::Invalid));
            assert_eq!(v.resolve(&ctx, key).await, Ok(CachedOutcome::Invalid));
            assert_eq!(fetcher.calls(key), 1);
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_cached() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher
            .respond(7, Err(FetchError::upstream("connection reset")))
            .respond(7, Ok(valid_bytes()));
        let v = validator(8, fetcher.clone());
        let ctx = RequestContext::background();

        let first = v.resolve(&ctx, 7).await;
        assert_eq!(
            first,
            Err(TransientError::Upstream("connection reset".into()))
        );

        let second = v.resolve(&ctx, 7).await.unwrap();
        assert!(matches!(second, CachedOutcome::Valid(_)));
        assert_eq!(fetcher.calls(7), 2);
    }

    #[tokio::test]
    async fn test_lru_eviction_refetches() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        for key in 1..=3 {
            fetcher.respond(key, Ok(valid_bytes()));
        }
        let v = validator(2, fetcher.clone());
        let ctx = RequestContext::background();

        v.resolve(&ctx, 1).await.unwrap();
        v.resolve(&ctx, 2).await.unwrap();
        v.resolve(&ctx, 3).await.unwrap();

        // 1 was least recently used and is gone; 3 is still cached.
        v.resolve(&ctx, 3).await.unwrap();
        v.resolve(&ctx, 1).await.unwrap();

        assert_eq!(fetcher.calls(1), 2);
        assert_eq!(fetcher.calls(3), 1);
        assert_eq!(v.cache_stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_hit_refreshes_recency() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        for key in 1..=3 {
            fetcher.respond(key, Ok(valid_bytes()));
        }
        let v = validator(2, fetcher.clone());
        let ctx = RequestContext::background();

        v.resolve(&ctx, 1).await.unwrap();
        v.resolve(&ctx, 2).await.unwrap();
        v.resolve(&ctx, 1).await.unwrap();
        v.resolve(&ctx, 3).await.unwrap();
        v.resolve(&ctx, 1).await.unwrap();

        assert_eq!(fetcher.calls(1), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves_converge() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        for key in 0..9u32 {
            let response = match key % 3 {
                0 => Ok(valid_bytes()),
                1 => Err(FetchError::NotFound),
                _ => Ok(Bytes::from_static(b"[1, 2")),
            };
            fetcher.respond(key, response);
        }
        let v = Arc::new(validator(64, fetcher.clone()));

        let tasks: Vec<_> = (0..200u32)
            .map(|i| {
                let v = v.clone();
                tokio::spawn(async move {
                    let key = i % 9;
                    (key, v.resolve(&RequestContext::background(), key).await)
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            let (key, outcome) = result.unwrap();
            let expected = match key % 3 {
                0 => CachedOutcome::Valid(valid_bytes()),
                1 => CachedOutcome::NotFound,
                _ => CachedOutcome::Invalid,
            };
            assert_eq!(outcome, Ok(expected));
        }

        assert_eq!(v.cache_stats().entries, 9);
        for key in 0..9u32 {
            assert!(fetcher.calls(key) >= 1);
        }
    }

    #[tokio::test]
    async fn test_cancellation_is_transient() {
        let fetcher = Arc::new(ScriptedFetcher::delayed(Duration::from_secs(30)));
        fetcher.respond(1, Ok(valid_bytes()));
        let v = Arc::new(validator(8, fetcher.clone()));

        let (ctx, handle) = RequestContext::background().cancellable();
        let task = {
            let v = v.clone();
            tokio::spawn(async move { v.resolve(&ctx, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        assert_eq!(task.await.unwrap(), Err(TransientError::Cancelled));
        assert_eq!(v.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_deadline_is_transient() {
        let fetcher = Arc::new(ScriptedFetcher::delayed(Duration::from_secs(30)));
        fetcher.respond(1, Ok(valid_bytes()));
        let v = validator(8, fetcher.clone());

        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        assert_eq!(
            v.resolve(&ctx, 1).await,
            Err(TransientError::DeadlineExceeded)
        );
        assert_eq!(v.cache_stats().entries, 0);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = MetadataValidator::<u32>::new(
            "IRC27",
            nft_schema(),
            0,
            |_: &str| Ok(0u32),
            Arc::new(ScriptedFetcher::default()),
        );
        assert!(matches!(result, Err(IrcError::ConfigError(_))));
    }

    #[test]
    fn test_parse_key_delegates() {
        let v = validator(1, Arc::new(ScriptedFetcher::default()));
        assert_eq!(v.parse_key("42"), Ok(42));
        let err = v.parse_key("forty-two").unwrap_err();
        assert_eq!(err.name, "id");
    }
}
