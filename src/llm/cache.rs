// src/llm/cache.rs
// LRU memoization of inference answers, keyed by exact prompt text

use crate::llm::client::{InferenceClient, InferenceFailure};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default number of resident answers
pub const DEFAULT_CAPACITY: usize = 1000;

/// Storage behind [`CachedInference`]. Swap in a persistent store by
/// implementing this trait.
pub trait ResponseCache: Send + Sync {
    fn get(&self, prompt: &str) -> Option<String>;

    /// Insert unless the key is already resident, and return the resident
    /// value. The first value stored for a key wins.
    fn put(&self, prompt: &str, answer: String) -> String;

    fn contains(&self, prompt: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process bounded cache with least-recently-used eviction
pub struct LruResponseCache {
    cache: Mutex<LruCache<String, String>>,
}

impl LruResponseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, String>> {
        // Entries are plain strings, a poisoned lock still holds valid data
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LruResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResponseCache for LruResponseCache {
    fn get(&self, prompt: &str) -> Option<String> {
        self.lock().get(prompt).cloned()
    }

    fn put(&self, prompt: &str, answer: String) -> String {
        let mut cache = self.lock();
        if let Some(existing) = cache.get(prompt) {
            return existing.clone();
        }
        cache.put(prompt.to_string(), answer.clone());
        answer
    }

    fn contains(&self, prompt: &str) -> bool {
        self.lock().contains(prompt)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Hit/miss counters for run summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Inference client fronted by a response cache.
/// Only successful answers are stored; failures always reach the network
/// again on the next call.
pub struct CachedInference {
    client: InferenceClient,
    cache: Arc<dyn ResponseCache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedInference {
    pub fn new(client: InferenceClient, cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            client,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached inference with an LRU store of the given capacity
    pub fn with_capacity(client: InferenceClient, capacity: usize) -> Self {
        Self::new(client, Arc::new(LruResponseCache::new(capacity)))
    }

    pub async fn infer(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, InferenceFailure> {
        if let Some(answer) = self.cache.get(prompt) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(prompt_len = prompt.len(), "Response cache hit");
            return Ok(answer);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let answer = self.client.infer(prompt, cancel).await?;
        Ok(self.cache.put(prompt, answer))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }
}
