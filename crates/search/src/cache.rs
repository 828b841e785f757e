//! Three-tier Cache Layer (spec §4.9): L1 in-process LRU, L2 a shared
//! key-value store (an injected async collaborator), L3 persisted
//! artifacts in the Relational Store for template-matched queries.

use crate::error::Result;
use crate::rank::RankedResult;
use async_trait::async_trait;
use cortex_relational_store::{RelationalStore, Table};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_L1_CAPACITY: usize = 512;
const MARKOV_HISTORY_CAP: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPayload {
    pub results: Vec<RankedResult>,
    /// File paths referenced by `results`, checked against invalidation
    /// notifications.
    pub file_paths: Vec<String>,
    pub cached_at_unix_ms: i64,
}

/// L2 collaborator: a shared, TTL-bounded key-value store external to this
/// process (analogous to `VectorStore`/`RelationalStore`). An in-process
/// stand-in is provided below for single-process deployments.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedPayload>;
    async fn put(&self, key: &str, value: CachedPayload, ttl_ms: i64);
    async fn invalidate_paths(&self, paths: &[String]);
}

struct Entry {
    payload: CachedPayload,
    expires_at_unix_ms: i64,
}

/// `tokio::sync::Mutex<HashMap>`-backed `RemoteCache` for when there is no
/// separate cache process to talk to.
pub struct InProcessRemoteCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InProcessRemoteCache {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

impl Default for InProcessRemoteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCache for InProcessRemoteCache {
    async fn get(&self, key: &str) -> Option<CachedPayload> {
        let entries = self.entries.lock().await;
        entries.get(key).map(|e| e.payload.clone())
    }

    async fn put(&self, key: &str, value: CachedPayload, ttl_ms: i64) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry { payload: value, expires_at_unix_ms: now_unix_ms() + ttl_ms },
        );
    }

    async fn invalidate_paths(&self, paths: &[String]) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| !e.payload.file_paths.iter().any(|p| paths.contains(p)));
    }
}

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Stable fingerprint over the fields that determine a cacheable query
/// result: normalized query text, scope, the subset of user context the
/// ranker actually consulted, and k.
#[must_use]
pub fn fingerprint(normalized_query: &str, scope: &str, user_context_digest: &str, k: usize) -> String {
    let input = format!("{normalized_query}\u{1}{scope}\u{1}{user_context_digest}\u{1}{k}");
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

pub struct CacheLayer {
    l1: Mutex<LruCache<String, CachedPayload>>,
    l2: Arc<dyn RemoteCache>,
    l3: Arc<dyn RelationalStore>,
    prefetcher: Mutex<Prefetcher>,
}

impl CacheLayer {
    pub fn new(l2: Arc<dyn RemoteCache>, l3: Arc<dyn RelationalStore>) -> Self {
        Self {
            l1: Mutex::new(LruCache::new(NonZeroUsize::new(DEFAULT_L1_CAPACITY).unwrap())),
            l2,
            l3,
            prefetcher: Mutex::new(Prefetcher::new()),
        }
    }

    /// L1 -> L2 -> L3, in that order; `None` on a full miss.
    pub async fn get(&self, key: &str) -> Result<Option<CachedPayload>> {
        if let Some(hit) = self.l1.lock().await.get(key).cloned() {
            return Ok(Some(hit));
        }
        if let Some(hit) = self.l2.get(key).await {
            self.l1.lock().await.put(key.to_string(), hit.clone());
            return Ok(Some(hit));
        }
        if let Some(value) = self.l3.get(Table::CachedResults, key).await? {
            let payload: CachedPayload = serde_json::from_value(value)?;
            self.l1.lock().await.put(key.to_string(), payload.clone());
            return Ok(Some(payload));
        }
        Ok(None)
    }

    /// Writes L1 unconditionally, L2 with `ttl_ms`, and L3 only when
    /// `is_template` (spec §4.9's write-on-miss policy).
    pub async fn put(&self, key: &str, payload: CachedPayload, ttl_ms: i64, is_template: bool) -> Result<()> {
        self.l1.lock().await.put(key.to_string(), payload.clone());
        self.l2.put(key, payload.clone(), ttl_ms).await;
        if is_template {
            let mut value = serde_json::to_value(&payload)?;
            let expiry_unix_s = (now_unix_ms() + ttl_ms) / 1000;
            if let serde_json::Value::Object(map) = &mut value {
                map.insert("expiry".to_string(), serde_json::Value::from(expiry_unix_s));
            }
            self.l3.put(Table::CachedResults, key, value).await?;
        }
        Ok(())
    }

    /// Drops L1/L2 entries referencing any of `file_paths`. L3 entries
    /// survive and are left for an async refresh job to pick up.
    pub async fn invalidate(&self, file_paths: &[String]) {
        let mut l1 = self.l1.lock().await;
        let stale: Vec<String> = l1
            .iter()
            .filter(|(_, payload)| payload.file_paths.iter().any(|p| file_paths.contains(p)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            l1.pop(&key);
        }
        drop(l1);
        self.l2.invalidate_paths(file_paths).await;
    }

    pub async fn record_query(&self, user_id: &str, normalized_query: &str) {
        self.prefetcher.lock().await.observe(user_id, normalized_query);
    }

    /// Top-K canonical successors this user has historically issued after
    /// `normalized_query`, for the caller to warm opportunistically.
    pub async fn predicted_next(&self, user_id: &str, normalized_query: &str, k: usize) -> Vec<String> {
        self.prefetcher.lock().await.predict(user_id, normalized_query, k)
    }
}

/// First-order Markov model over per-user query sequences (spec §4.9's
/// prefetcher). Bounded history, lowest priority: a caller is free to
/// ignore `predicted_next`'s output under load.
struct Prefetcher {
    history: HashMap<String, VecDeque<String>>,
    transitions: HashMap<(String, String), HashMap<String, u32>>,
}

impl Prefetcher {
    fn new() -> Self {
        Self { history: HashMap::new(), transitions: HashMap::new() }
    }

    fn observe(&mut self, user_id: &str, query: &str) {
        let history = self.history.entry(user_id.to_string()).or_default();
        if let Some(prev) = history.back() {
            let key = (user_id.to_string(), prev.clone());
            *self.transitions.entry(key).or_default().entry(query.to_string()).or_insert(0) += 1;
        }
        history.push_back(query.to_string());
        while history.len() > MARKOV_HISTORY_CAP {
            history.pop_front();
        }
    }

    fn predict(&self, user_id: &str, query: &str, k: usize) -> Vec<String> {
        let key = (user_id.to_string(), query.to_string());
        let Some(successors) = self.transitions.get(&key) else { return Vec::new() };
        let mut ranked: Vec<(&String, &u32)> = successors.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1));
        ranked.into_iter().take(k).map(|(q, _)| q.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_relational_store::SqliteRelationalStore;

    fn sample_payload(file: &str) -> CachedPayload {
        CachedPayload { results: Vec::new(), file_paths: vec![file.to_string()], cached_at_unix_ms: 0 }
    }

    #[tokio::test]
    async fn l1_hit_avoids_l2_and_l3() {
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().await.unwrap());
        let cache = CacheLayer::new(Arc::new(InProcessRemoteCache::new()), relational);
        cache.put("k1", sample_payload("a.rs"), 60_000, false).await.unwrap();
        let hit = cache.get("k1").await.unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn invalidation_drops_entries_referencing_the_path() {
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().await.unwrap());
        let cache = CacheLayer::new(Arc::new(InProcessRemoteCache::new()), relational);
        cache.put("k1", sample_payload("a.rs"), 60_000, false).await.unwrap();
        cache.invalidate(&["a.rs".to_string()]).await;
        assert!(cache.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn template_writes_survive_l1_l2_invalidation() {
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().await.unwrap());
        let cache = CacheLayer::new(Arc::new(InProcessRemoteCache::new()), relational);
        cache.put("k1", sample_payload("a.rs"), 60_000, true).await.unwrap();
        cache.invalidate(&["a.rs".to_string()]).await;
        assert!(cache.get("k1").await.unwrap().is_some());
    }

    #[test]
    fn prefetcher_predicts_the_most_common_successor() {
        let mut prefetcher = Prefetcher::new();
        prefetcher.observe("u1", "find auth");
        prefetcher.observe("u1", "find auth handler");
        prefetcher.observe("u1", "find auth");
        prefetcher.observe("u1", "find auth handler");
        prefetcher.observe("u1", "find auth");
        prefetcher.observe("u1", "show config");
        let predicted = prefetcher.predict("u1", "find auth", 1);
        assert_eq!(predicted, vec!["find auth handler".to_string()]);
    }

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let a = fingerprint("find auth", "project", "digest1", 10);
        let b = fingerprint("find auth", "project", "digest1", 10);
        assert_eq!(a, b);
    }
}
