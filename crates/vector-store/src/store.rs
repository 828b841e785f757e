use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Payload carried alongside a vector, identifying the chunk it was derived
/// from without requiring the store to understand chunk internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorPayload {
    pub project_id: String,
    pub file_path: String,
    pub language: Option<String>,
    pub symbol_name: Option<String>,
    /// Line range the chunk spans, inclusive start / exclusive end. Named
    /// `line_range` rather than the byte offsets some vector stores use,
    /// since chunk boundaries here are tree-sitter line ranges.
    pub line_range: (usize, usize),
    pub content_hash: String,
}

/// A vector plus the payload it was upserted with, and, once returned from
/// `search`, the similarity score against the query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Filter applied to `VectorPayload` fields during `search`. Every `Some`
/// field must match exactly; `None` fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilter {
    pub project_id: Option<String>,
    pub file_path: Option<String>,
    pub language: Option<String>,
}

impl SearchFilter {
    fn matches(&self, payload: &VectorPayload) -> bool {
        if let Some(project_id) = &self.project_id {
            if &payload.project_id != project_id {
                return false;
            }
        }
        if let Some(file_path) = &self.file_path {
            if &payload.file_path != file_path {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if payload.language.as_deref() != Some(language.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Contract every vector backend (local JSON file, a real vector database)
/// implements. Collections are opaque, caller-named buckets of fixed-width
/// vectors; upserts are idempotent by id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str, dim: usize) -> Result<()>;
    /// The dimension of an existing collection, or `None` if it hasn't
    /// been created yet. Lets a caller detect a stored-vs-backend
    /// dimension mismatch before deciding to recreate the collection.
    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>>;
    async fn delete_collection(&self, name: &str) -> Result<()>;
    async fn upsert(&self, name: &str, entries: Vec<VectorEntry>) -> Result<()>;
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<VectorEntry>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Collection {
    dim: usize,
    entries: HashMap<String, VectorEntry>,
}

/// JSON-file-backed `VectorStore` doing brute-force cosine k-NN. Meant for
/// local/offline use and tests; not built for collections beyond a few
/// thousand entries.
pub struct LocalVectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl LocalVectorStore {
    /// Opens (without yet loading) a store rooted at `root`, creating the
    /// directory if needed. Each collection is persisted as
    /// `<root>/<name>.json`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        let mut collections = HashMap::new();
        let mut dir = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let bytes = tokio::fs::read(&path).await?;
            let collection: Collection = serde_json::from_slice(&bytes)?;
            collections.insert(name, collection);
        }
        Ok(Self {
            root,
            collections: RwLock::new(collections),
        })
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    async fn persist(&self, name: &str, collection: &Collection) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(collection)?;
        tokio::fs::write(self.collection_path(name), bytes).await?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn create_collection(&self, name: &str, dim: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get_mut(name) {
            Some(collection) if collection.dim == dim => {}
            Some(collection) => {
                // Existing entries were embedded at the old dimension; keeping
                // them around would poison every future cosine comparison.
                collection.dim = dim;
                collection.entries.clear();
            }
            None => {
                collections.insert(name.to_string(), Collection { dim, entries: HashMap::new() });
            }
        }
        let collection = collections.get(name).expect("just inserted or matched above");
        self.persist(name, collection).await
    }

    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.collections.read().await.get(name).map(|c| c.dim))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        let path = self.collection_path(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn upsert(&self, name: &str, entries: Vec<VectorEntry>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| VectorStoreError::ChunkNotFound(format!("collection {name} does not exist")))?;
        for entry in entries {
            if entry.vector.len() != collection.dim {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: collection.dim,
                    actual: entry.vector.len(),
                });
            }
            collection.entries.insert(entry.id.clone(), entry);
        }
        self.persist(name, collection).await
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<VectorEntry>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| VectorStoreError::ChunkNotFound(format!("collection {name} does not exist")))?;
        if collection.entries.is_empty() {
            return Ok(Vec::new());
        }
        if vector.len() != collection.dim {
            return Err(VectorStoreError::DimensionMismatch {
                expected: collection.dim,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<VectorEntry> = collection
            .entries
            .values()
            .filter(|entry| filter.map(|f| f.matches(&entry.payload)).unwrap_or(true))
            .map(|entry| {
                let mut entry = entry.clone();
                entry.score = Some(cosine_similarity(vector, &entry.vector));
                entry
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Recommended collection name for a project's chunks, matching the
/// `ctx_<project_id>` convention used by the workspace manager.
#[must_use]
pub fn collection_name(project_id: &str) -> String {
    format!("ctx_{project_id}")
}

/// Marker so `serde_json::Value` payload fields used elsewhere in the
/// pipeline (e.g. raw MCP request params) don't need a separate import.
pub type JsonValue = Value;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            vector,
            payload: VectorPayload {
                project_id: "proj-a".to_string(),
                file_path: "src/lib.rs".to_string(),
                language: Some("rust".to_string()),
                symbol_name: Some("foo".to_string()),
                line_range: (1, 10),
                content_hash: "deadbeef".to_string(),
            },
            score: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_search_returns_closest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 3).await.unwrap();
        store
            .upsert(
                "ctx_proj-a",
                vec![
                    entry("a", vec![1.0, 0.0, 0.0]),
                    entry("b", vec![0.0, 1.0, 0.0]),
                    entry("c", vec![0.9, 0.1, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search("ctx_proj-a", &[1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 2).await.unwrap();
        store
            .upsert("ctx_proj-a", vec![entry("a", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("ctx_proj-a", vec![entry("a", vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store
            .search("ctx_proj-a", &[0.0, 1.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vector, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn search_respects_payload_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 2).await.unwrap();
        let mut other = entry("b", vec![1.0, 0.0]);
        other.payload.project_id = "proj-b".to_string();
        store
            .upsert("ctx_proj-a", vec![entry("a", vec![1.0, 0.0]), other])
            .await
            .unwrap();

        let filter = SearchFilter {
            project_id: Some("proj-b".to_string()),
            ..Default::default()
        };
        let results = store
            .search("ctx_proj-a", &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn search_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 3).await.unwrap();
        store
            .upsert("ctx_proj-a", vec![entry("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let err = store
            .search("ctx_proj-a", &[1.0, 0.0], 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn delete_collection_removes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 2).await.unwrap();
        store.delete_collection("ctx_proj-a").await.unwrap();
        assert!(!dir.path().join("ctx_proj-a.json").exists());
    }

    #[tokio::test]
    async fn recreating_a_collection_at_a_new_dimension_clears_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 3).await.unwrap();
        store
            .upsert("ctx_proj-a", vec![entry("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        store.create_collection("ctx_proj-a", 2).await.unwrap();
        let results = store
            .search("ctx_proj-a", &[1.0, 0.0], 10, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn creating_a_collection_at_the_same_dimension_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("ctx_proj-a", 3).await.unwrap();
        store
            .upsert("ctx_proj-a", vec![entry("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        store.create_collection("ctx_proj-a", 3).await.unwrap();
        let results = store
            .search("ctx_proj-a", &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn collection_dimension_reports_none_until_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(store.collection_dimension("ctx_proj-a").await.unwrap(), None);
        store.create_collection("ctx_proj-a", 4).await.unwrap();
        assert_eq!(store.collection_dimension("ctx_proj-a").await.unwrap(), Some(4));
    }
}
