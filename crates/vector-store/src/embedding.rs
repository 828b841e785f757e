use crate::error::Result;
use async_trait::async_trait;

/// Turns text into a fixed-dimension embedding vector.
///
/// Implementations are pluggable by design: the engine never assumes a
/// specific model, only that calls with the same input and model id are
/// deterministic enough to be cached.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Stable identifier for the model backing this embedder, used as part
    /// of the vector store's on-disk path so different models never collide.
    fn model_id(&self) -> &str;

    /// Dimension of the vectors this backend produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batched form of `embed`. The default sequential implementation is
    /// correct for every backend; override it when the backend can batch
    /// a forward pass more cheaply than one call per text.
    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Deterministic, model-free embedder used by tests, offline CLI runs, and
/// as the default when no ONNX model is configured. Hashes overlapping
/// trigrams of the input into a fixed-size vector and L2-normalizes it, so
/// semantically identical text always maps to the same vector and cosine
/// similarity stays meaningful for exact/near-exact matches.
pub struct HashingEmbeddingBackend {
    dimension: usize,
}

impl HashingEmbeddingBackend {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbeddingBackend {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingBackend for HashingEmbeddingBackend {
    fn model_id(&self) -> &str {
        "hashing-v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dimension];
        let normalized: String = text.to_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        if tokens.is_empty() {
            return Ok(vector);
        }

        for window in tokens.windows(2).chain(tokens.windows(1)) {
            let gram = window.join(" ");
            let bucket = (fnv1a64(gram.as_bytes()) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 14_695_981_039_346_656_037;
    const PRIME: u64 = 1_099_511_628_211;
    let mut hash = OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let backend = HashingEmbeddingBackend::new(64);
        let a = backend.embed("fn parse_query(input: &str)").await.unwrap();
        let b = backend.embed("fn parse_query(input: &str)").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let backend = HashingEmbeddingBackend::new(64);
        let a = backend.embed("parse query input").await.unwrap();
        let b = backend.embed("render template output").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let backend = HashingEmbeddingBackend::new(32);
        let v = backend.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
