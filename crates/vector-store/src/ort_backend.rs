//! ONNX Runtime embedding backend, enabled by the `local-embeddings` feature.
//! Loads a sentence-transformer-style model (tokenizer.json + model.onnx)
//! from disk and produces mean-pooled, L2-normalized sentence embeddings.

use crate::embedding::EmbeddingBackend;
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value as OrtValue;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

pub struct OrtEmbeddingBackend {
    model_id: String,
    dimension: usize,
    tokenizer: Tokenizer,
    session: Mutex<Session>,
}

impl OrtEmbeddingBackend {
    /// Loads the tokenizer and ONNX model from `model_dir`, which must
    /// contain `tokenizer.json` and `model.onnx`. `dimension` is the
    /// model's known output width; it is not inferred from the graph.
    pub fn load(model_id: impl Into<String>, model_dir: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| VectorStoreError::EmbeddingError(format!("failed to load tokenizer: {e}")))?;
        let session = Session::builder()
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?
            .commit_from_file(model_dir.join("model.onnx"))
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;

        Ok(Self {
            model_id: model_id.into(),
            dimension,
            tokenizer,
            session: Mutex::new(session),
        })
    }

    fn run(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("tokenization failed: {e}")))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();
        let seq_len = ids.len();

        let input_ids = Array2::from_shape_vec((1, seq_len), ids)
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;
        let attention_mask = Array2::from_shape_vec((1, seq_len), mask.clone())
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;

        let input_ids_value = OrtValue::from_array(input_ids)
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;
        let attention_value = OrtValue::from_array(attention_mask)
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| VectorStoreError::EmbeddingError("embedding session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_value,
                "attention_mask" => attention_value,
            ])
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_raw_tensor::<f32>()
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;
        let hidden = *shape
            .last()
            .ok_or_else(|| VectorStoreError::EmbeddingError("model output has no hidden dimension".to_string()))?
            as usize;

        let token_embeddings = Array2::from_shape_vec((seq_len, hidden), data.to_vec())
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;

        let mut pooled = vec![0f32; hidden];
        let mut valid_tokens = 0f32;
        for (row, &m) in token_embeddings.axis_iter(Axis(0)).zip(mask.iter()) {
            if m == 0 {
                continue;
            }
            valid_tokens += 1.0;
            for (acc, v) in pooled.iter_mut().zip(row.iter()) {
                *acc += v;
            }
        }
        if valid_tokens > 0.0 {
            for v in &mut pooled {
                *v /= valid_tokens;
            }
        }

        let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut pooled {
                *v /= norm;
            }
        }

        Ok(pooled)
    }
}

#[async_trait]
impl EmbeddingBackend for OrtEmbeddingBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(text)
    }
}
