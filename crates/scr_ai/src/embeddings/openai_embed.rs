use scr_core::error::{AppError, INDEX_EMBEDDINGS_FAILED};
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::openai::{clip, ApiClient};

const MAX_INPUT_CHARS: usize = 12_000;
const BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: ApiClient,
}

impl OpenAiEmbedder {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.embed_batch(model, &[input])?
            .pop()
            .ok_or_else(|| AppError::new(INDEX_EMBEDDINGS_FAILED, "Embeddings response was empty"))
    }

    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(BATCH_SIZE) {
            let req = EmbeddingsRequest {
                model,
                input: batch.iter().map(|s| clip(s, MAX_INPUT_CHARS)).collect(),
            };
            let resp: EmbeddingsResponse =
                self.client.post_json("embeddings", &req, INDEX_EMBEDDINGS_FAILED)?;
            out.extend(order_by_index(resp.data, batch.len())?);
        }
        Ok(out)
    }
}

/// The API may return items out of order; place each one at its `index`.
fn order_by_index(items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>, AppError> {
    if items.len() != expected {
        return Err(
            AppError::new(INDEX_EMBEDDINGS_FAILED, "Embeddings response size mismatch")
                .with_details(format!("expected={expected}; got={}", items.len())),
        );
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in items {
        if item.embedding.is_empty() {
            return Err(AppError::new(
                INDEX_EMBEDDINGS_FAILED,
                "Embeddings response contained an empty vector",
            )
            .with_details(format!("index={}", item.index)));
        }
        let index = item.index;
        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(AppError::new(
                    INDEX_EMBEDDINGS_FAILED,
                    "Embeddings response had an invalid or duplicate index",
                )
                .with_details(format!("index={index}")))
            }
        }
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| AppError::new(INDEX_EMBEDDINGS_FAILED, "Embeddings response missing items"))
}
