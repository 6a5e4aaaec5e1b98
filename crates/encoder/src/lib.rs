//! Encoder contract.
//!
//! The broker core (ventilator/sink/worker) never interprets embeddings;
//! it only moves [`Tensor`]s around. This crate defines the seam an actual
//! model implementation plugs into, plus a dependency-free reference
//! encoder used by tests and as a smoke-test default.

use serde_json::Value;
use tensorbroker_protocol::{DType, PoolingStrategy, Tensor};

/// Converts a batch of JSON items into a single stacked [`Tensor`].
///
/// `is_tokenized` distinguishes a batch of raw strings from a batch that
/// arrived pre-tokenized (list-of-lists of token ids/strings) — the two
/// inputs take different preprocessing paths before encoding but both
/// produce one row per input item.
pub trait Encoder: Send + Sync {
    fn encode(&self, items: &[Value], is_tokenized: bool) -> anyhow::Result<Tensor>;

    fn pooling_strategy(&self) -> PoolingStrategy;
}

/// Reference encoder with no model behind it: each row is the item's index
/// repeated across a fixed width. Exists so the broker's plumbing can be
/// exercised end-to-end without a real embedding model wired in.
pub struct IdentityEncoder {
    pub width: usize,
    pub pooling_strategy: PoolingStrategy,
}

impl IdentityEncoder {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            pooling_strategy: PoolingStrategy::ReduceMean,
        }
    }
}

impl Default for IdentityEncoder {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Encoder for IdentityEncoder {
    fn encode(&self, items: &[Value], _is_tokenized: bool) -> anyhow::Result<Tensor> {
        let rows = items.len();
        let mut bytes = Vec::with_capacity(rows * self.width * 4);
        for idx in 0..rows {
            for _ in 0..self.width {
                bytes.extend_from_slice(&(idx as f32).to_le_bytes());
            }
        }
        let tensor = Tensor::new(DType::Float32, vec![rows as u64, self.width as u64], bytes)?;
        Ok(tensor)
    }

    fn pooling_strategy(&self) -> PoolingStrategy {
        self.pooling_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_encoder_produces_one_row_per_item() {
        let enc = IdentityEncoder::new(3);
        let items = vec![json!("hello"), json!("world")];
        let tensor = enc.encode(&items, false).unwrap();
        assert_eq!(tensor.header.shape, vec![2, 3]);
        assert_eq!(tensor.rows(), 2);
    }

    #[test]
    fn identity_encoder_handles_empty_batch() {
        let enc = IdentityEncoder::default();
        let tensor = enc.encode(&[], false).unwrap();
        assert_eq!(tensor.rows(), 0);
    }

    #[test]
    fn identity_encoder_rows_track_index() {
        let enc = IdentityEncoder::new(1);
        let items = vec![json!("a"), json!("b"), json!("c")];
        let tensor = enc.encode(&items, true).unwrap();
        let floats: Vec<f32> = tensor
            .bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats, vec![0.0, 1.0, 2.0]);
    }
}
