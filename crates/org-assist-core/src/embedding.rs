//! Embedding trait, batching, and vector helpers.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! the order-preserving batching helper [`embed_many`], and pure helpers for
//! vector serialization and similarity.
//!
//! Concrete providers (OpenAI) live in the `org-assist` app crate.

use anyhow::{bail, Result};
use async_trait::async_trait;

/// Default number of texts sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Text → vector service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed one batch; the output has one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        match out.pop() {
            Some(v) if out.is_empty() => Ok(v),
            _ => bail!("embedding provider returned an unexpected number of vectors"),
        }
    }
}

/// Embed `texts` in fixed-size batches, preserving input order.
///
/// Any failing batch fails the whole call; partial results are discarded so
/// nothing half-embedded reaches storage.
pub async fn embed_many(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let out = embedder.embed_batch(batch).await?;
        if out.len() != batch.len() {
            bail!(
                "embedding batch returned {} vectors for {} inputs",
                out.len(),
                batch.len()
            );
        }
        vectors.extend(out);
    }

    Ok(vectors)
}

/// Little-endian `f32` bytes, the layout of the `embedding` BLOB columns.
///
/// ```rust
/// use org_assist_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let stored = vec_to_blob(&[0.5, -1.0]);
/// assert_eq!(stored.len(), 8);
/// assert_eq!(blob_to_vec(&stored), vec![0.5, -1.0]);
/// ```
pub fn vec_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]. Trailing bytes that do not form a full
/// `f32` are ignored.
pub fn blob_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .filter_map(|word| word.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine of the angle between `a` and `b`; `0.0` when either is empty,
/// zero-length, or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, aa, bb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, aa, bb), (x, y)| {
            (dot + x * y, aa + x * x, bb + y * y)
        });
    let magnitude = (aa * bb).sqrt();
    if magnitude < f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}
