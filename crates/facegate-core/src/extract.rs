//! Embedding extraction adapter.
//!
//! Wraps an [`EmbeddingExtractor`] capability and reduces its output to at
//! most one signature per image: the first (primary) face wins.

use crate::types::{ImageUpload, Signature, SIGNATURE_DIM};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unsupported or corrupt image: {0}")]
    UnsupportedImage(String),
    #[error("temporary storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start extractor `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("extractor exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("malformed extractor output: {0}")]
    MalformedOutput(String),
    #[error("face signature has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability: turn an image into the encodings of every face found in it.
///
/// An empty vector means "no face found", which is an expected outcome.
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    async fn face_encodings(&self, image: &ImageUpload) -> Result<Vec<Signature>, ExtractionError>;
}

/// Outcome of extracting a single image.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Primary face signature, or `None` if no face was found.
    pub signature: Option<Signature>,
    /// Faces the extractor reported, including ignored secondary ones.
    pub faces_found: usize,
    /// Wall-clock time spent in the extractor.
    pub elapsed: Duration,
}

/// Shared extraction adapter used by both pipelines.
#[derive(Clone)]
pub struct SignatureExtractor {
    inner: Arc<dyn EmbeddingExtractor>,
    timeout: Duration,
}

impl SignatureExtractor {
    pub fn new(inner: Arc<dyn EmbeddingExtractor>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Extract the primary face signature from `image`.
    ///
    /// A primary signature that is not [`SIGNATURE_DIM`] long is rejected.
    pub async fn extract(&self, image: &ImageUpload) -> Result<Extraction, ExtractionError> {
        let started = Instant::now();
        let encodings = tokio::time::timeout(self.timeout, self.inner.face_encodings(image))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))??;
        let elapsed = started.elapsed();

        let faces_found = encodings.len();
        if faces_found > 1 {
            tracing::debug!(faces_found, "multiple faces found; using the first");
        }
        let signature = encodings.into_iter().next();
        if let Some(sig) = &signature {
            if sig.dim() != SIGNATURE_DIM {
                return Err(ExtractionError::DimensionMismatch {
                    expected: SIGNATURE_DIM,
                    actual: sig.dim(),
                });
            }
        }

        tracing::info!(
            faces_found,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes = image.data.len(),
            "extracted face signature"
        );

        Ok(Extraction {
            signature,
            faces_found,
            elapsed,
        })
    }
}
