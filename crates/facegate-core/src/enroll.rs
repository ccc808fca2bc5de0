//! Enrollment pipeline: image → signature → one new record in the store.

use crate::error::{PipelineError, ValidationError};
use crate::extract::SignatureExtractor;
use crate::store::{build_records, PersistenceResult, SignatureStore};
use crate::types::{Identity, IdentityForm, ImageUpload};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Body returned for a completed enrollment call.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentResult {
    #[serde(flatten)]
    pub identity: Identity,
    pub num_embeddings: usize,
    /// Total processing time, formatted as `"<n>ms"`.
    pub processing_time_milliseconds: String,
    pub storage_result: PersistenceResult,
}

pub struct EnrollmentPipeline {
    extractor: SignatureExtractor,
    store: Arc<SignatureStore>,
}

impl EnrollmentPipeline {
    pub fn new(extractor: SignatureExtractor, store: Arc<SignatureStore>) -> Self {
        Self { extractor, store }
    }

    /// Enroll `identity` from the most recently supplied image.
    ///
    /// Earlier images in `images` are ignored. Nothing is written unless a
    /// face was found; a failed write is reported in `storage_result`.
    pub async fn enroll(
        &self,
        identity: IdentityForm,
        mut images: Vec<ImageUpload>,
    ) -> Result<EnrollmentResult, PipelineError> {
        let started = Instant::now();

        let image = images.pop().ok_or(ValidationError::MissingImages)?;
        let identity = identity.complete().ok_or(ValidationError::MissingIdentity)?;

        if !images.is_empty() {
            tracing::debug!(ignored = images.len(), "enroll: using only the last image");
        }

        let extraction = self.extractor.extract(&image).await?;
        let Some(signature) = extraction.signature else {
            tracing::info!(
                first_name = %identity.first_name,
                last_name = %identity.last_name,
                "enroll: no face found"
            );
            return Err(PipelineError::NoFaceDetected);
        };

        let timestamp = chrono::Utc::now().timestamp();
        let records = build_records(&identity, vec![signature], timestamp);
        let num_embeddings = records.len();

        let mut storage_result = self.store.persist(&records).await;
        if storage_result.success {
            storage_result.message = Some(format!(
                "Stored {} embeddings for {} {}",
                storage_result.vectors_stored, identity.first_name, identity.last_name
            ));
        }

        let elapsed = started.elapsed();
        tracing::info!(
            first_name = %identity.first_name,
            last_name = %identity.last_name,
            stored = storage_result.vectors_stored,
            success = storage_result.success,
            elapsed_ms = elapsed.as_millis() as u64,
            "enroll: finished"
        );

        Ok(EnrollmentResult {
            identity,
            num_embeddings,
            processing_time_milliseconds: format!("{}ms", elapsed.as_millis()),
            storage_result,
        })
    }
}
