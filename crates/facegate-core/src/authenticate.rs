//! Matching pipeline: image → signature → nearest records → decision.

use crate::error::{PipelineError, ValidationError};
use crate::extract::SignatureExtractor;
use crate::matcher::{AcceptancePolicy, MatchResult};
use crate::store::SignatureStore;
use crate::types::ImageUpload;
use std::sync::Arc;

/// Candidates requested from the store when the caller does not say.
pub const DEFAULT_TOP_K: usize = 5;

pub struct MatchingPipeline {
    extractor: SignatureExtractor,
    store: Arc<SignatureStore>,
    policy: AcceptancePolicy,
}

impl MatchingPipeline {
    pub fn new(
        extractor: SignatureExtractor,
        store: Arc<SignatureStore>,
        policy: AcceptancePolicy,
    ) -> Self {
        Self {
            extractor,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &AcceptancePolicy {
        &self.policy
    }

    /// Authenticate `image` against enrolled identities.
    ///
    /// A store failure is a [`PipelineError::Search`], never a no-match.
    pub async fn authenticate(
        &self,
        image: Option<ImageUpload>,
        top_k: usize,
    ) -> Result<MatchResult, PipelineError> {
        let image = image.ok_or(ValidationError::MissingImage)?;
        if top_k == 0 {
            return Err(ValidationError::InvalidTopK.into());
        }

        let extraction = self.extractor.extract(&image).await?;
        let signature = extraction.signature.ok_or(PipelineError::NoFaceDetected)?;

        let candidates = self.store.nearest(&signature, top_k).await?;
        let result = self.policy.decide(&candidates);

        tracing::info!(
            top_k,
            candidates = candidates.len(),
            best_score = ?result.similarity(),
            threshold = self.policy.threshold(),
            matched = result.matched,
            "authenticate: decided"
        );

        Ok(result)
    }
}
