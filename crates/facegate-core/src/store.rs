//! Signature Store adapter.
//!
//! Sits between the pipelines and a [`VectorIndex`] backend: validates
//! dimensionality before anything is written, splits upserts into bounded
//! batches, and builds collision-free record identifiers.

use crate::types::{Identity, RecordMetadata, ScoredRecord, Signature, SignatureRecord, SIGNATURE_DIM};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Maximum number of records sent in one upsert call.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Default collection name in the backing store.
pub const DEFAULT_COLLECTION: &str = "face-embeddings";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store request timed out")]
    Timeout,
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed store response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("record {id} has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },
    #[error("batch {batch} failed: {source}")]
    Batch {
        batch: usize,
        #[source]
        source: StoreError,
    },
}

/// Distance metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
}

/// Shape of the backing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

impl CollectionSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: SIGNATURE_DIM,
            metric: Metric::Cosine,
        }
    }
}

impl Default for CollectionSpec {
    fn default() -> Self {
        Self::named(DEFAULT_COLLECTION)
    }
}

/// Capability: an external vector database.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist. Must be idempotent.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError>;

    /// Write one batch, returning how many records the store confirmed.
    async fn upsert(&self, records: &[SignatureRecord]) -> Result<usize, StoreError>;

    /// Up to `top_k` records nearest to `vector`, best first.
    async fn query(&self, vector: &Signature, top_k: usize) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Short human-readable backend description.
    fn describe(&self) -> String;
}

/// Outcome of a persistence attempt. Partial success is reported with
/// explicit counts, never rounded to all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistenceResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Records the store confirmed.
    pub vectors_stored: usize,
    /// Records in failed or never-attempted batches.
    pub vectors_unconfirmed: usize,
    pub batches_completed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Long-lived handle to the signature collection, shared across requests.
pub struct SignatureStore {
    index: Arc<dyn VectorIndex>,
    collection: CollectionSpec,
}

impl SignatureStore {
    /// Bind to `collection`, creating it if needed.
    ///
    /// Creation failures are logged, not returned: the collection may
    /// already exist and be usable.
    pub async fn connect(index: Arc<dyn VectorIndex>, collection: CollectionSpec) -> Self {
        match index.ensure_collection(&collection).await {
            Ok(()) => tracing::info!(
                collection = %collection.name,
                dimension = collection.dimension,
                backend = %index.describe(),
                "signature collection ready"
            ),
            Err(e) => tracing::error!(
                collection = %collection.name,
                error = %e,
                "could not ensure signature collection exists"
            ),
        }
        Self { index, collection }
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    pub fn describe(&self) -> String {
        self.index.describe()
    }

    /// Persist `records` in batches of [`UPSERT_BATCH_SIZE`].
    ///
    /// Every record is checked against the collection dimension first; a
    /// single mismatch rejects the whole call before any write. The first
    /// failing batch aborts the remaining ones.
    pub async fn persist(&self, records: &[SignatureRecord]) -> PersistenceResult {
        let total = records.len();

        if let Some(bad) = records
            .iter()
            .find(|r| r.values.len() != self.collection.dimension)
        {
            let err = PersistenceError::DimensionMismatch {
                id: bad.id.clone(),
                expected: self.collection.dimension,
                actual: bad.values.len(),
            };
            tracing::warn!(error = %err, "rejected records before persistence");
            return PersistenceResult {
                success: false,
                message: None,
                vectors_stored: 0,
                vectors_unconfirmed: total,
                batches_completed: 0,
                error: Some(err.to_string()),
            };
        }

        let mut stored = 0usize;
        let mut batches_completed = 0usize;

        for (i, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            match self.index.upsert(batch).await {
                Ok(confirmed) => {
                    stored += confirmed;
                    batches_completed += 1;
                    tracing::debug!(batch = i + 1, size = batch.len(), confirmed, "upserted batch");
                }
                Err(source) => {
                    let err = PersistenceError::Batch { batch: i + 1, source };
                    tracing::error!(
                        error = %err,
                        stored,
                        unconfirmed = total - stored,
                        "aborting remaining batches"
                    );
                    return PersistenceResult {
                        success: false,
                        message: None,
                        vectors_stored: stored,
                        vectors_unconfirmed: total - stored,
                        batches_completed,
                        error: Some(err.to_string()),
                    };
                }
            }
        }

        let unconfirmed = total.saturating_sub(stored);
        if unconfirmed > 0 {
            tracing::warn!(stored, unconfirmed, "store confirmed fewer records than sent");
            return PersistenceResult {
                success: false,
                message: None,
                vectors_stored: stored,
                vectors_unconfirmed: unconfirmed,
                batches_completed,
                error: Some(format!("store confirmed {stored} of {total} records")),
            };
        }

        tracing::info!(stored, batches = batches_completed, "persisted signatures");
        PersistenceResult {
            success: true,
            message: Some(format!("Stored {stored} embeddings")),
            vectors_stored: stored,
            vectors_unconfirmed: 0,
            batches_completed,
            error: None,
        }
    }

    /// The `top_k` nearest records to `signature`, in the store's ranking.
    pub async fn nearest(
        &self,
        signature: &Signature,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let candidates = self.index.query(signature, top_k).await?;
        tracing::debug!(top_k, returned = candidates.len(), "queried nearest signatures");
        Ok(candidates)
    }
}

/// Identifier for a new record: `{first}-{last}-{uuid}`, lower-cased, with
/// spaces replaced by hyphens. The random suffix keeps repeated enrollments
/// of the same name apart without a read-before-write.
pub fn record_id(identity: &Identity) -> String {
    format!(
        "{}-{}-{}",
        slug(&identity.first_name),
        slug(&identity.last_name),
        uuid::Uuid::new_v4()
    )
}

fn slug(s: &str) -> String {
    s.to_lowercase().replace(' ', "-")
}

/// Build the records for one enrollment call, numbering signatures from 1.
pub fn build_records(
    identity: &Identity,
    signatures: Vec<Signature>,
    timestamp: i64,
) -> Vec<SignatureRecord> {
    signatures
        .into_iter()
        .enumerate()
        .map(|(i, signature)| SignatureRecord {
            id: record_id(identity),
            values: signature.values,
            metadata: RecordMetadata {
                first_name: identity.first_name.clone(),
                last_name: identity.last_name.clone(),
                age: identity.age.clone(),
                timestamp,
                embedding_number: i as i64 + 1,
            },
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fakes::RecordingIndex;
    use super::*;

    fn identity() -> Identity {
        Identity {
            first_name: "Ada Mary".into(),
            last_name: "Lovelace".into(),
            age: "30".into(),
        }
    }

    fn records(n: usize, dim: usize) -> Vec<SignatureRecord> {
        let sigs = (0..n).map(|_| Signature::new(vec![0.5; dim])).collect();
        build_records(&identity(), sigs, 1_700_000_000)
    }

    #[test]
    fn test_record_id_format() {
        let id = record_id(&identity());
        assert!(id.starts_with("ada-mary-lovelace-"), "got {id}");
        let suffix = &id["ada-mary-lovelace-".len()..];
        assert!(uuid::Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn test_record_ids_unique_for_same_name() {
        assert_ne!(record_id(&identity()), record_id(&identity()));
    }

    #[test]
    fn test_build_records_numbers_from_one() {
        let recs = records(3, SIGNATURE_DIM);
        let numbers: Vec<_> = recs.iter().map(|r| r.metadata.embedding_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(recs.iter().all(|r| r.metadata.timestamp == 1_700_000_000));
    }

    #[tokio::test]
    async fn test_connect_survives_ensure_failure() {
        let index = Arc::new(RecordingIndex {
            fail_ensure: true,
            ..Default::default()
        });
        let store = SignatureStore::connect(index, CollectionSpec::default()).await;
        assert_eq!(store.collection().dimension, SIGNATURE_DIM);
        assert_eq!(store.collection().name, DEFAULT_COLLECTION);
    }

    #[tokio::test]
    async fn test_persist_batches_of_one_hundred() {
        let index = Arc::new(RecordingIndex::default());
        let store = SignatureStore::connect(index.clone(), CollectionSpec::default()).await;

        let result = store.persist(&records(250, SIGNATURE_DIM)).await;

        assert_eq!(index.batch_sizes(), vec![100, 100, 50]);
        assert!(result.success);
        assert_eq!(result.vectors_stored, 250);
        assert_eq!(result.vectors_unconfirmed, 0);
        assert_eq!(result.batches_completed, 3);
    }

    #[tokio::test]
    async fn test_persist_failure_aborts_remaining_batches() {
        let index = Arc::new(RecordingIndex {
            fail_on_call: Some(2),
            ..Default::default()
        });
        let store = SignatureStore::connect(index.clone(), CollectionSpec::default()).await;

        let result = store.persist(&records(250, SIGNATURE_DIM)).await;

        assert_eq!(index.batch_sizes(), vec![100, 100]);
        assert!(!result.success);
        assert_eq!(result.vectors_stored, 100);
        assert_eq!(result.vectors_unconfirmed, 150);
        assert_eq!(result.batches_completed, 1);
        assert!(result.error.unwrap().contains("batch 2"));
    }

    #[tokio::test]
    async fn test_persist_short_confirmation_is_not_success() {
        let index = Arc::new(RecordingIndex {
            short_confirm: 1,
            ..Default::default()
        });
        let store = SignatureStore::connect(index.clone(), CollectionSpec::default()).await;

        let result = store.persist(&records(250, SIGNATURE_DIM)).await;

        assert_eq!(index.batch_sizes(), vec![100, 100, 50]);
        assert!(!result.success);
        assert!(result.message.is_none());
        assert_eq!(result.vectors_stored, 247);
        assert_eq!(result.vectors_unconfirmed, 3);
        assert_eq!(result.error.as_deref(), Some("store confirmed 247 of 250 records"));
    }

    #[tokio::test]
    async fn test_persist_rejects_wrong_dimension_before_writing() {
        let index = Arc::new(RecordingIndex::default());
        let store = SignatureStore::connect(index.clone(), CollectionSpec::default()).await;

        let mut recs = records(3, SIGNATURE_DIM);
        recs.extend(records(1, 64));
        let result = store.persist(&recs).await;

        assert!(index.batch_sizes().is_empty());
        assert!(!result.success);
        assert_eq!(result.vectors_stored, 0);
        assert_eq!(result.vectors_unconfirmed, 4);
        assert!(result.error.unwrap().contains("64 dimensions"));
    }

    #[tokio::test]
    async fn test_persist_empty_is_a_noop() {
        let index = Arc::new(RecordingIndex::default());
        let store = SignatureStore::connect(index.clone(), CollectionSpec::default()).await;

        let result = store.persist(&[]).await;
        assert!(result.success);
        assert_eq!(result.vectors_stored, 0);
        assert!(index.batch_sizes().is_empty());
    }
}
