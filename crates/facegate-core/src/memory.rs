//! In-process [`VectorIndex`] for tests and local development.
//!
//! Brute-force cosine ranking over every stored record. Not meant for
//! production galleries; the real index lives in the external store.

use crate::store::{CollectionSpec, StoreError, VectorIndex};
use crate::types::{ScoredRecord, Signature, SignatureRecord};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<Vec<SignatureRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of everything stored, in insertion order.
    pub async fn records(&self) -> Vec<SignatureRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, _spec: &CollectionSpec) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, records: &[SignatureRecord]) -> Result<usize, StoreError> {
        let mut stored = self.records.write().await;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(records.len())
    }

    async fn query(&self, vector: &Signature, top_k: usize) -> Result<Vec<ScoredRecord>, StoreError> {
        let stored = self.records.read().await;
        let mut scored: Vec<ScoredRecord> = stored
            .iter()
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                score: vector.similarity(&Signature::new(r.values.clone())) as f64,
                metadata: r.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::build_records;
    use crate::types::Identity;

    fn identity(first: &str) -> Identity {
        Identity {
            first_name: first.into(),
            last_name: "Test".into(),
            age: "40".into(),
        }
    }

    #[tokio::test]
    async fn test_query_ranks_best_first() {
        let index = MemoryIndex::new();
        let mut records = build_records(&identity("decoy"), vec![Signature::new(vec![0.0, 1.0])], 1);
        records.extend(build_records(&identity("target"), vec![Signature::new(vec![1.0, 0.1])], 2));
        index.upsert(&records).await.unwrap();

        let results = index.query(&Signature::new(vec![1.0, 0.0]), 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.first_name, "target");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_query_truncates_to_top_k() {
        let index = MemoryIndex::new();
        let sigs = (0..4).map(|i| Signature::new(vec![1.0, i as f32])).collect();
        index.upsert(&build_records(&identity("a"), sigs, 1)).await.unwrap();

        let results = index.query(&Signature::new(vec![1.0, 0.0]), 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let index = MemoryIndex::new();
        let mut records = build_records(&identity("a"), vec![Signature::new(vec![1.0, 0.0])], 1);
        index.upsert(&records).await.unwrap();
        records[0].values = vec![0.0, 1.0];
        index.upsert(&records).await.unwrap();

        assert_eq!(index.len().await, 1);
        assert_eq!(index.records().await[0].values, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_query_of_other_length_scores_zero() {
        let index = MemoryIndex::new();
        let mut values = vec![0.0; 128];
        values[0] = 1.0;
        values[100] = 1.0;
        index
            .upsert(&build_records(&identity("a"), vec![Signature::new(values)], 1))
            .await
            .unwrap();

        let results = index.query(&Signature::new(vec![1.0, 0.0, 0.0]), 1).await.unwrap();
        assert_eq!(results[0].score, 0.0);
    }
}
