//! facegate-core — Face signature enrollment and matching.
//!
//! Pipelines are built from two injected capabilities: an
//! [`EmbeddingExtractor`] that turns images into face signatures, and a
//! [`VectorIndex`] that stores them and answers nearest-neighbour queries.

pub mod authenticate;
pub mod enroll;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod memory;
pub mod store;
pub mod types;

pub use authenticate::{MatchingPipeline, DEFAULT_TOP_K};
pub use enroll::{EnrollmentPipeline, EnrollmentResult};
pub use error::{PipelineError, ValidationError};
pub use extract::{EmbeddingExtractor, Extraction, ExtractionError, SignatureExtractor};
pub use matcher::{AcceptancePolicy, MatchResponse, MatchResult, MATCH_THRESHOLD};
pub use memory::MemoryIndex;
pub use store::{CollectionSpec, PersistenceResult, SignatureStore, StoreError, VectorIndex};
pub use types::{Identity, IdentityForm, ImageUpload, ScoredRecord, Signature, SignatureRecord, SIGNATURE_DIM};
