//! facegate-backends — Concrete collaborators for the facegate pipelines.
//!
//! [`CommandExtractor`] delegates face encoding to an external program;
//! [`PineconeIndex`] stores and queries signatures in a Pinecone index.

pub mod command;
pub mod pinecone;

pub use command::CommandExtractor;
pub use pinecone::{PineconeConfig, PineconeIndex};
