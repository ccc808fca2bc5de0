use anyhow::Result;
use facegate_backends::{CommandExtractor, PineconeIndex};
use facegate_core::{
    AcceptancePolicy, CollectionSpec, EnrollmentPipeline, MatchingPipeline, MemoryIndex,
    SignatureExtractor, SignatureStore, VectorIndex,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod routes;

use config::{Config, StoreBackend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("facegated starting");

    let config = Config::from_env()?;

    let index: Arc<dyn VectorIndex> = match config.store {
        StoreBackend::Pinecone => Arc::new(PineconeIndex::new(config.pinecone()?)?),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory signature store; enrollments are lost on restart");
            Arc::new(MemoryIndex::new())
        }
    };
    let store =
        Arc::new(SignatureStore::connect(index, CollectionSpec::named(&config.index_name)).await);

    let mut command = CommandExtractor::new(&config.extractor_program)
        .with_args(config.extractor_args.clone());
    if let Some(dir) = &config.temp_dir {
        command = command.with_temp_root(dir);
    }
    tracing::info!(
        program = %config.extractor_program,
        timeout_secs = config.extract_timeout_secs,
        "embedding extractor configured"
    );
    let extractor = SignatureExtractor::new(Arc::new(command), config.extract_timeout());

    let state = routes::AppState {
        enrollment: Arc::new(EnrollmentPipeline::new(extractor.clone(), store.clone())),
        matching: Arc::new(MatchingPipeline::new(
            extractor,
            store.clone(),
            AcceptancePolicy::with_threshold(config.match_threshold),
        )),
        default_top_k: config.default_top_k,
        store: store.describe(),
    };

    let app = routes::router(state, config.max_upload_bytes).layer(routes::cors(&config.cors_origins)?);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        store = %store.describe(),
        threshold = config.match_threshold,
        "facegated ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facegated shutting down");

    Ok(())
}
