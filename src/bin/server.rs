//! Civic data proxy HTTP server.
//!
//! # Environment Variables
//!
//! - `HOST`: bind host (default: 0.0.0.0)
//! - `PORT`: bind port (default: 3000)
//! - `CANDIDATES_CSV`: path to the TSE candidates CSV
//! - `UPSTREAM_TIMEOUT_SECS`: per-request upstream timeout (default: 12)
//! - `CACHE_MAX_ENTRIES`: optional bound on cached documents
//! - `RUST_LOG`: log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use civic_data_proxy::candidates::{spawn_load, CandidateStore};
use civic_data_proxy::config::ServerConfig;
use civic_data_proxy::fetcher::{Document, NormalizingFetcher, ReqwestUpstream};
use civic_data_proxy::http::{create_router, AppState};
use civic_data_proxy::ttl_cache::{CacheConfig, MemoryTtlCache, TtlCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        timeout_secs = config.upstream_timeout.as_secs(),
        cache_max_entries = ?config.cache_max_entries,
        "starting civic data proxy"
    );

    let upstream = Arc::new(ReqwestUpstream::new(config.upstream_timeout)?);
    let cache: Arc<dyn TtlCache<Document>> = Arc::new(MemoryTtlCache::<Document>::new(CacheConfig {
        max_entries: config.cache_max_entries,
    }));
    let fetcher = Arc::new(NormalizingFetcher::new(
        upstream,
        cache,
        config.upstream_timeout,
    ));

    // Routes answer with empty candidate lists until this finishes
    let candidates = Arc::new(CandidateStore::new());
    spawn_load(config.candidates_csv.clone(), Arc::clone(&candidates));

    let app = create_router(AppState::new(fetcher, candidates, &config));

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
