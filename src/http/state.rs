//! Application state shared by every handler.

use std::sync::Arc;

use crate::candidates::CandidateStore;
use crate::config::{CacheTtls, ServerConfig, UpstreamUrls};
use crate::fetcher::NormalizingFetcher;

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<NormalizingFetcher>,
    /// Empty until the background load publishes the index
    pub candidates: Arc<CandidateStore>,
    pub ttls: CacheTtls,
    pub upstreams: Arc<UpstreamUrls>,
}

impl AppState {
    pub fn new(
        fetcher: Arc<NormalizingFetcher>,
        candidates: Arc<CandidateStore>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            fetcher,
            candidates,
            ttls: config.ttls.clone(),
            upstreams: Arc::new(config.upstreams.clone()),
        }
    }
}
