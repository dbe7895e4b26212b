// Aggregating proxy over Brazilian public-data sources (IBGE, Câmara, Senado, TSE)

pub mod candidates;
pub mod config;
pub mod fetcher;
pub mod http;
pub mod news;
pub mod text;
pub mod ttl_cache;
pub mod upstreams;
pub mod xml_tree;

// Re-export key types for convenience
pub use candidates::{CandidateIndex, CandidateRecord, CandidateStore, LoadError, Office};
pub use config::{CacheTtls, ConfigError, ServerConfig, UpstreamUrls};
pub use fetcher::{
    Document, FetchError, FetchKind, FetchOptions, NormalizingFetcher, ReqwestUpstream, Upstream,
    UpstreamResponse,
};
pub use news::{merge_and_rank, NewsItem, NewsTopic};
pub use ttl_cache::{CacheConfig, CacheStatsReport, MemoryTtlCache, TtlCache};
