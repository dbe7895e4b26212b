// Server configuration, read once from the environment at startup

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

// Cache lifetimes per route, tuned to how often each source changes
#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub regions: Duration,
    pub municipalities: Duration,
    pub deputies: Duration,
    pub news: Duration,
    pub votes: Duration,
    pub senators: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            regions: Duration::from_secs(12 * 60 * 60),
            municipalities: Duration::from_secs(12 * 60 * 60),
            deputies: Duration::from_secs(120),
            news: Duration::from_secs(60),
            votes: Duration::from_secs(60),
            senators: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    pub ibge_localidades: String,
    pub camara_api: String,
    pub camara_news: String,
    pub senado_news: String,
    pub senado_api: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            ibge_localidades: "https://servicodados.ibge.gov.br/api/v1/localidades".to_string(),
            camara_api: "https://dadosabertos.camara.leg.br/api/v2".to_string(),
            camara_news: "https://www.camara.leg.br/noticias/rss".to_string(),
            senado_news: "https://www12.senado.leg.br/noticias/feed/todasnoticias".to_string(),
            senado_api: "https://legis.senado.leg.br/dadosabertos".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub candidates_csv: PathBuf,
    pub upstream_timeout: Duration,
    pub cache_max_entries: Option<usize>,
    pub ttls: CacheTtls,
    pub upstreams: UpstreamUrls,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            candidates_csv: PathBuf::from("dados-tse/2024/consulta_cand_2024_BRASIL.csv"),
            upstream_timeout: Duration::from_secs(12),
            cache_max_entries: None,
            ttls: CacheTtls::default(),
            upstreams: UpstreamUrls::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Separated from `from_env` so tests do not have to mutate the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = parse_var::<u16>(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(path) = lookup("CANDIDATES_CSV").filter(|p| !p.trim().is_empty()) {
            config.candidates_csv = PathBuf::from(path.trim());
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "UPSTREAM_TIMEOUT_SECS")? {
            config.upstream_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(max) = parse_var::<usize>(&lookup, "CACHE_MAX_ENTRIES")? {
            config.cache_max_entries = (max > 0).then_some(max);
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}
