//! Response envelopes and query-string shapes.

use serde::{Deserialize, Serialize};

use crate::ttl_cache::CacheStatsReport;

/// Successful response body: `{"ok": true, "data": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Failure body: `{"ok": false, "error": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

/// Query for `/api/camara/deputados`. Accepts the Câmara parameter names
/// as well as the English ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeputiesQuery {
    #[serde(alias = "siglaUf")]
    pub region: Option<String>,
    #[serde(alias = "siglaPartido")]
    pub party: Option<String>,
    #[serde(alias = "nome")]
    pub name: Option<String>,
    #[serde(alias = "pagina")]
    pub page: Option<String>,
    #[serde(rename = "pageSize", alias = "itens")]
    pub page_size: Option<String>,
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn positive_or(value: &Option<String>, default: u32) -> u32 {
    non_blank(value)
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

impl DeputiesQuery {
    /// Upstream query pairs, pagination first.
    pub fn upstream_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("pagina", positive_or(&self.page, DEFAULT_PAGE).to_string()),
            ("itens", positive_or(&self.page_size, DEFAULT_PAGE_SIZE).to_string()),
        ];
        let filters = [
            ("siglaUf", &self.region),
            ("siglaPartido", &self.party),
            ("nome", &self.name),
        ];
        for (key, value) in filters {
            if let Some(v) = non_blank(value) {
                params.push((key, v.to_string()));
            }
        }
        params
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicQuery {
    #[serde(alias = "tema")]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SenatorsQuery {
    pub uf: Option<String>,
}

impl SenatorsQuery {
    pub fn region(&self) -> Option<&str> {
        non_blank(&self.uf)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub candidates: usize,
    #[serde(rename = "indexReady")]
    pub index_ready: bool,
    pub cache: CacheStatsReport,
}
