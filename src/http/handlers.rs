//! Route handlers.
//!
//! Upstream-backed routes go through the shared fetcher with a per-route TTL
//! and hand the normalized document to one adapter in [`crate::upstreams`].
//! Office-holder routes only query the candidate index and never fail.

use axum::{extract::State, Json};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::dto::{DeputiesQuery, Envelope, HealthResponse, SenatorsQuery, TopicQuery};
use super::error::AppError;
use super::extract::{ApiPath, ApiQuery};
use super::state::AppState;
use crate::candidates::{CandidateRecord, Office};
use crate::fetcher::{Document, FetchKind, FetchOptions};
use crate::news::{merge_and_rank, NewsItem, NewsTopic};
use crate::upstreams::{
    dados_from, municipalities_from, news_items_from, regions_from, senators_from, Municipality,
    Region, Senator,
};

pub type HandlerResult<T> = Result<Json<Envelope<T>>, AppError>;

fn respond<T>(data: T) -> HandlerResult<T> {
    Ok(Json(Envelope::new(data)))
}

/// Appends path segments to a configured base URL, percent-encoding each one.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, AppError> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::Internal(format!("invalid upstream base {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Internal(format!("upstream base cannot take a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn fetch_json(state: &AppState, url: &Url, ttl: Duration) -> Result<Document, AppError> {
    let options =
        FetchOptions::new(FetchKind::Json, ttl).with_header("Accept", "application/json");
    Ok(state.fetcher.fetch(url.as_str(), &options).await?)
}

async fn fetch_xml(state: &AppState, url: &str, ttl: Duration) -> Result<Document, AppError> {
    let options = FetchOptions::new(FetchKind::Xml, ttl);
    Ok(state.fetcher.fetch(url, &options).await?)
}

async fn fetch_feed(state: &AppState, url: &str) -> Result<Vec<NewsItem>, AppError> {
    let document = fetch_xml(state, url, state.ttls.news).await?;
    Ok(news_items_from(&document))
}

// =============================================================================
// Health
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let index_ready = state.candidates.is_ready();
    respond(HealthResponse {
        status: if index_ready { "ok" } else { "loading" },
        candidates: state.candidates.len(),
        index_ready,
        cache: state.fetcher.cache().stats(),
    })
}

// =============================================================================
// IBGE
// =============================================================================

/// GET /api/estados
pub async fn list_regions(State(state): State<AppState>) -> HandlerResult<Vec<Region>> {
    let url = endpoint(&state.upstreams.ibge_localidades, &["estados"])?;
    let document = fetch_json(&state, &url, state.ttls.regions).await?;
    respond(regions_from(&document))
}

/// GET /api/cidades/{regionId}
pub async fn list_municipalities(
    State(state): State<AppState>,
    ApiPath(region_id): ApiPath<String>,
) -> HandlerResult<Vec<Municipality>> {
    let url = endpoint(
        &state.upstreams.ibge_localidades,
        &["estados", region_id.trim(), "municipios"],
    )?;
    let document = fetch_json(&state, &url, state.ttls.municipalities).await?;
    respond(municipalities_from(&document))
}

// =============================================================================
// Câmara dos Deputados
// =============================================================================

/// GET /api/camara/deputados
pub async fn list_deputies(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DeputiesQuery>,
) -> HandlerResult<Vec<Value>> {
    let mut url = endpoint(&state.upstreams.camara_api, &["deputados"])?;
    url.query_pairs_mut().extend_pairs(query.upstream_params());

    let document = fetch_json(&state, &url, state.ttls.deputies).await?;
    respond(dados_from(&document))
}

/// GET /api/camara/votacoes
pub async fn list_votes(State(state): State<AppState>) -> HandlerResult<Vec<Value>> {
    let mut url = endpoint(&state.upstreams.camara_api, &["votacoes"])?;
    url.query_pairs_mut()
        .append_pair("ordem", "DESC")
        .append_pair("ordenarPor", "dataHoraRegistro");

    let document = fetch_json(&state, &url, state.ttls.votes).await?;
    respond(dados_from(&document))
}

/// GET /api/camara/noticias-rss
pub async fn camara_news(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopicQuery>,
) -> HandlerResult<Vec<NewsItem>> {
    let topic = NewsTopic::parse(query.topic.as_deref());
    let url = topic.feed_url(&state.upstreams);
    debug!(topic = topic.as_str(), %url, "selected Câmara feed");

    respond(fetch_feed(&state, &url).await?)
}

// =============================================================================
// Senado Federal
// =============================================================================

/// GET /api/senado/noticias-rss
pub async fn senado_news(State(state): State<AppState>) -> HandlerResult<Vec<NewsItem>> {
    let url = state.upstreams.senado_news.clone();
    respond(fetch_feed(&state, &url).await?)
}

/// GET /api/senado/senadores
pub async fn list_senators(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SenatorsQuery>,
) -> HandlerResult<Vec<Senator>> {
    let url = endpoint(&state.upstreams.senado_api, &["senador", "lista", "atual"])?;
    let document = fetch_xml(&state, url.as_str(), state.ttls.senators).await?;
    respond(senators_from(&document, query.region()))
}

/// GET /api/noticias
///
/// Both feeds are fetched concurrently; if either fails the route fails.
pub async fn merged_news(State(state): State<AppState>) -> HandlerResult<Vec<NewsItem>> {
    let camara_url = NewsTopic::Latest.feed_url(&state.upstreams);
    let senado_url = state.upstreams.senado_news.clone();

    let (camara, senado) = futures::try_join!(
        fetch_feed(&state, &camara_url),
        fetch_feed(&state, &senado_url)
    )?;
    respond(merge_and_rank([camara, senado]))
}

// =============================================================================
// Office holders (candidate index)
// =============================================================================

fn local_officials(
    state: &AppState,
    office: Office,
    uf: &str,
    municipality: &str,
) -> HandlerResult<Vec<CandidateRecord>> {
    respond(
        state
            .candidates
            .find_by_office_region_and_municipality(office.label(), uf, municipality),
    )
}

fn regional_officials(state: &AppState, office: Office, uf: &str) -> HandlerResult<Vec<CandidateRecord>> {
    respond(state.candidates.find_by_office_and_region(office.label(), uf))
}

/// GET /api/prefeitos/{uf}/{cidade}
pub async fn list_mayors(
    State(state): State<AppState>,
    ApiPath((uf, municipality)): ApiPath<(String, String)>,
) -> HandlerResult<Vec<CandidateRecord>> {
    local_officials(&state, Office::Mayor, &uf, &municipality)
}

/// GET /api/viceprefeitos/{uf}/{cidade}
pub async fn list_vice_mayors(
    State(state): State<AppState>,
    ApiPath((uf, municipality)): ApiPath<(String, String)>,
) -> HandlerResult<Vec<CandidateRecord>> {
    local_officials(&state, Office::ViceMayor, &uf, &municipality)
}

/// GET /api/vereadores/{uf}/{cidade}
pub async fn list_councillors(
    State(state): State<AppState>,
    ApiPath((uf, municipality)): ApiPath<(String, String)>,
) -> HandlerResult<Vec<CandidateRecord>> {
    local_officials(&state, Office::Councillor, &uf, &municipality)
}

/// GET /api/governadores/{uf}
pub async fn list_governors(
    State(state): State<AppState>,
    ApiPath(uf): ApiPath<String>,
) -> HandlerResult<Vec<CandidateRecord>> {
    regional_officials(&state, Office::Governor, &uf)
}

/// GET /api/vicegovernadores/{uf}
pub async fn list_vice_governors(
    State(state): State<AppState>,
    ApiPath(uf): ApiPath<String>,
) -> HandlerResult<Vec<CandidateRecord>> {
    regional_officials(&state, Office::ViceGovernor, &uf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("https://ibge.test/api/v1/localidades", &["estados", "São Paulo", "municipios"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ibge.test/api/v1/localidades/estados/S%C3%A3o%20Paulo/municipios"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let url = endpoint("https://camara.test/api/v2/", &["deputados"]).unwrap();
        assert_eq!(url.as_str(), "https://camara.test/api/v2/deputados");
    }

    #[test]
    fn test_endpoint_rejects_invalid_base() {
        assert!(matches!(endpoint("not a url", &["x"]), Err(AppError::Internal(_))));
    }
}
