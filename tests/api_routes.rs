//! Route-level scenarios: the full router driven through `oneshot` against
//! canned upstream responses.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use civic_data_proxy::candidates::{CandidateIndex, CandidateStore};
use civic_data_proxy::config::{ServerConfig, UpstreamUrls};
use civic_data_proxy::fetcher::{
    Document, FetchError, NormalizingFetcher, Upstream, UpstreamResponse,
};
use civic_data_proxy::http::{create_router, AppState};
use civic_data_proxy::ttl_cache::{MemoryTtlCache, TtlCache};

const ESTADOS: &str = "http://ibge.test/localidades/estados";
const MUNICIPIOS_SP: &str = "http://ibge.test/localidades/estados/SP/municipios";
const DEPUTADOS: &str = "http://camara.test/api/v2/deputados?pagina=1&itens=100";
const VOTACOES: &str = "http://camara.test/api/v2/votacoes?ordem=DESC&ordenarPor=dataHoraRegistro";
const CAMARA_RSS: &str = "http://camara.test/noticias/rss";
const CAMARA_RSS_POLITICA: &str = "http://camara.test/noticias/rss/dinamico/POLITICA";
const SENADO_RSS: &str = "http://senado.test/feed";
const SENADORES: &str = "http://senado.test/dadosabertos/senador/lista/atual";

#[derive(Default)]
struct CannedUpstream {
    responses: HashMap<String, (u16, &'static str, String, Duration)>,
    requested: Mutex<Vec<String>>,
}

impl CannedUpstream {
    fn json(mut self, url: &str, body: Value) -> Self {
        self.responses.insert(
            url.to_string(),
            (200, "application/json", body.to_string(), Duration::ZERO),
        );
        self
    }

    fn xml(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            (200, "text/xml; charset=utf-8", body.to_string(), Duration::ZERO),
        );
        self
    }

    fn status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(
            url.to_string(),
            (status, "text/html", "<h1>erro</h1>".to_string(), Duration::ZERO),
        );
        self
    }

    fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.responses.insert(
            url.to_string(),
            (200, "application/json", "[]".to_string(), delay),
        );
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for CannedUpstream {
    async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<UpstreamResponse, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        let Some((status, content_type, body, delay)) = self.responses.get(url).cloned() else {
            return Err(FetchError::NetworkError {
                url: url.to_string(),
                message: "no route to host".to_string(),
            });
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(UpstreamResponse {
            status,
            content_type: Some(content_type.to_string()),
            body: Bytes::from(body),
        })
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        upstream_timeout: Duration::from_millis(150),
        upstreams: UpstreamUrls {
            ibge_localidades: "http://ibge.test/localidades".to_string(),
            camara_api: "http://camara.test/api/v2".to_string(),
            camara_news: CAMARA_RSS.to_string(),
            senado_news: SENADO_RSS.to_string(),
            senado_api: "http://senado.test/dadosabertos".to_string(),
        },
        ..ServerConfig::default()
    }
}

fn app_with(upstream: Arc<CannedUpstream>, candidates: CandidateStore) -> Router {
    let config = test_config();
    let cache: Arc<dyn TtlCache<Document>> = Arc::new(MemoryTtlCache::<Document>::unbounded());
    let fetcher = Arc::new(NormalizingFetcher::new(
        upstream,
        cache,
        config.upstream_timeout,
    ));
    create_router(AppState::new(fetcher, Arc::new(candidates), &config))
}

fn app(upstream: Arc<CannedUpstream>) -> Router {
    app_with(upstream, CandidateStore::new())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn rss(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, date)| {
            format!(
                "<item><title>{}</title><link>http://n/{}</link><pubDate>{}</pubDate><description>d</description></item>",
                title, title, date
            )
        })
        .collect();
    format!("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>feed</title>{}</channel></rss>", items)
}

fn candidate_store() -> CandidateStore {
    let csv = "\
SG_UF;NM_UE;DS_CARGO;SQ_CANDIDATO;NM_URNA_CANDIDATO;SG_PARTIDO;DS_SIT_TOT_TURNO
SP;SÃO PAULO;PREFEITO;250001;RICARDO NUNES;MDB;ELEITO
SP;SÃO PAULO;VEREADOR;250002;ANA;PT;ELEITO
SP;SÃO PAULO;VEREADOR;250003;BRUNO;PL;ELEITO
SP;SÃO PAULO;PREFEITO;250004;GUILHERME;PSOL;NÃO ELEITO
SP;SÃO PAULO;VICE-PREFEITO;250005;MELLO;PL;ELEITO
SP;SÃO PAULO;GOVERNADOR;250006;TARCISIO;REPUBLICANOS;ELEITO
SP;SÃO PAULO;VICE-GOVERNADOR;250007;FELICIO;PSD;ELEITO
";
    CandidateStore::with_index(CandidateIndex::from_reader(csv.as_bytes()).unwrap())
}

#[tokio::test]
async fn regions_are_trimmed_and_sorted() {
    let upstream = Arc::new(CannedUpstream::default().json(
        ESTADOS,
        json!([
            {"id": 35, "sigla": "SP", "nome": "São Paulo", "regiao": {"id": 3}},
            {"id": 12, "sigla": "AC", "nome": "Acre"}
        ]),
    ));
    let app = app(upstream);

    let (status, body) = get(&app, "/api/estados").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ok": true, "data": [
            {"id": 12, "sigla": "AC", "nome": "Acre"},
            {"id": 35, "sigla": "SP", "nome": "São Paulo"}
        ]})
    );
}

#[tokio::test]
async fn municipalities_sorted_pt_br_and_cached() {
    let upstream = Arc::new(CannedUpstream::default().json(
        MUNICIPIOS_SP,
        json!([
            {"id": 3550308, "nome": "São Paulo"},
            {"id": 3500105, "nome": "Adamantina"},
            {"id": 3506003, "nome": "Bauru"}
        ]),
    ));
    let app = app(upstream.clone());

    let (status, body) = get(&app, "/api/cidades/SP").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["nome"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Adamantina", "Bauru", "São Paulo"]);

    get(&app, "/api/cidades/SP").await;
    assert_eq!(upstream.requested().len(), 1, "second call served from cache");
}

#[tokio::test]
async fn deputies_are_unwrapped_from_dados() {
    let upstream = Arc::new(
        CannedUpstream::default()
            .json(DEPUTADOS, json!({"dados": [{"id": 1, "nome": "A"}], "links": []}))
            .json(
                &format!("{}&siglaUf=SP&siglaPartido=PT", DEPUTADOS),
                json!({"dados": [{"id": 2, "nome": "B", "siglaUf": "SP"}]}),
            ),
    );
    let app = app(upstream);

    let (_, all) = get(&app, "/api/camara/deputados").await;
    assert_eq!(all, json!({"ok": true, "data": [{"id": 1, "nome": "A"}]}));

    let (_, filtered) = get(&app, "/api/camara/deputados?region=SP&siglaPartido=PT").await;
    assert_eq!(filtered["data"][0]["id"], 2);
}

#[tokio::test]
async fn votes_are_unwrapped_from_dados() {
    let upstream = Arc::new(CannedUpstream::default().json(
        VOTACOES,
        json!({"dados": [{"id": "2438234-56", "descricao": "Aprovado"}]}),
    ));

    let (status, body) = get(&app(upstream), "/api/camara/votacoes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["descricao"], "Aprovado");
}

#[tokio::test]
async fn camara_news_by_topic() {
    let upstream = Arc::new(
        CannedUpstream::default()
            .xml(CAMARA_RSS, &rss(&[("ultima", "Tue, 14 Oct 2025 10:00:00 -0300")]))
            .xml(CAMARA_RSS_POLITICA, &rss(&[("politica", "Tue, 14 Oct 2025 09:00:00 -0300")])),
    );
    let app = app(upstream.clone());

    let (_, politics) = get(&app, "/api/camara/noticias-rss?tema=politica").await;
    assert_eq!(politics["data"][0]["title"], "politica");

    let (status, fallback) = get(&app, "/api/camara/noticias-rss?topic=ESPORTES").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        fallback["data"],
        json!([{
            "title": "ultima",
            "link": "http://n/ultima",
            "pubDate": "Tue, 14 Oct 2025 10:00:00 -0300",
            "description": "d"
        }])
    );
    assert_eq!(upstream.requested(), vec![CAMARA_RSS_POLITICA, CAMARA_RSS]);
}

#[tokio::test]
async fn senado_news_single_feed() {
    let upstream = Arc::new(CannedUpstream::default().xml(
        SENADO_RSS,
        &rss(&[("a", "Mon, 13 Oct 2025 10:00:00 GMT"), ("b", "Mon, 13 Oct 2025 09:00:00 GMT")]),
    ));

    let (_, body) = get(&app(upstream), "/api/senado/noticias-rss").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn merged_news_is_newest_first() {
    let upstream = Arc::new(
        CannedUpstream::default()
            .xml(
                CAMARA_RSS,
                &rss(&[
                    ("c1", "Tue, 14 Oct 2025 10:00:00 -0300"),
                    ("c2", "Tue, 14 Oct 2025 08:00:00 -0300"),
                ]),
            )
            .xml(SENADO_RSS, &rss(&[("s1", "Tue, 14 Oct 2025 12:00:00 GMT")])),
    );

    let (_, body) = get(&app(upstream), "/api/noticias").await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["c1", "s1", "c2"]);
}

#[tokio::test]
async fn merged_news_fails_when_one_feed_fails() {
    let upstream = Arc::new(
        CannedUpstream::default()
            .xml(CAMARA_RSS, &rss(&[("c1", "Tue, 14 Oct 2025 10:00:00 -0300")]))
            .status(SENADO_RSS, 500),
    );

    let (status, body) = get(&app(upstream), "/api/noticias").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], false);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn senators_filtered_by_uf() {
    let upstream = Arc::new(CannedUpstream::default().xml(
        SENADORES,
        "<ListaParlamentarEmExercicio><Parlamentares>\
           <Parlamentar><IdentificacaoParlamentar><CodigoParlamentar>1</CodigoParlamentar>\
             <NomeParlamentar>Zé</NomeParlamentar><SiglaPartidoParlamentar>PT</SiglaPartidoParlamentar>\
             <UfParlamentar>SP</UfParlamentar></IdentificacaoParlamentar></Parlamentar>\
           <Parlamentar><IdentificacaoParlamentar><CodigoParlamentar>2</CodigoParlamentar>\
             <NomeParlamentar>Ana</NomeParlamentar><SiglaPartidoParlamentar>PL</SiglaPartidoParlamentar>\
             <UfParlamentar>RJ</UfParlamentar></IdentificacaoParlamentar></Parlamentar>\
         </Parlamentares></ListaParlamentarEmExercicio>",
    ));
    let app = app(upstream);

    let (_, rj) = get(&app, "/api/senado/senadores?uf=rj").await;
    assert_eq!(rj["data"].as_array().unwrap().len(), 1);
    assert_eq!(rj["data"][0]["nome"], "Ana");
    assert_eq!(rj["data"][0]["cargo"], "Senador");

    let (_, all) = get(&app, "/api/senado/senadores").await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn slow_upstream_yields_gateway_timeout() {
    let upstream = Arc::new(CannedUpstream::default().slow(ESTADOS, Duration::from_millis(600)));

    let (status, body) = get(&app(upstream), "/api/estados").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn upstream_error_status_yields_bad_gateway() {
    let upstream = Arc::new(CannedUpstream::default().status(ESTADOS, 503));

    let (status, body) = get(&app(upstream), "/api/estados").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn html_instead_of_json_is_a_parse_failure() {
    let upstream = Arc::new(CannedUpstream::default().xml(ESTADOS, "<html><body>manutenção</body></html>"));

    let (status, body) = get(&app(upstream), "/api/estados").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("manutenção"));
}

#[tokio::test]
async fn mayors_match_without_accents() {
    let app = app_with(Arc::new(CannedUpstream::default()), candidate_store());

    let (status, body) = get(&app, "/api/prefeitos/SP/Sao%20Paulo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ok": true, "data": [{
            "id": "250001",
            "nome": "RICARDO NUNES",
            "cargo": "PREFEITO",
            "partido": "MDB",
            "uf": "SP",
            "municipio": "SÃO PAULO",
            "foto": "/fotos2024/foto_cand2024_SP_div/250001.jpg"
        }]})
    );
}

#[tokio::test]
async fn office_holder_routes() {
    let app = app_with(Arc::new(CannedUpstream::default()), candidate_store());

    let (_, councillors) = get(&app, "/api/vereadores/sp/s%C3%A3o%20paulo").await;
    assert_eq!(councillors["data"].as_array().unwrap().len(), 2);

    let (_, vice_mayors) = get(&app, "/api/viceprefeitos/SP/SAO%20PAULO").await;
    assert_eq!(vice_mayors["data"][0]["nome"], "MELLO");

    let (_, governors) = get(&app, "/api/governadores/sp").await;
    assert_eq!(governors["data"][0]["nome"], "TARCISIO");

    let (_, vice_governors) = get(&app, "/api/vicegovernadores/SP").await;
    assert_eq!(vice_governors["data"][0]["nome"], "FELICIO");

    let (status, unknown) = get(&app, "/api/prefeitos/SP/Atlantida").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown, json!({"ok": true, "data": []}));
}

#[tokio::test]
async fn office_holders_empty_while_index_loads() {
    let app = app(Arc::new(CannedUpstream::default()));

    let (status, body) = get(&app, "/api/governadores/SP").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "data": []}));

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["data"]["status"], "loading");
    assert_eq!(health["data"]["indexReady"], false);
}

#[tokio::test]
async fn health_reports_index_and_cache() {
    let upstream = Arc::new(CannedUpstream::default().json(ESTADOS, json!([])));
    let app = app_with(upstream, candidate_store());
    get(&app, "/api/estados").await;

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["ok"], true);
    assert_eq!(health["data"]["status"], "ok");
    assert_eq!(health["data"]["candidates"], 6);
    assert_eq!(health["data"]["cache"]["itemsCount"], 1);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = app(Arc::new(CannedUpstream::default()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/governadores/SP")
                .header(header::ORIGIN, "http://ui.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn conflicting_query_aliases_are_rejected_with_envelope() {
    let upstream = Arc::new(CannedUpstream::default());
    let app = app(upstream.clone());

    let (status, body) = get(&app, "/api/camara/deputados?siglaUf=SP&region=RJ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("region"));
    assert!(upstream.requested().is_empty());
}

#[tokio::test]
async fn undecodable_path_segment_is_rejected_with_envelope() {
    let app = app_with(Arc::new(CannedUpstream::default()), candidate_store());

    let (status, body) = get(&app, "/api/prefeitos/SP/%FF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());
}
