//! Route table and middleware.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    // The UI is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // IBGE
        .route("/estados", get(handlers::list_regions))
        .route("/cidades/{region_id}", get(handlers::list_municipalities))
        // Câmara
        .route("/camara/deputados", get(handlers::list_deputies))
        .route("/camara/votacoes", get(handlers::list_votes))
        .route("/camara/noticias-rss", get(handlers::camara_news))
        // Senado
        .route("/senado/noticias-rss", get(handlers::senado_news))
        .route("/senado/senadores", get(handlers::list_senators))
        .route("/noticias", get(handlers::merged_news))
        // Office holders from the candidate index
        .route("/prefeitos/{uf}/{cidade}", get(handlers::list_mayors))
        .route("/viceprefeitos/{uf}/{cidade}", get(handlers::list_vice_mayors))
        .route("/vereadores/{uf}/{cidade}", get(handlers::list_councillors))
        .route("/governadores/{uf}", get(handlers::list_governors))
        .route("/vicegovernadores/{uf}", get(handlers::list_vice_governors));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
