/**
 * SERVEUR HTTP - point de scrape Prometheus
 *
 * ROUTES :
 * - GET <metrics_path> : scrape complet (snapshot + décodage + exposition texte)
 * - GET /              : page d'accueil avec lien vers les métriques
 * - GET /health        : "ok"
 *
 * Un scrape n'échoue jamais à cause d'un appareil : les erreurs de décodage
 * sortent dans les métriques `*_up`. Seul un échec d'encodage donne un 500.
 */

use crate::engine::Engine;
use crate::error::ExpositionError;
use crate::exposition::{self, CONTENT_TYPE};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub metrics_path: String,
    pub exporter_metrics: bool,
}

pub fn build_router(app_state: AppState) -> Router {
    let metrics_path = app_state.metrics_path.clone();
    Router::new()
        .route("/", get(landing))
        .route("/health", get(|| async { "ok" }))
        .route(&metrics_path, get(metrics))
        .with_state(app_state)
}

pub async fn serve(addr: SocketAddr, app_state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let path = app_state.metrics_path.clone();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, %path, "http config");
    axum::serve(listener, build_router(app_state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

// GET /metrics
async fn metrics(State(app): State<AppState>) -> Response {
    match render(&app).await {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "exposition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn render(app: &AppState) -> Result<String, ExpositionError> {
    if !app.exporter_metrics {
        return app.engine.render().await;
    }
    let scrapes = app.engine.scrape().await;
    exposition::encode_into(exposition::process_registry()?, app.engine.collectors(), &scrapes)
}

// GET /
async fn landing(State(app): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Shelly Exporter</title></head>\n<body>\n<h1>Shelly Exporter</h1>\n<p><a href=\"{}\">Metrics</a></p>\n</body>\n</html>",
        app.metrics_path
    ))
}
