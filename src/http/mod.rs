//! HTTP surface: graph JSON and HTML viewer, sentiment report, run history.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, GraphConfig};
use crate::db::{self, Db};
use crate::error::{NewsgraphError, Result};
use crate::graph::{render_report_html, Expansion, GraphRenderer, HtmlRenderer, SEED_ONLY_WARNING};
use crate::report::{build_report, NO_RELEVANT_HINT};
use crate::services::Services;

const DEFAULT_RUN_LIMIT: usize = 20;
const MAX_RUN_LIMIT: usize = 200;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .is_ok()
}

/// HTTP server over the graph builder and run history
pub struct GraphServer {
    state: AppState,
}

impl GraphServer {
    /// `db` is None when run history is disabled
    pub fn new(services: Services, db: Option<Db>, config: &Config) -> Result<Self> {
        // API key is optional if authless mode is enabled
        let api_key = if config.http_server.authless {
            String::new()
        } else {
            std::env::var(&config.http_server.api_key_env).map_err(|_| {
                NewsgraphError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or enable authless mode.",
                    config.http_server.api_key_env
                ))
            })?
        };

        Ok(Self {
            state: AppState {
                services,
                db: db.map(Arc::new),
                graph: config.graph.clone(),
                api_key,
                allowed_origins: config.http_server.allowed_origins.clone(),
                authless: config.http_server.authless,
                persist_runs: config.http_server.persist_runs,
            },
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.router();
        let addr = format!("127.0.0.1:{}", port);

        if !check_port_available(port).await {
            return Err(NewsgraphError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            NewsgraphError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        log::info!("Starting newsgraph server on http://{}", addr);
        log::info!("Graph viewer: http://{}/graph?company=<name>", addr);

        axum::serve(listener, app).await.map_err(|e| {
            NewsgraphError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    pub fn router(&self) -> Router {
        let cors = if self.state.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .state
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/api/graph", get(handle_graph))
            .route("/graph", get(handle_graph_page))
            .route("/api/report", get(handle_report))
            .route("/report", get(handle_report_page))
            .route("/api/runs", get(handle_list_runs))
            .route("/api/runs/:run_id", get(handle_get_run))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(self.state.clone())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    services: Services,
    db: Option<Arc<Db>>,
    graph: GraphConfig,
    api_key: String,
    allowed_origins: Vec<String>,
    authless: bool,
    persist_runs: bool,
}

#[derive(Debug, Deserialize)]
struct GraphParams {
    company: Option<String>,
    depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    company: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunsParams {
    limit: Option<usize>,
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "newsgraph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn handle_graph(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GraphParams>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let (expansion, run_id) = match build_graph(&state, &params).await {
        Ok(built) => built,
        Err(e) => return error_response(e),
    };

    let seed_only = expansion.graph.is_seed_only();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "run_id": run_id,
            "seed_only": seed_only,
            "message": seed_only.then_some(SEED_ONLY_WARNING),
            "expansion": expansion,
        })),
    )
        .into_response()
}

async fn handle_graph_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GraphParams>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let (expansion, _) = match build_graph(&state, &params).await {
        Ok(built) => built,
        Err(e) => return error_response(e),
    };
    render_page(&expansion)
}

async fn handle_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReportParams>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let company = params.company.unwrap_or_default();
    let report = match build_report(
        state.services.news.as_ref(),
        state.services.sentiment.as_ref(),
        &company,
    )
    .await
    {
        Ok(report) => report,
        Err(e) => return error_response(e),
    };

    let empty = report.is_empty();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": empty.then_some(NO_RELEVANT_HINT),
            "report": report,
        })),
    )
        .into_response()
}

async fn handle_report_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReportParams>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let company = params.company.unwrap_or_default();
    let rendered = match build_report(
        state.services.news.as_ref(),
        state.services.sentiment.as_ref(),
        &company,
    )
    .await
    {
        Ok(report) => render_report_html(&report),
        Err(e) => Err(e),
    };
    match rendered {
        Ok(html) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            html,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_list_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RunsParams>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let Some(db) = state.db.as_ref() else {
        return history_disabled();
    };
    let limit = params.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
    match db::list_runs(db, limit).await {
        Ok(runs) => (StatusCode::OK, Json(serde_json::json!({ "runs": runs }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_get_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let Some(db) = state.db.as_ref() else {
        return history_disabled();
    };
    match db::load_run(db, &run_id).await {
        Ok(Some(run)) => (StatusCode::OK, Json(run)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Run {} not found", run_id) })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Validate params, expand, and store the run when history is on.
/// A failed save is logged and leaves `run_id` empty.
async fn build_graph(state: &AppState, params: &GraphParams) -> Result<(Expansion, Option<String>)> {
    let company = params.company.as_deref().unwrap_or_default();
    if company.trim().is_empty() {
        return Err(NewsgraphError::EmptyInput);
    }
    let depth = state
        .graph
        .check_depth(params.depth.unwrap_or(state.graph.default_depth))?;

    let expansion = state.services.expander(&state.graph).expand(company, depth).await?;

    let mut run_id = None;
    if state.persist_runs {
        if let Some(db) = state.db.as_ref() {
            match db::save_run(db, &expansion, depth).await {
                Ok(id) => run_id = Some(id),
                Err(e) => log::warn!("Failed to save graph run for {}: {}", company.trim(), e),
            }
        }
    }

    Ok((expansion, run_id))
}

fn render_page(expansion: &Expansion) -> Response {
    let renderer = HtmlRenderer::default();
    match renderer.render(&expansion.graph) {
        Ok(html) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, renderer.content_type())],
            html,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: NewsgraphError) -> Response {
    let status = match err {
        NewsgraphError::EmptyInput | NewsgraphError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        NewsgraphError::UpstreamFetch(_) | NewsgraphError::ModelInference(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", err);
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

fn history_disabled() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Run history is disabled" })),
    )
        .into_response()
}

fn authorize(state: &AppState, headers: &HeaderMap) -> std::result::Result<(), Response> {
    if state.authless {
        return Ok(());
    }
    validate_auth(headers, &state.api_key)?;
    validate_origin(headers, &state.allowed_origins)
}

fn validate_auth(headers: &HeaderMap, expected_key: &str) -> std::result::Result<(), Response> {
    let unauthorized = |error: &str| {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": error,
                "message": "Use 'Authorization: Bearer <api-key>' header"
            })),
        )
            .into_response()
    };

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;
    let provided_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization header format"))?;
    if provided_key != expected_key {
        return Err(unauthorized("Invalid API key"));
    }
    Ok(())
}

/// Browser requests must come from a configured origin; direct requests carry none
fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> std::result::Result<(), Response> {
    if allowed_origins.is_empty() {
        return Ok(());
    }
    let Some(origin) = headers.get(header::ORIGIN).and_then(|h| h.to_str().ok()) else {
        return Ok(());
    };
    if allowed_origins.iter().any(|allowed| origin == allowed) {
        return Ok(());
    }
    Err((
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "Origin not allowed",
            "message": format!("Origin '{}' is not in the allowed origins list", origin)
        })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_toml;
    use crate::db::test_db;
    use crate::testing::{FakeNewsSource, ListExtractor, MarkerClassifier};
    use tempfile::TempDir;

    fn test_state(news: FakeNewsSource, db: Option<Db>) -> AppState {
        let config = Config::from_toml_str(&test_config_toml("lexicon")).unwrap();
        let services = Services::new(Arc::new(news), Arc::new(MarkerClassifier), Arc::new(ListExtractor));
        GraphServer::new(services, db, &config).unwrap().state
    }

    fn acme_news() -> FakeNewsSource {
        FakeNewsSource::new()
            .with_company("Acme", &["orgs:Globex", "[neg] orgs:Initech"])
            .with_company("Globex", &["orgs:Hooli"])
    }

    fn graph_params(company: &str, depth: Option<usize>) -> Query<GraphParams> {
        Query(GraphParams {
            company: Some(company.to_string()),
            depth,
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = handle_health().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "newsgraph");
    }

    #[tokio::test]
    async fn test_graph_endpoint_saves_run() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;
        let state = test_state(acme_news(), Some(db));

        let response = handle_graph(State(state.clone()), HeaderMap::new(), graph_params("Acme", Some(2))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["seed_only"], false);
        assert_eq!(body["expansion"]["graph"]["edges"].as_array().unwrap().len(), 3);

        let run_id = body["run_id"].as_str().unwrap().to_string();
        let response = handle_get_run(State(state.clone()), HeaderMap::new(), Path(run_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stored = body_json(response).await;
        assert_eq!(stored["summary"]["seed"], "Acme");
        assert_eq!(stored["summary"]["max_depth"], 2);

        let response = handle_list_runs(State(state), HeaderMap::new(), Query(RunsParams { limit: None })).await;
        let runs = body_json(response).await;
        assert_eq!(runs["runs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_graph_endpoint_rejects_bad_input() {
        let state = test_state(acme_news(), None);

        let response = handle_graph(State(state.clone()), HeaderMap::new(), graph_params("  ", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = handle_graph(
            State(state.clone()),
            HeaderMap::new(),
            Query(GraphParams { company: None, depth: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // test config caps depth at 4
        let response = handle_graph(State(state.clone()), HeaderMap::new(), graph_params("Acme", Some(5))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = handle_graph(State(state), HeaderMap::new(), graph_params("Acme", Some(0))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_graph_endpoint_seed_only_message() {
        let state = test_state(FakeNewsSource::new().failing_all(), None);
        let response = handle_graph(State(state), HeaderMap::new(), graph_params("Acme", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["seed_only"], true);
        assert_eq!(body["message"], SEED_ONLY_WARNING);
        assert!(body["run_id"].is_null());
    }

    #[tokio::test]
    async fn test_graph_page_is_html() {
        let state = test_state(acme_news(), None);
        let response = handle_graph_page(State(state), HeaderMap::new(), graph_params("Acme", Some(1))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("vis.Network"));
    }

    #[tokio::test]
    async fn test_report_endpoint() {
        let state = test_state(
            FakeNewsSource::new().with_company("Acme", &["Acme wins [neg] orgs:Globex"]),
            None,
        );
        let response = handle_report(
            State(state.clone()),
            HeaderMap::new(),
            Query(ReportParams { company: Some("Acme".to_string()) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["report"]["counts"]["negative"], 1);
        assert!(body["message"].is_null());

        let response = handle_report(State(state), HeaderMap::new(), Query(ReportParams { company: None })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_report_page_is_html() {
        let state = test_state(
            FakeNewsSource::new().with_company("Acme", &["Acme wins [neg] orgs:Globex"]),
            None,
        );
        let response = handle_report_page(
            State(state.clone()),
            HeaderMap::new(),
            Query(ReportParams { company: Some("Acme".to_string()) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Stock Sentiment Graph: Acme"));
        assert!(html.contains("\"color\":\"red\""));

        let response = handle_report_page(State(state), HeaderMap::new(), Query(ReportParams { company: None })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_runs_without_history() {
        let state = test_state(acme_news(), None);
        let response = handle_list_runs(State(state.clone()), HeaderMap::new(), Query(RunsParams { limit: Some(5) })).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = handle_get_run(State(state), HeaderMap::new(), Path("x".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auth_required_when_not_authless() {
        let mut state = test_state(acme_news(), None);
        state.authless = false;
        state.api_key = "secret".to_string();

        let response = handle_graph(State(state.clone()), HeaderMap::new(), graph_params("Acme", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        let response = handle_graph(State(state.clone()), headers, graph_params("Acme", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        let response = handle_graph(State(state), headers, graph_params("Acme", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_validate_origin() {
        let allowed = vec!["https://viewer.example".to_string()];
        let mut headers = HeaderMap::new();
        assert!(validate_origin(&headers, &allowed).is_ok());
        headers.insert(header::ORIGIN, "https://evil.example".parse().unwrap());
        assert!(validate_origin(&headers, &allowed).is_err());
        assert!(validate_origin(&headers, &[]).is_ok());
    }
}
