//! HTTP surface.
//!
//! | Route | Method | Body |
//! |-------|--------|------|
//! | `/api/predict`, `/predict` | POST | `{"prediction": f64}` or `{"error": msg}` |
//! | `/api/meta`, `/meta` | GET | schema details or `{"available": false}` |
//! | `/api/health`, `/health` | GET | `{"status": "ok", "model": name, "model_loaded": bool}` |
//!
//! Anything else falls through to the static frontend when one is configured.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::error::ServeError;
use crate::service::{
    ErrorResponse, HealthResponse, MetaResponse, PredictionResponse, PredictionService,
};

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<PredictionService>,
}

impl ApiState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// API routes with CORS, without static assets.
pub fn router(state: ApiState, cors_origin: &str) -> Router {
    let api = Router::new()
        .route("/predict", post(predict))
        .route("/meta", get(meta))
        .route("/health", get(health));

    Router::new()
        .nest("/api", api.clone())
        .merge(api)
        .with_state(state)
        .layer(cors_layer(cors_origin))
}

/// API routes plus the static frontend at `/` when `frontend_dir` exists.
pub fn app(state: ApiState, cors_origin: &str, frontend_dir: &Path) -> Router {
    let router = router(state, cors_origin);
    if frontend_dir.is_dir() {
        info!("serving frontend from {}", frontend_dir.display());
        router.fallback_service(ServeDir::new(frontend_dir))
    } else {
        info!(
            "frontend directory {} not found; serving API only",
            frontend_dir.display()
        );
        router
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn predict(State(state): State<ApiState>, body: Bytes) -> Response {
    match state.service.predict(&body) {
        Ok(prediction) => Json(PredictionResponse { prediction }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn meta(State(state): State<ApiState>) -> Json<MetaResponse> {
    Json(state.service.meta())
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(state.service.health())
}

fn cors_layer(allowed: &str) -> CorsLayer {
    let cors = if allowed.trim() == "*" {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = allowed
            .split(',')
            .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
