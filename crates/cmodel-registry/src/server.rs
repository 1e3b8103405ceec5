//! HTTP surface of the registry service.
//!
//! Four operations over JSON: get, list, push, delete. Error kinds map onto
//! HTTP statuses; bodies are `{"error": message}`. The server drains on
//! SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use cmodel_core::{ModelError, ModelResult};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::dto::{GetModelResponse, ListModelsResponse, PushModelRequest};
use crate::service::RegistryService;

const DEFAULT_PORT: u16 = 5151;

/// Registry server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// CA certificate path; termination is handled by the deployment front
    /// end, the path is carried for its configuration.
    pub ca_cert: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            ca_cert: None,
            cert: None,
            key: None,
        }
    }
}

/// Builds the registry router.
pub fn router(service: Arc<RegistryService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/models", get(list_models).post(push_model))
        .route(
            "/v1/models/{name}/{version}",
            get(get_model).delete(delete_model),
        )
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Serves the registry until SIGINT/SIGTERM.
pub async fn serve(service: Arc<RegistryService>, config: ServerConfig) -> ModelResult<()> {
    if config.cert.is_some() || config.key.is_some() || config.ca_cert.is_some() {
        info!("certificate paths configured; TLS termination is delegated to the front end");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ModelError::internal(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "serving config model registry");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ModelError::internal(format!("registry serve failed: {e}")))
}

async fn shutdown_signal() {
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    info!("shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_model(
    State(service): State<Arc<RegistryService>>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<GetModelResponse>, ApiError> {
    let model = service.get_model(&name, &version).await?;
    Ok(Json(GetModelResponse { model }))
}

async fn list_models(
    State(service): State<Arc<RegistryService>>,
) -> Result<Json<ListModelsResponse>, ApiError> {
    let models = service.list_models().await?;
    Ok(Json(ListModelsResponse { models }))
}

async fn push_model(
    State(service): State<Arc<RegistryService>>,
    Json(request): Json<PushModelRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    service.push_model(request.model).await?;
    Ok(Json(serde_json::json!({})))
}

async fn delete_model(
    State(service): State<Arc<RegistryService>>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    service.delete_model(&name, &version).await?;
    Ok(Json(serde_json::json!({})))
}

/// HTTP projection of a domain error.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        let status = match &err {
            ModelError::NotFound(_) => StatusCode::NOT_FOUND,
            ModelError::AlreadyExists(_) | ModelError::Conflict(_) => StatusCode::CONFLICT,
            ModelError::Invalid(_) => StatusCode::BAD_REQUEST,
            ModelError::Canceled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ModelError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {err}");
        }
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (ModelError::not_found("x"), StatusCode::NOT_FOUND),
            (ModelError::already_exists("x"), StatusCode::CONFLICT),
            (ModelError::conflict("x"), StatusCode::CONFLICT),
            (ModelError::invalid("x"), StatusCode::BAD_REQUEST),
            (ModelError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
        assert_eq!(ApiError::from(ModelError::Canceled).status.as_u16(), 499);
    }
}
