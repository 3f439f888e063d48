//! HTTP API.
//!
//! Every route is a GET answering 200 on success. Remote coordinators call
//! `install` and `approve` when they delegate a step to this organization.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::{DeployError, StepError};
use crate::lifecycle::{ApproveOutcome, ApproveRequest};
use crate::workflow::{Coordinator, DeployReport};

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

/// Failure of an HTTP request
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Step(#[from] StepError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Deploy(_) | ApiError::Step(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, format!("Error: {}", self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Create the coordinator router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:channel/deploy/:chaincode", get(deploy))
        .route("/install/:chaincode", get(install))
        .route(
            "/:channel/approve/:chaincode/:sequence/:ccid",
            get(approve),
        )
        .route("/:channel/installed/:chaincode", get(installed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("ccdeploy listening on {}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("ccdeploy shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

async fn deploy(
    State(state): State<AppState>,
    Path((channel, chaincode)): Path<(String, String)>,
) -> ApiResult<Json<DeployReport>> {
    let report = state.coordinator.deploy(&channel, &chaincode).await?;
    Ok(Json(report))
}

async fn install(
    State(state): State<AppState>,
    Path(chaincode): Path<String>,
) -> ApiResult<String> {
    let package_id = state.coordinator.install(&chaincode).await?;
    Ok(package_id.unwrap_or_default())
}

async fn approve(
    State(state): State<AppState>,
    Path((channel, chaincode, sequence, package_id)): Path<(String, String, u64, String)>,
) -> ApiResult<&'static str> {
    let request = ApproveRequest {
        channel,
        chaincode,
        sequence,
        package_id,
    };

    let outcome = state.coordinator.approve(&request).await?;
    Ok(match outcome {
        ApproveOutcome::Approved => "approved",
        ApproveOutcome::AlreadyApproved => "already approved",
    })
}

async fn installed(
    State(state): State<AppState>,
    Path((channel, chaincode)): Path<(String, String)>,
) -> ApiResult<String> {
    state
        .coordinator
        .installed(&channel, &chaincode)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "{} is not installed for channel {}",
                chaincode, channel
            ))
        })
}
