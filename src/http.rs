use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::capability::Capabilities;
use crate::event_bus::{StatusEvent, TriggerEvent};
use crate::orchestrator::Orchestrator;
use crate::unit::UnitDescriptor;
use crate::unit_registry::UnitRegistry;
use crate::{Error, OmnitideResult};

pub const LIVENESS_TEXT: &str = "Omnitide Core is running!";

pub type AppState = Arc<Orchestrator>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub name: String,
    pub type_name: String,
    pub display_name: String,
    pub capabilities: Capabilities,
    pub registered_at: DateTime<Utc>,
}

impl From<&UnitDescriptor> for UnitView {
    fn from(descriptor: &UnitDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            type_name: descriptor.type_name().to_string(),
            display_name: descriptor.display_name(),
            capabilities: descriptor.capabilities().clone(),
            registered_at: descriptor.registered_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitsResponse {
    pub agents: Vec<UnitView>,
    pub modules: Vec<UnitView>,
}

fn views(registry: &UnitRegistry) -> Vec<UnitView> {
    registry.snapshot().iter().map(UnitView::from).collect()
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/units", get(list_units))
        .route("/trigger", post(trigger))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

async fn list_units(State(orchestrator): State<AppState>) -> Json<UnitsResponse> {
    let registries = orchestrator.registries();
    Json(UnitsResponse {
        agents: views(&registries.agents),
        modules: views(&registries.modules),
    })
}

async fn trigger(
    State(orchestrator): State<AppState>,
    Json(trigger): Json<TriggerEvent>,
) -> Json<StatusEvent> {
    Json(orchestrator.trigger(trigger).await)
}

/// Serves the router on the configured address until `shutdown` resolves.
pub async fn serve<F>(orchestrator: AppState, shutdown: F) -> OmnitideResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let http = &orchestrator.config().http;
    let addr = format!("{}:{}", http.host, http.port)
        .parse::<SocketAddr>()
        .map_err(|e| Error::config(format!("Invalid http address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Starting server on {}", addr);

    axum::serve(listener, create_router(orchestrator.clone()))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::internal(format!("Server error: {}", e)))
}

/// Serves until `stop` resolves, then shuts the server down gracefully.
///
/// A server that ends first, e.g. because its address is taken, ends the wait
/// with its error instead of leaving the process running without it.
pub async fn serve_until<S>(orchestrator: AppState, stop: S) -> OmnitideResult<()>
where
    S: Future<Output = OmnitideResult<()>>,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(serve(orchestrator, async move {
        let _ = stop_rx.await;
    }));

    let stopped = tokio::select! {
        joined = &mut server => {
            return match joined {
                Ok(Ok(())) => Err(Error::internal("HTTP server stopped unexpectedly")),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(Error::internal(format!("HTTP server task failed: {}", e))),
            };
        }
        stopped = stop => stopped,
    };

    let _ = stop_tx.send(());
    let served = server
        .await
        .map_err(|e| Error::internal(format!("HTTP server task failed: {}", e)))?;
    stopped.and(served)
}
