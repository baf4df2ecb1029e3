//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Dispatch weather queries to the orchestrator
//! - Apply configuration reloads without losing shared state

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::http::request::{
    propagate_request_id_layer, set_request_id_layer, CityQuery, RequestIdExt,
};
use crate::http::response;
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::store::{Clock, Store};
use crate::upstream::{ForecastSource, WeatherApiClient};
use crate::weather::normalize_city;

/// Headroom of the HTTP timeout over the orchestrator deadline.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Everything a handler needs, swapped as a unit on reload.
pub struct RuntimeState {
    pub config: GatewayConfig,
    pub orchestrator: Orchestrator,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<RuntimeState>>,
}

impl AppState {
    pub fn load(&self) -> Arc<RuntimeState> {
        self.inner.load_full()
    }
}

/// Builds the provider for a given configuration.
pub type SourceFactory = Arc<dyn Fn(&GatewayConfig) -> GatewayResult<Arc<dyn ForecastSource>> + Send + Sync>;

/// HTTP server for the weather gateway.
pub struct HttpServer {
    state: AppState,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    source_factory: SourceFactory,
}

impl HttpServer {
    /// Create a server talking to the provider configured in `config.upstream`.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> GatewayResult<Self> {
        let factory: SourceFactory = Arc::new(
            |config: &GatewayConfig| -> GatewayResult<Arc<dyn ForecastSource>> {
                let client = WeatherApiClient::new(&config.upstream, &config.retries)?;
                Ok(Arc::new(client))
            },
        );
        Self::with_source_factory(config, store, clock, factory)
    }

    /// Create a server with a custom provider constructor.
    pub fn with_source_factory(
        config: GatewayConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        source_factory: SourceFactory,
    ) -> GatewayResult<Self> {
        let runtime = build_runtime(config, &store, &clock, &source_factory)?;
        Ok(Self {
            state: AppState {
                inner: Arc::new(ArcSwap::from_pointee(runtime)),
            },
            store,
            clock,
            source_factory,
        })
    }

    /// Shared state, e.g. for the admin router.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/weather", get(weather_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                request_timeout,
            ))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Serve until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router();

        let state = self.state.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        let factory = self.source_factory.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                match build_runtime(new_config, &store, &clock, &factory) {
                    Ok(runtime) => {
                        state.inner.store(Arc::new(runtime));
                        tracing::info!("Configuration reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected configuration reload");
                    }
                }
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn build_runtime(
    config: GatewayConfig,
    store: &Arc<dyn Store>,
    clock: &Arc<dyn Clock>,
    factory: &SourceFactory,
) -> GatewayResult<RuntimeState> {
    let source = factory(&config)?;
    let orchestrator = Orchestrator::new(&config, store.clone(), clock.clone(), source);
    Ok(RuntimeState {
        config,
        orchestrator,
    })
}

/// Outer timeout, read from the live config so reloads apply to it.
async fn request_timeout(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let limit = state.load().config.timeouts.request() + HTTP_TIMEOUT_SLACK;
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "Request timed out");
            response::request_timed_out(limit)
        }
    }
}

/// `GET /weather?city=<name>`
async fn weather_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<CityQuery>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = headers.request_id().to_string();

    let raw_city = match query {
        Ok(Query(params)) => params.city.unwrap_or_default(),
        Err(rejection) => {
            metrics::record_request("invalid", start);
            return response::invalid_city(rejection.body_text());
        }
    };

    let city_key = match normalize_city(&raw_city) {
        Ok(key) => key,
        Err(GatewayError::Validation(reason)) => {
            tracing::debug!(request_id = %request_id, reason = %reason, "Rejected city");
            metrics::record_request("invalid", start);
            return response::invalid_city(reason);
        }
        Err(other) => {
            metrics::record_request("invalid", start);
            return response::invalid_city(other.to_string());
        }
    };

    let runtime = state.load();
    let outcome = runtime
        .orchestrator
        .query(&city_key)
        .instrument(tracing::info_span!("weather_query", request_id = %request_id))
        .await;

    metrics::record_request(outcome.label(), start);
    tracing::info!(
        request_id = %request_id,
        city = %city_key,
        outcome = outcome.label(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Weather query served"
    );

    let unavailable_status = StatusCode::from_u16(runtime.config.response.unavailable_status)
        .unwrap_or(StatusCode::OK);
    response::render_outcome(&outcome, unavailable_status)
}

/// `GET /health`
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
