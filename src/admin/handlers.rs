use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::AppState;
use crate::orchestrator::DataSource;
use crate::resilience::{BreakerSnapshot, WindowStatus};
use crate::store::StoreError;
use crate::weather::normalize_city;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub breaker: BreakerSnapshot,
    pub rate_limit: WindowStatus,
}

#[derive(Serialize)]
pub struct CacheEntryStatus {
    pub city_key: String,
    pub freshness: DataSource,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub location: String,
}

fn store_unavailable(err: StoreError) -> Response {
    tracing::error!(error = %err, "Admin query failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

pub async fn get_status(State(state): State<AppState>) -> Response {
    let runtime = state.load();
    let orchestrator = &runtime.orchestrator;
    let now = orchestrator.clock().now();

    let breaker = match orchestrator.breaker().snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return store_unavailable(e),
    };
    let rate_limit = match orchestrator.limiter().current_count(now).await {
        Ok(window) => window,
        Err(e) => return store_unavailable(e),
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        breaker,
        rate_limit,
    })
    .into_response()
}

pub async fn get_breaker(State(state): State<AppState>) -> Response {
    match state.load().orchestrator.breaker().snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => store_unavailable(e),
    }
}

pub async fn get_limiter(State(state): State<AppState>) -> Response {
    let runtime = state.load();
    let now = runtime.orchestrator.clock().now();
    match runtime.orchestrator.limiter().current_count(now).await {
        Ok(window) => Json(window).into_response(),
        Err(e) => store_unavailable(e),
    }
}

pub async fn get_cache_entry(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Response {
    let city_key = match normalize_city(&city) {
        Ok(key) => key,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    };

    let runtime = state.load();
    let now = runtime.orchestrator.clock().now();
    match runtime.orchestrator.cache().get_stale(&city_key).await {
        Ok(Some(record)) => Json(CacheEntryStatus {
            freshness: if record.is_fresh(now) {
                DataSource::Cached
            } else {
                DataSource::Stale
            },
            city_key,
            fetched_at: record.fetched_at,
            expires_at: record.expires_at,
            location: record.payload.location.name,
        })
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "not cached", "city_key": city_key })),
        )
            .into_response(),
        Err(e) => store_unavailable(e),
    }
}
