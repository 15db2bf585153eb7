use std::{net::SocketAddr, path::Path, sync::Arc, time::Instant};

use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use server_api::{handle_read, handle_write, ApiContext};
use shared::protocol::{Envelope, ReadResponse, RequestParams};
use storage::Storage;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod seed;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::open(&database_url)
        .await
        .map_err(|error| {
            error!(
                %database_url,
                %error,
                "failed to open table store; verify parent directory exists and permissions are correct"
            );
            error
        })?
        .with_table_names(&settings.products_table, &settings.orders_table);

    if let Some(seed_path) = settings.products_seed_path.as_deref() {
        seed::seed_products(&storage, Path::new(seed_path)).await?;
    }

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, products = %settings.products_table, orders = %settings.orders_table, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(http_read).post(http_write))
        .route("/exec", get(http_read).post(http_write))
        .route("/healthz", get(healthz))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(oversized_body_envelope))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let response = next.run(req).await;
    info!(
        %method,
        path = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Rewrites the body limit's plain-text 413 as an error envelope.
async fn oversized_body_envelope(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    warn!(limit = MAX_BODY_BYTES, "request body too large");
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(Envelope::error("Request body too large")),
    )
        .into_response()
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match state.api.storage.health_check().await {
        Ok(()) => "ok".into_response(),
        Err(err) => {
            warn!(%err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Envelope::error(err.to_string())),
            )
                .into_response()
        }
    }
}

async fn http_read(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Vec<(String, String)>>,
) -> Json<ReadResponse> {
    let params = RequestParams::from_pairs(query);
    Json(handle_read(&state.api, &params).await)
}

async fn http_write(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Envelope> {
    let mut params = RequestParams::from_pairs(query);
    params.extend(body_params(&headers, &body));
    Json(handle_write(&state.api, &params).await)
}

/// Decodes a JSON object or form-encoded body into parameter pairs. A body
/// that cannot be decoded yields no parameters.
fn body_params(headers: &HeaderMap, body: &[u8]) -> Vec<(String, String)> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"));

    if !is_json {
        return url::form_urlencoded::parse(body).into_owned().collect();
    }

    match serde_json::from_slice::<serde_json::Map<String, Value>>(body) {
        Ok(object) => object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect(),
        Err(err) => {
            warn!(%err, "ignoring malformed json body");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
