use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use futures::TryStreamExt;
use judoc_engine::Engine;
use judoc_types::ObjectKey;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;

use crate::error::{ServerError, ServerResult};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

fn scoped_key(namespace: String, key: String) -> ServerResult<ObjectKey> {
    ObjectKey::new(namespace, key).map_err(|_| ServerError::BadPath)
}

fn unscoped_key(key: String) -> ServerResult<ObjectKey> {
    ObjectKey::unscoped(key).map_err(|_| ServerError::BadPath)
}

// ---- /io/{namespace}/{key} ----

pub async fn put_object(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    body: Body,
) -> ServerResult<&'static str> {
    store(&state, scoped_key(namespace, key)?, body).await
}

pub async fn get_object(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> ServerResult<Response> {
    fetch(&state, scoped_key(namespace, key)?).await
}

pub async fn delete_object(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> ServerResult<&'static str> {
    remove(&state, scoped_key(namespace, key)?).await
}

/// `/io/{namespace}` with no key.
pub async fn missing_key() -> ServerError {
    ServerError::BadPath
}

pub async fn unknown_method() -> ServerError {
    ServerError::UnknownMethod
}

// ---- /set, /get, /delete (empty namespace) ----

pub async fn set_unscoped(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Body,
) -> ServerResult<&'static str> {
    store(&state, unscoped_key(key)?, body).await
}

pub async fn get_unscoped(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    fetch(&state, unscoped_key(key)?).await
}

pub async fn delete_unscoped(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ServerResult<&'static str> {
    remove(&state, unscoped_key(key)?).await
}

async fn store(state: &AppState, key: ObjectKey, body: Body) -> ServerResult<&'static str> {
    let input = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    state.engine.write(&key, input).await?;
    Ok("OK")
}

async fn fetch(state: &AppState, key: ObjectKey) -> ServerResult<Response> {
    let reader = state.engine.read(&key).await?;
    let stream = reader.into_stream().inspect_err(move |e| {
        tracing::warn!(key = %key, error = %e, "read failed mid-stream; aborting response");
    });
    Ok((
        [(CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn remove(state: &AppState, key: ObjectKey) -> ServerResult<&'static str> {
    state.engine.delete(&key).await?;
    Ok("OK")
}
