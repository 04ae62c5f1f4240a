//! Router construction and request handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use dhstore_core::{CoreError, HashedValueKey, Multihash};
use dhstore_storage::{DhStore, RocksDhStore};

use crate::error::ApiError;
use crate::model::{
    EncryptedMultihashResult, GetMetadataResponse, LookupResponse, MergeIndexRequest,
    PutMetadataRequest,
};

/// Shared state behind every handler.
pub struct AppState {
    /// The store the API serves.
    pub store: RocksDhStore,
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/multihash", put(put_multihashes).delete(delete_multihashes))
        .route("/multihash/:multihash", get(lookup_multihash))
        .route("/metadata", put(put_metadata))
        .route("/metadata/:key", get(get_metadata).delete(delete_metadata))
        .route("/ready", get(ready))
        .layer(middleware::from_fn(crate::metrics::track_http_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type Payload<T> = Result<Json<T>, JsonRejection>;

fn accept<T>(payload: Payload<T>) -> Result<T, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(body)
}

async fn put_multihashes(
    State(state): State<Arc<AppState>>,
    payload: Payload<MergeIndexRequest>,
) -> Result<StatusCode, ApiError> {
    let request = accept(payload)?;
    if request.merges.is_empty() {
        return Err(ApiError::BadRequest("at least one merge must be specified".into()));
    }
    let count = request.merges.len();
    let sample = request.merges[0].key.to_base58();
    state.store.merge_indexes(request.merges)?;
    info!(count, sample, "merged multihashes");
    Ok(StatusCode::ACCEPTED)
}

async fn delete_multihashes(
    State(state): State<Arc<AppState>>,
    payload: Payload<MergeIndexRequest>,
) -> Result<StatusCode, ApiError> {
    let request = accept(payload)?;
    if request.merges.is_empty() {
        return Err(ApiError::BadRequest("at least one removal must be specified".into()));
    }
    let count = request.merges.len();
    state.store.delete_indexes(request.merges)?;
    info!(count, "deleted indexes");
    Ok(StatusCode::ACCEPTED)
}

async fn lookup_multihash(
    State(state): State<Arc<AppState>>,
    Path(multihash): Path<String>,
) -> Result<Json<LookupResponse>, ApiError> {
    let mh = Multihash::from_base58(&multihash).map_err(ApiError::from)?;
    let encrypted_value_keys = state.store.lookup(&mh)?;
    if encrypted_value_keys.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(Json(LookupResponse {
        encrypted_multihash_results: vec![EncryptedMultihashResult {
            multihash: mh,
            encrypted_value_keys,
        }],
    }))
}

async fn put_metadata(
    State(state): State<Arc<AppState>>,
    payload: Payload<PutMetadataRequest>,
) -> Result<StatusCode, ApiError> {
    let request = accept(payload)?;
    let key_len = request.key.len();
    let value_len = request.value.len();
    state.store.put_metadata(&request.key, &request.value)?;
    info!(key_len, value_len, "stored metadata");
    Ok(StatusCode::ACCEPTED)
}

async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<GetMetadataResponse>, ApiError> {
    let hvk = decode_hashed_value_key(&key)?;
    match state.store.get_metadata(&hvk)? {
        Some(em) if !em.is_empty() => Ok(Json(GetMetadataResponse { encrypted_metadata: em })),
        _ => Err(ApiError::NotFound),
    }
}

async fn delete_metadata(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let hvk = decode_hashed_value_key(&key)?;
    state.store.delete_metadata(&hvk)?;
    Ok(StatusCode::OK)
}

async fn ready() -> impl IntoResponse {
    (StatusCode::OK, [(header::CACHE_CONTROL, "no-cache")], env!("CARGO_PKG_VERSION"))
}

fn decode_hashed_value_key(encoded: &str) -> Result<HashedValueKey, ApiError> {
    bs58::decode(encoded).into_vec().map(HashedValueKey::new).map_err(|e| {
        ApiError::from(CoreError::InvalidHashedValueKey {
            key: encoded.to_owned(),
            reason: e.to_string(),
        })
    })
}
