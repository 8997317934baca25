use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use thiserror::Error;
use tracing::debug;

/// Reasons a snapshot could not be loaded. Every one of them is retried.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to fetch snapshot: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("upstream answered with {0}")]
    UnexpectedStatus(StatusCode),
}

/// A document fetched once from upstream and served from memory afterwards.
struct Snapshot {
    content_type: HeaderValue,
    body: Bytes,
}

async fn serve_snapshot(State(snapshot): State<Arc<Snapshot>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, snapshot.content_type.clone())],
        snapshot.body.clone(),
    )
}

/// Fetch the document at `url` and build the router serving it on `/`.
pub async fn load(client: reqwest::Client, url: String) -> Result<Router, SnapshotError> {
    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SnapshotError::UnexpectedStatus(status));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let body = response.bytes().await?;
    debug!(url = %url, bytes = body.len(), "loaded snapshot");

    let snapshot = Arc::new(Snapshot { content_type, body });
    Ok(Router::new()
        .route("/", get(serve_snapshot))
        .with_state(snapshot))
}
