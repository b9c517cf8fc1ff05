//! Route table for the `/api/v1/data` API.

mod all;
mod ci;
mod level;
mod props;
mod relationship;

use crate::error::ApiError;
use crate::AppState;
use cmdb::Cmdb;
use axum::{
    extract::OriginalUri,
    http::StatusCode,
    routing::get,
    Router,
};

/// Path prefix every endpoint lives under.
pub const API_PREFIX: &str = "/api/v1/data";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/all", get(all::dump).fallback(method_not_allowed))
        .route(
            "/level",
            get(level::list)
                .post(level::add)
                .patch(level::rename)
                .delete(level::remove)
                .fallback(method_not_allowed),
        )
        .route(
            "/ci",
            get(ci::search)
                .post(ci::add)
                .patch(ci::update)
                .delete(ci::remove)
                .fallback(method_not_allowed),
        )
        .route(
            "/relationship",
            get(relationship::search)
                .post(relationship::add)
                .delete(relationship::remove)
                .fallback(method_not_allowed),
        )
        .route("/props", get(props::list).fallback(method_not_allowed))
        .fallback(unknown_endpoint);

    Router::new()
        .nest(API_PREFIX, api)
        .fallback(outside_api)
        .with_state(state)
}

/// Run a store operation on the blocking thread pool.
///
/// Store calls take the store locks, which a save holds for the whole file
/// write, so they must not run on a runtime worker.
pub(crate) async fn with_store<T, F>(cmdb: AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Cmdb) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&cmdb))
        .await
        .map_err(|e| ApiError::Internal(format!("Store task failed: {e}")))?
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn unknown_endpoint(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound(format!("Unknown endpoint: {}", uri.path()))
}

async fn outside_api() -> StatusCode {
    StatusCode::NO_CONTENT
}
