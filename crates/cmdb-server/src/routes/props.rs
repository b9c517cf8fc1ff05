use super::with_store;
use crate::error::ApiError;
use crate::AppState;
use axum::{extract::State, Json};

/// `GET /props`: property names currently in use, sorted.
pub(super) async fn list(State(cmdb): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let names = with_store(cmdb, |cmdb| Ok(cmdb.property_names())).await?;
    Ok(Json(names))
}
