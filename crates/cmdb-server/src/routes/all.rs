use super::with_store;
use crate::error::ApiError;
use crate::AppState;
use axum::{extract::State, Json};
use cmdb::{Ci, Relationship};
use serde_json::{json, Value};

/// `GET /all`: levels, CIs and relationships from one consistent snapshot.
pub(super) async fn dump(State(cmdb): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = with_store(cmdb, |cmdb| Ok(cmdb.snapshot())).await?;
    let cis: Vec<Value> = snapshot.cis.iter().map(Ci::as_structured).collect();
    let relationships: Vec<Value> = snapshot
        .relationships
        .iter()
        .map(Relationship::as_structured)
        .collect();

    Ok(Json(json!({
        "levels": snapshot.levels,
        "cis": cis,
        "relationships": relationships,
    })))
}
