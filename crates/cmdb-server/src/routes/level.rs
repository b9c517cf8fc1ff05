use super::with_store;
use crate::error::ApiError;
use crate::payload::{from_value, index_param, parse_body, success, LevelRename, NewLevel};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use cmdb::CmdbError;
use serde_json::{json, Value};
use std::collections::HashMap;

fn level_json(id: usize, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

/// `GET /level` lists every level; `?id=` returns one.
pub(super) async fn list(
    State(cmdb): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    if params.contains_key("id") {
        let index = index_param(&params, "id")?;
        let name = with_store(cmdb, move |cmdb| {
            cmdb.level_name(index).ok_or_else(|| {
                ApiError::from(CmdbError::LevelNotFound {
                    index,
                    count: cmdb.level_count(),
                })
            })
        })
        .await?;
        return Ok(Json(level_json(index, &name)));
    }

    let levels: Vec<Value> = with_store(cmdb, |cmdb| Ok(cmdb.levels()))
        .await?
        .iter()
        .enumerate()
        .map(|(index, name)| level_json(index, name))
        .collect();
    Ok(Json(Value::Array(levels)))
}

/// `POST /level` appends `{name}`.
pub(super) async fn add(
    State(cmdb): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: NewLevel = from_value(parse_body(&body)?)?;
    let name = payload.name.clone();
    let index = with_store(cmdb, move |cmdb| Ok(cmdb.add_level(&payload.name)?)).await?;
    Ok(success(
        format!("Level '{name}' added"),
        json!({ "level": level_json(index, &name) }),
    ))
}

/// `PATCH /level` renames `{id, name}`.
pub(super) async fn rename(
    State(cmdb): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: LevelRename = from_value(parse_body(&body)?)?;
    let (id, name) = (payload.id, payload.name.clone());
    with_store(cmdb, move |cmdb| {
        Ok(cmdb.rename_level(payload.id, &payload.name)?)
    })
    .await?;
    Ok(success(
        format!("Level {id} renamed to '{name}'"),
        json!({ "level": level_json(id, &name) }),
    ))
}

/// `DELETE /level?id=` removes an unused level.
pub(super) async fn remove(
    State(cmdb): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let index = index_param(&params, "id")?;
    let name = with_store(cmdb, move |cmdb| Ok(cmdb.remove_level(index)?)).await?;
    Ok(success(format!("Level '{name}' removed"), json!({})))
}
