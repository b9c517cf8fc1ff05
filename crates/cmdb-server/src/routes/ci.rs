use super::with_store;
use crate::error::ApiError;
use crate::payload::{
    bulk_report, from_value, index_param, item_id, parse_body, required_param, success,
    ItemOutcome, NewCi, OneOrMany,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use cmdb::{Ci, CiFilter, Cmdb};
use serde_json::{json, Value};
use std::collections::HashMap;

/// `GET /ci` with optional `id`, `name`, `type`, `level` and `has_props`
/// filters. With `start` the search is limited to CIs exactly `steps` hops
/// (default 1) away from that CI.
pub(super) async fn search(
    State(cmdb): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let filter = CiFilter::from_params(&params)?;
    let traversal = match params.get("start") {
        Some(start) => {
            let steps = if params.contains_key("steps") {
                index_param(&params, "steps")?
            } else {
                1
            };
            Some((start.clone(), steps))
        }
        None => None,
    };

    let cis = with_store(cmdb, move |cmdb| {
        Ok(match traversal {
            Some((start, steps)) => cmdb
                .get_cis_at_distance(&start, steps)
                .into_iter()
                .filter(|ci| filter.matches(ci))
                .collect(),
            None => cmdb.find_cis(&filter),
        })
    })
    .await?;

    Ok(Json(cis.iter().map(Ci::as_structured).collect()))
}

fn insert_one(cmdb: &Cmdb, value: Value) -> Result<(String, Value), ApiError> {
    let ci = Ci::from(from_value::<NewCi>(value)?);
    let structured = ci.as_structured();
    let message = format!("CI '{}' added", ci.id());
    cmdb.add_ci(ci)?;
    Ok((message, structured))
}

/// `POST /ci` with one CI object or an array of them.
pub(super) async fn add(
    State(cmdb): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    match OneOrMany::from(parse_body(&body)?) {
        OneOrMany::One(value) => {
            let (message, ci) = with_store(cmdb, move |cmdb| insert_one(cmdb, value)).await?;
            Ok(success(message, json!({ "ci": ci })))
        }
        OneOrMany::Many(values) => {
            let outcomes = with_store(cmdb, move |cmdb| {
                Ok(values
                    .into_iter()
                    .map(|value| {
                        let label = item_id(&value);
                        let result = insert_one(cmdb, value).map(|(message, _)| message);
                        ItemOutcome::new(label, result)
                    })
                    .collect::<Vec<_>>())
            })
            .await?;
            Ok(bulk_report("added", outcomes))
        }
    }
}

fn update_one(cmdb: &Cmdb, value: &Value) -> Result<(String, String, bool), ApiError> {
    let (id, changed) = cmdb.apply_json_update(value)?;
    let message = if changed {
        format!("CI '{id}' updated")
    } else {
        format!("CI '{id}' unchanged")
    };
    Ok((message, id, changed))
}

/// `PATCH /ci` with one update object or an array of them. Each update names
/// its CI by `id`.
pub(super) async fn update(
    State(cmdb): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    match OneOrMany::from(parse_body(&body)?) {
        OneOrMany::One(value) => {
            let (message, id, changed) =
                with_store(cmdb, move |cmdb| update_one(cmdb, &value)).await?;
            Ok(success(message, json!({ "id": id, "changed": changed })))
        }
        OneOrMany::Many(values) => {
            let outcomes = with_store(cmdb, move |cmdb| {
                Ok(values
                    .iter()
                    .map(|value| {
                        let result = update_one(cmdb, value).map(|(message, _, _)| message);
                        ItemOutcome::new(item_id(value), result)
                    })
                    .collect::<Vec<_>>())
            })
            .await?;
            Ok(bulk_report("updated", outcomes))
        }
    }
}

/// `DELETE /ci?id=` removes a CI and every relationship touching it.
pub(super) async fn remove(
    State(cmdb): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let id = required_param(&params, "id")?.to_string();
    let message = format!("CI '{id}' removed");
    with_store(cmdb, move |cmdb| Ok(cmdb.remove_ci(&id).map(drop)?)).await?;
    Ok(success(message, json!({})))
}
