use super::with_store;
use crate::error::ApiError;
use crate::payload::{
    bulk_report, from_value, parse_body, success, ItemOutcome, NewRelationship, OneOrMany,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use cmdb::{Cmdb, Relationship, RelationshipFilter};
use serde_json::{json, Value};
use std::collections::HashMap;

/// `GET /relationship` filtered by `source`, `destination` and `type`.
/// `*` matches anything.
pub(super) async fn search(
    State(cmdb): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let filter = RelationshipFilter::from_params(&params);
    let relationships =
        with_store(cmdb, move |cmdb| Ok(cmdb.find_relationships(&filter))).await?;
    Ok(Json(relationships.iter().map(Relationship::as_structured).collect()))
}

fn insert_one(cmdb: &Cmdb, payload: NewRelationship) -> Result<String, ApiError> {
    cmdb.add_weighted_relationship(
        &payload.source,
        &payload.destination,
        &payload.rel_type,
        payload.weight,
    )?;
    Ok(format!(
        "Relationship '{}' {} -> {} added",
        payload.rel_type, payload.source, payload.destination
    ))
}

/// `POST /relationship` with one relationship object or an array of them.
pub(super) async fn add(
    State(cmdb): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    match OneOrMany::from(parse_body(&body)?) {
        OneOrMany::One(value) => {
            let payload: NewRelationship = from_value(value)?;
            let label = payload.label();
            let message = with_store(cmdb, move |cmdb| insert_one(cmdb, payload)).await?;
            Ok(success(message, json!({ "id": label })))
        }
        OneOrMany::Many(values) => {
            let outcomes = with_store(cmdb, move |cmdb| {
                Ok(values
                    .into_iter()
                    .map(|value| match from_value::<NewRelationship>(value) {
                        Ok(payload) => {
                            let label = payload.label();
                            ItemOutcome::new(label, insert_one(cmdb, payload))
                        }
                        Err(err) => ItemOutcome::new("", Err(err)),
                    })
                    .collect::<Vec<_>>())
            })
            .await?;
            Ok(bulk_report("added", outcomes))
        }
    }
}

/// `DELETE /relationship` removes every match of the `source`,
/// `destination` and `type` filter. At least one endpoint is required.
pub(super) async fn remove(
    State(cmdb): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let filter = RelationshipFilter::from_params(&params);
    if filter.has_no_endpoint() {
        return Err(ApiError::BadRequest(
            "At least one of 'source' or 'destination' is required".to_string(),
        ));
    }

    let removed =
        with_store(cmdb, move |cmdb| Ok(cmdb.remove_relationships(&filter))).await?;
    if removed == 0 {
        return Err(ApiError::NotFound(
            "No relationship matches the given filter".to_string(),
        ));
    }
    Ok(success(
        format!("Removed {removed} relationship(s)"),
        json!({ "removed": removed }),
    ))
}
