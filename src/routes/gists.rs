//! Gist endpoints: reads, status transitions, batch and cascade updates
//!
//! The wire contract uses `inProduction`; stored records use
//! `in_production`. Translation happens here and only here.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use bson::{doc, Document};

use crate::engine::BatchItemOutcome;
use crate::routes::{error_response, json_response, read_json, record_json};
use crate::server::AppState;
use crate::types::gist::ProductionStatus;
use crate::types::GatewayError;

/// Validate the shared status body: `inProduction` boolean plus a
/// canonical `production_status`. Anything else is a 400.
fn parse_status_body(body: &Value) -> Result<Document, GatewayError> {
    let in_production = body
        .get("inProduction")
        .and_then(Value::as_bool)
        .ok_or_else(|| GatewayError::InvalidInput("inProduction must be a boolean".into()))?;
    let raw_status = body
        .get("production_status")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidInput("production_status must be a string".into()))?;
    let status = ProductionStatus::parse_strict(raw_status).ok_or_else(|| {
        GatewayError::InvalidInput(format!(
            "production_status must be draft, review or published, got '{}'",
            raw_status
        ))
    })?;

    Ok(doc! {
        "in_production": in_production,
        "production_status": status.as_str(),
    })
}

fn string_array(body: &Value, field: &str) -> Result<Vec<String>, GatewayError> {
    body.get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::InvalidInput(format!("{} must be an array", field)))?
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                GatewayError::InvalidInput(format!("{} must contain only strings", field))
            })
        })
        .collect()
}

/// GET /gists/{userId}
pub async fn handle_list_gists(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    match state.service.get_gists(user_id).await {
        Ok(gists) => {
            let body: Vec<_> = gists.into_iter().map(record_json).collect();
            json_response(StatusCode::OK, &serde_json::json!(body))
        }
        Err(e) => error_response(&e),
    }
}

/// GET /gists/{userId}/{gistId}
pub async fn handle_get_gist(
    state: Arc<AppState>,
    user_id: &str,
    gist_id: &str,
) -> Response<Full<Bytes>> {
    match state.service.get_gist(user_id, gist_id).await {
        Ok(gist) => json_response(StatusCode::OK, &record_json(gist)),
        Err(e) => error_response(&e),
    }
}

/// GET /gists/{userId}/{gistId}/links
pub async fn handle_gist_links(
    state: Arc<AppState>,
    user_id: &str,
    gist_id: &str,
) -> Response<Full<Bytes>> {
    match state.service.get_gist_links(user_id, gist_id).await {
        Ok(links) => {
            let body: Vec<_> = links.into_iter().map(record_json).collect();
            json_response(StatusCode::OK, &serde_json::json!(body))
        }
        Err(e) => error_response(&e),
    }
}

/// PUT /gists/{userId}/{gistId}/status
pub async fn handle_update_status(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: &str,
    gist_id: &str,
) -> Response<Full<Bytes>> {
    let result = async {
        let body = read_json(req).await?;
        let patch = parse_status_body(&body)?;
        state.service.update_gist_status(user_id, gist_id, &patch).await
    }
    .await;

    match result {
        Ok(updated) => json_response(StatusCode::OK, &record_json(updated)),
        Err(e) => error_response(&e),
    }
}

/// PUT /gists/{userId}/{gistId}/workflow-status
pub async fn handle_workflow_status(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: &str,
    gist_id: &str,
) -> Response<Full<Bytes>> {
    let result = async {
        let body = read_json(req).await?;
        let label = body
            .get("status")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GatewayError::InvalidInput("status must be a non-empty string".into())
            })?;
        state
            .service
            .update_gist_workflow_status(user_id, gist_id, label)
            .await
    }
    .await;

    match result {
        Ok(updated) => json_response(StatusCode::OK, &record_json(updated)),
        Err(e) => error_response(&e),
    }
}

/// PUT /gists/{userId}/batch/status
pub async fn handle_batch_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: &str,
) -> Response<Full<Bytes>> {
    let result = async {
        let body = read_json(req).await?;
        let gist_ids = string_array(&body, "gistIds")?;
        let patch = parse_status_body(&body)?;
        let updates = gist_ids
            .into_iter()
            .map(|id| (id, patch.clone()))
            .collect();
        state.service.batch_update_gists(user_id, updates).await
    }
    .await;

    match result {
        Ok(outcome) => {
            let results: Vec<Value> = outcome
                .items
                .iter()
                .map(|item| match &item.outcome {
                    BatchItemOutcome::Updated(_) => serde_json::json!({
                        "gistId": item.gist_id,
                        "status": "updated",
                    }),
                    BatchItemOutcome::NotFound => serde_json::json!({
                        "gistId": item.gist_id,
                        "status": "not_found",
                    }),
                    BatchItemOutcome::Failed(message) => serde_json::json!({
                        "gistId": item.gist_id,
                        "status": "failed",
                        "error": message,
                    }),
                })
                .collect();
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "count": outcome.count, "results": results }),
            )
        }
        Err(e) => error_response(&e),
    }
}

/// PUT /gists/{userId}/{gistId}/with-links
pub async fn handle_update_with_links(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: &str,
    gist_id: &str,
) -> Response<Full<Bytes>> {
    let result = async {
        let body = read_json(req).await?;
        let patch = parse_status_body(&body)?;
        let replacement = if body.get("links").is_some() {
            Some(string_array(&body, "links")?)
        } else {
            None
        };
        state
            .service
            .update_gist_and_links(user_id, gist_id, &patch, replacement.as_deref())
            .await
    }
    .await;

    match result {
        Ok(updated) => json_response(StatusCode::OK, &record_json(updated)),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_requires_both_fields() {
        assert!(parse_status_body(&serde_json::json!({ "inProduction": true })).is_err());
        assert!(
            parse_status_body(&serde_json::json!({ "production_status": "draft" })).is_err()
        );
        let patch = parse_status_body(&serde_json::json!({
            "inProduction": true,
            "production_status": "review",
        }))
        .unwrap();
        assert!(patch.get_bool("in_production").unwrap());
        assert_eq!(patch.get_str("production_status").unwrap(), "review");
    }

    #[test]
    fn test_status_body_rejects_free_text_label() {
        let err = parse_status_body(&serde_json::json!({
            "inProduction": false,
            "production_status": "Processing Audio",
        }))
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[test]
    fn test_status_body_rejects_wrong_types() {
        let err = parse_status_body(&serde_json::json!({
            "inProduction": "yes",
            "production_status": "draft",
        }))
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[test]
    fn test_string_array_validation() {
        let body = serde_json::json!({ "gistIds": ["a", "b"] });
        assert_eq!(string_array(&body, "gistIds").unwrap(), vec!["a", "b"]);

        let bad = serde_json::json!({ "gistIds": ["a", 1] });
        assert!(string_array(&bad, "gistIds").is_err());

        let missing = serde_json::json!({});
        assert!(string_array(&missing, "gistIds").is_err());
    }
}
