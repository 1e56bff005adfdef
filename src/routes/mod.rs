//! Route handlers
//!
//! Handlers build `Response<Full<Bytes>>` directly; the server module owns
//! listening, dispatch and auth. Stored records cross the wire as relaxed
//! extended JSON.

pub mod gists;
pub mod health;
pub mod links;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;

use crate::types::GatewayError;

pub use gists::{
    handle_batch_update, handle_get_gist, handle_gist_links, handle_list_gists,
    handle_update_status, handle_update_with_links, handle_workflow_status,
};
pub use health::{health_check, version_info};
pub use links::{handle_get_link, handle_list_links};

/// JSON response with CORS headers
pub fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*");
    match builder.body(Full::new(Bytes::from(body.to_string()))) {
        Ok(response) => response,
        // Status and headers are static; building cannot fail in practice
        Err(_) => Response::new(Full::new(Bytes::new())),
    }
}

/// Error mapped through [`GatewayError::status_code`]
pub fn error_response(error: &GatewayError) -> Response<Full<Bytes>> {
    json_response(
        error.status_code(),
        &serde_json::json!({ "error": error.to_string() }),
    )
}

/// Collect and parse a JSON request body; malformed bodies are a 400
pub async fn read_json(req: Request<Incoming>) -> Result<Value, GatewayError> {
    let bytes = req
        .collect()
        .await
        .map_err(|e| GatewayError::InvalidInput(format!("failed to read body: {}", e)))?
        .to_bytes();
    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::InvalidInput(format!("invalid JSON body: {}", e)))
}

/// A stored record as relaxed extended JSON
pub fn record_json(record: bson::Document) -> Value {
    bson::Bson::Document(record).into_relaxed_extjson()
}
