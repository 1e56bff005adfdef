//! Link read endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::routes::{error_response, json_response, record_json};
use crate::server::AppState;

/// GET /links/{userId}
pub async fn handle_list_links(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    match state.service.get_links(user_id).await {
        Ok(links) => {
            let body: Vec<_> = links.into_iter().map(record_json).collect();
            json_response(StatusCode::OK, &serde_json::json!(body))
        }
        Err(e) => error_response(&e),
    }
}

/// GET /links/{userId}/{linkId}
pub async fn handle_get_link(
    state: Arc<AppState>,
    user_id: &str,
    link_id: &str,
) -> Response<Full<Bytes>> {
    match state.service.get_link(user_id, link_id).await {
        Ok(link) => json_response(StatusCode::OK, &record_json(link)),
        Err(e) => error_response(&e),
    }
}
