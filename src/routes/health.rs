//! Health and version endpoints
//!
//! Liveness only: the gateway holds no long-lived store connections worth
//! probing beyond startup, so /health reports 200 whenever the process is
//! serving.

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::routes::json_response;
use crate::server::AppState;

pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "healthy": true,
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": if state.args.dev_mode { "development" } else { "production" },
        "timestamp": Utc::now().to_rfc3339(),
    });
    json_response(StatusCode::OK, &body)
}

pub fn version_info() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    });
    json_response(StatusCode::OK, &body)
}
