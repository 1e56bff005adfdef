//! HTTP server
//!
//! hyper http1 with TokioIo, one spawned task per connection. Dispatch is
//! a match over the method and path segments; the `batch` literal arm
//! sits above the `{gistId}` arms so a gist can never be named "batch".

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::routes;
use crate::service::ContentService;
use crate::types::GatewayError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub service: Arc<ContentService>,
}

pub async fn run(state: Arc<AppState>) -> Result<(), GatewayError> {
    let listener = TcpListener::bind(state.args.listen)
        .await
        .map_err(|e| GatewayError::Store(format!("failed to bind {}: {}", state.args.listen, e)))?;

    info!("Gateway listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - authentication disabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Whether the request carries the configured service API key. Health
/// probes and preflights stay open; everything else is gated when a key
/// is configured and dev mode is off.
fn authorized(state: &AppState, req: &Request<Incoming>, path: &str) -> bool {
    if state.args.dev_mode {
        return true;
    }
    let Some(expected) = &state.args.service_api_key else {
        return true;
    };
    if matches!(path, "/health" | "/healthz" | "/version") {
        return true;
    }
    req.headers()
        .get("X-API-Key")
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str())
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    if !authorized(&state, &req, &path) {
        return Ok(unauthorized_response());
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (method, segments.as_slice()) {
        (Method::GET, ["health"]) | (Method::GET, ["healthz"]) => {
            routes::health_check(Arc::clone(&state))
        }
        (Method::GET, ["version"]) => routes::version_info(),

        (Method::PUT, ["gists", user_id, "batch", "status"]) => {
            let user_id = user_id.to_string();
            routes::handle_batch_update(req, Arc::clone(&state), &user_id).await
        }

        (Method::GET, ["gists", user_id]) => {
            routes::handle_list_gists(Arc::clone(&state), user_id).await
        }
        (Method::GET, ["gists", user_id, gist_id]) => {
            routes::handle_get_gist(Arc::clone(&state), user_id, gist_id).await
        }
        (Method::GET, ["gists", user_id, gist_id, "links"]) => {
            routes::handle_gist_links(Arc::clone(&state), user_id, gist_id).await
        }
        (Method::PUT, ["gists", user_id, gist_id, "status"]) => {
            let (user_id, gist_id) = (user_id.to_string(), gist_id.to_string());
            routes::handle_update_status(req, Arc::clone(&state), &user_id, &gist_id).await
        }
        (Method::PUT, ["gists", user_id, gist_id, "with-links"]) => {
            let (user_id, gist_id) = (user_id.to_string(), gist_id.to_string());
            routes::handle_update_with_links(req, Arc::clone(&state), &user_id, &gist_id).await
        }
        (Method::PUT, ["gists", user_id, gist_id, "workflow-status"]) => {
            let (user_id, gist_id) = (user_id.to_string(), gist_id.to_string());
            routes::handle_workflow_status(req, Arc::clone(&state), &user_id, &gist_id).await
        }

        (Method::GET, ["links", user_id]) => {
            routes::handle_list_links(Arc::clone(&state), user_id).await
        }
        (Method::GET, ["links", user_id, link_id]) => {
            routes::handle_get_link(Arc::clone(&state), user_id, link_id).await
        }

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, PUT, OPTIONS")
        .body(Full::new(Bytes::new()));
    match response {
        Ok(response) => response,
        Err(_) => Response::new(Full::new(Bytes::new())),
    }
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not Found", "path": path }),
    )
}

fn unauthorized_response() -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::UNAUTHORIZED,
        &serde_json::json!({ "error": "Unauthorized", "message": "missing or invalid X-API-Key" }),
    )
}
