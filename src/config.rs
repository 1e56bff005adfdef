//! Configuration for the Gista gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Gista Gateway - gist production lifecycle API
#[derive(Parser, Debug, Clone)]
#[command(name = "gista-gateway")]
#[command(about = "HTTP gateway for gist and link production transitions")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "gista")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory store fallback, relaxed auth)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// API key required from calling backend services (optional; requests
    /// are treated as trusted-backend traffic when unset)
    #[arg(long, env = "SERVICE_API_KEY")]
    pub service_api_key: Option<String>,

    /// Base URL of the external workflow engine
    #[arg(long, env = "WORKFLOW_URL", default_value = "http://localhost:5000")]
    pub workflow_url: String,

    /// API key sent to the workflow engine (required in production)
    #[arg(long, env = "WORKFLOW_API_KEY")]
    pub workflow_api_key: Option<String>,

    /// Outbound request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective workflow engine API key (uses a default in dev mode)
    pub fn workflow_api_key(&self) -> String {
        if self.dev_mode {
            self.workflow_api_key
                .clone()
                .unwrap_or_else(|| "dev-workflow-api-key".to_string())
        } else {
            self.workflow_api_key.clone().unwrap_or_default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.workflow_api_key.is_none() {
            return Err("WORKFLOW_API_KEY is required in production mode".to_string());
        }

        if self.workflow_url.is_empty() {
            return Err("WORKFLOW_URL must not be empty".to_string());
        }

        Ok(())
    }
}
