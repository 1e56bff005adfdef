//! Gista gateway - production lifecycle API for gists and links

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gista_gateway::config::Args;
use gista_gateway::notify::{HttpNotifier, NotifierConfig};
use gista_gateway::server::{self, AppState};
use gista_gateway::service::ContentService;
use gista_gateway::store::{MemoryUserStore, MongoUserStore, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gista_gateway={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Gista Gateway");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Workflow engine: {}", args.workflow_url);
    info!("======================================");

    // Connect to MongoDB (in-memory fallback in dev mode)
    let store: Arc<dyn UserStore> =
        match MongoUserStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(store) => {
                info!("MongoDB connected successfully");
                Arc::new(store)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!(
                        "MongoDB connection failed (dev mode, using in-memory store): {}",
                        e
                    );
                    Arc::new(MemoryUserStore::new())
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    let notifier = HttpNotifier::new(NotifierConfig {
        base_url: args.workflow_url.clone(),
        api_key: args.workflow_api_key(),
        timeout: Duration::from_millis(args.request_timeout_ms),
    })?;

    let service = Arc::new(ContentService::new(store, Arc::new(notifier)));
    let state = Arc::new(AppState { args, service });

    server::run(state).await?;
    Ok(())
}
