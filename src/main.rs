use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowchat::{api, gateway::GatewayConfig, state::AppState, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowchat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FlowChat relay...");

    // Initialize the AI gateway; the relay still serves rooms without one
    let gateway_config = GatewayConfig::from_env();
    let gateway = match gateway_config.build_gateway() {
        Ok(gateway) => {
            tracing::info!("AI gateway initialized (provider: {})", gateway.name());
            Some(gateway)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize AI gateway: {}. AI responses will not be available.",
                e
            );
            None
        }
    };

    let state = Arc::new(AppState::new_with_gateway(gateway, gateway_config));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/ai/chat", post(api::chat_completion).get(api::chat_info))
        .route(
            "/api/ai/image",
            post(api::generate_image).get(api::image_info),
        )
        .route("/api/health", get(api::health))
        .route("/api/database/stats", get(api::database_stats))
        .route("/api/system/metrics", get(api::system_metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3003);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
