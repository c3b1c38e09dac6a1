use catgate::{api, config, engine, jobs, rabbit_hole};

use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "catgate")]
#[command(about = "HTTP/WebSocket gateway for the Cat conversational engine")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "1865")]
    port: u16,

    /// Chat endpoint of the conversational engine
    #[arg(long, default_value = config::DEFAULT_ENGINE_URL)]
    engine_url: String,

    /// Model name passed to the engine
    #[arg(long, default_value = config::DEFAULT_ENGINE_MODEL)]
    engine_model: String,

    /// Bound on queued-but-not-yet-ingested uploads
    #[arg(long, default_value_t = config::INGEST_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🐱 Catgate - Conversational Gateway");
    info!("🧠 Engine endpoint: {} (model: {})", args.engine_url, args.engine_model);

    // Collaborators are built once here and injected into the routes
    let engine: Arc<dyn engine::ConversationEngine> = Arc::new(
        engine::RemoteEngine::new(&args.engine_url, &args.engine_model)
            .expect("Failed to build engine client"),
    );
    let pipeline: Arc<dyn rabbit_hole::IngestionPipeline> = Arc::new(rabbit_hole::RabbitHole);
    let ingest_queue = Arc::new(jobs::IngestQueue::new(
        pipeline,
        engine.clone(),
        args.queue_capacity,
    ));

    // Build the router
    let app = Router::new()
        .merge(api::routes(api::GatewayState {
            engine,
            ingest_queue,
        }))
        .layer(CorsLayer::permissive());

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("🌐 Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("🛑 Shutdown signal received");
}
