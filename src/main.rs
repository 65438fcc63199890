use broker::Broker;
use log::*;
use messaging::Settings as MessageQueueSettings;
use migration::{Migrator, MigratorTrait};
use service::config::Config;
use service::logging::Logger;
use service::AppState;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use uuid::Uuid;

/// How long open connections get to drain after a shutdown signal.
const SHUTDOWN_DRAIN: tokio::time::Duration = tokio::time::Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    // Basic underlying setup
    //

    let auth_secret = match config.auth_secret() {
        Ok(secret) => secret,
        Err(e) => {
            error!("Failed to get a secret for bearer token verification: {e}");
            std::process::exit(1);
        }
    };

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to connect to database '{}': {e}", config.database_url());
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to apply migrations: {e}");
        std::process::exit(1);
    }

    // One identity per process; nodes recognize their own bus echoes by it.
    let node_id = config
        .node_id()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mq_settings = match config.mq_values() {
        Ok(values) => values.map(|(url, topic, routing_key)| MessageQueueSettings {
            url,
            topic,
            routing_key,
            node_id: node_id.clone(),
        }),
        Err(e) => {
            error!("Failed to get message bus settings: {e}");
            std::process::exit(1);
        }
    };

    let broker = match Broker::new(db.clone(), node_id, mq_settings).await {
        Ok(broker) => Arc::new(broker),
        Err(e) => {
            error!("Failed to connect & set up a channel with the message bus: {e}");
            std::process::exit(1);
        }
    };

    info!("Running notification service broker");
    if let Err(e) = broker.start().await {
        error!("Failed to start the notification broker: {e}");
        std::process::exit(1);
    }

    // HTTP server setup & boot
    //

    let app_state = AppState::new(config.clone(), &db, broker.clone(), auth_secret);
    let router = web::router::define_routes(app_state).layer(cors_layer(&config));

    let address = format!(
        "{}:{}",
        config.interface.as_deref().unwrap_or("127.0.0.1"),
        config.port
    );
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {address}: {e}");
            std::process::exit(1);
        }
    };

    info!("HTTP server listening on {address}");

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .into_future(),
    );

    // Shutdown signal handle: SIGINT (Ctrl+C)
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {e}");
    }
    info!("Got shutdown signal");

    // Stop accepting connections, close the live streams via the broker, and
    // give in-flight requests a bounded deadline to drain.
    info!("Shutting down...");
    shutdown.cancel();
    broker.stop();

    match tokio::time::timeout(SHUTDOWN_DRAIN, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!("HTTP server error during shutdown: {e}"),
        Ok(Err(e)) => error!("HTTP server task failed: {e}"),
        Err(_) => warn!("Open connections did not drain within the deadline"),
    }

    info!("Bye bye");
}

/// CORS policy from configuration; "*" in a list means wide open.
fn cors_layer(config: &Config) -> CorsLayer {
    let origins = if config.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        )
    };

    let headers = if config.allowed_headers.iter().any(|header| header == "*") {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(
            config
                .allowed_headers
                .iter()
                .filter_map(|header| header.parse().ok()),
        )
    };

    let methods = if config.allowed_methods.iter().any(|method| method == "*") {
        AllowMethods::any()
    } else {
        AllowMethods::list(
            config
                .allowed_methods
                .iter()
                .filter_map(|method| method.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers(headers)
        .allow_methods(methods)
}
