mod config;
mod error;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let backend = services::backend::BackendClient::new(config.api_url.clone(), config.backend_timeouts)
        .expect("backend client init failed");
    tracing::info!(api_url = %config.api_url, "booking backend configured");

    let port = config.port;
    let state = state::AppState::new(config, Arc::new(backend));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "kebaya atelier listening");
    axum::serve(listener, app).await.expect("server failed");
}
