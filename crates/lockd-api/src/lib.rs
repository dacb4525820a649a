pub mod gateway;
pub mod handlers;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use gateway::GatewayState;
pub use handlers::ApiState;

/// The `/api` router, without a listener.
pub fn api_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/devices", get(handlers::handle_devices))
        .route(
            "/devices/{address}",
            get(handlers::handle_device).delete(handlers::handle_device_remove),
        )
        .route(
            "/devices/{address}/command",
            post(handlers::handle_device_command),
        )
        .route("/devices/{address}/name", post(handlers::handle_device_rename))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// WebSocket endpoint devices connect to, at `/`.
pub fn device_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(gateway::handle_upgrade))
        .with_state(state)
}

/// Serve the HTTP API on loopback.
pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    serve_api_on(listener, state).await
}

pub async fn serve_api_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    axum::serve(listener, api_router(state)).await?;
    Ok(())
}

/// Serve the device gateway on `addr`.
pub async fn serve_devices(state: GatewayState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "device gateway listening");
    serve_devices_on(listener, state).await
}

pub async fn serve_devices_on(listener: TcpListener, state: GatewayState) -> anyhow::Result<()> {
    axum::serve(listener, device_router(state)).await?;
    Ok(())
}
