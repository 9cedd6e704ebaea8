//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::usecase::{GetRoomDetailUseCase, RoomRegistry};

use super::{
    handler::{create_session, get_room_detail, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Easel game server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(registry, get_room_detail_usecase);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// RoomRegistry（このプロセスのルームコーディネーター）
    registry: Arc<RoomRegistry>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}

impl Server {
    pub fn new(
        registry: Arc<RoomRegistry>,
        get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    ) -> Self {
        Self {
            registry,
            get_room_detail_usecase,
        }
    }

    /// Build the router with every endpoint.
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            registry: Arc::clone(&self.registry),
            get_room_detail_usecase: Arc::clone(&self.get_room_detail_usecase),
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/session", get(create_session))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Serve on an already bound listener until a shutdown signal arrives.
    pub async fn serve(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let app = self.router();
        tracing::info!("Easel server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.registry.shutdown().await;
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Run the server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws?user_id=<id>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener).await?;
        Ok(())
    }
}
