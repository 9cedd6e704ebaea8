//! Easel game server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin easel-server
//! cargo run --bin easel-server -- --host 0.0.0.0 --port 3000 --redis-url redis://127.0.0.1/
//! ```

use std::sync::Arc;

use clap::Parser;
use easel_server::{
    config::ServerConfig,
    domain::{ContentGenerator, RelayBus, StateStore},
    infrastructure::{
        content::{OpenAiContentGenerator, StockContentGenerator},
        relay::{InMemoryRelayBus, RedisRelayBus},
        renderer::HtmlFragmentRenderer,
        store::{InMemoryStateStore, RedisStateStore},
    },
    ui::Server,
    usecase::{GameServices, GetRoomDetailUseCase, RoomRegistry},
};
use easel_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(&[env!("CARGO_BIN_NAME"), "tower_http"], &config.log_level);

    // Initialize dependencies in order:
    // 1. StateStore / RelayBus
    // 2. ContentGenerator / FragmentRenderer
    // 3. RoomRegistry / UseCases
    // 4. Server

    // 1. Shared state: Redis when configured, otherwise this process only
    let (store, relay): (Arc<dyn StateStore>, Arc<dyn RelayBus>) = match &config.redis_url {
        Some(url) => {
            let store = match RedisStateStore::connect(url, config.state_ttl()).await {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!("Failed to connect the state store: {}", e);
                    std::process::exit(1);
                }
            };
            let relay = match RedisRelayBus::connect(url).await {
                Ok(relay) => relay,
                Err(e) => {
                    tracing::error!("Failed to connect the relay bus: {}", e);
                    std::process::exit(1);
                }
            };
            (Arc::new(store), Arc::new(relay))
        }
        None => {
            tracing::info!("No Redis URL configured, using in-memory state");
            (
                Arc::new(InMemoryStateStore::new(config.state_ttl())),
                Arc::new(InMemoryRelayBus::new()),
            )
        }
    };

    // 2. Content and rendering
    let content: Arc<dyn ContentGenerator> = match &config.openai_api_key {
        Some(key) => Arc::new(OpenAiContentGenerator::new(
            key.clone(),
            config.openai_base_url.clone(),
        )),
        None => {
            tracing::info!("No OpenAI API key configured, using stock content");
            Arc::new(StockContentGenerator::new())
        }
    };
    let renderer = Arc::new(HtmlFragmentRenderer::new());

    // 3. Registry and UseCases
    let services = GameServices::new(Arc::clone(&store), relay, content, renderer);
    let registry = Arc::new(RoomRegistry::new(services));
    let get_room_detail_usecase = Arc::new(GetRoomDetailUseCase::new(store));

    // 4. Create and run the server
    let server = Server::new(registry, get_room_detail_usecase);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
