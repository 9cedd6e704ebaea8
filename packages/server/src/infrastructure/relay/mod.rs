//! RelayBus の実装
//!
//! - `inmemory`: 単一プロセス内のチャンネル
//! - `redis`: Redis Pub/Sub によるプロセス間配送

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryRelayBus;
pub use redis::RedisRelayBus;
