//! StateStore の実装
//!
//! - `inmemory`: 単一プロセス用（開発・テスト）
//! - `redis`: 複数プロセスで状態を共有する本番用

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryStateStore;
pub use redis::RedisStateStore;
