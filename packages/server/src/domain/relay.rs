//! RelayBus trait 定義
//!
//! ルームごとのチャンネルで、プロセスをまたいでイベントを配送する Pub/Sub の抽象。
//!
//! ## 配送の保証
//!
//! - 同一チャンネル内では publish 順に全購読者へ届く（FIFO）
//! - チャンネル間の順序は保証しない
//! - 購読開始前に publish されたメッセージは保持されない

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::RelayError;

/// A live subscription to one channel. Dropping it unsubscribes.
pub struct Subscription {
    channel: String,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(channel: String, receiver: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self { channel, receiver }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next payload. `None` once the bus side has gone away.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }

    /// Returns a payload that has already arrived, without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.try_recv().ok()
    }
}

#[async_trait]
pub trait RelayBus: Send + Sync {
    /// チャンネルの全購読者にペイロードを配送
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), RelayError>;

    /// チャンネルを購読。戻った時点で購読は確立している
    async fn subscribe(&self, channel: &str) -> Result<Subscription, RelayError>;
}
