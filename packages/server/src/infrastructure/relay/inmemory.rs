//! InMemory RelayBus 実装
//!
//! チャンネル名ごとに購読者の `UnboundedSender` を保持します。publish はロックを
//! 保持したまま全購読者へ送るため、同一チャンネル内の順序は publish 順になります。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{RelayBus, RelayError, Subscription};

/// インメモリ RelayBus 実装
#[derive(Default)]
pub struct InMemoryRelayBus {
    /// Key: チャンネル名
    /// Value: 購読者の sender
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl InMemoryRelayBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// チャンネルの購読者数（切断済みは除く）
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().await;
        channels
            .get(channel)
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RelayBus for InMemoryRelayBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), RelayError> {
        let mut channels = self.channels.lock().await;
        let Some(subscribers) = channels.get_mut(channel) else {
            tracing::debug!("No subscriber on '{}', message dropped", channel);
            return Ok(());
        };

        // 送信に失敗した（Subscription が drop された）購読者はここで取り除く
        subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, RelayError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock().await;
        channels.entry(channel.to_string()).or_default().push(tx);
        tracing::debug!("Subscribed to '{}'", channel);
        Ok(Subscription::new(channel.to_string(), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_in_order() {
        // テスト項目: 全購読者に publish 順で届く
        // given (前提条件):
        let bus = InMemoryRelayBus::new();
        let mut first = bus.subscribe("room:r1:relay").await.unwrap();
        let mut second = bus.subscribe("room:r1:relay").await.unwrap();

        // when (操作):
        bus.publish("room:r1:relay", b"one".to_vec()).await.unwrap();
        bus.publish("room:r1:relay", b"two".to_vec()).await.unwrap();

        // then (期待する結果):
        for sub in [&mut first, &mut second] {
            assert_eq!(sub.recv().await, Some(b"one".to_vec()));
            assert_eq!(sub.recv().await, Some(b"two".to_vec()));
        }
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        // テスト項目: 別チャンネルのメッセージは届かない
        // given (前提条件):
        let bus = InMemoryRelayBus::new();
        let mut sub = bus.subscribe("room:r1:relay").await.unwrap();

        // when (操作):
        bus.publish("room:r2:relay", b"other".to_vec()).await.unwrap();
        bus.publish("room:r1:relay", b"mine".to_vec()).await.unwrap();

        // then (期待する結果):
        assert_eq!(sub.recv().await, Some(b"mine".to_vec()));
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        // テスト項目: Subscription を drop すると購読が解除される
        // given (前提条件):
        let bus = InMemoryRelayBus::new();
        let sub = bus.subscribe("room:r1:relay").await.unwrap();
        let _other = bus.subscribe("room:r1:relay").await.unwrap();
        assert_eq!(bus.subscriber_count("room:r1:relay").await, 2);

        // when (操作):
        drop(sub);
        bus.publish("room:r1:relay", b"x".to_vec()).await.unwrap();

        // then (期待する結果):
        assert_eq!(bus.subscriber_count("room:r1:relay").await, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        // テスト項目: 購読者のいないチャンネルへの publish はエラーにならない
        // given (前提条件):
        let bus = InMemoryRelayBus::new();

        // when (操作):
        let result = bus.publish("room:nobody:relay", b"x".to_vec()).await;

        // then (期待する結果):
        assert!(result.is_ok());
    }
}
