//! Redis Pub/Sub RelayBus 実装
//!
//! publish は共有の `ConnectionManager` で行い、購読は 1 購読につき専用の Pub/Sub 接続を
//! 張ります。受信したメッセージは転送タスクが `Subscription` のチャンネルへ流し、
//! `Subscription` が drop されると転送タスクが終了して接続も閉じられます。

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::mpsc;

use crate::domain::{RelayBus, RelayError, Subscription};

/// Redis Pub/Sub を使った RelayBus 実装
#[derive(Clone)]
pub struct RedisRelayBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisRelayBus {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        tracing::info!("Connected to Redis relay bus at {}", url);
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl RelayBus for RedisRelayBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), RelayError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| RelayError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Published on '{}' to {} receiver(s)", channel, receivers);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, RelayError> {
        let subscribe_error = |e: redis::RedisError| RelayError::Subscribe {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        let mut pubsub = self
            .client
            .get_async_connection()
            .await
            .map_err(subscribe_error)?
            .into_pubsub();
        pubsub.subscribe(channel).await.map_err(subscribe_error)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let name = channel.to_string();
        tokio::spawn(async move {
            let mut messages = Box::pin(pubsub.into_on_message());
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    message = messages.next() => {
                        let Some(message) = message else {
                            tracing::warn!("Redis subscription to '{}' ended", name);
                            break;
                        };
                        if tx.send(message.get_payload_bytes().to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Unsubscribed from '{}'", name);
        });

        Ok(Subscription::new(channel.to_string(), rx))
    }
}
