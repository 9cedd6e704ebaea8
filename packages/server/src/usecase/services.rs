//! ユースケースが共有する外部コラボレーター一式

use std::sync::Arc;

use crate::domain::{
    ContentGenerator, FragmentRenderer, RelayBus, RelayError, RelayMessage, RoomId, StateStore,
    keys,
};

/// ストア・リレーバス・コンテンツ生成・描画の組
///
/// クライアントアクターとルームコーディネーターは同じインスタンスを共有します。
#[derive(Clone)]
pub struct GameServices {
    pub store: Arc<dyn StateStore>,
    pub relay: Arc<dyn RelayBus>,
    pub content: Arc<dyn ContentGenerator>,
    pub renderer: Arc<dyn FragmentRenderer>,
}

impl GameServices {
    pub fn new(
        store: Arc<dyn StateStore>,
        relay: Arc<dyn RelayBus>,
        content: Arc<dyn ContentGenerator>,
        renderer: Arc<dyn FragmentRenderer>,
    ) -> Self {
        Self {
            store,
            relay,
            content,
            renderer,
        }
    }

    /// ルームのチャンネルにリレーメッセージを publish
    pub async fn publish(&self, room_id: &RoomId, message: &RelayMessage) -> Result<(), RelayError> {
        let channel = keys::channel(room_id);
        let payload = message.encode().map_err(|e| RelayError::Publish {
            channel: channel.clone(),
            reason: e.to_string(),
        })?;
        self.relay.publish(&channel, payload).await
    }
}
