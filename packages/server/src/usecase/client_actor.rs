//! UseCase: クライアントアクター
//!
//! WebSocket 接続 1 本につき 1 つ。クライアントのイベントを処理してリレーバスへ
//! publish し、ルームチャンネルの放送をクライアントの書き込みキューへ転送します。
//!
//! ## タスク構成
//!
//! - アクター自身は接続の受信タスクが所有し、イベントを 1 つずつ処理する
//! - リレーリスナー: 参加中のルームごとに 1 つ（アクターの子トークンで停止）
//! - 画像生成: `JoinSet` で追跡し、同時に 2 件まで
//!
//! ## 再接続
//!
//! ストアにセッション（ユーザー名とルーム ID）が残っていてルームが存在すれば、
//! 接続時にそのルームへ戻ります。

use std::sync::Arc;

use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ClientEvent, ConnectionId, GameMessage, Phase, RelayEvent, RelayMessage, RoomId, Subscription,
    UserId, Username,
    keys::{self, room_field, user_field},
};

use super::{error::ClientError, room_registry::RoomRegistry, services::GameServices};

/// 1 クライアントあたりの画像生成の同時実行数
const MAX_GENERATIONS_IN_FLIGHT: usize = 2;

/// イベント処理後に接続を続けるか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Close,
}

pub struct ClientActor {
    user_id: UserId,
    connection_id: ConnectionId,
    username: Option<Username>,
    room_id: Option<RoomId>,
    /// クライアントへの書き込みキュー（HTML フラグメント）
    writer: mpsc::UnboundedSender<String>,
    registry: Arc<RoomRegistry>,
    services: GameServices,
    cancel: CancellationToken,
    room_cancel: Option<CancellationToken>,
    listener: Option<JoinHandle<()>>,
    generations: JoinSet<()>,
}

impl ClientActor {
    /// アクターを作成し、保存されたセッションがあれば復帰する
    pub async fn connect(
        user_id: UserId,
        writer: mpsc::UnboundedSender<String>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        let services = registry.services().clone();
        let mut actor = Self {
            user_id,
            connection_id: ConnectionId::generate(),
            username: None,
            room_id: None,
            writer,
            registry,
            services,
            cancel: CancellationToken::new(),
            room_cancel: None,
            listener: None,
            generations: JoinSet::new(),
        };

        match actor.recover().await {
            Ok(true) => tracing::info!(
                "Client '{}' recovered its session in room '{}'",
                actor.user_id,
                actor.room_id.as_ref().map(RoomId::as_str).unwrap_or_default()
            ),
            Ok(false) => tracing::debug!("Client '{}' starts a new session", actor.user_id),
            Err(e) => {
                tracing::warn!("Failed to recover session of '{}': {}", actor.user_id, e);
                actor.leave_room_locally();
            }
        }
        actor
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    async fn recover(&mut self) -> Result<bool, ClientError> {
        let store = Arc::clone(&self.services.store);
        let user_key = keys::user(&self.user_id);
        let (Some(name), Some(room)) = (
            store.hash_get(&user_key, user_field::USERNAME).await?,
            store.hash_get(&user_key, user_field::ROOM_ID).await?,
        ) else {
            return Ok(false);
        };
        let (Ok(username), Ok(room_id)) = (Username::new(name), RoomId::new(room)) else {
            return Ok(false);
        };
        if !self.registry.ensure_coordinator(&room_id).await? {
            return Ok(false);
        }

        self.enter_room(room_id.clone()).await?;
        store
            .hash_set(&user_key, user_field::CONNECTION, self.connection_id.as_str())
            .await?;
        store
            .hash_set(&user_key, user_field::READY, keys::IS_NOT_READY)
            .await?;
        self.username = Some(username.clone());

        let page = self.current_page(&room_id).await?;
        self.send(page);
        self.publish(RelayEvent::Reconnect, username.as_str())
            .await?;
        Ok(true)
    }

    /// イベントを 1 つ処理する。エラーはここでログに残し、接続は維持する
    pub async fn dispatch(&mut self, message: GameMessage) -> DispatchOutcome {
        let event = message.event;
        let closing = matches!(event, ClientEvent::Leave | ClientEvent::CloseWs);

        match self.handle(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    ClientError::InvalidInput(_)
                    | ClientError::NotInRoom(_)
                    | ClientError::NoUsername(_)
                    | ClientError::NotPlaying(_) => {
                        tracing::debug!("Ignored {:?} from '{}': {}", event, self.user_id, e)
                    }
                    _ => tracing::warn!("Failed to handle {:?} from '{}': {}", event, self.user_id, e),
                }
                if closing {
                    DispatchOutcome::Close
                } else {
                    DispatchOutcome::Continue
                }
            }
        }
    }

    async fn handle(&mut self, message: GameMessage) -> Result<DispatchOutcome, ClientError> {
        let payload = message.payload;
        match message.event {
            ClientEvent::CreateRoom => self.create_room().await?,
            ClientEvent::JoinRoom => self.join_room(&payload).await?,
            ClientEvent::SetUsername => self.set_username(&payload).await?,
            ClientEvent::Ready => self.signal(RelayEvent::Ready, "").await?,
            ClientEvent::PickPicture => self.signal(RelayEvent::GetPicture, &payload).await?,
            ClientEvent::Vote => self.signal(RelayEvent::Vote, &payload).await?,
            ClientEvent::Prompt => self.prompt(payload).await?,
            ClientEvent::Leave => {
                self.leave().await?;
                return Ok(DispatchOutcome::Close);
            }
            ClientEvent::CloseWs => {
                self.depart(RelayEvent::CloseWs).await?;
                return Ok(DispatchOutcome::Close);
            }
            ClientEvent::Unknown => {
                tracing::debug!("Unknown event from '{}' ignored", self.user_id)
            }
        }
        Ok(DispatchOutcome::Continue)
    }

    async fn create_room(&mut self) -> Result<(), ClientError> {
        if let Some(room_id) = &self.room_id {
            tracing::debug!("'{}' is already in room '{}'", self.user_id, room_id);
            return Ok(());
        }
        let room_id = self.registry.create_room().await?;
        self.enter_room(room_id).await?;
        self.send(self.services.renderer.choose_username());
        Ok(())
    }

    async fn join_room(&mut self, code: &str) -> Result<(), ClientError> {
        if let Some(room_id) = &self.room_id {
            tracing::debug!("'{}' is already in room '{}'", self.user_id, room_id);
            return Ok(());
        }
        let Ok(room_id) = RoomId::new(code.trim().to_string()) else {
            self.notice("That room code is not valid.");
            return Ok(());
        };
        if !self.registry.ensure_coordinator(&room_id).await? {
            self.notice("That room does not exist.");
            return Ok(());
        }
        self.enter_room(room_id).await?;
        self.send(self.services.renderer.choose_username());
        Ok(())
    }

    async fn set_username(&mut self, name: &str) -> Result<(), ClientError> {
        let room_id = self.require_room()?.clone();
        if let Some(username) = &self.username {
            tracing::debug!("'{}' already plays as '{}'", self.user_id, username);
            return Ok(());
        }
        let username = match Username::new(name.trim().to_string()) {
            Ok(username) => username,
            Err(e) => {
                self.notice(&format!("Invalid username: {}", e));
                return Err(e.into());
            }
        };
        if !self.registry.ensure_coordinator(&room_id).await? {
            self.notice("This room has closed.");
            self.leave_room_locally();
            return Ok(());
        }

        let store = &self.services.store;
        let user_key = keys::user(&self.user_id);
        store
            .hash_set(&user_key, user_field::READY, keys::IS_NOT_READY)
            .await?;
        store
            .hash_set(&user_key, user_field::USERNAME, username.as_str())
            .await?;
        store
            .hash_set(&user_key, user_field::ROOM_ID, room_id.as_str())
            .await?;
        store
            .hash_set(&user_key, user_field::CONNECTION, self.connection_id.as_str())
            .await?;
        self.username = Some(username.clone());

        // ページを先に積む（後から届く参加者一覧で上書きされないように）
        let page = self.current_page(&room_id).await?;
        self.send(page);
        self.publish(RelayEvent::NewUser, username.as_str()).await?;
        Ok(())
    }

    /// ready フラグを立ててシグナルを publish（ready / get-picture / vote）
    async fn signal(&mut self, event: RelayEvent, payload: &str) -> Result<(), ClientError> {
        self.require_player()?;
        self.services
            .store
            .hash_set(&keys::user(&self.user_id), user_field::READY, keys::IS_READY)
            .await?;
        self.publish(event, payload.trim()).await
    }

    async fn prompt(&mut self, prompt: String) -> Result<(), ClientError> {
        self.require_player()?;
        let room_id = self.require_room()?;
        let phase = self
            .services
            .store
            .hash_get(&keys::room(room_id), room_field::PHASE)
            .await?;
        if phase.as_deref() != Some(Phase::Playing.as_str()) {
            return Err(ClientError::NotPlaying(self.user_id.to_string()));
        }
        while self.generations.try_join_next().is_some() {}
        if self.generations.len() >= MAX_GENERATIONS_IN_FLIGHT {
            tracing::warn!(
                "'{}' already has {} picture(s) generating, prompt dropped",
                self.user_id,
                self.generations.len()
            );
            return Ok(());
        }

        let content = Arc::clone(&self.services.content);
        let renderer = Arc::clone(&self.services.renderer);
        let writer = self.writer.clone();
        let user = self.user_id.clone();
        self.generations.spawn(async move {
            match content.generate_picture(prompt.trim()).await {
                Ok(url) => {
                    let _ = writer.send(renderer.picture_preview(&url));
                }
                Err(e) => tracing::warn!("Picture generation for '{}' failed: {}", user, e),
            }
        });
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), ClientError> {
        self.depart(RelayEvent::Leave).await?;
        self.services
            .store
            .delete(&keys::user(&self.user_id))
            .await?;
        Ok(())
    }

    /// ルームに入っていれば退出を publish する（ユーザー名の設定前でも）
    async fn depart(&mut self, event: RelayEvent) -> Result<(), ClientError> {
        if self.room_id.is_none() {
            return Ok(());
        }
        let connection = self.connection_id.to_string();
        self.publish(event, &connection).await
    }

    /// ルームチャンネルを購読し、リレーリスナーを起動
    async fn enter_room(&mut self, room_id: RoomId) -> Result<(), ClientError> {
        let subscription = self
            .services
            .relay
            .subscribe(&keys::channel(&room_id))
            .await?;
        let token = self.cancel.child_token();
        self.listener = Some(tokio::spawn(relay_listener(
            subscription,
            token.clone(),
            self.writer.clone(),
        )));
        self.room_cancel = Some(token);
        tracing::debug!("'{}' entered room '{}'", self.user_id, room_id);
        self.room_id = Some(room_id);
        Ok(())
    }

    fn leave_room_locally(&mut self) {
        if let Some(token) = self.room_cancel.take() {
            token.cancel();
        }
        self.listener = None;
        self.room_id = None;
        self.username = None;
    }

    /// 途中参加・再接続時に表示するページ
    async fn current_page(&self, room_id: &RoomId) -> Result<String, ClientError> {
        let backup = self
            .services
            .store
            .hash_get(&keys::room(room_id), room_field::BACKUP)
            .await?;
        Ok(backup.unwrap_or_else(|| self.services.renderer.waiting_room(room_id)))
    }

    fn require_room(&self) -> Result<&RoomId, ClientError> {
        self.room_id
            .as_ref()
            .ok_or_else(|| ClientError::NotInRoom(self.user_id.to_string()))
    }

    fn require_player(&self) -> Result<(), ClientError> {
        self.require_room()?;
        if self.username.is_none() {
            return Err(ClientError::NoUsername(self.user_id.to_string()));
        }
        Ok(())
    }

    async fn publish(&self, event: RelayEvent, payload: &str) -> Result<(), ClientError> {
        let room_id = self.require_room()?;
        let message = RelayMessage::new(event, self.user_id.as_str(), payload);
        self.services.publish(room_id, &message).await?;
        Ok(())
    }

    fn send(&self, fragment: String) {
        if self.writer.send(fragment).is_err() {
            tracing::debug!("Writer of '{}' already closed", self.user_id);
        }
    }

    fn notice(&self, message: &str) {
        self.send(self.services.renderer.notice(message));
    }

    /// リレーリスナーと実行中の画像生成を止める
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        self.generations.shutdown().await;
        tracing::debug!("Client actor of '{}' shut down", self.user_id);
    }
}

/// ルームチャンネルの放送イベントをクライアントの書き込みキューへ転送
async fn relay_listener(
    mut subscription: Subscription,
    cancel: CancellationToken,
    writer: mpsc::UnboundedSender<String>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            payload = subscription.recv() => {
                let Some(payload) = payload else { break };
                match RelayMessage::decode(&payload) {
                    Ok(message) if message.event.is_broadcast() => {
                        if writer.send(message.payload).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        "Malformed relay message on '{}': {}",
                        subscription.channel(),
                        e
                    ),
                }
            }
        }
    }
}
