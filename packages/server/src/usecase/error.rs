//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{BarrierError, ContentError, RelayError, StoreError, ValueObjectError};

/// ルームコーディネーターのエラー
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Content(#[from] ContentError),

    /// 受け付けられないシグナル（状態は変更されていない）
    #[error("signal rejected: {0}")]
    Barrier(#[from] BarrierError),

    #[error("malformed relay message: {0}")]
    Decode(String),
}

impl CoordinatorError {
    /// ストア / リレー / コンテンツ生成の一時的な失敗か
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Store(_) | CoordinatorError::Relay(_) | CoordinatorError::Content(_)
        )
    }
}

/// クライアントアクターのエラー
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValueObjectError),

    /// ルーム参加前に、ルームが必要なイベントを受け取った
    #[error("client '{0}' has not joined a room")]
    NotInRoom(String),

    /// ユーザー名の設定前に、プレイヤーとしてのイベントを受け取った
    #[error("client '{0}' has not chosen a username")]
    NoUsername(String),

    /// 画像生成はルームが Playing のときだけ
    #[error("client '{0}' asked for a picture outside of the playing phase")]
    NotPlaying(String),
}

/// ルーム詳細取得のエラー
#[derive(Debug, Error)]
pub enum GetRoomDetailError {
    #[error("room not found")]
    RoomNotFound,

    #[error("store error: {0}")]
    RepositoryError(String),
}
