//! Server state shared by the handlers.

use std::sync::Arc;

use crate::usecase::{GetRoomDetailUseCase, RoomRegistry};

/// Shared application state
pub struct AppState {
    /// このプロセスのルームコーディネーター一覧（クライアントアクターが利用）
    pub registry: Arc<RoomRegistry>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}
