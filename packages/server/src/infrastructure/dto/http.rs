//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// `GET /api/session` のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDto {
    pub user_id: String,
}

/// `GET /api/rooms/{room_id}` のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub phase: String,
    pub players: Vec<PlayerDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDto {
    pub user_id: String,
    pub username: String,
    pub score: i64,
}
