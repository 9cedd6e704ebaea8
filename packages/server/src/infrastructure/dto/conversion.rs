//! Conversion logic between DTOs and domain entities.

use crate::{domain::RoomDetail, infrastructure::dto::http as dto};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<RoomDetail> for dto::RoomDetailDto {
    fn from(model: RoomDetail) -> Self {
        Self {
            id: model.id.into_string(),
            phase: model.phase.as_str().to_string(),
            players: model
                .players
                .into_iter()
                .map(|(user_id, username, score)| dto::PlayerDto {
                    user_id: user_id.into_string(),
                    username,
                    score,
                })
                .collect(),
        }
    }
}
