//! UseCase: ルーム詳細取得処理

use std::{collections::HashMap, sync::Arc};

use crate::domain::{Phase, RoomDetail, RoomId, StateStore, UserId, keys};

use super::error::GetRoomDetailError;

/// ルーム詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    store: Arc<dyn StateStore>,
}

impl GetRoomDetailUseCase {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// ルームのフェーズ・参加者・累計スコアを取得
    ///
    /// 参加者はユーザー名順に並べます。
    pub async fn execute(&self, room_id: String) -> Result<RoomDetail, GetRoomDetailError> {
        let room_id = RoomId::new(room_id).map_err(|_| GetRoomDetailError::RoomNotFound)?;
        if !self
            .store
            .set_contains(keys::ROOM_LIST, room_id.as_str())
            .await
            .map_err(repository_error)?
        {
            return Err(GetRoomDetailError::RoomNotFound);
        }

        let phase = match self
            .store
            .hash_get(&keys::room(&room_id), keys::room_field::PHASE)
            .await
            .map_err(repository_error)?
        {
            None => Phase::Waiting,
            Some(raw) => raw.parse().map_err(GetRoomDetailError::RepositoryError)?,
        };

        let scores: HashMap<String, i64> = self
            .store
            .sorted_set_range_with_scores(&keys::leaderboard(&room_id))
            .await
            .map_err(repository_error)?
            .into_iter()
            .collect();
        let mut players: Vec<(UserId, String, i64)> = self
            .store
            .hash_get_all(&keys::players(&room_id))
            .await
            .map_err(repository_error)?
            .into_iter()
            .filter_map(|(user, username)| {
                let score = scores.get(&user).copied().unwrap_or(0);
                Some((UserId::new(user).ok()?, username, score))
            })
            .collect();
        players.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        Ok(RoomDetail {
            id: room_id,
            phase,
            players,
        })
    }
}

fn repository_error(e: crate::domain::StoreError) -> GetRoomDetailError {
    GetRoomDetailError::RepositoryError(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::store::InMemoryStateStore;

    async fn seeded_store() -> Arc<dyn StateStore> {
        let store: Arc<dyn StateStore> =
            Arc::new(InMemoryStateStore::new(Duration::from_secs(60)));
        store.set_add(keys::ROOM_LIST, "room1").await.unwrap();
        store
            .hash_set("room:room1", keys::room_field::PHASE, "voting")
            .await
            .unwrap();
        store
            .hash_set("room:room1:players", "u2", "bob")
            .await
            .unwrap();
        store
            .hash_set("room:room1:players", "u1", "alice")
            .await
            .unwrap();
        store
            .sorted_set_add_new("room:room1:leaderboard", "u1", 3)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_room_detail_success() {
        // テスト項目: 存在するルームのフェーズと参加者（ユーザー名順・スコア付き）を取得できる
        // given (前提条件):
        let store = seeded_store().await;
        let usecase = GetRoomDetailUseCase::new(store);

        // when (操作):
        let detail = usecase.execute("room1".to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(detail.id.as_str(), "room1");
        assert_eq!(detail.phase, Phase::Voting);
        let players: Vec<(&str, &str, i64)> = detail
            .players
            .iter()
            .map(|(user, name, score)| (user.as_str(), name.as_str(), *score))
            .collect();
        assert_eq!(players, vec![("u1", "alice", 3), ("u2", "bob", 0)]);
    }

    #[tokio::test]
    async fn test_get_room_detail_not_found() {
        // テスト項目: ディレクトリにないルームは RoomNotFound になる
        // given (前提条件):
        let store = seeded_store().await;
        let usecase = GetRoomDetailUseCase::new(store);

        // when (操作):
        let result = usecase.execute("room2".to_string()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(GetRoomDetailError::RoomNotFound)));
    }

    #[tokio::test]
    async fn test_get_room_detail_invalid_id() {
        // テスト項目: 不正な形式のルーム ID も RoomNotFound になる
        // given (前提条件):
        let store = seeded_store().await;
        let usecase = GetRoomDetailUseCase::new(store);

        // when (操作):
        let result = usecase.execute("../etc".to_string()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(GetRoomDetailError::RoomNotFound)));
    }
}
