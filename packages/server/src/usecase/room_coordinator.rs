//! UseCase: ルームコーディネーター
//!
//! 1 つのルームのフェーズ遷移（Waiting → Playing → Voting → Scoring → Playing → …）と
//! ready カウントによるバリアを駆動します。
//!
//! ## 複数プロセスでの動作
//!
//! ルームのクライアントを抱えるプロセスはそれぞれコーディネーターを起動し、全員が
//! ルームのチャンネルの全イベントを受け取ります。状態の正はストアにあり、副作用は
//! アトミックな書き込みの戻り値（クレーム）を得た 1 プロセスだけが実行します。
//!
//! | 効果         | クレーム                               |
//! |--------------|----------------------------------------|
//! | 参加         | ロスターへの `HSET`（新規フィールド）  |
//! | 退出         | ロスターからの `HDEL`                  |
//! | シグナル     | ラウンドの ready セットへの `SADD`     |
//! | フェーズ遷移 | transitions セットへのラウンド番号の `SADD` |
//!
//! ローカルの `RoomState` はキャッシュで、イベントごとにロックを取ってストアから同期します。

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::{
    sync::Mutex,
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    BarrierError, Phase, ReadySignal, RelayEvent, RelayMessage, RoomId, RoomState, ScoreLine,
    StoreError, Subscription, UserId, Username,
    keys::{self, room_field, user_field},
    shuffle_candidates,
};

use super::{error::CoordinatorError, services::GameServices};

/// お題の先読みの同時実行数
const MAX_PREFETCH_IN_FLIGHT: usize = 1;

pub struct RoomCoordinator {
    room_id: RoomId,
    services: GameServices,
    state: Mutex<RoomState>,
    prefetch: Mutex<JoinSet<()>>,
    cancel: CancellationToken,
}

impl RoomCoordinator {
    /// 新しいルームをストアに登録し、そのコーディネーターを作成
    pub async fn create(
        room_id: RoomId,
        services: GameServices,
    ) -> Result<Arc<Self>, CoordinatorError> {
        let store = &services.store;
        store
            .hash_set(
                &keys::room(&room_id),
                room_field::PHASE,
                Phase::Waiting.as_str(),
            )
            .await?;
        store.set(&keys::round(&room_id), "0").await?;
        store.set_add(keys::ROOM_LIST, room_id.as_str()).await?;
        tracing::info!("Room '{}' created", room_id);

        let coordinator = Self::attach(room_id, services);
        coordinator.schedule_prefetch().await;
        Ok(coordinator)
    }

    /// 既存のルーム（別プロセスが作成したものを含む）のコーディネーターを作成
    pub fn attach(room_id: RoomId, services: GameServices) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RoomState::new(room_id.clone())),
            room_id,
            services,
            prefetch: Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Whether the listener loop has been asked to stop.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// ローカルキャッシュの複製（テスト・デバッグ用）
    pub async fn snapshot(&self) -> RoomState {
        self.state.lock().await.clone()
    }

    /// ルームのチャンネルを購読し、リスナーループをタスクとして起動
    ///
    /// 戻った時点で購読は確立しています。
    pub async fn spawn(self: &Arc<Self>) -> Result<JoinHandle<()>, CoordinatorError> {
        let subscription = self
            .services
            .relay
            .subscribe(&keys::channel(&self.room_id))
            .await?;
        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(coordinator.run(subscription)))
    }

    /// リスナーループ: イベントをチャンネル順に 1 つずつ処理する
    pub async fn run(self: Arc<Self>, mut subscription: Subscription) {
        tracing::debug!("Coordinator of room '{}' listening", self.room_id);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                payload = subscription.recv() => {
                    let Some(payload) = payload else {
                        tracing::warn!("Relay subscription of room '{}' closed", self.room_id);
                        break;
                    };
                    let message = match RelayMessage::decode(&payload) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!("Malformed relay message in room '{}': {}", self.room_id, e);
                            continue;
                        }
                    };
                    let event = message.event;
                    if let Err(e) = self.handle_message(message).await {
                        self.log_failure(event, &e);
                    }
                }
            }
        }

        self.prefetch.lock().await.shutdown().await;
        tracing::info!("Coordinator of room '{}' stopped", self.room_id);
    }

    fn log_failure(&self, event: RelayEvent, error: &CoordinatorError) {
        match error {
            CoordinatorError::Barrier(reason) => {
                tracing::debug!("Room '{}' rejected {:?}: {}", self.room_id, event, reason)
            }
            e if e.is_transient() => {
                tracing::warn!("Room '{}' abandoned {:?}: {}", self.room_id, event, e)
            }
            e => tracing::error!("Room '{}' failed to handle {:?}: {}", self.room_id, event, e),
        }
    }

    /// リレーメッセージ 1 件を処理
    pub async fn handle_message(&self, message: RelayMessage) -> Result<(), CoordinatorError> {
        if message.event.is_broadcast() || message.event == RelayEvent::Unknown {
            return Ok(());
        }
        let user = UserId::new(message.sender_id.clone()).map_err(|e| {
            CoordinatorError::Decode(format!("sender '{}': {}", message.sender_id, e))
        })?;

        let mut state = self.state.lock().await;
        match message.event {
            RelayEvent::NewUser | RelayEvent::Reconnect => {
                self.add_player(&mut state, &user, &message.payload).await
            }
            RelayEvent::Ready => {
                self.handle_signal(&mut state, &user, ReadySignal::Ready, &message.payload)
                    .await
            }
            RelayEvent::GetPicture => {
                self.handle_signal(&mut state, &user, ReadySignal::Submission, &message.payload)
                    .await
            }
            RelayEvent::Vote => {
                self.handle_signal(&mut state, &user, ReadySignal::Vote, &message.payload)
                    .await
            }
            RelayEvent::Leave | RelayEvent::CloseWs => {
                self.remove_player(&mut state, &user, &message.payload)
                    .await
            }
            _ => Ok(()),
        }
    }

    async fn current_round(&self) -> Result<u64, CoordinatorError> {
        let key = keys::round(&self.room_id);
        match self.services.store.get(&key).await? {
            None => Ok(0),
            Some(raw) => raw.parse().map_err(|_| {
                StoreError::Decode {
                    key,
                    reason: format!("'{}' is not a round number", raw),
                }
                .into()
            }),
        }
    }

    async fn candidates(&self) -> Result<Vec<String>, CoordinatorError> {
        let key = keys::room(&self.room_id);
        match self
            .services
            .store
            .hash_get(&key, room_field::CANDIDATES)
            .await?
        {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::Decode {
                    key,
                    reason: e.to_string(),
                }
                .into()
            }),
        }
    }

    /// ストアのスナップショットでローカルキャッシュを置き換え、現在のラウンドを返す
    async fn sync_state(&self, state: &mut RoomState) -> Result<u64, CoordinatorError> {
        let store = &self.services.store;
        let round = self.current_round().await?;

        let players: HashMap<UserId, Username> = store
            .hash_get_all(&keys::players(&self.room_id))
            .await?
            .into_iter()
            .filter_map(|(user, name)| Some((UserId::new(user).ok()?, Username::new(name).ok()?)))
            .collect();
        let ready: HashSet<UserId> = store
            .set_members(&keys::ready(&self.room_id, round))
            .await?
            .into_iter()
            .filter_map(|user| UserId::new(user).ok())
            .collect();

        let room_key = keys::room(&self.room_id);
        let phase = match store.hash_get(&room_key, room_field::PHASE).await? {
            None => Phase::Waiting,
            Some(raw) => raw.parse().map_err(|reason| StoreError::Decode {
                key: room_key,
                reason,
            })?,
        };

        state.sync(players, &ready, phase);
        Ok(round)
    }

    /// `new-user` / `reconnect`: ロスターとリーダーボードに追加
    async fn add_player(
        &self,
        state: &mut RoomState,
        user: &UserId,
        username: &str,
    ) -> Result<(), CoordinatorError> {
        let username = Username::new(username.to_string())
            .map_err(|e| CoordinatorError::Decode(format!("username of '{}': {}", user, e)))?;
        let store = &self.services.store;

        let added = store
            .hash_set(
                &keys::players(&self.room_id),
                user.as_str(),
                username.as_str(),
            )
            .await?;
        // 再接続ではスコアを引き継ぐ
        store
            .sorted_set_add_new(&keys::leaderboard(&self.room_id), user.as_str(), 0)
            .await?;
        self.sync_state(state).await?;

        if added {
            tracing::info!(
                "Player '{}' ({}) joined room '{}'",
                username,
                user,
                self.room_id
            );
            self.broadcast_player_list(state).await?;
        }
        Ok(())
    }

    async fn handle_signal(
        &self,
        state: &mut RoomState,
        user: &UserId,
        signal: ReadySignal,
        payload: &str,
    ) -> Result<(), CoordinatorError> {
        let round = self.sync_state(state).await?;
        self.incr_ready_count(state, user, signal, payload, round)
            .await?;
        self.check_room_state(state, round).await
    }

    /// プレイヤーのシグナルを現在のラウンドの ready として数える
    ///
    /// 拒否された場合は何も変更しません。提出物（画像・投票）の記録はどのプロセスが
    /// 行っても同じ値になるため、ready セットへの追加より先に書き込みます。
    pub async fn incr_ready_count(
        &self,
        state: &mut RoomState,
        user: &UserId,
        signal: ReadySignal,
        payload: &str,
        round: u64,
    ) -> Result<(), CoordinatorError> {
        let phase = state.phase();
        if !phase.accepts(signal) {
            return Err(BarrierError::WrongPhase { phase, signal }.into());
        }
        if !state.contains(user) {
            return Err(BarrierError::UnknownPlayer(user.to_string()).into());
        }

        let store = &self.services.store;
        let ready_key = keys::ready(&self.room_id, round);
        let flag = store
            .hash_get(&keys::user(user), user_field::READY)
            .await?;
        if flag.as_deref() != Some(keys::IS_READY) {
            return Err(BarrierError::NotEligible(user.to_string()).into());
        }
        if state.is_ready(user) || store.set_contains(&ready_key, user.as_str()).await? {
            return Err(BarrierError::AlreadyReady(user.to_string()).into());
        }

        match signal {
            ReadySignal::Ready => {}
            ReadySignal::Submission => {
                if payload.is_empty() {
                    return Err(CoordinatorError::Decode(format!(
                        "empty submission from '{}'",
                        user
                    )));
                }
                // 候補は URL で数えるので、同じ URL は先に提出したプレイヤーのもの
                let submissions = store
                    .hash_get_all(&keys::submissions(&self.room_id))
                    .await?;
                if submissions
                    .iter()
                    .any(|(other, answer)| other != user.as_str() && answer == payload)
                {
                    return Err(BarrierError::DuplicateSubmission(payload.to_string()).into());
                }
                store
                    .hash_set(&keys::submissions(&self.room_id), user.as_str(), payload)
                    .await?;
            }
            ReadySignal::Vote => {
                if !self.candidates().await?.iter().any(|c| c == payload) {
                    return Err(BarrierError::UnknownCandidate(payload.to_string()).into());
                }
                store
                    .hash_set(&keys::ballots(&self.room_id), user.as_str(), payload)
                    .await?;
            }
        }

        if !store.set_add(&ready_key, user.as_str()).await? {
            return Err(BarrierError::AlreadyReady(user.to_string()).into());
        }
        state.mark_ready(user)?;
        tracing::debug!(
            "Room '{}' round {}: {}/{} ready",
            self.room_id,
            round,
            state.ready_count(),
            state.player_count()
        );
        Ok(())
    }

    /// バリアが揃っていればフェーズを遷移させる
    ///
    /// 遷移は transitions セットへの `SADD` でクレームしたプロセスだけが実行します。
    /// 準備に失敗した場合、フェーズはそのまま（ready はリセット済み）です。
    pub async fn check_room_state(
        &self,
        state: &mut RoomState,
        round: u64,
    ) -> Result<(), CoordinatorError> {
        if !state.is_barrier_complete() {
            return Ok(());
        }
        let store = &self.services.store;
        if !store
            .set_add(&keys::transitions(&self.room_id), &round.to_string())
            .await?
        {
            tracing::debug!(
                "Transition of room '{}' round {} already claimed",
                self.room_id,
                round
            );
            return Ok(());
        }

        let from = state.phase();
        self.reset_ready(state, round).await?;

        let prepared = match from {
            Phase::Waiting | Phase::Scoring => self.prepare_game_page().await,
            Phase::Playing => self.prepare_voting_page(state).await,
            Phase::Voting => self.prepare_leaderboard(state).await,
        };
        let (event, fragment) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                state.reset_ready();
                return Err(e);
            }
        };

        let to = from.next();
        let room_key = keys::room(&self.room_id);
        store
            .hash_set(&room_key, room_field::PHASE, to.as_str())
            .await?;
        store
            .hash_set(&room_key, room_field::BACKUP, &fragment)
            .await?;
        state.advance();

        self.broadcast(event, fragment).await?;
        tracing::info!(
            "Room '{}' moved from {} to {} (round {})",
            self.room_id,
            from,
            to,
            round
        );
        Ok(())
    }

    /// 全プレイヤーを not-ready に戻し、新しい（空の）ready セットのラウンドに進める
    async fn reset_ready(&self, state: &RoomState, round: u64) -> Result<(), CoordinatorError> {
        let store = &self.services.store;
        for user in state.player_ids() {
            store
                .hash_set(&keys::user(&user), user_field::READY, keys::IS_NOT_READY)
                .await?;
        }
        store.incr_by(&keys::round(&self.room_id), 1).await?;
        store.delete(&keys::ready(&self.room_id, round)).await?;
        Ok(())
    }

    /// Waiting / Scoring → Playing
    async fn prepare_game_page(&self) -> Result<(RelayEvent, String), CoordinatorError> {
        let store = &self.services.store;
        let room_key = keys::room(&self.room_id);

        let question = match store.hash_get(&room_key, room_field::QUESTION).await? {
            Some(question) => {
                store.hash_delete(&room_key, room_field::QUESTION).await?;
                question
            }
            None => {
                tracing::debug!("No prefetched question for room '{}'", self.room_id);
                self.services.content.generate_question().await?
            }
        };
        self.schedule_prefetch().await;

        store.delete(&keys::submissions(&self.room_id)).await?;
        Ok((
            RelayEvent::GameRoom,
            self.services.renderer.game_page(&question),
        ))
    }

    /// Playing → Voting
    async fn prepare_voting_page(
        &self,
        state: &RoomState,
    ) -> Result<(RelayEvent, String), CoordinatorError> {
        let store = &self.services.store;
        let submissions = store
            .hash_get_all(&keys::submissions(&self.room_id))
            .await?;
        let mut candidates: Vec<String> = state
            .player_ids()
            .iter()
            .filter_map(|user| submissions.get(user.as_str()).cloned())
            .collect();
        shuffle_candidates(&mut candidates, &mut rand::rng());

        for candidate in &candidates {
            store
                .set(&keys::votes(&self.room_id, candidate), "0")
                .await?;
        }
        store.delete(&keys::ballots(&self.room_id)).await?;

        let encoded =
            serde_json::to_string(&candidates).map_err(|e| CoordinatorError::Decode(e.to_string()))?;
        store
            .hash_set(&keys::room(&self.room_id), room_field::CANDIDATES, &encoded)
            .await?;

        Ok((
            RelayEvent::VotePage,
            self.services.renderer.voting_page(&candidates),
        ))
    }

    /// Voting → Scoring
    ///
    /// 各候補の得票数は、現在のロスターの投票から数えます（退出者の投票は数えない）。
    async fn prepare_leaderboard(
        &self,
        state: &RoomState,
    ) -> Result<(RelayEvent, String), CoordinatorError> {
        let store = &self.services.store;
        let submissions = store
            .hash_get_all(&keys::submissions(&self.room_id))
            .await?;
        let ballots = store.hash_get_all(&keys::ballots(&self.room_id)).await?;
        let candidates = self.candidates().await?;

        let mut tallies: HashMap<String, i64> =
            candidates.into_iter().map(|answer| (answer, 0)).collect();
        for user in state.player_ids() {
            if let Some(answer) = ballots.get(user.as_str()) {
                if let Some(tally) = tallies.get_mut(answer) {
                    *tally += 1;
                }
            }
        }
        for (answer, tally) in &tallies {
            store
                .set(&keys::votes(&self.room_id, answer), &tally.to_string())
                .await?;
        }

        let mut lines = Vec::with_capacity(state.player_count());
        for user in state.player_ids() {
            let round_score = submissions
                .get(user.as_str())
                .and_then(|answer| tallies.get(answer))
                .copied()
                .unwrap_or(0);
            let total = store
                .sorted_set_incr(&keys::leaderboard(&self.room_id), user.as_str(), round_score)
                .await?;
            lines.push(ScoreLine {
                username: state
                    .username(&user)
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                round_score,
                total,
            });
        }
        lines.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.username.cmp(&b.username))
        });

        Ok((
            RelayEvent::SendLeaderboard,
            self.services.renderer.leaderboard(&lines),
        ))
    }

    /// `leave` / `close-ws`: ロスターから外し、バリアを再評価する
    ///
    /// `connection` が現在の接続 ID と異なる場合（再接続済みの古いソケット）は無視します。
    async fn remove_player(
        &self,
        state: &mut RoomState,
        user: &UserId,
        connection: &str,
    ) -> Result<(), CoordinatorError> {
        let store = &self.services.store;
        if !connection.is_empty() {
            let user_key = keys::user(user);
            let session_room = store.hash_get(&user_key, user_field::ROOM_ID).await?;
            let current = store.hash_get(&user_key, user_field::CONNECTION).await?;
            if session_room.as_deref() == Some(self.room_id.as_str())
                && current.is_some_and(|current| current != connection)
            {
                tracing::debug!(
                    "Ignoring stale departure of '{}' from room '{}'",
                    user,
                    self.room_id
                );
                return Ok(());
            }
        }

        let round = self.sync_state(state).await?;
        if !store
            .hash_delete(&keys::players(&self.room_id), user.as_str())
            .await?
        {
            // ロスターにいない（別プロセスが処理済み、またはユーザー名の設定前）。
            // ルームが空なら、まだディレクトリにあれば削除し、なければ止めるだけ
            self.sync_state(state).await?;
            if !state.is_empty() {
                return Ok(());
            }
            if store
                .set_contains(keys::ROOM_LIST, self.room_id.as_str())
                .await?
            {
                return self.delete_room().await;
            }
            self.close();
            return Ok(());
        }

        let departure = state.remove_player(user);
        store
            .set_remove(&keys::ready(&self.room_id, round), user.as_str())
            .await?;
        // 退出者のこのラウンドの提出物は破棄する
        store
            .hash_delete(&keys::submissions(&self.room_id), user.as_str())
            .await?;
        store
            .hash_delete(&keys::ballots(&self.room_id), user.as_str())
            .await?;
        tracing::info!(
            "Player '{}' left room '{}' (was ready: {})",
            user,
            self.room_id,
            departure.is_some_and(|d| d.was_ready)
        );

        if state.is_empty() {
            return self.delete_room().await;
        }
        self.broadcast_player_list(state).await?;
        self.check_room_state(state, round).await
    }

    /// ルームのキーとディレクトリのエントリを削除し、コーディネーターを止める
    pub async fn delete_room(&self) -> Result<(), CoordinatorError> {
        let store = &self.services.store;
        let room = &self.room_id;
        store.set_remove(keys::ROOM_LIST, room.as_str()).await?;
        self.close();
        // 先読みが削除後にお題を書き戻さないように
        self.prefetch.lock().await.abort_all();

        let round = self.current_round().await?;
        for answer in self.candidates().await? {
            store.delete(&keys::votes(room, &answer)).await?;
        }
        for key in [
            keys::room(room),
            keys::players(room),
            keys::round(room),
            keys::ready(room, round),
            keys::transitions(room),
            keys::submissions(room),
            keys::ballots(room),
            keys::leaderboard(room),
        ] {
            store.delete(&key).await?;
        }
        tracing::info!("Room '{}' deleted", room);
        Ok(())
    }

    /// 次のラウンドのお題を先読み（実行中のものがあれば何もしない）
    async fn schedule_prefetch(&self) {
        let mut tasks = self.prefetch.lock().await;
        while tasks.try_join_next().is_some() {}
        if tasks.len() >= MAX_PREFETCH_IN_FLIGHT {
            tracing::debug!("Question prefetch for room '{}' in flight", self.room_id);
            return;
        }

        let store = Arc::clone(&self.services.store);
        let content = Arc::clone(&self.services.content);
        let room_key = keys::room(&self.room_id);
        tasks.spawn(async move {
            match content.generate_question().await {
                Ok(question) => {
                    if let Err(e) = store
                        .hash_set(&room_key, room_field::QUESTION, &question)
                        .await
                    {
                        tracing::warn!("Failed to store prefetched question of '{}': {}", room_key, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to prefetch question of '{}': {}", room_key, e),
            }
        });
    }

    async fn broadcast(&self, event: RelayEvent, fragment: String) -> Result<(), CoordinatorError> {
        let message = RelayMessage::new(event, self.room_id.as_str(), fragment);
        self.services.publish(&self.room_id, &message).await?;
        Ok(())
    }

    async fn broadcast_player_list(&self, state: &RoomState) -> Result<(), CoordinatorError> {
        let fragment = self.services.renderer.player_list(&state.usernames());
        self.broadcast(RelayEvent::NewPlayerList, fragment).await
    }
}
