//! UseCase: ルームレジストリ
//!
//! このプロセスで動いているルームコーディネーターの一覧。ルームの存在はストアの
//! ディレクトリ（`room-list`）が正で、ここはプロセスローカルなキャッシュです。

use std::{collections::HashMap, sync::Arc};

use tokio::{sync::Mutex, task::JoinHandle};

use crate::domain::{RoomId, RoomIdFactory, keys};

use super::{error::CoordinatorError, room_coordinator::RoomCoordinator, services::GameServices};

type Coordinators = HashMap<RoomId, Arc<RoomCoordinator>>;

pub struct RoomRegistry {
    services: GameServices,
    /// Key: ルーム ID
    /// Value: このプロセスのコーディネーター（リスナーループの終了時に外れる）
    coordinators: Arc<Mutex<Coordinators>>,
}

impl RoomRegistry {
    pub fn new(services: GameServices) -> Self {
        Self {
            services,
            coordinators: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn services(&self) -> &GameServices {
        &self.services
    }

    /// 新しいルームを作成し、そのコーディネーターを起動
    pub async fn create_room(&self) -> Result<RoomId, CoordinatorError> {
        let room_id = RoomIdFactory::generate();
        let coordinator = RoomCoordinator::create(room_id.clone(), self.services.clone()).await?;
        let mut coordinators = self.coordinators.lock().await;
        self.start(&mut coordinators, room_id.clone(), coordinator)
            .await?;
        Ok(room_id)
    }

    /// コーディネーターを起動して登録し、ループが終わったら登録から外す
    ///
    /// 呼び出し側がマップのロックを持っている間に登録するので、すぐに止まった
    /// コーディネーターでも取り外しは登録の後になります。
    async fn start(
        &self,
        coordinators: &mut Coordinators,
        room_id: RoomId,
        coordinator: Arc<RoomCoordinator>,
    ) -> Result<(), CoordinatorError> {
        let handle = coordinator.spawn().await?;
        coordinators.insert(room_id.clone(), Arc::clone(&coordinator));
        tokio::spawn(untrack_on_stop(
            Arc::clone(&self.coordinators),
            room_id,
            coordinator,
            handle,
        ));
        Ok(())
    }

    /// ディレクトリにルームが登録されているか
    pub async fn room_exists(&self, room_id: &RoomId) -> Result<bool, CoordinatorError> {
        Ok(self
            .services
            .store
            .set_contains(keys::ROOM_LIST, room_id.as_str())
            .await?)
    }

    /// ルームのコーディネーターがこのプロセスで動いていることを保証する
    ///
    /// ルームがディレクトリにない場合は `false` を返し、残っているローカルの
    /// コーディネーターを片付けます。
    pub async fn ensure_coordinator(&self, room_id: &RoomId) -> Result<bool, CoordinatorError> {
        let mut coordinators = self.coordinators.lock().await;
        if !self.room_exists(room_id).await? {
            if let Some(stale) = coordinators.remove(room_id) {
                stale.close();
            }
            return Ok(false);
        }

        if coordinators
            .get(room_id)
            .is_some_and(|coordinator| !coordinator.is_closed())
        {
            return Ok(true);
        }

        let coordinator = RoomCoordinator::attach(room_id.clone(), self.services.clone());
        self.start(&mut coordinators, room_id.clone(), coordinator)
            .await?;
        tracing::info!("Attached coordinator to room '{}'", room_id);
        Ok(true)
    }

    /// 登録中のコーディネーター数
    pub async fn active_rooms(&self) -> usize {
        self.coordinators.lock().await.len()
    }

    /// 全コーディネーターを停止
    pub async fn shutdown(&self) {
        let mut coordinators = self.coordinators.lock().await;
        for coordinator in coordinators.values() {
            coordinator.close();
        }
        tracing::info!("Stopped {} room coordinator(s)", coordinators.len());
        coordinators.clear();
    }
}

async fn untrack_on_stop(
    coordinators: Arc<Mutex<Coordinators>>,
    room_id: RoomId,
    coordinator: Arc<RoomCoordinator>,
    handle: JoinHandle<()>,
) {
    if let Err(e) = handle.await {
        tracing::error!("Coordinator task of room '{}' failed: {}", room_id, e);
    }
    let mut coordinators = coordinators.lock().await;
    // 同じ ID で付け直されたコーディネーターは残す
    if coordinators
        .get(&room_id)
        .is_some_and(|current| Arc::ptr_eq(current, &coordinator))
    {
        coordinators.remove(&room_id);
        tracing::debug!("Coordinator of room '{}' unregistered", room_id);
    }
}
