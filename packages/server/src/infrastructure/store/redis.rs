//! Redis StateStore 実装
//!
//! 複数のサーバープロセスが同じルームを扱うための共有ストア。
//! 書き込みは `MULTI` パイプラインで `EXPIRE` と組にし、有効期限を毎回延長します。

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};

use crate::domain::{StateStore, StoreError};

/// Redis を使った StateStore 実装
#[derive(Clone)]
pub struct RedisStateStore {
    connection: ConnectionManager,
    ttl_secs: i64,
}

impl RedisStateStore {
    /// 接続を確立して RedisStateStore を作成
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let connection = ConnectionManager::new(client).await.map_err(backend)?;
        tracing::info!("Connected to Redis state store at {}", url);
        Ok(Self {
            connection,
            ttl_secs: ttl.as_secs().max(1) as i64,
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn backend(e: RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Redis の整数応答（追加 / 削除した件数）を「変化したか」に変換
fn changed(count: i64) -> bool {
    count > 0
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn().get(key).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        redis::pipe()
            .atomic()
            .set(key, value)
            .ignore()
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, delta)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn().del(key).await.map_err(backend)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.conn().hget(key, field).await.map_err(backend)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let (created,): (i64,) = redis::pipe()
            .atomic()
            .hset(key, field, value)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(changed(created))
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .hdel(key, field)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(changed(removed))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.conn().hgetall(key).await.map_err(backend)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let (added,): (i64,) = redis::pipe()
            .atomic()
            .sadd(key, member)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(changed(added))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .srem(key, member)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(changed(removed))
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.conn().sismember(key, member).await.map_err(backend)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.conn().smembers(key).await.map_err(backend)
    }

    async fn sorted_set_add_new(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> Result<bool, StoreError> {
        let (added,): (i64,) = redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(key)
            .arg("NX")
            .arg(score)
            .arg(member)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(changed(added))
    }

    async fn sorted_set_incr(
        &self,
        key: &str,
        member: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let (score,): (f64,) = redis::pipe()
            .atomic()
            .zincr(key, member, delta)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(score as i64)
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .zrem(key, member)
            .expire(key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(backend)?;
        Ok(changed(removed))
    }

    async fn sorted_set_range_with_scores(
        &self,
        key: &str,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let ranked: Vec<(String, f64)> = self
            .conn()
            .zrevrange_withscores(key, 0, -1)
            .await
            .map_err(backend)?;
        Ok(ranked
            .into_iter()
            .map(|(member, score)| (member, score as i64))
            .collect())
    }
}
