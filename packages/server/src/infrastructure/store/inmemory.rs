//! InMemory StateStore 実装
//!
//! 1 プロセスで完結する構成とテストのためのストア。キーの種類（スカラー / ハッシュ /
//! セット / ソート済みセット）と有効期限の扱いを Redis に合わせています。
//!
//! - 期限切れのキーはアクセス時に削除する（遅延削除）
//! - 空になったコレクションはキーごと削除する
//! - 種類の異なる操作は `StoreError::WrongType` を返す

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::domain::{StateStore, StoreError};

#[derive(Debug)]
enum Value {
    Scalar(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, i64>),
}

impl Value {
    fn is_empty_collection(&self) -> bool {
        match self {
            Value::Scalar(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

type Entries = HashMap<String, Entry>;

/// インメモリ StateStore 実装
pub struct InMemoryStateStore {
    entries: Mutex<Entries>,
    /// 書き込みのたびに設定される有効期限
    ttl: Duration,
}

impl InMemoryStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.ttl
    }
}

/// 期限切れなら削除したうえで、生きているエントリを返す
fn live<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a mut Entry> {
    if entries
        .get(key)
        .is_some_and(|entry| entry.expires_at <= Instant::now())
    {
        entries.remove(key);
    }
    entries.get_mut(key)
}

/// 書き込み用にエントリを取得（なければ `empty` で作成）し、有効期限を延長する
fn upsert<'a>(
    entries: &'a mut Entries,
    key: &str,
    deadline: Instant,
    empty: impl FnOnce() -> Value,
) -> &'a mut Entry {
    live(entries, key);
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
        value: empty(),
        expires_at: deadline,
    });
    entry.expires_at = deadline;
    entry
}

/// 空になったコレクションのキーを削除
fn drop_if_empty(entries: &mut Entries, key: &str) {
    if entries
        .get(key)
        .is_some_and(|entry| entry.value.is_empty_collection())
    {
        entries.remove(key);
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Scalar(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        // SET は種類に関係なく上書きする
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: self.deadline(),
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = upsert(&mut entries, key, self.deadline(), || {
            Value::Scalar("0".to_string())
        });
        let Value::Scalar(raw) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let current: i64 = raw.parse().map_err(|_| StoreError::Decode {
            key: key.to_string(),
            reason: format!("'{}' is not an integer", raw),
        })?;
        let next = current + delta;
        *raw = next.to_string();
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = upsert(&mut entries, key, self.deadline(), || {
            Value::Hash(HashMap::new())
        });
        let Value::Hash(hash) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        Ok(hash.insert(field.to_string(), value.to_string()).is_none())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let deadline = self.deadline();
        let removed = match live(&mut entries, key) {
            None => return Ok(false),
            Some(entry) => {
                entry.expires_at = deadline;
                match &mut entry.value {
                    Value::Hash(hash) => hash.remove(field).is_some(),
                    _ => return Err(wrong_type(key)),
                }
            }
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = upsert(&mut entries, key, self.deadline(), || {
            Value::Set(HashSet::new())
        });
        let Value::Set(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        Ok(set.insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let deadline = self.deadline();
        let removed = match live(&mut entries, key) {
            None => return Ok(false),
            Some(entry) => {
                entry.expires_at = deadline;
                match &mut entry.value {
                    Value::Set(set) => set.remove(member),
                    _ => return Err(wrong_type(key)),
                }
            }
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sorted_set_add_new(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = upsert(&mut entries, key, self.deadline(), || {
            Value::SortedSet(HashMap::new())
        });
        let Value::SortedSet(zset) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        if zset.contains_key(member) {
            return Ok(false);
        }
        zset.insert(member.to_string(), score);
        Ok(true)
    }

    async fn sorted_set_incr(
        &self,
        key: &str,
        member: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = upsert(&mut entries, key, self.deadline(), || {
            Value::SortedSet(HashMap::new())
        });
        let Value::SortedSet(zset) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let score = zset.entry(member.to_string()).or_insert(0);
        *score += delta;
        Ok(*score)
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let deadline = self.deadline();
        let removed = match live(&mut entries, key) {
            None => return Ok(false),
            Some(entry) => {
                entry.expires_at = deadline;
                match &mut entry.value {
                    Value::SortedSet(zset) => zset.remove(member).is_some(),
                    _ => return Err(wrong_type(key)),
                }
            }
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn sorted_set_range_with_scores(
        &self,
        key: &str,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::SortedSet(zset)) => {
                let mut ranked: Vec<(String, i64)> =
                    zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
                // ZREVRANGE と同じく、同点はメンバーの辞書順の逆
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
                Ok(ranked)
            }
            Some(_) => Err(wrong_type(key)),
        }
    }
}
