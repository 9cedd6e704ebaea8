//! Key layout of the shared store.
//!
//! 全プロセスが同じキーを参照するため、キー名の組み立てはここに集約します。

use super::value_object::{RoomId, UserId};

/// Set of live room ids.
pub const ROOM_LIST: &str = "room-list";

/// Values of the user-hash `ready` field.
pub const IS_READY: &str = "is-ready";
pub const IS_NOT_READY: &str = "is-not-ready";

/// Fields of the `user:{id}` hash (the session backup).
pub mod user_field {
    pub const USERNAME: &str = "username";
    pub const ROOM_ID: &str = "room-id";
    pub const CONNECTION: &str = "connection";
    pub const READY: &str = "ready";
}

/// Fields of the `room:{id}` hash.
pub mod room_field {
    pub const PHASE: &str = "phase";
    pub const QUESTION: &str = "question";
    pub const BACKUP: &str = "room-backup";
    pub const CANDIDATES: &str = "candidates";
}

pub fn user(user: &UserId) -> String {
    format!("user:{}", user)
}

pub fn room(room: &RoomId) -> String {
    format!("room:{}", room)
}

pub fn players(room: &RoomId) -> String {
    format!("room:{}:players", room)
}

pub fn round(room: &RoomId) -> String {
    format!("room:{}:round", room)
}

pub fn ready(room: &RoomId, round: u64) -> String {
    format!("room:{}:ready:{}", room, round)
}

pub fn transitions(room: &RoomId) -> String {
    format!("room:{}:transitions", room)
}

pub fn submissions(room: &RoomId) -> String {
    format!("room:{}:submissions", room)
}

pub fn ballots(room: &RoomId) -> String {
    format!("room:{}:ballots", room)
}

pub fn votes(room: &RoomId, answer: &str) -> String {
    format!("room:{}:votes:{}", room, answer)
}

pub fn leaderboard(room: &RoomId) -> String {
    format!("room:{}:leaderboard", room)
}

/// Relay bus channel of a room.
pub fn channel(room: &RoomId) -> String {
    format!("room:{}:relay", room)
}
