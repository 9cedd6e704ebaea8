//! Value objects.
//!
//! 文字列をそのまま引き回さず、生成時に検証済みの型として扱います。

use std::fmt;

use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use uuid::Uuid;

use super::error::ValueObjectError;

/// Maximum length of a user identifier.
const USER_ID_MAX_LEN: usize = 64;
/// Maximum length of a room identifier.
const ROOM_ID_MAX_LEN: usize = 32;
/// Length of generated room identifiers.
const ROOM_ID_LEN: usize = 8;
/// Maximum length of a display name, in characters.
const USERNAME_MAX_CHARS: usize = 24;

/// Stable opaque identifier of a player; survives reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::Empty("user_id"));
        }
        if value.len() > USER_ID_MAX_LEN {
            return Err(ValueObjectError::TooLong {
                field: "user_id",
                max: USER_ID_MAX_LEN,
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValueObjectError::InvalidCharacter("user_id"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues fresh anonymous user identifiers.
pub struct UserIdFactory;

impl UserIdFactory {
    pub fn generate() -> UserId {
        UserId(Uuid::new_v4().to_string())
    }
}

/// Short unique identifier of a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(ValueObjectError::Empty("room_id"));
        }
        if value.len() > ROOM_ID_MAX_LEN {
            return Err(ValueObjectError::TooLong {
                field: "room_id",
                max: ROOM_ID_MAX_LEN,
            });
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValueObjectError::InvalidCharacter("room_id"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates random room identifiers.
pub struct RoomIdFactory;

impl RoomIdFactory {
    pub fn generate() -> RoomId {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ROOM_ID_LEN)
            .map(char::from)
            .collect();
        RoomId(id)
    }
}

/// Display name chosen by a player. Not required to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(ValueObjectError::Empty("username"));
        }
        if value.chars().count() > USERNAME_MAX_CHARS {
            return Err(ValueObjectError::TooLong {
                field: "username",
                max: USERNAME_MAX_CHARS,
            });
        }
        if value.chars().any(char::is_control) {
            return Err(ValueObjectError::InvalidCharacter("username"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Username {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one WebSocket connection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_accepts_uuid() {
        // テスト項目: UUID 形式のユーザー ID を受け付ける
        // given (前提条件):
        let raw = Uuid::new_v4().to_string();

        // when (操作):
        let result = UserId::new(raw.clone());

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), raw);
    }

    #[test]
    fn test_user_id_rejects_key_separator() {
        // テスト項目: ストアのキー区切り文字を含む ID は拒否される
        // given (前提条件):
        let raw = "alice:room".to_string();

        // when (操作):
        let result = UserId::new(raw);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::InvalidCharacter("user_id")));
    }

    #[test]
    fn test_user_id_rejects_empty() {
        // テスト項目: 空のユーザー ID は拒否される
        // given (前提条件):
        let raw = String::new();

        // when (操作):
        let result = UserId::new(raw);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::Empty("user_id")));
    }

    #[test]
    fn test_generated_room_id_is_short_and_valid() {
        // テスト項目: 生成されたルーム ID は 8 文字の英数字で、検証を通過する
        // given (前提条件):

        // when (操作):
        let room_id = RoomIdFactory::generate();

        // then (期待する結果):
        assert_eq!(room_id.as_str().len(), ROOM_ID_LEN);
        assert!(RoomId::new(room_id.as_str().to_string()).is_ok());
    }

    #[test]
    fn test_room_id_trims_whitespace() {
        // テスト項目: フォーム入力の前後の空白は取り除かれる
        // given (前提条件):
        let raw = "  AbC123  ".to_string();

        // when (操作):
        let room_id = RoomId::new(raw).unwrap();

        // then (期待する結果):
        assert_eq!(room_id.as_str(), "AbC123");
    }

    #[test]
    fn test_username_limits() {
        // テスト項目: ユーザー名は空白のみ・長すぎる場合に拒否される
        // given (前提条件):
        let blank = "   ".to_string();
        let long = "x".repeat(USERNAME_MAX_CHARS + 1);

        // when (操作):
        let blank_result = Username::new(blank);
        let long_result = Username::new(long);

        // then (期待する結果):
        assert_eq!(blank_result, Err(ValueObjectError::Empty("username")));
        assert_eq!(
            long_result,
            Err(ValueObjectError::TooLong {
                field: "username",
                max: USERNAME_MAX_CHARS
            })
        );
    }

    #[test]
    fn test_username_allows_unicode() {
        // テスト項目: マルチバイト文字のユーザー名は文字数で判定される
        // given (前提条件):
        let raw = "ねこ画伯".to_string();

        // when (操作):
        let result = Username::new(raw);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "ねこ画伯");
    }
}
