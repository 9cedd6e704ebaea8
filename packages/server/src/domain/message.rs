//! Wire formats: client frames and relay envelopes.

use serde::{Deserialize, Serialize};

/// Events a client may send over its WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientEvent {
    CreateRoom,
    JoinRoom,
    SetUsername,
    Ready,
    Prompt,
    PickPicture,
    Vote,
    Leave,
    /// Synthesized by the server when the socket fails; never trusted from the wire.
    CloseWs,
    #[serde(other)]
    Unknown,
}

/// A decoded inbound frame.
///
/// HTMX `ws-send` posts the form fields next to a `HEADERS` object; the value field
/// is named `msg` there, so it is accepted as an alias of `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMessage {
    pub event: ClientEvent,
    #[serde(default, alias = "msg")]
    pub payload: String,
}

impl GameMessage {
    pub fn new(event: ClientEvent, payload: impl Into<String>) -> Self {
        Self {
            event,
            payload: payload.into(),
        }
    }

    /// The event dispatched when a connection drops without an explicit leave.
    pub fn close_ws() -> Self {
        Self::new(ClientEvent::CloseWs, "")
    }

    /// Decodes a text frame. A client-supplied `close-ws` is downgraded to `Unknown`.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let mut message: GameMessage = serde_json::from_str(text)?;
        if message.event == ClientEvent::CloseWs {
            message.event = ClientEvent::Unknown;
        }
        Ok(message)
    }
}

/// Events carried on a room's relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelayEvent {
    // Player actions, consumed by room coordinators.
    NewUser,
    Reconnect,
    Ready,
    GetPicture,
    Vote,
    Leave,
    CloseWs,
    // Broadcasts, consumed by client actors.
    NewPlayerList,
    GameRoom,
    VotePage,
    SendLeaderboard,
    #[serde(other)]
    Unknown,
}

impl RelayEvent {
    /// Broadcast events whose payload is a rendered fragment for every client.
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            RelayEvent::NewPlayerList
                | RelayEvent::GameRoom
                | RelayEvent::VotePage
                | RelayEvent::SendLeaderboard
        )
    }
}

/// The relay envelope, the unit of cross-process communication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub event: RelayEvent,
    pub sender_id: String,
    pub payload: String,
}

impl RelayMessage {
    pub fn new(event: RelayEvent, sender_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event,
            sender_id: sender_id.into(),
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_htmx_frame() {
        // テスト項目: HTMX の ws-send 形式（HEADERS + msg）をデコードできる
        // given (前提条件):
        let text = r#"{"HEADERS":{"HX-Request":"true"},"event":"join-room","msg":"AbC123"}"#;

        // when (操作):
        let message = GameMessage::decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(message, GameMessage::new(ClientEvent::JoinRoom, "AbC123"));
    }

    #[test]
    fn test_decode_without_payload() {
        // テスト項目: payload を持たないイベントは空文字列になる
        // given (前提条件):
        let text = r#"{"event":"ready"}"#;

        // when (操作):
        let message = GameMessage::decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(message.event, ClientEvent::Ready);
        assert_eq!(message.payload, "");
    }

    #[test]
    fn test_decode_unknown_event() {
        // テスト項目: 未知のイベントタグはエラーではなく Unknown になる
        // given (前提条件):
        let text = r#"{"event":"dance","payload":"x"}"#;

        // when (操作):
        let message = GameMessage::decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(message.event, ClientEvent::Unknown);
    }

    #[test]
    fn test_client_cannot_send_close_ws() {
        // テスト項目: クライアントが送った close-ws はサーバー合成イベントとして扱わない
        // given (前提条件):
        let text = r#"{"event":"close-ws"}"#;

        // when (操作):
        let message = GameMessage::decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(message.event, ClientEvent::Unknown);
    }

    #[test]
    fn test_decode_malformed_frame() {
        // テスト項目: JSON でないフレームはエラーになる
        // given (前提条件):
        let text = "hello";

        // when (操作):
        let result = GameMessage::decode(text);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_relay_message_wire_format() {
        // テスト項目: リレーメッセージは kebab-case のイベント名で JSON 化される
        // given (前提条件):
        let message = RelayMessage::new(RelayEvent::SendLeaderboard, "room1", "<div></div>");

        // when (操作):
        let json: serde_json::Value = serde_json::from_slice(&message.encode().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({
                "event": "send-leaderboard",
                "sender_id": "room1",
                "payload": "<div></div>"
            })
        );
    }

    #[test]
    fn test_broadcast_subset() {
        // テスト項目: クライアントに転送されるのはブロードキャスト 4 種のみ
        // given (前提条件):
        let all = [
            RelayEvent::NewUser,
            RelayEvent::Reconnect,
            RelayEvent::Ready,
            RelayEvent::GetPicture,
            RelayEvent::Vote,
            RelayEvent::Leave,
            RelayEvent::CloseWs,
            RelayEvent::NewPlayerList,
            RelayEvent::GameRoom,
            RelayEvent::VotePage,
            RelayEvent::SendLeaderboard,
            RelayEvent::Unknown,
        ];

        // when (操作):
        let broadcasts: Vec<RelayEvent> = all.into_iter().filter(|e| e.is_broadcast()).collect();

        // then (期待する結果):
        assert_eq!(
            broadcasts,
            vec![
                RelayEvent::NewPlayerList,
                RelayEvent::GameRoom,
                RelayEvent::VotePage,
                RelayEvent::SendLeaderboard
            ]
        );
    }
}
