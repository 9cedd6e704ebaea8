//! Integration tests for the HTTP / WebSocket surface over a real socket.

use std::{sync::Arc, time::Duration};

use easel_server::{
    infrastructure::{
        content::StockContentGenerator, relay::InMemoryRelayBus, renderer::HtmlFragmentRenderer,
        store::InMemoryStateStore,
    },
    ui::Server,
    usecase::{GameServices, GetRoomDetailUseCase, RoomRegistry},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Helper struct to manage an in-process server
struct TestServer {
    addr: std::net::SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(InMemoryStateStore::new(Duration::from_secs(60)));
        let services = GameServices::new(
            store.clone(),
            Arc::new(InMemoryRelayBus::new()),
            Arc::new(StockContentGenerator::new()),
            Arc::new(HtmlFragmentRenderer::new()),
        );
        let server = Server::new(
            Arc::new(RoomRegistry::new(services)),
            Arc::new(GetRoomDetailUseCase::new(store)),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });
        Self { addr, handle }
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn ws(&self, user_id: &str) -> String {
        format!("ws://{}/ws?user_id={}", self.addr, user_id)
    }

    async fn connect(&self, user_id: &str) -> WsStream {
        let (ws, _) = connect_async(self.ws(user_id)).await.unwrap();
        ws
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// htmx の `ws-send` と同じ形のフレームを送る
async fn send(ws: &mut WsStream, event: &str, msg: &str) {
    let frame = serde_json::json!({
        "event": event,
        "msg": msg,
        "HEADERS": {"HX-Request": "true"},
    });
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// `needle` を含むテキストフレームが届くまで読み進める
async fn expect(ws: &mut WsStream, needle: &str) -> String {
    let wait = async {
        while let Some(frame) = ws.next().await {
            if let Ok(Message::Text(text)) = frame {
                if text.as_str().contains(needle) {
                    return text.as_str().to_string();
                }
            }
        }
        panic!("socket closed while waiting for '{}'", needle);
    };
    tokio::time::timeout(TIMEOUT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{}'", needle))
}

/// 待合室のフラグメントからルーム ID を取り出す
fn room_id_of(waiting_room: &str) -> String {
    let start = waiting_room.find("<h2>Room ").unwrap() + "<h2>Room ".len();
    let end = start + waiting_room[start..].find("</h2>").unwrap();
    waiting_room[start..end].to_string()
}

#[tokio::test]
async fn test_health_check() {
    // テスト項目: ヘルスチェックが ok を返す
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let body: serde_json::Value = reqwest::get(server.http("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(body, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_session_issues_user_id() {
    // テスト項目: /api/session が毎回新しい user_id を発行する
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let first: serde_json::Value = reqwest::get(server.http("/api/session"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = reqwest::get(server.http("/api/session"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert!(first["user_id"].is_string());
    assert_ne!(first["user_id"], second["user_id"]);
}

#[tokio::test]
async fn test_unknown_room_detail_is_not_found() {
    // テスト項目: 存在しないルームの詳細は 404
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let response = reqwest::get(server.http("/api/rooms/nosuchroom"))
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_user_id_is_rejected() {
    // テスト項目: 不正な user_id での接続は拒否される
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let result = connect_async(server.ws("bad%20id!")).await;

    // then (期待する結果):
    assert!(result.is_err());
}

#[tokio::test]
async fn test_create_room_and_join_over_websocket() {
    // テスト項目: WebSocket 経由でルームを作成・参加でき、ルーム詳細 API に反映される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("u-alice").await;
    let mut bob = server.connect("u-bob").await;

    // when (操作):
    send(&mut alice, "create-room", "").await;
    expect(&mut alice, "set-username").await;
    send(&mut alice, "set-username", "alice").await;
    let room_id = room_id_of(&expect(&mut alice, "<h2>Room ").await);
    send(&mut bob, "join-room", &room_id).await;
    expect(&mut bob, "set-username").await;
    send(&mut bob, "set-username", "bob").await;
    expect(&mut alice, "<li>bob</li>").await;

    // then (期待する結果):
    let detail: serde_json::Value = reqwest::get(server.http(&format!("/api/rooms/{}", room_id)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["id"], room_id.as_str());
    assert_eq!(detail["phase"], "waiting");
    let names: Vec<&str> = detail["players"]
        .as_array()
        .unwrap()
        .iter()
        .map(|player| player["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_closing_last_socket_deletes_room() {
    // テスト項目: 最後のプレイヤーの接続が閉じるとルームが削除される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("u-alice").await;
    send(&mut alice, "create-room", "").await;
    expect(&mut alice, "set-username").await;
    send(&mut alice, "set-username", "alice").await;
    let room_id = room_id_of(&expect(&mut alice, "<h2>Room ").await);
    expect(&mut alice, "<li>alice</li>").await;

    // when (操作):
    alice.close(None).await.unwrap();
    drop(alice);

    // then (期待する結果):
    let url = server.http(&format!("/api/rooms/{}", room_id));
    let deleted = async {
        loop {
            let status = reqwest::get(&url).await.unwrap().status();
            if status == reqwest::StatusCode::NOT_FOUND {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(TIMEOUT, deleted).await.unwrap();
}
