//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{GameMessage, UserId},
    ui::state::AppState,
    usecase::{ClientActor, DispatchOutcome},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> UserId (Domain Model)
    let user_id = match UserId::try_from(query.user_id.clone()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Invalid user_id '{}': {}", query.user_id, e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    tracing::info!("Client '{}' connecting", user_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Spawns a task that drains the client's write queue into the WebSocket sender.
///
/// The task ends when the queue closes or a write fails.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(fragment) = rx.recv().await {
            if sender.send(Message::Text(fragment.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let stop = CancellationToken::new();
    let recv_stop = stop.clone();
    let registry = Arc::clone(&state.registry);

    // The receive task owns the actor: client events are handled one at a time
    let mut recv_task = tokio::spawn(async move {
        let mut actor = ClientActor::connect(user_id, tx, registry).await;
        let mut closed = false;

        loop {
            let frame = tokio::select! {
                _ = recv_stop.cancelled() => None,
                frame = receiver.next() => frame,
            };
            let Some(frame) = frame else { break };
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error from '{}': {}", actor.user_id(), e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let message = match GameMessage::decode(text.as_str()) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!(
                                "Malformed frame from '{}' ignored: {}",
                                actor.user_id(),
                                e
                            );
                            continue;
                        }
                    };
                    tracing::debug!("'{}' sent {:?}", actor.user_id(), message.event);
                    if actor.dispatch(message).await == DispatchOutcome::Close {
                        closed = true;
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Client '{}' requested close", actor.user_id());
                    break;
                }
                _ => {}
            }
        }

        // 明示的な leave 以外の切断
        if !closed {
            actor.dispatch(GameMessage::close_ws()).await;
        }
        actor.shutdown().await;
        tracing::info!("Client '{}' disconnected", actor.user_id());
    });

    let mut send_task = pusher_loop(rx, sender);

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => {
            // 書き込みに失敗した接続も close-ws で片付ける
            stop.cancel();
            let _ = recv_task.await;
        }
    };
}
