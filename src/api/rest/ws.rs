use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.lifecycle.subscribe();

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let offer = match rx.recv().await {
                Ok(offer) => offer,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging; offer events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&offer) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize ride offer for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    first_to_finish(send_task, recv_task).await;

    info!("websocket client disconnected");
}

/// Waits for either task and aborts the other.
async fn first_to_finish<A, B>(mut left: JoinHandle<A>, mut right: JoinHandle<B>) {
    tokio::select! {
        _ = &mut left => right.abort(),
        _ = &mut right => left.abort(),
    }
}
