//! WebSocket endpoint clients submit text over and receive results on.
//!
//! Client -> Server (JSON):
//! ```json
//! {"text": "I love sunny days", "storageKey": "abc123", "bedrock": true}
//! ```
//!
//! Server -> Client: whatever is pushed to the connection, e.g.
//! ```json
//! {"url": "https://bucket.s3.region.amazonaws.com/abc123"}
//! ```

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use common::{ConnectionId, PipelineError};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::ingest::ingest;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = ConnectionId::new(uuid::Uuid::new_v4().to_string());

    let (tx, mut rx) = mpsc::channel::<String>(state.send_buffer);
    state.connections.insert(connection_id.clone(), tx);
    info!(connection_id = %connection_id, "Client connected");

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match ingest(&state, &connection_id, text.as_str()).await {
                Ok(_) => {}
                Err(e @ PipelineError::Validation(_)) => {
                    warn!(connection_id = %connection_id, error = %e, "Rejected client frame");
                }
                Err(e) => {
                    error!(connection_id = %connection_id, kind = e.kind(), error = %e, "Ingestion failed");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.connections.remove(&connection_id);
    sender_task.abort();
    info!(connection_id = %connection_id, "Client disconnected");
}
