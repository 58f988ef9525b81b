use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use common::ConnectionId;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Post `body` to a live connection as a text frame.
///
/// Responds 410 when the connection is unknown or its socket has closed.
pub async fn push_to_connection(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    body: String,
) -> Result<StatusCode, AppError> {
    let connection_id = ConnectionId::new(connection_id);

    let Some(sender) = state
        .connections
        .get(&connection_id)
        .map(|entry| entry.value().clone())
    else {
        warn!(connection_id = %connection_id, "Push to unknown connection");
        return Err(AppError::Gone(connection_id.to_string()));
    };

    if sender.send(body).await.is_err() {
        state.connections.remove(&connection_id);
        warn!(connection_id = %connection_id, "Push to closed connection");
        return Err(AppError::Gone(connection_id.to_string()));
    }

    debug!(connection_id = %connection_id, "Pushed to connection");
    Ok(StatusCode::OK)
}
