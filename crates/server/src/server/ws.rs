use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::{IntoResponse, Response},
};

use crate::{connection::AgentConnection, state::GlobalState};

/// The relay's single route: every agent connects here and authenticates
/// with a `login` command once the socket is open (SPEC_FULL.md §6).
pub async fn agent_ws_handler(ws: WebSocketUpgrade, State(state): State<GlobalState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        AgentConnection::new(socket, state).run().await;
    })
    .into_response()
}
