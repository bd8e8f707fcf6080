use std::net::SocketAddr;

use axum::{routing::get, Router};

pub mod error;
mod ws;

use self::error::StartError;
use crate::state::GlobalState;

pub async fn start(state: GlobalState, socket_addr: SocketAddr) -> Result<(), StartError> {
    let app = Router::new()
        .route("/agent", get(ws::agent_ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(socket_addr)
        .await
        .map_err(StartError::TcpBind)?;

    axum::serve(listener, app).await.map_err(StartError::Serve)?;

    Ok(())
}
