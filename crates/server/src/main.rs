use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use relay_common::{LocalBus, MemoryCatalog};
use tracing::{error, info};

mod cli;
mod connection;
mod logging;
mod server;
mod state;

use cli::Cli;
use state::GlobalState;

#[tokio::main]
async fn main() {
    let _guard = logging::init();

    let cli = Cli::parse();
    let socket_addr = SocketAddr::new(cli.bind_addr, cli.port);

    let catalog = Arc::new(MemoryCatalog::new());
    let bus = LocalBus::new();
    let state = GlobalState::new(catalog, bus);

    info!("starting relay on {socket_addr}");
    if let Err(err) = server::start(state, socket_addr).await {
        error!("error starting server: {err:?}");
    }
}
