//! The per-socket agent connection actor (SPEC_FULL.md §4.3).

pub mod error;
pub mod filters;
pub mod handlers;

use std::{collections::HashMap, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use relay_common::{AccountId, Agent, BusError, Frame, LocalSubscriber, SpaceId};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use error::ConnectionError;
pub use filters::OutboundFilters;

use crate::state::{ConnectionCommand, GlobalState};

const BUS_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Number of bus messages drained per poll tick before yielding back to the
/// socket-receiver branch, so one noisy space can't starve inbound reads.
const BUS_DRAIN_BATCH: usize = 32;

/// The connection's state machine: `AwaitingLogin` before a successful
/// `login` command, `Authenticated` after.
enum Phase {
    AwaitingLogin,
    Authenticated {
        agent: Agent,
        account: AccountId,
        /// Currently subscribed spaces, name to id.
        spaces: HashMap<String, SpaceId>,
    },
}

pub struct AgentConnection {
    socket: WebSocket,
    subscriber: LocalSubscriber,
    global: GlobalState,
    phase: Phase,
    filters: OutboundFilters,
    registered: bool,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
}

impl AgentConnection {
    pub fn new(socket: WebSocket, global: GlobalState) -> Self {
        let subscriber = global.bus.subscriber();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            socket,
            subscriber,
            global,
            phase: Phase::AwaitingLogin,
            filters: OutboundFilters::default(),
            registered: false,
            command_tx,
            command_rx,
        }
    }

    /// Runs the connection until the socket closes, the client sends a
    /// terminal error, or the registry asks it to close. Always ends by
    /// running the guaranteed-release shutdown region.
    pub async fn run(mut self) {
        let mut bus_poll = tokio::time::interval(BUS_POLL_INTERVAL);
        loop {
            tokio::select! {
                frame = self.socket.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(error) = self.handle_inbound(&text).await {
                                warn!(%error, "closing connection after inbound error");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            warn!(%error, "socket error, closing connection");
                            break;
                        }
                    }
                }
                _ = bus_poll.tick() => {
                    if self.drain_bus().await.is_err() {
                        break;
                    }
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Join(names)) => self.add_spaces(names).await,
                        Some(ConnectionCommand::Leave(names)) => self.remove_spaces(names).await,
                        Some(ConnectionCommand::Close) | None => break,
                    }
                }
            }
        }
        self.shutdown().await;
    }

    async fn handle_inbound(&mut self, raw: &str) -> Result<(), ConnectionError> {
        let frame = Frame::decode(raw)?;
        handlers::dispatch(self, frame).await
    }

    /// Pulls up to `BUS_DRAIN_BATCH` messages currently buffered on the bus
    /// subscriber, applies the outbound filter rules, and writes survivors
    /// to the socket. Decode failures on the bus path are logged and
    /// skipped rather than treated as fatal: they indicate a publisher
    /// bug elsewhere in the process, not a problem with this connection.
    async fn drain_bus(&mut self) -> Result<(), ConnectionError> {
        for _ in 0..BUS_DRAIN_BATCH {
            let Some((_, payload)) = self.subscriber.next().await else {
                break;
            };
            let mut frame = match Frame::decode(&payload) {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(%error, "dropping malformed frame from bus");
                    continue;
                }
            };
            if !self.filters.apply(&mut frame) {
                continue;
            }
            let Ok(encoded) = frame.encode() else { continue };
            if self.socket.send(Message::Text(encoded)).await.is_err() {
                return Err(ConnectionError::Bus(BusError::Closed));
            }
        }
        Ok(())
    }

    async fn reply(&mut self, frame: Frame) {
        if let Ok(encoded) = frame.encode() {
            let _ = self.socket.send(Message::Text(encoded)).await;
        }
    }

    fn is_authenticated(&self) -> bool {
        matches!(self.phase, Phase::Authenticated { .. })
    }

    fn agent(&self) -> Option<&Agent> {
        match &self.phase {
            Phase::Authenticated { agent, .. } => Some(agent),
            Phase::AwaitingLogin => None,
        }
    }

    fn account(&self) -> Option<AccountId> {
        match &self.phase {
            Phase::Authenticated { account, .. } => Some(*account),
            Phase::AwaitingLogin => None,
        }
    }

    /// The space set currently subscribed, in no particular order.
    fn subscribed_spaces(&self) -> Vec<String> {
        match &self.phase {
            Phase::Authenticated { spaces, .. } => spaces.keys().cloned().collect(),
            Phase::AwaitingLogin => Vec::new(),
        }
    }

    /// Resolves `names` (the `"*"` sentinel meaning "all of this agent's
    /// memberships", anything else scoped to the account) and subscribes
    /// the connection's bus subscriber to each. Shared by the client-facing
    /// `join` command and registry-initiated membership pushes.
    async fn add_spaces(&mut self, names: Vec<String>) {
        let (account, agent_id) = match &self.phase {
            Phase::Authenticated { account, agent, .. } => (*account, agent.id),
            Phase::AwaitingLogin => return,
        };

        let resolved = if names.iter().any(|name| name == "*") {
            self.global.catalog.spaces_of(agent_id).await
        } else {
            self.global.catalog.spaces_where(&names, account).await
        };

        for space in resolved {
            self.subscriber.subscribe(&space.id.to_string()).await;
            if let Phase::Authenticated { spaces, .. } = &mut self.phase {
                spaces.insert(space.name, space.id);
            }
        }
    }

    /// Symmetric with `add_spaces`; `"*"` means the currently subscribed
    /// set. Never unsubscribes the agent's own uuid topic.
    async fn remove_spaces(&mut self, names: Vec<String>) {
        let own_topic = match self.agent() {
            Some(agent) => agent.id.to_string(),
            None => return,
        };
        let names = if names.iter().any(|name| name == "*") {
            self.subscribed_spaces()
        } else {
            names
        };

        for name in names {
            let removed = match &mut self.phase {
                Phase::Authenticated { spaces, .. } => spaces.remove(&name),
                Phase::AwaitingLogin => None,
            };
            if let Some(space_id) = removed {
                if space_id.to_string() != own_topic {
                    self.subscriber.unsubscribe(&space_id.to_string()).await;
                }
            }
        }
    }

    /// The guaranteed-release region: unconditionally drops the registry
    /// entry (if one was ever added) and the bus subscriber. Run exactly
    /// once, on every exit path out of `run`.
    async fn shutdown(&mut self) {
        if self.registered {
            if let Some(agent) = self.agent() {
                let _ = self.global.registry.remove(agent.id);
            }
        }
        info!(authenticated = self.is_authenticated(), "connection closed");
    }
}
