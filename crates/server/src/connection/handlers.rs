//! Command dispatch and the relay path (SPEC_FULL.md §4.3, §4.4).

use relay_common::{parse_space_names, AccountId, Frame, Kind, Record};
use serde_json::{json, Value};
use tracing::warn;

use super::{AgentConnection, ConnectionError, Phase};

/// Looks up a handler by `(kind, name)` with a per-kind wildcard fallback,
/// and invokes it. Commands other than `login` are silently ignored before
/// authentication; there's nothing sensible to dispatch to yet.
pub async fn dispatch(conn: &mut AgentConnection, frame: Frame) -> Result<(), ConnectionError> {
    if !conn.is_authenticated() && !matches!((frame.kind, frame.name.as_str()), (Kind::Command, "login")) {
        return Ok(());
    }

    match frame.kind {
        Kind::Command => {
            match frame.name.as_str() {
                "login" => handle_login(conn, frame).await?,
                "join" => handle_join(conn, frame).await,
                "leave" => handle_leave(conn, frame).await,
                "filter" => handle_filter(conn, frame).await,
                _ => handle_unknown_command(conn, frame).await,
            }
            Ok(())
        }
        Kind::Event | Kind::Message | Kind::Request | Kind::Response => relay(conn, frame).await,
    }
}

async fn handle_login(conn: &mut AgentConnection, frame: Frame) -> Result<(), ConnectionError> {
    let token = frame.data.get("token").and_then(Value::as_str).unwrap_or("");

    let Some(agent) = conn.global.catalog.agent_by_token(token).await else {
        conn.reply(frame.reply("login-failed", None)).await;
        return Err(ConnectionError::AuthFailure);
    };

    if let Err(error) = conn
        .global
        .registry
        .add(agent.id, agent.account, conn.command_tx.clone())
    {
        conn.reply(frame.reply("login-failed", None)).await;
        return Err(error.into());
    }

    conn.registered = true;
    conn.subscriber.subscribe(&agent.id.to_string()).await;
    conn.phase = Phase::Authenticated {
        account: agent.account,
        agent,
        spaces: Default::default(),
    };

    let mut reply = frame.reply("login-ok", None);
    reply.set_meta("space", json!({ "name": "server" }));
    conn.reply(reply).await;
    Ok(())
}

async fn handle_join(conn: &mut AgentConnection, frame: Frame) {
    let names = parse_space_names(frame.data.get("spaces"));
    conn.add_spaces(names).await;

    let mut reply = frame.reply("join-ok", None);
    reply.set_meta("space", json!({ "name": "server" }));
    conn.reply(reply).await;
}

async fn handle_leave(conn: &mut AgentConnection, frame: Frame) {
    let names = parse_space_names(frame.data.get("spaces"));
    conn.remove_spaces(names).await;
    conn.reply(frame.reply("leave-ok", None)).await;
}

async fn handle_filter(conn: &mut AgentConnection, frame: Frame) {
    let size = frame.data.get("size").and_then(Value::as_u64);
    let names = frame.data.get("names").and_then(Value::as_object);
    conn.filters.update(size, names);
    conn.reply(frame.reply("filter-ok", None)).await;
}

async fn handle_unknown_command(conn: &mut AgentConnection, frame: Frame) {
    let mut data = Record::new();
    data.insert("command".to_string(), json!(frame.name));
    conn.reply(frame.reply("unknown-command", Some(data))).await;
}

/// Relays an `event`/`message`/`request`/`response` frame: the target space
/// set comes from `meta.spaces` if present, otherwise the connection's own
/// subscribed spaces, then runs through `broadcast_send`.
async fn relay(conn: &mut AgentConnection, frame: Frame) -> Result<(), ConnectionError> {
    // `dispatch` only reaches here once authenticated, but fall through
    // quietly rather than panic if that ever stops being true.
    let (Some(account), Some(agent_name)) = (conn.account(), conn.agent().map(|a| a.name.clone()))
    else {
        return Ok(());
    };

    let target_names = match frame.get_meta("spaces") {
        Some(value) => parse_space_names(Some(value)),
        None => conn.subscribed_spaces(),
    };

    broadcast_send(conn, frame, agent_name, account, target_names).await;
    Ok(())
}

/// The relay path proper (SPEC_FULL.md §4.4): augments meta, self-subscribes
/// requests to their own name for correlation, resolves the target space
/// names, and fans the frame out once per space via the registry.
async fn broadcast_send(
    conn: &mut AgentConnection,
    mut frame: Frame,
    agent_name: String,
    account: AccountId,
    target_names: Vec<String>,
) {
    frame.set_meta("source", json!({ "name": agent_name }));
    frame.set_meta("timestamp", json!(chrono::Utc::now().to_rfc3339()));

    if frame.kind == Kind::Request {
        conn.filters.request.insert(frame.name.clone());
    }

    if target_names.is_empty() {
        warn!(name = %frame.name, "broadcast_send has no target spaces, dropping");
        return;
    }

    let spaces = conn.global.catalog.spaces_where(&target_names, account).await;
    conn.global.registry.broadcast(&frame, &spaces);
}
