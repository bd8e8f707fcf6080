use relay_common::AgentId;
use thiserror::Error;

/// `NotConnected` is a non-fatal signal: admin-API callers are expected to
/// treat it as "nothing to do" rather than an error worth surfacing.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent {0} is already connected")]
    AlreadyConnected(AgentId),
    #[error("agent {0} is not connected")]
    NotConnected(AgentId),
}
