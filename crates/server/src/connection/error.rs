use relay_common::{BusError, CatalogError, FrameError};
use thiserror::Error;

use crate::state::RegistryError;

/// Aggregates the collaborator error seams behind one result type for the
/// connection's inbound path. Everything here except `AuthFailure` is a
/// bubbled-up error from another module's own enum.
///
/// `Kind` is a closed enum (command/event/message/request/response), so an
/// unrecognized kind string is already rejected by `Frame::decode` as
/// `FrameError::Malformed`; there's no separate "recognized kind, no
/// dispatch" state to model here.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("authentication failed")]
    AuthFailure,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Bus(#[from] BusError),
}
