//! Shared types for the agent message relay: the wire frame, opaque ids,
//! and the catalog-store/bus collaborator boundaries.

pub mod bus;
pub mod catalog;
pub mod frame;
pub mod ids;
pub mod util;

pub use bus::{BusError, BusPublisher, BusSubscriber, LocalBus, LocalPublisher, LocalSubscriber};
pub use catalog::{Account, Agent, CatalogError, CatalogStore, MemoryCatalog, Membership, Space};
pub use frame::{Frame, FrameError, Kind, Record};
pub use ids::{AccountId, AgentId, SpaceId};
pub use util::{parse_space_names, FilterSet};
