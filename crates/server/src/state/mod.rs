pub mod error;
pub mod registry;

use std::sync::Arc;

use relay_common::{BusPublisher, CatalogStore, LocalBus};

pub use error::RegistryError;
pub use registry::{ConnectionCommand, SpaceServer};

/// Everything a connection or the admin API needs to reach the rest of the
/// process: the catalog, the registry, and a handle to open new bus
/// subscribers.
#[derive(Clone)]
pub struct GlobalState {
    pub catalog: Arc<dyn CatalogStore>,
    pub registry: Arc<SpaceServer>,
    pub bus: LocalBus,
}

impl GlobalState {
    pub fn new(catalog: Arc<dyn CatalogStore>, bus: LocalBus) -> Self {
        let publisher: Arc<dyn BusPublisher> = Arc::new(bus.publisher());
        Self {
            catalog,
            registry: Arc::new(SpaceServer::new(publisher)),
            bus,
        }
    }
}
