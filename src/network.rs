//! Virtual network declaration and lookup.

use tracing::{info, instrument};
use virt::connect::Connect;
use virt::network::Network;

use crate::error::{LifecycleStep, VirtError, VirtResult};
use crate::scoped::{release_now, Scoped};

/// Declares and checks the virtual networks VM instances attach to.
pub struct NetworkManager<'c> {
    conn: &'c Connect,
}

impl<'c> NetworkManager<'c> {
    /// Create a manager on the caller's connection.
    pub fn new(conn: &'c Connect) -> Self {
        Self { conn }
    }

    /// Whether a network with this name is known to the daemon, defined or
    /// active.
    ///
    /// Lookup failure means "does not exist"; an unreachable daemon is not
    /// distinguishable from an absent network here.
    #[instrument(skip(self), fields(network = %name))]
    pub fn has_network(&self, name: &str) -> bool {
        match Network::lookup_by_name(self.conn, name) {
            Ok(network) => {
                release_now(network);
                true
            }
            Err(_) => false,
        }
    }

    /// Define a network from `xml`, mark it for autostart and activate it.
    ///
    /// Not idempotent: declaring an existing network fails with whatever
    /// conflict the daemon reports at the define step.
    #[instrument(skip(self, xml))]
    pub fn create_network(&self, xml: &str) -> VirtResult<()> {
        let network = Scoped::new(
            Network::define_xml(self.conn, xml)
                .map_err(|e| VirtError::at(LifecycleStep::Define, e))?,
        );
        network
            .set_autostart(true)
            .map_err(|e| VirtError::at(LifecycleStep::Autostart, e))?;
        network
            .create()
            .map_err(|e| VirtError::at(LifecycleStep::Activate, e))?;

        info!("network created");
        Ok(())
    }

    /// Declare the network named `name` from `xml` unless it already exists.
    ///
    /// Returns whether the network was newly created.
    #[instrument(skip(self, xml), fields(network = %name))]
    pub fn ensure_network(&self, name: &str, xml: &str) -> VirtResult<bool> {
        if self.has_network(name) {
            return Ok(false);
        }
        self.create_network(xml)?;
        Ok(true)
    }
}
