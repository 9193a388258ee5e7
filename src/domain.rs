//! Domain (VM instance) lifecycle control.
//!
//! Domains are addressed by their daemon-assigned UUID string; the name in
//! the descriptor is a display attribute fixed at definition time. Handles
//! are looked up per call and released before the call returns.

use std::net::Ipv4Addr;

use tracing::{debug, info, instrument};
use virt::connect::Connect;
use virt::domain::Domain;
use virt::sys;

use crate::error::{LifecycleStep, VirtError, VirtResult};
use crate::scoped::{release_now, Scoped};
use crate::types::{DomainState, DomainSummary};

/// Drives VM instances through define → create → stop → destroy/undefine.
pub struct DomainManager<'c> {
    conn: &'c Connect,
}

impl<'c> DomainManager<'c> {
    /// Create a manager on the caller's connection.
    pub fn new(conn: &'c Connect) -> Self {
        Self { conn }
    }

    fn lookup(&self, uuid: &str) -> VirtResult<Scoped<Domain>> {
        Domain::lookup_by_uuid_string(self.conn, uuid)
            .map(Scoped::new)
            .map_err(|e| VirtError::at(LifecycleStep::Lookup, e))
    }

    /// Whether a domain with this UUID is known to the daemon.
    #[instrument(skip(self), fields(domain = %uuid))]
    pub fn domain_exists(&self, uuid: &str) -> bool {
        match Domain::lookup_by_uuid_string(self.conn, uuid) {
            Ok(domain) => {
                release_now(domain);
                true
            }
            Err(_) => false,
        }
    }

    /// Persist a domain definition from `xml` without starting it.
    ///
    /// Returns the daemon-assigned UUID used for all later lookups.
    #[instrument(skip(self, xml))]
    pub fn define_domain(&self, xml: &str) -> VirtResult<String> {
        let domain = Scoped::new(
            Domain::define_xml(self.conn, xml)
                .map_err(|e| VirtError::at(LifecycleStep::Define, e))?,
        );
        let uuid = domain
            .get_uuid_string()
            .map_err(|e| VirtError::at(LifecycleStep::Query, e))?;

        info!(domain = %uuid, "domain defined");
        Ok(uuid)
    }

    /// Start a defined domain.
    #[instrument(skip(self), fields(domain = %uuid))]
    pub fn create_domain(&self, uuid: &str) -> VirtResult<()> {
        let domain = self.lookup(uuid)?;
        domain
            .create()
            .map_err(|e| VirtError::at(LifecycleStep::Create, e))?;

        info!("domain started");
        Ok(())
    }

    /// Define a domain from `xml` and start it in one step.
    ///
    /// The definition is not rolled back if the start fails; the error's
    /// step tells the caller which half to compensate for.
    #[instrument(skip(self, xml))]
    pub fn define_and_create_domain(&self, xml: &str) -> VirtResult<String> {
        let uuid = self.define_domain(xml)?;
        self.create_domain(&uuid)?;
        Ok(uuid)
    }

    /// Request a graceful shutdown of a running domain.
    ///
    /// Returns once the daemon accepts the request; the guest powers off
    /// asynchronously, so callers poll [`DomainManager::domain_state`] if
    /// they need completion.
    #[instrument(skip(self), fields(domain = %uuid))]
    pub fn stop_domain(&self, uuid: &str) -> VirtResult<()> {
        let domain = self.lookup(uuid)?;
        domain
            .shutdown()
            .map_err(|e| VirtError::at(LifecycleStep::Shutdown, e))?;

        info!("domain shutdown requested");
        Ok(())
    }

    /// Force-stop a domain if it is active, then remove its definition.
    ///
    /// A domain destroyed whose undefine then fails is left stopped but
    /// defined; the error reports step [`LifecycleStep::Undefine`] so the
    /// caller can retry just that half.
    #[instrument(skip(self), fields(domain = %uuid))]
    pub fn destroy_and_undefine_domain(&self, uuid: &str) -> VirtResult<()> {
        let domain = self.lookup(uuid)?;

        let state = Self::state_of(&domain)?;
        if state.is_active() {
            domain
                .destroy()
                .map_err(|e| VirtError::at(LifecycleStep::Destroy, e))?;
            debug!("domain destroyed");
        }

        domain
            .undefine()
            .map_err(|e| VirtError::at(LifecycleStep::Undefine, e))?;

        info!("domain undefined");
        Ok(())
    }

    /// Current state of a domain.
    #[instrument(skip(self), fields(domain = %uuid))]
    pub fn domain_state(&self, uuid: &str) -> VirtResult<DomainState> {
        let domain = self.lookup(uuid)?;
        Self::state_of(&domain)
    }

    /// UUID, name and state of every domain known to the daemon.
    #[instrument(skip(self))]
    pub fn list_domains(&self) -> VirtResult<Vec<DomainSummary>> {
        let flags = sys::VIR_CONNECT_LIST_DOMAINS_ACTIVE
            | sys::VIR_CONNECT_LIST_DOMAINS_INACTIVE;
        let domains = self
            .conn
            .list_all_domains(flags)
            .map_err(|e| VirtError::at(LifecycleStep::Query, e))?;

        let mut summaries = Vec::with_capacity(domains.len());
        for domain in domains {
            let domain = Scoped::new(domain);
            let uuid = domain
                .get_uuid_string()
                .map_err(|e| VirtError::at(LifecycleStep::Query, e))?;
            let name = domain
                .get_name()
                .map_err(|e| VirtError::at(LifecycleStep::Query, e))?;
            let state = Self::state_of(&domain)?;
            summaries.push(DomainSummary { uuid, name, state });
        }
        debug!(count = summaries.len(), "listed domains");
        Ok(summaries)
    }

    /// First IPv4 address leased to a running domain, or `None` while no
    /// lease exists yet.
    ///
    /// Lease acquisition races DHCP; callers poll until an address shows
    /// up. A lookup or query failure is an error, absence is not.
    #[instrument(skip(self), fields(domain = %uuid))]
    pub fn domain_ip(&self, uuid: &str) -> VirtResult<Option<Ipv4Addr>> {
        let domain = self.lookup(uuid)?;
        let interfaces = domain
            .interface_addresses(sys::VIR_DOMAIN_INTERFACE_ADDRESSES_SRC_LEASE, 0)
            .map_err(|e| VirtError::at(LifecycleStep::Query, e))?;

        let ip = first_ipv4(
            interfaces
                .iter()
                .flat_map(|iface| iface.addrs.iter())
                .map(|addr| addr.addr.as_str()),
        );
        Ok(ip)
    }

    fn state_of(domain: &Domain) -> VirtResult<DomainState> {
        let (state, _) = domain
            .get_state()
            .map_err(|e| VirtError::at(LifecycleStep::Query, e))?;
        Ok(state_from_libvirt(state))
    }
}

/// Map the libvirt state enum onto [`DomainState`].
fn state_from_libvirt(state: sys::virDomainState) -> DomainState {
    match state {
        sys::VIR_DOMAIN_RUNNING => DomainState::Running,
        sys::VIR_DOMAIN_PAUSED => DomainState::Paused,
        sys::VIR_DOMAIN_SHUTOFF => DomainState::Stopped,
        sys::VIR_DOMAIN_CRASHED => DomainState::Crashed,
        sys::VIR_DOMAIN_PMSUSPENDED => DomainState::Suspended,
        _ => DomainState::Unknown,
    }
}

/// First address that parses as IPv4, in interface order.
fn first_ipv4<'a>(addrs: impl Iterator<Item = &'a str>) -> Option<Ipv4Addr> {
    addrs.filter_map(|addr| addr.parse().ok()).next()
}
