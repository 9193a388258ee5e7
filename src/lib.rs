//! # virtgate
//!
//! A thin control surface over libvirt for provisioning disk images and
//! managing the lifecycle of VM instances and virtual networks.
//!
//! The caller (an external orchestrator) owns the authenticated
//! [`virt::connect::Connect`] and the XML descriptors; this crate borrows
//! the connection, forwards descriptors verbatim, and encodes the
//! provisioning and lifecycle protocol on top:
//!
//! - [`ImageProvisioner`] streams a local image file into a pool volume
//! - [`NetworkManager`] checks for and declares virtual networks
//! - [`DomainManager`] drives define → create → stop → destroy/undefine and
//!   resolves a running instance's address
//!
//! Every daemon handle is acquired and released within a single call; the
//! crate holds no state between calls and performs no retries or rollbacks.
//! Errors report what failed (and for multi-step transitions, at which step)
//! and leave policy to the caller.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use virt::connect::Connect;
//! use virtgate::{DomainManager, ImageProvisioner, NetworkManager};
//!
//! let conn = Connect::open(Some("qemu:///system"))?;
//!
//! let images = ImageProvisioner::new(&conn);
//! let pool = images.lookup_pool("default")?;
//! images.pull_image(&pool, "img1", "/tmp/disk.img".as_ref(), &vol_xml)?;
//!
//! NetworkManager::new(&conn).ensure_network("lan0", &net_xml)?;
//!
//! let domains = DomainManager::new(&conn);
//! let uuid = domains.define_domain(&dom_xml)?;
//! domains.create_domain(&uuid)?;
//! let ip = domains.domain_ip(&uuid)?;
//! ```
//!
//! The libvirt surface requires the `libvirt` feature (and the system
//! library); the error, type, and upload-source layers compile without it.

pub mod error;
pub mod types;
pub mod upload;

#[cfg(feature = "libvirt")]
mod scoped;

#[cfg(feature = "libvirt")]
pub mod domain;
#[cfg(feature = "libvirt")]
pub mod image;
#[cfg(feature = "libvirt")]
pub mod network;

pub use error::{
    ImageError, ImageResult, LifecycleStep, VirtError, VirtResult, IMAGE_ERR_BASE,
    VIRT_ERR_BASE,
};
pub use types::{DomainState, DomainSummary, VolumeInfo};
pub use upload::{UploadSource, DEFAULT_CHUNK_SIZE};

#[cfg(feature = "libvirt")]
pub use domain::DomainManager;
#[cfg(feature = "libvirt")]
pub use image::ImageProvisioner;
#[cfg(feature = "libvirt")]
pub use network::NetworkManager;

/// Check if the libvirt surface is compiled in.
pub fn libvirt_enabled() -> bool {
    cfg!(feature = "libvirt")
}
