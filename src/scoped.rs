//! Scope guards for libvirt handles.
//!
//! Every handle obtained from the daemon must be released exactly once, on
//! every exit path. The `virt` bindings release on drop but panic if the
//! release fails; [`Scoped`] releases eagerly, downgrades a failed release
//! to a `warn!` and leaks the handle instead of unwinding.

use std::mem;
use std::ops::Deref;

use tracing::warn;
use virt::connect::Connect;
use virt::domain::Domain;
use virt::network::Network;
use virt::storage_pool::StoragePool;
use virt::storage_vol::StorageVol;
use virt::stream::Stream;

/// A handle with a libvirt release function.
pub(crate) trait Release {
    /// Name used in release-failure logs.
    const KIND: &'static str;

    fn release(&mut self) -> Result<(), virt::error::Error>;
}

impl Release for Connect {
    const KIND: &'static str = "connection";

    fn release(&mut self) -> Result<(), virt::error::Error> {
        self.close().map(|_| ())
    }
}

impl Release for Domain {
    const KIND: &'static str = "domain";

    fn release(&mut self) -> Result<(), virt::error::Error> {
        self.free().map(|_| ())
    }
}

impl Release for Network {
    const KIND: &'static str = "network";

    fn release(&mut self) -> Result<(), virt::error::Error> {
        self.free().map(|_| ())
    }
}

impl Release for StoragePool {
    const KIND: &'static str = "storage pool";

    fn release(&mut self) -> Result<(), virt::error::Error> {
        self.free().map(|_| ())
    }
}

impl Release for StorageVol {
    const KIND: &'static str = "storage volume";

    fn release(&mut self) -> Result<(), virt::error::Error> {
        self.free().map(|_| ())
    }
}

impl Release for Stream {
    const KIND: &'static str = "stream";

    fn release(&mut self) -> Result<(), virt::error::Error> {
        // Freeing an unfinished stream implicitly aborts the transfer.
        self.free().map(|_| ())
    }
}

/// Scope guard releasing a libvirt handle when dropped.
///
/// Guards compose: a function acquiring several handles wraps each one and
/// every handle is released on any exit path. Releasing the same handle
/// twice is impossible; after a successful release the handle is gone, and
/// after a failed one it is leaked.
pub(crate) struct Scoped<T: Release>(Option<T>);

impl<T: Release> Scoped<T> {
    pub(crate) fn new(handle: T) -> Self {
        Scoped(Some(handle))
    }

    /// Disarm the guard and hand the handle back, for operations that
    /// consume it (e.g. finishing a stream).
    pub(crate) fn into_inner(mut self) -> T {
        self.0.take().expect("scoped handle taken twice")
    }
}

impl<T: Release> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0.as_ref().expect("scoped handle already released")
    }
}

impl<T: Release> Drop for Scoped<T> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.0.take() {
            if let Err(e) = handle.release() {
                warn!(kind = T::KIND, error = %e, "failed to release handle, leaking it");
                // The binding would retry the release in its own drop and
                // panic on a second failure.
                mem::forget(handle);
            }
        }
    }
}

/// Release a handle immediately, logging instead of propagating failure.
pub(crate) fn release_now<T: Release>(handle: T) {
    drop(Scoped::new(handle));
}
