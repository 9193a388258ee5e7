//! Error types for the provisioning and lifecycle surface.
//!
//! Two parallel error channels are kept deliberately separate:
//!
//! - local OS failures (opening an image file) surface as the raw
//!   [`std::io::Error`], so callers see the original errno;
//! - daemon-side failures collapse into a small set of coarse kinds with a
//!   numeric code space for orchestrators that speak integer codes: image
//!   errors are based at [`IMAGE_ERR_BASE`], virtualization errors at
//!   [`VIRT_ERR_BASE`], and `0` means success.

use std::fmt;

use thiserror::Error;

/// Base for image provisioning error codes.
pub const IMAGE_ERR_BASE: i32 = 1000;

/// Base for virtualization (domain/network) error codes.
pub const VIRT_ERR_BASE: i32 = 2000;

/// Fallback code for I/O errors that carry no OS errno (EIO).
const FALLBACK_ERRNO: i32 = 5;

/// Errors that can occur while provisioning a disk image into a storage pool.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The upload source was asked for bytes but no file was ever attached.
    ///
    /// This is a wiring mistake in the caller, not an I/O failure, and is
    /// reported deterministically before any read is attempted.
    #[error("upload source has no open file attached")]
    DetachedSource,

    /// A volume with the requested name already exists in the pool.
    ///
    /// The existing volume is left untouched. Whether this is a hard error
    /// or "already provisioned" is the caller's policy decision.
    #[error("volume already exists: {0}")]
    AlreadyExists(String),

    /// The daemon rejected, failed, or partially completed an operation.
    ///
    /// No finer classification is attempted; the message carries the
    /// stringified libvirt error.
    #[error("libvirt operation failed: {0}")]
    Libvirt(String),

    /// A local filesystem operation failed; the original errno is preserved.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ImageError {
    pub(crate) fn libvirt(err: impl fmt::Display) -> Self {
        ImageError::Libvirt(err.to_string())
    }

    /// Numeric result code: `errno` for I/O failures, `IMAGE_ERR_BASE`-relative
    /// codes otherwise.
    pub fn code(&self) -> i32 {
        match self {
            ImageError::DetachedSource => IMAGE_ERR_BASE + 1,
            ImageError::AlreadyExists(_) => IMAGE_ERR_BASE + 2,
            ImageError::Libvirt(_) => IMAGE_ERR_BASE + 3,
            ImageError::Io(e) => e.raw_os_error().unwrap_or(FALLBACK_ERRNO),
        }
    }
}

/// The step of a multi-step daemon transition that failed.
///
/// Multi-step operations (destroy+undefine, define+create, network
/// creation) have no automatic rollback; reporting the failing step lets the
/// orchestrator decide whether to retry the remaining steps or issue a
/// compensating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    Lookup,
    Define,
    Create,
    Shutdown,
    Destroy,
    Undefine,
    Autostart,
    Activate,
    Query,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleStep::Lookup => "lookup",
            LifecycleStep::Define => "define",
            LifecycleStep::Create => "create",
            LifecycleStep::Shutdown => "shutdown",
            LifecycleStep::Destroy => "destroy",
            LifecycleStep::Undefine => "undefine",
            LifecycleStep::Autostart => "autostart",
            LifecycleStep::Activate => "activate",
            LifecycleStep::Query => "query",
        };
        f.write_str(s)
    }
}

/// A domain or network operation failed at a specific step.
///
/// The detail carries the stringified libvirt error; richer diagnostics must
/// come from the daemon's own last-error mechanism.
#[derive(Error, Debug)]
#[error("libvirt {step} failed: {detail}")]
pub struct VirtError {
    /// Which step of the operation failed.
    pub step: LifecycleStep,
    /// Stringified daemon error.
    pub detail: String,
}

impl VirtError {
    pub(crate) fn at(step: LifecycleStep, err: impl fmt::Display) -> Self {
        VirtError {
            step,
            detail: err.to_string(),
        }
    }

    /// Numeric result code, `VIRT_ERR_BASE`-relative.
    pub fn code(&self) -> i32 {
        VIRT_ERR_BASE + 1
    }
}

/// Result alias for image provisioning operations.
pub type ImageResult<T> = std::result::Result<T, ImageError>;

/// Result alias for domain and network operations.
pub type VirtResult<T> = std::result::Result<T, VirtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_error_codes() {
        assert_eq!(ImageError::DetachedSource.code(), 1001);
        assert_eq!(ImageError::AlreadyExists("img1".into()).code(), 1002);
        assert_eq!(ImageError::Libvirt("boom".into()).code(), 1003);
    }

    #[test]
    fn io_error_code_is_raw_errno() {
        let err = std::fs::File::open("/definitely/not/there.img").unwrap_err();
        let code = ImageError::from(err).code();
        // ENOENT on every platform this runs on
        assert_eq!(code, 2);
    }

    #[test]
    fn virt_error_reports_step() {
        let err = VirtError::at(LifecycleStep::Undefine, "domain is busy");
        assert_eq!(err.code(), 2001);
        assert_eq!(err.step, LifecycleStep::Undefine);
        assert_eq!(err.to_string(), "libvirt undefine failed: domain is busy");
    }
}
