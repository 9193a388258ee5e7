//! Plain data types returned to orchestrators.

use serde::{Deserialize, Serialize};

/// Runtime state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainState {
    /// Actively executing.
    Running,
    /// Execution frozen, still defined and resident.
    Paused,
    /// Defined but not running.
    Stopped,
    /// Terminated abnormally.
    Crashed,
    /// Suspended to memory by guest power management.
    Suspended,
    /// The daemon reported a state this crate does not model.
    Unknown,
}

impl DomainState {
    /// Whether the domain holds runtime resources and must be destroyed
    /// before it can be undefined cleanly.
    pub fn is_active(&self) -> bool {
        matches!(self, DomainState::Running | DomainState::Paused)
    }
}

/// Identity and state of one domain known to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSummary {
    /// Daemon-assigned UUID; the stable identifier for all lookups.
    pub uuid: String,
    /// Display name fixed at definition time.
    pub name: String,
    /// State at query time.
    pub state: DomainState,
}

/// Size accounting for one storage volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Volume name, unique within its pool.
    pub name: String,
    /// Logical capacity in bytes.
    pub capacity: u64,
    /// Bytes currently allocated on backing storage.
    pub allocation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(DomainState::Running.is_active());
        assert!(DomainState::Paused.is_active());
        assert!(!DomainState::Stopped.is_active());
        assert!(!DomainState::Crashed.is_active());
    }
}
