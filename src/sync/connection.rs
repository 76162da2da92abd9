//! Connection toggle: at most one device row is connected at a time.
//!
//! The toggle is planned against the current snapshot ([`LinkState`] +
//! [`TogglePlan`]) and then executed step by step against the device
//! service. Each completed step is patched into the snapshot immediately, so
//! after a failure the snapshot reflects exactly the steps that succeeded.

use std::fmt;

use tracing::{info, warn};

use super::{LiveView, Snapshot};
use crate::device::{DeviceControl, DeviceError};
use crate::model::RecordId;

/// Errors from [`toggle_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleError {
    /// The row has no MAC address to address the device with.
    MissingMac(RecordId),
    /// The row is not in the snapshot.
    NotFound(RecordId),
    /// Disconnecting a device failed.
    Disconnect { id: RecordId, source: DeviceError },
    /// Connecting the target failed.
    Connect { id: RecordId, source: DeviceError },
}

impl fmt::Display for ToggleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleError::MissingMac(id) => write!(f, "{} has no MAC address", id),
            ToggleError::NotFound(id) => write!(f, "{} is not in the current view", id),
            ToggleError::Disconnect { id, source } => {
                write!(f, "failed to disconnect {}: {}", id, source)
            }
            ToggleError::Connect { id, source } => {
                write!(f, "failed to connect {}: {}", id, source)
            }
        }
    }
}

impl std::error::Error for ToggleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToggleError::Disconnect { source, .. } | ToggleError::Connect { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Which rows are connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connected(RecordId),
    /// More than one row is flagged connected; the next connect resolves it.
    Conflict(Vec<RecordId>),
}

impl LinkState {
    pub fn of(snapshot: &Snapshot) -> LinkState {
        let mut ids = snapshot.connected_ids();
        match ids.len() {
            0 => LinkState::Idle,
            1 => LinkState::Connected(ids.remove(0)),
            _ => LinkState::Conflict(ids),
        }
    }

    fn connected(&self) -> &[RecordId] {
        match self {
            LinkState::Idle => &[],
            LinkState::Connected(id) => std::slice::from_ref(id),
            LinkState::Conflict(ids) => ids,
        }
    }
}

/// One remote call of a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleStep {
    Disconnect { id: RecordId, mac: String },
    Connect { id: RecordId, mac: String },
}

/// Result of a completed toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Disconnected(RecordId),
    Connected(RecordId),
}

/// Ordered remote calls that toggle one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TogglePlan {
    target: RecordId,
    connect: bool,
    steps: Vec<ToggleStep>,
}

impl TogglePlan {
    /// Plans a toggle of `target`.
    ///
    /// A connected target is disconnected. Otherwise every other connected
    /// row is disconnected first, then the target is connected. Fails before
    /// any call when a row involved has no MAC.
    pub fn for_target(snapshot: &Snapshot, target: &RecordId) -> Result<TogglePlan, ToggleError> {
        let row = snapshot
            .get(target)
            .ok_or_else(|| ToggleError::NotFound(target.clone()))?;
        let mac_of = |id: &RecordId| -> Result<String, ToggleError> {
            snapshot
                .get(id)
                .and_then(|r| r.mac.clone())
                .filter(|m| !m.is_empty())
                .ok_or_else(|| ToggleError::MissingMac(id.clone()))
        };
        let target_mac = mac_of(target)?;

        if row.connected {
            return Ok(TogglePlan {
                target: target.clone(),
                connect: false,
                steps: vec![ToggleStep::Disconnect {
                    id: target.clone(),
                    mac: target_mac,
                }],
            });
        }

        let mut steps = Vec::new();
        for id in LinkState::of(snapshot).connected() {
            if id == target {
                continue;
            }
            steps.push(ToggleStep::Disconnect {
                id: id.clone(),
                mac: mac_of(id)?,
            });
        }
        steps.push(ToggleStep::Connect {
            id: target.clone(),
            mac: target_mac,
        });
        Ok(TogglePlan {
            target: target.clone(),
            connect: true,
            steps,
        })
    }

    /// Runs the plan, calling `patch` after every successful step.
    ///
    /// Stops at the first failing step.
    pub fn execute(
        &self,
        devices: &dyn DeviceControl,
        mut patch: impl FnMut(&RecordId, bool),
    ) -> Result<ToggleOutcome, ToggleError> {
        let mut released = Vec::new();
        for step in &self.steps {
            match step {
                ToggleStep::Disconnect { id, mac } => {
                    devices.disconnect(mac).map_err(|source| ToggleError::Disconnect {
                        id: id.clone(),
                        source,
                    })?;
                    patch(id, false);
                    released.push(id.clone());
                }
                ToggleStep::Connect { id, mac } => {
                    devices.connect(mac).map_err(|source| ToggleError::Connect {
                        id: id.clone(),
                        source,
                    })?;
                    for other in &released {
                        patch(other, false);
                    }
                    patch(id, true);
                }
            }
        }
        Ok(if self.connect {
            ToggleOutcome::Connected(self.target.clone())
        } else {
            ToggleOutcome::Disconnected(self.target.clone())
        })
    }
}

/// Toggles the connection of `target` in `view`.
///
/// Completed steps are written into the view's snapshot; errors are returned
/// for the caller to surface.
pub fn toggle_connection(
    view: &mut LiveView,
    devices: &dyn DeviceControl,
    target: &RecordId,
) -> Result<ToggleOutcome, ToggleError> {
    let plan = TogglePlan::for_target(view.snapshot(), target)?;
    let result = plan.execute(devices, |id, connected| {
        view.set_connected(id, connected);
    });
    match &result {
        Ok(outcome) => info!(?outcome, "connection toggled"),
        Err(e) => warn!(error = %e, "connection toggle failed"),
    }
    result
}
