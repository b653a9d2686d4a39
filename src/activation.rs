//! Session activation
//!
//! Follows the session's active flag (VT switch away / back) and pauses or
//! resumes backend polling accordingly. No handle is released and no
//! descriptor is deregistered while suspended.

use std::rc::Weak;

use log::{info, trace};

/// Something whose polling follows the session state
pub trait ActivationTarget {
    fn is_active(&self) -> bool;
    fn set_active(&self, active: bool);
}

/// Applies activation signal values to a target
#[derive(Clone)]
pub struct ActivationController {
    target: Weak<dyn ActivationTarget>,
}

impl ActivationController {
    pub fn new(target: Weak<dyn ActivationTarget>) -> Self {
        Self { target }
    }

    /// Handle one activation signal value. Repeats are ignored.
    pub fn apply(&self, active: bool) {
        let Some(target) = self.target.upgrade() else {
            trace!("activation: target gone");
            return;
        };
        if target.is_active() == active {
            trace!("activation: already {}", if active { "active" } else { "inactive" });
            return;
        }
        if active {
            info!("session activated, resuming input");
        } else {
            info!("session deactivated, suspending input");
        }
        target.set_active(active);
    }
}
