//! Session management
//!
//! With the `seatd` feature, a libseat session supplies the activation signal
//! and privileged device access. Without it the process opens devices itself
//! and the session is assumed active.

#[cfg(all(target_os = "linux", feature = "seatd"))]
mod seatd;
#[cfg(all(target_os = "linux", feature = "seatd"))]
pub use seatd::{register, SeatDevice, SeatGatekeeper, SeatSession, SessionEvent};
