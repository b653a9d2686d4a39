//! seatwire: seat-scoped input pipeline for a Linux compositor
//!
//! udev device monitoring, libinput polling bound to one seat, normalization
//! into a single event type and ordered synchronous broadcast, with session
//! activation pausing and resuming the backend.

pub mod activation;
pub mod bus;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod input;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod reactor;
pub mod session;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::{EventBus, PointerMotion, SeatHandler};
pub use config::Config;
pub use error::{AccessError, Error, Result};
pub use gatekeeper::{DirectGatekeeper, Gatekeeper, SharedGatekeeper};
pub use input::{EventData, EventKind, InputEvent};
pub use pipeline::{Pipeline, PipelineState};
#[cfg(target_os = "linux")]
pub use pipeline::SystemPipeline;
pub use reactor::EventLoop;
pub use signal::Signal;
