//! Pipeline composer
//!
//! Owns the device monitor, the input context, the event bus and the
//! activation signal, and brings them up and down in dependency order.

use std::fmt;
use std::rc::Rc;

use log::{info, warn};

use crate::bus::EventBus;
use crate::error::Result;
use crate::input::{InputBackend, InputContext};
use crate::monitor::{DeviceBus, DeviceMonitor};
use crate::reactor::EventLoop;
use crate::signal::Signal;

/// Observable lifecycle of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    /// Monitor up, input backend not (only seen mid-init)
    MonitorReady,
    Active,
    Suspended,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::MonitorReady => "monitor-ready",
            PipelineState::Active => "active",
            PipelineState::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

pub struct Pipeline<D: DeviceBus, B: InputBackend> {
    monitor: DeviceMonitor<D>,
    input: InputContext<B>,
    bus: Rc<EventBus>,
    activation: Rc<Signal<bool>>,
}

impl<D: DeviceBus + 'static, B: InputBackend + 'static> Pipeline<D, B> {
    pub fn new(monitor: DeviceMonitor<D>, input: InputContext<B>) -> Self {
        Self {
            monitor,
            input,
            bus: Rc::new(EventBus::new()),
            activation: Rc::new(Signal::new()),
        }
    }

    /// Monitor first, then the input backend. A backend failure tears the
    /// monitor down again.
    pub fn init(&mut self, reactor: &mut EventLoop) -> Result<()> {
        let controller = self.input.activation_controller();
        self.monitor.init(reactor, &self.activation, controller)?;

        if let Err(e) = self.input.init(&self.monitor, reactor, &self.bus) {
            warn!("pipeline: input init failed: {}", e);
            self.monitor.terminate(reactor);
            return Err(e);
        }

        info!("pipeline: {}", self.state());
        Ok(())
    }

    /// Reverse of init. Idempotent.
    pub fn terminate(&mut self, reactor: &mut EventLoop) {
        self.input.terminate(reactor);
        self.monitor.terminate(reactor);
    }

    pub fn state(&self) -> PipelineState {
        if !self.monitor.is_initialized() {
            PipelineState::Uninitialized
        } else if !self.input.is_initialized() {
            PipelineState::MonitorReady
        } else if self.input.is_suspended() {
            PipelineState::Suspended
        } else {
            PipelineState::Active
        }
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// Emit `true`/`false` here on session switches
    pub fn activation(&self) -> &Rc<Signal<bool>> {
        &self.activation
    }

    pub fn monitor(&self) -> &DeviceMonitor<D> {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut DeviceMonitor<D> {
        &mut self.monitor
    }

    pub fn input(&self) -> &InputContext<B> {
        &self.input
    }
}

#[cfg(target_os = "linux")]
mod system {
    use super::*;
    use crate::gatekeeper::SharedGatekeeper;
    use crate::input::LibinputBackend;
    use crate::monitor::UdevBus;

    /// udev + libinput pipeline
    pub type SystemPipeline = Pipeline<UdevBus, LibinputBackend>;

    impl SystemPipeline {
        pub fn system(gatekeeper: SharedGatekeeper, seat: Option<String>, display_controller: u32) -> Self {
            let mut monitor = DeviceMonitor::new(UdevBus::connect);
            monitor.set_display_controller(display_controller);
            let input = InputContext::new(gatekeeper, seat, |gk: SharedGatekeeper| Ok(LibinputBackend::new(gk)));
            Pipeline::new(monitor, input)
        }
    }
}

#[cfg(target_os = "linux")]
pub use system::SystemPipeline;
