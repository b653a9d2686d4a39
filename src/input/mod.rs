//! Input backend context
//!
//! Owns the native input backend (libinput in production), assigns it to a
//! single seat, registers its descriptor with the reactor and feeds the pump.
//! - `event`: normalized event types
//! - `normalize`: backend event mapping
//! - `pump`: readability handler

pub mod event;
#[cfg(target_os = "linux")]
pub mod libinput;
pub mod normalize;
mod pump;

use std::cell::{Cell, RefCell};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::activation::{ActivationController, ActivationTarget};
use crate::bus::EventBus;
use crate::error::{Error, Result};
use crate::gatekeeper::SharedGatekeeper;
use crate::monitor::{DeviceBus, DeviceMonitor};
use crate::reactor::{EventLoop, Interest, PostAction, RegistrationToken};

pub use event::{
    AbsoluteMotion, AbsolutePosition, ButtonState, EventData, EventKind, InputEvent, KeyState,
    NormalizedPosition, ScrollAxis,
};
#[cfg(target_os = "linux")]
pub use self::libinput::{LibinputBackend, RestrictedAccess};
pub use normalize::Normalize;

/// Seat used when neither XDG_SEAT nor the config names one
pub const DEFAULT_SEAT: &str = "seat0";

/// Native input source
pub trait InputBackend {
    type Event: Normalize;

    /// Bind to a seat; opens that seat's devices through the gatekeeper
    fn assign_seat(&mut self, seat: &str) -> io::Result<()>;

    fn as_fd(&self) -> BorrowedFd<'_>;

    /// Read the kernel side and refill the internal queue
    fn dispatch(&mut self) -> io::Result<()>;

    fn next_event(&mut self) -> Option<Self::Event>;

    /// Pause device access; handles stay valid
    fn suspend(&mut self);

    fn resume(&mut self) -> io::Result<()>;
}

/// Creates a backend around the gatekeeper
pub type BackendFactory<B> = Box<dyn FnMut(SharedGatekeeper) -> Result<B>>;

/// Pick the seat name: XDG_SEAT, then config, then seat0
pub fn resolve_seat_name(xdg_seat: Option<String>, configured: Option<&str>) -> String {
    xdg_seat
        .filter(|s| !s.is_empty())
        .or_else(|| configured.filter(|s| !s.is_empty()).map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_SEAT.to_owned())
}

/// State shared with the reactor callback and the activation controller
pub(crate) struct Shared<B> {
    pub(crate) backend: RefCell<Option<B>>,
    pub(crate) session_active: Cell<bool>,
    pub(crate) last_time: Cell<Option<u32>>,
}

impl<B: InputBackend> ActivationTarget for Shared<B> {
    fn is_active(&self) -> bool {
        self.session_active.get()
    }

    fn set_active(&self, active: bool) {
        self.session_active.set(active);
        let mut slot = self.backend.borrow_mut();
        let Some(backend) = slot.as_mut() else {
            return;
        };
        if active {
            if let Err(e) = backend.resume() {
                warn!("input: failed to resume backend: {}", e);
            }
        } else {
            backend.suspend();
            // Nothing queued before the switch may surface after it
            while backend.next_event().is_some() {}
        }
    }
}

/// Input backend context
pub struct InputContext<B: InputBackend> {
    shared: Rc<Shared<B>>,
    gatekeeper: SharedGatekeeper,
    factory: BackendFactory<B>,
    configured_seat: Option<String>,
    seat_name: Option<String>,
    source: Option<RegistrationToken>,
}

impl<B: InputBackend + 'static> InputContext<B> {
    pub fn new<F>(gatekeeper: SharedGatekeeper, configured_seat: Option<String>, factory: F) -> Self
    where
        F: FnMut(SharedGatekeeper) -> Result<B> + 'static,
    {
        Self {
            shared: Rc::new(Shared {
                backend: RefCell::new(None),
                session_active: Cell::new(true),
                last_time: Cell::new(None),
            }),
            gatekeeper,
            factory: Box::new(factory),
            configured_seat,
            seat_name: None,
            source: None,
        }
    }

    /// Create the backend, assign the seat and register with the reactor.
    ///
    /// # Panics
    /// If `monitor` is not initialized.
    pub fn init<D: DeviceBus + 'static>(
        &mut self,
        monitor: &DeviceMonitor<D>,
        reactor: &mut EventLoop,
        bus: &Rc<EventBus>,
    ) -> Result<()> {
        assert!(
            monitor.is_initialized(),
            "device monitor must be initialized before the input context"
        );

        if self.is_initialized() {
            return Ok(());
        }

        let mut backend = (self.factory)(self.gatekeeper.clone())?;

        let seat = resolve_seat_name(std::env::var("XDG_SEAT").ok(), self.configured_seat.as_deref());
        if backend.assign_seat(&seat).is_err() {
            warn!("Failed to assign seat '{}' to libinput", seat);
            return Err(Error::SeatAssign { seat });
        }

        if !self.shared.session_active.get() {
            debug!("input: session inactive at init, starting suspended");
            backend.suspend();
        }

        let fd = backend
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| Error::init("libinput fd", e))?;
        let raw_fd = fd.as_raw_fd();
        *self.shared.backend.borrow_mut() = Some(backend);

        let shared = self.shared.clone();
        let bus = bus.clone();
        let source = reactor.register(fd, Interest::READ, move |_| {
            pump::pump(&shared, &bus);
            PostAction::Continue
        });
        let source = match source {
            Ok(source) => source,
            Err(e) => {
                self.shared.backend.borrow_mut().take();
                return Err(e);
            }
        };
        reactor.check(source);

        info!("input: libinput bound to {} (fd={})", seat, raw_fd);
        self.source = Some(source);
        self.seat_name = Some(seat);
        Ok(())
    }

    /// Deregister and release the backend. Safe to call repeatedly.
    pub fn terminate(&mut self, reactor: &mut EventLoop) {
        if let Some(source) = self.source.take() {
            reactor.deregister(source);
        }
        if self.shared.backend.borrow_mut().take().is_some() {
            info!("input: backend released");
        }
        self.seat_name = None;
        self.shared.session_active.set(true);
        self.shared.last_time.set(None);
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.backend.borrow().is_some()
    }

    /// Seat the backend is bound to, while initialized
    pub fn seat_name(&self) -> Option<&str> {
        self.seat_name.as_deref()
    }

    /// Initialized and the session is inactive
    pub fn is_suspended(&self) -> bool {
        self.is_initialized() && !self.shared.session_active.get()
    }

    /// Timestamp of the last broadcast event
    pub fn last_timestamp(&self) -> Option<u32> {
        self.shared.last_time.get()
    }

    /// Run the pump once outside the reactor. Returns events broadcast.
    pub fn pump(&self, bus: &EventBus) -> usize {
        pump::pump(&self.shared, bus)
    }

    /// Controller that suspends/resumes this context on activation changes
    pub fn activation_controller(&self) -> ActivationController {
        let target: Rc<dyn ActivationTarget> = self.shared.clone();
        ActivationController::new(Rc::downgrade(&target))
    }
}
