//! libseat session backend
//!
//! Rootless input/DRM access via seatd or logind, plus the session's
//! enable/disable notifications.

use std::cell::RefCell;
use std::collections::HashMap;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc;

use libseat::{Device, Seat, SeatEvent, SeatRef};
use log::{debug, info, trace, warn};

use crate::error::{AccessError, Error, Result};
use crate::gatekeeper::{DeviceCategory, DeviceToken, Gatekeeper, SharedGatekeeper, TokenTable};
use crate::reactor::{EventLoop, Interest, PostAction, RegistrationToken};
use crate::signal::Signal;

/// Session event from libseat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session enabled (VT acquired)
    Enable,
    /// Session disabled (VT released)
    Disable,
}

impl SessionEvent {
    /// Value carried on the activation signal
    pub fn is_active(self) -> bool {
        self == SessionEvent::Enable
    }
}

/// Device opened via libseat
pub struct SeatDevice {
    path: PathBuf,
    device: Device,
    /// Our dup of the libseat descriptor
    pub fd: OwnedFd,
}

impl SeatDevice {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Shared state for libseat callback
struct SeatState {
    event_tx: mpsc::Sender<SessionEvent>,
    active: bool,
}

/// libseat session manager
pub struct SeatSession {
    seat: Seat,
    state: Rc<RefCell<SeatState>>,
    event_rx: mpsc::Receiver<SessionEvent>,
}

impl SeatSession {
    /// Open a new seat session
    pub fn open() -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel();

        let state = Rc::new(RefCell::new(SeatState {
            event_tx,
            active: false,
        }));

        let state_clone = state.clone();

        let mut seat = Seat::open(move |seat_ref: &mut SeatRef, event: SeatEvent| {
            let mut state = state_clone.borrow_mut();
            match event {
                SeatEvent::Enable => {
                    info!("libseat: session enabled");
                    state.active = true;
                    let _ = state.event_tx.send(SessionEvent::Enable);
                }
                SeatEvent::Disable => {
                    info!("libseat: session disabled");
                    state.active = false;
                    // Must call disable() to acknowledge
                    if let Err(e) = seat_ref.disable() {
                        warn!("libseat: failed to disable seat: {}", e);
                    }
                    let _ = state.event_tx.send(SessionEvent::Disable);
                }
            }
        })
        .map_err(|e| Error::Session(format!("failed to open libseat session: {}", e)))?;

        info!("libseat: opened seat '{}'", seat.name());

        Ok(Self {
            seat,
            state,
            event_rx,
        })
    }

    /// Check if session is currently active
    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    /// Dup of the pollable seat descriptor, for event loop integration
    pub fn get_fd(&mut self) -> Result<OwnedFd> {
        let borrowed_fd = self
            .seat
            .get_fd()
            .map_err(|e| Error::Session(format!("failed to get seat fd: {}", e)))?;
        borrowed_fd
            .try_clone_to_owned()
            .map_err(|e| Error::Session(format!("failed to dup seat fd: {}", e)))
    }

    /// Dispatch pending events (call when fd is readable)
    ///
    /// Returns true if events were processed
    pub fn dispatch(&mut self) -> Result<bool> {
        let count = self
            .seat
            .dispatch(0)
            .map_err(|e| Error::Session(format!("failed to dispatch seat events: {}", e)))?;
        Ok(count > 0)
    }

    /// Try to receive a session event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Open a device (DRM or evdev)
    ///
    /// The fd is valid only while the session is active.
    pub fn open_device(&mut self, path: &Path) -> Result<SeatDevice> {
        let device = self
            .seat
            .open_device(&path)
            .map_err(|e| Error::Session(format!("failed to open device {}: {}", path.display(), e)))?;

        let fd = match device.as_fd().try_clone_to_owned() {
            Ok(fd) => fd,
            Err(e) => {
                let _ = self.seat.close_device(device);
                return Err(Error::Session(format!("failed to dup device fd: {}", e)));
            }
        };

        debug!("libseat: opened device {} (fd={})", path.display(), fd.as_raw_fd());
        Ok(SeatDevice {
            path: path.to_path_buf(),
            device,
            fd,
        })
    }

    /// Close a device and give it back to the seat daemon
    pub fn close_device(&mut self, device: SeatDevice) -> Result<()> {
        let SeatDevice { path, device, fd } = device;
        drop(fd);
        self.seat
            .close_device(device)
            .map_err(|e| Error::Session(format!("failed to close device {}: {}", path.display(), e)))?;
        trace!("libseat: closed device {}", path.display());
        Ok(())
    }
}

impl Drop for SeatSession {
    fn drop(&mut self) {
        info!("libseat: closing session");
    }
}

/// Register the session fd with the reactor and forward enable/disable as
/// `true`/`false` on `activation`
pub fn register(
    session: &Rc<RefCell<SeatSession>>,
    reactor: &mut EventLoop,
    activation: &Rc<Signal<bool>>,
) -> Result<RegistrationToken> {
    let fd = session.borrow_mut().get_fd()?;
    let session = session.clone();
    let activation = activation.clone();
    reactor.register(fd, Interest::READ, move |_| {
        // Collect first: listeners close devices through this same session
        let events: Vec<SessionEvent> = {
            let mut session = session.borrow_mut();
            if let Err(e) = session.dispatch() {
                warn!("{}", e);
            }
            std::iter::from_fn(|| session.try_recv_event()).collect()
        };
        for event in events {
            activation.emit(&event.is_active());
        }
        PostAction::Continue
    })
}

/// Gatekeeper that opens devices through a libseat session
pub struct SeatGatekeeper {
    session: Rc<RefCell<SeatSession>>,
    devices: HashMap<RawFd, SeatDevice>,
    tokens: TokenTable,
}

impl SeatGatekeeper {
    pub fn new(session: Rc<RefCell<SeatSession>>) -> Self {
        Self {
            session,
            devices: HashMap::new(),
            tokens: TokenTable::default(),
        }
    }

    pub fn into_shared(self) -> SharedGatekeeper {
        Rc::new(RefCell::new(self))
    }
}

impl Gatekeeper for SeatGatekeeper {
    fn open(&mut self, path: &Path, flags: i32, category: DeviceCategory) -> std::result::Result<OwnedFd, AccessError> {
        let device = self.session.borrow_mut().open_device(path).map_err(|e| {
            warn!("{}", e);
            AccessError::Denied {
                path: path.to_path_buf(),
            }
        })?;

        // The caller gets its own dup; ours stays in the table until close
        let fd = device.fd.try_clone().map_err(|e| AccessError::from_io(path, e))?;
        let raw = fd.as_raw_fd();
        self.tokens.insert(
            raw,
            DeviceToken {
                path: path.to_path_buf(),
                flags,
                category,
            },
        );
        self.devices.insert(raw, device);
        Ok(fd)
    }

    fn close(&mut self, fd: OwnedFd) {
        let raw = fd.as_raw_fd();
        drop(fd);
        self.tokens.remove(raw);
        match self.devices.remove(&raw) {
            Some(device) => {
                if let Err(e) = self.session.borrow_mut().close_device(device) {
                    warn!("{}", e);
                }
            }
            None => warn!("libseat: closing untracked fd {}", raw),
        }
    }

    fn open_count(&self) -> usize {
        self.tokens.len()
    }
}
