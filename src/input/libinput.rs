//! libinput backend
//!
//! udev-seat libinput context whose device opens go through the gatekeeper.

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use input::event::Event;
use input::{Libinput, LibinputInterface};
use log::warn;

use super::InputBackend;
use crate::gatekeeper::{DeviceCategory, SharedGatekeeper};

/// LibinputInterface over a gatekeeper, category fixed to INPUT
pub struct RestrictedAccess {
    gatekeeper: SharedGatekeeper,
}

impl RestrictedAccess {
    pub fn new(gatekeeper: SharedGatekeeper) -> Self {
        Self { gatekeeper }
    }
}

impl LibinputInterface for RestrictedAccess {
    fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, i32> {
        self.gatekeeper
            .borrow_mut()
            .open(path, flags, DeviceCategory::Input)
            .map_err(|e| {
                warn!("libinput: {}", e);
                e.errno()
            })
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        self.gatekeeper.borrow_mut().close(fd);
    }
}

/// libinput context bound to one udev seat
pub struct LibinputBackend {
    context: Libinput,
}

impl LibinputBackend {
    /// Create an unassigned udev context. Devices are only opened once a
    /// seat is assigned.
    pub fn new(gatekeeper: SharedGatekeeper) -> Self {
        Self {
            context: Libinput::new_with_udev(RestrictedAccess::new(gatekeeper)),
        }
    }
}

impl InputBackend for LibinputBackend {
    type Event = Event;

    fn assign_seat(&mut self, seat: &str) -> io::Result<()> {
        self.context
            .udev_assign_seat(seat)
            .map_err(|()| io::Error::new(io::ErrorKind::Other, format!("udev_assign_seat({}) failed", seat)))
    }

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.context.as_fd()
    }

    fn dispatch(&mut self) -> io::Result<()> {
        self.context.dispatch()
    }

    fn next_event(&mut self) -> Option<Event> {
        self.context.next()
    }

    fn suspend(&mut self) {
        self.context.suspend();
    }

    fn resume(&mut self) -> io::Result<()> {
        self.context
            .resume()
            .map_err(|()| io::Error::new(io::ErrorKind::Other, "libinput resume failed"))
    }
}
