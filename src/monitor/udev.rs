//! udev netlink bus
//!
//! Subsystem-filtered udev monitor socket. The filter runs in the kernel
//! (BPF on the netlink socket), so non-matching devices never wake us up.

use std::os::fd::{AsFd, BorrowedFd};

use log::info;

use super::{DeviceAction, DeviceBus, DeviceRecord};
use crate::error::{Error, Result};

/// udev monitor connection
pub struct UdevBus {
    socket: ::udev::MonitorSocket,
}

impl UdevBus {
    /// Listen on the "udev" netlink group for the given subsystems
    pub fn connect(subsystems: &[&str]) -> Result<Self> {
        let mut builder = ::udev::MonitorBuilder::new().map_err(|e| Error::init("udev monitor", e))?;
        for subsystem in subsystems {
            builder = builder
                .match_subsystem(subsystem)
                .map_err(|e| Error::init("udev subsystem filter", e))?;
        }
        let socket = builder
            .listen()
            .map_err(|e| Error::init("udev monitor receiving", e))?;

        info!("udev monitor listening ({})", subsystems.join(", "));
        Ok(Self { socket })
    }
}

impl DeviceBus for UdevBus {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn receive(&mut self) -> Option<DeviceRecord> {
        let event = self.socket.iter().next()?;
        Some(DeviceRecord {
            syspath: event.syspath().to_path_buf(),
            sysname: event.sysname().to_string_lossy().into_owned(),
            sysnum: event.sysnum().and_then(|n| u32::try_from(n).ok()),
            subsystem: event.subsystem().map(|s| s.to_string_lossy().into_owned()),
            action: event.action().map(|a| DeviceAction::parse(&a.to_string_lossy())),
            hotplug: event
                .property_value("HOTPLUG")
                .map(|v| v == "1")
                .unwrap_or(false),
        })
    }
}
