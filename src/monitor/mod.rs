//! Device monitor
//!
//! Watches the device bus (udev netlink) for `drm` and `input` notifications.
//! DRM hotplug on the active display controller is surfaced through a hook;
//! input node add/remove is only logged, libinput tracks its own devices.

#[cfg(target_os = "linux")]
pub mod udev;

use std::cell::{Cell, RefCell};
use std::os::fd::BorrowedFd;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info, trace};

use crate::activation::ActivationController;
use crate::error::{Error, Result};
use crate::reactor::{EventLoop, Interest, PostAction, RegistrationToken};
use crate::signal::{ListenerId, Signal};

#[cfg(target_os = "linux")]
pub use self::udev::UdevBus;

/// Subsystems the monitor subscribes to
pub const SUBSYSTEMS: [&str; 2] = ["drm", "input"];

/// udev action of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    Add,
    Remove,
    Change,
    Other(String),
}

impl DeviceAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "add" => DeviceAction::Add,
            "remove" => DeviceAction::Remove,
            "change" => DeviceAction::Change,
            other => DeviceAction::Other(other.to_owned()),
        }
    }
}

/// One received bus notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub syspath: PathBuf,
    pub sysname: String,
    pub sysnum: Option<u32>,
    pub subsystem: Option<String>,
    pub action: Option<DeviceAction>,
    /// `HOTPLUG=1` property present
    pub hotplug: bool,
}

/// What a record turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceNotice {
    /// Connector change on the active display controller
    Hotplug,
    InputAdded,
    InputRemoved,
    /// Subsystem outside [`SUBSYSTEMS`]
    Filtered,
    Ignored,
}

/// Classify a record against the active display controller id
pub fn classify(record: &DeviceRecord, display_controller: u32) -> DeviceNotice {
    let subsystem = record.subsystem.as_deref().unwrap_or("");
    if !SUBSYSTEMS.contains(&subsystem) {
        return DeviceNotice::Filtered;
    }

    if record.sysnum == Some(display_controller) && record.hotplug {
        return DeviceNotice::Hotplug;
    }

    if subsystem != "input" || !record.sysname.starts_with("event") {
        return DeviceNotice::Ignored;
    }

    match record.action {
        Some(DeviceAction::Add) => DeviceNotice::InputAdded,
        Some(DeviceAction::Remove) => DeviceNotice::InputRemoved,
        _ => DeviceNotice::Ignored,
    }
}

/// Device bus connection
pub trait DeviceBus {
    fn as_fd(&self) -> BorrowedFd<'_>;

    /// Take one pending record, if any
    fn receive(&mut self) -> Option<DeviceRecord>;
}

/// Opens a bus connection filtered to the given subsystems
pub type BusConnector<D> = Box<dyn FnMut(&[&str]) -> Result<D>>;

/// Called with the record of every hotplug notification.
///
/// Output reconfiguration is not wired up yet; this is where a compositor
/// would rescan connectors.
pub type HotplugHook = Box<dyn FnMut(&DeviceRecord)>;

struct MonitorInner<D> {
    bus: RefCell<D>,
    display_controller: Cell<u32>,
    hotplug_hook: Rc<RefCell<Option<HotplugHook>>>,
}

impl<D: DeviceBus> MonitorInner<D> {
    fn receive_one(&self) -> Option<DeviceNotice> {
        let record = self.bus.borrow_mut().receive()?;
        debug!("udev: got device {}", record.sysname);

        let notice = classify(&record, self.display_controller.get());
        match notice {
            DeviceNotice::Hotplug => {
                info!("udev: hotplug on {}", record.syspath.display());
                if let Some(hook) = self.hotplug_hook.borrow_mut().as_mut() {
                    hook(&record);
                }
            }
            DeviceNotice::InputAdded => info!("udev: device added: {}", record.sysname),
            DeviceNotice::InputRemoved => info!("udev: device removed: {}", record.sysname),
            DeviceNotice::Filtered => trace!("udev: dropping {:?} record", record.subsystem),
            DeviceNotice::Ignored => {}
        }
        Some(notice)
    }
}

/// Device monitor service
pub struct DeviceMonitor<D> {
    connector: BusConnector<D>,
    display_controller: u32,
    hotplug_hook: Rc<RefCell<Option<HotplugHook>>>,
    inner: Option<Rc<MonitorInner<D>>>,
    source: Option<RegistrationToken>,
    activation: Option<(Rc<Signal<bool>>, ListenerId)>,
}

impl<D: DeviceBus + 'static> DeviceMonitor<D> {
    pub fn new<F>(connector: F) -> Self
    where
        F: FnMut(&[&str]) -> Result<D> + 'static,
    {
        Self {
            connector: Box::new(connector),
            display_controller: 0,
            hotplug_hook: Rc::new(RefCell::new(None)),
            inner: None,
            source: None,
            activation: None,
        }
    }

    /// Set the DRM minor whose hotplug events are reported
    pub fn set_display_controller(&mut self, id: u32) {
        self.display_controller = id;
        if let Some(inner) = &self.inner {
            inner.display_controller.set(id);
        }
    }

    pub fn display_controller(&self) -> u32 {
        self.display_controller
    }

    /// Install the hotplug extension hook (replaces any previous one)
    pub fn set_hotplug_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&DeviceRecord) + 'static,
    {
        *self.hotplug_hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Connect to the bus, register with the reactor and subscribe the
    /// activation controller. Nothing is left behind on failure.
    pub fn init(
        &mut self,
        reactor: &mut EventLoop,
        activation: &Rc<Signal<bool>>,
        controller: ActivationController,
    ) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let bus = (self.connector)(&SUBSYSTEMS)?;
        let fd = bus
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| Error::init("udev monitor fd", e))?;
        let inner = Rc::new(MonitorInner {
            bus: RefCell::new(bus),
            display_controller: Cell::new(self.display_controller),
            hotplug_hook: self.hotplug_hook.clone(),
        });

        let callback_inner = inner.clone();
        let source = reactor.register(fd, Interest::READ, move |_| {
            callback_inner.receive_one();
            PostAction::Continue
        })?;
        reactor.check(source);

        let listener = activation.subscribe(move |active: &bool| controller.apply(*active));

        info!("device monitor initialized ({})", SUBSYSTEMS.join(", "));
        self.inner = Some(inner);
        self.source = Some(source);
        self.activation = Some((activation.clone(), listener));
        Ok(())
    }

    /// Deregister, drop the bus connection and unsubscribe. Idempotent.
    pub fn terminate(&mut self, reactor: &mut EventLoop) {
        if let Some((signal, listener)) = self.activation.take() {
            signal.unsubscribe(listener);
        }
        if let Some(source) = self.source.take() {
            reactor.deregister(source);
        }
        if self.inner.take().is_some() {
            info!("device monitor terminated");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Receive and classify one pending record outside the reactor
    pub fn receive_one(&self) -> Option<DeviceNotice> {
        self.inner.as_ref()?.receive_one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationTarget;
    use crate::error::Error;
    use crate::testing::FakeBusHandle;
    use std::time::Duration;

    fn record(subsystem: &str, sysname: &str, sysnum: Option<u32>, action: &str, hotplug: bool) -> DeviceRecord {
        DeviceRecord {
            syspath: PathBuf::from(format!("/sys/class/{}/{}", subsystem, sysname)),
            sysname: sysname.to_owned(),
            sysnum,
            subsystem: Some(subsystem.to_owned()),
            action: Some(DeviceAction::parse(action)),
            hotplug,
        }
    }

    struct Idle(Cell<bool>);

    impl ActivationTarget for Idle {
        fn is_active(&self) -> bool {
            self.0.get()
        }
        fn set_active(&self, active: bool) {
            self.0.set(active);
        }
    }

    fn controller(target: &Rc<dyn ActivationTarget>) -> ActivationController {
        ActivationController::new(Rc::downgrade(target))
    }

    #[test]
    fn test_classify_hotplug() {
        let r = record("drm", "card0", Some(0), "change", true);
        assert_eq!(classify(&r, 0), DeviceNotice::Hotplug);
        // Different controller
        assert_eq!(classify(&r, 1), DeviceNotice::Ignored);
        // No HOTPLUG marker
        let r = record("drm", "card0", Some(0), "change", false);
        assert_eq!(classify(&r, 0), DeviceNotice::Ignored);
    }

    #[test]
    fn test_classify_input_nodes() {
        assert_eq!(
            classify(&record("input", "event3", Some(3), "add", false), 0),
            DeviceNotice::InputAdded
        );
        assert_eq!(
            classify(&record("input", "event3", Some(3), "remove", false), 0),
            DeviceNotice::InputRemoved
        );
        assert_eq!(
            classify(&record("input", "input12", Some(12), "add", false), 0),
            DeviceNotice::Ignored
        );
        assert_eq!(
            classify(&record("input", "event3", Some(3), "change", false), 0),
            DeviceNotice::Ignored
        );
    }

    #[test]
    fn test_classify_filters_foreign_subsystems() {
        let mut r = record("usb", "1-1", Some(0), "add", true);
        assert_eq!(classify(&r, 0), DeviceNotice::Filtered);
        r.subsystem = None;
        assert_eq!(classify(&r, 0), DeviceNotice::Filtered);
    }

    #[test]
    fn test_connect_uses_drm_and_input_filters() {
        let bus = FakeBusHandle::new();
        let mut monitor = DeviceMonitor::new(bus.connector());
        let mut reactor = EventLoop::new().unwrap();
        let signal = Rc::new(Signal::new());
        let target: Rc<dyn ActivationTarget> = Rc::new(Idle(Cell::new(true)));

        monitor.init(&mut reactor, &signal, controller(&target)).unwrap();
        assert_eq!(bus.subsystems(), vec!["drm".to_owned(), "input".to_owned()]);
    }

    #[test]
    fn test_foreign_records_never_reach_hook() {
        let bus = FakeBusHandle::new();
        let mut monitor = DeviceMonitor::new(bus.connector());
        let hooked = Rc::new(Cell::new(0));
        let h = hooked.clone();
        monitor.set_hotplug_hook(move |_| h.set(h.get() + 1));

        let mut reactor = EventLoop::new().unwrap();
        let signal = Rc::new(Signal::new());
        let target: Rc<dyn ActivationTarget> = Rc::new(Idle(Cell::new(true)));
        monitor.init(&mut reactor, &signal, controller(&target)).unwrap();

        bus.push(record("usb", "1-1", Some(0), "change", true));
        assert_eq!(monitor.receive_one(), Some(DeviceNotice::Filtered));
        assert_eq!(hooked.get(), 0);

        bus.push(record("drm", "card0", Some(0), "change", true));
        assert_eq!(monitor.receive_one(), Some(DeviceNotice::Hotplug));
        assert_eq!(hooked.get(), 1);
    }

    #[test]
    fn test_readability_receives_exactly_one_record() {
        let bus = FakeBusHandle::new();
        let mut monitor = DeviceMonitor::new(bus.connector());
        let mut reactor = EventLoop::new().unwrap();
        let signal = Rc::new(Signal::new());
        let target: Rc<dyn ActivationTarget> = Rc::new(Idle(Cell::new(true)));
        monitor.init(&mut reactor, &signal, controller(&target)).unwrap();

        // Initial check consumes nothing when the bus is empty
        reactor.dispatch(Some(Duration::ZERO)).unwrap();

        bus.push(record("input", "event1", Some(1), "add", false));
        bus.push(record("input", "event2", Some(2), "add", false));
        bus.wake();
        reactor.dispatch(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(bus.pending(), 1);
    }

    #[test]
    fn test_init_failure_leaves_nothing_behind() {
        let bus = FakeBusHandle::new();
        bus.fail_connect(true);
        let mut monitor = DeviceMonitor::new(bus.connector());
        let mut reactor = EventLoop::new().unwrap();
        let signal = Rc::new(Signal::new());
        let target: Rc<dyn ActivationTarget> = Rc::new(Idle(Cell::new(true)));

        let err = monitor.init(&mut reactor, &signal, controller(&target)).unwrap_err();
        assert!(matches!(err, Error::Init { .. }));
        assert!(!monitor.is_initialized());
        assert_eq!(reactor.source_count(), 0);
        assert_eq!(signal.listener_count(), 0);
        assert_eq!(bus.alive(), 0);
    }

    #[test]
    fn test_init_twice_and_terminate_twice() {
        let bus = FakeBusHandle::new();
        let mut monitor = DeviceMonitor::new(bus.connector());
        let mut reactor = EventLoop::new().unwrap();
        let signal = Rc::new(Signal::new());
        let target: Rc<dyn ActivationTarget> = Rc::new(Idle(Cell::new(true)));

        monitor.init(&mut reactor, &signal, controller(&target)).unwrap();
        monitor.init(&mut reactor, &signal, controller(&target)).unwrap();
        assert_eq!(reactor.source_count(), 1);
        assert_eq!(signal.listener_count(), 1);
        assert_eq!(bus.connects(), 1);

        monitor.terminate(&mut reactor);
        monitor.terminate(&mut reactor);
        assert!(!monitor.is_initialized());
        assert_eq!(reactor.source_count(), 0);
        assert_eq!(signal.listener_count(), 0);
        assert_eq!(bus.alive(), 0);
    }

    #[test]
    fn test_activation_reaches_controller() {
        let bus = FakeBusHandle::new();
        let mut monitor = DeviceMonitor::new(bus.connector());
        let mut reactor = EventLoop::new().unwrap();
        let signal = Rc::new(Signal::new());
        let idle = Rc::new(Idle(Cell::new(true)));
        let target: Rc<dyn ActivationTarget> = idle.clone();
        monitor.init(&mut reactor, &signal, controller(&target)).unwrap();

        signal.emit(&false);
        assert!(!idle.0.get());
        monitor.terminate(&mut reactor);
        signal.emit(&true);
        assert!(!idle.0.get());
    }
}
