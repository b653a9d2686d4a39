//! Scripted bus and backend for unit tests
//!
//! Each fake owns one end of a `UnixStream` pair; `wake()` writes to the other
//! end so the reactor sees the fake's fd as readable.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::gatekeeper::{DeviceCategory, SharedGatekeeper};
use crate::input::{InputBackend, InputEvent, Normalize};
use crate::monitor::{DeviceBus, DeviceRecord};

fn socket_pair() -> (UnixStream, UnixStream) {
    let (tx, rx) = UnixStream::pair().expect("socketpair");
    rx.set_nonblocking(true).expect("nonblocking");
    (tx, rx)
}

fn drain(stream: &mut UnixStream) {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

#[derive(Default)]
struct BusState {
    records: VecDeque<DeviceRecord>,
    subsystems: Vec<String>,
    tx: Option<UnixStream>,
    fail_connect: bool,
    connects: usize,
}

/// Test-side control of [`FakeBus`]
#[derive(Clone, Default)]
pub struct FakeBusHandle {
    state: Rc<RefCell<BusState>>,
    alive: Rc<Cell<usize>>,
}

impl FakeBusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector for `DeviceMonitor::new`. Does not filter by itself.
    pub fn connector(&self) -> impl FnMut(&[&str]) -> Result<FakeBus> + 'static {
        let handle = self.clone();
        move |subsystems: &[&str]| {
            let mut state = handle.state.borrow_mut();
            if state.fail_connect {
                return Err(Error::Init {
                    component: "fake bus",
                    source: io::Error::from_raw_os_error(libc::EPROTONOSUPPORT),
                });
            }
            state.connects += 1;
            state.subsystems = subsystems.iter().map(|s| s.to_string()).collect();
            let (tx, rx) = socket_pair();
            state.tx = Some(tx);
            handle.alive.set(handle.alive.get() + 1);
            Ok(FakeBus {
                rx,
                state: handle.state.clone(),
                alive: handle.alive.clone(),
            })
        }
    }

    pub fn push(&self, record: DeviceRecord) {
        self.state.borrow_mut().records.push_back(record);
    }

    pub fn wake(&self) {
        if let Some(tx) = self.state.borrow_mut().tx.as_mut() {
            tx.write_all(b"!").expect("wake bus");
        }
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.borrow_mut().fail_connect = fail;
    }

    pub fn subsystems(&self) -> Vec<String> {
        self.state.borrow().subsystems.clone()
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().records.len()
    }

    pub fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    /// Live bus connections
    pub fn alive(&self) -> usize {
        self.alive.get()
    }
}

pub struct FakeBus {
    rx: UnixStream,
    state: Rc<RefCell<BusState>>,
    alive: Rc<Cell<usize>>,
}

impl DeviceBus for FakeBus {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.rx.as_fd()
    }

    fn receive(&mut self) -> Option<DeviceRecord> {
        drain(&mut self.rx);
        self.state.borrow_mut().records.pop_front()
    }
}

impl Drop for FakeBus {
    fn drop(&mut self) {
        self.alive.set(self.alive.get() - 1);
    }
}

/// Backend-native record of the fake backend
#[derive(Debug, Clone)]
pub enum FakeEvent {
    Mapped(InputEvent),
    /// A kind the normalizer has no mapping for (touch, gesture, ...)
    Unmapped,
}

impl Normalize for FakeEvent {
    fn normalize(self) -> Option<InputEvent> {
        match self {
            FakeEvent::Mapped(event) => Some(event),
            FakeEvent::Unmapped => None,
        }
    }
}

#[derive(Default)]
struct BackendState {
    queue: VecDeque<FakeEvent>,
    tx: Option<UnixStream>,
    reject_seat: bool,
    fail_dispatch: bool,
    suspended: bool,
    seat: Option<String>,
    created: usize,
}

/// Test-side control of [`FakeBackend`]
#[derive(Clone, Default)]
pub struct FakeBackendHandle {
    state: Rc<RefCell<BackendState>>,
    alive: Rc<Cell<usize>>,
}

impl FakeBackendHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory for `InputContext::new`
    pub fn factory(&self) -> impl FnMut(SharedGatekeeper) -> Result<FakeBackend> + 'static {
        let handle = self.clone();
        move |gatekeeper: SharedGatekeeper| {
            let (tx, rx) = socket_pair();
            {
                let mut state = handle.state.borrow_mut();
                state.tx = Some(tx);
                state.created += 1;
                state.suspended = false;
                state.seat = None;
            }
            handle.alive.set(handle.alive.get() + 1);
            Ok(FakeBackend {
                rx,
                gatekeeper,
                device: None,
                state: handle.state.clone(),
                alive: handle.alive.clone(),
            })
        }
    }

    /// Queue a native event (even while suspended, as a real queue would)
    pub fn push(&self, event: FakeEvent) {
        self.state.borrow_mut().queue.push_back(event);
    }

    pub fn wake(&self) {
        if let Some(tx) = self.state.borrow_mut().tx.as_mut() {
            tx.write_all(b"!").expect("wake backend");
        }
    }

    pub fn reject_seat(&self, reject: bool) {
        self.state.borrow_mut().reject_seat = reject;
    }

    pub fn fail_dispatch(&self, fail: bool) {
        self.state.borrow_mut().fail_dispatch = fail;
    }

    pub fn is_suspended(&self) -> bool {
        self.state.borrow().suspended
    }

    pub fn seat(&self) -> Option<String> {
        self.state.borrow().seat.clone()
    }

    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Backends created so far
    pub fn created(&self) -> usize {
        self.state.borrow().created
    }

    /// Backends not yet dropped
    pub fn alive(&self) -> usize {
        self.alive.get()
    }
}

/// Backend that opens one device node through the gatekeeper while a seat is
/// assigned and the session is active
pub struct FakeBackend {
    rx: UnixStream,
    gatekeeper: SharedGatekeeper,
    device: Option<OwnedFd>,
    state: Rc<RefCell<BackendState>>,
    alive: Rc<Cell<usize>>,
}

impl FakeBackend {
    fn open_device(&mut self) -> io::Result<()> {
        let fd = self
            .gatekeeper
            .borrow_mut()
            .open(Path::new("/dev/null"), libc::O_RDONLY | libc::O_NONBLOCK, DeviceCategory::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.device = Some(fd);
        Ok(())
    }

    fn close_device(&mut self) {
        if let Some(fd) = self.device.take() {
            self.gatekeeper.borrow_mut().close(fd);
        }
    }
}

impl InputBackend for FakeBackend {
    type Event = FakeEvent;

    fn assign_seat(&mut self, seat: &str) -> io::Result<()> {
        if self.state.borrow().reject_seat {
            return Err(io::Error::new(io::ErrorKind::Other, "seat rejected"));
        }
        self.state.borrow_mut().seat = Some(seat.to_owned());
        self.open_device()
    }

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.rx.as_fd()
    }

    fn dispatch(&mut self) -> io::Result<()> {
        drain(&mut self.rx);
        if self.state.borrow().fail_dispatch {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        Ok(())
    }

    fn next_event(&mut self) -> Option<FakeEvent> {
        self.state.borrow_mut().queue.pop_front()
    }

    fn suspend(&mut self) {
        self.state.borrow_mut().suspended = true;
        self.close_device();
    }

    fn resume(&mut self) -> io::Result<()> {
        self.state.borrow_mut().suspended = false;
        self.open_device()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.close_device();
        self.alive.set(self.alive.get() - 1);
    }
}
