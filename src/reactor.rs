//! Single-threaded event loop
//!
//! calloop loop with fd sources and a forced one-shot `check`. Every callback
//! runs on the thread that calls [`EventLoop::dispatch`]; nothing here is
//! `Send`.

use std::cell::{Cell, RefCell};
use std::io;
use std::os::fd::AsFd;
use std::rc::Rc;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::{LoopHandle, Mode};
use log::{debug, trace};

pub use calloop::{Interest, PostAction, Readiness, RegistrationToken};

use crate::error::{Error, Result};

type Callback = Rc<RefCell<Box<dyn FnMut(Readiness) -> PostAction>>>;

struct Source {
    token: RegistrationToken,
    callback: Callback,
}

/// Live sources, shared with the callbacks so `PostAction::Remove` is seen
type Sources = Rc<RefCell<Vec<Source>>>;

fn forget(sources: &Sources, token: RegistrationToken) -> bool {
    let mut sources = sources.borrow_mut();
    let before = sources.len();
    sources.retain(|s| s.token != token);
    sources.len() != before
}

fn run(callback: &Callback, readiness: Readiness) -> PostAction {
    match callback.try_borrow_mut() {
        Ok(mut callback) => callback(readiness),
        Err(_) => {
            trace!("reactor: callback already running");
            PostAction::Continue
        }
    }
}

/// calloop-driven reactor
pub struct EventLoop {
    inner: calloop::EventLoop<'static, ()>,
    sources: Sources,
}

impl EventLoop {
    pub fn new() -> Result<Self> {
        let inner = calloop::EventLoop::try_new()?;
        Ok(Self {
            inner,
            sources: Rc::new(RefCell::new(Vec::new())),
        })
    }

    fn handle(&self) -> LoopHandle<'static, ()> {
        self.inner.handle()
    }

    /// Watch `fd` (level-triggered) for `interest`.
    ///
    /// The loop owns `fd` until the source is removed; pass a duplicate
    /// (`try_clone_to_owned`) when the original belongs to someone else.
    pub fn register<F, C>(&mut self, fd: F, interest: Interest, callback: C) -> Result<RegistrationToken>
    where
        F: AsFd + 'static,
        C: FnMut(Readiness) -> PostAction + 'static,
    {
        let callback: Callback = Rc::new(RefCell::new(Box::new(callback)));
        let slot: Rc<Cell<Option<RegistrationToken>>> = Rc::new(Cell::new(None));

        let source_callback = callback.clone();
        let source_slot = slot.clone();
        let sources = self.sources.clone();
        let token = self
            .handle()
            .insert_source(Generic::new(fd, interest, Mode::Level), move |readiness, _, _| {
                let action = run(&source_callback, readiness);
                if matches!(action, PostAction::Remove) {
                    if let Some(token) = source_slot.get() {
                        debug!("reactor: source {:?} asked to be removed", token);
                        forget(&sources, token);
                    }
                }
                Ok(action)
            })
            .map_err(|e| Error::Reactor(e.error))?;

        slot.set(Some(token));
        self.sources.borrow_mut().push(Source { token, callback });
        debug!("reactor: registered {:?}", token);
        Ok(token)
    }

    /// Remove a source. Returns false if it was not registered.
    pub fn deregister(&mut self, token: RegistrationToken) -> bool {
        if !forget(&self.sources, token) {
            return false;
        }
        self.handle().remove(token);
        debug!("reactor: deregistered {:?}", token);
        true
    }

    /// Run the source's callback once on the next dispatch, readiness empty
    pub fn check(&mut self, token: RegistrationToken) -> bool {
        let Some(callback) = self
            .sources
            .borrow()
            .iter()
            .find(|s| s.token == token)
            .map(|s| s.callback.clone())
        else {
            return false;
        };

        let sources = self.sources.clone();
        let handle = self.handle();
        self.handle().insert_idle(move |_| {
            // Deregistered before the loop got to it
            if !sources.borrow().iter().any(|s| s.token == token) {
                return;
            }
            let empty = Readiness {
                readable: false,
                writable: false,
                error: false,
            };
            if matches!(run(&callback, empty), PostAction::Remove) && forget(&sources, token) {
                handle.remove(token);
            }
        });
        true
    }

    pub fn is_registered(&self, token: RegistrationToken) -> bool {
        self.sources.borrow().iter().any(|s| s.token == token)
    }

    pub fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }

    /// Wait for readiness (`None` blocks) and run the ready callbacks, then
    /// any pending checks. A pending check makes the wait non-blocking.
    pub fn dispatch(&mut self, timeout: Option<Duration>) -> Result<()> {
        match self.inner.dispatch(timeout, &mut ()) {
            Ok(()) => Ok(()),
            Err(calloop::Error::IoError(e)) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("reactor: poll interrupted");
                Ok(())
            }
            Err(e) => Err(Error::Reactor(e)),
        }
    }
}
