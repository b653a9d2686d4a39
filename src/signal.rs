//! Ordered listener lists
//!
//! `Signal<T>` delivers every emitted value to its listeners synchronously,
//! in subscription order, before `emit` returns.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

/// Subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Rc<RefCell<Box<dyn FnMut(&T)>>>;

struct Listeners<T> {
    entries: Vec<(ListenerId, Callback<T>)>,
    next_id: u64,
}

/// Synchronous broadcast point
pub struct Signal<T> {
    listeners: RefCell<Listeners<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Listeners {
                entries: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Append a listener. Listeners added during an emit first see the next one.
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: FnMut(&T) + 'static,
    {
        let mut listeners = self.listeners.borrow_mut();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Rc::new(RefCell::new(Box::new(callback)))));
        id
    }

    /// Remove a listener; takes effect immediately, even mid-emit.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry, _)| *entry != id);
        listeners.entries.len() != before
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners.borrow().entries.iter().any(|(entry, _)| *entry == id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    /// Deliver `value` to every listener in order
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(ListenerId, Callback<T>)> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(id, cb)| (*id, cb.clone()))
            .collect();

        for (id, callback) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => (callback)(value),
                // Listener re-emitted the same signal from inside itself
                Err(_) => debug!("signal: skipping re-entrant listener {:?}", id),
            }
        }
    }
}
