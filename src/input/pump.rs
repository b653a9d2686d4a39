//! Dispatch pump
//!
//! Runs on backend readability: one dispatch, then drain everything queued,
//! broadcasting each normalized event before pulling the next one.

use log::{trace, warn};

use super::normalize::Normalize;
use super::{InputBackend, Shared};
use crate::bus::EventBus;

/// Drain the backend once. Returns the number of events broadcast.
pub(crate) fn pump<B: InputBackend>(shared: &Shared<B>, bus: &EventBus) -> usize {
    {
        let mut slot = shared.backend.borrow_mut();
        let Some(backend) = slot.as_mut() else {
            return 0;
        };
        // Transient: whatever was already queued is still drained below
        if let Err(e) = backend.dispatch() {
            warn!("libinput dispatch error: {}", e);
        }
    }

    let mut broadcast = 0;
    loop {
        // Borrow only long enough to pull one record; subscribers run unborrowed
        let next = match shared.backend.borrow_mut().as_mut() {
            Some(backend) => backend.next_event(),
            None => None,
        };
        let Some(raw) = next else {
            break;
        };

        if !shared.session_active.get() {
            trace!("input: session inactive, discarding queued event");
            continue;
        }

        if let Some(event) = raw.normalize() {
            if let Some(last) = shared.last_time.get() {
                if event.time < last {
                    trace!("input: timestamp {} precedes {}", event.time, last);
                }
            }
            shared.last_time.set(Some(event.time));
            bus.broadcast(&event);
            broadcast += 1;
        }
    }
    broadcast
}
