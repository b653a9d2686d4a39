//! Input event bus
//!
//! Synchronous broadcast of normalized events. Subscribers are called in
//! subscription order from inside the pump, one event at a time.

use std::cell::RefCell;
use std::rc::Rc;

use crate::input::{AbsoluteMotion, ButtonState, EventData, EventKind, InputEvent, KeyState, ScrollAxis};
use crate::signal::{ListenerId, Signal};

/// Pointer motion as delivered to a seat
#[derive(Debug, Clone, Copy)]
pub enum PointerMotion<'a> {
    Relative { dx: f64, dy: f64 },
    /// Resolve with the output size the seat maps the pointer onto
    Absolute(&'a AbsoluteMotion),
}

/// Seat-side callback slots
pub trait SeatHandler {
    fn pointer_motion(&mut self, time: u32, motion: PointerMotion<'_>);
    fn pointer_scroll(&mut self, time: u32, axis: ScrollAxis, amount: f64);
    fn pointer_button(&mut self, time: u32, button: u32, state: ButtonState);
    fn keyboard_key(&mut self, time: u32, key: u32, state: KeyState);
}

/// Route one event to the matching seat slot
pub fn deliver_to_seat<S: SeatHandler + ?Sized>(seat: &mut S, event: &InputEvent) {
    match &event.data {
        EventData::Motion { dx, dy } => seat.pointer_motion(event.time, PointerMotion::Relative { dx: *dx, dy: *dy }),
        EventData::MotionAbsolute(abs) => seat.pointer_motion(event.time, PointerMotion::Absolute(abs)),
        EventData::Button { code, state } => seat.pointer_button(event.time, *code, *state),
        EventData::Scroll { axis, amount } => seat.pointer_scroll(event.time, *axis, *amount),
        EventData::Key { code, state } => seat.keyboard_key(event.time, *code, *state),
    }
}

/// Broadcast point for normalized input events
#[derive(Default)]
pub struct EventBus {
    signal: Signal<InputEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: FnMut(&InputEvent) + 'static,
    {
        self.signal.subscribe(callback)
    }

    /// Receive events of one kind only. Ordering across kinds is kept.
    pub fn subscribe_kind<F>(&self, kind: EventKind, mut callback: F) -> ListenerId
    where
        F: FnMut(&InputEvent) + 'static,
    {
        self.signal.subscribe(move |event: &InputEvent| {
            if event.kind() == kind {
                callback(event);
            }
        })
    }

    /// Feed every event to a seat's callback slots
    pub fn attach_seat<S: SeatHandler + 'static>(&self, seat: Rc<RefCell<S>>) -> ListenerId {
        self.signal
            .subscribe(move |event: &InputEvent| deliver_to_seat(&mut *seat.borrow_mut(), event))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.signal.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.listener_count()
    }

    /// Deliver `event` to every subscriber before returning
    pub fn broadcast(&self, event: &InputEvent) {
        self.signal.emit(event);
    }
}
