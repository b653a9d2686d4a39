//! Normalized input events
//!
//! One timestamp plus exactly one payload. Absolute motion keeps its source
//! alive and is only resolved to pixels when a consumer supplies the output
//! size.

use std::fmt;
use std::rc::Rc;

/// Pointer button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

/// Keyboard key state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

/// Scroll axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

/// Source of an absolute pointer position, resolved against a caller-supplied size
pub trait AbsolutePosition {
    fn x(&self, width: u32) -> f64;
    fn y(&self, height: u32) -> f64;
}

/// Position as a fraction of the output, both axes in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPosition {
    pub x: f64,
    pub y: f64,
}

impl AbsolutePosition for NormalizedPosition {
    fn x(&self, width: u32) -> f64 {
        self.x * width as f64
    }

    fn y(&self, height: u32) -> f64 {
        self.y * height as f64
    }
}

/// Absolute motion payload
///
/// Holds the device context (the backend event) rather than coordinates, so
/// the same event yields different pixels for different output sizes.
#[derive(Clone)]
pub struct AbsoluteMotion {
    source: Rc<dyn AbsolutePosition>,
}

impl AbsoluteMotion {
    pub fn new(source: impl AbsolutePosition + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    /// X in pixels for an output `width` pixels wide
    pub fn x(&self, width: u32) -> f64 {
        self.source.x(width)
    }

    /// Y in pixels for an output `height` pixels high
    pub fn y(&self, height: u32) -> f64 {
        self.source.y(height)
    }
}

impl fmt::Debug for AbsoluteMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbsoluteMotion").finish_non_exhaustive()
    }
}

/// Event payload
#[derive(Debug, Clone)]
pub enum EventData {
    /// Relative pointer motion
    Motion { dx: f64, dy: f64 },
    /// Absolute pointer motion (touchscreen, tablet, VM pointer)
    MotionAbsolute(AbsoluteMotion),
    /// Pointer button (evdev code, e.g. 0x110 = BTN_LEFT)
    Button { code: u32, state: ButtonState },
    /// Scroll on one axis
    Scroll { axis: ScrollAxis, amount: f64 },
    /// Keyboard key (evdev code, no xkb offset)
    Key { code: u32, state: KeyState },
}

/// Payload discriminant, used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Motion,
    MotionAbsolute,
    Button,
    Scroll,
    Key,
}

/// Normalized input event
#[derive(Debug, Clone)]
pub struct InputEvent {
    /// Milliseconds, monotonic per device
    pub time: u32,
    pub data: EventData,
}

impl InputEvent {
    pub fn new(time: u32, data: EventData) -> Self {
        Self { time, data }
    }

    pub fn kind(&self) -> EventKind {
        match self.data {
            EventData::Motion { .. } => EventKind::Motion,
            EventData::MotionAbsolute(_) => EventKind::MotionAbsolute,
            EventData::Button { .. } => EventKind::Button,
            EventData::Scroll { .. } => EventKind::Scroll,
            EventData::Key { .. } => EventKind::Key,
        }
    }
}
