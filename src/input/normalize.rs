//! Backend event normalization
//!
//! Maps libinput's event enum onto [`InputEvent`]. Every discriminant either
//! produces exactly one event or falls into the single default branch, which
//! drops it.

use input::event::keyboard::{KeyState as LiKeyState, KeyboardEventTrait};
use input::event::pointer::{
    Axis, ButtonState as LiButtonState, PointerEventTrait, PointerMotionAbsoluteEvent,
    PointerScrollEvent,
};
use input::event::{DeviceEvent, Event, EventTrait, KeyboardEvent, PointerEvent};
use log::{info, trace};

use super::event::{
    AbsoluteMotion, AbsolutePosition, ButtonState, EventData, InputEvent, KeyState, ScrollAxis,
};

/// Conversion from a backend-native event record
pub trait Normalize {
    /// `None` for event kinds without a mapping
    fn normalize(self) -> Option<InputEvent>;
}

impl AbsolutePosition for PointerMotionAbsoluteEvent {
    fn x(&self, width: u32) -> f64 {
        self.absolute_x_transformed(width)
    }

    fn y(&self, height: u32) -> f64 {
        self.absolute_y_transformed(height)
    }
}

impl Normalize for Event {
    fn normalize(self) -> Option<InputEvent> {
        match self {
            Event::Device(DeviceEvent::Added(e)) => {
                info!("input device added: {}", e.device().name());
                None
            }
            Event::Device(DeviceEvent::Removed(e)) => {
                info!("input device removed: {}", e.device().name());
                None
            }
            Event::Pointer(PointerEvent::Motion(m)) => Some(InputEvent::new(
                m.time(),
                EventData::Motion {
                    dx: m.dx(),
                    dy: m.dy(),
                },
            )),
            Event::Pointer(PointerEvent::MotionAbsolute(m)) => {
                let time = m.time();
                Some(InputEvent::new(
                    time,
                    EventData::MotionAbsolute(AbsoluteMotion::new(m)),
                ))
            }
            Event::Pointer(PointerEvent::Button(b)) => Some(InputEvent::new(
                b.time(),
                EventData::Button {
                    code: b.button(),
                    state: match b.button_state() {
                        LiButtonState::Pressed => ButtonState::Pressed,
                        LiButtonState::Released => ButtonState::Released,
                    },
                },
            )),
            Event::Pointer(PointerEvent::ScrollWheel(s)) => scroll_event(s.time(), &s),
            Event::Pointer(PointerEvent::ScrollFinger(s)) => scroll_event(s.time(), &s),
            Event::Pointer(PointerEvent::ScrollContinuous(s)) => scroll_event(s.time(), &s),
            Event::Keyboard(KeyboardEvent::Key(k)) => Some(InputEvent::new(
                k.time(),
                EventData::Key {
                    code: k.key(),
                    state: match k.key_state() {
                        LiKeyState::Pressed => KeyState::Pressed,
                        LiKeyState::Released => KeyState::Released,
                    },
                },
            )),
            // Touch, tablet, gesture, switch and anything newer
            _ => None,
        }
    }
}

fn scroll_event(time: u32, event: &impl PointerScrollEvent) -> Option<InputEvent> {
    let vertical = event
        .has_axis(Axis::Vertical)
        .then(|| event.scroll_value(Axis::Vertical));
    let horizontal = event
        .has_axis(Axis::Horizontal)
        .then(|| event.scroll_value(Axis::Horizontal));
    if let (Some(_), Some(h)) = (vertical, horizontal) {
        trace!("input: diagonal scroll, dropping horizontal {:+.2}", h);
    }
    let (axis, amount) = pick_scroll_axis(vertical, horizontal)?;
    Some(InputEvent::new(time, EventData::Scroll { axis, amount }))
}

/// One scroll event per backend event: vertical wins when both axes are set.
///
/// The horizontal delta of a diagonal scroll is lost; seats only ever see
/// the vertical component of such an event.
pub(crate) fn pick_scroll_axis(vertical: Option<f64>, horizontal: Option<f64>) -> Option<(ScrollAxis, f64)> {
    match (vertical, horizontal) {
        (Some(v), _) => Some((ScrollAxis::Vertical, v)),
        (None, Some(h)) => Some((ScrollAxis::Horizontal, h)),
        (None, None) => None,
    }
}
