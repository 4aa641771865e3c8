//! Pointer (mouse/trackpad) handling
//!
//! Pointer devices normalise raw backend events into layout-space motion
//! and client-ready axis values before they reach the seat.

use crate::compositor::geometry::Rect;
use crate::input::devices::DeviceId;

/// linux/input-event-codes.h BTN_LEFT
pub const BTN_LEFT: u32 = 0x110;

/// Scroll axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Where a scroll event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisSource {
    #[default]
    Wheel,
    Finger,
    Continuous,
    WheelTilt,
}

/// A scroll event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisEvent {
    pub time: u32,
    pub axis: Axis,
    pub source: AxisSource,
    /// Scroll distance in surface-local units
    pub delta: f64,
    /// Wheel detents, 0 when not from a wheel
    pub discrete: i32,
}

/// Touchpad gestures forwarded through zwp_pointer_gestures_v1
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    SwipeBegin { time: u32, fingers: u32 },
    SwipeUpdate { time: u32, dx: f64, dy: f64 },
    SwipeEnd { time: u32, cancelled: bool },
    PinchBegin { time: u32, fingers: u32 },
    PinchUpdate {
        time: u32,
        dx: f64,
        dy: f64,
        scale: f64,
        rotation: f64,
    },
    PinchEnd { time: u32, cancelled: bool },
    HoldBegin { time: u32, fingers: u32 },
    HoldEnd { time: u32, cancelled: bool },
}

/// A pointer device attached to the seat
#[derive(Debug)]
pub struct Pointer {
    id: DeviceId,
    name: String,
    /// Multiplier applied to relative motion
    speed: f64,
    /// Invert scroll direction
    natural_scroll: bool,
}

impl Pointer {
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            speed: 1.0,
            natural_scroll: false,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    pub fn set_natural_scroll(&mut self, natural: bool) {
        self.natural_scroll = natural;
    }

    /// Scale relative motion
    pub fn relative(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx * self.speed, dy * self.speed)
    }

    /// Map absolute device coordinates in [0, 1] onto a layout box
    pub fn absolute(&self, x: f64, y: f64, bounds: Rect) -> (f64, f64) {
        (
            bounds.x as f64 + x.clamp(0.0, 1.0) * bounds.width as f64,
            bounds.y as f64 + y.clamp(0.0, 1.0) * bounds.height as f64,
        )
    }

    /// Apply scroll direction preferences
    pub fn axis(&self, mut event: AxisEvent) -> AxisEvent {
        if self.natural_scroll {
            event.delta = -event.delta;
            event.discrete = -event.discrete;
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroll(delta: f64, discrete: i32) -> AxisEvent {
        AxisEvent {
            time: 0,
            axis: Axis::Vertical,
            source: AxisSource::Wheel,
            delta,
            discrete,
        }
    }

    #[test]
    fn test_relative_speed() {
        let mut pointer = Pointer::new(DeviceId(1), "mouse");
        assert_eq!(pointer.relative(2.0, -3.0), (2.0, -3.0));
        pointer.set_speed(2.0);
        assert_eq!(pointer.relative(2.0, -3.0), (4.0, -6.0));
        pointer.set_speed(-1.0);
        assert_eq!(pointer.relative(1.0, 1.0), (2.0, 2.0));
    }

    #[test]
    fn test_absolute_mapping() {
        let pointer = Pointer::new(DeviceId(1), "tablet");
        let bounds = Rect::new(100, 0, 1000, 500);
        assert_eq!(pointer.absolute(0.5, 0.5, bounds), (600.0, 250.0));
        assert_eq!(pointer.absolute(2.0, -1.0, bounds), (1100.0, 0.0));
    }

    #[test]
    fn test_natural_scroll() {
        let mut pointer = Pointer::new(DeviceId(1), "touchpad");
        assert_eq!(pointer.axis(scroll(10.0, 1)), scroll(10.0, 1));
        pointer.set_natural_scroll(true);
        assert_eq!(pointer.axis(scroll(10.0, 1)), scroll(-10.0, -1));
    }
}
