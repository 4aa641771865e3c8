//! Protocol notifications
//!
//! The compositor core never talks to wire objects. Every event it wants
//! delivered to a client, and every side effect it wants the embedding
//! program to carry out, is queued as a [`Notification`] in the order the
//! core produced it. The server drains that queue after each dispatched
//! event.

use crate::compositor::drag::DataSourceId;
use crate::compositor::geometry::{Rect, Size};
use crate::compositor::toplevel::ToplevelStates;
use crate::compositor::{LayerId, PopupId, SurfaceId, ToplevelId};
use crate::input::devices::DeviceId;
use crate::input::keyboard::{Leds, ModifierState};
use crate::input::pointer::{AxisEvent, GestureEvent};
use crate::input::seat::SeatCapabilities;

/// Something the core wants sent to a client or done by its host
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// xdg_toplevel.configure followed by xdg_surface.configure
    ToplevelConfigure {
        toplevel: ToplevelId,
        size: Size,
        states: ToplevelStates,
    },
    ToplevelClose {
        toplevel: ToplevelId,
    },
    /// Geometry is relative to the popup's xdg parent
    PopupConfigure {
        popup: PopupId,
        geometry: Rect,
    },
    PopupRepositioned {
        popup: PopupId,
        token: u32,
    },
    PopupDone {
        popup: PopupId,
    },
    LayerConfigure {
        layer: LayerId,
        size: Size,
    },
    LayerClosed {
        layer: LayerId,
    },

    PointerEnter {
        surface: SurfaceId,
        serial: u32,
        x: f64,
        y: f64,
    },
    PointerLeave {
        surface: SurfaceId,
        serial: u32,
    },
    PointerMotion {
        surface: SurfaceId,
        time: u32,
        x: f64,
        y: f64,
    },
    PointerButton {
        surface: SurfaceId,
        serial: u32,
        time: u32,
        button: u32,
        pressed: bool,
    },
    PointerAxis {
        surface: SurfaceId,
        event: AxisEvent,
    },
    PointerFrame {
        surface: SurfaceId,
    },

    KeyboardEnter {
        surface: SurfaceId,
        serial: u32,
    },
    KeyboardLeave {
        surface: SurfaceId,
        serial: u32,
    },
    KeyboardKey {
        surface: SurfaceId,
        serial: u32,
        time: u32,
        key: u32,
        pressed: bool,
    },
    KeyboardModifiers {
        surface: SurfaceId,
        serial: u32,
        state: ModifierState,
    },

    /// Swipe, pinch or hold gesture forwarded to the surface under the pointer
    Gesture {
        surface: SurfaceId,
        serial: u32,
        event: GestureEvent,
    },

    SeatCapabilities {
        capabilities: SeatCapabilities,
    },
    /// Named xcursor image; `None` hides the cursor
    CursorImage {
        name: Option<&'static str>,
    },
    KeyboardLeds {
        device: DeviceId,
        leds: Leds,
    },
    /// A data source whose drag was refused
    DataSourceCancelled {
        source: DataSourceId,
    },
    Spawn {
        command: String,
    },
    Terminate,
}

impl Notification {
    /// Surface the notification is addressed to, if it is a seat event
    pub fn surface(&self) -> Option<SurfaceId> {
        match self {
            Notification::PointerEnter { surface, .. }
            | Notification::PointerLeave { surface, .. }
            | Notification::PointerMotion { surface, .. }
            | Notification::PointerButton { surface, .. }
            | Notification::PointerAxis { surface, .. }
            | Notification::PointerFrame { surface }
            | Notification::KeyboardEnter { surface, .. }
            | Notification::KeyboardLeave { surface, .. }
            | Notification::KeyboardKey { surface, .. }
            | Notification::KeyboardModifiers { surface, .. }
            | Notification::Gesture { surface, .. } => Some(*surface),
            _ => None,
        }
    }
}
