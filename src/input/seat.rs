//! Input seat coordination

use log::debug;

use crate::compositor::SurfaceId;
use crate::input::cursor::Cursor;
use crate::input::interaction::InteractionState;

bitflags::bitflags! {
    /// Seat capabilities, with wl_seat's bit values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

/// Result of a keyboard focus change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardFocusChange {
    /// Previously focused surface
    pub old_focus: Option<SurfaceId>,
    /// Newly focused surface
    pub new_focus: Option<SurfaceId>,
}

impl KeyboardFocusChange {
    pub fn changed(&self) -> bool {
        self.old_focus != self.new_focus
    }
}

/// Result of a pointer focus change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerFocusChange {
    pub old_focus: Option<SurfaceId>,
    pub new_focus: Option<SurfaceId>,
}

impl PointerFocusChange {
    pub fn changed(&self) -> bool {
        self.old_focus != self.new_focus
    }
}

/// The one logical seat all devices feed
#[derive(Debug)]
pub struct Seat {
    name: String,
    capabilities: SeatCapabilities,
    keyboard_focus: Option<SurfaceId>,
    pointer_focus: Option<SurfaceId>,
    pub cursor: Cursor,
    /// Current pointer interaction; exactly one is active
    pub interaction: InteractionState,
}

impl Seat {
    pub fn new() -> Self {
        Self {
            name: "seat0".to_string(),
            capabilities: SeatCapabilities::empty(),
            keyboard_focus: None,
            pointer_focus: None,
            cursor: Cursor::new(),
            interaction: InteractionState::Passthrough,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> SeatCapabilities {
        self.capabilities
    }

    /// Returns whether the capabilities changed
    pub fn set_capabilities(&mut self, capabilities: SeatCapabilities) -> bool {
        if self.capabilities == capabilities {
            return false;
        }
        debug!("Seat {} capabilities {:?}", self.name, capabilities);
        self.capabilities = capabilities;
        true
    }

    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard_focus
    }

    pub fn set_keyboard_focus(&mut self, surface: Option<SurfaceId>) -> KeyboardFocusChange {
        let old_focus = std::mem::replace(&mut self.keyboard_focus, surface);
        KeyboardFocusChange {
            old_focus,
            new_focus: surface,
        }
    }

    pub fn pointer_focus(&self) -> Option<SurfaceId> {
        self.pointer_focus
    }

    pub fn set_pointer_focus(&mut self, surface: Option<SurfaceId>) -> PointerFocusChange {
        let old_focus = std::mem::replace(&mut self.pointer_focus, surface);
        PointerFocusChange {
            old_focus,
            new_focus: surface,
        }
    }
}

impl Default for Seat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_new() {
        let seat = Seat::new();
        assert_eq!(seat.name(), "seat0");
        assert!(seat.capabilities().is_empty());
        assert_eq!(seat.interaction, InteractionState::Passthrough);
        assert!(!seat.cursor.is_enabled());
    }

    #[test]
    fn test_seat_capabilities() {
        let mut seat = Seat::new();
        let caps = SeatCapabilities::POINTER | SeatCapabilities::KEYBOARD;
        assert_eq!(caps.bits(), 3);
        assert!(seat.set_capabilities(caps));
        assert!(!seat.set_capabilities(caps));
    }

    #[test]
    fn test_focus_changes() {
        let mut seat = Seat::new();
        let change = seat.set_keyboard_focus(Some(SurfaceId(1)));
        assert_eq!(change.old_focus, None);
        assert!(change.changed());

        let change = seat.set_keyboard_focus(Some(SurfaceId(1)));
        assert!(!change.changed());

        let change = seat.set_pointer_focus(Some(SurfaceId(2)));
        assert_eq!(change.new_focus, Some(SurfaceId(2)));
        assert_eq!(seat.pointer_focus(), Some(SurfaceId(2)));
    }
}
