//! The seat's cursor
//!
//! Position in layout coordinates, pressed buttons and the xcursor image
//! currently shown. The cursor starts disabled and is enabled by the first
//! real pointer event.

use log::debug;

pub const DEFAULT_IMAGE: &str = "left_ptr";
pub const GRAB_IMAGE: &str = "grabbing";

#[derive(Debug)]
pub struct Cursor {
    x: f64,
    y: f64,
    enabled: bool,
    pressed_buttons: Vec<u32>,
    /// Serial of the last button press sent to a client
    last_press_serial: Option<u32>,
    /// Named image last requested; `None` while hidden or client-drawn
    image: Option<&'static str>,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            enabled: false,
            pressed_buttons: Vec::new(),
            last_press_serial: None,
            image: None,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true if the cursor was disabled before
    pub fn enable(&mut self) -> bool {
        if self.enabled {
            return false;
        }
        debug!("Cursor enabled at ({}, {})", self.x, self.y);
        self.enabled = true;
        true
    }

    /// Returns true if the cursor was enabled before
    pub fn disable(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        debug!("Cursor disabled");
        self.enabled = false;
        self.image = None;
        self.pressed_buttons.clear();
        true
    }

    /// Record a button transition; returns false for presses of a button
    /// already down and releases of a button not down
    pub fn button(&mut self, button: u32, pressed: bool) -> bool {
        let held = self.pressed_buttons.contains(&button);
        match (pressed, held) {
            (true, false) => {
                self.pressed_buttons.push(button);
                true
            }
            (false, true) => {
                self.pressed_buttons.retain(|b| *b != button);
                true
            }
            _ => false,
        }
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed_buttons.len()
    }

    pub fn set_last_press_serial(&mut self, serial: u32) {
        self.last_press_serial = Some(serial);
    }

    pub fn last_press_serial(&self) -> Option<u32> {
        self.last_press_serial
    }

    pub fn image(&self) -> Option<&'static str> {
        self.image
    }

    /// Returns whether the image changed
    pub fn set_image(&mut self, image: Option<&'static str>) -> bool {
        if self.image == image {
            return false;
        }
        self.image = image;
        true
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disabled() {
        let mut cursor = Cursor::new();
        assert!(!cursor.is_enabled());
        assert!(cursor.enable());
        assert!(!cursor.enable());
        assert!(cursor.disable());
        assert!(!cursor.disable());
    }

    #[test]
    fn test_button_counting() {
        let mut cursor = Cursor::new();
        assert!(cursor.button(0x110, true));
        assert!(!cursor.button(0x110, true));
        assert!(cursor.button(0x111, true));
        assert_eq!(cursor.pressed_count(), 2);
        assert!(cursor.button(0x110, false));
        assert!(!cursor.button(0x110, false));
        assert_eq!(cursor.pressed_count(), 1);
    }

    #[test]
    fn test_disable_hides_image_and_releases() {
        let mut cursor = Cursor::new();
        cursor.enable();
        assert!(cursor.set_image(Some(DEFAULT_IMAGE)));
        assert!(!cursor.set_image(Some(DEFAULT_IMAGE)));
        cursor.button(0x110, true);
        cursor.disable();
        assert_eq!(cursor.image(), None);
        assert_eq!(cursor.pressed_count(), 0);
    }
}
