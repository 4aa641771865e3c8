//! Input device registry
//!
//! Tracks every attached input device by class and derives the seat's
//! advertised capabilities from what is live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};

use crate::input::keyboard::Keyboard;
use crate::input::pointer::Pointer;
use crate::input::seat::SeatCapabilities;

/// Unique identifier for input devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceId {
    /// Mint a fresh id; backends do this when they discover a device
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        DeviceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Device class reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Keyboard,
    Pointer,
    Touch,
    Tablet,
    TabletPad,
    Switch,
}

/// What the backend reports about a new input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub class: DeviceClass,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, class: DeviceClass) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }
}

/// All attached input devices
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    keyboards: HashMap<DeviceId, Keyboard>,
    pointers: HashMap<DeviceId, Pointer>,
    /// Devices accepted but not wired to any behavior (touch, tablets,
    /// switches)
    unsupported: HashMap<DeviceId, DeviceInfo>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device under a backend-minted id, compiling keymaps for
    /// keyboards with `layout`
    pub fn add(&mut self, id: DeviceId, info: DeviceInfo, layout: &str) {
        self.insert(id, info, |id, name| Keyboard::new(id, name, layout));
    }

    /// Attach a device without compiling keymaps
    pub fn add_without_keymap(&mut self, info: DeviceInfo) -> DeviceId {
        let id = DeviceId::new();
        self.insert(id, info, |id, name| Keyboard::without_keymap(id, name));
        id
    }

    fn insert(&mut self, id: DeviceId, info: DeviceInfo, keyboard: impl FnOnce(DeviceId, String) -> Keyboard) {
        match info.class {
            DeviceClass::Keyboard => {
                info!("New keyboard {}", info.name);
                self.keyboards.insert(id, keyboard(id, info.name));
            }
            DeviceClass::Pointer => {
                info!("New pointer {}", info.name);
                self.pointers.insert(id, Pointer::new(id, info.name));
            }
            class => {
                warn!("Input device {} ({:?}) is not supported, ignoring its events", info.name, class);
                self.unsupported.insert(id, info);
            }
        }
    }

    /// Detach a device; returns its class if it was known
    pub fn remove(&mut self, id: DeviceId) -> Option<DeviceClass> {
        if let Some(keyboard) = self.keyboards.remove(&id) {
            info!("Keyboard {} removed", keyboard.name());
            return Some(DeviceClass::Keyboard);
        }
        if let Some(pointer) = self.pointers.remove(&id) {
            info!("Pointer {} removed", pointer.name());
            return Some(DeviceClass::Pointer);
        }
        self.unsupported.remove(&id).map(|info| info.class)
    }

    /// Capabilities backed by at least one live device
    pub fn capabilities(&self) -> SeatCapabilities {
        let mut caps = SeatCapabilities::empty();
        caps.set(SeatCapabilities::POINTER, !self.pointers.is_empty());
        caps.set(SeatCapabilities::KEYBOARD, !self.keyboards.is_empty());
        caps
    }

    pub fn keyboard(&self, id: DeviceId) -> Option<&Keyboard> {
        self.keyboards.get(&id)
    }

    pub fn keyboard_mut(&mut self, id: DeviceId) -> Option<&mut Keyboard> {
        self.keyboards.get_mut(&id)
    }

    pub fn keyboards_mut(&mut self) -> impl Iterator<Item = &mut Keyboard> {
        self.keyboards.values_mut()
    }

    pub fn pointer(&self, id: DeviceId) -> Option<&Pointer> {
        self.pointers.get(&id)
    }

    pub fn pointer_mut(&mut self, id: DeviceId) -> Option<&mut Pointer> {
        self.pointers.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.keyboards.len() + self.pointers.len() + self.unsupported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_follow_live_devices() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.capabilities().is_empty());

        let mouse = registry.add_without_keymap(DeviceInfo::new("mouse", DeviceClass::Pointer));
        let kbd = registry.add_without_keymap(DeviceInfo::new("kbd", DeviceClass::Keyboard));
        assert_eq!(
            registry.capabilities(),
            SeatCapabilities::POINTER | SeatCapabilities::KEYBOARD
        );

        let touchpad = registry.add_without_keymap(DeviceInfo::new("touchpad", DeviceClass::Pointer));
        registry.remove(mouse);
        assert!(registry.capabilities().contains(SeatCapabilities::POINTER));
        registry.remove(touchpad);
        assert_eq!(registry.capabilities(), SeatCapabilities::KEYBOARD);

        assert_eq!(registry.remove(kbd), Some(DeviceClass::Keyboard));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsupported_devices_are_accepted() {
        let mut registry = DeviceRegistry::new();
        let touch = registry.add_without_keymap(DeviceInfo::new("screen", DeviceClass::Touch));
        assert_eq!(registry.len(), 1);
        assert!(registry.capabilities().is_empty());
        assert_eq!(registry.remove(touch), Some(DeviceClass::Touch));
        assert_eq!(registry.remove(touch), None);
    }
}
