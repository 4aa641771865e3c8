//! Keyboard handling and XKB integration

use std::fmt;

use log::{debug, warn};
use xkbcommon::xkb;

use crate::input::devices::DeviceId;

/// Offset between evdev keycodes and XKB keycodes
const EVDEV_OFFSET: u32 = 8;

bitflags::bitflags! {
    /// Effective modifiers, named after their X11 slots
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CAPS = 1 << 1;
        const CTRL = 1 << 2;
        const ALT = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const LOGO = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

impl Modifiers {
    /// Modifiers that take part in keybinding matching; lock keys do not
    pub const BINDING_MASK: Modifiers = Modifiers::SHIFT
        .union(Modifiers::CTRL)
        .union(Modifiers::ALT)
        .union(Modifiers::MOD3)
        .union(Modifiers::LOGO)
        .union(Modifiers::MOD5);
}

bitflags::bitflags! {
    /// Keyboard indicator lights
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Leds: u32 {
        const NUM_LOCK = 1 << 0;
        const CAPS_LOCK = 1 << 1;
        const SCROLL_LOCK = 1 << 2;
    }
}

/// Serialized modifier state, as sent in wl_keyboard.modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Depressed modifiers (currently held down)
    pub depressed: u32,
    /// Latched modifiers (sticky, cleared on next key)
    pub latched: u32,
    /// Locked modifiers (toggled, like caps lock)
    pub locked: u32,
    /// Keyboard group/layout
    pub group: u32,
}

/// A key event resolved against the keymap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub time: u32,
    /// evdev keycode
    pub keycode: u32,
    pub pressed: bool,
    /// Modifiers in effect when the key went down
    pub modifiers: Modifiers,
    /// Keysyms the key produces under the current layout
    pub syms: Vec<u32>,
}

struct XkbKeyboard {
    keymap: xkb::Keymap,
    state: xkb::State,
}

impl XkbKeyboard {
    fn new(layout: &str) -> Option<Self> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_names(
            &context,
            "",
            "",
            layout,
            "",
            None,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )?;
        let state = xkb::State::new(&keymap);
        Some(Self { keymap, state })
    }

    fn syms(&self, keycode: u32) -> Vec<u32> {
        self.state
            .key_get_syms(xkb::Keycode::new(keycode + EVDEV_OFFSET))
            .iter()
            .map(|sym| sym.raw())
            .collect()
    }

    fn serialize(&self) -> ModifierState {
        ModifierState {
            depressed: self.state.serialize_mods(xkb::STATE_MODS_DEPRESSED),
            latched: self.state.serialize_mods(xkb::STATE_MODS_LATCHED),
            locked: self.state.serialize_mods(xkb::STATE_MODS_LOCKED),
            group: self.state.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE),
        }
    }

    fn modifiers(&self) -> Modifiers {
        let names = [
            (xkb::MOD_NAME_SHIFT, Modifiers::SHIFT),
            (xkb::MOD_NAME_CAPS, Modifiers::CAPS),
            (xkb::MOD_NAME_CTRL, Modifiers::CTRL),
            (xkb::MOD_NAME_ALT, Modifiers::ALT),
            (xkb::MOD_NAME_NUM, Modifiers::MOD2),
            (xkb::MOD_NAME_LOGO, Modifiers::LOGO),
        ];
        names
            .iter()
            .filter(|(name, _)| self.state.mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE))
            .fold(Modifiers::empty(), |acc, (_, flag)| acc | *flag)
    }

    fn leds(&self) -> Leds {
        let mut leds = Leds::empty();
        leds.set(Leds::NUM_LOCK, self.state.led_name_is_active(xkb::LED_NAME_NUM));
        leds.set(Leds::CAPS_LOCK, self.state.led_name_is_active(xkb::LED_NAME_CAPS));
        leds.set(Leds::SCROLL_LOCK, self.state.led_name_is_active(xkb::LED_NAME_SCROLL));
        leds
    }
}

/// Key repeat advertised to clients, in characters per second
pub const REPEAT_RATE: i32 = 25;
/// Milliseconds before a held key starts repeating
pub const REPEAT_DELAY: i32 = 600;

/// Compile the keymap for a layout and return it in text form, for
/// sharing with clients
pub fn compile_keymap(layout: &str) -> Option<String> {
    XkbKeyboard::new(layout).map(|x| x.keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1))
}

/// A physical keyboard attached to the seat
pub struct Keyboard {
    id: DeviceId,
    name: String,
    /// `None` when no keymap could be compiled; keys then resolve to no
    /// keysyms and are only forwarded
    xkb: Option<XkbKeyboard>,
    /// Currently pressed keys (evdev keycodes)
    pressed_keys: Vec<u32>,
    modifiers: Modifiers,
    state: ModifierState,
    leds: Leds,
    /// Repeat rate (characters per second)
    repeat_rate: i32,
    /// Repeat delay (milliseconds)
    repeat_delay: i32,
}

impl Keyboard {
    /// Create a keyboard with a keymap compiled for `layout`
    pub fn new(id: DeviceId, name: impl Into<String>, layout: &str) -> Self {
        let name = name.into();
        let xkb = XkbKeyboard::new(layout);
        if xkb.is_none() {
            warn!(
                "Keyboard {}: failed to compile keymap for layout {:?}, keybindings disabled",
                name, layout
            );
        }
        Self {
            xkb,
            ..Self::without_keymap(id, name)
        }
    }

    /// Create a keyboard that resolves no keysyms
    pub fn without_keymap(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            xkb: None,
            pressed_keys: Vec::new(),
            modifiers: Modifiers::empty(),
            state: ModifierState::default(),
            leds: Leds::empty(),
            repeat_rate: REPEAT_RATE,
            repeat_delay: REPEAT_DELAY,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_keymap(&self) -> bool {
        self.xkb.is_some()
    }

    /// Feed a raw key event. Keysyms are resolved before the key updates
    /// the XKB state, so a modifier's own press is seen without itself.
    /// The second value is the new serialized state if it changed.
    pub fn feed(&mut self, time: u32, keycode: u32, pressed: bool) -> (KeyEvent, Option<ModifierState>) {
        let syms = self.xkb.as_ref().map(|x| x.syms(keycode)).unwrap_or_default();
        let event = KeyEvent {
            time,
            keycode,
            pressed,
            modifiers: self.modifiers,
            syms,
        };

        if pressed {
            if !self.pressed_keys.contains(&keycode) {
                self.pressed_keys.push(keycode);
            }
        } else {
            self.pressed_keys.retain(|k| *k != keycode);
        }

        let mut changed = None;
        if let Some(x) = self.xkb.as_mut() {
            let direction = if pressed {
                xkb::KeyDirection::Down
            } else {
                xkb::KeyDirection::Up
            };
            x.state
                .update_key(xkb::Keycode::new(keycode + EVDEV_OFFSET), direction);
            self.modifiers = x.modifiers();
            self.leds = x.leds();
            let state = x.serialize();
            if state != self.state {
                self.state = state;
                changed = Some(state);
            }
        }

        debug!(
            "Keyboard {}: key {} {} syms {:?}",
            self.name,
            keycode,
            if pressed { "down" } else { "up" },
            event.syms
        );
        (event, changed)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn modifier_state(&self) -> ModifierState {
        self.state
    }

    pub fn leds(&self) -> Leds {
        self.leds
    }

    /// Mirror another keyboard's indicators; returns whether they changed
    pub fn sync_leds(&mut self, leds: Leds) -> bool {
        if self.leds == leds {
            return false;
        }
        self.leds = leds;
        true
    }

    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed_keys
    }

    pub fn repeat_info(&self) -> (i32, i32) {
        (self.repeat_rate, self.repeat_delay)
    }

    pub fn keymap_string(&self) -> Option<String> {
        self.xkb
            .as_ref()
            .map(|x| x.keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1))
    }

    #[cfg(test)]
    pub(crate) fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }
}

impl fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyboard")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_keymap", &self.xkb.is_some())
            .field("pressed_keys", &self.pressed_keys)
            .field("modifiers", &self.modifiers)
            .field("leds", &self.leds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_LEFTALT: u32 = 56;
    const KEY_TAB: u32 = 15;

    #[test]
    fn test_key_press_release_without_keymap() {
        let mut keyboard = Keyboard::without_keymap(DeviceId(1), "kbd");

        let (event, mods) = keyboard.feed(10, 30, true);
        assert!(event.syms.is_empty());
        assert!(mods.is_none());
        assert_eq!(keyboard.pressed_keys(), &[30]);

        // Repeated press does not duplicate the key
        keyboard.feed(11, 30, true);
        assert_eq!(keyboard.pressed_keys(), &[30]);

        keyboard.feed(12, 30, false);
        assert!(keyboard.pressed_keys().is_empty());
    }

    #[test]
    fn test_event_carries_modifiers_in_effect() {
        let mut keyboard = Keyboard::without_keymap(DeviceId(1), "kbd");
        keyboard.set_modifiers(Modifiers::ALT);
        let (event, _) = keyboard.feed(0, KEY_TAB, true);
        assert_eq!(event.modifiers, Modifiers::ALT);
    }

    #[test]
    fn test_sync_leds() {
        let mut keyboard = Keyboard::without_keymap(DeviceId(1), "kbd");
        assert!(keyboard.sync_leds(Leds::CAPS_LOCK));
        assert!(!keyboard.sync_leds(Leds::CAPS_LOCK));
        assert_eq!(keyboard.leds(), Leds::CAPS_LOCK);
    }

    #[test]
    fn test_binding_mask_ignores_locks() {
        let held = Modifiers::ALT | Modifiers::CAPS | Modifiers::MOD2;
        assert_eq!(held & Modifiers::BINDING_MASK, Modifiers::ALT);
    }

    #[test]
    fn test_alt_tab_resolves_with_system_keymap() {
        // Needs xkeyboard-config data; skipped where it is not installed
        let mut keyboard = Keyboard::new(DeviceId(1), "kbd", "us");
        if !keyboard.has_keymap() {
            return;
        }
        let (_, mods) = keyboard.feed(0, KEY_LEFTALT, true);
        assert!(mods.is_some());
        let (event, _) = keyboard.feed(1, KEY_TAB, true);
        assert_eq!(event.modifiers, Modifiers::ALT);
        assert_eq!(event.syms, vec![xkb::keysyms::KEY_Tab]);
        assert!(keyboard.keymap_string().is_some());
    }
}
