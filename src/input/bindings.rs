//! Compositor keybindings
//!
//! A table from modifier mask + keysym to an action. Matching keys are
//! consumed by the compositor and never reach clients.

use xkbcommon::xkb::keysyms;

use crate::input::keyboard::Modifiers;

/// What a keybinding does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Focus the least recently focused window
    Cycle,
    /// Ask the focused toplevel to close
    CloseFocused,
    /// Run a shell command
    Spawn(String),
    /// Stop the compositor
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub modifiers: Modifiers,
    pub keysym: u32,
    pub action: Action,
}

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table
    pub fn defaults(terminal: &str) -> Self {
        let mut bindings = Self::new();
        bindings.add(Modifiers::ALT, keysyms::KEY_Tab, Action::Cycle);
        bindings.add(Modifiers::ALT, keysyms::KEY_F4, Action::CloseFocused);
        bindings.add(
            Modifiers::ALT,
            keysyms::KEY_Return,
            Action::Spawn(terminal.to_string()),
        );
        bindings.add(Modifiers::ALT, keysyms::KEY_Escape, Action::Terminate);
        bindings
    }

    /// Add a binding; a later binding for the same chord replaces the
    /// earlier one
    pub fn add(&mut self, modifiers: Modifiers, keysym: u32, action: Action) {
        let modifiers = modifiers & Modifiers::BINDING_MASK;
        self.entries
            .retain(|b| !(b.modifiers == modifiers && b.keysym == keysym));
        self.entries.push(Binding {
            modifiers,
            keysym,
            action,
        });
    }

    /// Action for a chord; lock modifiers are ignored
    pub fn lookup(&self, modifiers: Modifiers, keysym: u32) -> Option<&Action> {
        let modifiers = modifiers & Modifiers::BINDING_MASK;
        self.entries
            .iter()
            .find(|b| b.modifiers == modifiers && b.keysym == keysym)
            .map(|b| &b.action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
