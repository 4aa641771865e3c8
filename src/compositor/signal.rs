//! Event subscriptions
//!
//! Each entity records which protocol signals it is currently listening to.
//! Handlers for a signal that is not connected drop the event, which is how
//! an unmapped client is kept from driving window-management side effects.

use log::trace;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Signals: u32 {
        const DESTROY = 1 << 0;
        const MAP = 1 << 1;
        const UNMAP = 1 << 2;
        const COMMIT = 1 << 3;
        const REQUEST_MOVE = 1 << 4;
        const REQUEST_RESIZE = 1 << 5;
        const REQUEST_MAXIMIZE = 1 << 6;
        const REQUEST_FULLSCREEN = 1 << 7;
        const REQUEST_MINIMIZE = 1 << 8;
        const NEW_POPUP = 1 << 9;
        const REPOSITION = 1 << 10;
    }
}

impl Signals {
    /// Signals every toplevel listens to for its whole life
    pub const TOPLEVEL_BASE: Signals = Signals::DESTROY.union(Signals::MAP).union(Signals::UNMAP);

    /// Signals a toplevel additionally listens to while mapped
    pub const TOPLEVEL_MAPPED: Signals = Signals::COMMIT
        .union(Signals::REQUEST_MOVE)
        .union(Signals::REQUEST_RESIZE)
        .union(Signals::REQUEST_MAXIMIZE)
        .union(Signals::REQUEST_FULLSCREEN)
        .union(Signals::REQUEST_MINIMIZE)
        .union(Signals::NEW_POPUP);

    pub const LAYER_BASE: Signals = Signals::TOPLEVEL_BASE;
    pub const LAYER_MAPPED: Signals = Signals::COMMIT.union(Signals::NEW_POPUP);

    pub const POPUP_BASE: Signals = Signals::DESTROY
        .union(Signals::COMMIT)
        .union(Signals::REPOSITION)
        .union(Signals::NEW_POPUP);
}

/// The set of signals an entity is subscribed to
#[derive(Debug, Clone, Copy, Default)]
pub struct Listeners {
    connected: Signals,
}

impl Listeners {
    pub fn new(initial: Signals) -> Self {
        Self { connected: initial }
    }

    pub fn connect(&mut self, signals: Signals) {
        self.connected.insert(signals);
    }

    pub fn disconnect(&mut self, signals: Signals) {
        self.connected.remove(signals);
    }

    /// Drop every subscription, done first on a terminal event
    pub fn disconnect_all(&mut self) {
        self.connected = Signals::empty();
    }

    pub fn is_connected(&self, signal: Signals) -> bool {
        self.connected.contains(signal)
    }

    /// Check a subscription before routing, logging dropped events
    pub fn accepts(&self, signal: Signals, who: &dyn std::fmt::Debug) -> bool {
        let ok = self.is_connected(signal);
        if !ok {
            trace!("Dropping {:?} for {:?}: not subscribed", signal, who);
        }
        ok
    }

    pub fn connected(&self) -> Signals {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect() {
        let mut listeners = Listeners::new(Signals::TOPLEVEL_BASE);
        assert!(listeners.is_connected(Signals::DESTROY));
        assert!(!listeners.is_connected(Signals::COMMIT));

        listeners.connect(Signals::TOPLEVEL_MAPPED);
        assert!(listeners.is_connected(Signals::REQUEST_MOVE));

        listeners.disconnect(Signals::TOPLEVEL_MAPPED);
        assert!(!listeners.is_connected(Signals::REQUEST_MOVE));
        assert!(listeners.is_connected(Signals::MAP));

        listeners.disconnect_all();
        assert!(listeners.connected().is_empty());
    }

    #[test]
    fn test_accepts_reports_subscription() {
        let listeners = Listeners::new(Signals::DESTROY);
        assert!(listeners.accepts(Signals::DESTROY, &"toplevel"));
        assert!(!listeners.accepts(Signals::COMMIT, &"toplevel"));
    }
}
