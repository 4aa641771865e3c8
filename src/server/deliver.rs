//! Notification delivery
//!
//! Turns the core's queued [`Notification`]s into protocol events. Seat
//! events go to every pointer, keyboard or gesture object owned by the
//! client of the target surface. Pointer events outside a backend frame
//! get a closing `frame` of their own.

use log::{debug, trace};
use wayland_protocols::xdg::shell::server::xdg_toplevel;
use wayland_server::protocol::wl_surface::WlSurface;
use wayland_server::protocol::{wl_keyboard, wl_pointer, wl_seat};
use wayland_server::Resource;

use crate::compositor::ToplevelStates;
use crate::input::pointer::{Axis, AxisEvent, AxisSource, GestureEvent};
use crate::protocol::Notification;

use super::ServerState;

/// xdg_toplevel state array, as native-endian u32 values
pub(super) fn encode_states(states: ToplevelStates) -> Vec<u8> {
    [
        (ToplevelStates::MAXIMIZED, xdg_toplevel::State::Maximized),
        (ToplevelStates::FULLSCREEN, xdg_toplevel::State::Fullscreen),
        (ToplevelStates::RESIZING, xdg_toplevel::State::Resizing),
        (ToplevelStates::ACTIVATED, xdg_toplevel::State::Activated),
    ]
    .into_iter()
    .filter(|(flag, _)| states.contains(*flag))
    .flat_map(|(_, state)| (state as u32).to_ne_bytes())
    .collect()
}

fn wire_axis(axis: Axis) -> wl_pointer::Axis {
    match axis {
        Axis::Vertical => wl_pointer::Axis::VerticalScroll,
        Axis::Horizontal => wl_pointer::Axis::HorizontalScroll,
    }
}

fn wire_axis_source(source: AxisSource) -> wl_pointer::AxisSource {
    match source {
        AxisSource::Wheel => wl_pointer::AxisSource::Wheel,
        AxisSource::Finger => wl_pointer::AxisSource::Finger,
        AxisSource::Continuous => wl_pointer::AxisSource::Continuous,
        AxisSource::WheelTilt => wl_pointer::AxisSource::WheelTilt,
    }
}

fn same_client<'a, R: Resource>(objects: &'a [R], surface: &'a WlSurface) -> impl Iterator<Item = &'a R> + 'a {
    objects
        .iter()
        .filter(move |o| o.is_alive() && o.id().same_client_as(&surface.id()))
}

fn send_axis(pointer: &wl_pointer::WlPointer, event: &AxisEvent) {
    let axis = wire_axis(event.axis);
    if pointer.version() >= 5 {
        let source = wire_axis_source(event.source);
        if source != wl_pointer::AxisSource::WheelTilt || pointer.version() >= 6 {
            pointer.axis_source(source);
        }
        if event.delta == 0.0 && event.source == AxisSource::Finger {
            pointer.axis_stop(event.time, axis);
            return;
        }
        if event.discrete != 0 && pointer.version() < 8 {
            pointer.axis_discrete(axis, event.discrete);
        }
    }
    pointer.axis(event.time, axis, event.delta);
}

/// Send a pointer event and remember which pointers still owe a frame
fn for_pointers(
    pointers: &[wl_pointer::WlPointer],
    unframed: &mut Vec<wl_pointer::WlPointer>,
    send: impl Fn(&wl_pointer::WlPointer),
) {
    for pointer in pointers {
        send(pointer);
        if pointer.version() >= 5 && !unframed.contains(pointer) {
            unframed.push(pointer.clone());
        }
    }
}

impl ServerState {
    /// Send every queued notification, in order
    pub fn flush_notifications(&mut self) {
        let notifications = self.compositor.drain_notifications();
        if notifications.is_empty() {
            return;
        }
        let mut unframed: Vec<wl_pointer::WlPointer> = Vec::new();
        for notification in notifications {
            trace!("Delivering {:?}", notification);
            self.deliver(notification, &mut unframed);
        }
        for pointer in unframed {
            pointer.frame();
        }
    }

    fn surface(&self, notification: &Notification) -> Option<WlSurface> {
        let surface = notification.surface()?;
        self.resources.surfaces.get(&surface).filter(|s| s.is_alive()).cloned()
    }

    fn deliver(&mut self, notification: Notification, unframed: &mut Vec<wl_pointer::WlPointer>) {
        if notification.surface().is_some() {
            let Some(surface) = self.surface(&notification) else {
                trace!("Target of {:?} is gone", notification);
                return;
            };
            self.deliver_seat_event(notification, &surface, unframed);
            return;
        }

        match notification {
            Notification::ToplevelConfigure { toplevel, size, states } => {
                if let Some((role, xdg)) = self.resources.toplevels.get(&toplevel) {
                    role.configure(size.width, size.height, encode_states(states));
                    xdg.configure(self.compositor.next_serial());
                }
            }
            Notification::ToplevelClose { toplevel } => {
                if let Some((role, _)) = self.resources.toplevels.get(&toplevel) {
                    role.close();
                }
            }
            Notification::PopupConfigure { popup, geometry } => {
                if let Some((role, xdg)) = self.resources.popups.get(&popup) {
                    role.configure(geometry.x, geometry.y, geometry.width, geometry.height);
                    xdg.configure(self.compositor.next_serial());
                }
            }
            Notification::PopupRepositioned { popup, token } => {
                if let Some((role, _)) = self.resources.popups.get(&popup) {
                    if role.version() >= 3 {
                        role.repositioned(token);
                    }
                }
            }
            Notification::PopupDone { popup } => {
                if let Some((role, _)) = self.resources.popups.get(&popup) {
                    role.popup_done();
                }
            }
            Notification::LayerConfigure { layer, size } => {
                if let Some(role) = self.resources.layers.get(&layer) {
                    let serial = self.compositor.next_serial();
                    role.configure(serial, size.width.max(0) as u32, size.height.max(0) as u32);
                }
            }
            Notification::LayerClosed { layer } => {
                if let Some(role) = self.resources.layers.get(&layer) {
                    role.closed();
                }
            }
            Notification::SeatCapabilities { capabilities } => {
                let capabilities = wl_seat::Capability::from_bits_truncate(capabilities.bits());
                for seat in self.resources.seats.iter().filter(|s| s.is_alive()) {
                    seat.capabilities(capabilities);
                }
            }
            Notification::CursorImage { name } => {
                // Nothing draws a cursor without an output device
                trace!("Cursor image {:?}", name);
            }
            Notification::KeyboardLeds { device, leds } => {
                trace!("Keyboard {:?} LEDs {:?}", device, leds);
            }
            Notification::DataSourceCancelled { source } => {
                if let Some(source) = self.resources.data_sources.get(&source) {
                    source.cancelled();
                }
            }
            Notification::Spawn { command } => self.spawn(&command),
            Notification::Terminate => {
                debug!("Terminating");
                self.loop_signal.stop();
            }
            other => trace!("Unroutable notification {:?}", other),
        }
    }

    fn deliver_seat_event(
        &mut self,
        notification: Notification,
        surface: &WlSurface,
        unframed: &mut Vec<wl_pointer::WlPointer>,
    ) {
        let pointers: Vec<_> = same_client(&self.resources.pointers, surface).cloned().collect();

        match notification {
            Notification::PointerEnter { serial, x, y, .. } => {
                for_pointers(&pointers, unframed, |p| p.enter(serial, surface, x, y));
            }
            Notification::PointerLeave { serial, .. } => {
                for_pointers(&pointers, unframed, |p| p.leave(serial, surface));
            }
            Notification::PointerMotion { time, x, y, .. } => {
                for_pointers(&pointers, unframed, |p| p.motion(time, x, y));
            }
            Notification::PointerButton {
                serial,
                time,
                button,
                pressed,
                ..
            } => {
                let state = if pressed {
                    wl_pointer::ButtonState::Pressed
                } else {
                    wl_pointer::ButtonState::Released
                };
                for_pointers(&pointers, unframed, |p| p.button(serial, time, button, state));
            }
            Notification::PointerAxis { event, .. } => {
                for_pointers(&pointers, unframed, |p| send_axis(p, &event));
            }
            Notification::PointerFrame { .. } => {
                for pointer in pointers.iter().filter(|p| p.version() >= 5) {
                    pointer.frame();
                }
                unframed.retain(|p| !pointers.contains(p));
            }
            Notification::KeyboardEnter { serial, .. } => {
                for keyboard in same_client(&self.resources.keyboards, surface) {
                    keyboard.enter(serial, surface, Vec::new());
                }
            }
            Notification::KeyboardLeave { serial, .. } => {
                for keyboard in same_client(&self.resources.keyboards, surface) {
                    keyboard.leave(serial, surface);
                }
            }
            Notification::KeyboardKey {
                serial,
                time,
                key,
                pressed,
                ..
            } => {
                let state = if pressed {
                    wl_keyboard::KeyState::Pressed
                } else {
                    wl_keyboard::KeyState::Released
                };
                for keyboard in same_client(&self.resources.keyboards, surface) {
                    keyboard.key(serial, time, key, state);
                }
            }
            Notification::KeyboardModifiers { serial, state, .. } => {
                for keyboard in same_client(&self.resources.keyboards, surface) {
                    keyboard.modifiers(serial, state.depressed, state.latched, state.locked, state.group);
                }
            }
            Notification::Gesture { serial, event, .. } => self.deliver_gesture(serial, event, surface),
            other => trace!("Not a seat event: {:?}", other),
        }
    }

    fn deliver_gesture(&self, serial: u32, event: GestureEvent, surface: &WlSurface) {
        let swipes = || same_client(&self.resources.swipes, surface);
        let pinches = || same_client(&self.resources.pinches, surface);
        let holds = || same_client(&self.resources.holds, surface);
        match event {
            GestureEvent::SwipeBegin { time, fingers } => swipes().for_each(|g| g.begin(serial, time, surface, fingers)),
            GestureEvent::SwipeUpdate { time, dx, dy } => swipes().for_each(|g| g.update(time, dx, dy)),
            GestureEvent::SwipeEnd { time, cancelled } => {
                swipes().for_each(|g| g.end(serial, time, i32::from(cancelled)))
            }
            GestureEvent::PinchBegin { time, fingers } => pinches().for_each(|g| g.begin(serial, time, surface, fingers)),
            GestureEvent::PinchUpdate {
                time,
                dx,
                dy,
                scale,
                rotation,
            } => pinches().for_each(|g| g.update(time, dx, dy, scale, rotation)),
            GestureEvent::PinchEnd { time, cancelled } => {
                pinches().for_each(|g| g.end(serial, time, i32::from(cancelled)))
            }
            GestureEvent::HoldBegin { time, fingers } => holds().for_each(|g| g.begin(serial, time, surface, fingers)),
            GestureEvent::HoldEnd { time, cancelled } => holds().for_each(|g| g.end(serial, time, i32::from(cancelled))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_states() {
        assert!(encode_states(ToplevelStates::empty()).is_empty());

        let bytes = encode_states(ToplevelStates::ACTIVATED | ToplevelStates::MAXIMIZED);
        let values: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values, vec![1, 4]);
    }

    #[test]
    fn test_wire_axis() {
        assert_eq!(wire_axis(Axis::Vertical), wl_pointer::Axis::VerticalScroll);
        assert_eq!(wire_axis_source(AxisSource::WheelTilt), wl_pointer::AxisSource::WheelTilt);
    }
}
