//! Pointer interaction state machine
//!
//! The seat is always in exactly one [`InteractionState`]. Switching
//! states tears the old one down before the new one is set up, so every
//! side effect of leaving a state (configure without the resizing flag,
//! cursor image resets) is emitted ahead of those of entering the next.
//!
//! This module also routes pointer events: in passthrough they go to the
//! surface under the cursor, during an implicit grab to the grabbed
//! surface, and while moving or resizing they drive the window instead.

use log::{debug, trace};

use crate::compositor::geometry::{Point, Rect};
use crate::compositor::scene::NodeOwner;
use crate::compositor::signal::Signals;
use crate::compositor::{CompositorState, PopupParent, SurfaceId, ToplevelId};
use crate::input::cursor::{DEFAULT_IMAGE, GRAB_IMAGE};
use crate::input::devices::DeviceId;
use crate::input::pointer::{AxisEvent, GestureEvent};
use crate::protocol::Notification;

bitflags::bitflags! {
    /// Window edges grabbed by an interactive resize, with
    /// xdg_toplevel.resize_edge's bit values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Edges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

impl Edges {
    /// At least one edge, and never two opposite ones
    pub fn is_valid(self) -> bool {
        !self.is_empty()
            && !self.contains(Edges::TOP | Edges::BOTTOM)
            && !self.contains(Edges::LEFT | Edges::RIGHT)
    }

    pub fn cursor_image(self) -> &'static str {
        match (
            self.contains(Edges::TOP),
            self.contains(Edges::BOTTOM),
            self.contains(Edges::LEFT),
            self.contains(Edges::RIGHT),
        ) {
            (true, _, true, _) => "top_left_corner",
            (true, _, _, true) => "top_right_corner",
            (_, true, true, _) => "bottom_left_corner",
            (_, true, _, true) => "bottom_right_corner",
            (true, ..) => "top_side",
            (_, true, ..) => "bottom_side",
            (_, _, true, _) => "left_side",
            _ => "right_side",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    /// Pointer events go to whatever is under the cursor
    Passthrough,
    /// A button is held over a surface; events stay with it until every
    /// button is released
    ImplicitGrab {
        surface: SurfaceId,
        /// Layout position of the surface origin at press time
        origin: (f64, f64),
    },
    /// Interactive move; `grab` is the cursor minus the window origin
    Move { toplevel: ToplevelId, grab: (f64, f64) },
    /// Interactive resize; `grab` is the cursor minus the grabbed border
    Resize {
        toplevel: ToplevelId,
        edges: Edges,
        grab: (f64, f64),
        initial: Rect,
    },
}

impl InteractionState {
    /// Move and resize bind the pointer to a window
    pub fn is_binding(&self) -> bool {
        matches!(self, InteractionState::Move { .. } | InteractionState::Resize { .. })
    }

    /// Whether clients see pointer events in this state
    pub fn delivers_events(&self) -> bool {
        matches!(
            self,
            InteractionState::Passthrough | InteractionState::ImplicitGrab { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Passthrough => "passthrough",
            InteractionState::ImplicitGrab { .. } => "implicit-grab",
            InteractionState::Move { .. } => "move",
            InteractionState::Resize { .. } => "resize",
        }
    }
}

/// New window box while dragging `edges` of `initial` so that the grabbed
/// border sits at `border`. Each dimension stays at least one pixel.
pub fn resize_box(initial: Rect, edges: Edges, border: (f64, f64)) -> Rect {
    let (border_x, border_y) = (border.0.floor() as i32, border.1.floor() as i32);
    let (mut left, mut right) = (initial.x, initial.right());
    let (mut top, mut bottom) = (initial.y, initial.bottom());

    if edges.contains(Edges::TOP) {
        top = border_y.min(bottom - 1);
    } else if edges.contains(Edges::BOTTOM) {
        bottom = border_y.max(top + 1);
    }
    if edges.contains(Edges::LEFT) {
        left = border_x.min(right - 1);
    } else if edges.contains(Edges::RIGHT) {
        right = border_x.max(left + 1);
    }
    Rect::new(left, top, right - left, bottom - top)
}

impl CompositorState {
    // ========================================================================
    // State transitions
    // ========================================================================

    pub(crate) fn set_interaction(&mut self, next: InteractionState) {
        let prev = self.seat.interaction;
        self.disable_interaction(prev);
        self.seat.interaction = next;
        debug!("Interaction {} -> {}", prev.name(), next.name());
        self.enable_interaction(next);
    }

    /// Return to passthrough; does nothing if already there
    pub(crate) fn end_interaction(&mut self) {
        if self.seat.interaction != InteractionState::Passthrough {
            self.set_interaction(InteractionState::Passthrough);
        }
    }

    fn disable_interaction(&mut self, state: InteractionState) {
        if let InteractionState::Resize { toplevel, .. } = state {
            if let Some(t) = self.windows.toplevel_mut(toplevel) {
                let configure = t.role.set_resizing(toplevel, false);
                self.notify(configure);
            }
        }
    }

    fn enable_interaction(&mut self, state: InteractionState) {
        match state {
            InteractionState::Passthrough => self.rebase_pointer(),
            InteractionState::ImplicitGrab { .. } => {}
            InteractionState::Move { .. } => {
                self.clear_pointer_focus();
                self.set_cursor_image(Some(GRAB_IMAGE));
            }
            InteractionState::Resize { toplevel, edges, .. } => {
                self.clear_pointer_focus();
                self.set_cursor_image(Some(edges.cursor_image()));
                if let Some(t) = self.windows.toplevel_mut(toplevel) {
                    let configure = t.role.set_resizing(toplevel, true);
                    self.notify(configure);
                }
            }
        }
    }

    /// End any interaction tied to a surface that is going away
    pub(crate) fn end_interactions_for_surface(&mut self, surface: SurfaceId) {
        let ends = match self.seat.interaction {
            InteractionState::ImplicitGrab { surface: grabbed, .. } => grabbed == surface,
            InteractionState::Move { toplevel, .. } | InteractionState::Resize { toplevel, .. } => self
                .windows
                .toplevel(toplevel)
                .is_some_and(|t| t.surface == surface),
            InteractionState::Passthrough => false,
        };
        if ends {
            self.end_interaction();
        }
    }

    /// End any interaction tied to a toplevel or one of its popups
    pub(crate) fn end_interactions_for_toplevel(&mut self, id: ToplevelId) {
        let ends = match self.seat.interaction {
            InteractionState::Move { toplevel, .. } | InteractionState::Resize { toplevel, .. } => toplevel == id,
            InteractionState::ImplicitGrab { surface, .. } => match self.windows.owner_of_surface(surface) {
                Some(NodeOwner::Toplevel(owner)) => owner == id,
                Some(NodeOwner::Popup(popup)) => self
                    .windows
                    .popup(popup)
                    .is_some_and(|p| p.parent == PopupParent::Toplevel(id)),
                _ => false,
            },
            InteractionState::Passthrough => false,
        };
        if ends {
            self.end_interaction();
        }
    }

    // ========================================================================
    // Move and resize requests
    // ========================================================================

    /// A window may be bound to the pointer only from passthrough, while a
    /// button is held and the window is focused and neither maximized nor
    /// fullscreen
    fn binding_enter_check(&self, id: ToplevelId) -> bool {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return false;
        };
        !self.seat.interaction.is_binding()
            && self.seat.cursor.pressed_count() > 0
            && !toplevel.is_pinned()
            && self.windows.focused_toplevel() == Some(id)
    }

    pub fn toplevel_request_move(&mut self, id: ToplevelId, serial: u32) {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return;
        };
        if !toplevel.listeners.accepts(Signals::REQUEST_MOVE, &id) {
            return;
        }
        if !self.binding_enter_check(id) {
            debug!("Refusing interactive move of {}", toplevel.display_name());
            return;
        }
        trace!("Move of {:?} with serial {}", id, serial);
        let origin = toplevel.position();
        let (x, y) = self.seat.cursor.position();
        self.set_interaction(InteractionState::Move {
            toplevel: id,
            grab: (x - origin.x as f64, y - origin.y as f64),
        });
    }

    pub fn toplevel_request_resize(&mut self, id: ToplevelId, serial: u32, edges: Edges) {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return;
        };
        if !toplevel.listeners.accepts(Signals::REQUEST_RESIZE, &id) {
            return;
        }
        if !edges.is_valid() || !self.binding_enter_check(id) {
            debug!("Refusing interactive resize of {} ({:?})", toplevel.display_name(), edges);
            return;
        }
        trace!("Resize of {:?} with serial {}", id, serial);
        let initial = toplevel.geometry;
        let border_x = initial.x + if edges.contains(Edges::RIGHT) { initial.width } else { 0 };
        let border_y = initial.y + if edges.contains(Edges::BOTTOM) { initial.height } else { 0 };
        let (x, y) = self.seat.cursor.position();
        self.set_interaction(InteractionState::Resize {
            toplevel: id,
            edges,
            grab: (x - border_x as f64, y - border_y as f64),
            initial,
        });
    }

    fn move_toplevel_to(&mut self, id: ToplevelId, position: Point) {
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.geometry.x = position.x;
        toplevel.geometry.y = position.y;
        let tree = toplevel.scene_tree;
        self.scene.set_position(tree, position);
        self.reconstrain_popups(PopupParent::Toplevel(id));
    }

    fn resize_toplevel_to(&mut self, id: ToplevelId, edges: Edges, rect: Rect) {
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        let size = toplevel.clamp_size(rect.size());
        let x = if edges.contains(Edges::LEFT) {
            rect.right() - size.width
        } else {
            rect.x
        };
        let y = if edges.contains(Edges::TOP) {
            rect.bottom() - size.height
        } else {
            rect.y
        };
        toplevel.geometry = Rect::new(x, y, size.width, size.height);
        let configure = toplevel.role.set_size(id, size);
        let tree = toplevel.scene_tree;
        self.scene.set_position(tree, Point::new(x, y));
        self.notify(configure);
        self.reconstrain_popups(PopupParent::Toplevel(id));
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    /// Show the cursor on the first real pointer event. Returns true when
    /// it was hidden until now.
    fn ensure_cursor(&mut self) -> bool {
        if !self.seat.cursor.enable() {
            return false;
        }
        if self.seat.cursor.set_image(Some(DEFAULT_IMAGE)) {
            self.notify(Notification::CursorImage {
                name: Some(DEFAULT_IMAGE),
            });
        }
        true
    }

    /// Enable the cursor for an event that does not move it, entering the
    /// surface under it first
    fn wake_cursor(&mut self) {
        if self.ensure_cursor() {
            self.rebase_pointer();
        }
    }

    pub(crate) fn disable_cursor(&mut self) {
        self.end_interaction();
        self.end_drag();
        if self.seat.cursor.disable() {
            self.notify(Notification::CursorImage { name: None });
            self.clear_pointer_focus();
        }
    }

    fn set_cursor_image(&mut self, name: Option<&'static str>) {
        if self.seat.cursor.is_enabled() && self.seat.cursor.set_image(name) {
            self.notify(Notification::CursorImage { name });
        }
    }

    /// The focused client set its own cursor surface
    pub fn client_cursor_set(&mut self) {
        if self.seat.interaction.delivers_events() {
            self.seat.cursor.set_image(None);
        }
    }

    fn clear_pointer_focus(&mut self) {
        let change = self.seat.set_pointer_focus(None);
        if let Some(old) = change.old_focus {
            let serial = self.next_serial();
            self.notify(Notification::PointerLeave { surface: old, serial });
        }
    }

    /// Re-evaluate what is under the cursor after the scene changed
    pub fn rebase_pointer(&mut self) {
        if self.seat.cursor.is_enabled() && self.seat.interaction == InteractionState::Passthrough {
            self.route_pointer(0);
        }
    }

    fn route_pointer(&mut self, time: u32) {
        let (x, y) = self.seat.cursor.position();
        let Some(hit) = self.scene.node_at(x, y) else {
            self.clear_pointer_focus();
            self.set_cursor_image(Some(DEFAULT_IMAGE));
            return;
        };
        let change = self.seat.set_pointer_focus(Some(hit.surface));
        if change.changed() {
            if let Some(old) = change.old_focus {
                let serial = self.next_serial();
                self.notify(Notification::PointerLeave { surface: old, serial });
            }
            let serial = self.next_serial();
            self.notify(Notification::PointerEnter {
                surface: hit.surface,
                serial,
                x: hit.local_x,
                y: hit.local_y,
            });
        } else {
            self.notify(Notification::PointerMotion {
                surface: hit.surface,
                time,
                x: hit.local_x,
                y: hit.local_y,
            });
        }
    }

    /// Surface receiving pointer events right now, if any
    fn pointer_target(&self) -> Option<SurfaceId> {
        match self.seat.interaction {
            InteractionState::Passthrough => self.seat.pointer_focus(),
            InteractionState::ImplicitGrab { surface, .. } => Some(surface),
            _ => None,
        }
    }

    // ========================================================================
    // Pointer events
    // ========================================================================

    pub fn pointer_motion(&mut self, device: DeviceId, time: u32, dx: f64, dy: f64) {
        let Some(pointer) = self.devices.pointer(device) else {
            trace!("Motion from unknown pointer {:?}", device);
            return;
        };
        let (dx, dy) = pointer.relative(dx, dy);
        let (x, y) = self.seat.cursor.position();
        self.warp_cursor(time, x + dx, y + dy);
    }

    /// Absolute motion with coordinates normalised to [0, 1] over the
    /// primary output
    pub fn pointer_motion_absolute(&mut self, device: DeviceId, time: u32, x: f64, y: f64) {
        let bounds = self
            .outputs
            .primary()
            .and_then(|o| self.outputs.get(o))
            .map(|o| o.geometry())
            .unwrap_or_default();
        let Some(pointer) = self.devices.pointer(device) else {
            trace!("Motion from unknown pointer {:?}", device);
            return;
        };
        let (x, y) = pointer.absolute(x, y, bounds);
        self.warp_cursor(time, x, y);
    }

    fn warp_cursor(&mut self, time: u32, x: f64, y: f64) {
        self.ensure_cursor();
        let (x, y) = self.outputs.clamp_to_layout(x, y);
        self.seat.cursor.set_position(x, y);
        self.move_drag_icon();

        match self.seat.interaction {
            InteractionState::Passthrough => self.route_pointer(time),
            InteractionState::ImplicitGrab { surface, origin } => {
                self.notify(Notification::PointerMotion {
                    surface,
                    time,
                    x: x - origin.0,
                    y: y - origin.1,
                });
            }
            InteractionState::Move { toplevel, grab } => {
                self.move_toplevel_to(toplevel, Point::from_f64(x - grab.0, y - grab.1));
            }
            InteractionState::Resize {
                toplevel,
                edges,
                grab,
                initial,
            } => {
                let rect = resize_box(initial, edges, (x - grab.0, y - grab.1));
                self.resize_toplevel_to(toplevel, edges, rect);
            }
        }
    }

    pub fn pointer_button(&mut self, device: DeviceId, time: u32, button: u32, pressed: bool) {
        if self.devices.pointer(device).is_none() {
            trace!("Button from unknown pointer {:?}", device);
            return;
        }
        self.wake_cursor();
        if !self.seat.cursor.button(button, pressed) {
            trace!("Ignoring repeated button {:#x} pressed={}", button, pressed);
            return;
        }
        let released_all = self.seat.cursor.pressed_count() == 0;

        match self.seat.interaction {
            InteractionState::Passthrough => {
                if pressed {
                    self.focus_under_cursor();
                }
                if let Some(surface) = self.seat.pointer_focus() {
                    self.send_button(surface, time, button, pressed);
                    if pressed {
                        let origin = self.surface_origin(surface);
                        self.set_interaction(InteractionState::ImplicitGrab { surface, origin });
                    }
                }
            }
            InteractionState::ImplicitGrab { surface, .. } => {
                self.send_button(surface, time, button, pressed);
                if released_all {
                    self.end_interaction();
                }
            }
            InteractionState::Move { .. } | InteractionState::Resize { .. } => {
                if released_all {
                    self.end_interaction();
                }
            }
        }

        if released_all && self.dragging() {
            self.end_drag();
        }
    }

    fn send_button(&mut self, surface: SurfaceId, time: u32, button: u32, pressed: bool) {
        let serial = self.next_serial();
        if pressed {
            self.seat.cursor.set_last_press_serial(serial);
        }
        self.notify(Notification::PointerButton {
            surface,
            serial,
            time,
            button,
            pressed,
        });
    }

    /// Layout position of a surface's origin, falling back to the cursor
    fn surface_origin(&self, surface: SurfaceId) -> (f64, f64) {
        self.surface_node(surface)
            .and_then(|node| self.scene.global_position(node))
            .map(|p| (p.x as f64, p.y as f64))
            .unwrap_or_else(|| self.seat.cursor.position())
    }

    /// Click-to-focus for whatever is under the cursor
    fn focus_under_cursor(&mut self) {
        let (x, y) = self.seat.cursor.position();
        let Some(hit) = self.scene.node_at(x, y) else {
            return;
        };
        let toplevel = match self.scene.owner_from_node(hit.node) {
            Some(NodeOwner::Toplevel(id)) => Some(id),
            Some(NodeOwner::Popup(popup)) => match self.windows.popup(popup).map(|p| p.parent) {
                Some(PopupParent::Toplevel(id)) => Some(id),
                _ => None,
            },
            Some(NodeOwner::Layer(id)) => {
                self.focus_layer(id);
                None
            }
            _ => None,
        };
        if let Some(id) = toplevel {
            let released = self.release_on_demand_layer();
            self.focus_toplevel(id);
            if released {
                self.restore_keyboard_focus();
            }
        }
    }

    pub fn pointer_axis(&mut self, device: DeviceId, event: AxisEvent) {
        let Some(pointer) = self.devices.pointer(device) else {
            return;
        };
        let event = pointer.axis(event);
        self.wake_cursor();
        if let Some(surface) = self.pointer_target() {
            self.notify(Notification::PointerAxis { surface, event });
        }
    }

    pub fn pointer_frame(&mut self, device: DeviceId) {
        if self.devices.pointer(device).is_none() {
            return;
        }
        if let Some(surface) = self.pointer_target() {
            self.notify(Notification::PointerFrame { surface });
        }
    }

    pub fn pointer_gesture(&mut self, device: DeviceId, event: GestureEvent) {
        if self.devices.pointer(device).is_none() {
            return;
        }
        self.wake_cursor();
        if let Some(surface) = self.pointer_target() {
            let serial = self.next_serial();
            self.notify(Notification::Gesture { surface, serial, event });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::state::tests::{attach, map_toplevel, state_with_output};
    use crate::compositor::ToplevelStates;
    use crate::input::devices::{DeviceClass, DeviceInfo};
    use crate::input::pointer::{Axis, AxisSource, BTN_LEFT};

    fn with_pointer(state: &mut CompositorState) -> DeviceId {
        let mouse = state
            .devices
            .add_without_keymap(DeviceInfo::new("mouse", DeviceClass::Pointer));
        state.update_capabilities();
        mouse
    }

    #[test]
    fn test_resize_box_edges() {
        let initial = Rect::new(100, 100, 200, 100);
        assert_eq!(
            resize_box(initial, Edges::BOTTOM | Edges::RIGHT, (350.0, 250.0)),
            Rect::new(100, 100, 250, 150)
        );
        assert_eq!(
            resize_box(initial, Edges::TOP | Edges::LEFT, (50.0, 80.0)),
            Rect::new(50, 80, 250, 120)
        );
    }

    #[test]
    fn test_resize_box_never_collapses() {
        let initial = Rect::new(100, 100, 200, 100);
        let rect = resize_box(initial, Edges::LEFT, (900.0, 0.0));
        assert_eq!(rect, Rect::new(299, 100, 1, 100));
        let rect = resize_box(initial, Edges::BOTTOM, (0.0, -500.0));
        assert_eq!(rect.height, 1);
    }

    #[test]
    fn test_edges() {
        assert!(Edges::TOP.is_valid());
        assert!(!Edges::empty().is_valid());
        assert!(!(Edges::LEFT | Edges::RIGHT).is_valid());
        assert_eq!((Edges::BOTTOM | Edges::RIGHT).cursor_image(), "bottom_right_corner");
        assert_eq!(Edges::LEFT.cursor_image(), "left_side");
    }

    #[test]
    fn test_motion_enters_surface_under_cursor() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (_, surface) = map_toplevel(&mut state, 200, 100);
        state.drain_notifications();

        // Cursor starts at the output center, inside the window at (400, 350)
        state.pointer_motion(mouse, 1, 10.0, 0.0);
        let notes = state.drain_notifications();
        assert_eq!(notes[0], Notification::CursorImage { name: Some(DEFAULT_IMAGE) });
        assert!(matches!(
            notes[1],
            Notification::PointerEnter { surface: s, x, y, .. } if s == surface && x == 110.0 && y == 50.0
        ));

        state.pointer_motion(mouse, 2, 1.0, 1.0);
        assert!(matches!(
            state.drain_notifications()[..],
            [Notification::PointerMotion { time: 2, x, y, .. }] if x == 111.0 && y == 51.0
        ));

        state.pointer_motion(mouse, 3, 400.0, 0.0);
        assert_eq!(state.seat.pointer_focus(), None);
    }

    #[test]
    fn test_press_grabs_and_unmap_releases() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (_, surface) = map_toplevel(&mut state, 200, 100);
        state.pointer_motion(mouse, 0, 0.0, 0.0);

        state.pointer_button(mouse, 1, BTN_LEFT, true);
        assert_eq!(
            state.seat.interaction,
            InteractionState::ImplicitGrab {
                surface,
                origin: (400.0, 350.0)
            }
        );

        // Motion outside the window still goes to the grabbed surface
        state.drain_notifications();
        state.pointer_motion(mouse, 2, 450.0, 0.0);
        assert!(matches!(
            state.drain_notifications()[..],
            [Notification::PointerMotion { surface: s, x, .. }] if s == surface && x == 550.0
        ));

        attach(&mut state, surface, None);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
    }

    #[test]
    fn test_release_ends_grab() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        map_toplevel(&mut state, 200, 100);
        state.pointer_motion(mouse, 0, 0.0, 0.0);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        state.pointer_button(mouse, 2, 0x111, true);
        state.pointer_button(mouse, 3, BTN_LEFT, false);
        assert!(matches!(state.seat.interaction, InteractionState::ImplicitGrab { .. }));
        state.pointer_button(mouse, 4, 0x111, false);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
    }

    #[test]
    fn test_click_focuses_toplevel() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (a, _) = map_toplevel(&mut state, 200, 100);
        let (b, _) = map_toplevel(&mut state, 100, 100);
        assert_eq!(state.windows.focused_toplevel(), Some(b));

        // b covers (450, 350)-(550, 450); click the uncovered part of a
        state.pointer_motion(mouse, 0, -80.0, 0.0);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        assert_eq!(state.windows.focused_toplevel(), Some(a));
    }

    #[test]
    fn test_move_follows_cursor() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, _) = map_toplevel(&mut state, 200, 100);
        state.pointer_motion(mouse, 0, 0.0, 0.0);
        state.pointer_button(mouse, 1, BTN_LEFT, true);

        state.toplevel_request_move(id, 1);
        assert!(matches!(state.seat.interaction, InteractionState::Move { .. }));
        assert_eq!(state.seat.pointer_focus(), None);
        assert_eq!(state.seat.cursor.image(), Some(GRAB_IMAGE));

        state.pointer_motion(mouse, 2, 30.0, -20.0);
        assert_eq!(state.windows.toplevel(id).unwrap().geometry.origin(), Point::new(430, 330));

        state.pointer_button(mouse, 3, BTN_LEFT, false);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
        assert!(state.seat.pointer_focus().is_some());
    }

    #[test]
    fn test_binding_gate() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (a, _) = map_toplevel(&mut state, 200, 100);
        let (b, _) = map_toplevel(&mut state, 200, 100);
        state.pointer_button(mouse, 1, BTN_LEFT, true);

        state.toplevel_request_move(a, 1);
        assert!(matches!(state.seat.interaction, InteractionState::ImplicitGrab { .. }));

        state.set_maximized(b, true);
        state.toplevel_request_resize(b, 1, Edges::RIGHT);
        assert!(matches!(state.seat.interaction, InteractionState::ImplicitGrab { .. }));

        state.set_maximized(b, false);
        state.toplevel_request_move(b, 1);
        state.toplevel_request_resize(b, 1, Edges::RIGHT);
        assert!(matches!(state.seat.interaction, InteractionState::Move { .. }));
    }

    #[test]
    fn test_move_request_after_release_is_refused() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, _) = map_toplevel(&mut state, 200, 100);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        state.pointer_button(mouse, 2, BTN_LEFT, false);

        state.toplevel_request_move(id, 1);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
        state.toplevel_request_resize(id, 1, Edges::BOTTOM);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
    }

    #[test]
    fn test_first_press_enters_and_grabs() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (_, surface) = map_toplevel(&mut state, 200, 100);
        state.drain_notifications();

        // No motion yet: the cursor sits hidden at the output center
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        let notes = state.drain_notifications();
        assert_eq!(notes[0], Notification::CursorImage { name: Some(DEFAULT_IMAGE) });
        assert!(matches!(notes[1], Notification::PointerEnter { surface: s, .. } if s == surface));
        assert!(notes
            .iter()
            .any(|n| matches!(n, Notification::PointerButton { surface: s, pressed: true, .. } if *s == surface)));
        assert!(matches!(
            state.seat.interaction,
            InteractionState::ImplicitGrab { surface: s, .. } if s == surface
        ));
    }

    #[test]
    fn test_first_scroll_reaches_surface_under_cursor() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (_, surface) = map_toplevel(&mut state, 200, 100);
        state.drain_notifications();

        let event = AxisEvent {
            time: 1,
            axis: Axis::Vertical,
            source: AxisSource::Wheel,
            delta: 15.0,
            discrete: 1,
        };
        state.pointer_axis(mouse, event);
        let notes = state.drain_notifications();
        assert!(matches!(notes[1], Notification::PointerEnter { surface: s, .. } if s == surface));
        assert_eq!(notes.last(), Some(&Notification::PointerAxis { surface, event }));
    }

    #[test]
    fn test_unmap_during_move_skips_enter() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, surface) = map_toplevel(&mut state, 200, 100);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        state.toplevel_request_move(id, 1);
        assert!(matches!(state.seat.interaction, InteractionState::Move { .. }));
        state.drain_notifications();

        attach(&mut state, surface, None);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
        let notes = state.drain_notifications();
        assert!(!notes
            .iter()
            .any(|n| matches!(n, Notification::PointerEnter { surface: s, .. } if *s == surface)));
        assert_eq!(state.seat.pointer_focus(), None);
    }

    #[test]
    fn test_resize_clamps_and_disables_before_enable() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, _) = map_toplevel(&mut state, 200, 100);
        // Grab the left border at (400, 400)
        state.pointer_motion(mouse, 0, -100.0, 0.0);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        state.toplevel_request_resize(id, 1, Edges::LEFT);
        assert!(state
            .windows
            .toplevel(id)
            .unwrap()
            .role
            .states()
            .contains(ToplevelStates::RESIZING));

        state.pointer_motion(mouse, 2, 500.0, 0.0);
        let geometry = state.windows.toplevel(id).unwrap().geometry;
        assert_eq!(geometry, Rect::new(599, 350, 1, 100));

        state.drain_notifications();
        state.pointer_button(mouse, 3, BTN_LEFT, false);
        let notes = state.drain_notifications();
        assert!(matches!(
            notes[0],
            Notification::ToplevelConfigure { states, .. } if !states.contains(ToplevelStates::RESIZING)
        ));
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
    }

    #[test]
    fn test_resize_honours_min_size() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, _) = map_toplevel(&mut state, 200, 100);
        state.windows.toplevel_mut(id).unwrap().set_min_size(150, 50);
        state.pointer_motion(mouse, 0, -100.0, 0.0);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        state.toplevel_request_resize(id, 1, Edges::LEFT);

        state.pointer_motion(mouse, 2, 150.0, 0.0);
        let geometry = state.windows.toplevel(id).unwrap().geometry;
        assert_eq!(geometry.width, 150);
        assert_eq!(geometry.right(), 600);
    }

    #[test]
    fn test_events_withheld_while_binding() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, _) = map_toplevel(&mut state, 200, 100);
        state.pointer_motion(mouse, 0, 0.0, 0.0);
        state.pointer_button(mouse, 1, BTN_LEFT, true);
        state.toplevel_request_move(id, 1);
        state.drain_notifications();

        state.pointer_frame(mouse);
        state.pointer_gesture(mouse, GestureEvent::HoldBegin { time: 0, fingers: 3 });
        assert!(state.drain_notifications().is_empty());
    }
}
