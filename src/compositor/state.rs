//! Global compositor state
//!
//! `CompositorState` owns every subsystem and implements the window
//! management policy on top of them. Protocol glue calls into it with
//! already-decoded requests and drains the resulting [`Notification`]s
//! afterwards; nothing in here talks to a client directly.
//!
//! Pointer routing and interactive move/resize live in
//! [`crate::input::interaction`].

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, trace, warn};

use crate::compositor::drag::{self, DataSourceId, DragIcon, DragIconId, DragSession};
use crate::compositor::layer::{Band, KeyboardInteractivity, LayerId, LayerSurface};
use crate::compositor::popup::{Popup, PopupId, PopupParent, Positioner};
use crate::compositor::scene::{NodeId, NodeOwner, SceneGraph, SceneLayer};
use crate::compositor::signal::Signals;
use crate::compositor::toplevel::{Toplevel, ToplevelId};
use crate::compositor::{
    OutputDescriptor, OutputError, OutputId, OutputManager, Point, Rect, ShellError, Size, SurfaceId,
    SurfaceManager, SurfaceRole, WindowManager,
};
use crate::config::Config;
use crate::input::bindings::{Action, Bindings};
use crate::input::devices::{DeviceId, DeviceInfo, DeviceRegistry};
use crate::input::keyboard::{KeyEvent, ModifierState};
use crate::input::seat::{Seat, SeatCapabilities};
use crate::protocol::Notification;

/// The global compositor state
pub struct CompositorState {
    /// Surface manager - tracks all wl_surfaces
    pub surfaces: SurfaceManager,

    /// Scene graph - stacking, visibility and hit-testing
    pub scene: SceneGraph,

    /// Output manager - tracks displays and the layout
    pub outputs: OutputManager,

    /// Window manager - toplevels, layers, popups and focus
    pub windows: WindowManager,

    /// Input seat - focus, cursor and the active interaction
    pub seat: Seat,

    /// Attached input devices
    pub devices: DeviceRegistry,

    bindings: Bindings,
    xkb_layout: String,

    /// Keyboard that produced the most recent key event
    active_keyboard: Option<DeviceId>,

    /// In-progress drag-and-drop, if any
    pub(crate) drag: Option<DragSession>,

    notifications: Vec<Notification>,

    /// Serial counter for Wayland events
    serial: AtomicU64,
}

impl CompositorState {
    pub fn new(config: &Config) -> Self {
        Self {
            surfaces: SurfaceManager::new(),
            scene: SceneGraph::new(),
            outputs: OutputManager::new(),
            windows: WindowManager::new(),
            seat: Seat::new(),
            devices: DeviceRegistry::new(),
            bindings: config.bindings(),
            xkb_layout: config.xkb_layout.clone(),
            active_keyboard: None,
            drag: None,
            notifications: Vec::new(),
            serial: AtomicU64::new(1),
        }
    }

    /// Get the next serial number for Wayland events
    pub fn next_serial(&self) -> u32 {
        self.serial.fetch_add(1, Ordering::Relaxed) as u32
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        trace!("Queued {:?}", notification);
        self.notifications.push(notification);
    }

    /// Take every notification produced since the last drain, in order
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn pending_notifications(&self) -> &[Notification] {
        &self.notifications
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    /// Attach an output. The first output also places the cursor at its
    /// center.
    pub fn new_output(&mut self, desc: OutputDescriptor) -> Result<OutputId, OutputError> {
        let registered = self.outputs.register(desc)?;
        if registered.first {
            if let Some(output) = self.outputs.get(registered.id) {
                let center = output.geometry().center();
                self.seat.cursor.set_position(center.x as f64, center.y as f64);
            }
        }
        self.arrange_layers(registered.id);
        Ok(registered.id)
    }

    /// Detach an output. Its layer surfaces are closed and left without an
    /// output; toplevels stay where they are.
    pub fn remove_output(&mut self, id: OutputId) {
        let Some(output) = self.outputs.remove(id) else {
            warn!("Removing unknown output {:?}", id);
            return;
        };
        info!("Output {} removed", output.name);

        for layer_id in output.all_layers() {
            let Some(layer) = self.windows.layer_mut(layer_id) else {
                continue;
            };
            debug!("Layer surface {} lost output {}", layer.namespace, output.name);
            layer.output = None;
            let (tree, surface) = (layer.scene_tree, layer.surface);
            self.scene.set_enabled(tree, false);
            self.dismiss_popups(PopupParent::Layer(layer_id));
            self.end_interactions_for_surface(surface);
            if self.windows.focused_layer() == Some(layer_id) {
                self.unfocus_layer();
            }
            self.notify(Notification::LayerClosed { layer: layer_id });
        }

        if self.seat.interaction.is_binding() {
            self.end_interaction();
        }

        let (x, y) = self.seat.cursor.position();
        let (x, y) = self.outputs.clamp_to_layout(x, y);
        self.seat.cursor.set_position(x, y);

        for other in self.outputs.ids() {
            self.arrange_layers(other);
        }
        self.rebase_pointer();
    }

    /// Place every configured layer surface on an output, band by band, and
    /// recompute the output's usable area
    pub fn arrange_layers(&mut self, output_id: OutputId) {
        let Some(output) = self.outputs.get(output_id) else {
            return;
        };
        let full = output.geometry();
        let mut usable = full;
        let order: Vec<LayerId> = Band::ALL
            .iter()
            .flat_map(|band| output.layers(*band).iter().copied())
            .collect();

        for id in order {
            let Some(layer) = self.windows.layer_mut(id) else {
                continue;
            };
            if !layer.configured {
                continue;
            }
            match layer.arrange(full, &mut usable) {
                Some(rect) => {
                    layer.geometry = rect;
                    let resized = layer.configured_size != Some(rect.size());
                    layer.configured_size = Some(rect.size());
                    let tree = layer.scene_tree;
                    self.scene.set_position(tree, rect.origin());
                    if resized {
                        self.notify(Notification::LayerConfigure {
                            layer: id,
                            size: rect.size(),
                        });
                    }
                    self.reconstrain_popups(PopupParent::Layer(id));
                }
                None => {
                    warn!(
                        "Layer surface {} asked for an impossible size {:?}, closing it",
                        layer.namespace, layer.current.desired_size
                    );
                    self.notify(Notification::LayerClosed { layer: id });
                }
            }
        }

        if let Some(output) = self.outputs.get_mut(output_id) {
            if output.usable_area != usable {
                debug!("Output {} usable area {:?}", output.name, usable);
                output.usable_area = usable;
            }
        }
    }

    /// Output a box mostly sits on, falling back to the primary output
    fn output_for(&self, rect: Rect) -> Option<OutputId> {
        let center = rect.center();
        self.outputs.output_at_or_primary(center.x as f64, center.y as f64)
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    pub fn create_surface(&mut self) -> SurfaceId {
        self.surfaces.create_surface()
    }

    /// Latch a surface's pending state and run its role's commit handling
    pub fn surface_commit(&mut self, surface: SurfaceId) {
        let Some(s) = self.surfaces.get_mut(surface) else {
            warn!("Commit on unknown surface {:?}", surface);
            return;
        };
        let has_buffer = s.commit();
        let size = s.size();

        match self.windows.owner_of_surface(surface) {
            Some(NodeOwner::Toplevel(id)) => self.toplevel_commit(id, has_buffer, size),
            Some(NodeOwner::Layer(id)) => self.layer_commit(id, has_buffer, size),
            Some(NodeOwner::Popup(id)) => self.popup_commit(id, has_buffer, size),
            Some(NodeOwner::DragIcon(id)) => self.drag_icon_commit(id, has_buffer, size),
            None => trace!("Commit on surface {:?} without a role object", surface),
        }
    }

    /// A wl_surface went away. Role objects are normally destroyed first;
    /// clients that skip that are cleaned up here.
    pub fn surface_destroyed(&mut self, surface: SurfaceId) {
        match self.windows.owner_of_surface(surface) {
            Some(NodeOwner::Toplevel(id)) => self.toplevel_destroy(id),
            Some(NodeOwner::Layer(id)) => self.layer_destroy(id),
            Some(NodeOwner::Popup(id)) => self.popup_destroy(id),
            Some(NodeOwner::DragIcon(id)) => self.drag_icon_destroy(id),
            None => {}
        }
        self.end_interactions_for_surface(surface);
        if self.seat.pointer_focus() == Some(surface) {
            self.seat.set_pointer_focus(None);
        }
        if self.seat.keyboard_focus() == Some(surface) {
            self.seat.set_keyboard_focus(None);
        }
        if let Some(session) = self.drag {
            if session.origin == surface {
                self.end_drag();
            }
        }
        self.surfaces.remove(surface);
    }

    /// Scene node showing a surface's content
    pub(crate) fn surface_node(&self, surface: SurfaceId) -> Option<NodeId> {
        match self.windows.owner_of_surface(surface)? {
            NodeOwner::Toplevel(id) => self.windows.toplevel(id).map(|t| t.surface_node),
            NodeOwner::Layer(id) => self.windows.layer(id).map(|l| l.surface_node),
            NodeOwner::Popup(id) => self.windows.popup(id).map(|p| p.surface_node),
            NodeOwner::DragIcon(id) => self.windows.drag_icon(id).map(|i| i.surface_node),
        }
    }

    // ========================================================================
    // Toplevels
    // ========================================================================

    /// Give a surface the toplevel role. The window stays hidden until its
    /// first buffer is committed.
    pub fn new_toplevel(&mut self, surface: SurfaceId) -> Result<ToplevelId, ShellError> {
        self.surfaces.assign_role(surface, SurfaceRole::XdgToplevel)?;
        let tree = self.scene.create_tree(self.scene.layer(SceneLayer::Toplevel))?;
        let node = match self.scene.create_surface(tree, surface, Size::default()) {
            Ok(node) => node,
            Err(e) => {
                self.scene.destroy(tree);
                return Err(e.into());
            }
        };
        self.scene.set_enabled(tree, false);

        let toplevel = Toplevel::new(surface, tree, node);
        let id = toplevel.id;
        self.scene.set_owner(tree, Some(NodeOwner::Toplevel(id)));
        self.windows.insert_toplevel(toplevel);
        debug!("New toplevel {:?} for surface {:?}", id, surface);
        Ok(id)
    }

    fn toplevel_commit(&mut self, id: ToplevelId, has_buffer: bool, size: Size) {
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.latch_window_geometry();
        if !toplevel.configured {
            toplevel.configured = true;
            let configure = toplevel.role.current_configure(id);
            self.notify(configure);
            return;
        }

        let mapped = toplevel.mapped;
        if !mapped && has_buffer {
            self.map_toplevel(id);
        } else if mapped && !has_buffer {
            self.unmap_toplevel(id);
            return;
        }

        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        if !toplevel.listeners.accepts(Signals::COMMIT, &id) {
            return;
        }
        let content = toplevel.content_box(size);
        toplevel.geometry.width = content.width;
        toplevel.geometry.height = content.height;
        let changed = toplevel.geometry != toplevel.last_committed;
        toplevel.last_committed = toplevel.geometry;
        let node = toplevel.surface_node;
        self.scene.set_surface_size(node, size);
        self.scene.set_position(node, Point::new(-content.x, -content.y));
        if changed {
            self.reconstrain_popups(PopupParent::Toplevel(id));
            self.rebase_pointer();
        }
    }

    fn map_toplevel(&mut self, id: ToplevelId) {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return;
        };
        if !toplevel.listeners.accepts(Signals::MAP, &id) {
            return;
        }
        let size = self.surfaces.size(toplevel.surface);
        let content = toplevel.content_box(size);
        let (cx, cy) = self.seat.cursor.position();
        let area = self
            .outputs
            .output_at_or_primary(cx, cy)
            .and_then(|o| self.outputs.get(o))
            .map(|o| o.usable_area);
        let geometry = match area {
            Some(area) => area.center_child(content.size()),
            None => Rect::from_parts(Point::default(), content.size()),
        };

        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.geometry = geometry;
        toplevel.mapped = true;
        toplevel.listeners.connect(Signals::TOPLEVEL_MAPPED);
        let (tree, node) = (toplevel.scene_tree, toplevel.surface_node);
        let (maximize, fullscreen) = (toplevel.requested_maximized, toplevel.requested_fullscreen);
        let name = toplevel.display_name();

        self.scene.set_position(tree, geometry.origin());
        self.scene.set_surface_size(node, size);
        self.scene.set_position(node, Point::new(-content.x, -content.y));
        self.scene.set_enabled(tree, true);
        if maximize {
            self.set_maximized(id, true);
        }
        if fullscreen {
            self.set_fullscreen(id, true);
        }
        self.windows.add_mapped(id);
        self.focus_toplevel(id);
        info!("Toplevel {} mapped at {:?}", name, geometry);
        self.rebase_pointer();
    }

    fn unmap_toplevel(&mut self, id: ToplevelId) {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return;
        };
        if !toplevel.mapped || !toplevel.listeners.accepts(Signals::UNMAP, &id) {
            return;
        }
        self.teardown_mapped_toplevel(id);
    }

    fn teardown_mapped_toplevel(&mut self, id: ToplevelId) {
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.listeners.disconnect(Signals::TOPLEVEL_MAPPED);
        let (tree, fullscreen) = (toplevel.scene_tree, toplevel.fullscreen);
        let name = toplevel.display_name();

        self.scene.set_enabled(tree, false);
        self.end_interactions_for_toplevel(id);
        self.dismiss_popups(PopupParent::Toplevel(id));
        if fullscreen {
            self.set_fullscreen(id, false);
        }
        if let Some(toplevel) = self.windows.toplevel_mut(id) {
            toplevel.mapped = false;
        }

        match self.windows.remove_mapped(id) {
            Some(next) => self.focus_toplevel(next),
            None if self.windows.focused_toplevel().is_none() => self.restore_keyboard_focus(),
            None => {}
        }
        info!("Toplevel {} unmapped", name);
        self.rebase_pointer();
    }

    pub fn toplevel_destroy(&mut self, id: ToplevelId) {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return;
        };
        if !toplevel.listeners.accepts(Signals::DESTROY, &id) {
            return;
        }
        if toplevel.mapped {
            self.teardown_mapped_toplevel(id);
        }
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.listeners.disconnect_all();
        let tree = toplevel.scene_tree;

        self.end_interactions_for_toplevel(id);
        for popup in self.windows.popups_of(PopupParent::Toplevel(id)).into_iter().rev() {
            self.destroy_popup_entity(popup);
        }
        self.scene.set_owner(tree, None);
        self.scene.destroy(tree);
        if let Some(toplevel) = self.windows.remove_toplevel(id) {
            debug!("Toplevel {} destroyed", toplevel.display_name());
        }
    }

    pub fn toplevel_set_title(&mut self, id: ToplevelId, title: String) {
        if let Some(toplevel) = self.windows.toplevel_mut(id) {
            trace!("Toplevel {:?} title {:?}", id, title);
            toplevel.set_title(title);
        }
    }

    /// Visible bounds of an xdg surface, relative to its buffer
    pub fn xdg_surface_set_window_geometry(&mut self, surface: SurfaceId, rect: Rect) {
        match self.windows.owner_of_surface(surface) {
            Some(NodeOwner::Toplevel(id)) => {
                if let Some(toplevel) = self.windows.toplevel_mut(id) {
                    toplevel.set_window_geometry(rect);
                }
            }
            owner => trace!("Window geometry {:?} for {:?} ignored", rect, owner),
        }
    }

    pub fn toplevel_set_app_id(&mut self, id: ToplevelId, app_id: String) {
        if let Some(toplevel) = self.windows.toplevel_mut(id) {
            toplevel.set_app_id(app_id);
        }
    }

    /// Send the current configure again
    fn configure_toplevel(&mut self, id: ToplevelId) {
        if let Some(toplevel) = self.windows.toplevel(id) {
            if toplevel.configured {
                let configure = toplevel.role.current_configure(id);
                self.notify(configure);
            }
        }
    }

    /// Client asked to (un)maximize. Before mapping the request is only
    /// remembered; it is honoured when the window maps.
    pub fn toplevel_request_maximize(&mut self, id: ToplevelId, maximized: bool) {
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.requested_maximized = maximized;
        if !toplevel.listeners.accepts(Signals::REQUEST_MAXIMIZE, &id) || !self.set_maximized(id, maximized) {
            self.configure_toplevel(id);
        }
    }

    pub fn toplevel_request_fullscreen(&mut self, id: ToplevelId, fullscreen: bool) {
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        toplevel.requested_fullscreen = fullscreen;
        if !toplevel.listeners.accepts(Signals::REQUEST_FULLSCREEN, &id) || !self.set_fullscreen(id, fullscreen) {
            self.configure_toplevel(id);
        }
    }

    pub fn toplevel_request_minimize(&mut self, id: ToplevelId) {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return;
        };
        if toplevel.listeners.accepts(Signals::REQUEST_MINIMIZE, &id) {
            debug!("Ignoring minimize of {}", toplevel.display_name());
        }
    }

    /// Maximize or restore a toplevel. Returns false when nothing changed.
    pub fn set_maximized(&mut self, id: ToplevelId, maximized: bool) -> bool {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return false;
        };
        if toplevel.maximized == maximized {
            return false;
        }
        let area = if maximized {
            let area = self
                .output_for(toplevel.geometry)
                .and_then(|o| self.outputs.get(o))
                .map(|o| o.usable_area);
            if area.is_none() {
                debug!("No output to maximize {} on", toplevel.display_name());
                return false;
            }
            area
        } else {
            None
        };

        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return false;
        };
        let geometry = match area {
            Some(area) => {
                toplevel.saved_maximize = Some(toplevel.geometry);
                area
            }
            None => toplevel.saved_maximize.take().unwrap_or(toplevel.geometry),
        };
        toplevel.geometry = geometry;
        toplevel.maximized = maximized;
        toplevel.role.set_size(id, geometry.size());
        let configure = toplevel.role.set_maximized(id, maximized);
        let tree = toplevel.scene_tree;

        debug!("Toplevel {:?} maximized={} at {:?}", id, maximized, geometry);
        self.scene.set_position(tree, geometry.origin());
        self.notify(configure);
        self.reconstrain_popups(PopupParent::Toplevel(id));
        true
    }

    /// Make a toplevel cover its output, or restore it. While any toplevel
    /// is fullscreen the top layer band is hidden.
    pub fn set_fullscreen(&mut self, id: ToplevelId, fullscreen: bool) -> bool {
        let Some(toplevel) = self.windows.toplevel(id) else {
            return false;
        };
        if toplevel.fullscreen == fullscreen {
            return false;
        }
        let full = if fullscreen {
            let full = self
                .output_for(toplevel.geometry)
                .and_then(|o| self.outputs.get(o))
                .map(|o| o.geometry());
            if full.is_none() {
                debug!("No output to fullscreen {} on", toplevel.display_name());
                return false;
            }
            full
        } else {
            None
        };

        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return false;
        };
        let geometry = match full {
            Some(full) => {
                toplevel.saved_fullscreen = Some(toplevel.geometry);
                full
            }
            None => toplevel.saved_fullscreen.take().unwrap_or(toplevel.geometry),
        };
        toplevel.geometry = geometry;
        toplevel.fullscreen = fullscreen;
        toplevel.role.set_size(id, geometry.size());
        let configure = toplevel.role.set_fullscreen(id, fullscreen);
        let tree = toplevel.scene_tree;

        let top = self.scene.layer(SceneLayer::Top);
        if fullscreen && self.windows.acquire_fullscreen() {
            debug!("Hiding top layer for fullscreen");
            self.scene.set_enabled(top, false);
        } else if !fullscreen && self.windows.release_fullscreen() {
            debug!("Showing top layer");
            self.scene.set_enabled(top, true);
        }

        self.scene.set_position(tree, geometry.origin());
        self.notify(configure);
        self.reconstrain_popups(PopupParent::Toplevel(id));
        true
    }

    /// Raise, activate and keyboard-focus a mapped toplevel
    pub fn focus_toplevel(&mut self, id: ToplevelId) {
        let Some(change) = self.windows.focus_toplevel(id) else {
            return;
        };
        if let Some(old) = change.deactivated {
            if let Some(toplevel) = self.windows.toplevel_mut(old) {
                let configure = toplevel.role.set_activated(old, false);
                self.notify(configure);
            }
        }
        let Some(toplevel) = self.windows.toplevel_mut(id) else {
            return;
        };
        let configure = toplevel.role.set_activated(id, true);
        let (tree, surface) = (toplevel.scene_tree, toplevel.surface);
        self.scene.raise_to_top(tree);
        self.notify(configure);
        if change.keyboard {
            self.set_keyboard_focus(Some(surface));
        }
    }

    /// Focus the least recently focused toplevel
    pub fn cycle(&mut self) {
        let Some(target) = self.windows.cycle_target() else {
            trace!("Nothing to cycle to");
            return;
        };
        self.focus_toplevel(target);
        self.rebase_pointer();
    }

    /// Ask the focused toplevel to close
    pub fn close_focused(&mut self) {
        let Some(id) = self.windows.focused_toplevel() else {
            return;
        };
        if let Some(toplevel) = self.windows.toplevel(id) {
            debug!("Closing {}", toplevel.display_name());
            let close = toplevel.role.close(id);
            self.notify(close);
        }
    }

    // ========================================================================
    // Keyboard focus
    // ========================================================================

    pub(crate) fn set_keyboard_focus(&mut self, surface: Option<SurfaceId>) {
        let change = self.seat.set_keyboard_focus(surface);
        if !change.changed() {
            return;
        }
        trace!("Keyboard focus {:?} -> {:?}", change.old_focus, change.new_focus);
        if let Some(old) = change.old_focus {
            let serial = self.next_serial();
            self.notify(Notification::KeyboardLeave { surface: old, serial });
        }
        if let Some(new) = change.new_focus {
            let serial = self.next_serial();
            self.notify(Notification::KeyboardEnter { surface: new, serial });
            let state = self.modifier_state();
            let serial = self.next_serial();
            self.notify(Notification::KeyboardModifiers {
                surface: new,
                serial,
                state,
            });
        }
    }

    /// Point keyboard focus at whatever should hold it: a focused layer
    /// first, then the focused toplevel
    pub(crate) fn restore_keyboard_focus(&mut self) {
        let layer = self
            .windows
            .focused_layer()
            .and_then(|id| self.windows.layer(id))
            .map(|l| l.surface);
        let toplevel = self
            .windows
            .focused_toplevel()
            .and_then(|id| self.windows.toplevel(id))
            .map(|t| t.surface);
        self.set_keyboard_focus(layer.or(toplevel));
    }

    fn modifier_state(&self) -> ModifierState {
        self.active_keyboard
            .and_then(|id| self.devices.keyboard(id))
            .map(|k| k.modifier_state())
            .unwrap_or_default()
    }

    // ========================================================================
    // Layer surfaces
    // ========================================================================

    /// Give a surface the layer-shell role. Without a requested output the
    /// one under the cursor is used.
    pub fn new_layer_surface(
        &mut self,
        surface: SurfaceId,
        output: Option<OutputId>,
        band: Band,
        namespace: String,
    ) -> Result<LayerId, ShellError> {
        let output = match output.filter(|o| self.outputs.get(*o).is_some()) {
            Some(output) => output,
            None => {
                let (x, y) = self.seat.cursor.position();
                self.outputs
                    .output_at_or_primary(x, y)
                    .ok_or_else(|| ShellError::NoOutput(namespace.clone()))?
            }
        };
        self.surfaces.assign_role(surface, SurfaceRole::LayerSurface)?;
        let tree = self.scene.create_tree(self.scene.layer(band.scene_layer()))?;
        let node = match self.scene.create_surface(tree, surface, Size::default()) {
            Ok(node) => node,
            Err(e) => {
                self.scene.destroy(tree);
                return Err(e.into());
            }
        };
        self.scene.set_enabled(tree, false);

        let layer = LayerSurface::new(surface, Some(output), band, namespace, tree, node);
        let id = layer.id;
        debug!("New layer surface {} ({:?}) on {:?} in {:?}", layer.namespace, id, output, band);
        self.scene.set_owner(tree, Some(NodeOwner::Layer(id)));
        if let Some(o) = self.outputs.get_mut(output) {
            o.add_layer(band, id);
        }
        self.windows.insert_layer(layer);
        Ok(id)
    }

    fn layer_commit(&mut self, id: LayerId, has_buffer: bool, size: Size) {
        let Some(layer) = self.windows.layer_mut(id) else {
            return;
        };
        let changed = layer.apply_pending();
        let first = !layer.configured;
        layer.configured = true;
        let (old_band, new_band) = (layer.band, layer.current.band);
        let (tree, node, output, mapped) = (layer.scene_tree, layer.surface_node, layer.output, layer.mapped);
        if old_band != new_band {
            layer.band = new_band;
            debug!("Layer surface {} moves {:?} -> {:?}", layer.namespace, old_band, new_band);
            if let Err(e) = self.scene.reparent(tree, self.scene.layer(new_band.scene_layer())) {
                warn!("Failed to move layer surface {:?}: {}", id, e);
            }
            if let Some(o) = output.and_then(|o| self.outputs.get_mut(o)) {
                o.move_layer(id, new_band);
            }
            let popup_tree = self.scene.layer(new_band.popup_scene_layer());
            for popup in self.windows.popups_of(PopupParent::Layer(id)) {
                let Some(popup) = self.windows.popup(popup).filter(|p| p.parent_popup.is_none()) else {
                    continue;
                };
                if let Err(e) = self.scene.reparent(popup.scene_tree, popup_tree) {
                    warn!("Failed to move popup {:?}: {}", popup.id, e);
                }
            }
        }
        self.scene.set_surface_size(node, size);

        if first {
            if let Some(output) = output {
                self.arrange_layers(output);
            }
            return;
        }
        if !mapped && has_buffer {
            self.map_layer(id);
        } else if mapped && !has_buffer {
            self.unmap_layer(id);
            return;
        } else if changed {
            if let Some(output) = output {
                self.arrange_layers(output);
            }
        }

        let Some(layer) = self.windows.layer_mut(id) else {
            return;
        };
        if !layer.listeners.accepts(Signals::COMMIT, &id) {
            return;
        }
        let moved = layer.geometry != layer.last_committed;
        layer.last_committed = layer.geometry;
        self.update_layer_focus(id);
        if moved {
            self.rebase_pointer();
        }
    }

    fn map_layer(&mut self, id: LayerId) {
        let Some(layer) = self.windows.layer_mut(id) else {
            return;
        };
        if !layer.listeners.accepts(Signals::MAP, &id) {
            return;
        }
        layer.mapped = true;
        layer.listeners.connect(Signals::LAYER_MAPPED);
        let (tree, output) = (layer.scene_tree, layer.output);
        info!("Layer surface {} mapped", layer.namespace);
        if output.is_some() {
            self.scene.set_enabled(tree, true);
        }
        if let Some(output) = output {
            self.arrange_layers(output);
        }
    }

    fn unmap_layer(&mut self, id: LayerId) {
        let Some(layer) = self.windows.layer(id) else {
            return;
        };
        if !layer.mapped || !layer.listeners.accepts(Signals::UNMAP, &id) {
            return;
        }
        self.teardown_mapped_layer(id);
    }

    fn teardown_mapped_layer(&mut self, id: LayerId) {
        let Some(layer) = self.windows.layer_mut(id) else {
            return;
        };
        layer.listeners.disconnect(Signals::LAYER_MAPPED);
        layer.mapped = false;
        let (tree, surface, output) = (layer.scene_tree, layer.surface, layer.output);
        info!("Layer surface {} unmapped", layer.namespace);

        self.scene.set_enabled(tree, false);
        self.dismiss_popups(PopupParent::Layer(id));
        self.end_interactions_for_surface(surface);
        if self.windows.focused_layer() == Some(id) {
            self.unfocus_layer();
        }
        if let Some(output) = output {
            self.arrange_layers(output);
        }
        self.rebase_pointer();
    }

    pub fn layer_destroy(&mut self, id: LayerId) {
        let Some(layer) = self.windows.layer(id) else {
            return;
        };
        if !layer.listeners.accepts(Signals::DESTROY, &id) {
            return;
        }
        if layer.mapped {
            self.teardown_mapped_layer(id);
        }
        let Some(layer) = self.windows.layer_mut(id) else {
            return;
        };
        layer.listeners.disconnect_all();
        let (tree, surface, output) = (layer.scene_tree, layer.surface, layer.output);

        self.end_interactions_for_surface(surface);
        if self.windows.focused_layer() == Some(id) {
            self.unfocus_layer();
        }
        for popup in self.windows.popups_of(PopupParent::Layer(id)).into_iter().rev() {
            self.destroy_popup_entity(popup);
        }
        self.scene.set_owner(tree, None);
        self.scene.destroy(tree);
        if let Some(output) = output {
            if let Some(o) = self.outputs.get_mut(output) {
                o.remove_layer(id);
            }
            self.arrange_layers(output);
        }
        if let Some(layer) = self.windows.remove_layer(id) {
            debug!("Layer surface {} destroyed", layer.namespace);
        }
    }

    /// Pull focus to a layer that demands it, or drop it from one that no
    /// longer accepts it
    fn update_layer_focus(&mut self, id: LayerId) {
        let Some(layer) = self.windows.layer(id) else {
            return;
        };
        let focused = self.windows.focused_layer() == Some(id);
        if layer.mapped && layer.output.is_some() && layer.grabs_focus_on_map() {
            if !focused {
                self.focus_layer(id);
            }
        } else if focused && !layer.is_focusable() {
            self.unfocus_layer();
        }
    }

    /// Give keyboard priority to a focusable layer surface. Toplevel focus
    /// and activation are left alone.
    pub fn focus_layer(&mut self, id: LayerId) {
        let Some(layer) = self.windows.layer(id) else {
            return;
        };
        if !layer.is_focusable() {
            return;
        }
        let surface = layer.surface;
        if self.windows.focus_layer(id) {
            self.set_keyboard_focus(Some(surface));
        }
    }

    pub fn unfocus_layer(&mut self) {
        if let Some(id) = self.windows.unfocus_layer() {
            trace!("Layer {:?} released keyboard focus", id);
            self.restore_keyboard_focus();
        }
    }

    /// Drop focus from an on-demand layer; returns whether it was dropped
    pub(crate) fn release_on_demand_layer(&mut self) -> bool {
        let on_demand = self
            .windows
            .focused_layer()
            .and_then(|id| self.windows.layer(id))
            .is_some_and(|l| l.current.keyboard_interactivity == KeyboardInteractivity::OnDemand);
        if on_demand {
            self.windows.unfocus_layer();
        }
        on_demand
    }

    // ========================================================================
    // Popups
    // ========================================================================

    /// Create a popup for `surface` anchored to `parent_surface`, which may
    /// be a toplevel, a layer surface or another popup
    pub fn new_popup(
        &mut self,
        surface: SurfaceId,
        parent_surface: SurfaceId,
        positioner: Positioner,
    ) -> Result<PopupId, ShellError> {
        let (parent, parent_popup, parent_tree) = match self.windows.owner_of_surface(parent_surface) {
            Some(NodeOwner::Toplevel(id)) => {
                let toplevel = self.windows.toplevel(id).ok_or(ShellError::MissingParent)?;
                if !toplevel.listeners.accepts(Signals::NEW_POPUP, &id) {
                    return Err(ShellError::MissingParent);
                }
                (PopupParent::Toplevel(id), None, toplevel.scene_tree)
            }
            Some(NodeOwner::Layer(id)) => {
                let layer = self.windows.layer(id).ok_or(ShellError::MissingParent)?;
                if !layer.listeners.accepts(Signals::NEW_POPUP, &id) {
                    return Err(ShellError::MissingParent);
                }
                (PopupParent::Layer(id), None, self.scene.layer(layer.band.popup_scene_layer()))
            }
            Some(NodeOwner::Popup(id)) => {
                let popup = self.windows.popup(id).ok_or(ShellError::MissingParent)?;
                if !popup.listeners.accepts(Signals::NEW_POPUP, &id) {
                    return Err(ShellError::MissingParent);
                }
                (popup.parent, Some(id), popup.scene_tree)
            }
            _ => return Err(ShellError::MissingParent),
        };

        self.surfaces.assign_role(surface, SurfaceRole::XdgPopup)?;
        let tree = self.scene.create_tree(parent_tree)?;
        let node = match self.scene.create_surface(tree, surface, Size::default()) {
            Ok(node) => node,
            Err(e) => {
                self.scene.destroy(tree);
                return Err(e.into());
            }
        };
        self.scene.set_enabled(tree, false);

        let popup = Popup::new(surface, parent, parent_popup, Point::default(), positioner, tree, node);
        let id = popup.id;
        self.scene.set_owner(tree, Some(NodeOwner::Popup(id)));
        self.windows.insert_popup(popup);
        self.unconstrain_popup(id);
        debug!("New popup {:?} for {:?}", id, parent);
        Ok(id)
    }

    fn popup_commit(&mut self, id: PopupId, has_buffer: bool, size: Size) {
        let Some(popup) = self.windows.popup_mut(id) else {
            return;
        };
        if !popup.listeners.accepts(Signals::COMMIT, &id) {
            return;
        }
        let (tree, node, surface) = (popup.scene_tree, popup.surface_node, popup.surface);
        self.scene.set_surface_size(node, size);

        if !popup.configured {
            popup.configured = true;
            self.unconstrain_popup(id);
            if let Some(popup) = self.windows.popup(id) {
                let geometry = popup.geometry;
                self.notify(Notification::PopupConfigure { popup: id, geometry });
            }
            return;
        }

        if has_buffer && !popup.mapped {
            popup.mapped = true;
            self.scene.set_enabled(tree, true);
            self.rebase_pointer();
        } else if !has_buffer && popup.mapped {
            popup.mapped = false;
            self.scene.set_enabled(tree, false);
            self.end_interactions_for_surface(surface);
            self.rebase_pointer();
        }
        for child in self.windows.child_popups(id) {
            self.reconstrain_popup(child);
        }
    }

    /// Apply a new positioner; answers with `repositioned` then a configure
    pub fn popup_reposition(&mut self, id: PopupId, positioner: Positioner, token: u32) {
        let Some(popup) = self.windows.popup_mut(id) else {
            return;
        };
        if !popup.listeners.accepts(Signals::REPOSITION, &id) {
            return;
        }
        popup.positioner = positioner;
        self.unconstrain_popup(id);
        let Some(geometry) = self.windows.popup(id).map(|p| p.geometry) else {
            return;
        };
        self.notify(Notification::PopupRepositioned { popup: id, token });
        self.notify(Notification::PopupConfigure { popup: id, geometry });
        for child in self.windows.child_popups(id) {
            self.reconstrain_popup(child);
        }
    }

    pub fn popup_destroy(&mut self, id: PopupId) {
        let Some(popup) = self.windows.popup(id) else {
            return;
        };
        if !popup.listeners.accepts(Signals::DESTROY, &id) {
            return;
        }
        self.destroy_popup_entity(id);
        self.rebase_pointer();
    }

    fn destroy_popup_entity(&mut self, id: PopupId) {
        for child in self.windows.child_popups(id).into_iter().rev() {
            self.destroy_popup_entity(child);
        }
        let Some(popup) = self.windows.popup_mut(id) else {
            return;
        };
        popup.listeners.disconnect_all();
        let (tree, surface) = (popup.scene_tree, popup.surface);
        self.end_interactions_for_surface(surface);
        self.scene.set_owner(tree, None);
        self.scene.destroy(tree);
        self.windows.remove_popup(id);
        trace!("Popup {:?} destroyed", id);
    }

    /// Tell every popup of an owner it has been dismissed
    fn dismiss_popups(&mut self, parent: PopupParent) {
        for id in self.windows.popups_of(parent) {
            if let Some(popup) = self.windows.popup(id) {
                let tree = popup.scene_tree;
                self.scene.set_enabled(tree, false);
                self.notify(Notification::PopupDone { popup: id });
            }
        }
    }

    /// Offset of a popup's xdg parent from the owner's surface origin
    fn popup_offset(&self, id: PopupId) -> Point {
        let mut offset = Point::default();
        let mut current = self.windows.popup(id).and_then(|p| p.parent_popup);
        while let Some(parent) = current.and_then(|p| self.windows.popup(p)) {
            offset = offset + parent.geometry.origin();
            current = parent.parent_popup;
        }
        offset
    }

    /// Recompute a popup's box against its owner's output and place its
    /// scene node. Returns whether the box changed.
    fn unconstrain_popup(&mut self, id: PopupId) -> bool {
        let offset = self.popup_offset(id);
        let Some(popup) = self.windows.popup(id) else {
            return false;
        };
        let parent = popup.parent;
        let bounds = parent.unconstrain_box(&self.windows, &self.outputs);
        let owner_origin = parent.origin(&self.windows).unwrap_or_default();

        let Some(popup) = self.windows.popup_mut(id) else {
            return false;
        };
        popup.offset = offset;
        let changed = match bounds {
            Some(bounds) => popup.unconstrain(bounds),
            None => false,
        };
        let (tree, nested) = (popup.scene_tree, popup.parent_popup.is_some());
        let local = popup.geometry.origin();
        let position = match parent {
            // Top-level layer popups sit in a band tree, not under the layer
            PopupParent::Layer(_) if !nested => owner_origin + local,
            _ => local,
        };
        self.scene.set_position(tree, position);
        changed
    }

    fn reconstrain_popup(&mut self, id: PopupId) {
        if self.unconstrain_popup(id) {
            if let Some(popup) = self.windows.popup(id) {
                if popup.configured {
                    let geometry = popup.geometry;
                    self.notify(Notification::PopupConfigure { popup: id, geometry });
                }
            }
        }
    }

    /// Re-apply constraints to every popup of an owner after it moved
    pub(crate) fn reconstrain_popups(&mut self, parent: PopupParent) {
        for id in self.windows.popups_of(parent) {
            self.reconstrain_popup(id);
        }
    }

    // ========================================================================
    // Drag and drop
    // ========================================================================

    /// Start a drag from a client request. Refused drags cancel their data
    /// source.
    pub fn start_drag(
        &mut self,
        source: Option<DataSourceId>,
        origin: SurfaceId,
        icon: Option<SurfaceId>,
        serial: u32,
    ) -> bool {
        let check = drag::validate_start(
            self.seat.cursor.pressed_count(),
            self.seat.cursor.last_press_serial(),
            serial,
            self.drag.is_some(),
        );
        if let Err(reason) = check {
            warn!("Refusing drag from {:?}: {}", origin, reason);
            if let Some(source) = source {
                self.notify(Notification::DataSourceCancelled { source });
            }
            return false;
        }

        let icon = icon.and_then(|surface| match self.new_drag_icon(surface) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Drag icon rejected: {}", e);
                None
            }
        });
        self.drag = Some(DragSession { source, origin, icon });
        self.move_drag_icon();
        debug!("Drag started from {:?}", origin);
        true
    }

    fn new_drag_icon(&mut self, surface: SurfaceId) -> Result<DragIconId, ShellError> {
        self.surfaces.assign_role(surface, SurfaceRole::DragIcon)?;
        let tree = self.scene.create_tree(self.scene.layer(SceneLayer::DragIcon))?;
        let size = self.surfaces.size(surface);
        let node = match self.scene.create_surface(tree, surface, size) {
            Ok(node) => node,
            Err(e) => {
                self.scene.destroy(tree);
                return Err(e.into());
            }
        };
        let icon = DragIcon::new(surface, tree, node);
        let id = icon.id;
        self.scene.set_owner(tree, Some(NodeOwner::DragIcon(id)));
        self.windows.insert_drag_icon(icon);
        Ok(id)
    }

    /// Keep the drag icon under the cursor
    pub(crate) fn move_drag_icon(&mut self) {
        let Some(icon) = self.drag.and_then(|d| d.icon) else {
            return;
        };
        if let Some(icon) = self.windows.drag_icon(icon) {
            let (x, y) = self.seat.cursor.position();
            self.scene.set_position(icon.scene_tree, Point::from_f64(x, y));
        }
    }

    pub(crate) fn end_drag(&mut self) {
        let Some(session) = self.drag.take() else {
            return;
        };
        if let Some(icon) = session.icon.and_then(|id| self.windows.drag_icon(id)) {
            self.scene.set_enabled(icon.scene_tree, false);
        }
        debug!("Drag from {:?} ended", session.origin);
    }

    pub fn dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The client destroyed the data source of the active drag
    pub fn data_source_destroyed(&mut self, source: DataSourceId) {
        if self.drag.is_some_and(|d| d.source == Some(source)) {
            self.end_drag();
        }
    }

    fn drag_icon_commit(&mut self, id: DragIconId, has_buffer: bool, size: Size) {
        let Some(icon) = self.windows.drag_icon(id) else {
            return;
        };
        if !icon.listeners.accepts(Signals::COMMIT, &id) {
            return;
        }
        let (tree, node) = (icon.scene_tree, icon.surface_node);
        let active = self.drag.is_some_and(|d| d.icon == Some(id));
        self.scene.set_surface_size(node, size);
        self.scene.set_enabled(tree, has_buffer && active);
    }

    pub fn drag_icon_destroy(&mut self, id: DragIconId) {
        if let Some(session) = self.drag.as_mut() {
            if session.icon == Some(id) {
                session.icon = None;
            }
        }
        if let Some(icon) = self.windows.remove_drag_icon(id) {
            self.scene.set_owner(icon.scene_tree, None);
            self.scene.destroy(icon.scene_tree);
        }
    }

    // ========================================================================
    // Input devices and keyboard
    // ========================================================================

    /// Attach an input device and update seat capabilities
    pub fn new_input_device(&mut self, id: DeviceId, info: DeviceInfo) {
        self.devices.add(id, info, &self.xkb_layout);
        self.update_capabilities();
    }

    pub fn remove_input_device(&mut self, id: DeviceId) {
        if self.devices.remove(id).is_none() {
            warn!("Removing unknown input device {:?}", id);
            return;
        }
        if self.active_keyboard == Some(id) {
            self.active_keyboard = None;
        }
        self.update_capabilities();
    }

    /// Advertise what the live devices support. Losing the last pointer
    /// disables the cursor.
    pub(crate) fn update_capabilities(&mut self) {
        let capabilities = self.devices.capabilities();
        if !self.seat.set_capabilities(capabilities) {
            return;
        }
        self.notify(Notification::SeatCapabilities { capabilities });
        if !capabilities.contains(SeatCapabilities::POINTER) {
            self.disable_cursor();
        }
    }

    /// Feed a raw key event from a keyboard device
    pub fn keyboard_key(&mut self, device: DeviceId, time: u32, keycode: u32, pressed: bool) {
        let Some(keyboard) = self.devices.keyboard_mut(device) else {
            trace!("Key from unknown keyboard {:?}", device);
            return;
        };
        let (event, modifiers) = keyboard.feed(time, keycode, pressed);
        self.active_keyboard = Some(device);
        self.process_key(device, &event);
        if let Some(state) = modifiers {
            self.forward_modifiers(state);
        }
    }

    /// Run a key through the bindings, forwarding it to the focused client
    /// if none consumed it
    pub fn process_key(&mut self, device: DeviceId, event: &KeyEvent) {
        if event.pressed {
            let actions: Vec<Action> = event
                .syms
                .iter()
                .filter_map(|sym| self.bindings.lookup(event.modifiers, *sym).cloned())
                .collect();
            if !actions.is_empty() {
                for action in actions {
                    self.run_action(action);
                }
                return;
            }
        }

        if let Some(surface) = self.seat.keyboard_focus() {
            let serial = self.next_serial();
            self.notify(Notification::KeyboardKey {
                surface,
                serial,
                time: event.time,
                key: event.keycode,
                pressed: event.pressed,
            });
        }
        self.sync_leds(device);
    }

    /// Mirror one keyboard's lock LEDs onto every other keyboard
    fn sync_leds(&mut self, source: DeviceId) {
        let Some(leds) = self.devices.keyboard(source).map(|k| k.leds()) else {
            return;
        };
        let mut updated: Vec<DeviceId> = self
            .devices
            .keyboards_mut()
            .filter(|k| k.id() != source)
            .filter_map(|k| k.sync_leds(leds).then_some(k.id()))
            .collect();
        updated.sort_by_key(|id| id.0);
        for device in updated {
            self.notify(Notification::KeyboardLeds { device, leds });
        }
    }

    fn forward_modifiers(&mut self, state: ModifierState) {
        if let Some(surface) = self.seat.keyboard_focus() {
            let serial = self.next_serial();
            self.notify(Notification::KeyboardModifiers { surface, serial, state });
        }
    }

    fn run_action(&mut self, action: Action) {
        debug!("Running binding {:?}", action);
        match action {
            Action::Cycle => self.cycle(),
            Action::CloseFocused => self.close_focused(),
            Action::Spawn(command) => self.notify(Notification::Spawn { command }),
            Action::Terminate => {
                info!("Terminate requested");
                self.notify(Notification::Terminate);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compositor::layer::Anchor;
    use crate::compositor::output::test_descriptor;
    use crate::compositor::popup::{Anchor as PopupAnchor, Gravity};
    use crate::compositor::surface::BufferInfo;
    use crate::compositor::ToplevelStates;
    use crate::input::devices::DeviceClass;
    use crate::input::keyboard::{Leds, Modifiers};
    use crate::input::InteractionState;

    pub(crate) fn state_with_output() -> (CompositorState, OutputId) {
        let mut state = CompositorState::new(&Config::default());
        let output = state.new_output(test_descriptor("HEADLESS-1", 1000, 800)).unwrap();
        (state, output)
    }

    pub(crate) fn attach(state: &mut CompositorState, surface: SurfaceId, size: Option<(i32, i32)>) {
        let buffer = size.map(|(width, height)| BufferInfo { width, height });
        state.surfaces.get_mut(surface).unwrap().attach(buffer);
        state.surface_commit(surface);
    }

    pub(crate) fn map_toplevel(state: &mut CompositorState, width: i32, height: i32) -> (ToplevelId, SurfaceId) {
        let surface = state.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        state.surface_commit(surface);
        attach(state, surface, Some((width, height)));
        (id, surface)
    }

    fn layer(state: &mut CompositorState, band: Band, namespace: &str) -> (LayerId, SurfaceId) {
        let surface = state.create_surface();
        let id = state
            .new_layer_surface(surface, None, band, namespace.to_string())
            .unwrap();
        (id, surface)
    }

    fn activated(state: &CompositorState, id: ToplevelId) -> bool {
        state
            .windows
            .toplevel(id)
            .unwrap()
            .role
            .states()
            .contains(ToplevelStates::ACTIVATED)
    }

    #[test]
    fn test_first_commit_configures_without_mapping() {
        let (mut state, _) = state_with_output();
        let surface = state.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        state.surface_commit(surface);

        let notes = state.drain_notifications();
        assert!(matches!(notes[..], [Notification::ToplevelConfigure { toplevel, .. }] if toplevel == id));
        assert!(state.windows.mapped().is_empty());
        assert!(!state.scene.is_visible(state.windows.toplevel(id).unwrap().scene_tree));
    }

    #[test]
    fn test_map_centers_and_focuses() {
        let (mut state, _) = state_with_output();
        let (id, surface) = map_toplevel(&mut state, 200, 100);

        let toplevel = state.windows.toplevel(id).unwrap();
        assert_eq!(toplevel.geometry, Rect::new(400, 350, 200, 100));
        assert!(state.scene.is_visible(toplevel.scene_tree));
        assert_eq!(state.windows.focused_toplevel(), Some(id));
        assert_eq!(state.seat.keyboard_focus(), Some(surface));
        assert!(activated(&state, id));
    }

    #[test]
    fn test_map_clamps_to_usable_area() {
        let (mut state, output) = state_with_output();
        let (panel, panel_surface) = layer(&mut state, Band::Top, "panel");
        {
            let panel = state.windows.layer_mut(panel).unwrap();
            panel.set_anchor(Anchor::TOP | Anchor::LEFT | Anchor::RIGHT);
            panel.set_size(0, 30);
            panel.set_exclusive_zone(30);
        }
        state.surface_commit(panel_surface);
        attach(&mut state, panel_surface, Some((1000, 30)));
        assert_eq!(state.outputs.get(output).unwrap().usable_area, Rect::new(0, 30, 1000, 770));

        let (id, _) = map_toplevel(&mut state, 500, 900);
        assert_eq!(state.windows.toplevel(id).unwrap().geometry.origin(), Point::new(250, 30));
    }

    #[test]
    fn test_unmap_refocuses_previous() {
        let (mut state, _) = state_with_output();
        let (t1, s1) = map_toplevel(&mut state, 100, 100);
        let (t2, s2) = map_toplevel(&mut state, 100, 100);
        assert_eq!(state.windows.mapped(), &[t1, t2]);
        assert_eq!(state.windows.focused_toplevel(), Some(t2));
        assert!(!activated(&state, t1));
        state.drain_notifications();

        attach(&mut state, s2, None);
        assert_eq!(state.windows.mapped(), &[t1]);
        assert_eq!(state.windows.focused_toplevel(), Some(t1));
        assert_eq!(state.seat.keyboard_focus(), Some(s1));
        let notes = state.drain_notifications();
        assert!(notes
            .iter()
            .any(|n| matches!(n, Notification::KeyboardLeave { surface, .. } if *surface == s2)));
    }

    #[test]
    fn test_focus_emits_deactivate_then_activate() {
        let (mut state, _) = state_with_output();
        let (t1, _) = map_toplevel(&mut state, 100, 100);
        state.drain_notifications();
        let (t2, s2) = map_toplevel(&mut state, 100, 100);

        let notes = state.drain_notifications();
        let position = |pred: &dyn Fn(&Notification) -> bool| notes.iter().position(pred).unwrap();
        let deactivate = position(&|n| {
            matches!(n, Notification::ToplevelConfigure { toplevel, states, .. }
                if *toplevel == t1 && !states.contains(ToplevelStates::ACTIVATED))
        });
        let activate = position(&|n| {
            matches!(n, Notification::ToplevelConfigure { toplevel, states, .. }
                if *toplevel == t2 && states.contains(ToplevelStates::ACTIVATED))
        });
        let enter = position(&|n| matches!(n, Notification::KeyboardEnter { surface, .. } if *surface == s2));
        assert!(deactivate < activate);
        assert!(activate < enter);
    }

    #[test]
    fn test_cycle_rotates() {
        let (mut state, _) = state_with_output();
        let (a, _) = map_toplevel(&mut state, 100, 100);
        let (b, _) = map_toplevel(&mut state, 100, 100);
        let (c, _) = map_toplevel(&mut state, 100, 100);
        assert_eq!(state.windows.mapped(), &[a, b, c]);

        state.cycle();
        assert_eq!(state.windows.mapped(), &[b, c, a]);
        assert_eq!(state.windows.focused_toplevel(), Some(a));
        state.cycle();
        assert_eq!(state.windows.focused_toplevel(), Some(b));

        let active: Vec<_> = [a, b, c].into_iter().filter(|t| activated(&state, *t)).collect();
        assert_eq!(active, vec![b]);
    }

    #[test]
    fn test_cycle_single_window_is_noop() {
        let (mut state, _) = state_with_output();
        let (a, _) = map_toplevel(&mut state, 100, 100);
        state.drain_notifications();
        state.cycle();
        assert_eq!(state.windows.focused_toplevel(), Some(a));
        assert!(state.drain_notifications().is_empty());
    }

    #[test]
    fn test_maximize_round_trip_and_idempotence() {
        let (mut state, _) = state_with_output();
        let (id, _) = map_toplevel(&mut state, 200, 100);
        let before = state.windows.toplevel(id).unwrap().geometry;

        assert!(state.set_maximized(id, true));
        assert!(!state.set_maximized(id, true));
        let toplevel = state.windows.toplevel(id).unwrap();
        assert_eq!(toplevel.geometry, Rect::new(0, 0, 1000, 800));
        assert!(toplevel.role.states().contains(ToplevelStates::MAXIMIZED));
        assert_eq!(toplevel.role.requested_size(), Size::new(1000, 800));

        assert!(state.set_maximized(id, false));
        assert_eq!(state.windows.toplevel(id).unwrap().geometry, before);
    }

    #[test]
    fn test_maximize_request_before_map() {
        let (mut state, _) = state_with_output();
        let surface = state.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        state.surface_commit(surface);
        state.toplevel_request_maximize(id, true);
        assert!(!state.windows.toplevel(id).unwrap().maximized);

        attach(&mut state, surface, Some((100, 100)));
        let toplevel = state.windows.toplevel(id).unwrap();
        assert!(toplevel.maximized);
        assert_eq!(toplevel.geometry, Rect::new(0, 0, 1000, 800));
    }

    #[test]
    fn test_fullscreen_hides_top_band_until_last_exits() {
        let (mut state, _) = state_with_output();
        state.new_output(test_descriptor("HEADLESS-2", 800, 600)).unwrap();
        let top = state.scene.layer(SceneLayer::Top);

        let (t1, _) = map_toplevel(&mut state, 100, 100);
        state.seat.cursor.set_position(1400.0, 300.0);
        let (t2, _) = map_toplevel(&mut state, 100, 100);
        assert_eq!(state.windows.toplevel(t2).unwrap().geometry.origin(), Point::new(1350, 250));

        state.set_fullscreen(t1, true);
        state.set_fullscreen(t2, true);
        assert_eq!(state.windows.toplevel(t2).unwrap().geometry, Rect::new(1000, 0, 800, 600));
        assert!(!state.scene.is_enabled(top));

        state.set_fullscreen(t1, false);
        assert!(!state.scene.is_enabled(top));
        state.set_fullscreen(t2, false);
        assert!(state.scene.is_enabled(top));
        assert_eq!(state.windows.fullscreen_count(), 0);
    }

    #[test]
    fn test_unmapping_fullscreen_releases_top_band() {
        let (mut state, _) = state_with_output();
        let top = state.scene.layer(SceneLayer::Top);
        let (id, surface) = map_toplevel(&mut state, 100, 100);
        state.set_fullscreen(id, true);
        assert!(!state.scene.is_enabled(top));

        attach(&mut state, surface, None);
        assert!(state.scene.is_enabled(top));
        assert_eq!(state.windows.fullscreen_count(), 0);
    }

    #[test]
    fn test_requests_ignored_while_unmapped() {
        let (mut state, _) = state_with_output();
        let (id, surface) = map_toplevel(&mut state, 100, 100);
        attach(&mut state, surface, None);

        state.toplevel_request_fullscreen(id, true);
        assert!(!state.windows.toplevel(id).unwrap().fullscreen);
        assert!(state.windows.toplevel(id).unwrap().requested_fullscreen);
    }

    #[test]
    fn test_destroy_cleans_up() {
        let (mut state, _) = state_with_output();
        let (id, surface) = map_toplevel(&mut state, 100, 100);
        let tree = state.windows.toplevel(id).unwrap().scene_tree;

        state.toplevel_destroy(id);
        assert!(state.windows.toplevel(id).is_none());
        assert!(!state.scene.contains(tree));
        assert!(state.windows.mapped().is_empty());
        assert_eq!(state.seat.keyboard_focus(), None);

        state.surface_destroyed(surface);
        assert!(state.surfaces.get(surface).is_none());
    }

    #[test]
    fn test_exclusive_layer_takes_keyboard_without_deactivating() {
        let (mut state, _) = state_with_output();
        let (t, ts) = map_toplevel(&mut state, 100, 100);
        let (lock, ls) = layer(&mut state, Band::Overlay, "lock");
        {
            let lock = state.windows.layer_mut(lock).unwrap();
            lock.set_anchor(Anchor::all());
            lock.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);
        }
        state.drain_notifications();
        state.surface_commit(ls);
        assert!(matches!(
            state.drain_notifications()[..],
            [Notification::LayerConfigure { layer, size }] if layer == lock && size == Size::new(1000, 800)
        ));

        attach(&mut state, ls, Some((1000, 800)));
        assert_eq!(state.seat.keyboard_focus(), Some(ls));
        assert_eq!(state.windows.focused_toplevel(), Some(t));
        assert!(activated(&state, t));

        attach(&mut state, ls, None);
        assert_eq!(state.windows.focused_layer(), None);
        assert_eq!(state.seat.keyboard_focus(), Some(ts));
    }

    #[test]
    fn test_bottom_layer_does_not_grab_focus() {
        let (mut state, _) = state_with_output();
        let (_, ts) = map_toplevel(&mut state, 100, 100);
        let (bg, bs) = layer(&mut state, Band::Background, "wallpaper");
        {
            let bg = state.windows.layer_mut(bg).unwrap();
            bg.set_anchor(Anchor::all());
            bg.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
        }
        state.surface_commit(bs);
        attach(&mut state, bs, Some((1000, 800)));
        assert_eq!(state.seat.keyboard_focus(), Some(ts));
    }

    #[test]
    fn test_layer_band_migration() {
        let (mut state, output) = state_with_output();
        let (id, surface) = layer(&mut state, Band::Bottom, "dock");
        state.windows.layer_mut(id).unwrap().set_size(100, 100);
        state.surface_commit(surface);
        attach(&mut state, surface, Some((100, 100)));

        state.windows.layer_mut(id).unwrap().set_band(Band::Overlay);
        state.surface_commit(surface);

        let tree = state.windows.layer(id).unwrap().scene_tree;
        assert_eq!(state.scene.parent(tree), Some(state.scene.layer(SceneLayer::Overlay)));
        let output = state.outputs.get(output).unwrap();
        assert!(output.layers(Band::Bottom).is_empty());
        assert_eq!(output.layers(Band::Overlay), &[id]);
    }

    fn with_pointer(state: &mut CompositorState) -> DeviceId {
        let mouse = state
            .devices
            .add_without_keymap(DeviceInfo::new("mouse", DeviceClass::Pointer));
        state.update_capabilities();
        mouse
    }

    fn map_layer_surface(state: &mut CompositorState, band: Band, width: i32, height: i32) -> (LayerId, SurfaceId) {
        let (id, surface) = layer(state, band, "menu-bar");
        {
            let layer = state.windows.layer_mut(id).unwrap();
            layer.set_anchor(Anchor::TOP);
            layer.set_size(width, height);
        }
        state.surface_commit(surface);
        attach(state, surface, Some((width, height)));
        (id, surface)
    }

    fn map_popup(state: &mut CompositorState, parent: SurfaceId) -> PopupId {
        let mut positioner = Positioner::new();
        positioner.set_size(50, 50);
        let surface = state.create_surface();
        let popup = state.new_popup(surface, parent, positioner).unwrap();
        state.surface_commit(surface);
        attach(state, surface, Some((50, 50)));
        popup
    }

    #[test]
    fn test_overlay_popup_survives_fullscreen() {
        let (mut state, _) = state_with_output();
        let (overlay, overlay_surface) = map_layer_surface(&mut state, Band::Overlay, 200, 50);
        let popup = map_popup(&mut state, overlay_surface);
        let popup_tree = state.windows.popup(popup).unwrap().scene_tree;
        assert_eq!(state.scene.parent(popup_tree), Some(state.scene.layer(SceneLayer::Overlay)));

        let (id, _) = map_toplevel(&mut state, 200, 100);
        state.set_fullscreen(id, true);
        assert!(state.scene.is_visible(state.windows.layer(overlay).unwrap().scene_tree));
        assert!(state.scene.is_visible(popup_tree));
    }

    #[test]
    fn test_layer_popup_follows_band_migration() {
        let (mut state, _) = state_with_output();
        let (id, surface) = map_layer_surface(&mut state, Band::Bottom, 200, 50);
        let popup = map_popup(&mut state, surface);
        let popup_tree = state.windows.popup(popup).unwrap().scene_tree;
        assert_eq!(state.scene.parent(popup_tree), Some(state.scene.layer(SceneLayer::Top)));

        state.windows.layer_mut(id).unwrap().set_band(Band::Overlay);
        state.surface_commit(surface);
        assert_eq!(state.scene.parent(popup_tree), Some(state.scene.layer(SceneLayer::Overlay)));
    }

    #[test]
    fn test_window_geometry_excludes_decorations() {
        let (mut state, _) = state_with_output();
        let surface = state.create_surface();
        let id = state.new_toplevel(surface).unwrap();
        state.xdg_surface_set_window_geometry(surface, Rect::new(20, 20, 200, 100));
        state.surface_commit(surface);
        attach(&mut state, surface, Some((240, 140)));

        // Centered by the window box, with the shadow hanging outside it
        let toplevel = state.windows.toplevel(id).unwrap();
        assert_eq!(toplevel.geometry, Rect::new(400, 350, 200, 100));
        let node = toplevel.surface_node;
        assert_eq!(state.scene.global_position(node), Some(Point::new(380, 330)));

        state.xdg_surface_set_window_geometry(surface, Rect::new(10, 10, 220, 120));
        assert_eq!(state.windows.toplevel(id).unwrap().geometry.width, 200);
        attach(&mut state, surface, Some((240, 140)));
        assert_eq!(state.windows.toplevel(id).unwrap().geometry, Rect::new(400, 350, 220, 120));
        assert_eq!(state.scene.global_position(node), Some(Point::new(390, 340)));
    }

    #[test]
    fn test_toplevel_resize_commit_rebases_pointer() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (_, surface) = map_toplevel(&mut state, 200, 100);
        state.pointer_motion(mouse, 0, 0.0, 0.0);
        assert_eq!(state.seat.pointer_focus(), Some(surface));
        state.drain_notifications();

        // The window shrinks away from the stationary cursor at (500, 400)
        attach(&mut state, surface, Some((50, 50)));
        assert!(matches!(
            state.drain_notifications()[..],
            [Notification::PointerLeave { surface: s, .. }] if s == surface
        ));
        assert_eq!(state.seat.pointer_focus(), None);

        attach(&mut state, surface, Some((200, 100)));
        assert!(matches!(
            state.drain_notifications()[..],
            [Notification::PointerEnter { surface: s, x, y, .. }] if s == surface && x == 100.0 && y == 50.0
        ));
    }

    #[test]
    fn test_layer_resize_commit_rebases_pointer() {
        let (mut state, _) = state_with_output();
        let mouse = with_pointer(&mut state);
        let (id, surface) = map_layer_surface(&mut state, Band::Top, 200, 50);
        state.pointer_motion(mouse, 0, 0.0, -380.0);
        assert_eq!(state.seat.pointer_focus(), Some(surface));
        state.drain_notifications();

        state.windows.layer_mut(id).unwrap().set_size(200, 10);
        attach(&mut state, surface, Some((200, 10)));
        let notes = state.drain_notifications();
        assert!(notes.contains(&Notification::LayerConfigure {
            layer: id,
            size: Size::new(200, 10)
        }));
        assert!(notes
            .iter()
            .any(|n| matches!(n, Notification::PointerLeave { surface: s, .. } if *s == surface)));
        assert_eq!(state.seat.pointer_focus(), None);
    }

    #[test]
    fn test_layer_without_output_is_rejected() {
        let mut state = CompositorState::new(&Config::default());
        let surface = state.create_surface();
        let result = state.new_layer_surface(surface, None, Band::Top, "bar".into());
        assert!(matches!(result, Err(ShellError::NoOutput(_))));
    }

    #[test]
    fn test_output_removal_detaches_layers() {
        let (mut state, _) = state_with_output();
        let second = state.new_output(test_descriptor("HEADLESS-2", 800, 600)).unwrap();
        let surface = state.create_surface();
        let id = state
            .new_layer_surface(surface, Some(second), Band::Top, "bar".into())
            .unwrap();
        state.windows.layer_mut(id).unwrap().set_size(100, 20);
        state.surface_commit(surface);
        attach(&mut state, surface, Some((100, 20)));
        state.seat.cursor.set_position(1500.0, 500.0);
        state.drain_notifications();

        state.remove_output(second);
        let layer = state.windows.layer(id).unwrap();
        assert_eq!(layer.output, None);
        assert!(!state.scene.is_enabled(layer.scene_tree));
        assert!(state.drain_notifications().contains(&Notification::LayerClosed { layer: id }));
        assert_eq!(state.seat.cursor.position(), (999.0, 500.0));
    }

    #[test]
    fn test_output_removal_ends_move() {
        let (mut state, _) = state_with_output();
        let second = state.new_output(test_descriptor("HEADLESS-2", 800, 600)).unwrap();
        let (id, _) = map_toplevel(&mut state, 100, 100);
        state.seat.interaction = InteractionState::Move {
            toplevel: id,
            grab: (0.0, 0.0),
        };
        state.remove_output(second);
        assert_eq!(state.seat.interaction, InteractionState::Passthrough);
    }

    #[test]
    fn test_popup_is_constrained_to_output() {
        let (mut state, _) = state_with_output();
        let (id, surface) = map_toplevel(&mut state, 200, 100);

        let mut positioner = Positioner::new();
        positioner.set_size(300, 200);
        positioner.set_anchor_rect(150, 50, 50, 50);
        positioner.set_anchor(PopupAnchor::BottomRight);
        positioner.set_gravity(Gravity::BottomRight);

        let popup_surface = state.create_surface();
        let popup = state.new_popup(popup_surface, surface, positioner).unwrap();
        state.surface_commit(popup_surface);

        // Toplevel at (400, 350); desired box (600, 450)-(900, 650) fits
        let geometry = state.windows.popup(popup).unwrap().geometry;
        assert_eq!(geometry, Rect::new(200, 100, 300, 200));

        // Moving the toplevel right pushes the popup back inside
        state.windows.toplevel_mut(id).unwrap().geometry.x = 750;
        state.reconstrain_popups(PopupParent::Toplevel(id));
        let geometry = state.windows.popup(popup).unwrap().geometry;
        assert_eq!(geometry.x + 750 + geometry.width, 1000);
    }

    #[test]
    fn test_popup_reposition_order() {
        let (mut state, _) = state_with_output();
        let (_, surface) = map_toplevel(&mut state, 200, 100);
        let popup_surface = state.create_surface();
        let popup = state.new_popup(popup_surface, surface, Positioner::new()).unwrap();
        state.surface_commit(popup_surface);
        state.drain_notifications();

        let mut positioner = Positioner::new();
        positioner.set_size(10, 10);
        state.popup_reposition(popup, positioner, 7);
        let notes = state.drain_notifications();
        assert!(matches!(
            notes[..],
            [
                Notification::PopupRepositioned { token: 7, .. },
                Notification::PopupConfigure { .. }
            ]
        ));
    }

    #[test]
    fn test_popup_needs_live_parent() {
        let (mut state, _) = state_with_output();
        let surface = state.create_surface();
        let orphan = state.create_surface();
        assert!(matches!(
            state.new_popup(surface, orphan, Positioner::new()),
            Err(ShellError::MissingParent)
        ));
    }

    #[test]
    fn test_refused_drag_cancels_source() {
        let (mut state, _) = state_with_output();
        let (_, surface) = map_toplevel(&mut state, 100, 100);
        let source = DataSourceId::new();
        state.drain_notifications();

        assert!(!state.start_drag(Some(source), surface, None, 42));
        assert!(!state.dragging());
        assert_eq!(
            state.drain_notifications(),
            vec![Notification::DataSourceCancelled { source }]
        );
    }

    #[test]
    fn test_binding_consumes_key() {
        let (mut state, _) = state_with_output();
        let kbd = state
            .devices
            .add_without_keymap(DeviceInfo::new("kbd", DeviceClass::Keyboard));
        let (a, _) = map_toplevel(&mut state, 100, 100);
        let (b, _) = map_toplevel(&mut state, 100, 100);
        state.drain_notifications();

        let event = KeyEvent {
            time: 0,
            keycode: 15,
            pressed: true,
            modifiers: Modifiers::ALT,
            syms: vec![xkbcommon::xkb::keysyms::KEY_Tab],
        };
        state.process_key(kbd, &event);
        assert_eq!(state.windows.focused_toplevel(), Some(a));
        assert!(!state
            .pending_notifications()
            .iter()
            .any(|n| matches!(n, Notification::KeyboardKey { .. })));
        assert_eq!(state.windows.mapped(), &[b, a]);
    }

    #[test]
    fn test_unbound_key_is_forwarded_and_leds_synced() {
        let (mut state, _) = state_with_output();
        let k1 = state
            .devices
            .add_without_keymap(DeviceInfo::new("kbd1", DeviceClass::Keyboard));
        let k2 = state
            .devices
            .add_without_keymap(DeviceInfo::new("kbd2", DeviceClass::Keyboard));
        let (_, surface) = map_toplevel(&mut state, 100, 100);
        state.devices.keyboard_mut(k1).unwrap().sync_leds(Leds::CAPS_LOCK);
        state.drain_notifications();

        let event = KeyEvent {
            time: 5,
            keycode: 30,
            pressed: true,
            modifiers: Modifiers::empty(),
            syms: vec![xkbcommon::xkb::keysyms::KEY_a],
        };
        state.process_key(k1, &event);
        let notes = state.drain_notifications();
        assert!(matches!(
            notes[0],
            Notification::KeyboardKey { surface: s, key: 30, pressed: true, time: 5, .. } if s == surface
        ));
        assert_eq!(
            notes[1],
            Notification::KeyboardLeds {
                device: k2,
                leds: Leds::CAPS_LOCK
            }
        );
        assert_eq!(state.devices.keyboard(k2).unwrap().leds(), Leds::CAPS_LOCK);
    }

    #[test]
    fn test_spawn_and_terminate_bindings() {
        let (mut state, _) = state_with_output();
        let kbd = state
            .devices
            .add_without_keymap(DeviceInfo::new("kbd", DeviceClass::Keyboard));
        let mut event = KeyEvent {
            time: 0,
            keycode: 28,
            pressed: true,
            modifiers: Modifiers::ALT,
            syms: vec![xkbcommon::xkb::keysyms::KEY_Return],
        };
        state.process_key(kbd, &event);
        event.syms = vec![xkbcommon::xkb::keysyms::KEY_Escape];
        state.process_key(kbd, &event);
        assert_eq!(
            state.drain_notifications(),
            vec![
                Notification::Spawn {
                    command: "foot".to_string()
                },
                Notification::Terminate
            ]
        );
    }

    #[test]
    fn test_losing_last_pointer_disables_cursor() {
        let (mut state, _) = state_with_output();
        let mouse = state
            .devices
            .add_without_keymap(DeviceInfo::new("mouse", DeviceClass::Pointer));
        state.update_capabilities();
        state.pointer_motion(mouse, 0, 1.0, 1.0);
        assert!(state.seat.cursor.is_enabled());
        state.drain_notifications();

        state.remove_input_device(mouse);
        assert!(!state.seat.cursor.is_enabled());
        let notes = state.drain_notifications();
        assert_eq!(
            notes[0],
            Notification::SeatCapabilities {
                capabilities: SeatCapabilities::empty()
            }
        );
        assert!(notes.contains(&Notification::CursorImage { name: None }));
    }
}
