//! Window management
//!
//! The single source of truth for what is focused. Owns every shell
//! entity, the mapped-toplevel list in most-recently-focused order and the
//! count of fullscreen toplevels.

use std::collections::HashMap;

use log::debug;

use crate::compositor::drag::{DragIcon, DragIconId};
use crate::compositor::layer::{LayerId, LayerSurface};
use crate::compositor::popup::{Popup, PopupId, PopupParent};
use crate::compositor::scene::NodeOwner;
use crate::compositor::toplevel::{Toplevel, ToplevelId};
use crate::compositor::SurfaceId;

/// Result of moving toplevel focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
    /// Previously focused toplevel, to be deactivated
    pub deactivated: Option<ToplevelId>,
    /// Newly focused toplevel, to be raised and activated
    pub activated: ToplevelId,
    /// Whether keyboard focus should follow; false while a layer holds it
    pub keyboard: bool,
}

/// Manager for all shell entities and focus
#[derive(Debug, Default)]
pub struct WindowManager {
    toplevels: HashMap<ToplevelId, Toplevel>,
    layers: HashMap<LayerId, LayerSurface>,
    popups: HashMap<PopupId, Popup>,
    drag_icons: HashMap<DragIconId, DragIcon>,
    /// Role entity for each surface
    owners: HashMap<SurfaceId, NodeOwner>,
    /// Mapped toplevels, least recently focused first
    mapped: Vec<ToplevelId>,
    focused_toplevel: Option<ToplevelId>,
    focused_layer: Option<LayerId>,
    fullscreen_count: usize,
}

impl WindowManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_toplevel(&mut self, toplevel: Toplevel) -> ToplevelId {
        let id = toplevel.id;
        self.owners.insert(toplevel.surface, NodeOwner::Toplevel(id));
        self.toplevels.insert(id, toplevel);
        id
    }

    pub fn toplevel(&self, id: ToplevelId) -> Option<&Toplevel> {
        self.toplevels.get(&id)
    }

    pub fn toplevel_mut(&mut self, id: ToplevelId) -> Option<&mut Toplevel> {
        self.toplevels.get_mut(&id)
    }

    /// Remove a toplevel from the arena. Focus and the mapped list must
    /// already have been updated by unmapping it.
    pub fn remove_toplevel(&mut self, id: ToplevelId) -> Option<Toplevel> {
        let toplevel = self.toplevels.remove(&id)?;
        self.owners.remove(&toplevel.surface);
        self.mapped.retain(|t| *t != id);
        if self.focused_toplevel == Some(id) {
            self.focused_toplevel = None;
        }
        Some(toplevel)
    }

    pub fn toplevels(&self) -> impl Iterator<Item = &Toplevel> {
        self.toplevels.values()
    }

    pub fn insert_layer(&mut self, layer: LayerSurface) -> LayerId {
        let id = layer.id;
        self.owners.insert(layer.surface, NodeOwner::Layer(id));
        self.layers.insert(id, layer);
        id
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerSurface> {
        self.layers.get(&id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut LayerSurface> {
        self.layers.get_mut(&id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<LayerSurface> {
        let layer = self.layers.remove(&id)?;
        self.owners.remove(&layer.surface);
        if self.focused_layer == Some(id) {
            self.focused_layer = None;
        }
        Some(layer)
    }

    pub fn insert_popup(&mut self, popup: Popup) -> PopupId {
        let id = popup.id;
        self.owners.insert(popup.surface, NodeOwner::Popup(id));
        self.popups.insert(id, popup);
        id
    }

    pub fn popup(&self, id: PopupId) -> Option<&Popup> {
        self.popups.get(&id)
    }

    pub fn popup_mut(&mut self, id: PopupId) -> Option<&mut Popup> {
        self.popups.get_mut(&id)
    }

    pub fn remove_popup(&mut self, id: PopupId) -> Option<Popup> {
        let popup = self.popups.remove(&id)?;
        self.owners.remove(&popup.surface);
        Some(popup)
    }

    /// Popups owned by a toplevel or layer, parents before children
    pub fn popups_of(&self, parent: PopupParent) -> Vec<PopupId> {
        let mut ids: Vec<PopupId> = self
            .popups
            .values()
            .filter(|p| p.parent == parent)
            .map(|p| p.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Popups nested directly in another popup
    pub fn child_popups(&self, parent: PopupId) -> Vec<PopupId> {
        let mut ids: Vec<PopupId> = self
            .popups
            .values()
            .filter(|p| p.parent_popup == Some(parent))
            .map(|p| p.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    pub fn insert_drag_icon(&mut self, icon: DragIcon) -> DragIconId {
        let id = icon.id;
        self.owners.insert(icon.surface, NodeOwner::DragIcon(id));
        self.drag_icons.insert(id, icon);
        id
    }

    pub fn drag_icon(&self, id: DragIconId) -> Option<&DragIcon> {
        self.drag_icons.get(&id)
    }

    pub fn remove_drag_icon(&mut self, id: DragIconId) -> Option<DragIcon> {
        let icon = self.drag_icons.remove(&id)?;
        self.owners.remove(&icon.surface);
        Some(icon)
    }

    /// Role entity a surface belongs to
    pub fn owner_of_surface(&self, surface: SurfaceId) -> Option<NodeOwner> {
        self.owners.get(&surface).copied()
    }

    /// Mapped toplevels, least recently focused first
    pub fn mapped(&self) -> &[ToplevelId] {
        &self.mapped
    }

    pub fn focused_toplevel(&self) -> Option<ToplevelId> {
        self.focused_toplevel
    }

    pub fn focused_layer(&self) -> Option<LayerId> {
        self.focused_layer
    }

    pub fn add_mapped(&mut self, id: ToplevelId) {
        if !self.mapped.contains(&id) {
            self.mapped.push(id);
        }
    }

    /// Drop a toplevel from the mapped list. If it held focus, focus is
    /// cleared and the toplevel that should inherit it is returned.
    pub fn remove_mapped(&mut self, id: ToplevelId) -> Option<ToplevelId> {
        self.mapped.retain(|t| *t != id);
        if self.focused_toplevel == Some(id) {
            self.focused_toplevel = None;
            return self.mapped.last().copied();
        }
        None
    }

    /// Make `id` the focused toplevel, moving it to the end of the mapped
    /// list. Returns `None` if it already has focus or is not mapped.
    pub fn focus_toplevel(&mut self, id: ToplevelId) -> Option<FocusChange> {
        if self.focused_toplevel == Some(id) {
            return None;
        }
        let pos = self.mapped.iter().position(|t| *t == id)?;
        self.mapped.remove(pos);
        self.mapped.push(id);

        let deactivated = self.focused_toplevel.replace(id);
        debug!("Toplevel focus {:?} -> {:?}", deactivated, id);
        Some(FocusChange {
            deactivated,
            activated: id,
            keyboard: self.focused_layer.is_none(),
        })
    }

    /// Give a layer keyboard priority; returns false if it already had it
    pub fn focus_layer(&mut self, id: LayerId) -> bool {
        if self.focused_layer == Some(id) {
            return false;
        }
        debug!("Layer focus {:?} -> {:?}", self.focused_layer, id);
        self.focused_layer = Some(id);
        true
    }

    pub fn unfocus_layer(&mut self) -> Option<LayerId> {
        self.focused_layer.take()
    }

    /// Toplevel the window cycle moves to: the least recently focused
    pub fn cycle_target(&self) -> Option<ToplevelId> {
        if self.mapped.len() < 2 {
            return None;
        }
        self.mapped.first().copied()
    }

    /// Count a toplevel entering fullscreen; true on the 0 -> 1 transition
    pub fn acquire_fullscreen(&mut self) -> bool {
        self.fullscreen_count += 1;
        self.fullscreen_count == 1
    }

    /// Count a toplevel leaving fullscreen; true on the 1 -> 0 transition
    pub fn release_fullscreen(&mut self) -> bool {
        if self.fullscreen_count == 0 {
            return false;
        }
        self.fullscreen_count -= 1;
        self.fullscreen_count == 0
    }

    pub fn fullscreen_count(&self) -> usize {
        self.fullscreen_count
    }
}
