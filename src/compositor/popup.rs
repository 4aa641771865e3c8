//! Popups
//!
//! Transient surfaces (menus, tooltips) placed by an xdg_positioner
//! relative to a toplevel or a layer surface, and kept inside the bounds
//! of the output their owner is on.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::geometry::{Point, Rect};
use crate::compositor::output::OutputManager;
use crate::compositor::scene::NodeId;
use crate::compositor::signal::{Listeners, Signals};
use crate::compositor::window::WindowManager;
use crate::compositor::{LayerId, SurfaceId, ToplevelId};

/// Unique identifier for popups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupId(pub u64);

impl PopupId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        PopupId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Anchor edge for popup positioning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Anchor {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

/// Gravity for popup positioning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gravity {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

impl Anchor {
    /// xdg_positioner.anchor wire value
    pub fn from_protocol(value: u32) -> Self {
        match value {
            1 => Anchor::Top,
            2 => Anchor::Bottom,
            3 => Anchor::Left,
            4 => Anchor::Right,
            5 => Anchor::TopLeft,
            6 => Anchor::BottomLeft,
            7 => Anchor::TopRight,
            8 => Anchor::BottomRight,
            _ => Anchor::None,
        }
    }
}

impl Gravity {
    /// xdg_positioner.gravity wire value
    pub fn from_protocol(value: u32) -> Self {
        match value {
            1 => Gravity::Top,
            2 => Gravity::Bottom,
            3 => Gravity::Left,
            4 => Gravity::Right,
            5 => Gravity::TopLeft,
            6 => Gravity::BottomLeft,
            7 => Gravity::TopRight,
            8 => Gravity::BottomRight,
            _ => Gravity::None,
        }
    }
}

/// Placement rules for a popup, in parent-surface coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Positioner {
    pub size: (i32, i32),
    pub anchor_rect: Rect,
    pub anchor: Anchor,
    pub gravity: Gravity,
    pub offset: (i32, i32),
}

impl Positioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.size = (width, height);
    }

    pub fn set_anchor_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.anchor_rect = Rect::new(x, y, width, height);
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.gravity = gravity;
    }

    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    /// Unconstrained popup box relative to the parent surface
    pub fn geometry(&self) -> Rect {
        let Rect {
            x: ax,
            y: ay,
            width: aw,
            height: ah,
        } = self.anchor_rect;

        let (anchor_x, anchor_y) = match self.anchor {
            Anchor::None => (ax + aw / 2, ay + ah / 2),
            Anchor::Top => (ax + aw / 2, ay),
            Anchor::Bottom => (ax + aw / 2, ay + ah),
            Anchor::Left => (ax, ay + ah / 2),
            Anchor::Right => (ax + aw, ay + ah / 2),
            Anchor::TopLeft => (ax, ay),
            Anchor::TopRight => (ax + aw, ay),
            Anchor::BottomLeft => (ax, ay + ah),
            Anchor::BottomRight => (ax + aw, ay + ah),
        };

        let (w, h) = self.size;
        let (x, y) = match self.gravity {
            Gravity::None => (anchor_x - w / 2, anchor_y - h / 2),
            Gravity::Top => (anchor_x - w / 2, anchor_y - h),
            Gravity::Bottom => (anchor_x - w / 2, anchor_y),
            Gravity::Left => (anchor_x - w, anchor_y - h / 2),
            Gravity::Right => (anchor_x, anchor_y - h / 2),
            Gravity::TopLeft => (anchor_x - w, anchor_y - h),
            Gravity::TopRight => (anchor_x, anchor_y - h),
            Gravity::BottomLeft => (anchor_x - w, anchor_y),
            Gravity::BottomRight => (anchor_x, anchor_y),
        };

        Rect::new(x + self.offset.0, y + self.offset.1, w, h)
    }
}

/// The surface a popup ultimately belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopupParent {
    Toplevel(ToplevelId),
    Layer(LayerId),
}

impl PopupParent {
    /// Layout position of the owner's surface origin
    pub fn origin(&self, windows: &WindowManager) -> Option<Point> {
        match *self {
            PopupParent::Toplevel(id) => windows.toplevel(id).map(|t| t.geometry.origin()),
            PopupParent::Layer(id) => windows.layer(id).map(|l| l.geometry.origin()),
        }
    }

    /// Bounds of the owner's output, in owner-local coordinates
    pub fn unconstrain_box(&self, windows: &WindowManager, outputs: &OutputManager) -> Option<Rect> {
        let (origin, output) = match *self {
            PopupParent::Toplevel(id) => {
                let toplevel = windows.toplevel(id)?;
                let center = toplevel.geometry.center();
                let output = outputs.output_at_or_primary(center.x as f64, center.y as f64)?;
                (toplevel.geometry.origin(), output)
            }
            PopupParent::Layer(id) => {
                let layer = windows.layer(id)?;
                (layer.geometry.origin(), layer.output?)
            }
        };
        let bounds = outputs.get(output)?.geometry();
        Some(bounds.translate(-origin.x, -origin.y))
    }
}

/// An xdg_popup
#[derive(Debug)]
pub struct Popup {
    pub id: PopupId,
    pub surface: SurfaceId,
    pub parent: PopupParent,
    /// Popup this one is nested in, if any
    pub parent_popup: Option<PopupId>,
    /// Offset of the xdg parent surface from the owner's origin
    pub offset: Point,
    pub positioner: Positioner,
    /// Constrained box relative to the xdg parent surface
    pub geometry: Rect,
    pub scene_tree: NodeId,
    pub surface_node: NodeId,
    pub mapped: bool,
    pub configured: bool,
    pub listeners: Listeners,
}

impl Popup {
    pub fn new(
        surface: SurfaceId,
        parent: PopupParent,
        parent_popup: Option<PopupId>,
        offset: Point,
        positioner: Positioner,
        scene_tree: NodeId,
        surface_node: NodeId,
    ) -> Self {
        Self {
            id: PopupId::new(),
            surface,
            parent,
            parent_popup,
            offset,
            positioner,
            geometry: positioner.geometry(),
            scene_tree,
            surface_node,
            mapped: false,
            configured: false,
            listeners: Listeners::new(Signals::POPUP_BASE),
        }
    }

    /// Re-place the popup inside `bounds` (owner-local). Returns whether
    /// its geometry changed.
    pub fn unconstrain(&mut self, bounds: Rect) -> bool {
        let desired = self.positioner.geometry().translate(self.offset.x, self.offset.y);
        let placed = desired
            .constrain_within(&bounds)
            .translate(-self.offset.x, -self.offset.y);
        let changed = placed != self.geometry;
        self.geometry = placed;
        changed
    }
}
