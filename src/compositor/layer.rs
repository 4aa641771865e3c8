//! Layer shell surfaces
//!
//! Panels, wallpapers, lock screens and notifications: surfaces that live
//! in one of four stacking bands on a single output and may reserve part of
//! it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::geometry::{Rect, Size};
use crate::compositor::scene::{NodeId, SceneLayer};
use crate::compositor::signal::{Listeners, Signals};
use crate::compositor::{OutputId, SurfaceId};

/// Unique identifier for layer surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

impl LayerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        LayerId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Layer shell stacking band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Band {
    /// Background layer (below everything)
    Background,
    /// Bottom layer (below windows)
    #[default]
    Bottom,
    /// Top layer (above windows)
    Top,
    /// Overlay layer (above everything)
    Overlay,
}

impl Band {
    /// Arrangement order
    pub const ALL: [Band; 4] = [Band::Background, Band::Bottom, Band::Top, Band::Overlay];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn from_protocol(value: u32) -> Option<Self> {
        match value {
            0 => Some(Band::Background),
            1 => Some(Band::Bottom),
            2 => Some(Band::Top),
            3 => Some(Band::Overlay),
            _ => None,
        }
    }

    pub fn to_protocol(self) -> u32 {
        self as u32
    }

    /// Scene tree this band's surfaces are placed in
    pub fn scene_layer(self) -> SceneLayer {
        match self {
            Band::Background => SceneLayer::Background,
            Band::Bottom => SceneLayer::Bottom,
            Band::Top => SceneLayer::Top,
            Band::Overlay => SceneLayer::Overlay,
        }
    }

    /// Scene tree for popups of this band's surfaces. Popups of the lower
    /// bands are lifted above toplevels.
    pub fn popup_scene_layer(self) -> SceneLayer {
        match self {
            Band::Overlay => SceneLayer::Overlay,
            Band::Background | Band::Bottom | Band::Top => SceneLayer::Top,
        }
    }
}

// Edge anchoring for layer surfaces
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Anchor: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

/// Keyboard interactivity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyboardInteractivity {
    /// No keyboard focus
    #[default]
    None,
    /// Exclusive keyboard focus (locks keyboard)
    Exclusive,
    /// On-demand keyboard focus
    OnDemand,
}

impl KeyboardInteractivity {
    pub fn from_protocol(value: u32) -> Option<Self> {
        match value {
            0 => Some(KeyboardInteractivity::None),
            1 => Some(KeyboardInteractivity::Exclusive),
            2 => Some(KeyboardInteractivity::OnDemand),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margin {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

/// Double-buffered state a client sets on its layer surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerState {
    pub band: Band,
    /// Requested size; 0 on an axis means "stretch between anchors"
    pub desired_size: Size,
    pub anchor: Anchor,
    /// Space to reserve; -1 asks to ignore other surfaces' reservations
    pub exclusive_zone: i32,
    pub margin: Margin,
    pub keyboard_interactivity: KeyboardInteractivity,
}

/// A layer shell surface
#[derive(Debug)]
pub struct LayerSurface {
    pub id: LayerId,
    pub surface: SurfaceId,
    /// Namespace (application identifier)
    pub namespace: String,
    /// Output the surface lives on; `None` once that output is gone
    pub output: Option<OutputId>,
    /// Band whose scene tree and output list currently hold this surface
    pub band: Band,
    pub current: LayerState,
    pub pending: LayerState,
    /// Box computed by the last arrangement, in layout coordinates
    pub geometry: Rect,
    /// Geometry seen by the last commit, for change detection
    pub last_committed: Rect,
    pub scene_tree: NodeId,
    pub surface_node: NodeId,
    pub mapped: bool,
    /// The initial commit has been seen and the surface takes part in
    /// arrangement
    pub configured: bool,
    /// Size last sent in a configure
    pub configured_size: Option<Size>,
    pub listeners: Listeners,
}

impl LayerSurface {
    pub fn new(
        surface: SurfaceId,
        output: Option<OutputId>,
        band: Band,
        namespace: String,
        scene_tree: NodeId,
        surface_node: NodeId,
    ) -> Self {
        let state = LayerState {
            band,
            ..LayerState::default()
        };
        Self {
            id: LayerId::new(),
            surface,
            namespace,
            output,
            band,
            current: state,
            pending: state,
            geometry: Rect::default(),
            last_committed: Rect::default(),
            scene_tree,
            surface_node,
            mapped: false,
            configured: false,
            configured_size: None,
            listeners: Listeners::new(Signals::LAYER_BASE),
        }
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.pending.desired_size = Size::new(width, height);
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.pending.anchor = anchor;
    }

    pub fn set_exclusive_zone(&mut self, zone: i32) {
        self.pending.exclusive_zone = zone;
    }

    pub fn set_margin(&mut self, top: i32, right: i32, bottom: i32, left: i32) {
        self.pending.margin = Margin {
            top,
            right,
            bottom,
            left,
        };
    }

    pub fn set_band(&mut self, band: Band) {
        self.pending.band = band;
    }

    pub fn set_keyboard_interactivity(&mut self, mode: KeyboardInteractivity) {
        self.pending.keyboard_interactivity = mode;
    }

    /// Latch pending state; returns whether anything changed
    pub fn apply_pending(&mut self) -> bool {
        let changed = self.current != self.pending;
        self.current = self.pending;
        changed
    }

    /// Whether this surface may hold keyboard focus
    pub fn is_focusable(&self) -> bool {
        self.current.keyboard_interactivity != KeyboardInteractivity::None
    }

    /// Whether mapping this surface should pull keyboard focus to it
    pub fn grabs_focus_on_map(&self) -> bool {
        self.is_focusable() && self.band >= Band::Top
    }

    /// Compute this surface's box on an output and reserve its exclusive
    /// zone from `usable`. Returns `None` when the requested size cannot be
    /// satisfied, in which case the surface must be closed.
    pub fn arrange(&self, full: Rect, usable: &mut Rect) -> Option<Rect> {
        let state = &self.current;
        let bounds = if state.exclusive_zone == -1 { full } else { *usable };
        let anchor = state.anchor;
        let margin = state.margin;
        let mut rect = Rect::new(0, 0, state.desired_size.width, state.desired_size.height);

        let horiz = Anchor::LEFT | Anchor::RIGHT;
        if rect.width == 0 {
            rect.x = bounds.x + margin.left;
            rect.width = bounds.width - (margin.left + margin.right);
        } else if anchor.contains(horiz) {
            rect.x = bounds.x + bounds.width / 2 - rect.width / 2;
        } else if anchor.contains(Anchor::LEFT) {
            rect.x = bounds.x + margin.left;
        } else if anchor.contains(Anchor::RIGHT) {
            rect.x = bounds.right() - rect.width - margin.right;
        } else {
            rect.x = bounds.x + bounds.width / 2 - rect.width / 2;
        }

        let vert = Anchor::TOP | Anchor::BOTTOM;
        if rect.height == 0 {
            rect.y = bounds.y + margin.top;
            rect.height = bounds.height - (margin.top + margin.bottom);
        } else if anchor.contains(vert) {
            rect.y = bounds.y + bounds.height / 2 - rect.height / 2;
        } else if anchor.contains(Anchor::TOP) {
            rect.y = bounds.y + margin.top;
        } else if anchor.contains(Anchor::BOTTOM) {
            rect.y = bounds.bottom() - rect.height - margin.bottom;
        } else {
            rect.y = bounds.y + bounds.height / 2 - rect.height / 2;
        }

        if rect.width < 0 || rect.height < 0 {
            return None;
        }

        if self.mapped && state.exclusive_zone > 0 {
            reserve(usable, anchor, state.exclusive_zone, margin);
        }

        Some(rect)
    }
}

/// Shrink `usable` by an exclusive zone on the edge the surface is
/// anchored to. Surfaces not clearly attached to one edge reserve nothing.
fn reserve(usable: &mut Rect, anchor: Anchor, zone: i32, margin: Margin) {
    let top = Anchor::TOP;
    let bottom = Anchor::BOTTOM;
    let left = Anchor::LEFT;
    let right = Anchor::RIGHT;
    let horiz = left | right;
    let vert = top | bottom;

    if anchor == top || anchor == top | horiz {
        let amount = zone + margin.top;
        usable.y += amount;
        usable.height -= amount;
    } else if anchor == bottom || anchor == bottom | horiz {
        usable.height -= zone + margin.bottom;
    } else if anchor == left || anchor == left | vert {
        let amount = zone + margin.left;
        usable.x += amount;
        usable.width -= amount;
    } else if anchor == right || anchor == right | vert {
        usable.width -= zone + margin.right;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::scene::NodeId;

    fn layer(band: Band) -> LayerSurface {
        LayerSurface::new(
            SurfaceId(1),
            None,
            band,
            "test".to_string(),
            NodeId(0),
            NodeId(0),
        )
    }

    #[test]
    fn test_band_protocol() {
        assert_eq!(Band::from_protocol(0), Some(Band::Background));
        assert_eq!(Band::Top.to_protocol(), 2);
        assert_eq!(Band::from_protocol(7), None);
        assert!(Band::Overlay > Band::Top);
    }

    #[test]
    fn test_panel_reserves_top_strip() {
        let mut panel = layer(Band::Top);
        panel.set_anchor(Anchor::TOP | Anchor::LEFT | Anchor::RIGHT);
        panel.set_size(0, 30);
        panel.set_exclusive_zone(30);
        panel.apply_pending();
        panel.mapped = true;

        let full = Rect::new(0, 0, 1920, 1080);
        let mut usable = full;
        let rect = panel.arrange(full, &mut usable).unwrap();
        assert_eq!(rect, Rect::new(0, 0, 1920, 30));
        assert_eq!(usable, Rect::new(0, 30, 1920, 1050));
    }

    #[test]
    fn test_unmapped_surface_reserves_nothing() {
        let mut panel = layer(Band::Top);
        panel.set_anchor(Anchor::BOTTOM);
        panel.set_size(200, 40);
        panel.set_exclusive_zone(40);
        panel.apply_pending();

        let full = Rect::new(0, 0, 1000, 800);
        let mut usable = full;
        let rect = panel.arrange(full, &mut usable).unwrap();
        assert_eq!(rect, Rect::new(400, 760, 200, 40));
        assert_eq!(usable, full);
    }

    #[test]
    fn test_exclusive_zone_minus_one_uses_full_area() {
        let mut wallpaper = layer(Band::Background);
        wallpaper.set_anchor(Anchor::all());
        wallpaper.set_exclusive_zone(-1);
        wallpaper.apply_pending();
        wallpaper.mapped = true;

        let full = Rect::new(0, 0, 1000, 800);
        let mut usable = Rect::new(0, 30, 1000, 770);
        let rect = wallpaper.arrange(full, &mut usable).unwrap();
        assert_eq!(rect, full);
        assert_eq!(usable, Rect::new(0, 30, 1000, 770));
    }

    #[test]
    fn test_impossible_size_is_rejected() {
        let mut bad = layer(Band::Top);
        bad.set_margin(600, 0, 600, 0);
        bad.apply_pending();
        let full = Rect::new(0, 0, 1000, 800);
        let mut usable = full;
        assert!(bad.arrange(full, &mut usable).is_none());
    }

    #[test]
    fn test_left_dock_with_margin() {
        let mut dock = layer(Band::Bottom);
        dock.set_anchor(Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM);
        dock.set_size(48, 0);
        dock.set_exclusive_zone(48);
        dock.set_margin(0, 0, 0, 4);
        dock.apply_pending();
        dock.mapped = true;

        let full = Rect::new(0, 0, 1000, 800);
        let mut usable = full;
        let rect = dock.arrange(full, &mut usable).unwrap();
        assert_eq!(rect, Rect::new(4, 0, 48, 800));
        assert_eq!(usable, Rect::new(52, 0, 948, 800));
    }

    #[test]
    fn test_focus_rules() {
        let mut lock = layer(Band::Overlay);
        assert!(!lock.is_focusable());
        lock.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);
        assert!(lock.apply_pending());
        assert!(lock.is_focusable());
        assert!(lock.grabs_focus_on_map());

        let mut bg = layer(Band::Background);
        bg.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
        bg.apply_pending();
        assert!(bg.is_focusable());
        assert!(!bg.grabs_focus_on_map());
    }
}
