//! Toplevel windows
//!
//! A toplevel is an application window. Its role-specific protocol
//! operations are routed through [`ToplevelRole`] so that window management
//! code never speaks a particular shell protocol directly.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::geometry::{Point, Rect, Size};
use crate::compositor::scene::NodeId;
use crate::compositor::signal::{Listeners, Signals};
use crate::compositor::SurfaceId;
use crate::protocol::Notification;

/// Unique identifier for toplevels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToplevelId(pub u64);

impl ToplevelId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ToplevelId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags::bitflags! {
    /// States advertised to the client in a configure
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ToplevelStates: u32 {
        const MAXIMIZED = 1 << 0;
        const FULLSCREEN = 1 << 1;
        const RESIZING = 1 << 2;
        const ACTIVATED = 1 << 3;
    }
}

/// Configure state of an xdg_toplevel
#[derive(Debug, Clone, Copy, Default)]
pub struct XdgRole {
    states: ToplevelStates,
    size: Size,
}

/// Protocol backing a toplevel.
///
/// Only xdg-shell windows exist today. X11 windows would join as another
/// variant implementing the same operations.
#[derive(Debug, Clone, Copy)]
pub enum ToplevelRole {
    Xdg(XdgRole),
}

impl ToplevelRole {
    pub fn xdg() -> Self {
        ToplevelRole::Xdg(XdgRole::default())
    }

    pub fn states(&self) -> ToplevelStates {
        match self {
            ToplevelRole::Xdg(xdg) => xdg.states,
        }
    }

    /// Size last requested from the client
    pub fn requested_size(&self) -> Size {
        match self {
            ToplevelRole::Xdg(xdg) => xdg.size,
        }
    }

    fn configure(&self, id: ToplevelId) -> Notification {
        match self {
            ToplevelRole::Xdg(xdg) => Notification::ToplevelConfigure {
                toplevel: id,
                size: xdg.size,
                states: xdg.states,
            },
        }
    }

    fn set_state(&mut self, id: ToplevelId, flag: ToplevelStates, on: bool) -> Notification {
        match self {
            ToplevelRole::Xdg(xdg) => xdg.states.set(flag, on),
        }
        self.configure(id)
    }

    pub fn set_size(&mut self, id: ToplevelId, size: Size) -> Notification {
        match self {
            ToplevelRole::Xdg(xdg) => xdg.size = size,
        }
        self.configure(id)
    }

    pub fn set_activated(&mut self, id: ToplevelId, on: bool) -> Notification {
        self.set_state(id, ToplevelStates::ACTIVATED, on)
    }

    pub fn set_maximized(&mut self, id: ToplevelId, on: bool) -> Notification {
        self.set_state(id, ToplevelStates::MAXIMIZED, on)
    }

    pub fn set_fullscreen(&mut self, id: ToplevelId, on: bool) -> Notification {
        self.set_state(id, ToplevelStates::FULLSCREEN, on)
    }

    pub fn set_resizing(&mut self, id: ToplevelId, on: bool) -> Notification {
        self.set_state(id, ToplevelStates::RESIZING, on)
    }

    /// Ask the client to close the window
    pub fn close(&self, id: ToplevelId) -> Notification {
        match self {
            ToplevelRole::Xdg(_) => Notification::ToplevelClose { toplevel: id },
        }
    }

    /// Configure with the current state, used for the initial handshake and
    /// to answer requests that changed nothing
    pub fn current_configure(&self, id: ToplevelId) -> Notification {
        self.configure(id)
    }
}

/// An application window
#[derive(Debug)]
pub struct Toplevel {
    pub id: ToplevelId,
    pub surface: SurfaceId,
    pub role: ToplevelRole,
    pub title: Option<String>,
    pub app_id: Option<String>,
    /// Position and size in layout coordinates
    pub geometry: Rect,
    /// Geometry seen by the last commit, for change detection
    pub last_committed: Rect,
    /// Visible window bounds within the surface, as set by the client
    pub window_geometry: Option<Rect>,
    pending_window_geometry: Option<Rect>,
    pub maximized: bool,
    pub fullscreen: bool,
    /// Geometry to return to when leaving maximize
    pub saved_maximize: Option<Rect>,
    /// Geometry to return to when leaving fullscreen
    pub saved_fullscreen: Option<Rect>,
    /// States the client asked for before it was mapped
    pub requested_maximized: bool,
    pub requested_fullscreen: bool,
    /// Client size hints; 0 on an axis means unconstrained
    pub min_size: Size,
    pub max_size: Size,
    pub scene_tree: NodeId,
    pub surface_node: NodeId,
    pub mapped: bool,
    /// The initial configure has been sent
    pub configured: bool,
    pub listeners: Listeners,
}

impl Toplevel {
    pub fn new(surface: SurfaceId, scene_tree: NodeId, surface_node: NodeId) -> Self {
        Self {
            id: ToplevelId::new(),
            surface,
            role: ToplevelRole::xdg(),
            title: None,
            app_id: None,
            geometry: Rect::default(),
            last_committed: Rect::default(),
            window_geometry: None,
            pending_window_geometry: None,
            maximized: false,
            fullscreen: false,
            saved_maximize: None,
            saved_fullscreen: None,
            requested_maximized: false,
            requested_fullscreen: false,
            min_size: Size::default(),
            max_size: Size::default(),
            scene_tree,
            surface_node,
            mapped: false,
            configured: false,
            listeners: Listeners::new(Signals::TOPLEVEL_BASE),
        }
    }

    pub fn set_title(&mut self, title: String) {
        self.title = Some(title);
    }

    pub fn set_app_id(&mut self, app_id: String) {
        self.app_id = Some(app_id);
    }

    pub fn set_min_size(&mut self, width: i32, height: i32) {
        self.min_size = Size::new(width.max(0), height.max(0));
    }

    pub fn set_max_size(&mut self, width: i32, height: i32) {
        self.max_size = Size::new(width.max(0), height.max(0));
    }

    /// Double-buffered; takes effect on the next commit
    pub fn set_window_geometry(&mut self, rect: Rect) {
        self.pending_window_geometry = Some(rect);
    }

    pub(crate) fn latch_window_geometry(&mut self) {
        if let Some(rect) = self.pending_window_geometry.take() {
            self.window_geometry = Some(rect);
        }
    }

    /// Window bounds within a buffer of `buffer` size. Without a client
    /// supplied geometry the whole buffer counts.
    pub fn content_box(&self, buffer: Size) -> Rect {
        let full = Rect::from_parts(Point::default(), buffer);
        self.window_geometry
            .and_then(|g| g.intersection(&full))
            .unwrap_or(full)
    }

    /// Maximized or fullscreen windows are not freely movable
    pub fn is_pinned(&self) -> bool {
        self.maximized || self.fullscreen
    }

    pub fn position(&self) -> Point {
        self.geometry.origin()
    }

    /// Clamp a size to the client's hints
    pub fn clamp_size(&self, size: Size) -> Size {
        fn clamp(v: i32, min: i32, max: i32) -> i32 {
            let v = v.max(min.max(1));
            if max > 0 {
                v.min(max.max(min.max(1)))
            } else {
                v
            }
        }
        Size::new(
            clamp(size.width, self.min_size.width, self.max_size.width),
            clamp(size.height, self.min_size.height, self.max_size.height),
        )
    }

    /// Human readable identity for log lines
    pub fn display_name(&self) -> String {
        match (&self.title, &self.app_id) {
            (Some(title), _) => title.clone(),
            (None, Some(app_id)) => app_id.clone(),
            (None, None) => format!("{:?}", self.id),
        }
    }
}
