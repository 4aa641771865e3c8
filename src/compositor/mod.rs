//! Compositor core module
//!
//! This module contains the core compositor logic including:
//! - The scene graph and its stacking bands
//! - Output/display management and layer arrangement
//! - Toplevel, layer, popup and drag icon entities
//! - Focus and window management
//! - The application context tying them to the seat

pub mod drag;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod output;
pub mod popup;
pub mod scene;
pub mod signal;
pub mod state;
pub mod surface;
pub mod toplevel;
pub mod window;

pub use drag::{DataSourceId, DragIconId};
pub use error::{OutputError, SceneError, ShellError};
pub use geometry::{Point, Rect, Size};
pub use layer::{Band, LayerId, LayerSurface};
pub use output::{Output, OutputDescriptor, OutputId, OutputManager, OutputMode};
pub use popup::{Popup, PopupId, PopupParent, Positioner};
pub use scene::{NodeId, NodeOwner, SceneGraph, SceneLayer};
pub use state::CompositorState;
pub use surface::{Surface, SurfaceId, SurfaceManager, SurfaceRole};
pub use toplevel::{Toplevel, ToplevelId, ToplevelStates};
pub use window::WindowManager;
