//! Compositor core errors

use crate::compositor::scene::NodeId;
use crate::compositor::{LayerId, OutputId, PopupId, SurfaceId, ToplevelId};

/// Scene graph errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("scene node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("cannot reparent {node:?} under its own descendant {parent:?}")]
    Cycle { node: NodeId, parent: NodeId },
    #[error("scene node {0:?} is a root and cannot be moved")]
    Root(NodeId),
}

/// Output registration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("output {0} offers no display mode")]
    NoMode(String),
    #[error("output {0} is already part of the layout")]
    AlreadyRegistered(String),
    #[error("output {0:?} does not exist")]
    Unknown(OutputId),
}

/// Errors from shell-role bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShellError {
    #[error("surface {0:?} does not exist")]
    InvalidSurface(SurfaceId),
    #[error("surface {0:?} already has a different role")]
    RoleAlreadySet(SurfaceId),
    #[error("toplevel {0:?} does not exist")]
    UnknownToplevel(ToplevelId),
    #[error("layer {0:?} does not exist")]
    UnknownLayer(LayerId),
    #[error("popup {0:?} does not exist")]
    UnknownPopup(PopupId),
    #[error("popup parent is gone")]
    MissingParent,
    #[error("no output is available for layer surface {0}")]
    NoOutput(String),
    #[error("failed to create scene representation: {0}")]
    Scene(#[from] SceneError),
}
