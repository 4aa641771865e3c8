//! Drag and drop
//!
//! A drag may carry an icon surface that follows the cursor. Starting a
//! drag is only allowed while the pointer button that began it is still
//! held, which the originating press serial proves.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::scene::NodeId;
use crate::compositor::signal::{Listeners, Signals};
use crate::compositor::SurfaceId;

/// Unique identifier for drag icons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DragIconId(pub u64);

impl DragIconId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        DragIconId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifier of a wl_data_source, minted by the server glue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataSourceId(pub u64);

impl DataSourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        DataSourceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for DataSourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Icon shown under the cursor during a drag
#[derive(Debug)]
pub struct DragIcon {
    pub id: DragIconId,
    pub surface: SurfaceId,
    pub scene_tree: NodeId,
    pub surface_node: NodeId,
    pub listeners: Listeners,
}

impl DragIcon {
    pub fn new(surface: SurfaceId, scene_tree: NodeId, surface_node: NodeId) -> Self {
        Self {
            id: DragIconId::new(),
            surface,
            scene_tree,
            surface_node,
            listeners: Listeners::new(Signals::DESTROY | Signals::COMMIT),
        }
    }
}

/// A drag in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    pub source: Option<DataSourceId>,
    pub origin: SurfaceId,
    pub icon: Option<DragIconId>,
}

/// Why a drag start was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DragRejection {
    #[error("no pointer button is held")]
    NoButtonHeld,
    #[error("serial {given} does not match the last press ({expected:?})")]
    SerialMismatch { given: u32, expected: Option<u32> },
    #[error("a drag is already in progress")]
    AlreadyDragging,
}

/// Check a start_drag request against the pointer's grab state
pub fn validate_start(
    pressed_buttons: usize,
    last_press_serial: Option<u32>,
    serial: u32,
    dragging: bool,
) -> Result<(), DragRejection> {
    if dragging {
        return Err(DragRejection::AlreadyDragging);
    }
    if pressed_buttons == 0 {
        return Err(DragRejection::NoButtonHeld);
    }
    if last_press_serial != Some(serial) {
        return Err(DragRejection::SerialMismatch {
            given: serial,
            expected: last_press_serial,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_start() {
        assert_eq!(validate_start(1, Some(7), 7, false), Ok(()));
        assert_eq!(
            validate_start(0, Some(7), 7, false),
            Err(DragRejection::NoButtonHeld)
        );
        assert_eq!(
            validate_start(1, Some(7), 6, false),
            Err(DragRejection::SerialMismatch {
                given: 6,
                expected: Some(7)
            })
        );
        assert_eq!(
            validate_start(1, Some(7), 7, true),
            Err(DragRejection::AlreadyDragging)
        );
    }
}
