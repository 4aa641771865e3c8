//! Surface management
//!
//! Bookkeeping for client `wl_surface`s: the double-buffered buffer size
//! and the role the surface was given. Everything that decides where or
//! whether a surface is shown lives in the role entities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::error::ShellError;
use crate::compositor::geometry::Size;

/// Unique identifier for surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SurfaceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Buffer information attached to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Width in buffer pixels
    pub width: i32,
    /// Height in buffer pixels
    pub height: i32,
}

/// Pending attach state; `None` means nothing was attached since the last
/// commit, `Some(None)` means a null buffer was attached
#[derive(Debug, Default)]
pub struct SurfacePendingState {
    pub buffer: Option<Option<BufferInfo>>,
    pub scale: Option<i32>,
}

/// Surface role determines how the surface is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceRole {
    /// No role assigned yet
    #[default]
    None,
    XdgToplevel,
    XdgPopup,
    LayerSurface,
    Cursor,
    DragIcon,
}

/// A Wayland surface
#[derive(Debug)]
pub struct Surface {
    pub id: SurfaceId,
    /// Currently committed buffer
    pub buffer: Option<BufferInfo>,
    /// Buffer scale factor (default 1)
    pub scale: i32,
    pub pending: SurfacePendingState,
    pub role: SurfaceRole,
}

impl Surface {
    pub fn new() -> Self {
        Self {
            id: SurfaceId::new(),
            buffer: None,
            scale: 1,
            pending: SurfacePendingState::default(),
            role: SurfaceRole::None,
        }
    }

    /// Attach a buffer to the pending state
    pub fn attach(&mut self, buffer: Option<BufferInfo>) {
        self.pending.buffer = Some(buffer);
    }

    pub fn set_scale(&mut self, scale: i32) {
        self.pending.scale = Some(scale.max(1));
    }

    /// Apply pending state. Returns whether a buffer is now attached.
    pub fn commit(&mut self) -> bool {
        if let Some(buffer) = self.pending.buffer.take() {
            self.buffer = buffer;
        }
        if let Some(scale) = self.pending.scale.take() {
            self.scale = scale;
        }
        self.buffer.is_some()
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Committed size in surface-local (logical) coordinates
    pub fn size(&self) -> Size {
        self.buffer
            .map(|b| Size::new(b.width / self.scale, b.height / self.scale))
            .unwrap_or_default()
    }

    /// Assign a role; re-assigning the same role is allowed
    pub fn set_role(&mut self, role: SurfaceRole) -> Result<(), ShellError> {
        if self.role != SurfaceRole::None && self.role != role {
            return Err(ShellError::RoleAlreadySet(self.id));
        }
        self.role = role;
        Ok(())
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

/// Manager for all surfaces
#[derive(Debug, Default)]
pub struct SurfaceManager {
    surfaces: HashMap<SurfaceId, Surface>,
}

impl SurfaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_surface(&mut self) -> SurfaceId {
        let surface = Surface::new();
        let id = surface.id;
        self.surfaces.insert(id, surface);
        id
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        self.surfaces.remove(&id)
    }

    /// Give a surface its role, failing if it has another one
    pub fn assign_role(&mut self, id: SurfaceId, role: SurfaceRole) -> Result<(), ShellError> {
        self.surfaces
            .get_mut(&id)
            .ok_or(ShellError::InvalidSurface(id))?
            .set_role(role)
    }

    pub fn size(&self, id: SurfaceId) -> Size {
        self.get(id).map(Surface::size).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_id_unique() {
        let id1 = SurfaceId::new();
        let id2 = SurfaceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_commit_applies_pending() {
        let mut surface = Surface::new();
        surface.attach(Some(BufferInfo {
            width: 200,
            height: 100,
        }));
        assert!(!surface.has_buffer());
        assert!(surface.commit());
        assert_eq!(surface.size(), Size::new(200, 100));

        // A commit with nothing attached keeps the current buffer
        assert!(surface.commit());

        surface.set_scale(2);
        surface.commit();
        assert_eq!(surface.size(), Size::new(100, 50));

        surface.attach(None);
        assert!(!surface.commit());
        assert_eq!(surface.size(), Size::default());
    }

    #[test]
    fn test_surface_role() {
        let mut manager = SurfaceManager::new();
        let id = manager.create_surface();
        assert!(manager.assign_role(id, SurfaceRole::XdgToplevel).is_ok());
        assert!(manager.assign_role(id, SurfaceRole::XdgToplevel).is_ok());
        assert_eq!(
            manager.assign_role(id, SurfaceRole::XdgPopup),
            Err(ShellError::RoleAlreadySet(id))
        );
        manager.remove(id);
        assert_eq!(
            manager.assign_role(id, SurfaceRole::LayerSurface),
            Err(ShellError::InvalidSurface(id))
        );
    }
}
