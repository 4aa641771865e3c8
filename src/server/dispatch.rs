//! Core protocol dispatch implementations
//!
//! Implements the Dispatch trait for wl_compositor, wl_surface, shm buffers,
//! the seat and its devices, and wl_output.

use std::sync::atomic::{AtomicI32, Ordering};

use log::{debug, trace, warn};
use wayland_server::backend::ClientId;
use wayland_server::protocol::{
    wl_buffer, wl_callback, wl_compositor, wl_keyboard, wl_output, wl_pointer, wl_region, wl_seat, wl_shm,
    wl_shm_pool, wl_surface, wl_touch,
};
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::compositor::surface::BufferInfo;
use crate::compositor::{OutputId, SurfaceId, SurfaceRole};
use crate::input::keyboard::{REPEAT_DELAY, REPEAT_RATE};

use super::ServerState;

/// wl_shm_pool user data; the pool's memory is never mapped
#[derive(Debug)]
pub struct ShmPoolData {
    size: AtomicI32,
}

impl ServerState {
    /// A wl_surface went away, through a request or a disconnect
    fn surface_gone(&mut self, surface: SurfaceId) {
        if self.resources.surfaces.remove(&surface).is_some() {
            self.resources.attached.remove(&surface);
            self.compositor.surface_destroyed(surface);
        }
    }

    /// The protocol object for a core surface, if it belongs to the same
    /// client as `resource`
    pub(super) fn client_surface(&self, surface: SurfaceId, resource: &impl Resource) -> Option<&wl_surface::WlSurface> {
        self.resources
            .surfaces
            .get(&surface)
            .filter(|s| s.id().same_client_as(&resource.id()))
    }
}

// ============================================================================
// wl_compositor
// ============================================================================

impl Dispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let surface_id = state.compositor.create_surface();
                debug!("Created wl_surface {:?}", surface_id);
                let surface = data_init.init(id, surface_id);
                state.resources.surfaces.insert(surface_id, surface);
            }
            wl_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_surface
// ============================================================================

impl Dispatch<wl_surface::WlSurface, SurfaceId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        surface_id: &SurfaceId,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_surface::Request::Attach { buffer, x, y } => {
                trace!("Surface {:?} attach at ({}, {})", surface_id, x, y);
                let info = buffer.as_ref().and_then(|b| b.data::<BufferInfo>().copied());
                if let Some(surface) = state.compositor.surfaces.get_mut(*surface_id) {
                    surface.attach(info);
                }
                let previous = match buffer {
                    Some(buffer) => state.resources.attached.insert(*surface_id, buffer),
                    None => state.resources.attached.remove(surface_id),
                };
                if let Some(previous) = previous.filter(|b| b.is_alive()) {
                    previous.release();
                }
            }
            wl_surface::Request::Frame { callback } => {
                let callback = data_init.init(callback, ());
                state.resources.frame_callbacks.push(callback);
            }
            wl_surface::Request::SetBufferScale { scale } => {
                if let Some(surface) = state.compositor.surfaces.get_mut(*surface_id) {
                    surface.set_scale(scale);
                }
            }
            wl_surface::Request::Commit => {
                trace!("Surface {:?} commit", surface_id);
                state.compositor.surface_commit(*surface_id);
                // Nothing samples buffer contents, so they are free again at once
                if let Some(buffer) = state.resources.attached.remove(surface_id) {
                    if buffer.is_alive() {
                        buffer.release();
                    }
                }
            }
            wl_surface::Request::Destroy => {
                debug!("Surface {:?} destroy", surface_id);
                state.surface_gone(*surface_id);
            }
            // Damage, regions, transform and offset only matter to a renderer
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &wl_surface::WlSurface, data: &SurfaceId) {
        state.surface_gone(*data);
    }
}

// ============================================================================
// wl_region
// ============================================================================

impl Dispatch<wl_region::WlRegion, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_region::WlRegion,
        _request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // Regions are accepted and ignored
    }
}

// ============================================================================
// wl_callback
// ============================================================================

impl Dispatch<wl_callback::WlCallback, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_callback::WlCallback,
        _request: wl_callback::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // wl_callback has no requests
    }
}

// ============================================================================
// wl_shm
// ============================================================================

impl Dispatch<wl_shm::WlShm, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, fd, size } = request {
            debug!("Creating shm pool, size {}", size);
            drop(fd);
            if size <= 0 {
                resource.post_error(wl_shm::Error::InvalidStride, format!("invalid pool size {}", size));
                return;
            }
            data_init.init(
                id,
                ShmPoolData {
                    size: AtomicI32::new(size),
                },
            );
        }
    }
}

// ============================================================================
// wl_shm_pool
// ============================================================================

impl Dispatch<wl_shm_pool::WlShmPool, ShmPoolData> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        pool: &ShmPoolData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_shm_pool::Request::CreateBuffer {
                id,
                offset,
                width,
                height,
                stride,
                format,
            } => {
                let size = pool.size.load(Ordering::Relaxed) as i64;
                let end = offset as i64 + stride as i64 * height as i64;
                if width <= 0 || height <= 0 || offset < 0 || stride < width.saturating_mul(4) || end > size {
                    warn!(
                        "Rejecting {}x{} buffer (stride {}, offset {}) in a {} byte pool",
                        width, height, stride, offset, size
                    );
                    resource.post_error(wl_shm::Error::InvalidStride, "buffer does not fit the pool".to_string());
                    return;
                }
                trace!("Creating {}x{} buffer, format {:?}", width, height, format);
                data_init.init(id, BufferInfo { width, height });
            }
            wl_shm_pool::Request::Resize { size } => {
                if size < pool.size.load(Ordering::Relaxed) {
                    resource.post_error(wl_shm::Error::InvalidFd, "shm pools cannot shrink".to_string());
                    return;
                }
                pool.size.store(size, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_buffer
// ============================================================================

impl Dispatch<wl_buffer::WlBuffer, BufferInfo> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_buffer::WlBuffer,
        _request: wl_buffer::Request,
        _data: &BufferInfo,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // Only destroy, handled by wayland-server
    }
}

// ============================================================================
// wl_seat
// ============================================================================

impl Dispatch<wl_seat::WlSeat, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_seat::WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                let pointer = data_init.init(id, ());
                state.resources.pointers.push(pointer);
            }
            wl_seat::Request::GetKeyboard { id } => {
                let keyboard = data_init.init(id, ());
                state.keymap.send(&keyboard);
                if keyboard.version() >= 4 {
                    keyboard.repeat_info(REPEAT_RATE, REPEAT_DELAY);
                }
                // Late keyboards of the focused client still need an enter
                let focus = state.compositor.seat.keyboard_focus();
                if let Some(surface) = focus.and_then(|f| state.client_surface(f, &keyboard)) {
                    keyboard.enter(state.compositor.next_serial(), surface, Vec::new());
                }
                state.resources.keyboards.push(keyboard);
            }
            wl_seat::Request::GetTouch { id } => {
                debug!("Client asked for wl_touch without the capability");
                data_init.init(id, ());
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &wl_seat::WlSeat, _data: &()) {
        state.resources.seats.retain(|s| s.id() != resource.id());
    }
}

// ============================================================================
// wl_pointer
// ============================================================================

impl Dispatch<wl_pointer::WlPointer, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wl_pointer::WlPointer,
        request: wl_pointer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_pointer::Request::SetCursor { surface, .. } = request {
            let focus = state.compositor.seat.pointer_focus();
            if focus.and_then(|f| state.client_surface(f, resource)).is_none() {
                trace!("Ignoring set_cursor from a client without pointer focus");
                return;
            }
            if let Some(id) = surface.as_ref().and_then(|s| s.data::<SurfaceId>()) {
                if let Err(e) = state.compositor.surfaces.assign_role(*id, SurfaceRole::Cursor) {
                    resource.post_error(wl_pointer::Error::Role, e.to_string());
                    return;
                }
            }
            state.compositor.client_cursor_set();
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &wl_pointer::WlPointer, _data: &()) {
        state.resources.pointers.retain(|p| p.id() != resource.id());
    }
}

// ============================================================================
// wl_keyboard
// ============================================================================

impl Dispatch<wl_keyboard::WlKeyboard, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_keyboard::WlKeyboard,
        _request: wl_keyboard::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // Only release
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &wl_keyboard::WlKeyboard, _data: &()) {
        state.resources.keyboards.retain(|k| k.id() != resource.id());
    }
}

// ============================================================================
// wl_touch
// ============================================================================

impl Dispatch<wl_touch::WlTouch, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_touch::WlTouch,
        _request: wl_touch::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // Touch is never advertised; the object stays silent
    }
}

// ============================================================================
// wl_output
// ============================================================================

impl Dispatch<wl_output::WlOutput, OutputId> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_output::WlOutput,
        _request: wl_output::Request,
        _data: &OutputId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        // Only release
    }
}
