//! Wayland global registry implementations
//!
//! Implements GlobalDispatch for advertising globals to clients.

use log::{debug, info};
use wayland_protocols::wp::pointer_gestures::zv1::server::zwp_pointer_gestures_v1;
use wayland_protocols::xdg::shell::server::xdg_wm_base;
use wayland_protocols_wlr::layer_shell::v1::server::zwlr_layer_shell_v1;
use wayland_server::protocol::{wl_compositor, wl_data_device_manager, wl_output, wl_seat, wl_shm};
use wayland_server::{Client, DataInit, DisplayHandle, GlobalDispatch, New, Resource};

use crate::compositor::OutputId;

use super::ServerState;

/// Create every global except wl_output
pub(super) fn register(dh: &DisplayHandle) {
    dh.create_global::<ServerState, wl_compositor::WlCompositor, _>(6, ());
    dh.create_global::<ServerState, wl_shm::WlShm, _>(1, ());
    dh.create_global::<ServerState, wl_seat::WlSeat, _>(7, ());
    dh.create_global::<ServerState, xdg_wm_base::XdgWmBase, _>(6, ());
    dh.create_global::<ServerState, zwlr_layer_shell_v1::ZwlrLayerShellV1, _>(4, ());
    dh.create_global::<ServerState, wl_data_device_manager::WlDataDeviceManager, _>(3, ());
    dh.create_global::<ServerState, zwp_pointer_gestures_v1::ZwpPointerGesturesV1, _>(3, ());

    info!(
        "Registered Wayland globals: wl_compositor, wl_shm, wl_seat, xdg_wm_base, \
         zwlr_layer_shell_v1, wl_data_device_manager, zwp_pointer_gestures_v1"
    );
}

// ============================================================================
// wl_compositor global
// ============================================================================

impl GlobalDispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_compositor");
        data_init.init(resource, ());
    }
}

// ============================================================================
// wl_shm global
// ============================================================================

impl GlobalDispatch<wl_shm::WlShm, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_shm");
        let shm = data_init.init(resource, ());

        // Send supported formats
        shm.format(wl_shm::Format::Argb8888);
        shm.format(wl_shm::Format::Xrgb8888);
    }
}

// ============================================================================
// wl_seat global
// ============================================================================

impl GlobalDispatch<wl_seat::WlSeat, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_seat::WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_seat");
        let seat = data_init.init(resource, ());

        let capabilities = wl_seat::Capability::from_bits_truncate(state.compositor.seat.capabilities().bits());
        seat.capabilities(capabilities);
        if seat.version() >= 2 {
            seat.name(state.compositor.seat.name().to_string());
        }
        state.resources.seats.push(seat);
    }
}

// ============================================================================
// wl_output globals, one per output
// ============================================================================

impl GlobalDispatch<wl_output::WlOutput, OutputId> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_output::WlOutput>,
        output_id: &OutputId,
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_output for {:?}", output_id);
        let output = data_init.init(resource, *output_id);

        // The output may be gone while its global is being withdrawn
        let Some(out) = state.compositor.outputs.get(*output_id) else {
            return;
        };

        output.geometry(
            out.position.x,
            out.position.y,
            out.physical_size.0,
            out.physical_size.1,
            wl_output::Subpixel::Unknown,
            out.make.clone(),
            out.model.clone(),
            wl_output::Transform::Normal,
        );

        for (index, mode) in out.modes.iter().enumerate() {
            let mut flags = wl_output::Mode::empty();
            flags.set(wl_output::Mode::Current, index == out.current_mode);
            flags.set(wl_output::Mode::Preferred, mode.preferred);
            output.mode(flags, mode.width, mode.height, mode.refresh);
        }

        if output.version() >= 2 {
            output.scale(out.scale.ceil() as i32);
        }
        if output.version() >= 4 {
            output.name(out.name.clone());
            output.description(format!("{} {} ({})", out.make, out.model, out.name));
        }
        if output.version() >= 2 {
            output.done();
        }
    }
}

// ============================================================================
// xdg_wm_base global
// ============================================================================

impl GlobalDispatch<xdg_wm_base::XdgWmBase, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<xdg_wm_base::XdgWmBase>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound xdg_wm_base");
        data_init.init(resource, ());
    }
}

// ============================================================================
// zwlr_layer_shell_v1 global
// ============================================================================

impl GlobalDispatch<zwlr_layer_shell_v1::ZwlrLayerShellV1, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<zwlr_layer_shell_v1::ZwlrLayerShellV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound zwlr_layer_shell_v1");
        data_init.init(resource, ());
    }
}

// ============================================================================
// wl_data_device_manager global
// ============================================================================

impl GlobalDispatch<wl_data_device_manager::WlDataDeviceManager, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_data_device_manager::WlDataDeviceManager>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound wl_data_device_manager");
        data_init.init(resource, ());
    }
}

// ============================================================================
// zwp_pointer_gestures_v1 global
// ============================================================================

impl GlobalDispatch<zwp_pointer_gestures_v1::ZwpPointerGesturesV1, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<zwp_pointer_gestures_v1::ZwpPointerGesturesV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        debug!("Client bound zwp_pointer_gestures_v1");
        data_init.init(resource, ());
    }
}
