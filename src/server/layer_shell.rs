//! wlr-layer-shell dispatch
//!
//! Layer surface requests only touch pending state; everything takes
//! effect on the next wl_surface.commit.

use log::{debug, trace, warn};
use wayland_protocols_wlr::layer_shell::v1::server::{zwlr_layer_shell_v1, zwlr_layer_surface_v1};
use wayland_server::backend::ClientId;
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::compositor::layer::{Anchor, KeyboardInteractivity};
use crate::compositor::{Band, LayerId, OutputId, ShellError, SurfaceId};

use super::{wenum_raw, ServerState};

/// zwlr_layer_surface_v1 user data; `None` when the surface was closed
/// before it ever existed in the core
#[derive(Debug, Clone, Copy)]
pub struct LayerData {
    pub id: Option<LayerId>,
    pub surface: SurfaceId,
}

fn clamp_u32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl ServerState {
    fn layer_gone(&mut self, id: LayerId) {
        if self.resources.layers.remove(&id).is_some() {
            self.compositor.layer_destroy(id);
        }
    }

    /// Double-buffered layer state, applied on commit
    fn set_layer_property(
        &mut self,
        id: LayerId,
        resource: &zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
        request: zwlr_layer_surface_v1::Request,
    ) {
        let Some(layer) = self.compositor.windows.layer_mut(id) else {
            return;
        };
        match request {
            zwlr_layer_surface_v1::Request::SetSize { width, height } => {
                layer.set_size(clamp_u32(width), clamp_u32(height));
            }
            zwlr_layer_surface_v1::Request::SetAnchor { anchor } => {
                layer.set_anchor(Anchor::from_bits_truncate(wenum_raw(anchor)));
            }
            zwlr_layer_surface_v1::Request::SetExclusiveZone { zone } => {
                layer.set_exclusive_zone(zone);
            }
            zwlr_layer_surface_v1::Request::SetMargin {
                top,
                right,
                bottom,
                left,
            } => {
                layer.set_margin(top, right, bottom, left);
            }
            zwlr_layer_surface_v1::Request::SetKeyboardInteractivity { keyboard_interactivity } => {
                match KeyboardInteractivity::from_protocol(wenum_raw(keyboard_interactivity)) {
                    Some(mode) => layer.set_keyboard_interactivity(mode),
                    None => resource.post_error(
                        zwlr_layer_surface_v1::Error::InvalidKeyboardInteractivity,
                        "unknown keyboard interactivity".to_string(),
                    ),
                }
            }
            zwlr_layer_surface_v1::Request::SetLayer { layer: band } => match Band::from_protocol(wenum_raw(band)) {
                Some(band) => layer.set_band(band),
                None => resource.post_error(zwlr_layer_shell_v1::Error::InvalidLayer, "unknown layer".to_string()),
            },
            zwlr_layer_surface_v1::Request::AckConfigure { serial } => {
                trace!("Layer {:?} acked {}", id, serial);
            }
            _ => {}
        }
    }
}

// ============================================================================
// zwlr_layer_shell_v1
// ============================================================================

impl Dispatch<zwlr_layer_shell_v1::ZwlrLayerShellV1, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &zwlr_layer_shell_v1::ZwlrLayerShellV1,
        request: zwlr_layer_shell_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let zwlr_layer_shell_v1::Request::GetLayerSurface {
            id,
            surface,
            output,
            layer,
            namespace,
        } = request
        else {
            return;
        };
        let Some(surface_id) = surface.data::<SurfaceId>().copied() else {
            return;
        };
        let Some(band) = Band::from_protocol(wenum_raw(layer)) else {
            data_init.post_error(
                id,
                zwlr_layer_shell_v1::Error::InvalidLayer,
                "unknown layer".to_string(),
            );
            return;
        };
        let output = output.as_ref().and_then(|o| o.data::<OutputId>()).copied();

        match state.compositor.new_layer_surface(surface_id, output, band, namespace) {
            Ok(layer_id) => {
                debug!("Creating layer surface {:?} for {:?}", layer_id, surface_id);
                let layer = data_init.init(
                    id,
                    LayerData {
                        id: Some(layer_id),
                        surface: surface_id,
                    },
                );
                state.resources.layers.insert(layer_id, layer);
            }
            Err(e @ ShellError::NoOutput(_)) => {
                warn!("Layer surface for {:?} closed at once: {}", surface_id, e);
                let layer = data_init.init(
                    id,
                    LayerData {
                        id: None,
                        surface: surface_id,
                    },
                );
                layer.closed();
            }
            Err(e) => {
                data_init.post_error(id, zwlr_layer_shell_v1::Error::Role, e.to_string());
            }
        }
    }
}

// ============================================================================
// zwlr_layer_surface_v1
// ============================================================================

impl Dispatch<zwlr_layer_surface_v1::ZwlrLayerSurfaceV1, LayerData> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
        request: zwlr_layer_surface_v1::Request,
        data: &LayerData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(id) = data.id else {
            trace!("Request on closed layer surface for {:?}", data.surface);
            return;
        };
        match request {
            zwlr_layer_surface_v1::Request::Destroy => state.layer_gone(id),
            zwlr_layer_surface_v1::Request::GetPopup { popup } => state.adopt_popup(&popup, data.surface),
            request => state.set_layer_property(id, resource, request),
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
        data: &LayerData,
    ) {
        if let Some(id) = data.id {
            state.layer_gone(id);
        }
    }
}

