//! xdg-shell dispatch
//!
//! Toplevels and popups. Popups created without an xdg parent belong to a
//! layer surface and only exist in the core once the layer surface adopts
//! them through `get_popup`.

use std::sync::Mutex;

use log::{debug, trace, warn};
use wayland_protocols::xdg::shell::server::{xdg_popup, xdg_positioner, xdg_surface, xdg_toplevel, xdg_wm_base};
use wayland_server::backend::ClientId;
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::compositor::popup::{Anchor, Gravity};
use crate::compositor::{PopupId, Positioner, Rect, SurfaceId, ToplevelId};
use crate::input::Edges;

use super::{wenum_raw, ServerState};

/// xdg_surface user data
#[derive(Debug)]
pub struct XdgSurfaceData {
    pub surface: SurfaceId,
}

/// xdg_popup user data
#[derive(Debug)]
pub struct PopupData {
    pub surface: SurfaceId,
    pub xdg_surface: xdg_surface::XdgSurface,
    pub positioner: Positioner,
    /// Set once a parent adopted the popup
    pub id: Mutex<Option<PopupId>>,
}

impl PopupData {
    pub fn id(&self) -> Option<PopupId> {
        self.id.lock().ok().and_then(|id| *id)
    }
}

impl ServerState {
    /// Create the core popup for `popup` under `parent_surface`
    pub(super) fn adopt_popup(&mut self, popup: &xdg_popup::XdgPopup, parent_surface: SurfaceId) {
        let Some(data) = popup.data::<PopupData>() else {
            return;
        };
        if data.id().is_some() {
            popup.post_error(xdg_wm_base::Error::InvalidPopupParent, "popup already has a parent".to_string());
            return;
        }
        match self.compositor.new_popup(data.surface, parent_surface, data.positioner) {
            Ok(id) => {
                if let Ok(mut slot) = data.id.lock() {
                    *slot = Some(id);
                }
                self.resources
                    .popups
                    .insert(id, (popup.clone(), data.xdg_surface.clone()));
            }
            Err(e) => {
                warn!("Popup for {:?} rejected: {}", data.surface, e);
                popup.post_error(xdg_wm_base::Error::InvalidPopupParent, e.to_string());
            }
        }
    }

    fn popup_gone(&mut self, id: PopupId) {
        if self.resources.popups.remove(&id).is_some() {
            self.compositor.popup_destroy(id);
        }
    }

    fn toplevel_gone(&mut self, id: ToplevelId) {
        if self.resources.toplevels.remove(&id).is_some() {
            self.compositor.toplevel_destroy(id);
        }
    }
}

// ============================================================================
// xdg_wm_base
// ============================================================================

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &xdg_wm_base::XdgWmBase,
        request: xdg_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_wm_base::Request::CreatePositioner { id } => {
                data_init.init(id, Mutex::new(Positioner::new()));
            }
            xdg_wm_base::Request::GetXdgSurface { id, surface } => {
                let Some(surface_id) = surface.data::<SurfaceId>().copied() else {
                    return;
                };
                debug!("Creating xdg_surface for {:?}", surface_id);
                data_init.init(id, XdgSurfaceData { surface: surface_id });
            }
            xdg_wm_base::Request::Pong { serial } => {
                trace!("Pong {}", serial);
            }
            _ => {}
        }
    }
}

// ============================================================================
// xdg_positioner
// ============================================================================

impl Dispatch<xdg_positioner::XdgPositioner, Mutex<Positioner>> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        resource: &xdg_positioner::XdgPositioner,
        request: xdg_positioner::Request,
        data: &Mutex<Positioner>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Ok(mut positioner) = data.lock() else {
            return;
        };
        match request {
            xdg_positioner::Request::SetSize { width, height } => {
                if width <= 0 || height <= 0 {
                    resource.post_error(xdg_positioner::Error::InvalidInput, "size must be positive".to_string());
                    return;
                }
                positioner.set_size(width, height);
            }
            xdg_positioner::Request::SetAnchorRect { x, y, width, height } => {
                if width < 0 || height < 0 {
                    resource.post_error(
                        xdg_positioner::Error::InvalidInput,
                        "anchor rect must not be negative".to_string(),
                    );
                    return;
                }
                positioner.set_anchor_rect(x, y, width, height);
            }
            xdg_positioner::Request::SetAnchor { anchor } => {
                positioner.set_anchor(Anchor::from_protocol(wenum_raw(anchor)));
            }
            xdg_positioner::Request::SetGravity { gravity } => {
                positioner.set_gravity(Gravity::from_protocol(wenum_raw(gravity)));
            }
            xdg_positioner::Request::SetOffset { x, y } => {
                positioner.set_offset(x, y);
            }
            xdg_positioner::Request::SetConstraintAdjustment { constraint_adjustment } => {
                // Popups are always slid back on screen
                trace!("Ignoring constraint adjustment {:?}", constraint_adjustment);
            }
            _ => {}
        }
    }
}

// ============================================================================
// xdg_surface
// ============================================================================

impl Dispatch<xdg_surface::XdgSurface, XdgSurfaceData> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &xdg_surface::XdgSurface,
        request: xdg_surface::Request,
        data: &XdgSurfaceData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_surface::Request::GetToplevel { id } => match state.compositor.new_toplevel(data.surface) {
                Ok(toplevel_id) => {
                    debug!("Creating xdg_toplevel {:?} for {:?}", toplevel_id, data.surface);
                    let toplevel = data_init.init(id, toplevel_id);
                    state
                        .resources
                        .toplevels
                        .insert(toplevel_id, (toplevel, resource.clone()));
                }
                Err(e) => {
                    data_init.post_error(id, xdg_wm_base::Error::Role, e.to_string());
                }
            },
            xdg_surface::Request::GetPopup { id, parent, positioner } => {
                let Some(positioner) = positioner.data::<Mutex<Positioner>>().and_then(|p| p.lock().ok().map(|p| *p))
                else {
                    return;
                };
                if positioner.size.0 <= 0 || positioner.size.1 <= 0 {
                    data_init.post_error(
                        id,
                        xdg_wm_base::Error::InvalidPositioner,
                        "positioner has no size".to_string(),
                    );
                    return;
                }
                let popup = data_init.init(
                    id,
                    PopupData {
                        surface: data.surface,
                        xdg_surface: resource.clone(),
                        positioner,
                        id: Mutex::new(None),
                    },
                );
                match parent.as_ref().and_then(|p| p.data::<XdgSurfaceData>()) {
                    Some(parent) => state.adopt_popup(&popup, parent.surface),
                    None => debug!("Popup for {:?} waits for a layer surface parent", data.surface),
                }
            }
            xdg_surface::Request::SetWindowGeometry { x, y, width, height } => {
                if width <= 0 || height <= 0 {
                    resource.post_error(
                        xdg_surface::Error::InvalidSize,
                        format!("window geometry {}x{} is empty", width, height),
                    );
                    return;
                }
                state
                    .compositor
                    .xdg_surface_set_window_geometry(data.surface, Rect::new(x, y, width, height));
            }
            xdg_surface::Request::AckConfigure { serial } => {
                trace!("Ack configure {}", serial);
            }
            _ => {}
        }
    }
}

// ============================================================================
// xdg_toplevel
// ============================================================================

impl Dispatch<xdg_toplevel::XdgToplevel, ToplevelId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_toplevel::XdgToplevel,
        request: xdg_toplevel::Request,
        id: &ToplevelId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let id = *id;
        let compositor = &mut state.compositor;
        match request {
            xdg_toplevel::Request::SetTitle { title } => compositor.toplevel_set_title(id, title),
            xdg_toplevel::Request::SetAppId { app_id } => compositor.toplevel_set_app_id(id, app_id),
            xdg_toplevel::Request::Move { serial, .. } => compositor.toplevel_request_move(id, serial),
            xdg_toplevel::Request::Resize { serial, edges, .. } => {
                let edges = Edges::from_bits_truncate(wenum_raw(edges));
                compositor.toplevel_request_resize(id, serial, edges);
            }
            xdg_toplevel::Request::SetMaxSize { width, height } => {
                if let Some(toplevel) = compositor.windows.toplevel_mut(id) {
                    toplevel.set_max_size(width, height);
                }
            }
            xdg_toplevel::Request::SetMinSize { width, height } => {
                if let Some(toplevel) = compositor.windows.toplevel_mut(id) {
                    toplevel.set_min_size(width, height);
                }
            }
            xdg_toplevel::Request::SetMaximized => compositor.toplevel_request_maximize(id, true),
            xdg_toplevel::Request::UnsetMaximized => compositor.toplevel_request_maximize(id, false),
            xdg_toplevel::Request::SetFullscreen { .. } => compositor.toplevel_request_fullscreen(id, true),
            xdg_toplevel::Request::UnsetFullscreen => compositor.toplevel_request_fullscreen(id, false),
            xdg_toplevel::Request::SetMinimized => compositor.toplevel_request_minimize(id),
            xdg_toplevel::Request::Destroy => state.toplevel_gone(id),
            _ => trace!("Unhandled xdg_toplevel request for {:?}", id),
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &xdg_toplevel::XdgToplevel, id: &ToplevelId) {
        state.toplevel_gone(*id);
    }
}

// ============================================================================
// xdg_popup
// ============================================================================

impl Dispatch<xdg_popup::XdgPopup, PopupData> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_popup::XdgPopup,
        request: xdg_popup::Request,
        data: &PopupData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(id) = data.id() else {
            trace!("Request on unparented popup for {:?}", data.surface);
            return;
        };
        match request {
            xdg_popup::Request::Grab { serial, .. } => {
                trace!("Popup {:?} grab with serial {}", id, serial);
            }
            xdg_popup::Request::Reposition { positioner, token } => {
                if let Some(positioner) = positioner.data::<Mutex<Positioner>>().and_then(|p| p.lock().ok().map(|p| *p)) {
                    state.compositor.popup_reposition(id, positioner, token);
                }
            }
            xdg_popup::Request::Destroy => state.popup_gone(id),
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &xdg_popup::XdgPopup, data: &PopupData) {
        if let Some(id) = data.id() {
            state.popup_gone(id);
        }
    }
}

