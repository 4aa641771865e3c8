//! Data device dispatch
//!
//! Only drag-and-drop start and its icon are handled. Selections are
//! accepted and dropped; no offers are ever sent.

use log::{debug, trace};
use wayland_server::backend::ClientId;
use wayland_server::protocol::{wl_data_device, wl_data_device_manager, wl_data_source};
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::compositor::{DataSourceId, SurfaceId};

use super::ServerState;

// ============================================================================
// wl_data_device_manager
// ============================================================================

impl Dispatch<wl_data_device_manager::WlDataDeviceManager, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_data_device_manager::WlDataDeviceManager,
        request: wl_data_device_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_data_device_manager::Request::CreateDataSource { id } => {
                let source_id = DataSourceId::new();
                let source = data_init.init(id, source_id);
                state.resources.data_sources.insert(source_id, source);
            }
            wl_data_device_manager::Request::GetDataDevice { id, .. } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_data_source
// ============================================================================

impl ServerState {
    fn data_source_gone(&mut self, source: DataSourceId) {
        if self.resources.data_sources.remove(&source).is_some() {
            self.compositor.data_source_destroyed(source);
        }
    }
}

impl Dispatch<wl_data_source::WlDataSource, DataSourceId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_data_source::WlDataSource,
        request: wl_data_source::Request,
        source: &DataSourceId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_data_source::Request::Offer { mime_type } => {
                trace!("Data source {:?} offers {}", source, mime_type);
            }
            wl_data_source::Request::Destroy => state.data_source_gone(*source),
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _resource: &wl_data_source::WlDataSource, source: &DataSourceId) {
        state.data_source_gone(*source);
    }
}

// ============================================================================
// wl_data_device
// ============================================================================

impl Dispatch<wl_data_device::WlDataDevice, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_data_device::WlDataDevice,
        request: wl_data_device::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_data_device::Request::StartDrag {
                source,
                origin,
                icon,
                serial,
            } => {
                let Some(origin) = origin.data::<SurfaceId>().copied() else {
                    return;
                };
                let source = source.as_ref().and_then(|s| s.data::<DataSourceId>()).copied();
                let icon = icon.as_ref().and_then(|i| i.data::<SurfaceId>()).copied();
                state.compositor.start_drag(source, origin, icon, serial);
            }
            wl_data_device::Request::SetSelection { serial, .. } => {
                debug!("Ignoring selection with serial {}", serial);
            }
            _ => {}
        }
    }
}
