//! Wayland server implementation
//!
//! This module sets up the Wayland display server, registers globals,
//! dispatches protocol requests into the compositor core and delivers the
//! core's notifications back to clients.

mod data_device;
mod deliver;
mod dispatch;
mod gestures;
mod globals;
mod keymap;
mod layer_shell;
mod xdg;

use std::collections::HashMap;
use std::os::unix::io::AsFd;
use std::sync::Arc;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, LoopSignal, Mode, PostAction};
use log::{debug, error, info, warn};
use wayland_protocols::wp::pointer_gestures::zv1::server::{
    zwp_pointer_gesture_hold_v1::ZwpPointerGestureHoldV1, zwp_pointer_gesture_pinch_v1::ZwpPointerGesturePinchV1,
    zwp_pointer_gesture_swipe_v1::ZwpPointerGestureSwipeV1,
};
use wayland_protocols::xdg::shell::server::{xdg_popup::XdgPopup, xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel};
use wayland_protocols_wlr::layer_shell::v1::server::zwlr_layer_surface_v1::ZwlrLayerSurfaceV1;
use wayland_server::backend::{ClientData, ClientId, DisconnectReason, GlobalId};
use wayland_server::protocol::{
    wl_buffer::WlBuffer, wl_callback::WlCallback, wl_data_source::WlDataSource, wl_keyboard::WlKeyboard,
    wl_output::WlOutput, wl_pointer::WlPointer, wl_seat::WlSeat, wl_surface::WlSurface,
};
use wayland_server::{Display, DisplayHandle, ListeningSocket, Resource, WEnum};

use crate::backend::{BackendEvent, EventLoop, Headless, OutputChange};
use crate::compositor::{CompositorState, DataSourceId, LayerId, OutputId, PopupId, SurfaceId, ToplevelId};
use crate::config::Config;
use crate::input::keyboard;
use crate::process;

pub use keymap::KeymapFile;

/// wl_output version advertised for every output
const OUTPUT_VERSION: u32 = 4;

/// The listening side of the compositor
pub struct WaylandServer {
    /// The Wayland display
    display: Display<ServerState>,
    /// Listening socket for client connections
    socket: ListeningSocket,
    /// Socket name for WAYLAND_DISPLAY
    socket_name: String,
}

/// Live protocol objects the core's ids map to
#[derive(Default)]
pub struct Resources {
    pub surfaces: HashMap<SurfaceId, WlSurface>,
    /// Buffers attached since the last commit
    pub attached: HashMap<SurfaceId, WlBuffer>,
    pub frame_callbacks: Vec<WlCallback>,
    pub toplevels: HashMap<ToplevelId, (XdgToplevel, XdgSurface)>,
    pub popups: HashMap<PopupId, (XdgPopup, XdgSurface)>,
    pub layers: HashMap<LayerId, ZwlrLayerSurfaceV1>,
    pub seats: Vec<WlSeat>,
    pub pointers: Vec<WlPointer>,
    pub keyboards: Vec<WlKeyboard>,
    pub swipes: Vec<ZwpPointerGestureSwipeV1>,
    pub pinches: Vec<ZwpPointerGesturePinchV1>,
    pub holds: Vec<ZwpPointerGestureHoldV1>,
    pub data_sources: HashMap<DataSourceId, WlDataSource>,
    pub output_globals: HashMap<OutputId, GlobalId>,
}

/// State passed to Wayland dispatch handlers
pub struct ServerState {
    /// Compositor core (surfaces, windows, outputs, seat)
    pub compositor: CompositorState,
    pub resources: Resources,
    display: DisplayHandle,
    socket_name: String,
    keymap: KeymapFile,
    loop_signal: LoopSignal,
}

/// Per-client data
struct ClientState;

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        debug!("Client {:?} connected", client_id);
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        debug!("Client {:?} disconnected: {:?}", client_id, reason);
    }
}

/// Raw value of a wire enum, known or not
pub(crate) fn wenum_raw<T: Into<u32>>(value: WEnum<T>) -> u32 {
    match value {
        WEnum::Value(v) => v.into(),
        WEnum::Unknown(v) => v,
    }
}

impl ServerState {
    pub fn new(
        config: &Config,
        display: DisplayHandle,
        socket_name: String,
        loop_signal: LoopSignal,
    ) -> anyhow::Result<Self> {
        let keymap = match keyboard::compile_keymap(&config.xkb_layout) {
            Some(keymap) => KeymapFile::new(&keymap)?,
            None => {
                warn!("No keymap for layout {:?}, clients get raw keycodes", config.xkb_layout);
                KeymapFile::none()?
            }
        };
        Ok(Self {
            compositor: CompositorState::new(config),
            resources: Resources::default(),
            display,
            socket_name,
            keymap,
            loop_signal,
        })
    }

    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    /// Apply a backend event and mirror output hotplug as wl_output globals
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        match self.compositor.handle_backend_event(event) {
            Some(OutputChange::Added(id)) => {
                let global = self.display.create_global::<ServerState, WlOutput, OutputId>(OUTPUT_VERSION, id);
                self.resources.output_globals.insert(id, global);
            }
            Some(OutputChange::Removed(id)) => {
                if let Some(global) = self.resources.output_globals.remove(&id) {
                    self.display.remove_global::<ServerState>(global);
                }
            }
            None => {}
        }
    }

    /// Complete pending frame callbacks
    pub fn send_frame_callbacks(&mut self, time: u32) {
        for callback in self.resources.frame_callbacks.drain(..) {
            if callback.is_alive() {
                callback.done(time);
            }
        }
    }

    /// Deliver queued notifications and flush every client
    pub fn flush(&mut self) {
        self.flush_notifications();
        if let Err(e) = self.display.flush_clients() {
            warn!("Failed to flush clients: {}", e);
        }
    }

    /// Launch a client against this server
    fn spawn(&self, command: &str) {
        if let Err(e) = process::spawn(command, &self.socket_name) {
            warn!("Failed to spawn {:?}: {}", command, e);
        }
    }
}

impl WaylandServer {
    /// Create a new Wayland server
    pub fn new() -> anyhow::Result<Self> {
        info!("Creating Wayland display server");

        let display: Display<ServerState> = Display::new()?;

        let socket = ListeningSocket::bind_auto("wayland", 0..33)?;
        let socket_name = socket
            .socket_name()
            .and_then(|n| n.to_str().map(String::from))
            .ok_or_else(|| anyhow::anyhow!("listening socket has no usable name"))?;

        info!("Wayland socket: {}", socket_name);

        Ok(Self {
            display,
            socket,
            socket_name,
        })
    }

    /// Get the socket name (for WAYLAND_DISPLAY)
    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    /// Get a handle to the display
    pub fn display_handle(&self) -> DisplayHandle {
        self.display.handle()
    }

    /// Register the fixed protocol globals; outputs come and go with the
    /// backend
    pub fn register_globals(&mut self) {
        globals::register(&self.display.handle());
    }

    /// Insert the Wayland event sources into a calloop event loop
    pub fn insert_into_loop(mut self, handle: &LoopHandle<'static, ServerState>) -> anyhow::Result<()> {
        // Insert the listening socket
        handle
            .insert_source(
                Generic::new(self.socket.as_fd().try_clone_to_owned()?, Interest::READ, Mode::Level),
                {
                    let socket = self.socket;
                    let mut display_handle = self.display.handle();
                    move |_, _, _state| {
                        // Accept new client connections
                        while let Some(stream) = socket.accept()? {
                            if let Err(e) = display_handle.insert_client(stream, Arc::new(ClientState)) {
                                error!("Failed to insert client: {}", e);
                            }
                        }
                        Ok(PostAction::Continue)
                    }
                },
            )
            .map_err(|e| anyhow::anyhow!("failed to insert listening socket: {}", e.error))?;

        // Insert the display's event source
        handle
            .insert_source(
                Generic::new(
                    self.display.backend().poll_fd().try_clone_to_owned()?,
                    Interest::READ,
                    Mode::Level,
                ),
                {
                    let mut display = self.display;
                    move |_, _, state| {
                        display.dispatch_clients(state)?;
                        state.flush();
                        Ok(PostAction::Continue)
                    }
                },
            )
            .map_err(|e| anyhow::anyhow!("failed to insert display source: {}", e.error))?;

        Ok(())
    }
}

/// Run the compositor until it is told to terminate
pub fn run(config: Config) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<ServerState>::new()?;
    let mut server = WaylandServer::new()?;
    server.register_globals();

    let mut state = ServerState::new(
        &config,
        server.display_handle(),
        server.socket_name().to_string(),
        event_loop.signal(),
    )?;
    server.insert_into_loop(&event_loop.handle())?;

    let mut backend = Headless::new(config.output_size);
    for event in backend.initial_events() {
        state.handle_backend_event(event);
    }
    backend.insert_into_loop(
        &event_loop.handle(),
        |event, state: &mut ServerState| state.handle_backend_event(event),
        |time, state: &mut ServerState| state.send_frame_callbacks(time),
    )?;

    for command in config.autostart() {
        state.spawn(command);
    }

    info!("Running on WAYLAND_DISPLAY={}", state.socket_name());
    event_loop.run(&mut state, ServerState::flush)?;
    info!("Compositor exiting");
    Ok(())
}
