//! Kestrel - a small stacking Wayland compositor
//!
//! Kestrel keeps one seat, stacks xdg-shell toplevels in focus order,
//! places wlr-layer-shell surfaces in their bands and handles interactive
//! move and resize. It runs headless: outputs and input devices come from
//! a backend, and nothing is rendered.
//!
//! # Architecture
//!
//! - **Protocol Layer**: Implements Wayland protocols using wayland-server-rs
//! - **Compositor Core**: Surfaces, scene graph, windows, focus and layers
//! - **Input**: Devices, keybindings, pointer routing and interactions
//! - **Backend**: Headless output and the calloop event loop
//!
//! The core never touches protocol objects. It queues
//! [`protocol::Notification`]s that the server delivers after each
//! dispatch.
//!
//! # Example
//!
//! ```
//! use kestrel::compositor::CompositorState;
//! use kestrel::config::Config;
//!
//! let mut state = CompositorState::new(&Config::default());
//! let surface = state.create_surface();
//! let toplevel = state.new_toplevel(surface).unwrap();
//! state.surface_commit(surface);
//! assert!(!state.windows.toplevel(toplevel).unwrap().mapped);
//! ```

pub mod backend;
pub mod compositor;
pub mod config;
pub mod input;
pub mod process;
pub mod protocol;
pub mod server;
