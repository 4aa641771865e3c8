//! Input handling module
//!
//! Devices, keymaps and bindings, the seat with its cursor and focus, and
//! the pointer interaction state machine.

pub mod bindings;
pub mod cursor;
pub mod devices;
pub mod interaction;
pub mod keyboard;
pub mod pointer;
pub mod seat;

pub use bindings::{Action, Bindings};
pub use devices::{DeviceClass, DeviceId, DeviceInfo, DeviceRegistry};
pub use interaction::{Edges, InteractionState};
pub use keyboard::Keyboard;
pub use pointer::Pointer;
pub use seat::Seat;
