//! Backend module
//!
//! Backends discover outputs and input devices and turn hardware activity
//! into [`BackendEvent`]s. The compositor core consumes them through
//! [`CompositorState::handle_backend_event`]; only output hotplug needs the
//! protocol layer's attention afterwards.
//!
//! - Headless backend with one virtual output
//! - Event loop integration with calloop

pub mod event_loop;
pub mod headless;

pub use event_loop::EventLoop;
pub use headless::Headless;

use log::{trace, warn};

use crate::compositor::{CompositorState, OutputDescriptor, OutputId};
use crate::input::devices::{DeviceId, DeviceInfo};
use crate::input::pointer::{AxisEvent, GestureEvent};

/// Hardware activity reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    NewOutput(OutputDescriptor),
    OutputRemoved {
        name: String,
    },
    /// The backend mints the id it uses in later events for this device
    NewInput {
        device: DeviceId,
        info: DeviceInfo,
    },
    InputRemoved {
        device: DeviceId,
    },
    PointerMotion {
        device: DeviceId,
        time: u32,
        dx: f64,
        dy: f64,
    },
    /// Coordinates normalised to 0..1
    PointerMotionAbsolute {
        device: DeviceId,
        time: u32,
        x: f64,
        y: f64,
    },
    PointerButton {
        device: DeviceId,
        time: u32,
        button: u32,
        pressed: bool,
    },
    PointerAxis {
        device: DeviceId,
        event: AxisEvent,
    },
    PointerFrame {
        device: DeviceId,
    },
    Key {
        device: DeviceId,
        time: u32,
        /// evdev keycode
        keycode: u32,
        pressed: bool,
    },
    Gesture {
        device: DeviceId,
        event: GestureEvent,
    },
}

/// Output hotplug outcome the protocol layer must mirror as globals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChange {
    Added(OutputId),
    Removed(OutputId),
}

impl CompositorState {
    /// Apply one backend event
    pub fn handle_backend_event(&mut self, event: BackendEvent) -> Option<OutputChange> {
        trace!("Backend event {:?}", event);
        match event {
            BackendEvent::NewOutput(desc) => {
                let name = desc.name.clone();
                match self.new_output(desc) {
                    Ok(id) => return Some(OutputChange::Added(id)),
                    Err(e) => warn!("Output {} not added: {}", name, e),
                }
            }
            BackendEvent::OutputRemoved { name } => {
                let found = self.outputs.iter().find(|o| o.name == name).map(|o| o.id);
                match found {
                    Some(id) => {
                        self.remove_output(id);
                        return Some(OutputChange::Removed(id));
                    }
                    None => warn!("Removal of unknown output {}", name),
                }
            }
            BackendEvent::NewInput { device, info } => self.new_input_device(device, info),
            BackendEvent::InputRemoved { device } => self.remove_input_device(device),
            BackendEvent::PointerMotion { device, time, dx, dy } => self.pointer_motion(device, time, dx, dy),
            BackendEvent::PointerMotionAbsolute { device, time, x, y } => {
                self.pointer_motion_absolute(device, time, x, y)
            }
            BackendEvent::PointerButton {
                device,
                time,
                button,
                pressed,
            } => self.pointer_button(device, time, button, pressed),
            BackendEvent::PointerAxis { device, event } => self.pointer_axis(device, event),
            BackendEvent::PointerFrame { device } => self.pointer_frame(device),
            BackendEvent::Key {
                device,
                time,
                keycode,
                pressed,
            } => self.keyboard_key(device, time, keycode, pressed),
            BackendEvent::Gesture { device, event } => self.pointer_gesture(device, event),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::state::tests::state_with_output;
    use crate::compositor::OutputMode;
    use crate::input::devices::DeviceClass;
    use crate::input::seat::SeatCapabilities;

    fn mode(width: i32, height: i32) -> Vec<OutputMode> {
        vec![OutputMode {
            width,
            height,
            refresh: 60000,
            preferred: true,
        }]
    }

    #[test]
    fn test_output_hotplug() {
        let (mut state, first) = state_with_output();
        let change = state.handle_backend_event(BackendEvent::NewOutput(OutputDescriptor::new("HEADLESS-2", mode(640, 480))));
        let Some(OutputChange::Added(second)) = change else {
            panic!("expected a new output, got {:?}", change);
        };
        assert_ne!(first, second);

        let change = state.handle_backend_event(BackendEvent::OutputRemoved {
            name: "HEADLESS-2".to_string(),
        });
        assert_eq!(change, Some(OutputChange::Removed(second)));
        assert!(state.outputs.get(second).is_none());

        let change = state.handle_backend_event(BackendEvent::OutputRemoved {
            name: "nope".to_string(),
        });
        assert_eq!(change, None);
    }

    #[test]
    fn test_duplicate_output_is_refused() {
        let (mut state, _) = state_with_output();
        let change = state.handle_backend_event(BackendEvent::NewOutput(OutputDescriptor::new("HEADLESS-1", mode(640, 480))));
        assert_eq!(change, None);
        assert_eq!(state.outputs.len(), 1);
    }

    #[test]
    fn test_pointer_events_reach_the_seat() {
        let (mut state, _) = state_with_output();
        let device = DeviceId::new();
        state.handle_backend_event(BackendEvent::NewInput {
            device,
            info: DeviceInfo::new("mouse", DeviceClass::Pointer),
        });
        assert!(state.seat.capabilities().contains(SeatCapabilities::POINTER));

        let (x, y) = state.seat.cursor.position();
        state.handle_backend_event(BackendEvent::PointerMotion {
            device,
            time: 1,
            dx: 10.0,
            dy: -5.0,
        });
        assert_eq!(state.seat.cursor.position(), (x + 10.0, y - 5.0));

        state.handle_backend_event(BackendEvent::InputRemoved { device });
        assert!(state.seat.capabilities().is_empty());
    }
}
