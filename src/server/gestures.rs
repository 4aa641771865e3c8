//! Pointer gesture dispatch
//!
//! Gesture objects carry no state of their own. The core decides which
//! surface a gesture goes to and delivery fans it out to that client's
//! objects.

use wayland_protocols::wp::pointer_gestures::zv1::server::{
    zwp_pointer_gesture_hold_v1, zwp_pointer_gesture_pinch_v1, zwp_pointer_gesture_swipe_v1, zwp_pointer_gestures_v1,
};
use wayland_server::backend::ClientId;
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, Resource};

use super::ServerState;

impl Dispatch<zwp_pointer_gestures_v1::ZwpPointerGesturesV1, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &zwp_pointer_gestures_v1::ZwpPointerGesturesV1,
        request: zwp_pointer_gestures_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            zwp_pointer_gestures_v1::Request::GetSwipeGesture { id, .. } => {
                let swipe = data_init.init(id, ());
                state.resources.swipes.push(swipe);
            }
            zwp_pointer_gestures_v1::Request::GetPinchGesture { id, .. } => {
                let pinch = data_init.init(id, ());
                state.resources.pinches.push(pinch);
            }
            zwp_pointer_gestures_v1::Request::GetHoldGesture { id, .. } => {
                let hold = data_init.init(id, ());
                state.resources.holds.push(hold);
            }
            _ => {}
        }
    }
}

impl Dispatch<zwp_pointer_gesture_swipe_v1::ZwpPointerGestureSwipeV1, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &zwp_pointer_gesture_swipe_v1::ZwpPointerGestureSwipeV1,
        _request: zwp_pointer_gesture_swipe_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        resource: &zwp_pointer_gesture_swipe_v1::ZwpPointerGestureSwipeV1,
        _data: &(),
    ) {
        state.resources.swipes.retain(|s| s.id() != resource.id());
    }
}

impl Dispatch<zwp_pointer_gesture_pinch_v1::ZwpPointerGesturePinchV1, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &zwp_pointer_gesture_pinch_v1::ZwpPointerGesturePinchV1,
        _request: zwp_pointer_gesture_pinch_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        resource: &zwp_pointer_gesture_pinch_v1::ZwpPointerGesturePinchV1,
        _data: &(),
    ) {
        state.resources.pinches.retain(|p| p.id() != resource.id());
    }
}

impl Dispatch<zwp_pointer_gesture_hold_v1::ZwpPointerGestureHoldV1, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &zwp_pointer_gesture_hold_v1::ZwpPointerGestureHoldV1,
        _request: zwp_pointer_gesture_hold_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        resource: &zwp_pointer_gesture_hold_v1::ZwpPointerGestureHoldV1,
        _data: &(),
    ) {
        state.resources.holds.retain(|h| h.id() != resource.id());
    }
}
