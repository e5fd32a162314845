#![allow(dead_code)]

use cgmath::{InnerSpace, Vector3};
use sky_isles::{
    data_structures::{
        instance::Instance,
        scene_graph::{ContainerNode, SceneNode},
    },
    input::FlightMode,
    scene::SceneContext,
};
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceId, ElementState, MouseButton, WindowEvent},
    keyboard::KeyCode,
};

/// A loaded asset stand-in: a root named after the file with `children`
/// top-level nodes spread along X.
pub fn asset(name: &str, children: usize) -> Box<dyn SceneNode> {
    let mut root = ContainerNode::named(name, Instance::default());
    for i in 0..children {
        root.add_child(Box::new(ContainerNode::named(
            &format!("{}#{}", name, i),
            Instance::from(Vector3::new(i as f32, 0.0, 0.0)),
        )));
    }
    Box::new(root)
}

pub fn assert_close(actual: Vector3<f32>, expected: Vector3<f32>) {
    assert!(
        (actual - expected).magnitude() < 1e-4,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

/// Presses space once and returns the resulting mode.
pub fn press_space(state: &mut SceneContext) -> FlightMode {
    state.mode.handle_key(KeyCode::Space, ElementState::Pressed, false);
    state.mode.handle_key(KeyCode::Space, ElementState::Released, false);
    state.flight_mode()
}

/// Holds space for `downs` key-downs: one press followed by OS auto-repeats.
pub fn hold_space(state: &mut SceneContext, downs: usize) -> FlightMode {
    for i in 0..downs {
        state.mode.handle_key(KeyCode::Space, ElementState::Pressed, i > 0);
    }
    state.mode.handle_key(KeyCode::Space, ElementState::Released, false);
    state.flight_mode()
}

pub fn cursor_at(x: f64, y: f64) -> WindowEvent {
    WindowEvent::CursorMoved {
        device_id: unsafe { DeviceId::dummy() },
        position: PhysicalPosition::new(x, y),
    }
}

pub fn left_button(state: ElementState) -> WindowEvent {
    WindowEvent::MouseInput {
        device_id: unsafe { DeviceId::dummy() },
        state,
        button: MouseButton::Left,
    }
}
