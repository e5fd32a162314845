use cgmath::{Deg, EuclideanSpace, InnerSpace, Quaternion, Rad, Rotation3, Vector3};
use sky_isles::{
    animation::{fly, loop_fly},
    camera::Camera,
    config::{Controls, SceneConfig, Steering},
    data_structures::instance::Instance,
    input::FlightMode,
    scene::{Scene, SceneContext},
};
use winit::event::ElementState;

mod common;
use common::{asset, assert_close, cursor_at, hold_space, left_button, press_space};

fn scene_with_airship(config: &SceneConfig) -> Scene {
    let mut scene = Scene::new(config);
    scene.attach_airship(asset("models/airship.glb", 1), config);
    scene
}

fn airship_world(scene: &Scene) -> Instance {
    let Some(world) = scene.airship_world() else {
        panic!("airship is not attached");
    };
    world
}

fn airship_local(scene: &Scene) -> Instance {
    let Some(local) = scene.airship_local() else {
        panic!("airship is not attached");
    };
    local
}

#[test]
fn piloted_airship_takes_the_camera_pose_as_its_own() {
    let config = SceneConfig::default();
    let mut state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);
    assert_eq!(press_space(&mut state), FlightMode::Piloted);

    let camera = Camera::new((1.0, 1.6, 2.0), Deg(-60.0), Deg(10.0));
    scene.update(&state, &camera, 3.0);

    let expected = fly(camera.position.to_vec(), camera.orientation(), config.pilot_offset);
    let local = airship_local(&scene);
    assert_close(local.position, expected.position);
    assert_close(local.rotation * Vector3::unit_z(), expected.rotation * Vector3::unit_z());
    assert_close(local.rotation * Vector3::unit_y(), expected.rotation * Vector3::unit_y());
    assert_close(local.scale, Vector3::new(config.airship_scale, config.airship_scale, config.airship_scale));
}

#[test]
fn piloted_airship_stays_locked_while_the_camera_moves() {
    let config = SceneConfig::default();
    let mut state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);
    press_space(&mut state);

    for (step, x) in [0.0f32, 0.5, 1.0, 4.0].into_iter().enumerate() {
        let camera = Camera::new((x, 0.0, -x), Deg(-90.0 + 20.0 * step as f32), Deg(0.0));
        scene.update(&state, &camera, step as f32);
        let expected = fly(camera.position.to_vec(), camera.orientation(), config.pilot_offset);
        assert_close(airship_local(&scene).position, expected.position);
    }
}

#[test]
fn piloted_airship_is_in_view_of_the_default_camera() {
    let config = SceneConfig::default();
    let mut state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);
    press_space(&mut state);

    let camera = Camera::default();
    scene.update(&state, &camera, 1.0);

    let world = airship_world(&scene);
    assert_close(world.position, state.root_transform().transform_point(config.pilot_offset));
    let towards = (world.position - camera.position.to_vec()).normalize();
    let off_axis = towards.dot(camera.forward()).acos().to_degrees();
    assert!(
        off_axis < config.fov_degrees / 2.0,
        "airship is {}° off the view axis",
        off_axis
    );
}

#[test]
fn held_space_flips_the_mode_on_every_repeat() {
    let mut state = SceneContext::new(SceneConfig::default());
    assert_eq!(hold_space(&mut state, 1), FlightMode::Piloted);
    assert_eq!(hold_space(&mut state, 2), FlightMode::Piloted);
    assert_eq!(hold_space(&mut state, 3), FlightMode::Autonomous);

    let config = SceneConfig {
        toggle_on_key_repeat: false,
        ..SceneConfig::default()
    };
    let mut state = SceneContext::new(config);
    assert_eq!(hold_space(&mut state, 4), FlightMode::Piloted);
}

#[test]
fn closed_loop_gate_parks_the_airship() {
    let config = SceneConfig::default();
    let state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);

    scene.update(&state, &Camera::default(), 0.0);

    let root = state.root_transform();
    let parked = Vector3::new(-4.15, 1.5, 4.7);
    assert_close(airship_world(&scene).position, root.transform_point(parked));
}

#[test]
fn toggling_back_hands_the_airship_to_the_loop() {
    let config = SceneConfig::default();
    let mut state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);
    let camera = Camera::default();

    press_space(&mut state);
    scene.update(&state, &camera, 1.0);
    let piloted = airship_local(&scene).position;
    assert_close(
        piloted,
        fly(camera.position.to_vec(), camera.orientation(), config.pilot_offset).position,
    );

    assert_eq!(press_space(&mut state), FlightMode::Autonomous);
    let t = std::f32::consts::PI;
    scene.update(&state, &camera, t);

    let orbit = loop_fly(&Instance::default(), &config.loop_path, t).position;
    assert_close(airship_world(&scene).position, state.root_transform().transform_point(orbit));
}

fn drag_forward_right(state: &mut SceneContext) {
    state.handle_window_events(&cursor_at(200.0, 200.0));
    state.handle_window_events(&left_button(ElementState::Pressed));
    state.handle_window_events(&cursor_at(250.0, 120.0));
    let intent = state.joystick.intent();
    assert!((intent.forward - 0.08).abs() < 1e-6);
    assert!((intent.right - 0.05).abs() < 1e-6);
}

#[test]
fn joystick_drag_steers_the_airship() {
    let config = SceneConfig::default().with_controls(Controls::Joystick);
    let mut state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);
    let camera = Camera::default();

    drag_forward_right(&mut state);
    scene.update(&state, &camera, 1.0);

    let heading = Quaternion::from_angle_y(Rad(config.airship_yaw));
    let moved = heading * Vector3::new(-config.joystick_step, 0.0, 0.0);
    let local = airship_local(&scene);
    assert_close(local.position, moved);
    // a right-only deflection does not turn
    assert_close(local.rotation * Vector3::unit_x(), heading * Vector3::unit_x());

    state.handle_window_events(&left_button(ElementState::Released));
    assert!(state.joystick.intent().is_idle());
    scene.update(&state, &camera, 2.0);
    let root = state.root_transform();
    assert_close(airship_world(&scene).position, root.transform_point(moved));
}

#[test]
fn balanced_steering_turns_right() {
    let config = SceneConfig {
        steering: Steering::Balanced,
        ..SceneConfig::default().with_controls(Controls::Joystick)
    };
    let mut state = SceneContext::new(config.clone());
    let mut scene = scene_with_airship(&config);

    drag_forward_right(&mut state);
    scene.update(&state, &Camera::default(), 1.0);

    let turned = Quaternion::from_angle_y(Rad(config.airship_yaw - 0.05));
    assert_close(airship_local(&scene).rotation * Vector3::unit_x(), turned * Vector3::unit_x());
}

#[test]
fn loop_controls_ignore_the_joystick() {
    let config = SceneConfig::default();
    let mut state = SceneContext::new(config);

    state.handle_window_events(&cursor_at(0.0, 0.0));
    state.handle_window_events(&left_button(ElementState::Pressed));
    state.handle_window_events(&cursor_at(0.0, -90.0));

    assert!(state.joystick.intent().is_idle());
}
