//! Per-frame motion of the islands and the airship.
//!
//! Everything here is a pure function of its inputs so the scene can call it
//! once per frame and tests can call it without a window or a GPU.

use cgmath::{InnerSpace, Quaternion, Rad, Rotation3, Vector3};

use crate::{
    config::{LoopPath, Steering},
    data_structures::instance::Instance,
    input::JoystickIntent,
};

const BOB_SCALE: f32 = 1.0 / 1000.0;

/// Height of a bobbing island at `elapsed_secs`.
///
/// `base_y` is the height captured when the island was attached, so the
/// result never drifts: `base_y + sin(t * frequency) * amplitude / 1000`.
pub fn bob(base_y: f32, frequency: f32, amplitude: f32, elapsed_secs: f32) -> f32 {
    base_y + (elapsed_secs * frequency).sin() * amplitude * BOB_SCALE
}

/// Pose of the airship while piloted: the camera pose moved by `offset` in
/// camera space. Scale is left at one.
///
/// The result is written as the airship's own transform, so the offset is
/// measured in the units of the airship's parent.
pub fn fly(
    camera_position: Vector3<f32>,
    camera_rotation: Quaternion<f32>,
    offset: Vector3<f32>,
) -> Instance {
    Instance {
        position: camera_position + camera_rotation * offset,
        rotation: camera_rotation,
        ..Default::default()
    }
}

/// True while the loop path is flying, false while the airship is parked.
///
/// A square wave with period `4π / timescale`.
pub fn loop_gate(elapsed_secs: f32, timescale: f32) -> bool {
    (elapsed_secs * timescale / 2.0).sin() > 0.0
}

/// Next pose on the gated loop path.
///
/// While the gate is open the position follows the orbit and the node turns
/// its +Z axis towards where it was before this step. While it is closed the
/// node is parked at the orbit's phase-zero point `(cx, cy + ay, cz)` and
/// keeps its rotation.
pub fn loop_fly(current: &Instance, path: &LoopPath, elapsed_secs: f32) -> Instance {
    let LoopPath {
        center,
        timescale,
        amplitude,
    } = path;
    let mut next = current.clone();
    if loop_gate(elapsed_secs, *timescale) {
        let phase = elapsed_secs * timescale;
        next.position = Vector3::new(
            center.x + phase.sin() * amplitude.x,
            center.y + phase.cos() * amplitude.y,
            center.z + phase.cos() * amplitude.z - amplitude.z,
        );
        next.look_at(current.position);
    } else {
        next.position = Vector3::new(center.x, center.y + amplitude.y, center.z);
    }
    next
}

/// Applies one frame of joystick steering to `node`.
///
/// Forward moves a fixed `step` along the local -X axis, backward along
/// +X. The node turns about its local Y axis as chosen by `steering`.
pub fn steer(node: &mut Instance, intent: &JoystickIntent, step: f32, steering: Steering) {
    if intent.forward > 0.0 {
        node.position += node.rotation * (-Vector3::unit_x() * step);
    }
    if intent.backward > 0.0 {
        node.position += node.rotation * (Vector3::unit_x() * step);
    }
    let turn = match steering {
        Steering::LeftOnly => intent.left,
        Steering::Balanced => intent.left - intent.right,
    };
    if turn != 0.0 {
        node.rotation = (node.rotation * Quaternion::from_angle_y(Rad(turn))).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, One};
    use std::f32::consts::{FRAC_PI_2, PI};

    fn path() -> LoopPath {
        LoopPath {
            center: Vector3::new(-4.15, 1.0, 4.7),
            timescale: 0.5,
            amplitude: Vector3::new(6.0, 0.5, 5.0),
        }
    }

    fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-4, "{a:?} != {b:?}");
    }

    #[test]
    fn bob_scenarios() {
        assert_eq!(bob(0.0, 1.0, 1.0, 0.0), 0.0);
        assert!((bob(0.0, 1.0, 1.0, FRAC_PI_2) - 0.001).abs() < 1e-7);
    }

    #[test]
    fn bob_stays_within_amplitude() {
        for step in 0..1000 {
            let t = step as f32 * 0.37;
            let y = bob(2.0, 2.2, 2.0, t);
            assert!((y - 2.0).abs() <= 0.002 + 1e-6);
        }
    }

    #[test]
    fn bob_does_not_drift() {
        let base = 0.5;
        let first = bob(base, 1.5, 1.0, 10.0);
        (0..100).for_each(|i| {
            bob(base, 1.5, 1.0, i as f32);
        });
        assert_eq!(bob(base, 1.5, 1.0, 10.0), first);
    }

    #[test]
    fn fly_offsets_in_camera_space() {
        let offset = Vector3::new(-0.25, -1.3, -0.25);
        let identity = fly(Vector3::new(1.0, 2.0, 3.0), Quaternion::one(), offset);
        assert_close(identity.position, Vector3::new(0.75, 0.7, 2.75));

        let turned = Quaternion::from_angle_y(Deg(90.0));
        let pose = fly(Vector3::new(0.0, 0.0, 0.0), turned, offset);
        assert_close(pose.position, turned * offset);
        assert_close(pose.position, Vector3::new(-0.25, -1.3, 0.25));
        assert_eq!(pose.rotation, turned);
    }

    #[test]
    fn gate_flips_every_half_period() {
        let period = 4.0 * PI / 0.5;
        assert!(loop_gate(period / 4.0, 0.5));
        assert!(!loop_gate(3.0 * period / 4.0, 0.5));
        assert!(loop_gate(period + period / 4.0, 0.5));
        assert!(!loop_gate(0.0, 0.5));
    }

    #[test]
    fn closed_gate_parks_at_phase_zero() {
        let mut current = Instance::from(Vector3::new(3.0, 3.0, 3.0));
        current.rotation = Quaternion::from_angle_y(Deg(-85.0));
        let next = loop_fly(&current, &path(), 3.0 * 4.0 * PI / 2.0 + 0.1);
        assert_close(next.position, Vector3::new(-4.15, 1.5, 4.7));
        assert_eq!(next.rotation, current.rotation);
    }

    #[test]
    fn open_gate_orbits_and_faces_previous_position() {
        let current = Instance::from(Vector3::new(-4.15, 1.5, 4.7));
        let t = 2.0;
        let next = loop_fly(&current, &path(), t);
        let phase: f32 = t * 0.5;
        assert_close(
            next.position,
            Vector3::new(
                -4.15 + phase.sin() * 6.0,
                1.0 + phase.cos() * 0.5,
                4.7 + phase.cos() * 5.0 - 5.0,
            ),
        );
        let facing = next.rotation * Vector3::unit_z();
        let towards_old = (current.position - next.position).normalize();
        assert_close(facing, towards_old);
    }

    #[test]
    fn steering_moves_along_local_x_and_turns() {
        let mut node = Instance::default();
        steer(
            &mut node,
            &JoystickIntent {
                forward: 0.08,
                right: 0.05,
                ..Default::default()
            },
            0.02,
            Steering::Balanced,
        );
        assert_close(node.position, Vector3::new(-0.02, 0.0, 0.0));
        let expected = Quaternion::from_angle_y(Rad(-0.05));
        assert_close(node.rotation * Vector3::unit_x(), expected * Vector3::unit_x());

        let mut node = Instance::default();
        steer(
            &mut node,
            &JoystickIntent {
                backward: 0.01,
                left: 0.05,
                ..Default::default()
            },
            0.02,
            Steering::Balanced,
        );
        assert_close(node.position, Vector3::new(0.02, 0.0, 0.0));
        let expected = Quaternion::from_angle_y(Rad(0.05));
        assert_close(node.rotation * Vector3::unit_x(), expected * Vector3::unit_x());
    }

    #[test]
    fn left_only_steering_ignores_a_right_deflection() {
        let mut node = Instance::default();
        let right = JoystickIntent {
            forward: 0.08,
            right: 0.05,
            ..Default::default()
        };
        steer(&mut node, &right, 0.02, Steering::LeftOnly);
        assert_close(node.position, Vector3::new(-0.02, 0.0, 0.0));
        assert_eq!(node.rotation, Quaternion::one());

        let left = JoystickIntent {
            left: 0.05,
            ..Default::default()
        };
        steer(&mut node, &left, 0.02, Steering::LeftOnly);
        let expected = Quaternion::from_angle_y(Rad(0.05));
        assert_close(node.rotation * Vector3::unit_x(), expected * Vector3::unit_x());
    }

    #[test]
    fn idle_stick_leaves_node_alone() {
        let mut node = Instance::from(Vector3::new(1.0, 2.0, 3.0));
        steer(&mut node, &JoystickIntent::default(), 0.02, Steering::Balanced);
        assert_eq!(node, Instance::from(Vector3::new(1.0, 2.0, 3.0)));
    }
}
