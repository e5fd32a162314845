//! Scene configuration.
//!
//! All layout constants of the scene live in [`SceneConfig`]. The defaults
//! reproduce the floating-islands scene; the binary only picks the control
//! variant from the environment.

use std::str::FromStr;

use cgmath::Vector3;

/// Environment variable selecting the autonomous control variant.
pub const CONTROLS_ENV: &str = "SKY_ISLES_CONTROLS";

/// How the airship moves while it is not piloted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Controls {
    /// Gated looping orbit around a fixed centre.
    #[default]
    Loop,
    /// Steered by the on-screen virtual joystick.
    Joystick,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown controls `{0}`, expected `loop` or `joystick`")]
pub struct UnknownControls(String);

impl FromStr for Controls {
    type Err = UnknownControls;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loop" => Ok(Controls::Loop),
            "joystick" => Ok(Controls::Joystick),
            other => Err(UnknownControls(other.to_string())),
        }
    }
}

/// How left and right stick deflection turns the airship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Steering {
    /// Turn by the left deflection only. A right-only deflection moves the
    /// airship but does not turn it.
    #[default]
    LeftOnly,
    /// Turn left by the left deflection and right by the right deflection.
    Balanced,
}

/// Frequency and amplitude of one island's bobbing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bob {
    pub frequency: f32,
    pub amplitude: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopPath {
    pub center: Vector3<f32>,
    pub timescale: f32,
    pub amplitude: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub controls: Controls,
    /// Honour OS auto-repeat key-downs for the mode switch. When false a
    /// held space key toggles once.
    pub toggle_on_key_repeat: bool,
    pub steering: Steering,

    pub islands_path: String,
    pub airship_path: String,

    pub root_position: Vector3<f32>,
    pub root_scale: f32,
    pub island_scale: f32,
    pub islands: [Bob; 3],
    pub airship_scale: f32,
    /// Initial heading of the airship around +Y, radians.
    pub airship_yaw: f32,

    /// Airship offset from the camera while piloted, in camera space.
    pub pilot_offset: Vector3<f32>,
    pub loop_path: LoopPath,
    /// Distance travelled per frame while the stick points forward or
    /// backward, whatever the deflection.
    pub joystick_step: f32,
    /// Stick radius in pixels; deflections beyond it are clamped.
    pub joystick_radius: f32,

    pub fov_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub shadow_map_size: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            controls: Controls::Loop,
            toggle_on_key_repeat: true,
            steering: Steering::LeftOnly,
            islands_path: "models/insel.glb".to_string(),
            airship_path: "models/airship.glb".to_string(),
            root_position: Vector3::new(0.0, 0.0, -3.0),
            root_scale: 1.0 / 3.0,
            island_scale: 3.0,
            islands: [
                Bob {
                    frequency: 1.0,
                    amplitude: 1.0,
                },
                Bob {
                    frequency: 1.5,
                    amplitude: 1.0,
                },
                Bob {
                    frequency: 2.2,
                    amplitude: 2.0,
                },
            ],
            airship_scale: 2.0,
            airship_yaw: -1.49,
            pilot_offset: Vector3::new(-0.25, -1.3, -0.25),
            loop_path: LoopPath {
                center: Vector3::new(-4.15, 1.0, 4.7),
                timescale: 0.5,
                amplitude: Vector3::new(6.0, 0.5, 5.0),
            },
            joystick_step: 0.02,
            joystick_radius: 100.0,
            fov_degrees: 75.0,
            znear: 0.1,
            zfar: 1000.0,
            shadow_map_size: 2048,
        }
    }
}

impl SceneConfig {
    /// Defaults with the control variant taken from `SKY_ISLES_CONTROLS`.
    ///
    /// An unset variable keeps the loop controls; an unknown value is logged
    /// and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(CONTROLS_ENV) {
            match value.parse() {
                Ok(controls) => config.controls = controls,
                Err(e) => log::warn!("{}: {}", CONTROLS_ENV, e),
            }
        }
        config
    }

    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }
}
