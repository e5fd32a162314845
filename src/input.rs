//! Flight-mode switch and virtual joystick.
//!
//! Both only turn window events into plain state. The per-frame updater
//! reads that state on the next frame.

use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, KeyEvent, MouseButton, Touch, TouchPhase, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Who drives the airship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightMode {
    /// Loop path or joystick, depending on the configured controls.
    #[default]
    Autonomous,
    /// Locked to the camera rig.
    Piloted,
}

impl FlightMode {
    pub fn toggled(self) -> Self {
        match self {
            FlightMode::Autonomous => FlightMode::Piloted,
            FlightMode::Piloted => FlightMode::Autonomous,
        }
    }
}

/// Two-state switch bound to the space key. Every key-down toggles,
/// including OS auto-repeats unless the switch is built to ignore them.
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    mode: FlightMode,
    honour_repeats: bool,
}

impl ModeSwitch {
    pub fn new(honour_repeats: bool) -> Self {
        Self {
            mode: FlightMode::Autonomous,
            honour_repeats,
        }
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    /// Applies one key event; returns true when the mode changed.
    ///
    /// Only space key-downs toggle. OS auto-repeat key-downs count as
    /// key-downs unless repeats are ignored.
    pub fn handle_key(&mut self, key: KeyCode, state: ElementState, repeat: bool) -> bool {
        if key != KeyCode::Space || state != ElementState::Pressed {
            return false;
        }
        if repeat && !self.honour_repeats {
            return false;
        }
        self.mode = self.mode.toggled();
        log::info!("flight mode: {:?}", self.mode);
        true
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => self.handle_key(*key, *state, *repeat),
            _ => false,
        }
    }
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Directional magnitudes derived from a stick deflection.
///
/// Each axis has at most one non-zero side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JoystickIntent {
    pub forward: f32,
    pub backward: f32,
    pub left: f32,
    pub right: f32,
}

impl JoystickIntent {
    pub const DIVISOR: f32 = 1000.0;

    /// Converts a deflection in pixels (screen axes, `+y` pointing down)
    /// into intents. The deflection is first clamped to `radius`.
    pub fn from_deflection(x: f32, y: f32, radius: f32) -> Self {
        let length = (x * x + y * y).sqrt();
        let (x, y) = if radius > 0.0 && length > radius {
            (x * radius / length, y * radius / length)
        } else {
            (x, y)
        };
        Self {
            forward: (-y).max(0.0) / Self::DIVISOR,
            backward: y.max(0.0) / Self::DIVISOR,
            right: x.max(0.0) / Self::DIVISOR,
            left: (-x).max(0.0) / Self::DIVISOR,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pointer {
    Mouse,
    Touch(u64),
}

/// On-screen stick: a left-drag or a single-finger drag. The press
/// position is the stick centre.
#[derive(Debug, Clone)]
pub struct VirtualJoystick {
    radius: f32,
    origin: Option<(PhysicalPosition<f64>, Pointer)>,
    cursor: PhysicalPosition<f64>,
    intent: JoystickIntent,
}

impl VirtualJoystick {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            origin: None,
            cursor: PhysicalPosition::new(0.0, 0.0),
            intent: JoystickIntent::default(),
        }
    }

    pub fn intent(&self) -> JoystickIntent {
        self.intent
    }

    pub fn is_engaged(&self) -> bool {
        self.origin.is_some()
    }

    /// Sets the intent from a deflection relative to the stick centre.
    pub fn move_to(&mut self, dx: f32, dy: f32) {
        self.intent = JoystickIntent::from_deflection(dx, dy, self.radius);
    }

    /// Stick released: all intents drop to zero.
    pub fn end(&mut self) {
        self.origin = None;
        self.intent = JoystickIntent::default();
    }

    fn press(&mut self, position: PhysicalPosition<f64>, pointer: Pointer) {
        if self.origin.is_none() {
            self.origin = Some((position, pointer));
            self.intent = JoystickIntent::default();
        }
    }

    fn drag(&mut self, position: PhysicalPosition<f64>, pointer: Pointer) {
        if let Some((origin, active)) = self.origin
            && active == pointer
        {
            self.move_to((position.x - origin.x) as f32, (position.y - origin.y) as f32);
        }
    }

    fn release(&mut self, pointer: Pointer) {
        if matches!(self.origin, Some((_, active)) if active == pointer) {
            self.end();
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = *position;
                self.drag(*position, Pointer::Mouse);
                self.is_engaged()
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => self.press(self.cursor, Pointer::Mouse),
                    ElementState::Released => self.release(Pointer::Mouse),
                }
                true
            }
            WindowEvent::Touch(Touch {
                phase, location, id, ..
            }) => {
                let pointer = Pointer::Touch(*id);
                match phase {
                    TouchPhase::Started => self.press(*location, pointer),
                    TouchPhase::Moved => self.drag(*location, pointer),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.release(pointer),
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn odd_number_of_presses_pilots() {
        for presses in 0..6 {
            let mut switch = ModeSwitch::new(false);
            (0..presses).for_each(|_| {
                switch.handle_key(KeyCode::Space, ElementState::Pressed, false);
            });
            let expected = if presses % 2 == 1 {
                FlightMode::Piloted
            } else {
                FlightMode::Autonomous
            };
            assert_eq!(switch.mode(), expected);
        }
    }

    #[test]
    fn releases_and_other_keys_do_not_toggle() {
        let mut switch = ModeSwitch::default();
        assert!(!switch.handle_key(KeyCode::Space, ElementState::Released, false));
        assert!(!switch.handle_key(KeyCode::KeyW, ElementState::Pressed, false));
        assert_eq!(switch.mode(), FlightMode::Autonomous);
    }

    #[test]
    fn key_repeat_is_configurable() {
        let mut strict = ModeSwitch::new(false);
        assert!(!strict.handle_key(KeyCode::Space, ElementState::Pressed, true));
        assert_eq!(strict.mode(), FlightMode::Autonomous);

        let mut literal = ModeSwitch::new(true);
        assert!(literal.handle_key(KeyCode::Space, ElementState::Pressed, true));
        assert!(literal.handle_key(KeyCode::Space, ElementState::Pressed, true));
        assert_eq!(literal.mode(), FlightMode::Autonomous);
    }

    #[test]
    fn held_space_toggles_on_every_repeat() {
        for downs in 1..7 {
            let mut switch = ModeSwitch::default();
            switch.handle_key(KeyCode::Space, ElementState::Pressed, false);
            (1..downs).for_each(|_| {
                assert!(switch.handle_key(KeyCode::Space, ElementState::Pressed, true));
            });
            switch.handle_key(KeyCode::Space, ElementState::Released, false);
            let expected = if downs % 2 == 1 {
                FlightMode::Piloted
            } else {
                FlightMode::Autonomous
            };
            assert_eq!(switch.mode(), expected, "{} key-downs", downs);
        }
    }

    #[test]
    fn deflection_maps_to_intents() {
        let mut stick = VirtualJoystick::new(100.0);
        stick.move_to(50.0, -80.0);
        let intent = stick.intent();
        assert!(close(intent.forward, 0.08));
        assert!(close(intent.backward, 0.0));
        assert!(close(intent.right, 0.05));
        assert!(close(intent.left, 0.0));

        stick.end();
        assert!(stick.intent().is_idle());
    }

    #[test]
    fn deflection_is_clamped_to_radius() {
        let intent = JoystickIntent::from_deflection(-300.0, 400.0, 100.0);
        assert!(close(intent.left, 0.06));
        assert!(close(intent.backward, 0.08));
        assert!(close(intent.forward, 0.0));
        assert!(close(intent.right, 0.0));
    }

    #[test]
    fn mouse_drag_drives_the_stick() {
        let mut stick = VirtualJoystick::new(100.0);
        let at = |x, y| WindowEvent::CursorMoved {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            position: PhysicalPosition::new(x, y),
        };
        let button = |state| WindowEvent::MouseInput {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            state,
            button: MouseButton::Left,
        };

        stick.handle_window_events(&at(200.0, 200.0));
        assert!(stick.intent().is_idle());
        stick.handle_window_events(&button(ElementState::Pressed));
        stick.handle_window_events(&at(230.0, 160.0));
        assert!(close(stick.intent().forward, 0.04));
        assert!(close(stick.intent().right, 0.03));

        stick.handle_window_events(&button(ElementState::Released));
        assert!(stick.intent().is_idle());
        assert!(!stick.is_engaged());
    }
}
