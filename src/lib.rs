//! sky-isles
//!
//! Three floating islands and an airship rendered with wgpu on native and
//! WASM targets. The airship either flies on its own (a gated loop or a
//! virtual joystick) or is piloted, i.e. locked to the camera pose. The space
//! key switches between the two.
//!
//! High-level modules
//! - `animation`: pure per-frame motion (island bob, loop flight, piloted placement, joystick steering)
//! - `camera`: camera pose, projection, desktop controller and uniforms
//! - `config`: scene constants and the control variant
//! - `context`: GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, instances, textures and the scene graph
//! - `flow`: the event loop and the `GraphicsFlow` hooks
//! - `input`: flight-mode switch and virtual joystick
//! - `pipelines`: lit, shadow and lighting-rig GPU resources
//! - `render`: render batching for the shadow and lit passes
//! - `resources`: glTF and texture loading
//! - `scene`: the island and airship flows plus their shared `SceneContext`
//!

pub mod animation;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod input;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

pub use cgmath::*;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
