//! Render pipelines.
//!
//! - `basic` is the lit pipeline every model goes through
//! - `shadow` renders shadow casters into the sun's depth map
//! - `light` holds the lighting rig and its GPU resources

pub mod basic;
pub mod light;
pub mod shadow;

#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
}
