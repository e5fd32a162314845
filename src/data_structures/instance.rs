//! Per-node transformation data for GPU rendering.
//!
//! Position, rotation and scale are kept on the CPU as an [`Instance`] and
//! packed into an [`InstanceRaw`] vertex buffer for the shaders.

use std::ops::Mul;

use cgmath::{ElementWise, InnerSpace, Matrix3, One, SquareMatrix, Zero};

use crate::data_structures::model;

/// Transformation of a scene node: position, rotation (as quaternion), and scale.
///
/// Composition with `*` follows parent * child, i.e. `parent * local` yields
/// the child's world transform. Scales compose component-wise, which is exact
/// for the uniform scales used by the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::zero(),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = cgmath::Vector3::new(scale, scale, scale);
        self
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Maps a point from this transform's local space into its parent space.
    pub fn transform_point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        self.position + self.rotation * self.scale.mul_element_wise(point)
    }

    /// Turns the local +Z axis towards `target`, keeping +Y as up.
    ///
    /// A target on top of the node, or straight above or below it, leaves
    /// the rotation untouched.
    pub fn look_at(&mut self, target: cgmath::Vector3<f32>) {
        let forward = target - self.position;
        if forward.magnitude2() <= f32::EPSILON {
            return;
        }
        let forward = forward.normalize();
        let right = cgmath::Vector3::unit_y().cross(forward);
        if right.magnitude2() <= f32::EPSILON {
            return;
        }
        let right = right.normalize();
        let up = forward.cross(right);
        self.rotation = cgmath::Quaternion::from(Matrix3::from_cols(right, up, forward));
    }

    pub fn to_raw(&self, receive_shadow: bool) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        let handedness = world_matrix.determinant().signum();
        InstanceRaw {
            model: world_matrix.into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
            handedness,
            receive_shadow: if receive_shadow { 1.0 } else { 0.0 },
        }
    }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    fn mul(self, rhs: &'b Instance) -> Self::Output {
        Instance {
            position: self.transform_point(rhs.position),
            rotation: self.rotation * rhs.rotation,
            scale: self.scale.mul_element_wise(rhs.scale),
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Self;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
    receive_shadow: f32,
}

/**
 * Stride layout: the model matrix as four vec4s, the normal matrix as three
 * vec3s, then the handedness and the shadow-receiver flag.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 26]>() as wgpu::BufferAddress,
                    shader_location: 13,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Rad, Rotation, Rotation3, Vector3};

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-4
    }

    #[test]
    fn world_transform_applies_parent_scale_then_rotation_then_offset() {
        let parent = Instance {
            position: Vector3::new(0.0, 0.0, -3.0),
            rotation: cgmath::Quaternion::from_angle_y(Rad(std::f32::consts::FRAC_PI_2)),
            scale: Vector3::new(0.5, 0.5, 0.5),
        };
        let child = Instance::from(Vector3::new(2.0, 0.0, 0.0));

        let world = &parent * &child;

        // (2,0,0) * 0.5 = (1,0,0), rotated 90° about Y = (0,0,-1), then offset
        assert!(close(world.position, Vector3::new(0.0, 0.0, -4.0)));
        assert!(close(world.scale, Vector3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn look_at_points_local_z_at_target() {
        let mut node = Instance::from(Vector3::new(1.0, 1.0, 1.0));
        let target = Vector3::new(4.0, 1.0, 5.0);
        node.look_at(target);
        let facing = node.rotation.rotate_vector(Vector3::unit_z());
        assert!(close(facing, (target - node.position).normalize()));
    }

    #[test]
    fn look_at_own_position_keeps_rotation() {
        let mut node = Instance::from(Vector3::new(1.0, 1.0, 1.0));
        node.rotation = cgmath::Quaternion::from_angle_y(Rad(-1.49));
        let before = node.rotation;
        node.look_at(node.position);
        assert_eq!(node.rotation, before);
    }

    #[test]
    fn raw_instance_carries_receiver_flag() {
        let raw = Instance::new().to_raw(true);
        assert_eq!(raw.receive_shadow, 1.0);
        assert_eq!(raw.handedness, 1.0);
        assert_eq!(Instance::new().to_raw(false).receive_shadow, 0.0);
    }
}
