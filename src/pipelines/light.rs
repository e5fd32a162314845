use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{camera::OPENGL_TO_WGPU_MATRIX, data_structures::texture};

/// Static lights of the scene: a hemisphere fill from the sky dome and a
/// shadow-casting sun. Colours are given as HSL, like a colour picker.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingRig {
    pub sky_hsl: [f32; 3],
    pub ground_hsl: [f32; 3],
    pub hemisphere_intensity: f32,
    pub sun_hsl: [f32; 3],
    pub sun_intensity: f32,
    /// Sun position in world space; it shines towards `sun_target`.
    pub sun_position: Vector3<f32>,
    pub sun_target: Vector3<f32>,
    /// Half extent of the sun's orthographic shadow camera.
    pub shadow_extent: f32,
}

impl Default for LightingRig {
    fn default() -> Self {
        Self {
            sky_hsl: [0.6, 1.0, 1.0],
            ground_hsl: [0.095, 1.0, 0.75],
            hemisphere_intensity: 0.6,
            sun_hsl: [0.9, 1.0, 0.9],
            sun_intensity: 1.0,
            sun_position: Vector3::new(-2.5, 10.0, -2.5),
            sun_target: Vector3::new(0.0, 0.0, 0.0),
            shadow_extent: 5.0,
        }
    }
}

impl LightingRig {
    /// View-projection of the sun's shadow camera.
    pub fn sun_view_proj(&self) -> Matrix4<f32> {
        let e = self.shadow_extent;
        let view = Matrix4::look_at_rh(
            Point3::from_vec(self.sun_position),
            Point3::from_vec(self.sun_target),
            Vector3::unit_y(),
        );
        let proj = cgmath::ortho(-e, e, -e, e, 0.5, 500.0);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }

    pub fn to_uniform(&self) -> LightUniform {
        let linear = |hsl: [f32; 3]| {
            let [h, s, l] = hsl;
            hsl_to_rgb(h, s, l).map(srgb_to_linear)
        };
        LightUniform {
            sun_view_proj: self.sun_view_proj().into(),
            to_sun: (-self.sun_direction()).into(),
            sun_intensity: self.sun_intensity,
            sun_color: linear(self.sun_hsl),
            hemisphere_intensity: self.hemisphere_intensity,
            sky_color: linear(self.sky_hsl),
            _padding: 0.0,
            ground_color: linear(self.ground_hsl),
            _padding2: 0.0,
        }
    }

    /// Direction the sun light travels in, normalized.
    pub fn sun_direction(&self) -> Vector3<f32> {
        (self.sun_target - self.sun_position).normalize()
    }
}

/// Converts HSL (all components in `[0, 1]`) to RGB.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let hue = hue.rem_euclid(1.0);
    let saturation = saturation.clamp(0.0, 1.0);
    let lightness = lightness.clamp(0.0, 1.0);

    if saturation == 0.0 {
        return [lightness; 3];
    }

    let q = if lightness <= 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let p = 2.0 * lightness - q;

    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * 6.0 * (2.0 / 3.0 - t)
        } else {
            p
        }
    };

    [channel(hue + 1.0 / 3.0), channel(hue), channel(hue - 1.0 / 3.0)]
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    sun_view_proj: [[f32; 4]; 4],
    to_sun: [f32; 3],
    sun_intensity: f32,
    sun_color: [f32; 3],
    hemisphere_intensity: f32,
    sky_color: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: f32,
    ground_color: [f32; 3],
    _padding2: f32,
}

/// GPU side of the lighting rig.
///
/// `bind_group` is used by the lit pass and also exposes the shadow map.
/// `sun_bind_group` only carries the uniform, so the shadow pass can write
/// the shadow map while it is bound.
#[derive(Debug)]
pub struct LightResources {
    pub rig: LightingRig,
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: texture::Texture,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub sun_bind_group: wgpu::BindGroup,
    pub sun_bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(rig: LightingRig, shadow_map_size: u32, device: &wgpu::Device) -> Self {
        let uniform = rig.to_uniform();
        let buffer = mk_buffer(device, uniform);
        let shadow_map = texture::Texture::create_shadow_map(device, shadow_map_size);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer, &shadow_map);
        let sun_bind_group_layout = mk_sun_bind_group_layout(device);
        let sun_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &sun_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("sun_bind_group"),
        });
        Self {
            rig,
            uniform,
            buffer,
            shadow_map,
            bind_group,
            bind_group_layout,
            sun_bind_group,
            sun_bind_group_layout,
        }
    }

    /// Replaces the rig and uploads it. The shadow map is kept.
    pub fn set_rig(&mut self, rig: LightingRig, queue: &wgpu::Queue) {
        self.uniform = rig.to_uniform();
        self.rig = rig;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Uniform Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_sun_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("sun_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    shadow_map: &texture::Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
            },
        ],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rgb(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn hsl_primary_colours() {
        assert_rgb(hsl_to_rgb(0.0, 1.0, 0.5), [1.0, 0.0, 0.0]);
        assert_rgb(hsl_to_rgb(1.0 / 3.0, 1.0, 0.5), [0.0, 1.0, 0.0]);
        assert_rgb(hsl_to_rgb(2.0 / 3.0, 1.0, 0.5), [0.0, 0.0, 1.0]);
        assert_rgb(hsl_to_rgb(0.3, 0.0, 0.25), [0.25, 0.25, 0.25]);
    }

    #[test]
    fn hsl_rig_colours() {
        assert_rgb(hsl_to_rgb(0.6, 1.0, 1.0), [1.0, 1.0, 1.0]);
        assert_rgb(hsl_to_rgb(0.095, 1.0, 0.75), [1.0, 0.785, 0.5]);
        assert_rgb(hsl_to_rgb(0.9, 1.0, 0.9), [1.0, 0.8, 0.92]);
    }

    #[test]
    fn uniform_is_std140_sized() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 128);
    }

    #[test]
    fn sun_shines_down_onto_target() {
        let rig = LightingRig::default();
        assert!(rig.sun_direction().y < 0.0);
        let target = rig.sun_view_proj() * cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = target.truncate() / target.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
