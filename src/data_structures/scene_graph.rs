//! Scene graph and hierarchical scene organization.
//!
//! A scene graph is a tree of [`SceneNode`]s. Every node owns its children
//! and keeps a local and a world transform per instance; the world transform
//! is `parent_world * local`. [`ContainerNode`]s only group and transform,
//! [`ModelNode`]s additionally draw a mesh.

use std::{ops::Range, sync::Arc};

use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::{Instance, InstanceRaw},
        model,
    },
    render::Instanced,
};

/// Converts a glTF node (and its subtree) into scene nodes.
///
/// Nodes with a mesh become [`ModelNode`]s, all others [`ContainerNode`]s.
/// The glTF node transform becomes the local transform.
pub fn to_scene_node(
    node: gltf::scene::Node,
    buf: &[Vec<u8>],
    device: &wgpu::Device,
    mats: &[Arc<model::Material>],
) -> Box<dyn SceneNode> {
    let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
        Some(mesh) => {
            let mut meshes = Vec::new();

            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| buf.get(buffer.index()).map(Vec::as_slice));

                let mut vertices = Vec::new();
                if let Some(vertex_attribute) = reader.read_positions() {
                    vertex_attribute.for_each(|vertex| {
                        vertices.push(model::ModelVertex {
                            position: vertex,
                            ..Default::default()
                        })
                    });
                }
                if vertices.is_empty() {
                    warn!("skipping primitive {} of mesh {:?} without positions", primitive.index(), mesh.name());
                    continue;
                }
                if let Some(normal_attribute) = reader.read_normals() {
                    vertices
                        .iter_mut()
                        .zip(normal_attribute)
                        .for_each(|(vertex, normal)| vertex.normal = normal);
                }
                if let Some(tex_coord_attribute) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
                    vertices
                        .iter_mut()
                        .zip(tex_coord_attribute)
                        .for_each(|(vertex, tex_coords)| vertex.tex_coords = tex_coords);
                }
                if let Some(tangent_attribute) = reader.read_tangents() {
                    vertices.iter_mut().zip(tangent_attribute).for_each(|(vertex, tangent)| {
                        // GLTF represents tangents as vec4 where the 4th elem can be used to calculate the bitangent
                        let tangent: cgmath::Vector4<f32> = tangent.into();
                        let normal: cgmath::Vector3<f32> = vertex.normal.into();
                        vertex.tangent = tangent.truncate().into();
                        vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
                    });
                }

                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices_raw) => indices_raw.into_u32().collect(),
                    None => (0..vertices.len() as u32).collect(),
                };

                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Vertex Buffer", mesh.name())),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Index Buffer", mesh.name())),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });

                meshes.push(model::Mesh {
                    name: mesh.name().unwrap_or("unknown_mesh").to_string(),
                    vertex_buffer,
                    index_buffer,
                    num_elements: indices.len() as u32,
                    // primitives without a material use the trailing default one
                    material: primitive
                        .material()
                        .index()
                        .unwrap_or(mats.len().saturating_sub(1)),
                });
            }

            let model = model::Model {
                meshes,
                materials: mats.to_vec(),
            };
            Box::new(ModelNode::from_model(Arc::new(model)))
        }
        None => Box::new(ContainerNode::new(1)),
    };
    if let Some(name) = node.name() {
        scene_node.set_name(name);
    }
    let (position, rotation, scale) = node.transform().decomposed();
    scene_node.set_local_transform(
        0,
        Instance {
            position: position.into(),
            rotation: rotation.into(),
            scale: scale.into(),
        },
    );
    for child in node.children() {
        scene_node.add_child(to_scene_node(child, buf, device, mats));
    }

    scene_node
}

/// Nodes are `Send` on native so loaded subtrees can cross from the asset
/// tasks to the event loop.
pub trait SceneNode: wgpu::WasmNotSend {
    fn name(&self) -> Option<&str>;

    fn set_name(&mut self, name: &str);

    fn get_world_transforms(&self) -> Vec<Instance>;

    fn get_local_transform(&self, idx: usize) -> Option<Instance>;

    fn set_local_transform(&mut self, idx: usize, instance: Instance);

    fn set_local_transform_all(&mut self, mutation: &mut dyn FnMut(&mut Instance));

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /// Sets the shadow flags on this node and its whole subtree.
    fn set_shadows(&mut self, cast: bool, receive: bool);

    /**
     * Copies the node and its subtree. Transforms, names and flags are copied;
     * GPU geometry is shared. The copy gets its own instance buffers, which
     * are created on its first `write_to_buffers`.
     */
    fn deep_clone(&self) -> Box<dyn SceneNode>;

    fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device);

    /**
     * Multiple instances of a parent can be passed down to multiple instances of multiple children.
     * The argument `parents_world_transform` with a matching `range` size provides control over which instances are transformed.
     */
    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]);

    fn update_world_transform_all(&mut self) {
        let amount = self.get_world_transforms().len();
        let parents = vec![Instance::default(); amount];
        self.update_world_transforms(0..amount, &parents);
    }

    fn get_render(&self) -> Vec<Instanced<'_>>;
}

/// Shared by both node kinds: applies `parent * local` to the selected
/// instances and returns the resulting world transforms.
fn propagate(
    instances: &mut [(Instance, Instance)],
    range: Range<usize>,
    parents_world_transform: &[Instance],
) -> Option<Vec<Instance>> {
    if parents_world_transform.len() > instances.len() {
        warn!(
            "You tried to transform with len {}, but there are only {} instances to transform.",
            parents_world_transform.len(),
            instances.len()
        );
        return None;
    }
    let Some(selected) = instances.get_mut(range.clone()) else {
        warn!(
            "You tried to transform range {}..{}, which is out of bounds for parent len {}.",
            range.start,
            range.end,
            instances.len(),
        );
        return None;
    };
    Some(
        selected
            .iter_mut()
            .zip(parents_world_transform)
            .map(|((local, world), parent)| {
                *world = parent * &*local;
                world.clone()
            })
            .collect(),
    )
}

pub struct ContainerNode {
    pub children: Vec<Box<dyn SceneNode>>,
    pub instances: Vec<(Instance, Instance)>,
    name: Option<String>,
}

impl ContainerNode {
    pub fn new(amount: usize) -> Self {
        let instances = (0..amount)
            .map(|_| (Instance::default(), Instance::default()))
            .collect();
        Self {
            instances,
            children: vec![],
            name: None,
        }
    }

    pub fn named(name: &str, local: Instance) -> Self {
        Self {
            instances: vec![(local.clone(), local)],
            children: vec![],
            name: Some(name.to_string()),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn set_local_transform(&mut self, idx: usize, instance: Instance) {
        if let Some((local, _)) = self.instances.get_mut(idx) {
            *local = instance;
        }
    }

    fn set_local_transform_all(&mut self, mutation: &mut dyn FnMut(&mut Instance)) {
        self.instances.iter_mut().for_each(|(local, _)| mutation(local));
    }

    fn get_world_transforms(&self) -> Vec<Instance> {
        self.instances.iter().map(|(_, world)| world).cloned().collect()
    }

    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]) {
        if let Some(world_transforms) = propagate(&mut self.instances, range.clone(), parents_world_transform) {
            for child in self.children.iter_mut() {
                child.update_world_transforms(range.clone(), &world_transforms);
            }
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn get_local_transform(&self, idx: usize) -> Option<Instance> {
        self.instances.get(idx).map(|(local, _)| local).cloned()
    }

    fn set_shadows(&mut self, cast: bool, receive: bool) {
        self.children
            .iter_mut()
            .for_each(|child| child.set_shadows(cast, receive));
    }

    fn deep_clone(&self) -> Box<dyn SceneNode> {
        Box::new(Self {
            children: self.children.iter().map(|child| child.deep_clone()).collect(),
            instances: self.instances.clone(),
            name: self.name.clone(),
        })
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue, device));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

pub struct ModelNode {
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: Option<wgpu::Buffer>,
    instances: Vec<(Instance, Instance)>,
    buffer_size_needs_change: bool,
    model: Arc<model::Model>,
    name: Option<String>,
    cast_shadow: bool,
    receive_shadow: bool,
}

impl ModelNode {
    pub fn from_model(model: Arc<model::Model>) -> Self {
        Self {
            children: vec![],
            instance_buffer: None,
            instances: vec![(Instance::default(), Instance::default())],
            buffer_size_needs_change: true,
            model,
            name: None,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

impl SceneNode for ModelNode {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn set_local_transform(&mut self, idx: usize, instance: Instance) {
        if let Some((local, _)) = self.instances.get_mut(idx) {
            *local = instance;
        }
    }

    fn set_local_transform_all(&mut self, mutation: &mut dyn FnMut(&mut Instance)) {
        self.instances.iter_mut().for_each(|(local, _)| mutation(local));
    }

    fn get_world_transforms(&self) -> Vec<Instance> {
        self.instances.iter().map(|(_, world)| world).cloned().collect()
    }

    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]) {
        if let Some(world_transforms) = propagate(&mut self.instances, range.clone(), parents_world_transform) {
            for child in self.children.iter_mut() {
                child.update_world_transforms(range.clone(), &world_transforms);
            }
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn get_local_transform(&self, idx: usize) -> Option<Instance> {
        self.instances.get(idx).map(|(local, _)| local).cloned()
    }

    fn set_shadows(&mut self, cast: bool, receive: bool) {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        self.children
            .iter_mut()
            .for_each(|child| child.set_shadows(cast, receive));
    }

    fn deep_clone(&self) -> Box<dyn SceneNode> {
        Box::new(Self {
            children: self.children.iter().map(|child| child.deep_clone()).collect(),
            instance_buffer: None,
            instances: self.instances.clone(),
            buffer_size_needs_change: true,
            model: Arc::clone(&self.model),
            name: self.name.clone(),
            cast_shadow: self.cast_shadow,
            receive_shadow: self.receive_shadow,
        })
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) {
        let raw_instances: Vec<InstanceRaw> = self
            .instances
            .iter()
            .map(|(_, world)| world.to_raw(self.receive_shadow))
            .collect();
        match (&self.instance_buffer, self.buffer_size_needs_change) {
            (Some(buffer), false) => {
                queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw_instances));
            }
            _ => {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Instance Buffer"),
                    contents: bytemuck::cast_slice(&raw_instances),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
                self.instance_buffer = Some(buffer);
                self.buffer_size_needs_change = false;
            }
        }
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue, device));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        let own = self.instance_buffer.as_ref().map(|instance| Instanced {
            instance,
            model: self.model.as_ref(),
            amount: self.instances.len(),
            cast_shadow: self.cast_shadow,
        });
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .chain(own)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn scaled(position: Vector3<f32>, scale: f32) -> Instance {
        Instance::from(position).with_uniform_scale(scale)
    }

    #[test]
    fn world_transforms_follow_parent_chain() {
        let mut root = ContainerNode::named("root", scaled(Vector3::new(0.0, 0.0, -3.0), 1.0 / 3.0));
        let mut island = ContainerNode::named("island", scaled(Vector3::new(0.0, 0.003, 0.0), 3.0));
        island.add_child(Box::new(ContainerNode::named("mesh", Instance::from(Vector3::new(1.0, 0.0, 0.0)))));
        root.add_child(Box::new(island));

        root.update_world_transform_all();

        let island = &root.get_children()[0];
        let island_world = island.get_world_transforms()[0].clone();
        assert!((island_world.position - Vector3::new(0.0, 0.001, -3.0)).magnitude() < 1e-5);
        assert!((island_world.scale.x - 1.0).abs() < 1e-5);

        let mesh_world = island.get_children()[0].get_world_transforms()[0].clone();
        assert!((mesh_world.position - Vector3::new(1.0, 0.001, -3.0)).magnitude() < 1e-5);
    }

    #[test]
    fn deep_clone_is_independent_of_source() {
        let mut source = ContainerNode::named("insel", Instance::default());
        source.add_child(Box::new(ContainerNode::named("rock", Instance::from(Vector3::new(2.0, 0.0, 0.0)))));

        let mut copy = source.deep_clone();
        copy.get_children_mut()[0].set_local_transform(0, Instance::from(Vector3::new(9.0, 9.0, 9.0)));
        copy.set_name("island1");

        assert_eq!(source.name(), Some("insel"));
        assert_eq!(copy.name(), Some("island1"));
        assert_eq!(copy.get_children()[0].name(), Some("rock"));
        assert_eq!(
            source.get_children()[0].get_local_transform(0).map(|t| t.position),
            Some(Vector3::new(2.0, 0.0, 0.0))
        );
    }

    #[test]
    fn out_of_range_transform_is_ignored() {
        let mut node = ContainerNode::new(1);
        node.set_local_transform(3, Instance::from(Vector3::new(1.0, 1.0, 1.0)));
        node.update_world_transforms(2..4, &[Instance::default()]);
        assert_eq!(node.get_local_transform(0), Some(Instance::default()));
        assert_eq!(node.get_world_transforms(), vec![Instance::default()]);
    }

    #[test]
    fn containers_render_nothing_by_themselves() {
        let mut root = ContainerNode::new(1);
        root.add_child(Box::new(ContainerNode::new(1)));
        root.set_shadows(true, true);
        assert!(root.get_render().is_empty());
    }
}
