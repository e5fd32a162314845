use std::sync::Arc;

use crate::{
    data_structures::{
        model,
        scene_graph::{ContainerNode, SceneNode, to_scene_node},
        texture::Texture,
    },
    resources::texture::{diffuse_normal_layout, load_binary, load_texture},
};

/**
 * This module contains all logic for loading meshes and textures from external files.
 */
pub mod texture;

/// Why an asset could not be turned into a scene graph.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch `{path}`")]
    Fetch {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to parse glTF container")]
    Parse(#[from] gltf::Error),
    #[error("failed to decode texture `{name}`")]
    Texture {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("`{path}` contains no nodes")]
    Empty { path: String },
}

/// Resolves `uri` relative to the directory of `file_name`.
fn sibling_path(file_name: &str, uri: &str) -> String {
    match file_name.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, uri),
        None => uri.to_string(),
    }
}

fn buffer_view_bytes<'a>(buffer_data: &'a [Vec<u8>], view: &gltf::buffer::View) -> Option<&'a [u8]> {
    buffer_data
        .get(view.buffer().index())?
        .get(view.offset()..view.offset() + view.length())
}

async fn load_image(
    file_name: &str,
    image: gltf::image::Image<'_>,
    buffer_data: &[Vec<u8>],
    is_normal_map: bool,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<Texture, LoadError> {
    let label = format!("{}#image{}", file_name, image.index());
    match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let bytes = buffer_view_bytes(buffer_data, &view).ok_or_else(|| LoadError::Texture {
                name: label.clone(),
                source: "image buffer view is out of bounds".into(),
            })?;
            Texture::from_bytes(
                device,
                queue,
                bytes,
                &label,
                mime_type.split('/').next_back(),
                is_normal_map,
            )
            .map_err(|e| LoadError::Texture {
                name: label,
                source: e.into(),
            })
        }
        gltf::image::Source::Uri { uri, mime_type } => {
            load_texture(
                &sibling_path(file_name, uri),
                is_normal_map,
                device,
                queue,
                mime_type.and_then(|mt| mt.split('/').next_back()),
            )
            .await
        }
    }
}

/// Loads a glTF (binary or text) asset into a scene-graph subtree.
///
/// The returned root is a container whose children are the top-level nodes
/// of the asset's default scene. Materials without a base colour texture
/// get a 1x1 texture of their base colour factor; primitives without a
/// material use a trailing white default material.
pub async fn load_model_gltf(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<Box<dyn SceneNode>, LoadError> {
    let bytes = load_binary(file_name).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => match gltf.blob.as_deref() {
                Some(blob) => buffer_data.push(blob.to_vec()),
                None => {
                    log::warn!("{}: buffer {} points to a missing binary chunk", file_name, buffer.index());
                    buffer_data.push(Vec::new());
                }
            },
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_binary(&sibling_path(file_name, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Load materials
    let layout = diffuse_normal_layout(device);
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let diffuse_texture = match pbr.base_color_texture() {
            Some(info) => {
                load_image(file_name, info.texture().source(), &buffer_data, false, device, queue).await?
            }
            None => Texture::from_colour(device, queue, pbr.base_color_factor(), "base colour"),
        };
        let normal_texture = match material.normal_texture() {
            Some(normal) => {
                load_image(file_name, normal.texture().source(), &buffer_data, true, device, queue).await?
            }
            None => Texture::create_default_normal_map(device, queue),
        };
        let name = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}#material{}", file_name, materials.len()));
        materials.push(Arc::new(model::Material::new(
            device,
            &name,
            diffuse_texture,
            normal_texture,
            &layout,
        )));
    }
    materials.push(Arc::new(model::Material::new(
        device,
        "default",
        Texture::from_colour(device, queue, [1.0, 1.0, 1.0, 1.0], "default colour"),
        Texture::create_default_normal_map(device, queue),
        &layout,
    )));

    let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
        return Err(LoadError::Empty {
            path: file_name.to_string(),
        });
    };
    let mut root = ContainerNode::new(1);
    root.set_name(file_name);
    for node in scene.nodes() {
        root.add_child(to_scene_node(node, &buffer_data, device, &materials));
    }
    if root.children.is_empty() {
        return Err(LoadError::Empty {
            path: file_name.to_string(),
        });
    }
    log::info!(
        "loaded {} with {} top-level nodes and {} materials",
        file_name,
        root.children.len(),
        materials.len() - 1
    );

    Ok(Box::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uris_resolve_next_to_the_model() {
        assert_eq!(sibling_path("models/insel.glb", "insel.bin"), "models/insel.bin");
        assert_eq!(sibling_path("insel.gltf", "tex/a.png"), "tex/a.png");
    }

    #[test]
    fn load_errors_describe_their_cause() {
        let err = LoadError::Empty {
            path: "models/insel.glb".to_string(),
        };
        assert_eq!(err.to_string(), "`models/insel.glb` contains no nodes");

        let err = LoadError::Fetch {
            path: "models/airship.glb".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound).into(),
        };
        assert!(err.to_string().contains("models/airship.glb"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let Err(err) = gltf::Gltf::from_slice(b"not a gltf") else {
            panic!("garbage parsed as glTF");
        };
        assert!(matches!(LoadError::from(err), LoadError::Parse(_)));
    }
}
