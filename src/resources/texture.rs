use crate::{data_structures::texture, resources::LoadError};

pub fn diffuse_normal_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Model texture_bind_group_layout"),
    })
}

fn fetch_error(file_name: &str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> LoadError {
    LoadError::Fetch {
        path: file_name.to_string(),
        source: source.into(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url, LoadError> {
    let window = web_sys::window().ok_or_else(|| fetch_error(file_name, "no browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| fetch_error(file_name, "page origin is not readable"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin)).map_err(|e| fetch_error(file_name, e))?;
    base.join(file_name).map_err(|e| fetch_error(file_name, e))
}

/// Reads an asset: `./assets/<file_name>` on native, `<origin>/assets/<file_name>` on the web.
pub async fn load_binary(file_name: &str) -> Result<Vec<u8>, LoadError> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| fetch_error(file_name, e))?;
        response.bytes().await.map_err(|e| fetch_error(file_name, e))?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| fetch_error(file_name, e))?
    };

    log::debug!("loaded {} ({} bytes)", file_name, data.len());
    Ok(data)
}

pub async fn load_texture(
    file_name: &str,
    is_normal_map: bool,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: Option<&str>,
) -> Result<texture::Texture, LoadError> {
    let data = load_binary(file_name).await?;
    texture::Texture::from_bytes(device, queue, &data, file_name, format, is_normal_map).map_err(|e| {
        LoadError::Texture {
            name: file_name.to_string(),
            source: e.into(),
        }
    })
}
