use sky_isles::{config::SceneConfig, flow, scene};

fn main() -> anyhow::Result<()> {
    flow::init_logger();
    let config = SceneConfig::from_env();
    scene::run(config)
}
