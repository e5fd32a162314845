use cgmath::Vector3;
use sky_isles::{
    animation::bob,
    camera::Camera,
    config::SceneConfig,
    resources::{LoadError, texture::load_binary},
    scene::{Scene, SceneContext, SceneEvent},
};

mod common;
use common::{asset, assert_close};

#[test]
fn islands_bob_without_the_airship() {
    let config = SceneConfig::default();
    let state = SceneContext::new(config.clone());
    let mut scene = Scene::new(&config);
    scene.attach_islands(asset("models/insel.glb", 3).as_ref(), &config);
    // the airship load failed, nothing is attached for it

    let t = std::f32::consts::FRAC_PI_2;
    scene.update(&state, &Camera::default(), t);

    assert!(scene.airship_world().is_none());
    let root = state.root_transform();
    for (i, island) in config.islands.iter().enumerate() {
        let Some(world) = scene.island_world(i) else {
            panic!("island {} missing", i);
        };
        let local_y = bob(0.0, island.frequency, island.amplitude, t);
        assert_close(world.position, root.transform_point(Vector3::new(0.0, local_y, 0.0)));
        assert!((world.scale.x - config.root_scale * config.island_scale).abs() < 1e-5);
    }
}

#[test]
fn airship_flies_without_the_islands() {
    let config = SceneConfig::default();
    let state = SceneContext::new(config.clone());
    let mut scene = Scene::new(&config);
    // the island load failed, only the airship arrives
    scene.attach_airship(asset("models/airship.glb", 1), &config);

    scene.update(&state, &Camera::default(), 1.0);
    let first = scene.airship_world().map(|world| world.position);
    scene.update(&state, &Camera::default(), 2.0);

    assert!(scene.island_world(0).is_none());
    assert!(first.is_some());
    assert_ne!(scene.airship_world().map(|world| world.position), first);
}

#[test]
fn bobbing_does_not_drift_across_frames() {
    let config = SceneConfig::default();
    let state = SceneContext::new(config.clone());
    let mut scene = Scene::new(&config);
    scene.attach_islands(asset("models/insel.glb", 1).as_ref(), &config);

    scene.update(&state, &Camera::default(), 7.0);
    let first = scene.island_world(2).map(|world| world.position);
    for frame in 0..240 {
        scene.update(&state, &Camera::default(), frame as f32 / 60.0);
    }
    scene.update(&state, &Camera::default(), 7.0);

    assert_eq!(scene.island_world(2).map(|world| world.position), first);
}

#[test]
fn assets_attach_in_any_order() {
    let config = SceneConfig::default();
    let state = SceneContext::new(config.clone());
    let mut scene = Scene::new(&config);

    scene.attach_airship(asset("models/airship.glb", 1), &config);
    scene.update(&state, &Camera::default(), 0.5);
    scene.attach_islands(asset("models/insel.glb", 3).as_ref(), &config);
    scene.update(&state, &Camera::default(), 1.0);

    assert!(scene.has_airship());
    assert!(scene.has_islands());
    assert!(scene.airship_world().is_some());
    assert!(scene.island_world(2).is_some());
    assert!(scene.island_world(3).is_none());
}

#[test]
fn second_island_asset_is_ignored() {
    let config = SceneConfig::default();
    let mut scene = Scene::new(&config);
    scene.attach_islands(asset("models/insel.glb", 3).as_ref(), &config);
    scene.attach_islands(asset("models/insel.glb", 3).as_ref(), &config);
    assert_eq!(scene.root().children.len(), 3);
}

#[test]
fn failed_airship_load_leaves_the_islands_running() {
    let config = SceneConfig::default();
    let state = SceneContext::new(config.clone());
    let mut scene = Scene::new(&config);

    let failure = LoadError::Fetch {
        path: config.airship_path.clone(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound).into(),
    };
    scene.apply(SceneEvent::AirshipLoaded(Err(failure)), &config);
    scene.apply(SceneEvent::IslandsLoaded(Ok(asset("models/insel.glb", 3))), &config);

    let t = std::f32::consts::FRAC_PI_2;
    scene.update(&state, &Camera::default(), t);

    assert!(!scene.has_airship());
    assert!(scene.airship_world().is_none());
    let root = state.root_transform();
    let Some(world) = scene.island_world(0) else {
        panic!("islands were not attached");
    };
    let local_y = bob(0.0, config.islands[0].frequency, config.islands[0].amplitude, t);
    assert_close(world.position, root.transform_point(Vector3::new(0.0, local_y, 0.0)));
}

#[tokio::test]
async fn missing_asset_is_a_fetch_error() {
    let Err(err) = load_binary("models/does-not-exist.glb").await else {
        panic!("missing file was read");
    };
    match err {
        LoadError::Fetch { path, .. } => assert_eq!(path, "models/does-not-exist.glb"),
        other => panic!("expected a fetch error, got {}", other),
    }
}
