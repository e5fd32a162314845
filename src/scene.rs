//! The floating-islands scene.
//!
//! Two flows share one [`SceneContext`]:
//!
//! - [`ControlsFlow`] configures the context (projection, lighting, clear
//!   colour) and turns window events into the flight mode and joystick intent
//! - [`SceneFlow`] loads the assets, owns the scene graph and moves the
//!   islands and the airship every frame
//!
//! [`Scene`] holds all per-frame logic and needs no GPU, so tests drive it
//! with container nodes.

use cgmath::{EuclideanSpace, Quaternion, Rad, Rotation3};
use instant::{Duration, Instant};
use winit::event::WindowEvent;

use crate::{
    animation::{bob, fly, loop_fly, steer},
    camera::{Camera, Projection},
    config::{Bob, Controls, SceneConfig},
    context::{Context, InitContext},
    data_structures::{
        instance::Instance,
        scene_graph::{ContainerNode, SceneNode},
    },
    flow::{self, EventFuture, FlowConstructor, GraphicsFlow, Out},
    input::{FlightMode, ModeSwitch, VirtualJoystick},
    pipelines::light::LightingRig,
    render::Render,
    resources::{LoadError, load_model_gltf},
};

/// State shared by all flows of the scene.
#[derive(Debug)]
pub struct SceneContext {
    pub config: SceneConfig,
    pub mode: ModeSwitch,
    pub joystick: VirtualJoystick,
    started: Instant,
}

impl SceneContext {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            mode: ModeSwitch::new(config.toggle_on_key_repeat),
            joystick: VirtualJoystick::new(config.joystick_radius),
            config,
            started: Instant::now(),
        }
    }

    pub fn flight_mode(&self) -> FlightMode {
        self.mode.mode()
    }

    /// Scene clock: seconds since the scene was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// Feeds one window event to the mode switch and, with joystick
    /// controls, to the virtual joystick.
    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        self.mode.handle_window_events(event);
        if self.config.controls == Controls::Joystick {
            self.joystick.handle_window_events(event);
        }
    }

    /// The scene root's world transform.
    pub fn root_transform(&self) -> Instance {
        Instance::from(self.config.root_position).with_uniform_scale(self.config.root_scale)
    }
}

/// Results of the asset loads started in [`SceneFlow::on_init`].
pub enum SceneEvent {
    IslandsLoaded(Result<Box<dyn SceneNode>, LoadError>),
    AirshipLoaded(Result<Box<dyn SceneNode>, LoadError>),
}

impl std::fmt::Debug for SceneEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, result) = match self {
            SceneEvent::IslandsLoaded(result) => ("IslandsLoaded", result),
            SceneEvent::AirshipLoaded(result) => ("AirshipLoaded", result),
        };
        match result {
            Ok(node) => write!(f, "{}(Ok({:?}))", name, node.name()),
            Err(e) => write!(f, "{}(Err({:?}))", name, e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Island {
    /// Index into the root's children.
    node: usize,
    bob: Bob,
    base_y: f32,
}

/// Scene graph plus the bookkeeping needed to animate it.
///
/// Islands and the airship are attached whenever their asset arrives, in
/// any order. Until then the per-frame update skips them.
pub struct Scene {
    root: ContainerNode,
    islands: Vec<Island>,
    airship: Option<usize>,
}

impl Scene {
    pub fn new(config: &SceneConfig) -> Self {
        let local = Instance::from(config.root_position).with_uniform_scale(config.root_scale);
        let mut root = ContainerNode::named("scene", local);
        root.update_world_transform_all();
        Self {
            root,
            islands: Vec::new(),
            airship: None,
        }
    }

    pub fn root(&self) -> &ContainerNode {
        &self.root
    }

    pub fn has_islands(&self) -> bool {
        !self.islands.is_empty()
    }

    pub fn has_airship(&self) -> bool {
        self.airship.is_some()
    }

    /// Builds the three islands from `asset`.
    ///
    /// Island *i* wraps a deep clone of the asset's *i*-th top-level child
    /// when there are at least three of them, otherwise of the first one.
    /// The asset itself is left untouched.
    pub fn attach_islands(&mut self, asset: &dyn SceneNode, config: &SceneConfig) {
        if self.has_islands() {
            log::warn!("islands are already attached, ignoring {:?}", asset.name());
            return;
        }
        let sources = asset.get_children();
        if sources.is_empty() {
            log::warn!("{:?} has no nodes to build islands from", asset.name());
            return;
        }
        for (i, bob) in config.islands.iter().enumerate() {
            let source = if sources.len() >= config.islands.len() {
                &sources[i]
            } else {
                &sources[0]
            };
            let local = Instance::default().with_uniform_scale(config.island_scale);
            let base_y = local.position.y;
            let mut island = ContainerNode::named(&format!("island{}", i + 1), local);
            island.add_child(source.deep_clone());
            island.set_shadows(true, true);

            self.root.add_child(Box::new(island));
            self.islands.push(Island {
                node: self.root.children.len() - 1,
                bob: *bob,
                base_y,
            });
        }
        self.root.update_world_transform_all();
        log::info!("attached {} islands", self.islands.len());
    }

    /// Wraps `asset` in the airship node with its initial scale and heading.
    pub fn attach_airship(&mut self, asset: Box<dyn SceneNode>, config: &SceneConfig) {
        if self.has_airship() {
            log::warn!("airship is already attached, ignoring {:?}", asset.name());
            return;
        }
        let local = Instance {
            rotation: Quaternion::from_angle_y(Rad(config.airship_yaw)),
            ..Instance::default().with_uniform_scale(config.airship_scale)
        };
        let mut airship = ContainerNode::named("airship", local);
        airship.add_child(asset);
        airship.set_shadows(true, true);

        self.root.add_child(Box::new(airship));
        self.airship = Some(self.root.children.len() - 1);
        self.root.update_world_transform_all();
        log::info!("attached airship");
    }

    /// Advances the scene to `elapsed_secs`.
    ///
    /// Islands bob around their attach height. The airship is written by
    /// exactly one driver: the camera rig while piloted, otherwise the loop
    /// path or the joystick depending on the configured controls. All three
    /// write the airship's own transform, relative to the scene root.
    pub fn update(&mut self, state: &SceneContext, camera: &Camera, elapsed_secs: f32) {
        for island in &self.islands {
            if let Some(node) = self.root.children.get_mut(island.node) {
                let Bob { frequency, amplitude } = island.bob;
                node.set_local_transform_all(&mut |local| {
                    local.position.y = bob(island.base_y, frequency, amplitude, elapsed_secs)
                });
            }
        }

        if let Some(airship) = self.airship.and_then(|idx| self.root.children.get_mut(idx))
            && let Some(current) = airship.get_local_transform(0)
        {
            let config = &state.config;
            let next = match (state.flight_mode(), config.controls) {
                (FlightMode::Piloted, _) => Instance {
                    scale: current.scale,
                    ..fly(camera.position.to_vec(), camera.orientation(), config.pilot_offset)
                },
                (FlightMode::Autonomous, Controls::Loop) => loop_fly(&current, &config.loop_path, elapsed_secs),
                (FlightMode::Autonomous, Controls::Joystick) => {
                    let mut next = current;
                    steer(&mut next, &state.joystick.intent(), config.joystick_step, config.steering);
                    next
                }
            };
            airship.set_local_transform(0, next);
        }

        self.root.update_world_transform_all();
    }

    /// Attaches a loaded asset. A failed load is logged and leaves the rest
    /// of the scene running.
    pub fn apply(&mut self, event: SceneEvent, config: &SceneConfig) {
        match event {
            SceneEvent::IslandsLoaded(Ok(asset)) => self.attach_islands(asset.as_ref(), config),
            SceneEvent::AirshipLoaded(Ok(asset)) => self.attach_airship(asset, config),
            SceneEvent::IslandsLoaded(Err(e)) => report("islands", &e),
            SceneEvent::AirshipLoaded(Err(e)) => report("airship", &e),
        }
    }

    /// Local transform of the airship node, relative to the scene root.
    pub fn airship_local(&self) -> Option<Instance> {
        self.root.children.get(self.airship?)?.get_local_transform(0)
    }

    /// World transform of the airship node, once attached.
    pub fn airship_world(&self) -> Option<Instance> {
        let node = self.root.children.get(self.airship?)?;
        node.get_world_transforms().into_iter().next()
    }

    /// World transform of island `i` (0-based), once attached.
    pub fn island_world(&self, i: usize) -> Option<Instance> {
        let node = self.root.children.get(self.islands.get(i)?.node)?;
        node.get_world_transforms().into_iter().next()
    }

    pub fn write_to_buffers(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) {
        self.root.write_to_buffers(queue, device);
    }

    pub fn render(&self) -> Render<'_> {
        Render::Defaults(self.root.get_render())
    }
}

fn report(what: &str, err: &LoadError) {
    let mut message = format!("failed to load the {}: {}", what, err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    log::error!("{}", message);
}

/// Context configuration and input.
pub struct ControlsFlow;

impl GraphicsFlow<SceneContext, SceneEvent> for ControlsFlow {
    fn on_init(&mut self, ctx: &mut Context, state: &mut SceneContext) -> Out<SceneEvent> {
        let config = &state.config;
        ctx.projection = Projection::new(
            ctx.config.width,
            ctx.config.height,
            cgmath::Deg(config.fov_degrees),
            config.znear,
            config.zfar,
        );
        ctx.camera.camera = Camera::default();

        let defaults = LightingRig::default();
        let root = state.root_transform();
        let rig = LightingRig {
            sun_position: root.transform_point(defaults.sun_position),
            ..defaults
        };
        ctx.set_lighting(rig, config.shadow_map_size);

        ctx.clear_colour = match config.controls {
            Controls::Loop => wgpu::Color::BLACK,
            Controls::Joystick => wgpu::Color::TRANSPARENT,
        };
        log::info!("controls: {:?}, press space to take the helm", config.controls);
        Out::Empty
    }

    fn on_update(&mut self, _ctx: &Context, _state: &mut SceneContext, _dt: Duration) -> Out<SceneEvent> {
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _ctx: &Context,
        state: &mut SceneContext,
        event: &WindowEvent,
    ) -> Out<SceneEvent> {
        state.handle_window_events(event);
        Out::Empty
    }

    fn on_custom_events(&mut self, _ctx: &Context, _state: &mut SceneContext, event: SceneEvent) -> Option<SceneEvent> {
        Some(event)
    }

    fn on_render(&self) -> Render<'_> {
        Render::None
    }
}

/// Islands and airship.
pub struct SceneFlow {
    scene: Scene,
}

impl SceneFlow {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            scene: Scene::new(config),
        }
    }
}

impl GraphicsFlow<SceneContext, SceneEvent> for SceneFlow {
    fn on_init(&mut self, ctx: &mut Context, state: &mut SceneContext) -> Out<SceneEvent> {
        let islands: EventFuture<SceneEvent> = {
            let InitContext { device, queue } = InitContext::from(&*ctx);
            let path = state.config.islands_path.clone();
            Box::new(async move { SceneEvent::IslandsLoaded(load_model_gltf(&path, &device, &queue).await) })
        };
        let airship: EventFuture<SceneEvent> = {
            let InitContext { device, queue } = InitContext::from(&*ctx);
            let path = state.config.airship_path.clone();
            Box::new(async move { SceneEvent::AirshipLoaded(load_model_gltf(&path, &device, &queue).await) })
        };
        Out::FutEvent(vec![islands, airship])
    }

    fn on_update(&mut self, ctx: &Context, state: &mut SceneContext, _dt: Duration) -> Out<SceneEvent> {
        self.scene.update(state, &ctx.camera.camera, state.elapsed_secs());
        self.scene.write_to_buffers(&ctx.queue, &ctx.device);
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _ctx: &Context,
        _state: &mut SceneContext,
        _event: &WindowEvent,
    ) -> Out<SceneEvent> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _ctx: &Context, state: &mut SceneContext, event: SceneEvent) -> Option<SceneEvent> {
        self.scene.apply(event, &state.config);
        None
    }

    fn on_render(&self) -> Render<'_> {
        self.scene.render()
    }
}

/// Flow constructors of the scene, in event order.
pub fn flows(config: &SceneConfig) -> Vec<FlowConstructor<SceneContext, SceneEvent>> {
    let scene = SceneFlow::new(config);
    let controls: FlowConstructor<SceneContext, SceneEvent> =
        Box::new(|_| Box::pin(async move { Box::new(ControlsFlow) as Box<dyn GraphicsFlow<_, _>> }));
    let scene: FlowConstructor<SceneContext, SceneEvent> =
        Box::new(move |_| Box::pin(async move { Box::new(scene) as Box<dyn GraphicsFlow<_, _>> }));
    vec![controls, scene]
}

/// Opens the window and runs the scene until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    let constructors = flows(&config);
    flow::run(SceneContext::new(config), constructors)
}

/// Web entry point. `?controls=joystick` in the page URL selects the
/// joystick controls.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    flow::init_logger();
    let mut config = SceneConfig::default();
    let search = web_sys::window()
        .and_then(|window| window.location().search().ok())
        .unwrap_or_default();
    if let Some(value) = search
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix("controls="))
    {
        match value.parse() {
            Ok(controls) => config.controls = controls,
            Err(e) => log::warn!("{}", e),
        }
    }
    run(config).map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn asset(children: usize) -> ContainerNode {
        let mut asset = ContainerNode::named("insel.glb", Instance::default());
        for i in 0..children {
            asset.add_child(Box::new(ContainerNode::named(
                &format!("rock{}", i),
                Instance::from(Vector3::new(i as f32, 0.0, 0.0)),
            )));
        }
        asset
    }

    #[test]
    fn islands_use_distinct_children_when_available() {
        let config = SceneConfig::default();
        let mut scene = Scene::new(&config);
        let source = asset(3);
        scene.attach_islands(&source, &config);

        let names: Vec<_> = scene
            .root()
            .get_children()
            .iter()
            .map(|island| island.get_children()[0].name().map(str::to_string))
            .collect();
        assert_eq!(
            names,
            vec![Some("rock0".to_string()), Some("rock1".to_string()), Some("rock2".to_string())]
        );
        // the source is cloned, not moved
        assert_eq!(source.get_children().len(), 3);
    }

    #[test]
    fn single_child_asset_is_cloned_three_times() {
        let config = SceneConfig::default();
        let mut scene = Scene::new(&config);
        scene.attach_islands(&asset(1), &config);
        assert_eq!(scene.root().get_children().len(), 3);
        assert!(
            scene
                .root()
                .get_children()
                .iter()
                .all(|island| island.get_children()[0].name() == Some("rock0"))
        );
    }

    #[test]
    fn empty_asset_attaches_nothing() {
        let config = SceneConfig::default();
        let mut scene = Scene::new(&config);
        scene.attach_islands(&asset(0), &config);
        assert!(!scene.has_islands());
    }

    #[test]
    fn airship_starts_scaled_and_turned() {
        let config = SceneConfig::default();
        let mut scene = Scene::new(&config);
        scene.attach_airship(Box::new(asset(1)), &config);
        let Some(world) = scene.airship_world() else {
            panic!("airship not attached");
        };
        assert!((world.scale.x - 2.0 / 3.0).abs() < 1e-5);
        let heading = world.rotation * Vector3::unit_x();
        let expected = Quaternion::from_angle_y(Rad(-1.49)) * Vector3::unit_x();
        assert!((heading - expected).magnitude() < 1e-5);
    }

    #[test]
    fn update_before_assets_is_a_no_op() {
        let config = SceneConfig::default();
        let state = SceneContext::new(config.clone());
        let mut scene = Scene::new(&config);
        scene.update(&state, &Camera::default(), 1.0);
        assert!(scene.airship_world().is_none());
        assert!(scene.island_world(0).is_none());
    }
}
