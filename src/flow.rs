//! Flow control and application event loop.
//!
//! A "flow" is a self-contained piece of scene logic: it handles input,
//! updates its objects each frame and says what to draw. The engine owns
//! the window and the GPU context, hands events to every flow and renders
//! what they return.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S, E>`] is the trait for scene parts that handle events and rendering
//! - [`Out<E>`] is the output type for async event handling
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Collect window/device events
//! 2. Call `on_<device/window/custom>_event` on all flows for event distribution
//! 3. Move the camera and upload its uniform
//! 4. Update flow state (via `on_update`)
//! 5. Call flows' `on_render()` to collect renderable objects
//! 6. Render shadow casters into the sun's shadow map
//! 7. Render everything lit into the frame buffer
//! 8. Present frame

#[cfg(not(target_arch = "wasm32"))]
use std::marker::PhantomData;
use std::{
    fmt::Debug,
    iter,
    pin::Pin,
    sync::{Arc, Once},
};

use instant::{Duration, Instant};
use wgpu::{WasmNotSend, WasmNotSync};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, InitContext, MouseButtonState},
    data_structures::{
        model::{DrawModel, DrawShadow},
        texture::Texture,
    },
    render::{Instanced, Render},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// A future resolving to a custom event.
///
/// Native builds spawn these on the tokio runtime, so they must be `Send`.
#[cfg(not(target_arch = "wasm32"))]
pub type EventFuture<E> = Box<dyn Future<Output = E> + Send>;
/// A future resolving to a custom event.
#[cfg(target_arch = "wasm32")]
pub type EventFuture<E> = Box<dyn Future<Output = E>>;

///
/// This is the Output Type for every lifecycle hook where the user can pass async events that are
/// handled according to the platform you're running on.
///
/// `Out::FutEvent` spawns each future on its own. Every resolved event is put in the Event Queue
/// as soon as it is ready, independent of the others, and then handed to
/// [`GraphicsFlow::on_custom_events`]. The caller is responsible for handling the event later on
/// and it will have no side effects unless handled.
///
/// `Empty` is the default output used when no eventing/futures need to be handled.
///
pub enum Out<E> {
    FutEvent(Vec<EventFuture<E>>),
    Empty,
}

impl<E> Default for Out<E> {
    fn default() -> Self {
        Self::Empty
    }
}

/// Trait for implementing a renderable part of the scene.
///
/// The engine coordinates multiple flows, passes events to them, and
/// composes their renders. All flows share one state `S`.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created; configure context (camera, clear color, etc.)
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_update()` is called every frame
/// 4. `on_custom_events()` is called for custom application events
/// 5. `on_render()` is called each frame and specifies how to render `self`
///
pub trait GraphicsFlow<S, E> {
    /// Initialize the flow and configure the context.
    ///
    /// This is the place to configure things such as the background colour,
    /// the projection or the lighting, and to start loading assets.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<E>;

    /// Update state every frame.
    ///
    /// Called every frame with the elapsed time `dt`, after the camera has
    /// moved. Use for animations and other per-frame logic.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<E>;

    /// Handle raw device events (keyboard, mouse hardware input).
    fn on_device_events(&mut self, _ctx: &Context, _state: &mut S, _event: &DeviceEvent) -> Out<E> {
        Out::Empty
    }

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out<E>;

    /// Handle custom application events.
    ///
    /// Returns the event if it was not consumed, allowing it to be passed to
    /// the next flow. Returning `None` means the event was consumed.
    fn on_custom_events(&mut self, ctx: &Context, state: &mut S, event: E) -> Option<E>;

    /// Return renderable objects for this flow.
    ///
    /// Called each frame. Collect your objects into a [`Render`] and return it.
    fn on_render(&self) -> Render<'_>;
}

// Dummy impl to make wasm work
impl<State, Event> Debug for dyn GraphicsFlow<State, Event> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`. This allows lazy initialization and resource loading.
pub type FlowConstructor<S, E> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S, E>>>>>>;

/// Application state bundle: GPU context, app state, and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State> AppState<State> {
    async fn new(window: Arc<Window>, state: State) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            state,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx.surface.configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    fn update_camera(&mut self, dt: Duration) {
        let camera = &mut self.ctx.camera;
        camera.controller.update(&mut camera.camera, dt);
        camera.uniform.update_view_proj(&camera.camera, &self.ctx.projection);
        self.ctx
            .queue
            .write_buffer(&camera.buffer, 0, bytemuck::cast_slice(&[camera.uniform]));
    }

    fn render<Event>(&mut self, graphics_flows: &[Box<dyn GraphicsFlow<State, Event>>]) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut batch: Vec<Instanced> = Vec::new();
        graphics_flows
            .iter()
            .for_each(|flow| flow.on_render().collect_into(&mut batch));

        let mut encoder: wgpu::CommandEncoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.light.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            shadow_pass.set_pipeline(&self.ctx.pipelines.shadow);
            for instanced in batch.iter().filter(|instanced| instanced.cast_shadow) {
                shadow_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                shadow_pass.draw_model_shadow(
                    instanced.model,
                    0..instanced.amount as u32,
                    &self.ctx.light.sun_bind_group,
                );
            }
        }
        {
            let mut render_pass: wgpu::RenderPass<'_> = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.ctx.pipelines.basic);
            for instanced in &batch {
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_model_instanced(
                    instanced.model,
                    0..instanced.amount as u32,
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                );
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    // Handed over to the `AppState` once the window exists.
    initial_state: Option<State>,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    // This holds the constructors at the start.
    // We use Option to `take()` it after use.
    constructors: Option<Vec<FlowConstructor<State, Event>>>,
    last_time: Instant,
}

impl<State, Event> App<State, Event>
where
    State: 'static,
    Event: WasmNotSend + 'static,
{
    fn new(
        event_loop: &EventLoop<FlowEvent<State, Event>>,
        state: State,
        constructors: Vec<FlowConstructor<State, Event>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            initial_state: Some(state),
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
        })
    }

    fn init_flows(&mut self) {
        let Some(app_state) = self.state.as_mut() else {
            return;
        };
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        self.graphics_flows.iter_mut().for_each(|flow| {
            let events = flow.on_init(&mut app_state.ctx, &mut app_state.state);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &self.proxy,
                events,
            );
        });
        self.last_time = Instant::now();
        app_state.ctx.window.request_redraw();
    }
}

pub(crate) enum FlowEvent<State: 'static, Event: 'static> {
    /// The web build creates the context in a `spawn_local` task and hands
    /// it back through the event loop.
    #[cfg(target_arch = "wasm32")]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    },
    Custom(Event),
    // Native events never carry the state, so the proxy stays `Send`.
    #[cfg(not(target_arch = "wasm32"))]
    #[allow(dead_code)]
    Never(std::convert::Infallible, PhantomData<fn() -> State>),
}

impl<State, Event> Debug for FlowEvent<State, Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized { state: _, flows } => f.debug_struct("Initialized").field("flows", flows).finish(),
            Self::Custom(_) => f.write_str("Custom(E)"),
            #[cfg(not(target_arch = "wasm32"))]
            Self::Never(never, _) => match *never {},
        }
    }
}

impl<State: 'static, Event: WasmNotSend + 'static> ApplicationHandler<FlowEvent<State, Event>> for App<State, Event> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // Only the first resume builds the scene.
        let (Some(constructors), Some(state)) = (self.constructors.take(), self.initial_state.take()) else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("sky-isles");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the main window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window, state).await?;

            let flow_futures: Vec<_> = constructors
                .into_iter()
                // The clone in into() leverages the internal Arcs of Device and Queue and thus only clones the ref
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, flows)) => {
                    self.state = Some(app_state);
                    self.graphics_flows = flows;
                    self.init_flows();
                }
                Err(e) => {
                    log::error!("App initialization failed. Cannot create the main context: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok((state, flows)) => {
                        if proxy.send_event(FlowEvent::Initialized { state, flows }).is_err() {
                            log::error!("Event loop closed before the scene was initialized");
                        }
                    }
                    Err(e) => log::error!("App initialization failed. Cannot create the main context: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent<State, Event>) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized { state, flows } => {
                // This is the message from our wasm `spawn_local`
                self.state = Some(state);
                self.graphics_flows = flows;
                self.init_flows();
            }
            FlowEvent::Custom(custom_event) => {
                if let Some(state) = &mut self.state {
                    let result = self
                        .graphics_flows
                        .iter_mut()
                        .fold(Some(custom_event), |event, flow| {
                            flow.on_custom_events(&state.ctx, &mut state.state, event?)
                        });
                    if result.is_some() {
                        log::warn!("Warning! Custom event was not consumed this cycle");
                    }
                }
            }
            #[cfg(not(target_arch = "wasm32"))]
            FlowEvent::Never(never, _) => match never {},
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event
            && let MouseButtonState::Right = state.ctx.mouse.pressed
        {
            state.ctx.camera.controller.handle_mouse(dx, dy);
        }
        self.graphics_flows.iter_mut().for_each(|f| {
            let events = f.on_device_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &self.proxy,
                events,
            );
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: winit::window::WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        // general stuff
        state.ctx.camera.controller.handle_window_events(&event);

        match &event {
            WindowEvent::CursorMoved { position, .. } => state.ctx.mouse.coords = *position,
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => match (button, button_state.is_pressed()) {
                (MouseButton::Left, true) => state.ctx.mouse.pressed = MouseButtonState::Left,
                (MouseButton::Right, true) => state.ctx.mouse.pressed = MouseButtonState::Right,
                (_, false) => state.ctx.mouse.pressed = MouseButtonState::None,
                _ => (),
            },
            _ => (),
        }

        self.graphics_flows.iter_mut().for_each(|f| {
            let events = f.on_window_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &self.proxy,
                events,
            );
        });

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                state.update_camera(dt);
                self.graphics_flows.iter_mut().for_each(|f| {
                    let events = f.on_update(&state.ctx, &mut state.state, dt);
                    handle_flow_output(
                        #[cfg(not(target_arch = "wasm32"))]
                        &self.async_runtime,
                        &self.proxy,
                        events,
                    );
                });

                match state.render(&self.graphics_flows) {
                    Ok(_) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

fn handle_flow_output<State: 'static, Event: WasmNotSend + 'static>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    proxy: &winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    out: Out<Event>,
) {
    match out {
        // Send the events passed by the user to winit, each as soon as it is ready
        Out::FutEvent(futures) => {
            let proxy = proxy.clone();
            spawn_events(
                #[cfg(not(target_arch = "wasm32"))]
                async_runtime,
                futures,
                move |event| {
                    if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                        log::error!("Event loop was closed before the event could be processed.");
                    }
                },
            );
        }
        Out::Empty => (),
    }
}

/// Spawns every future on its own task and hands each resolved event to
/// `send`. No future waits for another.
fn spawn_events<E: WasmNotSend + 'static>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    futures: Vec<EventFuture<E>>,
    send: impl Fn(E) + Clone + WasmNotSend + WasmNotSync + 'static,
) {
    for future in futures {
        let send = send.clone();
        let task = async move { send(Pin::from(future).await) };

        #[cfg(not(target_arch = "wasm32"))]
        async_runtime.spawn(task);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }
}

/// Installs the logger: `env_logger` (`RUST_LOG`, default `info`) on native,
/// `console_log` on the web. Later calls do nothing.
pub fn init_logger() {
    static LOGGER: Once = Once::new();
    LOGGER.call_once(|| {
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init() {
                eprintln!("Warning: Could not initialize logger: {}", e);
            };
        }

        #[cfg(target_arch = "wasm32")]
        {
            if let Err(e) = console_log::init_with_level(log::Level::Info) {
                web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
            }
        }
    });
}

/// Opens the window and runs `constructors`' flows on the shared `state`
/// until the window is closed.
pub fn run<State: 'static, Event: WasmNotSend + 'static>(
    state: State,
    constructors: Vec<FlowConstructor<State, Event>>,
) -> anyhow::Result<()> {
    init_logger();

    let event_loop: EventLoop<FlowEvent<State, Event>> = EventLoop::with_user_event().build()?;

    let mut app: App<State, Event> = App::new(&event_loop, state, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn events_arrive_as_each_future_resolves() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let slow: EventFuture<&'static str> = Box::new(async move {
            let _ = gate.await;
            "slow"
        });
        let fast: EventFuture<&'static str> = Box::new(async { "fast" });

        let (tx, rx) = mpsc::channel();
        spawn_events(&runtime, vec![slow, fast], move |event| {
            let _ = tx.send(event);
        });

        // the fast event is delivered while the slow one is still pending
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("fast"));
        assert!(rx.try_recv().is_err());

        release.send(()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("slow"));
    }
}
