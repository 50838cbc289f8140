// Effect lifecycle: element adoption, surface sizing, render-loop scheduling,
// resize and visibility handling, restart and teardown for one effect instance.
// Failures are logged at this boundary and never propagate into the page.

use crate::clock::{FrameClock, FrameTime};
use crate::config::{
    self, Options, BACKGROUND_ALPHA, BACKGROUND_COLOR, FORCE_ANIMATE, PIXELATED, SPEED,
};
use crate::effect::{Effect, EffectContext};
use crate::engine::RenderingEngine;
use crate::error::{EffectError, HookError};
use crate::host::{FrameTask, Host, Target};
use crate::scene::{PerspectiveCamera, Scene};
use crate::sizing::SizingPolicy;
use crate::surface::{CanvasSize, FrameState, SurfaceAdapter};
use crate::types::{CssPosition, FrameHandle, ListenerId, SurfaceSize};
use crate::visibility::VisibilityProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructing,
    Initializing,
    /// Initialization failed; terminal.
    Failed,
    Running,
    /// Torn down; terminal.
    Destroyed,
}

/// One effect instance bound to one host element.
pub struct EffectLifecycle<E: Effect, H: Host> {
    state: LifecycleState,
    plugin: E,
    host: H,
    element: H::Element,
    options: Options,
    clock: FrameClock,
    size: SurfaceSize,
    camera: Option<PerspectiveCamera>,
    surface: SurfaceAdapter<H::Canvas>,
    frame_request: Option<FrameHandle>,
    settle_request: Option<FrameHandle>,
    resize_listener: Option<ListenerId>,
    render_failing: bool,
}

impl<E: Effect, H: Host> EffectLifecycle<E, H> {
    /// Adopt the target element and start animating.
    ///
    /// Returns an error (already logged) when the element cannot be resolved or the plugin
    /// fails to initialize. In both cases nothing stays registered with the host.
    pub fn new(
        plugin: E,
        host: H,
        engine: &dyn RenderingEngine<H::Canvas>,
        target: Target<H::Element>,
        overrides: &Options,
    ) -> Result<Self, EffectError> {
        let name = plugin.name();
        Self::construct(plugin, host, engine, target, overrides).map_err(|err| {
            log::error!("[{}] {}", name, err);
            err
        })
    }

    fn construct(
        plugin: E,
        mut host: H,
        engine: &dyn RenderingEngine<H::Canvas>,
        target: Target<H::Element>,
        overrides: &Options,
    ) -> Result<Self, EffectError> {
        let element = match target {
            Target::Element(element) => element,
            Target::Selector(selector) => host
                .query_selector(&selector)
                .ok_or(EffectError::MissingElement(selector))?,
        };
        let options = config::resolve(&plugin.default_options(), overrides);

        prepare_element(&mut host, &element);

        let mut instance = EffectLifecycle {
            state: LifecycleState::Constructing,
            plugin,
            host,
            element,
            options,
            clock: FrameClock::new(),
            size: SurfaceSize::default(),
            camera: None,
            surface: SurfaceAdapter::detached(),
            frame_request: None,
            settle_request: None,
            resize_listener: None,
            render_failing: false,
        };

        let pixelated = instance.options.flag(PIXELATED);
        match SurfaceAdapter::create(&mut instance.host, &instance.element, engine, pixelated) {
            Ok(adapter) => instance.surface = adapter,
            Err(err) => log::warn!("[{}] {}", instance.plugin.name(), err),
        }

        // Init needs a size.
        instance.set_size();
        instance.state = LifecycleState::Initializing;
        if let Err(cause) = instance.init() {
            instance
                .surface
                .detach(&mut instance.host, &instance.element);
            instance.state = LifecycleState::Failed;
            return Err(EffectError::InitializationFailure(cause));
        }

        instance.state = LifecycleState::Running;
        log::debug!(
            "[{}] running at {}x{}",
            instance.plugin.name(),
            instance.size.width,
            instance.size.height
        );
        instance.resize();
        let now = instance.host.now();
        instance.animation_frame(now);
        instance.resize_listener = Some(instance.host.add_resize_listener());
        // Layout measured before styles settle can be stale.
        instance.settle_request = Some(instance.host.request_frame(FrameTask::Resize));
        Ok(instance)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn time(&self) -> FrameTime {
        self.clock.time()
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.camera.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        self.surface.scene()
    }

    pub fn element(&self) -> &H::Element {
        &self.element
    }

    pub fn plugin(&self) -> &E {
        &self.plugin
    }

    pub fn canvas_size(&self) -> Option<CanvasSize> {
        self.surface.canvas_size()
    }

    pub fn has_surface(&self) -> bool {
        self.surface.has_surface()
    }

    /// Pending animation-loop registration.
    pub fn frame_request(&self) -> Option<FrameHandle> {
        self.frame_request
    }

    pub fn resize_listener(&self) -> Option<ListenerId> {
        self.resize_listener
    }

    pub fn is_on_screen(&self) -> bool {
        VisibilityProbe::is_on_screen(
            &self.host.element_metrics(&self.element),
            &self.host.viewport(),
        )
    }

    /// Merge `partial` into the live options. Takes effect on the next tick or resize.
    pub fn set_options(&mut self, partial: &Options) {
        if self.is_terminal("set_options") {
            return;
        }
        self.options = self.options.merged(partial);
    }

    pub fn resize(&mut self) {
        if self.is_terminal("resize") {
            return;
        }
        self.set_size();
        let aspect = self.size.aspect();
        if let Some(camera) = self.camera.as_mut() {
            camera.set_aspect(aspect);
        }
        let pixel_ratio = self.host.viewport().device_pixel_ratio / self.size.scale;
        self.surface
            .resize(self.size.width, self.size.height, pixel_ratio);
        self.hook(|plugin, ctx| plugin.on_resize(ctx));
    }

    /// Rebuild scene content in place; the surface, loop and listeners stay registered.
    pub fn restart(&mut self) {
        if self.is_terminal("restart") {
            return;
        }
        self.surface.clear_scene();
        self.hook(|plugin, ctx| plugin.on_restart(ctx));
        if let Err(cause) = self.init() {
            log::error!("[{}] {}", self.plugin.name(), EffectError::InitializationFailure(cause));
        }
    }

    pub fn destroy(&mut self) {
        if self.is_terminal("destroy") {
            return;
        }
        self.hook(|plugin, ctx| plugin.on_destroy(ctx));
        if let Some(id) = self.resize_listener.take() {
            self.host.remove_resize_listener(id);
        }
        if let Some(handle) = self.frame_request.take() {
            self.host.cancel_frame(handle);
        }
        if let Some(handle) = self.settle_request.take() {
            self.host.cancel_frame(handle);
        }
        self.surface.dispose_all();
        self.surface.detach(&mut self.host, &self.element);
        self.camera = None;
        self.state = LifecycleState::Destroyed;
        log::debug!("[{}] destroyed", self.plugin.name());
    }

    /// One animation-loop iteration; schedules the next.
    pub fn animation_frame(&mut self, now_ms: f64) {
        if self.state != LifecycleState::Running {
            return;
        }
        self.clock.advance(now_ms, self.options.number(SPEED));

        // Without a surface there is nothing to show, so the scene is left as built.
        let animate = self.is_on_screen() || self.options.flag(FORCE_ANIMATE);
        if animate && self.surface.has_surface() {
            self.hook(|plugin, ctx| plugin.on_update(ctx));
            self.draw();
            self.hook(|plugin, ctx| plugin.on_after_render(ctx));
        }

        // At most one tick stays registered with the host.
        if let Some(previous) = self.frame_request.take() {
            self.host.cancel_frame(previous);
        }
        self.frame_request = Some(self.host.request_frame(FrameTask::Tick));
    }

    /// One-shot resize requested after the first frame.
    pub fn resize_frame(&mut self, _now_ms: f64) {
        self.settle_request = None;
        if self.state == LifecycleState::Running {
            self.resize();
        }
    }

    /// Window resize event.
    pub fn window_resized(&mut self) {
        if self.state == LifecycleState::Running {
            self.resize();
        }
    }

    fn draw(&mut self) {
        let Some(camera) = self.camera.as_ref() else {
            return;
        };
        let frame = FrameState {
            camera,
            background: self.options.color(BACKGROUND_COLOR),
            background_alpha: self.options.number_or(BACKGROUND_ALPHA, 1.0),
        };
        match self.surface.render(frame) {
            Ok(()) => self.render_failing = false,
            Err(err) => {
                if !self.render_failing {
                    log::warn!("[{}] {}", self.plugin.name(), err);
                }
                self.render_failing = true;
            }
        }
    }

    fn init(&mut self) -> Result<(), HookError> {
        self.hook(|plugin, ctx| plugin.on_init(ctx))
    }

    fn set_size(&mut self) {
        let user_agent = self.host.user_agent();
        self.size = SizingPolicy::compute_size(
            &self.host.element_metrics(&self.element),
            &self.host.viewport(),
            user_agent.as_deref(),
            &self.options,
            Some(self.size.scale),
        );
    }

    fn hook<R>(&mut self, f: impl FnOnce(&mut E, &mut EffectContext<'_>) -> R) -> R {
        let mut ctx = EffectContext {
            scene: self.surface.scene_mut(),
            camera: &mut self.camera,
            options: &self.options,
            size: self.size,
            time: self.clock.time(),
        };
        f(&mut self.plugin, &mut ctx)
    }

    fn is_terminal(&self, operation: &str) -> bool {
        match self.state {
            LifecycleState::Destroyed | LifecycleState::Failed => {
                log::debug!(
                    "[{}] {} ignored in state {:?}",
                    self.plugin.name(),
                    operation,
                    self.state
                );
                true
            }
            _ => false,
        }
    }
}

/// Make the host a positioning context and lift its children above the surface.
fn prepare_element<H: Host>(host: &mut H, element: &H::Element) {
    host.wrap_text_nodes(element);
    for child in host.children(element) {
        if host.computed_position(&child) == CssPosition::Static {
            host.set_position(&child, CssPosition::Relative);
        }
        if host.computed_z_index(&child).is_none() {
            host.set_z_index(&child, 1);
        }
    }
    if host.computed_position(element) == CssPosition::Static {
        host.set_position(element, CssPosition::Relative);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MIN_HEIGHT, MIN_WIDTH, SCALE, SCALE_MOBILE};
    use crate::scene::{Geometry, Mesh, NodeKind, PhongMaterial};
    use crate::testing::{Call, ElementRef, RecordingEngine, RecordingHost};
    use crate::types::{Color, ElementMetrics, Vec3, ViewportMetrics};

    #[derive(Default)]
    struct CountingEffect {
        fail_init: bool,
        inits: usize,
        updates: usize,
        resizes: usize,
        restarts: usize,
        destroys: usize,
        renders: usize,
    }

    impl Effect for CountingEffect {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn default_options(&self) -> Options {
            Options::new().with("color", 0x123456)
        }

        fn on_init(&mut self, ctx: &mut EffectContext<'_>) -> Result<(), HookError> {
            if self.fail_init {
                return Err("no webgl".into());
            }
            self.inits += 1;
            let points = [Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)];
            ctx.scene.add(NodeKind::Mesh(Mesh {
                geometry: Geometry::new(&points, vec![0, 1, 2]),
                material: PhongMaterial::new(Color::BLACK, 30.0),
            }));
            *ctx.camera = Some(PerspectiveCamera::new(35.0, ctx.size.aspect(), 50.0, 10000.0));
            Ok(())
        }

        fn on_update(&mut self, _ctx: &mut EffectContext<'_>) {
            self.updates += 1;
        }

        fn on_after_render(&mut self, _ctx: &mut EffectContext<'_>) {
            self.renders += 1;
        }

        fn on_resize(&mut self, _ctx: &mut EffectContext<'_>) {
            self.resizes += 1;
        }

        fn on_restart(&mut self, ctx: &mut EffectContext<'_>) {
            assert!(ctx.scene.is_empty());
            self.restarts += 1;
        }

        fn on_destroy(&mut self, _ctx: &mut EffectContext<'_>) {
            self.destroys += 1;
        }
    }

    type Instance = EffectLifecycle<CountingEffect, RecordingHost>;

    fn start(host: &RecordingHost, engine: &RecordingEngine, overrides: &Options) -> Instance {
        EffectLifecycle::new(
            CountingEffect::default(),
            host.clone(),
            engine,
            Target::from("#waves"),
            overrides,
        )
        .expect("construction succeeds")
    }

    fn scroll_away(host: &RecordingHost, root: ElementRef) {
        host.set_metrics(
            root,
            ElementMetrics {
                offset_width: 800.0,
                offset_height: 600.0,
                rect_top: -5000.0,
            },
        );
        host.set_viewport(ViewportMetrics {
            scroll_top: 5000.0,
            ..Default::default()
        });
    }

    #[test]
    fn missing_selector_produces_nothing() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let result = EffectLifecycle::new(
            CountingEffect::default(),
            host.clone(),
            &engine,
            Target::from("#nope"),
            &Options::new(),
        );
        assert!(matches!(result, Err(EffectError::MissingElement(ref s)) if s == "#nope"));
        assert!(host.attached_canvases(host.root()).is_empty());
        assert_eq!(host.pending_count(), 0);
        assert!(host.listeners().is_empty());
    }

    #[test]
    fn construction_prepares_element_and_starts_loop() {
        let host = RecordingHost::new();
        let root = host.root();
        let plain = host.add_child(root, CssPosition::Static, None);
        let positioned = host.add_child(root, CssPosition::Absolute, Some(5));
        host.add_text(root);
        let engine = RecordingEngine::new();

        let instance = start(&host, &engine, &Options::new());

        assert_eq!(instance.state(), LifecycleState::Running);
        assert_eq!(host.position(root), CssPosition::Relative);
        assert_eq!(host.position(plain), CssPosition::Relative);
        assert_eq!(host.z_index(plain), Some(1));
        assert_eq!(host.position(positioned), CssPosition::Absolute);
        assert_eq!(host.z_index(positioned), Some(5));
        assert_eq!(host.text_nodes(root), 0);

        assert_eq!(host.attached_canvases(root).len(), 1);
        assert!(host.pending(FrameTask::Tick).is_some());
        assert!(host.pending(FrameTask::Resize).is_some());
        assert_eq!(host.listeners().len(), 1);
        assert_eq!(engine.render_count(), 1);
        assert_eq!(instance.time(), FrameTime::default());
        assert_eq!(instance.plugin().inits, 1);
        assert_eq!(instance.options().color("color").map(|c| c.hex()), Some(0x123456));
    }

    #[test]
    fn init_failure_detaches_surface_and_registers_nothing() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let result = EffectLifecycle::new(
            CountingEffect {
                fail_init: true,
                ..Default::default()
            },
            host.clone(),
            &engine,
            Target::Element(host.root()),
            &Options::new(),
        );

        match result {
            Err(EffectError::InitializationFailure(cause)) => {
                assert_eq!(cause.to_string(), "no webgl")
            }
            _ => panic!("expected initialization failure"),
        }
        assert!(host.attached_canvases(host.root()).is_empty());
        assert_eq!(host.pending_count(), 0);
        assert!(host.listeners().is_empty());
        assert_eq!(engine.render_count(), 0);
    }

    #[test]
    fn missing_rendering_capability_leaves_inert_instance() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::without_surfaces();
        let mut instance = start(&host, &engine, &Options::new());

        assert_eq!(instance.state(), LifecycleState::Running);
        assert!(!instance.has_surface());
        for now in [16.0, 32.0, 48.0] {
            host.fire(FrameTask::Tick);
            instance.animation_frame(now);
        }
        assert!(engine.calls().is_empty());
        assert!(host.attached_canvases(host.root()).is_empty());
        assert_eq!(instance.plugin().updates, 0);
        assert_eq!(instance.plugin().renders, 0);
        assert_eq!(instance.plugin().inits, 1);
    }

    #[test]
    fn extra_tick_replaces_pending_registration() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());
        let queued = instance.frame_request().unwrap();

        // Driven directly while the scheduled tick is still queued.
        instance.animation_frame(16.0);

        assert!(host.cancelled().contains(&queued));
        assert_ne!(instance.frame_request(), Some(queued));
        assert_eq!(host.pending(FrameTask::Tick), instance.frame_request());

        instance.destroy();
        assert_eq!(host.pending_count(), 0);
    }

    #[test]
    fn mobile_agent_uses_mobile_scale_on_resize() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        host.set_user_agent(Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148"));
        host.set_viewport(ViewportMetrics {
            width: 390.0,
            height: 844.0,
            device_pixel_ratio: 3.0,
            ..Default::default()
        });
        let overrides = Options::new().with(SCALE, 1.0).with(SCALE_MOBILE, 2.0);
        let mut instance = start(&host, &engine, &overrides);
        assert_eq!(instance.size().scale, 2.0);

        host.set_user_agent(Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/131.0"));
        host.set_viewport(ViewportMetrics {
            width: 1280.0,
            height: 800.0,
            device_pixel_ratio: 3.0,
            ..Default::default()
        });
        instance.resize();

        assert_eq!(instance.size().scale, 1.0);
        assert_eq!(instance.canvas_size().unwrap().pixel_ratio, 3.0);
    }

    #[test]
    fn resize_clamps_and_scales_pixel_ratio() {
        let host = RecordingHost::new();
        let root = host.root();
        let engine = RecordingEngine::new();
        let overrides = Options::new()
            .with(MIN_WIDTH, 300.0)
            .with(MIN_HEIGHT, 250.0)
            .with(SCALE, 0.5);
        let mut instance = start(&host, &engine, &overrides);

        host.set_metrics(
            root,
            ElementMetrics {
                offset_width: 40.0,
                offset_height: 30.0,
                rect_top: 0.0,
            },
        );
        host.set_viewport(ViewportMetrics {
            device_pixel_ratio: 2.0,
            ..Default::default()
        });
        instance.resize();
        instance.resize();

        let size = instance.size();
        assert_eq!((size.width, size.height, size.scale), (300.0, 250.0, 0.5));
        let canvas = instance.canvas_size().unwrap();
        assert_eq!(canvas.pixel_ratio, 4.0);
        assert!(engine.calls().contains(&Call::SetSize(300.0, 250.0)));
        assert_eq!(instance.camera().unwrap().aspect, 1.2);
        // construction pass + two explicit calls
        assert_eq!(instance.plugin().resizes, 3);
    }

    #[test]
    fn ticks_advance_clamped_time() {
        let host = RecordingHost::new();
        host.set_now(1000.0);
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new().with(SPEED, 3.0));

        let mut now = 1000.0;
        for delta in [0.0, 16.0, 1000.0, 100_000.0] {
            let before = instance.time();
            host.fire(FrameTask::Tick);
            now += delta;
            instance.animation_frame(now);
            let after = instance.time();
            let step = after.t - before.t;
            assert!((0.2..=5.0).contains(&step), "delta {delta} gave step {step}");
            assert!((after.t2 - before.t2 - 3.0 * step).abs() < 1e-9);
        }
        assert_eq!(instance.plugin().updates, 5);
    }

    #[test]
    fn off_screen_skips_updates_unless_forced() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());
        scroll_away(&host, host.root());

        host.fire(FrameTask::Tick);
        instance.animation_frame(16.0);
        assert_eq!(instance.plugin().updates, 1);
        assert_eq!(engine.render_count(), 1);
        assert!(host.pending(FrameTask::Tick).is_some());

        instance.set_options(&Options::new().with(FORCE_ANIMATE, true));
        host.fire(FrameTask::Tick);
        instance.animation_frame(32.0);
        assert_eq!(instance.plugin().updates, 2);
        assert_eq!(engine.render_count(), 2);
    }

    #[test]
    fn background_color_applies_after_set_options() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());

        instance.set_options(&Options::new().with(BACKGROUND_COLOR, "#ff8800"));
        host.fire(FrameTask::Tick);
        instance.animation_frame(16.0);

        assert!(engine.calls().contains(&Call::ClearColor(0xff8800, 1.0)));
    }

    #[test]
    fn restart_keeps_registrations_and_rebuilds_scene() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());
        let frame = instance.frame_request();
        let listener = instance.resize_listener();

        instance.restart();

        assert_eq!(instance.frame_request(), frame);
        assert_eq!(instance.resize_listener(), listener);
        assert_eq!(host.pending(FrameTask::Tick), frame);
        assert_eq!(instance.plugin().restarts, 1);
        assert_eq!(instance.plugin().inits, 2);
        assert_eq!(instance.scene().children().len(), 1);
        assert!(engine.released().is_empty());
    }

    #[test]
    fn destroy_releases_everything() {
        let host = RecordingHost::new();
        let root = host.root();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());
        let tick = instance.frame_request().unwrap();

        instance.destroy();

        assert_eq!(instance.state(), LifecycleState::Destroyed);
        assert_eq!(instance.plugin().destroys, 1);
        assert!(host.listeners().is_empty());
        assert!(host.cancelled().contains(&tick));
        assert_eq!(host.pending_count(), 0);
        assert!(host.attached_canvases(root).is_empty());
        assert_eq!(engine.released().len(), 2);
        assert!(instance.scene().is_empty());
    }

    #[test]
    fn frame_after_destroy_is_a_no_op() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());

        // The browser has already dequeued this frame when destroy runs.
        host.fire(FrameTask::Tick);
        instance.destroy();
        let calls = engine.calls();
        let time = instance.time();

        instance.animation_frame(5000.0);
        instance.resize_frame(5000.0);
        instance.window_resized();
        instance.restart();
        instance.set_options(&Options::new().with(SPEED, 9.0));
        instance.destroy();

        assert_eq!(engine.calls(), calls);
        assert_eq!(instance.time(), time);
        assert_eq!(host.pending_count(), 0);
        assert_eq!(instance.plugin().destroys, 1);
        assert_eq!(instance.plugin().inits, 1);
        assert_eq!(instance.options().number(SPEED), None);
    }

    #[test]
    fn settle_frame_resizes_once() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());

        assert!(host.fire(FrameTask::Resize).is_some());
        instance.resize_frame(16.0);

        assert_eq!(instance.plugin().resizes, 2);
        assert!(host.pending(FrameTask::Resize).is_none());
    }

    #[test]
    fn render_errors_do_not_stop_the_loop() {
        let host = RecordingHost::new();
        let engine = RecordingEngine::new();
        let mut instance = start(&host, &engine, &Options::new());
        engine.fail_renders();

        for now in [16.0, 32.0, 48.0] {
            host.fire(FrameTask::Tick);
            instance.animation_frame(now);
        }

        assert_eq!(instance.state(), LifecycleState::Running);
        assert!(host.pending(FrameTask::Tick).is_some());
        assert_eq!(instance.plugin().updates, 4);
    }
}
