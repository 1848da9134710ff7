use std::time::Duration;

use crate::animation::state::AnimationState;
use crate::assets::manifest::{ManifestRegistry, TextureResolver};
use crate::foundation::core::Point;
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{InstanceId, SubscriptionId};
use crate::input::keyboard::KeyboardState;
use crate::input::pointer::{Button, GestureConfig, PointerPipeline};
use crate::reconcile::arena::Instance;
use crate::reconcile::engine::{CommitLog, Reconciler};
use crate::render::adapter::{ComponentInfo, HitTest, RenderAdapter, RenderSurface};
use crate::runtime::render_loop::{FrameClock, RenderLoop};
use crate::scene::element::Element;

/// Options for [`Stage`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageConfig {
    pub width: u32,
    pub height: u32,
    /// Surface position in host coordinates; pointer input is translated by it.
    pub origin: Option<Point>,
    pub clock: FrameClock,
    pub gesture: GestureConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            origin: None,
            clock: FrameClock::Host,
            gesture: GestureConfig::default(),
        }
    }
}

impl StageConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_clock(mut self, clock: FrameClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_gesture(mut self, gesture: GestureConfig) -> Self {
        self.gesture = gesture;
        self
    }
}

/// What one [`Stage::tick`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub dt: f64,
    /// Set when a scheduled tree was reconciled at the start of the frame.
    pub commit: Option<CommitLog>,
    pub textures_applied: usize,
    pub callbacks_run: usize,
    pub animations_advanced: usize,
    pub interactions: usize,
}

struct NoHits;

impl HitTest for NoHits {
    fn hit_test(&self, _x: f64, _y: f64) -> Option<ComponentInfo> {
        None
    }
}

/// A running scene graph: one active adapter, the instance tree, the frame loop and input
/// state.
///
/// Each [`Stage::tick`] runs, in order: the scheduled reconciliation, finished texture loads,
/// update callbacks, one animation step with the frame's dt, one render, pointer dispatch, and
/// finally the clearing of one-frame input events.
pub struct Stage<A: RenderAdapter> {
    adapter: Option<A>,
    config: StageConfig,
    reconciler: Reconciler,
    render_loop: RenderLoop,
    pointer: PointerPipeline,
    keyboard: KeyboardState,
    manifests: Option<ManifestRegistry>,
    scheduled: Option<Element>,
    halted: bool,
}

impl<A: RenderAdapter> std::fmt::Debug for Stage<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("config", &self.config)
            .field("instances", &self.reconciler.len())
            .field("render_loop", &self.render_loop)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

impl<A: RenderAdapter> Stage<A> {
    /// Bind `adapter` to a surface of the configured size and start the frame loop.
    pub fn new(mut adapter: A, config: StageConfig) -> StageResult<Self> {
        adapter.initialize(Self::surface(&config))?;
        let mut pointer = PointerPipeline::new(config.gesture);
        pointer.set_surface_origin(config.origin);
        let mut render_loop = RenderLoop::new(config.clock);
        render_loop.start();
        tracing::debug!(width = config.width, height = config.height, "stage created");
        Ok(Self {
            adapter: Some(adapter),
            config,
            reconciler: Reconciler::new(),
            render_loop,
            pointer,
            keyboard: KeyboardState::default(),
            manifests: None,
            scheduled: None,
            halted: false,
        })
    }

    fn surface(config: &StageConfig) -> RenderSurface {
        RenderSurface::new(config.width, config.height)
            .with_origin(config.origin.unwrap_or(Point::ORIGIN))
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn adapter(&self) -> Option<&A> {
        self.adapter.as_ref()
    }

    pub fn adapter_mut(&mut self) -> Option<&mut A> {
        self.adapter.as_mut()
    }

    /// Make `adapter` the active one. The current tree is torn down on the old adapter, which
    /// is returned; the next render rebuilds everything on the new one.
    pub fn mount(&mut self, mut adapter: A) -> StageResult<Option<A>> {
        adapter.initialize(Self::surface(&self.config))?;
        let old = self.unmount();
        self.adapter = Some(adapter);
        self.halted = false;
        self.render_loop.start();
        Ok(old)
    }

    /// Tear down the tree, release the adapter and stop the loop.
    pub fn unmount(&mut self) -> Option<A> {
        let mut adapter = self.adapter.take()?;
        let log = self.reconciler.unmount(&mut adapter);
        self.forget(&log);
        adapter.destroy();
        self.render_loop.stop();
        Some(adapter)
    }

    pub fn set_manifests(&mut self, manifests: ManifestRegistry) {
        self.manifests = Some(manifests);
    }

    pub fn manifests_mut(&mut self) -> Option<&mut ManifestRegistry> {
        self.manifests.as_mut()
    }

    fn forget(&mut self, log: &CommitLog) {
        for id in log.removed() {
            self.pointer.forget(id);
        }
    }

    /// Reconcile `root` right away.
    pub fn render(&mut self, root: &Element) -> StageResult<CommitLog> {
        let resolver = self.manifests.as_ref().map(|m| m as &dyn TextureResolver);
        let adapter = self.adapter.as_mut().map(|a| a as &mut dyn RenderAdapter);
        let log = self.reconciler.reconcile(adapter, root, resolver)?;
        self.forget(&log);
        Ok(log)
    }

    /// Reconcile `root` at the start of the next tick. A later call replaces an earlier one.
    pub fn schedule(&mut self, root: Element) {
        self.scheduled = Some(root);
    }

    /// Run one frame at host time `now`.
    ///
    /// Returns `Ok(None)` while the loop is stopped. A failing render halts the loop: the error
    /// is logged and returned once, and later ticks do nothing until [`Stage::resume`].
    #[tracing::instrument(skip_all, fields(frame = self.render_loop.frame_count()))]
    pub fn tick(&mut self, now: Duration) -> StageResult<Option<FrameReport>> {
        if self.halted {
            return Ok(None);
        }
        let Some(dt) = self.render_loop.advance(now) else {
            return Ok(None);
        };
        let Some(adapter) = self.adapter.as_mut() else {
            return Err(StageError::NoActiveRenderAdapter);
        };
        let resolver = self.manifests.as_ref().map(|m| m as &dyn TextureResolver);
        let mut report = FrameReport {
            frame: self.render_loop.frame_count(),
            dt,
            ..FrameReport::default()
        };

        if let Some(root) = self.scheduled.take() {
            let log = self
                .reconciler
                .reconcile(Some(&mut *adapter), &root, resolver)?;
            for id in log.removed() {
                self.pointer.forget(id);
            }
            report.commit = Some(log);
        }

        report.textures_applied = adapter.poll_textures();
        report.callbacks_run = self.render_loop.run_callbacks();
        report.animations_advanced = self.reconciler.advance_animations(adapter, dt, resolver)?;

        if let Err(e) = adapter.render() {
            tracing::error!(error = %e, frame = report.frame, "render failed, halting frame loop");
            self.halted = true;
            self.render_loop.stop();
            return Err(e);
        }

        report.interactions = self.reconciler.dispatch_pointer(&self.pointer);
        self.pointer.end_frame();
        self.keyboard.end_frame();
        Ok(Some(report))
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Restart the loop after a halt or [`RenderLoop::stop`].
    pub fn resume(&mut self) {
        self.halted = false;
        self.render_loop.start();
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn render_loop_mut(&mut self) -> &mut RenderLoop {
        &mut self.render_loop
    }

    pub fn add_update_callback(&mut self, f: impl FnMut(f64) + 'static) -> SubscriptionId {
        self.render_loop.add_update_callback(f)
    }

    pub fn remove_update_callback(&mut self, id: SubscriptionId) -> bool {
        self.render_loop.remove_update_callback(id)
    }

    pub fn find_by_key(&self, key: &str) -> Option<InstanceId> {
        self.reconciler.find_by_key(key)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.reconciler.instance(id)
    }

    pub fn animation_mut(&mut self, id: InstanceId) -> Option<&mut AnimationState> {
        self.reconciler.animation_mut(id)
    }

    pub fn pointer(&self) -> &PointerPipeline {
        &self.pointer
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    fn hits(&self) -> &dyn HitTest {
        match &self.adapter {
            Some(a) => a,
            None => &NoHits,
        }
    }

    pub fn pointer_move(&mut self, host: Point) {
        let hits: &dyn HitTest = match &self.adapter {
            Some(a) => a,
            None => &NoHits,
        };
        self.pointer.pointer_move(host, hits);
    }

    /// `at` is the host timestamp of the press, used for double-click timing.
    pub fn pointer_down(&mut self, button: Button, host: Point, at: Duration) {
        let hits: &dyn HitTest = match &self.adapter {
            Some(a) => a,
            None => &NoHits,
        };
        self.pointer.pointer_down(button, host, at, hits);
    }

    pub fn pointer_up(&mut self, button: Button, host: Point) {
        self.pointer.pointer_up(button, host);
    }

    pub fn pointer_leave(&mut self) {
        self.pointer.pointer_leave();
    }

    /// Hit-test a surface position against the active adapter.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ComponentInfo> {
        self.hits().hit_test(x, y)
    }

    pub fn key_down(&mut self, key: impl Into<String>) {
        self.keyboard.key_down(key);
    }

    pub fn key_up(&mut self, key: impl Into<String>) {
        self.keyboard.key_up(key);
    }

    /// Host window lost focus.
    pub fn blur(&mut self) {
        self.keyboard.blur();
        self.pointer.pointer_leave();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/stage.rs"]
mod tests;
