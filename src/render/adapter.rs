use crate::foundation::core::{Point, Rect, Rgba8};
use crate::foundation::error::StageResult;
use crate::foundation::ids::{InstanceId, NativeId};
use crate::render::texture::TextureLoad;
use crate::scene::props::{InstanceKind, LayerProps, SceneProps, SpriteProps};

/// Host drawing surface handed to [`RenderAdapter::initialize`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSurface {
    pub width: u32,
    pub height: u32,
    /// Top-left corner of the surface in host (window) coordinates. Pointer positions are
    /// translated by this offset before hit-testing.
    pub origin: Point,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            origin: Point::ORIGIN,
        }
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }
}

/// What a hit-test found under a surface position.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentInfo {
    /// Instance that owns the hit backend object.
    pub id: InstanceId,
    pub kind: InstanceKind,
    pub bounds: Rect,
}

/// Point query against whatever was last committed to a backend.
pub trait HitTest {
    /// Top-most visible, non-transparent object containing `(x, y)` in surface coordinates.
    fn hit_test(&self, x: f64, y: f64) -> Option<ComponentInfo>;
}

/// The seam between the reconciler and a drawing backend.
///
/// The reconciler only ever talks to a backend through this trait; it never learns how objects
/// are drawn. Object handles are minted by the adapter and are opaque to the core.
pub trait RenderAdapter: HitTest {
    /// Bind to a drawing surface. Fails with [`crate::StageError::Surface`] when the surface
    /// cannot be used.
    fn initialize(&mut self, surface: RenderSurface) -> StageResult<()>;

    /// Release every backend object and the surface binding.
    fn destroy(&mut self);

    fn begin_frame(&mut self);

    fn end_frame(&mut self);

    /// Fill the whole surface with `color`, or wipe it when `None`.
    fn clear(&mut self, color: Option<Rgba8>);

    fn create_sprite(&mut self, owner: InstanceId, props: &SpriteProps) -> NativeId;
    fn update_sprite(&mut self, sprite: NativeId, props: &SpriteProps);
    fn destroy_sprite(&mut self, sprite: NativeId);

    fn create_scene(&mut self, owner: InstanceId, props: &SceneProps) -> NativeId;
    fn update_scene(&mut self, scene: NativeId, props: &SceneProps);
    fn destroy_scene(&mut self, scene: NativeId);

    /// Layers register themselves in the backend's z-ordered layer list on creation.
    fn create_layer(&mut self, owner: InstanceId, props: &LayerProps) -> NativeId;
    fn update_layer(&mut self, layer: NativeId, props: &LayerProps);
    fn destroy_layer(&mut self, layer: NativeId);

    /// Append `child` to `parent`. Adding a child that is already present is a no-op.
    fn add_child(&mut self, parent: NativeId, child: NativeId);

    /// Detach `child` from `parent`. Unknown pairs are ignored.
    fn remove_child(&mut self, parent: NativeId, child: NativeId);

    /// Place `child` directly before `before` under `parent`.
    ///
    /// Backends without positional insertion fall back to appending.
    fn insert_child_before(&mut self, parent: NativeId, child: NativeId, before: NativeId) {
        let _ = before;
        self.add_child(parent, child);
    }

    /// Request an image by reference. Backends without texture support return `None`.
    fn load_texture(&mut self, url: &str) -> Option<TextureLoad> {
        let _ = url;
        None
    }

    /// Apply texture loads that finished since the last call. Returns how many were applied.
    fn poll_textures(&mut self) -> usize {
        0
    }

    /// Draw the committed object graph.
    fn render(&mut self) -> StageResult<()>;
}
