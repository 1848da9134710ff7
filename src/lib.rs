//! Stagehand is a retained-mode 2D scene graph driven by declarative element trees.
//!
//! The host describes the desired scene as an [`Element`] tree every time something changes:
//!
//! - A [`Stage`] reconciles the tree against the live instances and commits the minimal set
//!   of create/update/destroy/reorder calls to a [`RenderAdapter`]
//! - [`CanvasBackend`] rasterizes sprites, layers and scenes on the CPU
//! - Per-element animations, pointer gestures and keyboard state advance once per
//!   [`Stage::tick`]
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod assets;
pub(crate) mod input;
pub(crate) mod reconcile;
pub(crate) mod render;
pub(crate) mod runtime;
pub(crate) mod scene;

pub use crate::foundation::core::{Affine, Fps, Point, Rect, Rgba8, Vec2};
pub use crate::foundation::error::{StageError, StageResult};
pub use crate::foundation::ids::{InstanceId, NativeId, SubscriptionId};

pub use crate::animation::ease::Ease;
pub use crate::animation::state::{AnimationPhase, AnimationSpec, AnimationState, AnimationStep};
pub use crate::animation::values::AnimValues;
pub use crate::assets::manifest::{
    Manifest, ManifestProgress, ManifestRegistry, ManifestState, TextureResolver,
};
pub use crate::input::interactive::{InteractionState, Interactive};
pub use crate::input::keyboard::KeyboardState;
pub use crate::input::pointer::{
    Button, DoubleClick, DragEvent, GestureConfig, Movement, PointerPipeline, buttons,
};
pub use crate::reconcile::arena::Instance;
pub use crate::reconcile::engine::{CommitLog, Mutation, Reconciler};
pub use crate::render::adapter::{ComponentInfo, HitTest, RenderAdapter, RenderSurface};
pub use crate::render::canvas::{CanvasBackend, CanvasBackendOpts};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::recording::{AdapterCall, RecordingAdapter};
pub use crate::render::texture::{
    AssetSource, FsAssetSource, Texture, TextureCache, TextureHandle, TextureLoading,
};
pub use crate::runtime::render_loop::{FrameClock, RenderLoop};
pub use crate::runtime::stage::{FrameReport, Stage, StageConfig};
pub use crate::scene::element::{Element, PropMap, PropValue};
pub use crate::scene::props::{
    GameProps, InstanceKind, InstanceProps, LayerProps, SceneProps, SpriteProps,
};
