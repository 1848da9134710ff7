use std::collections::HashMap;

use crate::foundation::core::{Rect, Rgba8};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{InstanceId, NativeId};
use crate::render::adapter::{ComponentInfo, HitTest, RenderAdapter, RenderSurface};
use crate::scene::props::{InstanceKind, LayerProps, SceneProps, SpriteProps};

/// One call received by a [`RecordingAdapter`].
#[derive(Clone, Debug, PartialEq)]
pub enum AdapterCall {
    Initialize(RenderSurface),
    Destroy,
    BeginFrame,
    EndFrame,
    Clear(Option<Rgba8>),
    CreateSprite {
        owner: InstanceId,
        native: NativeId,
        props: SpriteProps,
    },
    UpdateSprite(NativeId, SpriteProps),
    DestroySprite(NativeId),
    CreateScene {
        owner: InstanceId,
        native: NativeId,
        props: SceneProps,
    },
    UpdateScene(NativeId, SceneProps),
    DestroyScene(NativeId),
    CreateLayer {
        owner: InstanceId,
        native: NativeId,
        props: LayerProps,
    },
    UpdateLayer(NativeId, LayerProps),
    DestroyLayer(NativeId),
    AddChild {
        parent: NativeId,
        child: NativeId,
    },
    RemoveChild {
        parent: NativeId,
        child: NativeId,
    },
    InsertChildBefore {
        parent: NativeId,
        child: NativeId,
        before: NativeId,
    },
    Render,
}

#[derive(Debug)]
struct Sprite {
    owner: InstanceId,
    props: SpriteProps,
}

/// Adapter that draws nothing and remembers everything it was asked to do.
///
/// Keeps just enough state (parent/child lists and sprite rectangles) to answer hit-tests,
/// which makes it usable for pointer tests without a raster surface.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    calls: Vec<AdapterCall>,
    next_id: u64,
    sprites: HashMap<NativeId, Sprite>,
    /// Creation order, used for top-most-first hit-testing.
    sprite_order: Vec<NativeId>,
    children: HashMap<NativeId, Vec<NativeId>>,
    fail_next_render: bool,
    renders: u64,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[AdapterCall] {
        &self.calls
    }

    /// Return and forget the calls recorded so far.
    pub fn take_calls(&mut self) -> Vec<AdapterCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn children_of(&self, parent: NativeId) -> &[NativeId] {
        self.children.get(&parent).map_or(&[], Vec::as_slice)
    }

    pub fn sprite_props(&self, sprite: NativeId) -> Option<&SpriteProps> {
        self.sprites.get(&sprite).map(|s| &s.props)
    }

    /// Live native objects of any kind.
    pub fn live_objects(&self) -> usize {
        self.sprites.len() + self.children.len()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Make the next [`RenderAdapter::render`] call fail.
    pub fn fail_next_render(&mut self) {
        self.fail_next_render = true;
    }

    fn mint(&mut self) -> NativeId {
        self.next_id += 1;
        NativeId(self.next_id)
    }
}

impl HitTest for RecordingAdapter {
    fn hit_test(&self, x: f64, y: f64) -> Option<ComponentInfo> {
        self.sprite_order.iter().rev().find_map(|id| {
            let s = self.sprites.get(id)?;
            if !s.props.is_drawable() {
                return None;
            }
            let b: Rect = s.props.bounds().abs();
            (x >= b.x0 && x <= b.x1 && y >= b.y0 && y <= b.y1).then_some(ComponentInfo {
                id: s.owner,
                kind: InstanceKind::Sprite,
                bounds: b,
            })
        })
    }
}

impl RenderAdapter for RecordingAdapter {
    fn initialize(&mut self, surface: RenderSurface) -> StageResult<()> {
        self.calls.push(AdapterCall::Initialize(surface));
        Ok(())
    }

    fn destroy(&mut self) {
        self.sprites.clear();
        self.sprite_order.clear();
        self.children.clear();
        self.calls.push(AdapterCall::Destroy);
    }

    fn begin_frame(&mut self) {
        self.calls.push(AdapterCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.calls.push(AdapterCall::EndFrame);
    }

    fn clear(&mut self, color: Option<Rgba8>) {
        self.calls.push(AdapterCall::Clear(color));
    }

    fn create_sprite(&mut self, owner: InstanceId, props: &SpriteProps) -> NativeId {
        let native = self.mint();
        self.sprites.insert(
            native,
            Sprite {
                owner,
                props: props.clone(),
            },
        );
        self.sprite_order.push(native);
        self.calls.push(AdapterCall::CreateSprite {
            owner,
            native,
            props: props.clone(),
        });
        native
    }

    fn update_sprite(&mut self, sprite: NativeId, props: &SpriteProps) {
        if let Some(s) = self.sprites.get_mut(&sprite) {
            s.props = props.clone();
        }
        self.calls.push(AdapterCall::UpdateSprite(sprite, props.clone()));
    }

    fn destroy_sprite(&mut self, sprite: NativeId) {
        self.sprites.remove(&sprite);
        self.sprite_order.retain(|id| *id != sprite);
        self.calls.push(AdapterCall::DestroySprite(sprite));
    }

    fn create_scene(&mut self, owner: InstanceId, props: &SceneProps) -> NativeId {
        let native = self.mint();
        self.children.insert(native, Vec::new());
        self.calls.push(AdapterCall::CreateScene {
            owner,
            native,
            props: props.clone(),
        });
        native
    }

    fn update_scene(&mut self, scene: NativeId, props: &SceneProps) {
        self.calls.push(AdapterCall::UpdateScene(scene, props.clone()));
    }

    fn destroy_scene(&mut self, scene: NativeId) {
        self.children.remove(&scene);
        self.calls.push(AdapterCall::DestroyScene(scene));
    }

    fn create_layer(&mut self, owner: InstanceId, props: &LayerProps) -> NativeId {
        let native = self.mint();
        self.children.insert(native, Vec::new());
        self.calls.push(AdapterCall::CreateLayer {
            owner,
            native,
            props: props.clone(),
        });
        native
    }

    fn update_layer(&mut self, layer: NativeId, props: &LayerProps) {
        self.calls.push(AdapterCall::UpdateLayer(layer, props.clone()));
    }

    fn destroy_layer(&mut self, layer: NativeId) {
        self.children.remove(&layer);
        self.calls.push(AdapterCall::DestroyLayer(layer));
    }

    fn add_child(&mut self, parent: NativeId, child: NativeId) {
        let list = self.children.entry(parent).or_default();
        if !list.contains(&child) {
            list.push(child);
        }
        self.calls.push(AdapterCall::AddChild { parent, child });
    }

    fn remove_child(&mut self, parent: NativeId, child: NativeId) {
        if let Some(list) = self.children.get_mut(&parent) {
            list.retain(|c| *c != child);
        }
        self.calls.push(AdapterCall::RemoveChild { parent, child });
    }

    fn insert_child_before(&mut self, parent: NativeId, child: NativeId, before: NativeId) {
        let list = self.children.entry(parent).or_default();
        list.retain(|c| *c != child);
        let pos = list.iter().position(|c| *c == before).unwrap_or(list.len());
        list.insert(pos, child);
        self.calls.push(AdapterCall::InsertChildBefore {
            parent,
            child,
            before,
        });
    }

    fn render(&mut self) -> StageResult<()> {
        self.calls.push(AdapterCall::Render);
        if std::mem::take(&mut self.fail_next_render) {
            return Err(StageError::surface("render failed"));
        }
        self.renders += 1;
        Ok(())
    }
}
