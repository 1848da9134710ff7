use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::core::{Affine, Rect, Rgba8};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{InstanceId, NativeId};
use crate::render::adapter::{ComponentInfo, HitTest, RenderAdapter, RenderSurface};
use crate::render::frame::FrameRGBA;
use crate::render::texture::{
    AssetSource, FsAssetSource, TextureCache, TextureEvent, TextureHandle, TextureLoad,
    TextureLoading,
};
use crate::scene::props::{InstanceKind, LayerProps, SceneProps, SpriteProps};

/// Options for [`CanvasBackend`].
#[derive(Clone, Debug)]
pub struct CanvasBackendOpts {
    /// Directory texture references resolve against.
    pub assets_root: PathBuf,
    /// Fill for sprites without a usable texture.
    pub placeholder_rgba: Rgba8,
    /// If set, every frame starts from this color instead of transparent black.
    pub clear_rgba: Option<Rgba8>,
    pub texture_loading: TextureLoading,
}

impl Default for CanvasBackendOpts {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("."),
            placeholder_rgba: Rgba8::HOT_PINK,
            clear_rgba: None,
            texture_loading: TextureLoading::from_env(),
        }
    }
}

impl CanvasBackendOpts {
    pub fn with_assets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets_root = root.into();
        self
    }

    pub fn with_placeholder_rgba(mut self, color: Rgba8) -> Self {
        self.placeholder_rgba = color;
        self
    }

    pub fn with_clear_rgba(mut self, color: Option<Rgba8>) -> Self {
        self.clear_rgba = color;
        self
    }

    pub fn with_texture_loading(mut self, loading: TextureLoading) -> Self {
        self.texture_loading = loading;
        self
    }
}

struct SpriteNode {
    owner: InstanceId,
    props: SpriteProps,
    image: Option<TextureHandle>,
}

struct SceneNode {
    props: SceneProps,
    children: Vec<NativeId>,
}

struct LayerNode {
    props: LayerProps,
    children: Vec<NativeId>,
}

enum CanvasObject {
    Sprite(SpriteNode),
    Scene(SceneNode),
    Layer(LayerNode),
}

impl CanvasObject {
    fn children_mut(&mut self) -> Option<&mut Vec<NativeId>> {
        match self {
            Self::Sprite(_) => None,
            Self::Scene(s) => Some(&mut s.children),
            Self::Layer(l) => Some(&mut l.children),
        }
    }

    fn accepts(&self, child: &CanvasObject) -> bool {
        matches!(
            (self, child),
            (Self::Scene(_), Self::Sprite(_))
                | (Self::Layer(_), Self::Sprite(_))
                | (Self::Layer(_), Self::Scene(_))
        )
    }
}

/// CPU raster backend powered by `vello_cpu`.
///
/// Keeps the layer list sorted by z-index (ties keep insertion order), a URL-keyed texture
/// cache, and a lazily rebuilt hit-test index. When no layer exists, the most recently created
/// scene is drawn directly.
pub struct CanvasBackend {
    opts: CanvasBackendOpts,
    surface: Option<RenderSurface>,
    ctx: Option<vello_cpu::RenderContext>,
    pixmap: Option<vello_cpu::Pixmap>,

    objects: HashMap<NativeId, CanvasObject>,
    next_id: u64,
    layers: Vec<NativeId>,
    implicit_scene: Option<NativeId>,
    textures: TextureCache,

    dirty: bool,
    frames_rendered: u64,
    hit_index: RefCell<Option<Vec<ComponentInfo>>>,
}

impl CanvasBackend {
    pub fn new(opts: CanvasBackendOpts) -> Self {
        let source: Arc<dyn AssetSource> = Arc::new(FsAssetSource::new(opts.assets_root.clone()));
        Self::with_source(opts, source)
    }

    /// Backend whose textures come from `source` instead of the filesystem.
    pub fn with_source(opts: CanvasBackendOpts, source: Arc<dyn AssetSource>) -> Self {
        Self {
            textures: TextureCache::new(source, opts.texture_loading),
            opts,
            surface: None,
            ctx: None,
            pixmap: None,
            objects: HashMap::new(),
            next_id: 1,
            layers: Vec::new(),
            implicit_scene: None,
            dirty: false,
            frames_rendered: 0,
            hit_index: RefCell::new(None),
        }
    }

    pub fn surface(&self) -> Option<RenderSurface> {
        self.surface
    }

    /// Something changed since the last [`RenderAdapter::render`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Layer handles in draw order (ascending z-index).
    pub fn layer_order(&self) -> &[NativeId] {
        &self.layers
    }

    pub fn children_of(&self, parent: NativeId) -> Option<&[NativeId]> {
        match self.objects.get(&parent)? {
            CanvasObject::Scene(s) => Some(&s.children),
            CanvasObject::Layer(l) => Some(&l.children),
            CanvasObject::Sprite(_) => None,
        }
    }

    pub fn sprite_texture(&self, sprite: NativeId) -> Option<&TextureHandle> {
        match self.objects.get(&sprite)? {
            CanvasObject::Sprite(s) => s.image.as_ref(),
            _ => None,
        }
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Block until all pending texture loads are done and apply them.
    pub fn flush_textures(&mut self) -> usize {
        let events = self.textures.wait_idle();
        self.apply_texture_events(events)
    }

    /// Read back the last rendered frame (premultiplied RGBA8).
    pub fn frame(&self) -> Option<FrameRGBA> {
        let pixmap = self.pixmap.as_ref()?;
        Some(FrameRGBA {
            width: u32::from(pixmap.width()),
            height: u32::from(pixmap.height()),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn touch(&mut self) {
        self.dirty = true;
        *self.hit_index.get_mut() = None;
    }

    fn alloc(&mut self, obj: CanvasObject) -> NativeId {
        let id = NativeId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, obj);
        self.touch();
        id
    }

    fn surface_dims(width: u32, height: u32) -> StageResult<(u16, u16)> {
        let w: u16 = width
            .try_into()
            .map_err(|_| StageError::surface(format!("surface width {width} exceeds u16")))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| StageError::surface(format!("surface height {height} exceeds u16")))?;
        if w == 0 || h == 0 {
            return Err(StageError::surface(format!(
                "surface must be non-empty, got {width}x{height}"
            )));
        }
        Ok((w, h))
    }

    fn resize(&mut self, width: u32, height: u32) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if surface.width == width && surface.height == height {
            return;
        }
        match Self::surface_dims(width, height) {
            Ok((w, h)) => {
                tracing::debug!(width, height, "canvas resized");
                surface.width = width;
                surface.height = height;
                self.ctx = Some(vello_cpu::RenderContext::new(w, h));
                self.pixmap = Some(vello_cpu::Pixmap::new(w, h));
                self.touch();
            }
            Err(e) => tracing::warn!(error = %e, "ignoring scene size"),
        }
    }

    fn request_texture(&mut self, sprite: NativeId) {
        let Some(CanvasObject::Sprite(s)) = self.objects.get(&sprite) else {
            return;
        };
        let Some(url) = s.props.texture.clone() else {
            return;
        };
        let image = match self.textures.load(&url) {
            TextureLoad::Ready(t) => Some(t),
            TextureLoad::Pending => None,
        };
        if let Some(CanvasObject::Sprite(s)) = self.objects.get_mut(&sprite) {
            s.image = image;
        }
    }

    fn apply_texture_events(&mut self, events: Vec<TextureEvent>) -> usize {
        if events.is_empty() {
            return 0;
        }
        let n = events.len();
        for ev in events {
            let TextureEvent::Loaded { url, texture } = ev else {
                continue;
            };
            for obj in self.objects.values_mut() {
                if let CanvasObject::Sprite(s) = obj
                    && s.props.texture.as_deref() == Some(url.as_str())
                {
                    s.image = Some(Arc::clone(&texture));
                }
            }
        }
        self.touch();
        n
    }

    fn scrub(&mut self, child: NativeId) {
        for obj in self.objects.values_mut() {
            if let Some(children) = obj.children_mut() {
                children.retain(|c| *c != child);
            }
        }
    }

    fn insert_layer_sorted(&mut self, layer: NativeId, z_index: i32) {
        let objects = &self.objects;
        let pos = self.layers.partition_point(|id| match objects.get(id) {
            Some(CanvasObject::Layer(l)) => l.props.z_index <= z_index,
            _ => true,
        });
        self.layers.insert(pos, layer);
    }

    fn build_hit_index(&self) -> Vec<ComponentInfo> {
        let mut out = Vec::new();
        if !self.layers.is_empty() {
            for id in self.layers.iter().rev() {
                if let Some(CanvasObject::Layer(l)) = self.objects.get(id)
                    && l.props.is_drawable()
                {
                    self.collect_hits(&l.children, &mut out);
                }
            }
        } else if let Some(id) = self.implicit_scene
            && let Some(CanvasObject::Scene(s)) = self.objects.get(&id)
        {
            self.collect_hits(&s.children, &mut out);
        }
        out
    }

    fn collect_hits(&self, children: &[NativeId], out: &mut Vec<ComponentInfo>) {
        for id in children.iter().rev() {
            match self.objects.get(id) {
                Some(CanvasObject::Sprite(s)) if s.props.is_drawable() => out.push(ComponentInfo {
                    id: s.owner,
                    kind: InstanceKind::Sprite,
                    bounds: s.props.bounds().abs(),
                }),
                Some(CanvasObject::Scene(sc)) => self.collect_hits(&sc.children, out),
                _ => {}
            }
        }
    }

    fn draw_children(&self, ctx: &mut vello_cpu::RenderContext, children: &[NativeId]) {
        for id in children {
            match self.objects.get(id) {
                Some(CanvasObject::Sprite(s)) => self.draw_sprite(ctx, s),
                Some(CanvasObject::Scene(sc)) => {
                    if let Some(bg) = sc.props.background {
                        fill_surface(ctx, bg, self.surface_size());
                    }
                    self.draw_children(ctx, &sc.children);
                }
                _ => {}
            }
        }
    }

    fn draw_sprite(&self, ctx: &mut vello_cpu::RenderContext, s: &SpriteNode) {
        let p = &s.props;
        if !p.is_drawable() {
            return;
        }
        let (hw, hh) = (p.width / 2.0, p.height / 2.0);
        let base =
            Affine::translate((p.x + hw, p.y + hh)) * Affine::rotate(p.rotation.to_radians());
        let opacity = p.alpha.clamp(0.0, 1.0) as f32;

        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        let rect = match &s.image {
            Some(tex) => {
                let (tw, th) = (f64::from(tex.width), f64::from(tex.height));
                let tr = base
                    * Affine::translate((-hw, -hh))
                    * Affine::scale_non_uniform(p.width / tw, p.height / th);
                ctx.set_transform(affine_to_cpu(tr));
                ctx.set_paint(tex.paint.clone());
                vello_cpu::kurbo::Rect::new(0.0, 0.0, tw, th)
            }
            None => {
                let c = self.opts.placeholder_rgba;
                ctx.set_transform(affine_to_cpu(base));
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
                vello_cpu::kurbo::Rect::new(-hw, -hh, hw, hh)
            }
        };

        if opacity < 1.0 {
            ctx.push_opacity_layer(opacity);
        }
        ctx.fill_rect(&rect);
        if opacity < 1.0 {
            ctx.pop_layer();
        }
    }

    fn surface_size(&self) -> (f64, f64) {
        self.surface
            .map_or((0.0, 0.0), |s| (f64::from(s.width), f64::from(s.height)))
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn fill_surface(ctx: &mut vello_cpu::RenderContext, c: Rgba8, (w, h): (f64, f64)) {
    ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
}

fn contains_inclusive(r: Rect, x: f64, y: f64) -> bool {
    x >= r.x0 && x <= r.x1 && y >= r.y0 && y <= r.y1
}

impl HitTest for CanvasBackend {
    fn hit_test(&self, x: f64, y: f64) -> Option<ComponentInfo> {
        let mut index = self.hit_index.borrow_mut();
        let entries = index.get_or_insert_with(|| self.build_hit_index());
        entries
            .iter()
            .find(|c| contains_inclusive(c.bounds, x, y))
            .cloned()
    }
}

impl RenderAdapter for CanvasBackend {
    fn initialize(&mut self, surface: RenderSurface) -> StageResult<()> {
        let (w, h) = Self::surface_dims(surface.width, surface.height)?;
        self.ctx = Some(vello_cpu::RenderContext::new(w, h));
        self.pixmap = Some(vello_cpu::Pixmap::new(w, h));
        self.surface = Some(surface);
        self.touch();
        tracing::debug!(width = surface.width, height = surface.height, "canvas initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        self.objects.clear();
        self.layers.clear();
        self.implicit_scene = None;
        self.textures.clear();
        self.ctx = None;
        self.pixmap = None;
        self.surface = None;
        self.touch();
    }

    fn begin_frame(&mut self) {
        let size = self.surface_size();
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.reset();
            if let Some(c) = self.opts.clear_rgba {
                fill_surface(ctx, c, size);
            }
        }
    }

    fn end_frame(&mut self) {
        if let (Some(ctx), Some(pixmap)) = (self.ctx.as_mut(), self.pixmap.as_mut()) {
            ctx.flush();
            pixmap.data_as_u8_slice_mut().fill(0);
            ctx.render_to_pixmap(pixmap);
        }
        self.dirty = false;
        self.frames_rendered += 1;
    }

    fn clear(&mut self, color: Option<Rgba8>) {
        let size = self.surface_size();
        if let Some(ctx) = self.ctx.as_mut() {
            match color {
                Some(c) if !c.is_transparent() => fill_surface(ctx, c, size),
                Some(_) => {}
                None => ctx.reset(),
            }
        }
    }

    fn create_sprite(&mut self, owner: InstanceId, props: &SpriteProps) -> NativeId {
        let id = self.alloc(CanvasObject::Sprite(SpriteNode {
            owner,
            props: props.clone(),
            image: None,
        }));
        self.request_texture(id);
        id
    }

    fn update_sprite(&mut self, sprite: NativeId, props: &SpriteProps) {
        let Some(CanvasObject::Sprite(s)) = self.objects.get_mut(&sprite) else {
            tracing::debug!(?sprite, "update of unknown sprite");
            return;
        };
        if s.props == *props {
            return;
        }
        let texture_changed = s.props.texture != props.texture;
        s.props = props.clone();
        if texture_changed {
            s.image = None;
            self.request_texture(sprite);
        }
        self.touch();
    }

    fn destroy_sprite(&mut self, sprite: NativeId) {
        if self.objects.remove(&sprite).is_some() {
            self.scrub(sprite);
            self.touch();
        }
    }

    fn create_scene(&mut self, _owner: InstanceId, props: &SceneProps) -> NativeId {
        let id = self.alloc(CanvasObject::Scene(SceneNode {
            props: props.clone(),
            children: Vec::new(),
        }));
        if let (Some(w), Some(h)) = (props.width, props.height) {
            self.resize(w, h);
        }
        self.implicit_scene = Some(id);
        id
    }

    fn update_scene(&mut self, scene: NativeId, props: &SceneProps) {
        let Some(CanvasObject::Scene(s)) = self.objects.get_mut(&scene) else {
            return;
        };
        if s.props == *props {
            return;
        }
        let resized = (s.props.width, s.props.height) != (props.width, props.height);
        s.props = props.clone();
        if resized && let (Some(w), Some(h)) = (props.width, props.height) {
            self.resize(w, h);
        }
        self.touch();
    }

    fn destroy_scene(&mut self, scene: NativeId) {
        if self.objects.remove(&scene).is_some() {
            self.scrub(scene);
            if self.implicit_scene == Some(scene) {
                self.implicit_scene = None;
            }
            self.touch();
        }
    }

    fn create_layer(&mut self, _owner: InstanceId, props: &LayerProps) -> NativeId {
        let id = self.alloc(CanvasObject::Layer(LayerNode {
            props: props.clone(),
            children: Vec::new(),
        }));
        self.insert_layer_sorted(id, props.z_index);
        id
    }

    fn update_layer(&mut self, layer: NativeId, props: &LayerProps) {
        let Some(CanvasObject::Layer(l)) = self.objects.get_mut(&layer) else {
            return;
        };
        if l.props == *props {
            return;
        }
        let z_changed = l.props.z_index != props.z_index;
        l.props = props.clone();
        if z_changed {
            self.layers.retain(|id| *id != layer);
            self.insert_layer_sorted(layer, props.z_index);
        }
        self.touch();
    }

    fn destroy_layer(&mut self, layer: NativeId) {
        if self.objects.remove(&layer).is_some() {
            self.layers.retain(|id| *id != layer);
            self.touch();
        }
    }

    fn add_child(&mut self, parent: NativeId, child: NativeId) {
        let ok = match (self.objects.get(&parent), self.objects.get(&child)) {
            (Some(p), Some(c)) => p.accepts(c),
            _ => false,
        };
        if !ok {
            tracing::debug!(?parent, ?child, "add_child ignored");
            return;
        }
        if let Some(children) = self.objects.get_mut(&parent).and_then(|p| p.children_mut())
            && !children.contains(&child)
        {
            children.push(child);
            self.touch();
        }
    }

    fn remove_child(&mut self, parent: NativeId, child: NativeId) {
        if let Some(children) = self.objects.get_mut(&parent).and_then(|p| p.children_mut()) {
            let before = children.len();
            children.retain(|c| *c != child);
            if children.len() != before {
                self.touch();
            }
        }
    }

    fn insert_child_before(&mut self, parent: NativeId, child: NativeId, before: NativeId) {
        let ok = match (self.objects.get(&parent), self.objects.get(&child)) {
            (Some(p), Some(c)) => p.accepts(c),
            _ => false,
        };
        if !ok {
            return;
        }
        if let Some(children) = self.objects.get_mut(&parent).and_then(|p| p.children_mut()) {
            children.retain(|c| *c != child);
            let pos = children
                .iter()
                .position(|c| *c == before)
                .unwrap_or(children.len());
            children.insert(pos, child);
            self.touch();
        }
    }

    fn load_texture(&mut self, url: &str) -> Option<TextureLoad> {
        Some(self.textures.load(url))
    }

    fn poll_textures(&mut self) -> usize {
        let events = self.textures.poll();
        self.apply_texture_events(events)
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn render(&mut self) -> StageResult<()> {
        if self.surface.is_none() {
            return Err(StageError::surface("canvas backend is not initialized"));
        }
        self.begin_frame();

        if let Some(mut ctx) = self.ctx.take() {
            if !self.layers.is_empty() {
                for id in &self.layers {
                    let Some(CanvasObject::Layer(l)) = self.objects.get(id) else {
                        continue;
                    };
                    if !l.props.is_drawable() {
                        continue;
                    }
                    let opacity = l.props.alpha.clamp(0.0, 1.0) as f32;
                    if opacity < 1.0 {
                        ctx.push_opacity_layer(opacity);
                    }
                    self.draw_children(&mut ctx, &l.children);
                    if opacity < 1.0 {
                        ctx.pop_layer();
                    }
                }
            } else if let Some(id) = self.implicit_scene
                && let Some(CanvasObject::Scene(s)) = self.objects.get(&id)
            {
                if let Some(bg) = s.props.background {
                    fill_surface(&mut ctx, bg, self.surface_size());
                }
                for child in &s.children {
                    if let Some(CanvasObject::Sprite(sprite)) = self.objects.get(child) {
                        self.draw_sprite(&mut ctx, sprite);
                    }
                }
            }
            self.ctx = Some(ctx);
        }

        self.end_frame();
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/canvas.rs"]
mod tests;
