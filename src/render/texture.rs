use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use anyhow::Context;

use crate::foundation::error::{StageError, StageResult};
use crate::foundation::math::mul_div255_u8;

/// Byte fetcher for textures and manifests.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, url: &str) -> StageResult<Vec<u8>>;
}

/// Reads assets from a directory on disk.
///
/// References are treated as web-root relative: a leading `/` is dropped and the rest is
/// resolved under `root`.
#[derive(Clone, Debug)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FsAssetSource {
    fn fetch(&self, url: &str) -> StageResult<Vec<u8>> {
        let rel = normalize_asset_path(url)?;
        let path = self.root.join(rel);
        std::fs::read(&path)
            .with_context(|| format!("read asset '{}'", path.display()))
            .map_err(StageError::from)
    }
}

/// Normalize an asset reference into a relative path with `/` separators.
///
/// Drops a leading `/` and `.` segments, and rejects parent traversals (`..`).
pub(crate) fn normalize_asset_path(source: &str) -> StageResult<String> {
    let s = source.replace('\\', "/");
    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(StageError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(StageError::validation(format!(
            "asset path '{source}' must contain a file name"
        )));
    }
    Ok(out.join("/"))
}

/// Decoded raster in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub(crate) struct PreparedImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rgba8_premul: Vec<u8>,
}

pub(crate) fn decode_image(bytes: &[u8]) -> StageResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul,
    })
}

/// Rasterize an SVG document at its intrinsic size.
pub(crate) fn rasterize_svg(bytes: &[u8]) -> StageResult<PreparedImage> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default()).context("parse svg tree")?;
    let size = tree.size();
    let (w, h) = (size.width().ceil(), size.height().ceil());
    if !(w.is_finite() && h.is_finite() && w >= 1.0 && h >= 1.0) {
        return Err(StageError::texture("svg has invalid width/height"));
    }
    let (width, height) = (w as u32, h as u32);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| StageError::texture("failed to allocate svg pixmap"))?;
    let xform = resvg::tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, xform, &mut pixmap.as_mut());

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: pixmap.data().to_vec(),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = mul_div255_u8(u16::from(*c), a);
        }
    }
}

fn is_svg(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".svg")
}

/// Fetch one texture reference and check that its bytes are a format [`load_prepared`] can
/// decode, without decoding them.
pub(crate) fn check_texture(source: &dyn AssetSource, url: &str) -> StageResult<()> {
    let bytes = source.fetch(url)?;
    if is_svg(url) {
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| StageError::texture(format!("texture '{url}' is not utf-8 svg")))?;
        if !text.contains("<svg") {
            return Err(StageError::texture(format!("texture '{url}' has no <svg> root")));
        }
        return Ok(());
    }
    image::guess_format(&bytes)
        .map(|_| ())
        .map_err(|e| StageError::texture(format!("texture '{url}': {e}")))
}

/// Fetch and decode one texture reference.
pub(crate) fn load_prepared(source: &dyn AssetSource, url: &str) -> StageResult<PreparedImage> {
    let bytes = source.fetch(url)?;
    let img = if is_svg(url) {
        rasterize_svg(&bytes)?
    } else {
        decode_image(&bytes)?
    };
    if img.width == 0 || img.height == 0 {
        return Err(StageError::texture(format!("texture '{url}' is empty")));
    }
    if img.width > u32::from(u16::MAX) || img.height > u32::from(u16::MAX) {
        return Err(StageError::texture(format!(
            "texture '{url}' is too large: {}x{}",
            img.width, img.height
        )));
    }
    Ok(img)
}

/// A decoded, drawable texture. Shared between every sprite that references the same URL.
#[derive(Clone)]
pub struct Texture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) paint: vello_cpu::Image,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Texture {
    pub(crate) fn from_prepared(img: PreparedImage) -> Self {
        let pixels = img
            .rgba8_premul
            .chunks_exact(4)
            .map(|px| {
                vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]])
            })
            .collect::<Vec<_>>();
        let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(
            pixels,
            img.width as u16,
            img.height as u16,
            true,
        );
        Self {
            width: img.width,
            height: img.height,
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

pub type TextureHandle = Arc<Texture>;

/// Outcome of requesting a texture.
#[derive(Clone, Debug)]
pub enum TextureLoad {
    /// Already decoded and cached.
    Ready(TextureHandle),
    /// In flight; the result arrives through [`TextureCache::poll`].
    Pending,
}

/// A finished load, successful or not.
#[derive(Clone, Debug)]
pub enum TextureEvent {
    Loaded { url: String, texture: TextureHandle },
    Failed { url: String, reason: String },
}

/// Where texture decoding runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureLoading {
    /// Decode on the calling thread; the result is still delivered by the next poll.
    #[default]
    Inline,
    /// Decode on the rayon pool.
    Background,
}

impl TextureLoading {
    /// Reads `STAGEHAND_TEXTURE_LOADING` (`inline` or `background`).
    pub fn from_env() -> Self {
        match std::env::var("STAGEHAND_TEXTURE_LOADING").as_deref() {
            Ok("background") => Self::Background,
            _ => Self::Inline,
        }
    }
}

struct Completion {
    url: String,
    result: StageResult<PreparedImage>,
}

/// URL-keyed texture cache with at most one fetch in flight per URL.
///
/// Only successful loads are cached. A failed URL leaves no entry behind, so the next request
/// for it starts a fresh fetch.
pub struct TextureCache {
    source: Arc<dyn AssetSource>,
    loading: TextureLoading,
    ready: HashMap<String, TextureHandle>,
    in_flight: HashSet<String>,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
}

impl std::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("loading", &self.loading)
            .field("ready", &self.ready.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl TextureCache {
    pub fn new(source: Arc<dyn AssetSource>, loading: TextureLoading) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            loading,
            ready: HashMap::new(),
            in_flight: HashSet::new(),
            tx,
            rx,
        }
    }

    pub fn get(&self, url: &str) -> Option<&TextureHandle> {
        self.ready.get(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.in_flight.contains(url)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cached_count(&self) -> usize {
        self.ready.len()
    }

    /// Request `url`. Concurrent requests for the same URL share one fetch.
    pub fn load(&mut self, url: &str) -> TextureLoad {
        if let Some(t) = self.ready.get(url) {
            return TextureLoad::Ready(Arc::clone(t));
        }
        if self.in_flight.insert(url.to_owned()) {
            tracing::debug!(url, mode = ?self.loading, "texture fetch");
            let url = url.to_owned();
            let source = Arc::clone(&self.source);
            let tx = self.tx.clone();
            let job = move || {
                let result = load_prepared(source.as_ref(), &url);
                let _ = tx.send(Completion { url, result });
            };
            match self.loading {
                TextureLoading::Inline => job(),
                TextureLoading::Background => rayon::spawn(job),
            }
        }
        TextureLoad::Pending
    }

    /// Drain finished loads without blocking.
    pub fn poll(&mut self) -> Vec<TextureEvent> {
        let mut out = Vec::new();
        while let Ok(c) = self.rx.try_recv() {
            out.push(self.complete(c));
        }
        out
    }

    /// Block until every in-flight load has finished.
    pub fn wait_idle(&mut self) -> Vec<TextureEvent> {
        let mut out = self.poll();
        while !self.in_flight.is_empty() {
            match self.rx.recv() {
                Ok(c) => out.push(self.complete(c)),
                Err(_) => break,
            }
        }
        out
    }

    fn complete(&mut self, c: Completion) -> TextureEvent {
        self.in_flight.remove(&c.url);
        match c.result {
            Ok(img) => {
                let texture = Arc::new(Texture::from_prepared(img));
                self.ready.insert(c.url.clone(), Arc::clone(&texture));
                TextureEvent::Loaded {
                    url: c.url,
                    texture,
                }
            }
            Err(e) => {
                tracing::warn!(url = %c.url, error = %e, "failed to load texture");
                TextureEvent::Failed {
                    url: c.url,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Drop every cached texture.
    pub fn clear(&mut self) {
        self.ready.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/texture.rs"]
mod tests;
