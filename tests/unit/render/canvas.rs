use super::*;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const PINK: [u8; 4] = [0xFF, 0x69, 0xB4, 0xFF];
const BLACK: [u8; 4] = [0, 0, 0, 255];

#[derive(Default)]
struct CountingSource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl AssetSource for CountingSource {
    fn fetch(&self, url: &str) -> StageResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StageError::texture(format!("missing {url}")))
    }
}

fn png(rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn iid(index: u32) -> InstanceId {
    InstanceId {
        index,
        generation: 0,
    }
}

fn opts() -> CanvasBackendOpts {
    CanvasBackendOpts::default().with_texture_loading(TextureLoading::Inline)
}

fn backend(w: u32, h: u32) -> CanvasBackend {
    let mut b = CanvasBackend::with_source(opts(), Arc::new(CountingSource::default()));
    b.initialize(RenderSurface::new(w, h)).unwrap();
    b
}

fn sprite(x: f64, y: f64, w: f64, h: f64) -> SpriteProps {
    SpriteProps {
        x,
        y,
        width: w,
        height: h,
        ..SpriteProps::default()
    }
}

fn layer(name: &str, z_index: i32) -> LayerProps {
    LayerProps {
        name: name.to_owned(),
        z_index,
        visible: true,
        alpha: 1.0,
    }
}

fn scene(bg: Option<Rgba8>) -> SceneProps {
    SceneProps {
        width: None,
        height: None,
        background: bg,
    }
}

#[test]
fn initialize_rejects_unusable_surfaces() {
    let mut b = CanvasBackend::new(opts());
    assert!(matches!(
        b.initialize(RenderSurface::new(0, 10)),
        Err(StageError::Surface(_))
    ));
    assert!(matches!(
        b.initialize(RenderSurface::new(70_000, 10)),
        Err(StageError::Surface(_))
    ));
    assert!(matches!(b.render(), Err(StageError::Surface(_))));
}

#[test]
fn layers_stay_sorted_by_z_with_stable_ties() {
    let mut b = backend(16, 16);
    let fg = b.create_layer(iid(1), &layer("foreground", 200));
    let bg = b.create_layer(iid(2), &layer("background", 0));
    let a = b.create_layer(iid(3), &layer("gameplay", 100));
    let c = b.create_layer(iid(4), &layer("effects", 100));
    assert_eq!(b.layer_order(), &[bg, a, c, fg]);

    b.update_layer(fg, &layer("foreground", -5));
    assert_eq!(b.layer_order(), &[fg, bg, a, c]);

    b.update_layer(a, &layer("gameplay", 100));
    assert_eq!(b.layer_order(), &[fg, bg, a, c]);

    b.destroy_layer(bg);
    assert_eq!(b.layer_order(), &[fg, a, c]);
}

#[test]
fn hit_test_prefers_top_most_and_skips_hidden() {
    let mut b = backend(100, 100);
    let s = b.create_scene(iid(1), &scene(None));
    let under = b.create_sprite(iid(2), &sprite(0.0, 0.0, 50.0, 50.0));
    let over = b.create_sprite(iid(3), &sprite(25.0, 25.0, 50.0, 50.0));
    b.add_child(s, under);
    b.add_child(s, over);

    assert_eq!(b.hit_test(30.0, 30.0).map(|c| c.id), Some(iid(3)));
    assert_eq!(b.hit_test(10.0, 10.0).map(|c| c.id), Some(iid(2)));
    assert_eq!(b.hit_test(75.0, 75.0).map(|c| c.id), Some(iid(3)), "edges are inclusive");
    assert!(b.hit_test(90.0, 90.0).is_none());

    b.update_sprite(over, &SpriteProps {
        alpha: 0.0,
        ..sprite(25.0, 25.0, 50.0, 50.0)
    });
    assert_eq!(b.hit_test(30.0, 30.0).map(|c| c.id), Some(iid(2)));

    b.update_sprite(under, &SpriteProps {
        visible: false,
        ..sprite(0.0, 0.0, 50.0, 50.0)
    });
    assert!(b.hit_test(30.0, 30.0).is_none());

    let info = b.hit_test(0.0, 0.0);
    assert!(info.is_none());
}

#[test]
fn hit_test_walks_layers_top_down() {
    let mut b = backend(100, 100);
    let low = b.create_layer(iid(1), &layer("background", 0));
    let high = b.create_layer(iid(2), &layer("ui", 300));
    let s_low = b.create_sprite(iid(3), &sprite(0.0, 0.0, 40.0, 40.0));
    let s_high = b.create_sprite(iid(4), &sprite(0.0, 0.0, 40.0, 40.0));
    b.add_child(high, s_high);
    b.add_child(low, s_low);

    let hit = b.hit_test(5.0, 5.0).unwrap();
    assert_eq!(hit.id, iid(4));
    assert_eq!(hit.kind, InstanceKind::Sprite);
    assert_eq!(hit.bounds, Rect::new(0.0, 0.0, 40.0, 40.0));

    b.update_layer(high, &LayerProps {
        visible: false,
        ..layer("ui", 300)
    });
    assert_eq!(b.hit_test(5.0, 5.0).map(|c| c.id), Some(iid(3)));
}

#[test]
fn placeholder_fill_and_invisible_sprites() {
    let mut b = backend(64, 64);
    let s = b.create_scene(iid(1), &scene(Some(Rgba8::BLACK)));
    let shown = b.create_sprite(iid(2), &sprite(8.0, 8.0, 16.0, 16.0));
    let hidden = b.create_sprite(iid(3), &SpriteProps {
        visible: false,
        ..sprite(40.0, 40.0, 16.0, 16.0)
    });
    let clear = b.create_sprite(iid(4), &SpriteProps {
        alpha: 0.0,
        ..sprite(40.0, 8.0, 16.0, 16.0)
    });
    for c in [shown, hidden, clear] {
        b.add_child(s, c);
    }
    b.render().unwrap();
    assert!(!b.is_dirty());

    let f = b.frame().unwrap();
    assert_eq!((f.width, f.height), (64, 64));
    assert_eq!(f.pixel(16, 16), Some(PINK));
    assert_eq!(f.pixel(2, 2), Some(BLACK));
    assert_eq!(f.pixel(48, 48), Some(BLACK));
    assert_eq!(f.pixel(48, 16), Some(BLACK));
}

#[test]
fn single_layer_matches_implicit_scene_output() {
    let build = |with_layer: bool| {
        let mut b = backend(48, 48);
        let s = b.create_scene(iid(1), &scene(Some(Rgba8::new(0, 17, 34, 255))));
        if with_layer {
            let l = b.create_layer(iid(9), &layer("gameplay", 100));
            b.add_child(l, s);
        }
        let a = b.create_sprite(iid(2), &sprite(4.0, 4.0, 20.0, 10.0));
        let r = b.create_sprite(iid(3), &SpriteProps {
            rotation: 30.0,
            alpha: 0.5,
            ..sprite(20.0, 20.0, 16.0, 16.0)
        });
        b.add_child(s, a);
        b.add_child(s, r);
        b.render().unwrap();
        b.frame().unwrap()
    };
    assert_eq!(build(false), build(true));
}

#[test]
fn hidden_or_transparent_layers_are_skipped() {
    let mut b = backend(32, 32);
    let l = b.create_layer(iid(1), &LayerProps {
        alpha: 0.0,
        ..layer("gameplay", 100)
    });
    let s = b.create_sprite(iid(2), &sprite(0.0, 0.0, 32.0, 32.0));
    b.add_child(l, s);
    b.render().unwrap();
    assert_eq!(b.frame().unwrap().pixel(16, 16), Some([0, 0, 0, 0]));

    b.update_layer(l, &layer("gameplay", 100));
    b.render().unwrap();
    assert_eq!(b.frame().unwrap().pixel(16, 16), Some(PINK));
}

#[test]
fn shared_texture_is_fetched_once() {
    let source = Arc::new(CountingSource::default());
    source
        .files
        .lock()
        .unwrap()
        .insert("tiles/blue.png".into(), png([0, 0, 255, 255]));
    let mut b = CanvasBackend::with_source(opts(), source.clone());
    b.initialize(RenderSurface::new(32, 32)).unwrap();

    let s = b.create_scene(iid(1), &scene(None));
    let with_tex = |x: f64| SpriteProps {
        texture: Some("tiles/blue.png".into()),
        ..sprite(x, 0.0, 16.0, 16.0)
    };
    let a = b.create_sprite(iid(2), &with_tex(0.0));
    let c = b.create_sprite(iid(3), &with_tex(16.0));
    b.add_child(s, a);
    b.add_child(s, c);
    assert!(b.sprite_texture(a).is_none(), "loads resolve on poll");

    assert_eq!(b.poll_textures(), 1);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    let ta = b.sprite_texture(a).unwrap();
    let tc = b.sprite_texture(c).unwrap();
    assert!(Arc::ptr_eq(ta, tc));

    b.render().unwrap();
    let px = b.frame().unwrap().pixel(8, 8).unwrap();
    assert!(px[2] > 200 && px[0] < 30, "expected blue, got {px:?}");

    let late = b.create_sprite(iid(4), &with_tex(0.0));
    assert!(b.sprite_texture(late).is_some(), "cached textures attach immediately");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_texture_keeps_placeholder_and_is_not_cached() {
    let source = Arc::new(CountingSource::default());
    let mut b = CanvasBackend::with_source(opts(), source.clone());
    b.initialize(RenderSurface::new(16, 16)).unwrap();
    let s = b.create_scene(iid(1), &scene(None));
    let sp = b.create_sprite(iid(2), &SpriteProps {
        texture: Some("nope.png".into()),
        ..sprite(0.0, 0.0, 16.0, 16.0)
    });
    b.add_child(s, sp);

    b.poll_textures();
    assert!(b.sprite_texture(sp).is_none());
    assert_eq!(b.textures().cached_count(), 0);
    b.render().unwrap();
    assert_eq!(b.frame().unwrap().pixel(8, 8), Some(PINK));

    b.update_sprite(sp, &sprite(0.0, 0.0, 16.0, 16.0));
    b.update_sprite(sp, &SpriteProps {
        texture: Some("nope.png".into()),
        ..sprite(0.0, 0.0, 16.0, 16.0)
    });
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[test]
fn scene_size_resizes_surface() {
    let mut b = backend(16, 16);
    b.create_scene(iid(1), &SceneProps {
        width: Some(40),
        height: Some(24),
        background: None,
    });
    b.render().unwrap();
    let f = b.frame().unwrap();
    assert_eq!((f.width, f.height), (40, 24));
    assert_eq!(b.surface().map(|s| (s.width, s.height)), Some((40, 24)));
}

#[test]
fn children_are_type_checked_deduplicated_and_scrubbed() {
    let mut b = backend(16, 16);
    let l = b.create_layer(iid(1), &layer("gameplay", 100));
    let s = b.create_scene(iid(2), &scene(None));
    let a = b.create_sprite(iid(3), &SpriteProps::default());
    let c = b.create_sprite(iid(4), &SpriteProps::default());

    b.add_child(l, s);
    b.add_child(s, a);
    b.add_child(s, a);
    b.add_child(a, c);
    b.add_child(s, l);
    assert_eq!(b.children_of(s), Some(&[a][..]));
    assert_eq!(b.children_of(l), Some(&[s][..]));

    b.insert_child_before(s, c, a);
    assert_eq!(b.children_of(s), Some(&[c, a][..]));

    b.destroy_sprite(a);
    assert_eq!(b.children_of(s), Some(&[c][..]));
    b.remove_child(s, c);
    assert_eq!(b.children_of(s), Some(&[][..]));
}

#[test]
fn unchanged_updates_do_not_mark_dirty() {
    let mut b = backend(16, 16);
    let sp = b.create_sprite(iid(1), &SpriteProps::default());
    b.render().unwrap();
    assert!(!b.is_dirty());
    b.update_sprite(sp, &SpriteProps::default());
    assert!(!b.is_dirty());
    b.update_sprite(sp, &sprite(1.0, 0.0, 32.0, 32.0));
    assert!(b.is_dirty());
    assert_eq!(b.frames_rendered(), 1);
}

#[test]
fn clear_color_fills_frames_without_content() {
    let mut b = CanvasBackend::with_source(
        opts().with_clear_rgba(Some(Rgba8::new(0, 255, 0, 255))),
        Arc::new(CountingSource::default()),
    );
    b.initialize(RenderSurface::new(8, 8)).unwrap();
    b.render().unwrap();
    assert_eq!(b.frame().unwrap().pixel(4, 4), Some([0, 255, 0, 255]));

    b.destroy();
    assert_eq!(b.object_count(), 0);
    assert!(b.frame().is_none());
}

#[test]
fn explicit_clear_paints_over_and_resets_the_frame() {
    let mut b = backend(8, 8);
    b.begin_frame();
    b.clear(Some(Rgba8::new(0, 0, 255, 255)));
    b.end_frame();
    assert_eq!(b.frame().unwrap().pixel(3, 3), Some([0, 0, 255, 255]));

    b.begin_frame();
    b.clear(Some(Rgba8::BLACK));
    b.clear(Some(Rgba8::TRANSPARENT));
    b.end_frame();
    assert_eq!(b.frame().unwrap().pixel(3, 3), Some(BLACK));

    b.begin_frame();
    b.clear(Some(Rgba8::BLACK));
    b.clear(None);
    b.end_frame();
    assert_eq!(b.frame().unwrap().pixel(3, 3), Some([0, 0, 0, 0]));
}

#[test]
fn load_texture_goes_through_the_shared_cache() {
    let source = Arc::new(CountingSource::default());
    source
        .files
        .lock()
        .unwrap()
        .insert("hud/coin.png".into(), png([0, 200, 0, 255]));
    let mut b = CanvasBackend::with_source(opts(), source.clone());
    b.initialize(RenderSurface::new(8, 8)).unwrap();

    assert!(matches!(b.load_texture("hud/coin.png"), Some(TextureLoad::Pending)));
    assert_eq!(b.poll_textures(), 1);
    let Some(TextureLoad::Ready(tex)) = b.load_texture("hud/coin.png") else {
        panic!("expected the texture to be cached");
    };
    assert_eq!((tex.width(), tex.height()), (2, 2));

    let s = b.create_scene(iid(1), &scene(None));
    let sp = b.create_sprite(iid(2), &SpriteProps {
        texture: Some("hud/coin.png".into()),
        ..sprite(0.0, 0.0, 8.0, 8.0)
    });
    b.add_child(s, sp);
    assert!(Arc::ptr_eq(b.sprite_texture(sp).unwrap(), &tex));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}
