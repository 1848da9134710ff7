use super::*;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct CountingSource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl CountingSource {
    fn with(self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(url.to_owned(), bytes);
        self
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
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

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn same_url_is_fetched_once_and_shared() {
    let source = Arc::new(CountingSource::default().with("hero.png", png(2, 3, [255, 0, 0, 255])));
    let mut cache = TextureCache::new(source.clone(), TextureLoading::Inline);

    assert!(matches!(cache.load("hero.png"), TextureLoad::Pending));
    assert!(matches!(cache.load("hero.png"), TextureLoad::Pending));
    assert_eq!(source.fetches(), 1);
    assert!(cache.is_pending("hero.png"));

    let events = cache.poll();
    assert_eq!(events.len(), 1);
    let TextureEvent::Loaded { texture, .. } = &events[0] else {
        panic!("expected a loaded texture");
    };
    assert_eq!((texture.width(), texture.height()), (2, 3));

    let TextureLoad::Ready(again) = cache.load("hero.png") else {
        panic!("expected cached texture");
    };
    assert!(Arc::ptr_eq(texture, &again));
    assert_eq!(source.fetches(), 1);
    assert_eq!(cache.pending_count(), 0);
}

#[test]
fn failures_are_not_cached_and_retry_on_next_request() {
    let source = Arc::new(CountingSource::default());
    let mut cache = TextureCache::new(source.clone(), TextureLoading::Inline);

    cache.load("missing.png");
    let events = cache.poll();
    assert!(matches!(&events[..], [TextureEvent::Failed { url, .. }] if url == "missing.png"));
    assert!(cache.get("missing.png").is_none());
    assert_eq!(cache.cached_count(), 0);

    cache.load("missing.png");
    assert_eq!(source.fetches(), 2);
}

#[test]
fn undecodable_bytes_fail() {
    let source = Arc::new(CountingSource::default().with("bad.png", b"not an image".to_vec()));
    let mut cache = TextureCache::new(source, TextureLoading::Inline);
    cache.load("bad.png");
    assert!(matches!(&cache.poll()[..], [TextureEvent::Failed { .. }]));
}

#[test]
fn svg_textures_rasterize_at_intrinsic_size() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="2">
        <rect width="4" height="2" fill="#ff0000"/></svg>"##;
    let source = Arc::new(CountingSource::default().with("icons/box.svg", svg.to_vec()));
    let mut cache = TextureCache::new(source, TextureLoading::Inline);
    cache.load("icons/box.svg");
    let events = cache.poll();
    let [TextureEvent::Loaded { texture, .. }] = &events[..] else {
        panic!("expected svg to load");
    };
    assert_eq!((texture.width(), texture.height()), (4, 2));
}

#[test]
fn background_loads_complete_after_wait() {
    let source = Arc::new(CountingSource::default().with("a.png", png(1, 1, [0, 0, 255, 255])));
    let mut cache = TextureCache::new(source, TextureLoading::Background);
    assert!(matches!(cache.load("a.png"), TextureLoad::Pending));
    let events = cache.wait_idle();
    assert_eq!(events.len(), 1);
    assert!(cache.get("a.png").is_some());
}

#[test]
fn check_texture_sniffs_without_decoding() {
    let mut truncated = png(8, 8, [1, 2, 3, 255]);
    truncated.truncate(24);
    let source = CountingSource::default()
        .with("ok.png", png(1, 1, [0, 0, 0, 255]))
        .with("cut.png", truncated)
        .with("junk.png", b"not an image".to_vec())
        .with("icon.svg", br#"<svg xmlns="http://www.w3.org/2000/svg"/>"#.to_vec())
        .with("fake.svg", b"plain text".to_vec());

    assert!(check_texture(&source, "ok.png").is_ok());
    // Only the signature is looked at.
    assert!(check_texture(&source, "cut.png").is_ok());
    assert!(check_texture(&source, "junk.png").is_err());
    assert!(check_texture(&source, "icon.svg").is_ok());
    assert!(check_texture(&source, "fake.svg").is_err());
    assert!(check_texture(&source, "missing.png").is_err());
    assert_eq!(source.fetches(), 6);
}

#[test]
fn decode_premultiplies() {
    let img = decode_image(&png(1, 1, [100, 50, 200, 128])).unwrap();
    assert_eq!(img.rgba8_premul, vec![50, 25, 100, 128]);
}

#[test]
fn asset_paths_normalize() {
    assert_eq!(normalize_asset_path("/assets/./hero.png").unwrap(), "assets/hero.png");
    assert_eq!(normalize_asset_path("a\\b.png").unwrap(), "a/b.png");
    assert!(normalize_asset_path("../secret.png").is_err());
    assert!(normalize_asset_path("/").is_err());
}

#[test]
fn fs_source_reads_under_root() {
    let dir = std::env::temp_dir().join(format!("stagehand-fs-source-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("img")).unwrap();
    std::fs::write(dir.join("img/one.bin"), b"abc").unwrap();

    let src = FsAssetSource::new(&dir);
    assert_eq!(src.fetch("/img/one.bin").unwrap(), b"abc");
    assert!(src.fetch("img/none.bin").is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
