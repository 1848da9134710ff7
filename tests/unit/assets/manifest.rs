use super::*;
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Mutex;

#[derive(Default)]
struct MemorySource {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    fn with(self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.lock().unwrap().insert(url.to_owned(), bytes.into());
        self
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> StageResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StageError::texture(format!("missing {url}")))
    }
}

fn png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([1, 2, 3, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn registry(source: MemorySource) -> ManifestRegistry {
    ManifestRegistry::new(Arc::new(source))
}

#[test]
fn loads_textures_and_resolves_keys() {
    let source = MemorySource::default()
        .with(
            "assets/manifest.json",
            r#"{ "textures": { "hero": "/img/hero.png", "tree": "/img/tree.png" } }"#,
        )
        .with("/img/hero.png", png())
        .with("/img/tree.png", png());
    let mut reg = registry(source);

    let state = reg.load("assets/manifest.json");
    assert!(!state.loading);
    assert_eq!(state.error, None);
    assert_eq!(
        state.progress,
        ManifestProgress {
            loaded: 2,
            total: 2,
            percentage: 100
        }
    );
    assert_eq!(reg.resolve_texture_key("hero").as_deref(), Some("/img/hero.png"));
    assert_eq!(reg.resolve_texture_key("ghost"), None);
}

#[test]
fn failing_entry_is_skipped_without_failing_the_manifest() {
    let source = MemorySource::default()
        .with(
            "m.json",
            r#"{ "textures": { "a": "a.png", "b": "broken.png", "c": "c.png" } }"#,
        )
        .with("a.png", png())
        .with("broken.png", b"not an image".to_vec())
        .with("c.png", png());
    let mut reg = registry(source);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    reg.subscribe("m.json", move |s: &ManifestState| {
        sink.borrow_mut().push((s.loading, s.progress.percentage))
    });

    let state = reg.load("m.json");
    assert_eq!(state.error, None);
    assert_eq!(state.assets.keys().collect::<Vec<_>>(), ["a", "c"]);
    assert_eq!(state.progress.loaded, 3);
    assert_eq!(
        *seen.borrow(),
        vec![(true, 0), (true, 0), (true, 33), (true, 67), (false, 100)]
    );
    assert_eq!(reg.resolve_texture_key("b"), None);
}

#[test]
fn empty_manifest_is_complete() {
    let mut reg = registry(MemorySource::default().with("empty.json", "{}"));
    let state = reg.load("empty.json");
    assert!(!state.loading);
    assert_eq!(state.progress.percentage, 100);
    assert_eq!(state.progress.total, 0);
}

#[test]
fn unreadable_manifest_reports_error_state() {
    let mut reg = registry(MemorySource::default().with("bad.json", "{ nope"));
    let state = reg.load("bad.json");
    assert!(!state.loading);
    assert!(state.error.as_deref().is_some_and(|e| e.contains("serialization")));

    let state = reg.load("missing.json");
    assert!(state.error.is_some());
    assert_eq!(state.progress, ManifestProgress::default());
}

#[test]
fn second_load_is_a_no_op_and_unsubscribe_stops_updates() {
    let source = MemorySource::default()
        .with("m.json", r#"{ "textures": { "a": "a.png" } }"#)
        .with("a.png", png());
    let mut reg = registry(source);

    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    let id = reg.subscribe("m.json", move |_: &ManifestState| *counter.borrow_mut() += 1);
    reg.load("m.json");
    let after_first = *calls.borrow();
    assert!(after_first > 0);

    reg.load("m.json");
    assert_eq!(*calls.borrow(), after_first);

    assert!(reg.unsubscribe(id));
    assert!(!reg.unsubscribe(id));
    reg.clear();
    reg.load("m.json");
    assert_eq!(*calls.borrow(), after_first);
}

#[test]
fn preload_checks_the_format_and_leaves_decoding_to_the_backend() {
    let mut header_only = png();
    header_only.truncate(16);
    let source = MemorySource::default()
        .with("m.json", r#"{ "textures": { "a": "a.png", "b": "b.txt" } }"#)
        .with("a.png", header_only)
        .with("b.txt", "hello");
    let mut reg = registry(source);

    let state = reg.load("m.json");
    assert_eq!(state.assets.keys().collect::<Vec<_>>(), ["a"]);
    assert_eq!(reg.resolve_texture_key("a").as_deref(), Some("a.png"));
}
