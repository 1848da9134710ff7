use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "stagehand", version)]
struct Cli {
    /// Maximum log level written to stderr.
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile an element tree, advance it a number of frames and write the result as a PNG.
    Frame(FrameArgs),
    /// Validate an element tree and print the instances it would create.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input element tree JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Number of frames to advance before capturing.
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// Fixed frame rate used to step animations.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Surface width; defaults to the game element's width or 800.
    #[arg(long)]
    width: Option<u32>,

    /// Surface height; defaults to the game element's height or 600.
    #[arg(long)]
    height: Option<u32>,

    /// Color every frame starts from, e.g. `#12141c`.
    #[arg(long)]
    clear: Option<String>,

    /// Texture manifests to load before the first render, relative to the input's directory.
    #[arg(long = "manifest")]
    manifests: Vec<String>,

    /// How textures are decoded.
    #[arg(long, value_enum, default_value_t = LoadingChoice::Inline)]
    loading: LoadingChoice,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Input element tree JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoadingChoice {
    Inline,
    Background,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn read_tree(path: &Path) -> anyhow::Result<stagehand::Element> {
    stagehand::Element::from_path(path)
        .with_context(|| format!("load element tree '{}'", path.display()))
}

/// Surface size declared by the root element, if any.
fn declared_size(root: &stagehand::Element) -> (Option<u32>, Option<u32>) {
    let dim = |name: &str| {
        root.props
            .get(name)
            .and_then(stagehand::PropValue::as_f64)
            .filter(|v| v.is_finite() && *v >= 1.0)
            .map(|v| v.round() as u32)
    };
    (dim("width"), dim("height"))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.frames > 0, "--frames must be at least 1");
    let root = read_tree(&args.in_path)?;
    let fps = stagehand::Fps::new(args.fps, 1)?;

    let clear = args
        .clear
        .as_deref()
        .map(stagehand::Rgba8::parse)
        .transpose()
        .with_context(|| "parse --clear")?;

    let assets_root = args.in_path.parent().unwrap_or_else(|| Path::new("."));
    let loading = match args.loading {
        LoadingChoice::Inline => stagehand::TextureLoading::Inline,
        LoadingChoice::Background => stagehand::TextureLoading::Background,
    };
    let opts = stagehand::CanvasBackendOpts::default()
        .with_assets_root(assets_root)
        .with_clear_rgba(clear)
        .with_texture_loading(loading);
    let backend = stagehand::CanvasBackend::new(opts);

    let (w, h) = declared_size(&root);
    let config = stagehand::StageConfig::new(
        args.width.or(w).unwrap_or(800),
        args.height.or(h).unwrap_or(600),
    )
    .with_clock(stagehand::FrameClock::Fixed { fps });
    let mut stage = stagehand::Stage::new(backend, config)?;

    if !args.manifests.is_empty() {
        let source: Arc<dyn stagehand::AssetSource> =
            Arc::new(stagehand::FsAssetSource::new(assets_root));
        let mut registry = stagehand::ManifestRegistry::new(source);
        for path in &args.manifests {
            let state = registry.load(path);
            if let Some(err) = state.error {
                anyhow::bail!("manifest '{path}': {err}");
            }
            tracing::info!(manifest = %path, textures = state.assets.len(), "manifest loaded");
        }
        stage.set_manifests(registry);
    }

    let log = stage.render(&root)?;
    tracing::info!(created = log.created(), "tree mounted");
    if let Some(backend) = stage.adapter_mut() {
        backend.flush_textures();
    }

    let step = Duration::from_secs_f64(fps.frame_duration_secs());
    for i in 0..args.frames {
        stage
            .tick(step * (i as u32))
            .with_context(|| format!("tick frame {i}"))?;
    }

    let frame = stage
        .adapter()
        .and_then(stagehand::CanvasBackend::frame)
        .context("no frame was rendered")?
        .to_straight();

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let root = read_tree(&args.in_path)?;
    let mut stage = stagehand::Stage::new(
        stagehand::RecordingAdapter::new(),
        stagehand::StageConfig::default(),
    )?;
    let log = stage.render(&root)?;

    for m in &log.mutations {
        if let stagehand::Mutation::Create { id, kind } = m {
            let key = stage
                .instance(*id)
                .and_then(stagehand::Instance::key)
                .unwrap_or("-");
            println!("{kind} {key}");
        }
    }
    eprintln!("ok: {} instances", log.created());
    Ok(())
}
