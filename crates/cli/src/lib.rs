use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_engine::{AutoRenderer, PdfDocument, Rasterizer, SaveMode};
use serde::Serialize;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::Storage;
use viewer_core::{
    AnnotationMode, ColorInput, DocumentSession, FixedText, PixelPoint, Viewer, ViewerCommand,
    ViewerConfig, ViewerEvent,
};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "Render PDF pages and place highlights, comments and notes")]
pub struct Cli {
    /// Read the viewer config from this file instead of the data directory.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a page to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Zoom factor; clamped to the configured limits.
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Backend::Auto)]
        backend: Backend,
    },
    /// Click on a rendered page to add an annotation, then save.
    Annotate(AnnotateArgs),
    /// List comment and note texts.
    Notes {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only this page; all pages when omitted.
        #[arg(long)]
        page: Option<u32>,
    },
    /// Print the effective viewer config as JSON.
    Config {
        /// Also store it in the data directory.
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Args)]
struct AnnotateArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Click x in rendered pixels.
    #[arg(long)]
    x: f32,
    /// Click y in rendered pixels.
    #[arg(long)]
    y: f32,
    /// Zoom factor the click was made at.
    #[arg(long)]
    scale: Option<f32>,
    #[arg(long, value_parser = parse_mode)]
    mode: AnnotationMode,
    /// Highlight colour as #RRGGBB.
    #[arg(long)]
    color: Option<String>,
    /// Body of a comment or note.
    #[arg(long)]
    text: Option<String>,
    /// Write to this file instead of updating FILE in place.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Rewrite the whole file instead of appending an incremental update.
    #[arg(long)]
    full: bool,
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    backend: Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Pdfium when its library is available, builtin otherwise.
    Auto,
    /// Page sheet and annotations only.
    Builtin,
    #[cfg(feature = "pdfium")]
    Pdfium,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
    encrypted: bool,
    metadata: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateOutput {
    page: u32,
    kind: pdf_engine::AnnotationKind,
    texts: Vec<String>,
    saved_to: String,
    save_mode: SaveMode,
    objects_written: usize,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, scale, output, backend } => {
            run_render(&file, page, scale, output.as_deref(), backend, config)
        }
        Commands::Annotate(args) => run_annotate(args, config),
        Commands::Notes { file, page } => run_notes(&file, page),
        Commands::Config { save } => run_config(&config, save),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // A logger may already be installed when `run` is called twice in-process.
    let _ = TermLogger::init(level, simplelog::Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn load_config(explicit: Option<&Path>) -> Result<ViewerConfig> {
    if let Some(path) = explicit {
        return storage::load_config_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    match Storage::from_default_project() {
        Ok(store) => store.load_config().context("failed to load stored config"),
        Err(err) => {
            log::warn!("{err}; using default config");
            Ok(ViewerConfig::default())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let document = PdfDocument::open(file).context("failed to open PDF")?;
    let page_count = document.page_count();
    let first_page_size_pt = if page_count > 0 {
        let size = document.page_size(0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let metadata = document
        .metadata()
        .fields()
        .into_iter()
        .map(|(name, value)| (name, value.to_owned()))
        .collect();

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        first_page_size_pt,
        encrypted: document.is_encrypted(),
        metadata,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_render(
    file: &Path,
    page: u32,
    scale: Option<f32>,
    output: Option<&Path>,
    backend: Backend,
    mut config: ViewerConfig,
) -> Result<()> {
    ensure_pdf_exists(file)?;
    let page_index = page_index(page)?;

    if let Some(scale) = scale {
        let limits = config.scale_limits;
        if limits.clamp(scale) != scale {
            log::warn!("scale {scale} is outside {}..={}; clamping", limits.min, limits.max);
        }
        config.initial_scale = scale;
    }
    config.validate().context("invalid render settings")?;

    let renderer = renderer_for(backend, &config)?;
    let session =
        DocumentSession::open_with_renderer(file, &config, renderer).context("failed to open PDF")?;
    let image = session.render(page_index, session.scale().get()).context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image
        .save_with_format(&output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write image to {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}

fn run_annotate(args: AnnotateArgs, mut config: ViewerConfig) -> Result<()> {
    ensure_pdf_exists(&args.file)?;
    let page = page_index(args.page)?;

    if let Some(scale) = args.scale {
        // A clamped scale would map the click somewhere else on the page.
        let limits = config.scale_limits;
        if limits.clamp(scale) != scale {
            anyhow::bail!("--scale {scale} is outside the zoom range {}..={}", limits.min, limits.max);
        }
        config.initial_scale = scale;
    }
    if args.full {
        config.save_mode = SaveMode::Full;
    }
    config.validate().context("invalid annotation settings")?;

    let renderer = renderer_for(args.backend, &config)?;
    let session = DocumentSession::open_with_renderer(&args.file, &config, renderer)
        .context("failed to open PDF")?;
    let mut viewer = Viewer::with_session(session, &config, FixedText(args.text));

    viewer
        .dispatch(ViewerCommand::SetAnnotationMode {
            mode: args.mode,
            color: args.color.map(ColorInput::Hex),
        })
        .context("failed to set annotation mode")?;

    let event = viewer
        .dispatch(ViewerCommand::Click { page, position: PixelPoint::new(args.x, args.y) })
        .context("failed to annotate PDF")?;

    let (kind, texts) = match event {
        ViewerEvent::Annotated { kind, texts, .. } => (kind, texts),
        ViewerEvent::Ignored => anyhow::bail!("--mode none does not add an annotation"),
        ViewerEvent::Skipped { .. } => anyhow::bail!("--text is required and must not be empty"),
        other => anyhow::bail!("unexpected viewer event {other:?}"),
    };

    let saved = match args.output {
        Some(path) => viewer.dispatch(ViewerCommand::SaveAs { path }),
        None => viewer.dispatch(ViewerCommand::Save),
    }
    .context("failed to save annotations")?;

    let ViewerEvent::Saved { report } = saved else {
        anyhow::bail!("unexpected viewer event {saved:?}");
    };

    let payload = AnnotateOutput {
        page: args.page,
        kind,
        texts,
        saved_to: viewer.session().path().display().to_string(),
        save_mode: report.mode,
        objects_written: report.objects_written,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_notes(file: &Path, page: Option<u32>) -> Result<()> {
    ensure_pdf_exists(file)?;
    let document = PdfDocument::open(file).context("failed to open PDF")?;

    match page {
        Some(page) => {
            for text in document.annotation_texts(page_index(page)?)? {
                println!("{text}");
            }
        }
        None => {
            for index in 0..document.page_count() {
                for text in document.annotation_texts(index)? {
                    println!("{}\t{text}", index + 1);
                }
            }
        }
    }

    Ok(())
}

fn run_config(config: &ViewerConfig, save: bool) -> Result<()> {
    if save {
        let store = Storage::from_default_project()?;
        store.save_config(config)?;
        log::info!("config stored at {}", store.config_path().display());
    }

    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn renderer_for(backend: Backend, config: &ViewerConfig) -> Result<AutoRenderer> {
    let renderer = match backend {
        Backend::Auto => AutoRenderer::detect(config.note_icon_size),
        Backend::Builtin => AutoRenderer::Builtin(Rasterizer::new(config.note_icon_size)),
        #[cfg(feature = "pdfium")]
        Backend::Pdfium => AutoRenderer::Pdfium(
            pdf_engine::render::pdfium_backend::PdfiumRenderer::from_system_library()?,
        ),
    };

    log::info!("rendering with the {} backend", renderer.name());
    Ok(renderer)
}

fn parse_mode(value: &str) -> Result<AnnotationMode, String> {
    value.parse().map_err(|err: viewer_core::UnknownMode| err.to_string())
}

fn page_index(page: u32) -> Result<u32> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    Ok(page - 1)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
