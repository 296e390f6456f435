//! docraster
//!
//! Command line front end: inspect documents, render pages to raster files,
//! and split large pages into tiles.
//!
//! # Usage
//!
//! ```bash
//! docraster info book.pdf
//! docraster render book.pdf --page 3 --zoom 2 --color gray --output page3.png
//! docraster render scan.pdf --page 1 --color binary --compression ccitt-t6 --append --output scan.tif
//! docraster tiles poster.pdf --page 1 --zoom 8 --output-dir ./tiles
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docraster::config::Config;
use docraster::document::{DocumentKind, DocumentSession, OpenOptions, PageGeometry};
use docraster::engine::NativeEngine;
use docraster::export::{ExportFormat, RasterExporter, TiffCompression, TiffWriteMode};
use docraster::render::{ColorMode, PageRenderer, Rect, RenderSpec, Rotation, TileCache};

/// Rasterize PDF and XPS pages
#[derive(Parser, Debug)]
#[command(name = "docraster")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// PDF or XPS file
    file: PathBuf,

    /// Password for encrypted PDFs
    #[arg(long)]
    password: Option<String>,

    /// Memory budget in MiB (0 = default)
    #[arg(long)]
    memory_mib: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print version, page count, page sizes and outline as JSON
    Info {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Render one page to a raster file
    Render {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        zoom: Option<f32>,

        /// Degrees (0, 90, 180, 270) or -1 for the page's own rotation
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        rotation: i32,

        #[arg(long, default_value = "rgb", value_parser = parse_color)]
        color: ColorMode,

        /// Crop box in points: x0,y0,x1,y1
        #[arg(long, value_parser = parse_rect)]
        crop: Option<Rect>,

        #[arg(long, default_value_t = 1.0)]
        gamma: f32,

        /// Output file; the format follows the extension
        #[arg(long, short)]
        output: PathBuf,

        /// JPEG quality or TIFF JPEG/ZLIB level
        #[arg(long)]
        quality: Option<i32>,

        /// TIFF compression: none, zlib, jpeg, ccitt-rle, ccitt-t4, ccitt-t6
        #[arg(long, default_value = "none", value_parser = parse_compression)]
        compression: TiffCompression,

        /// Add a page to an existing TIFF instead of replacing it
        #[arg(long)]
        append: bool,

        #[arg(long)]
        anti_alias: Option<i32>,
    },

    /// Render one page as a grid of PNG tiles
    Tiles {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        zoom: Option<f32>,

        #[arg(long, default_value = "rgb", value_parser = parse_color)]
        color: ColorMode,

        #[arg(long)]
        tile_width: Option<u32>,

        #[arg(long)]
        tile_height: Option<u32>,

        #[arg(long)]
        output_dir: PathBuf,
    },
}

fn parse_color(s: &str) -> std::result::Result<ColorMode, String> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "rgb" => Ok(ColorMode::Rgb),
        "argb" => Ok(ColorMode::Argb),
        "gray" | "grey" => Ok(ColorMode::Gray),
        "binary" => Ok(ColorMode::Binary),
        "binary_dithered" | "dithered" => Ok(ColorMode::BinaryDithered),
        other => Err(format!("unknown color mode '{other}'")),
    }
}

fn parse_compression(s: &str) -> std::result::Result<TiffCompression, String> {
    match s.to_lowercase().as_str() {
        "none" => Ok(TiffCompression::None),
        "zlib" | "deflate" => Ok(TiffCompression::Deflate),
        "jpeg" => Ok(TiffCompression::Jpeg),
        "ccitt-rle" => Ok(TiffCompression::CcittRle),
        "ccitt-t4" => Ok(TiffCompression::CcittT4),
        "ccitt-t6" => Ok(TiffCompression::CcittT6),
        other => Err(format!("unknown compression '{other}'")),
    }
}

fn parse_rect(s: &str) -> std::result::Result<Rect, String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| e.to_string())?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(Rect::new(*x0, *y0, *x1, *y1)),
        _ => Err("expected x0,y0,x1,y1".to_string()),
    }
}

#[cfg(feature = "mupdf")]
fn engine() -> Result<Arc<dyn NativeEngine>> {
    Ok(docraster::engine::MupdfEngine::shared())
}

#[cfg(not(feature = "mupdf"))]
fn engine() -> Result<Arc<dyn NativeEngine>> {
    bail!("docraster was built without the `mupdf` feature")
}

fn open(source: &SourceArgs, config: &Config) -> Result<DocumentSession> {
    let kind = source
        .file
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentKind::from_extension)
        .unwrap_or_default();

    let mut options = OpenOptions::new(kind)
        .memory_budget_mib(source.memory_mib.unwrap_or(config.session.memory_budget_mib));
    if let Some(password) = &source.password {
        options = options.password(password.clone());
    }

    let mut session = DocumentSession::open_path(engine()?, &source.file, &options)
        .with_context(|| format!("Failed to open {}", source.file.display()))?;
    session.set_anti_alias_level(config.session.anti_alias_level);
    Ok(session)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutlineItem {
    title: String,
    page: Option<u32>,
    depth: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    file: String,
    kind: DocumentKind,
    version: Option<String>,
    page_count: u32,
    pages: Vec<PageGeometry>,
    outline: Vec<OutlineItem>,
}

fn info(source: &SourceArgs, config: &Config) -> Result<()> {
    let session = open(source, config)?;

    let pages = (1..=session.page_count())
        .filter_map(|page| session.page_geometry(page))
        .collect();
    let outline = session
        .outline()
        .map(|outline| {
            outline
                .iter()
                .map(|(id, node)| OutlineItem {
                    title: node.title.clone(),
                    page: node.page,
                    depth: outline.depth(id),
                })
                .collect()
        })
        .unwrap_or_default();

    let response = InfoResponse {
        file: source.file.display().to_string(),
        kind: session.kind(),
        version: session.version().map(|v| v.to_string()),
        page_count: session.page_count(),
        pages,
        outline,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn format_for(path: &Path) -> Result<ExportFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ExportFormat::from_extension)
        .with_context(|| format!("Cannot tell the output format of {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
fn render(
    source: &SourceArgs,
    config: &Config,
    page: u32,
    zoom: Option<f32>,
    rotation: i32,
    color: ColorMode,
    crop: Option<Rect>,
    gamma: f32,
    output: &Path,
    quality: Option<i32>,
    compression: TiffCompression,
    append: bool,
    anti_alias: Option<i32>,
) -> Result<()> {
    let format = format_for(output)?;
    let Some(rotation) = Rotation::from_degrees(rotation) else {
        bail!("Rotation must be -1 or a multiple of 90, got {rotation}");
    };

    let mut exporter = RasterExporter::new(format)
        .compression(compression)
        .mode(if append {
            TiffWriteMode::Append
        } else {
            TiffWriteMode::Discard
        });
    let quality = quality.or((format == ExportFormat::Jpeg).then_some(config.render.jpeg_quality));
    if let Some(quality) = quality {
        exporter = exporter.quality(quality);
    }
    exporter.resolve(color)?;

    let mut session = open(source, config)?;
    if let Some(level) = anti_alias {
        session.set_anti_alias_level(level);
    }

    let mut spec = RenderSpec::new(zoom.unwrap_or(config.render.zoom), rotation, color).with_gamma(gamma);
    if let Some(crop) = crop {
        spec = spec.with_crop(crop);
    }

    let mut renderer = PageRenderer::new(&session, page, spec);
    let buffer = renderer
        .render(crop.is_some())
        .with_context(|| format!("Failed to render page {page}"))?;
    exporter
        .save(buffer, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!("Page {} written to {}", page, output.display());
    drop(renderer);
    session.close();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn tiles(
    source: &SourceArgs,
    config: &Config,
    page: u32,
    zoom: Option<f32>,
    color: ColorMode,
    tile_width: Option<u32>,
    tile_height: Option<u32>,
    output_dir: &Path,
) -> Result<()> {
    let exporter = RasterExporter::new(ExportFormat::Png);
    exporter.resolve(color)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let session = open(source, config)?;
    let mut cache = TileCache::build(
        &session,
        page,
        color,
        Rotation::Auto,
        zoom.unwrap_or(config.render.zoom),
        tile_width.unwrap_or(config.render.tile_width),
        tile_height.unwrap_or(config.render.tile_height),
    )
    .with_context(|| format!("Failed to lay out tiles for page {page}"))?;

    tracing::info!(
        "Page {} is {}x{} px: {} rows x {} columns",
        page,
        cache.grid().full_width(),
        cache.grid().full_height(),
        cache.grid().rows(),
        cache.grid().columns()
    );

    for tile in cache.tiles_mut() {
        let rect = *tile.rect();
        let path = output_dir.join(format!("page{}_r{}_c{}.png", page, rect.row, rect.column));
        let buffer = tile
            .render()
            .with_context(|| format!("Failed to render tile {},{}", rect.row, rect.column))?;
        exporter.save(buffer, &path)?;
        tile.dispose();
    }

    cache.dispose();
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docraster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let cli = Cli::parse();
    match cli.command {
        Command::Info { source } => info(&source, &config),
        Command::Render {
            source,
            page,
            zoom,
            rotation,
            color,
            crop,
            gamma,
            output,
            quality,
            compression,
            append,
            anti_alias,
        } => render(
            &source,
            &config,
            page,
            zoom,
            rotation,
            color,
            crop,
            gamma,
            &output,
            quality,
            compression,
            append,
            anti_alias,
        ),
        Command::Tiles {
            source,
            page,
            zoom,
            color,
            tile_width,
            tile_height,
            output_dir,
        } => tiles(
            &source,
            &config,
            page,
            zoom,
            color,
            tile_width,
            tile_height,
            &output_dir,
        ),
    }
}
