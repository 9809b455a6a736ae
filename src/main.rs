//! lesson-forge – render bilingual glossary lessons to PDF.
//!
//! Usage:
//!   lesson-forge render <payload.json> [-o out.pdf] [--layout two-column]
//!                       [--font-tier large] [--font "Noto Sans Devanagari=/path/font.ttf"]... [--markup]
//!   lesson-forge serve [--addr 0.0.0.0:8080]
//!
//! If `-o` is omitted the output is written next to the payload with the same
//! stem (`lesson.json` → `lesson.pdf`, or `lesson.html` with `--markup`).
//! Defaults come from the `LESSON_FORGE_*` environment variables.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lesson_forge::config::ServiceConfig;
use lesson_forge::engine::FontSource;
use lesson_forge::layout_config::{FontTier, LayoutPreset};
use lesson_forge::model::LessonRequest;
use lesson_forge::pipeline::{prepare_with, PdfService};
use lesson_forge::server;

#[derive(Debug, Parser)]
#[command(name = "lesson-forge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a JSON lesson payload to PDF.
    Render {
        /// Payload file: {"title": …, "cards": [{"title": …, "description": …}]}
        payload: PathBuf,

        /// Output file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Layout preset; overrides the payload's own `layout`.
        #[arg(long, env = "LESSON_FORGE_LAYOUT")]
        layout: Option<LayoutPreset>,

        /// Type size tier (compact, regular, large) instead of the preset's own.
        #[arg(long, env = "LESSON_FORGE_FONT_TIER")]
        font_tier: Option<FontTier>,

        /// Font file to load, as `family=path`. Repeatable.
        #[arg(long = "font", value_name = "FAMILY=PATH")]
        fonts: Vec<FontSource>,

        /// Write the print markup instead of a PDF.
        #[arg(long)]
        markup: bool,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "LESSON_FORGE_ADDR")]
        addr: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Render {
            payload,
            output,
            layout,
            font_tier,
            fonts,
            markup,
        } => render(payload, output, layout, font_tier, fonts, markup).await,
        Command::Serve { addr } => serve(addr).await,
    }
}

async fn render(
    payload: PathBuf,
    output: Option<PathBuf>,
    layout: Option<LayoutPreset>,
    font_tier: Option<FontTier>,
    fonts: Vec<FontSource>,
    markup: bool,
) -> Result<()> {
    let body = fs::read(&payload)
        .with_context(|| format!("cannot read payload '{}'", payload.display()))?;
    let mut request = LessonRequest::from_json(&body)?;
    if layout.is_some() {
        request.layout = layout;
    }

    let mut config = ServiceConfig::from_env()?;
    if !fonts.is_empty() {
        config.fonts.extend(fonts);
    }
    if let Some(tier) = font_tier {
        config = config.with_font_tier(tier);
    }

    let extension = if markup { "html" } else { "pdf" };
    let output = output.unwrap_or_else(|| payload.with_extension(extension));

    if markup {
        let html = prepare_with(&request, config.layout, config.font_tier)?.markup;
        fs::write(&output, html)
            .with_context(|| format!("cannot write markup '{}'", output.display()))?;
    } else {
        let service = PdfService::from_config(&config);
        let pdf = service.generate(&request).await?;
        fs::write(&output, &pdf.bytes)
            .with_context(|| format!("cannot write PDF '{}'", output.display()))?;
        service.manager().shutdown().await;
    }

    println!("Written: {}", output.display());
    Ok(())
}

async fn serve(addr: Option<SocketAddr>) -> Result<()> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(addr) = addr {
        config.addr = addr;
    }
    let service = Arc::new(PdfService::from_config(&config));
    let app = server::router(Arc::clone(&service), config.max_body_bytes);
    server::serve(config.addr, app)
        .await
        .with_context(|| format!("server on {} failed", config.addr))
}
