//! CLI binary for mathscan.
//!
//! A thin shim over the library crate: recognise an exam document, apply
//! crop regions given on the command line, and deliver the reassembled
//! output to files or the system clipboard.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mathscan::{
    clipboard_payload, preview_text, recognize, write_payload, CropSession, ExamDocument,
    ResolvedCropMap, ScanConfig, SessionState,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a photographed exam, print the transcript
  mathscan exam.jpg

  # Recognise and write the preview (figures as data URIs) to a file
  mathscan exam.jpg -o exam.md

  # Crop the figure for marker 1 from page 1 and copy rich HTML
  mathscan exam.pdf --crop 1:120,340,280x190 --copy

  # Two markers, figures on different pages
  mathscan exam.pdf --crop 1:80,200,300x220 --crop 2:60,100,250x250 -o exam.md

  # Use a specific model
  mathscan --model gemini-2.5-pro --provider gemini exam.png

  # Recognise from a URL, JSON summary
  mathscan https://example.com/de-thi.pdf --json

CROP REGIONS:
  --crop PAGE:X,Y,WxH assigns a source region to the next unresolved figure
  marker, in marker order. Coordinates are pixels on the rendered page
  (PDF pages are rasterised at --render-scale, default 2.0). Markers
  without a --crop stay as bracketed placeholders in the output.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Google Gemini API key (preferred provider)
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  MATHSCAN_PROVIDER     Override provider (gemini, openai, anthropic, ollama)
  MATHSCAN_MODEL        Override model ID
  PDFIUM_LIB_PATH       Path to an existing libpdfium for PDF input

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Recognise:       mathscan exam.jpg -o exam.md
"#;

/// Digitise photographed math exams with figures intact.
#[derive(Parser, Debug)]
#[command(
    name = "mathscan",
    version,
    about = "Digitise photographed math exams with figures intact",
    long_about = "Recognise the text of a photographed or scanned math exam with a vision \
model, crop each referenced figure from the source page, and emit a paste-ready document \
with the figures embedded. Supports JPEG, PNG, WebP, and PDF input, local or by URL.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image/PDF path or HTTP/HTTPS URL.
    input: String,

    /// Write the Markdown preview to this file instead of stdout.
    #[arg(short, long, env = "MATHSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the rich clipboard HTML to this file.
    #[arg(long, env = "MATHSCAN_HTML_OUTPUT")]
    html_output: Option<PathBuf>,

    /// Copy the result (HTML + plain fallback) to the system clipboard.
    #[arg(long)]
    copy: bool,

    /// Crop region for the next unresolved marker: PAGE:X,Y,WxH (repeatable).
    #[arg(long = "crop", value_name = "PAGE:X,Y,WxH")]
    crops: Vec<String>,

    /// Vision model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "MATHSCAN_MODEL")]
    model: Option<String>,

    /// Vision provider: gemini, openai, anthropic, ollama.
    #[arg(
        long,
        env = "MATHSCAN_PROVIDER",
        long_help = "Vision provider. Auto-detected from API key env vars if not set;\n\
          GEMINI_API_KEY is preferred when several are present."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom recognition prompt.
    #[arg(long, env = "MATHSCAN_PROMPT")]
    prompt: Option<PathBuf>,

    /// PDF page rasterisation scale (1.0–4.0).
    #[arg(long, env = "MATHSCAN_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Max model output tokens.
    #[arg(long, env = "MATHSCAN_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "MATHSCAN_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries on a transient recognition failure.
    #[arg(long, env = "MATHSCAN_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Display width in pixels for embedded clipboard images.
    #[arg(long, env = "MATHSCAN_IMAGE_WIDTH", default_value_t = 300)]
    image_width: u32,

    /// HTTP download timeout in seconds for URL input.
    #[arg(long, env = "MATHSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output a structured JSON summary instead of the preview text.
    #[arg(long, env = "MATHSCAN_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MATHSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MATHSCAN_QUIET")]
    quiet: bool,
}

/// One `--crop` argument, parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CropArg {
    page: u32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Parse `PAGE:X,Y,WxH`, e.g. `1:120,340,280x190`.
fn parse_crop(s: &str) -> Result<CropArg> {
    let (page, rest) = s
        .split_once(':')
        .with_context(|| format!("Crop '{}' is missing the PAGE: prefix", s))?;
    let page: u32 = page
        .trim()
        .parse()
        .with_context(|| format!("Invalid page number in crop '{}'", s))?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    let parts: Vec<&str> = rest.split(',').collect();
    if parts.len() != 3 {
        anyhow::bail!("Crop '{}' must be PAGE:X,Y,WxH", s);
    }
    let x: f32 = parts[0]
        .trim()
        .parse()
        .with_context(|| format!("Invalid X in crop '{}'", s))?;
    let y: f32 = parts[1]
        .trim()
        .parse()
        .with_context(|| format!("Invalid Y in crop '{}'", s))?;
    let (w, h) = parts[2]
        .split_once('x')
        .with_context(|| format!("Crop '{}' size must be WxH", s))?;
    let width: f32 = w
        .trim()
        .parse()
        .with_context(|| format!("Invalid width in crop '{}'", s))?;
    let height: f32 = h
        .trim()
        .parse()
        .with_context(|| format!("Invalid height in crop '{}'", s))?;

    Ok(CropArg {
        page,
        x,
        y,
        width,
        height,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters during recognition;
    // library INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let crop_args: Vec<CropArg> = cli
        .crops
        .iter()
        .map(|s| parse_crop(s))
        .collect::<Result<Vec<_>>>()?;

    let config = build_config(&cli).await?;

    // ── Resolve input ────────────────────────────────────────────────────
    let document = ExamDocument::resolve(&cli.input, config.download_timeout_secs)
        .await
        .context("Failed to load input document")?;

    // ── Recognition ──────────────────────────────────────────────────────
    let spinner = if show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Recognising");
        bar.set_message(cli.input.clone());
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let recognition = recognize(&document, &config)
        .await
        .context("Recognition failed")?;

    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
        eprintln!(
            "{} {} characters recognised, {} figure markers",
            green("✔"),
            bold(&recognition.cleaned_text.len().to_string()),
            bold(&recognition.marker_count().to_string()),
        );
    }

    // ── Apply crop regions ───────────────────────────────────────────────
    let mut crops = ResolvedCropMap::new();
    if !crop_args.is_empty() {
        apply_crops(&document, &recognition.marker_positions, &mut crops, &config, &crop_args)
            .await?;
    }

    let resolved = crops.resolved_count();
    let unresolved = recognition.marker_count().saturating_sub(resolved);
    if show_progress && recognition.marker_count() > 0 {
        eprintln!(
            "{} {}/{} figures resolved{}",
            if unresolved == 0 { green("✔") } else { cyan("⚠") },
            resolved,
            recognition.marker_count(),
            if unresolved > 0 {
                dim(&format!("  ({unresolved} left as placeholders)"))
            } else {
                String::new()
            },
        );
    }

    // ── Reassemble and deliver ───────────────────────────────────────────
    let preview = preview_text(&recognition.cleaned_text, &crops);
    let payload = clipboard_payload(&recognition.cleaned_text, &crops, config.clipboard_image_width);

    if let Some(ref path) = cli.html_output {
        tokio::fs::write(path, &payload.html)
            .await
            .with_context(|| format!("Failed to write HTML to {:?}", path))?;
    }

    if cli.copy {
        write_payload(&payload).context("Clipboard write failed")?;
        if show_progress {
            eprintln!("{} Copied to clipboard", green("✔"));
        }
    }

    if cli.json {
        let summary = serde_json::json!({
            "input": cli.input,
            "kind": document.kind(),
            "characters": recognition.cleaned_text.len(),
            "markers": recognition.marker_count(),
            "resolved": resolved,
            "unresolved": unresolved,
            "text": recognition.cleaned_text,
            "preview": preview,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if let Some(ref path) = cli.output {
        tokio::fs::write(path, &preview)
            .await
            .with_context(|| format!("Failed to write output to {:?}", path))?;
        if show_progress {
            eprintln!("{} Wrote {}", green("✔"), bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(preview.as_bytes())
            .context("Failed to write to stdout")?;
        if !preview.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
async fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let prompt = if let Some(ref path) = cli.prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ScanConfig::builder()
        .render_scale(cli.render_scale)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .clipboard_image_width(cli.image_width)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = prompt {
        builder = builder.recognition_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// Walk the crop session once, feeding each `--crop` to the next marker.
async fn apply_crops(
    document: &ExamDocument,
    marker_positions: &[usize],
    crops: &mut ResolvedCropMap,
    config: &ScanConfig,
    args: &[CropArg],
) -> Result<()> {
    let marker_count = marker_positions.len();
    if args.len() > marker_count {
        anyhow::bail!(
            "{} crop regions given but the transcript has only {} figure markers",
            args.len(),
            marker_count
        );
    }

    let mut session = CropSession::new(document, marker_count, crops, config);
    session.start().await.context("Failed to open page source")?;

    for arg in args {
        let index = match session.state() {
            SessionState::Active(i) => i,
            _ => break,
        };

        if session.is_paged() {
            let current = session.page().map(|p| p.number).unwrap_or(1);
            let delta = i64::from(arg.page) - current as i64;
            session
                .change_page(delta)
                .await
                .with_context(|| format!("Failed to render page {}", arg.page))?;
            let now = session.page().map(|p| p.number).unwrap_or(1);
            if now != arg.page as usize {
                anyhow::bail!("Page {} is out of range (document has {} pages)", arg.page, now.max(current));
            }
        } else if arg.page != 1 {
            anyhow::bail!("Image input has a single page; crop requested page {}", arg.page);
        }

        session.pointer_down(arg.x, arg.y);
        session.pointer_move(arg.x + arg.width, arg.y + arg.height);
        session.pointer_up();
        session
            .confirm_current()
            .await
            .with_context(|| format!("Crop for figure {} failed", index + 1))?;
    }

    session.close();
    Ok(())
}
