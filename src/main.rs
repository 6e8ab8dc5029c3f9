use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pagewire::{config::SiteConfig, html, simulate, web_assets};

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Render a markdown file to a standalone HTML page
    Render {
        /// Path to the markdown file
        file: PathBuf,
        /// Site configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output directory; prints the page to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replay a reader script against a rendered page, printing one JSON
    /// snapshot per line
    Simulate {
        /// Path to the markdown file
        file: PathBuf,
        /// Reader script (JSON)
        #[arg(long)]
        script: PathBuf,
        /// Site configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(
    name = "pagewire",
    version,
    about = "Render markdown into interactive documentation pages",
    after_help = "INVOCATION FORMS:\n  pagewire render [--config FILE] [--out DIR] <file>\n  pagewire simulate --script FILE [--config FILE] <file>\n\nLOGGING:\n  PAGEWIRE_LOG=debug pagewire render guide.md"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    match cli.command {
        Commands::Render { file, config, out } => {
            let config = SiteConfig::load_or_default(config.as_deref())?;
            let (page, source_path) = render_file(&file, &config)?;
            let shell = html::build_page_shell(&page, &source_path, &config);
            match out {
                Some(dir) => write_site(&dir, &shell),
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(shell.as_bytes())?;
                    stdout.flush()?;
                    Ok(())
                }
            }
        }
        Commands::Simulate {
            file,
            script,
            config,
        } => {
            let config = SiteConfig::load_or_default(config.as_deref())?;
            let (page, _) = render_file(&file, &config)?;
            let raw = fs::read_to_string(&script)
                .with_context(|| format!("reading script {}", script.display()))?;
            let script = simulate::Script::parse(&raw)
                .with_context(|| format!("parsing script {}", script.display()))?;
            let snapshots = simulate::run(&page, &config, &script)?;
            let mut stdout = io::stdout().lock();
            for snapshot in &snapshots {
                serde_json::to_writer(&mut stdout, snapshot)?;
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Log to stderr, filtered by `PAGEWIRE_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("PAGEWIRE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Validate the extension, read, and render a markdown file.
fn render_file(path: &Path, config: &SiteConfig) -> Result<(html::RenderedPage, PathBuf)> {
    // Check the file extension before attempting to read.
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown" | "mdx" | "mdown" | "mkd" | "mkdn") => {}
        Some(ext) => bail!(
            "'{ext}' is not a recognized markdown extension.\n\
             Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn)."
        ),
        None => bail!(
            "'{}' has no file extension.\n\
             Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).",
            path.display()
        ),
    }

    let source = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => anyhow::anyhow!("file not found: {}", path.display()),
        io::ErrorKind::PermissionDenied => anyhow::anyhow!("permission denied: {}", path.display()),
        _ => anyhow::Error::new(e).context(format!("reading '{}'", path.display())),
    })?;
    let page = html::render_markdown(&source, path, config)
        .with_context(|| format!("rendering {}", path.display()))?;
    Ok((page, path.to_path_buf()))
}

/// Write `index.html` and the stylesheet under `dir`.
fn write_site(dir: &Path, shell: &str) -> Result<()> {
    let css_path = dir.join(web_assets::CSS_PATH);
    if let Some(parent) = css_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let index = dir.join("index.html");
    fs::write(&index, shell).with_context(|| format!("writing {}", index.display()))?;
    fs::write(&css_path, web_assets::CSS)
        .with_context(|| format!("writing {}", css_path.display()))?;
    tracing::info!(index = %index.display(), css = %css_path.display(), "site written");
    Ok(())
}
