//! sitelens - analyze construction site media and export material quotations
//!
//! Uses XDG Base Directory specification for file locations:
//! - History: $XDG_DATA_HOME/sitelens/history.db (~/.local/share/sitelens/history.db)
//! - Logs: $XDG_STATE_HOME/sitelens/ (~/.local/state/sitelens/)
//! - Config: $XDG_CONFIG_HOME/sitelens/config.toml (~/.config/sitelens/config.toml)

mod analyze;
mod chat;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitelens_core::format::{format_relative_time, preview};
use sitelens_core::{
    Config, Database, HttpMediaService, QuotationResult, ReportExporter, SessionManager,
};

#[derive(Parser)]
#[command(name = "sitelens")]
#[command(about = "Analyze construction site media and export material quotations")]
#[command(version)]
struct Cli {
    /// Log at debug level regardless of `[logging] level`
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a video or image and run the full analysis pipeline
    Analyze {
        /// Media file (mp4, avi, mov, wmv, jpeg, jpg, png, gif)
        file: PathBuf,
    },

    /// Upload a video or image and chat about it interactively
    Chat {
        /// Media file (mp4, avi, mov, wmv, jpeg, jpg, png, gif)
        file: PathBuf,
    },

    /// Render a quotation JSON file into a document
    Export {
        /// Quotation JSON (camelCase fields)
        quotation: PathBuf,

        /// Output directory (defaults to [export] output_dir, then Downloads)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List past analyses, newest first
    History {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    let _log_guard =
        sitelens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("sitelens starting");

    match cli.command {
        Command::Analyze { file } => analyze::run(&config, &file),
        Command::Chat { file } => chat::run(&config, &file),
        Command::Export { quotation, out } => run_export(&config, &quotation, out),
        Command::History { limit } => run_history(limit),
    }
}

/// Session manager backed by the configured HTTP service
fn session_manager(config: &Config) -> Result<Arc<SessionManager>> {
    let service =
        HttpMediaService::new(&config.service).context("invalid [service] configuration")?;
    Ok(Arc::new(SessionManager::new(
        Arc::new(service),
        config.pipeline.request_policy(),
    )))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create async runtime")
}

fn open_history() -> Result<Database> {
    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open history database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

fn run_export(config: &Config, path: &Path, out: Option<PathBuf>) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let quotation: QuotationResult =
        serde_json::from_str(&json).context("failed to parse quotation JSON")?;

    let output_dir = out.unwrap_or_else(|| config.export.resolve_output_dir());
    let exporter = ReportExporter::new(output_dir);
    let file = exporter.export(&quotation).context("export failed")?;

    println!("Exported: {}", file.path.display());
    println!("Content type: {}", file.content_type);
    if file.fell_back {
        println!("Note: document rendering failed, wrote plain text instead");
    }
    Ok(())
}

fn run_history(limit: usize) -> Result<()> {
    let db = open_history()?;
    let analyses = db.list_analyses(limit)?;

    if analyses.is_empty() {
        println!("No analyses recorded yet.");
        println!("Run 'sitelens analyze <FILE>' to analyze a video or image.");
        return Ok(());
    }

    println!("{} of {} analyses:\n", analyses.len(), db.count_analyses()?);
    for analysis in &analyses {
        let first_line = analysis.result.lines().next().unwrap_or("");
        println!(
            "  {:>8}  {}  ({})",
            format_relative_time(analysis.timestamp),
            analysis.file_name,
            analysis.session_id
        );
        println!("            {}", preview(first_line, 70));
    }
    Ok(())
}
