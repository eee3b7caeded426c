use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vodex_core::{
    load_vodex_config, DirStore, Exporter, HttpMediaLibrary, HttpTranscodeService, RunLock,
    RunReport, VodexConfig,
};

pub type Result<T> = std::result::Result<T, AppError>;

/// Exit statuses above this alias into signal space; anything larger reads
/// as "everything is broken" either way.
const MAX_ERROR_EXIT_STATUS: usize = 200;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vodex_core::ConfigError),
    #[error("export error: {0}")]
    Export(#[from] vodex_core::ExportError),
    #[error("library error: {0}")]
    Library(#[from] vodex_core::LibraryError),
    #[error("transcoder error: {0}")]
    Transcoder(#[from] vodex_core::TranscoderError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "VODEX export control interface", long_about = None)]
pub struct Cli {
    /// Path to vodex.toml
    #[arg(long, default_value = "configs/vodex.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert content missing from the converted store
    Convert(ConvertArgs),
    /// Report missing formats without acting on them
    Scan,
    /// Run basic integrity checks
    Health,
    /// Emit shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Maximum number of content ids to dispatch in one run
    #[arg(long, short = 'm', default_value_t = 1)]
    pub max: usize,
    /// Count would-be work without fetching, migrating, or submitting
    #[arg(long, short = 'd', default_value_t = false)]
    pub dry_run: bool,
    /// Log to stdout instead of the log file
    #[arg(long, short = 'n', default_value_t = false)]
    pub no_log: bool,
}

/// Runs one CLI invocation and returns the process exit status.
pub async fn run(cli: Cli) -> Result<i32> {
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "vodexctl", &mut io::stdout());
        return Ok(0);
    }

    let context = AppContext::load(&cli.config)?;
    match &cli.command {
        Commands::Convert(args) => {
            init_logging(args.no_log, Path::new(&context.config.run.logs_dir))?;
            context.convert(args, cli.format).await
        }
        Commands::Scan => {
            init_logging(true, Path::new("."))?;
            context.scan(cli.format).await
        }
        Commands::Health => {
            init_logging(true, Path::new("."))?;
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more health checks failed".to_string(),
                ));
            }
            Ok(0)
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}

fn init_logging(no_log: bool, logs_dir: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if no_log {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        std::fs::create_dir_all(logs_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs_dir.join("vodex.log"))?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .try_init();
    }
    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
pub struct AppContext {
    config: VodexConfig,
    config_path: PathBuf,
}

impl AppContext {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = load_vodex_config(config_path)?;
        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
        })
    }

    fn build_exporter(&self) -> Result<Exporter> {
        let scheme = &self.config.stores.url_scheme;
        let converted = Arc::new(DirStore::new(
            "converted",
            &self.config.stores.converted_root,
            scheme,
        ));
        let unconverted = Arc::new(DirStore::new(
            "unconverted",
            &self.config.stores.unconverted_root,
            scheme,
        ));
        let library = Arc::new(HttpMediaLibrary::new(
            &self.config.library.api_base,
            &self.config.library.downloader,
            &self.config.library.download_dir,
        )?);
        let transcoder = Arc::new(HttpTranscodeService::new(
            &self.config.transcoder.api_base,
            &self.config.transcoder.api_token_path,
        )?);
        Ok(Exporter::new(
            converted,
            unconverted,
            library,
            transcoder,
            self.config.downloadable_formats(),
        ))
    }

    async fn convert(&self, args: &ConvertArgs, format: OutputFormat) -> Result<i32> {
        // one reconciliation run at a time, host-wide
        let _lease = RunLock::acquire(
            &self.config.run.lock_path,
            Duration::from_secs(self.config.run.lock_timeout_secs),
        )
        .await?;

        let exporter = self.build_exporter()?;
        let report = exporter.convert_missing(args.max, args.dry_run).await?;

        if !report.errored.is_empty() {
            let message = format!(
                "Skipped {} content ids due to errors:\n{}",
                report.errored.len(),
                report.errored.join("\n")
            );
            warn!("{message}");
            // stdout as well, so a cron scheduler's notification path sees it
            println!("{message}");
        }
        render(&report, format)?;
        Ok(exit_status(&report))
    }

    async fn scan(&self, format: OutputFormat) -> Result<i32> {
        let exporter = self.build_exporter()?;
        let missing = exporter.missing().await?;
        let rows: Vec<ScanEntry> = missing
            .into_iter()
            .filter(|(_, formats)| !formats.is_empty())
            .map(|(content_id, formats)| ScanEntry {
                content_id,
                missing: formats.into_iter().collect(),
            })
            .collect();
        render(&ScanReport { rows }, format)?;
        Ok(0)
    }

    fn health_check(&self) -> Vec<HealthEntry> {
        vec![
            self.check_path("vodex.toml", &self.config_path),
            self.check_directory(
                "converted store",
                Path::new(&self.config.stores.converted_root),
            ),
            self.check_directory(
                "unconverted store",
                Path::new(&self.config.stores.unconverted_root),
            ),
            self.check_path("downloader", Path::new(&self.config.library.downloader)),
            self.check_path(
                "transcoder token",
                Path::new(&self.config.transcoder.api_token_path),
            ),
            self.check_directory("logs dir", Path::new(&self.config.run.logs_dir)),
        ]
    }

    fn check_path(&self, name: &str, path: &Path) -> HealthEntry {
        if path.exists() {
            HealthEntry::ok(name, format!("{}", path.display()))
        } else {
            HealthEntry::error(name, format!("{path} missing", path = path.display()))
        }
    }

    fn check_directory(&self, name: &str, path: &Path) -> HealthEntry {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
            Ok(_) => HealthEntry::warn(
                name,
                format!("{path} is not a directory", path = path.display()),
            ),
            Err(_) => HealthEntry::warn(name, format!("{path} missing", path = path.display())),
        }
    }
}

fn exit_status(report: &RunReport) -> i32 {
    report.errored.len().min(MAX_ERROR_EXIT_STATUS) as i32
}

impl DisplayFallback for RunReport {
    fn display(&self) -> String {
        let mut lines = vec![format!("Converted: {}", self.converted)];
        if self.errored.is_empty() {
            lines.push("Errors: none".to_string());
        } else {
            lines.push(format!("Errors: {}", self.errored.len()));
            for content_id in &self.errored {
                lines.push(format!("  - {content_id}"));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub rows: Vec<ScanEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScanEntry {
    pub content_id: String,
    pub missing: Vec<String>,
}

impl DisplayFallback for ScanReport {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No missing formats".to_string();
        }
        let mut lines = Vec::new();
        for entry in &self.rows {
            lines.push(format!(
                "{} | missing={}",
                entry.content_id,
                entry.missing.join(",")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for entry in self {
            lines.push(format!(
                "[{status}] {name}: {detail}",
                status = entry.status,
                name = entry.name,
                detail = entry.detail
            ));
        }
        lines.join("\n")
    }
}
