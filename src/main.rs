// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use pagetrans::app_config::{self, Config, TranslationProvider};
use pagetrans::database::{DatabaseConnection, Repository};
use pagetrans::extraction::extract_units;
use pagetrans::jobs::{JobPayload, JobReport, JobService};
use pagetrans::providers::client_from_config;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Anthropic,
    Ollama,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the units of an HTML page and translate them
    Translate(TranslateArgs),

    /// Generate shell completions for pagetrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Sanitized HTML file holding the page content
    #[arg(value_name = "HTML_FILE")]
    html_file: PathBuf,

    /// Page title, translated as unit 0
    #[arg(long)]
    title: String,

    /// Page slug under which source texts are stored
    #[arg(long)]
    page: String,

    /// User the job runs for
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Target language code (e.g., 'ja', 'fr', 'pt-BR')
    #[arg(short, long)]
    target_language: String,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Write the page HTML with unit numbers to this file
    #[arg(long, value_name = "PATH")]
    numbered_output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// pagetrans - incremental page translation with AI
///
/// Extracts numbered units from an HTML page and translates them chunk by
/// chunk, keeping every translated unit so that a later run only does the
/// work that is left.
#[derive(Parser, Debug)]
#[command(name = "pagetrans")]
#[command(version)]
#[command(about = "Incremental AI translation of HTML pages")]
#[command(long_about = "pagetrans extracts numbered units from an HTML page and translates them with an AI provider.

EXAMPLES:
    pagetrans translate page.html --title \"Test Page\" --page intro -t ja
    pagetrans translate page.html --title Doc --page doc -t fr -p ollama -m llama3.2
    pagetrans completions bash > pagetrans.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file doesn't
    exist, a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());

            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                color,
                now,
                tag,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The max level is lowered again once the config is known
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "pagetrans", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
    }
}

fn load_config(options: &TranslateArgs) -> Result<Config> {
    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &options.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config = load_config(&options)?;
    log::set_max_level(config.log_level.to_level_filter());

    let html = std::fs::read_to_string(&options.html_file)
        .with_context(|| format!("Failed to read HTML file: {}", options.html_file.display()))?;
    let document = extract_units(&html, &options.title)?;
    info!(
        "Extracted {} units from {}",
        document.units.len(),
        options.html_file.display()
    );

    if let Some(path) = &options.numbered_output {
        std::fs::write(path, &document.numbered_html)
            .with_context(|| format!("Failed to write numbered HTML: {}", path.display()))?;
    }

    let repository = Repository::new(DatabaseConnection::from_config(&config.database)?);
    let abandoned = repository.mark_abandoned_jobs().await?;
    if abandoned > 0 {
        warn!("{} jobs from an earlier run were left unfinished", abandoned);
    }
    let page_id = repository.get_or_create_page(&options.page).await?;

    let client = client_from_config(&config.translation)?;
    let service = JobService::new(Arc::new(repository), client, &config.jobs);
    let mut events = service.subscribe();

    let payload = JobPayload {
        user_id: options.user.clone(),
        page_id,
        target_language: options.target_language.clone(),
        title: options.title.clone(),
        numbered_content: document.numbered_html,
        numbered_elements: document.units,
        ai_model: config.translation.get_model(),
        api_key: String::new(),
    };
    let job_id = service.enqueue(&options.user, payload).await?;

    let progress_bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("=>-"));
    progress_bar.set_message("Translating");

    let report = follow_job(&mut events, &job_id, &progress_bar).await;
    progress_bar.finish_and_clear();
    service.shutdown().await;

    let report = report.ok_or_else(|| anyhow!("Lost track of job {}", job_id))?;
    info!(
        "Job {}: {} ({} translated, {} reused, {} of {} chunks failed)",
        report.job_id,
        report.status,
        report.translated,
        report.reused,
        report.chunks_failed,
        report.chunks_total
    );

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow!(
            "Job {} failed at {:.0}%: {} (untranslated units: {:?})",
            report.job_id,
            report.progress,
            report.error.as_deref().unwrap_or("unknown error"),
            report.remaining
        ))
    }
}

async fn follow_job(
    events: &mut tokio::sync::broadcast::Receiver<pagetrans::JobEvent>,
    job_id: &str,
    progress_bar: &ProgressBar,
) -> Option<JobReport> {
    loop {
        match events.recv().await {
            Ok(event) if event.job_id == job_id => {
                progress_bar.set_position(event.progress.round() as u64);
                if event.is_terminal() {
                    return event.report;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Progress display skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
