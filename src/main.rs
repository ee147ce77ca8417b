use calendar_color_mcp::infrastructure::config::{AppConfig, ConfigOverrides};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// MCP server that reports time spent per Google Calendar event color.
#[derive(Debug, Parser)]
#[command(name = "calendar-color-mcp", version, about)]
struct Cli {
    /// JSON config file (`{"schema": 1, ...}`)
    #[arg(long, env = "CALENDAR_COLOR_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Where the OAuth token is stored
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Calendar to analyze (default: primary)
    #[arg(long)]
    calendar_id: Option<String>,

    /// Color name locale: en or ja
    #[arg(long)]
    locale: Option<String>,

    /// IANA timezone used to turn dates into day boundaries
    #[arg(long)]
    timezone: Option<String>,

    /// Log filter, e.g. `debug` or `calendar_color_mcp=trace`; overrides RUST_LOG
    #[arg(long, env = "CALENDAR_COLOR_MCP_LOG")]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            token_path: self.token_file.clone(),
            calendar_id: self.calendar_id.clone(),
            locale: self.locale.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

fn init_logging(level: Option<&str>) -> Result<(), String> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| format!("invalid log filter '{level}': {e}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| format!("failed to set up logging: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(message) = init_logging(cli.log_level.as_deref()) {
        eprintln!("{message}");
        return ExitCode::FAILURE;
    }

    let config = match AppConfig::load(&cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match calendar_color_mcp::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
