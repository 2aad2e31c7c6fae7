use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use tracklogger::clients::errors::Result;
use tracklogger::tracker::{
    DEFAULT_DEDUPE_WINDOW_MINUTES, DEFAULT_ENDPOINT_URL, DEFAULT_LOG_DIR,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_SECONDS,
};
use tracklogger::{ConfigBuilder, Tracker};

#[derive(Parser)]
#[command(name = "tracklogger")]
#[command(version, about = "Log now-playing tracks from an Icecast server", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Settings {
    /// Icecast JSON status endpoint
    #[arg(long, env = "TRACKLOGGER_URL", default_value = DEFAULT_ENDPOINT_URL, global = true)]
    url: String,

    /// Directory for daily log files
    #[arg(long, env = "TRACKLOGGER_LOG_DIR", default_value = DEFAULT_LOG_DIR, global = true)]
    log_dir: PathBuf,

    /// Minutes during which a repeated track is not logged again
    #[arg(long, env = "TRACKLOGGER_DEDUPE_WINDOW", default_value_t = DEFAULT_DEDUPE_WINDOW_MINUTES, global = true)]
    dedupe_window: i64,

    /// Status request attempts per tick
    #[arg(long, env = "TRACKLOGGER_RETRY_COUNT", default_value_t = DEFAULT_RETRY_COUNT, global = true)]
    retry_count: u32,

    /// Seconds between attempts
    #[arg(long, env = "TRACKLOGGER_RETRY_DELAY", default_value_t = DEFAULT_RETRY_DELAY_SECONDS, global = true)]
    retry_delay: u64,

    /// Seconds before a status request times out
    #[arg(long, env = "TRACKLOGGER_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECONDS, global = true)]
    timeout: u64,
}

impl Settings {
    fn into_builder(self) -> ConfigBuilder {
        ConfigBuilder::new()
            .endpoint_url(self.url)
            .log_dir(self.log_dir)
            .dedupe_window_minutes(self.dedupe_window)
            .retry_count(self.retry_count)
            .retry_delay_seconds(self.retry_delay)
            .request_timeout_seconds(self.timeout)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check the server once and exit (default, meant for cron)
    Run {},
    /// Keep checking the server every `interval` seconds until interrupted
    Watch {
        #[arg(long, default_value_t = 120)]
        interval: u64,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let tracker = Tracker::new(cli.settings.into_builder().build()?);
    tracker.init().await?;

    match cli.command.unwrap_or(Commands::Run {}) {
        Commands::Run {} => {
            tracker.tick().await;
        }
        Commands::Watch { interval } => {
            info!("Checking every {interval} seconds, press Ctrl-C to stop");
            tracker
                .watch(Duration::from_secs(interval), async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Cannot listen for Ctrl-C: {e}");
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }
    }
    Ok(())
}
