use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use cortex_errors::logging::{init_logging, LoggingConfig};
use cortex_errors::notification::NotificationRenderer;
use cortex_errors::ratelimit::{Clock, ManualClock};
use cortex_errors::{replay, ConsoleSurface, ErrorHandler, HandlerConfig};

#[derive(Parser, Debug)]
#[command(name = "cortex-errors")]
#[command(version)]
#[command(about = "Replay client errors through the classification and notification pipeline")]
struct Cli {
    /// Handler configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Route the simulated user starts on
    #[arg(long, default_value = "/", global = true)]
    route: String,

    /// Answer notification permission requests with "denied"
    #[arg(long, global = true)]
    deny_notifications: bool,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Replay a JSON Lines file of error events
    Replay {
        /// Events file
        file: PathBuf,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<HandlerConfig, cortex_errors::ConfigError> {
    match path {
        Some(path) => HandlerConfig::load(path),
        None => Ok(HandlerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(LoggingConfig::from_verbosity(cli.verbose));

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Replay { ref file } => {
            let events = match replay::read_events(file) {
                Ok(events) => events,
                Err(e) => {
                    eprintln!("Error: {}: {}", file.display(), e);
                    return Ok(ExitCode::FAILURE);
                }
            };

            let use_color = !cli.no_color && std::env::var("NO_COLOR").is_err();
            let surface = Arc::new(
                ConsoleSurface::new(NotificationRenderer::new().with_colors(use_color))
                    .with_notifications_allowed(!cli.deny_notifications)
                    .with_route(cli.route.clone()),
            );
            let clock = Arc::new(ManualClock::default());
            let handler = ErrorHandler::with_clock(surface, config, clock.clone());

            let summary = replay::run(&handler, &clock, clock.now(), events).await;

            println!();
            println!("Replayed {} events", summary.events);
            for (label, count) in &summary.outcomes {
                println!("  {:<24} {}", label, count);
            }
            println!();
            println!("Groups:");
            for group in handler.groups() {
                println!(
                    "  {:<32} count={} recent={}",
                    group.group_key,
                    group.count,
                    group.recent_len()
                );
            }

            Ok(ExitCode::SUCCESS)
        }
    }
}
