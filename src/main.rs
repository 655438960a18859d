use clap::{Parser, Subcommand};
use matrixgpt::config::Config;
use matrixgpt::{logging, runtime};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LONG_ABOUT: &str = concat!(
    "\x1b[1mmatrixgpt v",
    env!("CARGO_PKG_VERSION"),
    "\x1b[22m\n",
    "Replies to Matrix room messages with a chat model.\n",
    "\n",
    "\x1b[1mQuick Start:\x1b[22m\n",
    "  1) write matrixgpt.config.yaml (homeserver_url, access_token, api_key)\n",
    "  2) matrixgpt start",
);

#[derive(Debug, Parser)]
#[command(
    name = "matrixgpt",
    version = VERSION,
    about = LONG_ABOUT
)]
struct Cli {
    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Connect to the homeserver and start replying (default)
    Start,
    /// Show version
    Version,
}

fn print_version() {
    println!("matrixgpt {VERSION}");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(MainCommand::Start) | None => {}
        Some(MainCommand::Version) => {
            print_version();
            return Ok(());
        }
    }

    let config = Config::load()?;

    let _log_guard = if config.log_to_file {
        Some(logging::init_file_logging(
            &config.file_log_settings(),
            &config.log_level,
        )?)
    } else {
        logging::init_console_logging(&config.log_level);
        None
    };
    info!("Starting matrixgpt {VERSION}...");

    runtime::run(config).await
}
