use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pixie::bridge::telegram::TelegramBridge;
use pixie::bridge::BridgeRunner;
use pixie::config::Config;
use pixie::error::Result;
use pixie::interfaces::status::TracingStatusSink;

#[derive(Parser, Debug)]
#[command(name = "pixie-telegram")]
#[command(about = "Pixie Telegram bridge")]
struct Cli {
    /// Path to the .env file holding the bot token and API keys.
    #[arg(long, env = "PIXIE_ENV_FILE")]
    env: Option<PathBuf>,

    #[arg(long, env = "PIXIE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Telegram Bot API base, for self-hosted servers.
    #[arg(long, default_value = pixie::bridge::telegram::DEFAULT_TELEGRAM_API)]
    api_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    pixie::logging::init_tracing("pixie_telegram");
    let cli = Cli::parse();
    let env_path = cli
        .env
        .unwrap_or_else(pixie::runtime_paths::default_env_path);
    let config = Config::from_env_file(&env_path)?.with_data_dir(cli.data_dir);

    let assistant = Arc::new(pixie::factory::build_assistant(
        &config,
        Arc::new(TracingStatusSink),
    )?);
    let bridge = TelegramBridge::new(&config.telegram, config.telegram_state_path(), assistant)?
        .with_api_base(cli.api_base);

    let mut runner = BridgeRunner::start(Arc::new(bridge));
    tokio::signal::ctrl_c().await?;
    runner.stop().await
}
