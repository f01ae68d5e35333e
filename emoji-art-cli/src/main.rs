//! # EmojiArt
//!
//! Command-line entry point.

use clap::Parser;
use emoji_art_cli::{AppConfig, CliArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,emoji_art_cli=info,emoji_art_document=info,emoji_art_core=info")
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    // Use JSON format when RUST_LOG_FORMAT=json
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let command = args.command.clone();
    let config = AppConfig::from(args);
    tracing::debug!("Data directory: {}", config.data_dir.display());

    let mut stdout = std::io::stdout().lock();
    emoji_art_cli::run(&config, command, &mut stdout).await
}
