use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use inventory_search::{Cli, default_data_dir};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _guard = init_tracing(cli.command.is_interactive());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(inventory_search::run(cli))
}

/// Logs go to stderr, except in the interactive TUI where they go to a daily
/// file under the data dir.
fn init_tracing(interactive: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if interactive {
        let log_dir = default_data_dir().join("logs");
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let appender = tracing_appender::rolling::daily(log_dir, "invsearch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            return Some(guard);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    None
}
