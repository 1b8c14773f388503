use anyhow::Result;
use clap::Parser;
use sentinel_watcher::app;
use sentinel_watcher::config::Timings;
use sentinel_watcher::config::WatcherArgs;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let args = WatcherArgs::parse();
    logging::init(args.severity());

    tracing::info!("Starting sentinel watcher {}", version::VERSION);

    app::run(args, Timings::default()).await
}
