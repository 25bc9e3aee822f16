use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use tarkov_presence::catalog;
use tarkov_presence::events::EventBus;
use tarkov_presence::presence::{DiscordPresence, PresenceManager};
use tarkov_presence::process::{ProcessProbe, SystemProbe, GAME_PROCESS};
use tarkov_presence::settings::load_settings;
use tarkov_presence::watcher::LogWatcher;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !settings.is_enabled {
        tracing::info!("Presence is disabled in settings, exiting");
        return ExitCode::SUCCESS;
    }

    let catalog = match catalog::load_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!("Map data unavailable, raids will show generic presence: {e}");
            catalog::MapCatalog::default()
        }
    };

    let bus = EventBus::new();

    let mut manager = PresenceManager::new(catalog);
    match DiscordPresence::connect().await {
        Ok(provider) => manager.add_provider(Box::new(provider)),
        Err(e) => {
            tracing::error!("Discord unavailable, running without presence output: {e}");
        }
    }
    let manager_task = tokio::spawn(manager.run(bus.subscribe()));

    let logs_dir = settings.logs_dir();
    let poll_interval = Duration::from_secs(settings.poll_interval_secs);
    let probe: Arc<dyn ProcessProbe> = Arc::new(SystemProbe);

    tracing::info!("Watching for game activity, press Ctrl-C to exit");

    // The watch loop ends when the game exits; keep restarting it so a
    // relaunched game gets a fresh session.
    loop {
        let watcher = LogWatcher::new(
            logs_dir.clone(),
            GAME_PROCESS,
            poll_interval,
            Arc::clone(&probe),
            bus.clone(),
        );

        let handle = match watcher.start() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to start log watch: {e}");
                return ExitCode::FAILURE;
            }
        };

        tokio::select! {
            () = handle.wait() => {
                tracing::debug!("Log watch loop ended, restarting");
                tokio::time::sleep(poll_interval).await;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for shutdown signal: {e}");
                }
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    drop(bus);
    let _ = manager_task.await;

    ExitCode::SUCCESS
}
