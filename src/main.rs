mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, Commands};
use tdmon::config::Config;
use tdmon::store::{IssueStore, JsonStore};
use tdmon::tui::app::AppOptions;
use tdmon::tui::run_tui;

fn main() -> Result<()> {
    better_panic::install();

    let cli = Cli::parse();
    let config = Config::load(cli.dir.clone())?;

    logging::rotate_log(&config);
    logging::setup_logging(&config)?;

    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        Some(Commands::Init) => {
            JsonStore::init(&config.data_dir)
                .with_context(|| format!("Failed to create database in {}", config.data_dir.display()))?;
            println!("tdmon database initialized at {}", config.data_dir.display());
            Ok(())
        }

        None => {
            let store = JsonStore::open(&config.data_dir).with_context(|| {
                format!(
                    "No issue database in {} (run `tdmon init` first)",
                    config.data_dir.display()
                )
            })?;
            let store: Arc<dyn IssueStore> = Arc::new(store);

            let session = cli.session.unwrap_or_else(new_session_id);
            let options = AppOptions {
                session,
                embedded: cli.embedded,
                refresh: Duration::from_secs(cli.refresh_secs.max(1)),
            };
            run_tui(config, store, options)
        }
    }
}

fn new_session_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("ses_{}", &id[..8])
}
