use crate::config::{config_path, AppConfig, FileConfig, StoreSettings};
use crate::db::{RedisStore, SqliteStore, StateStore};
use crate::logging::init_logging;
use crate::notifier::{LogNotifier, Notifier, SlackNotifier};
use crate::runner::{RunSettings, Runner};
use crate::scraper::SrealityScraper;
use std::process::ExitCode;
use tracing::{error, info};

mod config;
mod db;
mod domain;
mod errors;
mod logging;
mod notifier;
mod runner;
mod scraper;

#[cfg(test)]
mod tests;

const EXIT_STORE_FAILURE: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    // 1️⃣ Environment and config file
    let _ = dotenvy::dotenv();
    let path = config_path(std::env::args().nth(1));

    let file = match FileConfig::load(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {e}", path.display());
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    init_logging(&file.log_level);

    // 2️⃣ Resolve channels and credentials before touching the network
    let config = match file.resolve(|var| std::env::var(var).ok()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // 3️⃣ Run
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run(config: &AppConfig) -> Result<(), u8> {
    let mut store = open_store(config).map_err(|e| {
        error!(error = %e, "state store unavailable");
        EXIT_STORE_FAILURE
    })?;

    let source = SrealityScraper::new(config.request_timeout, config.page_size).map_err(|e| {
        error!(error = %e, "failed to build http client");
        EXIT_CONFIG_ERROR
    })?;

    let notifier: Box<dyn Notifier> = if config.dry_run {
        info!("dry run: notifications will only be logged");
        Box::new(LogNotifier)
    } else {
        Box::new(SlackNotifier::new(config.request_timeout).map_err(|e| {
            error!(error = %e, "failed to build notifier");
            EXIT_CONFIG_ERROR
        })?)
    };

    let settings = RunSettings {
        max_pages: config.max_pages,
        staleness_secs: config.staleness_secs,
    };
    let now = chrono::Utc::now().timestamp();

    Runner::new(store.as_mut(), &source, notifier.as_ref(), settings)
        .run(&config.groups, &config.removed_channel, now)
        .map(|_| ())
        .map_err(|e| {
            error!(error = %e, "run aborted: state store failure");
            EXIT_STORE_FAILURE
        })
}

fn open_store(config: &AppConfig) -> Result<Box<dyn StateStore>, errors::StoreError> {
    let store: Box<dyn StateStore> = match &config.store {
        StoreSettings::Sqlite { path } => Box::new(SqliteStore::open(path)?),
        StoreSettings::Redis { url, prefix } => {
            Box::new(RedisStore::connect(url, prefix, config.request_timeout)?)
        }
    };
    Ok(store)
}
