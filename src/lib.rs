pub mod api;
pub mod authorization;
pub mod autocomplete;
pub mod config;
pub mod credentials;
pub mod db;
pub mod examination; // Deadline evaluation
pub mod export; // xlsx reports
pub mod import; // Legacy spreadsheet and district loaders
pub mod models;
pub mod monitoring;
pub mod patients;
pub mod uploads;
pub mod validation;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
