pub mod app;
pub mod auth;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod history;
pub mod parser;
pub mod reconcile;
pub mod session;

use anyhow::Result;
use log::*;
use std::io::Write;

pub async fn run(cli: cli::Cli) -> Result<()> {
    auth::load_env_file();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Initializing Bulk Reminders");
    app::Application::new(config).run(cli.command).await
}

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result as CoreResult};
pub use event::{Event, EventTime, Provenance};
pub use history::{HistoryStore, IdPair, Stage};
pub use parser::{parse, ParseOutcome};
pub use reconcile::Reconciliation;
pub use session::Session;
