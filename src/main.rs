use anyhow::Result;
use bulk_reminders::cli::Cli;
use clap::Parser;
use log::error;

#[tokio::main]
async fn main() -> Result<()> {
    bulk_reminders::init_logger();
    let cli = Cli::parse();

    if let Err(err) = bulk_reminders::run(cli).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
