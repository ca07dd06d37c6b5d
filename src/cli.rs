use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bulk Reminders - write many calendar events as text, submit them in one go, undo the batch
#[derive(Debug, Parser)]
#[command(name = "bulk-reminders")]
#[command(about = "Bulk-author Google Calendar events from plain text, with undo", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List calendars you can write to
    Calendars,

    /// Parse event text and show what would be submitted
    Parse {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Parse event text and create every event as one undoable stage
    Submit {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Target calendar (defaults to default_calendar from config)
        #[arg(short, long)]
        calendar: Option<String>,
    },

    /// Delete the events of the newest stage
    Undo,

    /// Show ready, undoable and foreign counts for a calendar
    Status {
        /// Calendar to inspect (defaults to default_calendar from config)
        #[arg(short, long)]
        calendar: Option<String>,
    },

    /// List recorded stages, newest first
    History,

    /// Type event lines interactively and submit them
    #[command(alias = "edit")]
    Compose {
        /// Target calendar (defaults to default_calendar from config)
        #[arg(short, long)]
        calendar: Option<String>,
    },
}
