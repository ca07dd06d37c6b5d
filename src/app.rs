use crate::auth;
use crate::calendar::GoogleCalendar;
use crate::cli::Commands;
use crate::config::Config;
use crate::debounce::LiveParse;
use crate::event::Event;
use crate::history::HistoryStore;
use crate::parser::{self, ParseOutcome};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

const COMPOSE_HELP: &str = "Type one event per line: <summary> | <YYYY-MM-DD> [hh:mmAM] [<YYYY-MM-DD>] [hh:mmPM]\n\
Commands: :submit  :undo  :status  :clear  :quit";

pub struct Application {
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Calendars => self.list_calendars().await,
            Commands::Parse { file } => {
                let outcome = parser::parse(&read_input(file.as_deref())?);
                print_outcome(&outcome);
                Ok(())
            }
            Commands::Submit { file, calendar } => {
                let text = read_input(file.as_deref())?;
                self.submit(&text, calendar).await
            }
            Commands::Undo => self.undo().await,
            Commands::Status { calendar } => self.status(calendar).await,
            Commands::History => self.history(),
            Commands::Compose { calendar } => self.compose(calendar).await,
        }
    }

    fn calendar_or_default(&self, calendar: Option<String>) -> String {
        calendar.unwrap_or_else(|| self.config.calendar.default_calendar.clone())
    }

    fn load_history(&self) -> Result<HistoryStore> {
        let path = self.config.history_path()?;
        HistoryStore::load(&path)
            .with_context(|| format!("Failed to load submission history from {}", path.display()))
    }

    fn open_session(&self) -> Result<Session<GoogleCalendar>> {
        let token = auth::load_access_token(&self.config.token_path()?)?;
        let client = GoogleCalendar::new(&self.config.calendar.api_base, token)?;
        Ok(Session::new(client, self.load_history()?, self.config.calendar.max_results))
    }

    async fn list_calendars(&self) -> Result<()> {
        let session = self.open_session()?;
        for entry in session.list_calendars().await? {
            let marker = if entry.primary { "*" } else { " " };
            println!("{} {:<40} {}", marker, entry.id, entry.summary);
        }
        Ok(())
    }

    async fn submit(&self, text: &str, calendar: Option<String>) -> Result<()> {
        let outcome = parser::parse(text);
        print_outcome(&outcome);
        if let Some(reason) = &outcome.data_error {
            bail!("Nothing submitted, fix the input first: {}", reason);
        }
        if outcome.events.is_empty() {
            println!("Nothing to submit.");
            return Ok(());
        }

        let mut session = self.open_session()?;
        session.select_calendar(self.calendar_or_default(calendar)).await?;
        session.set_ready(outcome.events);
        submit_ready(&mut session).await?;
        session.refresh().await?;
        println!("{}", session.status());
        Ok(())
    }

    async fn undo(&self) -> Result<()> {
        let mut session = self.open_session()?;
        undo_newest(&mut session).await
    }

    async fn status(&self, calendar: Option<String>) -> Result<()> {
        let mut session = self.open_session()?;
        session.select_calendar(self.calendar_or_default(calendar)).await?;
        show_status(&session)
    }

    fn history(&self) -> Result<()> {
        let history = self.load_history()?;
        if history.is_empty() {
            println!("No stages recorded in {}", history.path().display());
            return Ok(());
        }
        for stage in history.stages() {
            println!("Stage {:<5} {:<40} {} events", stage.index, stage.common_calendar, stage.len());
        }
        println!("{} undoable events in total", history.total());
        Ok(())
    }

    async fn compose(&self, calendar: Option<String>) -> Result<()> {
        let mut session = self.open_session()?;
        session.select_calendar(self.calendar_or_default(calendar)).await?;

        let mut live =
            LiveParse::new(self.config.debounce()).on_parsed(|outcome| println!("{}", outcome.label()));
        let mut text = String::new();
        let mut rl = DefaultEditor::new()?;

        println!("Composing for {}", session.active_calendar().unwrap_or_default());
        println!("{}", COMPOSE_HELP);

        loop {
            match rl.readline("📅 ") {
                Ok(line) => {
                    if let Err(e) = rl.add_history_entry(line.as_str()) {
                        log::debug!("Could not record history entry: {}", e);
                    }
                    let result = match line.trim() {
                        ":quit" | ":q" => break,
                        ":help" => {
                            println!("{}", COMPOSE_HELP);
                            Ok(())
                        }
                        ":clear" => {
                            text.clear();
                            println!("{}", live.flush(&text).label());
                            Ok(())
                        }
                        ":status" => {
                            session.set_ready(live.flush(&text).events);
                            show_status(&session)
                        }
                        ":submit" => compose_submit(&mut session, &mut live, &mut text).await,
                        ":undo" => undo_newest(&mut session).await,
                        _ => {
                            text.push_str(&line);
                            text.push('\n');
                            live.edited(text.clone());
                            Ok(())
                        }
                    };
                    if let Err(err) = result {
                        log::error!("Failed to process command: {:?}", err);
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }

        if live.is_pending() {
            log::debug!("Discarding pending parse on exit");
        }
        Ok(())
    }
}

async fn compose_submit(
    session: &mut Session<GoogleCalendar>,
    live: &mut LiveParse,
    text: &mut String,
) -> Result<()> {
    let outcome = live.flush(text);
    println!("{}", outcome.label());
    if let Some(reason) = outcome.data_error {
        bail!("Nothing submitted, fix the input first: {}", reason);
    }

    session.set_ready(outcome.events);
    let result = submit_ready(session).await;
    // Whatever is still ready after a partial failure stays in the buffer
    *text = session.ready().iter().map(event_line).collect();
    result?;
    session.refresh().await?;
    println!("{}", session.status());
    Ok(())
}

fn show_status(session: &Session<GoogleCalendar>) -> Result<()> {
    print_rows(&session.rows()?);
    println!("{}", session.status());
    Ok(())
}

async fn submit_ready(session: &mut Session<GoogleCalendar>) -> Result<()> {
    let index = session.submit(report_progress("Created")).await;
    finish_progress();
    match index? {
        Some(index) => println!("Submitted as stage {}", index),
        None => println!("Nothing to submit."),
    }
    Ok(())
}

async fn undo_newest(session: &mut Session<GoogleCalendar>) -> Result<()> {
    let stage = session.undo(report_progress("Deleted")).await;
    finish_progress();
    let stage = stage?;
    println!(
        "Undid stage {}: deleted {} events from {}",
        stage.index,
        stage.len(),
        stage.common_calendar
    );
    Ok(())
}

fn report_progress(verb: &'static str) -> impl FnMut(usize, usize) {
    move |done, total| {
        print!("\r{} {}/{}", verb, done, total);
        if let Err(e) = io::stdout().flush() {
            log::debug!("Could not flush progress: {}", e);
        }
    }
}

fn finish_progress() {
    println!();
}

/// Render an event back into the line grammar the parser accepts
fn event_line(event: &Event) -> String {
    use crate::event::EventTime;

    let side = |time: EventTime| match time {
        EventTime::Date(date) => date.format("%Y-%m-%d").to_string(),
        EventTime::DateTime(dt) => dt.naive_local().format("%Y-%m-%d %I:%M%p").to_string(),
    };
    format!("{} | {} {}\n", event.summary(), side(event.start()), side(event.end()))
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn print_outcome(outcome: &ParseOutcome) {
    println!("{}", outcome.label());
    if let Some(reason) = &outcome.data_error {
        println!("  {}", reason);
    }
    for event in &outcome.events {
        println!("  {}", event);
    }
}

fn print_rows(rows: &[Event]) {
    for row in rows {
        println!("{}", row);
    }
}
