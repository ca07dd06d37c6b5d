use async_trait::async_trait;
use bulk_reminders::calendar::{
    CalendarEntry, CalendarError, CalendarService, EventBody, RemoteEvent, TimePayload,
};
use bulk_reminders::{parse, Error, HistoryStore, IdPair, Session};
use chrono::{DateTime, NaiveDate, Utc};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

/// In-memory calendar that can be told to fail its Nth insert or delete
#[derive(Default)]
struct FakeCalendar {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    events: HashMap<String, Vec<RemoteEvent>>,
    created: usize,
    inserts: usize,
    deletes: usize,
    fail_insert_on: Option<usize>,
    fail_delete_on: Option<usize>,
    deleted: Vec<IdPair>,
}

impl FakeCalendar {
    fn failing_insert(call: usize) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().fail_insert_on = Some(call);
        fake
    }

    fn fail_delete_on(&self, call: usize) {
        let mut state = self.state.lock().unwrap();
        state.deletes = 0;
        state.fail_delete_on = Some(call);
    }

    fn seed(&self, calendar_id: &str, event_id: &str) {
        let day = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        self.state.lock().unwrap().events.entry(calendar_id.to_string()).or_default().push(
            RemoteEvent {
                id: event_id.to_string(),
                summary: Some("Someone else's".to_string()),
                description: None,
                start: TimePayload::Date { date: day },
                end: TimePayload::Date { date: day.succ_opt().unwrap() },
            },
        );
    }

    fn ids(&self, calendar_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .events
            .get(calendar_id)
            .map(|events| events.iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    fn deleted(&self) -> Vec<IdPair> {
        self.state.lock().unwrap().deleted.clone()
    }
}

fn refused() -> CalendarError {
    CalendarError::Status { status: 500, body: "backend error".to_string() }
}

#[async_trait]
impl CalendarService for FakeCalendar {
    async fn list_calendars(&self) -> Result<Vec<CalendarEntry>, CalendarError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .keys()
            .map(|id| CalendarEntry { id: id.clone(), summary: id.clone(), primary: id == "primary" })
            .collect())
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        _from: DateTime<Utc>,
        max_results: u32,
        _ordered_by_start: bool,
    ) -> Result<Vec<RemoteEvent>, CalendarError> {
        let state = self.state.lock().unwrap();
        let events = state.events.get(calendar_id).cloned().unwrap_or_default();
        Ok(events.into_iter().take(max_results as usize).collect())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<RemoteEvent, CalendarError> {
        let mut state = self.state.lock().unwrap();
        state.inserts += 1;
        if state.fail_insert_on == Some(state.inserts) {
            return Err(refused());
        }
        state.created += 1;
        let event = RemoteEvent {
            id: format!("evt-{}", state.created),
            summary: Some(body.summary.clone()),
            description: body.description.clone(),
            start: body.start,
            end: body.end,
        };
        state.events.entry(calendar_id.to_string()).or_default().push(event.clone());
        Ok(event)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;
        if state.fail_delete_on == Some(state.deletes) {
            return Err(refused());
        }
        if let Some(events) = state.events.get_mut(calendar_id) {
            events.retain(|e| e.id != event_id);
        }
        state.deleted.push(IdPair::new(calendar_id, event_id));
        Ok(())
    }
}

const FOUR_EVENTS: &str = "Standup | 2030-03-04 09:00AM 2030-03-04 09:15AM\n\
                           Dentist | 2030-03-05\n\
                           Offsite | 2030-03-10 2030-03-12\n\
                           Review | 2030-03-13 02:00PM 2030-03-13 03:00PM\n";

struct Fixture {
    _dir: TempDir,
    history_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let history_path = dir.path().join("data").join("history.json");
        Self { _dir: dir, history_path }
    }

    fn session(&self, calendar: FakeCalendar) -> Session<FakeCalendar> {
        let history = HistoryStore::load(&self.history_path).unwrap();
        Session::new(calendar, history, 2500)
    }

    fn reload(&self) -> HistoryStore {
        HistoryStore::load(&self.history_path).unwrap()
    }
}

fn no_progress(_: usize, _: usize) {}

#[tokio::test]
async fn test_submit_records_stage_and_persists() {
    let fixture = Fixture::new();
    let calendar = FakeCalendar::default();
    calendar.seed("primary", "foreign-1");
    let mut session = fixture.session(calendar);

    session.select_calendar("primary").await.unwrap();
    session.set_ready(parse(FOUR_EVENTS).events);
    assert_eq!(session.status().to_string(), "4 ready, 0 undoable, 1 foreign (5 total)");

    let mut reported = Vec::new();
    let index = session.submit(|done, total| reported.push((done, total))).await.unwrap();

    assert_eq!(index, Some(0));
    assert_eq!(reported, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert!(session.ready().is_empty());

    let stored = fixture.reload();
    assert_eq!(stored.stages().len(), 1);
    assert_eq!(stored.stages()[0].common_calendar, "primary");
    let ids: Vec<&str> = stored.stages()[0].events().iter().map(|p| p.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt-1", "evt-2", "evt-3", "evt-4"]);

    session.refresh().await.unwrap();
    let status = session.status();
    assert_eq!(status.undoable, 4);
    assert_eq!(status.undoable_in_view, 4);
    assert_eq!(status.foreign, vec![IdPair::new("primary", "foreign-1")]);
    assert_eq!(status.to_string(), "0 ready, 4 undoable, 1 foreign (5 total)");
}

#[tokio::test]
async fn test_second_submit_gets_next_index() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::default());
    session.select_calendar("primary").await.unwrap();

    session.set_ready(parse("One | 2030-01-01").events);
    assert_eq!(session.submit(no_progress).await.unwrap(), Some(0));
    session.set_ready(parse("Two | 2030-01-02").events);
    assert_eq!(session.submit(no_progress).await.unwrap(), Some(1));

    let indices: Vec<u64> = fixture.reload().stages().iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 0]);
}

#[tokio::test]
async fn test_submit_with_nothing_ready_is_noop() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::default());
    session.select_calendar("primary").await.unwrap();

    assert_eq!(session.submit(no_progress).await.unwrap(), None);
    assert!(session.history().is_empty());
    assert!(!fixture.history_path.exists());
}

#[tokio::test]
async fn test_submit_requires_calendar() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::default());
    session.set_ready(parse("One | 2030-01-01").events);

    assert!(matches!(session.submit(no_progress).await, Err(Error::NoActiveCalendar)));
    assert!(matches!(session.refresh().await, Err(Error::NoActiveCalendar)));
}

#[tokio::test]
async fn test_failed_submit_keeps_created_prefix() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::failing_insert(3));
    session.select_calendar("primary").await.unwrap();
    session.set_ready(parse(FOUR_EVENTS).events);

    let mut reported = Vec::new();
    let result = session.submit(|done, total| reported.push((done, total))).await;

    assert!(matches!(result, Err(Error::RemoteOperationFailed(_))));
    assert_eq!(reported, vec![(1, 4), (2, 4)]);

    let stored = fixture.reload();
    assert_eq!(stored.total(), 2);
    assert_eq!(
        stored.stages()[0].events(),
        &[IdPair::new("primary", "evt-1"), IdPair::new("primary", "evt-2")]
    );

    let remaining: Vec<&str> = session.ready().iter().map(|e| e.summary()).collect();
    assert_eq!(remaining, vec!["Offsite", "Review"]);
}

#[tokio::test]
async fn test_failed_first_insert_records_nothing() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::failing_insert(1));
    session.select_calendar("primary").await.unwrap();
    session.set_ready(parse(FOUR_EVENTS).events);

    assert!(session.submit(no_progress).await.is_err());
    assert!(session.history().is_empty());
    assert_eq!(session.ready().len(), 4);
}

#[tokio::test]
async fn test_undo_deletes_from_stage_calendar() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::default());
    session.select_calendar("work").await.unwrap();
    session.set_ready(parse("One | 2030-01-01\nTwo | 2030-01-02").events);
    session.submit(no_progress).await.unwrap();

    // Switching the view does not redirect the undo
    session.select_calendar("primary").await.unwrap();
    let mut reported = Vec::new();
    let stage = session.undo(|done, total| reported.push((done, total))).await.unwrap();

    assert_eq!(stage.index, 0);
    assert_eq!(reported, vec![(1, 2), (2, 2)]);
    assert_eq!(
        session.calendar().deleted(),
        vec![IdPair::new("work", "evt-1"), IdPair::new("work", "evt-2")]
    );
    assert!(session.calendar().ids("work").is_empty());
    assert!(fixture.reload().is_empty());
}

#[tokio::test]
async fn test_undo_with_empty_history() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::default());

    assert!(matches!(session.undo(no_progress).await, Err(Error::EmptyHistory)));
}

#[tokio::test]
async fn test_failed_undo_keeps_remainder_under_same_index() {
    let fixture = Fixture::new();
    let mut session = fixture.session(FakeCalendar::default());
    session.select_calendar("primary").await.unwrap();
    session.set_ready(parse("Old | 2030-01-01").events);
    session.submit(no_progress).await.unwrap();
    session.set_ready(parse(FOUR_EVENTS).events);
    session.submit(no_progress).await.unwrap();

    session.calendar().fail_delete_on(3);
    let result = session.undo(no_progress).await;
    assert!(matches!(result, Err(Error::RemoteOperationFailed(_))));

    let stored = fixture.reload();
    let indices: Vec<u64> = stored.stages().iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 0]);
    assert_eq!(
        stored.stages()[0].events(),
        &[IdPair::new("primary", "evt-4"), IdPair::new("primary", "evt-5")]
    );
    assert_eq!(session.calendar().ids("primary"), vec!["evt-1", "evt-4", "evt-5"]);

    // A retry picks up where the failed undo stopped
    let stage = session.undo(no_progress).await.unwrap();
    assert_eq!(stage.index, 1);
    assert_eq!(stage.len(), 2);
    assert_eq!(session.calendar().ids("primary"), vec!["evt-1"]);
    assert_eq!(fixture.reload().total(), 1);
}

#[tokio::test]
async fn test_rows_label_every_source() {
    let fixture = Fixture::new();
    let calendar = FakeCalendar::default();
    calendar.seed("primary", "mine-not");
    let mut session = fixture.session(calendar);
    session.select_calendar("primary").await.unwrap();
    session.set_ready(parse("Submitted | 2030-01-01").events);
    session.submit(no_progress).await.unwrap();
    session.refresh().await.unwrap();
    session.set_ready(parse("Pending | 2030-01-02").events);

    let labels: Vec<String> = session
        .rows()
        .unwrap()
        .iter()
        .map(|row| format!("{}:{}", row.summary(), row.provenance()))
        .collect();
    assert_eq!(
        labels,
        vec!["Pending:Ready", "Someone else's:Foreign", "Submitted:Stage 0"]
    );
}

#[tokio::test]
async fn test_list_calendars_passes_through() {
    let fixture = Fixture::new();
    let calendar = FakeCalendar::default();
    calendar.seed("primary", "a");
    let session = fixture.session(calendar);

    let calendars = session.list_calendars().await.unwrap();
    assert_eq!(calendars.len(), 1);
    assert!(calendars[0].primary);
}

#[tokio::test]
async fn test_failed_undo_on_gapped_history_keeps_remainder() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.history_path.parent().unwrap()).unwrap();
    std::fs::write(
        &fixture.history_path,
        r#"[
            {"index": 5, "commonCalendar": "primary",
             "events": [{"calendarID": "primary", "eventID": "a"},
                        {"calendarID": "primary", "eventID": "b"}]},
            {"index": 2, "commonCalendar": "primary",
             "events": [{"calendarID": "primary", "eventID": "c"}]}
        ]"#,
    )
    .unwrap();

    let calendar = FakeCalendar::default();
    calendar.fail_delete_on(2);
    let mut session = fixture.session(calendar);

    let result = session.undo(no_progress).await;
    assert!(matches!(result, Err(Error::RemoteOperationFailed(_))), "got {:?}", result.map(|s| s.index));

    let in_memory: Vec<u64> = session.history().stages().iter().map(|s| s.index).collect();
    assert_eq!(in_memory, vec![5, 2]);
    assert_eq!(session.history().total(), 2);

    let stored = fixture.reload();
    let on_disk: Vec<u64> = stored.stages().iter().map(|s| s.index).collect();
    assert_eq!(on_disk, vec![5, 2]);
    assert_eq!(stored.stages()[0].events(), &[IdPair::new("primary", "b")]);
    assert_eq!(session.calendar().deleted(), vec![IdPair::new("primary", "a")]);
}
