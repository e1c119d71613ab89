//! Timer sessions against the SQLite stores, including restarts.

use chrono::NaiveDate;
use timetrek_core::{
    Database, Event, NewProject, NewTask, TaskStatus, TimerSession, TimerStateStore, TimerStatus,
    WorkspaceBackend, WorkspaceDb, WorkspaceStore,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seed_task(store: &mut WorkspaceStore<&WorkspaceDb>, title: &str, estimate: u32) -> String {
    let project_id = match store.projects().first() {
        Some(p) => p.id.clone(),
        None => {
            store
                .add_project(NewProject {
                    name: "Website".into(),
                    description: String::new(),
                    color: "#3b82f6".into(),
                    start_date: date(2024, 1, 1),
                    end_date: date(2024, 12, 31),
                    created_by: "u1".into(),
                    members: vec!["u1".into()],
                })
                .unwrap()
                .id
        }
    };
    store
        .add_task(NewTask {
            title: title.into(),
            description: String::new(),
            project_id,
            user_id: "u1".into(),
            assigned_to: vec!["u1".into()],
            priority: Default::default(),
            status: TaskStatus::Todo,
            due_date: date(2024, 6, 1),
            time_estimate: estimate,
            time_spent: 0,
        })
        .unwrap()
        .id
}

fn ticks<S: timetrek_core::TimerStateStore>(session: &mut TimerSession<S>, n: u64) {
    for _ in 0..n {
        session.tick();
    }
}

#[test]
fn stop_commits_rounded_down_minutes_and_updates_progress() {
    let db = WorkspaceDb::open_memory().unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let task_id = seed_task(&mut store, "Landing page", 240);
    let mut session = TimerSession::new(Database::open_memory().unwrap());

    session.start_timer(&task_id, &mut store);
    ticks(&mut session, 125);
    assert_eq!(session.elapsed_time_display(), "00:02:05");
    let events = session.stop_timer(&mut store);

    assert!(matches!(
        events.as_slice(),
        [
            Event::TimerStopped { committed_minutes: 2, .. },
            Event::TimeCommitted { minutes: 2, time_spent: 2, .. },
        ]
    ));
    let task = store.get_task_by_id(&task_id).unwrap();
    assert_eq!(task.time_spent, 2);
    assert_eq!(task.progress_percent(), 1);
    assert_eq!(db.list_tasks().unwrap()[0].time_spent, 2);
    assert_eq!(session.engine().status(), TimerStatus::Idle);
}

#[test]
fn switching_tasks_commits_the_previous_one() {
    let db = WorkspaceDb::open_memory().unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let a = seed_task(&mut store, "A", 60);
    let b = seed_task(&mut store, "B", 60);
    let mut session = TimerSession::new(Database::open_memory().unwrap());

    session.start_timer(&a, &mut store);
    ticks(&mut session, 90);
    session.start_timer(&b, &mut store);

    assert_eq!(store.get_task_by_id(&a).unwrap().time_spent, 1);
    assert_eq!(session.engine().current_task_id(), Some(b.as_str()));
    assert_eq!(session.engine().elapsed_secs(), 0);
    assert!(session.engine().is_ticking());
}

#[test]
fn short_sessions_commit_one_minute_and_empty_ones_nothing() {
    let db = WorkspaceDb::open_memory().unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let a = seed_task(&mut store, "A", 60);
    let mut session = TimerSession::new(Database::open_memory().unwrap());

    session.start_timer(&a, &mut store);
    ticks(&mut session, 5);
    session.stop_timer(&mut store);
    assert_eq!(store.get_task_by_id(&a).unwrap().time_spent, 1);

    session.start_timer(&a, &mut store);
    let events = session.stop_timer(&mut store);
    assert_eq!(events.len(), 1);
    assert_eq!(store.get_task_by_id(&a).unwrap().time_spent, 1);
}

#[test]
fn session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetrek.db");
    let db = WorkspaceDb::open_path(&path).unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let task_id = seed_task(&mut store, "Report", 240);

    {
        let mut session = TimerSession::new(Database::open_path(&path).unwrap());
        session.start_timer(&task_id, &mut store);
        ticks(&mut session, 70);
        session.pause_timer();
    }

    let (mut session, restored) = TimerSession::restore(Database::open_path(&path).unwrap());
    assert!(matches!(
        restored,
        Some(Event::TimerRestored { elapsed_secs: 70, status: TimerStatus::Paused, .. })
    ));
    assert!(!session.engine().is_ticking());
    // Paused sessions ignore ticks.
    assert!(!session.tick());

    session.resume_timer();
    ticks(&mut session, 50);
    session.stop_timer(&mut store);
    assert_eq!(store.get_task_by_id(&task_id).unwrap().time_spent, 2);

    let (session, restored) = TimerSession::restore(Database::open_path(&path).unwrap());
    assert!(restored.is_none());
    assert_eq!(session.engine().status(), TimerStatus::Idle);
}

#[test]
fn deleted_task_does_not_break_stop() {
    let db = WorkspaceDb::open_memory().unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let a = seed_task(&mut store, "A", 60);
    let mut session = TimerSession::new(Database::open_memory().unwrap());

    session.start_timer(&a, &mut store);
    ticks(&mut session, 120);
    store.delete_task(&a).unwrap();

    let events = session.stop_timer(&mut store);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::TimerStopped { committed_minutes: 2, .. }));
    assert_eq!(session.engine().status(), TimerStatus::Idle);
    assert!(store.unsynced().is_empty());
}

#[test]
fn stop_from_another_process_ends_the_watching_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetrek.db");
    let db = WorkspaceDb::open_path(&path).unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let task_id = seed_task(&mut store, "Report", 240);

    let mut watcher = TimerSession::new(Database::open_path(&path).unwrap());
    watcher.start_timer(&task_id, &mut store);
    ticks(&mut watcher, 120);

    let (mut other, _) = TimerSession::restore(Database::open_path(&path).unwrap());
    other.stop_timer(&mut store);
    assert_eq!(store.get_task_by_id(&task_id).unwrap().time_spent, 2);
    assert_eq!(other.store().load_timer().unwrap(), None);

    // The watcher notices on its next tick and leaves the record alone.
    assert!(!watcher.tick());
    ticks(&mut watcher, 5);
    assert_eq!(watcher.engine().status(), TimerStatus::Idle);
    assert_eq!(watcher.store().load_timer().unwrap(), None);

    let (mut later, restored) = TimerSession::restore(Database::open_path(&path).unwrap());
    assert!(restored.is_none());
    assert!(later.stop_timer(&mut store).is_empty());
    assert_eq!(store.get_task_by_id(&task_id).unwrap().time_spent, 2);
    assert_eq!(db.list_tasks().unwrap()[0].time_spent, 2);
}

#[test]
fn pause_from_another_process_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetrek.db");
    let db = WorkspaceDb::open_path(&path).unwrap();
    let mut store = WorkspaceStore::load(&db, "ws").unwrap();
    let task_id = seed_task(&mut store, "Report", 240);

    let mut watcher = TimerSession::new(Database::open_path(&path).unwrap());
    watcher.start_timer(&task_id, &mut store);
    ticks(&mut watcher, 40);

    let (mut other, _) = TimerSession::restore(Database::open_path(&path).unwrap());
    other.pause_timer();

    assert!(!watcher.tick());
    assert_eq!(watcher.engine().status(), TimerStatus::Paused);
    let record = watcher.store().load_timer().unwrap().unwrap();
    assert!(record.is_paused);
    assert_eq!(record.elapsed_seconds, 40);
}
