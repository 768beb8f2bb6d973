use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use codetrack::config::Config;
use codetrack::lcbot::commands::{Commands, OK_REACTION};
use codetrack::lcdb::problems::{AttemptDraft, ProblemPatch};
use codetrack::lcdb::settings::SettingsPatch;
use codetrack::lcdb::Store;
use codetrack::metrics;
use codetrack::models::{Difficulty, ProfileStats, ReminderKind, Status};
use codetrack::sheets::SheetCatalog;
use codetrack::suggest;

fn config(dir: &TempDir) -> Config {
    let db = dir.path().join("codetrack.db");
    let db = db.to_string_lossy().into_owned();
    Config::from_lookup(|key| match key {
        "CODETRACK_DB" => Some(db.clone()),
        "CODETRACK_SEED_SHEET" => Some(String::new()),
        _ => None,
    })
    .unwrap()
}

fn tagged(title: &str, tags: &[&str]) -> ProblemPatch {
    ProblemPatch {
        title: Some(title.to_string()),
        tags: Some(tags.iter().map(|t| t.to_string()).collect()),
        ..Default::default()
    }
}

#[test]
fn solved_attempt_updates_problem_and_activity() {
    let now = Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap();
    let mut store = Store::open_in_memory().unwrap();
    let id = store
        .add_problem("Two Sum", Difficulty::Easy, ProblemPatch::default(), now)
        .unwrap();

    let draft = AttemptDraft {
        duration: 20,
        solved: true,
        language: String::from("rust"),
        notes: String::new(),
    };
    let problem = store.log_attempt(&id, draft, now).unwrap();
    assert_eq!(problem.status, Status::Solved);
    assert_eq!(problem.best_time, Some(20));
    assert_eq!(problem.attempts.len(), 1);
    assert_eq!(store.data().activity_on(now.date_naive()), 1);
}

#[test]
fn weakest_topic_problems_are_suggested_first() {
    let now = Utc::now();
    let mut store = Store::open_in_memory().unwrap();

    // arrays: 3 of 10 solved, graphs: 1 of 1 solved
    for i in 0..10 {
        let status = if i < 3 { Status::Solved } else { Status::NotStarted };
        let patch = ProblemPatch { status: Some(status), ..tagged(&format!("Array {i}"), &["arrays"]) };
        store.add_problem(&format!("Array {i}"), Difficulty::Medium, patch, now).unwrap();
    }
    let graphs = ProblemPatch { status: Some(Status::Solved), ..tagged("Graph", &["graphs"]) };
    store.add_problem("Graph", Difficulty::Hard, graphs, now).unwrap();
    store
        .add_problem("Untagged", Difficulty::Easy, ProblemPatch::default(), now)
        .unwrap();

    let ratios = metrics::topic_ratios(&store.data().problems);
    assert!((ratios["arrays"] - 0.3).abs() < 1e-9);

    let ranked = suggest::suggest(&store.data().problems);
    assert_eq!(ranked.len(), suggest::MAX_SUGGESTIONS);
    assert!(ranked.iter().all(|s| s.problem.tags == ["arrays"]));
    assert!((ranked[0].score - 0.7).abs() < 1e-9);
}

#[test]
fn sheet_import_only_adds_missing_problems_once() {
    let now = Utc::now();
    let catalog = SheetCatalog::parse(
        r#"{"tiny": {"name": "Tiny", "icon": "🧪", "desc": "Five problems", "problems": [
            [1, "Two Sum", "two-sum", "easy", ["arrays"]],
            [20, "Valid Parentheses", "valid-parentheses", "easy", ["stack"]],
            [21, "Merge Two Sorted Lists", "merge-two-sorted-lists", "easy", ["linked lists"]],
            [70, "Climbing Stairs", "climbing-stairs", "easy", ["dp"]],
            [200, "Number of Islands", "number-of-islands", "medium", ["graphs"]]
        ]}}"#,
    )
    .unwrap();
    let sheet = catalog.get("tiny").unwrap();

    let mut store = Store::open_in_memory().unwrap();
    for (external_id, title) in [(1, "Two Sum"), (70, "Climbing Stairs")] {
        let patch = ProblemPatch { external_id: Some(external_id), ..Default::default() };
        store.add_problem(title, Difficulty::Easy, patch, now).unwrap();
    }

    let first = store.import_sheet("tiny", sheet, now).unwrap();
    assert_eq!((first.added, first.existing), (3, 2));
    assert_eq!(store.data().problems.len(), 5);

    let second = store.import_sheet("tiny", sheet, now).unwrap();
    assert_eq!(second.added, 0);
    assert!(second.already_imported);
    assert_eq!(store.data().problems.len(), 5);
}

#[test]
fn backup_of_empty_store_restores_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.json");

    let store = Store::open_in_memory().unwrap();
    store.export_to(&path).unwrap();

    let mut restored = Store::open_in_memory().unwrap();
    restored.import_from(&path).unwrap();
    assert_eq!(restored.data(), store.data());
    assert!(restored.data().problems.is_empty());

    assert!(restored.import_json("not json").is_err());
}

#[test]
fn backup_round_trip_keeps_every_record() {
    let now = Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap();
    let mut store = Store::open_in_memory().unwrap();
    store
        .import_json(
            r#"{"reminders": [{
                "id": "r1",
                "type": "revision",
                "title": "Graphs",
                "scheduledAt": "2024-05-03T09:30",
                "repeat": "weekly",
                "isActive": true
            }]}"#,
        )
        .unwrap();

    let id = store
        .add_problem("Two Sum", Difficulty::Easy, tagged("Two Sum", &["arrays", "hash map"]), now)
        .unwrap();
    let draft = AttemptDraft {
        duration: 25,
        solved: true,
        language: String::from("rust"),
        notes: String::from("two passes"),
    };
    store.log_attempt(&id, draft, now).unwrap();
    store.set_confidence(&id, 4).unwrap();
    store.add_note("Sliding window", "grow right, shrink left", true, now).unwrap();
    store
        .update_settings(SettingsPatch {
            name: Some(String::from("Ada")),
            daily_goal: Some(5),
            interview_date: Some(NaiveDate::from_ymd_opt(2024, 6, 1)),
            ..Default::default()
        })
        .unwrap();
    let stats = ProfileStats { all: 120, easy: 60, medium: 50, hard: 10 };
    store.record_profile_sync("ada", stats.clone(), now).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.json");
    store.export_to(&path).unwrap();

    let mut restored = Store::open_in_memory().unwrap();
    restored.import_from(&path).unwrap();
    assert_eq!(restored.data(), store.data());

    let data = restored.data();
    assert_eq!(data.problems[0].attempts[0].notes, "two passes");
    assert_eq!(data.problems[0].best_time, Some(25));
    assert_eq!(data.reminders[0].kind, ReminderKind::Revision);
    assert_eq!(data.reminders[0].scheduled_at, Utc.with_ymd_and_hms(2024, 5, 3, 9, 30, 0).unwrap());
    assert!(data.notes[0].is_cheat_sheet);
    assert_eq!(data.settings.interview_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    assert_eq!(data.settings.lc_stats, Some(stats));
    assert_eq!(data.settings.lc_synced_at, Some(now));
    assert_eq!(data.activity_on(now.date_naive()), 1);
}

#[test]
fn writes_from_another_connection_are_picked_up() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.db");

    let mut bot = Store::open(&path).unwrap();
    let mut cli = Store::open(&path).unwrap();
    cli.add_problem("Coin Change", Difficulty::Medium, ProblemPatch::default(), Utc::now())
        .unwrap();

    assert!(bot.refresh_if_changed().unwrap());
    assert_eq!(bot.data().problems[0].title, "Coin Change");
    assert!(!bot.refresh_if_changed().unwrap());
}

#[tokio::test]
async fn commands_share_one_database_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let now = Utc::now();

    let writer = Commands::open(&config).unwrap();
    let reply = writer
        .run_command("add Two Sum | id=1 | difficulty=easy | tags=arrays, hash map", now)
        .await
        .unwrap();
    assert!(reply.contains("Two Sum"));

    let reader = Commands::open(&config).unwrap();
    let list = reader.run_command("list", now).await.unwrap();
    assert!(list.contains("Two Sum"));

    let reply = reader.run_command("settings | goal=5", now).await.unwrap();
    assert!(reply.contains("Daily goal: 5"));
    assert!(reader.run_command("edit Two | status=solved", now).await.is_err());
    let reply = reader.run_command("edit #1 | status=solved", now).await.unwrap();
    assert_eq!(reply, OK_REACTION);
    let shown = writer.run_command("show #1", now).await.unwrap();
    assert!(shown.contains("Solved"));
    let settings = writer.run_command("settings", now).await.unwrap();
    assert!(settings.contains("Daily goal: 5"));
}
