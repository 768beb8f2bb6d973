//! Reminder scheduler: a once-a-minute tick that checks the snapshot and emits
//! notification intents. Delivery is up to whoever holds the receiver.

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;

use std::sync::Arc;

use crate::lcdb::Store;
use crate::models::{AppData, Reminder, Status};

pub const TICK: std::time::Duration = std::time::Duration::from_secs(60);

pub const DAILY_GOAL_HOUR: u32 = 20;
pub const PENDING_HOUR: u32 = 10;
pub const REVISION_HOUR: u32 = 9;
/// Solved problems untouched for longer than this are due for revision.
pub const REVISION_AFTER_DAYS: i64 = 7;

const APP_NAME: &str = "CodeTrack";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
}

impl NotificationIntent {
    fn new(title: impl std::fmt::Display, body: impl Into<String>) -> Self {
        Self { title: format!("{APP_NAME} | {title}"), body: body.into() }
    }
}

impl std::fmt::Display for NotificationIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "🔔 **{}**\n{}", self.title, self.body)
    }
}

fn at_start_of_hour<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> bool {
    now.hour() == hour && now.minute() < 1
}

fn daily_goal_intent(data: &AppData, today: chrono::NaiveDate) -> Option<NotificationIntent> {
    let count = data.activity_on(today);
    let goal = data.settings.daily_goal;
    (count < goal).then(|| {
        NotificationIntent::new("Daily Goal", format!("You've solved {count}/{goal} today. Keep going! 💪"))
    })
}

fn pending_intent(data: &AppData) -> Option<NotificationIntent> {
    let pending = data.problems.iter().filter(|p| p.status.is_pending()).count();
    (pending > 0).then(|| {
        NotificationIntent::new("Pending Problems", format!("You have {pending} unsolved problems waiting."))
    })
}

fn revision_intent(data: &AppData, now: DateTime<Utc>) -> Option<NotificationIntent> {
    let week_ago = now - Duration::days(REVISION_AFTER_DAYS);
    let due = data
        .problems
        .iter()
        .filter(|p| p.status == Status::Solved)
        .filter(|p| p.last_attempt().is_some_and(|a| a.date < week_ago))
        .count();

    (due > 0).then(|| {
        NotificationIntent::new("Time to Revise", format!("{due} problems need revision. 🧠"))
    })
}

/// Period after which a reminder comes around again, if it repeats.
fn repeat_period(repeat: &str) -> Option<Duration> {
    match repeat.trim().to_lowercase().as_str() {
        "daily" => Some(Duration::days(1)),
        "weekly" => Some(Duration::weeks(1)),
        _ => None,
    }
}

/// True when `now` is within a minute of the reminder time, or of one of its
/// repetitions after it.
pub fn reminder_due(reminder: &Reminder, now: DateTime<Utc>) -> bool {
    if !reminder.is_active {
        return false;
    }

    let window = TICK.as_secs() as i64;
    let elapsed = (now - reminder.scheduled_at).num_seconds();
    if elapsed.abs() < window {
        return true;
    }

    match repeat_period(&reminder.repeat) {
        Some(period) if elapsed > 0 => {
            let period = period.num_seconds();
            let offset = elapsed.rem_euclid(period);
            offset < window || period - offset < window
        }
        _ => false,
    }
}

/// Everything that should be announced at `now`.
///
/// Clock-based checks use `now`'s own zone; the activity day is UTC.
pub fn evaluate<Tz: TimeZone>(data: &AppData, now: &DateTime<Tz>) -> Vec<NotificationIntent> {
    let utc = now.with_timezone(&Utc);
    let mut intents = Vec::new();

    if at_start_of_hour(now, DAILY_GOAL_HOUR) {
        intents.extend(daily_goal_intent(data, utc.date_naive()));
    }
    if at_start_of_hour(now, PENDING_HOUR) {
        intents.extend(pending_intent(data));
    }
    if at_start_of_hour(now, REVISION_HOUR) {
        intents.extend(revision_intent(data, utc));
    }

    intents.extend(data.reminders.iter().filter(|r| reminder_due(r, utc)).map(|r| {
        let body = if r.description.is_empty() { "Reminder alert!" } else { r.description.as_str() };
        NotificationIntent::new(&r.title, body)
    }));

    intents
}

/// Ticks forever, sending intents to `tx`. Stops once the receiver is gone.
pub async fn run(store: Arc<Mutex<Store>>, tx: mpsc::Sender<NotificationIntent>) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    log::info!("[scheduler::run] reminder scheduler started");

    loop {
        ticker.tick().await;

        let intents = {
            let mut store = store.lock().await;
            if let Err(err) = store.refresh_if_changed() {
                log::warn!("[scheduler::run] could not refresh snapshot: {err:#}");
            }
            if !store.data().settings.notifications_enabled {
                continue;
            }
            evaluate(store.data(), &Local::now())
        };

        for intent in intents {
            log::info!("[scheduler::run] {}", intent.title);
            if tx.send(intent).await.is_err() {
                log::info!("[scheduler::run] receiver dropped, stopping");
                return;
            }
        }
    }
}
