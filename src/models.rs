use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DAILY_GOAL: u32 = 3;
pub const MAX_CONFIDENCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "easy" | "e" => Ok(Difficulty::Easy),
            "medium" | "med" | "m" => Ok(Difficulty::Medium),
            "hard" | "h" => Ok(Difficulty::Hard),
            other => Err(anyhow!("Unknown difficulty: {other} (expected easy|medium|hard)")),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.as_str();
        write!(f, "{}{}", s[..1].to_uppercase(), &s[1..])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Status {
    #[default]
    NotStarted,
    Attempted,
    Solved,
    Revisited,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Solved, Status::Attempted, Status::Revisited, Status::NotStarted];

    /// Solved and revisited problems both count as done.
    pub fn is_solved(&self) -> bool {
        matches!(self, Status::Solved | Status::Revisited)
    }

    /// Problems still waiting to be solved.
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::NotStarted | Status::Attempted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::Attempted => "Attempted",
            Status::Solved => "Solved",
            Status::Revisited => "Revisited",
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "not_started" | "new" | "todo" => Ok(Status::NotStarted),
            "attempted" => Ok(Status::Attempted),
            "solved" => Ok(Status::Solved),
            "revisited" => Ok(Status::Revisited),
            other => Err(anyhow!(
                "Unknown status: {other} (expected not_started|attempted|solved|revisited)"
            )),
        }
    }
}

impl TryFrom<String> for Status {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub date: DateTime<Utc>,
    pub duration: u32,
    pub solved: bool,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    #[serde(rename = "leetcodeId", default)]
    pub external_id: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub best_time: Option<u32>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    pub fn new(title: impl Into<String>, difficulty: Difficulty, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            external_id: None,
            title: title.into(),
            url: String::new(),
            difficulty,
            status: Status::NotStarted,
            tags: Vec::new(),
            notes: String::new(),
            confidence: 0,
            best_time: None,
            attempts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends an attempt and keeps status and best time in step with it.
    pub fn record_attempt(&mut self, attempt: Attempt) {
        if attempt.solved {
            self.status = Status::Solved;
            if self.best_time.is_none_or(|best| attempt.duration < best) {
                self.best_time = Some(attempt.duration);
            }
        } else if self.status == Status::NotStarted {
            self.status = Status::Attempted;
        }

        self.updated_at = attempt.date;
        self.attempts.push(attempt);
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Title prefixed with `#<id>` when the problem comes from the catalog.
    pub fn display_title(&self) -> String {
        match self.external_id {
            Some(id) => format!("#{id} {}", self.title),
            None => self.title.clone(),
        }
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stars = (1..=MAX_CONFIDENCE)
            .map(|i| if i <= self.confidence { '★' } else { '☆' })
            .collect::<String>();

        write!(
            f,
            "**{}** `{}`\n\
             \tDifficulty: {}\n\
             \tStatus: *{}*\n\
             \tTags: {}\n\
             \tAttempts: {}\n\
             \tBest Time: {}\n\
             \tConfidence: {}",
            self.display_title(),
            self.short_id(),
            self.difficulty,
            self.status.label(),
            if self.tags.is_empty() { String::from("—") } else { self.tags.join(", ") },
            self.attempts.len(),
            self.best_time.map_or_else(|| String::from("—"), |t| format!("{t}m")),
            stars,
        )?;

        if !self.url.is_empty() {
            write!(f, "\n\t{}", self.url)?;
        }
        if !self.notes.is_empty() {
            write!(f, "\n\tNotes: {}", self.notes)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}min {} {}",
            self.date.format("%Y-%m-%d"),
            self.duration,
            if self.solved { "✅" } else { "❌" },
            self.language
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ReminderKind {
    DailyGoal,
    Revision,
    Interview,
    #[default]
    Custom,
}

impl ReminderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReminderKind::DailyGoal => "Daily Goal",
            ReminderKind::Revision => "Revision",
            ReminderKind::Interview => "Interview",
            ReminderKind::Custom => "Custom",
        }
    }
}

impl FromStr for ReminderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "daily_goal" | "goal" => Ok(ReminderKind::DailyGoal),
            "revision" => Ok(ReminderKind::Revision),
            "interview" => Ok(ReminderKind::Interview),
            "custom" => Ok(ReminderKind::Custom),
            other => Err(anyhow!(
                "Unknown reminder type: {other} (expected daily_goal|revision|interview|custom)"
            )),
        }
    }
}

impl TryFrom<String> for ReminderKind {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ReminderKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub repeat: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

impl std::fmt::Display for Reminder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} **{}** `{}` {} · {}",
            if self.is_active { "🔔" } else { "🔕" },
            self.title,
            short_id(&self.id),
            self.kind.label(),
            self.scheduled_at.format("%Y-%m-%d %H:%M"),
        )?;
        if !self.repeat.is_empty() && self.repeat != "none" {
            write!(f, " · Repeats {}", self.repeat)?;
        }
        if !self.description.is_empty() {
            write!(f, "\n\t{}", self.description)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_cheat_sheet: bool,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview = self.content.chars().take(150).collect::<String>();
        write!(
            f,
            "{}**{}** `{}` ({})\n\t{}",
            if self.is_cheat_sheet { "📄 " } else { "" },
            self.title,
            short_id(&self.id),
            self.updated_at.format("%Y-%m-%d"),
            preview
        )
    }
}

/// Solved counts as reported by the LeetCode profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileStats {
    pub all: u64,
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

impl std::fmt::Display for ProfileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\tEasy Solved: {}\n\
             \tMedium Solved: {}\n\
             \tHard Solved: {}\n\
             \tTotal Solved: {}",
            self.easy, self.medium, self.hard, self.all
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub name: String,
    pub email: String,
    pub daily_goal: u32,
    #[serde(deserialize_with = "lenient::optional_date")]
    pub interview_date: Option<NaiveDate>,
    pub lc_username: Option<String>,
    pub lc_stats: Option<ProfileStats>,
    #[serde(deserialize_with = "lenient::optional_timestamp")]
    pub lc_synced_at: Option<DateTime<Utc>>,
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            daily_goal: DEFAULT_DAILY_GOAL,
            interview_date: None,
            lc_username: None,
            lc_stats: None,
            lc_synced_at: None,
            notifications_enabled: false,
        }
    }
}

/// The whole tracker state. Persisted as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppData {
    pub problems: Vec<Problem>,
    pub reminders: Vec<Reminder>,
    pub notes: Vec<Note>,
    pub settings: Settings,
    /// ISO day (`YYYY-MM-DD`) to number of problems solved that day.
    pub activity_log: BTreeMap<String, u32>,
    /// Keys of the curated sheets that were already bulk-imported.
    pub sheets: Vec<String>,
}

impl AppData {
    pub fn solved_count(&self) -> usize {
        self.problems.iter().filter(|p| p.status.is_solved()).count()
    }

    pub fn activity_on(&self, day: NaiveDate) -> u32 {
        self.activity_log.get(&day_key(day)).copied().unwrap_or(0)
    }

    pub fn is_sheet_imported(&self, key: &str) -> bool {
        self.sheets.iter().any(|s| s == key)
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// First eight characters of an id. Restored backups may carry any string.
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

/// Activity log key for a calendar day.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Accepts RFC 3339 as well as the zone-less `YYYY-MM-DDTHH:MM[:SS]` form
/// produced by datetime-local inputs, the latter read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

mod lenient {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn optional_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => super::parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }

    pub fn optional_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(Some)
                .map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn attempt(duration: u32, solved: bool, date: DateTime<Utc>) -> Attempt {
        Attempt {
            id: new_id(),
            date,
            duration,
            solved,
            language: String::from("rust"),
            notes: String::new(),
        }
    }

    #[test]
    fn solved_attempt_marks_problem_solved_and_sets_best_time() {
        let mut problem = Problem::new("Two Sum", Difficulty::Easy, at(2024, 3, 1));
        problem.record_attempt(attempt(20, true, at(2024, 3, 2)));

        assert_eq!(problem.status, Status::Solved);
        assert_eq!(problem.best_time, Some(20));
        assert_eq!(problem.updated_at, at(2024, 3, 2));
    }

    #[test]
    fn best_time_keeps_the_minimum() {
        let mut problem = Problem::new("Two Sum", Difficulty::Easy, at(2024, 3, 1));
        problem.record_attempt(attempt(30, true, at(2024, 3, 2)));
        problem.record_attempt(attempt(45, true, at(2024, 3, 3)));
        problem.record_attempt(attempt(12, false, at(2024, 3, 4)));
        problem.record_attempt(attempt(18, true, at(2024, 3, 5)));

        assert_eq!(problem.best_time, Some(18));
        assert_eq!(problem.attempts.len(), 4);
    }

    #[test]
    fn failed_attempt_moves_new_problem_to_attempted() {
        let mut problem = Problem::new("Two Sum", Difficulty::Easy, at(2024, 3, 1));
        problem.record_attempt(attempt(40, false, at(2024, 3, 2)));

        assert_eq!(problem.status, Status::Attempted);
        assert_eq!(problem.best_time, None);
    }

    #[test]
    fn failed_attempt_does_not_unsolve() {
        let mut problem = Problem::new("Two Sum", Difficulty::Easy, at(2024, 3, 1));
        problem.status = Status::Revisited;
        problem.record_attempt(attempt(40, false, at(2024, 3, 2)));

        assert_eq!(problem.status, Status::Revisited);
    }

    #[test]
    fn parses_browser_backup_shapes() {
        let raw = r#"{
            "problems": [{
                "id": "abc",
                "leetcodeId": 1,
                "title": "Two Sum",
                "difficulty": "easy",
                "status": "not_started",
                "tags": ["arrays"],
                "confidence": 2,
                "totalAttempts": 0,
                "attempts": [],
                "createdAt": "2024-03-01T10:00:00.000Z",
                "updatedAt": "2024-03-01T10:00:00.000Z"
            }],
            "reminders": [{
                "id": "r1",
                "type": "revision",
                "title": "Graphs",
                "scheduledAt": "2024-03-02T09:30",
                "repeat": "none",
                "isActive": true
            }],
            "settings": { "name": "Ada", "interviewDate": "" },
            "activityLog": { "2024-03-01": 2 },
            "_v2initialized": true
        }"#;

        let data: AppData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.problems[0].external_id, Some(1));
        assert_eq!(data.problems[0].best_time, None);
        assert_eq!(data.reminders[0].kind, ReminderKind::Revision);
        assert_eq!(
            data.reminders[0].scheduled_at,
            Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap()
        );
        assert_eq!(data.settings.name, "Ada");
        assert_eq!(data.settings.daily_goal, DEFAULT_DAILY_GOAL);
        assert_eq!(data.settings.interview_date, None);
        assert!(data.notes.is_empty());
        assert_eq!(data.activity_log.get("2024-03-01"), Some(&2));
    }

    #[test]
    fn parses_commands_inputs() {
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert_eq!("new".parse::<Status>().unwrap(), Status::NotStarted);
        assert!("sorta".parse::<Status>().is_err());
        assert_eq!("goal".parse::<ReminderKind>().unwrap(), ReminderKind::DailyGoal);
        assert!(parse_timestamp("2024-13-01T00:00").is_none());
        assert!(parse_timestamp("2024-01-01T08:00:00+02:00").is_some());
    }

    #[test]
    fn enums_decode_in_any_case() {
        let raw = r#"{
            "id": "p1",
            "title": "Two Sum",
            "difficulty": "Easy",
            "status": "SOLVED",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z"
        }"#;
        let problem: Problem = serde_json::from_str(raw).unwrap();
        assert_eq!(problem.difficulty, Difficulty::Easy);
        assert_eq!(problem.status, Status::Solved);

        let kind: ReminderKind = serde_json::from_str(r#""Daily_Goal""#).unwrap();
        assert_eq!(kind, ReminderKind::DailyGoal);
        assert_eq!(serde_json::to_string(&Status::NotStarted).unwrap(), r#""not_started""#);
        assert!(serde_json::from_str::<Difficulty>(r#""impossible""#).is_err());
    }

    #[test]
    fn short_ids_cut_on_characters() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("aéééé"), "aéééé");
        assert_eq!(short_id("éééééééééé"), "éééééééé");

        let mut problem = Problem::new("Two Sum", Difficulty::Easy, at(2024, 3, 1));
        problem.id = String::from("aéééééééé");
        assert_eq!(problem.short_id(), "aééééééé");
        assert!(problem.to_string().contains("`aééééééé`"));
    }
}
