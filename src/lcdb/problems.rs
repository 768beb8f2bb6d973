use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::lcdb::{resolve_index, Store};
use crate::models::{self, Attempt, Difficulty, Problem, Status};

/////*============== PROBLEM OPERATIONS ==============*/
/// Partial update applied by `add` and `edit`. `None` leaves a field alone.
#[derive(Debug, Default, Clone)]
pub struct ProblemPatch {
    pub title: Option<String>,
    pub external_id: Option<u32>,
    pub url: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub status: Option<Status>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl ProblemPatch {
    fn apply(self, problem: &mut Problem) {
        if let Some(title) = self.title {
            problem.title = title;
        }
        if let Some(id) = self.external_id {
            problem.external_id = Some(id);
        }
        if let Some(url) = self.url {
            problem.url = url;
        }
        if let Some(difficulty) = self.difficulty {
            problem.difficulty = difficulty;
        }
        if let Some(status) = self.status {
            problem.status = status;
        }
        if let Some(tags) = self.tags {
            problem.tags = normalize_tags(tags);
        }
        if let Some(notes) = self.notes {
            problem.notes = notes;
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptDraft {
    pub duration: u32,
    pub solved: bool,
    pub language: String,
    pub notes: String,
}

/// Filters used by the problem list view.
#[derive(Debug, Default, Clone)]
pub struct ProblemFilter {
    pub status: Option<Status>,
    pub difficulty: Option<Difficulty>,
    pub query: Option<String>,
}

impl ProblemFilter {
    pub fn matches(&self, problem: &Problem) -> bool {
        if self.status.is_some_and(|s| s != problem.status) {
            return false;
        }
        if self.difficulty.is_some_and(|d| d != problem.difficulty) {
            return false;
        }

        match self.query.as_deref().map(str::to_lowercase) {
            Some(query) if !query.is_empty() => {
                problem.title.to_lowercase().contains(&query)
                    || problem.tags.iter().any(|t| t.to_lowercase().contains(&query))
                    || problem
                        .external_id
                        .is_some_and(|id| id.to_string().contains(&query))
            }
            _ => true,
        }
    }
}

/// Trims, drops empties and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unique()
        .collect()
}

impl Store {
    /// Resolves a problem reference: full id, unique id prefix, or `#<external id>`.
    pub fn problem_index(&self, reference: &str) -> Result<usize> {
        let problems = &self.data().problems;

        if let Some(external) = reference.strip_prefix('#') {
            let external: u32 = external
                .parse()
                .map_err(|_| anyhow!("Invalid problem number: {reference}"))?;

            return problems
                .iter()
                .position(|p| p.external_id == Some(external))
                .ok_or_else(|| anyhow!("No such problem: {reference}"));
        }

        resolve_index(problems, |p| p.id.as_str(), reference, "problem")
    }

    pub fn problem(&self, reference: &str) -> Result<&Problem> {
        let idx = self.problem_index(reference)?;
        Ok(&self.data().problems[idx])
    }

    /// Adds a new problem and returns its id.
    pub fn add_problem(
        &mut self,
        title: &str,
        difficulty: Difficulty,
        patch: ProblemPatch,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(anyhow!("A problem needs a title."));
        }

        let mut problem = Problem::new(title, difficulty, now);
        patch.apply(&mut problem);
        let id = problem.id.clone();

        log::info!("[add_problem] Adding problem {}", problem.display_title());
        self.mutate(|data| data.problems.push(problem))?;

        Ok(id)
    }

    pub fn edit_problem(
        &mut self,
        reference: &str,
        patch: ProblemPatch,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(anyhow!("A problem needs a title."));
        }

        let idx = self.problem_index(reference)?;
        self.mutate(|data| {
            let problem = &mut data.problems[idx];
            patch.apply(problem);
            problem.updated_at = now;
        })
    }

    pub fn delete_problem(&mut self, reference: &str) -> Result<Problem> {
        let idx = self.problem_index(reference)?;
        let removed = self.mutate(|data| data.problems.remove(idx))?;

        log::info!("[delete_problem] Deleted problem {}", removed.display_title());
        Ok(removed)
    }

    /// Logs an attempt. A solved attempt also counts towards today's activity.
    pub fn log_attempt(
        &mut self,
        reference: &str,
        draft: AttemptDraft,
        now: DateTime<Utc>,
    ) -> Result<&Problem> {
        if draft.duration == 0 {
            return Err(anyhow!("Attempt duration must be a positive number of minutes."));
        }

        let idx = self.problem_index(reference)?;
        let attempt = Attempt {
            id: models::new_id(),
            date: now,
            duration: draft.duration,
            solved: draft.solved,
            language: draft.language,
            notes: draft.notes,
        };

        self.mutate(|data| {
            if attempt.solved {
                let today = models::day_key(now.date_naive());
                *data.activity_log.entry(today).or_insert(0) += 1;
            }
            data.problems[idx].record_attempt(attempt);
        })?;

        let problem = &self.data().problems[idx];
        log::info!(
            "[log_attempt] Logged attempt on {} (status: {})",
            problem.display_title(),
            problem.status.label()
        );
        Ok(problem)
    }

    pub fn set_confidence(&mut self, reference: &str, level: u8) -> Result<()> {
        if level > models::MAX_CONFIDENCE {
            return Err(anyhow!(
                "Confidence must be between 0 and {}.",
                models::MAX_CONFIDENCE
            ));
        }

        let idx = self.problem_index(reference)?;
        self.mutate(|data| data.problems[idx].confidence = level)
    }

    pub fn set_problem_notes(
        &mut self,
        reference: &str,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let idx = self.problem_index(reference)?;
        self.mutate(|data| {
            let problem = &mut data.problems[idx];
            problem.notes = notes.to_string();
            problem.updated_at = now;
        })
    }

    /// Problems matching `filter`, most recently updated first.
    pub fn list_problems(&self, filter: &ProblemFilter) -> Vec<&Problem> {
        self.data()
            .problems
            .iter()
            .filter(|p| filter.matches(p))
            .sorted_by(|a, b| b.updated_at.cmp(&a.updated_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap()
    }

    fn solved(duration: u32) -> AttemptDraft {
        AttemptDraft {
            duration,
            solved: true,
            language: String::from("rust"),
            notes: String::new(),
        }
    }

    fn store_with(titles: &[(&str, Option<u32>)]) -> Store {
        let mut store = Store::open_in_memory().unwrap();
        for (title, external_id) in titles {
            let patch = ProblemPatch { external_id: *external_id, ..Default::default() };
            store.add_problem(title, Difficulty::Easy, patch, now()).unwrap();
        }
        store
    }

    #[test]
    fn solved_attempt_updates_problem_and_activity() {
        let mut store = store_with(&[("Two Sum", Some(1))]);

        let problem = store.log_attempt("#1", solved(20), now()).unwrap();
        assert_eq!(problem.status, Status::Solved);
        assert_eq!(problem.best_time, Some(20));

        assert_eq!(store.data().activity_log.get("2024-05-10"), Some(&1));

        store.log_attempt("#1", solved(25), now()).unwrap();
        assert_eq!(store.data().activity_log.get("2024-05-10"), Some(&2));
        assert_eq!(store.problem("#1").unwrap().best_time, Some(20));
    }

    #[test]
    fn failed_attempt_leaves_activity_alone() {
        let mut store = store_with(&[("Two Sum", Some(1))]);
        let draft = AttemptDraft { solved: false, ..solved(30) };

        store.log_attempt("#1", draft, now()).unwrap();
        assert!(store.data().activity_log.is_empty());
        assert_eq!(store.problem("#1").unwrap().status, Status::Attempted);
    }

    #[test]
    fn zero_minute_attempt_is_rejected() {
        let mut store = store_with(&[("Two Sum", Some(1))]);
        assert!(store.log_attempt("#1", solved(0), now()).is_err());
        assert!(store.problem("#1").unwrap().attempts.is_empty());
    }

    #[test]
    fn missing_problem_is_reported_not_panicked() {
        let mut store = store_with(&[]);
        let err = store.log_attempt("#42", solved(10), now()).unwrap_err();
        assert!(err.to_string().contains("No such problem"));
        assert!(store.set_confidence("deadbeef", 3).is_err());
    }

    #[test]
    fn confidence_is_bounded() {
        let mut store = store_with(&[("Two Sum", Some(1))]);
        store.set_confidence("#1", 4).unwrap();
        assert_eq!(store.problem("#1").unwrap().confidence, 4);
        assert!(store.set_confidence("#1", 6).is_err());
        assert_eq!(store.problem("#1").unwrap().confidence, 4);
    }

    #[test]
    fn edit_applies_only_given_fields() {
        let mut store = store_with(&[("Two Sum", Some(1))]);
        let patch = ProblemPatch {
            difficulty: Some(Difficulty::Medium),
            tags: Some(vec![" arrays ".into(), "hash-map".into(), "arrays".into(), "".into()]),
            ..Default::default()
        };

        store.edit_problem("#1", patch, now()).unwrap();
        let problem = store.problem("#1").unwrap();
        assert_eq!(problem.title, "Two Sum");
        assert_eq!(problem.difficulty, Difficulty::Medium);
        assert_eq!(problem.tags, vec!["arrays", "hash-map"]);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let mut store = store_with(&[]);
        assert!(store.add_problem("   ", Difficulty::Hard, ProblemPatch::default(), now()).is_err());
        assert!(store.data().problems.is_empty());
    }

    #[test]
    fn delete_removes_the_problem() {
        let mut store = store_with(&[("Two Sum", Some(1)), ("Valid Anagram", Some(242))]);
        let removed = store.delete_problem("#1").unwrap();
        assert_eq!(removed.title, "Two Sum");
        assert_eq!(store.data().problems.len(), 1);
        assert!(store.problem("#1").is_err());
    }

    #[test]
    fn list_filters_by_query_and_status() {
        let mut store = store_with(&[("Two Sum", Some(1)), ("Valid Anagram", Some(242))]);
        store.log_attempt("#242", solved(15), now()).unwrap();

        let by_query = ProblemFilter { query: Some("ANAG".into()), ..Default::default() };
        assert_eq!(store.list_problems(&by_query).len(), 1);

        let by_number = ProblemFilter { query: Some("24".into()), ..Default::default() };
        assert_eq!(store.list_problems(&by_number)[0].title, "Valid Anagram");

        let unsolved = ProblemFilter { status: Some(Status::NotStarted), ..Default::default() };
        let listed = store.list_problems(&unsolved);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Two Sum");
    }
}
