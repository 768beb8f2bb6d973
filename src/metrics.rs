//! Derived figures computed from a snapshot on demand.
//!
//! Nothing here is cached: every caller recomputes from the current
//! [`AppData`], so a fresh mutation is always reflected.

use std::collections::{BTreeMap, HashSet};

use chrono::{Days, NaiveDate};
use itertools::Itertools;

use crate::models::{self, AppData, Difficulty, Problem, Status};

/// Number of distinct solved topics that counts as full coverage.
pub const CORE_TOPICS: f64 = 10.0;
/// Streak length that counts as full consistency.
pub const CONSISTENCY_DAYS: f64 = 14.0;
/// Solved problems that count as full volume.
pub const VOLUME_TARGET: f64 = 50.0;

pub const TREND_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Current and longest runs of consecutive active days.
///
/// The current run is counted backwards from `today`, or from yesterday when
/// nothing has been solved today yet.
pub fn streak(log: &BTreeMap<String, u32>, today: NaiveDate) -> Streak {
    let active = |day: NaiveDate| log.get(&models::day_key(day)).is_some_and(|&c| c > 0);

    let mut current = 0;
    let mut cursor = if active(today) { Some(today) } else { today.pred_opt() };
    while let Some(day) = cursor.filter(|&d| active(d)) {
        current += 1;
        cursor = day.pred_opt();
    }

    let days = log
        .iter()
        .filter(|(_, count)| **count > 0)
        .filter_map(|(key, _)| NaiveDate::parse_from_str(key, "%Y-%m-%d").ok())
        .sorted()
        .dedup();

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(prev) if (day - prev).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    Streak { current, longest: longest.max(current) }
}

/// The five normalized inputs of the readiness score, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readiness {
    pub coverage: f64,
    pub balance: f64,
    pub consistency: f64,
    pub confidence: f64,
    pub volume: f64,
}

impl Readiness {
    pub fn compute(data: &AppData, today: NaiveDate) -> Self {
        let problems = &data.problems;
        let total = problems.len();
        if total == 0 {
            return Self::default();
        }

        let solved = problems.iter().filter(|p| p.status.is_solved()).count();
        let non_easy = problems
            .iter()
            .filter(|p| p.status.is_solved() && p.difficulty != Difficulty::Easy)
            .count();
        let confidence_sum: u32 = problems
            .iter()
            .map(|p| u32::from(p.confidence.min(models::MAX_CONFIDENCE)))
            .sum();
        let topics = problems
            .iter()
            .filter(|p| p.status == Status::Solved)
            .flat_map(|p| p.tags.iter())
            .collect::<HashSet<_>>()
            .len();
        let current = streak(&data.activity_log, today).current;

        let unit = |x: f64| x.clamp(0.0, 1.0);
        Self {
            coverage: unit(topics as f64 / CORE_TOPICS),
            balance: unit(non_easy as f64 / solved.max(1) as f64),
            consistency: unit(f64::from(current) / CONSISTENCY_DAYS),
            confidence: unit(confidence_sum as f64 / total as f64 / f64::from(models::MAX_CONFIDENCE)),
            volume: unit(solved as f64 / VOLUME_TARGET),
        }
    }

    /// Weighted 0–100 score.
    pub fn score(&self) -> u32 {
        let weighted = self.coverage * 30.0
            + self.balance * 25.0
            + self.consistency * 20.0
            + self.confidence * 15.0
            + self.volume * 10.0;

        weighted.round().clamp(0.0, 100.0) as u32
    }
}

/// Interview readiness between 0 and 100; 0 when no problems are tracked.
pub fn readiness(data: &AppData, today: NaiveDate) -> u32 {
    Readiness::compute(data, today).score()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessBand {
    Low,
    Moderate,
    Ready,
}

impl ReadinessBand {
    pub fn of(score: u32) -> Self {
        match score {
            0..40 => ReadinessBand::Low,
            40..70 => ReadinessBand::Moderate,
            _ => ReadinessBand::Ready,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ReadinessBand::Low => "🔴",
            ReadinessBand::Moderate => "🟡",
            ReadinessBand::Ready => "🟢",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub solved: usize,
    pub total: usize,
}

impl TopicStats {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.solved as f64 / self.total as f64 }
    }
}

/// Solved/total counts for every tag on any problem.
pub fn topic_stats(problems: &[Problem]) -> BTreeMap<String, TopicStats> {
    let mut stats: BTreeMap<String, TopicStats> = BTreeMap::new();
    for problem in problems {
        for tag in problem.tags.iter().unique() {
            let entry = stats.entry(tag.clone()).or_default();
            entry.total += 1;
            if problem.status.is_solved() {
                entry.solved += 1;
            }
        }
    }
    stats
}

/// Fraction of problems per tag that are solved or revisited.
pub fn topic_ratios(problems: &[Problem]) -> BTreeMap<String, f64> {
    topic_stats(problems)
        .into_iter()
        .map(|(tag, stats)| (tag, stats.ratio()))
        .collect()
}

/// The `n` most practised topics, largest first.
pub fn top_topics(problems: &[Problem], n: usize) -> Vec<(String, TopicStats)> {
    topic_stats(problems)
        .into_iter()
        .sorted_by(|a, b| b.1.total.cmp(&a.1.total))
        .take(n)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifficultyBreakdown {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl DifficultyBreakdown {
    pub fn total(&self) -> usize {
        self.easy + self.medium + self.hard
    }
}

pub fn solved_by_difficulty(problems: &[Problem]) -> DifficultyBreakdown {
    problems
        .iter()
        .filter(|p| p.status.is_solved())
        .fold(DifficultyBreakdown::default(), |mut acc, p| {
            match p.difficulty {
                Difficulty::Easy => acc.easy += 1,
                Difficulty::Medium => acc.medium += 1,
                Difficulty::Hard => acc.hard += 1,
            }
            acc
        })
}

pub fn status_counts(problems: &[Problem]) -> Vec<(Status, usize)> {
    Status::ALL
        .iter()
        .map(|&status| (status, problems.iter().filter(|p| p.status == status).count()))
        .collect()
}

/// Daily solved counts for the `days` days ending at `today`, oldest first.
pub fn activity_trend(log: &BTreeMap<String, u32>, today: NaiveDate, days: u64) -> Vec<(NaiveDate, u32)> {
    (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|day| (day, log.get(&models::day_key(day)).copied().unwrap_or(0)))
        .collect()
}

/// Heatmap intensity (0–4) for a day's solved count.
pub fn heatmap_level(count: u32) -> u8 {
    match count {
        0 => 0,
        1 => 1,
        2 => 2,
        3..=4 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn log(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn problem(difficulty: Difficulty, status: Status, tags: &[&str]) -> Problem {
        let mut p = Problem::new("p", difficulty, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        p.status = status;
        p.tags = tags.iter().map(|t| t.to_string()).collect();
        p
    }

    #[test]
    fn empty_log_has_no_streak() {
        assert_eq!(streak(&BTreeMap::new(), day("2024-05-10")), Streak::default());
    }

    #[test]
    fn five_day_run_ending_today() {
        let log = log(&[
            ("2024-05-06", 1),
            ("2024-05-07", 2),
            ("2024-05-08", 1),
            ("2024-05-09", 1),
            ("2024-05-10", 3),
        ]);
        let s = streak(&log, day("2024-05-10"));
        assert_eq!(s.current, 5);
        assert!(s.longest >= 5);
    }

    #[test]
    fn streak_survives_until_today_is_over() {
        let log = log(&[("2024-05-08", 1), ("2024-05-09", 1)]);
        assert_eq!(streak(&log, day("2024-05-10")).current, 2);
        assert_eq!(streak(&log, day("2024-05-11")).current, 0);
    }

    #[test]
    fn longest_run_is_found_in_the_past() {
        let log = log(&[
            ("2024-01-01", 1),
            ("2024-01-02", 1),
            ("2024-01-03", 1),
            ("2024-01-10", 1),
            ("2024-05-10", 1),
        ]);
        assert_eq!(streak(&log, day("2024-05-10")), Streak { current: 1, longest: 3 });
    }

    #[test]
    fn runs_cross_month_boundaries() {
        let log = log(&[("2024-02-28", 1), ("2024-02-29", 1), ("2024-03-01", 1)]);
        assert_eq!(streak(&log, day("2024-03-01")), Streak { current: 3, longest: 3 });
    }

    #[test]
    fn zero_and_malformed_entries_are_not_activity() {
        let log = log(&[("2024-05-08", 1), ("2024-05-09", 0), ("garbage", 4), ("2024-05-10", 1)]);
        assert_eq!(streak(&log, day("2024-05-10")), Streak { current: 1, longest: 1 });
    }

    #[test]
    fn longest_never_below_current() {
        let cases = [
            log(&[]),
            log(&[("2024-05-10", 1)]),
            log(&[("2024-05-09", 1), ("2024-05-10", 1), ("2023-01-01", 1)]),
            log(&[("2024-05-01", 2), ("2024-05-03", 1), ("2024-05-04", 1)]),
        ];
        for log in &cases {
            for today in ["2024-05-04", "2024-05-05", "2024-05-10", "2024-05-11"] {
                let s = streak(log, day(today));
                assert!(s.longest >= s.current, "{log:?} at {today}: {s:?}");
            }
        }
    }

    #[test]
    fn readiness_is_zero_without_problems() {
        assert_eq!(readiness(&AppData::default(), day("2024-05-10")), 0);
    }

    #[test]
    fn readiness_is_bounded() {
        let mut data = AppData::default();
        for i in 0..60 {
            let mut p = problem(Difficulty::Hard, Status::Solved, &[format!("topic-{i}").as_str()]);
            p.confidence = 9;
            data.problems.push(p);
        }
        for back in 0..20u64 {
            let d = day("2024-05-10").checked_sub_days(Days::new(back)).unwrap();
            data.activity_log.insert(models::day_key(d), 1);
        }

        assert_eq!(readiness(&data, day("2024-05-10")), 100);
    }

    #[test]
    fn readiness_weights_its_inputs() {
        let mut data = AppData::default();
        // 2 solved (1 medium), 2 pending; 3 distinct solved tags; confidence avg 2.5.
        let mut a = problem(Difficulty::Medium, Status::Solved, &["arrays", "dp"]);
        a.confidence = 5;
        let mut b = problem(Difficulty::Easy, Status::Solved, &["graphs"]);
        b.confidence = 5;
        data.problems = vec![
            a,
            b,
            problem(Difficulty::Hard, Status::NotStarted, &["heap"]),
            problem(Difficulty::Hard, Status::Attempted, &[]),
        ];
        data.activity_log = log(&[("2024-05-09", 1), ("2024-05-10", 1)]);

        let r = Readiness::compute(&data, day("2024-05-10"));
        assert_eq!(r.coverage, 0.3);
        assert_eq!(r.balance, 0.5);
        assert_eq!(r.consistency, 2.0 / 14.0);
        assert_eq!(r.confidence, 0.5);
        assert_eq!(r.volume, 2.0 / 50.0);
        // 9 + 12.5 + 2.857 + 7.5 + 0.4 = 32.257
        assert_eq!(r.score(), 32);
    }

    #[test]
    fn revisited_problems_do_not_count_towards_coverage() {
        let mut data = AppData::default();
        data.problems = vec![problem(Difficulty::Easy, Status::Revisited, &["arrays"])];

        let r = Readiness::compute(&data, day("2024-05-10"));
        assert_eq!(r.coverage, 0.0);
        assert_eq!(r.volume, 1.0 / 50.0);
    }

    #[test]
    fn topic_ratio_counts_solved_and_revisited() {
        let mut problems = Vec::new();
        for i in 0..10 {
            let status = match i {
                0 | 1 => Status::Solved,
                2 => Status::Revisited,
                _ => Status::NotStarted,
            };
            problems.push(problem(Difficulty::Easy, status, &["arrays"]));
        }

        let ratios = topic_ratios(&problems);
        assert!((ratios["arrays"] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn duplicate_tags_count_once() {
        let problems = vec![problem(Difficulty::Easy, Status::Solved, &["dp", "dp"])];
        assert_eq!(topic_stats(&problems)["dp"], TopicStats { solved: 1, total: 1 });
    }

    #[test]
    fn breakdowns() {
        let problems = vec![
            problem(Difficulty::Easy, Status::Solved, &["a"]),
            problem(Difficulty::Medium, Status::Revisited, &["a", "b"]),
            problem(Difficulty::Hard, Status::Attempted, &["b"]),
            problem(Difficulty::Hard, Status::NotStarted, &["b"]),
        ];

        assert_eq!(
            solved_by_difficulty(&problems),
            DifficultyBreakdown { easy: 1, medium: 1, hard: 0 }
        );
        assert_eq!(
            status_counts(&problems),
            vec![
                (Status::Solved, 1),
                (Status::Attempted, 1),
                (Status::Revisited, 1),
                (Status::NotStarted, 1)
            ]
        );
        let top = top_topics(&problems, 1);
        assert_eq!(top[0].0, "b");
        assert_eq!(top[0].1, TopicStats { solved: 1, total: 3 });
    }

    #[test]
    fn trend_is_zero_filled_and_ends_today() {
        let log = log(&[("2024-05-10", 2), ("2024-04-11", 1), ("2024-04-10", 7)]);
        let trend = activity_trend(&log, day("2024-05-10"), TREND_DAYS);

        assert_eq!(trend.len(), 30);
        assert_eq!(trend[0], (day("2024-04-11"), 1));
        assert_eq!(trend[29], (day("2024-05-10"), 2));
        assert_eq!(trend.iter().map(|(_, c)| c).sum::<u32>(), 3);
    }

    #[test]
    fn heatmap_levels() {
        let levels = [0, 1, 2, 3, 4, 5, 12].map(heatmap_level);
        assert_eq!(levels, [0, 1, 2, 3, 3, 4, 4]);
        assert_eq!(ReadinessBand::of(39), ReadinessBand::Low);
        assert_eq!(ReadinessBand::of(40), ReadinessBand::Moderate);
        assert_eq!(ReadinessBand::of(70), ReadinessBand::Ready);
    }
}
