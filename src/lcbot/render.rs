//! Plain-text (Discord markdown) views over the snapshot.

use chrono::{DateTime, Local, NaiveDate, Utc};
use itertools::Itertools;

use crate::metrics::{self, Readiness, ReadinessBand};
use crate::models::{AppData, Problem, Settings};
use crate::sheets::{self, Sheet, SheetCatalog};
use crate::suggest::{self, Suggestion};

/// Discord rejects messages longer than this.
pub const MESSAGE_LIMIT: usize = 2000;

const HEATMAP_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];
const BAR_WIDTH: usize = 10;

fn bar(ratio: f64) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn band_label(band: ReadinessBand) -> &'static str {
    match band {
        ReadinessBand::Low => "Keep building",
        ReadinessBand::Moderate => "Getting there",
        ReadinessBand::Ready => "Interview ready",
    }
}

fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

pub fn dashboard(data: &AppData, today: NaiveDate) -> String {
    let solved = metrics::solved_by_difficulty(&data.problems);
    let streak = metrics::streak(&data.activity_log, today);
    let score = metrics::readiness(data, today);
    let band = ReadinessBand::of(score);

    let mut out = String::from("**Dashboard**\n");
    out += &format!(
        "Solved: **{}** (🟢 {} · 🟡 {} · 🔴 {})\n",
        solved.total(),
        solved.easy,
        solved.medium,
        solved.hard
    );
    out += &format!("🔥 {}-day streak (longest {})\n", streak.current, streak.longest);
    out += &format!(
        "Today: {}/{} solved\n",
        data.activity_on(today),
        data.settings.daily_goal
    );
    out += &format!("Readiness: {} **{score}%** {}\n", band.emoji(), band_label(band));

    if let Some(date) = data.settings.interview_date {
        match days_until(date, today) {
            0 => out += "📅 Interview is today. Good luck!\n",
            days if days > 0 => out += &format!("📅 {days} days until your interview\n"),
            _ => {}
        }
    }

    if let Some(stats) = &data.settings.lc_stats {
        out += &format!(
            "LeetCode ({}): {} solved\n",
            data.settings.lc_username.as_deref().unwrap_or("?"),
            stats.all
        );
    }

    out += "\n";
    out += &suggestions(&data.problems);
    out
}

pub fn analytics(data: &AppData, today: NaiveDate) -> String {
    let readiness = Readiness::compute(data, today);
    let score = readiness.score();

    let mut out = String::from("**Analytics**\n");
    out += &format!(
        "Status: {}\n",
        metrics::status_counts(&data.problems)
            .into_iter()
            .map(|(status, count)| format!("{} {count}", status.label()))
            .join(" · ")
    );

    out += &format!("\n**Readiness** {} {score}%\n", ReadinessBand::of(score).emoji());
    for (label, value) in [
        ("Coverage   ", readiness.coverage),
        ("Balance    ", readiness.balance),
        ("Consistency", readiness.consistency),
        ("Confidence ", readiness.confidence),
        ("Volume     ", readiness.volume),
    ] {
        out += &format!("`{label} {}` {:.0}%\n", bar(value), value * 100.0);
    }

    let topics = metrics::top_topics(&data.problems, 10);
    out += "\n**Topics**\n";
    if topics.is_empty() {
        out += "Add tagged problems to see topic analysis.\n";
    }
    for (tag, stats) in topics {
        out += &format!("`{}` {tag} {}/{}\n", bar(stats.ratio()), stats.solved, stats.total);
    }

    let trend = metrics::activity_trend(&data.activity_log, today, metrics::TREND_DAYS);
    let heatmap = trend
        .iter()
        .map(|(_, count)| HEATMAP_GLYPHS[usize::from(metrics::heatmap_level(*count))])
        .collect::<String>();
    let total = trend.iter().map(|(_, count)| count).sum::<u32>();
    out += &format!("\n**Last {} days** ({total} solved)\n`{heatmap}`", metrics::TREND_DAYS);
    out
}

fn suggestion_line(i: usize, s: &Suggestion) -> String {
    let tags = if s.problem.tags.is_empty() {
        String::new()
    } else {
        format!(" · {}", s.problem.tags.join(", "))
    };
    format!(
        "{}. **{}** ({}){tags} `{}`",
        i + 1,
        s.problem.display_title(),
        s.problem.difficulty,
        s.problem.short_id()
    )
}

pub fn suggestions(problems: &[Problem]) -> String {
    if problems.is_empty() {
        return String::from("🎯 Add problems to get suggestions based on your weak topics.");
    }

    let ranked = suggest::suggest(problems);
    if ranked.is_empty() {
        return String::from("🎉 All problems solved! Add more to keep practising.");
    }

    let lines = ranked.iter().enumerate().map(|(i, s)| suggestion_line(i, s)).join("\n");
    format!("**Suggested next:**\n{lines}")
}

pub fn problem_line(problem: &Problem) -> String {
    format!(
        "`{}` **{}** · {} · *{}*{}",
        problem.short_id(),
        problem.display_title(),
        problem.difficulty,
        problem.status.label(),
        problem.best_time.map_or_else(String::new, |t| format!(" · best {t}m"))
    )
}

pub fn problem_list(problems: &[&Problem]) -> String {
    if problems.is_empty() {
        return String::from("No matching problems.");
    }
    let lines = problems.iter().map(|p| problem_line(p)).join("\n");
    format!("**Problems ({}):**\n{lines}", problems.len())
}

/// The problem with its attempt history.
pub fn problem_detail(problem: &Problem) -> String {
    let mut out = problem.to_string();
    if !problem.attempts.is_empty() {
        out += "\n**Attempts:**";
        for attempt in problem.attempts.iter().rev() {
            out += &format!("\n\t{attempt}");
        }
    }
    out
}

pub fn sheet_grid(catalog: &SheetCatalog, data: &AppData) -> String {
    let mut out = String::from("**Sheets:**");
    for (key, sheet) in catalog.iter() {
        let progress = sheets::progress(data, sheet);
        out += &format!(
            "\n{} **{}** `{key}` {}/{} ({}%){}\n\t{}",
            sheet.icon,
            sheet.name,
            progress.solved,
            progress.total,
            progress.percent(),
            if data.is_sheet_imported(key) { " · imported" } else { "" },
            sheet.description
        );
    }
    out
}

pub fn sheet_detail(key: &str, sheet: &Sheet, data: &AppData) -> String {
    let progress = sheets::progress(data, sheet);
    let mut out = format!(
        "{} **{}** {}/{} ({}%)\n",
        sheet.icon,
        sheet.name,
        progress.solved,
        progress.total,
        progress.percent()
    );

    for entry in &sheet.problems {
        let mark = match sheets::tracked(data, entry) {
            Some(p) if p.status.is_solved() => "✅",
            Some(_) => "🔸",
            None => "⬜",
        };
        out += &format!("{mark} #{} {} ({})\n", entry.external_id, entry.title, entry.difficulty);
    }

    if !data.is_sheet_imported(key) {
        out += &format!("Use `import {key}` to add these problems to your tracker.");
    }
    out
}

pub fn mock_interview(picks: &[&Problem], deadline: DateTime<Utc>) -> String {
    if picks.is_empty() {
        return String::from("Add problems first to use mock interviews.");
    }

    let lines = picks
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. **{}** ({}) {}", i + 1, p.display_title(), p.difficulty, p.url))
        .join("\n");
    format!(
        "⏱️ **Mock interview**: {} minutes, ends at {}\n{lines}",
        suggest::MOCK_INTERVIEW_MINUTES,
        deadline.with_timezone(&Local).format("%H:%M")
    )
}

pub fn settings(settings: &Settings) -> String {
    let or_dash = |s: &str| if s.is_empty() { String::from("—") } else { s.to_string() };
    let mut out = format!(
        "**Settings**\n\
         \tName: {}\n\
         \tEmail: {}\n\
         \tDaily goal: {}\n\
         \tInterview: {}\n\
         \tNotifications: {}",
        or_dash(&settings.name),
        or_dash(&settings.email),
        settings.daily_goal,
        settings
            .interview_date
            .map_or_else(|| String::from("—"), |d| d.format("%Y-%m-%d").to_string()),
        if settings.notifications_enabled { "on" } else { "off" },
    );

    if let Some(username) = &settings.lc_username {
        out += &format!("\n\tLeetCode: {username}");
        if let Some(at) = settings.lc_synced_at {
            out += &format!(" (last synced {})", at.format("%Y-%m-%d"));
        }
    }
    out
}

/// Splits `text` into pieces that fit in one message, breaking on lines where possible.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let mut line = line;
        while line.chars().count() > limit {
            let cut = line.char_indices().nth(limit).map_or(line.len(), |(i, _)| i);
            chunks.extend(current.take());
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }

        match current.as_mut() {
            Some(chunk) if chunk.chars().count() + 1 + line.chars().count() <= limit => {
                chunk.push('\n');
                chunk.push_str(line);
            }
            _ => {
                chunks.extend(current.take());
                current = Some(line.to_string());
            }
        }
    }

    chunks.extend(current);
    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Status};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn suggestion_messages_for_edge_cases() {
        assert!(suggestions(&[]).contains("Add problems"));

        let mut done = Problem::new("Two Sum", Difficulty::Easy, Utc::now());
        done.status = Status::Solved;
        assert!(suggestions(&[done]).contains("All problems solved"));
    }

    #[test]
    fn dashboard_shows_goal_and_countdown() {
        let mut data = AppData::default();
        data.activity_log.insert(String::from("2024-03-10"), 2);
        data.settings.interview_date = NaiveDate::from_ymd_opt(2024, 3, 20);

        let text = dashboard(&data, today());
        assert!(text.contains("Today: 2/3 solved"));
        assert!(text.contains("10 days until your interview"));
        assert!(text.contains("1-day streak"));
    }

    #[test]
    fn analytics_heatmap_covers_thirty_days() {
        let mut data = AppData::default();
        data.activity_log.insert(String::from("2024-03-10"), 5);
        data.activity_log.insert(String::from("2024-03-09"), 1);

        let text = analytics(&data, today());
        assert!(text.contains("(6 solved)"));
        let heatmap = text.lines().last().unwrap().trim_matches('`');
        assert_eq!(heatmap.chars().count(), 30);
        assert!(heatmap.ends_with("░█"));
    }

    #[test]
    fn long_messages_are_split_on_lines() {
        let text = (0..300).map(|i| format!("line number {i}")).join("\n");
        let chunks = split_message(&text, MESSAGE_LIMIT);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MESSAGE_LIMIT));
        assert_eq!(chunks.join("\n"), text);

        let long_line = "x".repeat(4500);
        let chunks = split_message(&long_line, MESSAGE_LIMIT);
        assert_eq!(chunks.iter().map(String::len).collect::<Vec<_>>(), vec![2000, 2000, 500]);
    }
}
