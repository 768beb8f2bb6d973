use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use itertools::Itertools;
use regex::Regex;
use tokio::sync::Mutex;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::config::Config;
use crate::lcapi::ProfileClient;
use crate::lcbot::render;
use crate::lcdb::problems::{normalize_tags, AttemptDraft, ProblemFilter, ProblemPatch};
use crate::lcdb::reminders::ReminderDraft;
use crate::lcdb::settings::SettingsPatch;
use crate::lcdb::Store;
use crate::models::{self, Difficulty, ReminderKind};
use crate::sheets::SheetCatalog;
use crate::suggest;

const MAX_CMD_LENGTH: usize = 12;

/// Returned by commands that only need to acknowledge; the bot turns it into a reaction.
pub const OK_REACTION: &str = "✅";

static VALID_CMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static regex"));
static OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z_]+)=(?s)(.*)$").expect("static regex"));

/// A command's arguments: free text before the first `|`, then `|`-separated
/// segments that are either `key=value` options or more free text.
struct Args<'a> {
    head: &'a str,
    segments: Vec<&'a str>,
    options: Vec<(&'a str, &'a str)>,
}

impl<'a> Args<'a> {
    fn parse(input: &'a str) -> Self {
        let mut parts = input.split('|').map(str::trim);
        let head = parts.next().unwrap_or_default();

        let mut segments = Vec::new();
        let mut options = Vec::new();
        for part in parts.filter(|p| !p.is_empty()) {
            match OPTION.captures(part) {
                Some(caps) => {
                    let key = caps.get(1).map_or("", |m| m.as_str());
                    let value = caps.get(2).map_or("", |m| m.as_str().trim());
                    options.push((key, value));
                }
                None => segments.push(part),
            }
        }

        Self { head, segments, options }
    }

    fn words(&self) -> Vec<&'a str> {
        self.head.split_whitespace().collect()
    }

    /// Last value given for `key`.
    fn option(&self, key: &str) -> Option<&'a str> {
        self.options.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.option(key)
            .map(|raw| raw.parse::<T>().map_err(|err| anyhow!("Invalid {key} '{raw}': {err}")))
            .transpose()
    }

    fn ensure_known(&self, allowed: &[&str], usage: &str) -> Result<()> {
        match self.options.iter().find(|(k, _)| !allowed.contains(k)) {
            Some((key, _)) => Err(anyhow!("Unknown option: {key}\n{usage}")),
            None => Ok(()),
        }
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(anyhow!("Expected on/off, got: {other}")),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(',').map(String::from))
}

pub struct Commands {
    store: Arc<Mutex<Store>>,
    catalog: SheetCatalog,
    profiles: ProfileClient,
    call_token: char,
    backup_dir: PathBuf,
}

struct CommandInstance<'a> {
    commands: &'a Commands,
    store: &'a mut Store,
    args: &'a str,
    now: DateTime<Utc>,
}

impl Commands {
    pub fn open(config: &Config) -> Result<Self> {
        Self::new(Store::open(&config.db_path)?, config)
    }

    /// Wraps `store`, loading the sheet catalog and seeding an empty store.
    pub fn new(mut store: Store, config: &Config) -> Result<Self> {
        let mut catalog = SheetCatalog::builtin()?;
        if let Some(path) = &config.extra_sheets {
            catalog.merge_file(path)?;
        }

        if store.is_fresh() {
            if let Some(key) = &config.seed_sheet {
                match catalog.get(key) {
                    Some(sheet) => {
                        log::info!("[Commands::new] empty store, seeding with {key}");
                        store.import_sheet(key, sheet, Utc::now())?;
                    }
                    None => log::warn!("[Commands::new] seed sheet {key} is not in the catalog"),
                }
            }
        }

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            catalog,
            profiles: ProfileClient::new(config.public_api.clone(), config.proxy_url.clone())?,
            call_token: config.call_token,
            backup_dir: config.backup_dir.clone(),
        })
    }

    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    pub fn call_token(&self) -> char {
        self.call_token
    }

    /// Runs one command line, given without its call token.
    pub async fn run_command(&self, input: &str, now: DateTime<Utc>) -> Result<String> {
        // The first token is the command, the rest is handed to it untouched
        let input = input.trim();
        let (command, args) = input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(c, rest)| (c, rest.trim()));

        if command.is_empty() {
            return Err(anyhow!("Empty command, see {}help.", self.call_token));
        }

        // Sync waits on the network and takes the store only around its reads and writes
        if command == "sync" {
            return self.sync(args, now).await;
        }

        let mut store = self.store.lock().await;
        store.refresh_if_changed()?;
        let mut cmd = CommandInstance { commands: self, store: &mut *store, args, now };

        let result: String = match command {
                  "add" => cmd.add()?,
                 "edit" => cmd.edit()?,
               "delete" => cmd.delete()?,
                 "show" => cmd.show()?,
                 "list" => cmd.list()?,
              "attempt" => cmd.attempt()?,
           "confidence" => cmd.confidence()?,
                "pnote" => cmd.problem_note()?,
                "stats" => render::dashboard(cmd.store.data(), now.date_naive()),
            "analytics" => render::analytics(cmd.store.data(), now.date_naive()),
              "suggest" => render::suggestions(&cmd.store.data().problems),
               "sheets" => render::sheet_grid(&self.catalog, cmd.store.data()),
                "sheet" => cmd.sheet()?,
               "import" => cmd.import()?,
                 "mock" => cmd.mock(),
               "remind" => cmd.remind()?,
                 "note" => cmd.note()?,
             "settings" => cmd.settings()?,
               "export" => cmd.export()?,
              "restore" => cmd.restore()?,
                "reset" => cmd.reset()?,
                 "help" => self.get_help(),
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!(
                        "No such command found: {}, see {}help for commands.",
                        command,
                        self.call_token
                    ));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }
}

/////*============== PROBLEMS ==============*/
impl CommandInstance<'_> {
    fn usage(&self, text: &str) -> String {
        format!("Expected usage: `{}{text}`", self.commands.call_token)
    }

    fn react_ok(&self) -> Result<String> {
        Ok(String::from(OK_REACTION))
    }

    fn patch_from(args: &Args) -> Result<ProblemPatch> {
        Ok(ProblemPatch {
            title: args.option("title").map(String::from),
            external_id: args.parsed("id")?,
            url: args.option("url").map(String::from),
            difficulty: args.parsed("difficulty")?,
            status: args.parsed("status")?,
            tags: args.option("tags").map(split_tags),
            notes: args.option("notes").map(String::from),
        })
    }

    fn add(&mut self) -> Result<String> {
        let usage = self.usage(
            "add <title> [| difficulty=easy|medium|hard] [| id=<number>] [| url=<link>] \
             [| tags=<a, b>] [| status=<status>] [| notes=<text>]",
        );
        let args = Args::parse(self.args);
        args.ensure_known(&["difficulty", "id", "url", "tags", "status", "notes"], &usage)?;
        if args.head.is_empty() {
            return Err(anyhow!("{usage}"));
        }

        let difficulty = args.parsed("difficulty")?.unwrap_or(Difficulty::Medium);
        let patch = Self::patch_from(&args)?;
        let id = self.store.add_problem(args.head, difficulty, patch, self.now)?;

        let problem = self.store.problem(&id)?;
        Ok(format!("➕ Added {}", render::problem_line(problem)))
    }

    fn edit(&mut self) -> Result<String> {
        let usage = self.usage(
            "edit <problem> | title=<title> | difficulty=<d> | status=<s> | id=<n> | url=<link> \
             | tags=<a, b> | notes=<text>",
        );
        let args = Args::parse(self.args);
        args.ensure_known(
            &["title", "difficulty", "status", "id", "url", "tags", "notes"],
            &usage,
        )?;
        if args.head.is_empty() || args.options.is_empty() {
            return Err(anyhow!("{usage}"));
        }

        self.store.edit_problem(args.head, Self::patch_from(&args)?, self.now)?;
        self.react_ok()
    }

    fn delete(&mut self) -> Result<String> {
        let reference = self.args.split_whitespace().next().context(self.usage("delete <problem>"))?;
        let removed = self.store.delete_problem(reference)?;
        Ok(format!("🗑️ Deleted **{}**", removed.display_title()))
    }

    fn show(&self) -> Result<String> {
        let reference = self.args.split_whitespace().next().context(self.usage("show <problem>"))?;
        Ok(render::problem_detail(self.store.problem(reference)?))
    }

    fn list(&self) -> Result<String> {
        let usage = self.usage("list [search] [| status=<status>] [| difficulty=<difficulty>]");
        let args = Args::parse(self.args);
        args.ensure_known(&["status", "difficulty"], &usage)?;

        let filter = ProblemFilter {
            status: args.parsed("status")?,
            difficulty: args.parsed("difficulty")?,
            query: Some(args.head.to_string()).filter(|q| !q.is_empty()),
        };
        Ok(render::problem_list(&self.store.list_problems(&filter)))
    }

    fn attempt(&mut self) -> Result<String> {
        let usage = self.usage("attempt <problem> <minutes> [solved|failed] [| lang=<language>] [| notes=<text>]");
        let args = Args::parse(self.args);
        args.ensure_known(&["lang", "notes"], &usage)?;

        let words = args.words();
        let (Some(reference), Some(minutes)) = (words.first(), words.get(1)) else {
            return Err(anyhow!("{usage}"));
        };
        let duration = minutes
            .parse::<u32>()
            .map_err(|_| anyhow!("Attempt duration must be a positive number of minutes."))?;
        let solved = match words.get(2).map(|w| w.to_lowercase()).as_deref() {
            None | Some("solved" | "yes" | "ok") => true,
            Some("failed" | "no" | "fail") => false,
            Some(other) => return Err(anyhow!("Unknown outcome: {other}\n{usage}")),
        };

        let draft = AttemptDraft {
            duration,
            solved,
            language: args.option("lang").unwrap_or_default().to_string(),
            notes: args.option("notes").unwrap_or_default().to_string(),
        };
        let problem = self.store.log_attempt(reference, draft, self.now)?;

        Ok(format!(
            "{} Logged {duration}m on **{}**. Status: *{}*{}",
            if solved { "✅" } else { "📝" },
            problem.display_title(),
            problem.status.label(),
            problem.best_time.map_or_else(String::new, |t| format!(" · best {t}m"))
        ))
    }

    fn confidence(&mut self) -> Result<String> {
        let usage = self.usage("confidence <problem> <0-5>");
        let words = self.args.split_whitespace().collect::<Vec<_>>();
        let [reference, level] = words[..] else {
            return Err(anyhow!("{usage}"));
        };
        let level = level
            .parse::<u8>()
            .map_err(|_| anyhow!("Confidence must be between 0 and {}.", models::MAX_CONFIDENCE))?;

        self.store.set_confidence(reference, level)?;
        self.react_ok()
    }

    fn problem_note(&mut self) -> Result<String> {
        let (reference, text) = self
            .args
            .split_once('|')
            .context(self.usage("pnote <problem> | <notes>"))?;

        self.store.set_problem_notes(reference.trim(), text.trim(), self.now)?;
        self.react_ok()
    }
}

/////*============== SHEETS & PRACTICE ==============*/
impl CommandInstance<'_> {
    fn sheet(&self) -> Result<String> {
        let key = self.args.split_whitespace().next().context(self.usage("sheet <key>"))?;
        let sheet = self
            .commands
            .catalog
            .get(key)
            .with_context(|| format!("No such sheet: {key}"))?;
        Ok(render::sheet_detail(key, sheet, self.store.data()))
    }

    fn import(&mut self) -> Result<String> {
        let key = self.args.split_whitespace().next().context(self.usage("import <key>"))?;
        let sheet = self
            .commands
            .catalog
            .get(key)
            .with_context(|| format!("No such sheet: {key}"))?;

        let summary = self.store.import_sheet(key, sheet, self.now)?;
        if summary.already_imported {
            return Ok(format!("📋 {} was already imported.", sheet.name));
        }
        Ok(format!(
            "📋 {}: {} problems imported ({} already existed)",
            sheet.name, summary.added, summary.existing
        ))
    }

    fn mock(&self) -> String {
        let picks = suggest::mock_interview(&self.store.data().problems, &mut rand::rng());
        let deadline = self.now + Duration::minutes(suggest::MOCK_INTERVIEW_MINUTES);
        render::mock_interview(&picks, deadline)
    }
}

impl Commands {
    async fn sync(&self, args: &str, now: DateTime<Utc>) -> Result<String> {
        let username = match args.split_whitespace().next() {
            Some(name) => name.to_string(),
            None => {
                let mut store = self.store.lock().await;
                store.refresh_if_changed()?;
                store.data().settings.lc_username.clone().unwrap_or_default()
            }
        };

        let synced = self.profiles.sync(&username).await?;

        let mut store = self.store.lock().await;
        store.refresh_if_changed()?;
        store.record_profile_sync(username.trim(), synced.stats.clone(), now)?;

        Ok(format!(
            "🔗 Synced as **{}**\n{}",
            synced.display_name, synced.stats
        ))
    }
}

/////*============== REMINDERS & NOTES ==============*/
impl CommandInstance<'_> {
    fn remind(&mut self) -> Result<String> {
        let usage = self.usage(
            "remind add <title> | at=<YYYY-MM-DDTHH:MM> [| type=<type>] [| repeat=none|daily|weekly] \
             [| desc=<text>]`, `remind list`, `remind toggle <id>`, `remind delete <id>",
        );
        let (sub, rest) = self
            .args
            .split_once(char::is_whitespace)
            .map_or((self.args, ""), |(s, r)| (s, r.trim()));

        match sub {
            "add" => {
                let args = Args::parse(rest);
                args.ensure_known(&["at", "type", "repeat", "desc"], &usage)?;
                let at = args.option("at").context(usage.clone())?;
                let scheduled_at = models::parse_timestamp(at)
                    .with_context(|| format!("Invalid time: {at} (expected YYYY-MM-DDTHH:MM)"))?;

                let draft = ReminderDraft {
                    kind: args.parsed::<ReminderKind>("type")?.unwrap_or_default(),
                    title: args.head.to_string(),
                    description: args.option("desc").unwrap_or_default().to_string(),
                    scheduled_at,
                    repeat: args.option("repeat").unwrap_or("none").to_lowercase(),
                };
                let id = self.store.add_reminder(draft)?;
                let reminder = self
                    .store
                    .data()
                    .reminders
                    .iter()
                    .find(|r| r.id == id)
                    .context("Reminder was not saved")?;
                Ok(format!("⏰ Scheduled {reminder}"))
            }
            "list" => {
                let reminders = self.store.list_reminders();
                if reminders.is_empty() {
                    return Ok(String::from("No reminders yet."));
                }
                Ok(format!("**Reminders:**\n{}", reminders.iter().join("\n")))
            }
            "toggle" => {
                let active = self.store.toggle_reminder(rest)?;
                Ok(String::from(if active { "🔔 Reminder on" } else { "🔕 Reminder off" }))
            }
            "delete" => {
                let removed = self.store.delete_reminder(rest)?;
                Ok(format!("🗑️ Deleted reminder **{}**", removed.title))
            }
            _ => Err(anyhow!("{usage}")),
        }
    }

    fn note(&mut self) -> Result<String> {
        let usage = self.usage(
            "note add <title> | <content> [| cheat=on]`, `note edit <id> | title=<t> | content=<c> \
             | cheat=on|off`, `note list [search]`, `note show <id>`, `note delete <id>",
        );
        let (sub, rest) = self
            .args
            .split_once(char::is_whitespace)
            .map_or((self.args, ""), |(s, r)| (s, r.trim()));

        match sub {
            "add" => {
                let args = Args::parse(rest);
                args.ensure_known(&["cheat"], &usage)?;
                let content = args.segments.join("\n");
                let cheat = args.option("cheat").map(parse_flag).transpose()?.unwrap_or(false);

                self.store.add_note(args.head, &content, cheat, self.now)?;
                self.react_ok()
            }
            "edit" => {
                let args = Args::parse(rest);
                args.ensure_known(&["title", "content", "cheat"], &usage)?;
                let note = self.store.note(args.head)?;
                let title = args.option("title").map_or_else(|| note.title.clone(), String::from);
                let content = args.option("content").map_or_else(|| note.content.clone(), String::from);
                let cheat = args.option("cheat").map(parse_flag).transpose()?;

                self.store.edit_note(args.head, &title, &content, cheat, self.now)?;
                self.react_ok()
            }
            "list" => {
                let notes = self.store.search_notes(rest);
                if notes.is_empty() {
                    return Ok(String::from("No notes yet. Create cheat sheets, learnings and templates."));
                }
                Ok(format!("**Notes:**\n{}", notes.iter().join("\n")))
            }
            "show" => {
                let note = self.store.note(rest)?;
                Ok(format!("**{}**\n{}", note.title, note.content))
            }
            "delete" => {
                let removed = self.store.delete_note(rest)?;
                Ok(format!("🗑️ Deleted note **{}**", removed.title))
            }
            _ => Err(anyhow!("{usage}")),
        }
    }
}

/////*============== SETTINGS & DATA ==============*/
impl CommandInstance<'_> {
    fn settings(&mut self) -> Result<String> {
        let usage = self.usage(
            "settings [| name=<name>] [| email=<email>] [| goal=<n>] [| interview=<YYYY-MM-DD|none>] \
             [| notify=on|off]",
        );
        let args = Args::parse(self.args);
        args.ensure_known(&["name", "email", "goal", "interview", "notify"], &usage)?;

        let interview_date = args
            .option("interview")
            .map(|raw| match raw {
                "" | "none" => Ok(None),
                date => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|_| anyhow!("Invalid interview date: {date} (expected YYYY-MM-DD)")),
            })
            .transpose()?;

        let patch = SettingsPatch {
            name: args.option("name").map(String::from),
            email: args.option("email").map(String::from),
            daily_goal: args.parsed("goal")?,
            interview_date,
            notifications_enabled: args.option("notify").map(parse_flag).transpose()?,
        };

        if !patch.is_empty() {
            self.store.update_settings(patch)?;
        }
        Ok(render::settings(&self.store.data().settings))
    }

    /// Resolves a backup name inside the backup directory. Absolute paths and
    /// `..` are rejected so commands cannot reach other files on the host.
    fn backup_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(anyhow!(
                "Backups are plain file names inside the backup folder, got: {name}"
            ));
        }
        Ok(self.commands.backup_dir.join(relative))
    }

    fn export(&self) -> Result<String> {
        match self.args.split_whitespace().next() {
            Some(name) => {
                let path = self.backup_path(name)?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Could not create {}", parent.display()))?;
                }
                self.store.export_to(&path)?;
                Ok(format!("💾 Data exported to `{name}`"))
            }
            None => Ok(format!("```json\n{}\n```", self.store.export_json()?)),
        }
    }

    fn restore(&mut self) -> Result<String> {
        let name = self.args.split_whitespace().next().context(self.usage("restore <backup.json>"))?;
        let path = self.backup_path(name)?;
        self.store.import_from(path)?;
        Ok(String::from("📥 Data imported!"))
    }

    fn reset(&mut self) -> Result<String> {
        if self.args != "confirm" {
            return Ok(format!(
                "⚠️ This deletes ALL your data. Run `{}reset confirm` to go ahead.",
                self.commands.call_token
            ));
        }

        self.store.reset()?;
        Ok(String::from("🗑️ All data cleared"))
    }
}

/// Non-async helpers
impl Commands {
    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH && VALID_CMD.is_match(s)
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help(&self) -> String {
        let t = self.call_token;
        format!(
            r#"
**Problems** (refer to a problem by id prefix or `#<leetcode number>`)
`{t}add <title> | difficulty=medium | id=1 | tags=Array, Hash Map`:  Track a new problem.
`{t}edit <problem> | status=solved | ...`:  Change fields of a problem.
`{t}delete <problem>`, `{t}show <problem>`:  Remove or inspect a problem.
`{t}list [search] | status=<s> | difficulty=<d>`:  List problems, most recent first.
`{t}attempt <problem> <minutes> [solved|failed] | lang=rust`:  Log an attempt.
`{t}confidence <problem> <0-5>`, `{t}pnote <problem> | <notes>`:  Rate or annotate a problem.
**Progress**
`{t}stats`, `{t}analytics`, `{t}suggest`:  Dashboard, charts and what to solve next.
`{t}sheets`, `{t}sheet <key>`, `{t}import <key>`:  Curated sheets and their progress.
`{t}mock`:  Start a 45-minute mock interview.
`{t}sync [leetcode username]`:  Pull solved counts from your LeetCode profile.
**Organize**
`{t}remind add <title> | at=2025-01-31T09:00 | repeat=daily`, `{t}remind list|toggle|delete`
`{t}note add <title> | <content>`, `{t}note list|show|edit|delete`
`{t}settings | goal=3 | interview=2025-03-01 | notify=on`:  View or change settings.
`{t}export [name]`, `{t}restore <name>`, `{t}reset confirm`:  Backups, kept in the backup folder.
`{t}help`:  Get information on supported commands
"#,
        )
    }
}
