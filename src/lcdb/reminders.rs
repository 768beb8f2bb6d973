use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::lcdb::{resolve_index, Store};
use crate::models::{self, Reminder, ReminderKind};

/////*============== REMINDER OPERATIONS ==============*/
#[derive(Debug, Clone)]
pub struct ReminderDraft {
    pub kind: ReminderKind,
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub repeat: String,
}

impl Store {
    pub fn add_reminder(&mut self, draft: ReminderDraft) -> Result<String> {
        if draft.title.trim().is_empty() {
            return Err(anyhow!("A reminder needs a title."));
        }

        let reminder = Reminder {
            id: models::new_id(),
            kind: draft.kind,
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            scheduled_at: draft.scheduled_at,
            repeat: draft.repeat,
            is_active: true,
        };
        let id = reminder.id.clone();

        log::info!("[add_reminder] Scheduling '{}' at {}", reminder.title, reminder.scheduled_at);
        self.mutate(|data| data.reminders.push(reminder))?;
        Ok(id)
    }

    /// Flips the active flag and returns the new state.
    pub fn toggle_reminder(&mut self, reference: &str) -> Result<bool> {
        let idx = resolve_index(&self.data().reminders, |r| r.id.as_str(), reference, "reminder")?;
        self.mutate(|data| {
            let reminder = &mut data.reminders[idx];
            reminder.is_active = !reminder.is_active;
            reminder.is_active
        })
    }

    pub fn delete_reminder(&mut self, reference: &str) -> Result<Reminder> {
        let idx = resolve_index(&self.data().reminders, |r| r.id.as_str(), reference, "reminder")?;
        self.mutate(|data| data.reminders.remove(idx))
    }

    /// Reminders ordered by their scheduled time.
    pub fn list_reminders(&self) -> Vec<&Reminder> {
        self.data()
            .reminders
            .iter()
            .sorted_by_key(|r| r.scheduled_at)
            .collect()
    }
}
