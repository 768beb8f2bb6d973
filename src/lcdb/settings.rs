use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::lcdb::Store;
use crate::models::ProfileStats;

/////*============== SETTINGS ==============*/
#[derive(Debug, Default, Clone)]
pub struct SettingsPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub daily_goal: Option<u32>,
    /// `Some(None)` clears the interview date.
    pub interview_date: Option<Option<NaiveDate>>,
    pub notifications_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.daily_goal.is_none()
            && self.interview_date.is_none()
            && self.notifications_enabled.is_none()
    }
}

impl Store {
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<()> {
        if patch.daily_goal == Some(0) {
            return Err(anyhow!("The daily goal must be at least 1."));
        }

        self.mutate(|data| {
            let settings = &mut data.settings;
            if let Some(name) = patch.name {
                settings.name = name.trim().to_string();
            }
            if let Some(email) = patch.email {
                settings.email = email.trim().to_string();
            }
            if let Some(goal) = patch.daily_goal {
                settings.daily_goal = goal;
            }
            if let Some(date) = patch.interview_date {
                settings.interview_date = date;
            }
            if let Some(enabled) = patch.notifications_enabled {
                settings.notifications_enabled = enabled;
            }
        })?;

        log::info!("[update_settings] Settings saved");
        Ok(())
    }

    /// Stores the result of a successful profile sync.
    pub fn record_profile_sync(
        &mut self,
        username: &str,
        stats: ProfileStats,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(|data| {
            data.settings.lc_username = Some(username.to_string());
            data.settings.lc_stats = Some(stats);
            data.settings.lc_synced_at = Some(now);
        })
    }
}
