//! Backup import/export of the whole snapshot as one JSON document.

use anyhow::{anyhow, Context, Result};

use std::fs;
use std::path::Path;

use crate::lcdb::Store;
use crate::models::AppData;

impl Store {
    /// Pretty-printed snapshot, as written to backup files.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self.data()).context("Could not serialize snapshot")
    }

    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.export_json()?)
            .with_context(|| format!("Could not write backup to {}", path.display()))?;

        log::info!("[export_to] Data exported to {}", path.display());
        Ok(())
    }

    /// Replaces the snapshot with `defaults merged with the document`.
    /// An unreadable document leaves the store untouched.
    pub fn import_json(&mut self, raw: &str) -> Result<()> {
        let data: AppData = serde_json::from_str(raw).map_err(|err| {
            log::warn!("[import_json] Rejected backup: {err}");
            anyhow!("Invalid file")
        })?;

        self.replace(data)?;
        log::info!("[import_json] Data imported");
        Ok(())
    }

    pub fn import_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("No such file or directory: {}", path.display()))?;

        self.import_json(&raw)
    }

    /// Clears everything back to the default snapshot.
    pub fn reset(&mut self) -> Result<()> {
        log::warn!("[reset] Clearing all data");
        self.replace(AppData::default())
    }
}
