//! Curated problem sheets: the catalog, progress against it and bulk import.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::lcdb::Store;
use crate::models::{AppData, Difficulty, Problem};

const BUILTIN_CATALOG: &str = include_str!("../sheets/catalog.json");

pub const DEFAULT_SEED_SHEET: &str = "leetcode75";

/// Catalog rows are stored as `[id, title, slug, difficulty, [tags]]`.
type CatalogRow = (u32, String, String, Difficulty, Vec<String>);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "CatalogRow")]
pub struct CuratedProblem {
    pub external_id: u32,
    pub title: String,
    pub slug: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
}

impl From<CatalogRow> for CuratedProblem {
    fn from((external_id, title, slug, difficulty, tags): CatalogRow) -> Self {
        Self { external_id, title, slug, difficulty, tags }
    }
}

impl CuratedProblem {
    pub fn url(&self) -> String {
        format!("https://leetcode.com/problems/{}/", self.slug)
    }

    fn to_problem(&self, now: DateTime<Utc>) -> Problem {
        let mut problem = Problem::new(self.title.clone(), self.difficulty, now);
        problem.external_id = Some(self.external_id);
        problem.url = self.url();
        problem.tags = self.tags.clone();
        problem
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "desc", default)]
    pub description: String,
    pub problems: Vec<CuratedProblem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SheetCatalog {
    sheets: BTreeMap<String, Sheet>,
}

impl SheetCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_CATALOG).context("Built-in sheet catalog is malformed")
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Adds the sheets of an extra catalog file. Sheets with an existing key are replaced.
    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Could not read sheet catalog {}", path.display()))?;
        let extra = Self::parse(&raw)
            .with_context(|| format!("Sheet catalog {} is malformed", path.display()))?;

        let count = extra.sheets.len();
        log::info!("[merge_file] {count} sheet(s) loaded from {}", path.display());
        self.sheets.extend(extra.sheets);
        Ok(count)
    }

    pub fn get(&self, key: &str) -> Option<&Sheet> {
        self.sheets.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sheet)> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetProgress {
    pub solved: usize,
    pub total: usize,
}

impl SheetProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.solved as f64 / self.total as f64 * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub existing: usize,
    pub already_imported: bool,
}

/// The tracked problem for a curated entry, matched by external id.
pub fn tracked<'a>(data: &'a AppData, entry: &CuratedProblem) -> Option<&'a Problem> {
    data.problems.iter().find(|p| p.external_id == Some(entry.external_id))
}

pub fn progress(data: &AppData, sheet: &Sheet) -> SheetProgress {
    let solved = sheet
        .problems
        .iter()
        .filter(|entry| tracked(data, entry).is_some_and(|p| p.status.is_solved()))
        .count();

    SheetProgress { solved, total: sheet.problems.len() }
}

/// Adds every curated problem not yet tracked and marks the sheet imported.
/// A sheet that is already marked is left alone.
pub fn import_into(data: &mut AppData, key: &str, sheet: &Sheet, now: DateTime<Utc>) -> ImportSummary {
    if data.is_sheet_imported(key) {
        return ImportSummary { added: 0, existing: sheet.problems.len(), already_imported: true };
    }

    let mut added = 0;
    for entry in &sheet.problems {
        if tracked(data, entry).is_none() {
            data.problems.push(entry.to_problem(now));
            added += 1;
        }
    }
    data.sheets.push(key.to_string());

    ImportSummary { added, existing: sheet.problems.len() - added, already_imported: false }
}

impl Store {
    pub fn import_sheet(&mut self, key: &str, sheet: &Sheet, now: DateTime<Utc>) -> Result<ImportSummary> {
        if self.data().is_sheet_imported(key) {
            log::debug!("[import_sheet] {key} already imported");
            return Ok(ImportSummary {
                added: 0,
                existing: sheet.problems.len(),
                already_imported: true,
            });
        }

        let summary = self.mutate(|data| import_into(data, key, sheet, now))?;
        log::info!(
            "[import_sheet] {}: {} problems imported ({} already existed)",
            sheet.name,
            summary.added,
            summary.existing
        );
        Ok(summary)
    }
}
