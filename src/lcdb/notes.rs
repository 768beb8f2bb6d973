use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::lcdb::{resolve_index, Store};
use crate::models::{self, Note};

/////*============== NOTE OPERATIONS ==============*/
impl Store {
    pub fn add_note(
        &mut self,
        title: &str,
        content: &str,
        is_cheat_sheet: bool,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(anyhow!("A note needs a title."));
        }

        let note = Note {
            id: models::new_id(),
            title: title.to_string(),
            content: content.to_string(),
            is_cheat_sheet,
            created_at: now,
            updated_at: now,
        };
        let id = note.id.clone();

        log::info!("[add_note] Adding note '{title}'");
        self.mutate(|data| data.notes.push(note))?;
        Ok(id)
    }

    pub fn note(&self, reference: &str) -> Result<&Note> {
        let idx = resolve_index(&self.data().notes, |n| n.id.as_str(), reference, "note")?;
        Ok(&self.data().notes[idx])
    }

    /// Replaces title and content; `is_cheat_sheet` is kept when `None`.
    pub fn edit_note(
        &mut self,
        reference: &str,
        title: &str,
        content: &str,
        is_cheat_sheet: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(anyhow!("A note needs a title."));
        }

        let idx = resolve_index(&self.data().notes, |n| n.id.as_str(), reference, "note")?;
        self.mutate(|data| {
            let note = &mut data.notes[idx];
            note.title = title.to_string();
            note.content = content.to_string();
            if let Some(flag) = is_cheat_sheet {
                note.is_cheat_sheet = flag;
            }
            note.updated_at = now;
        })
    }

    pub fn delete_note(&mut self, reference: &str) -> Result<Note> {
        let idx = resolve_index(&self.data().notes, |n| n.id.as_str(), reference, "note")?;
        self.mutate(|data| data.notes.remove(idx))
    }

    /// Notes whose title or content contain `query`, ignoring case.
    pub fn search_notes(&self, query: &str) -> Vec<&Note> {
        let query = query.trim().to_lowercase();
        self.data()
            .notes
            .iter()
            .filter(|n| {
                query.is_empty()
                    || n.title.to_lowercase().contains(&query)
                    || n.content.to_lowercase().contains(&query)
            })
            .collect()
    }
}
