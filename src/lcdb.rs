use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use std::path::Path;

use crate::models::AppData;

pub mod backup;
pub mod notes;
pub mod problems;
pub mod reminders;
pub mod schema;
pub mod settings;

pub type DBResult<T, E = rusqlite::Error> = Result<T, E>;

/// Key under which the snapshot blob is stored.
pub const DB_KEY: &str = "codetrack_data";

/// An unreadable snapshot is copied here before the store starts over.
pub const CORRUPT_KEY: &str = "codetrack_data.corrupt";

/// Owns the in-memory snapshot and the connection it is persisted through.
///
/// Every mutating operation rewrites the whole snapshot; there are no partial
/// writes. Other connections to the same database file are detected through
/// `PRAGMA data_version` and trigger a full reload (last writer wins).
pub struct Store {
    connection: Connection,
    data: AppData,
    data_version: i64,
    fresh: bool,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("[Store::open] opening {}", path.display());
        let connection = Connection::open(path)
            .with_context(|| format!("Could not open database at {}", path.display()))?;

        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        log::debug!("[Store::from_connection] creating Snapshots table...");
        connection.execute(schema::SNAPSHOT_SCHEMA, [])?;

        let raw = read_value(&connection, DB_KEY)?;
        let fresh = raw.is_none();
        let data = load_snapshot(&connection, raw.as_deref())?;
        let data_version = query_data_version(&connection)?;

        Ok(Self { connection, data, data_version, fresh })
    }

    /// Read-only view of the current snapshot.
    pub fn data(&self) -> &AppData {
        &self.data
    }

    /// True when nothing had ever been saved before this store was opened.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Serializes `data` and writes it under [`DB_KEY`].
    fn persist(&mut self, data: &AppData) -> Result<()> {
        let blob = serde_json::to_string(data).context("Could not serialize snapshot")?;

        write_value(&self.connection, DB_KEY, &blob)
            .inspect_err(|err| log::error!("[Store::persist] Could not persist snapshot: {err}"))?;

        self.fresh = false;
        log::trace!("[Store::persist] snapshot persisted ({} problems)", data.problems.len());
        Ok(())
    }

    /// Applies `mutation` to a copy of the snapshot and keeps it once it is persisted.
    /// A failed write leaves the snapshot as it was.
    pub fn mutate<T>(&mut self, mutation: impl FnOnce(&mut AppData) -> T) -> Result<T> {
        let mut next = self.data.clone();
        let output = mutation(&mut next);
        self.persist(&next)?;
        self.data = next;
        Ok(output)
    }

    /// Swaps in a whole new snapshot (backup import, reset) once it is persisted.
    pub fn replace(&mut self, data: AppData) -> Result<()> {
        self.persist(&data)?;
        self.data = data;
        Ok(())
    }

    /// Reloads the snapshot if another connection has written since we last looked.
    ///
    /// Returns whether a reload happened. Unsaved in-memory state is discarded.
    pub fn refresh_if_changed(&mut self) -> Result<bool> {
        let version = query_data_version(&self.connection)?;
        if version == self.data_version {
            return Ok(false);
        }

        log::info!("[Store::refresh_if_changed] snapshot changed by another process, reloading");
        let raw = read_value(&self.connection, DB_KEY)?;
        self.data = load_snapshot(&self.connection, raw.as_deref())?;
        self.data_version = version;
        Ok(true)
    }
}

fn read_value(connection: &Connection, key: &str) -> DBResult<Option<String>> {
    connection
        .prepare("SELECT value FROM Snapshots WHERE key = :key")?
        .query_row(rusqlite::named_params! { ":key": key }, |row| row.get("value"))
        .optional()
}

fn write_value(connection: &Connection, key: &str, value: &str) -> DBResult<usize> {
    connection
        .prepare(
            "INSERT INTO Snapshots ( key,  value,  saved_at)
             VALUES                (:key, :value, :saved_at)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            saved_at = excluded.saved_at",
        )?
        .execute(rusqlite::named_params! {
            ":key": key,
            ":value": value,
            ":saved_at": Utc::now().to_rfc3339(),
        })
}

fn query_data_version(connection: &Connection) -> DBResult<i64> {
    connection.query_row("PRAGMA data_version", [], |row| row.get(0))
}

/// Turns a stored blob into a snapshot; missing fields are filled with defaults.
pub fn decode_snapshot(raw: &str) -> serde_json::Result<AppData> {
    serde_json::from_str(raw)
}

/// Decodes the stored blob. An unreadable blob is kept under [`CORRUPT_KEY`]
/// and the store starts from the default snapshot.
fn load_snapshot(connection: &Connection, raw: Option<&str>) -> DBResult<AppData> {
    let Some(raw) = raw else {
        return Ok(AppData::default());
    };

    match decode_snapshot(raw) {
        Ok(data) => Ok(data),
        Err(err) => {
            log::warn!(
                "[load_snapshot] stored snapshot is unreadable, starting empty (copy kept under {CORRUPT_KEY}): {err}"
            );
            write_value(connection, CORRUPT_KEY, raw)?;
            Ok(AppData::default())
        }
    }
}

/// Finds the index of the entry referenced by a full id or a unique id prefix.
pub(crate) fn resolve_index<T>(
    items: &[T],
    id_of: impl Fn(&T) -> &str,
    reference: &str,
    kind: &str,
) -> Result<usize> {
    if let Some(idx) = items.iter().position(|item| id_of(item) == reference) {
        return Ok(idx);
    }

    let mut matches = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !reference.is_empty() && id_of(item).starts_with(reference))
        .map(|(idx, _)| idx);

    match (matches.next(), matches.next()) {
        (Some(idx), None) => Ok(idx),
        (Some(_), Some(_)) => Err(anyhow!("Ambiguous {kind} id: {reference}")),
        (None, _) => Err(anyhow!("No such {kind}: {reference}")),
    }
}
