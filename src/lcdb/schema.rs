/// One row per stored snapshot. The tracker only ever uses the
/// `codetrack_data` key; the whole state lives in `value` as JSON.
pub const SNAPSHOT_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Snapshots (
        key            TEXT        PRIMARY KEY,
        value          TEXT        NOT NULL,
        saved_at       TIMESTAMP   NOT NULL
    )";
