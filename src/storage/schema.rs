//! Database schema definitions
//!
//! Columns are always read back by name, so their order here is free to change.

/// SQL schema for the progress store
pub const SCHEMA_SQL: &str = r#"
-- One row per collected listing
CREATE TABLE IF NOT EXISTS jobs (
    job_id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    scraped_date TEXT NOT NULL,
    scraped_time TEXT NOT NULL,
    title TEXT NOT NULL,
    department TEXT NOT NULL,
    location TEXT NOT NULL,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_position ON jobs(position);

-- Single progress row
CREATE TABLE IF NOT EXISTS progress (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    current_page INTEGER NOT NULL,
    total_pages INTEGER NOT NULL,
    jobs_collected INTEGER NOT NULL,
    timestamp TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
