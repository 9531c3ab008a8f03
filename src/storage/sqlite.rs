//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ProgressStore trait.

use crate::state::{JobRecord, ProgressSnapshot};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{LoadedState, ProgressStore, StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// SQLite progress store
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    existed: bool,
}

impl SqliteStore {
    /// Opens the store at `path`, creating the file and schema if needed
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let existed = path.exists();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Every flush must survive a crash of the process
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            existed,
        })
    }

    /// Creates an in-memory store (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            existed: false,
        })
    }

    /// Returns true if the store file was present before it was opened
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Counts the stored job rows
    pub fn count_jobs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Counts distinct values of a job column
    pub fn count_distinct(&self, column: DistinctColumn) -> StorageResult<u64> {
        let sql = format!("SELECT COUNT(DISTINCT {}) FROM jobs", column.as_sql());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn load_records(&self) -> StorageResult<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_id, scraped_date, scraped_time, title, department, location, url
             FROM jobs ORDER BY position",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(JobRecord {
                    scraped_date: row.get("scraped_date")?,
                    scraped_time: row.get("scraped_time")?,
                    title: row.get("title")?,
                    department: row.get("department")?,
                    location: row.get("location")?,
                    job_id: row.get("job_id")?,
                    url: row.get("url")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn load_snapshot(&self) -> StorageResult<Option<ProgressSnapshot>> {
        let row = self
            .conn
            .query_row(
                "SELECT current_page, total_pages, jobs_collected, timestamp
                 FROM progress WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>("current_page")?,
                        row.get::<_, i64>("total_pages")?,
                        row.get::<_, i64>("jobs_collected")?,
                        row.get::<_, String>("timestamp")?,
                    ))
                },
            )
            .optional()?;

        let Some((current_page, total_pages, jobs_collected, timestamp)) = row else {
            return Ok(None);
        };

        Ok(Some(ProgressSnapshot {
            current_page: to_u32("current_page", current_page)?,
            total_pages: to_u32("total_pages", total_pages)?,
            jobs_collected: usize::try_from(jobs_collected).map_err(|_| {
                StorageError::Corrupt(format!("jobs_collected out of range: {}", jobs_collected))
            })?,
            timestamp,
        }))
    }
}

impl ProgressStore for SqliteStore {
    fn load(&self) -> StorageResult<LoadedState> {
        Ok(LoadedState {
            records: self.load_records()?,
            snapshot: self.load_snapshot()?,
        })
    }

    fn flush(&mut self, records: &[JobRecord], snapshot: &ProgressSnapshot) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM jobs", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO jobs (job_id, position, scraped_date, scraped_time, title,
                 department, location, url) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, record) in records.iter().enumerate() {
                insert.execute(params![
                    record.job_id,
                    position as i64,
                    record.scraped_date,
                    record.scraped_time,
                    record.title,
                    record.department,
                    record.location,
                    record.url,
                ])?;
            }
        }

        tx.execute("DELETE FROM progress", [])?;
        tx.execute(
            "INSERT INTO progress (id, current_page, total_pages, jobs_collected, timestamp)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                snapshot.current_page,
                snapshot.total_pages,
                snapshot.jobs_collected as i64,
                snapshot.timestamp,
            ],
        )?;

        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(())
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

/// Job columns that can be summarised with `count_distinct`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinctColumn {
    Department,
    Location,
    ScrapedDate,
}

impl DistinctColumn {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Location => "location",
            Self::ScrapedDate => "scraped_date",
        }
    }
}

fn to_u32(column: &str, value: i64) -> StorageResult<u32> {
    u32::try_from(value)
        .map_err(|_| StorageError::Corrupt(format!("{} out of range: {}", column, value)))
}
