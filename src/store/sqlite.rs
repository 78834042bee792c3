use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::{RelationalStore, RowWrite, StoreResult};
use crate::model::{Condition, LabResult, Provider, VisitRecord};
use crate::util::{ensure_directory, now_utc_string};

pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to set journal_mode=WAL")?;
        connection
            .pragma_update(None, "synchronous", "NORMAL")
            .context("failed to set synchronous=NORMAL")?;
        Self::initialize(connection, busy_timeout)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::initialize(connection, Duration::from_secs(1))
    }

    fn initialize(connection: Connection, busy_timeout: Duration) -> Result<Self> {
        connection
            .busy_timeout(busy_timeout)
            .context("failed to set busy timeout")?;
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn count_rows(&self, table: &str) -> i64 {
        self.connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS providers (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              specialty TEXT,
              facility TEXT,
              created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conditions (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              status TEXT NOT NULL DEFAULT 'active',
              date_diagnosed TEXT,
              severity TEXT,
              provider_id INTEGER REFERENCES providers(id) ON DELETE SET NULL,
              created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS medical_events (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              title TEXT NOT NULL,
              event_type TEXT NOT NULL,
              date TEXT NOT NULL,
              provider_id INTEGER REFERENCES providers(id) ON DELETE SET NULL,
              condition_id INTEGER REFERENCES conditions(id) ON DELETE SET NULL,
              location TEXT,
              diagnoses TEXT,
              notes TEXT,
              specialty TEXT,
              source_file TEXT,
              created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lab_results (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              test_name TEXT NOT NULL,
              category TEXT NOT NULL,
              date TEXT NOT NULL,
              result TEXT,
              unit TEXT,
              reference_range TEXT,
              is_abnormal INTEGER NOT NULL DEFAULT 0,
              provider_id INTEGER REFERENCES providers(id) ON DELETE SET NULL,
              notes TEXT,
              source_file TEXT,
              created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lab_results_name_date
              ON lab_results(LOWER(test_name), date);
            CREATE INDEX IF NOT EXISTS idx_medical_events_title_date
              ON medical_events(LOWER(title), date);
            CREATE INDEX IF NOT EXISTS idx_conditions_name
              ON conditions(LOWER(name));
            ",
        )
        .context("failed to create relational schema")
}

impl RelationalStore for SqliteStore {
    fn find_provider(&self, name: &str) -> StoreResult<Option<i64>> {
        let id = self
            .connection
            .query_row(
                "SELECT id FROM providers WHERE instr(LOWER(name), LOWER(?1)) > 0 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn create_provider(&self, provider: &Provider) -> StoreResult<i64> {
        self.connection.execute(
            "INSERT INTO providers (name, specialty, facility, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                provider.name,
                provider.specialty,
                provider.facility,
                now_utc_string()
            ],
        )?;
        Ok(self.connection.last_insert_rowid())
    }

    fn find_or_create_condition(
        &self,
        condition: &Condition,
        provider_id: Option<i64>,
    ) -> StoreResult<RowWrite> {
        let existing: Option<i64> = self
            .connection
            .query_row(
                "SELECT id FROM conditions WHERE LOWER(name) = LOWER(?1) ORDER BY id LIMIT 1",
                params![condition.name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(RowWrite { id, created: false });
        }

        self.connection.execute(
            "
            INSERT INTO conditions (name, status, date_diagnosed, provider_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                condition.name,
                condition.status,
                condition.date_diagnosed,
                provider_id,
                now_utc_string()
            ],
        )?;
        Ok(RowWrite {
            id: self.connection.last_insert_rowid(),
            created: true,
        })
    }

    fn upsert_lab_result(
        &self,
        lab: &LabResult,
        provider_id: Option<i64>,
    ) -> StoreResult<RowWrite> {
        let existing: Option<i64> = self
            .connection
            .query_row(
                "SELECT id FROM lab_results WHERE LOWER(test_name) = LOWER(?1) AND date = ?2 ORDER BY id LIMIT 1",
                params![lab.test_name, lab.date],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(RowWrite { id, created: false });
        }

        self.connection.execute(
            "
            INSERT INTO lab_results (
              test_name, category, date, result, unit, reference_range,
              is_abnormal, provider_id, notes, source_file, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                lab.test_name,
                lab.category,
                lab.date,
                lab.result,
                lab.unit,
                lab.reference_range,
                lab.is_abnormal,
                provider_id,
                lab.notes,
                lab.source_file,
                now_utc_string()
            ],
        )?;
        Ok(RowWrite {
            id: self.connection.last_insert_rowid(),
            created: true,
        })
    }

    fn upsert_medical_event(
        &self,
        visit: &VisitRecord,
        provider_id: Option<i64>,
        condition_id: Option<i64>,
    ) -> StoreResult<RowWrite> {
        let existing: Option<i64> = self
            .connection
            .query_row(
                "SELECT id FROM medical_events WHERE LOWER(title) = LOWER(?1) AND date = ?2 ORDER BY id LIMIT 1",
                params![visit.title, visit.date],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(RowWrite { id, created: false });
        }

        self.connection.execute(
            "
            INSERT INTO medical_events (
              title, event_type, date, provider_id, condition_id, location,
              diagnoses, notes, specialty, source_file, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                visit.title,
                visit.visit_type.as_str(),
                visit.date,
                provider_id,
                condition_id,
                visit.location,
                visit.diagnoses.join("; "),
                visit.notes,
                visit.specialty,
                visit.source_file,
                now_utc_string()
            ],
        )?;
        Ok(RowWrite {
            id: self.connection.last_insert_rowid(),
            created: true,
        })
    }
}
