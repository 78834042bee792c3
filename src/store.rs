//! The two systems of record: a relational database and a hosted document
//! database. Each sits behind a trait so the writer and duplicate checker can
//! run against in-memory doubles.

use thiserror::Error;

use crate::model::{Condition, LabResult, Provider, VisitRecord};

mod collections;
#[cfg(test)]
pub mod memory;
mod notion;
mod properties;
mod sqlite;

pub use collections::{CollectionSchema, Collections};
pub use notion::NotionStore;
pub use properties::{Filter, Properties, PropertyValue, plain_text};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("cannot connect to {url}")]
    Connection { url: String },

    #[error("http client error: {0}")]
    Http(String),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Timeouts, refused connections, throttling and server errors may
    /// succeed on a later run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row id of a relational write, and whether this call inserted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWrite {
    pub id: i64,
    pub created: bool,
}

pub trait RelationalStore {
    /// First provider whose name contains `name`, case-insensitively.
    fn find_provider(&self, name: &str) -> StoreResult<Option<i64>>;

    fn create_provider(&self, provider: &Provider) -> StoreResult<i64>;

    fn find_or_create_condition(
        &self,
        condition: &Condition,
        provider_id: Option<i64>,
    ) -> StoreResult<RowWrite>;

    fn upsert_lab_result(&self, lab: &LabResult, provider_id: Option<i64>)
    -> StoreResult<RowWrite>;

    fn upsert_medical_event(
        &self,
        visit: &VisitRecord,
        provider_id: Option<i64>,
        condition_id: Option<i64>,
    ) -> StoreResult<RowWrite>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEntry {
    pub id: String,
    pub properties: serde_json::Value,
}

pub trait DocumentStore {
    fn query(&self, collection_id: &str, filter: &Filter) -> StoreResult<Vec<DocumentEntry>>;

    fn create(&self, collection_id: &str, properties: &Properties) -> StoreResult<String>;
}
