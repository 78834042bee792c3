use tracing::{debug, warn};

use crate::model::ExtractedRecord;
use crate::store::{Collections, DocumentStore, Filter, plain_text};

/// Asks the document store whether a record with the same name and date has
/// already been imported.
pub struct DuplicateChecker<'a, D: DocumentStore> {
    store: &'a D,
    collections: &'a Collections,
}

impl<'a, D: DocumentStore> DuplicateChecker<'a, D> {
    pub fn new(store: &'a D, collections: &'a Collections) -> Self {
        Self { store, collections }
    }

    /// A failed query counts as "not a duplicate" so the batch keeps moving.
    pub fn exists(&self, record: &ExtractedRecord) -> bool {
        let (collection_id, schema) = self.collections.for_record(record);
        let filter = Filter::And(vec![
            Filter::title_contains(schema.title, record.name()),
            Filter::date_equals(schema.date, record.date()),
        ]);

        match self.store.query(collection_id, &filter) {
            Ok(matches) => match matches.first() {
                Some(existing) => {
                    debug!(
                        name = record.name(),
                        date = %record.date(),
                        existing_id = %existing.id,
                        existing_title = %existing
                            .properties
                            .get(schema.title)
                            .map(plain_text)
                            .unwrap_or_default(),
                        "found existing entry"
                    );
                    true
                }
                None => false,
            },
            Err(err) => {
                warn!(
                    name = record.name(),
                    date = %record.date(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "duplicate check failed, treating record as new"
                );
                false
            }
        }
    }
}
