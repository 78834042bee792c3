use crate::config::DocumentStoreConfig;
use crate::model::ExtractedRecord;

/// Property names of one document-store collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub title: &'static str,
    pub date: &'static str,
}

pub const LAB_RESULTS_SCHEMA: CollectionSchema = CollectionSchema {
    title: "Test Name",
    date: "Date",
};

pub const MEDICAL_EVENTS_SCHEMA: CollectionSchema = CollectionSchema {
    title: "Title",
    date: "Date",
};

pub const CONDITIONS_SCHEMA: CollectionSchema = CollectionSchema {
    title: "Name",
    date: "Diagnosed",
};

/// Collection ids the pipeline writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub lab_results: String,
    pub medical_events: String,
    pub conditions: String,
}

impl Collections {
    pub fn from_config(config: &DocumentStoreConfig) -> Self {
        Self {
            lab_results: config.lab_results_db.clone(),
            medical_events: config.medical_events_db.clone(),
            conditions: config.conditions_db.clone(),
        }
    }

    pub fn for_record(&self, record: &ExtractedRecord) -> (&str, CollectionSchema) {
        match record {
            ExtractedRecord::LabResult(_) => (&self.lab_results, LAB_RESULTS_SCHEMA),
            ExtractedRecord::Visit(_) => (&self.medical_events, MEDICAL_EVENTS_SCHEMA),
        }
    }

    pub fn conditions(&self) -> (&str, CollectionSchema) {
        (&self.conditions, CONDITIONS_SCHEMA)
    }
}
