use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::classify::leading_number;
use crate::model::{Condition, ExtractedRecord, LabResult, Provider, VisitRecord};
use crate::store::{
    CollectionSchema, Collections, DocumentStore, Filter, Properties, PropertyValue,
    RelationalStore, RowWrite, StoreResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Created(String),
    Existing(String),
    Failed(String),
}

impl SinkOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub relational: SinkOutcome,
    pub document: SinkOutcome,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        !self.relational.is_failed() && !self.document.is_failed()
    }
}

/// Writes one record to both sinks. The two writes are independent: a
/// failure on one side is reported, never rolled back or retried, and the
/// other side is still attempted.
pub struct DualSinkWriter<'a, R: RelationalStore, D: DocumentStore> {
    relational: &'a R,
    documents: &'a D,
    collections: &'a Collections,
    today: NaiveDate,
}

impl<'a, R: RelationalStore, D: DocumentStore> DualSinkWriter<'a, R, D> {
    pub fn new(
        relational: &'a R,
        documents: &'a D,
        collections: &'a Collections,
        today: NaiveDate,
    ) -> Self {
        Self {
            relational,
            documents,
            collections,
            today,
        }
    }

    pub fn write(&self, record: &ExtractedRecord) -> WriteReport {
        let relational = match self.write_relational(record) {
            Ok(row) if row.created => SinkOutcome::Created(row.id.to_string()),
            Ok(row) => SinkOutcome::Existing(row.id.to_string()),
            Err(err) => {
                warn!(
                    sink = "relational",
                    source_file = source_file(record),
                    retryable = err.is_retryable(),
                    error = %err,
                    "write failed"
                );
                SinkOutcome::Failed(err.to_string())
            }
        };

        let document = match self.write_document(record) {
            Ok(id) => SinkOutcome::Created(id),
            Err(err) => {
                warn!(
                    sink = "document",
                    source_file = source_file(record),
                    retryable = err.is_retryable(),
                    error = %err,
                    "write failed"
                );
                SinkOutcome::Failed(err.to_string())
            }
        };

        WriteReport {
            relational,
            document,
        }
    }

    fn write_relational(&self, record: &ExtractedRecord) -> StoreResult<RowWrite> {
        let provider_id = match record.provider() {
            Some(name) => Some(self.provider_id(name, record)?),
            None => None,
        };

        match record {
            ExtractedRecord::LabResult(lab) => self.relational.upsert_lab_result(lab, provider_id),
            ExtractedRecord::Visit(visit) => {
                let mut condition_id = None;
                for diagnosis in &visit.diagnoses {
                    let condition = Condition::active(diagnosis, self.today);
                    let row = self
                        .relational
                        .find_or_create_condition(&condition, provider_id)?;
                    condition_id.get_or_insert(row.id);
                }
                self.relational
                    .upsert_medical_event(visit, provider_id, condition_id)
            }
        }
    }

    /// Looks the provider up by name before creating it.
    fn provider_id(&self, name: &str, record: &ExtractedRecord) -> StoreResult<i64> {
        if let Some(id) = self.relational.find_provider(name)? {
            debug!(provider = name, id, "reusing provider");
            return Ok(id);
        }

        let provider = match record {
            ExtractedRecord::Visit(visit) => Provider {
                name: name.to_string(),
                specialty: visit.specialty.clone(),
                facility: Some(visit.location.clone()).filter(|location| !location.is_empty()),
            },
            ExtractedRecord::LabResult(_) => Provider {
                name: name.to_string(),
                specialty: None,
                facility: None,
            },
        };
        let id = self.relational.create_provider(&provider)?;
        info!(provider = name, id, "created provider");
        Ok(id)
    }

    fn write_document(&self, record: &ExtractedRecord) -> StoreResult<String> {
        let (collection_id, schema) = self.collections.for_record(record);
        let properties = match record {
            ExtractedRecord::LabResult(lab) => lab_properties(lab, schema),
            ExtractedRecord::Visit(visit) => {
                let condition_ids = self.condition_pages(&visit.diagnoses);
                visit_properties(visit, schema, condition_ids)
            }
        };
        self.documents.create(collection_id, &properties)
    }

    /// Best effort: a condition that cannot be looked up or created is left
    /// unlinked rather than failing the visit.
    fn condition_pages(&self, diagnoses: &[String]) -> Vec<String> {
        diagnoses
            .iter()
            .filter_map(|diagnosis| match self.condition_page(diagnosis) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(condition = %diagnosis, error = %err, "condition link skipped");
                    None
                }
            })
            .collect()
    }

    fn condition_page(&self, name: &str) -> StoreResult<String> {
        let (collection_id, schema) = self.collections.conditions();
        let existing = self
            .documents
            .query(collection_id, &Filter::title_contains(schema.title, name))?;
        if let Some(entry) = existing.into_iter().next() {
            return Ok(entry.id);
        }

        let condition = Condition::active(name, self.today);
        let properties = Properties::new()
            .with(schema.title, PropertyValue::Title(condition.name))
            .with("Status", PropertyValue::Select(condition.status))
            .with(schema.date, PropertyValue::Date(condition.date_diagnosed));
        self.documents.create(collection_id, &properties)
    }
}

fn source_file(record: &ExtractedRecord) -> &str {
    match record {
        ExtractedRecord::LabResult(lab) => &lab.source_file,
        ExtractedRecord::Visit(visit) => &visit.source_file,
    }
}

fn optional_text(value: Option<&str>) -> Option<PropertyValue> {
    value
        .filter(|value| !value.is_empty())
        .map(|value| PropertyValue::RichText(value.to_string()))
}

fn lab_properties(lab: &LabResult, schema: CollectionSchema) -> Properties {
    Properties::new()
        .with(schema.title, PropertyValue::Title(lab.test_name.clone()))
        .with(schema.date, PropertyValue::Date(lab.date))
        .with("Result", PropertyValue::RichText(lab.result.clone()))
        .with_optional("Value", leading_number(&lab.result).map(PropertyValue::Number))
        .with("Unit", PropertyValue::RichText(lab.unit.clone()))
        .with(
            "Reference Range",
            PropertyValue::RichText(lab.reference_range.clone()),
        )
        .with("Abnormal", PropertyValue::Checkbox(lab.is_abnormal))
        .with("Category", PropertyValue::Select(lab.category.clone()))
        .with_optional("Provider", optional_text(lab.provider.as_deref()))
        .with("Notes", PropertyValue::RichText(lab.notes.clone()))
        .with("Source File", PropertyValue::RichText(lab.source_file.clone()))
}

fn visit_properties(
    visit: &VisitRecord,
    schema: CollectionSchema,
    condition_ids: Vec<String>,
) -> Properties {
    Properties::new()
        .with(schema.title, PropertyValue::Title(visit.title.clone()))
        .with(schema.date, PropertyValue::Date(visit.date))
        .with(
            "Type",
            PropertyValue::Select(visit.visit_type.as_str().to_string()),
        )
        .with_optional("Provider", optional_text(visit.provider.as_deref()))
        .with_optional("Location", optional_text(Some(&visit.location)))
        .with(
            "Diagnoses",
            PropertyValue::RichText(visit.diagnoses.join(", ")),
        )
        .with("Notes", PropertyValue::RichText(visit.notes.clone()))
        .with_optional(
            "Specialty",
            visit
                .specialty
                .clone()
                .map(PropertyValue::Select),
        )
        .with_optional(
            "Conditions",
            (!condition_ids.is_empty()).then(|| PropertyValue::Relation(condition_ids)),
        )
        .with("Source File", PropertyValue::RichText(visit.source_file.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VisitType;
    use crate::store::memory::MemoryDocumentStore;
    use crate::store::{SqliteStore, StoreError};

    fn collections() -> Collections {
        Collections {
            lab_results: "labs".to_string(),
            medical_events: "events".to_string(),
            conditions: "conditions".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 3, 1)
    }

    fn lab(provider: Option<&str>) -> ExtractedRecord {
        ExtractedRecord::LabResult(LabResult {
            test_name: "TSH".to_string(),
            result: "5.2".to_string(),
            unit: "mIU/L".to_string(),
            reference_range: "0.4 - 4.0".to_string(),
            is_abnormal: true,
            category: "Thyroid".to_string(),
            date: date(2023, 6, 15),
            provider: provider.map(str::to_string),
            notes: String::new(),
            source_file: "TSH.pdf".to_string(),
        })
    }

    fn visit(title: &str, provider: Option<&str>, diagnoses: &[&str]) -> ExtractedRecord {
        ExtractedRecord::Visit(VisitRecord {
            title: title.to_string(),
            date: date(2023, 9, 12),
            provider: provider.map(str::to_string),
            location: "Mercy Clinic".to_string(),
            diagnoses: diagnoses.iter().map(|d| d.to_string()).collect(),
            notes: "increase fluids".to_string(),
            visit_type: VisitType::FollowUp,
            specialty: Some("Endocrinology".to_string()),
            source_file: "visit.txt".to_string(),
        })
    }

    #[test]
    fn provider_substring_match_reuses_existing_row() {
        let relational = SqliteStore::open_in_memory().unwrap();
        let documents = MemoryDocumentStore::new();
        let collections = collections();
        let writer = DualSinkWriter::new(&relational, &documents, &collections, today());

        let first = writer.write(&lab(Some("Dr. Gagneet Chauhan")));
        let second = writer.write(&visit("Follow-up Visit", Some("Gagneet"), &[]));

        assert!(first.is_complete());
        assert!(second.is_complete());
        assert_eq!(relational.count_rows("providers"), 1);

        let lab_provider: i64 = relational
            .connection()
            .query_row("SELECT provider_id FROM lab_results", [], |row| row.get(0))
            .unwrap();
        let event_provider: i64 = relational
            .connection()
            .query_row("SELECT provider_id FROM medical_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(lab_provider, event_provider);
    }

    #[test]
    fn document_failure_leaves_relational_write_and_rerun_repairs() {
        let relational = SqliteStore::open_in_memory().unwrap();
        let documents = MemoryDocumentStore::new();
        let collections = collections();
        let writer = DualSinkWriter::new(&relational, &documents, &collections, today());

        documents.fail_creates(true);
        let failed = writer.write(&lab(None));
        assert_eq!(failed.relational, SinkOutcome::Created("1".to_string()));
        assert!(failed.document.is_failed());
        assert!(!failed.is_complete());
        assert_eq!(documents.page_count(), 0);

        documents.fail_creates(false);
        let repaired = writer.write(&lab(None));
        assert_eq!(repaired.relational, SinkOutcome::Existing("1".to_string()));
        assert!(matches!(repaired.document, SinkOutcome::Created(_)));
        assert_eq!(relational.count_rows("lab_results"), 1);
        assert_eq!(documents.pages("labs").len(), 1);
    }

    #[test]
    fn lab_page_uses_typed_properties() {
        let relational = SqliteStore::open_in_memory().unwrap();
        let documents = MemoryDocumentStore::new();
        let collections = collections();
        let writer = DualSinkWriter::new(&relational, &documents, &collections, today());

        writer.write(&lab(Some("Dr. Gagneet")));

        let page = &documents.pages("labs")[0].properties;
        assert_eq!(page["Test Name"]["title"][0]["text"]["content"], "TSH");
        assert_eq!(page["Date"]["date"]["start"], "2023-06-15");
        assert_eq!(page["Abnormal"]["checkbox"], true);
        assert_eq!(page["Category"]["select"]["name"], "Thyroid");
        assert_eq!(page["Value"]["number"], 5.2);
        assert_eq!(page["Provider"]["rich_text"][0]["text"]["content"], "Dr. Gagneet");
    }

    #[test]
    fn visit_links_conditions_and_reuses_condition_pages() {
        let relational = SqliteStore::open_in_memory().unwrap();
        let documents = MemoryDocumentStore::new();
        let collections = collections();
        let writer = DualSinkWriter::new(&relational, &documents, &collections, today());

        writer.write(&visit(
            "Follow-up Visit",
            None,
            &["Hashimoto's Thyroiditis", "POTS"],
        ));
        writer.write(&visit("Office Visit", None, &["POTS"]));

        let conditions = documents.pages("conditions");
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[1].properties["Status"]["select"]["name"], "active");
        assert_eq!(conditions[1].properties["Diagnosed"]["date"]["start"], "2025-03-01");

        let events = documents.pages("events");
        assert_eq!(events.len(), 2);
        let first_links = events[0].properties["Conditions"]["relation"].as_array().unwrap();
        assert_eq!(first_links.len(), 2);
        assert_eq!(
            events[1].properties["Conditions"]["relation"][0]["id"],
            conditions[1].id.as_str()
        );
        assert_eq!(relational.count_rows("conditions"), 2);
    }

    #[test]
    fn condition_lookup_failure_does_not_fail_the_visit() {
        let relational = SqliteStore::open_in_memory().unwrap();
        let documents = MemoryDocumentStore::new();
        let collections = collections();
        let writer = DualSinkWriter::new(&relational, &documents, &collections, today());

        documents.fail_queries(true);
        let report = writer.write(&visit("Follow-up Visit", None, &["POTS"]));

        assert!(report.is_complete());
        let events = documents.pages("events");
        assert_eq!(events.len(), 1);
        assert!(events[0].properties.get("Conditions").is_none());
    }

    struct UnavailableRelational;

    impl RelationalStore for UnavailableRelational {
        fn find_provider(&self, _name: &str) -> StoreResult<Option<i64>> {
            Err(StoreError::Connection {
                url: "sqlite".to_string(),
            })
        }

        fn create_provider(&self, _provider: &Provider) -> StoreResult<i64> {
            unreachable!("lookup fails first")
        }

        fn find_or_create_condition(
            &self,
            _condition: &Condition,
            _provider_id: Option<i64>,
        ) -> StoreResult<RowWrite> {
            Err(StoreError::Connection {
                url: "sqlite".to_string(),
            })
        }

        fn upsert_lab_result(
            &self,
            _lab: &LabResult,
            _provider_id: Option<i64>,
        ) -> StoreResult<RowWrite> {
            Err(StoreError::Connection {
                url: "sqlite".to_string(),
            })
        }

        fn upsert_medical_event(
            &self,
            _visit: &VisitRecord,
            _provider_id: Option<i64>,
            _condition_id: Option<i64>,
        ) -> StoreResult<RowWrite> {
            Err(StoreError::Connection {
                url: "sqlite".to_string(),
            })
        }
    }

    #[test]
    fn relational_failure_still_writes_document() {
        let relational = UnavailableRelational;
        let documents = MemoryDocumentStore::new();
        let collections = collections();
        let writer = DualSinkWriter::new(&relational, &documents, &collections, today());

        let report = writer.write(&lab(Some("Dr. Gagneet")));

        assert!(report.relational.is_failed());
        assert!(matches!(report.document, SinkOutcome::Created(_)));
        assert_eq!(documents.pages("labs").len(), 1);
    }
}
