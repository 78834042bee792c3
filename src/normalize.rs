use std::path::Component;

use anyhow::Result;
use chrono::NaiveDate;

use crate::classify::{Classifier, DocumentKind, categorize};
use crate::extract::{DateContext, FieldExtractor, LabFields};
use crate::model::{ExtractedRecord, LabResult, ResolvedDate, SourceDocument, VisitRecord};

#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub record: ExtractedRecord,
    pub date: ResolvedDate,
}

/// Turns one source document (context plus extracted text) into a record.
/// Never fails: gaps are filled from the path and the run date.
pub struct RecordNormalizer {
    fields: FieldExtractor,
    classifier: Classifier,
}

impl RecordNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fields: FieldExtractor::new()?,
            classifier: Classifier::new()?,
        })
    }

    pub fn fields(&self) -> &FieldExtractor {
        &self.fields
    }

    pub fn normalize(&self, document: &SourceDocument, today: NaiveDate) -> NormalizedDocument {
        let text = document.text.as_str();
        let date = self.fields.resolve_date(
            text,
            &DateContext {
                file_name: &document.file_name,
                visit_folder: document.visit_folder.as_deref(),
                parent_dir: document.parent_dir_name.as_deref(),
                path_year: document.year,
                today,
            },
        );
        let provider = self
            .fields
            .provider(text)
            .or_else(|| document.visit_provider.clone());

        let record = match self
            .classifier
            .document_kind(text, has_lab_path_segment(document))
        {
            DocumentKind::LabResult => {
                let LabFields {
                    test_name,
                    result,
                    unit,
                    reference_range,
                } = self.fields.lab_fields(text, &document.file_name);
                let is_abnormal = self.classifier.is_abnormal(&result, &reference_range, text);

                ExtractedRecord::LabResult(LabResult {
                    category: categorize(&test_name).to_string(),
                    test_name,
                    result,
                    unit,
                    reference_range,
                    is_abnormal,
                    date: date.date,
                    provider,
                    notes: self.fields.lab_notes(text),
                    source_file: document.file_name.clone(),
                })
            }
            DocumentKind::Visit => ExtractedRecord::Visit(VisitRecord {
                title: self.fields.visit_title(text, &document.file_name),
                date: date.date,
                provider,
                location: self.fields.location(text),
                diagnoses: self.fields.diagnoses(text),
                notes: self.fields.visit_notes(text),
                visit_type: self.classifier.visit_type(text),
                specialty: document.specialty.clone(),
                source_file: document.file_name.clone(),
            }),
        };

        NormalizedDocument { record, date }
    }
}

/// Folders such as `Labs/` or `Lab Results/` hint at lab reports.
fn has_lab_path_segment(document: &SourceDocument) -> bool {
    document
        .relative_path
        .parent()
        .into_iter()
        .flat_map(|parent| parent.components())
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().to_ascii_lowercase()),
            _ => None,
        })
        .any(|segment| {
            segment == "lab"
                || segment == "labs"
                || segment.starts_with("lab ")
                || segment.starts_with("lab_")
                || segment.starts_with("labs ")
        })
}
