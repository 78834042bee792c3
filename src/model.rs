use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A file discovered by the batch walk, plus everything its location tells us.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub file_name: String,
    pub year: Option<i32>,
    pub specialty: Option<String>,
    pub visit_folder: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub visit_provider: Option<String>,
    pub parent_dir_name: Option<String>,
    #[serde(skip)]
    pub text: String,
}

/// How a record's date was obtained, from most to least trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    LabeledField,
    TextBody,
    FileName,
    VisitFolder,
    ParentDirectoryYear,
    PathYear,
    RunDate,
}

impl DateSource {
    pub fn is_low_confidence(self) -> bool {
        !matches!(self, Self::LabeledField | Self::TextBody)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub test_name: String,
    pub result: String,
    pub unit: String,
    pub reference_range: String,
    pub is_abnormal: bool,
    pub category: String,
    pub date: NaiveDate,
    pub provider: Option<String>,
    pub notes: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitType {
    #[serde(rename = "Office Visit")]
    OfficeVisit,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Consultation,
    Emergency,
    Surgery,
    Procedure,
    Telehealth,
}

impl VisitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OfficeVisit => "Office Visit",
            Self::FollowUp => "Follow-up",
            Self::Consultation => "Consultation",
            Self::Emergency => "Emergency",
            Self::Surgery => "Surgery",
            Self::Procedure => "Procedure",
            Self::Telehealth => "Telehealth",
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub title: String,
    pub date: NaiveDate,
    pub provider: Option<String>,
    pub location: String,
    pub diagnoses: Vec<String>,
    pub notes: String,
    pub visit_type: VisitType,
    pub specialty: Option<String>,
    pub source_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedRecord {
    LabResult(LabResult),
    Visit(VisitRecord),
}

impl ExtractedRecord {
    /// The identifying name used for duplicate detection: test name or visit title.
    pub fn name(&self) -> &str {
        match self {
            Self::LabResult(lab) => &lab.test_name,
            Self::Visit(visit) => &visit.title,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::LabResult(lab) => lab.date,
            Self::Visit(visit) => visit.date,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::LabResult(lab) => lab.provider.as_deref(),
            Self::Visit(visit) => visit.provider.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::LabResult(_) => "lab_result",
            Self::Visit(_) => "visit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub name: String,
    pub specialty: Option<String>,
    pub facility: Option<String>,
}

pub const DEFAULT_CONDITION_STATUS: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub name: String,
    pub status: String,
    pub date_diagnosed: NaiveDate,
}

impl Condition {
    pub fn active(name: &str, date_diagnosed: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            status: DEFAULT_CONDITION_STATUS.to_string(),
            date_diagnosed,
        }
    }
}

/// The per-document JSON written under the processed-output directory.
#[derive(Debug, Serialize)]
pub struct ProcessedArtifact<'a> {
    pub artifact_version: u32,
    pub processed_at: String,
    pub source_path: String,
    pub source_sha256: String,
    pub text_char_count: usize,
    pub date_source: DateSource,
    pub date_low_confidence: bool,
    pub context: &'a SourceDocument,
    pub record: &'a ExtractedRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub files_seen: usize,
    pub processed: usize,
    pub skipped_duplicate: usize,
    pub extraction_failed: usize,
    pub write_failed: usize,
    pub errored: usize,
}
