use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

const DEFAULT_DATA_ROOT: &str = "data/medical-records";
const DEFAULT_PROCESSED_DIR: &str = "data/processed";
const DEFAULT_DB_PATH: &str = "data/medical_records.sqlite";
const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Everything the pipeline needs to know about where it reads from and
/// writes to. Built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    pub processed_dir: PathBuf,
    pub db_path: PathBuf,
    pub pdftotext_program: String,
    pub extract_timeout: Duration,
    pub document_store: DocumentStoreConfig,
}

#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    pub api_base: String,
    pub api_key: String,
    pub lab_results_db: String,
    pub medical_events_db: String,
    pub conditions_db: String,
    pub timeout: Duration,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal; real environment variables still apply.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str| {
            optional(key).with_context(|| format!("missing required environment variable {key}"))
        };
        let seconds = |key: &str, default: u64| -> Result<Duration> {
            let Some(raw) = optional(key) else {
                return Ok(Duration::from_secs(default));
            };
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}"))?;
            if value == 0 {
                bail!("{key} must be greater than zero");
            }
            Ok(Duration::from_secs(value))
        };

        let document_store = DocumentStoreConfig {
            api_base: optional("NOTION_API_BASE")
                .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string()),
            api_key: required("NOTION_API_KEY")?,
            lab_results_db: required("NOTION_LAB_RESULTS_DB")?,
            medical_events_db: required("NOTION_MEDICAL_EVENTS_DB")?,
            conditions_db: required("NOTION_CONDITIONS_DB")?,
            timeout: seconds("MEDIMPORT_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        };

        Ok(Self {
            data_root: optional("MEDIMPORT_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT)),
            processed_dir: optional("MEDIMPORT_PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROCESSED_DIR)),
            db_path: optional("MEDIMPORT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            pdftotext_program: optional("MEDIMPORT_PDFTOTEXT")
                .unwrap_or_else(|| "pdftotext".to_string()),
            extract_timeout: seconds("MEDIMPORT_EXTRACT_TIMEOUT_SECS", DEFAULT_EXTRACT_TIMEOUT_SECS)?,
            document_store,
        })
    }
}
