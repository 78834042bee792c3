use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::acquire::{SourceKind, TextExtractor};
use crate::config::PipelineConfig;
use crate::dedup::DuplicateChecker;
use crate::model::{ProcessedArtifact, RunCounts, SourceDocument};
use crate::normalize::{NormalizedDocument, RecordNormalizer};
use crate::store::{Collections, DocumentStore, NotionStore, RelationalStore, SqliteStore};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};
use crate::writer::DualSinkWriter;

const ARTIFACT_VERSION: u32 = 1;

pub fn run(config: &PipelineConfig, years: RangeInclusive<i32>) -> Result<()> {
    if !config.data_root.is_dir() {
        bail!(
            "data root is not a directory: {}",
            config.data_root.display()
        );
    }

    let relational = SqliteStore::open(&config.db_path, config.document_store.timeout)?;
    let documents = NotionStore::new(&config.document_store)?;
    let collections = Collections::from_config(&config.document_store);
    let extractor = TextExtractor::new(config.pdftotext_program.clone(), config.extract_timeout);
    let normalizer = RecordNormalizer::new()?;

    info!(
        data_root = %config.data_root.display(),
        db = %config.db_path.display(),
        start_year = years.start(),
        end_year = years.end(),
        "starting import"
    );

    let mut driver = BatchDriver::new(
        &config.data_root,
        &config.processed_dir,
        &extractor,
        &normalizer,
        Sinks {
            relational: &relational,
            documents: &documents,
            collections: &collections,
        },
        Local::now().date_naive(),
    );
    driver.run(years)?;
    Ok(())
}

/// The stores a run writes into.
pub struct Sinks<'a, R: RelationalStore, D: DocumentStore> {
    pub relational: &'a R,
    pub documents: &'a D,
    pub collections: &'a Collections,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Walking { year: i32 },
    ProcessingFile { year: i32, path: PathBuf },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Written,
    Duplicate,
    WriteFailed,
}

/// Walks `<data_root>/<year>/` for each year in range and runs every source
/// document through extraction, dedup and the writer, one file at a time.
pub struct BatchDriver<'a, R: RelationalStore, D: DocumentStore> {
    data_root: &'a Path,
    processed_dir: &'a Path,
    extractor: &'a TextExtractor,
    normalizer: &'a RecordNormalizer,
    dedup: DuplicateChecker<'a, D>,
    writer: DualSinkWriter<'a, R, D>,
    today: NaiveDate,
    state: DriverState,
}

impl<'a, R: RelationalStore, D: DocumentStore> BatchDriver<'a, R, D> {
    pub fn new(
        data_root: &'a Path,
        processed_dir: &'a Path,
        extractor: &'a TextExtractor,
        normalizer: &'a RecordNormalizer,
        sinks: Sinks<'a, R, D>,
        today: NaiveDate,
    ) -> Self {
        Self {
            data_root,
            processed_dir,
            extractor,
            normalizer,
            dedup: DuplicateChecker::new(sinks.documents, sinks.collections),
            writer: DualSinkWriter::new(sinks.relational, sinks.documents, sinks.collections, today),
            today,
            state: DriverState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn run(&mut self, years: RangeInclusive<i32>) -> Result<RunCounts> {
        let mut counts = RunCounts::default();

        for year in years {
            let year_dir = self.data_root.join(year.to_string());
            if !year_dir.is_dir() {
                debug!(year, "no directory for year");
                continue;
            }
            self.transition(DriverState::Walking { year });

            let walker = WalkDir::new(&year_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !is_hidden(entry));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(year, error = %err, "failed to read directory entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || SourceKind::from_path(entry.path()).is_none() {
                    continue;
                }

                let path = entry.path();
                self.transition(DriverState::ProcessingFile {
                    year,
                    path: path.to_path_buf(),
                });
                counts.files_seen += 1;

                match self.process_file(path, &mut counts) {
                    Ok(FileOutcome::Written) => counts.processed += 1,
                    Ok(FileOutcome::Duplicate) => counts.skipped_duplicate += 1,
                    Ok(FileOutcome::WriteFailed) => counts.write_failed += 1,
                    Err(err) => {
                        counts.errored += 1;
                        error!(path = %path.display(), error = %format!("{err:#}"), "failed to process file");
                    }
                }
                self.transition(DriverState::Walking { year });
            }
        }

        self.transition(DriverState::Done);
        info!(
            files_seen = counts.files_seen,
            processed = counts.processed,
            skipped_duplicate = counts.skipped_duplicate,
            extraction_failed = counts.extraction_failed,
            write_failed = counts.write_failed,
            errored = counts.errored,
            "import finished"
        );
        Ok(counts)
    }

    fn transition(&mut self, next: DriverState) {
        match &next {
            DriverState::Walking { year } => debug!(year, "walking year"),
            DriverState::ProcessingFile { year, path } => {
                debug!(year, path = %path.display(), "processing file")
            }
            DriverState::Idle | DriverState::Done => debug!(state = ?next, "driver state"),
        }
        self.state = next;
    }

    fn process_file(&self, path: &Path, counts: &mut RunCounts) -> Result<FileOutcome> {
        let mut document = self
            .normalizer
            .fields()
            .describe_source(self.data_root, path);
        document.text = self.extractor.extract_text(path);
        if document.text.trim().is_empty() {
            counts.extraction_failed += 1;
            warn!(path = %path.display(), "no text extracted, using path metadata only");
        }

        let normalized = self.normalizer.normalize(&document, self.today);
        self.write_artifact(&document, &normalized)?;

        let record = &normalized.record;
        if self.dedup.exists(record) {
            info!(path = %path.display(), name = record.name(), date = %record.date(), "already imported, skipping");
            return Ok(FileOutcome::Duplicate);
        }

        let report = self.writer.write(record);
        if !report.is_complete() {
            warn!(
                path = %path.display(),
                relational = ?report.relational,
                document = ?report.document,
                "record only partially written"
            );
            return Ok(FileOutcome::WriteFailed);
        }

        info!(
            path = %path.display(),
            kind = record.kind(),
            name = record.name(),
            date = %record.date(),
            date_source = ?normalized.date.source,
            "imported record"
        );
        Ok(FileOutcome::Written)
    }

    fn write_artifact(&self, document: &SourceDocument, normalized: &NormalizedDocument) -> Result<()> {
        let artifact = ProcessedArtifact {
            artifact_version: ARTIFACT_VERSION,
            processed_at: now_utc_string(),
            source_path: document.path.display().to_string(),
            source_sha256: sha256_file(&document.path)?,
            text_char_count: document.text.chars().count(),
            date_source: normalized.date.source,
            date_low_confidence: normalized.date.source.is_low_confidence(),
            context: document,
            record: &normalized.record,
        };

        let target = artifact_path(self.processed_dir, &document.relative_path);
        write_json_pretty(&target, &artifact)
            .with_context(|| format!("failed to write processed artifact for {}", document.path.display()))
    }
}

/// `<processed>/<relative path>.json`, keeping the source extension so
/// `TSH.pdf` and `TSH.txt` in one folder do not collide.
fn artifact_path(processed_dir: &Path, relative_path: &Path) -> PathBuf {
    let mut file_name = relative_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(".json");
    processed_dir.join(relative_path).with_file_name(file_name)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}
