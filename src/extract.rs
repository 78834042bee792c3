//! Heuristic field extraction from clinical document text.
//!
//! Every field is resolved by an ordered list of small strategies, each
//! returning `Option`; the first strategy that produces a value wins and the
//! last resort is always derived from the file's name or location. Nothing
//! here fails: a pattern that does not match simply means "unknown".

use anyhow::{Context, Result};
use regex::Regex;

mod date;
mod diagnosis;
mod fields;
mod path_context;
#[cfg(test)]
mod tests;

pub use date::DateContext;
pub use fields::LabFields;

pub struct FieldExtractor {
    labeled_date: Regex,
    numeric_date: Regex,
    bare_date: Regex,
    month_name_date: Regex,
    name_numeric_date: Regex,
    name_iso_date: Regex,
    name_month_token: Regex,
    visit_folder: Regex,
    labeled_test_name: Regex,
    range_marker: Regex,
    range_bounds: Regex,
    labeled_result: Regex,
    value_line: Regex,
    lab_row: Regex,
    labeled_unit: Regex,
    labeled_comment: Regex,
    labeled_provider: Regex,
    doctor_name: Regex,
    credentialed_name: Regex,
    labeled_location: Regex,
    labeled_title: Regex,
    visit_heading: Regex,
    diagnosis_heading: Regex,
    impression_heading: Regex,
    plan_heading: Regex,
    section_heading: Regex,
    signature_line: Regex,
    list_marker: Regex,
    numbered_line: Regex,
    icd_line: Regex,
}

impl FieldExtractor {
    pub fn new() -> Result<Self> {
        const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

        Ok(Self {
            labeled_date: Regex::new(
                r"(?i)\b(?:date\s+of\s+service|collection\s+date|date\s+collected|visit\s+date|date\s+of\s+visit|encounter\s+date|service\s+date)\b\s*[:#-]?[ \t]*([^\n]{0,40})",
            )
            .context("failed to compile labeled date regex")?,
            numeric_date: Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4}|\d{2})\b")
                .context("failed to compile numeric date regex")?,
            bare_date: Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b")
                .context("failed to compile bare date regex")?,
            month_name_date: Regex::new(&format!(
                r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
            ))
            .context("failed to compile month-name date regex")?,
            name_numeric_date: Regex::new(r"(?:^|\D)(\d{1,2})[-_](\d{1,2})[-_](\d{4}|\d{2})(?:\D|$)")
                .context("failed to compile file-name date regex")?,
            name_iso_date: Regex::new(r"(?:^|\D)(\d{4})[-_](\d{1,2})[-_](\d{1,2})(?:\D|$)")
                .context("failed to compile file-name ISO date regex")?,
            name_month_token: Regex::new(&format!(
                r"(?i)(?:^|[^a-z])({MONTHS})\.?(?:[^a-z0-9]+(\d{{1,2}})(?:st|nd|rd|th)?\b)?(?:[^a-z0-9]+(\d{{4}}))?(?:[^a-z]|$)"
            ))
            .context("failed to compile file-name month regex")?,
            visit_folder: Regex::new(r"^\s*\d{1,2}[_\s-]+(.+?)\s+-\s+(.+?)\s*$")
                .context("failed to compile visit folder regex")?,
            labeled_test_name: Regex::new(
                r"(?im)^[ \t]*(?:test(?:[ \t]+name)?|component|analyte|lab[ \t]+test)[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            )
            .context("failed to compile test name regex")?,
            range_marker: Regex::new(r"(?i)^\s*(?:normal|reference|standard)\s+range\s*:?\s*(.*)$")
                .context("failed to compile range marker regex")?,
            range_bounds: Regex::new(
                r"^\s*([<>]=?\s*-?\d+(?:\.\d+)?|-?\d+(?:\.\d+)?\s*-\s*-?\d+(?:\.\d+)?)\s*(.*)$",
            )
            .context("failed to compile range bounds regex")?,
            labeled_result: Regex::new(
                r"(?im)^[ \t]*(?:result|value|your[ \t]+value)[ \t]*:[ \t]*([<>]?[ \t]*-?\d+(?:\.\d+)?)(?:[ \t]+(\S+))?",
            )
            .context("failed to compile labeled result regex")?,
            value_line: Regex::new(r"^\s*([<>]?\s*-?\d+(?:\.\d+)?)(?:\s+(\S+))?(?:\s+\S+)?\s*$")
                .context("failed to compile value line regex")?,
            lab_row: Regex::new(
                r"(?m)^[ \t]*([A-Za-z][A-Za-z0-9 ,()/%+-]*?)[ \t]{2,}([<>]?[ \t]*\d+(?:\.\d+)?)[ \t]*(?:([HL])[ \t]+)?([^\s\d<>][^\s]*)?[ \t]+(\d+(?:\.\d+)?[ \t]*-[ \t]*\d+(?:\.\d+)?|[<>]=?[ \t]*\d+(?:\.\d+)?)[ \t]*$",
            )
            .context("failed to compile lab row regex")?,
            labeled_unit: Regex::new(r"(?im)^[ \t]*units?[ \t]*:[ \t]*(\S+)")
                .context("failed to compile unit regex")?,
            labeled_comment: Regex::new(
                r"(?im)^[ \t]*(?:comments?|notes?|interpretation)[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            )
            .context("failed to compile comment regex")?,
            labeled_provider: Regex::new(
                r"(?im)^[ \t]*(?:provider|physician|attending(?:[ \t]+physician)?|ordering[ \t]+(?:provider|physician)|rendering[ \t]+provider|authorizing[ \t]+provider|seen[ \t]+by|signed[ \t]+by)[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            )
            .context("failed to compile labeled provider regex")?,
            doctor_name: Regex::new(r"\bDr\.?[ \t]+([A-Z][A-Za-z'-]+(?:[ \t]+[A-Z][A-Za-z'-]+)?)")
                .context("failed to compile doctor name regex")?,
            credentialed_name: Regex::new(
                r"\b([A-Z][A-Za-z'-]+(?:[ \t]+[A-Z]\.?)?(?:[ \t]+[A-Z][A-Za-z'-]+)+),?[ \t]+(?:MD|M\.D\.|DO|NP|FNP|APRN|PA-C|PA)\b",
            )
            .context("failed to compile credentialed name regex")?,
            labeled_location: Regex::new(
                r"(?im)^[ \t]*(?:location|facility|clinic|department|place[ \t]+of[ \t]+service)[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            )
            .context("failed to compile location regex")?,
            labeled_title: Regex::new(
                r"(?im)^[ \t]*(?:reason[ \t]+for[ \t]+visit|visit[ \t]+reason|chief[ \t]+complaint|encounter[ \t]+type|visit[ \t]+type)[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            )
            .context("failed to compile visit title regex")?,
            visit_heading: Regex::new(
                r"(?i)\b(?:office\s+visit|progress\s+notes?|consultation|follow[- ]?up\s+visit|telehealth\s+visit|procedure\s+note|operative\s+report|emergency\s+department)\b",
            )
            .context("failed to compile visit heading regex")?,
            diagnosis_heading: Regex::new(
                r"(?i)^\s*(?:assessment(?:\s*(?:and|&|/)\s*plan)?|diagnos[ie]s|problems?(?:\s+list)?|active\s+problems)\s*:\s*(.*)$",
            )
            .context("failed to compile diagnosis heading regex")?,
            impression_heading: Regex::new(r"(?i)^\s*(?:clinical\s+)?impressions?\s*:\s*(.*)$")
                .context("failed to compile impression heading regex")?,
            plan_heading: Regex::new(r"(?i)^\s*plan\s*:\s*(.*)$")
                .context("failed to compile plan heading regex")?,
            section_heading: Regex::new(r"^\s*[A-Z][A-Za-z /&]{2,40}:\s*$")
                .context("failed to compile section heading regex")?,
            signature_line: Regex::new(
                r"(?i)^\s*(?:electronically\s+signed|signed\s+by|signature|attestation)\b",
            )
            .context("failed to compile signature regex")?,
            list_marker: Regex::new(r"(?m)^\s*[•*-]\s+|(?:^|\s)\d{1,2}[.)]\s+")
                .context("failed to compile list marker regex")?,
            numbered_line: Regex::new(r"^\s*\d{1,2}[.)]\s+([A-Z][^:]{2,})$")
                .context("failed to compile numbered line regex")?,
            icd_line: Regex::new(r"^\s*[A-TV-Z]\d{2}(?:\.\d{1,4})?\s*[-:]?\s+(\S.*)$")
                .context("failed to compile ICD line regex")?,
        })
    }
}
