use std::path::Path;

use serde::Serialize;

use super::FieldExtractor;
use crate::util::{collapse_whitespace, truncate_chars};

/// Rows above or below a range marker searched for the value and test name.
const RANGE_NEIGHBOURHOOD: usize = 3;
const NOTES_MAX_CHARS: usize = 2000;
const NOTES_FALLBACK_LINES: usize = 20;
pub(super) const TITLE_MAX_CHARS: usize = 120;
const PROVIDER_MAX_CHARS: usize = 80;
const FLAG_TOKENS: &[&str] = &["H", "L", "(H)", "(L)", "High", "Low", "HIGH", "LOW"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabFields {
    pub test_name: String,
    pub result: String,
    pub unit: String,
    pub reference_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LabRow {
    name: String,
    result: String,
    unit: Option<String>,
    reference_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RangeMarker {
    line_index: usize,
    reference_range: Option<String>,
    unit: Option<String>,
}

impl FieldExtractor {
    pub fn lab_fields(&self, text: &str, file_name: &str) -> LabFields {
        let lines: Vec<&str> = text.lines().collect();
        let row = self.lab_row(text);
        let marker = self.range_marker(&lines);
        let value_near_marker = marker.as_ref().and_then(|marker| {
            self.value_before(&lines, marker.line_index)
                .or_else(|| self.value_after(&lines, marker.line_index))
        });

        let test_name = self
            .labeled_test_name(text)
            .or_else(|| row.as_ref().map(|row| row.name.clone()))
            .or_else(|| {
                marker
                    .as_ref()
                    .and_then(|marker| name_before(&lines, marker.line_index))
            })
            .map(|name| truncate_chars(&name, TITLE_MAX_CHARS))
            .unwrap_or_else(|| clean_file_stem(file_name));

        let labeled_result = self.labeled_result(text);
        let result = labeled_result
            .as_ref()
            .map(|(value, _)| value.clone())
            .or_else(|| row.as_ref().map(|row| row.result.clone()))
            .or_else(|| value_near_marker.as_ref().map(|(value, _)| value.clone()))
            .unwrap_or_default();

        let unit = marker
            .as_ref()
            .and_then(|marker| marker.unit.clone())
            .or_else(|| row.as_ref().and_then(|row| row.unit.clone()))
            .or_else(|| labeled_result.and_then(|(_, unit)| unit))
            .or_else(|| value_near_marker.and_then(|(_, unit)| unit))
            .or_else(|| self.capture_first(&self.labeled_unit, text))
            .unwrap_or_default();

        let reference_range = marker
            .and_then(|marker| marker.reference_range)
            .or_else(|| row.map(|row| row.reference_range))
            .unwrap_or_default();

        LabFields {
            test_name,
            result,
            unit,
            reference_range,
        }
    }

    pub fn lab_notes(&self, text: &str) -> String {
        self.capture_first(&self.labeled_comment, text)
            .map(|comment| truncate_chars(&comment, NOTES_MAX_CHARS))
            .unwrap_or_default()
    }

    /// Explicit label, then "Dr. First Last", then "First Last, MD".
    pub fn provider(&self, text: &str) -> Option<String> {
        self.capture_first(&self.labeled_provider, text)
            .or_else(|| {
                self.doctor_name
                    .captures(text)
                    .and_then(|captures| captures.get(1))
                    .map(|name| format!("Dr. {}", collapse_whitespace(name.as_str())))
            })
            .or_else(|| self.capture_first(&self.credentialed_name, text))
            .map(|name| truncate_chars(&name, PROVIDER_MAX_CHARS))
            .filter(|name| !name.is_empty())
    }

    pub fn location(&self, text: &str) -> String {
        self.capture_first(&self.labeled_location, text)
            .unwrap_or_default()
    }

    pub fn visit_title(&self, text: &str, file_name: &str) -> String {
        self.capture_first(&self.labeled_title, text)
            .or_else(|| {
                text.lines()
                    .take(10)
                    .map(str::trim)
                    .find(|line| self.visit_heading.is_match(line))
                    .map(collapse_whitespace)
            })
            .map(|title| truncate_chars(&title, TITLE_MAX_CHARS))
            .unwrap_or_else(|| clean_file_stem(file_name))
    }

    /// The plan section when present, otherwise the opening lines.
    pub fn visit_notes(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let plan = lines.iter().enumerate().find_map(|(index, line)| {
            let captures = self.plan_heading.captures(line)?;
            let mut collected = Vec::new();
            let inline = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if !inline.is_empty() {
                collected.push(inline.to_string());
            }
            for next in &lines[index + 1..] {
                let next = next.trim();
                if next.is_empty() && !collected.is_empty() {
                    break;
                }
                if self.signature_line.is_match(next) || self.section_heading.is_match(next) {
                    break;
                }
                if !next.is_empty() {
                    collected.push(next.to_string());
                }
            }
            (!collected.is_empty()).then(|| collected.join("\n"))
        });

        let notes = plan.unwrap_or_else(|| {
            lines
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .take(NOTES_FALLBACK_LINES)
                .collect::<Vec<_>>()
                .join("\n")
        });

        truncate_chars(&notes, NOTES_MAX_CHARS)
    }

    pub(super) fn labeled_test_name(&self, text: &str) -> Option<String> {
        self.capture_first(&self.labeled_test_name, text)
    }

    fn labeled_result(&self, text: &str) -> Option<(String, Option<String>)> {
        let captures = self.labeled_result.captures(text)?;
        let value = compact_number(captures.get(1)?.as_str());
        let unit = captures
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|unit| !is_flag_token(unit));
        Some((value, unit))
    }

    /// A layout-preserved table row: `Name   value [flag] [unit]   range`.
    fn lab_row(&self, text: &str) -> Option<LabRow> {
        let captures = self.lab_row.captures(text)?;
        Some(LabRow {
            name: collapse_whitespace(captures.get(1)?.as_str()),
            result: compact_number(captures.get(2)?.as_str()),
            unit: captures.get(4).map(|m| m.as_str().to_string()),
            reference_range: collapse_whitespace(captures.get(5)?.as_str()),
        })
    }

    /// Finds the first "Normal range:" style line. The range itself may sit
    /// on the marker line or on the next non-empty line.
    fn range_marker(&self, lines: &[&str]) -> Option<RangeMarker> {
        let (line_index, rest) = lines.iter().copied().enumerate().find_map(|(index, line)| {
            let captures = self.range_marker.captures(line)?;
            Some((index, captures.get(1).map(|m| m.as_str()).unwrap_or("")))
        })?;

        let range_source = if rest.trim().is_empty() {
            lines[line_index + 1..]
                .iter()
                .find(|line| !line.trim().is_empty())
                .copied()
                .unwrap_or("")
        } else {
            rest
        };

        let (reference_range, unit) = match self.range_bounds.captures(range_source) {
            Some(captures) => (
                captures.get(1).map(|m| collapse_whitespace(m.as_str())),
                captures
                    .get(2)
                    .and_then(|m| m.as_str().split_whitespace().next())
                    .map(ToOwned::to_owned),
            ),
            None => (None, None),
        };

        Some(RangeMarker {
            line_index,
            reference_range,
            unit,
        })
    }

    fn value_before(&self, lines: &[&str], marker: usize) -> Option<(String, Option<String>)> {
        let start = marker.saturating_sub(RANGE_NEIGHBOURHOOD);
        lines[start..marker]
            .iter()
            .rev()
            .find_map(|line| self.value_on_line(line))
    }

    fn value_after(&self, lines: &[&str], marker: usize) -> Option<(String, Option<String>)> {
        lines
            .iter()
            .skip(marker + 1)
            .take(RANGE_NEIGHBOURHOOD)
            .find_map(|line| self.value_on_line(line))
    }

    fn value_on_line(&self, line: &str) -> Option<(String, Option<String>)> {
        let captures = self.value_line.captures(line)?;
        let value = compact_number(captures.get(1)?.as_str());
        let unit = captures
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|unit| !is_flag_token(unit));
        Some((value, unit))
    }

    pub(super) fn capture_first(&self, regex: &regex::Regex, text: &str) -> Option<String> {
        regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|m| collapse_whitespace(m.as_str()))
            .filter(|value| !value.is_empty())
    }
}

/// The nearest line above the marker that reads like a name rather than a
/// label or a number.
fn name_before(lines: &[&str], marker: usize) -> Option<String> {
    let start = marker.saturating_sub(RANGE_NEIGHBOURHOOD);
    lines[start..marker]
        .iter()
        .rev()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .find(|line| !looks_like_label_or_number(line))
        .map(collapse_whitespace)
}

pub(super) fn looks_like_label_or_number(line: &str) -> bool {
    const LABEL_WORDS: &[&str] = &[
        "value",
        "your value",
        "result",
        "flag",
        "units",
        "unit",
        "in range",
        "out of range",
    ];

    let trimmed = line.trim();
    if trimmed.contains(':') {
        return true;
    }
    let starts_numeric = trimmed
        .trim_start_matches(['<', '>', '=', '-', ' '])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if starts_numeric {
        return true;
    }
    let lowered = trimmed.to_ascii_lowercase();
    LABEL_WORDS.contains(&lowered.as_str())
}

fn is_flag_token(token: &str) -> bool {
    FLAG_TOKENS.contains(&token)
}

fn compact_number(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// A readable name derived from a file name: extension, date fragments and
/// separators removed. Never empty.
pub fn clean_file_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);

    let words: Vec<&str> = stem
        .split(['_', '-', ' ', '.'])
        .filter(|word| !word.is_empty())
        .filter(|word| !word.bytes().all(|byte| byte.is_ascii_digit()))
        .collect();

    if !words.is_empty() {
        return words.join(" ");
    }

    let stem = stem.trim();
    if !stem.is_empty() {
        return stem.to_string();
    }
    if !file_name.trim().is_empty() {
        return file_name.trim().to_string();
    }
    "Untitled document".to_string()
}
