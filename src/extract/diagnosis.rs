use regex::Regex;

use super::FieldExtractor;
use crate::util::collapse_whitespace;

const MIN_ITEM_CHARS: usize = 3;
const MAX_LISTED_ITEMS: usize = 20;

impl FieldExtractor {
    /// Diagnoses named in a visit note. Clinical notes are formatted
    /// inconsistently, so several strategies run in order and the first one
    /// that yields anything wins.
    pub fn diagnoses(&self, text: &str) -> Vec<String> {
        self.section_items(text, &self.diagnosis_heading)
            .or_else(|| self.section_items(text, &self.impression_heading))
            .or_else(|| self.listed_items(text))
            .unwrap_or_default()
    }

    /// Items under the first heading matching `heading`, up to a blank line,
    /// the plan, a signature, or the next section heading.
    pub(super) fn section_items(&self, text: &str, heading: &Regex) -> Option<Vec<String>> {
        let lines: Vec<&str> = text.lines().collect();
        let (start, inline) = lines.iter().copied().enumerate().find_map(|(index, line)| {
            let captures = heading.captures(line)?;
            Some((index, captures.get(1).map(|m| m.as_str().trim()).unwrap_or("")))
        })?;

        let mut collected: Vec<&str> = Vec::new();
        if !inline.is_empty() {
            collected.push(inline);
        }

        for line in &lines[start + 1..] {
            let line = line.trim();
            if line.is_empty() {
                if collected.is_empty() {
                    continue;
                }
                break;
            }
            if self.plan_heading.is_match(line)
                || self.signature_line.is_match(line)
                || self.section_heading.is_match(line)
            {
                break;
            }
            collected.push(line);
        }

        let items = self.split_items(&collected.join("\n"));
        (!items.is_empty()).then_some(items)
    }

    /// Splits on numbered or bulleted markers; unmarked blocks split per line.
    fn split_items(&self, block: &str) -> Vec<String> {
        let pieces: Vec<String> = if self.list_marker.is_match(block) {
            self.list_marker
                .split(block)
                .map(collapse_whitespace)
                .collect()
        } else {
            block.lines().map(collapse_whitespace).collect()
        };

        pieces
            .into_iter()
            .map(|item| item.trim_end_matches([';', ',', '.']).trim().to_string())
            .filter(|item| item.chars().count() >= MIN_ITEM_CHARS)
            .collect()
    }

    /// Last resort: ICD-coded lines, otherwise numbered lines that start
    /// with a capital letter.
    fn listed_items(&self, text: &str) -> Option<Vec<String>> {
        let coded: Vec<String> = text
            .lines()
            .filter_map(|line| self.icd_line.captures(line))
            .filter_map(|captures| captures.get(1).map(|m| collapse_whitespace(m.as_str())))
            .filter(|item| item.chars().count() >= MIN_ITEM_CHARS)
            .take(MAX_LISTED_ITEMS)
            .collect();
        if !coded.is_empty() {
            return Some(coded);
        }

        let numbered: Vec<String> = text
            .lines()
            .filter_map(|line| self.numbered_line.captures(line))
            .filter_map(|captures| captures.get(1).map(|m| collapse_whitespace(m.as_str())))
            .map(|item| item.trim_end_matches([';', ',', '.']).to_string())
            .filter(|item| item.chars().count() >= MIN_ITEM_CHARS)
            .take(MAX_LISTED_ITEMS)
            .collect();
        (!numbered.is_empty()).then_some(numbered)
    }
}
