use chrono::NaiveDate;
use regex::Captures;

use super::FieldExtractor;
use crate::model::{DateSource, ResolvedDate};

const BARE_DATE_LINE_WINDOW: usize = 50;

/// Fallback sources for a document's date beyond its own text.
#[derive(Debug, Clone, Copy)]
pub struct DateContext<'a> {
    pub file_name: &'a str,
    pub visit_folder: Option<&'a str>,
    pub parent_dir: Option<&'a str>,
    pub path_year: Option<i32>,
    pub today: NaiveDate,
}

impl FieldExtractor {
    /// Always produces a date; the returned source says how much to trust it.
    pub fn resolve_date(&self, text: &str, ctx: &DateContext<'_>) -> ResolvedDate {
        self.labeled_date(text)
            .map(tier(DateSource::LabeledField))
            .or_else(|| self.bare_date(text).map(tier(DateSource::TextBody)))
            .or_else(|| {
                self.name_date(ctx.file_name, ctx.path_year)
                    .map(tier(DateSource::FileName))
            })
            .or_else(|| {
                ctx.visit_folder
                    .and_then(|folder| self.name_date(folder, ctx.path_year))
                    .map(tier(DateSource::VisitFolder))
            })
            .or_else(|| {
                ctx.parent_dir
                    .and_then(year_directory)
                    .map(tier(DateSource::ParentDirectoryYear))
            })
            .or_else(|| {
                ctx.path_year
                    .and_then(january_first)
                    .map(tier(DateSource::PathYear))
            })
            .unwrap_or(ResolvedDate {
                date: ctx.today,
                source: DateSource::RunDate,
            })
    }

    /// "Date of Service: 06/15/2023", "Collection Date: June 15, 2023", ...
    pub(super) fn labeled_date(&self, text: &str) -> Option<NaiveDate> {
        self.labeled_date.captures_iter(text).find_map(|captures| {
            let tail = captures.get(1)?.as_str();
            self.numeric_date
                .captures(tail)
                .and_then(|found| month_day_year(&found))
                .or_else(|| {
                    self.month_name_date
                        .captures(tail)
                        .and_then(|found| month_name_day_year(&found))
                })
        })
    }

    /// First MM/DD/YYYY token near the top of the document.
    pub(super) fn bare_date(&self, text: &str) -> Option<NaiveDate> {
        text.lines()
            .take(BARE_DATE_LINE_WINDOW)
            .flat_map(|line| self.bare_date.captures_iter(line))
            .find_map(|captures| month_day_year(&captures))
    }

    /// Dates embedded in a file or folder name: `06-15-2023`, `06_15_23`,
    /// `2023-06-15`, `June 15 2023`, or a bare month token combined with the
    /// year taken from the path.
    pub(super) fn name_date(&self, name: &str, fallback_year: Option<i32>) -> Option<NaiveDate> {
        if let Some(date) = self
            .name_numeric_date
            .captures(name)
            .and_then(|captures| month_day_year(&captures))
        {
            return Some(date);
        }

        if let Some(captures) = self.name_iso_date.captures(name) {
            let year = parse_number::<i32>(&captures, 1)?;
            let month = parse_number::<u32>(&captures, 2)?;
            let day = parse_number::<u32>(&captures, 3)?;
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }

        let captures = self.name_month_token.captures(name)?;
        let month = month_number(captures.get(1)?.as_str())?;
        let day = parse_number::<u32>(&captures, 2).unwrap_or(1);
        let year = parse_number::<i32>(&captures, 3).or(fallback_year)?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn tier(source: DateSource) -> impl Fn(NaiveDate) -> ResolvedDate {
    move |date| ResolvedDate { date, source }
}

/// A directory name made of exactly four digits, read as a year.
pub(super) fn year_segment(name: &str) -> Option<i32> {
    let name = name.trim();
    if name.len() != 4 || !name.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

fn year_directory(name: &str) -> Option<NaiveDate> {
    year_segment(name).and_then(january_first)
}

fn january_first(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

fn parse_number<T: std::str::FromStr>(captures: &Captures<'_>, index: usize) -> Option<T> {
    captures.get(index)?.as_str().parse().ok()
}

fn expand_year(year: i32) -> i32 {
    if year < 100 { 2000 + year } else { year }
}

fn month_day_year(captures: &Captures<'_>) -> Option<NaiveDate> {
    let month = parse_number::<u32>(captures, 1)?;
    let day = parse_number::<u32>(captures, 2)?;
    let year = expand_year(parse_number::<i32>(captures, 3)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_name_day_year(captures: &Captures<'_>) -> Option<NaiveDate> {
    let month = month_number(captures.get(1)?.as_str())?;
    let day = parse_number::<u32>(captures, 2)?;
    let year = parse_number::<i32>(captures, 3)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub(super) fn month_number(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?.to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
