use anyhow::{Context, Result};
use regex::Regex;

use crate::model::VisitType;

pub const DEFAULT_CATEGORY: &str = "General";

/// Category → keywords, checked in order; the first category with a hit wins.
/// Keywords shorter than four characters must match a whole word so that
/// "alt" does not fire on "salt".
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Thyroid",
        &["tsh", "t3", "t4", "thyroid", "tpo", "thyroglobulin", "thyroxine"],
    ),
    ("Blood Sugar", &["glucose", "a1c", "hba1c", "insulin"]),
    (
        "Lipids",
        &["cholesterol", "ldl", "hdl", "triglyceride", "lipid"],
    ),
    ("Iron", &["iron", "ferritin", "tibc", "transferrin"]),
    ("Vitamins", &["vitamin", "b12", "folate", "25-oh"]),
    ("Kidney", &["creatinine", "bun", "egfr", "urea", "urinalysis"]),
    (
        "Liver",
        &["alt", "ast", "bilirubin", "albumin", "alkaline phosphatase", "hepatic"],
    ),
    (
        "Blood Count",
        &["cbc", "hemoglobin", "hematocrit", "wbc", "rbc", "platelet"],
    ),
    (
        "Hormones",
        &["estradiol", "testosterone", "cortisol", "progesterone", "fsh", "lh", "prolactin"],
    ),
    ("Inflammation", &["crp", "esr", "sed rate", "sedimentation"]),
    (
        "Imaging",
        &["x-ray", "xray", "mri", "ct scan", "ultrasound", "imaging", "echocardiogram"],
    ),
    ("Blood Work", &["blood", "panel", "cmp", "bmp", "metabolic"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    LabResult,
    Visit,
}

pub struct Classifier {
    abnormal_marker: Regex,
    visit_types: Vec<(VisitType, Regex)>,
    lab_markers: Vec<Regex>,
    visit_markers: Vec<Regex>,
}

impl Classifier {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("failed to compile classifier regex {pattern}"))
        };

        Ok(Self {
            abnormal_marker: compile(r"(?i)abnormal|critical|out\s+of\s+range|high|low")?,
            visit_types: vec![
                (
                    VisitType::Emergency,
                    compile(r"(?i)\b(?:emergency|urgent\s+care|ER\s+visit|ED\s+visit)\b")?,
                ),
                (
                    VisitType::Surgery,
                    compile(r"(?i)\b(?:surgery|surgical|operative\s+report)\b")?,
                ),
                (
                    VisitType::Procedure,
                    compile(r"(?i)\b(?:procedure\s+note|endoscopy|colonoscopy|biopsy|infusion)\b")?,
                ),
                (
                    VisitType::Telehealth,
                    compile(r"(?i)\b(?:telehealth|telemedicine|video\s+visit|virtual\s+visit)\b")?,
                ),
                (
                    VisitType::Consultation,
                    compile(r"(?i)\b(?:consult|consultation|new\s+patient)\b")?,
                ),
                (VisitType::FollowUp, compile(r"(?i)\bfollow[- ]?up\b")?),
            ],
            lab_markers: vec![
                compile(r"(?im)^\s*(?:normal|reference|standard)\s+range\b")?,
                compile(r"(?i)\b(?:collection\s+date|date\s+collected|specimen)\b")?,
                compile(r"(?i)\b(?:lab(?:oratory)?\s+results?|test\s+results?)\b")?,
                compile(r"(?im)^\s*(?:result|your\s+value)\s*:?\s*[<>]?\s*\d")?,
            ],
            visit_markers: vec![
                compile(r"(?i)\boffice\s+visit\b")?,
                compile(r"(?i)\bprogress\s+notes?\b")?,
                compile(r"(?im)^\s*assessment\b")?,
                compile(r"(?im)^\s*plan\s*:")?,
                compile(r"(?i)\b(?:chief\s+complaint|history\s+of\s+present\s+illness|reason\s+for\s+visit)\b")?,
            ],
        })
    }

    /// Text-level abnormality hint: the text contains any flag word,
    /// case-insensitively.
    pub fn has_abnormal_marker(&self, text: &str) -> bool {
        self.abnormal_marker.is_match(text)
    }

    /// Numeric result against its reference range, OR'd with the text hint.
    pub fn is_abnormal(&self, result: &str, reference_range: &str, text: &str) -> bool {
        is_out_of_range(result, reference_range) || self.has_abnormal_marker(text)
    }

    pub fn visit_type(&self, text: &str) -> VisitType {
        self.visit_types
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(visit_type, _)| *visit_type)
            .unwrap_or(VisitType::OfficeVisit)
    }

    /// Lab reports win only on strictly more lab evidence than visit
    /// evidence; anything ambiguous is treated as a visit.
    pub fn document_kind(&self, text: &str, lab_path_hint: bool) -> DocumentKind {
        let lab_score = self
            .lab_markers
            .iter()
            .filter(|pattern| pattern.is_match(text))
            .count()
            + usize::from(lab_path_hint);
        let visit_score = self
            .visit_markers
            .iter()
            .filter(|pattern| pattern.is_match(text))
            .count();

        if lab_score > visit_score {
            DocumentKind::LabResult
        } else {
            DocumentKind::Visit
        }
    }
}

pub fn categorize(name: &str) -> &'static str {
    let lowered = name.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|keyword| {
                if keyword.len() >= 4 {
                    lowered.contains(keyword)
                } else {
                    words.contains(keyword)
                }
            })
        })
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// `lo-hi`: abnormal strictly outside the bounds. `<X`: abnormal at or above
/// X. `>X`: abnormal at or below X. Anything unparseable is not abnormal.
pub fn is_out_of_range(result: &str, reference_range: &str) -> bool {
    let Some(value) = leading_number(result) else {
        return false;
    };
    let range = reference_range.trim();

    if let Some((low, high)) = range.split_once('-') {
        return match (leading_number(low), leading_number(high)) {
            (Some(min), Some(max)) => value < min || value > max,
            _ => false,
        };
    }
    if let Some((_, bound)) = range.split_once('<') {
        return leading_number(bound.trim_start_matches('='))
            .is_some_and(|bound| value >= bound);
    }
    if let Some((_, bound)) = range.split_once('>') {
        return leading_number(bound.trim_start_matches('='))
            .is_some_and(|bound| value <= bound);
    }
    false
}

/// Parses the numeric prefix of `raw` ("5.2 H" → 5.2), ignoring leading spaces.
pub fn leading_number(raw: &str) -> Option<f64> {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let mut seen_dot = false;
    while let Some(byte) = bytes.get(end) {
        match byte {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }

    text[..end].parse::<f64>().ok().filter(|value| value.is_finite())
}
