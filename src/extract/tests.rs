use std::path::Path;

use chrono::NaiveDate;

use super::fields::{TITLE_MAX_CHARS, clean_file_stem, looks_like_label_or_number};
use super::path_context::normalize_provider_name;
use super::*;
use crate::model::DateSource;

fn extractor() -> FieldExtractor {
    FieldExtractor::new().unwrap()
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn context<'a>(file_name: &'a str) -> DateContext<'a> {
    DateContext {
        file_name,
        visit_folder: None,
        parent_dir: None,
        path_year: None,
        today: ymd(2026, 3, 1),
    }
}

#[test]
fn labeled_date_wins_over_everything_else() {
    let text = "Printed 01/02/2024\nDate of Service: 06/15/2023\n";
    let mut ctx = context("03-04-2022 labs.pdf");
    ctx.parent_dir = Some("2021");

    let resolved = extractor().resolve_date(text, &ctx);

    assert_eq!(resolved.date, ymd(2023, 6, 15));
    assert_eq!(resolved.source, DateSource::LabeledField);
}

#[test]
fn labeled_date_accepts_month_names() {
    let text = "Collection Date: June 15, 2023 08:12";
    assert_eq!(extractor().labeled_date(text), Some(ymd(2023, 6, 15)));

    let text = "visit date - Sept 3 2021";
    assert_eq!(extractor().labeled_date(text), Some(ymd(2021, 9, 3)));
}

#[test]
fn bare_date_is_only_searched_near_the_top() {
    let mut text = "Lab Report\n11/30/2022\n".to_string();
    assert_eq!(extractor().bare_date(&text), Some(ymd(2022, 11, 30)));

    text = "filler\n".repeat(60) + "11/30/2022\n";
    assert_eq!(extractor().bare_date(&text), None);
}

#[test]
fn invalid_calendar_dates_are_skipped() {
    let text = "Ref 13/45/2023\nResulted 02/28/2023";
    assert_eq!(extractor().bare_date(text), Some(ymd(2023, 2, 28)));
}

#[test]
fn file_name_digits_expand_two_digit_years() {
    let resolved = extractor().resolve_date("", &context("CBC_06_15_23.pdf"));
    assert_eq!(resolved.date, ymd(2023, 6, 15));
    assert_eq!(resolved.source, DateSource::FileName);

    let resolved = extractor().resolve_date("", &context("lipids 2022-11-04.pdf"));
    assert_eq!(resolved.date, ymd(2022, 11, 4));
}

#[test]
fn file_name_month_token_uses_path_year_when_missing() {
    let mut ctx = context("Thyroid panel Mar.pdf");
    ctx.path_year = Some(2020);

    let resolved = extractor().resolve_date("", &ctx);

    assert_eq!(resolved.date, ymd(2020, 3, 1));
    assert_eq!(resolved.source, DateSource::FileName);
}

#[test]
fn month_token_requires_a_word_boundary() {
    assert_eq!(extractor().name_date("Tumor Marker.pdf", Some(2020)), None);
    assert_eq!(extractor().name_date("Mayo summary.pdf", Some(2020)), None);
}

#[test]
fn visit_folder_supplies_the_date_when_the_file_name_has_none() {
    let mut ctx = context("TSH.pdf");
    ctx.visit_folder = Some("06_June 15 2023 - Dr Gagneet");
    ctx.parent_dir = Some("06_June 15 2023 - Dr Gagneet");
    ctx.path_year = Some(2023);

    let resolved = extractor().resolve_date("", &ctx);

    assert_eq!(resolved.date, ymd(2023, 6, 15));
    assert_eq!(resolved.source, DateSource::VisitFolder);
}

#[test]
fn year_parent_directory_means_january_first() {
    for year in [2018, 2021, 2025] {
        let year_name = year.to_string();
        let mut ctx = context("scan.pdf");
        ctx.parent_dir = Some(&year_name);

        let resolved = extractor().resolve_date("", &ctx);

        assert_eq!(resolved.date, ymd(year, 1, 1));
        assert_eq!(resolved.source, DateSource::ParentDirectoryYear);
    }
}

#[test]
fn non_year_parent_falls_back_to_path_year_then_today() {
    let mut ctx = context("scan.pdf");
    ctx.parent_dir = Some("Cardiology");
    ctx.path_year = Some(2019);
    let resolved = extractor().resolve_date("", &ctx);
    assert_eq!(resolved.date, ymd(2019, 1, 1));
    assert_eq!(resolved.source, DateSource::PathYear);

    ctx.path_year = None;
    let resolved = extractor().resolve_date("", &ctx);
    assert_eq!(resolved.date, ymd(2026, 3, 1));
    assert_eq!(resolved.source, DateSource::RunDate);
}

#[test]
fn tsh_value_sits_above_the_range_marker() {
    let text = "Quest Diagnostics\nTSH\n5.2\nNormal range: 0.4 - 4.0 mIU/L\n";

    let fields = extractor().lab_fields(text, "TSH.pdf");

    assert_eq!(fields.test_name, "TSH");
    assert_eq!(fields.result, "5.2");
    assert_eq!(fields.unit, "mIU/L");
    assert_eq!(fields.reference_range, "0.4 - 4.0");
}

#[test]
fn value_may_follow_the_range_marker() {
    let text = "Vitamin D, 25-Hydroxy\nNormal range:\n30 - 100 ng/mL\nValue\n42\n";

    let fields = extractor().lab_fields(text, "vitd.pdf");

    assert_eq!(fields.test_name, "Vitamin D, 25-Hydroxy");
    assert_eq!(fields.reference_range, "30 - 100");
    assert_eq!(fields.unit, "ng/mL");
    assert_eq!(fields.result, "42");
}

#[test]
fn flag_tokens_are_not_units() {
    let text = "Ferritin\n8 L\nStandard range: >15\n";

    let fields = extractor().lab_fields(text, "ferritin.pdf");

    assert_eq!(fields.result, "8");
    assert_eq!(fields.reference_range, ">15");
    assert_eq!(fields.unit, "");
}

#[test]
fn explicit_labels_take_precedence() {
    let text = "Test Name: Hemoglobin A1c\nResult: 6.1 %\nReference range: 4.0-5.6\n";

    let fields = extractor().lab_fields(text, "a1c.pdf");

    assert_eq!(fields.test_name, "Hemoglobin A1c");
    assert_eq!(fields.result, "6.1");
    assert_eq!(fields.unit, "%");
    assert_eq!(fields.reference_range, "4.0-5.6");
}

#[test]
fn long_test_names_are_capped_like_titles() {
    let text = format!("Test Name: {}\nResult: 4.2\n", "Panel ".repeat(60));

    let fields = extractor().lab_fields(&text, "panel.pdf");

    assert_eq!(fields.test_name.chars().count(), TITLE_MAX_CHARS);
    assert!(fields.test_name.starts_with("Panel Panel"));
    assert_eq!(fields.result, "4.2");
}

#[test]
fn layout_rows_are_read_as_a_whole() {
    let text = "COMPONENT          VALUE   UNITS    RANGE\n\
                Glucose            105     mg/dL    70-99\n";

    let fields = extractor().lab_fields(text, "cmp.pdf");

    assert_eq!(fields.test_name, "Glucose");
    assert_eq!(fields.result, "105");
    assert_eq!(fields.unit, "mg/dL");
    assert_eq!(fields.reference_range, "70-99");
}

#[test]
fn empty_text_falls_back_to_the_file_name() {
    let fields = extractor().lab_fields("", "TSH.pdf");

    assert_eq!(fields.test_name, "TSH");
    assert_eq!(fields.result, "");
    assert_eq!(fields.reference_range, "");
}

#[test]
fn labels_and_numbers_are_not_names() {
    assert!(looks_like_label_or_number("5.2"));
    assert!(looks_like_label_or_number("<0.5"));
    assert!(looks_like_label_or_number("Collected: 06/15/2023"));
    assert!(looks_like_label_or_number("Your Value"));
    assert!(!looks_like_label_or_number("TSH"));
}

#[test]
fn assessment_numbering_is_stripped() {
    let text = "Office Visit\nAssessment: 1. Hashimoto's Thyroiditis 2. POTS\nPlan: labs in 3 months";

    assert_eq!(
        extractor().diagnoses(text),
        vec!["Hashimoto's Thyroiditis".to_string(), "POTS".to_string()]
    );
}

#[test]
fn assessment_section_spans_lines_until_plan() {
    let text = "Assessment and Plan:\n\n1. Iron deficiency anemia;\n2. Fatigue,\n   likely multifactorial\n3. ok\nPlan:\nStart iron\n";

    assert_eq!(
        extractor().diagnoses(text),
        vec![
            "Iron deficiency anemia".to_string(),
            "Fatigue, likely multifactorial".to_string(),
        ]
    );
}

#[test]
fn unnumbered_section_lines_are_items() {
    let text = "Diagnoses:\nMigraine without aura\nInsomnia\n\nElectronically signed by Dr. Lee";

    assert_eq!(
        extractor().diagnoses(text),
        vec!["Migraine without aura".to_string(), "Insomnia".to_string()]
    );
}

#[test]
fn impression_is_used_when_no_assessment_exists() {
    let text = "MRI Brain\nFindings: unremarkable\nImpression:\n- No acute intracranial abnormality\n";

    assert_eq!(
        extractor().diagnoses(text),
        vec!["No acute intracranial abnormality".to_string()]
    );
}

#[test]
fn coded_lines_are_the_last_resort() {
    let text = "Encounter summary\nE06.3 Autoimmune thyroiditis\nR00.0 - Tachycardia, unspecified\n";

    assert_eq!(
        extractor().diagnoses(text),
        vec![
            "Autoimmune thyroiditis".to_string(),
            "Tachycardia, unspecified".to_string(),
        ]
    );
}

#[test]
fn no_diagnoses_yields_an_empty_list() {
    assert!(extractor().diagnoses("Patient arrived on time.").is_empty());
}

#[test]
fn provider_strategies_run_in_order() {
    let fields = extractor();

    assert_eq!(
        fields.provider("Ordering Provider: Gagneet Chauhan, MD\nDr. Smith"),
        Some("Gagneet Chauhan, MD".to_string())
    );
    assert_eq!(
        fields.provider("Seen today with Dr Gagneet Chauhan\nfor follow-up"),
        Some("Dr. Gagneet Chauhan".to_string())
    );
    assert_eq!(
        fields.provider("Note written by Priya K. Raman, NP"),
        Some("Priya K. Raman".to_string())
    );
    assert_eq!(fields.provider("no clinician named"), None);
}

#[test]
fn visit_title_prefers_reason_for_visit() {
    let fields = extractor();

    assert_eq!(
        fields.visit_title("Office Visit\nReason for Visit: Palpitations\n", "v.txt"),
        "Palpitations"
    );
    assert_eq!(
        fields.visit_title("PROGRESS NOTES\nSubjective: tired", "v.txt"),
        "PROGRESS NOTES"
    );
    assert_eq!(fields.visit_title("", "06-15-2023_cardiology_visit.pdf"), "cardiology visit");
}

#[test]
fn visit_notes_prefer_the_plan_section() {
    let fields = extractor();
    let text = "Assessment: POTS\nPlan: increase fluids\nRecheck in 6 weeks\n\nSigned";

    assert_eq!(fields.visit_notes(text), "increase fluids\nRecheck in 6 weeks");
    assert_eq!(fields.visit_notes("Line one\n\nLine two"), "Line one\nLine two");
}

#[test]
fn location_is_read_from_its_label() {
    assert_eq!(
        extractor().location("Facility:  Mercy   Clinic East\n"),
        "Mercy Clinic East"
    );
    assert_eq!(extractor().location("nothing"), "");
}

#[test]
fn clean_file_stem_drops_dates_and_separators() {
    assert_eq!(clean_file_stem("TSH.pdf"), "TSH");
    assert_eq!(clean_file_stem("2023-06-15_Lipid_Panel.pdf"), "Lipid Panel");
    assert_eq!(clean_file_stem("06152023.pdf"), "06152023");
    assert_eq!(clean_file_stem(""), "Untitled document");
}

#[test]
fn provider_names_are_normalized() {
    assert_eq!(normalize_provider_name("Dr  Gagneet"), "Dr. Gagneet");
    assert_eq!(normalize_provider_name("dr. Lee"), "Dr. Lee");
    assert_eq!(normalize_provider_name("Nurse Kim"), "Nurse Kim");
}

#[test]
fn source_context_follows_the_records_tree_convention() {
    let root = Path::new("/data/records");
    let path = root.join("2023/Endocrinology/06_June 15 2023 - Dr Gagneet/TSH.pdf");

    let doc = extractor().describe_source(root, &path);

    assert_eq!(doc.file_name, "TSH.pdf");
    assert_eq!(doc.year, Some(2023));
    assert_eq!(doc.specialty.as_deref(), Some("Endocrinology"));
    assert_eq!(doc.visit_date, Some(ymd(2023, 6, 15)));
    assert_eq!(doc.visit_provider.as_deref(), Some("Dr. Gagneet"));
    assert_eq!(
        doc.parent_dir_name.as_deref(),
        Some("06_June 15 2023 - Dr Gagneet")
    );
    assert_eq!(
        doc.relative_path,
        Path::new("2023/Endocrinology/06_June 15 2023 - Dr Gagneet/TSH.pdf")
    );
}

#[test]
fn files_directly_under_a_year_have_no_specialty() {
    let root = Path::new("/data/records");
    let doc = extractor().describe_source(root, &root.join("2021/scan.pdf"));

    assert_eq!(doc.year, Some(2021));
    assert_eq!(doc.specialty, None);
    assert_eq!(doc.visit_folder, None);
    assert_eq!(doc.parent_dir_name.as_deref(), Some("2021"));
}
