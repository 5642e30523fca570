use assert_matches::assert_matches;
use chrono::NaiveDate;

use edgar_insiders::domain::{DatasetName, Quarter, ReportFormat, parse_iso_date};
use edgar_insiders::error::InsiderError;

#[test]
fn dataset_name_parses_and_prints() {
    let name: DatasetName = "2023q4_form345.zip".parse().unwrap();
    assert_eq!(name.year(), 2023);
    assert_eq!(name.quarter().get(), 4);
    assert_eq!(name.to_string(), "2023q4_form345.zip");
}

#[test]
fn dataset_name_rejects_other_files() {
    for bad in ["2023q5_form345.zip", "23q1_form345.zip", "2023q1.zip", "readme.htm"] {
        assert_matches!(
            bad.parse::<DatasetName>(),
            Err(InsiderError::InvalidDatasetName(_)),
            "{bad}"
        );
    }
}

#[test]
fn quarter_accepts_prefix() {
    assert_eq!("Q3".parse::<Quarter>().unwrap().get(), 3);
    assert_eq!(" 2 ".parse::<Quarter>().unwrap().get(), 2);
}

#[test]
fn latest_completed_is_previous_quarter() {
    let today = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
    assert_eq!(
        DatasetName::latest_completed(today).file_name(),
        "2024q2_form345.zip"
    );
}

#[test]
fn iso_dates_and_formats() {
    assert_eq!(
        parse_iso_date("2024-03-15").unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    );
    assert_matches!(parse_iso_date("15-MAR-2024"), Err(InsiderError::InvalidDate(_)));
    assert_eq!(ReportFormat::default().to_string(), "csv");
}
