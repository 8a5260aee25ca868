//! Tests for the CSV-backed workbook

use std::fs;

use tempfile::tempdir;

use certmail::error::Error;
use certmail::sheets::{CsvWorkbook, SpreadsheetDocument, Worksheet, MAILING_SHEET};

fn write_workbook(dir: &std::path::Path) {
    fs::write(
        dir.join("workbook.json"),
        r#"{"title": "19 - 20 Февраля 2025 Практика запуска речи", "sheets": ["registrations", "mailing"]}"#,
    )
    .unwrap();
    fs::write(
        dir.join("registrations.csv"),
        "Timestamp,Email,Family,Name,Father,Phone\n\
         01-02-2025 10:00:00,maria@example.com,Иванова,Мария,,89161234567\n",
    )
    .unwrap();
}

#[test]
fn test_open_reads_title_and_sheet_order() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    assert_eq!(workbook.title(), "19 - 20 Февраля 2025 Практика запуска речи");
    assert_eq!(workbook.registrations().unwrap().name(), "registrations");
}

#[test]
fn test_registration_rows_round_trip() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    let rows = workbook.registrations().unwrap().get_all_values().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1], "maria@example.com");
    assert_eq!(rows[1][2], "Иванова");
}

#[test]
fn test_missing_sheet_file_reads_as_empty() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    let mailing = workbook.worksheet(MAILING_SHEET).unwrap();
    assert!(mailing.get_all_values().unwrap().is_empty());
}

#[test]
fn test_unknown_sheet_is_an_error() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    assert!(matches!(workbook.worksheet("other"), Err(Error::WorksheetNotFound(_))));
}

#[test]
fn test_update_cell_persists_across_reopen() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    {
        let workbook = CsvWorkbook::open(dir.path()).unwrap();
        let mailing = workbook.worksheet(MAILING_SHEET).unwrap();
        mailing
            .append_rows(&[
                vec!["fio".into(), "is_sent".into(), "email".into(), "custom_text".into()],
                vec!["Марии Ивановой".into(), "FALSE".into(), "a@b.ru".into(), String::new()],
            ])
            .unwrap();
        mailing.update_cell(2, 2, "TRUE").unwrap();
    }

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    let rows = workbook.worksheet(MAILING_SHEET).unwrap().get_all_values().unwrap();
    assert_eq!(rows[1][1], "TRUE");
    assert_eq!(rows[1][0], "Марии Ивановой");
}

#[test]
fn test_clear_empties_the_sheet() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    let sheet = workbook.registrations().unwrap();
    sheet.clear().unwrap();
    assert!(sheet.get_all_values().unwrap().is_empty());
}

#[test]
fn test_add_worksheet_persists_in_the_manifest() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let mut workbook = CsvWorkbook::open(dir.path()).unwrap();
    let sheet = workbook.add_worksheet("extra").unwrap();
    sheet.append_row(&["x".to_string()]).unwrap();

    let reopened = CsvWorkbook::open(dir.path()).unwrap();
    assert_eq!(reopened.worksheet("extra").unwrap().get_all_values().unwrap().len(), 1);
}

#[test]
fn test_delete_worksheet_removes_manifest_entry_and_file() {
    let dir = tempdir().unwrap();
    write_workbook(dir.path());

    let mut workbook = CsvWorkbook::open(dir.path()).unwrap();
    workbook.delete_worksheet("registrations").unwrap();
    assert!(workbook.worksheet("registrations").is_err());
    assert!(!dir.path().join("registrations.csv").exists());

    let reopened = CsvWorkbook::open(dir.path()).unwrap();
    assert!(reopened.worksheet("registrations").is_err());
}

#[test]
fn test_missing_manifest_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(CsvWorkbook::open(dir.path()).is_err());
}
