//! Participant import from raw spreadsheet rows.
//!
//! Rows come in as plain text tuples in registration-form order:
//! `[timestamp, email, family_name, name, father_name, phone]`. A single
//! corrupt registration must never block everyone else's certificate, so
//! per-row failures are logged and skipped.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::{error, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::Participant;

/// Timestamp format used by the spreadsheet export.
const SHEET_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Parse data rows into participants, skipping malformed ones.
///
/// The caller is expected to have dropped the header row already.
#[must_use]
pub fn import_rows(rows: &[Vec<String>]) -> Vec<Participant> {
    rows.iter()
        .filter_map(|row| match Participant::from_row(row) {
            Ok(participant) => Some(participant),
            Err(err) => {
                error!(error = %err, "skipping malformed registration row");
                metrics::record_rows_skipped(1);
                None
            }
        })
        .collect()
}

impl Participant {
    /// Build a participant from one raw row.
    ///
    /// Fails only on structural problems (too few cells, empty name);
    /// questionable phone or email values are normalized and kept.
    pub fn from_row(row: &[String]) -> Result<Self> {
        if row.len() < 6 {
            return Err(Error::MalformedRow(format!(
                "expected at least 6 cells, got {}",
                row.len()
            )));
        }
        let cell = |idx: usize| row[idx].trim().to_string();
        let family_name = cell(2);
        let name = cell(3);
        if family_name.is_empty() && name.is_empty() {
            return Err(Error::MalformedRow("family name and name are both empty".to_string()));
        }
        Ok(Self {
            registered_at: parse_sheet_timestamp(&cell(0)),
            email: normalize_email(&cell(1)),
            family_name,
            name,
            father_name: cell(4),
            phone: normalize_phone(&cell(5)),
        })
    }
}

/// Normalize a phone number to `+<country><digits>`.
///
/// Everything but digits is stripped, the Russian domestic trunk prefix `8`
/// is rewritten to `7`, and a `+` is prepended. An empty input stays empty.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }
    // "8 916 ..." is the domestic dialing of "+7 916 ...".
    let digits = if trimmed.starts_with('8') {
        format!("7{}", &digits[1..])
    } else {
        digits
    };
    format!("+{digits}")
}

/// Lower-case an email and warn when it does not look like an address.
///
/// The value is kept either way; the ledger is the place where an operator
/// can still fix it before sending.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    let email = raw.trim().to_lowercase();
    if !email.is_empty() && !email_regex().is_match(&email) {
        warn!(email = %email, "registration email does not look like an address");
    }
    email
}

/// Parse a registration timestamp, trying ISO-8601 first, then the two
/// DD-MM-YYYY spreadsheet variants. Unparsable values yield `None`.
#[must_use]
pub fn parse_sheet_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, SHEET_TIMESTAMP_FORMAT))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, &SHEET_TIMESTAMP_FORMAT.replace('-', "/"))
        })
        .ok()
}
