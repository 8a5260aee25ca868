//! Webinar title parsing.
//!
//! Spreadsheet documents are named after the webinar they collect
//! registrations for, in one of two grammars:
//!
//! * same month:  `19 - 20 Февраля 2025 Грамматика`
//! * cross month: `31 Мая - 2 Июня 2025 Лексика`
//!
//! The trailing ` (Responses)` suffix that form exports append is ignored.
//! Dates come out as a `(started_at, finished_at)` pair plus the topic text.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};

/// Suffix appended by form exports to the response sheet.
const RESPONSES_SUFFIX: &str = " (Responses)";

/// Parsed webinar title: dates bound the event, topic names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub started_at: NaiveDate,
    pub finished_at: NaiveDate,
    pub topic_text: String,
}

/// Title parser with a memo over already-parsed titles.
///
/// The same title is parsed once per webinar import and again for every
/// certificate, so the memo keeps the regex work out of the hot path.
pub struct TitleParser {
    memo: Mutex<HashMap<String, ParsedTitle>>,
}

impl Default for TitleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TitleParser {
    #[must_use]
    pub fn new() -> Self {
        Self { memo: Mutex::new(HashMap::new()) }
    }

    /// Parse a document title into dates and topic text.
    pub fn parse(&self, title: &str) -> Result<ParsedTitle> {
        if let Some(parsed) = self.memo.lock().expect("title memo poisoned").get(title) {
            return Ok(parsed.clone());
        }
        let parsed = parse_title(title)?;
        self.memo
            .lock()
            .expect("title memo poisoned")
            .insert(title.to_string(), parsed.clone());
        Ok(parsed)
    }

}

/// Date block printed on the certificate: the short range on one line and
/// the year (taken from the last day) on the next, e.g.
/// `1 февраля - 2 марта\n2021 г.`.
#[must_use]
pub fn date_text(start: NaiveDate, finish: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}\n{} г.", date_range_text(start, finish), finish.year())
}

/// Short-form date range for the certificate, e.g. `19 - 20 февраля`
/// or `31 мая - 2 июня`.
#[must_use]
pub fn date_range_text(start: NaiveDate, finish: NaiveDate) -> String {
    if month_of(&start) == month_of(&finish) {
        format!(
            "{} - {} {}",
            start.format("%-d"),
            finish.format("%-d"),
            month_name(month_of(&finish))
        )
    } else {
        format!(
            "{} {} - {} {}",
            start.format("%-d"),
            month_name(month_of(&start)),
            finish.format("%-d"),
            month_name(month_of(&finish))
        )
    }
}

fn month_of(date: &NaiveDate) -> u32 {
    use chrono::Datelike;
    date.month()
}

fn same_month_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2}) - (\d{1,2}) (\p{L}+) (\d{4}) (.+)$")
            .expect("same-month pattern is valid")
    })
}

fn cross_month_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2}) (\p{L}+) - (\d{1,2}) (\p{L}+) (\d{4}) (.+)$")
            .expect("cross-month pattern is valid")
    })
}

fn parse_title(raw: &str) -> Result<ParsedTitle> {
    let title = raw.trim().trim_end_matches(RESPONSES_SUFFIX).trim();
    let parsed = if let Some(caps) = same_month_regex().captures(title) {
        let year = parse_year(&caps[4], raw)?;
        let month = month_from_name(&caps[3], raw)?;
        ParsedTitle {
            started_at: date(year, month, parse_day(&caps[1], raw)?, raw)?,
            finished_at: date(year, month, parse_day(&caps[2], raw)?, raw)?,
            topic_text: caps[5].trim().to_string(),
        }
    } else if let Some(caps) = cross_month_regex().captures(title) {
        let year = parse_year(&caps[5], raw)?;
        ParsedTitle {
            started_at: date(year, month_from_name(&caps[2], raw)?, parse_day(&caps[1], raw)?, raw)?,
            finished_at: date(year, month_from_name(&caps[4], raw)?, parse_day(&caps[3], raw)?, raw)?,
            topic_text: caps[6].trim().to_string(),
        }
    } else {
        return Err(Error::InvalidTitle(raw.to_string()));
    };
    // The range must run forwards.
    if parsed.started_at > parsed.finished_at {
        return Err(Error::InvalidTitle(raw.to_string()));
    }
    Ok(parsed)
}

fn parse_day(text: &str, raw: &str) -> Result<u32> {
    text.parse().map_err(|_| Error::InvalidTitle(raw.to_string()))
}

fn parse_year(text: &str, raw: &str) -> Result<i32> {
    text.parse().map_err(|_| Error::InvalidTitle(raw.to_string()))
}

fn date(year: i32, month: u32, day: u32, raw: &str) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| Error::InvalidTitle(raw.to_string()))
}

/// Russian month names in genitive case, as they appear in titles.
const MONTHS: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

fn month_from_name(name: &str, raw: &str) -> Result<u32> {
    let lowered = name.to_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == lowered)
        .map(|idx| idx as u32 + 1)
        .ok_or_else(|| Error::InvalidTitle(raw.to_string()))
}

fn month_name(month: u32) -> &'static str {
    MONTHS[(month - 1) as usize]
}
