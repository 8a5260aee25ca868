//! Data models for webinars, participants and the mailing ledger
//!
//! This module contains all data structures used throughout the application,
//! including imported participants, persisted webinars and accounts, ledger
//! rows and inflection cache entries.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of a persisted webinar
pub type WebinarId = i64;
/// Identifier of a persisted account
pub type AccountId = i64;

/// The closed set of webinar topics.
///
/// Each topic maps to its canonical registration text, the long-form text
/// printed on the certificate and the subject line used for outgoing email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebinarTopic {
    /// "Формирование базовых грамматических представлений"
    Grammar,
    /// "Практика запуска речи"
    Speech,
    /// "Приёмы формирования фразовой речи"
    Phrase,
    /// Built-in sandbox topic with a deterministic text certificate
    Test,
}

impl WebinarTopic {
    /// Parse a topic from document-title text, case-insensitively.
    pub fn from_text(text: &str) -> Result<Self> {
        match text.trim().to_lowercase().as_str() {
            "формирование базовых грамматических представлений" => Ok(Self::Grammar),
            "практика запуска речи" => Ok(Self::Speech),
            "приёмы формирования фразовой речи" => Ok(Self::Phrase),
            "test webinar" => Ok(Self::Test),
            other => Err(Error::UnknownTopic(other.to_string())),
        }
    }

    /// Canonical lower-case text, used for storage and round-tripping.
    #[must_use]
    pub const fn as_text(&self) -> &'static str {
        match self {
            Self::Grammar => "формирование базовых грамматических представлений",
            Self::Speech => "практика запуска речи",
            Self::Phrase => "приёмы формирования фразовой речи",
            Self::Test => "test webinar",
        }
    }

    /// Long-form text rendered onto the certificate.
    #[must_use]
    pub const fn long_text(&self) -> &'static str {
        match self {
            Self::Grammar => "Формирование базовых\nграмматических представлений",
            Self::Speech => "Практика запуска речи",
            Self::Phrase => "Приёмы формирования\nфразовой речи",
            Self::Test => "Тестовый вебинар",
        }
    }

    /// Subject line for outgoing certificate email.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::Grammar => "Формирование базовых грамматических представлений",
            Self::Speech => "Практика запуска речи",
            Self::Phrase => "Приёмы формирования фразовой речи",
            Self::Test => "Тестовый вебинар",
        }
    }
}

/// One registrant parsed from a spreadsheet row.
///
/// Immutable once constructed; phone and email are normalized but not
/// strictly validated (malformed values are logged, not rejected).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Registration timestamp, if the source provided a parsable one
    pub registered_at: Option<NaiveDateTime>,
    /// Family name as entered
    pub family_name: String,
    /// Given name as entered
    pub name: String,
    /// Patronymic as entered
    pub father_name: String,
    /// Phone normalized to `+<country><digits>`, or empty
    pub phone: String,
    /// Email, lower-cased
    pub email: String,
}

impl Participant {
    /// Full name in "family given patronymic" order, empty parts skipped.
    #[must_use]
    pub fn full_name(&self) -> String {
        [&self.family_name, &self.name, &self.father_name]
            .iter()
            .map(|part| part.as_str())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One scheduled webinar session, persisted in the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webinar {
    /// Database primary key
    pub id: WebinarId,
    /// Timestamp of the import that created this record
    pub imported_at: NaiveDateTime,
    /// Source document reference; unique, upsert key
    pub url: String,
    /// Webinar topic
    pub topic: WebinarTopic,
    /// First day of the webinar
    pub started_at: NaiveDate,
    /// Last day of the webinar, `started_at <= finished_at`
    pub finished_at: NaiveDate,
}

/// A persisted participant row, tied to a webinar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Database primary key
    pub id: AccountId,
    /// Owning webinar
    pub webinar_id: WebinarId,
    /// Registration timestamp (import time when the source had none)
    pub registered_at: NaiveDateTime,
    /// Family name
    pub family_name: String,
    /// Given name
    pub name: String,
    /// Patronymic
    pub father_name: String,
    /// Normalized phone
    pub phone: String,
    /// Lower-cased email
    pub email: String,
}

impl Account {
    /// Full name in "family given patronymic" order, empty parts skipped.
    #[must_use]
    pub fn full_name(&self) -> String {
        [&self.family_name, &self.name, &self.father_name]
            .iter()
            .map(|part| part.as_str())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One mailing ledger entry: `(full_name, is_sent, email, custom_message)`.
///
/// The 1-based row position within the worksheet acts as its primary key.
/// Once `is_sent` transitions to true it is never reset by normal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailingRow {
    /// Recipient full name as it appears on the certificate
    pub full_name: String,
    /// Whether the certificate email was dispatched for this row
    pub is_sent: bool,
    /// Recipient email
    pub email: String,
    /// Greeting message used as the email body
    pub custom_message: String,
}

impl MailingRow {
    /// Number of worksheet columns a ledger row occupies.
    pub const COLUMNS: usize = 4;
    /// 1-based worksheet column of the `is_sent` flag.
    pub const SENT_COLUMN: usize = 2;
    /// Cell value marking a sent row.
    pub const SENT: &'static str = "TRUE";
    /// Cell value marking a pending row.
    pub const PENDING: &'static str = "FALSE";

    /// Build a row from raw worksheet cells; short rows are padded with
    /// empty strings, anything that is not exactly `"TRUE"` counts as
    /// pending.
    #[must_use]
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
        Self {
            full_name: cell(0),
            is_sent: cells.get(1).map(String::as_str) == Some(Self::SENT),
            email: cell(2),
            custom_message: cell(3),
        }
    }

    /// Serialize to raw worksheet cells.
    #[must_use]
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.full_name.clone(),
            if self.is_sent { Self::SENT } else { Self::PENDING }.to_string(),
            self.email.clone(),
            self.custom_message.clone(),
        ]
    }
}

/// A cached mapping from a name fragment to its dative form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inflection {
    /// The fragment as written (nominative)
    pub base: String,
    /// The dative form; `None` means "known to be unresolved"
    pub dative: Option<String>,
    /// True when a human verified the mapping, false for automatic guesses
    pub is_confirmed: bool,
}

impl Inflection {
    /// The dative form when resolved, otherwise the base fragment.
    #[must_use]
    pub fn dative_or_base(&self) -> &str {
        self.dative.as_deref().unwrap_or(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_round_trips_through_text() {
        for topic in [
            WebinarTopic::Grammar,
            WebinarTopic::Speech,
            WebinarTopic::Phrase,
            WebinarTopic::Test,
        ] {
            assert_eq!(WebinarTopic::from_text(topic.as_text()).unwrap(), topic);
        }
    }

    #[test]
    fn topic_from_text_is_case_insensitive() {
        assert_eq!(
            WebinarTopic::from_text("Практика Запуска Речи").unwrap(),
            WebinarTopic::Speech
        );
    }

    #[test]
    fn topic_from_text_rejects_unknown() {
        assert!(WebinarTopic::from_text("вебинар про вязание").is_err());
    }

    #[test]
    fn full_name_skips_empty_patronymic() {
        let participant = Participant {
            registered_at: None,
            family_name: "Иванова".to_string(),
            name: "Мария".to_string(),
            father_name: String::new(),
            phone: String::new(),
            email: "maria@example.com".to_string(),
        };
        assert_eq!(participant.full_name(), "Иванова Мария");
    }

    #[test]
    fn mailing_row_cells_round_trip() {
        let row = MailingRow {
            full_name: "Иванова Мария Петровна".to_string(),
            is_sent: false,
            email: "maria@example.com".to_string(),
            custom_message: "Здравствуйте, Мария!".to_string(),
        };
        assert_eq!(MailingRow::from_cells(&row.to_cells()), row);
    }

    #[test]
    fn mailing_row_from_short_cells_is_pending() {
        let row = MailingRow::from_cells(&["Иванова".to_string()]);
        assert!(!row.is_sent);
        assert_eq!(row.email, "");
    }
}
