//! Error types for the certmail library.
//!
//! This module provides custom error types using `thiserror` for better error handling
//! and more specific error messages throughout the application.

use thiserror::Error;

/// Errors that can occur in the certmail application.
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV worksheet errors
    #[error("Worksheet error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading errors
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// A required environment variable is missing
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// The document title does not match any supported grammar
    #[error("Could not parse document title: {0:?}")]
    InvalidTitle(String),

    /// The topic text is not one of the known webinar topics
    #[error("Unknown webinar topic: {0:?}")]
    UnknownTopic(String),

    /// A participant row is missing required fields
    #[error("Malformed participant row: {0}")]
    MalformedRow(String),

    /// A webinar with the same url was already imported
    #[error("Webinar with url {0:?} already exists")]
    WebinarAlreadyExists(String),

    /// Webinar not found in the local store
    #[error("Webinar {0:?} not found")]
    WebinarNotFound(String),

    /// A participant with the same email or phone was already registered
    #[error("Account with email {email:?} or phone {phone:?} already exists")]
    AccountAlreadyExists { email: String, phone: String },

    /// Account not found in the local store
    #[error("Account {0} not found")]
    AccountNotFound(i64),

    /// The mailing ledger cannot be rebuilt without losing sent flags
    #[error("Mailing ledger already has {0} sent row(s); rebuilding would lose them (use --force)")]
    LedgerAlreadySent(usize),

    /// Sending was attempted before the ledger was built
    #[error("Mailing ledger is empty; run prepare first")]
    LedgerNotPrepared,

    /// No cached inflection exists for this name fragment
    #[error("No cached inflection for {0:?}")]
    InflectionNotFound(String),

    /// The requested worksheet does not exist in the document
    #[error("Worksheet {0:?} not found")]
    WorksheetNotFound(String),

    /// The document exists but is not writable by this account
    #[error(
        "You have to grant edit permissions on the spreadsheet.\n\
         Share > Get Link > Change > Anyone with link > Editor"
    )]
    SheetPermission,

    /// Email transport failures (connect, timeout, non-2xx)
    #[error("Email transport error: {0}")]
    Email(String),

    /// Certificate rendering failures (template, font, encoding)
    #[error("Certificate rendering failed: {0}")]
    Render(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for Result with certmail's Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Email(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Render(err.to_string())
    }
}
