//! Certificate mailing for webinar participants.
//!
//! The crate automates the path from a registration spreadsheet to a
//! certificate in every participant's inbox: import the registrations into
//! SQLite, prepare a mailing ledger in the document, then send one
//! certificate image per pending ledger row. The ledger's sent flags make
//! the whole pipeline safe to re-run after a crash or a transport error.

pub mod certificate;
pub mod config;
pub mod contacts;
pub mod db;
pub mod email;
pub mod error;
pub mod inflect;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod participants;
pub mod sheets;
pub mod title;
pub mod webinar;

pub use error::{Error, Result};
