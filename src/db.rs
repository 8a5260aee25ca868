//! SQLite persistence for webinars, accounts, and the inflection cache.
//!
//! The database is the local source of truth after an import: certificates
//! and mails are generated from it, not from the live spreadsheet. A single
//! connection behind a mutex is plenty for a CLI that touches the database
//! from one command at a time.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Account, AccountId, Inflection, Participant, Webinar, WebinarId, WebinarTopic};

const MIGRATIONS: [&str; 2] = [
    include_str!("../migrations/2025-06-01-000000_create_webinars/up.sql"),
    include_str!("../migrations/2025-06-08-000000_create_inflections/up.sql"),
];

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database file and apply migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened database");
        Self::init(conn)
    }

    /// Fresh in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        for migration in MIGRATIONS {
            conn.execute_batch(migration)?;
        }
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert a webinar record. The url is the identity: inserting the same
    /// url twice fails with [`Error::WebinarAlreadyExists`].
    pub fn insert_webinar(
        &self,
        url: &str,
        topic: WebinarTopic,
        started_at: chrono::NaiveDate,
        finished_at: chrono::NaiveDate,
    ) -> Result<Webinar> {
        let imported_at = Utc::now().naive_utc();
        let conn = self.conn();
        let id: WebinarId = conn
            .query_row(
                "INSERT INTO webinars (imported_at, url, topic, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
                params![imported_at, url, topic.as_text(), started_at, finished_at],
                |row| row.get(0),
            )
            .map_err(|err| {
                if is_constraint_violation(&err) {
                    Error::WebinarAlreadyExists(url.to_string())
                } else {
                    err.into()
                }
            })?;
        debug!(id, url, topic = topic.as_text(), "inserted webinar");
        Ok(Webinar { id, imported_at, url: url.to_string(), topic, started_at, finished_at })
    }

    pub fn get_webinar(&self, id: WebinarId) -> Result<Webinar> {
        self.conn()
            .query_row(
                "SELECT id, imported_at, url, topic, started_at, finished_at
                 FROM webinars WHERE id = ?1",
                params![id],
                webinar_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::WebinarNotFound(format!("id {id}")))
    }

    pub fn get_webinar_by_url(&self, url: &str) -> Result<Webinar> {
        self.conn()
            .query_row(
                "SELECT id, imported_at, url, topic, started_at, finished_at
                 FROM webinars WHERE url = ?1",
                params![url],
                webinar_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::WebinarNotFound(url.to_string()))
    }

    /// All webinars, most recently imported first.
    pub fn list_webinars(&self) -> Result<Vec<Webinar>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, imported_at, url, topic, started_at, finished_at
             FROM webinars ORDER BY imported_at DESC, id DESC",
        )?;
        let webinars = stmt
            .query_map([], webinar_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(webinars)
    }

    /// Insert one participant account under a webinar. A duplicate email
    /// or a duplicate non-empty phone within the same webinar fails with
    /// [`Error::AccountAlreadyExists`].
    pub fn insert_account(&self, webinar_id: WebinarId, participant: &Participant) -> Result<Account> {
        let registered_at = participant.registered_at.unwrap_or_else(|| Utc::now().naive_utc());
        let conn = self.conn();
        let id: AccountId = conn
            .query_row(
                "INSERT INTO accounts
                   (webinar_id, registered_at, family_name, name, father_name, phone, email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING id",
                params![
                    webinar_id,
                    registered_at,
                    participant.family_name,
                    participant.name,
                    participant.father_name,
                    participant.phone,
                    participant.email,
                ],
                |row| row.get(0),
            )
            .map_err(|err| {
                if is_constraint_violation(&err) {
                    Error::AccountAlreadyExists {
                        email: participant.email.clone(),
                        phone: participant.phone.clone(),
                    }
                } else {
                    err.into()
                }
            })?;
        Ok(Account {
            id,
            webinar_id,
            registered_at,
            family_name: participant.family_name.clone(),
            name: participant.name.clone(),
            father_name: participant.father_name.clone(),
            phone: participant.phone.clone(),
            email: participant.email.clone(),
        })
    }

    pub fn get_account(&self, id: AccountId) -> Result<Account> {
        self.conn()
            .query_row(
                "SELECT id, webinar_id, registered_at, family_name, name, father_name, phone, email
                 FROM accounts WHERE id = ?1",
                params![id],
                account_from_row,
            )
            .optional()?
            .ok_or(Error::AccountNotFound(id))
    }

    /// Accounts of one webinar in registration order.
    pub fn list_accounts(&self, webinar_id: WebinarId) -> Result<Vec<Account>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, webinar_id, registered_at, family_name, name, father_name, phone, email
             FROM accounts WHERE webinar_id = ?1 ORDER BY registered_at, id",
        )?;
        let accounts = stmt
            .query_map(params![webinar_id], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Cached dative form for a name fragment, if any.
    pub fn get_inflection(&self, base: &str) -> Result<Option<Inflection>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT base, dative, is_confirmed FROM inflections WHERE base = ?1",
                params![base],
                |row| {
                    Ok(Inflection {
                        base: row.get(0)?,
                        dative: row.get(1)?,
                        is_confirmed: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Insert or replace a cached inflection.
    pub fn upsert_inflection(&self, inflection: &Inflection) -> Result<()> {
        self.conn().execute(
            "INSERT INTO inflections (base, dative, is_confirmed) VALUES (?1, ?2, ?3)
             ON CONFLICT(base) DO UPDATE SET dative = ?2, is_confirmed = ?3",
            params![inflection.base, inflection.dative, inflection.is_confirmed],
        )?;
        Ok(())
    }

    /// Flag a cached guess as human-verified.
    pub fn confirm_inflection(&self, base: &str) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE inflections SET is_confirmed = 1 WHERE base = ?1",
            params![base],
        )?;
        if updated == 0 {
            return Err(Error::InflectionNotFound(base.to_string()));
        }
        Ok(())
    }

    /// Guessed inflections nobody reviewed yet, for the operator to audit.
    pub fn list_unconfirmed_inflections(&self) -> Result<Vec<Inflection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT base, dative, is_confirmed FROM inflections
             WHERE is_confirmed = 0 ORDER BY base",
        )?;
        let inflections = stmt
            .query_map([], |row| {
                Ok(Inflection {
                    base: row.get(0)?,
                    dative: row.get(1)?,
                    is_confirmed: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(inflections)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn webinar_from_row(row: &Row<'_>) -> rusqlite::Result<Webinar> {
    let topic_text: String = row.get(3)?;
    let topic = WebinarTopic::from_text(&topic_text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(Webinar {
        id: row.get(0)?,
        imported_at: row.get(1)?,
        url: row.get(2)?,
        topic,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        webinar_id: row.get(1)?,
        registered_at: row.get(2)?,
        family_name: row.get(3)?,
        name: row.get(4)?,
        father_name: row.get(5)?,
        phone: row.get(6)?,
        email: row.get(7)?,
    })
}
