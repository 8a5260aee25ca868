//! Webinar orchestration: import, ledger preparation, and sending.
//!
//! The flow is deliberately split into three commands an operator runs in
//! order. `import` copies registrations into SQLite, `prepare` builds the
//! mailing ledger in the document, and `send` walks the pending ledger
//! rows, mailing one certificate per row and flipping its flag only after
//! the mail went out. A crash mid-send is resumed by running `send` again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::certificate::{CertificateRenderer, CertificateText, TextRenderer};
use crate::contacts;
use crate::db::Database;
use crate::email::{Attachment, EmailClient, OutgoingEmail};
use crate::error::{Error, Result};
use crate::inflect::NameInflector;
use crate::ledger::MailingLedger;
use crate::metrics;
use crate::models::{MailingRow, Webinar, WebinarTopic};
use crate::participants::import_rows;
use crate::sheets::{SpreadsheetDocument, Worksheet, MAILING_SHEET};
use crate::title::{date_text, TitleParser};

/// Outcome of an import run.
#[derive(Debug)]
pub struct ImportSummary {
    pub webinar: Webinar,
    /// Accounts created by this run.
    pub imported: usize,
    /// Rows skipped because the email was already registered.
    pub duplicates: usize,
}

/// Outcome of a send run.
#[derive(Debug, Default)]
pub struct SendReport {
    pub sent: usize,
    /// Pending rows skipped for having no email address.
    pub skipped_no_email: usize,
}

/// Knobs for a send run.
pub struct SendOptions {
    /// Pause after each successful send.
    pub send_delay: Duration,
    /// Render and log without mailing or flipping ledger flags.
    pub dry_run: bool,
    /// Addresses blind-copied on every mail.
    pub bcc: Vec<String>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { send_delay: Duration::ZERO, dry_run: false, bcc: Vec::new() }
    }
}

pub struct WebinarService<'a> {
    db: &'a Database,
    parser: TitleParser,
}

impl<'a> WebinarService<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db, parser: TitleParser::new() }
    }

    /// Import a registration document into the local database.
    ///
    /// Running twice on the same document is safe: the webinar record is
    /// reused and already-registered emails are skipped.
    pub fn import<D: SpreadsheetDocument>(&self, document: &D, url: &str) -> Result<ImportSummary> {
        let title = document.title();
        let parsed = self.parser.parse(title)?;
        let topic = WebinarTopic::from_text(&parsed.topic_text)?;

        let webinar = match self.db.insert_webinar(
            url,
            topic,
            parsed.started_at,
            parsed.finished_at,
        ) {
            Ok(webinar) => webinar,
            Err(Error::WebinarAlreadyExists(_)) => {
                info!(url, "webinar already imported, refreshing accounts");
                self.db.get_webinar_by_url(url)?
            }
            Err(err) => return Err(err),
        };

        let rows = document.registrations()?.get_all_values()?;
        // First row is the form header.
        let data_rows = rows.get(1..).unwrap_or_default();
        let participants = import_rows(data_rows);

        let inflector = NameInflector::new(self.db);
        let mut imported = 0;
        let mut duplicates = 0;
        for participant in &participants {
            match self.db.insert_account(webinar.id, participant) {
                Ok(account) => {
                    // Seed the inflection cache now so the operator can
                    // review the guesses before preparing the ledger.
                    inflector.dative_full_name(&account.full_name())?;
                    imported += 1;
                }
                Err(Error::AccountAlreadyExists { email, .. }) => {
                    warn!(email, "skipping already registered participant");
                    duplicates += 1;
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            webinar_id = webinar.id,
            topic = topic.as_text(),
            imported,
            duplicates,
            "imported webinar registrations"
        );
        Ok(ImportSummary { webinar, imported, duplicates })
    }

    /// Build the mailing ledger for an imported webinar, creating the
    /// `mailing` worksheet when the document does not have one yet.
    ///
    /// Names are written in dative case, ready for the certificate. The
    /// ledger is rebuilt from scratch, so once any row was sent this
    /// refuses to run unless `force` is set.
    pub fn prepare<D: SpreadsheetDocument>(
        &self,
        document: &mut D,
        url: &str,
        force: bool,
    ) -> Result<usize> {
        let webinar = self.db.get_webinar_by_url(url)?;
        let sheet = match document.worksheet(MAILING_SHEET) {
            Ok(sheet) => sheet,
            Err(Error::WorksheetNotFound(_)) => document.add_worksheet(MAILING_SHEET)?,
            Err(err) => return Err(err),
        };
        let ledger = MailingLedger::new(sheet);
        let sent = ledger.sent_count()?;
        if !force && sent > 0 {
            return Err(Error::LedgerAlreadySent(sent));
        }

        let inflector = NameInflector::new(self.db);
        let accounts = self.db.list_accounts(webinar.id)?;
        let rows: Vec<MailingRow> = accounts
            .iter()
            .map(|account| {
                Ok(MailingRow {
                    full_name: inflector.dative_full_name(&account.full_name())?,
                    is_sent: false,
                    email: account.email.clone(),
                    custom_message: default_message(&account.name),
                })
            })
            .collect::<Result<_>>()?;
        ledger.prepare(&rows)?;
        Ok(rows.len())
    }

    /// Send certificates for every pending ledger row.
    ///
    /// Stops at the first transport failure so the operator sees it while
    /// the ledger still knows exactly where sending got to. With
    /// `options.dry_run` nothing is marked sent, so a later real run
    /// starts from the top. The sandbox topic swaps in the plain-text
    /// renderer regardless of the one passed in.
    pub async fn send<D: SpreadsheetDocument>(
        &self,
        document: &D,
        url: &str,
        mailer: &dyn EmailClient,
        renderer: &dyn CertificateRenderer,
        options: &SendOptions,
    ) -> Result<SendReport> {
        let webinar = self.db.get_webinar_by_url(url)?;
        let renderer: &dyn CertificateRenderer = if webinar.topic == WebinarTopic::Test {
            &TextRenderer
        } else {
            renderer
        };
        let ledger = MailingLedger::new(document.worksheet(MAILING_SHEET)?);
        if !ledger.is_prepared()? {
            return Err(Error::LedgerNotPrepared);
        }
        let pending = ledger.iter_pending()?;
        info!(pending = pending.len(), dry_run = options.dry_run, "starting certificate send");

        let mut report = SendReport::default();
        for (sheet_row, row) in pending {
            if row.email.is_empty() {
                warn!(name = %row.full_name, sheet_row, "pending row has no email, skipping");
                report.skipped_no_email += 1;
                continue;
            }

            let bytes = renderer.render(&CertificateText {
                full_name: row.full_name.clone(),
                topic: webinar.topic.long_text().to_string(),
                date: date_text(webinar.started_at, webinar.finished_at),
            })?;
            metrics::record_certificate_rendered();

            let email = OutgoingEmail {
                to: row.email.clone(),
                bcc: options.bcc.clone(),
                subject: webinar.topic.subject().to_string(),
                text: body_text(&row),
                attachments: vec![Attachment {
                    file_name: renderer.file_name().to_string(),
                    content_type: renderer.content_type().to_string(),
                    bytes,
                }],
            };
            if let Err(err) = mailer.send(&email).await {
                metrics::record_send_failure();
                error!(to = %row.email, error = %err, "send failed, stopping the run");
                return Err(err);
            }
            if !options.dry_run {
                ledger.mark_sent(sheet_row)?;
                metrics::record_email_sent();
                tokio::time::sleep(options.send_delay).await;
            }
            report.sent += 1;
        }
        info!(sent = report.sent, skipped = report.skipped_no_email, "send run finished");
        Ok(report)
    }

    /// Save every participant of a webinar as one vCard group file under
    /// `dir`, named after the topic and the last webinar day.
    pub fn export_contacts(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let webinar = self.db.get_webinar_by_url(url)?;
        let accounts = self.db.list_accounts(webinar.id)?;
        let group = format!("{} {}", webinar.topic.subject(), webinar.finished_at);
        contacts::save_group_file(dir, &group, &accounts)
    }

    pub fn list(&self) -> Result<Vec<Webinar>> {
        self.db.list_webinars()
    }
}

/// Default ledger greeting, addressed to the plain given name. The
/// operator can edit it in the sheet before sending.
fn default_message(name: &str) -> String {
    format!("Здравствуйте, {name}! Благодарю вас за участие.")
}

fn body_text(row: &MailingRow) -> String {
    let mut text = format!(
        "Добрый день!\n\nСпасибо за участие в вебинаре. Сертификат для {} во вложении.",
        row.full_name
    );
    if !row.custom_message.is_empty() {
        text.push_str("\n\n");
        text.push_str(&row.custom_message);
    }
    text.push_str("\n\nС уважением,\nкоманда вебинаров");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message_greets_the_given_name() {
        assert_eq!(
            default_message("Мария"),
            "Здравствуйте, Мария! Благодарю вас за участие."
        );
    }

    #[test]
    fn body_text_includes_custom_message() {
        let row = MailingRow {
            full_name: "Марии Ивановой".to_string(),
            is_sent: false,
            email: "a@b.ru".to_string(),
            custom_message: "Запись вебинара придёт отдельным письмом.".to_string(),
        };
        let text = body_text(&row);
        assert!(text.contains("Марии Ивановой"));
        assert!(text.contains("Запись вебинара"));
    }

    #[test]
    fn body_text_without_custom_message() {
        let row = MailingRow {
            full_name: "Марии Ивановой".to_string(),
            is_sent: false,
            email: "a@b.ru".to_string(),
            custom_message: String::new(),
        };
        assert!(!body_text(&row).ends_with("\n\n"));
    }
}
