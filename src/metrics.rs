//! Counter names and helpers.
//!
//! Counters are emitted through the `metrics` facade; without an installed
//! recorder they are no-ops, which is the default for CLI runs.

use metrics::counter;

pub const ROWS_SKIPPED: &str = "certmail_rows_skipped_total";
pub const CERTIFICATES_RENDERED: &str = "certmail_certificates_rendered_total";
pub const EMAILS_SENT: &str = "certmail_emails_sent_total";
pub const SEND_FAILURES: &str = "certmail_send_failures_total";

pub fn record_rows_skipped(count: u64) {
    counter!(ROWS_SKIPPED).increment(count);
}

pub fn record_certificate_rendered() {
    counter!(CERTIFICATES_RENDERED).increment(1);
}

pub fn record_email_sent() {
    counter!(EMAILS_SENT).increment(1);
}

pub fn record_send_failure() {
    counter!(SEND_FAILURES).increment(1);
}
