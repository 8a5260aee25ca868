//! Mailing ledger over the `mailing` worksheet.
//!
//! The ledger is what makes sending idempotent: every recipient gets a row
//! with an `is_sent` flag, the flag is flipped only after the mail client
//! reports success, and a re-run simply skips flipped rows. Only the exact
//! cell value `TRUE` counts as sent; anything else stays pending so a
//! half-written cell errs on the side of a duplicate mail rather than a
//! silently missing certificate.

use tracing::{debug, info};

use crate::error::Result;
use crate::models::MailingRow;
use crate::sheets::Worksheet;

/// Ledger header row, kept human-readable for operators editing the sheet.
pub const HEADER: [&str; MailingRow::COLUMNS] = ["fio", "is_sent", "email", "custom_text"];

pub struct MailingLedger<W: Worksheet> {
    sheet: W,
}

impl<W: Worksheet> MailingLedger<W> {
    pub fn new(sheet: W) -> Self {
        Self { sheet }
    }

    /// Rebuild the ledger from scratch: header plus one pending row per
    /// recipient. Existing contents, including sent flags, are discarded,
    /// so this must only run before the first send of a webinar.
    pub fn prepare(&self, rows: &[MailingRow]) -> Result<()> {
        self.sheet.clear()?;
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
        cells.push(HEADER.iter().map(ToString::to_string).collect());
        cells.extend(rows.iter().map(MailingRow::to_cells));
        self.sheet.append_rows(&cells)?;
        info!(rows = rows.len(), "prepared mailing ledger");
        Ok(())
    }

    /// Whether the ledger already has data rows.
    pub fn is_prepared(&self) -> Result<bool> {
        Ok(self.sheet.get_all_values()?.len() > 1)
    }

    /// Pending rows paired with their 1-based worksheet row numbers.
    ///
    /// The header row is skipped; rows already flagged sent are skipped.
    pub fn iter_pending(&self) -> Result<Vec<(usize, MailingRow)>> {
        let values = self.sheet.get_all_values()?;
        let pending: Vec<(usize, MailingRow)> = values
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, cells)| (idx + 1, MailingRow::from_cells(cells)))
            .filter(|(_, row)| !row.is_sent)
            .collect();
        debug!(total = values.len().saturating_sub(1), pending = pending.len(), "scanned ledger");
        Ok(pending)
    }

    /// Count of rows already flagged sent.
    pub fn sent_count(&self) -> Result<usize> {
        Ok(self
            .sheet
            .get_all_values()?
            .iter()
            .skip(1)
            .filter(|cells| MailingRow::from_cells(cells).is_sent)
            .count())
    }

    /// Flip one row's flag to sent. Call only after the mail went out.
    pub fn mark_sent(&self, sheet_row: usize) -> Result<()> {
        self.sheet.update_cell(sheet_row, MailingRow::SENT_COLUMN, MailingRow::SENT)
    }
}
