//! Sent-reminder set: the dedup fence for the reminder batch.
//!
//! Stored as a flat JSON array of normalized email addresses. Addresses are
//! only ever added.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::debug;

use crate::error::StateResult;
use crate::store::RecordStore;

/// Lower-case and trim an address for set membership.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct ReminderSentStore {
    records: RecordStore<String>,
}

impl ReminderSentStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            records: RecordStore::open(path),
        }
    }

    pub fn records(&self) -> &RecordStore<String> {
        &self.records
    }

    /// Every address already notified, normalized.
    pub fn sent(&self) -> StateResult<HashSet<String>> {
        Ok(self
            .records
            .load()?
            .iter()
            .map(|e| normalize_email(e))
            .collect())
    }

    /// Add addresses to the set in one write. Blank and already-present
    /// addresses are skipped. Returns how many were added.
    pub fn add<I, S>(&self, emails: I) -> StateResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let incoming: Vec<String> = emails
            .into_iter()
            .map(|e| normalize_email(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        if incoming.is_empty() {
            return Ok(0);
        }

        let added = self.records.extend_distinct(incoming, |e| normalize_email(e))?;
        debug!(added, "reminder fence updated");
        Ok(added)
    }
}
