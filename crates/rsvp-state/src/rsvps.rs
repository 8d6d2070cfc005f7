//! Append-only log of RSVP entries.

use std::path::PathBuf;

use rsvp_core::{PhoneKey, RsvpEntry};
use tracing::{debug, info};

use crate::error::StateResult;
use crate::store::RecordStore;

/// RSVP log. Entries are never edited; cancellation removes them wholesale.
#[derive(Debug, Clone)]
pub struct RsvpStore {
    records: RecordStore<RsvpEntry>,
}

impl RsvpStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            records: RecordStore::open(path),
        }
    }

    pub fn records(&self) -> &RecordStore<RsvpEntry> {
        &self.records
    }

    pub fn append(&self, entry: RsvpEntry) -> StateResult<()> {
        let name = entry.name.clone();
        self.records.append(entry)?;
        debug!(%name, "rsvp appended");
        Ok(())
    }

    /// All entries in submission order.
    pub fn list(&self) -> StateResult<Vec<RsvpEntry>> {
        self.records.load()
    }

    /// First entry whose phone identifies the same contact as `key`.
    pub fn find_by_phone(&self, key: &PhoneKey) -> StateResult<Option<RsvpEntry>> {
        self.records.find(|e| e.phone_key().matches(key))
    }

    /// Remove every entry whose phone matches `key`. An empty key removes
    /// nothing.
    pub fn remove_by_phone(&self, key: &PhoneKey) -> StateResult<usize> {
        if key.join_key().is_none() {
            return Ok(0);
        }
        let removed = self.records.retain(|e| !e.phone_key().matches(key))?;
        if removed > 0 {
            info!(phone = %key, removed, "rsvp entries removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(name: &str, phone: &str) -> RsvpEntry {
        RsvpEntry {
            name: name.to_string(),
            phone: phone.to_string(),
            email: None,
            chat_id: None,
            at: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn duplicates_by_phone_are_allowed_and_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = RsvpStore::open(dir.path().join("rsvps.json"));
        store.append(entry("First", "+7 999 111 22 33")).unwrap();
        store.append(entry("Second", "8 (999) 111-22-33")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        let found = store
            .find_by_phone(&rsvp_core::normalize("89991112233"))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "First");
    }

    #[test]
    fn remove_by_phone_removes_every_variant() {
        let dir = tempfile::tempdir().unwrap();
        let store = RsvpStore::open(dir.path().join("rsvps.json"));
        store.append(entry("A", "+7 999 111 22 33")).unwrap();
        store.append(entry("B", "+7 999 000 00 00")).unwrap();
        store.append(entry("A again", "89991112233")).unwrap();

        let removed = store
            .remove_by_phone(&rsvp_core::normalize("9991112233"))
            .unwrap();
        assert_eq!(removed, 2);
        let left = store.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "B");
    }

    #[test]
    fn empty_key_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = RsvpStore::open(dir.path().join("rsvps.json"));
        store.append(entry("Blank", "-")).unwrap();

        assert_eq!(store.remove_by_phone(&rsvp_core::normalize("")).unwrap(), 0);
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
