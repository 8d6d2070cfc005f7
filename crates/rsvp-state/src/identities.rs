//! Registered chat-channel identities, one per phone key.

use std::path::PathBuf;

use rsvp_core::{ChannelIdentity, ChatId, PhoneKey};
use tracing::debug;

use crate::error::StateResult;
use crate::store::{RecordStore, Upserted};

/// Upsert key for an identity.
///
/// Identities join on their phone key. An identity registered without a
/// usable phone falls back to its chat address, so repeated registrations
/// from the same chat replace each other but never collide with a
/// different chat that also lacks a phone.
#[derive(Debug, PartialEq)]
enum IdentityKey {
    Phone(String),
    Chat(ChatId),
}

fn identity_key(identity: &ChannelIdentity) -> Option<IdentityKey> {
    Some(match identity.phone.join_key() {
        Some(key) => IdentityKey::Phone(key.to_string()),
        None => IdentityKey::Chat(identity.chat_id),
    })
}

#[derive(Debug, Clone)]
pub struct IdentityStore {
    records: RecordStore<ChannelIdentity>,
}

impl IdentityStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            records: RecordStore::open(path),
        }
    }

    pub fn records(&self) -> &RecordStore<ChannelIdentity> {
        &self.records
    }

    /// Insert or replace the identity for this phone key.
    pub fn save(&self, identity: ChannelIdentity) -> StateResult<Upserted> {
        let chat_id = identity.chat_id;
        let outcome = self.records.upsert(identity, identity_key)?;
        debug!(chat_id, ?outcome, "channel identity saved");
        Ok(outcome)
    }

    pub fn find_by_phone(&self, key: &PhoneKey) -> StateResult<Option<ChannelIdentity>> {
        self.records.find(|i| i.phone.matches(key))
    }

    /// Identity registered for `chat_id`, preferring one that carries a
    /// phone key over a phoneless registration from the same chat.
    pub fn find_by_chat(&self, chat_id: ChatId) -> StateResult<Option<ChannelIdentity>> {
        let mut matches = self
            .records
            .load()?
            .into_iter()
            .filter(|i| i.chat_id == chat_id);
        let first = matches.next();
        if first.as_ref().is_some_and(|i| i.phone.is_empty()) {
            if let Some(with_phone) = matches.find(|i| !i.phone.is_empty()) {
                return Ok(Some(with_phone));
            }
        }
        Ok(first)
    }

    pub fn list(&self) -> StateResult<Vec<ChannelIdentity>> {
        self.records.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, IdentityStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::open(dir.path().join("tg_users.json"));
        (dir, store)
    }

    #[test]
    fn save_is_idempotent_on_phone_key() {
        let (_dir, store) = store();
        let first = store
            .save(ChannelIdentity::new(1, "+7 999 111 22 33", "Ann"))
            .unwrap();
        let second = store
            .save(ChannelIdentity::new(2, "8 999 111 22 33", "Ann K"))
            .unwrap();

        assert_eq!(first, Upserted::Inserted);
        assert_eq!(second, Upserted::Replaced);
        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].chat_id, 2);
        assert_eq!(all[0].name, "Ann K");
    }

    #[test]
    fn phoneless_identities_do_not_collide_across_chats() {
        let (_dir, store) = store();
        store.save(ChannelIdentity::new(1, "", "One")).unwrap();
        store.save(ChannelIdentity::new(2, "", "Two")).unwrap();
        store.save(ChannelIdentity::new(1, "", "One again")).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(store.find_by_chat(1).unwrap().unwrap().name, "One again");
    }

    #[test]
    fn chat_lookup_prefers_identity_with_phone() {
        let (_dir, store) = store();
        store.save(ChannelIdentity::new(9, "", "@ann")).unwrap();
        store
            .save(ChannelIdentity::new(9, "89990001122", "Ann"))
            .unwrap();

        let found = store.find_by_chat(9).unwrap().unwrap();
        assert_eq!(found.phone.as_str(), "89990001122");
        assert!(store.find_by_chat(10).unwrap().is_none());
    }

    #[test]
    fn lookup_by_phone_ignores_formatting() {
        let (_dir, store) = store();
        store
            .save(ChannelIdentity::new(5, "+7 (999) 123-45-67", "Ann"))
            .unwrap();

        let found = store
            .find_by_phone(&rsvp_core::normalize("8 999 123 45 67"))
            .unwrap();
        assert_eq!(found.map(|i| i.chat_id), Some(5));
        assert!(store
            .find_by_phone(&rsvp_core::normalize(""))
            .unwrap()
            .is_none());
    }
}
