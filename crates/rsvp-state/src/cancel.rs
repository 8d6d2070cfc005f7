//! Cancellation: resolve a chat address to a phone key and drop the
//! matching RSVP entries.
//!
//! This is a compensating action across two stores, not a transaction.
//! The identity record stays in place so the guest can submit again and be
//! joined by the same key.

use rsvp_core::ChatId;
use tracing::{debug, info};

use crate::error::StateResult;
use crate::identities::IdentityStore;
use crate::rsvps::RsvpStore;

/// What a cancellation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// No identity (or no phone key) is registered for the chat; nothing
    /// was touched.
    NoIdentity,
    /// The identity resolved; this many RSVP entries were removed.
    Removed(usize),
}

#[derive(Debug, Clone)]
pub struct CancellationResolver {
    identities: IdentityStore,
    rsvps: RsvpStore,
}

impl CancellationResolver {
    pub fn new(identities: IdentityStore, rsvps: RsvpStore) -> Self {
        Self { identities, rsvps }
    }

    pub fn cancel(&self, chat_id: ChatId) -> StateResult<Cancellation> {
        let Some(identity) = self.identities.find_by_chat(chat_id)? else {
            debug!(chat_id, "cancel: no identity registered");
            return Ok(Cancellation::NoIdentity);
        };
        if identity.phone.join_key().is_none() {
            debug!(chat_id, "cancel: identity has no phone key");
            return Ok(Cancellation::NoIdentity);
        }

        let removed = self.rsvps.remove_by_phone(&identity.phone)?;
        info!(chat_id, removed, "rsvp cancelled");
        Ok(Cancellation::Removed(removed))
    }
}
