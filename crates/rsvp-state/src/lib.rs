//! rsvp-state — file-backed record stores for the RSVP service.
//!
//! # Architecture
//!
//! [`RecordStore<T>`] is a JSON array on disk guarded by one mutex. Every
//! operation loads the whole file, mutates the vector, and writes it back
//! while holding that lock. Three stores are built on it:
//!
//! | Store | File | Semantics |
//! |---|---|---|
//! | [`RsvpStore`] | `rsvps.json` | append-only log, removal by phone key |
//! | [`IdentityStore`] | `tg_users.json` | upsert by phone key |
//! | [`ReminderSentStore`] | `reminder_sent.json` | append-distinct set of emails |
//!
//! Stores never reference each other. [`CancellationResolver`] joins an
//! identity to RSVP entries through the normalized phone key.
//!
//! All stores are `Clone + Send + Sync`; clones share the underlying lock.

pub mod cancel;
pub mod error;
pub mod identities;
pub mod reminders;
pub mod rsvps;
pub mod store;

pub use cancel::{Cancellation, CancellationResolver};
pub use error::{StateError, StateResult};
pub use identities::IdentityStore;
pub use reminders::{ReminderSentStore, normalize_email};
pub use rsvps::RsvpStore;
pub use store::{RecordStore, Upserted};
