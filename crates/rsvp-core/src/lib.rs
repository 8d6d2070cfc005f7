//! rsvp-core — shared types for the RSVP intake service.
//!
//! Holds the pieces every other crate agrees on:
//!
//! - [`phone`]: digits-only phone keys used to join records across stores
//! - [`types`]: persisted records (RSVP entries, channel identities) and the
//!   inbound submission body
//! - [`validate`]: guest-field validation that runs before any mutation
//! - [`config`]: TOML + environment configuration for the daemon

pub mod config;
pub mod phone;
pub mod types;
pub mod validate;

pub use config::{ConfigError, ServiceConfig};
pub use phone::{PhoneKey, normalize};
pub use types::*;
pub use validate::{ValidSubmission, ValidationError};
