//! rsvp-notify — outbound notifications for the RSVP service.
//!
//! - [`EmailSender`] / [`ResendMailer`]: transactional email
//! - [`ChannelMessenger`] / [`TelegramBot`]: chat-channel messages, plus the
//!   inbound webhook [`channel::Update`] shapes
//! - [`messages`]: every message body, with escaping for guest text
//! - [`Dispatcher`]: detached tasks whose failures are logged, never
//!   propagated
//!
//! Both collaborator traits are object safe and used as `Arc<dyn …>` so
//! tests can substitute recording fakes.

pub mod channel;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod https;
pub mod messages;

pub use channel::{CANCEL_CALLBACK, ChannelMessenger, ParseMode, TelegramBot};
pub use dispatch::Dispatcher;
pub use email::{EmailSender, OutboundEmail, ResendMailer};
pub use error::{NotifyError, NotifyResult};
pub use https::HttpsClient;
