//! rsvp-reminder — the once-a-day reminder loop.
//!
//! [`schedule`] holds the calendar arithmetic; [`ReminderScheduler`] owns
//! the batch and the long-running loop.

pub mod schedule;
pub mod scheduler;

pub use schedule::{ReminderState, delay_until_next_check, is_trigger_day, trigger_date};
pub use scheduler::{Poll, ReminderOutcome, ReminderScheduler, ReminderSettings};
