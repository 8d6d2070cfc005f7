//! The reminder scheduler.
//!
//! Once a day at the check hour the scheduler compares the local date with
//! the trigger date. On the trigger day it emails every guest whose address
//! is not yet in the sent-reminder set, records the batch in that set, and
//! broadcasts a channel reminder to registered identities.
//!
//! The sent-reminder set is what makes repeated firing safe: every poll on
//! the trigger day runs the batch again, and only addresses outside the
//! set are contacted.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use rsvp_core::config::{FencePolicy, ReminderConfig};
use rsvp_notify::{ChannelMessenger, EmailSender, ParseMode, messages};
use rsvp_state::{IdentityStore, ReminderSentStore, RsvpStore, StateResult, normalize_email};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::schedule::{self, ReminderState};

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub event_date: NaiveDate,
    pub days_before: u32,
    pub check_hour: u32,
    pub startup_delay: Duration,
    /// Re-check delay on the trigger day after failed sends.
    pub retry: Duration,
    pub fence: FencePolicy,
    /// Sender address for reminder emails.
    pub from: String,
}

impl ReminderSettings {
    pub fn from_config(event_date: NaiveDate, from: impl Into<String>, config: &ReminderConfig) -> Self {
        Self {
            event_date,
            days_before: config.days_before,
            check_hour: config.check_hour,
            startup_delay: Duration::from_secs(config.startup_delay_secs),
            retry: Duration::from_secs(config.retry_secs),
            fence: config.fence,
            from: from.into(),
        }
    }
}

/// Counters from one firing batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderOutcome {
    /// Distinct addresses outside the sent set.
    pub candidates: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Addresses newly written to the sent set.
    pub fenced: usize,
    /// Channel reminders delivered.
    pub broadcast: usize,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Waiting,
    Fired(ReminderOutcome),
    /// A store could not be loaded; nothing was sent.
    Failed,
}

pub struct ReminderScheduler {
    rsvps: RsvpStore,
    sent: ReminderSentStore,
    identities: IdentityStore,
    email: Arc<dyn EmailSender>,
    channel: Option<Arc<dyn ChannelMessenger>>,
    settings: ReminderSettings,
    trigger: NaiveDate,
    /// Set once the channel broadcast has gone out in this process.
    broadcast_done: AtomicBool,
}

impl ReminderScheduler {
    pub fn new(
        rsvps: RsvpStore,
        sent: ReminderSentStore,
        identities: IdentityStore,
        email: Arc<dyn EmailSender>,
        channel: Option<Arc<dyn ChannelMessenger>>,
        settings: ReminderSettings,
    ) -> Self {
        let trigger = schedule::trigger_date(settings.event_date, settings.days_before);
        Self {
            rsvps,
            sent,
            identities,
            email,
            channel,
            settings,
            trigger,
            broadcast_done: AtomicBool::new(false),
        }
    }

    pub fn trigger_date(&self) -> NaiveDate {
        self.trigger
    }

    /// Fire when `now` falls on the trigger day.
    pub async fn poll<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Poll {
        if schedule::state_at(now, self.trigger) == ReminderState::Waiting {
            return Poll::Waiting;
        }
        match self.fire().await {
            Ok(outcome) => Poll::Fired(outcome),
            Err(e) => {
                error!(error = %e, "reminder batch could not load its stores");
                Poll::Failed
            }
        }
    }

    /// Run one batch: email every unfenced address, extend the fence, and
    /// broadcast on the channel.
    pub async fn fire(&self) -> StateResult<ReminderOutcome> {
        let entries = self.rsvps.list()?;
        let already = self.sent.sent()?;

        let mut seen = HashSet::new();
        let candidates: Vec<&str> = entries
            .iter()
            .filter_map(|e| e.email())
            .filter(|e| {
                let key = normalize_email(e);
                !already.contains(&key) && seen.insert(key)
            })
            .collect();

        let mut outcome = ReminderOutcome {
            candidates: candidates.len(),
            ..ReminderOutcome::default()
        };
        let mut delivered = Vec::with_capacity(candidates.len());
        for &to in &candidates {
            let mail = messages::reminder_email(&self.settings.from, to, self.settings.days_before);
            match self.email.send(&mail).await {
                Ok(()) => delivered.push(to),
                Err(e) => {
                    outcome.failed += 1;
                    warn!(to, error = %e, "reminder email failed");
                }
            }
        }
        outcome.delivered = delivered.len();

        let fence = match self.settings.fence {
            FencePolicy::Delivered => delivered,
            FencePolicy::Attempted => candidates,
        };
        outcome.fenced = match self.sent.add(fence) {
            Ok(added) => added,
            Err(e) => {
                error!(error = %e, "could not record sent reminders");
                0
            }
        };

        outcome.broadcast = self.broadcast().await;
        info!(
            candidates = outcome.candidates,
            delivered = outcome.delivered,
            failed = outcome.failed,
            fenced = outcome.fenced,
            broadcast = outcome.broadcast,
            "reminder batch finished"
        );
        Ok(outcome)
    }

    /// Send the channel reminder to every registered chat, once per process.
    async fn broadcast(&self) -> usize {
        let Some(channel) = &self.channel else {
            return 0;
        };
        if self.broadcast_done.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let identities = match self.identities.list() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "channel reminder skipped: identities unavailable");
                self.broadcast_done.store(false, Ordering::SeqCst);
                return 0;
            }
        };

        let text = messages::channel_reminder(self.settings.days_before);
        let mut chats = HashSet::new();
        let mut sent = 0;
        for identity in identities.iter().filter(|i| chats.insert(i.chat_id)) {
            match channel
                .send_text(identity.chat_id, &text, ParseMode::Markdown)
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => warn!(chat_id = identity.chat_id, error = %e, "channel reminder failed"),
            }
        }
        sent
    }

    /// How long to sleep after a poll that ended with `poll`.
    pub fn next_delay<Tz: TimeZone>(&self, now: &DateTime<Tz>, poll: &Poll) -> Duration {
        let until_check = schedule::delay_until_next_check(now, self.settings.check_hour);
        let retry = match poll {
            Poll::Failed => true,
            Poll::Fired(outcome) => outcome.failed > 0 && self.settings.fence == FencePolicy::Delivered,
            Poll::Waiting => false,
        };
        if retry && schedule::is_trigger_day(now, self.trigger) {
            until_check.min(self.settings.retry.max(schedule::MIN_DELAY))
        } else {
            until_check
        }
    }

    /// Run the scheduler loop on local time until `shutdown` changes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            trigger = %self.trigger,
            check_hour = self.settings.check_hour,
            fence = ?self.settings.fence,
            "reminder scheduler started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.settings.startup_delay) => {}
            _ = shutdown.changed() => {
                info!("reminder scheduler shutting down");
                return;
            }
        }

        loop {
            let poll = self.poll(&Local::now()).await;
            let delay = self.next_delay(&Local::now(), &poll);
            debug!(?poll, delay_secs = delay.as_secs(), "next reminder check scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("reminder scheduler shutting down");
                    break;
                }
            }
        }
    }
}
