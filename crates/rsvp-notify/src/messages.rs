//! Message bodies for every outbound notification.
//!
//! Guest-supplied text is escaped for the target format before it is
//! interpolated: HTML for email, Telegram legacy Markdown for the channel.

use rsvp_core::ValidSubmission;
use rsvp_core::config::EventConfig;

use crate::email::OutboundEmail;

pub const CANCEL_BUTTON_LABEL: &str = "❌ Cancel my RSVP";
pub const START_BUTTON_LABEL: &str = "🎊 I'm coming!";
pub const PHONE_USAGE: &str = "❌ Please put your number after `/phone`";

/// Escape the characters that matter inside HTML text and attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape Telegram legacy Markdown control characters.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One-line notice to the organizer: who answered and how to reach them.
pub fn organizer_notice(from: &str, organizer: &str, guest: &ValidSubmission) -> OutboundEmail {
    let subject_name: String = guest
        .name
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();

    let mut html = format!(
        "<p>{} — {}",
        escape_html(&guest.name),
        escape_html(&guest.phone)
    );
    if let Some(email) = &guest.email {
        html.push_str(", ");
        html.push_str(&escape_html(email));
    }
    html.push_str("</p>");

    OutboundEmail {
        from: from.to_string(),
        to: organizer.to_string(),
        subject: format!("RSVP: {subject_name}"),
        html,
    }
}

pub fn guest_thank_you(from: &str, to: &str) -> OutboundEmail {
    OutboundEmail {
        from: from.to_string(),
        to: to.to_string(),
        subject: "So glad you're coming!".to_string(),
        html: "<p>Hi!</p><p>We got your reply and we are so happy you will be with us.</p>\
               <p>See you soon, hugs.</p>"
            .to_string(),
    }
}

pub fn reminder_email(from: &str, to: &str, days_before: u32) -> OutboundEmail {
    OutboundEmail {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("{days_before} days to go — we're waiting for you!"),
        html: format!(
            "<p>Hi!</p><p>A quick reminder: the celebration is in {days_before} days.</p>\
             <p>We can't wait to see you!</p>"
        ),
    }
}

/// Channel confirmation sent after a submission, shown with a cancel button.
pub fn channel_confirmation(name: &str, event: &EventConfig) -> String {
    format!(
        "✨ *Thank you, {}!*\n\nWe are so happy you will be with us! 💕\n\n\
         📍 *Details:*\nDate: {}\nTime: {}\nPlace: {}\n\nSee you at the party!\n\n\
         _If your plans change, please let us know with the button below._",
        escape_markdown(name),
        event.date_display,
        event.time_display,
        event.place_name,
    )
}

pub fn channel_reminder(days_before: u32) -> String {
    format!(
        "💌 *Reminder!*\n\nHi! Just a reminder that the celebration is in {days_before} days.\n\n\
         We can't wait to see you!"
    )
}

pub fn cancel_confirmation() -> &'static str {
    "✅ Cancelled.\n\nIf you change your mind, just fill in the form again, we'd love that! 💕"
}

pub fn cancel_failed() -> &'static str {
    "⚠️ We could not cancel your reply just now. Please try again in a few minutes."
}

pub fn start_greeting() -> &'static str {
    "🎉 *Hi!*\n\nWe are so glad you're here! 💕\n\n\
     Please fill in a short form, it helps us plan everything.\n\nTap the button below:"
}

pub fn phone_saved(phone: &str) -> String {
    format!(
        "✅ *Great!*\n\nYour number {} is saved.\n\n\
         When you fill in the RSVP form, we'll send your invitation here!",
        escape_markdown(phone)
    )
}
