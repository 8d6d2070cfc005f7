//! Spreadsheet export of the RSVP log as CSV.

use rsvp_core::RsvpEntry;

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const FILENAME: &str = "rsvp.csv";

const HEADER: [&str; 4] = ["Name", "Phone", "Email", "Date"];

/// Byte-order mark so spreadsheet apps detect UTF-8.
const BOM: &str = "\u{feff}";

/// `dd.mm.YYYY HH:MM`, in UTC like the stored timestamp.
pub fn format_date(entry: &RsvpEntry) -> String {
    entry.at.format("%d.%m.%Y %H:%M").to_string()
}

/// Render every entry in log order, one row each.
pub fn to_csv(entries: &[RsvpEntry]) -> String {
    let mut out = String::from(BOM);
    push_row(&mut out, HEADER);
    for entry in entries {
        let date = format_date(entry);
        push_row(
            &mut out,
            [
                entry.name.as_str(),
                entry.phone.as_str(),
                entry.email().unwrap_or(""),
                date.as_str(),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: [&str; 4]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

/// Quote a field when it holds a separator, quote, or line break. A leading
/// formula character is prefixed with `'` so spreadsheets show it as text.
fn push_field(out: &mut String, field: &str) {
    let neutralized;
    let field = if field.starts_with(['=', '+', '-', '@']) && !looks_like_phone(field) {
        neutralized = format!("'{field}");
        neutralized.as_str()
    } else {
        field
    };

    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// `+7 999 …` is a phone number, not a formula.
fn looks_like_phone(field: &str) -> bool {
    field
        .chars()
        .all(|c| c.is_ascii_digit() || " +-()".contains(c))
}
