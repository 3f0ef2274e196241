//! iCalendar rendering for the booking feed.
//!
//! Produces a minimal RFC 5545 document: one `VCALENDAR` wrapping one
//! `VEVENT` per stored record. Dates are rendered in the compact `YYYYMMDD`
//! form consumers of the feed expect; the time-of-day component (always
//! midnight in the store) is dropped.

use staycal_core::CalendarRecord;

/// Date format used for `DTSTART`/`DTEND` property values.
const ICAL_DATE_FORMAT: &str = "%Y%m%d";

/// Render the full calendar document for the given records.
///
/// Lines are CRLF-terminated as RFC 5545 requires.
#[must_use]
pub fn render_calendar(records: &[CalendarRecord]) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, "PRODID:-//staycal//booking feed//EN");

    for record in records {
        push_line(&mut out, "BEGIN:VEVENT");
        push_line(&mut out, &format!("UID:{}", escape_text(&record.uid)));
        push_line(&mut out, &format!("SUMMARY:{}", escape_text(&record.summary)));
        push_line(
            &mut out,
            &format!("DTSTART:{}", record.dtstart.format(ICAL_DATE_FORMAT)),
        );
        push_line(
            &mut out,
            &format!("DTEND:{}", record.dtend.format(ICAL_DATE_FORMAT)),
        );
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

/// Escape a TEXT property value per RFC 5545 §3.3.11.
///
/// Summaries contain free-form customer and cabin names, which may carry
/// the characters the grammar reserves.
fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}
