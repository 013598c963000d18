//! Event extraction from `calendar-data` using the `icalendar` crate.

use icalendar::{Calendar, CalendarComponent, Component, Event};

use crate::{
    error::{Error, Result},
    types::{CalDavResponse, EventSummary},
};

/// Parse raw iCalendar data and extract event summaries.
///
/// Line endings are normalised to CRLF before parsing since servers and XML
/// parsers do not agree on them.
pub fn parse_events(ical_data: &str, href: &str, etag: &str) -> Result<Vec<EventSummary>> {
    let mut normalised = ical_data.replace("\r\n", "\n").replace('\n', "\r\n");
    if !normalised.ends_with("\r\n") {
        normalised.push_str("\r\n");
    }
    let calendar: Calendar = normalised
        .parse()
        .map_err(|e| Error::message(format!("failed to parse iCalendar data at {href}: {e}")))?;

    Ok(calendar
        .components
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(vevent) => Some(summarize(vevent, href, etag)),
            _ => None,
        })
        .collect())
}

/// Events carried by a REPORT response.
///
/// A response without `calendar-data` yields a bare summary holding only
/// its href and etag.
pub fn events_from_response(response: &CalDavResponse) -> Result<Vec<EventSummary>> {
    let etag = response.etag().unwrap_or_default();
    match response.calendar_data() {
        Some(data) => parse_events(&data, &response.href, &etag),
        None => Ok(vec![EventSummary {
            href: response.href.clone(),
            etag,
            ..Default::default()
        }]),
    }
}

fn summarize(vevent: &Event, href: &str, etag: &str) -> EventSummary {
    EventSummary {
        href: href.to_string(),
        etag: etag.to_string(),
        uid: vevent.property_value("UID").map(String::from),
        summary: vevent.property_value("SUMMARY").map(String::from),
        start: vevent.property_value("DTSTART").map(normalise_datetime),
        end: vevent.property_value("DTEND").map(normalise_datetime),
        all_day: vevent
            .property_value("DTSTART")
            .is_some_and(|v| v.len() == 8 && v.chars().all(|c| c.is_ascii_digit())),
        location: vevent.property_value("LOCATION").map(String::from),
    }
}

/// Convert basic iCalendar datetime (20250615T100000) to ISO 8601 (2025-06-15T10:00:00).
fn normalise_datetime(raw: &str) -> String {
    let raw = raw.trim_end_matches('Z');
    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    match raw.split_once('T') {
        None if raw.len() == 8 && is_digits(raw) => {
            format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8])
        },
        Some((date, time))
            if date.len() == 8 && is_digits(date) && time.get(..6).is_some_and(is_digits) =>
        {
            format!(
                "{}-{}-{}T{}:{}:{}",
                &date[..4],
                &date[4..6],
                &date[6..8],
                &time[..2],
                &time[2..4],
                &time[4..6]
            )
        },
        // Already in a reasonable format or unknown.
        _ => raw.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const MEETING: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//calmcp//test//EN\r\n\
BEGIN:VEVENT\r\nUID:meeting-1@example.com\r\nDTSTAMP:20250601T090000Z\r\n\
DTSTART:20250615T100000Z\r\nDTEND:20250615T110000Z\r\nSUMMARY:Team meeting\r\n\
LOCATION:Room A\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    #[test]
    fn extracts_event_fields() {
        let events = parse_events(MEETING, "/cal/meeting.ics", "\"etag1\"").unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.href, "/cal/meeting.ics");
        assert_eq!(event.etag, "\"etag1\"");
        assert_eq!(event.uid.as_deref(), Some("meeting-1@example.com"));
        assert_eq!(event.summary.as_deref(), Some("Team meeting"));
        assert_eq!(event.start.as_deref(), Some("2025-06-15T10:00:00"));
        assert_eq!(event.end.as_deref(), Some("2025-06-15T11:00:00"));
        assert_eq!(event.location.as_deref(), Some("Room A"));
        assert!(!event.all_day);
    }

    #[test]
    fn accepts_bare_newlines_without_trailing_break() {
        let data = MEETING.replace("\r\n", "\n");
        let events = parse_events(data.trim_end(), "/cal/m.ics", "").unwrap();
        assert_eq!(events[0].summary.as_deref(), Some("Team meeting"));
    }

    #[test]
    fn all_day_event() {
        let data = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:holiday\r\n\
DTSTART;VALUE=DATE:20251225\r\nDTEND;VALUE=DATE:20251226\r\nSUMMARY:Holiday\r\n\
END:VEVENT\r\nEND:VCALENDAR\r\n";
        let events = parse_events(data, "/cal/h.ics", "").unwrap();
        assert!(events[0].all_day);
        assert_eq!(events[0].start.as_deref(), Some("2025-12-25"));
    }

    #[rstest]
    #[case("20250615T100000", "2025-06-15T10:00:00")]
    #[case("20250615T100000Z", "2025-06-15T10:00:00")]
    #[case("20251225", "2025-12-25")]
    #[case("2025-06-15T10:00:00", "2025-06-15T10:00:00")]
    #[case("20250101T12345é0", "20250101T12345é0")]
    #[case("20250101T1234é", "20250101T1234é")]
    #[case("202501é1T100000", "202501é1T100000")]
    #[case("20250101T1", "20250101T1")]
    fn normalises_datetimes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalise_datetime(raw), expected);
    }

    #[test]
    fn non_ascii_start_is_kept_verbatim() {
        let data = MEETING.replace("DTSTART:20250615T100000Z", "DTSTART:20250101T12345é0");
        let events = parse_events(&data, "/x", "").unwrap();
        assert_eq!(events[0].start.as_deref(), Some("20250101T12345é0"));
    }

    #[test]
    fn response_without_calendar_data_yields_bare_summary() {
        let response = CalDavResponse {
            href: "/cal/x.ics".into(),
            ..Default::default()
        };
        let events = events_from_response(&response).unwrap();
        assert_eq!(events, vec![EventSummary {
            href: "/cal/x.ics".into(),
            ..Default::default()
        }]);
    }
}
