//! Namespaces and property names used in request bodies.

/// `DAV:` namespace URI.
pub const DAV_NS: &str = "DAV:";

/// `CalDAV` namespace URI.
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

/// Apple iCal namespace URI, home of `calendar-color`.
pub const APPLE_ICAL_NS: &str = "http://apple.com/ns/ical/";

/// `CalendarServer` namespace URI, home of `getctag`.
pub const CS_NS: &str = "http://calendarserver.org/ns/";

pub const DAV_PREFIX: &str = "d";
pub const CALDAV_PREFIX: &str = "c";
pub const APPLE_ICAL_PREFIX: &str = "ic";
pub const CS_PREFIX: &str = "cs";

pub const RESOURCETYPE: &str = "d:resourcetype";
pub const DISPLAYNAME: &str = "d:displayname";
pub const GETETAG: &str = "d:getetag";
pub const CURRENT_USER_PRINCIPAL: &str = "d:current-user-principal";
pub const CALENDAR_COLOR: &str = "ic:calendar-color";
pub const CALENDAR_DATA: &str = "c:calendar-data";
pub const CALENDAR_DESCRIPTION: &str = "c:calendar-description";
pub const CALENDAR_HOME_SET: &str = "c:calendar-home-set";
pub const SUPPORTED_CALENDAR_COMPONENT_SET: &str = "c:supported-calendar-component-set";
pub const GETCTAG: &str = "cs:getctag";

/// Properties requested by a PROPFIND when the caller names none.
pub const DEFAULT_PROPFIND_PROPERTIES: &[&str] = &[
    RESOURCETYPE,
    DISPLAYNAME,
    CALENDAR_COLOR,
    SUPPORTED_CALENDAR_COMPONENT_SET,
];

/// Namespace declarations for a request body whose elements use `names`.
///
/// `d` and `c` are always declared; `ic` and `cs` only when some name uses
/// that prefix.
#[must_use]
pub fn namespaces_for<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<(&'static str, &'static str)> {
    let mut namespaces = vec![(DAV_PREFIX, DAV_NS), (CALDAV_PREFIX, CALDAV_NS)];
    let (mut ical, mut cs) = (false, false);
    for name in names {
        match name.split_once(':').map(|(prefix, _)| prefix) {
            Some(APPLE_ICAL_PREFIX) => ical = true,
            Some(CS_PREFIX) => cs = true,
            _ => {},
        }
    }
    if ical {
        namespaces.push((APPLE_ICAL_PREFIX, APPLE_ICAL_NS));
    }
    if cs {
        namespaces.push((CS_PREFIX, CS_NS));
    }
    namespaces
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_namespaces_always_present() {
        assert_eq!(namespaces_for([DISPLAYNAME]), vec![
            ("d", DAV_NS),
            ("c", CALDAV_NS)
        ]);
    }

    #[test]
    fn optional_namespaces_follow_usage() {
        let namespaces = namespaces_for([GETCTAG, CALENDAR_COLOR, CALENDAR_COLOR]);
        assert_eq!(namespaces, vec![
            ("d", DAV_NS),
            ("c", CALDAV_NS),
            ("ic", APPLE_ICAL_NS),
            ("cs", CS_NS),
        ]);
    }
}
