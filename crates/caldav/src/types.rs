//! Typed records for CalDAV operations.

use std::collections::BTreeMap;

use {
    calmcp_xml::lookup::{local_name, text_of},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Numeric code of an HTTP status line such as `HTTP/1.1 200 OK`.
#[must_use]
pub fn parse_status_code(status_line: &str) -> Option<u16> {
    status_line.split_whitespace().nth(1)?.parse().ok()
}

/// One `<d:propstat>` block: a status and the properties it applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropStat {
    /// Raw status line, empty when the server sent none.
    pub status: String,
    /// Property values keyed by local name (`displayname`, `getetag`, ...).
    pub properties: BTreeMap<String, Value>,
}

impl PropStat {
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        parse_status_code(&self.status)
    }

    /// 2xx, or no status at all.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code().is_none_or(|code| (200..300).contains(&code))
    }
}

/// One `<d:response>` of a multistatus document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalDavResponse {
    pub href: String,
    /// Response-level status, present when the server reports no propstats.
    pub status: Option<String>,
    pub propstats: Vec<PropStat>,
}

impl CalDavResponse {
    /// Status of the first propstat, else the response-level status.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.propstats
            .iter()
            .map(|p| p.status.as_str())
            .find(|s| !s.is_empty())
            .or(self.status.as_deref())
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status().and_then(parse_status_code)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code()
            .is_none_or(|code| (200..300).contains(&code))
    }

    /// Value of a property from a successful propstat.
    ///
    /// `name` may carry a prefix (`d:getetag`); only the local name is
    /// compared.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        let name = local_name(name);
        self.propstats
            .iter()
            .filter(|p| p.is_success())
            .find_map(|p| p.properties.get(name))
    }

    /// All properties from successful propstats, first occurrence winning.
    #[must_use]
    pub fn properties(&self) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        for propstat in self.propstats.iter().filter(|p| p.is_success()) {
            for (name, value) in &propstat.properties {
                merged
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        merged
    }

    /// Text of a property, `None` when absent or empty.
    #[must_use]
    pub fn text_property(&self, name: &str) -> Option<String> {
        self.property(name)
            .and_then(text_of)
            .filter(|text| !text.is_empty())
    }

    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.text_property("displayname")
    }

    #[must_use]
    pub fn etag(&self) -> Option<String> {
        self.text_property("getetag")
    }

    #[must_use]
    pub fn calendar_data(&self) -> Option<String> {
        self.text_property("calendar-data")
    }

    #[must_use]
    pub fn color(&self) -> Option<String> {
        self.text_property("calendar-color")
    }

    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.text_property("calendar-description")
    }

    /// Whether `resourcetype` contains a `calendar` element.
    #[must_use]
    pub fn is_calendar(&self) -> bool {
        self.property("resourcetype")
            .is_some_and(|value| has_child(value, "calendar"))
    }

    /// Component names (`VEVENT`, `VTODO`) from
    /// `supported-calendar-component-set`.
    #[must_use]
    pub fn supported_components(&self) -> Vec<String> {
        let Some(Value::Object(set)) = self.property("supported-calendar-component-set") else {
            return Vec::new();
        };
        set.iter()
            .filter(|(key, _)| local_name(key) == "comp")
            .flat_map(|(_, comps)| match comps {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            })
            .filter_map(|comp| comp.get("$")?.get("name")?.as_str().map(String::from))
            .collect()
    }
}

fn has_child(value: &Value, local: &str) -> bool {
    match value {
        Value::Object(map) => map.keys().any(|key| local_name(key) == local),
        Value::Array(items) => items.iter().any(|item| has_child(item, local)),
        _ => false,
    }
}

/// Time window for calendar queries. An open end matches everything after
/// `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }
}

/// One change inside a PROPPATCH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PropertyUpdate {
    /// Set `name` (a prefixed element name such as `d:displayname`) to `value`.
    Set { name: String, value: String },
    Remove { name: String },
}

impl PropertyUpdate {
    #[must_use]
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::Remove { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Remove { name } => name,
        }
    }
}

/// Information about a discovered calendar collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarInfo {
    /// Server-relative href path to the calendar.
    pub href: String,
    /// Human-readable display name.
    pub display_name: Option<String>,
    /// Calendar colour (CSS hex string, e.g. "#FF5733").
    pub color: Option<String>,
    /// Optional description text.
    pub description: Option<String>,
    /// Component types the calendar accepts; empty when unreported.
    #[serde(default)]
    pub components: Vec<String>,
}

impl CalendarInfo {
    /// Map a PROPFIND response onto a calendar, `None` when the resource is
    /// not a calendar collection.
    #[must_use]
    pub fn from_response(response: &CalDavResponse) -> Option<Self> {
        response.is_calendar().then(|| Self {
            href: response.href.clone(),
            display_name: response.display_name(),
            color: response.color(),
            description: response.description(),
            components: response.supported_components(),
        })
    }
}

/// Summary of a single calendar event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Server-relative href path to the event resource.
    pub href: String,
    /// ETag for conditional updates.
    pub etag: String,
    /// iCalendar UID.
    pub uid: Option<String>,
    /// Event title.
    pub summary: Option<String>,
    /// Start date/time as ISO 8601 string.
    pub start: Option<String>,
    /// End date/time as ISO 8601 string.
    pub end: Option<String>,
    /// Whether this is an all-day event.
    pub all_day: bool,
    /// Event location.
    pub location: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn propstat(status: &str, properties: Value) -> PropStat {
        PropStat {
            status: status.into(),
            properties: serde_json::from_value(properties).unwrap(),
        }
    }

    fn calendar_response() -> CalDavResponse {
        CalDavResponse {
            href: "/calendars/alice/work/".into(),
            status: None,
            propstats: vec![
                propstat("HTTP/1.1 200 OK", json!({
                    "displayname": "Work",
                    "calendar-color": "#FF5733",
                    "resourcetype": {"d:collection": "", "c:calendar": ""},
                    "supported-calendar-component-set": {
                        "c:comp": [{"$": {"name": "VEVENT"}}, {"$": {"name": "VTODO"}}]
                    },
                })),
                propstat("HTTP/1.1 404 Not Found", json!({"calendar-description": ""})),
            ],
        }
    }

    #[rstest]
    #[case("HTTP/1.1 200 OK", Some(200))]
    #[case("HTTP/1.1 404 Not Found", Some(404))]
    #[case("HTTP/2 207", Some(207))]
    #[case("garbage", None)]
    #[case("", None)]
    fn status_codes(#[case] line: &str, #[case] expected: Option<u16>) {
        assert_eq!(parse_status_code(line), expected);
    }

    #[test]
    fn status_prefers_propstat() {
        let response = calendar_response();
        assert_eq!(response.status(), Some("HTTP/1.1 200 OK"));
        assert_eq!(response.status_code(), Some(200));

        let bare = CalDavResponse {
            href: "/gone".into(),
            status: Some("HTTP/1.1 404 Not Found".into()),
            propstats: Vec::new(),
        };
        assert_eq!(bare.status_code(), Some(404));
        assert!(!bare.is_success());
    }

    #[test]
    fn accessors_read_successful_propstats_only() {
        let response = calendar_response();
        assert_eq!(response.display_name().as_deref(), Some("Work"));
        assert_eq!(response.color().as_deref(), Some("#FF5733"));
        assert!(response.description().is_none());
        assert!(response.etag().is_none());
        assert!(response.is_calendar());
        assert_eq!(response.supported_components(), vec!["VEVENT", "VTODO"]);
        assert!(response.property("d:displayname").is_some());
        assert!(!response.properties().contains_key("calendar-description"));
    }

    #[test]
    fn plain_collection_is_not_a_calendar() {
        let response = CalDavResponse {
            href: "/calendars/alice/".into(),
            status: None,
            propstats: vec![propstat(
                "HTTP/1.1 200 OK",
                json!({"resourcetype": {"d:collection": ""}}),
            )],
        };
        assert!(!response.is_calendar());
        assert!(CalendarInfo::from_response(&response).is_none());
    }

    #[test]
    fn calendar_info_from_response() {
        let info = CalendarInfo::from_response(&calendar_response()).unwrap();
        assert_eq!(info.href, "/calendars/alice/work/");
        assert_eq!(info.display_name.as_deref(), Some("Work"));
        assert_eq!(info.components, vec!["VEVENT", "VTODO"]);
    }

    #[test]
    fn property_update_serde_shape() {
        let update = PropertyUpdate::set("d:displayname", "Home");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"action": "set", "name": "d:displayname", "value": "Home"})
        );
        assert_eq!(PropertyUpdate::remove("ic:calendar-color").name(), "ic:calendar-color");
    }

    #[test]
    fn open_ended_time_range() {
        let start = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(TimeRange::starting_at(start).end.is_none());
    }
}
