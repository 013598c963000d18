//! Tolerant key lookup over parsed multistatus documents.
//!
//! CalDAV servers disagree on prefixes and casing (`d:multistatus`,
//! `D:multistatus`, `multistatus`, `CAL:MultiStatus`). Each element kind has
//! an explicit, ordered list of strategies; the first one that matches wins.

use serde_json::Value;

use crate::parse::TEXT_KEY;

/// One way of finding a key in a parsed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLookup {
    /// The key must equal this string.
    Exact(&'static str),
    /// The first key, in document order, containing this fragment ignoring case.
    ContainsIgnoreCase(&'static str),
    /// As [`ContainsIgnoreCase`](Self::ContainsIgnoreCase), skipping keys whose
    /// lowercased local name equals the second string.
    ContainsIgnoreCaseExcept(&'static str, &'static str),
}

impl KeyLookup {
    fn find<'a>(&self, object: &'a serde_json::Map<String, Value>) -> Option<&'a Value> {
        match self {
            Self::Exact(key) => object.get(*key),
            Self::ContainsIgnoreCase(fragment) => object
                .iter()
                .find(|(key, _)| key.to_ascii_lowercase().contains(fragment))
                .map(|(_, value)| value),
            Self::ContainsIgnoreCaseExcept(fragment, excluded) => object
                .iter()
                .find(|(key, _)| {
                    let key = key.to_ascii_lowercase();
                    key.contains(fragment) && local_name(&key) != *excluded
                })
                .map(|(_, value)| value),
        }
    }
}

pub const MULTISTATUS: &[KeyLookup] = &[
    KeyLookup::Exact("d:multistatus"),
    KeyLookup::Exact("multistatus"),
    KeyLookup::ContainsIgnoreCase("multistatus"),
];

pub const RESPONSE: &[KeyLookup] = &[
    KeyLookup::Exact("d:response"),
    KeyLookup::Exact("response"),
    KeyLookup::ContainsIgnoreCaseExcept("response", "responsedescription"),
];

pub const HREF: &[KeyLookup] = &[
    KeyLookup::Exact("d:href"),
    KeyLookup::Exact("href"),
    KeyLookup::ContainsIgnoreCase("href"),
];

pub const PROPSTAT: &[KeyLookup] = &[
    KeyLookup::Exact("d:propstat"),
    KeyLookup::Exact("propstat"),
    KeyLookup::ContainsIgnoreCase("propstat"),
];

pub const PROP: &[KeyLookup] = &[
    KeyLookup::Exact("d:prop"),
    KeyLookup::Exact("prop"),
    KeyLookup::ContainsIgnoreCase(":prop"),
];

pub const STATUS: &[KeyLookup] = &[
    KeyLookup::Exact("d:status"),
    KeyLookup::Exact("status"),
    KeyLookup::ContainsIgnoreCase(":status"),
];

/// Apply `strategies` in order to an object value.
///
/// Non-objects never match.
#[must_use]
pub fn lookup<'a>(value: &'a Value, strategies: &[KeyLookup]) -> Option<&'a Value> {
    let object = value.as_object()?;
    strategies.iter().find_map(|strategy| strategy.find(object))
}

/// Find the multistatus element in a parsed document.
///
/// `None` means the document carries no multistatus; callers treat that as
/// "no data".
#[must_use]
pub fn locate_multistatus(document: &Value) -> Option<&Value> {
    lookup(document, MULTISTATUS)
}

/// Collect the response entries of a multistatus element in document order.
///
/// A lone entry comes back as a one-element vector.
#[must_use]
pub fn locate_responses(multistatus: &Value) -> Vec<&Value> {
    lookup(multistatus, RESPONSE).map(as_list).unwrap_or_default()
}

/// View a value as a list: arrays yield their items, `null` nothing, and
/// anything else itself.
#[must_use]
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Text carried by a parsed element, looking through singleton arrays and
/// attribute objects.
#[must_use]
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.first().and_then(text_of),
        Value::Object(map) => map.get(TEXT_KEY).and_then(text_of),
        Value::Null => None,
    }
}

/// Strip the namespace prefix from a tag name.
#[must_use]
pub fn local_name(tag: &str) -> &str {
    tag.rsplit_once(':').map_or(tag, |(_, local)| local)
}
