//! Predefined-entity escaping for text and attribute values.
//!
//! Every piece of caller-supplied text is routed through [`escape`] before it
//! is embedded in markup; the tree serializer does this at render time.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Escape `&`, `<`, `>`, `"` and `'`, borrowing the input when nothing needs
/// replacing.
///
/// Characters are mapped in a single pass, so an `&` produced by an earlier
/// replacement is never escaped again.
pub fn escape(content: &str) -> Cow<'_, str> {
    if !content.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(content);
    }
    let mut result = String::with_capacity(content.len() + 16);
    for c in content.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Escape optional text for use as element content. Absent input yields `""`.
#[must_use]
pub fn escape_text(input: Option<&str>) -> String {
    input.map(|s| escape(s).into_owned()).unwrap_or_default()
}

/// Escape optional text for use as an attribute value.
///
/// Attribute values use the same five-entity rule as element text.
#[must_use]
pub fn escape_attribute(input: Option<&str>) -> String {
    escape_text(input)
}

/// Decode the five predefined entities and numeric character references.
///
/// Any other entity reference is rejected: declared entities are never
/// resolved.
pub fn unescape(content: &str) -> Result<Cow<'_, str>> {
    if !content.contains('&') {
        return Ok(Cow::Borrowed(content));
    }
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '&' {
            result.push(c);
            continue;
        }
        let mut entity = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == ';' {
                closed = true;
                break;
            }
            entity.push(c);
        }
        if !closed {
            return Err(Error::UnclosedEntity(entity));
        }
        match entity.as_str() {
            "amp" => result.push('&'),
            "lt" => result.push('<'),
            "gt" => result.push('>'),
            "quot" => result.push('"'),
            "apos" => result.push('\''),
            other => {
                let c = decode_char_ref(other)
                    .ok_or_else(|| Error::UnknownEntity(entity.clone()))?;
                result.push(c);
            },
        }
    }
    Ok(Cow::Owned(result))
}

fn decode_char_ref(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}
