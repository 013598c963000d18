//! Parse XML text into a nested `serde_json::Value`.
//!
//! Shape of the result:
//! - the document is `{ "<root-tag>": <element> }`;
//! - an element with neither attributes nor child elements is its text
//!   (`""` when empty);
//! - otherwise it is an object holding attributes under `"$"`, text under
//!   `"_"` and child elements under their tag names. Repeated tags collect
//!   into an array, and with [`ParseOptions::force_array`] every child is an
//!   array.

use {
    quick_xml::{
        Reader,
        events::{BytesStart, Event},
    },
    serde_json::{Map, Value},
};

use crate::{
    error::{Error, Result},
    security::MAX_DEPTH,
};

/// Key holding an element's attributes.
pub const ATTRIBUTES_KEY: &str = "$";
/// Key holding an element's text when it also has attributes or children.
pub const TEXT_KEY: &str = "_";

/// Parser knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Wrap every child element value in an array, even single ones.
    pub force_array: bool,
    /// Lowercase tag names, prefix included.
    pub normalize_tags: bool,
    /// Trim leading and trailing whitespace from text.
    pub trim_text: bool,
    /// Require every end tag to match its start tag.
    pub strict_end_tags: bool,
    /// Deepest element nesting accepted; deeper input is a parse error.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            force_array: false,
            normalize_tags: true,
            trim_text: true,
            strict_end_tags: true,
            max_depth: MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Configuration of the second parse attempt.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            force_array: true,
            normalize_tags: true,
            trim_text: true,
            strict_end_tags: false,
            max_depth: MAX_DEPTH,
        }
    }
}

#[derive(Debug)]
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    text: String,
    children: Vec<(String, Value)>,
}

impl Frame {
    fn into_value(self, options: &ParseOptions) -> Value {
        let text = if options.trim_text {
            self.text.trim().to_string()
        } else {
            self.text
        };
        if self.attributes.is_empty() && self.children.is_empty() {
            return Value::String(text);
        }

        let mut map = Map::new();
        if !self.attributes.is_empty() {
            map.insert(ATTRIBUTES_KEY.into(), Value::Object(self.attributes));
        }
        if !text.is_empty() {
            map.insert(TEXT_KEY.into(), Value::String(text));
        }
        for (name, value) in self.children {
            match map.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                },
                None if options.force_array => {
                    map.insert(name, Value::Array(vec![value]));
                },
                None => {
                    map.insert(name, value);
                },
            }
        }
        Value::Object(map)
    }
}

/// Parse `xml` with the given options.
///
/// Only the five predefined entities and numeric character references are
/// decoded. A `<!DOCTYPE>` is refused outright, so no declared entity is ever
/// expanded. Nesting deeper than [`ParseOptions::max_depth`] fails before the
/// value is built.
pub fn parse_with_options(xml: &str, options: &ParseOptions) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = options.strict_end_tags;

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(Error::parse("content after the root element"));
                }
                check_depth(stack.len() + 1, options)?;
                stack.push(open_frame(&start, options)?);
            },
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(Error::parse("content after the root element"));
                }
                check_depth(stack.len() + 1, options)?;
                let frame = open_frame(&start, options)?;
                close_frame(frame, &mut stack, &mut root, options);
            },
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| Error::parse("end tag without a matching start tag"))?;
                close_frame(frame, &mut stack, &mut root, options);
            },
            Event::Text(text) => {
                let text = text.unescape()?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if text.trim().is_empty() => {},
                    None => return Err(Error::parse("text outside the root element")),
                }
            },
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(std::str::from_utf8(&data)?);
                }
            },
            Event::DocType(_) => return Err(Error::DtdForbidden),
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) => {},
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::parse(format!("unclosed element <{}>", open.name)));
    }
    let (name, value) = root.ok_or_else(|| Error::parse("document has no root element"))?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

fn check_depth(depth: usize, options: &ParseOptions) -> Result<()> {
    if depth > options.max_depth {
        return Err(Error::parse(format!(
            "element nesting exceeds {} levels",
            options.max_depth
        )));
    }
    Ok(())
}

fn open_frame(start: &BytesStart<'_>, options: &ParseOptions) -> Result<Frame> {
    let raw = std::str::from_utf8(start.name().as_ref())?.to_string();
    let name = if options.normalize_tags {
        raw.to_lowercase()
    } else {
        raw
    };

    let mut attributes = Map::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attributes.insert(key, Value::String(value));
    }

    Ok(Frame {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn close_frame(
    frame: Frame,
    stack: &mut Vec<Frame>,
    root: &mut Option<(String, Value)>,
    options: &ParseOptions,
) {
    let name = frame.name.clone();
    let value = frame.into_value(options);
    match stack.last_mut() {
        Some(parent) => parent.children.push((name, value)),
        None => *root = Some((name, value)),
    }
}
