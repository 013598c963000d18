//! XML document model for CalDAV request and response bodies.
//!
//! Provides:
//! - entity escaping for text and attribute values (`escape`)
//! - an arena-backed element tree and its serializer (`tree`)
//! - a cursor-based document builder (`builder`)
//! - parsing into a nested `serde_json::Value` structure (`parse`)
//! - tolerant lookup of multistatus/response keys (`lookup`)
//! - the `XmlService` capability (`service`)
//! - screening of untrusted response bodies (`security`)

pub mod builder;
pub mod error;
pub mod escape;
pub mod lookup;
pub mod parse;
pub mod security;
pub mod service;
pub mod tree;

pub use {
    builder::{XmlDeclaration, XmlDocumentBuilder},
    error::{Error, Result, XmlError},
    escape::{escape_attribute, escape_text, unescape},
    lookup::{KeyLookup, locate_multistatus, locate_responses, lookup, text_of},
    parse::{ParseOptions, parse_with_options},
    security::{SecurityIssue, ValidationResult, XmlSecurityGuard},
    service::{DefaultXmlService, XmlService, format_utc_timestamp},
    tree::{Attributes, Content, ElementNode, XmlTree},
};
