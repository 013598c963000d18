//! Screening of untrusted XML before it reaches the parser.
//!
//! [`XmlSecurityGuard::validate`] reports constructs used by XXE and entity
//! expansion attacks. [`XmlSecurityGuard::sanitize`] removes them on a best
//! effort basis. Neither is a security boundary on its own: the parser also
//! refuses any `<!DOCTYPE>` and never expands declared entities.

use std::{fmt, sync::LazyLock};

use regex::Regex;

/// Deepest element nesting accepted.
pub const MAX_DEPTH: usize = 256;
/// Largest document accepted, in bytes.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
/// Most references to non-predefined entities accepted.
pub const MAX_ENTITY_REFERENCES: usize = 16;

const PREDEFINED_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

static DOCTYPE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)<!DOCTYPE"));
static GENERAL_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)<!ENTITY\s+[^%\s]"));
static PARAMETER_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)<!ENTITY\s+%|%[A-Za-z_][\w.-]*;"));
static EXTERNAL_ID: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<!(?:DOCTYPE|ENTITY)[^>]*\b(?:SYSTEM|PUBLIC)\b"));
static NESTED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?is)<!ENTITY\s+%?\s*[\w.-]+\s+(?:"[^"]*&[A-Za-z_][^"]*"|'[^']*&[A-Za-z_][^']*')"#));
static XINCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)http://www\.w3\.org/2001/XInclude|<\w+:include\b[^>]*\bhref\s*=")
});
static ENTITY_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"&([A-Za-z_][\w.-]*);"));
static DOCTYPE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<!DOCTYPE[^\[>]*(?:\[.*?\]\s*)?>"));
static ENTITY_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<!ENTITY[^>]*>"));

// patterns are literals exercised by the tests below
#[allow(clippy::unwrap_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// One finding reported by [`XmlSecurityGuard::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityIssue {
    Doctype,
    EntityDeclaration,
    ParameterEntity,
    ExternalIdentifier,
    NestedEntityDefinition,
    XInclude,
    EntityReferences { count: usize, limit: usize },
    Depth { depth: usize, limit: usize },
    Size { bytes: usize, limit: usize },
}

impl fmt::Display for SecurityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doctype => f.write_str("DOCTYPE declaration present"),
            Self::EntityDeclaration => f.write_str("entity declaration present"),
            Self::ParameterEntity => f.write_str("parameter entity present"),
            Self::ExternalIdentifier => {
                f.write_str("external identifier (SYSTEM/PUBLIC) present")
            },
            Self::NestedEntityDefinition => {
                f.write_str("entity defined in terms of other entities")
            },
            Self::XInclude => f.write_str("XInclude directive present"),
            Self::EntityReferences { count, limit } => {
                write!(f, "{count} custom entity references exceed the limit of {limit}")
            },
            Self::Depth { depth, limit } => {
                write!(f, "element nesting depth {depth} exceeds the limit of {limit}")
            },
            Self::Size { bytes, limit } => {
                write!(f, "document size {bytes} bytes exceeds the limit of {limit}")
            },
        }
    }
}

/// Outcome of [`XmlSecurityGuard::validate`]. `valid` is true exactly when
/// `issues` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<SecurityIssue>,
}

impl ValidationResult {
    fn from_issues(issues: Vec<SecurityIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Limits applied by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlSecurityGuard {
    pub max_depth: usize,
    pub max_document_bytes: usize,
    pub max_entity_references: usize,
}

impl Default for XmlSecurityGuard {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_document_bytes: MAX_DOCUMENT_BYTES,
            max_entity_references: MAX_ENTITY_REFERENCES,
        }
    }
}

impl XmlSecurityGuard {
    /// Report attack-associated constructs in `xml`. Never mutates the input.
    #[must_use]
    pub fn validate(&self, xml: &str) -> ValidationResult {
        let mut issues = Vec::new();

        if xml.len() > self.max_document_bytes {
            issues.push(SecurityIssue::Size {
                bytes: xml.len(),
                limit: self.max_document_bytes,
            });
        }
        if DOCTYPE.is_match(xml) {
            issues.push(SecurityIssue::Doctype);
        }
        if GENERAL_ENTITY.is_match(xml) {
            issues.push(SecurityIssue::EntityDeclaration);
        }
        if PARAMETER_ENTITY.is_match(xml) {
            issues.push(SecurityIssue::ParameterEntity);
        }
        if EXTERNAL_ID.is_match(xml) {
            issues.push(SecurityIssue::ExternalIdentifier);
        }
        if NESTED_ENTITY.is_match(xml) {
            issues.push(SecurityIssue::NestedEntityDefinition);
        }
        if XINCLUDE.is_match(xml) {
            issues.push(SecurityIssue::XInclude);
        }

        let references = custom_entity_references(xml);
        if references > self.max_entity_references {
            issues.push(SecurityIssue::EntityReferences {
                count: references,
                limit: self.max_entity_references,
            });
        }

        let depth = max_depth(xml);
        if depth > self.max_depth {
            issues.push(SecurityIssue::Depth {
                depth,
                limit: self.max_depth,
            });
        }

        ValidationResult::from_issues(issues)
    }

    /// Strip DOCTYPE blocks, entity declarations and references to
    /// non-predefined entities. Advisory: the output still goes through the
    /// hardened parser.
    #[must_use]
    pub fn sanitize(&self, xml: &str) -> String {
        let without_doctype = DOCTYPE_BLOCK.replace_all(xml, "");
        let without_entities = ENTITY_DECLARATION.replace_all(&without_doctype, "");
        ENTITY_REFERENCE
            .replace_all(&without_entities, |caps: &regex::Captures<'_>| {
                if PREDEFINED_ENTITIES.contains(&&caps[1]) {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned()
    }
}

fn custom_entity_references(xml: &str) -> usize {
    ENTITY_REFERENCE
        .captures_iter(xml)
        .filter(|caps| !PREDEFINED_ENTITIES.contains(&&caps[1]))
        .count()
}

/// Deepest element nesting, from a lexical scan of tags. Comments, CDATA
/// sections and processing instructions are skipped.
fn max_depth(xml: &str) -> usize {
    let bytes = xml.as_bytes();
    let (mut depth, mut deepest, mut i) = (0usize, 0usize, 0usize);

    while let Some(offset) = bytes[i..].iter().position(|&b| b == b'<') {
        let start = i + offset;
        let rest = &xml[start..];
        let skip_to = |terminator: &str| {
            rest.find(terminator)
                .map_or(bytes.len(), |end| start + end + terminator.len())
        };

        i = if rest.starts_with("<!--") {
            skip_to("-->")
        } else if rest.starts_with("<![CDATA[") {
            skip_to("]]>")
        } else if rest.starts_with("<?") || rest.starts_with("<!") {
            skip_to(">")
        } else if rest.starts_with("</") {
            depth = depth.saturating_sub(1);
            skip_to(">")
        } else {
            let end = skip_to(">");
            if !xml[start..end].ends_with("/>") {
                depth += 1;
                deepest = deepest.max(depth);
            }
            end
        };
        if i >= bytes.len() {
            break;
        }
    }
    deepest
}
