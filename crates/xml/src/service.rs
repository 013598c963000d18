//! The XML capability handed to protocol code.

use {
    chrono::{DateTime, Utc},
    serde_json::Value,
    tracing::debug,
};

use crate::{
    builder::XmlDocumentBuilder,
    error::Result,
    escape::escape_text,
    parse::{ParseOptions, parse_with_options},
};

/// iCalendar UTC date-time form, e.g. `20240115T093000Z`.
const UTC_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Escaping, parsing and document creation behind one seam.
///
/// Protocol builders are generic over this trait so tests and alternative
/// environments can substitute their own implementation.
pub trait XmlService: Send + Sync {
    fn escape(&self, text: Option<&str>) -> String {
        escape_text(text)
    }

    /// Parse `xml` into the nested key/value structure.
    ///
    /// `options` of `None` uses [`ParseOptions::default`]. When that attempt
    /// fails the document is parsed once more with
    /// [`ParseOptions::fallback`]; the second error is returned as is.
    /// That is [`Error::Parse`](crate::Error::Parse) for malformed input and
    /// [`Error::DtdForbidden`](crate::Error::DtdForbidden) when the document
    /// carries a `<!DOCTYPE>`, which both attempts refuse.
    fn parse_document(&self, xml: &str, options: Option<ParseOptions>) -> Result<Value>;

    fn create_document(&self, root: &str, namespaces: &[(&str, &str)]) -> XmlDocumentBuilder {
        XmlDocumentBuilder::new(root, namespaces)
    }

    fn format_utc_timestamp(&self, at: &DateTime<Utc>) -> String {
        format_utc_timestamp(at)
    }
}

/// Stateless [`XmlService`] backed by the crate's own parser and builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultXmlService;

impl XmlService for DefaultXmlService {
    fn parse_document(&self, xml: &str, options: Option<ParseOptions>) -> Result<Value> {
        let primary = options.unwrap_or_default();
        match parse_with_options(xml, &primary) {
            Ok(value) => Ok(value),
            Err(first) => {
                debug!(error = %first, "primary XML parse failed, retrying with fallback options");
                parse_with_options(xml, &ParseOptions::fallback())
            },
        }
    }
}

/// Render `at` as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn format_utc_timestamp(at: &DateTime<Utc>) -> String {
    at.format(UTC_TIMESTAMP_FORMAT).to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        chrono::TimeZone,
        rstest::rstest,
        serde_json::json,
    };

    use {super::*, crate::error::Error};

    #[rstest]
    #[case(Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(), "20240115T093000Z")]
    #[case(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap(), "19991231T235959Z")]
    #[case(Utc.with_ymd_and_hms(2030, 7, 4, 0, 0, 0).unwrap(), "20300704T000000Z")]
    fn formats_utc_timestamps(#[case] at: DateTime<Utc>, #[case] expected: &str) {
        assert_eq!(format_utc_timestamp(&at), expected);
        assert_eq!(DefaultXmlService.format_utc_timestamp(&at), expected);
    }

    #[test]
    fn sub_second_precision_is_dropped() {
        let at = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(format_utc_timestamp(&at), "20231114T221320Z");
    }

    #[test]
    fn parses_with_default_options() {
        let value = DefaultXmlService
            .parse_document(
                r#"<d:multistatus xmlns:d="DAV:"><d:response><d:href>/a</d:href></d:response></d:multistatus>"#,
                None,
            )
            .unwrap();
        assert_eq!(value["d:multistatus"]["d:response"]["d:href"], json!("/a"));
    }

    #[test]
    fn falls_back_to_lenient_parse() {
        // mismatched end tag: rejected strictly, accepted by the fallback
        let value = DefaultXmlService
            .parse_document("<root><a>x</b></root>", None)
            .unwrap();
        assert_eq!(value["root"]["a"], json!(["x"]));
    }

    #[test]
    fn second_failure_is_terminal() {
        let err = DefaultXmlService
            .parse_document("this is not xml", None)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn doctype_fails_both_attempts() {
        let err = DefaultXmlService
            .parse_document(r#"<!DOCTYPE d [<!ENTITY x "y">]><d>&x;</d>"#, None)
            .unwrap_err();
        assert!(matches!(err, Error::DtdForbidden));
    }

    #[test]
    fn caller_options_are_honoured() {
        let options = ParseOptions {
            force_array: true,
            ..ParseOptions::default()
        };
        let value = DefaultXmlService
            .parse_document("<root><a>x</a></root>", Some(options))
            .unwrap();
        assert_eq!(value["root"]["a"], json!(["x"]));
    }

    #[test]
    fn escape_and_create_document_delegate() {
        let service = DefaultXmlService;
        assert_eq!(service.escape(Some("a<b")), "a&lt;b");
        assert_eq!(service.escape(None), "");
        let doc = service.create_document("d:prop", &[("d", "DAV:")]);
        assert_eq!(doc.render().unwrap(), r#"<d:prop xmlns:d="DAV:"></d:prop>"#);
    }
}
