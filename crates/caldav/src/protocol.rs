//! Request bodies for the CalDAV verbs and interpretation of multistatus
//! responses.
//!
//! Every body goes through [`XmlDocumentBuilder`](calmcp_xml::XmlDocumentBuilder)
//! so text and attribute values are always escaped.

use {
    calmcp_xml::{
        DefaultXmlService, SecurityIssue, XmlError, XmlSecurityGuard, XmlService,
        lookup::{self, HREF, PROP, PROPSTAT, STATUS, as_list, local_name, text_of},
        parse::{ATTRIBUTES_KEY, TEXT_KEY},
    },
    serde_json::Value,
};

use crate::{
    error::Result,
    names::{
        CALDAV_NS, CALDAV_PREFIX, CALENDAR_COLOR, CALENDAR_DATA, CALENDAR_HOME_SET,
        CURRENT_USER_PRINCIPAL, DAV_NS, DAV_PREFIX, DEFAULT_PROPFIND_PROPERTIES, DISPLAYNAME,
        GETETAG, namespaces_for,
    },
    types::{CalDavResponse, PropStat, PropertyUpdate, TimeRange},
};

/// Builds CalDAV request bodies and reads multistatus responses through an
/// [`XmlService`].
#[derive(Debug, Clone, Default)]
pub struct CalDavProtocol<S: XmlService = DefaultXmlService> {
    xml: S,
    guard: XmlSecurityGuard,
}

impl CalDavProtocol {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: XmlService> CalDavProtocol<S> {
    pub fn with_service(xml: S) -> Self {
        Self {
            xml,
            guard: XmlSecurityGuard::default(),
        }
    }

    #[must_use]
    pub fn with_guard(mut self, guard: XmlSecurityGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn xml(&self) -> &S {
        &self.xml
    }

    /// `<d:propfind>` asking for `properties`, or the default set of
    /// resource type, display name, colour and supported components.
    pub fn build_propfind_request(&self, properties: Option<&[&str]>) -> Result<String> {
        let properties = properties.unwrap_or(DEFAULT_PROPFIND_PROPERTIES);
        let mut doc = self
            .xml
            .create_document("d:propfind", &namespaces_for(properties.iter().copied()));
        doc.start_element("d:prop")?;
        for property in properties {
            doc.add_empty_element(property)?;
        }
        doc.end_element()?;
        Ok(doc.render_document()?)
    }

    /// `<c:mkcalendar>` setting the display name and, when given, the colour.
    ///
    /// The root is in the CalDAV namespace as RFC 4791 §5.3.1 defines it,
    /// not `d:mkcalendar`.
    pub fn build_mkcalendar_request(
        &self,
        display_name: &str,
        color: Option<&str>,
    ) -> Result<String> {
        let mut used = vec![DISPLAYNAME];
        if color.is_some() {
            used.push(CALENDAR_COLOR);
        }
        let mut doc = self
            .xml
            .create_document("c:mkcalendar", &namespaces_for(used));
        doc.start_element("d:set")?
            .start_element("d:prop")?
            .add_element(DISPLAYNAME, Some(display_name))?;
        if let Some(color) = color {
            doc.add_element(CALENDAR_COLOR, Some(color))?;
        }
        Ok(doc.render_document()?)
    }

    /// `<d:propertyupdate>` with one `<d:set>` or `<d:remove>` block per
    /// update, in order.
    pub fn build_proppatch_request(&self, updates: &[PropertyUpdate]) -> Result<String> {
        let namespaces = namespaces_for(updates.iter().map(PropertyUpdate::name));
        let mut doc = self.xml.create_document("d:propertyupdate", &namespaces);
        for update in updates {
            match update {
                PropertyUpdate::Set { name, value } => {
                    doc.start_element("d:set")?
                        .start_element("d:prop")?
                        .add_element(name, Some(value))?;
                },
                PropertyUpdate::Remove { name } => {
                    doc.start_element("d:remove")?
                        .start_element("d:prop")?
                        .add_empty_element(name)?;
                },
            }
            doc.end_element()?.end_element()?;
        }
        Ok(doc.render_document()?)
    }

    /// `<c:calendar-query>` for VEVENTs, optionally limited to `range`.
    pub fn build_calendar_query_report(&self, range: Option<&TimeRange>) -> Result<String> {
        let mut doc = self.calendar_query_prefix()?;
        if let Some(range) = range {
            doc.start_element("c:time-range")?
                .add_attribute("start", &self.xml.format_utc_timestamp(&range.start))?;
            if let Some(end) = &range.end {
                doc.add_attribute("end", &self.xml.format_utc_timestamp(end))?;
            }
        }
        Ok(doc.render_document()?)
    }

    /// `<c:calendar-query>` matching the VEVENT whose UID equals `uid`.
    pub fn build_event_by_uid_request(&self, uid: &str) -> Result<String> {
        let mut doc = self.calendar_query_prefix()?;
        doc.start_element("c:prop-filter")?
            .add_attribute("name", "UID")?
            .add_element("c:text-match", Some(uid))?;
        Ok(doc.render_document()?)
    }

    /// `<c:calendar-multiget>` fetching etag and calendar data for `hrefs`.
    pub fn build_calendar_multiget_request(&self, hrefs: &[&str]) -> Result<String> {
        let mut doc = self
            .xml
            .create_document("c:calendar-multiget", &namespaces_for([]));
        doc.start_element("d:prop")?
            .add_empty_element(GETETAG)?
            .add_empty_element(CALENDAR_DATA)?
            .end_element()?;
        for href in hrefs {
            doc.add_element("d:href", Some(href))?;
        }
        Ok(doc.render_document()?)
    }

    /// PROPFIND body asking for `d:current-user-principal`.
    pub fn build_current_user_principal_request(&self) -> Result<String> {
        self.build_single_property_propfind(CURRENT_USER_PRINCIPAL, &[(DAV_PREFIX, DAV_NS)])
    }

    /// PROPFIND body asking for `c:calendar-home-set`.
    pub fn build_calendar_home_set_request(&self) -> Result<String> {
        self.build_single_property_propfind(CALENDAR_HOME_SET, &[
            (DAV_PREFIX, DAV_NS),
            (CALDAV_PREFIX, CALDAV_NS),
        ])
    }

    fn build_single_property_propfind(
        &self,
        property: &str,
        namespaces: &[(&str, &str)],
    ) -> Result<String> {
        let mut doc = self.xml.create_document("d:propfind", namespaces);
        doc.start_element("d:prop")?.add_empty_element(property)?;
        Ok(doc.render_document()?)
    }

    /// Opens a calendar-query document and leaves the cursor inside the
    /// VEVENT comp-filter.
    fn calendar_query_prefix(&self) -> Result<calmcp_xml::XmlDocumentBuilder> {
        let mut doc = self
            .xml
            .create_document("c:calendar-query", &namespaces_for([]));
        doc.start_element("d:prop")?
            .add_empty_element(GETETAG)?
            .add_empty_element(CALENDAR_DATA)?
            .end_element()?
            .start_element("c:filter")?
            .start_element("c:comp-filter")?
            .add_attribute("name", "VCALENDAR")?
            .start_element("c:comp-filter")?
            .add_attribute("name", "VEVENT")?;
        Ok(doc)
    }

    /// Interpret a parsed multistatus document.
    ///
    /// A document without a multistatus yields no responses. Missing pieces
    /// inside a response (href, status, properties) default to empty values
    /// rather than failing the response.
    #[must_use]
    pub fn parse_multistatus(&self, document: &Value) -> Vec<CalDavResponse> {
        let Some(multistatus) = lookup::locate_multistatus(document) else {
            return Vec::new();
        };
        let multistatus = first(multistatus);
        lookup::locate_responses(multistatus)
            .into_iter()
            .filter(|response| response.is_object())
            .map(parse_response)
            .collect()
    }

    /// Screen, parse and interpret a response body.
    ///
    /// Bodies flagged by the security guard are sanitized before parsing.
    /// Sanitizing cannot flatten nesting, so a body over the guard's depth
    /// limit is rejected with a parse error. An oversized body is still parsed.
    pub fn parse_response_body(&self, body: &str) -> Result<Vec<CalDavResponse>> {
        let validation = self.guard.validate(body);
        if let Some(issue) = validation
            .issues
            .iter()
            .find(|issue| matches!(issue, SecurityIssue::Depth { .. }))
        {
            return Err(XmlError::parse(issue.to_string()).into());
        }
        let document = if validation.valid {
            self.xml.parse_document(body, None)?
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                issues = ?validation.issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "sanitizing flagged CalDAV response body"
            );
            self.xml.parse_document(&self.guard.sanitize(body), None)?
        };
        Ok(self.parse_multistatus(&document))
    }
}

fn parse_response(response: &Value) -> CalDavResponse {
    let href = lookup::lookup(response, HREF)
        .and_then(text_of)
        .unwrap_or_default();
    let status = lookup::lookup(response, STATUS).and_then(text_of);
    let propstats = lookup::lookup(response, PROPSTAT)
        .map(as_list)
        .unwrap_or_default()
        .into_iter()
        .map(parse_propstat)
        .collect();
    CalDavResponse {
        href,
        status,
        propstats,
    }
}

fn parse_propstat(propstat: &Value) -> PropStat {
    let status = lookup::lookup(propstat, STATUS)
        .and_then(text_of)
        .unwrap_or_default();
    let properties = lookup::lookup(propstat, PROP)
        .map(first)
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter(|(name, _)| !matches!(name.as_str(), ATTRIBUTES_KEY | TEXT_KEY))
                .map(|(name, value)| (local_name(name).to_string(), first(value).clone()))
                .collect()
        })
        .unwrap_or_default();
    PropStat { status, properties }
}

/// Look through a singleton array, as produced by forced-array parsing.
fn first(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}
