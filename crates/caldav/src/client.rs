//! Calendar operations on top of the protocol layer and a [`DavTransport`].

use {
    calmcp_xml::{
        DefaultXmlService, XmlService,
        lookup::{HREF, lookup, text_of},
    },
    uuid::Uuid,
};

use crate::{
    discovery::WELL_KNOWN_CALDAV_PATH,
    error::{Error, Result},
    ical,
    protocol::CalDavProtocol,
    transport::{DavMethod, DavRequest, DavResponse, DavTransport, Depth},
    types::{CalDavResponse, CalendarInfo, EventSummary, PropertyUpdate, TimeRange},
};

const MULTI_STATUS: u16 = 207;

/// CalDAV client generic over how requests reach the server.
pub struct CalDavClient<T: DavTransport, S: XmlService = DefaultXmlService> {
    transport: T,
    protocol: CalDavProtocol<S>,
}

impl<T: DavTransport> CalDavClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            protocol: CalDavProtocol::new(),
        }
    }
}

impl<T: DavTransport, S: XmlService> CalDavClient<T, S> {
    pub fn with_protocol(transport: T, protocol: CalDavProtocol<S>) -> Self {
        Self {
            transport,
            protocol,
        }
    }

    pub fn protocol(&self) -> &CalDavProtocol<S> {
        &self.protocol
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Principal URL of the authenticated user, from `current-user-principal`.
    pub async fn current_user_principal(&self, path: &str) -> Result<Option<String>> {
        let body = self.protocol.build_current_user_principal_request()?;
        let responses = self
            .multistatus(DavRequest::new(DavMethod::Propfind, path).with_depth(Depth::Zero), body)
            .await?;
        Ok(first_href_property(&responses, "current-user-principal"))
    }

    /// Collection holding the principal's calendars, from `calendar-home-set`.
    pub async fn calendar_home_set(&self, principal: &str) -> Result<Option<String>> {
        let body = self.protocol.build_calendar_home_set_request()?;
        let responses = self
            .multistatus(
                DavRequest::new(DavMethod::Propfind, principal).with_depth(Depth::Zero),
                body,
            )
            .await?;
        Ok(first_href_property(&responses, "calendar-home-set"))
    }

    /// Locate the calendar home, starting from the RFC 6764 well-known path.
    pub async fn discover_calendar_home(&self) -> Result<Option<String>> {
        let Some(principal) = self.current_user_principal(WELL_KNOWN_CALDAV_PATH).await? else {
            return Ok(None);
        };
        self.calendar_home_set(&principal).await
    }

    /// Calendars directly below `home`.
    pub async fn list_calendars(&self, home: &str) -> Result<Vec<CalendarInfo>> {
        let body = self.protocol.build_propfind_request(None)?;
        let responses = self
            .multistatus(DavRequest::new(DavMethod::Propfind, home).with_depth(Depth::One), body)
            .await?;
        let calendars: Vec<CalendarInfo> = responses
            .iter()
            .filter_map(CalendarInfo::from_response)
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(home, count = calendars.len(), "listed CalDAV calendars");

        Ok(calendars)
    }

    /// Create a calendar collection below `home` under a fresh random name.
    pub async fn create_calendar(
        &self,
        home: &str,
        display_name: &str,
        color: Option<&str>,
    ) -> Result<CalendarInfo> {
        let href = format!("{}/{}/", home.trim_end_matches('/'), Uuid::new_v4());
        let body = self.protocol.build_mkcalendar_request(display_name, color)?;
        let request = DavRequest::new(DavMethod::Mkcalendar, &href).with_body(body);
        let response = self.transport.send(request).await?;

        // Some servers answer MKCALENDAR with a multistatus describing each property.
        if response.status == MULTI_STATUS {
            let responses = self.protocol.parse_response_body(&response.body)?;
            if let Some(failed) = responses.iter().find(|r| !r.is_success()) {
                return Err(Error::message(format!(
                    "MKCALENDAR {href} rejected: {}",
                    failed.status().unwrap_or("no status")
                )));
            }
        } else {
            ensure_success(DavMethod::Mkcalendar, &href, &response)?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(href = %href, display_name, "created CalDAV calendar");

        Ok(CalendarInfo {
            href,
            display_name: Some(display_name.to_string()),
            color: color.map(String::from),
            description: None,
            components: Vec::new(),
        })
    }

    /// Apply property changes to a collection. Returns the per-resource
    /// results so callers can inspect partial failures.
    pub async fn update_calendar(
        &self,
        href: &str,
        updates: &[PropertyUpdate],
    ) -> Result<Vec<CalDavResponse>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.protocol.build_proppatch_request(updates)?;
        self.multistatus(DavRequest::new(DavMethod::Proppatch, href), body)
            .await
    }

    /// Events in a calendar, optionally limited to `range`.
    pub async fn list_events(
        &self,
        calendar_href: &str,
        range: Option<&TimeRange>,
    ) -> Result<Vec<EventSummary>> {
        let body = self.protocol.build_calendar_query_report(range)?;
        let responses = self.report(calendar_href, body).await?;
        collect_events(&responses)
    }

    /// The event with the given iCalendar UID, if any.
    pub async fn find_event_by_uid(
        &self,
        calendar_href: &str,
        uid: &str,
    ) -> Result<Option<EventSummary>> {
        let body = self.protocol.build_event_by_uid_request(uid)?;
        let responses = self.report(calendar_href, body).await?;
        Ok(collect_events(&responses)?
            .into_iter()
            .find(|event| event.uid.as_deref().is_none_or(|found| found == uid)))
    }

    /// Fetch specific event resources in one round trip.
    pub async fn get_events(
        &self,
        calendar_href: &str,
        hrefs: &[&str],
    ) -> Result<Vec<EventSummary>> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.protocol.build_calendar_multiget_request(hrefs)?;
        let responses = self.report(calendar_href, body).await?;
        collect_events(&responses)
    }

    /// Fetch one event resource with a plain GET.
    ///
    /// The body is the raw iCalendar object; the `ETag` header, when sent,
    /// becomes each summary's etag.
    pub async fn get_event(&self, href: &str) -> Result<Vec<EventSummary>> {
        let response = self
            .transport
            .send(DavRequest::new(DavMethod::Get, href))
            .await?;
        ensure_success(DavMethod::Get, href, &response)?;
        let etag = response.header("ETag").unwrap_or_default();
        ical::parse_events(&response.body, href, etag)
    }

    /// Delete a calendar or event. With `etag` the deletion only happens if
    /// the resource is unchanged.
    pub async fn delete_resource(&self, href: &str, etag: Option<&str>) -> Result<()> {
        let mut request = DavRequest::new(DavMethod::Delete, href);
        if let Some(etag) = etag {
            request = request.with_header("If-Match", etag);
        }
        let response = self.transport.send(request).await?;
        ensure_success(DavMethod::Delete, href, &response)?;

        #[cfg(feature = "tracing")]
        tracing::info!(href, "deleted CalDAV resource");

        Ok(())
    }

    async fn report(&self, calendar_href: &str, body: String) -> Result<Vec<CalDavResponse>> {
        self.multistatus(
            DavRequest::new(DavMethod::Report, calendar_href).with_depth(Depth::One),
            body,
        )
        .await
    }

    /// Send `request` with `body` and interpret the 207 response.
    async fn multistatus(&self, request: DavRequest, body: String) -> Result<Vec<CalDavResponse>> {
        let (method, path) = (request.method, request.path.clone());
        let response = self.transport.send(request.with_body(body)).await?;
        if response.status != MULTI_STATUS {
            return Err(unexpected(method, &path, &response));
        }
        self.protocol.parse_response_body(&response.body)
    }
}

fn ensure_success(method: DavMethod, path: &str, response: &DavResponse) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(unexpected(method, path, response))
    }
}

fn unexpected(method: DavMethod, path: &str, response: &DavResponse) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!(method = %method, path, status = response.status, "unexpected CalDAV status");

    Error::UnexpectedStatus {
        method: method.as_str(),
        path: path.to_string(),
        status: response.status,
    }
}

fn collect_events(responses: &[CalDavResponse]) -> Result<Vec<EventSummary>> {
    let mut events = Vec::new();
    for response in responses.iter().filter(|r| r.is_success()) {
        events.extend(ical::events_from_response(response)?);
    }
    Ok(events)
}

/// Href nested in a property such as `<d:current-user-principal><d:href>`.
fn first_href_property(responses: &[CalDavResponse], property: &str) -> Option<String> {
    responses
        .iter()
        .filter_map(|response| response.property(property))
        .find_map(|value| lookup(value, HREF).and_then(text_of))
}
