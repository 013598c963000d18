#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Request building, sending and response interpretation across the crate
//! boundary, with a stub transport standing in for the server.

use std::{sync::Mutex, time::Duration};

use {
    async_trait::async_trait,
    calmcp_caldav::{
        CalDavClient, CalDavProtocol, DavMethod, DavRequest, DavResponse, DavTransport,
        HttpDavTransport, Result,
    },
};

const MKCALENDAR_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/calendars/alice/test-project/</d:href>
    <d:propstat>
      <d:prop><d:displayname/></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

struct StubServer {
    seen: Mutex<Vec<DavRequest>>,
}

#[async_trait]
impl DavTransport for StubServer {
    async fn send(&self, request: DavRequest) -> Result<DavResponse> {
        self.seen.lock().unwrap().push(request);
        Ok(DavResponse::new(207, MKCALENDAR_REPLY))
    }
}

#[tokio::test]
async fn mkcalendar_round_trip() {
    let protocol = CalDavProtocol::new();
    let body = protocol
        .build_mkcalendar_request("Test Project", Some("#9C27B0"))
        .unwrap();
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(body.contains("<d:displayname>Test Project</d:displayname>"));
    assert!(body.contains("<ic:calendar-color>#9C27B0</ic:calendar-color>"));

    let server = StubServer {
        seen: Mutex::new(Vec::new()),
    };
    let reply = server
        .send(DavRequest::new(DavMethod::Mkcalendar, "/calendars/alice/test-project/").with_body(body))
        .await
        .unwrap();

    let responses = protocol.parse_response_body(&reply.body).unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].href, "/calendars/alice/test-project/");
    assert_eq!(responses[0].status(), Some("HTTP/1.1 200 OK"));
    assert_eq!(responses[0].status_code(), Some(200));
}

#[tokio::test]
async fn client_accepts_multistatus_mkcalendar_reply() {
    let client = CalDavClient::new(StubServer {
        seen: Mutex::new(Vec::new()),
    });
    let created = client
        .create_calendar("/calendars/alice/", "Test Project", Some("#9C27B0"))
        .await
        .unwrap();
    assert_eq!(created.display_name.as_deref(), Some("Test Project"));

    let seen = client.transport().seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, DavMethod::Mkcalendar);
}

#[tokio::test]
async fn http_transport_against_mock_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("REPORT", "/calendars/alice/work/")
        .match_header("depth", "1")
        .match_body(mockito::Matcher::Regex("<c:time-range start=\"20250101T000000Z\"".into()))
        .with_status(207)
        .with_header("content-type", "application/xml; charset=utf-8")
        .with_body(
            "<d:multistatus xmlns:d=\"DAV:\" xmlns:c=\"urn:ietf:params:xml:ns:caldav\">\
             <d:response><d:href>/calendars/alice/work/standup.ics</d:href><d:propstat><d:prop>\
             <d:getetag>\"42\"</d:getetag><c:calendar-data>BEGIN:VCALENDAR\r\nVERSION:2.0\r\n\
             BEGIN:VEVENT\r\nUID:standup-1\r\nDTSTART:20250106T090000Z\r\nSUMMARY:Standup\r\n\
             END:VEVENT\r\nEND:VCALENDAR\r\n</c:calendar-data></d:prop>\
             <d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response></d:multistatus>",
        )
        .create_async()
        .await;

    let transport = HttpDavTransport::new(&server.url(), Duration::from_secs(5)).unwrap();
    let client = CalDavClient::new(transport);
    let range = calmcp_caldav::TimeRange::starting_at(
        chrono::DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc),
    );
    let events = client
        .list_events("/calendars/alice/work/", Some(&range))
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].uid.as_deref(), Some("standup-1"));
    assert_eq!(events[0].etag, "\"42\"");
    assert_eq!(events[0].start.as_deref(), Some("2025-01-06T09:00:00"));
    mock.assert_async().await;
}
