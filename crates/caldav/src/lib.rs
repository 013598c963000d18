//! CalDAV protocol layer for calmcp.
//!
//! Builds request bodies for PROPFIND, PROPPATCH, MKCALENDAR and REPORT,
//! interprets multistatus responses, and drives them over a pluggable HTTP
//! transport. Supports Fastmail, iCloud, and generic CalDAV servers.

pub mod client;
pub mod discovery;
pub mod error;
pub mod ical;
pub mod names;
pub mod protocol;
pub mod transport;
pub mod types;

pub use {
    client::CalDavClient,
    error::{Error, Result},
    protocol::CalDavProtocol,
    transport::{DavMethod, DavRequest, DavResponse, DavTransport, Depth, HttpDavTransport},
    types::{CalDavResponse, CalendarInfo, EventSummary, PropStat, PropertyUpdate, TimeRange},
};
