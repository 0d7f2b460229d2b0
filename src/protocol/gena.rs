// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GENA eventing: lease headers, notifications and property sets.

use std::collections::BTreeMap;
use std::mem;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::ParseError;

use super::ProtocolEvent;

/// Parses a `TIMEOUT` header.
///
/// Returns the lease in seconds, or `None` for `infinite` and anything
/// unreadable.
///
/// ```
/// use homehub_lib::protocol::gena::parse_timeout;
///
/// assert_eq!(parse_timeout("Second-120"), Some(120));
/// assert_eq!(parse_timeout("second-1800 "), Some(1800));
/// assert_eq!(parse_timeout("infinite"), None);
/// ```
#[must_use]
pub fn parse_timeout(header: &str) -> Option<u64> {
    let header = header.trim();
    let (prefix, secs) = header.split_at_checked("Second-".len())?;
    if !prefix.eq_ignore_ascii_case("Second-") {
        return None;
    }
    secs.trim().parse().ok()
}

/// An event notification, extracted from a `NOTIFY` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Subscription identifier (`SID` header).
    pub sid: String,
    /// Event key (`SEQ` header).
    pub seq: u64,
    /// Property set body.
    pub body: String,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(sid: impl Into<String>, seq: u64, body: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            seq,
            body: body.into(),
        }
    }

    /// Extracts a notification from a protocol event.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnexpectedFormat` if the event is not a
    /// `NOTIFY`, and `ParseError::MissingField` if `SID` or `SEQ` is absent
    /// or unreadable.
    pub fn from_event(event: &ProtocolEvent) -> Result<Self, ParseError> {
        if !event.method().eq_ignore_ascii_case("NOTIFY") {
            return Err(ParseError::UnexpectedFormat(format!(
                "expected NOTIFY, got {}",
                event.method()
            )));
        }
        let sid = event
            .header("sid")
            .ok_or_else(|| ParseError::MissingField("SID".to_string()))?;
        let seq = event
            .header("seq")
            .and_then(|seq| seq.trim().parse().ok())
            .ok_or_else(|| ParseError::MissingField("SEQ".to_string()))?;

        Ok(Self::new(sid.trim(), seq, event.content()))
    }
}

/// Decodes a `<propertyset>` into variable name and value.
///
/// Values are unescaped once, so an embedded `LastChange` document comes
/// back as XML text ready for [`parse_last_change`].
///
/// # Errors
///
/// Returns `ParseError::Xml` if the body is not well-formed.
pub fn parse_property_set(body: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut properties = BTreeMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                stack.push(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
                text.clear();
            }
            Event::Empty(element) => {
                if stack.last().is_some_and(|parent| parent == "property") {
                    let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                    properties.insert(name, String::new());
                }
            }
            Event::Text(chunk) => text.push_str(&chunk.unescape()?),
            Event::CData(chunk) => text.push_str(&String::from_utf8_lossy(&chunk.into_inner())),
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                if stack.last().is_some_and(|parent| parent == "property") {
                    properties.insert(name, mem::take(&mut text));
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(properties)
}

/// Decodes a `LastChange` document into variable name and `val`.
///
/// ```
/// use homehub_lib::protocol::gena::parse_last_change;
///
/// let xml = r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/">
///   <InstanceID val="0"><TransportState val="PLAYING"/></InstanceID>
/// </Event>"#;
/// let vars = parse_last_change(xml).unwrap();
/// assert_eq!(vars["TransportState"], "PLAYING");
/// ```
///
/// # Errors
///
/// Returns `ParseError::Xml` if the document is not well-formed.
pub fn parse_last_change(xml: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut vars = BTreeMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                if name == "InstanceID" || name == "Event" {
                    continue;
                }
                if let Some(attr) = element.try_get_attribute("val")? {
                    vars.insert(name, attr.unescape_value()?.into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(vars)
}
