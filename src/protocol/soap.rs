// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SOAP control envelopes.
//!
//! Requests are built as plain strings with escaped arguments. Responses are
//! read with a streaming parser that collects the children of the
//! `<ActionResponse>` element and every embedded `<Fault>`; namespace
//! prefixes are ignored.

use std::collections::BTreeMap;
use std::mem;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::action::Fault;
use crate::error::ParseError;

use super::ActionRequest;

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Builds the request envelope for `request`.
///
/// ```
/// use homehub_lib::protocol::ActionRequest;
/// use homehub_lib::protocol::soap;
///
/// let request = ActionRequest::new("/ctl", "urn:x:service:y:1", "Rename").arg("Name", "A&B");
/// let xml = soap::envelope(&request);
/// assert!(xml.contains("<u:Rename xmlns:u=\"urn:x:service:y:1\"><Name>A&amp;B</Name></u:Rename>"));
/// ```
#[must_use]
pub fn envelope(request: &ActionRequest) -> String {
    let args: String = request
        .args
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape(value.as_str())))
        .collect();

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<s:Envelope xmlns:s=\"{ns}\" s:encodingStyle=\"{enc}\">",
            "<s:Body><u:{action} xmlns:u=\"{service}\">{args}</u:{action}></s:Body>",
            "</s:Envelope>"
        ),
        ns = ENVELOPE_NS,
        enc = ENCODING_STYLE,
        action = request.action,
        service = escape(request.service.as_str()),
        args = args,
    )
}

/// Decoded response envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapResponse {
    /// Whether the envelope had a `Body` element at all.
    pub has_body: bool,
    /// Whether the body held the `<ActionResponse>` element.
    pub has_response: bool,
    /// Response arguments by name, unconverted.
    pub results: BTreeMap<String, String>,
    /// Faults embedded anywhere in the body.
    pub faults: Vec<Fault>,
}

#[derive(Default)]
struct FaultBuilder {
    code: String,
    description: String,
    upnp_code: Option<u16>,
    upnp_description: Option<String>,
}

impl FaultBuilder {
    fn finish(self) -> Fault {
        let fault = Fault::new(self.code, self.description);
        match self.upnp_code {
            Some(code) => fault.with_upnp(code, self.upnp_description.unwrap_or_default()),
            None => fault,
        }
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Decodes the response envelope of `action`.
///
/// # Errors
///
/// Returns `ParseError::Xml` if the body is not well-formed XML.
pub fn parse_response(body: &str, action: &str) -> Result<SoapResponse, ParseError> {
    let response_name = format!("{action}Response");
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut out = SoapResponse::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut fault: Option<FaultBuilder> = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = local_name(&element);
                let parent = stack.last().map(String::as_str);
                match name.as_str() {
                    "Body" => out.has_body = true,
                    "Fault" => fault = Some(FaultBuilder::default()),
                    _ if name == response_name && parent == Some("Body") => {
                        out.has_response = true;
                    }
                    _ => {}
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(element) => {
                let name = local_name(&element);
                let parent = stack.last().map(String::as_str);
                if name == "Body" {
                    out.has_body = true;
                } else if name == response_name && parent == Some("Body") {
                    out.has_response = true;
                } else if parent == Some(response_name.as_str()) {
                    out.results.insert(name, String::new());
                }
            }
            Event::Text(chunk) => text.push_str(&chunk.unescape()?),
            Event::CData(chunk) => text.push_str(&String::from_utf8_lossy(&chunk.into_inner())),
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str);
                if parent == Some(response_name.as_str()) {
                    out.results.insert(name, mem::take(&mut text));
                } else if name == "Fault" {
                    if let Some(builder) = fault.take() {
                        out.faults.push(builder.finish());
                    }
                } else if let Some(builder) = fault.as_mut() {
                    let value = mem::take(&mut text);
                    match name.as_str() {
                        "faultcode" => builder.code = value,
                        "faultstring" => builder.description = value,
                        "errorCode" => builder.upnp_code = value.trim().parse().ok(),
                        "errorDescription" => builder.upnp_description = Some(value),
                        _ => {}
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUME_OK: &str = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1">
      <CurrentVolume>23</CurrentVolume>
    </u:GetVolumeResponse>
  </s:Body>
</s:Envelope>"#;

    const FAULT: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
          <errorCode>701</errorCode>
          <errorDescription>Transition not available</errorDescription>
        </UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn collects_response_arguments_unconverted() {
        let response = parse_response(VOLUME_OK, "GetVolume").unwrap();
        assert!(response.has_body);
        assert!(response.has_response);
        assert!(response.faults.is_empty());
        assert_eq!(response.results.get("CurrentVolume").map(String::as_str), Some("23"));
    }

    #[test]
    fn extracts_upnp_fault() {
        let response = parse_response(FAULT, "Play").unwrap();
        assert!(!response.has_response);
        assert_eq!(response.faults.len(), 1);

        let fault = &response.faults[0];
        assert_eq!(fault.code(), "s:Client");
        assert_eq!(fault.description(), "UPnPError");
        assert_eq!(fault.upnp_code(), Some(701));
        assert_eq!(fault.upnp_description(), Some("Transition not available"));
    }

    #[test]
    fn escaped_and_empty_arguments() {
        let body = r#"<s:Envelope xmlns:s="x"><s:Body><u:GetPositionInfoResponse xmlns:u="y"><TrackMetaData>&lt;DIDL-Lite/&gt;</TrackMetaData><TrackURI/></u:GetPositionInfoResponse></s:Body></s:Envelope>"#;
        let response = parse_response(body, "GetPositionInfo").unwrap();
        assert_eq!(response.results["TrackMetaData"], "<DIDL-Lite/>");
        assert_eq!(response.results["TrackURI"], "");
    }

    #[test]
    fn missing_body_is_reported() {
        let response = parse_response("<html><p>busy</p></html>", "Play").unwrap();
        assert!(!response.has_body);
    }

    #[test]
    fn other_action_response_is_ignored() {
        let response = parse_response(VOLUME_OK, "GetMute").unwrap();
        assert!(response.has_body);
        assert!(!response.has_response);
        assert!(response.results.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_response("<s:Envelope><s:Body></s:Envelope>", "Play").is_err());
    }

    #[test]
    fn envelope_escapes_arguments() {
        let request = ActionRequest::new("/c", "urn:s", "SetAVTransportURI")
            .arg("InstanceID", "0")
            .arg("CurrentURI", "http://x/?a=1&b=<2>");
        let xml = envelope(&request);
        assert!(xml.contains("<InstanceID>0</InstanceID>"));
        assert!(xml.contains("http://x/?a=1&amp;b=&lt;2&gt;"));
        assert!(xml.starts_with("<?xml"));
    }
}
