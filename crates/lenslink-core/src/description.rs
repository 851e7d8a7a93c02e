//! Single-pass parsing of device-description XML documents
//!
//! Discovery replies carry a URL to a small XML document describing the
//! device: a friendly name and a list of `<service>` entries, each with
//! a type token and an access URL. The document comes from an untrusted
//! device, so parsing is a streaming event walk over the bytes rather
//! than a DOM build -- memory stays bounded regardless of what the
//! document contains.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::device::{DeviceId, DeviceRecord, ServiceEndpoint};

#[derive(Error, Debug)]
pub enum DescriptionError {
    /// The document is not well-formed XML. Callers may retry the fetch.
    #[error("malformed device description: {0}")]
    Malformed(String),
    /// Well-formed, but no liveview service entry was found. The device
    /// cannot be streamed from and should be dropped.
    #[error("device description has no liveview service entry")]
    Incomplete,
}

/// Parsed contents of a device-description document
#[derive(Debug, Clone, Default)]
pub struct DeviceDescription {
    /// Human-readable device name, if present
    pub friendly_name: Option<String>,
    /// Advertised service endpoints (type token + URL)
    pub endpoints: Vec<ServiceEndpoint>,
}

impl DeviceDescription {
    /// Parse a description document.
    ///
    /// Unknown elements are ignored; missing optional elements leave the
    /// corresponding field absent. A liveview service entry is mandatory:
    /// its absence is `Incomplete`, distinct from XML malformedness.
    pub fn parse(xml: &str) -> Result<Self, DescriptionError> {
        let mut reader = Reader::from_str(xml);

        let mut description = DeviceDescription::default();
        // Path of open elements, by local name
        let mut path: Vec<String> = Vec::new();
        let mut service_type: Option<String> = None;
        let mut service_url: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = local_name(e.local_name().as_ref());
                    if name == "service" {
                        service_type = None;
                        service_url = None;
                    }
                    path.push(name);
                }
                Ok(Event::End(_)) => {
                    if path.last().map(String::as_str) == Some("service") {
                        if let (Some(ty), Some(url)) = (service_type.take(), service_url.take()) {
                            description.endpoints.push(ServiceEndpoint {
                                service_type: ty,
                                url,
                            });
                        }
                    }
                    path.pop();
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| DescriptionError::Malformed(e.to_string()))?;
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let in_service = path.iter().any(|p| p == "service");
                    match path.last().map(String::as_str) {
                        Some("friendlyName") => {
                            description.friendly_name = Some(text.to_string());
                        }
                        Some("serviceType") if in_service => {
                            service_type = Some(text.to_string());
                        }
                        Some("serviceUrl") if in_service => {
                            service_url = Some(text.to_string());
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(DescriptionError::Malformed(e.to_string())),
            }
        }

        if !description.has_liveview() {
            return Err(DescriptionError::Incomplete);
        }

        Ok(description)
    }

    /// Whether any entry identifies the streaming/liveview service
    pub fn has_liveview(&self) -> bool {
        self.endpoints.iter().any(|e| is_liveview(&e.service_type))
    }

    /// Attach identity and build the immutable device record
    pub fn into_record(self, description_url: &str) -> DeviceRecord {
        let name = self
            .friendly_name
            .unwrap_or_else(|| "unknown device".to_string());
        DeviceRecord::new(
            DeviceId::from_description_url(description_url),
            name,
            self.endpoints,
        )
    }
}

/// Match plain ("liveview") and urn-style ("...:service:Liveview:1") tokens
fn is_liveview(service_type: &str) -> bool {
    service_type.to_ascii_lowercase().contains(crate::LIVEVIEW_SERVICE)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
