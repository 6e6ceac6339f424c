//! XML/JSON negotiation and contract rendering.

use arena_contracts::Contract;
use serde::de::DeserializeOwned;

use crate::config::WireFormat;
use crate::error::ApiError;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>";

/// `?format=` wins over `Accept`; anything else falls back to the
/// configured default.
pub fn negotiate(
    format_param: Option<&str>,
    accept: Option<&str>,
    default: WireFormat,
) -> WireFormat {
    if let Some(format) = format_param.and_then(WireFormat::parse) {
        return format;
    }

    match accept.map(|a| a.to_ascii_lowercase()) {
        Some(accept) if accept.contains("xml") => WireFormat::Xml,
        Some(accept) if accept.contains("json") => WireFormat::Json,
        _ => default,
    }
}

pub fn body_format(content_type: Option<&str>) -> WireFormat {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("xml") => WireFormat::Xml,
        _ => WireFormat::Json,
    }
}

pub fn render<T: Contract>(value: &T, format: WireFormat) -> Result<Vec<u8>, String> {
    match format {
        WireFormat::Json => serde_json::to_vec(value).map_err(|err| err.to_string()),
        WireFormat::Xml => {
            let body = quick_xml::se::to_string_with_root(T::ROOT, value)
                .map_err(|err| err.to_string())?;
            let mut out = String::with_capacity(XML_DECLARATION.len() + body.len());
            out.push_str(XML_DECLARATION);
            out.push_str(&body);
            Ok(out.into_bytes())
        }
    }
}

/// A request body held for a handler parameter of kind `Body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub bytes: Vec<u8>,
    pub format: WireFormat,
}

impl RequestBody {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let malformed = |detail: String| {
            tracing::debug!(detail, "gateway.body_malformed");
            ApiError::invalid_params("request body is malformed")
        };

        match self.format {
            WireFormat::Json => serde_json::from_slice(&self.bytes).map_err(|e| malformed(e.to_string())),
            WireFormat::Xml => {
                let text = std::str::from_utf8(&self.bytes)
                    .map_err(|e| malformed(e.to_string()))?;
                quick_xml::de::from_str(text).map_err(|e| malformed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use arena_contracts::{ModifyResult, ModifyValidationResult, PersonImIn};

    use super::*;

    #[test]
    fn format_param_beats_accept_header() {
        assert_eq!(
            negotiate(Some("xml"), Some("application/json"), WireFormat::Json),
            WireFormat::Xml
        );
        assert_eq!(
            negotiate(Some("bogus"), Some("text/xml"), WireFormat::Json),
            WireFormat::Xml
        );
        assert_eq!(
            negotiate(None, Some("application/json"), WireFormat::Xml),
            WireFormat::Json
        );
        assert_eq!(negotiate(None, Some("*/*"), WireFormat::Xml), WireFormat::Xml);
        assert_eq!(negotiate(None, None, WireFormat::Json), WireFormat::Json);
    }

    #[test]
    fn xml_render_uses_contract_root_and_string_flags() {
        let result = ModifyResult::invalid(vec![ModifyValidationResult::new(
            "FirstNameMissing",
            "First name is required",
        )]);
        let xml = String::from_utf8(render(&result, WireFormat::Xml).unwrap()).unwrap();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<ModifyResult>"));
        assert!(xml.contains("<Successful>False</Successful>"));
        assert!(xml.contains("FirstNameMissing"));

        let json: serde_json::Value =
            serde_json::from_slice(&render(&result, WireFormat::Json).unwrap()).unwrap();
        assert_eq!(json["Successful"], "False");
    }

    #[test]
    fn body_decodes_by_content_type() {
        assert_eq!(body_format(Some("application/xml")), WireFormat::Xml);
        assert_eq!(body_format(Some("text/xml; charset=utf-8")), WireFormat::Xml);
        assert_eq!(body_format(None), WireFormat::Json);

        let xml = RequestBody {
            bytes: b"<PersonImIn><FirstName>Ann</FirstName></PersonImIn>".to_vec(),
            format: WireFormat::Xml,
        };
        let parsed: PersonImIn = xml.decode().unwrap();
        assert_eq!(parsed.first_name.as_deref(), Some("Ann"));

        let broken = RequestBody {
            bytes: b"{not json".to_vec(),
            format: WireFormat::Json,
        };
        let err = broken.decode::<PersonImIn>().unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_PARAMS");
    }
}
