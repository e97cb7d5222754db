// request.rs — A generation request, decoupled from the HTTP extractor.
//
// The HTTP layer only sorts the body into one of the `RequestBody` shapes;
// decoding and the "empty means default base file" rule live here so the
// CLI and tests can build requests without axum.

use axum::http::Method;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::HandlerError;

/// How the request body arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body at all.
    Empty,
    /// Raw spreadsheet bytes.
    Raw(Vec<u8>),
    /// Base64 text of the spreadsheet.
    Base64(Vec<u8>),
    /// A multipart form; `Some` when a file field was found.
    Multipart(Option<Vec<u8>>),
    /// The body was over the upload limit.
    TooLarge,
    /// The body could not be read; the message says why.
    Invalid(String),
}

impl RequestBody {
    /// Base file bytes, or `None` to use the configured default.
    pub fn into_payload(self) -> Result<Option<Vec<u8>>, HandlerError> {
        let bytes = match self {
            RequestBody::Empty | RequestBody::Multipart(None) => return Ok(None),
            RequestBody::Raw(bytes) | RequestBody::Multipart(Some(bytes)) => bytes,
            RequestBody::Base64(text) => {
                let compact: Vec<u8> = text
                    .into_iter()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                STANDARD
                    .decode(&compact)
                    .map_err(|e| HandlerError::InvalidBody(format!("bad base64: {}", e)))?
            }
            RequestBody::TooLarge => return Err(HandlerError::PayloadTooLarge),
            RequestBody::Invalid(reason) => return Err(HandlerError::InvalidBody(reason)),
        };
        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }
}

/// Encoding of a successful archive response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseEncoding {
    #[default]
    Binary,
    /// Base64 text, for transports that cannot carry binary bodies.
    Base64,
}

impl ResponseEncoding {
    /// `base64` (any case) selects base64; anything else is binary.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("base64") => ResponseEncoding::Base64,
            _ => ResponseEncoding::Binary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub method: Method,
    pub body: RequestBody,
    pub encoding: ResponseEncoding,
}

impl GenerateRequest {
    /// A POST carrying `body`, answered in binary.
    pub fn post(body: RequestBody) -> Self {
        Self {
            method: Method::POST,
            body,
            encoding: ResponseEncoding::Binary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bodies_mean_default() {
        assert_eq!(RequestBody::Empty.into_payload().unwrap(), None);
        assert_eq!(RequestBody::Raw(vec![]).into_payload().unwrap(), None);
        assert_eq!(RequestBody::Multipart(None).into_payload().unwrap(), None);
        assert_eq!(RequestBody::Base64(b"  \n".to_vec()).into_payload().unwrap(), None);
    }

    #[test]
    fn raw_and_multipart_pass_through() {
        assert_eq!(
            RequestBody::Raw(b"xlsx".to_vec()).into_payload().unwrap(),
            Some(b"xlsx".to_vec())
        );
        assert_eq!(
            RequestBody::Multipart(Some(b"form".to_vec()))
                .into_payload()
                .unwrap(),
            Some(b"form".to_vec())
        );
    }

    #[test]
    fn base64_is_decoded_ignoring_line_breaks() {
        let body = RequestBody::Base64(b"aGVsbG8g\nd29ybGQ=\r\n".to_vec());
        assert_eq!(body.into_payload().unwrap(), Some(b"hello world".to_vec()));
    }

    #[test]
    fn undecodable_bodies_are_invalid() {
        assert!(matches!(
            RequestBody::Base64(b"***".to_vec()).into_payload(),
            Err(HandlerError::InvalidBody(_))
        ));
        assert!(matches!(
            RequestBody::Invalid("truncated".into()).into_payload(),
            Err(HandlerError::InvalidBody(reason)) if reason == "truncated"
        ));
        assert!(matches!(
            RequestBody::TooLarge.into_payload(),
            Err(HandlerError::PayloadTooLarge)
        ));
    }

    #[test]
    fn encoding_from_query() {
        assert_eq!(ResponseEncoding::from_query(None), ResponseEncoding::Binary);
        assert_eq!(
            ResponseEncoding::from_query(Some("BASE64")),
            ResponseEncoding::Base64
        );
        assert_eq!(
            ResponseEncoding::from_query(Some("zip")),
            ResponseEncoding::Binary
        );
    }
}
