// response.rs — Turning a finished request into an HTTP response.

use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use vf_archive::ArchiveSummary;
use vf_generator::OutcomeManifest;

use crate::error::HandlerError;
use crate::request::ResponseEncoding;

pub const SUCCEEDED_HEADER: HeaderName = HeaderName::from_static("x-variant-succeeded");
pub const FAILED_HEADER: HeaderName = HeaderName::from_static("x-variant-failed");
pub const SKIPPED_HEADER: HeaderName = HeaderName::from_static("x-variant-skipped");
pub const TRANSFER_ENCODING_HEADER: HeaderName =
    HeaderName::from_static("content-transfer-encoding");

/// The archive produced for one request, already read into memory.
#[derive(Debug, Clone)]
pub struct GeneratedArchive {
    pub bytes: Vec<u8>,
    pub manifest: OutcomeManifest,
    pub summary: ArchiveSummary,
    pub download_name: String,
}

#[derive(Debug)]
pub enum GenerateResponse {
    Archive {
        archive: GeneratedArchive,
        encoding: ResponseEncoding,
    },
    Failure(HandlerError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl GenerateResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            GenerateResponse::Archive { .. } => StatusCode::OK,
            GenerateResponse::Failure(e) => e.status(),
        }
    }

    pub fn archive(&self) -> Option<&GeneratedArchive> {
        match self {
            GenerateResponse::Archive { archive, .. } => Some(archive),
            GenerateResponse::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            GenerateResponse::Failure(e) => Some(e),
            GenerateResponse::Archive { .. } => None,
        }
    }
}

impl IntoResponse for GenerateResponse {
    fn into_response(self) -> Response {
        match self {
            GenerateResponse::Archive { archive, encoding } => {
                let manifest = &archive.manifest;
                let headers = [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", archive.download_name),
                    ),
                    (SUCCEEDED_HEADER, manifest.succeeded().to_string()),
                    (FAILED_HEADER, manifest.failed().to_string()),
                    (SKIPPED_HEADER, manifest.skipped().to_string()),
                ];
                match encoding {
                    ResponseEncoding::Binary => {
                        (StatusCode::OK, headers, archive.bytes).into_response()
                    }
                    ResponseEncoding::Base64 => (
                        StatusCode::OK,
                        headers,
                        [(TRANSFER_ENCODING_HEADER, "base64")],
                        STANDARD.encode(&archive.bytes),
                    )
                        .into_response(),
                }
            }
            GenerateResponse::Failure(err) => {
                let status = err.status();
                let body = Json(ErrorBody {
                    error: err.to_string(),
                    kind: err.kind(),
                });
                if status == StatusCode::METHOD_NOT_ALLOWED {
                    (status, [(header::ALLOW, "POST")], body).into_response()
                } else {
                    (status, body).into_response()
                }
            }
        }
    }
}
