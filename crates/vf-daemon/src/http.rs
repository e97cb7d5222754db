// http.rs — axum routes for the generation endpoint.
//
// Routes:
//   ANY  /generate                       generation (POST only, else 405)
//   ANY  /.netlify/functions/generate    same, at the path the upload page calls
//   GET  /healthz                        liveness
//
// The route accepts every method so that wrong verbs get the JSON 405 body
// from the handler instead of axum's empty one.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::handler::RequestHandler;
use crate::request::{GenerateRequest, RequestBody, ResponseEncoding};

/// Multipart field that carries the base spreadsheet.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    pub encoding: Option<String>,
}

pub fn router(handler: Arc<RequestHandler>) -> Router {
    let config = handler.config();
    let limit = config.max_upload_bytes;
    let cors = config.cors;

    let app = Router::new()
        .route("/generate", any(generate))
        .route("/.netlify/functions/generate", any(generate))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(handler);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn generate(
    State(handler): State<Arc<RequestHandler>>,
    method: Method,
    query: Result<Query<GenerateQuery>, QueryRejection>,
    request: Request,
) -> Response {
    // Wrong verbs are answered without reading the body or the query; a
    // bad query on a POST is an invalid request, reported as JSON.
    let (body, query) = match query {
        _ if method != Method::POST => (RequestBody::Empty, GenerateQuery::default()),
        Ok(Query(query)) => (read_body(request).await, query),
        Err(rejection) => (
            RequestBody::Invalid(rejection.body_text()),
            GenerateQuery::default(),
        ),
    };

    let request = GenerateRequest {
        method,
        body,
        encoding: ResponseEncoding::from_query(query.encoding.as_deref()),
    };
    handler.handle(request).await.into_response()
}

async fn read_body(request: Request) -> RequestBody {
    let headers = request.headers().clone();

    if is_multipart(&headers) {
        return match Multipart::from_request(request, &()).await {
            Ok(multipart) => read_multipart(multipart).await,
            Err(rejection) => classify(rejection.status(), rejection.body_text()),
        };
    }

    match Bytes::from_request(request, &()).await {
        Ok(bytes) if bytes.is_empty() => RequestBody::Empty,
        Ok(bytes) if is_base64(&headers) => RequestBody::Base64(bytes.to_vec()),
        Ok(bytes) => RequestBody::Raw(bytes.to_vec()),
        Err(rejection) => classify(rejection.status(), rejection.body_text()),
    }
}

/// The `file` field wins; otherwise the first field that carries a file
/// name. A form with neither means "use the default base file".
async fn read_multipart(mut multipart: Multipart) -> RequestBody {
    let mut fallback = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return RequestBody::Multipart(fallback),
            Err(e) => return classify(e.status(), e.body_text()),
        };

        let named_file = field.name() == Some(FILE_FIELD);
        let candidate = fallback.is_none() && field.file_name().is_some();
        if !named_file && !candidate {
            continue;
        }

        match field.bytes().await {
            Ok(bytes) if named_file => return RequestBody::Multipart(Some(bytes.to_vec())),
            Ok(bytes) => fallback = Some(bytes.to_vec()),
            Err(e) => return classify(e.status(), e.body_text()),
        }
    }
}

fn classify(status: StatusCode, reason: String) -> RequestBody {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        RequestBody::TooLarge
    } else {
        RequestBody::Invalid(reason)
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn is_base64(headers: &HeaderMap) -> bool {
    ["content-transfer-encoding", "x-body-encoding"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.trim().eq_ignore_ascii_case("base64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(Arc::new(RequestHandler::new(crate::DaemonConfig::default())))
    }

    #[tokio::test]
    async fn healthz_ok() {
        let response = test_router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn get_on_generate_is_405_json() {
        for uri in ["/generate", "/.netlify/functions/generate"] {
            let response = test_router()
                .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(response.headers()[header::ALLOW], "POST");
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"], "method not allowed");
            assert_eq!(json["kind"], "validation_error");
        }
    }

    #[tokio::test]
    async fn malformed_query_on_get_is_still_405() {
        let response = test_router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/generate?encoding=a&encoding=b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "validation_error");
    }

    #[tokio::test]
    async fn malformed_query_on_post_is_invalid_body_json() {
        let response = test_router()
            .oneshot(
                HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/generate?encoding=a&encoding=b")
                    .body(Body::from("sheet"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "invalid_body");
        assert!(json["error"].as_str().unwrap().contains("encoding"));
    }

    #[test]
    fn header_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_multipart(&headers));
        assert!(!is_base64(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            "Multipart/Form-Data; boundary=x".parse().unwrap(),
        );
        assert!(is_multipart(&headers));

        headers.insert("x-body-encoding", "Base64".parse().unwrap());
        assert!(is_base64(&headers));
    }
}
