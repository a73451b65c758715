//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

/// An outgoing HTTP response.
///
/// ```rust
/// use http::StatusCode;
/// use stringsvc::Response;
///
/// Response::json(&serde_json::json!({ "result": "ABC" }));
/// Response::text("ok");
/// Response::status(StatusCode::NO_CONTENT);
/// Response::builder().status(StatusCode::BAD_REQUEST).json(&serde_json::json!({ "error": "nope" }));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Bytes,
}

impl Response {
    /// `200 OK`, `application/json`. A value that fails to serialize becomes
    /// a bodiless `500`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::builder().json(value)
    }

    /// `200 OK`, `text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(status: StatusCode) -> Self {
        Self::builder().status(status).no_body()
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Converts into the type hyper sends.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut resp = http::Response::new(Full::new(self.body));
        *resp.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        resp
    }
}

/// Fluent builder for [`Response`]. Defaults to `200 OK`.
pub struct ResponseBuilder {
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => self.finish(Some(JSON), body.into()),
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(Some(TEXT), body.into().into())
    }

    pub fn no_body(self) -> Response {
        self.finish(None, Bytes::new())
    }

    fn finish(self, content_type: Option<&'static str>, body: Bytes) -> Response {
        Response { status: self.status, content_type, body }
    }
}

/// Conversion into an HTTP [`Response`], so handlers can return plain
/// strings or status codes.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
