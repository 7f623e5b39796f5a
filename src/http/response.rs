//! HTTP/1.1 response builder and serializer.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use waypath::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok).body("pong");
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.ends_with("\r\n\r\npong"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a response with an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// A response whose body is the status' reason phrase, e.g. `Not Found`.
    pub fn reason(status: StatusCode) -> Self {
        Self::new(status).body(status.canonical_reason())
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in place, for middleware decorating a downstream response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets a text body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets a binary body, e.g. file contents.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The body bytes set so far.
    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response in HTTP/1.1 wire format.
    ///
    /// Adds `Content-Type: text/plain; charset=utf-8` to non-empty bodies that lack a
    /// content type. `Connection` and `Content-Length` are always written by the
    /// serializer and replace any values a handler set.
    pub fn into_bytes(mut self) -> BytesMut {
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", "text/plain; charset=utf-8");
        }
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        self.headers.set("Connection", connection);
        self.headers.set("Content-Length", self.body.len().to_string());

        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + self.body.len());
        buf.put(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        buf.put(self.headers.to_string().as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_slice());
        buf
    }
}
