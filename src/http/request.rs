//! HTTP/1.1 request parsing on top of [`httparse`].

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, MethodError};

/// Errors that can occur while parsing a request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error(transparent)]
    Method(#[from] MethodError),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed HTTP/1.x request.
///
/// The target is split into the path the router sees and the raw query string, which
/// is kept verbatim for whoever binds query parameters.
///
/// # Examples
///
/// ```
/// use waypath::http::{Method, Request};
///
/// let raw = b"GET /users/42?verbose=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method(), Method::Get);
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.query_string(), Some("verbose=1"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers accepted per request.
    const MAX_HEADERS: usize = 64;

    /// Builds a request without going through the wire format.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            version: 1,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Parses a request head from `buf`.
    ///
    /// Returns the request and the offset at which its body starts. Whatever follows
    /// the head is copied in as the body; the server trims it to `Content-Length`.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the head has not been fully received yet.
    /// - [`RequestError::Parse`]: the bytes are not valid HTTP.
    /// - [`RequestError::Method`]: the method is not one of the supported nine.
    /// - [`RequestError::MissingField`]: method, target or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = raw
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()?;
        let target = raw
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let version = raw
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let (path, query) = split_target(target);
        Ok((
            Self {
                method,
                path,
                query,
                version,
                headers: header_map,
                body: Bytes::copy_from_slice(&buf[body_offset..]),
            },
            body_offset,
        ))
    }

    /// Appends a header, for requests built with [`Request::new`].
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// HTTP minor version (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Drops body bytes beyond `len`, which belong to the next pipelined request.
    pub(crate) fn truncate_body(&mut self, len: usize) {
        self.body.truncate(len);
    }

    /// Whether the connection stays open after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive, HTTP/1.0 to close.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// The `Content-Length` header as a number, if present and valid.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
        None => (target.to_owned(), None),
    }
}
