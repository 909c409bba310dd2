//! Transport-independent request and response types
//!
//! The host boundary is whatever accepts connections; it converts its own
//! request type into [`HttpRequest`] and writes back the [`HttpResponse`].

use std::borrow::Cow;
use webplug_api::{GuestRequest, GuestResponse, Method};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,

    /// Percent-encoded path, always starting with `/`
    pub path: String,

    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a request from a request target such as `/plugins/a/?x=1`
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        Self {
            method,
            path,
            query,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn head(target: &str) -> Self {
        Self::new(Method::Head, target)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Same request, re-targeted at a path relative to a mount point
    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.is_empty() {
            "/".to_string()
        } else {
            path
        };
        self
    }

    pub(crate) fn into_guest(self) -> GuestRequest {
        GuestRequest {
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(body.into())
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("content-type", "application/json")
            .with_body(body.into())
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn forbidden() -> Self {
        Self::text(403, "Forbidden")
    }

    pub fn method_not_allowed(allow: &str) -> Self {
        Self::text(405, "Method Not Allowed").with_header("allow", allow)
    }

    pub fn internal_error() -> Self {
        Self::text(500, "Internal Server Error")
    }

    /// Permanent redirect that keeps the request method
    pub fn permanent_redirect(location: impl Into<String>) -> Self {
        Self::new(308).with_header("location", location)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body as text, lossily decoded
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Drop the body for a HEAD response, keeping its length
    pub(crate) fn into_head(mut self) -> Self {
        if self.header("content-length").is_none() {
            let length = self.body.len().to_string();
            self.headers.push(("content-length".to_string(), length));
        }
        self.body.clear();
        self
    }
}

impl From<GuestResponse> for HttpResponse {
    fn from(response: GuestResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_target_split() {
        let request = HttpRequest::get("/plugins/a/?page=2");
        assert_eq!(request.path, "/plugins/a/");
        assert_eq!(request.query.as_deref(), Some("page=2"));

        let request = HttpRequest::get("plugins");
        assert_eq!(request.path, "/plugins");
        assert_eq!(request.query, None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest::get("/").with_header("Accept-Encoding", "br");
        assert_eq!(request.header("accept-encoding"), Some("br"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_head_keeps_length() {
        let response = HttpResponse::text(200, "hello").into_head();
        assert!(response.body.is_empty());
        assert_eq!(response.header("content-length"), Some("5"));
    }
}
