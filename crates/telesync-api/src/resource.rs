// Inert description of one HTTP call.
//
// A `Resource<T>` carries everything needed to issue a request (path,
// method, body, headers) plus the decoder that turns the response body
// into `T`. Building one performs no I/O.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;

/// Decoder from raw response bytes into `T`. `None` means "could not parse".
pub type Parser<T> = Arc<dyn Fn(&[u8]) -> Option<T> + Send + Sync>;

pub const CONTENT_TYPE_JSON: (&str, &str) = ("Content-Type", "application/json");
pub const ACCEPT_JSON: (&str, &str) = ("Accept", "application/json");

/// A request descriptor paired with its response decoder.
pub struct Resource<T> {
    path: String,
    method: Method,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    parse: Parser<T>,
    expects_body: bool,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            method: self.method.clone(),
            body: self.body.clone(),
            headers: self.headers.clone(),
            parse: Arc::clone(&self.parse),
            expects_body: self.expects_body,
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl<T> Resource<T> {
    /// Build a resource with a custom decoder and no default headers.
    pub fn new(path: impl Into<String>, method: Method, parse: Parser<T>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            headers: Vec::new(),
            parse,
            expects_body: true,
        }
    }

    /// Attach a raw request body. Ignored for `GET`.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set (or replace) a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            existing.1 = value;
        } else {
            self.headers.push((name, value));
        }
        self
    }

    /// Add the standard JSON `Content-Type` and `Accept` headers.
    pub fn with_json_headers(self) -> Self {
        self.with_header(CONTENT_TYPE_JSON.0, CONTENT_TYPE_JSON.1)
            .with_header(ACCEPT_JSON.0, ACCEPT_JSON.1)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The body that will be sent, if any. `GET` requests never carry one.
    pub fn body(&self) -> Option<&[u8]> {
        if self.method == Method::GET {
            None
        } else {
            self.body.as_deref()
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether an empty success body should be reported as `NoData`.
    pub fn expects_body(&self) -> bool {
        self.expects_body
    }

    /// Run the decoder over a response body.
    pub fn parse(&self, data: &[u8]) -> Option<T> {
        (self.parse)(data)
    }
}

impl<T: DeserializeOwned + 'static> Resource<T> {
    /// A JSON resource decoding the response body with serde.
    pub fn json(path: impl Into<String>, method: Method, body: Option<&serde_json::Value>) -> Self {
        let parse: Parser<T> = Arc::new(|data: &[u8]| serde_json::from_slice(data).ok());
        let resource = Self::new(path, method, parse).with_json_headers();
        match body {
            Some(value) => resource.with_body(value.to_string().into_bytes()),
            None => resource,
        }
    }
}

impl Resource<()> {
    /// A JSON resource whose response body is ignored.
    pub fn no_result(
        path: impl Into<String>,
        method: Method,
        body: Option<&serde_json::Value>,
    ) -> Self {
        let parse: Parser<()> = Arc::new(|_: &[u8]| Some(()));
        let mut resource = Self::new(path, method, parse).with_json_headers();
        resource.expects_body = false;
        match body {
            Some(value) => resource.with_body(value.to_string().into_bytes()),
            None => resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_resource_sets_standard_headers() {
        let resource: Resource<serde_json::Value> =
            Resource::json("/app/devices", Method::POST, Some(&json!({ "a": 1 })));

        assert_eq!(resource.header("content-type"), Some("application/json"));
        assert_eq!(resource.header("Accept"), Some("application/json"));
        assert_eq!(resource.body(), Some(br#"{"a":1}"#.as_slice()));
        assert!(resource.expects_body());
    }

    #[test]
    fn get_never_sends_a_body() {
        let resource: Resource<serde_json::Value> =
            Resource::json("/app", Method::GET, Some(&json!({})));
        assert!(resource.body().is_none());
    }

    #[test]
    fn with_header_replaces_case_insensitively() {
        let resource = Resource::no_result("/x", Method::POST, None)
            .with_header("x-event-type", "launch")
            .with_header("X-Event-Type", "clickthru");

        let matching: Vec<_> = resource
            .headers()
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("x-event-type"))
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(resource.header("X-EVENT-TYPE"), Some("clickthru"));
    }

    #[test]
    fn no_result_parses_anything() {
        let resource = Resource::no_result("/x", Method::DELETE, None);
        assert_eq!(resource.parse(b"not json"), Some(()));
        assert!(!resource.expects_body());
    }
}
