use std::ops::RangeInclusive;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Statuses a caller considers a successful response. Anything else (or a transport
/// error) counts as a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedStatuses(Vec<RangeInclusive<u16>>);

impl Default for ExpectedStatuses {
    fn default() -> Self {
        Self(vec![200..=399])
    }
}

impl ExpectedStatuses {
    pub fn only(statuses: &[u16]) -> Self {
        Self(statuses.iter().map(|s| *s..=*s).collect())
    }

    #[must_use]
    pub fn and(mut self, status: u16) -> Self {
        self.0.push(status..=status);
        self
    }

    pub fn contains(&self, status: u16) -> bool {
        self.0.iter().any(|r| r.contains(&status))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
    /// Estimated bytes sent on the wire for this request (HTTP/1.1 request line + headers + body).
    pub bytes_sent: u64,
    /// Estimated bytes received on the wire for this response (HTTP/1.1 status line + headers + body).
    pub bytes_received: u64,
    /// Time from sending the request until the full body was read.
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Body parsed as JSON, or `None` when it is not valid JSON.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        self.json().ok()
    }

    /// Looks up a value by JSON pointer (`/content/0/id`) in the parsed body.
    pub fn json_pointer(&self, pointer: &str) -> Option<serde_json::Value> {
        self.json_value()?.pointer(pointer).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
    pub expected: Option<ExpectedStatuses>,
}

impl HttpRequest {
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
            expected: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(http::Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(http::Method::POST, url)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Serializes `value` as the body and sets `content-type: application/json` unless
    /// a content type is already present.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(Error::Json)?;
        self.body = Bytes::from(body);
        if !crate::util::has_header(&self.headers, "content-type") {
            self.headers
                .push(("content-type".to_string(), "application/json".to_string()));
        }
        Ok(self)
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn expect(mut self, expected: ExpectedStatuses) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Whether `status` counts as a successful response for this request.
    pub fn is_expected(&self, status: u16) -> bool {
        match &self.expected {
            Some(e) => e.contains(status),
            None => ExpectedStatuses::default().contains(status),
        }
    }

    /// The final URL with query parameters applied.
    pub fn resolved_url(&self) -> Result<url::Url> {
        crate::util::resolve_url(&self.url, &self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_expected_statuses_cover_2xx_and_3xx() {
        let e = ExpectedStatuses::default();
        assert!(e.contains(200));
        assert!(e.contains(201));
        assert!(e.contains(399));
        assert!(!e.contains(404));
        assert!(!e.contains(500));
    }

    #[test]
    fn expected_statuses_can_be_widened() {
        let e = ExpectedStatuses::default().and(409).and(410);
        assert!(e.contains(409));
        assert!(e.contains(410));
        assert!(!e.contains(400));

        let req = HttpRequest::post("http://h/").expect(ExpectedStatuses::only(&[201]));
        assert!(req.is_expected(201));
        assert!(!req.is_expected(200));
        assert!(HttpRequest::get("http://h/").is_expected(204));
    }

    #[test]
    fn json_body_sets_content_type_once() {
        let req = HttpRequest::post("http://h/")
            .json(&serde_json::json!({ "userId": 7 }))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(&req.body[..], br#"{"userId":7}"#);
        let ct: Vec<_> = req
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(ct.len(), 1);

        let req = HttpRequest::post("http://h/")
            .header("Content-Type", "application/vnd.test+json")
            .json(&1)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn response_json_helpers() {
        let res = HttpResponse {
            status: 200,
            body: Bytes::from_static(br#"{"content":[{"id":3,"name":"x"}],"totalElements":1}"#),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            bytes_sent: 0,
            bytes_received: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(
            res.json_pointer("/content/0/id"),
            Some(serde_json::json!(3))
        );
        assert!(res.json_pointer("/missing").is_none());

        let text = HttpResponse {
            body: Bytes::from_static(b"not json"),
            ..res
        };
        assert!(text.json_value().is_none());
        assert_eq!(text.body_utf8(), Some("not json"));
    }
}
