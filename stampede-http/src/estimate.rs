use super::util::{has_header, host_header_value};
use super::{HttpRequest, Result};

/// Estimate bytes sent for an HTTP request.
///
/// Best-effort HTTP/1.1 framing: request line + headers + CRLF + body. Host and
/// Content-Length are counted even when the caller did not set them, since the client
/// always sends them.
pub fn estimate_http_request_bytes(req: &HttpRequest) -> Result<u64> {
    let url = req.resolved_url()?;
    Ok(estimate_request_bytes_parts(
        &req.method,
        &url,
        &req.headers,
        req.body.len() as u64,
    ))
}

pub(super) fn estimate_request_bytes_parts(
    method: &http::Method,
    url: &url::Url,
    headers: &[(String, String)],
    body_len: u64,
) -> u64 {
    let mut bytes = request_line_bytes(method, url);

    for (k, v) in headers {
        bytes = bytes.saturating_add(header_bytes(k.as_bytes(), v.as_bytes()));
    }

    if !has_header(headers, "host")
        && let Some(host) = host_header_value(url)
    {
        bytes = bytes.saturating_add(header_bytes(b"host", host.as_bytes()));
    }

    if body_len != 0 && !has_header(headers, "content-length") {
        let v = body_len.to_string();
        bytes = bytes.saturating_add(header_bytes(b"content-length", v.as_bytes()));
    }

    // End of headers.
    bytes.saturating_add(2).saturating_add(body_len)
}

fn request_line_bytes(method: &http::Method, url: &url::Url) -> u64 {
    let path_len = url.path().len() + url.query().map_or(0, |q| q.len() + 1);

    // "METHOD SP path SP HTTP/1.1 CRLF"
    (method.as_str().len() as u64)
        .saturating_add(1)
        .saturating_add(path_len as u64)
        .saturating_add(1)
        .saturating_add("HTTP/1.1".len() as u64)
        .saturating_add(2)
}

pub(super) fn estimate_response_head_bytes(
    version: http::Version,
    status: http::StatusCode,
    headers: &http::HeaderMap,
) -> u64 {
    let version_len = match version {
        http::Version::HTTP_10 => "HTTP/1.0".len(),
        http::Version::HTTP_2 => "HTTP/2".len(),
        http::Version::HTTP_3 => "HTTP/3".len(),
        _ => "HTTP/1.1".len(),
    };

    // "HTTP/1.1 SP 200 CRLF", reason phrase ignored.
    let mut bytes = (version_len as u64)
        .saturating_add(1)
        .saturating_add(status.as_str().len() as u64)
        .saturating_add(2);

    for (name, value) in headers {
        bytes = bytes.saturating_add(header_bytes(name.as_str().as_bytes(), value.as_bytes()));
    }
    bytes.saturating_add(2)
}

fn header_bytes(name: &[u8], value: &[u8]) -> u64 {
    // "name: value\r\n"
    (name.len() as u64)
        .saturating_add(2)
        .saturating_add(value.len() as u64)
        .saturating_add(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_without_body_counts_request_line_and_host() {
        let req = HttpRequest::get("http://localhost:8080/api/products").query("page", "0");
        let bytes = estimate_http_request_bytes(&req).unwrap_or_else(|e| panic!("{e}"));

        let expected = "GET /api/products?page=0 HTTP/1.1\r\n".len()
            + "host: localhost:8080\r\n".len()
            + "\r\n".len();
        assert_eq!(bytes, expected as u64);
    }

    #[test]
    fn body_adds_content_length_and_payload() {
        let req = HttpRequest::post("http://h/o").body(bytes::Bytes::from_static(b"{}"));
        let bytes = estimate_http_request_bytes(&req).unwrap_or_else(|e| panic!("{e}"));

        let expected = "POST /o HTTP/1.1\r\n".len()
            + "host: h\r\n".len()
            + "content-length: 2\r\n".len()
            + "\r\n".len()
            + 2;
        assert_eq!(bytes, expected as u64);
    }

    #[test]
    fn response_head_counts_status_line_and_headers() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        let bytes =
            estimate_response_head_bytes(http::Version::HTTP_11, http::StatusCode::OK, &headers);
        let expected =
            "HTTP/1.1 200\r\n".len() + "content-type: application/json\r\n".len() + "\r\n".len();
        assert_eq!(bytes, expected as u64);
    }
}
