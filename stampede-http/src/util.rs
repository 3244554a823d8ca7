pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

/// Parses `raw`, appends `query` pairs (form-encoded) and checks the scheme.
pub(super) fn resolve_url(raw: &str, query: &[(String, String)]) -> crate::Result<url::Url> {
    let mut parsed = url::Url::parse(raw).map_err(|_| crate::Error::InvalidUrl(raw.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(crate::Error::UnsupportedScheme(raw.to_string()));
    }
    if !query.is_empty() {
        let mut pairs = parsed.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
    }
    Ok(parsed)
}
