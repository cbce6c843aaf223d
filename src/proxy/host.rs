//! `Host:` header extraction from a raw request buffer.

use crate::error::ProxyError;

const DEFAULT_PORT: u16 = 80;

/// Extract `(port, host)` from the first `Host:` header in `request`.
///
/// The header value runs up to the next newline. A `/` before any `:` (or no
/// `:` at all) means the default port; anything after the `/` is ignored.
pub fn parse_host(request: &[u8]) -> Result<(u16, String), ProxyError> {
    let text = String::from_utf8_lossy(request);

    let start = text
        .find("Host:")
        .ok_or_else(|| ProxyError::MalformedRequest("missing Host header".to_string()))?
        + "Host:".len();
    let rest = &text[start..];
    let value = match rest.find('\n') {
        Some(end) => &rest[..end],
        None => rest,
    };

    let slash = value.find('/').unwrap_or(value.len());
    match value.find(':') {
        Some(colon) if colon < slash => {
            let port_text = value[colon + 1..slash].trim();
            let port = port_text
                .parse::<u16>()
                .map_err(|_| ProxyError::MalformedRequest(format!("invalid port '{port_text}' in Host header")))?;
            Ok((port, value[..colon].trim().to_string()))
        }
        _ => Ok((DEFAULT_PORT, value[..slash].trim().to_string())),
    }
}
