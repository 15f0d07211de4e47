//! Helpers for keeping secrets and oversized payloads out of logs, span
//! fields and error messages.

/// Maximum length of a backend response body kept in errors and logs.
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncates a response body to [`MAX_ERROR_BODY_LENGTH`] characters.
pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

/// Strips userinfo and query string from a URL.
///
/// - `https://user:pw@api.example.com/status/1` → `https://****@api.example.com/status/1`
/// - `http://localhost:8000/health?token=x` → `http://localhost:8000/health`
pub fn redact_url(url: &str) -> String {
    let without_query = match url.find(['?', '#']) {
        Some(pos) => &url[..pos],
        None => url,
    };

    if let Some(scheme_end) = without_query.find("://") {
        let after_scheme = &without_query[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..authority_end].rfind('@') {
            let scheme = &without_query[..scheme_end + 3];
            return format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    without_query.to_string()
}

/// Masks a token, keeping only the last four characters for correlation.
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("****{}", tail)
}
