use url::Url;

use crate::CoreError;

fn strip_terminal_segment<'a>(path: &'a str, segment: &str) -> &'a str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.ends_with(segment) {
        let new_len = trimmed.len().saturating_sub(segment.len());
        return trimmed[..new_len].trim_end_matches('/');
    }
    trimmed
}

/// Normalize backend base URL by stripping /api and /v1 suffixes.
pub fn normalize_backend_base(url: &str) -> Result<Url, CoreError> {
    let mut parsed = Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(CoreError::InvalidInput(format!(
                "unsupported scheme: {other}"
            )))
        }
    }
    let mut path = parsed.path().to_string();
    path = strip_terminal_segment(&path, "/v1").to_string();
    path = strip_terminal_segment(&path, "/api").to_string();
    parsed.set_path(path.trim_end_matches('/'));
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed)
}

/// Build the event-stream URL for a deliberation session:
/// `{base}/api/v1/sessions/{session_id}/stream`.
///
/// The session id is pushed as a single path segment, so `/` and other
/// reserved characters are percent-encoded.
pub fn session_stream_url(base_url: &str, session_id: &str) -> Result<Url, CoreError> {
    if session_id.trim().is_empty() {
        return Err(CoreError::InvalidInput("session id is empty".to_string()));
    }
    let mut url = normalize_backend_base(base_url)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| CoreError::InvalidInput(format!("cannot-be-a-base url: {base_url}")))?;
        segments
            .pop_if_empty()
            .extend(["api", "v1", "sessions", session_id, "stream"]);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_api_suffixes() {
        let url = normalize_backend_base("https://api.boardof.one/api/v1/").unwrap();
        assert_eq!(url.as_str(), "https://api.boardof.one/");
    }

    #[test]
    fn test_session_stream_url() {
        let url = session_stream_url("http://localhost:8000", "sess-42").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/v1/sessions/sess-42/stream"
        );
    }

    #[test]
    fn test_session_stream_url_keeps_base_path() {
        let url = session_stream_url("https://example.com/backend/api", "abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/backend/api/v1/sessions/abc/stream"
        );
    }

    #[test]
    fn test_session_id_is_encoded() {
        let url = session_stream_url("http://localhost:8000", "a/b c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/v1/sessions/a%2Fb%20c/stream"
        );
    }

    #[test]
    fn test_rejects_empty_session_and_bad_scheme() {
        assert!(session_stream_url("http://localhost:8000", "  ").is_err());
        assert!(session_stream_url("ftp://localhost", "abc").is_err());
        assert!(session_stream_url("not a url", "abc").is_err());
    }
}
