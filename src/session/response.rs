use crate::error::{ProcessError, GENERIC_SERVER_FAILURE};
use crate::media::MediaKind;
use crate::transport::{RawResponse, TransportError};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Error body convention of the service: `{ "detail": "..." }`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

/// `detail` from a failed response, or the generic message
///
/// Only a non-empty string inside a JSON object counts; validation error
/// lists, bare arrays and non-JSON bodies fall back.
pub fn extract_detail(body: &[u8]) -> String {
    // A derived struct also accepts a positional array, so require an object first
    let parsed = serde_json::from_slice::<Map<String, Value>>(body)
        .and_then(|map| ErrorBody::deserialize(Value::Object(map)));
    match parsed {
        Ok(ErrorBody {
            detail: Some(Value::String(detail)),
        }) if !detail.is_empty() => detail,
        _ => GENERIC_SERVER_FAILURE.to_string(),
    }
}

/// Decide whether a transport outcome is a usable result for `kind`
///
/// Video responses must be non-empty and declare a content type containing
/// "video"; a proxy error page served with 200 fails here.
pub fn interpret(
    kind: MediaKind,
    outcome: Result<RawResponse, TransportError>,
) -> Result<RawResponse, ProcessError> {
    let response = outcome.map_err(|e| ProcessError::Transport(e.to_string()))?;

    if !response.is_success() {
        return Err(ProcessError::Server(extract_detail(&response.body)));
    }

    if kind == MediaKind::Video {
        if response.body.is_empty() {
            return Err(ProcessError::EmptyVideo);
        }
        let is_video = response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("video"));
        if !is_video {
            return Err(ProcessError::UnexpectedContentType(response.content_type));
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn detail_string_is_used() {
        assert_eq!(extract_detail(br#"{"detail":"model not found"}"#), "model not found");
    }

    #[test]
    fn unexpected_bodies_fall_back() {
        for body in [
            &b"<html>Bad Gateway</html>"[..],
            b"",
            br#"{"error":"x"}"#,
            br#"{"detail":""}"#,
            br#"{"detail":[{"loc":["body","file"],"msg":"field required"}]}"#,
            br#"["detail"]"#,
        ] {
            assert_eq!(extract_detail(body), GENERIC_SERVER_FAILURE);
        }
    }

    #[test]
    fn array_body_is_not_an_error_object() {
        let response = RawResponse::new(500, Some("application/json"), &br#"["upstream exploded"]"#[..]);
        assert_matches!(
            interpret(MediaKind::Image, Ok(response)),
            Err(ProcessError::Server(msg)) if msg == GENERIC_SERVER_FAILURE
        );
    }

    #[test]
    fn image_success_needs_no_body_checks() {
        let response = RawResponse::new(200, None, Vec::<u8>::new());
        assert!(interpret(MediaKind::Image, Ok(response)).is_ok());
    }

    #[test]
    fn non_success_uses_detail() {
        let response = RawResponse::new(500, Some("application/json"), &br#"{"detail":"boom"}"#[..]);
        assert_matches!(
            interpret(MediaKind::Image, Ok(response)),
            Err(ProcessError::Server(msg)) if msg == "boom"
        );
    }

    #[test]
    fn empty_video_checked_before_content_type() {
        let response = RawResponse::new(200, Some("text/html"), Vec::<u8>::new());
        assert_matches!(interpret(MediaKind::Video, Ok(response)), Err(ProcessError::EmptyVideo));
    }

    #[test]
    fn video_needs_video_content_type() {
        let html = RawResponse::new(200, Some("text/html; charset=utf-8"), &b"<html>"[..]);
        assert_matches!(
            interpret(MediaKind::Video, Ok(html)),
            Err(ProcessError::UnexpectedContentType(Some(ct))) if ct.starts_with("text/html")
        );

        let missing = RawResponse::new(200, None, &b"data"[..]);
        assert_matches!(
            interpret(MediaKind::Video, Ok(missing)),
            Err(ProcessError::UnexpectedContentType(None))
        );

        let mov = RawResponse::new(200, Some("video/quicktime"), &b"moov"[..]);
        assert!(interpret(MediaKind::Video, Ok(mov)).is_ok());
    }

    #[test]
    fn transport_errors_keep_their_message() {
        let outcome = Err(TransportError::Other("connection refused".into()));
        assert_matches!(
            interpret(MediaKind::Image, outcome),
            Err(ProcessError::Transport(msg)) if msg == "connection refused"
        );
    }
}
