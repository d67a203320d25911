//! Map raw per-file failure signals onto [`FileError`].
//!
//! Structured signals win: a 413 status is always a payload-size failure.
//! Only when no status is available does [`is_payload_too_large`] look at
//! the message text, because proxies in front of the service tend to answer
//! with their own wording and sometimes drop the connection outright.

use crate::error::FileError;
use crate::limits::ServerLimits;
use crate::messages;
use serde_json::Value;

const PAYLOAD_PHRASES: [&str; 3] = [
    "entity too large",
    "payload too large",
    "function_payload_too_large",
];

/// Last-resort phrase sniff for size rejections with no usable status.
pub fn is_payload_too_large(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    PAYLOAD_PHRASES.iter().any(|p| lower.contains(p))
}

/// The payload-size failure, worded with the edge limit and hint.
pub fn payload_too_large(limits: &ServerLimits) -> FileError {
    FileError::PayloadTooLarge {
        message: messages::payload_too_large(
            &limits.readable_limit_text(true),
            limits.deployment_hint(),
        ),
    }
}

/// What a response body says about the failure.
enum BodyMessage {
    /// JSON with a usable `error` field.
    JsonError(String),
    /// Valid JSON without a usable `error` field.
    JsonWithoutError,
    /// Not JSON; trimmed text, if any.
    Text(Option<String>),
}

fn read_body(body: &[u8]) -> BodyMessage {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => json_error_field(&value)
            .map(BodyMessage::JsonError)
            .unwrap_or(BodyMessage::JsonWithoutError),
        Err(_) => BodyMessage::Text(text_body(body)),
    }
}

/// `error` field of a JSON object, if any.
fn json_error_field(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn text_body(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Classify a non-success HTTP response.
///
/// The body is read as JSON first whatever the declared content type. A
/// JSON `error` field wins; JSON without one falls back to
/// `HTTP {status}: {reason}`. A body that is not JSON is used as raw text,
/// and an empty body also gets the status line.
pub fn classify_status(status: u16, reason: &str, body: &[u8], limits: &ServerLimits) -> FileError {
    if status == 413 {
        return payload_too_large(limits);
    }

    let message = match read_body(body) {
        BodyMessage::JsonError(message) => Some(message),
        BodyMessage::JsonWithoutError => None,
        BodyMessage::Text(text) => text,
    }
    .unwrap_or_else(|| messages::http_status(status, reason));

    if is_payload_too_large(&message) {
        return payload_too_large(limits);
    }
    FileError::RemoteError { status, message }
}

/// Classify a 2xx response that carried a JSON body instead of audio.
pub fn classify_json_success(body: &[u8], limits: &ServerLimits) -> FileError {
    let message = match read_body(body) {
        BodyMessage::JsonError(message) => message,
        _ => messages::CONVERSION_FAILED.to_string(),
    };
    classify_message(&message, limits)
}

/// Classify a request that produced no response.
///
/// `status` is the structured status the transport surfaced, if any.
pub fn classify_transport(status: Option<u16>, message: &str, limits: &ServerLimits) -> FileError {
    if status == Some(413) || is_payload_too_large(message) {
        return payload_too_large(limits);
    }
    let message = message.trim();
    FileError::TransportError {
        message: if message.is_empty() {
            messages::UNKNOWN_FAILURE.to_string()
        } else {
            message.to_string()
        },
    }
}

/// Classify an error message that arrived with no status to go on.
pub fn classify_message(message: &str, limits: &ServerLimits) -> FileError {
    if is_payload_too_large(message) {
        return payload_too_large(limits);
    }
    let message = message.trim();
    FileError::Unknown {
        message: if message.is_empty() {
            messages::UNKNOWN_FAILURE.to_string()
        } else {
            message.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    fn limits() -> ServerLimits {
        ServerLimits::new(Some(4.5), Some(20.0), "")
    }

    #[test]
    fn status_413_cites_edge_limit() {
        let e = classify_status(413, "Payload Too Large", b"", &limits());
        assert_eq!(e.kind(), FailureKind::PayloadTooLarge);
        assert!(e.to_string().contains("20 MB"), "got: {e}");
        assert!(!e.to_string().contains("4.5 MB"));
        assert!(e.to_string().ends_with(messages::GENERIC_SIZE_GUIDANCE));
    }

    #[test]
    fn deployment_hint_is_appended() {
        let l = ServerLimits::new(Some(4.5), Some(20.0), "Self-host for big files.");
        let e = classify_status(413, "", b"", &l);
        assert!(e.to_string().ends_with("Self-host for big files."));
    }

    #[test]
    fn json_error_body_is_preferred() {
        let e = classify_status(
            400,
            "Bad Request",
            br#"{"error":"Format not supported"}"#,
            &limits(),
        );
        assert_eq!(
            e,
            FileError::RemoteError {
                status: 400,
                message: "Format not supported".into()
            }
        );
    }

    #[test]
    fn json_body_is_read_without_json_content_type() {
        let e = classify_status(400, "Bad Request", br#"{"error":"Unsupported codec"}"#, &limits());
        assert_eq!(
            e,
            FileError::RemoteError {
                status: 400,
                message: "Unsupported codec".into()
            }
        );
    }

    #[test]
    fn json_without_error_uses_status_line() {
        let e = classify_status(422, "Unprocessable Entity", b"{}", &limits());
        assert_eq!(e.to_string(), "HTTP 422: Unprocessable Entity");
        let e = classify_status(400, "Bad Request", br#"{"error":""}"#, &limits());
        assert_eq!(e.to_string(), "HTTP 400: Bad Request");
    }

    #[test]
    fn text_body_then_status_line() {
        let e = classify_status(502, "Bad Gateway", b"  upstream died ", &limits());
        assert_eq!(e.to_string(), "upstream died");
        let e = classify_status(500, "Internal Server Error", b"", &limits());
        assert_eq!(e.to_string(), "HTTP 500: Internal Server Error");
    }

    #[test]
    fn proxy_wording_is_sniffed() {
        let e = classify_status(500, "", b"FUNCTION_PAYLOAD_TOO_LARGE", &limits());
        assert_eq!(e.kind(), FailureKind::PayloadTooLarge);
        let e = classify_transport(None, "Request Entity Too Large", &limits());
        assert_eq!(e.kind(), FailureKind::PayloadTooLarge);
    }

    #[test]
    fn transport_uses_structured_status_first() {
        let e = classify_transport(Some(413), "connection closed", &limits());
        assert_eq!(e.kind(), FailureKind::PayloadTooLarge);
        let e = classify_transport(None, "connection refused", &limits());
        assert_eq!(e.kind(), FailureKind::TransportError);
    }

    #[test]
    fn json_success_is_unknown() {
        let e = classify_json_success(br#"{"error":"ffmpeg crashed"}"#, &limits());
        assert_eq!(
            e,
            FileError::Unknown {
                message: "ffmpeg crashed".into()
            }
        );
        let e = classify_json_success(b"{}", &limits());
        assert_eq!(e.to_string(), messages::CONVERSION_FAILED);
        let e = classify_json_success(br#"{"error":"Payload Too Large"}"#, &limits());
        assert_eq!(e.kind(), FailureKind::PayloadTooLarge);
    }

    #[test]
    fn empty_message_becomes_generic() {
        assert_eq!(
            classify_message("  ", &limits()).to_string(),
            messages::UNKNOWN_FAILURE
        );
    }

    #[test]
    fn unknown_edge_limit_uses_minimum_text() {
        let l = ServerLimits::new(Some(8.0), None, "");
        let e = classify_status(413, "", b"", &l);
        assert!(e.to_string().contains("8 MB"));
    }
}
