//! Map HTTP/reqwest failures onto [`LmError`].
//!
//! Reference: <https://docs.anthropic.com/en/api/errors>

use conductor_protocol::LmError;

pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> LmError {
    match status.as_u16() {
        400 | 401 | 404 => LmError::InvalidRequest(body.to_string()),
        429 | 529 => LmError::ServiceUnavailable(body.to_string()),
        500..=528 | 530..=599 => LmError::ServiceUnavailable(body.to_string()),
        _ => LmError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> LmError {
    if err.is_timeout() {
        LmError::Timeout
    } else {
        LmError::Transport(Box::new(err))
    }
}
