//! Error value (C3): a tagged failure carrying a status code, an optional body
//! override, an optional header map, and an optional reason-phrase override.

use crate::header::HeaderMap;
use crate::status::StatusCode;
use std::{error, fmt, io};

/// A failure the response writer knows how to turn into an HTTP response.
///
/// Handlers raise this to short-circuit `respond()` with an explicit status;
/// the runtime raises it internally for protocol and routing failures
/// (§4.6/§4.7/§7 of the design doc). Consumed by the response writer exactly
/// once per request.
#[derive(Debug)]
pub struct HttpError {
    code: u16,
    message: Option<Vec<u8>>,
    headers: HeaderMap,
    status_message: Option<String>,
    source: Option<io::Error>,
}

impl HttpError {
    /// An error for `code` with no body or header overrides.
    pub fn new(code: u16) -> Self {
        Self {
            code,
            message: None,
            headers: HeaderMap::new(),
            status_message: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_status_message(mut self, status_message: impl Into<String>) -> Self {
        self.status_message = Some(status_message.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// The reason phrase to render: the override if set, else the registry
    /// text for [`Self::code`].
    pub fn reason_phrase(&self) -> String {
        match &self.status_message {
            Some(msg) => msg.clone(),
            None => StatusCode::reason_phrase_for(self.code).to_string(),
        }
    }

    // Taxonomy constructors (§7 of the design doc) — named after the
    // condition they represent rather than bare status numbers.

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn too_large() -> Self {
        Self::new(413)
    }

    pub fn uri_too_long() -> Self {
        Self::new(414)
    }

    pub fn header_fields_too_large(field_name: &str) -> Self {
        Self::new(431).with_status_message(format!("{field_name} Header Too Large"))
    }

    pub fn unsupported_version() -> Self {
        Self::new(505)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(405)
    }

    pub fn internal() -> Self {
        Self::new(500)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.code, self.reason_phrase())?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl error::Error for HttpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn error::Error + 'static))
    }
}

impl From<io::Error> for HttpError {
    fn from(value: io::Error) -> Self {
        let mut err = Self::internal();
        err.source = Some(value);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_too_large_names_the_field() {
        let err = HttpError::header_fields_too_large("TooLong");
        assert_eq!(err.code(), 431);
        assert_eq!(err.status_message(), Some("TooLong Header Too Large"));
    }

    #[test]
    fn reason_phrase_falls_back_to_registry() {
        let err = HttpError::not_found();
        assert_eq!(err.reason_phrase(), "Not Found");
    }

    #[test]
    fn reason_phrase_honors_override() {
        let err = HttpError::new(200).with_status_message("Custom OK");
        assert_eq!(err.reason_phrase(), "Custom OK");
    }
}
