use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredentials,
    AuthConfigError,
    MissingProjectId,
    InvalidInput,
    UpstreamTransportError,
    UpstreamReportedError,
    UpstreamParseError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::AuthConfigError => "auth_config_error",
            Self::MissingProjectId => "missing_project_id",
            Self::InvalidInput => "invalid_input",
            Self::UpstreamTransportError => "upstream_transport_error",
            Self::UpstreamReportedError => "upstream_reported_error",
            Self::UpstreamParseError => "upstream_parse_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure ready to be sent back to the caller: a readable message and the
/// HTTP status to reply with.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: StatusCode,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
        }
    }

    pub fn missing_credentials() -> Self {
        Self::new(
            ErrorKind::MissingCredentials,
            StatusCode::INTERNAL_SERVER_ERROR,
            "API key is not configured on the server and was not provided by the user.",
        )
    }

    pub fn auth_config(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AuthConfigError,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }

    pub fn missing_project_id() -> Self {
        Self::new(
            ErrorKind::MissingProjectId,
            StatusCode::INTERNAL_SERVER_ERROR,
            "GOOGLE_PROJECT_ID is not configured on the server or found in credentials.",
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, StatusCode::BAD_REQUEST, message)
    }

    pub fn upstream_parse(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UpstreamParseError,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }

    pub fn upstream_reported(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UpstreamReportedError,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }
}
