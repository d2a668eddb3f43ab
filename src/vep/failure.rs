//! Failure classification for VEP requests.
//!
//! Every failed attempt is mapped to a [`FailureKind`], which decides whether
//! the retry loop may try again and supplies the wording used in retry logs
//! and in the final failure report.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Classification of a failed request attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    ConnectionFailed,
    /// HTTP 429 rate limit exceeded
    RateLimited,
    /// HTTP 5xx server error
    ServerError(u16),
    /// Response body could not be decoded as VEP JSON
    UndecodableBody,
    /// HTTP 400 malformed request
    InvalidRequest,
    /// Other client errors (4xx, except 429)
    ClientError(u16),
    /// Response decoded but could not be paired with the request
    MismatchedResponse,
    /// Request could not be built or sent for a non-network reason
    RequestBuild,
    /// Generic network fallback
    NetworkGeneric,
}

impl FailureKind {
    /// Short description used inside log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::ConnectionFailed => "connection failed",
            Self::RateLimited => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::UndecodableBody => "undecodable response body",
            Self::InvalidRequest => "invalid request",
            Self::ClientError(code) => match code {
                404 => "resource not found",
                413 => "payload too large",
                _ => "client error",
            },
            Self::MismatchedResponse => "response does not match request",
            Self::RequestBuild => "request could not be built",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation shown with the terminal failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check network connectivity or raise --timeout-secs",
            Self::ConnectionFailed => "Verify internet connectivity, DNS resolution and --vep-url",
            Self::RateLimited => "Reduce --threads or wait before retrying",
            Self::ServerError(_) => "Ensembl may be experiencing issues, try again later",
            Self::UndecodableBody => "Ensembl returned a non-JSON body, try again later",
            Self::InvalidRequest => "Check the input VCF for alleles VEP cannot parse",
            Self::ClientError(413) => "Reduce --batch-size (VEP accepts at most 200 variants per request)",
            Self::ClientError(_) => "Review --vep-url and the request parameters",
            Self::MismatchedResponse => "Reduce --batch-size and retry",
            Self::RequestBuild => "Check the client configuration",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkTimeout
                | Self::ConnectionFailed
                | Self::RateLimited
                | Self::ServerError(_)
                | Self::UndecodableBody
                | Self::NetworkGeneric
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerError(code) | Self::ClientError(code) => {
                write!(f, "{} ({code})", self.description())
            }
            _ => f.write_str(self.description()),
        }
    }
}

/// Classify a non-success HTTP status.
pub fn classify_status(status: StatusCode) -> FailureKind {
    match status.as_u16() {
        400 => FailureKind::InvalidRequest,
        429 => FailureKind::RateLimited,
        code if status.is_server_error() => FailureKind::ServerError(code),
        code => FailureKind::ClientError(code),
    }
}

/// Classify a reqwest error raised before a status was available.
pub fn classify_transport_error(err: &ReqwestError) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::NetworkTimeout;
    }
    if err.is_connect() {
        return FailureKind::ConnectionFailed;
    }
    if err.is_decode() {
        return FailureKind::UndecodableBody;
    }
    if err.is_builder() {
        return FailureKind::RequestBuild;
    }
    if let Some(status) = err.status() {
        return classify_status(status);
    }
    FailureKind::NetworkGeneric
}

/// Format a retry log line, e.g. "Retrying (attempt 2/3) after server error (503) - waiting 1.4 seconds..."
pub fn format_retry(attempt: u32, max_attempts: u32, kind: FailureKind, backoff: Duration) -> String {
    format!(
        "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds...",
        attempt,
        max_attempts,
        kind,
        backoff.as_secs_f64()
    )
}

/// Multi-line failure summary with a remediation hint.
pub fn format_failure(attempts: u32, kind: FailureKind, message: &str) -> String {
    [
        format!("[FAILED] Annotation request failed after {attempts} attempt(s)"),
        format!("  Last error: {message}"),
        "  Suggestions:".to_string(),
        format!("    - {}", kind.suggestion()),
        "    - Try increasing --max-attempts".to_string(),
    ]
    .join("\n")
}
