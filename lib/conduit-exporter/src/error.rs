use std::{io, time::Duration};

use conduit_error::GenericError;
use http::StatusCode;
use snafu::Snafu;
use tonic::Code;

use crate::status::{code_name, is_retryable_code, StatusError};

/// Errors that can occur while building an exporter.
///
/// These are configuration errors: they are reported synchronously from `build()`, before any network activity.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum BuildError {
    /// The endpoint could not be parsed as a URI.
    #[snafu(display("invalid endpoint '{}': {}", endpoint, reason))]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The endpoint has a scheme other than `http` or `https`.
    #[snafu(display("invalid endpoint '{}': scheme must be http or https, got '{}'", endpoint, scheme))]
    UnsupportedScheme { endpoint: String, scheme: String },

    /// The compression method is not supported.
    #[snafu(display(
        "unsupported compression method '{}', supported compression methods include: {}",
        method,
        supported.join(", ")
    ))]
    UnsupportedCompression {
        method: String,
        supported: &'static [&'static str],
    },

    /// The timeout is negative.
    #[snafu(display("timeout must be zero or positive, got {}", value))]
    InvalidTimeout { value: String },

    /// A header name or value is not valid HTTP.
    #[snafu(display("invalid header '{}': {}", name, reason))]
    InvalidHeader { name: String, reason: String },

    /// The retry policy is not valid.
    #[snafu(display("invalid retry policy: {}", reason))]
    InvalidRetryPolicy { reason: String },

    /// The trusted certificates or client identity could not be loaded.
    #[snafu(display("invalid TLS configuration: {}", source))]
    InvalidTls { source: GenericError },

    /// No Tokio runtime was configured or available on the calling thread.
    #[snafu(display("no Tokio runtime available; build the exporter from within a runtime or provide a runtime handle"))]
    NoRuntime,
}

/// Errors that can occur while exporting.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum ExportError {
    /// The exporter was shut down before the export was submitted.
    #[snafu(display("exporter has been shut down"))]
    Shutdown,

    /// The payload could not be encoded.
    #[snafu(display("failed to serialize export request: {}", source))]
    Serialization { source: io::Error },

    /// The collector answered with a non-OK gRPC status.
    #[snafu(display("export failed with gRPC status {}", status))]
    Grpc { status: StatusError },

    /// The collector answered with a non-success HTTP status.
    #[snafu(display("export failed with HTTP status {}: {}", status, message))]
    Http { status: StatusCode, message: String },

    /// An attempt did not complete within the configured timeout.
    #[snafu(display("export timed out after {:?}", timeout))]
    Timeout { timeout: Duration },

    /// The request could not be delivered.
    #[snafu(display("export transport failure: {}", source))]
    Transport { source: GenericError },

    /// The export task ended without reporting a result.
    #[snafu(display("export task ended without reporting a result"))]
    Dropped,
}

impl ExportError {
    pub(crate) fn grpc(status: tonic::Status) -> Self {
        Self::Grpc { status: status.into() }
    }

    /// Returns `true` if sending the same payload again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Grpc { status } => is_retryable_code(status.code()),
            Self::Http { status, .. } => matches!(status.as_u16(), 429 | 502 | 503 | 504),
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Shutdown | Self::Serialization { .. } | Self::Dropped => false,
        }
    }

    /// Returns the gRPC status code, if the collector answered with one.
    pub fn grpc_code(&self) -> Option<Code> {
        match self {
            Self::Grpc { status } => Some(status.code()),
            _ => None,
        }
    }

    /// Returns the HTTP status code, if the collector answered with one.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns a low-cardinality description of the failure, for use as the `error.type` metric attribute.
    pub fn error_type(&self) -> String {
        match self {
            Self::Shutdown => "shutdown".to_string(),
            Self::Serialization { .. } => "serialization".to_string(),
            Self::Grpc { status } => code_name(status.code()).to_string(),
            Self::Http { status, .. } => status.as_u16().to_string(),
            Self::Timeout { .. } => "timeout".to_string(),
            Self::Transport { .. } => "transport".to_string(),
            Self::Dropped => "dropped".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Status;

    use super::*;
    use crate::compression::SUPPORTED_COMPRESSION;

    #[test]
    fn compression_error_lists_supported_methods() {
        let error = BuildError::UnsupportedCompression {
            method: "zstd".to_string(),
            supported: SUPPORTED_COMPRESSION,
        };
        assert_eq!(
            error.to_string(),
            "unsupported compression method 'zstd', supported compression methods include: gzip, none"
        );
    }

    #[test]
    fn retryability() {
        assert!(ExportError::grpc(Status::unavailable("down")).is_retryable());
        assert!(!ExportError::grpc(Status::permission_denied("nope")).is_retryable());
        assert!(ExportError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: String::new()
        }
        .is_retryable());
        assert!(!ExportError::Http {
            status: StatusCode::BAD_REQUEST,
            message: String::new()
        }
        .is_retryable());
        assert!(!ExportError::Shutdown.is_retryable());
    }

    #[test]
    fn error_types() {
        assert_eq!(
            ExportError::grpc(Status::deadline_exceeded("slow")).error_type(),
            "DEADLINE_EXCEEDED"
        );
        assert_eq!(
            ExportError::Http {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: String::new()
            }
            .error_type(),
            "429"
        );
    }
}
