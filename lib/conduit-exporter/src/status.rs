use std::fmt;

use http::StatusCode;
use tonic::{Code, Status};

/// A gRPC status that displays as `Code(message)`.
///
/// `tonic::Status` renders every field it carries, metadata included, which is far too noisy for log lines.
#[derive(Clone)]
pub struct StatusError(Status);

impl StatusError {
    /// Returns the status code.
    pub fn code(&self) -> Code {
        self.0.code()
    }

    /// Returns the status message.
    pub fn message(&self) -> &str {
        self.0.message()
    }

    /// Returns the underlying status.
    pub fn status(&self) -> &Status {
        &self.0
    }
}

impl From<Status> for StatusError {
    fn from(status: Status) -> Self {
        Self(status)
    }
}

impl fmt::Debug for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Without a message, fall back to the description of the code.
        let message = match self.0.message() {
            "" => self.0.code().description(),
            message => message,
        };
        write!(f, "{:?}({})", self.0.code(), message)
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Returns the canonical upper-snake-case name of a status code, as used for the `error.type` attribute.
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}

/// Returns `true` if a call that failed with the given code may succeed when sent again unchanged.
pub fn is_retryable_code(code: Code) -> bool {
    matches!(
        code,
        Code::Cancelled
            | Code::DeadlineExceeded
            | Code::ResourceExhausted
            | Code::Aborted
            | Code::OutOfRange
            | Code::Unavailable
            | Code::DataLoss
    )
}

/// Maps the HTTP status of a gRPC response that carried no `grpc-status` to a status code.
pub fn code_from_http_status(status: StatusCode) -> Code {
    match status.as_u16() {
        400 => Code::Internal,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::Unimplemented,
        429 | 502 | 503 | 504 => Code::Unavailable,
        _ => Code::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_empty_message() {
        let status = Status::new(Code::Ok, "");
        let error = StatusError::from(status);
        assert_eq!(error.to_string(), "Ok(The operation completed successfully)");
    }

    #[test]
    fn status_non_empty_message() {
        let status = Status::new(Code::Unavailable, "tcp connect error");
        let error = StatusError::from(status);
        assert_eq!(error.to_string(), "Unavailable(tcp connect error)");
    }

    #[test]
    fn transient_codes_are_retryable() {
        for code in [Code::Unavailable, Code::ResourceExhausted, Code::DeadlineExceeded, Code::DataLoss] {
            assert!(is_retryable_code(code), "{:?} should be retryable", code);
        }

        for code in [
            Code::PermissionDenied,
            Code::InvalidArgument,
            Code::Unimplemented,
            Code::Unauthenticated,
        ] {
            assert!(!is_retryable_code(code), "{:?} should not be retryable", code);
        }
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(code_from_http_status(StatusCode::BAD_REQUEST), Code::Internal);
        assert_eq!(code_from_http_status(StatusCode::NOT_FOUND), Code::Unimplemented);
        assert_eq!(code_from_http_status(StatusCode::TOO_MANY_REQUESTS), Code::Unavailable);
        assert_eq!(code_from_http_status(StatusCode::GATEWAY_TIMEOUT), Code::Unavailable);
        assert_eq!(code_from_http_status(StatusCode::IM_A_TEAPOT), Code::Unknown);
    }
}
