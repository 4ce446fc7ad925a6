use crate::error::ExportError;

/// Determines whether or not a request should be retried.
///
/// This trait is closely related to [`tower::retry::Policy`], but allows us to decouple the logic of how to classify
/// whether or not a request should be retried from the logic of determining how long to wait before retrying.
pub trait RetryClassifier<Res, Error> {
    /// Returns `true` if the original request should be retried.
    fn should_retry(&self, response: &Result<Res, Error>) -> bool;
}

/// Classifies export attempts by whether their failure is transient.
///
/// Successful attempts are never retried. Failed attempts are retried when [`ExportError::is_retryable`] says so: for
/// gRPC, that covers codes such as `UNAVAILABLE` and `DEADLINE_EXCEEDED` but not `PERMISSION_DENIED` or `UNIMPLEMENTED`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportRetryClassifier;

impl<Res> RetryClassifier<Res, ExportError> for ExportRetryClassifier {
    fn should_retry(&self, response: &Result<Res, ExportError>) -> bool {
        match response {
            Ok(_) => false,
            Err(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Status;

    use super::*;

    #[test]
    fn classification() {
        let classifier = ExportRetryClassifier;
        assert!(!classifier.should_retry(&Ok::<_, ExportError>(())));
        assert!(classifier.should_retry(&Err::<(), _>(ExportError::grpc(Status::resource_exhausted("slow down")))));
        assert!(!classifier.should_retry(&Err::<(), _>(ExportError::grpc(Status::unimplemented("no receiver")))));
        assert!(!classifier.should_retry(&Err::<(), _>(ExportError::Shutdown)));
    }
}
