//! Decoding of collector responses.
//!
//! Only the parts of the responses that the exporter acts on are decoded: the partial success of an accepted export,
//! and the message of a rejected OTLP/HTTP request.

use prost::Message as _;
use serde_json::Value;
use tracing::warn;

use crate::{transport::OtlpHttpEncoding, Signal};

/// `Export*ServiceResponse`, for any signal.
///
/// The three signals only differ in the name of the rejected count, which is field 1 in every case.
#[derive(Clone, PartialEq, prost::Message)]
struct ExportServiceResponse {
    #[prost(message, optional, tag = "1")]
    partial_success: Option<ExportPartialSuccess>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ExportPartialSuccess {
    #[prost(int64, tag = "1")]
    rejected: i64,
    #[prost(string, tag = "2")]
    error_message: String,
}

/// `google.rpc.Status`, as returned in the body of failed OTLP/HTTP requests.
#[derive(Clone, PartialEq, prost::Message)]
struct RpcStatus {
    #[prost(int32, tag = "1")]
    code: i32,
    #[prost(string, tag = "2")]
    message: String,
}

/// The items a collector accepted only in part.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PartialSuccess {
    /// Number of rejected items.
    pub rejected: i64,

    /// Why items were rejected, possibly empty.
    pub error_message: String,
}

impl PartialSuccess {
    fn is_empty(&self) -> bool {
        self.rejected == 0 && self.error_message.is_empty()
    }
}

fn rejected_json_field(signal: Signal) -> &'static str {
    match signal {
        Signal::Traces => "rejectedSpans",
        Signal::Metrics => "rejectedDataPoints",
        Signal::Logs => "rejectedLogRecords",
    }
}

/// Decodes the partial success of an export response.
///
/// Returns `None` when the response is empty, cannot be decoded, or reports that everything was accepted.
pub fn decode_partial_success(signal: Signal, encoding: OtlpHttpEncoding, body: &[u8]) -> Option<PartialSuccess> {
    if body.is_empty() {
        return None;
    }

    let partial_success = match encoding {
        OtlpHttpEncoding::Protobuf => {
            let response = ExportServiceResponse::decode(body).ok()?;
            let partial_success = response.partial_success?;
            PartialSuccess {
                rejected: partial_success.rejected,
                error_message: partial_success.error_message,
            }
        }
        OtlpHttpEncoding::Json => {
            let response: Value = serde_json::from_slice(body).ok()?;
            let partial_success = response.get("partialSuccess")?;
            // 64-bit integers are strings in the JSON mapping, but plain numbers are accepted too.
            let rejected = match partial_success.get(rejected_json_field(signal)) {
                Some(Value::String(s)) => s.parse().unwrap_or(0),
                Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
                _ => 0,
            };
            let error_message = partial_success
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            PartialSuccess {
                rejected,
                error_message,
            }
        }
    };

    (!partial_success.is_empty()).then_some(partial_success)
}

/// Logs a warning if the collector only accepted part of an export.
pub fn log_partial_success(signal: Signal, endpoint: &str, encoding: OtlpHttpEncoding, body: &[u8]) {
    if let Some(partial_success) = decode_partial_success(signal, encoding, body) {
        warn!(
            %signal,
            %endpoint,
            rejected = partial_success.rejected,
            error_message = %partial_success.error_message,
            "Collector only partially accepted the export."
        );
    }
}

/// Extracts the error message from the body of a failed OTLP/HTTP request.
pub fn http_error_message(encoding: OtlpHttpEncoding, body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    let message = match encoding {
        OtlpHttpEncoding::Protobuf => RpcStatus::decode(body).ok()?.message,
        OtlpHttpEncoding::Json => {
            let status: Value = serde_json::from_slice(body).ok()?;
            status.get("message")?.as_str()?.to_string()
        }
    };

    (!message.is_empty()).then_some(message)
}
