//! Transports that deliver encoded export requests to a collector.
//!
//! Every transport is a [`tower::Service`] from [`ExportRequest`] to [`ExportResponse`], which lets the exporter layer
//! retries on top without caring how the bytes get to the collector. Each call is a single attempt, bounded by the
//! configured timeout.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use http::{
    header::{HeaderName, USER_AGENT},
    HeaderMap, HeaderValue,
};
use tower::util::BoxCloneService;

use crate::error::ExportError;

mod body;
pub(crate) use self::body::FixedBody;

mod connector;
pub(crate) use self::connector::{build_https_connector, HttpVersions};

pub(crate) mod framing;

mod native;
pub(crate) use self::native::NativeGrpcTransport;

mod otlp_http;
pub use self::otlp_http::OtlpHttpEncoding;
pub(crate) use self::otlp_http::{build_http_client, HttpTransport};

mod raw;
pub(crate) use self::raw::{build_raw_http2_client, RawHttp2Transport};

/// An encoded export request.
///
/// The body is the uncompressed protobuf (or JSON) encoding of the export request message. Cloning is cheap, which
/// lets retries send the very same bytes again.
#[derive(Clone, Debug)]
pub struct ExportRequest {
    body: Bytes,
}

impl ExportRequest {
    /// Creates a new `ExportRequest` from the encoded message.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Returns the encoded message.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// The collector's answer to a successful export.
#[derive(Clone, Debug, Default)]
pub struct ExportResponse {
    body: Bytes,
}

impl ExportResponse {
    /// Creates a new `ExportResponse` from the encoded response message.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Returns the encoded response message, which may be empty.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// A type-erased transport, possibly with retries layered on top.
pub(crate) type ExportService = BoxCloneService<ExportRequest, ExportResponse, ExportError>;

/// The value sent in the `User-Agent` header.
pub(crate) fn user_agent() -> HeaderValue {
    HeaderValue::from_static(concat!("conduit-exporter/", env!("CARGO_PKG_VERSION")))
}

/// Builds the headers sent with every request: the user agent, followed by the configured headers in order.
pub(crate) fn base_headers(headers: &[(HeaderName, HeaderValue)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    map.insert(USER_AGENT, user_agent());
    for (name, value) in headers {
        map.append(name.clone(), value.clone());
    }
    map
}

/// Runs a single attempt, bounded by `timeout` when one is set.
pub(crate) async fn with_attempt_timeout<F, T>(
    timeout: Option<Duration>, on_timeout: impl FnOnce(Duration) -> ExportError, attempt: F,
) -> Result<T, ExportError>
where
    F: Future<Output = Result<T, ExportError>>,
{
    match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(timeout)),
        },
        None => attempt.await,
    }
}

/// Formats a timeout as a `grpc-timeout` header value.
///
/// The value is at most eight digits, so the unit is chosen to be the finest one that still fits.
pub(crate) fn grpc_timeout_header(timeout: Duration) -> HeaderValue {
    const MAX: u128 = 99_999_999;

    let nanos = timeout.as_nanos();
    let value = if nanos <= MAX {
        format!("{}n", nanos)
    } else if nanos / 1_000 <= MAX {
        format!("{}u", nanos / 1_000)
    } else if nanos / 1_000_000 <= MAX {
        format!("{}m", nanos / 1_000_000)
    } else if timeout.as_secs() as u128 <= MAX {
        format!("{}S", timeout.as_secs())
    } else if timeout.as_secs() as u128 / 60 <= MAX {
        format!("{}M", timeout.as_secs() / 60)
    } else {
        format!("{}H", (timeout.as_secs() / 3600).min(MAX as u64))
    };

    // Only ASCII digits and a unit letter.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("99999999H"))
}
