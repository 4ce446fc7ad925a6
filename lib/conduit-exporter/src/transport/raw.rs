use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use conduit_error::{error_chain_message, generic_error};
use http::{
    header::{CONTENT_TYPE, TE},
    HeaderName, HeaderValue, Method, Request, Uri,
};
use http_body_util::BodyExt as _;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tonic::{Code, Status};
use tower::Service;
use tracing::trace;

use super::{base_headers, framing, grpc_timeout_header, with_attempt_timeout, ExportRequest, ExportResponse, FixedBody};
use crate::{
    compression::{gunzip, Compression},
    error::ExportError,
    status::code_from_http_status,
};

static CONTENT_TYPE_GRPC: HeaderValue = HeaderValue::from_static("application/grpc");
static TE_TRAILERS: HeaderValue = HeaderValue::from_static("trailers");
static GRPC_ENCODING: HeaderName = HeaderName::from_static("grpc-encoding");
static GRPC_ACCEPT_ENCODING: HeaderName = HeaderName::from_static("grpc-accept-encoding");
static GRPC_TIMEOUT: HeaderName = HeaderName::from_static("grpc-timeout");

pub(crate) type RawHttp2Client = Client<HttpsConnector<HttpConnector>, FixedBody>;

/// Creates the HTTP/2-only client used by [`RawHttp2Transport`].
pub(crate) fn build_raw_http2_client(connector: HttpsConnector<HttpConnector>) -> RawHttp2Client {
    Client::builder(TokioExecutor::new())
        .http2_only(true)
        .build(connector)
}

/// gRPC transport that frames requests itself and sends them over a plain HTTP/2 client.
///
/// Only unary calls are needed to export, so the subset of gRPC implemented here is small: a single length-prefixed
/// message in each direction, and a status carried either in the response headers (a "trailers-only" response) or in
/// the trailers.
#[derive(Clone)]
pub struct RawHttp2Transport {
    client: RawHttp2Client,
    uri: Uri,
    headers: http::HeaderMap,
    compression: Compression,
    timeout: Option<Duration>,
}

impl RawHttp2Transport {
    /// Creates a new `RawHttp2Transport` that posts to `uri`, the endpoint joined with the service method path.
    pub fn new(
        client: RawHttp2Client, uri: Uri, compression: Compression, headers: &[(HeaderName, HeaderValue)],
        timeout: Option<Duration>,
    ) -> Self {
        let mut headers = base_headers(headers);
        headers.insert(CONTENT_TYPE, CONTENT_TYPE_GRPC.clone());
        headers.insert(TE, TE_TRAILERS.clone());
        headers.insert(GRPC_ACCEPT_ENCODING.clone(), HeaderValue::from_static("gzip"));
        if let Some(encoding) = compression.encoding_header() {
            headers.insert(GRPC_ENCODING.clone(), encoding);
        }
        if let Some(timeout) = timeout {
            headers.insert(GRPC_TIMEOUT.clone(), grpc_timeout_header(timeout));
        }

        Self {
            client,
            uri,
            headers,
            compression,
            timeout,
        }
    }
}

impl Service<ExportRequest> for RawHttp2Transport {
    type Response = ExportResponse;
    type Error = ExportError;
    type Future = Pin<Box<dyn Future<Output = Result<ExportResponse, ExportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ExportRequest) -> Self::Future {
        let client = self.client.clone();
        let uri = self.uri.clone();
        let headers = self.headers.clone();
        let compression = self.compression;

        Box::pin(with_attempt_timeout(
            self.timeout,
            |timeout| ExportError::grpc(Status::deadline_exceeded(format!("export timed out after {:?}", timeout))),
            async move {
                let message = compression
                    .compress(request.body().clone())
                    .await
                    .map_err(|e| ExportError::Serialization { source: e })?;
                let frame = framing::encode_frame(&message, compression != Compression::None);

                let mut http_request = Request::new(FixedBody::new(frame));
                *http_request.method_mut() = Method::POST;
                *http_request.uri_mut() = uri;
                *http_request.headers_mut() = headers;

                let response = client.request(http_request).await.map_err(|e| {
                    let error = generic_error!(e);
                    ExportError::grpc(Status::unavailable(error_chain_message(&error)))
                })?;

                let (parts, body) = response.into_parts();

                // A "trailers-only" response carries the status in the headers, and has no body worth reading.
                if let Some(status) = Status::from_header_map(&parts.headers) {
                    if status.code() != Code::Ok {
                        return Err(ExportError::grpc(status));
                    }
                }

                if !parts.status.is_success() {
                    let code = code_from_http_status(parts.status);
                    return Err(ExportError::grpc(Status::new(
                        code,
                        format!("collector responded with HTTP status {}", parts.status),
                    )));
                }

                let collected = body.collect().await.map_err(|e| {
                    ExportError::grpc(Status::unavailable(format!("failed to read response: {}", e)))
                })?;
                let trailers = collected.trailers().cloned();
                let data = collected.to_bytes();

                let status = trailers
                    .as_ref()
                    .and_then(Status::from_header_map)
                    .or_else(|| Status::from_header_map(&parts.headers))
                    .unwrap_or_else(|| Status::unknown("response ended without a grpc-status"));
                if status.code() != Code::Ok {
                    return Err(ExportError::grpc(status));
                }

                let body = match framing::decode_frame(&data) {
                    Some(frame) if frame.compressed => gunzip(frame.message)
                        .await
                        .map_err(|e| {
                            ExportError::grpc(Status::internal(format!("invalid compressed response: {}", e)))
                        })?
                        .into(),
                    Some(frame) => data.slice_ref(frame.message),
                    None => {
                        trace!(len = data.len(), "Response carried no complete message.");
                        data.slice(0..0)
                    }
                };

                Ok(ExportResponse::new(body))
            },
        ))
    }
}
