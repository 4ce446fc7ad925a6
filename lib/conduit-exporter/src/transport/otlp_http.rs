use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use conduit_error::generic_error;
use http::{
    header::{CONTENT_ENCODING, CONTENT_TYPE},
    HeaderMap, HeaderName, HeaderValue, Method, Request, Uri,
};
use http_body_util::BodyExt as _;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::Service;

use super::{base_headers, with_attempt_timeout, ExportRequest, ExportResponse, FixedBody};
use crate::{compression::Compression, error::ExportError, response::http_error_message};

static CONTENT_TYPE_PROTOBUF: HeaderValue = HeaderValue::from_static("application/x-protobuf");
static CONTENT_TYPE_JSON: HeaderValue = HeaderValue::from_static("application/json");

pub(crate) type HttpClient = Client<HttpsConnector<HttpConnector>, FixedBody>;

/// Creates the client used by [`HttpTransport`].
pub(crate) fn build_http_client(connector: HttpsConnector<HttpConnector>) -> HttpClient {
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Body encoding of OTLP/HTTP requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OtlpHttpEncoding {
    /// Binary protobuf.
    #[default]
    Protobuf,

    /// Protobuf JSON mapping.
    Json,
}

impl OtlpHttpEncoding {
    fn content_type(&self) -> HeaderValue {
        match self {
            Self::Protobuf => CONTENT_TYPE_PROTOBUF.clone(),
            Self::Json => CONTENT_TYPE_JSON.clone(),
        }
    }
}

/// OTLP/HTTP transport.
///
/// Posts the encoded request to the signal's path. Any 2xx status is success; 429, 502, 503 and 504 are transient
/// failures, and every other status is permanent.
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpClient,
    uri: Uri,
    headers: HeaderMap,
    encoding: OtlpHttpEncoding,
    compression: Compression,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a new `HttpTransport` that posts to `uri`.
    pub fn new(
        client: HttpClient, uri: Uri, encoding: OtlpHttpEncoding, compression: Compression,
        headers: &[(HeaderName, HeaderValue)], timeout: Option<Duration>,
    ) -> Self {
        let mut headers = base_headers(headers);
        headers.insert(CONTENT_TYPE, encoding.content_type());
        if let Some(encoding) = compression.encoding_header() {
            headers.insert(CONTENT_ENCODING, encoding);
        }

        Self {
            client,
            uri,
            headers,
            encoding,
            compression,
            timeout,
        }
    }
}

impl Service<ExportRequest> for HttpTransport {
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
        let encoding = self.encoding;
        let compression = self.compression;

        Box::pin(with_attempt_timeout(
            self.timeout,
            |timeout| ExportError::Timeout { timeout },
            async move {
                let body = compression
                    .compress(request.body().clone())
                    .await
                    .map_err(|e| ExportError::Serialization { source: e })?;

                let mut http_request = Request::new(FixedBody::new(body));
                *http_request.method_mut() = Method::POST;
                *http_request.uri_mut() = uri;
                *http_request.headers_mut() = headers;

                let response = client
                    .request(http_request)
                    .await
                    .map_err(|e| ExportError::Transport { source: generic_error!(e) })?;

                let (parts, body) = response.into_parts();
                let data = body
                    .collect()
                    .await
                    .map_err(|e| ExportError::Transport { source: generic_error!(e) })?
                    .to_bytes();

                if parts.status.is_success() {
                    Ok(ExportResponse::new(data))
                } else {
                    let message = http_error_message(encoding, &data)
                        .unwrap_or_else(|| parts.status.canonical_reason().unwrap_or("unknown").to_string());
                    Err(ExportError::Http {
                        status: parts.status,
                        message,
                    })
                }
            },
        ))
    }
}
