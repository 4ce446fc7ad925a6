use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use bytes::{Buf as _, BufMut as _, Bytes};
use http::{
    header::{HeaderName, HeaderValue},
    uri::PathAndQuery,
    HeaderMap,
};
use tonic::{
    client::Grpc,
    codec::{Codec, CompressionEncoding, DecodeBuf, Decoder, EncodeBuf, Encoder},
    metadata::MetadataMap,
    transport::Channel,
    Request, Status,
};
use tower::Service;

use super::{with_attempt_timeout, ExportRequest, ExportResponse};
use crate::{compression::Compression, error::ExportError, Signal};

/// Codec that passes already-encoded protobuf messages through untouched.
#[derive(Clone, Copy, Debug, Default)]
struct RawBytesCodec;

impl Codec for RawBytesCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawBytesCodec;
    type Decoder = RawBytesCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawBytesCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawBytesCodec
    }
}

impl Encoder for RawBytesCodec {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, buf: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        buf.put(item);
        Ok(())
    }
}

impl Decoder for RawBytesCodec {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let len = buf.remaining();
        Ok(Some(buf.copy_to_bytes(len)))
    }
}

/// gRPC transport over a managed `tonic` channel.
///
/// The channel handles connection management, reconnection, and gRPC framing and compression. Dropping the transport
/// drops its handle to the channel: a channel created by the exporter goes away with its last handle, while one that
/// was handed in by the caller stays usable by them.
#[derive(Clone)]
pub struct NativeGrpcTransport {
    grpc: Grpc<Channel>,
    path: PathAndQuery,
    metadata: MetadataMap,
    timeout: Option<Duration>,
}

impl NativeGrpcTransport {
    /// Creates a new `NativeGrpcTransport` that exports `signal` over `channel`.
    pub fn new(
        channel: Channel, signal: Signal, compression: Compression, headers: &[(HeaderName, HeaderValue)],
        timeout: Option<Duration>,
    ) -> Self {
        let mut grpc = Grpc::new(channel);
        if compression == Compression::Gzip {
            grpc = grpc.send_compressed(CompressionEncoding::Gzip);
        }
        grpc = grpc.accept_compressed(CompressionEncoding::Gzip);

        // `tonic` manages the reserved gRPC headers, including the user agent, itself.
        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            header_map.append(name.clone(), value.clone());
        }

        Self {
            grpc,
            path: signal.grpc_path_and_query(),
            metadata: MetadataMap::from_headers(header_map),
            timeout,
        }
    }
}

impl Service<ExportRequest> for NativeGrpcTransport {
    type Response = ExportResponse;
    type Error = ExportError;
    type Future = Pin<Box<dyn Future<Output = Result<ExportResponse, ExportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is awaited per call, on a clone of the client.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ExportRequest) -> Self::Future {
        let mut grpc = self.grpc.clone();
        let path = self.path.clone();
        let metadata = self.metadata.clone();
        let timeout = self.timeout;

        Box::pin(with_attempt_timeout(
            timeout,
            |timeout| ExportError::grpc(Status::deadline_exceeded(format!("export timed out after {:?}", timeout))),
            async move {
                grpc.ready()
                    .await
                    .map_err(|e| ExportError::grpc(Status::unavailable(format!("channel not ready: {}", e))))?;

                let mut request = Request::new(request.body().clone());
                *request.metadata_mut() = metadata;
                if let Some(timeout) = timeout {
                    request.set_timeout(timeout);
                }

                let response = grpc
                    .unary(request, path, RawBytesCodec)
                    .await
                    .map_err(ExportError::grpc)?;
                Ok(ExportResponse::new(response.into_inner()))
            },
        ))
    }
}
