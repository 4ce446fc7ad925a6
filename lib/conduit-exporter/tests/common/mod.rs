#![allow(dead_code)]

use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::{BufMut as _, Bytes, BytesMut};
use futures::stream;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode, Version};
use http_body_util::{BodyExt as _, StreamBody};
use hyper::{body::Frame, body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
};
use rcgen::{BasicConstraints, Certificate, CertificateParams, IsCa, KeyPair};
use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    server::WebPkiClientVerifier,
    RootCertStore, ServerConfig,
};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tonic::Code;

type MockBody = StreamBody<stream::Iter<std::vec::IntoIter<Result<Frame<Bytes>, Infallible>>>>;

/// A request received by the mock collector.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Splits the body as a single gRPC length-prefixed message, returning the compressed flag and the message.
    pub fn grpc_message(&self) -> (bool, Bytes) {
        assert!(self.body.len() >= 5, "body too short for a gRPC frame");
        let compressed = self.body[0] == 1;
        let len = u32::from_be_bytes([self.body[1], self.body[2], self.body[3], self.body[4]]) as usize;
        assert_eq!(self.body.len(), 5 + len, "body holds more than one gRPC frame");
        (compressed, self.body.slice(5..))
    }
}

/// How the mock collector answers a request.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// A gRPC response, with the status in the trailers.
    Grpc { code: Code, message: Bytes },

    /// A gRPC response with the status in the headers and no body.
    GrpcTrailersOnly(Code),

    /// A plain HTTP response.
    Http { status: StatusCode, body: Bytes },

    /// Another response, sent after a delay.
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn grpc_ok() -> Self {
        Self::Grpc {
            code: Code::Ok,
            message: Bytes::new(),
        }
    }

    pub fn grpc_error(code: Code) -> Self {
        Self::GrpcTrailersOnly(code)
    }

    pub fn http(status: u16) -> Self {
        Self::Http {
            status: StatusCode::from_u16(status).unwrap(),
            body: Bytes::new(),
        }
    }

    async fn into_http(self) -> Response<MockBody> {
        let mut response = self;
        while let MockResponse::Delayed(delay, inner) = response {
            tokio::time::sleep(delay).await;
            response = *inner;
        }

        match response {
            MockResponse::Grpc { code, message } => {
                let mut trailers = HeaderMap::new();
                trailers.insert("grpc-status", HeaderValue::from(code as i32));
                let frames = vec![Ok(Frame::data(grpc_frame(&message))), Ok(Frame::trailers(trailers))];
                Response::builder()
                    .header("content-type", "application/grpc")
                    .body(StreamBody::new(stream::iter(frames)))
                    .unwrap()
            }
            MockResponse::GrpcTrailersOnly(code) => Response::builder()
                .header("content-type", "application/grpc")
                .header("grpc-status", code as i32)
                .header("grpc-message", "mock%20collector")
                .body(StreamBody::new(stream::iter(Vec::new())))
                .unwrap(),
            MockResponse::Http { status, body } => Response::builder()
                .status(status)
                .header("content-type", "application/x-protobuf")
                .body(StreamBody::new(stream::iter(vec![Ok(Frame::data(body))])))
                .unwrap(),
            MockResponse::Delayed(..) => unreachable!(),
        }
    }
}

pub fn grpc_frame(message: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + message.len());
    buf.put_u8(0);
    buf.put_u32(message.len() as u32);
    buf.put_slice(message);
    buf.freeze()
}

struct State {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<MockResponse>>,
    default_response: MockResponse,
}

/// An in-process collector that records every request and answers from a script.
///
/// Serves HTTP/1.1 and HTTP/2 (with prior knowledge, or negotiated over TLS) on a loopback port.
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<State>,
}

impl MockCollector {
    pub async fn start(default_response: MockResponse) -> Self {
        Self::start_with_tls(default_response, None).await
    }

    pub async fn start_with_tls(default_response: MockResponse, tls: Option<ServerConfig>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            default_response,
        });
        let acceptor = tls.map(|config| TlsAcceptor::from(Arc::new(config)));

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&server_state);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |request| handle(Arc::clone(&state), request));
                    let builder = Builder::new(TokioExecutor::new());
                    match acceptor {
                        Some(acceptor) => {
                            if let Ok(stream) = acceptor.accept(stream).await {
                                let _ = builder.serve_connection(TokioIo::new(stream), service).await;
                            }
                        }
                        None => {
                            let _ = builder.serve_connection(TokioIo::new(stream), service).await;
                        }
                    }
                });
            }
        });

        Self { addr, state }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn http_endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    pub fn https_endpoint(&self) -> String {
        format!("https://localhost:{}", self.addr.port())
    }

    /// Queues responses, used in order before falling back to the default response.
    pub fn respond_with(&self, responses: impl IntoIterator<Item = MockResponse>) {
        self.state.responses.lock().unwrap().extend(responses);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle(state: Arc<State>, request: Request<Incoming>) -> Result<Response<MockBody>, Infallible> {
    let (parts, body) = request.into_parts();
    let body = body.collect().await.map(|collected| collected.to_bytes()).unwrap_or_default();
    state.requests.lock().unwrap().push(RecordedRequest {
        path: parts.uri.path().to_string(),
        version: parts.version,
        headers: parts.headers,
        body,
    });

    let response = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.default_response.clone());
    Ok(response.into_http().await)
}

/// A certificate and its private key.
pub struct TestIdentity {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl TestIdentity {
    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    pub fn key_pem(&self) -> String {
        self.key.serialize_pem()
    }

    fn cert_der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    fn key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key.serialize_der()))
    }
}

/// A certificate authority issuing leaf certificates for tests.
pub struct TestCa {
    identity: TestIdentity,
}

impl TestCa {
    pub fn new() -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self {
            identity: TestIdentity { cert, key },
        }
    }

    pub fn cert_pem(&self) -> String {
        self.identity.cert_pem()
    }

    pub fn issue(&self, name: &str) -> TestIdentity {
        let params = CertificateParams::new(vec![name.to_string()]).unwrap();
        let key = KeyPair::generate().unwrap();
        let cert = params
            .signed_by(&key, &self.identity.cert, &self.identity.key)
            .unwrap();
        TestIdentity { cert, key }
    }

    fn root_store(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.identity.cert_der()).unwrap();
        roots
    }
}

fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Server TLS configuration presenting `server`, and requiring a client certificate issued by `client_ca` if given.
pub fn server_tls_config(server: &TestIdentity, client_ca: Option<&TestCa>) -> ServerConfig {
    let builder = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .unwrap();
    let builder = match client_ca {
        Some(ca) => {
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(ca.root_store()), crypto_provider())
                .build()
                .unwrap();
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let mut config = builder
        .with_single_cert(vec![server.cert_der()], server.key_der())
        .unwrap();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    config
}
