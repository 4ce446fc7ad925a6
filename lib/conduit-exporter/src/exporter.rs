use std::{
    future::Future,
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering::AcqRel, Ordering::Acquire},
        Arc, Mutex, PoisonError,
    },
    task::{Context, Poll},
};

use conduit_marshal::{to_binary, write_json_to, Marshaler};
use tokio::{runtime::Handle, sync::oneshot};
use tonic::Code;
use tower::{retry::RetryLayer, util::BoxCloneService, Service, ServiceBuilder, ServiceExt as _};
use tracing::{debug, error};

use crate::{
    builder::ValidatedSettings,
    error::ExportError,
    metrics::{ExporterMetrics, ExporterProtocol, Recording},
    response::log_partial_success,
    retry::{ExportRetryLifecycle, RetryInterceptor},
    transport::{ExportRequest, ExportResponse, ExportService, OtlpHttpEncoding},
    Signal,
};

/// The pending result of an exporter operation.
///
/// Resolves exactly once. Exports run on the exporter's runtime whether or not the handle is polled, so dropping the
/// handle does not cancel the export, it only discards the result.
#[must_use = "the result of an export is only observable through its handle"]
pub struct ExportHandle {
    rx: oneshot::Receiver<Result<(), ExportError>>,
}

impl ExportHandle {
    fn pending() -> (oneshot::Sender<Result<(), ExportError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    fn ready(result: Result<(), ExportError>) -> Self {
        let (tx, handle) = Self::pending();
        let _ = tx.send(result);
        handle
    }

    fn success() -> Self {
        Self::ready(Ok(()))
    }
}

impl Future for ExportHandle {
    type Output = Result<(), ExportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ExportError::Dropped)))
    }
}

/// What an export task needs to finish an export once the collector has answered.
struct ExportOutcome {
    signal: Signal,
    endpoint: Arc<str>,
    protocol: ExporterProtocol,
    logged_unimplemented: AtomicBool,
}

impl ExportOutcome {
    fn encoding(&self) -> OtlpHttpEncoding {
        match self.protocol {
            ExporterProtocol::HttpJson => OtlpHttpEncoding::Json,
            ExporterProtocol::Grpc | ExporterProtocol::HttpProtobuf => OtlpHttpEncoding::Protobuf,
        }
    }

    fn complete(&self, result: Result<ExportResponse, ExportError>, recording: Recording) -> Result<(), ExportError> {
        match result {
            Ok(response) => {
                recording.finish_success();
                log_partial_success(self.signal, &self.endpoint, self.encoding(), response.body());
                Ok(())
            }
            Err(e) => {
                recording.finish_failed(&e.error_type(), &failure_attributes(&e));
                self.log_failure(&e);
                Err(e)
            }
        }
    }

    fn log_failure(&self, e: &ExportError) {
        let signal = self.signal;
        let endpoint = &*self.endpoint;

        match e.grpc_code() {
            Some(Code::Unimplemented) => {
                if !self.logged_unimplemented.swap(true, AcqRel) {
                    error!(
                        %signal,
                        %endpoint,
                        error = %e,
                        "Failed to export {}. The collector responded with UNIMPLEMENTED, which usually means it has no OTLP receiver enabled for this signal. Check that an OTLP receiver is configured in the collector's pipelines.",
                        signal
                    );
                } else {
                    debug!(
                        %signal,
                        %endpoint,
                        error = %e,
                        "Failed to export {}. The collector responded with UNIMPLEMENTED.",
                        signal
                    );
                }
            }
            Some(Code::Unavailable) => error!(
                %signal,
                %endpoint,
                error = %e,
                "Failed to export {}. The collector is UNAVAILABLE. Make sure it is running and reachable from this network.",
                signal
            ),
            Some(_) => error!(
                %signal,
                %endpoint,
                error = %e,
                "Failed to export {}. The collector rejected the request.",
                signal
            ),
            None => match e {
                ExportError::Http { status, .. } if status.as_u16() == 404 => error!(
                    %signal,
                    %endpoint,
                    error = %e,
                    "Failed to export {}. The collector responded with 404 Not Found. Check that the endpoint includes the path of the signal, such as {}.",
                    signal,
                    signal.http_path()
                ),
                ExportError::Transport { .. } | ExportError::Timeout { .. } => error!(
                    %signal,
                    %endpoint,
                    error = %e,
                    "Failed to export {}. The request could not be completed. Make sure the collector is running and reachable from this network.",
                    signal
                ),
                _ => error!(%signal, %endpoint, error = %e, "Failed to export {}.", signal),
            },
        }
    }
}

fn failure_attributes(e: &ExportError) -> Vec<(&'static str, String)> {
    if let Some(code) = e.grpc_code() {
        vec![("rpc.grpc.status_code", (code as i32).to_string())]
    } else if let Some(status) = e.http_status() {
        vec![("http.response.status_code", status.as_u16().to_string())]
    } else {
        Vec::new()
    }
}

/// Layers retries, if a policy is set, on top of a transport.
fn layer_retries<S>(
    transport: S, signal: Signal, endpoint: Arc<str>, settings: &ValidatedSettings, shutdown: &Arc<AtomicBool>,
) -> ExportService
where
    S: Service<ExportRequest, Response = ExportResponse, Error = ExportError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    match settings.retry_policy {
        Some(policy) => {
            let interceptor =
                RetryInterceptor::new(&policy, ExportRetryLifecycle::new(signal, endpoint), Arc::clone(shutdown));
            BoxCloneService::new(
                ServiceBuilder::new()
                    .layer(RetryLayer::new(interceptor))
                    .service(transport),
            )
        }
        None => BoxCloneService::new(transport),
    }
}

/// The transport-independent part of an exporter.
///
/// Encodes the payload on the calling thread, then hands the request to the transport on the exporter's runtime, and
/// resolves the returned handle once the export, retries included, has finished.
pub(crate) struct ExporterCore {
    service: Mutex<Option<ExportService>>,
    shutdown: Arc<AtomicBool>,
    metrics: ExporterMetrics,
    outcome: Arc<ExportOutcome>,
    runtime: Handle,
}

impl ExporterCore {
    pub(crate) fn new<S>(signal: Signal, protocol: ExporterProtocol, settings: ValidatedSettings, transport: S) -> Self
    where
        S: Service<ExportRequest, Response = ExportResponse, Error = ExportError> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        let endpoint: Arc<str> = Arc::from(settings.endpoint.as_str());
        let shutdown = Arc::new(AtomicBool::new(false));
        let service = layer_retries(transport, signal, Arc::clone(&endpoint), &settings, &shutdown);
        let metrics = settings.exporter_metrics(signal, protocol);

        Self {
            service: Mutex::new(Some(service)),
            shutdown,
            metrics,
            outcome: Arc::new(ExportOutcome {
                signal,
                endpoint,
                protocol,
                logged_unimplemented: AtomicBool::new(false),
            }),
            runtime: settings.runtime,
        }
    }

    pub(crate) fn signal(&self) -> Signal {
        self.outcome.signal
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.outcome.endpoint
    }

    fn encode(&self, marshaler: &dyn Marshaler) -> io::Result<Vec<u8>> {
        match self.outcome.encoding() {
            OtlpHttpEncoding::Protobuf => to_binary(marshaler),
            OtlpHttpEncoding::Json => {
                let mut buf = Vec::with_capacity(marshaler.compute_size());
                write_json_to(marshaler, &mut buf)?;
                Ok(buf)
            }
        }
    }

    pub(crate) fn export(&self, marshaler: &dyn Marshaler, item_count: usize) -> ExportHandle {
        if self.shutdown.load(Acquire) {
            return ExportHandle::ready(Err(ExportError::Shutdown));
        }

        let service = match &*self.service.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(service) => service.clone(),
            None => return ExportHandle::ready(Err(ExportError::Shutdown)),
        };

        let recording = self.metrics.start_recording_export(item_count as u64);

        let body = match self.encode(marshaler) {
            Ok(body) => body,
            Err(source) => {
                let e = ExportError::Serialization { source };
                recording.finish_failed(&e.error_type(), &[]);
                error!(signal = %self.signal(), error = %e, "Failed to encode export request.");
                return ExportHandle::ready(Err(e));
            }
        };

        let (tx, handle) = ExportHandle::pending();
        let outcome = Arc::clone(&self.outcome);
        self.runtime.spawn(async move {
            let result = service.oneshot(ExportRequest::new(body)).await;
            let result = outcome.complete(result, recording);
            let _ = tx.send(result);
        });

        handle
    }

    pub(crate) fn flush(&self) -> ExportHandle {
        ExportHandle::success()
    }

    pub(crate) fn shutdown(&self) -> ExportHandle {
        if self.shutdown.swap(true, AcqRel) {
            debug!(signal = %self.signal(), "Exporter already shut down.");
            return ExportHandle::success();
        }

        // In-flight exports hold their own clone of the service, and finish undisturbed.
        let service = self.service.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(service);
        debug!(signal = %self.signal(), endpoint = %self.endpoint(), "Exporter shut down.");

        ExportHandle::success()
    }
}
