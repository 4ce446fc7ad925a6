//! OTLP/gRPC exporter.

use conduit_marshal::Marshaler;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::{
    builder::{exporter_settings_methods, ExporterSettings, ValidatedSettings},
    error::BuildError,
    exporter::{ExportHandle, ExporterCore},
    metrics::ExporterProtocol,
    transport::{
        build_https_connector, build_raw_http2_client, user_agent, HttpVersions, NativeGrpcTransport,
        RawHttp2Transport,
    },
    Signal,
};

const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// How gRPC requests reach the collector.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum GrpcTransport {
    /// A managed `tonic` channel.
    #[default]
    Native,

    /// gRPC framing over a plain HTTP/2 client.
    RawHttp2,
}

/// Builder for [`GrpcExporter`].
///
/// Settings are only checked by [`build`][Self::build], which reports the first invalid one.
pub struct GrpcExporterBuilder {
    signal: Signal,
    settings: ExporterSettings,
    transport: GrpcTransport,
    channel: Option<Channel>,
}

impl GrpcExporterBuilder {
    /// Creates a new `GrpcExporterBuilder` for exporting `signal` to `http://localhost:4317`.
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            settings: ExporterSettings::new(DEFAULT_ENDPOINT),
            transport: GrpcTransport::default(),
            channel: None,
        }
    }

    pub(crate) fn from_settings(signal: Signal, settings: ExporterSettings) -> Self {
        Self {
            signal,
            settings,
            transport: GrpcTransport::default(),
            channel: None,
        }
    }

    exporter_settings_methods!();

    /// Sets how requests reach the collector.
    pub fn with_transport(mut self, transport: GrpcTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Exports over an existing channel instead of creating one.
    ///
    /// The channel's own endpoint, TLS and connection settings apply, and the exporter leaves the channel open when
    /// shut down. Implies [`GrpcTransport::Native`].
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.transport = GrpcTransport::Native;
        self.channel = Some(channel);
        self
    }

    /// Builds the exporter.
    ///
    /// No connection is made here: the collector is first contacted by the first export.
    ///
    /// ## Errors
    ///
    /// If any setting is invalid, or if no runtime was given and this is not called from within one, an error will be
    /// returned.
    pub fn build(self) -> Result<GrpcExporter, BuildError> {
        let settings = self.settings.validate()?;
        let signal = self.signal;

        let core = match self.transport {
            GrpcTransport::Native => {
                let channel = match self.channel {
                    Some(channel) => channel,
                    None => create_channel(&settings)?,
                };
                let transport = NativeGrpcTransport::new(
                    channel,
                    signal,
                    settings.compression,
                    &settings.headers,
                    settings.timeout,
                );
                ExporterCore::new(signal, ExporterProtocol::Grpc, settings, transport)
            }
            GrpcTransport::RawHttp2 => {
                let connector = build_https_connector(
                    settings.tls_config.clone(),
                    settings.connect_timeout,
                    HttpVersions::Http2Only,
                );
                let transport = RawHttp2Transport::new(
                    build_raw_http2_client(connector),
                    settings.uri_with_path(signal.grpc_path())?,
                    settings.compression,
                    &settings.headers,
                    settings.timeout,
                );
                ExporterCore::new(signal, ExporterProtocol::Grpc, settings, transport)
            }
        };

        debug!(%signal, endpoint = core.endpoint(), transport = ?self.transport, "Built gRPC exporter.");

        Ok(GrpcExporter { core })
    }
}

fn create_channel(settings: &ValidatedSettings) -> Result<Channel, BuildError> {
    let invalid_endpoint = |reason: String| BuildError::InvalidEndpoint {
        endpoint: settings.endpoint.to_string(),
        reason,
    };

    let endpoint = Endpoint::from_shared(settings.endpoint.to_string())
        .map_err(|e| invalid_endpoint(e.to_string()))?
        .user_agent(user_agent())
        .map_err(|e| invalid_endpoint(e.to_string()))?
        .connect_timeout(settings.connect_timeout);

    let connector = build_https_connector(
        settings.tls_config.clone(),
        settings.connect_timeout,
        HttpVersions::Http2Only,
    );

    // The channel spawns its connection worker as soon as it is created.
    let _guard = settings.runtime.enter();
    Ok(endpoint.connect_with_connector_lazy(connector))
}

/// Exports OTLP data to a collector over gRPC.
///
/// Exports are sent concurrently, each on the runtime the exporter was built for.
pub struct GrpcExporter {
    core: ExporterCore,
}

impl GrpcExporter {
    /// Creates a new builder for exporting `signal`.
    pub fn builder(signal: Signal) -> GrpcExporterBuilder {
        GrpcExporterBuilder::new(signal)
    }

    /// Returns the signal this exporter exports.
    pub fn signal(&self) -> Signal {
        self.core.signal()
    }

    /// Returns the collector endpoint.
    pub fn endpoint(&self) -> &str {
        self.core.endpoint()
    }

    /// Exports the request encoded by `marshaler`, which holds `item_count` items.
    ///
    /// The request is encoded before this returns. Sending it, and retrying it, happens in the background: the returned
    /// handle resolves once the export has succeeded or definitively failed. After [`shutdown`][Self::shutdown], the
    /// handle resolves as failed right away.
    pub fn export(&self, marshaler: &dyn Marshaler, item_count: usize) -> ExportHandle {
        self.core.export(marshaler, item_count)
    }

    /// Flushes pending exports.
    ///
    /// Exports are never buffered, so this always succeeds right away.
    pub fn flush(&self) -> ExportHandle {
        self.core.flush()
    }

    /// Shuts the exporter down.
    ///
    /// Exports already in flight are allowed to finish, but are no longer retried. Calling this more than once is
    /// harmless.
    pub fn shutdown(&self) -> ExportHandle {
        self.core.shutdown()
    }
}
