//! OTLP/HTTP exporter.

use conduit_marshal::Marshaler;
use tracing::debug;

use crate::{
    builder::{exporter_settings_methods, ExporterSettings},
    error::BuildError,
    exporter::{ExportHandle, ExporterCore},
    metrics::ExporterProtocol,
    transport::{build_http_client, build_https_connector, HttpTransport, HttpVersions, OtlpHttpEncoding},
    Signal,
};

const DEFAULT_BASE_ENDPOINT: &str = "http://localhost:4318";

/// Builder for [`HttpExporter`].
///
/// Settings are only checked by [`build`][Self::build], which reports the first invalid one.
pub struct HttpExporterBuilder {
    signal: Signal,
    settings: ExporterSettings,
    encoding: OtlpHttpEncoding,
}

impl HttpExporterBuilder {
    /// Creates a new `HttpExporterBuilder` for exporting `signal` to the signal's path on `http://localhost:4318`.
    pub fn new(signal: Signal) -> Self {
        let endpoint = format!("{}{}", DEFAULT_BASE_ENDPOINT, signal.http_path());
        Self::from_settings(signal, ExporterSettings::new(endpoint))
    }

    pub(crate) fn from_settings(signal: Signal, settings: ExporterSettings) -> Self {
        Self {
            signal,
            settings,
            encoding: OtlpHttpEncoding::default(),
        }
    }

    exporter_settings_methods!();

    /// Sets the body encoding.
    ///
    /// Defaults to binary protobuf.
    pub fn with_encoding(mut self, encoding: OtlpHttpEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Builds the exporter.
    ///
    /// The endpoint is used as-is, and must include the signal's path, such as `/v1/traces`.
    ///
    /// ## Errors
    ///
    /// If any setting is invalid, or if no runtime was given and this is not called from within one, an error will be
    /// returned.
    pub fn build(self) -> Result<HttpExporter, BuildError> {
        let settings = self.settings.validate()?;
        let signal = self.signal;
        let protocol = match self.encoding {
            OtlpHttpEncoding::Protobuf => ExporterProtocol::HttpProtobuf,
            OtlpHttpEncoding::Json => ExporterProtocol::HttpJson,
        };

        let connector = build_https_connector(settings.tls_config.clone(), settings.connect_timeout, HttpVersions::All);
        let transport = HttpTransport::new(
            build_http_client(connector),
            settings.uri.clone(),
            self.encoding,
            settings.compression,
            &settings.headers,
            settings.timeout,
        );
        let core = ExporterCore::new(signal, protocol, settings, transport);

        debug!(%signal, endpoint = core.endpoint(), encoding = ?self.encoding, "Built OTLP/HTTP exporter.");

        Ok(HttpExporter { core })
    }
}

/// Exports OTLP data to a collector over HTTP.
pub struct HttpExporter {
    core: ExporterCore,
}

impl HttpExporter {
    /// Creates a new builder for exporting `signal`.
    pub fn builder(signal: Signal) -> HttpExporterBuilder {
        HttpExporterBuilder::new(signal)
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
    /// See [`GrpcExporter::export`][crate::GrpcExporter::export].
    pub fn export(&self, marshaler: &dyn Marshaler, item_count: usize) -> ExportHandle {
        self.core.export(marshaler, item_count)
    }

    /// Flushes pending exports, which always succeeds right away.
    pub fn flush(&self) -> ExportHandle {
        self.core.flush()
    }

    /// Shuts the exporter down. Calling this more than once is harmless.
    pub fn shutdown(&self) -> ExportHandle {
        self.core.shutdown()
    }
}
