//! Exporter configuration.
//!
//! Reads the standard OTLP exporter settings from a [`GenericConfiguration`]. Loaded with the `OTEL_EXPORTER_OTLP`
//! environment prefix, the keys read here line up with the usual `OTEL_EXPORTER_OTLP_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use conduit_config::GenericConfiguration;
use conduit_error::{generic_error, ErrorContext as _, GenericError};
use url::form_urlencoded;

use crate::{
    builder::ExporterSettings,
    error::BuildError,
    grpc_exporter::GrpcExporterBuilder,
    http_exporter::HttpExporterBuilder,
    metrics::{ExporterProtocol, MetricsSchema},
    retry::RetryPolicy,
    transport::OtlpHttpEncoding,
    Signal,
};

const DEFAULT_GRPC_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_HTTP_ENDPOINT: &str = "http://localhost:4318";

/// Exporter configuration.
///
/// Values are only read here. Everything is validated when the exporter is built from the builder this converts into.
#[derive(Clone, Debug, Default)]
pub struct ExporterConfiguration {
    endpoint: Option<String>,
    protocol: ExporterProtocol,
    timeout: Option<Duration>,
    compression: Option<String>,
    headers: Vec<(String, String)>,
    certificate: Option<PathBuf>,
    client_key: Option<PathBuf>,
    client_certificate: Option<PathBuf>,
    retry_policy: Option<RetryPolicy>,
    metrics_schema: MetricsSchema,
}

impl ExporterConfiguration {
    /// Creates a new `ExporterConfiguration` from the given configuration.
    ///
    /// ## Errors
    ///
    /// If a value has the wrong type, if the timeout is negative, if the headers are malformed, or if the retry
    /// settings are out of range, an error will be returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let timeout = match config.try_get_typed::<i64>("timeout")? {
            Some(millis) if millis < 0 => {
                return Err(BuildError::InvalidTimeout {
                    value: format!("{}ms", millis),
                }
                .into())
            }
            Some(millis) => Some(Duration::from_millis(millis.unsigned_abs())),
            None => None,
        };

        let headers = match config.try_get_typed::<String>("headers")? {
            Some(headers) => parse_headers(&headers)?,
            None => Vec::new(),
        };

        Ok(Self {
            endpoint: config.try_get_typed("endpoint")?,
            protocol: config.try_get_typed("protocol")?.unwrap_or_default(),
            timeout,
            compression: config.try_get_typed("compression")?,
            headers,
            certificate: config.try_get_typed("certificate")?,
            client_key: config.try_get_typed("client_key")?,
            client_certificate: config.try_get_typed("client_certificate")?,
            retry_policy: retry_policy_from_configuration(config)?,
            metrics_schema: config.try_get_typed("metrics_schema")?.unwrap_or_default(),
        })
    }

    /// Returns the configured protocol.
    pub fn protocol(&self) -> ExporterProtocol {
        self.protocol
    }

    fn settings(&self, endpoint: String) -> Result<ExporterSettings, GenericError> {
        let mut settings = ExporterSettings::new(endpoint);
        if let Some(timeout) = self.timeout {
            settings.timeout = timeout;
        }
        if let Some(compression) = &self.compression {
            settings.compression = compression.clone();
        }
        settings.headers = self.headers.clone();
        settings.retry_policy = self.retry_policy;
        settings.metrics_schema = self.metrics_schema;

        if let Some(path) = &self.certificate {
            settings.trusted_certificates_pem = Some(read_pem(path)?);
        }
        match (&self.client_key, &self.client_certificate) {
            (Some(key), Some(chain)) => settings.client_identity_pem = Some((read_pem(key)?, read_pem(chain)?)),
            (None, None) => {}
            _ => {
                return Err(generic_error!(
                    "Both `client_key` and `client_certificate` must be set to use a client identity."
                ))
            }
        }

        Ok(settings)
    }

    /// Converts the configuration into a gRPC exporter builder for `signal`.
    ///
    /// The endpoint defaults to `http://localhost:4317`.
    ///
    /// ## Errors
    ///
    /// If the certificate or key files cannot be read, an error will be returned.
    pub fn into_grpc_builder(self, signal: Signal) -> Result<GrpcExporterBuilder, GenericError> {
        let endpoint = self
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_GRPC_ENDPOINT.to_string());
        Ok(GrpcExporterBuilder::from_settings(signal, self.settings(endpoint)?))
    }

    /// Converts the configuration into an OTLP/HTTP exporter builder for `signal`.
    ///
    /// The signal's path, such as `/v1/traces`, is appended to the endpoint, which defaults to `http://localhost:4318`.
    /// The body encoding follows the configured protocol, with anything other than `http/json` meaning protobuf.
    ///
    /// ## Errors
    ///
    /// If the certificate or key files cannot be read, an error will be returned.
    pub fn into_http_builder(self, signal: Signal) -> Result<HttpExporterBuilder, GenericError> {
        let base = self.endpoint.as_deref().unwrap_or(DEFAULT_HTTP_ENDPOINT);
        let endpoint = format!("{}{}", base.trim_end_matches('/'), signal.http_path());
        let encoding = match self.protocol {
            ExporterProtocol::HttpJson => OtlpHttpEncoding::Json,
            ExporterProtocol::Grpc | ExporterProtocol::HttpProtobuf => OtlpHttpEncoding::Protobuf,
        };
        Ok(HttpExporterBuilder::from_settings(signal, self.settings(endpoint)?).with_encoding(encoding))
    }
}

fn retry_policy_from_configuration(config: &GenericConfiguration) -> Result<Option<RetryPolicy>, GenericError> {
    if !config.try_get_typed::<bool>("retry.enabled")?.unwrap_or(true) {
        return Ok(None);
    }

    let mut builder = RetryPolicy::builder();
    if let Some(max_attempts) = config.try_get_typed::<u32>("retry.max_attempts")? {
        builder = builder.max_attempts(max_attempts);
    }
    if let Some(millis) = config.try_get_typed::<u64>("retry.initial_backoff")? {
        builder = builder.initial_backoff(Duration::from_millis(millis));
    }
    if let Some(millis) = config.try_get_typed::<u64>("retry.max_backoff")? {
        builder = builder.max_backoff(Duration::from_millis(millis));
    }
    if let Some(multiplier) = config.try_get_typed::<f64>("retry.backoff_multiplier")? {
        builder = builder.backoff_multiplier(multiplier);
    }
    if let Some(jitter) = config.try_get_typed::<f64>("retry.jitter")? {
        builder = builder.jitter(jitter);
    }

    Ok(Some(builder.build()?))
}

/// Parses headers in the `key1=value1,key2=value2` form, with percent-encoded values.
fn parse_headers(raw: &str) -> Result<Vec<(String, String)>, GenericError> {
    let mut headers = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let Some((name, value)) = entry.split_once('=') else {
            return Err(generic_error!("Invalid header '{}': expected `name=value`.", entry));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(generic_error!("Invalid header '{}': name is empty.", entry));
        }

        let value = form_urlencoded::parse(format!("v={}", value.trim()).as_bytes())
            .next()
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        headers.push((name.to_string(), value));
    }
    Ok(headers)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, GenericError> {
    fs::read(path).with_error_context(|| format!("Failed to read PEM file '{}'.", path.display()))
}
