use std::time::Duration;

use conduit_metrics::MeterProvider;
use conduit_tls::ClientTLSConfigBuilder;
use http::{HeaderName, HeaderValue, Uri};
use rustls::{ClientConfig, RootCertStore};
use tokio::runtime::Handle;
use url::Url;

use crate::{
    compression::Compression,
    error::BuildError,
    metrics::{ComponentInfo, ExporterMetrics, ExporterProtocol, MetricsSchema},
    retry::RetryPolicy,
    Signal,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every exporter builder, as they were given.
///
/// Nothing is checked until [`validate`][Self::validate] is called from the builder's `build()`.
#[derive(Clone)]
pub(crate) struct ExporterSettings {
    pub(crate) endpoint: String,
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) compression: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) trusted_certificates_pem: Option<Vec<u8>>,
    pub(crate) client_identity_pem: Option<(Vec<u8>, Vec<u8>)>,
    pub(crate) retry_policy: Option<RetryPolicy>,
    pub(crate) meter_provider: MeterProvider,
    pub(crate) metrics_schema: MetricsSchema,
    pub(crate) runtime: Option<Handle>,
}

impl ExporterSettings {
    pub(crate) fn new(default_endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: default_endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            compression: Compression::None.as_str().to_string(),
            headers: Vec::new(),
            trusted_certificates_pem: None,
            client_identity_pem: None,
            retry_policy: None,
            meter_provider: MeterProvider::noop(),
            metrics_schema: MetricsSchema::default(),
            runtime: None,
        }
    }

    /// Validates every setting, producing the configuration the exporter is built from.
    pub(crate) fn validate(&self) -> Result<ValidatedSettings, BuildError> {
        let (endpoint, uri) = parse_endpoint(&self.endpoint)?;
        let compression = self.compression.parse::<Compression>()?;
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| parse_header(name, value))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(policy) = &self.retry_policy {
            policy.validate()?;
        }
        let tls_config = self.build_tls_config(&endpoint)?;
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };

        Ok(ValidatedSettings {
            endpoint,
            uri,
            timeout: (!self.timeout.is_zero()).then_some(self.timeout),
            connect_timeout: self.connect_timeout,
            compression,
            headers,
            tls_config,
            retry_policy: self.retry_policy,
            meter_provider: self.meter_provider.clone(),
            metrics_schema: self.metrics_schema,
            runtime,
        })
    }

    fn build_tls_config(&self, endpoint: &Url) -> Result<ClientConfig, BuildError> {
        let mut builder = ClientTLSConfigBuilder::new();
        if let Some(pem) = &self.trusted_certificates_pem {
            builder = builder.with_trusted_certificates_pem(pem.clone());
        }
        if let Some((key_pem, chain_pem)) = &self.client_identity_pem {
            builder = builder.with_client_identity_pem(key_pem.clone(), chain_pem.clone());
        }

        // Plaintext endpoints never verify a server, so there is no reason to go looking for the platform's roots.
        if endpoint.scheme() == "http" && self.trusted_certificates_pem.is_none() {
            builder = builder.with_root_cert_store(RootCertStore::empty());
        }

        builder.build().map_err(|source| BuildError::InvalidTls { source })
    }
}

/// Exporter settings that passed validation.
pub(crate) struct ValidatedSettings {
    pub(crate) endpoint: Url,
    pub(crate) uri: Uri,
    pub(crate) timeout: Option<Duration>,
    pub(crate) connect_timeout: Duration,
    pub(crate) compression: Compression,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) tls_config: ClientConfig,
    pub(crate) retry_policy: Option<RetryPolicy>,
    pub(crate) meter_provider: MeterProvider,
    pub(crate) metrics_schema: MetricsSchema,
    pub(crate) runtime: Handle,
}

impl ValidatedSettings {
    /// Creates the exporter metrics for an exporter of `signal` over `protocol` to the configured endpoint.
    pub(crate) fn exporter_metrics(&self, signal: Signal, protocol: ExporterProtocol) -> ExporterMetrics {
        let mut component = ComponentInfo::new(signal, protocol);
        if let (Some(host), Some(port)) = (self.endpoint.host_str(), self.endpoint.port_or_known_default()) {
            component = component.with_server(host, port);
        }
        ExporterMetrics::new(self.metrics_schema, self.meter_provider.clone(), component)
    }

    /// Returns the URI of the endpoint with `path` appended to its own path.
    pub(crate) fn uri_with_path(&self, path: &str) -> Result<Uri, BuildError> {
        let joined = format!("{}{}", self.endpoint.as_str().trim_end_matches('/'), path);
        joined.parse::<Uri>().map_err(|e| BuildError::InvalidEndpoint {
            endpoint: joined.clone(),
            reason: e.to_string(),
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<(Url, Uri), BuildError> {
    let url = Url::parse(endpoint).map_err(|e| BuildError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(BuildError::UnsupportedScheme {
                endpoint: endpoint.to_string(),
                scheme: scheme.to_string(),
            })
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(BuildError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "missing host".to_string(),
        });
    }

    let uri = url.as_str().parse::<Uri>().map_err(|e| BuildError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    Ok((url, uri))
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), BuildError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| BuildError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| BuildError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((header_name, header_value))
}

/// Generates the setters for [`ExporterSettings`] on a builder with a `settings` field.
macro_rules! exporter_settings_methods {
    () => {
        /// Sets the collector endpoint.
        ///
        /// The endpoint must be an absolute `http` or `https` URL. `https` endpoints are connected to over TLS.
        pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
            self.settings.endpoint = endpoint.into();
            self
        }

        /// Sets the maximum time a single export attempt may take.
        ///
        /// Zero disables the timeout. Defaults to 10 seconds.
        pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
            self.settings.timeout = timeout;
            self
        }

        /// Sets the maximum time establishing a connection may take.
        ///
        /// Defaults to 10 seconds.
        pub fn with_connect_timeout(mut self, timeout: std::time::Duration) -> Self {
            self.settings.connect_timeout = timeout;
            self
        }

        /// Sets the compression method, either `gzip` or `none`.
        ///
        /// Defaults to `none`.
        pub fn with_compression(mut self, method: impl Into<String>) -> Self {
            self.settings.compression = method.into();
            self
        }

        /// Adds a header sent with every export request.
        ///
        /// Headers are sent in the order they were added, and adding the same name twice sends both values.
        pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.settings.headers.push((name.into(), value.into()));
            self
        }

        /// Sets the certificates, in PEM form, trusted to verify the collector.
        ///
        /// When unset, the platform's root certificates are trusted.
        pub fn with_trusted_certificates_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
            self.settings.trusted_certificates_pem = Some(pem.into());
            self
        }

        /// Sets the client private key and certificate chain, in PEM form, presented to the collector.
        pub fn with_client_identity_pem(
            mut self, private_key_pem: impl Into<Vec<u8>>, certificate_chain_pem: impl Into<Vec<u8>>,
        ) -> Self {
            self.settings.client_identity_pem = Some((private_key_pem.into(), certificate_chain_pem.into()));
            self
        }

        /// Sets the retry policy for failed exports.
        ///
        /// Without a retry policy, every export is attempted exactly once.
        pub fn with_retry_policy(mut self, policy: crate::RetryPolicy) -> Self {
            self.settings.retry_policy = Some(policy);
            self
        }

        /// Removes any retry policy set earlier, so every export is attempted exactly once.
        pub fn without_retry(mut self) -> Self {
            self.settings.retry_policy = None;
            self
        }

        /// Sets the meter provider that exporter metrics are registered with.
        pub fn with_meter_provider(mut self, provider: conduit_metrics::MeterProvider) -> Self {
            self.settings.meter_provider = provider;
            self
        }

        /// Sets which exporter metrics are emitted.
        pub fn with_metrics_schema(mut self, schema: crate::MetricsSchema) -> Self {
            self.settings.metrics_schema = schema;
            self
        }

        /// Sets the runtime that exports run on.
        ///
        /// Defaults to the runtime `build()` is called from.
        pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
            self.settings.runtime = Some(runtime);
            self
        }
    };
}

pub(crate) use exporter_settings_methods;
