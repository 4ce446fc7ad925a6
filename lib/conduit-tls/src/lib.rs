//! Transport Layer Security (TLS) configuration and helpers.

use std::sync::{Arc, Mutex, OnceLock};

use conduit_error::{generic_error, ErrorContext as _, GenericError};
use rustls::{
    client::Resumption,
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer},
    ClientConfig, RootCertStore,
};
use tracing::debug;

/// Platform root certificate store, loaded the first time a configuration needs it.
static PLATFORM_ROOT_CERT_STORE_LOCK: Mutex<()> = Mutex::new(());
static PLATFORM_ROOT_CERT_STORE: OnceLock<Arc<RootCertStore>> = OnceLock::new();

const MAX_TLS12_RESUMPTION_SESSIONS: usize = 8;

/// A TLS client configuration builder.
///
/// Trust anchors are picked in the following order:
///
/// - an explicitly provided root certificate store (see [`with_root_cert_store`][Self::with_root_cert_store])
/// - trusted certificates provided in PEM form (see [`with_trusted_certificates_pem`][Self::with_trusted_certificates_pem])
/// - the platform's native certificate store, loaded on first use
///
/// When both an explicit store and PEM certificates are provided, the certificates are added to the explicit store.
///
/// PEM material is held as-is until [`build`][Self::build] is called, which is where all parsing and validation
/// happens.
#[derive(Clone, Default)]
pub struct ClientTLSConfigBuilder {
    root_cert_store: Option<RootCertStore>,
    trusted_certificates_pem: Option<Vec<u8>>,
    client_identity_pem: Option<(Vec<u8>, Vec<u8>)>,
}

impl ClientTLSConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root certificate store to use for the client.
    pub fn with_root_cert_store(mut self, store: RootCertStore) -> Self {
        self.root_cert_store = Some(store);
        self
    }

    /// Sets the trusted certificates, in PEM form, used to verify the server.
    ///
    /// The PEM data may hold any number of certificates, but must hold at least one.
    pub fn with_trusted_certificates_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.trusted_certificates_pem = Some(pem.into());
        self
    }

    /// Sets the client identity, in PEM form, presented to the server for mutual TLS.
    ///
    /// `private_key_pem` must hold a single PKCS#1, PKCS#8 or SEC1 private key, and `certificate_chain_pem` the
    /// certificate chain for that key, leaf first.
    pub fn with_client_identity_pem(
        mut self, private_key_pem: impl Into<Vec<u8>>, certificate_chain_pem: impl Into<Vec<u8>>,
    ) -> Self {
        self.client_identity_pem = Some((private_key_pem.into(), certificate_chain_pem.into()));
        self
    }

    /// Builds the client TLS configuration.
    ///
    /// ## Errors
    ///
    /// If the trusted certificates or client identity cannot be parsed, if the platform certificate store must be used
    /// and cannot be loaded, or if the resulting configuration is not FIPS compliant, an error will be returned.
    pub fn build(self) -> Result<ClientConfig, GenericError> {
        let root_cert_store = match (self.root_cert_store, self.trusted_certificates_pem) {
            (store, Some(pem)) => {
                let mut store = store.unwrap_or_else(RootCertStore::empty);
                for cert in parse_certificates_pem(&pem).error_context("Invalid trusted certificates.")? {
                    store
                        .add(cert)
                        .map_err(|e| generic_error!("Invalid trusted certificate: {}", e))?;
                }
                Arc::new(store)
            }
            (Some(store), None) => Arc::new(store),
            (None, None) => platform_root_cert_store()?,
        };

        let builder = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| generic_error!("Failed to select TLS protocol versions: {}", e))?
            .with_root_certificates(root_cert_store);

        let mut config = match self.client_identity_pem {
            Some((key_pem, chain_pem)) => {
                let key = parse_private_key_pem(&key_pem).error_context("Invalid client private key.")?;
                let chain = parse_certificates_pem(&chain_pem).error_context("Invalid client certificate.")?;
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|e| generic_error!("Invalid client identity: {}", e))?
            }
            None => builder.with_no_client_auth(),
        };

        config.resumption = Resumption::in_memory_sessions(MAX_TLS12_RESUMPTION_SESSIONS);

        #[cfg(feature = "fips")]
        if !config.fips() {
            return Err(generic_error!("Client TLS configuration is not FIPS compliant."));
        }

        Ok(config)
    }
}

/// Parses every certificate in the given PEM data.
///
/// Each certificate is checked to be well-formed X.509.
///
/// ## Errors
///
/// If the PEM data cannot be read, holds no certificates, or holds a certificate that is not valid X.509, an error
/// will be returned.
pub fn parse_certificates_pem(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, GenericError> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .error_context("Failed to read PEM data.")?;
    if certs.is_empty() {
        return Err(generic_error!("No certificates found in PEM data."));
    }

    // Parsing each certificate as a trust anchor is the cheapest way to check it is actual X.509 without dragging in
    // another parser.
    let mut scratch = RootCertStore::empty();
    for (idx, cert) in certs.iter().enumerate() {
        scratch
            .add(cert.clone())
            .map_err(|e| generic_error!("Certificate #{} is not valid X.509: {}", idx, e))?;
    }

    Ok(certs)
}

/// Parses the first private key in the given PEM data.
///
/// ## Errors
///
/// If the PEM data cannot be read or holds no private key, an error will be returned.
pub fn parse_private_key_pem(pem: &[u8]) -> Result<PrivateKeyDer<'static>, GenericError> {
    rustls_pemfile::private_key(&mut &pem[..])
        .error_context("Failed to read PEM data.")?
        .ok_or_else(|| generic_error!("No private key found in PEM data."))
}

fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn platform_root_cert_store() -> Result<Arc<RootCertStore>, GenericError> {
    let _guard = PLATFORM_ROOT_CERT_STORE_LOCK
        .lock()
        .map_err(|_| generic_error!("Platform root certificate store lock poisoned."))?;
    if let Some(store) = PLATFORM_ROOT_CERT_STORE.get() {
        return Ok(Arc::clone(store));
    }

    let store = Arc::new(load_native_root_cert_store()?);
    let _ = PLATFORM_ROOT_CERT_STORE.set(Arc::clone(&store));

    Ok(store)
}

fn load_native_root_cert_store() -> Result<RootCertStore, GenericError> {
    let mut root_cert_store = RootCertStore::empty();

    let result = rustls_native_certs::load_native_certs();
    if !result.errors.is_empty() {
        let joined_errors = result
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        return Err(generic_error!(
            "Failed to load certificates from platform's native certificate store: {}",
            joined_errors
        ));
    }

    let (added, failed) = root_cert_store.add_parsable_certificates(result.certs);
    if added == 0 {
        return Err(generic_error!(
            "Failed to add any certificates from the platform to the default root certificate store."
        ));
    }

    debug!(added, failed, "Loaded default root certificate store from platform.");

    Ok(root_cert_store)
}

#[cfg(test)]
mod tests {
    use rcgen::{generate_simple_self_signed, CertifiedKey};

    use super::*;

    fn self_signed() -> (String, String) {
        let CertifiedKey { cert, key_pair } = generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    #[test]
    fn trusted_certificates_and_identity() {
        let (cert_pem, key_pem) = self_signed();

        let config = ClientTLSConfigBuilder::new()
            .with_trusted_certificates_pem(cert_pem.clone())
            .with_client_identity_pem(key_pem, cert_pem)
            .build();
        let config = config.unwrap();
        assert!(config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn empty_store_without_material() {
        let config = ClientTLSConfigBuilder::new()
            .with_root_cert_store(RootCertStore::empty())
            .build()
            .unwrap();
        assert!(!config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn garbage_certificate_rejected() {
        let result = ClientTLSConfigBuilder::new()
            .with_trusted_certificates_pem("not a certificate")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn malformed_der_rejected() {
        // Valid PEM armor, but the payload is not a certificate.
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
        assert!(parse_certificates_pem(pem.as_bytes()).is_err());
    }

    #[test]
    fn missing_private_key_rejected() {
        let (cert_pem, _) = self_signed();
        let result = ClientTLSConfigBuilder::new()
            .with_root_cert_store(RootCertStore::empty())
            .with_client_identity_pem(cert_pem.clone(), cert_pem)
            .build();
        assert!(result.is_err());
    }
}
