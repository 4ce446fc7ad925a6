use std::time::Duration;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;

/// HTTP versions a connector negotiates over TLS.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpVersions {
    /// HTTP/2 only, as gRPC requires.
    Http2Only,

    /// HTTP/1.1 or HTTP/2, whichever the server prefers.
    All,
}

/// Builds a connector that speaks plaintext for `http://` URIs and TLS for `https://` URIs.
pub fn build_https_connector(
    tls_config: ClientConfig, connect_timeout: Duration, versions: HttpVersions,
) -> HttpsConnector<HttpConnector> {
    // Create the HTTP connector, and ensure that we don't enforce _only_ HTTP, since that will break being able to
    // wrap this in an HTTPS connector.
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(connect_timeout));
    http_connector.set_nodelay(true);
    http_connector.enforce_http(false);

    let builder = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http();

    match versions {
        HttpVersions::Http2Only => builder.enable_http2().wrap_connector(http_connector),
        HttpVersions::All => builder.enable_all_versions().wrap_connector(http_connector),
    }
}
