use std::{fmt, io, str::FromStr};

use async_compression::tokio::{bufread::GzipDecoder, write::GzipEncoder};
use bytes::Bytes;
use http::HeaderValue;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

use crate::error::BuildError;

pub(crate) const SUPPORTED_COMPRESSION: &[&str] = &["gzip", "none"];

static ENCODING_GZIP: HeaderValue = HeaderValue::from_static("gzip");

/// Compression applied to export request bodies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Compression {
    /// No compression.
    #[default]
    None,

    /// Gzip.
    Gzip,
}

impl Compression {
    /// Returns the name of the compression method.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
        }
    }

    /// Returns the value for the `grpc-encoding` or `Content-Encoding` header, if any.
    pub fn encoding_header(&self) -> Option<HeaderValue> {
        match self {
            Self::None => None,
            Self::Gzip => Some(ENCODING_GZIP.clone()),
        }
    }

    /// Compresses `data`.
    ///
    /// ## Errors
    ///
    /// If the compressor fails, an error will be returned.
    pub async fn compress(&self, data: Bytes) -> io::Result<Bytes> {
        match self {
            Self::None => Ok(data),
            Self::Gzip => {
                let mut encoder = GzipEncoder::new(Vec::with_capacity(data.len() / 2));
                encoder.write_all(&data).await?;
                encoder.shutdown().await?;
                Ok(Bytes::from(encoder.into_inner()))
            }
        }
    }
}

/// Decompresses a gzip stream.
///
/// ## Errors
///
/// If `data` is not a valid gzip stream, an error will be returned.
pub async fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzipDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).await?;
    Ok(out)
}

impl FromStr for Compression {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "none" | "" => Ok(Self::None),
            _ => Err(BuildError::UnsupportedCompression {
                method: s.to_string(),
                supported: SUPPORTED_COMPRESSION,
            }),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("GZIP".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);

        let error = "brotli".parse::<Compression>().unwrap_err();
        assert!(error.to_string().contains("supported compression methods include: gzip, none"));
    }

    #[tokio::test]
    async fn gzip_round_trip() {
        let payload = Bytes::from_static(b"the quick brown fox jumps over the lazy dog, repeatedly and repeatedly");
        let compressed = Compression::Gzip.compress(payload.clone()).await.unwrap();
        assert_ne!(compressed, payload);
        assert_eq!(gunzip(&compressed).await.unwrap(), payload.to_vec());

        let passthrough = Compression::None.compress(payload.clone()).await.unwrap();
        assert_eq!(passthrough, payload);
    }
}
