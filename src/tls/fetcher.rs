//! Credential fetchers.
//!
//! The client manager only sees PEM bytes; where they are stored is up to the
//! fetcher. Files are re-read on every fetch so rotation picks up new content.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} is empty")]
    Empty(&'static str),
}

/// Source of the client certificate chain and its private key.
pub trait CertFetcher: Send + Sync {
    fn cert_bytes(&self) -> Result<Vec<u8>, FetchError>;
    fn key_bytes(&self) -> Result<Vec<u8>, FetchError>;
}

/// Source of the trusted CA bundle.
pub trait CertBundleFetcher: Send + Sync {
    fn bundle_bytes(&self) -> Result<Vec<u8>, FetchError>;
}

fn read_non_empty(path: &Path, what: &'static str) -> Result<Vec<u8>, FetchError> {
    let bytes = fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(FetchError::Empty(what));
    }
    Ok(bytes)
}

#[derive(Debug, Clone)]
pub struct FileCertFetcher {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl FileCertFetcher {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

impl CertFetcher for FileCertFetcher {
    fn cert_bytes(&self) -> Result<Vec<u8>, FetchError> {
        read_non_empty(&self.cert_path, "client certificate")
    }

    fn key_bytes(&self) -> Result<Vec<u8>, FetchError> {
        read_non_empty(&self.key_path, "client key")
    }
}

#[derive(Debug, Clone)]
pub struct FileCertBundleFetcher {
    pub path: PathBuf,
}

impl FileCertBundleFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CertBundleFetcher for FileCertBundleFetcher {
    fn bundle_bytes(&self) -> Result<Vec<u8>, FetchError> {
        read_non_empty(&self.path, "CA bundle")
    }
}

/// In-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct MemCertFetcher {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl CertFetcher for MemCertFetcher {
    fn cert_bytes(&self) -> Result<Vec<u8>, FetchError> {
        if self.cert.is_empty() {
            return Err(FetchError::Empty("client certificate"));
        }
        Ok(self.cert.clone())
    }

    fn key_bytes(&self) -> Result<Vec<u8>, FetchError> {
        if self.key.is_empty() {
            return Err(FetchError::Empty("client key"));
        }
        Ok(self.key.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemCertBundleFetcher {
    pub bundle: Vec<u8>,
}

impl CertBundleFetcher for MemCertBundleFetcher {
    fn bundle_bytes(&self) -> Result<Vec<u8>, FetchError> {
        if self.bundle.is_empty() {
            return Err(FetchError::Empty("CA bundle"));
        }
        Ok(self.bundle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_fetcher_reads_current_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"first").unwrap();
        let fetcher = FileCertBundleFetcher::new(file.path());
        assert_eq!(fetcher.bundle_bytes().unwrap(), b"first");

        fs::write(file.path(), b"second").unwrap();
        assert_eq!(fetcher.bundle_bytes().unwrap(), b"second");
    }

    #[test]
    fn missing_and_empty_files_fail() {
        let fetcher = FileCertFetcher::new("/nonexistent/tls.crt", "/nonexistent/tls.key");
        assert!(matches!(fetcher.cert_bytes(), Err(FetchError::Io { .. })));

        let empty = tempfile::NamedTempFile::new().unwrap();
        let fetcher = FileCertBundleFetcher::new(empty.path());
        assert!(matches!(fetcher.bundle_bytes(), Err(FetchError::Empty("CA bundle"))));
    }

    #[test]
    fn mem_fetcher_rejects_empty() {
        let fetcher = MemCertFetcher {
            cert: b"cert".to_vec(),
            key: Vec::new(),
        };
        assert!(fetcher.cert_bytes().is_ok());
        assert!(matches!(fetcher.key_bytes(), Err(FetchError::Empty("client key"))));
    }
}
