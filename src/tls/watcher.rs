//! Credential file watcher for hot rotation.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::tls::manager::TlsClientManager;

/// Rotates the backend client whenever a credential file changes.
pub struct CredentialWatcher {
    paths: Vec<PathBuf>,
    manager: Arc<TlsClientManager>,
}

impl CredentialWatcher {
    pub fn new(paths: Vec<PathBuf>, manager: Arc<TlsClientManager>) -> Self {
        Self { paths, manager }
    }

    /// Directories to watch. Mounted secrets are replaced by swapping a
    /// symlink in the parent directory, so the files themselves are not watched.
    fn watch_dirs(&self) -> BTreeSet<PathBuf> {
        self.paths
            .iter()
            .map(|p| match p.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            })
            .collect()
    }

    /// Start watching in a background thread. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let manager = self.manager.clone();
        let dirs = self.watch_dirs();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!(paths = ?event.paths, "Credential change detected, rotating backend client");
                        // Errors are logged by the manager; the old generation keeps serving.
                        let _ = manager.rotate();
                    }
                }
                Err(e) => tracing::error!("Credential watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for dir in &dirs {
            watcher.watch(Path::new(dir), RecursiveMode::NonRecursive)?;
        }

        tracing::info!(dirs = ?dirs, "Credential watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::client::{ClientCreator, TlsError};

    struct Plain;

    impl ClientCreator for Plain {
        fn create_client(&self) -> Result<reqwest::Client, TlsError> {
            Ok(reqwest::Client::new())
        }
    }

    #[test]
    fn watches_each_parent_once() {
        let manager = Arc::new(TlsClientManager::new(Arc::new(Plain)).unwrap());
        let watcher = CredentialWatcher::new(
            vec![
                PathBuf::from("/etc/upload-proxy/client/tls.crt"),
                PathBuf::from("/etc/upload-proxy/client/tls.key"),
                PathBuf::from("/etc/upload-proxy/ca/ca.crt"),
                PathBuf::from("bundle.pem"),
            ],
            manager,
        );
        let expected: BTreeSet<PathBuf> = [".", "/etc/upload-proxy/ca", "/etc/upload-proxy/client"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(watcher.watch_dirs(), expected);
    }

    #[tokio::test]
    async fn file_change_triggers_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.crt");
        std::fs::write(&cert, b"v1").unwrap();

        let manager = Arc::new(TlsClientManager::new(Arc::new(Plain)).unwrap());
        let _watcher = CredentialWatcher::new(vec![cert.clone()], manager.clone())
            .run()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(&cert, b"v2").unwrap();

        let mut rotated = false;
        for _ in 0..50 {
            if manager.current().generation() > 1 {
                rotated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(rotated, "watcher should rotate after a credential change");
    }
}
