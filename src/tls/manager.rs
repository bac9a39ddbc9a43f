//! Client generations and rotation.
//!
//! A generation is an immutable snapshot: one client built from one credential
//! set. Requests take an `Arc` to the current generation and keep it until they
//! finish, so a rotation never affects a request already in flight.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::observability::metrics;
use crate::tls::client::{ClientCreator, TlsError};

/// One credential generation's client.
#[derive(Debug)]
pub struct ClientGeneration {
    generation: u64,
    client: reqwest::Client,
}

impl ClientGeneration {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Owns the backend client and swaps it atomically on rotation.
pub struct TlsClientManager {
    creator: Arc<dyn ClientCreator>,
    current: ArcSwap<ClientGeneration>,
    next_generation: AtomicU64,
    rotating: Mutex<()>,
}

impl TlsClientManager {
    /// Build the first generation. Failure here is fatal to startup.
    pub fn new(creator: Arc<dyn ClientCreator>) -> Result<Self, TlsError> {
        let client = creator.create_client()?;
        tracing::info!(generation = 1, "Backend TLS client created");

        Ok(Self {
            creator,
            current: ArcSwap::from_pointee(ClientGeneration {
                generation: 1,
                client,
            }),
            next_generation: AtomicU64::new(2),
            rotating: Mutex::new(()),
        })
    }

    /// Snapshot of the current generation.
    pub fn current(&self) -> Arc<ClientGeneration> {
        self.current.load_full()
    }

    /// Rebuild the client from freshly fetched credentials and swap it in.
    ///
    /// On failure the previous generation stays current.
    pub fn rotate(&self) -> Result<u64, TlsError> {
        let _guard = self
            .rotating
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.creator.create_client() {
            Ok(client) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                self.current
                    .store(Arc::new(ClientGeneration { generation, client }));
                metrics::record_tls_rotation(true);
                tracing::info!(generation, "Backend TLS client rotated");
                Ok(generation)
            }
            Err(e) => {
                metrics::record_tls_rotation(false);
                tracing::error!(
                    error = %e,
                    generation = self.current.load().generation,
                    "Backend TLS rotation failed, keeping current client"
                );
                Err(e)
            }
        }
    }
}
