//! Backend resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Claim (namespace, name, resource)
//!     → state.rs (TargetStateProvider: one read, no cache)
//!     → readiness gate (scheduled && ready, not completed)
//!     → address.rs (UrlResolver: identity → base URL)
//!     → BackendAddress
//! ```
//!
//! # Design Decisions
//! - No caching: a worker restart may move the address, so every request
//!   re-reads the record before acting on it
//! - No retries or polling; provider failures surface immediately
//! - Resolution has no side effects; resolving twice yields the same address

pub mod address;
pub mod kube;
pub mod state;

use std::sync::Arc;
use thiserror::Error;

use crate::token::GroupVersionResource;

pub use address::{BackendAddress, FixedUrlResolver, ServiceUrlResolver, UrlResolver};
pub use kube::KubeTargetStore;
pub use state::{
    MemoryTargetStore, PodPhase, StateError, TargetKey, TargetRecord, TargetStateProvider,
};

/// Why a target could not be resolved to a backend.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("target {0} not found")]
    NotFound(TargetKey),

    #[error("target {0} is not ready for upload")]
    NotReady(TargetKey),

    #[error("target {0} already completed its upload")]
    Completed(TargetKey),

    #[error("target {0} does not map to a valid backend address: {1}")]
    InvalidAddress(TargetKey, url::ParseError),

    #[error(transparent)]
    Provider(#[from] StateError),
}

/// Finds the worker currently serving a target.
#[derive(Clone)]
pub struct BackendResolver {
    provider: Arc<dyn TargetStateProvider>,
    urls: Arc<dyn UrlResolver>,
}

impl BackendResolver {
    pub fn new(provider: Arc<dyn TargetStateProvider>, urls: Arc<dyn UrlResolver>) -> Self {
        Self { provider, urls }
    }

    pub async fn resolve(
        &self,
        namespace: &str,
        name: &str,
        resource: &GroupVersionResource,
    ) -> Result<BackendAddress, ResolveError> {
        let key = TargetKey::new(namespace, name, resource.clone());

        let record = match self.provider.get(&key).await? {
            Some(record) => record,
            None => return Err(ResolveError::NotFound(key)),
        };

        if record.is_completed() {
            return Err(ResolveError::Completed(key));
        }
        if !record.is_scheduled() || !record.is_ready() {
            tracing::debug!(target_key = %key, record = ?record, "Target not ready");
            return Err(ResolveError::NotReady(key));
        }

        match self.urls.base_url(namespace, name) {
            Ok(url) => Ok(BackendAddress::new(url)),
            Err(e) => Err(ResolveError::InvalidAddress(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::{self, BoxFuture, FutureExt};

    fn pvc() -> GroupVersionResource {
        GroupVersionResource::persistent_volume_claims()
    }

    fn resolver_with(record: Option<TargetRecord>) -> BackendResolver {
        let store = MemoryTargetStore::new();
        if let Some(record) = record {
            store.insert(TargetKey::new("default", "testpvc", pvc()), record);
        }
        BackendResolver::new(
            Arc::new(store),
            Arc::new(ServiceUrlResolver::new("cdi-upload-", "svc", None)),
        )
    }

    #[tokio::test]
    async fn ready_target_resolves_to_service_address() {
        let resolver = resolver_with(Some(TargetRecord::ready()));
        let address = resolver.resolve("default", "testpvc", &pvc()).await.unwrap();
        assert_eq!(address.as_url().as_str(), "https://cdi-upload-testpvc.default.svc/");
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let resolver = resolver_with(Some(TargetRecord::ready()));
        let first = resolver.resolve("default", "testpvc", &pvc()).await.unwrap();
        let second = resolver.resolve("default", "testpvc", &pvc()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let resolver = resolver_with(None);
        let err = resolver.resolve("default", "testpvc", &pvc()).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn both_readiness_facts_are_required() {
        let unscheduled = TargetRecord {
            pod_phase: Some(PodPhase::Pending),
            pod_ready: true,
        };
        let unready = TargetRecord {
            pod_phase: Some(PodPhase::Running),
            pod_ready: false,
        };
        for record in [unscheduled, unready, TargetRecord::default()] {
            let err = resolver_with(Some(record))
                .resolve("default", "testpvc", &pvc())
                .await
                .unwrap_err();
            assert!(matches!(err, ResolveError::NotReady(_)));
        }
    }

    #[tokio::test]
    async fn completed_upload_is_refused() {
        let record = TargetRecord {
            pod_phase: Some(PodPhase::Succeeded),
            pod_ready: false,
        };
        let err = resolver_with(Some(record))
            .resolve("default", "testpvc", &pvc())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Completed(_)));
    }

    #[tokio::test]
    async fn hostile_name_is_an_invalid_address() {
        let name = "x@other.host/";
        let store = MemoryTargetStore::new();
        store.insert(TargetKey::new("default", name, pvc()), TargetRecord::ready());
        let resolver = BackendResolver::new(
            Arc::new(store),
            Arc::new(ServiceUrlResolver::new("cdi-upload-", "svc", None)),
        );

        let err = resolver.resolve("default", name, &pvc()).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidAddress(..)));
    }

    struct Unavailable;

    impl TargetStateProvider for Unavailable {
        fn get<'a>(
            &'a self,
            _key: &'a TargetKey,
        ) -> BoxFuture<'a, Result<Option<TargetRecord>, StateError>> {
            future::ready(Err(StateError::Status(503))).boxed()
        }
    }

    #[tokio::test]
    async fn provider_failure_surfaces() {
        let resolver = BackendResolver::new(
            Arc::new(Unavailable),
            Arc::new(ServiceUrlResolver::new("cdi-upload-", "svc", None)),
        );
        let err = resolver.resolve("default", "testpvc", &pvc()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Provider(StateError::Status(503))));
    }
}
