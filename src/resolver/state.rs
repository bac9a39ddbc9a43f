//! Target readiness state.
//!
//! # Responsibilities
//! - Describe what the resolver needs to know about a target object
//! - Abstract the external store that holds it
//! - Provide an in-memory store for static deployments and tests
//!
//! # Design Decisions
//! - Readiness is read from the worker annotations on the target object
//! - A provider answers `Ok(None)` for a missing object; errors are reserved
//!   for the provider itself being unavailable

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::token::GroupVersionResource;

/// Annotation carrying the worker pod phase.
pub const ANN_POD_PHASE: &str = "cdi.kubevirt.io/storage.pod.phase";

/// Annotation carrying the worker pod readiness.
pub const ANN_POD_READY: &str = "cdi.kubevirt.io/storage.pod.ready";

/// Identity of a target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub namespace: String,
    pub name: String,
    pub resource: GroupVersionResource,
}

impl TargetKey {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        resource: GroupVersionResource,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            resource,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.resource, self.namespace, self.name)
    }
}

/// Lifecycle phase of the worker pod backing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Unrecognized values map to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// Readiness facts about an existing target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRecord {
    pub pod_phase: Option<PodPhase>,
    pub pod_ready: bool,
}

impl TargetRecord {
    /// A target whose worker is scheduled and accepting traffic.
    pub fn ready() -> Self {
        Self {
            pod_phase: Some(PodPhase::Running),
            pod_ready: true,
        }
    }

    pub fn from_annotations(annotations: &HashMap<String, String>) -> Self {
        Self {
            pod_phase: annotations.get(ANN_POD_PHASE).map(|v| PodPhase::parse(v)),
            pod_ready: annotations
                .get(ANN_POD_READY)
                .and_then(|v| v.trim().parse::<bool>().ok())
                .unwrap_or(false),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.pod_phase == Some(PodPhase::Running)
    }

    pub fn is_ready(&self) -> bool {
        self.pod_ready
    }

    /// The worker already finished receiving this target's image.
    pub fn is_completed(&self) -> bool {
        self.pod_phase == Some(PodPhase::Succeeded)
    }
}

/// Failures of the state provider itself.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("state provider answered with status {0}")]
    Status(u16),

    #[error("failed to read state provider credentials: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid state provider url: {0}")]
    Url(String),
}

/// Read-only view of target objects and their readiness.
pub trait TargetStateProvider: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a TargetKey,
    ) -> BoxFuture<'a, Result<Option<TargetRecord>, StateError>>;
}

/// Target records held in memory.
#[derive(Debug, Default)]
pub struct MemoryTargetStore {
    records: DashMap<TargetKey, TargetRecord>,
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: TargetKey, record: TargetRecord) {
        self.records.insert(key, record);
    }

    pub fn remove(&self, key: &TargetKey) -> Option<TargetRecord> {
        self.records.remove(key).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TargetStateProvider for MemoryTargetStore {
    fn get<'a>(
        &'a self,
        key: &'a TargetKey,
    ) -> BoxFuture<'a, Result<Option<TargetRecord>, StateError>> {
        let record = self.records.get(key).map(|entry| entry.value().clone());
        future::ready(Ok(record)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn record_from_annotations() {
        let record = TargetRecord::from_annotations(&annotations(&[
            (ANN_POD_PHASE, "Running"),
            (ANN_POD_READY, "true"),
        ]));
        assert!(record.is_scheduled());
        assert!(record.is_ready());
        assert!(!record.is_completed());
    }

    #[test]
    fn missing_or_garbled_annotations_are_not_ready() {
        let record = TargetRecord::from_annotations(&HashMap::new());
        assert!(!record.is_scheduled());
        assert!(!record.is_ready());

        let record = TargetRecord::from_annotations(&annotations(&[
            (ANN_POD_PHASE, "Bogus"),
            (ANN_POD_READY, "yes"),
        ]));
        assert_eq!(record.pod_phase, Some(PodPhase::Unknown));
        assert!(!record.is_ready());
    }

    #[test]
    fn succeeded_phase_is_completed() {
        let record = TargetRecord::from_annotations(&annotations(&[(ANN_POD_PHASE, "Succeeded")]));
        assert!(record.is_completed());
        assert!(!record.is_scheduled());
    }

    #[tokio::test]
    async fn memory_store_lookup() {
        let store = MemoryTargetStore::new();
        let key = TargetKey::new("default", "testpvc", GroupVersionResource::persistent_volume_claims());
        assert!(store.get(&key).await.unwrap().is_none());

        store.insert(key.clone(), TargetRecord::ready());
        assert_eq!(store.get(&key).await.unwrap(), Some(TargetRecord::ready()));
        assert_eq!(store.len(), 1);

        let other_ns = TargetKey::new("other", "testpvc", GroupVersionResource::persistent_volume_claims());
        assert!(store.get(&other_ns).await.unwrap().is_none());

        assert!(store.remove(&key).is_some());
        assert!(store.is_empty());
    }
}
