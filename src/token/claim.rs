//! Upload token claims.
//!
//! A [`Claim`] is what a verified token authorizes: one operation against one
//! target object. It is produced per request and never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource name of the only target kind uploads are accepted for.
pub const PVC_RESOURCE: &str = "persistentvolumeclaims";

/// Operation a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Synchronous upload: the worker answers once the image is written.
    #[serde(rename = "Upload")]
    Upload,
    /// Asynchronous upload: the worker acknowledges and processes in the background.
    #[serde(rename = "UploadAsync")]
    UploadAsync,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => write!(f, "Upload"),
            Operation::UploadAsync => write!(f, "UploadAsync"),
        }
    }
}

/// Group/version/resource triple naming the kind of the target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Core `v1` persistent volume claims.
    pub fn persistent_volume_claims() -> Self {
        Self::new("", "v1", PVC_RESOURCE)
    }

    pub fn is_persistent_volume_claims(&self) -> bool {
        self.group.is_empty() && self.resource == PVC_RESOURCE
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Verified token payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub operation: Operation,
    pub name: String,
    pub namespace: String,
    pub resource: GroupVersionResource,
}

impl Claim {
    /// Claim for uploading into the named persistent volume claim.
    pub fn upload(operation: Operation, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            operation,
            name: name.into(),
            namespace: namespace.into(),
            resource: GroupVersionResource::persistent_volume_claims(),
        }
    }
}

/// Signed JWT body. Standard time claims are seconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenPayload {
    pub operation: Operation,
    pub name: String,
    pub namespace: String,
    pub resource: GroupVersionResource,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
}
