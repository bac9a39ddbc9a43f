//! Volume request shape shared with the admission webhook.
//!
//! The webhook validates volume requests before their target exists; its rule
//! set lives elsewhere. What the proxy needs is the shape: a request names
//! exactly one source, and an upload request maps to the single target object
//! an upload token is minted for.

use serde::{Deserialize, Serialize};

use crate::resolver::TargetKey;
use crate::token::{Claim, GroupVersionResource, Operation};

/// Where a volume's initial content comes from. Exactly one source is
/// present by construction; an object with zero or several source keys
/// does not deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataVolumeSource {
    Http {
        url: String,
    },
    S3 {
        url: String,
    },
    Registry {
        url: String,
    },
    Pvc {
        namespace: String,
        name: String,
    },
    /// Content arrives through the upload proxy.
    Upload {},
    Blank {},
    Imageio {
        url: String,
        #[serde(rename = "secretRef", default)]
        secret_ref: String,
        #[serde(rename = "certConfigMap", default)]
        cert_config_map: String,
    },
}

impl DataVolumeSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DataVolumeSource::Http { .. } => "http",
            DataVolumeSource::S3 { .. } => "s3",
            DataVolumeSource::Registry { .. } => "registry",
            DataVolumeSource::Pvc { .. } => "pvc",
            DataVolumeSource::Upload {} => "upload",
            DataVolumeSource::Blank {} => "blank",
            DataVolumeSource::Imageio { .. } => "imageio",
        }
    }

    /// Remote URL the content is fetched from, for the URL-based sources.
    pub fn url(&self) -> Option<&str> {
        match self {
            DataVolumeSource::Http { url }
            | DataVolumeSource::S3 { url }
            | DataVolumeSource::Registry { url }
            | DataVolumeSource::Imageio { url, .. } => Some(url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVolumeSpec {
    pub source: DataVolumeSource,
}

/// A request for a populated volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVolume {
    pub metadata: ObjectMeta,
    pub spec: DataVolumeSpec,
}

impl DataVolume {
    /// The claim object backing this volume. It shares the volume's name
    /// and namespace.
    pub fn upload_target(&self) -> TargetKey {
        TargetKey::new(
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
            GroupVersionResource::persistent_volume_claims(),
        )
    }

    pub fn accepts_upload(&self) -> bool {
        matches!(self.spec.source, DataVolumeSource::Upload {})
    }

    /// Claim an upload token for this volume must carry. `None` unless the
    /// volume is populated by upload.
    pub fn upload_claim(&self, operation: Operation) -> Option<Claim> {
        self.accepts_upload().then(|| {
            Claim::upload(
                operation,
                self.metadata.namespace.clone(),
                self.metadata.name.clone(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> serde_json::Result<DataVolume> {
        serde_json::from_str(&format!(
            r#"{{"metadata":{{"name":"disk","namespace":"vms"}},"spec":{{"source":{source}}}}}"#
        ))
    }

    #[test]
    fn single_source_parses() {
        let dv = parse(r#"{"http":{"url":"https://images.example/disk.img"}}"#).unwrap();
        assert_eq!(dv.spec.source.kind(), "http");
        assert_eq!(dv.spec.source.url(), Some("https://images.example/disk.img"));

        let dv = parse(r#"{"upload":{}}"#).unwrap();
        assert!(dv.accepts_upload());
        assert_eq!(dv.spec.source.url(), None);
    }

    #[test]
    fn zero_sources_rejected() {
        assert!(parse("{}").is_err());
    }

    #[test]
    fn multiple_sources_rejected() {
        assert!(parse(r#"{"upload":{},"blank":{}}"#).is_err());
    }

    #[test]
    fn imageio_uses_camel_case_refs() {
        let dv = parse(
            r#"{"imageio":{"url":"https://engine/api","secretRef":"creds","certConfigMap":"ca"}}"#,
        )
        .unwrap();
        assert_eq!(
            dv.spec.source,
            DataVolumeSource::Imageio {
                url: "https://engine/api".into(),
                secret_ref: "creds".into(),
                cert_config_map: "ca".into(),
            }
        );
    }

    #[test]
    fn upload_target_is_the_backing_claim() {
        let dv = parse(r#"{"upload":{}}"#).unwrap();
        let target = dv.upload_target();
        assert_eq!(target.namespace, "vms");
        assert_eq!(target.name, "disk");
        assert!(target.resource.is_persistent_volume_claims());

        let claim = dv.upload_claim(Operation::Upload).unwrap();
        assert_eq!(claim.name, "disk");
        assert_eq!(claim.namespace, "vms");
    }

    #[test]
    fn non_upload_volumes_get_no_claim() {
        let dv = parse(r#"{"blank":{}}"#).unwrap();
        assert!(dv.upload_claim(Operation::Upload).is_none());
    }
}
