//! Target state read from a Kubernetes-style API server.

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use url::Url;

use crate::config::StateConfig;
use crate::resolver::state::{StateError, TargetKey, TargetRecord, TargetStateProvider};

#[derive(Debug, Deserialize)]
struct ObjectEnvelope {
    #[serde(default)]
    metadata: ObjectMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    annotations: HashMap<String, String>,
}

/// Reads target objects with a single GET per lookup.
pub struct KubeTargetStore {
    client: reqwest::Client,
    api_url: Url,
    bearer: Option<String>,
}

impl KubeTargetStore {
    pub fn new(config: &StateConfig, timeout: Duration) -> Result<Self, StateError> {
        let api_url = Url::parse(&config.api_url).map_err(|e| StateError::Url(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(StateError::Url(config.api_url.clone()));
        }

        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(ca_path) = &config.ca_path {
            let pem = fs::read(ca_path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        let bearer = match &config.token_path {
            Some(path) => Some(fs::read_to_string(path)?.trim().to_string()),
            None => None,
        };

        Ok(Self {
            client: builder.build()?,
            api_url,
            bearer,
        })
    }

    /// `/api/{v}/namespaces/{ns}/{resource}/{name}` for the core group,
    /// `/apis/{group}/{v}/...` otherwise.
    pub fn object_url(&self, key: &TargetKey) -> Result<Url, StateError> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StateError::Url(self.api_url.to_string()))?;
            segments.pop_if_empty();
            if key.resource.group.is_empty() {
                segments.push("api");
            } else {
                segments.push("apis").push(&key.resource.group);
            }
            segments
                .push(&key.resource.version)
                .push("namespaces")
                .push(&key.namespace)
                .push(&key.resource.resource)
                .push(&key.name);
        }
        Ok(url)
    }

    async fn fetch(&self, key: &TargetKey) -> Result<Option<TargetRecord>, StateError> {
        let url = self.object_url(key)?;
        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let object: ObjectEnvelope = response.json().await?;
                Ok(Some(TargetRecord::from_annotations(&object.metadata.annotations)))
            }
            status => Err(StateError::Status(status.as_u16())),
        }
    }
}

impl TargetStateProvider for KubeTargetStore {
    fn get<'a>(
        &'a self,
        key: &'a TargetKey,
    ) -> BoxFuture<'a, Result<Option<TargetRecord>, StateError>> {
        self.fetch(key).boxed()
    }
}
