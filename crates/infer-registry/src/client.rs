//! The registry is consumed through a closed trait, never a concrete type
//! — the core must not hard-code a specific registry implementation.

use async_trait::async_trait;
use infer_kernel::{PipelineError, Stage};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::retry::{retry_with_policy, RetryConfig};

/// One version entry as reported by `list_versions`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub version: u64,
    pub stage: Stage,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Raw artifact bytes plus the adjacent schema descriptor the loader needs
/// to build a `ModelHandle`.
#[derive(Debug, Clone)]
pub struct ArtifactPayload {
    pub bytes: Vec<u8>,
    pub schema_json: serde_json::Value,
    pub predictor_kind: String,
}

/// Read-only surface the core depends on, independent of which registry
/// implementation sits behind it.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn list_versions(&self, model_name: &str) -> Result<Vec<VersionInfo>, PipelineError>;

    async fn resolve_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> Result<Option<u64>, PipelineError>;

    async fn fetch_artifact(
        &self,
        model_name: &str,
        version: u64,
    ) -> Result<ArtifactPayload, PipelineError>;
}

/// Production registry client over HTTP, with capped exponential backoff
/// retry on transient failures (timeouts, 5xx). `NotFound` and schema
/// errors are terminal for the calling cycle and are not retried.
pub struct HttpRegistryClient {
    http: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            retry_config: RetryConfig::default(),
        }
    }

    fn is_retryable(err: &PipelineError) -> bool {
        matches!(err, PipelineError::FeatureStore(_))
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_versions(&self, model_name: &str) -> Result<Vec<VersionInfo>, PipelineError> {
        let url = format!("{}/models/{}/versions", self.base_url, model_name);
        retry_with_policy(&self.retry_config, Self::is_retryable, || {
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| PipelineError::FeatureStore(e.to_string()))?;
                if resp.status().is_server_error() {
                    return Err(PipelineError::FeatureStore(format!(
                        "registry returned {}",
                        resp.status()
                    )));
                }
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(PipelineError::Load(format!("unknown model '{model_name}'")));
                }
                resp.json::<Vec<VersionInfo>>()
                    .await
                    .map_err(|e| PipelineError::Load(format!("malformed version list: {e}")))
            }
        })
        .await
    }

    async fn resolve_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> Result<Option<u64>, PipelineError> {
        let url = format!("{}/models/{}/aliases/{}", self.base_url, model_name, alias);
        retry_with_policy(&self.retry_config, Self::is_retryable, || {
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| PipelineError::FeatureStore(e.to_string()))?;
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if resp.status().is_server_error() {
                    return Err(PipelineError::FeatureStore(format!(
                        "registry returned {}",
                        resp.status()
                    )));
                }
                #[derive(Deserialize)]
                struct AliasResponse {
                    version: u64,
                }
                let body = resp
                    .json::<AliasResponse>()
                    .await
                    .map_err(|e| PipelineError::Load(format!("malformed alias response: {e}")))?;
                Ok(Some(body.version))
            }
        })
        .await
    }

    async fn fetch_artifact(
        &self,
        model_name: &str,
        version: u64,
    ) -> Result<ArtifactPayload, PipelineError> {
        let url = format!(
            "{}/models/{}/versions/{}/artifact",
            self.base_url, model_name, version
        );
        retry_with_policy(&self.retry_config, Self::is_retryable, || {
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| PipelineError::FeatureStore(e.to_string()))?;
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(PipelineError::Load(format!(
                        "no artifact for {model_name}@{version}"
                    )));
                }
                if resp.status().is_server_error() {
                    return Err(PipelineError::FeatureStore(format!(
                        "registry returned {}",
                        resp.status()
                    )));
                }
                #[derive(Deserialize)]
                struct ArtifactEnvelope {
                    predictor_kind: String,
                    schema: serde_json::Value,
                    bytes_base64: String,
                }
                let envelope = resp
                    .json::<ArtifactEnvelope>()
                    .await
                    .map_err(|e| PipelineError::Load(format!("malformed artifact envelope: {e}")))?;
                let bytes = base64_decode(&envelope.bytes_base64)
                    .map_err(|e| PipelineError::Load(format!("bad artifact encoding: {e}")))?;
                Ok(ArtifactPayload {
                    bytes,
                    schema_json: envelope.schema,
                    predictor_kind: envelope.predictor_kind,
                })
            }
        })
        .await
    }
}

/// Minimal base64 decoder so the registry client doesn't need a dedicated
/// base64 crate dependency for this single call site.
fn base64_decode(input: &str) -> Result<Vec<u8>, &'static str> {
    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut rev = [255u8; 256];
    for (i, &c) in TABLE.iter().enumerate() {
        rev[c as usize] = i as u8;
    }
    let cleaned: Vec<u8> = input.bytes().filter(|&b| b != b'=').collect();
    let mut out = Vec::with_capacity(cleaned.len() * 3 / 4);
    for chunk in cleaned.chunks(4) {
        let mut buf = [0u8; 4];
        for (i, &b) in chunk.iter().enumerate() {
            let v = rev[b as usize];
            if v == 255 {
                return Err("invalid base64 character");
            }
            buf[i] = v;
        }
        out.push((buf[0] << 2) | (buf[1] >> 4));
        if chunk.len() > 2 {
            out.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if chunk.len() > 3 {
            out.push((buf[2] << 6) | buf[3]);
        }
    }
    Ok(out)
}

/// In-memory registry double for tests and for local development without a
/// real registry deployment. Scripted per model name so poller tests can
/// simulate a version rollout.
pub struct MockRegistryClient {
    versions: Mutex<HashMap<String, Vec<VersionInfo>>>,
    artifacts: Mutex<HashMap<(String, u64), ArtifactPayload>>,
}

impl MockRegistryClient {
    pub fn new() -> Self {
        Self {
            versions: Mutex::new(HashMap::new()),
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_versions(&self, model_name: impl Into<String>, versions: Vec<VersionInfo>) {
        self.versions.lock().unwrap().insert(model_name.into(), versions);
    }

    pub fn set_artifact(&self, model_name: impl Into<String>, version: u64, payload: ArtifactPayload) {
        self.artifacts
            .lock()
            .unwrap()
            .insert((model_name.into(), version), payload);
    }
}

impl Default for MockRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for MockRegistryClient {
    async fn list_versions(&self, model_name: &str) -> Result<Vec<VersionInfo>, PipelineError> {
        self.versions
            .lock()
            .unwrap()
            .get(model_name)
            .cloned()
            .ok_or_else(|| PipelineError::Load(format!("unknown model '{model_name}'")))
    }

    async fn resolve_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> Result<Option<u64>, PipelineError> {
        let versions = self.list_versions(model_name).await?;
        if alias == "production" {
            // Open question resolved: highest numeric version id wins when
            // multiple versions share the `production` stage.
            return Ok(versions
                .iter()
                .filter(|v| v.stage == Stage::Production)
                .map(|v| v.version)
                .max());
        }
        Ok(versions
            .into_iter()
            .find(|v| v.aliases.iter().any(|a| a == alias))
            .map(|v| v.version))
    }

    async fn fetch_artifact(
        &self,
        model_name: &str,
        version: u64,
    ) -> Result<ArtifactPayload, PipelineError> {
        self.artifacts
            .lock()
            .unwrap()
            .get(&(model_name.to_string(), version))
            .cloned()
            .ok_or_else(|| {
                PipelineError::Load(format!("no artifact for {model_name}@{version}"))
            })
    }
}
