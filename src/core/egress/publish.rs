//! FHIR bundle publishing
//!
//! Every generated bundle in a session's egress directory is checked for
//! well-formed JSON and POSTed to the configured endpoint. One bad file never
//! stops the others; each outcome is recorded for the session log.

use crate::config::{PublishConfig, SecretString};
use crate::domain::{OrchError, Result};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

const RESULT_PREFIX: &str = "fhir-result-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    /// Endpoint response body, or the error text when the request failed
    pub response: Value,
    pub fhir_json_struct_valid: bool,
    pub fhir_file_name: String,
}

/// Whether `name` is a generated bundle (`fhir.json` or `fhir-*.json`)
pub fn is_fhir_bundle_file(name: &str) -> bool {
    name == "fhir.json"
        || (name.starts_with("fhir-") && name.ends_with(".json") && !name.starts_with(RESULT_PREFIX))
}

/// Bundle files in `dir`, sorted by name
pub async fn fhir_bundle_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_fhir_bundle_file(&name) && entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

pub struct FhirPublisher {
    client: Client,
    endpoint: Url,
    auth_token: Option<SecretString>,
}

impl FhirPublisher {
    pub fn new(endpoint: Url, config: &PublishConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OrchError::Publish(format!("Unable to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Publisher for the configured endpoint, if publishing is enabled
    pub fn from_config(config: &PublishConfig) -> Result<Option<Self>> {
        match config.resolved_endpoint().map_err(OrchError::Configuration)? {
            Some(endpoint) => Ok(Some(Self::new(endpoint, config)?)),
            None => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Publishes every bundle in `dir`
    pub async fn publish_dir(&self, dir: &Path) -> Result<Vec<PublishResult>> {
        let mut results = Vec::new();
        for file in fhir_bundle_files(dir).await? {
            results.push(self.publish_file(&file).await);
        }
        Ok(results)
    }

    /// Publishes one bundle; failures are recorded in the result, never returned
    pub async fn publish_file(&self, path: &Path) -> PublishResult {
        let fhir_file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bundle = match read_bundle(path).await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(fhir_file = %fhir_file_name, error = %e, "FHIR bundle is not valid JSON");
                return PublishResult {
                    response: Value::String(e.to_string()),
                    fhir_json_struct_valid: false,
                    fhir_file_name,
                };
            }
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&bundle);
        if let Some(token) = &self.auth_token {
            let token: &str = token.expose_secret().as_ref();
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    tracing::info!(fhir_file = %fhir_file_name, status = %status, "FHIR bundle published");
                } else {
                    tracing::warn!(fhir_file = %fhir_file_name, status = %status, "FHIR endpoint rejected bundle");
                }
                let response = serde_json::from_str(&body).unwrap_or(Value::String(body));
                if let Err(e) = write_result_file(path, &response).await {
                    tracing::warn!(fhir_file = %fhir_file_name, error = %e, "Publish result not written");
                }
                response
            }
            Err(e) => {
                tracing::warn!(fhir_file = %fhir_file_name, error = %e, "FHIR publish request failed");
                Value::String(e.to_string())
            }
        };

        PublishResult {
            response,
            fhir_json_struct_valid: true,
            fhir_file_name,
        }
    }
}

async fn read_bundle(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

async fn write_result_file(bundle_path: &Path, response: &Value) -> Result<()> {
    let stem = bundle_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = bundle_path.with_file_name(format!("{RESULT_PREFIX}{stem}.json"));
    tokio::fs::write(target, serde_json::to_string_pretty(response)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_file_names() {
        assert!(is_fhir_bundle_file("fhir.json"));
        assert!(is_fhir_bundle_file("fhir-2.json"));
        assert!(!is_fhir_bundle_file("fhir-result-fhir.json"));
        assert!(!is_fhir_bundle_file("fhir.http"));
        assert!(!is_fhir_bundle_file("diagnostics.json"));
    }

    #[tokio::test]
    async fn test_scan_skips_previous_results() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["fhir.json", "fhir-b.json", "fhir-result-fhir.json", "temp-fhir.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let files = fhir_bundle_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["fhir-b.json", "fhir.json"]);
    }
}
