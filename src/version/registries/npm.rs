//! npm registry API implementation

use std::collections::HashMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use semver::Version;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FETCH_TIMEOUT;
use crate::version::advisory::Advisory;
use crate::version::error::RegistryError;
use crate::version::registry::{AdvisorySource, Registry};
use crate::version::types::PackageVersions;

/// Default base URL for npm registry
pub const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";

const ADVISORIES_BULK_PATH: &str = "/-/npm/v1/security/advisories/bulk";

/// Response from npm registry API
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    versions: HashMap<String, serde_json::Value>,
}

/// Registry implementation for npm registry API
pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl NpmRegistry {
    /// Creates a new NpmRegistry with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("outdated-lsp")
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Encode package name for URL (handles scoped packages)
    fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }

    fn gzip(body: &[u8]) -> Result<Vec<u8>, RegistryError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body)?;
        Ok(encoder.finish()?)
    }
}

impl Default for NpmRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl Registry for NpmRegistry {
    async fn fetch_all_versions(
        &self,
        package_name: &str,
    ) -> Result<PackageVersions, RegistryError> {
        let encoded_name = Self::encode_package_name(package_name);
        let url = format!("{}/{}", self.base_url, encoded_name);

        let response = self.client.get(&url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(package_name.to_string()));
        }

        if !status.is_success() {
            warn!("npm registry returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let package_info: NpmPackageResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse npm registry response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        // Sort versions by semver (lowest first, highest last)
        let mut versions: Vec<(String, Version)> = package_info
            .versions
            .into_keys()
            .filter_map(|v| Version::parse(&v).ok().map(|parsed| (v, parsed)))
            .collect();

        versions.sort_by(|(_, a), (_, b)| a.cmp(b));

        let versions: Vec<String> = versions.into_iter().map(|(v, _)| v).collect();

        Ok(PackageVersions::new(versions))
    }
}

#[async_trait::async_trait]
impl AdvisorySource for NpmRegistry {
    async fn fetch_advisories(
        &self,
        packages: &HashMap<String, Vec<String>>,
    ) -> Result<HashMap<String, Vec<Advisory>>, RegistryError> {
        let url = format!("{}{}", self.base_url, ADVISORIES_BULK_PATH);
        let body = serde_json::to_vec(packages)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        debug!("Requesting advisories for {} packages", packages.len());

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONTENT_ENCODING, "gzip")
            .body(Self::gzip(&body)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("npm advisories endpoint returned status {}", status);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse npm advisories response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::io::Read;

    #[tokio::test]
    async fn fetch_all_versions_returns_versions_sorted_by_semver() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/lodash")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "name": "lodash",
                    "versions": {
                        "4.17.21": {},
                        "4.17.19": {},
                        "4.17.20": {}
                    }
                }"#,
            )
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let result = registry.fetch_all_versions("lodash").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            result.versions,
            vec![
                "4.17.19".to_string(),
                "4.17.20".to_string(),
                "4.17.21".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn fetch_all_versions_returns_not_found_for_nonexistent_package() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/nonexistent-package")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Not found"}"#)
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let result = registry.fetch_all_versions("nonexistent-package").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_all_versions_handles_scoped_package() {
        let mut server = Server::new_async().await;

        // Scoped packages use URL encoding: @types/node -> @types%2Fnode
        let mock = server
            .mock("GET", "/@types%2Fnode")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "name": "@types/node",
                    "versions": {
                        "20.0.0": {},
                        "18.0.0": {}
                    }
                }"#,
            )
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let result = registry.fetch_all_versions("@types/node").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            result.versions,
            vec!["18.0.0".to_string(), "20.0.0".to_string()]
        );
    }

    #[tokio::test]
    async fn fetch_all_versions_rejects_body_without_versions() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/unpublished")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "unpublished", "time": {}}"#)
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let result = registry.fetch_all_versions("unpublished").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_all_versions_returns_error_on_server_failure() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/lodash")
            .with_status(503)
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let result = registry.fetch_all_versions("lodash").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_advisories_posts_gzip_body_and_parses_response() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/-/npm/v1/security/advisories/bulk")
            .match_header("content-encoding", "gzip")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "lodash": [{
                        "id": 1,
                        "url": "https://github.com/advisories/GHSA-p6mc-m468-83gw",
                        "title": "Prototype Pollution in lodash",
                        "severity": "high",
                        "vulnerable_versions": "<4.17.19",
                        "cvss": {"score": 7.4}
                    }]
                }"#,
            )
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let packages = HashMap::from([(
            "lodash".to_string(),
            vec!["4.17.15".to_string(), "4.17.21".to_string()],
        )]);
        let result = registry.fetch_advisories(&packages).await.unwrap();

        mock.assert_async().await;
        let advisories = &result["lodash"];
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].severity, "high");
        assert_eq!(advisories[0].vulnerable_versions, "<4.17.19");
    }

    #[tokio::test]
    async fn fetch_advisories_returns_error_on_malformed_response() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/-/npm/v1/security/advisories/bulk")
            .match_body(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url());
        let packages = HashMap::from([("lodash".to_string(), vec!["4.17.21".to_string()])]);
        let result = registry.fetch_advisories(&packages).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[test]
    fn gzip_produces_decodable_body() {
        let encoded = NpmRegistry::gzip(br#"{"lodash":["4.17.21"]}"#).unwrap();

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(encoded.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();

        assert_eq!(decoded, r#"{"lodash":["4.17.21"]}"#);
    }
}
