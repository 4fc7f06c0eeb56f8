//! Registry, advisory and package-manager doubles

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use outdated_lsp::exec::{CommandRunner, ExecError, ExecOutput};
use outdated_lsp::version::advisory::{Advisory, Cvss};
use outdated_lsp::version::error::RegistryError;
use outdated_lsp::version::registry::{AdvisorySource, Registry};
use outdated_lsp::version::types::PackageVersions;

/// Mock registry for testing
#[derive(Default)]
pub struct MockRegistry {
    versions: HashMap<String, Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, package: &str, versions: Vec<&str>) -> Self {
        self.versions.insert(
            package.to_string(),
            versions.into_iter().map(|v| v.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn fetch_all_versions(
        &self,
        package_name: &str,
    ) -> Result<PackageVersions, RegistryError> {
        match self.versions.get(package_name) {
            Some(versions) => Ok(PackageVersions::new(versions.clone())),
            None => Err(RegistryError::NotFound(package_name.to_string())),
        }
    }
}

/// Mock advisory endpoint answering from a fixed table
#[derive(Default)]
pub struct MockAdvisorySource {
    advisories: HashMap<String, Vec<Advisory>>,
}

impl MockAdvisorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advisory(mut self, package: &str, severity: &str, vulnerable_versions: &str) -> Self {
        self.advisories
            .entry(package.to_string())
            .or_default()
            .push(Advisory {
                severity: severity.to_string(),
                cvss: Cvss { score: 7.5 },
                title: format!("{} is vulnerable", package),
                url: format!("https://github.com/advisories/{}", package),
                vulnerable_versions: vulnerable_versions.to_string(),
            });
        self
    }
}

#[async_trait]
impl AdvisorySource for MockAdvisorySource {
    async fn fetch_advisories(
        &self,
        packages: &HashMap<String, Vec<String>>,
    ) -> Result<HashMap<String, Vec<Advisory>>, RegistryError> {
        Ok(self
            .advisories
            .iter()
            .filter(|(name, _)| packages.contains_key(*name))
            .map(|(name, advisories)| (name.clone(), advisories.clone()))
            .collect())
    }
}

/// Fake npm: answers `npm --version` and lists `installed` for `npm ls`
#[derive(Clone, Default)]
pub struct FakeNpm {
    installed: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeNpm {
    pub fn new(installed: &[(&str, &str)]) -> Self {
        let npm = Self::default();
        npm.set_installed(installed);
        npm
    }

    pub fn set_installed(&self, installed: &[(&str, &str)]) {
        *self.installed.lock().unwrap() = installed
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect();
    }

    fn ls_output(&self) -> String {
        let dependencies: serde_json::Map<String, serde_json::Value> = self
            .installed
            .lock()
            .unwrap()
            .iter()
            .map(|(name, version)| (name.clone(), serde_json::json!({ "version": version })))
            .collect();
        serde_json::json!({ "dependencies": dependencies }).to_string()
    }
}

#[async_trait]
impl CommandRunner for FakeNpm {
    async fn exec(
        &self,
        program: &str,
        args: &[String],
        _cwd: &Path,
    ) -> Result<ExecOutput, ExecError> {
        let (stdout, exit_code) = match (program, args.first().map(String::as_str)) {
            ("npm", Some("--version")) => ("10.2.4".to_string(), 0),
            ("npm", Some("ls")) => (self.ls_output(), 0),
            _ => (String::new(), 127),
        };

        Ok(ExecOutput {
            stdout,
            stderr: String::new(),
            exit_code: Some(exit_code),
        })
    }
}
