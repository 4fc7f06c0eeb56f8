//! `npm view` fallback for registries the HTTP client cannot reach
//! (private or authenticated registries configured through `.npmrc`)

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::exec::{CommandRunner, args};
use crate::version::error::RegistryError;
use crate::version::registry::Registry;
use crate::version::types::PackageVersions;

/// `npm view --json` prints a bare string when only one version exists
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ViewVersions {
    Many(Vec<String>),
    One(String),
}

pub struct NpmCliRegistry {
    runner: Arc<dyn CommandRunner>,
    cwd: PathBuf,
}

impl NpmCliRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>, cwd: PathBuf) -> Self {
        Self { runner, cwd }
    }
}

#[async_trait::async_trait]
impl Registry for NpmCliRegistry {
    async fn fetch_all_versions(
        &self,
        package_name: &str,
    ) -> Result<PackageVersions, RegistryError> {
        let output = self
            .runner
            .exec(
                "npm",
                &args(&["view", "--json", package_name, "versions"]),
                &self.cwd,
            )
            .await?;

        if !output.success() {
            warn!(
                "npm view {} exited with {:?}: {}",
                package_name,
                output.exit_code,
                output.stderr.trim()
            );
            return Err(RegistryError::NotFound(package_name.to_string()));
        }

        let versions: ViewVersions = serde_json::from_str(output.stdout.trim()).map_err(|e| {
            warn!("Failed to parse npm view output for {}: {}", package_name, e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        Ok(PackageVersions::new(match versions {
            ViewVersions::Many(versions) => versions,
            ViewVersions::One(version) => vec![version],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecOutput, MockCommandRunner};
    use mockall::predicate::eq;

    fn output(stdout: &str, exit_code: i32) -> ExecOutput {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(exit_code),
        }
    }

    fn registry_with(stdout: &'static str, exit_code: i32) -> NpmCliRegistry {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_exec()
            .with(
                eq("npm"),
                eq(args(&["view", "--json", "@scope/pkg", "versions"])),
                mockall::predicate::always(),
            )
            .times(1)
            .returning(move |_, _, _| Ok(output(stdout, exit_code)));

        NpmCliRegistry::new(Arc::new(runner), PathBuf::from("/project"))
    }

    #[tokio::test]
    async fn fetch_all_versions_parses_version_array() {
        let registry = registry_with("[\n  \"1.0.0\",\n  \"1.1.0\"\n]\n", 0);

        let result = registry.fetch_all_versions("@scope/pkg").await.unwrap();

        assert_eq!(result.versions, vec!["1.0.0", "1.1.0"]);
    }

    #[tokio::test]
    async fn fetch_all_versions_accepts_single_version_string() {
        let registry = registry_with("\"1.0.0\"\n", 0);

        let result = registry.fetch_all_versions("@scope/pkg").await.unwrap();

        assert_eq!(result.versions, vec!["1.0.0"]);
    }

    #[tokio::test]
    async fn fetch_all_versions_fails_on_nonzero_exit() {
        let registry = registry_with(r#"{"error": {"code": "E404"}}"#, 1);

        let result = registry.fetch_all_versions("@scope/pkg").await;

        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_all_versions_fails_on_malformed_output() {
        let registry = registry_with("npm WARN something", 0);

        let result = registry.fetch_all_versions("@scope/pkg").await;

        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }
}
