//! Registry that retries a failed lookup against a second source

use std::sync::Arc;

use tracing::debug;

use crate::version::error::RegistryError;
use crate::version::registry::Registry;
use crate::version::types::PackageVersions;

pub struct FallbackRegistry {
    primary: Arc<dyn Registry>,
    fallback: Arc<dyn Registry>,
}

impl FallbackRegistry {
    pub fn new(primary: Arc<dyn Registry>, fallback: Arc<dyn Registry>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait::async_trait]
impl Registry for FallbackRegistry {
    async fn fetch_all_versions(
        &self,
        package_name: &str,
    ) -> Result<PackageVersions, RegistryError> {
        match self.primary.fetch_all_versions(package_name).await {
            Ok(versions) => Ok(versions),
            Err(e) => {
                debug!(
                    "Primary registry failed for {}: {}, trying fallback",
                    package_name, e
                );
                self.fallback.fetch_all_versions(package_name).await
            }
        }
    }
}
