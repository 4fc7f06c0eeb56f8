//! Traits for fetching package data from the npm ecosystem

use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::version::advisory::Advisory;
use crate::version::error::RegistryError;
use crate::version::types::PackageVersions;

/// Trait for fetching package versions from a registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Fetches all published versions for a package
    ///
    /// # Returns
    /// * `Ok(PackageVersions)` - Every published version, possibly empty
    /// * `Err(RegistryError)` - If the source is unavailable
    async fn fetch_all_versions(&self, package_name: &str)
    -> Result<PackageVersions, RegistryError>;
}

/// Trait for the bulk security-advisory lookup
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait AdvisorySource: Send + Sync {
    /// Query advisories for `packages` (name to the versions of interest).
    ///
    /// Packages without advisories are absent from the result.
    async fn fetch_advisories(
        &self,
        packages: &HashMap<String, Vec<String>>,
    ) -> Result<HashMap<String, Vec<Advisory>>, RegistryError>;
}
