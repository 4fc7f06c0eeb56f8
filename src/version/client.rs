//! Cached access to registry versions and security advisories

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::version::advisory::Advisory;
use crate::version::cache::FetchCache;
use crate::version::evaluator::is_name_valid;
use crate::version::registry::{AdvisorySource, Registry};
use crate::version::types::PackageVersions;

/// Registry front shared by every open document
pub struct RegistryClient {
    registry: Arc<dyn Registry>,
    advisory_source: Arc<dyn AdvisorySource>,
    versions: FetchCache<String, Arc<PackageVersions>>,
    advisories: FetchCache<String, Vec<Advisory>>,
}

impl RegistryClient {
    pub fn new(registry: Arc<dyn Registry>, advisory_source: Arc<dyn AdvisorySource>) -> Self {
        Self {
            registry,
            advisory_source,
            versions: FetchCache::new(),
            advisories: FetchCache::new(),
        }
    }

    /// All published versions of `name`; `None` when the registry is unavailable.
    ///
    /// Concurrent callers for the same name share one request.
    pub async fn get_versions(&self, name: &str, lifetime: Duration) -> Option<Arc<PackageVersions>> {
        let registry = self.registry.clone();
        let package_name = name.to_string();

        self.versions
            .get_or_fetch(name.to_string(), lifetime, move || async move {
                match registry.fetch_all_versions(&package_name).await {
                    Ok(versions) => Some(Arc::new(versions)),
                    Err(e) => {
                        warn!("Failed to fetch versions for {}: {}", package_name, e);
                        None
                    }
                }
            })
            .await
    }

    /// Advisories for each package in `packages` (name to versions of interest).
    ///
    /// Names that are invalid or already fresh in the cache are not queried.
    /// A queried package without advisories is cached as an empty list; a
    /// failed request caches nothing.
    pub async fn get_advisories(
        &self,
        packages: &HashMap<String, Vec<String>>,
        lifetime: Duration,
    ) -> HashMap<String, Vec<Advisory>> {
        let request: HashMap<String, Vec<String>> = packages
            .iter()
            .filter(|(name, _)| is_name_valid(name))
            .filter(|(name, _)| !self.advisories.is_fresh(*name, lifetime))
            .map(|(name, versions)| (name.clone(), versions.clone()))
            .collect();

        if !request.is_empty() {
            debug!("Fetching advisories for {} packages", request.len());
            match self.advisory_source.fetch_advisories(&request).await {
                Ok(mut found) => {
                    for name in request.keys() {
                        self.advisories
                            .insert(name.clone(), found.remove(name).unwrap_or_default());
                    }
                }
                Err(e) => warn!("Failed to fetch advisories: {}", e),
            }
        }

        packages
            .keys()
            .filter_map(|name| {
                self.advisories
                    .get(name, lifetime)
                    .map(|advisories| (name.clone(), advisories))
            })
            .collect()
    }

    /// Expire every cached version list and advisory
    pub fn invalidate(&self) {
        self.versions.invalidate();
        self.advisories.invalidate();
    }
}
