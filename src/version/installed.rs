//! Installed-set inspection through the project's package manager

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::INSTALLED_CACHE_LIFETIME;
use crate::exec::{CommandRunner, args};
use crate::version::cache::FetchCache;

static MANAGER_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("manager version pattern is valid"));

/// Package manager availability does not change during a session
const AVAILABILITY_LIFETIME: Duration = Duration::MAX;

/// Package name to installed version
pub type InstalledVersionMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Npm,
    Pnpm,
}

impl PackageManager {
    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListedProject {
    #[serde(default)]
    dependencies: HashMap<String, ListedPackage>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: HashMap<String, ListedPackage>,
}

#[derive(Debug, Deserialize)]
struct ListedPackage {
    /// Missing for declared-but-absent packages
    version: Option<String>,
}

/// Detects the package manager and lists what it installed
pub struct InstalledInspector {
    runner: Arc<dyn CommandRunner>,
    availability: FetchCache<PackageManager, bool>,
    managers: FetchCache<PathBuf, Option<PackageManager>>,
    installed: FetchCache<PathBuf, Arc<InstalledVersionMap>>,
}

impl InstalledInspector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            availability: FetchCache::new(),
            managers: FetchCache::new(),
            installed: FetchCache::new(),
        }
    }

    /// Whether `{manager} --version` answers with a bare version
    async fn responds(&self, manager: PackageManager, cwd: &Path) -> bool {
        let runner = self.runner.clone();
        let cwd = cwd.to_path_buf();
        self.availability
            .get_or_fetch(manager, AVAILABILITY_LIFETIME, move || async move {
                let responds = match runner.exec(manager.command(), &args(&["--version"]), &cwd).await
                {
                    Ok(output) => {
                        output.success() && MANAGER_VERSION_RE.is_match(output.stdout.trim())
                    }
                    Err(e) => {
                        debug!("{} is not available: {}", manager.command(), e);
                        false
                    }
                };
                Some(responds)
            })
            .await
            .unwrap_or(false)
    }

    async fn exists(path: PathBuf) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Package manager in charge of `dir`, cached for `lifetime`
    pub async fn detect_manager(&self, dir: &Path, lifetime: Duration) -> Option<PackageManager> {
        let key = dir.to_path_buf();
        if let Some(cached) = self.managers.get(&key, lifetime) {
            return cached;
        }

        let manager = if Self::exists(dir.join("node_modules").join(".pnpm")).await
            && self.responds(PackageManager::Pnpm, dir).await
        {
            Some(PackageManager::Pnpm)
        } else if Self::exists(dir.join("pnpm-lock.yaml")).await
            && self.responds(PackageManager::Pnpm, dir).await
        {
            Some(PackageManager::Pnpm)
        } else if self.responds(PackageManager::Npm, dir).await {
            Some(PackageManager::Npm)
        } else {
            None
        };

        debug!("Detected package manager for {:?}: {:?}", dir, manager);
        self.managers.insert(key, manager);
        manager
    }

    /// Installed top-level packages of the project in `dir`.
    ///
    /// `None` when no manager responds or its listing is unusable.
    pub async fn installed_versions(
        &self,
        dir: &Path,
        manager_lifetime: Duration,
    ) -> Option<Arc<InstalledVersionMap>> {
        if let Some(cached) = self.installed.get(&dir.to_path_buf(), INSTALLED_CACHE_LIFETIME) {
            return Some(cached);
        }

        let manager = self.detect_manager(dir, manager_lifetime).await?;
        let runner = self.runner.clone();
        let cwd = dir.to_path_buf();

        self.installed
            .get_or_fetch(dir.to_path_buf(), INSTALLED_CACHE_LIFETIME, move || async move {
                list_installed(runner.as_ref(), manager, &cwd).await.map(Arc::new)
            })
            .await
    }

    /// Forget installed snapshots and detected managers
    pub fn invalidate_package_cache(&self) {
        debug!("Invalidating installed package cache");
        self.installed.invalidate();
        self.managers.invalidate();
    }
}

async fn list_installed(
    runner: &dyn CommandRunner,
    manager: PackageManager,
    cwd: &Path,
) -> Option<InstalledVersionMap> {
    let output = match runner
        .exec(
            manager.command(),
            &args(&["ls", "--json", "--depth=0"]),
            cwd,
        )
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to list installed packages: {}", e);
            return None;
        }
    };

    // npm exits non-zero on peer dependency problems but still prints the tree
    let project = match manager {
        PackageManager::Npm => serde_json::from_str::<ListedProject>(&output.stdout).ok(),
        PackageManager::Pnpm => serde_json::from_str::<Vec<ListedProject>>(&output.stdout)
            .ok()
            .and_then(|projects| projects.into_iter().next()),
    };

    let Some(project) = project else {
        warn!(
            "Unusable `{} ls` output (exit code {:?})",
            manager.command(),
            output.exit_code
        );
        return None;
    };

    let installed = merge_listed(project);
    if installed.is_empty() {
        debug!("No installed packages found in {:?}", cwd);
        return None;
    }

    Some(installed)
}

/// Direct dependencies win over dev dependencies of the same name
fn merge_listed(project: ListedProject) -> InstalledVersionMap {
    project
        .dev_dependencies
        .into_iter()
        .chain(project.dependencies)
        .filter_map(|(name, package)| package.version.map(|version| (name, version)))
        .collect()
}
