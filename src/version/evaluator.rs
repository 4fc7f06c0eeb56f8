//! Per-dependency update decision
//!
//! [`PackageEvaluator`] answers every question asked about one declared
//! dependency once the registry versions and the installed version are
//! known. [`PackageEvaluator::classify`] combines those answers into an
//! [`UpdateDecision`].

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Settings;
use crate::parser::types::DependencyDeclaration;
use crate::version::decision::{Classification, UpdateDecision};
use crate::version::range::{max_satisfying, valid_range};
use crate::version::semver::{
    ReleaseType, coerce, compare_str, diff_str, is_prerelease, version_clear, version_normalized,
};
use crate::version::types::PackageVersions;

static PACKAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@[a-z0-9-][a-z0-9-._]*/)?[a-z0-9-][a-z0-9-._]*$")
        .expect("package name pattern is valid")
});

static VERSION_COMPLEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s|\|\|").expect("complex range pattern is valid"));

/// Whether `name` is an acceptable npm package identifier
pub fn is_name_valid(name: &str) -> bool {
    PACKAGE_NAME_RE.is_match(name)
}

/// Whether the range combines several ranges (`a b`, `a || b`)
pub fn is_version_complex(range: &str) -> bool {
    VERSION_COMPLEX_RE.is_match(range)
}

pub struct PackageEvaluator<'a> {
    declaration: &'a DependencyDeclaration,
    settings: &'a Settings,
    /// `None` when the registry was unavailable
    versions: Option<&'a PackageVersions>,
    installed: Option<&'a str>,
    clear: String,
    normalized: Option<String>,
}

impl<'a> PackageEvaluator<'a> {
    pub fn new(
        declaration: &'a DependencyDeclaration,
        settings: &'a Settings,
        versions: Option<&'a PackageVersions>,
        installed: Option<&'a str>,
    ) -> Self {
        let clear = version_clear(&declaration.version);
        let normalized = version_normalized(&clear);
        Self {
            declaration,
            settings,
            versions,
            installed,
            clear,
            normalized,
        }
    }

    pub fn is_name_valid(&self) -> bool {
        is_name_valid(&self.declaration.name)
    }

    pub fn is_version_complex(&self) -> bool {
        is_version_complex(&self.declaration.version)
    }

    pub fn is_version_valid_range(&self) -> bool {
        valid_range(&self.declaration.version)
    }

    /// Declared range without its leading operator (`^1.2.0` -> `1.2.0`)
    pub fn version_clear(&self) -> &str {
        &self.clear
    }

    /// Declared version as a full version (`^3` -> `3.0.0`)
    pub fn version_normalized(&self) -> Option<&str> {
        self.normalized.as_deref()
    }

    pub fn is_version_prerelease(&self) -> bool {
        self.normalized.as_deref().is_some_and(is_prerelease)
    }

    /// Some published version satisfies the declared range
    pub fn is_version_released(&self) -> bool {
        self.versions.is_some_and(|versions| {
            max_satisfying(&versions.versions, &self.declaration.version, false).is_some()
        })
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    pub fn version_installed(&self) -> Option<&str> {
        self.installed
    }

    /// Version to suggest for this dependency.
    ///
    /// With major-update protection on, the newest version compatible with
    /// the declared one wins over the overall newest version, unless the
    /// declared version already is that compatible maximum.
    pub fn version_latest(&self) -> Option<String> {
        let versions = &self.versions?.versions;
        let is_prerelease = self.is_version_prerelease();

        let version_latest = max_satisfying(versions, "*", is_prerelease);

        if !self.settings.major_update_protection {
            return version_latest;
        }

        // A stable release of the same line beats staying on a pre-release
        if is_prerelease && let Some(coerced) = coerce(&self.clear) {
            let non_prerelease = max_satisfying(versions, &format!("^{}", coerced), false);
            if let Some(candidate) = non_prerelease
                && compare_str(&candidate, &self.clear).is_some_and(|o| o.is_gt())
            {
                return Some(candidate);
            }
        }

        let version_satisfying =
            max_satisfying(versions, &format!("^{}", self.clear), is_prerelease);

        match version_satisfying {
            Some(satisfying) if satisfying != self.clear => Some(satisfying),
            _ => version_latest,
        }
    }

    /// The suggestion equals the declared version: nothing newer to offer
    pub fn is_version_maxed(&self) -> bool {
        self.version_latest().as_deref() == self.version_normalized()
    }

    /// Pre-releases always are; otherwise the bump must reach the configured level
    pub fn is_version_updatable(&self) -> bool {
        if self.is_version_prerelease() {
            return true;
        }

        let (Some(latest), Some(normalized)) = (self.version_latest(), self.version_normalized())
        else {
            return false;
        };

        diff_str(&latest, normalized)
            .is_some_and(|release| release.rank() >= self.settings.level.rank())
    }

    /// The installed version is a whole major release behind the suggestion
    pub fn requires_version_major_update(&self) -> bool {
        match (self.version_latest(), self.installed) {
            (Some(latest), Some(installed)) => {
                diff_str(&latest, installed) == Some(ReleaseType::Major)
            }
            _ => false,
        }
    }

    /// The manifest already names the suggestion but something else is installed
    pub fn requires_install_command(&self) -> bool {
        self.version_latest().as_deref() == Some(self.clear.as_str())
            && self.installed != Some(self.clear.as_str())
    }

    pub fn is_version_latest_already_installed(&self) -> bool {
        match (self.version_latest(), self.installed) {
            (Some(latest), Some(installed)) => latest == installed,
            _ => false,
        }
    }

    /// Classify the dependency; `None` when the registry gave nothing to work with.
    pub fn classify(&self) -> Option<UpdateDecision> {
        if !self.is_version_valid_range() {
            return Some(UpdateDecision::new(Classification::InvalidRange));
        }

        let latest = self.version_latest()?;

        if !self.is_version_released() {
            return Some(UpdateDecision::new(Classification::VersionNotReleased));
        }

        if !self.is_installed() {
            return Some(UpdateDecision::with_suggestion(
                Classification::PendingInstall,
                latest,
            ));
        }

        if !self.is_version_updatable() {
            if self.requires_install_command() {
                return Some(UpdateDecision::with_suggestion(
                    Classification::ReadyToInstall,
                    latest,
                ));
            }
            return Some(UpdateDecision::new(Classification::AlreadyLatest));
        }

        if !self.is_version_maxed() {
            return Some(UpdateDecision::with_suggestion(
                Classification::UpdateAvailable {
                    candidate: latest.clone(),
                    is_major: self.requires_version_major_update(),
                    already_installed: self.is_version_latest_already_installed(),
                },
                latest,
            ));
        }

        if self.is_version_prerelease() {
            return Some(UpdateDecision::new(Classification::Prerelease));
        }

        Some(UpdateDecision::new(Classification::AlreadyLatest))
    }
}
