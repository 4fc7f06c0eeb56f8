//! Common types for the version layer

/// All published versions of a package, as returned by a registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageVersions {
    /// Versions in registry order (parseable or not)
    pub versions: Vec<String>,
}

impl PackageVersions {
    pub fn new(versions: Vec<String>) -> Self {
        Self { versions }
    }

    /// Versions that parse and carry no pre-release tag
    pub fn stable(&self) -> Vec<String> {
        self.versions
            .iter()
            .filter(|v| crate::version::semver::is_valid(v) && !crate::version::semver::is_prerelease(v))
            .cloned()
            .collect()
    }
}
