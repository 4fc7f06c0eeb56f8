//! Outcome of evaluating one declared dependency

/// Advisory facts carried by a security diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryDetails {
    pub severity: String,
    pub score: f64,
    pub title: String,
    pub url: String,
    pub vulnerable_versions: String,
    /// Smallest unaffected version above the installed one
    pub fix_version: Option<String>,
    /// Largest unaffected version below the installed one, when no fix exists
    pub downgrade_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The declared range does not parse
    InvalidRange,
    /// No published version satisfies the declared range
    VersionNotReleased,
    /// Declared but missing from the installed tree
    PendingInstall,
    /// The manifest already names the latest version; only the install is missing
    ReadyToInstall,
    UpdateAvailable {
        candidate: String,
        /// The installed version is a major release behind the candidate
        is_major: bool,
        /// The candidate is already installed, so the edit is a formalization
        already_installed: bool,
    },
    AlreadyLatest,
    Prerelease,
    SecurityAdvisory(AdvisoryDetails),
}

/// Classification plus the version an edit would write, if any
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDecision {
    pub classification: Classification,
    pub suggested_version: Option<String>,
}

impl UpdateDecision {
    pub fn new(classification: Classification) -> Self {
        Self {
            classification,
            suggested_version: None,
        }
    }

    pub fn with_suggestion(classification: Classification, version: impl Into<String>) -> Self {
        Self {
            classification,
            suggested_version: Some(version.into()),
        }
    }

    /// Whether the decision should surface as a diagnostic
    pub fn is_reportable(&self) -> bool {
        !matches!(self.classification, Classification::AlreadyLatest)
    }

    pub fn is_advisory(&self) -> bool {
        matches!(self.classification, Classification::SecurityAdvisory(_))
    }

    pub fn is_major(&self) -> bool {
        matches!(
            self.classification,
            Classification::UpdateAvailable { is_major: true, .. }
        )
    }
}
