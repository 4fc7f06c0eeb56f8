//! Security advisories and remediation search

use serde::Deserialize;

use crate::version::range::{Range, satisfies};
use crate::version::semver::{compare, parse_version};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Cvss {
    #[serde(default)]
    pub score: f64,
}

/// One entry of the bulk advisory response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Advisory {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub cvss: Cvss,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Range of affected versions (e.g., "<4.17.21")
    pub vulnerable_versions: String,
}

impl Advisory {
    /// Whether `version` lies in the vulnerable range
    pub fn affects(&self, version: &str) -> bool {
        satisfies(version, &self.vulnerable_versions, false)
    }
}

/// Versions to move to, away from an advisory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    /// Smallest unaffected version above the installed one
    pub upgrade: Option<String>,
    /// Largest unaffected version below the installed one, searched only without an upgrade
    pub downgrade: Option<String>,
}

/// Search `stable_versions` for versions not covered by any of `advisories`.
pub fn find_remediation(
    installed: &str,
    stable_versions: &[String],
    advisories: &[Advisory],
) -> Remediation {
    let Some(installed) = parse_version(installed) else {
        return Remediation {
            upgrade: None,
            downgrade: None,
        };
    };

    let ranges: Vec<Range> = advisories
        .iter()
        .filter_map(|advisory| Range::parse(&advisory.vulnerable_versions).ok())
        .collect();

    let unaffected: Vec<_> = stable_versions
        .iter()
        .filter_map(|raw| parse_version(raw).map(|parsed| (raw, parsed)))
        .filter(|(_, parsed)| parsed.pre.is_empty())
        .filter(|(_, parsed)| !ranges.iter().any(|range| range.satisfies(parsed, false)))
        .collect();

    let upgrade = unaffected
        .iter()
        .filter(|(_, parsed)| compare(parsed, &installed).is_gt())
        .min_by(|(_, a), (_, b)| compare(a, b))
        .map(|(raw, _)| raw.to_string());

    let downgrade = if upgrade.is_none() {
        unaffected
            .iter()
            .filter(|(_, parsed)| compare(parsed, &installed).is_lt())
            .max_by(|(_, a), (_, b)| compare(a, b))
            .map(|(raw, _)| raw.to_string())
    } else {
        None
    };

    Remediation { upgrade, downgrade }
}
