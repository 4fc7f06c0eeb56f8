//! npm-flavoured semver helpers: parsing, coercion and release diffing

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

static COERCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,16})(?:\.(\d{1,16}))?(?:\.(\d{1,16}))?(?:$|\D)")
        .expect("coerce pattern is valid")
});

static LEADING_NON_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\D+").expect("prefix pattern is valid"));

/// Kind of difference between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseType {
    Major,
    Minor,
    Patch,
    Premajor,
    Preminor,
    Prepatch,
    Prerelease,
}

impl ReleaseType {
    /// Ordinal rank compared against the configured level floor.
    ///
    /// Every pre-release kind ranks below `patch`.
    pub fn rank(&self) -> i8 {
        match self {
            ReleaseType::Patch => 0,
            ReleaseType::Minor => 1,
            ReleaseType::Major => 2,
            ReleaseType::Premajor
            | ReleaseType::Preminor
            | ReleaseType::Prepatch
            | ReleaseType::Prerelease => -1,
        }
    }
}

/// Parse a full `major.minor.patch[-pre][+build]` version.
///
/// Surrounding whitespace and a single leading `v` or `=` are tolerated.
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('=')
        .or_else(|| trimmed.strip_prefix('v'))
        .unwrap_or(trimmed);
    Version::parse(trimmed.trim_start()).ok()
}

/// Whether the string is a valid full version
pub fn is_valid(version: &str) -> bool {
    parse_version(version).is_some()
}

/// Whether the string is a valid version carrying a pre-release tag
pub fn is_prerelease(version: &str) -> bool {
    parse_version(version).is_some_and(|v| !v.pre.is_empty())
}

/// Compare by semver precedence; build metadata is ignored
pub fn compare(a: &Version, b: &Version) -> Ordering {
    compare_main(a, b).then_with(|| a.pre.cmp(&b.pre))
}

fn compare_main(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
}

/// Compare two version strings by precedence; `None` if either is invalid
pub fn compare_str(a: &str, b: &str) -> Option<Ordering> {
    Some(compare(&parse_version(a)?, &parse_version(b)?))
}

/// Equality by precedence; two invalid strings are never equal
pub fn eq_str(a: &str, b: &str) -> bool {
    compare_str(a, b) == Some(Ordering::Equal)
}

/// Extract the first `X[.Y[.Z]]` run of digits and pad it to a full version.
///
/// Pre-release and build metadata are dropped.
pub fn coerce(input: &str) -> Option<Version> {
    let captures = COERCE_RE.captures(input)?;
    let part = |index: usize| -> Option<u64> {
        captures
            .get(index)
            .map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Strip any leading non-digit characters (`^1.2.3` -> `1.2.3`)
pub fn version_clear(declared: &str) -> String {
    LEADING_NON_DIGITS_RE.replace(declared, "").into_owned()
}

/// The declared version as a concrete version string, coercing when needed
pub fn version_normalized(clear: &str) -> Option<String> {
    if is_valid(clear) {
        return Some(clear.to_string());
    }
    coerce(clear).map(|v| v.to_string())
}

/// Kind of release separating `a` and `b`; `None` when they are equal.
pub fn diff(a: &Version, b: &Version) -> Option<ReleaseType> {
    let comparison = compare(a, b);
    if comparison == Ordering::Equal {
        return None;
    }

    let (high, low) = if comparison == Ordering::Greater {
        (a, b)
    } else {
        (b, a)
    };
    let high_has_pre = !high.pre.is_empty();
    let low_has_pre = !low.pre.is_empty();

    if low_has_pre && !high_has_pre {
        // 1.0.0-1 -> anything stable is a major step
        if low.patch == 0 && low.minor == 0 {
            return Some(ReleaseType::Major);
        }
        if compare_main(low, high) == Ordering::Equal {
            if low.minor != 0 && low.patch == 0 {
                return Some(ReleaseType::Minor);
            }
            return Some(ReleaseType::Patch);
        }
    }

    let release = if a.major != b.major {
        (ReleaseType::Major, ReleaseType::Premajor)
    } else if a.minor != b.minor {
        (ReleaseType::Minor, ReleaseType::Preminor)
    } else if a.patch != b.patch {
        (ReleaseType::Patch, ReleaseType::Prepatch)
    } else {
        return Some(ReleaseType::Prerelease);
    };

    Some(if high_has_pre { release.1 } else { release.0 })
}

/// [`diff`] over strings; `None` if either is invalid or they are equal
pub fn diff_str(a: &str, b: &str) -> Option<ReleaseType> {
    diff(&parse_version(a)?, &parse_version(b)?)
}
