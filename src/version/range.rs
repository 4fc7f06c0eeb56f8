//! npm range grammar
//!
//! Supports the range dialect found in `package.json`:
//! - `1.2.3`, `=1.2.3`, `v1.2.3` - exact match
//! - `^1.2.3` - compatible with version (>=1.2.3 <2.0.0-0)
//! - `~1.2.3` - approximately equivalent (>=1.2.3 <1.3.0-0)
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `1.2.x`, `1.x`, `1`, `*`, `""` - wildcards and partial versions
//! - `1.2.3 - 2.3.4` - hyphen ranges
//! - `>=1.0.0 <2.0.0` (AND) and `^1.0.0 || ^2.0.0` (OR)
//!
//! Every range is desugared into a union of comparator sets.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

use crate::version::semver::{compare, parse_version};

/// Largest component node-semver accepts (`Number.MAX_SAFE_INTEGER`)
const MAX_COMPONENT: u64 = (1 << 53) - 1;

static PARTIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^v?(0|[1-9]\d*|[xX*])(?:\.(0|[1-9]\d*|[xX*])(?:\.(0|[1-9]\d*|[xX*])(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?)?)?$",
    )
    .expect("partial version pattern is valid")
});

static HYPHEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+-\s+(\S+)$").expect("hyphen pattern is valid"));

static OPERATOR_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(~>|<=|>=|[~^<>=])\s+").expect("operator spacing pattern is valid")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid range: {0}")]
pub struct RangeError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    fn test(&self, version: &Version) -> bool {
        let ordering = compare(version, &self.version);
        match self.op {
            Op::Eq => ordering == Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A version written with optional wildcard components
#[derive(Debug)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(text: &str) -> Option<Self> {
        let captures = PARTIAL_RE.captures(text)?;
        let component = |index: usize| -> Result<Option<u64>, ()> {
            match captures.get(index).map(|m| m.as_str()) {
                None | Some("x") | Some("X") | Some("*") => Ok(None),
                Some(digits) => match digits.parse::<u64>() {
                    Ok(value) if value <= MAX_COMPONENT => Ok(Some(value)),
                    _ => Err(()),
                },
            }
        };

        let major = component(1).ok()?;
        // Anything after a wildcard is a wildcard too
        let minor = major.and(component(2).ok()?);
        let patch = minor.and(component(3).ok()?);
        let pre = match (patch, captures.get(4)) {
            (Some(_), Some(m)) => Prerelease::new(m.as_str()).ok()?,
            _ => Prerelease::EMPTY,
        };

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
            build: semver::BuildMetadata::EMPTY,
        }
    }
}

/// `major.minor.patch-0`, the lowest version of a release line
fn lowest(major: u64, minor: u64, patch: u64) -> Version {
    Version {
        major,
        minor,
        patch,
        pre: Prerelease::new("0").unwrap_or(Prerelease::EMPTY),
        build: semver::BuildMetadata::EMPTY,
    }
}

fn next(component: u64) -> Option<u64> {
    component.checked_add(1)
}

/// Union of comparator sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    raw: String,
    sets: Vec<Vec<Comparator>>,
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Range {
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let sets = input
            .split("||")
            .map(|set| Self::parse_set(set.trim()).ok_or_else(|| RangeError(input.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: input.to_string(),
            sets,
        })
    }

    fn parse_set(set: &str) -> Option<Vec<Comparator>> {
        if let Some(captures) = HYPHEN_RE.captures(set) {
            return Self::parse_hyphen(&captures[1], &captures[2]);
        }

        let normalized = OPERATOR_SPACE_RE.replace_all(set, "$1");
        let mut comparators = Vec::new();
        for token in normalized.split_whitespace() {
            comparators.extend(Self::parse_token(token)?);
        }
        Some(comparators)
    }

    fn parse_hyphen(from: &str, to: &str) -> Option<Vec<Comparator>> {
        let from = Partial::parse(from)?;
        let to = Partial::parse(to)?;
        let mut comparators = Vec::new();

        if from.major.is_some() {
            comparators.push(Comparator::new(Op::Gte, from.floor()));
        }

        match (to.major, to.minor, to.patch) {
            (None, _, _) => {}
            (Some(major), None, _) => {
                comparators.push(Comparator::new(Op::Lt, lowest(next(major)?, 0, 0)))
            }
            (Some(major), Some(minor), None) => {
                comparators.push(Comparator::new(Op::Lt, lowest(major, next(minor)?, 0)))
            }
            (Some(_), Some(_), Some(_)) => comparators.push(Comparator::new(Op::Lte, to.floor())),
        }

        Some(comparators)
    }

    fn parse_token(token: &str) -> Option<Vec<Comparator>> {
        if let Some(rest) = token.strip_prefix('^') {
            return Self::caret(Partial::parse(rest)?);
        }
        if let Some(rest) = token.strip_prefix("~>").or_else(|| token.strip_prefix('~')) {
            return Self::tilde(Partial::parse(rest)?);
        }

        let (op, rest) = [
            (">=", Op::Gte),
            ("<=", Op::Lte),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ]
        .into_iter()
        .find_map(|(prefix, op)| token.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((Op::Eq, token));

        Self::primitive(op, Partial::parse(rest)?)
    }

    fn caret(partial: Partial) -> Option<Vec<Comparator>> {
        let upper = match (partial.major, partial.minor, partial.patch) {
            (None, _, _) => return Some(Vec::new()),
            (Some(major), None, _) => lowest(next(major)?, 0, 0),
            (Some(0), Some(minor), None) => lowest(0, next(minor)?, 0),
            (Some(major), Some(_), None) => lowest(next(major)?, 0, 0),
            (Some(0), Some(0), Some(patch)) => lowest(0, 0, next(patch)?),
            (Some(0), Some(minor), Some(_)) => lowest(0, next(minor)?, 0),
            (Some(major), Some(_), Some(_)) => lowest(next(major)?, 0, 0),
        };
        Some(vec![
            Comparator::new(Op::Gte, partial.floor()),
            Comparator::new(Op::Lt, upper),
        ])
    }

    fn tilde(partial: Partial) -> Option<Vec<Comparator>> {
        let upper = match (partial.major, partial.minor) {
            (None, _) => return Some(Vec::new()),
            (Some(major), None) => lowest(next(major)?, 0, 0),
            (Some(major), Some(minor)) => lowest(major, next(minor)?, 0),
        };
        Some(vec![
            Comparator::new(Op::Gte, partial.floor()),
            Comparator::new(Op::Lt, upper),
        ])
    }

    fn primitive(op: Op, partial: Partial) -> Option<Vec<Comparator>> {
        let (Some(major), minor, patch) = (partial.major, partial.minor, partial.patch) else {
            // Bare wildcard: `<*` and `>*` match nothing, the rest match anything
            return Some(match op {
                Op::Lt | Op::Gt => vec![Comparator::new(Op::Lt, lowest(0, 0, 0))],
                _ => Vec::new(),
            });
        };

        if patch.is_some() {
            return Some(vec![Comparator::new(op, partial.floor())]);
        }

        // Partial version: the range covers the whole release line
        let next_line = match minor {
            Some(minor) => lowest(major, next(minor)?, 0),
            None => lowest(next(major)?, 0, 0),
        };
        let floor = partial.floor();

        Some(match op {
            Op::Eq => vec![
                Comparator::new(Op::Gte, floor),
                Comparator::new(Op::Lt, next_line),
            ],
            Op::Gte => vec![Comparator::new(Op::Gte, floor)],
            Op::Gt => vec![Comparator::new(
                Op::Gte,
                Version::new(next_line.major, next_line.minor, next_line.patch),
            )],
            Op::Lt => vec![Comparator::new(Op::Lt, lowest(major, minor.unwrap_or(0), 0))],
            Op::Lte => vec![Comparator::new(Op::Lt, next_line)],
        })
    }

    /// Whether `version` falls in any comparator set.
    ///
    /// A pre-release only matches a set that names a pre-release on the same
    /// `major.minor.patch`, unless `include_prerelease` is set.
    pub fn satisfies(&self, version: &Version, include_prerelease: bool) -> bool {
        self.sets
            .iter()
            .any(|set| Self::test_set(set, version, include_prerelease))
    }

    fn test_set(set: &[Comparator], version: &Version, include_prerelease: bool) -> bool {
        if !set.iter().all(|c| c.test(version)) {
            return false;
        }

        if version.pre.is_empty() || include_prerelease {
            return true;
        }

        set.iter().any(|c| {
            !c.version.pre.is_empty()
                && c.version.major == version.major
                && c.version.minor == version.minor
                && c.version.patch == version.patch
        })
    }
}

/// Whether the string is a syntactically valid range
pub fn valid_range(range: &str) -> bool {
    Range::parse(range).is_ok()
}

/// Whether `version` is a valid version that satisfies `range`
pub fn satisfies(version: &str, range: &str, include_prerelease: bool) -> bool {
    match (parse_version(version), Range::parse(range)) {
        (Some(version), Ok(range)) => range.satisfies(&version, include_prerelease),
        _ => false,
    }
}

/// Highest version in `versions` satisfying `range`.
///
/// Unparsable versions are skipped; the original string is returned.
pub fn max_satisfying(versions: &[String], range: &str, include_prerelease: bool) -> Option<String> {
    let range = Range::parse(range).ok()?;
    versions
        .iter()
        .filter_map(|raw| parse_version(raw).map(|parsed| (raw, parsed)))
        .filter(|(_, parsed)| range.satisfies(parsed, include_prerelease))
        .max_by(|(_, a), (_, b)| compare(a, b))
        .map(|(raw, _)| raw.clone())
}

/// Lowest version in `versions` satisfying `range`
pub fn min_satisfying(versions: &[String], range: &str, include_prerelease: bool) -> Option<String> {
    let range = Range::parse(range).ok()?;
    versions
        .iter()
        .filter_map(|raw| parse_version(raw).map(|parsed| (raw, parsed)))
        .filter(|(_, parsed)| range.satisfies(parsed, include_prerelease))
        .min_by(|(_, a), (_, b)| compare(a, b))
        .map(|(raw, _)| raw.clone())
}
