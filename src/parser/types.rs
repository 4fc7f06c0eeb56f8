//! Common types for parsers

/// Where the declared version text lives in the source document
///
/// Offsets exclude the surrounding quotes; `line`/`column` are 0-indexed.
/// Columns count UTF-16 code units, the LSP default position encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionLocation {
    /// Byte offset of the version string in the source (start)
    pub start_offset: usize,
    /// Byte offset of the version string in the source (end)
    pub end_offset: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed)
    pub column: usize,
    /// Column right after the last character of the version text
    pub end_column: usize,
}

/// One dependency entry declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    /// Package name (e.g., "lodash", "@types/node")
    pub name: String,
    /// Version range exactly as written by the user (e.g., "^1.2.0")
    pub version: String,
    pub location: VersionLocation,
}

/// Whether the URI points at an npm manifest
pub fn is_package_json(uri: &str) -> bool {
    uri.ends_with("/package.json") || uri.ends_with("\\package.json")
}

/// Whether the URI points at a lockfile whose change invalidates the installed set
pub fn is_lockfile(uri: &str) -> bool {
    ["package-lock.json", "pnpm-lock.yaml"]
        .iter()
        .any(|name| uri.ends_with(&format!("/{name}")) || uri.ends_with(&format!("\\{name}")))
}
