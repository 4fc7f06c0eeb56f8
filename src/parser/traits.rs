//! Parser trait definition

#[cfg(test)]
use mockall::automock;

use crate::parser::types::DependencyDeclaration;

/// Trait for extracting declared dependencies from a manifest
#[cfg_attr(test, automock)]
pub trait Parser: Send + Sync {
    /// Parse the content and extract the declared dependencies.
    ///
    /// Names are unique in the result; a later declaration replaces an
    /// earlier one with the same name.
    fn parse(&self, content: &str) -> Result<Vec<DependencyDeclaration>, ParseError>;
}

/// Error type for parsing operations
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to parse the file structure
    #[error("Failed to parse file: {0}")]
    ParseFailed(String),

    /// Tree-sitter related error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),
}
