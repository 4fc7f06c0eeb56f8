//! package.json parser

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::parser::traits::{ParseError, Parser};
use crate::parser::types::{DependencyDeclaration, VersionLocation};

/// Parser for package.json files
pub struct PackageJsonParser;

impl PackageJsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PackageJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PackageJsonParser {
    fn parse(&self, content: &str) -> Result<Vec<DependencyDeclaration>, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_json::LANGUAGE;
        parser.set_language(&language.into()).map_err(|e| {
            warn!("Failed to set JSON language for tree-sitter: {}", e);
            ParseError::TreeSitter(e.to_string())
        })?;

        let tree = parser.parse(content, None).ok_or_else(|| {
            warn!("Failed to parse JSON content");
            ParseError::ParseFailed("Failed to parse JSON".to_string())
        })?;

        let root = tree.root_node();
        let mut results = IndexMap::new();

        if let Some(document) = root.child(0)
            && document.kind() == "object"
        {
            self.extract_dependencies(document, content, &mut results);
        }

        Ok(results.into_values().collect())
    }
}

impl PackageJsonParser {
    /// Dependency sections merged into the evaluated set, in precedence order
    const DEPENDENCY_FIELDS: [&'static str; 2] = ["dependencies", "devDependencies"];

    /// Specifier prefixes that do not resolve against the registry
    const NON_REGISTRY_PREFIXES: [&'static str; 9] = [
        "npm:",
        "file:",
        "link:",
        "workspace:",
        "portal:",
        "git:",
        "git+",
        "http:",
        "https:",
    ];

    /// Whether the value is an alias, path, or URL specifier instead of a range
    fn is_non_registry_specifier(value: &str) -> bool {
        let value = value.trim();
        Self::NON_REGISTRY_PREFIXES
            .iter()
            .any(|prefix| value.starts_with(prefix))
            // GitHub shorthand: user/repo or user/repo#ref
            || (value.contains('/') && !value.starts_with('@') && !value.contains(' '))
    }

    fn extract_dependencies(
        &self,
        object_node: tree_sitter::Node,
        content: &str,
        results: &mut IndexMap<String, DependencyDeclaration>,
    ) {
        for field in Self::DEPENDENCY_FIELDS {
            let mut cursor = object_node.walk();

            for child in object_node.children(&mut cursor) {
                if child.kind() != "pair" {
                    continue;
                }

                let Some(key_node) = child.child_by_field_name("key") else {
                    continue;
                };

                if self.get_string_value(key_node, content) != field {
                    continue;
                }

                let Some(value_node) = child.child_by_field_name("value") else {
                    continue;
                };

                if value_node.kind() == "object" {
                    self.extract_packages_from_object(value_node, content, results);
                }
            }
        }
    }

    /// Extract packages from a dependency object (e.g., "dependencies": { ... })
    ///
    /// A name seen again replaces the earlier declaration but keeps its position.
    fn extract_packages_from_object(
        &self,
        object_node: tree_sitter::Node,
        content: &str,
        results: &mut IndexMap<String, DependencyDeclaration>,
    ) {
        let mut cursor = object_node.walk();

        for child in object_node.children(&mut cursor) {
            if child.kind() != "pair" {
                continue;
            }

            let Some(key_node) = child.child_by_field_name("key") else {
                continue;
            };

            let Some(value_node) = child.child_by_field_name("value") else {
                continue;
            };

            if value_node.kind() != "string" {
                continue;
            }

            let name = self.get_string_value(key_node, content);
            let version = self.get_string_value(value_node, content);

            if Self::is_non_registry_specifier(&version) {
                debug!("Skipping non-registry specifier {}: {}", name, version);
                continue;
            }

            let start_point = value_node.start_position();

            // Adjust for quotes - the actual version starts after the opening quote
            let start_offset = value_node.start_byte() + 1;
            let end_offset = value_node.end_byte() - 1;
            let line_start = value_node.start_byte() - start_point.column;
            let column = utf16_len(&content[line_start..start_offset]);
            let location = VersionLocation {
                start_offset,
                end_offset,
                line: start_point.row,
                column,
                end_column: column + utf16_len(&content[start_offset..end_offset]),
            };

            results.insert(
                name.clone(),
                DependencyDeclaration {
                    name,
                    version,
                    location,
                },
            );
        }
    }

    /// Get the string value from a string node (removes quotes)
    fn get_string_value(&self, node: tree_sitter::Node, content: &str) -> String {
        let text = &content[node.byte_range()];
        text.trim()
            .trim_start_matches('"')
            .trim_end_matches('"')
            .to_string()
    }
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}
