//! Parser layer
//! - traits.rs: Parser trait definition
//! - types.rs: Common types (DependencyDeclaration, VersionLocation)
//! - package_json.rs: package.json parser

pub mod package_json;
pub mod traits;
pub mod types;

pub use package_json::PackageJsonParser;
pub use traits::{ParseError, Parser};
pub use types::{DependencyDeclaration, VersionLocation};
