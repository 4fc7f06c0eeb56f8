//! Registry implementations for fetching package data

pub mod fallback;
pub mod npm;
pub mod npm_cli;

pub use fallback::FallbackRegistry;
pub use npm::NpmRegistry;
pub use npm_cli::NpmCliRegistry;
