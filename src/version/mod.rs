//! Version management layer for npm dependency checking
//!
//! This module provides the core functionality for fetching, caching, and
//! evaluating package versions against the npm registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registries │────▶│   Client    │◀────│  Evaluator  │
//! │ (http, cli) │     │  (cached)   │     │ (classify)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//! ┌─────────────┐                         ┌─────────────┐
//! │  Installed  │────────────────────────▶│    Range    │
//! │ (npm, pnpm) │                         │ (npm semver)│
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`advisory`]: Security advisories and remediation search
//! - [`cache`]: TTL caches with shared in-flight fetches
//! - [`client`]: Cached registry front (versions and advisories)
//! - [`decision`]: `UpdateDecision` and its classifications
//! - [`evaluator`]: Per-dependency update decision
//! - [`installed`]: Package manager detection and installed versions
//! - [`limiter`]: Bounded concurrency for evaluations
//! - [`range`]: npm range grammar
//! - [`registry`]: Traits for fetching versions and advisories
//! - [`registries`]: Concrete implementations (HTTP, `npm view`, fallback)
//! - [`semver`]: Version parsing, coercion and diffing
//! - [`types`]: Common types like `PackageVersions`

pub mod advisory;
pub mod cache;
pub mod client;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod installed;
pub mod limiter;
pub mod range;
pub mod registries;
pub mod registry;
pub mod semver;
pub mod types;
