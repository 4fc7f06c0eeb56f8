//! LSP (Language Server Protocol) implementation layer
//!
//! This module handles communication with editors via LSP and turns update
//! decisions into diagnostics, inlay hints and quick fixes.
//!
//! # Modules
//!
//! - [`backend`]: Main LSP backend implementing `LanguageServer` trait
//! - [`code_action`]: Quick fixes rewriting declared versions
//! - [`debounce`]: Trailing-edge scheduling of analysis passes and refreshes
//! - [`decorations`]: Inlay hints at the end of dependency lines
//! - [`diagnostics`]: Update decisions for a manifest and their diagnostics
//! - [`server`]: LSP server initialization and lifecycle

pub mod backend;
pub mod code_action;
pub mod debounce;
pub mod decorations;
pub mod diagnostics;
pub mod server;
