//! Shared helpers for the LSP integration tests

#![allow(dead_code)]

mod lsp;
mod registry;

pub use lsp::*;
pub use registry::*;
