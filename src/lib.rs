pub mod config;
pub mod exec;
pub mod lsp;
pub mod parser;
pub mod version;
