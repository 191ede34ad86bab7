//! Language front-ends
//!
//! Each language gets its own module exposing a tree-sitter backed parser and
//! the node helpers the analyzers use to read declarations out of the tree.

pub mod java;

pub use java::JavaParser;

use crate::error::Result;

/// Trait that all language parsers must implement
pub trait LanguageParser {
    /// Parse source code into a syntax tree
    fn parse(&mut self, content: &str, file_path: &std::path::Path) -> Result<tree_sitter::Tree>;

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}
