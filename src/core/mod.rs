// src/core/mod.rs
mod engine;
mod parser;
mod scope;

// Language-specific parsing
mod languages;

// Symbol resolution shared by the analyzers
mod resolver;
mod implementors;

// Analyses
mod endpoints;
mod references;
mod definitions;
mod call_graph;

pub use parser::{CodeParser, CompilationUnit};
pub use resolver::ProjectResolver;
pub use implementors::InterfaceImplementorIndex;
pub use endpoints::{ControllerAnalysis, EndpointExtractor, EndpointInfo};
pub use references::{LineFilter, ReferenceFinder, ReferenceRecord};
pub use definitions::{DefinitionFinder, DefinitionRecord};

// Export the main engine
pub use engine::{CallGraphOptions, Engine};
