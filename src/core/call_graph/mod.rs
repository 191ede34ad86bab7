// src/core/call_graph/mod.rs
//! Method-level call graph
//!
//! Construction runs in two passes over every compilation unit. The first
//! registers a node per method declaration, the second attaches each call
//! expression to a registered method chosen by a [`CallMatcher`]. The
//! visualizer turns the result into Graphviz output.

mod call_graph;
mod matcher;
mod visualizer;

pub use call_graph::CallGraph;
pub use matcher::{CallMatcher, NameMatcher, ResolvedMatcher};
pub use visualizer::{default_image_path, CallGraphVisualizer, LayoutEngine};
