// src/core/call_graph/visualizer.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use which::which;

use super::call_graph::{CallGraph, CallGraphNode};
use crate::error::{JavalensError, Result};

const FALLBACK_COLOR: &str = "lightgray";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutEngine {
    /// Hierarchical
    Dot,
    /// Spring model
    Neato,
}

impl LayoutEngine {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dot" => Some(Self::Dot),
            "neato" => Some(Self::Neato),
            _ => None,
        }
    }

    /// Unknown names fall back to `dot` with a warning
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!("Unknown layout engine '{}', using dot", name);
            Self::Dot
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::Neato => "neato",
        }
    }

    fn splines(&self) -> &'static str {
        match self {
            Self::Dot => "ortho",
            Self::Neato => "polyline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    Png,
    Dot,
}

impl ImageFormat {
    /// Format by file extension, SVG when unrecognized
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => Self::Png,
            Some("dot") | Some("gv") => Self::Dot,
            _ => Self::Svg,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Dot => "dot",
        }
    }
}

/// Image path next to the JSON output: `graph.json` becomes `graph.svg`
pub fn default_image_path(output: Option<&Path>) -> PathBuf {
    let Some(output) = output else {
        return PathBuf::from("call_graph.svg");
    };

    let is_data_file = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "json" || e == "txt")
        .unwrap_or(false);

    if is_data_file {
        output.with_extension("svg")
    } else {
        let mut name = output.as_os_str().to_owned();
        name.push(".svg");
        PathBuf::from(name)
    }
}

/// Renders a [`CallGraph`] through Graphviz
pub struct CallGraphVisualizer<'a> {
    graph: &'a CallGraph,
    class_filters: Vec<String>,
    class_colors: BTreeMap<String, String>,
}

impl<'a> CallGraphVisualizer<'a> {
    pub fn new(graph: &'a CallGraph, palette: &[String]) -> Self {
        let mut class_colors = BTreeMap::new();
        for node in graph.nodes() {
            class_colors.insert(simple_class_name(&node.class_name).to_string(), String::new());
        }
        for (i, color) in class_colors.values_mut().enumerate() {
            *color = if palette.is_empty() {
                FALLBACK_COLOR.to_string()
            } else {
                palette[i % palette.len()].clone()
            };
        }

        Self {
            graph,
            class_filters: Vec::new(),
            class_colors,
        }
    }

    /// Keep only methods whose class name contains one of the filters, ignoring case
    pub fn with_class_filters<S: AsRef<str>>(mut self, filters: &[S]) -> Self {
        self.class_filters = filters
            .iter()
            .map(|f| f.as_ref().trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    pub fn color_of(&self, class_name: &str) -> &str {
        self.class_colors
            .get(simple_class_name(class_name))
            .map(String::as_str)
            .unwrap_or(FALLBACK_COLOR)
    }

    /// Nodes passing the class filter, minus those without any edge when requested
    pub fn visible_nodes(&self, remove_isolated: bool) -> Vec<&'a CallGraphNode> {
        self.graph
            .nodes()
            .filter(|node| {
                if self.class_filters.is_empty() {
                    return true;
                }
                let class_name = node.class_name.to_lowercase();
                self.class_filters.iter().any(|f| class_name.contains(f.as_str()))
            })
            .filter(|node| !remove_isolated || !node.is_isolated())
            .collect()
    }

    pub fn to_dot(&self, layout: LayoutEngine, remove_isolated: bool) -> String {
        let nodes = self.visible_nodes(remove_isolated);
        let mut dot = String::new();

        dot.push_str("digraph callgraph {\n");
        dot.push_str(&format!(
            "  graph [rankdir=TB, dpi=150, layout={}, splines={}];\n",
            layout.as_str(),
            layout.splines()
        ));
        dot.push_str("  node [shape=box, style=filled, fontsize=10, fontname=\"Arial\"];\n");
        dot.push_str("  edge [style=solid, color=deepskyblue, arrowsize=0.7];\n");

        for node in &nodes {
            let label = format!("{}.{}", simple_class_name(&node.class_name), node.method_name);
            dot.push_str(&format!(
                "  {} [label={}, fillcolor={}];\n",
                quote(&node.method_signature),
                quote(&label),
                quote(self.color_of(&node.class_name))
            ));
        }

        let visible: std::collections::HashSet<&str> =
            nodes.iter().map(|n| n.method_signature.as_str()).collect();
        for node in &nodes {
            for callee in node.callees.iter().filter(|c| visible.contains(c.as_str())) {
                dot.push_str(&format!(
                    "  {} -> {};\n",
                    quote(&node.method_signature),
                    quote(callee)
                ));
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Write the graph to `output`, rendering with Graphviz unless the target is a DOT file
    pub async fn render(&self, output: &Path, layout: LayoutEngine, remove_isolated: bool) -> Result<()> {
        let nodes = self.visible_nodes(remove_isolated);
        if nodes.is_empty() {
            warn!("No call graph nodes left to draw after filtering");
            return Ok(());
        }
        debug!("Drawing {} of {} methods", nodes.len(), self.graph.len());

        let dot = self.to_dot(layout, remove_isolated);
        let format = ImageFormat::from_path(output);

        if format == ImageFormat::Dot {
            tokio::fs::write(output, dot).await?;
        } else {
            run_graphviz(&dot, layout, format, output).await?;
        }

        info!("Call graph image written to {} ({})", output.display(), format.as_str());
        Ok(())
    }
}

async fn run_graphviz(dot: &str, layout: LayoutEngine, format: ImageFormat, output: &Path) -> Result<()> {
    let binary = which("dot")
        .map_err(|e| JavalensError::Visualization(format!("Graphviz 'dot' not found: {}", e)))?;

    let mut child = Command::new(binary)
        .arg(format!("-K{}", layout.as_str()))
        .arg(format!("-T{}", format.as_str()))
        .arg("-o")
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(dot.as_bytes()).await?;
    }

    let result = child.wait_with_output().await?;
    if !result.status.success() {
        return Err(JavalensError::Visualization(
            String::from_utf8_lossy(&result.stderr).trim().to_string(),
        ));
    }

    Ok(())
}

fn simple_class_name(class_name: &str) -> &str {
    if class_name.is_empty() {
        return "Unknown";
    }
    class_name.rsplit('.').next().unwrap_or(class_name)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
