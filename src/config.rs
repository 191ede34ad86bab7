use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{JavalensError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source discovery and parsing configuration
    pub parsing: ParsingConfig,

    /// Marker vocabulary for endpoint extraction
    pub endpoints: EndpointConfig,

    /// Call graph construction and rendering settings
    pub call_graph: CallGraphConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// File extensions to parse
    pub file_extensions: Vec<String>,

    /// Path fragments to ignore while walking the source root
    pub ignore_patterns: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// Drop files whose syntax tree contains parse errors
    pub skip_files_with_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Annotations marking a type as an HTTP controller
    pub controller_annotations: Vec<String>,

    /// Annotations marking a method as an HTTP endpoint, in priority order
    pub mapping_annotations: Vec<String>,

    /// Generic route annotation; also carries the class-level path prefix
    pub route_annotation: String,

    /// Parameter annotation for query parameters
    pub query_param_annotation: String,

    /// Parameter annotation for path variables
    pub path_variable_annotation: String,

    /// Parameter annotation for the request body
    pub body_annotation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphConfig {
    /// Call matching strategy: "name" or "resolved"
    pub matcher: String,

    /// Default Graphviz layout engine (dot, neato)
    pub default_layout: String,

    /// Node fill colors, assigned to owning types in sorted order
    pub palette: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parsing: ParsingConfig {
                file_extensions: vec!["java".to_string()],
                ignore_patterns: vec![
                    "target/".to_string(),
                    "build/".to_string(),
                    ".git/".to_string(),
                    "node_modules/".to_string(),
                ],
                max_file_size: 2 * 1024 * 1024, // 2MB
                skip_files_with_errors: true,
            },
            endpoints: EndpointConfig {
                controller_annotations: vec![
                    "RestController".to_string(),
                    "Controller".to_string(),
                ],
                mapping_annotations: vec![
                    "RequestMapping".to_string(),
                    "GetMapping".to_string(),
                    "PostMapping".to_string(),
                    "PutMapping".to_string(),
                    "DeleteMapping".to_string(),
                    "PatchMapping".to_string(),
                ],
                route_annotation: "RequestMapping".to_string(),
                query_param_annotation: "RequestParam".to_string(),
                path_variable_annotation: "PathVariable".to_string(),
                body_annotation: "RequestBody".to_string(),
            },
            call_graph: CallGraphConfig {
                matcher: "name".to_string(),
                default_layout: "dot".to_string(),
                palette: [
                    "lightblue", "lightcoral", "limegreen", "lightyellow", "lightpink",
                    "lightcyan", "coral", "wheat", "palegreen", "plum",
                ]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            },
            output: OutputConfig { pretty: true },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| JavalensError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration with fallback to default when no path is given.
    /// An explicit path must exist.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                let p = p.as_ref();
                if p.exists() {
                    Self::load(p)
                } else {
                    Err(JavalensError::Config(format!(
                        "Config file {} not found",
                        p.display()
                    )))
                }
            }
            None => {
                let candidates = ["javalens.toml", ".javalens.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
