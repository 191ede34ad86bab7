// src/core/engine.rs
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::JavalensError;
use super::call_graph::{
    default_image_path, CallGraph, CallGraphVisualizer, CallMatcher, LayoutEngine, NameMatcher,
    ResolvedMatcher,
};
use super::{
    CodeParser, CompilationUnit, ControllerAnalysis, DefinitionFinder, DefinitionRecord,
    EndpointExtractor, EndpointInfo, InterfaceImplementorIndex, LineFilter, ProjectResolver, ReferenceFinder,
    ReferenceRecord,
};

/// Options of the call graph command
#[derive(Debug, Clone, Default)]
pub struct CallGraphOptions {
    pub output: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub layout: Option<String>,
    pub class_filters: Vec<String>,
    pub keep_isolated: bool,
    pub no_image: bool,
}

/// Main orchestration engine: parses a source root and runs one analysis on it
pub struct Engine {
    config: Config,
    parser: CodeParser,
}

impl Engine {
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let parser = CodeParser::new(&config.parsing)?;
        Ok(Self { config, parser })
    }

    async fn load(&mut self, root: &Path) -> Result<Vec<CompilationUnit>> {
        info!("Parsing Java sources under {}", root.display());
        let units = self
            .parser
            .parse_directory(root)
            .await
            .with_context(|| format!("Failed to read source tree {}", root.display()))?;
        Ok(units)
    }

    /// Endpoints of every controller, plus the per-controller symbol
    /// analyses when `with_analysis` is set
    pub async fn endpoints(
        &mut self,
        root: &Path,
        with_analysis: bool,
    ) -> Result<(Vec<EndpointInfo>, Vec<ControllerAnalysis>)> {
        let units = self.load(root).await?;
        let resolver = ProjectResolver::new(&units);
        debug!("Indexed {} project types", resolver.index().len());

        let extractor = EndpointExtractor::new(&self.config.endpoints, &resolver);
        let endpoints = extractor.extract(&units);
        info!("Found {} endpoints", endpoints.len());

        let analyses = if with_analysis {
            let analyses = extractor.analyze(&units);
            info!("Analyzed symbols of {} controllers", analyses.len());
            analyses
        } else {
            Vec::new()
        };
        Ok((endpoints, analyses))
    }

    pub async fn references(
        &mut self,
        root: &Path,
        symbol: &str,
        filter: Option<LineFilter>,
    ) -> Result<Vec<ReferenceRecord>> {
        require_symbol(symbol)?;
        let units = self.load(root).await?;

        let references = ReferenceFinder::new(symbol).with_filter(filter).find(&units);
        info!("Found {} references to {}", references.len(), symbol);
        Ok(references)
    }

    pub async fn definitions(&mut self, root: &Path, symbol: &str) -> Result<Vec<DefinitionRecord>> {
        require_symbol(symbol)?;
        let units = self.load(root).await?;

        let implementors = InterfaceImplementorIndex::build(&units);
        let definitions = DefinitionFinder::new(&implementors).find(&units, symbol);
        info!("Found {} definitions of {}", definitions.len(), symbol);
        Ok(definitions)
    }

    pub async fn call_graph(&mut self, root: &Path) -> Result<CallGraph> {
        let units = self.load(root).await?;

        let graph = match self.config.call_graph.matcher.as_str() {
            "resolved" => {
                let resolver = ProjectResolver::new(&units);
                CallGraph::build(&units, &ResolvedMatcher::new(&resolver))
            }
            other => {
                if other != "name" {
                    warn!("Unknown call matcher '{}', matching by name", other);
                }
                let matcher: &dyn CallMatcher = &NameMatcher;
                CallGraph::build(&units, matcher)
            }
        };
        Ok(graph)
    }

    /// `api`: list HTTP endpoints, optionally with one symbol analysis file
    /// per controller under `split_dir`
    pub async fn api(&mut self, root: &Path, output: Option<PathBuf>, split_dir: Option<PathBuf>) -> Result<()> {
        let (endpoints, analyses) = self.endpoints(root, split_dir.is_some()).await?;

        if let Some(dir) = &split_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            let mut written = HashSet::new();
            for analysis in &analyses {
                let mut stem = analysis.controller_name.clone();
                if !written.insert(stem.clone()) {
                    stem = analysis
                        .file_path
                        .trim_end_matches(".java")
                        .replace(['/', '\\'], ".");
                    warn!(
                        "Controller name {} is not unique, writing {}.json",
                        analysis.controller_name, stem
                    );
                    written.insert(stem.clone());
                }
                let path = dir.join(format!("{}.json", stem));
                self.write_output(analysis, Some(&path), "Controller analysis").await?;
            }
        }

        self.write_output(&endpoints, output.as_deref(), "API endpoints").await
    }

    /// `ref`: list references to a symbol
    pub async fn find_references(
        &mut self,
        root: &Path,
        symbol: &str,
        file: Option<String>,
        line: Option<usize>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let filter = match (file, line) {
            (Some(file), Some(line)) => Some(LineFilter { file, line }),
            (None, None) => None,
            _ => {
                return Err(JavalensError::InvalidArgument(
                    "file and line must be given together".to_string(),
                )
                .into())
            }
        };

        let references = self.references(root, symbol, filter).await?;
        self.write_output(&references, output.as_deref(), "References").await
    }

    /// `def`: list definitions of a symbol
    pub async fn find_definitions(&mut self, root: &Path, symbol: &str, output: Option<PathBuf>) -> Result<()> {
        let definitions = self.definitions(root, symbol).await?;
        self.write_output(&definitions, output.as_deref(), "Definitions").await
    }

    /// `cg`: build the call graph, write it, then draw it
    pub async fn analyze_call_graph(&mut self, root: &Path, options: CallGraphOptions) -> Result<()> {
        let graph = self.call_graph(root).await?;
        self.write_output(&graph, options.output.as_deref(), "Call graph").await?;

        if options.no_image {
            return Ok(());
        }

        let image = options
            .image
            .clone()
            .unwrap_or_else(|| default_image_path(options.output.as_deref()));
        let layout = LayoutEngine::parse_or_default(
            options
                .layout
                .as_deref()
                .unwrap_or(&self.config.call_graph.default_layout),
        );

        let visualizer = CallGraphVisualizer::new(&graph, &self.config.call_graph.palette)
            .with_class_filters(&options.class_filters);
        if let Err(e) = visualizer.render(&image, layout, !options.keep_isolated).await {
            warn!("Call graph visualization failed: {}", e);
        }

        Ok(())
    }

    async fn write_output<T: Serialize>(&self, value: &T, output: Option<&Path>, description: &str) -> Result<()> {
        let json = if self.config.output.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("{} written to {}", description, path.display());
            }
            None => println!("{}", json),
        }

        Ok(())
    }
}

fn require_symbol(symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(JavalensError::InvalidArgument("symbol must not be empty".to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    const CONTROLLER: &str = r#"package com.acme.web;

import com.acme.service.UserService;
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/api/v2/advanced")
public class AdvancedController {
    private UserService userService;

    @GetMapping("/users/{userId}")
    public String getUser(@PathVariable String userId) {
        return userService.describe(userId);
    }
}
"#;

    const SERVICE: &str = r#"package com.acme.service;

public class UserService {
    public String describe(String id) {
        return format(id);
    }

    private String format(String id) {
        return id;
    }
}
"#;

    fn project() -> assert_fs::TempDir {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main/java/com/acme/web/AdvancedController.java")
            .write_str(CONTROLLER)
            .unwrap();
        temp.child("src/main/java/com/acme/service/UserService.java")
            .write_str(SERVICE)
            .unwrap();
        temp
    }

    fn engine() -> Engine {
        Engine::with_config(Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_api_writes_endpoints() {
        let temp = project();
        let output = temp.child("out/api.json");

        engine()
            .api(temp.path(), Some(output.path().to_path_buf()), None)
            .await
            .unwrap();

        output.assert(predicate::path::exists());
        output.assert(predicate::str::contains("\"path\": \"/api/v2/advanced/users/{userId}\""));
        output.assert(predicate::str::contains("\"method\": \"GET\""));
        output.assert(predicate::str::contains("com.acme.service.UserService"));
    }

    #[tokio::test]
    async fn test_api_split_dir_writes_controller_analysis() {
        let temp = project();
        let output = temp.child("out/api.json");
        let split = temp.child("out/controllers");

        engine()
            .api(
                temp.path(),
                Some(output.path().to_path_buf()),
                Some(split.path().to_path_buf()),
            )
            .await
            .unwrap();

        output.assert(predicate::str::contains("com.acme.service.UserService.describe(String)"));
        let analysis = split.child("AdvancedController.json");
        analysis.assert(predicate::path::exists());
        analysis.assert(predicate::str::contains("\"symbol_table\""));
        analysis.assert(predicate::str::contains("\"usage_type\": \"METHOD_CALL\""));
        analysis.assert(predicate::str::contains("\"total_apis\": 1"));
    }

    #[tokio::test]
    async fn test_definitions_and_references() {
        let temp = project();
        let mut engine = engine();

        let definitions = engine.definitions(temp.path(), "UserService.describe").await.unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].scope, "com.acme.service.UserService");

        let references = engine
            .references(
                temp.path(),
                "userService",
                Some(LineFilter {
                    file: "AdvancedController.java".to_string(),
                    line: 13,
                }),
            )
            .await
            .unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].context, "AdvancedController.getUser");
    }

    #[tokio::test]
    async fn test_call_graph_with_dot_image() {
        let temp = project();
        let output = temp.child("cg.json");
        let image = temp.child("cg.dot");

        engine()
            .analyze_call_graph(
                temp.path(),
                CallGraphOptions {
                    output: Some(output.path().to_path_buf()),
                    image: Some(image.path().to_path_buf()),
                    ..CallGraphOptions::default()
                },
            )
            .await
            .unwrap();

        output.assert(predicate::str::contains("UserService.describe(String)"));
        image.assert(predicate::str::contains(
            "\"UserService.describe(String)\" -> \"UserService.format(String)\"",
        ));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let temp = project();
        let mut engine = engine();

        assert!(engine.definitions(temp.path(), "  ").await.is_err());
        assert!(engine
            .find_references(temp.path(), "userService", Some("A.java".into()), None, None)
            .await
            .is_err());

        let missing = temp.path().join("missing");
        let err = engine.api(&missing, None, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JavalensError>(),
            Some(JavalensError::InvalidRoot(_))
        ));
    }
}
