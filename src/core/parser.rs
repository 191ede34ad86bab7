use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Component, Path};
use tracing::{debug, info, warn};
use tree_sitter::{Node, Tree};

use crate::config::ParsingConfig;
use crate::error::{JavalensError, Result};
use super::languages::java::{self, declaration_name, is_type_declaration};
use super::languages::{JavaParser, LanguageParser};

/// One import line of a compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// Imported name without the trailing `.*`
    pub path: String,

    pub is_static: bool,

    pub is_wildcard: bool,
}

impl Import {
    /// Last segment of the imported name
    pub fn simple_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// A type declared somewhere in a compilation unit
#[derive(Debug, Clone, Copy)]
pub struct DeclaredType<'t> {
    pub node: Node<'t>,
    pub kind: &'static str,
}

/// A parsed Java source file together with its syntax tree
pub struct CompilationUnit {
    /// Path relative to the source root, always `/`-separated
    pub relative_path: String,

    /// Declared package, empty for the default package
    pub package: String,

    pub imports: Vec<Import>,

    pub source: String,

    tree: Tree,

    line_starts: Vec<usize>,
}

impl std::fmt::Debug for CompilationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationUnit")
            .field("relative_path", &self.relative_path)
            .field("package", &self.package)
            .field("imports", &self.imports.len())
            .finish()
    }
}

impl CompilationUnit {
    pub fn new(relative_path: String, source: String, tree: Tree) -> Self {
        let (package, imports) = read_header(tree.root_node(), &source);
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            relative_path,
            package,
            imports,
            source,
            tree,
            line_starts,
        }
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    pub fn text(&self, node: Node) -> &str {
        java::node_text(node, &self.source)
    }

    /// Raw text of a 1-based line, without the line terminator
    pub fn line(&self, number: usize) -> Option<&str> {
        let start = *self.line_starts.get(number.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(number)
            .copied()
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches(['\n', '\r']))
    }

    /// `file:Lstart-Lend`
    pub fn span(&self, start_line: usize, end_line: usize) -> String {
        format!("{}:L{}-L{}", self.relative_path, start_line, end_line)
    }

    /// `file:Lline:Ccol` at the start of a node
    pub fn position(&self, node: Node) -> String {
        format!(
            "{}:L{}:C{}",
            self.relative_path,
            java::start_line(node),
            java::start_column(node)
        )
    }

    /// Qualify a top-level type name with this unit's package
    pub fn qualify(&self, name: &str) -> String {
        if self.package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.package, name)
        }
    }

    /// Every type declared in the unit with its fully qualified name,
    /// nested and local types included, in source order
    pub fn declared_types(&self) -> Vec<(String, DeclaredType<'_>)> {
        let mut found = Vec::new();
        collect_types(self.root(), &self.source, &self.package, &mut found);
        found
    }
}

fn collect_types<'t>(
    node: Node<'t>,
    source: &str,
    prefix: &str,
    found: &mut Vec<(String, DeclaredType<'t>)>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = child.kind();
        if is_type_declaration(kind) {
            if let Some(name) = declaration_name(child, source) {
                let fqn = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{}.{}", prefix, name)
                };
                let kind = java::TYPE_DECLARATION_KINDS
                    .iter()
                    .copied()
                    .find(|k| *k == kind)
                    .unwrap_or("class_declaration");
                found.push((fqn.clone(), DeclaredType { node: child, kind }));
                collect_types(child, source, &fqn, found);
                continue;
            }
        }
        collect_types(child, source, prefix, found);
    }
}

fn read_header(root: Node, source: &str) -> (String, Vec<Import>) {
    let mut package = String::new();
    let mut imports = Vec::new();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_declaration" => {
                if let Some(name) = qualified_name(child, source) {
                    package = name;
                }
            }
            "import_declaration" => {
                let mut inner = child.walk();
                let tokens: Vec<Node> = child.children(&mut inner).collect();
                let is_static = tokens.iter().any(|t| t.kind() == "static");
                let is_wildcard = tokens.iter().any(|t| t.kind() == "asterisk");
                if let Some(path) = qualified_name(child, source) {
                    imports.push(Import {
                        path,
                        is_static,
                        is_wildcard,
                    });
                }
            }
            _ => {}
        }
    }

    (package, imports)
}

fn qualified_name(node: Node, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let name = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "identifier" | "scoped_identifier"))
        .map(|c| java::node_text(c, source).split_whitespace().collect::<String>());
    name
}

/// Source tree provider: walks a root directory and parses every Java file
pub struct CodeParser {
    config: ParsingConfig,
    parser: Box<dyn LanguageParser>,
}

impl CodeParser {
    pub fn new(config: &ParsingConfig) -> Result<Self> {
        let parser = JavaParser::new()?;
        debug!("Initialized {} parser", parser.language_name());

        Ok(Self {
            config: config.clone(),
            parser: Box::new(parser),
        })
    }

    /// Parse every matching file under `root`, ordered by path
    pub async fn parse_directory<P: AsRef<Path>>(&mut self, root: P) -> Result<Vec<CompilationUnit>> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(JavalensError::InvalidRoot(root.to_path_buf()));
        }
        let root = tokio::fs::canonicalize(root).await?;

        // Use ignore crate to respect .gitignore
        let walker = WalkBuilder::new(&root)
            .hidden(false)
            .git_ignore(true)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| JavalensError::FileSystem(e.to_string()))?;
            let path = entry.path();
            if path.is_file() && self.should_parse_file(&root, path) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();

        let mut units = Vec::with_capacity(paths.len());
        for path in paths {
            let relative = relative_path(&root, &path);

            let size = tokio::fs::metadata(&path).await?.len();
            if size > self.config.max_file_size as u64 {
                warn!("Skipping {}: {} bytes exceeds size limit", relative, size);
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            let source = match String::from_utf8(bytes) {
                Ok(source) => source,
                Err(_) => {
                    warn!("Skipping {}: not valid UTF-8", relative);
                    continue;
                }
            };

            let unit = self.parse_source(&path, relative, source)?;
            if unit.has_errors() && self.config.skip_files_with_errors {
                warn!("Skipping {}: syntax errors", unit.relative_path);
                continue;
            }
            units.push(unit);
        }

        info!("Parsed {} compilation units", units.len());
        Ok(units)
    }

    /// Parse in-memory source into a compilation unit
    pub fn parse_source(
        &mut self,
        path: &Path,
        relative_path: String,
        source: String,
    ) -> Result<CompilationUnit> {
        let tree = self.parser.parse(&source, path)?;
        Ok(CompilationUnit::new(relative_path, source, tree))
    }

    /// Determine if a file should be parsed based on configuration
    fn should_parse_file(&self, root: &Path, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let wanted = if self.config.file_extensions.is_empty() {
            self.parser.file_extensions().contains(&extension)
        } else {
            self.config.file_extensions.iter().any(|e| e == extension)
        };

        wanted && !self.is_ignored(&relative_path(root, path))
    }

    /// Patterns ending in `/` name directories; anything else is a path fragment
    fn is_ignored(&self, relative: &str) -> bool {
        self.config.ignore_patterns.iter().any(|pattern| {
            match pattern.strip_suffix('/') {
                Some(dir) => relative
                    .split('/')
                    .rev()
                    .skip(1)
                    .any(|segment| segment == dir),
                None => relative.contains(pattern.as_str()),
            }
        })
    }
}

/// `/`-separated path of `path` relative to `root`
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
