// src/core/references.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tree_sitter::Node;

use super::languages::java::{self, declaration_name, is_type_declaration};
use super::parser::CompilationUnit;
use super::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    Call,
    FieldAccess,
    VariableAccess,
    TypeReference,
}

/// One use of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub symbol_name: String,
    pub reference_type: ReferenceKind,

    /// `file:Lline:Ccol`
    pub code_pos: String,

    /// `Type.method`, or `Type` outside any method
    pub context: String,

    /// Trimmed text of the source line
    pub line_content: String,
}

impl ReferenceRecord {
    /// File, line and column encoded in `code_pos`
    pub fn location(&self) -> Option<(&str, usize, usize)> {
        static POSITION: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = POSITION
            .get_or_init(|| Regex::new(r"^(?P<file>.+):L(?P<line>\d+):C(?P<col>\d+)$").ok())
            .as_ref()?;

        let captures = pattern.captures(&self.code_pos)?;
        Some((
            captures.name("file")?.as_str(),
            captures.name("line")?.as_str().parse().ok()?,
            captures.name("col")?.as_str().parse().ok()?,
        ))
    }
}

/// Restricts a search to a single source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFilter {
    /// Fragment of the relative path; a substring match selects the file
    pub file: String,
    pub line: usize,
}

impl LineFilter {
    /// Whether a record sits on the filtered line of a matching file
    pub fn accepts(&self, record: &ReferenceRecord) -> bool {
        record
            .location()
            .map(|(file, line, _)| line == self.line && file.contains(&self.file))
            .unwrap_or(false)
    }
}

pub struct ReferenceFinder {
    symbol: String,
    filter: Option<LineFilter>,
}

impl ReferenceFinder {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<LineFilter>) -> Self {
        self.filter = filter.map(|f| LineFilter {
            file: f.file.replace('\\', "/"),
            line: f.line,
        });
        self
    }

    pub fn find(&self, units: &[CompilationUnit]) -> Vec<ReferenceRecord> {
        let mut records = Vec::new();
        for unit in units {
            if let Some(filter) = &self.filter {
                if !unit.relative_path.contains(&filter.file) {
                    continue;
                }
            }
            self.visit(unit, unit.root(), &Scope::for_package(&unit.package), &mut records);
        }
        if let Some(filter) = &self.filter {
            records.retain(|record| filter.accepts(record));
        }
        records
    }

    fn visit(&self, unit: &CompilationUnit, node: Node, scope: &Scope, out: &mut Vec<ReferenceRecord>) {
        let source = &unit.source;
        let kind = node.kind();
        let mut scope = scope.clone();

        if is_type_declaration(kind) {
            if let Some(name) = declaration_name(node, source) {
                scope = scope.enter_type(name);
            }
        } else if matches!(kind, "method_declaration" | "constructor_declaration") {
            if let Some(name) = declaration_name(node, source) {
                scope = scope.enter_method(name, None);
            }
        }

        let hit = match kind {
            "method_invocation" => self
                .named(node, "name", source)
                .then_some(ReferenceKind::Call),
            "field_access" => self
                .named(node, "field", source)
                .then_some(ReferenceKind::FieldAccess),
            "identifier" if java::node_text(node, source) == self.symbol && is_name_expression(node) => {
                Some(ReferenceKind::VariableAccess)
            }
            "type_identifier" if java::node_text(node, source) == self.symbol && !is_type_parameter(node) => {
                Some(ReferenceKind::TypeReference)
            }
            _ => None,
        };

        if let Some(reference_type) = hit {
            self.record(unit, node, reference_type, &scope, out);
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(unit, child, &scope, out);
        }
    }

    fn named(&self, node: Node, field: &str, source: &str) -> bool {
        node.child_by_field_name(field)
            .map(|n| java::node_text(n, source) == self.symbol)
            .unwrap_or(false)
    }

    fn record(
        &self,
        unit: &CompilationUnit,
        node: Node,
        reference_type: ReferenceKind,
        scope: &Scope,
        out: &mut Vec<ReferenceRecord>,
    ) {
        let line = java::start_line(node);
        let line_content = unit
            .line(line)
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| unit.text(node).trim().to_string());

        out.push(ReferenceRecord {
            symbol_name: self.symbol.clone(),
            reference_type,
            code_pos: unit.position(node),
            context: scope.context(),
            line_content,
        });
    }
}

/// Whether an identifier is used as a name expression rather than declaring
/// something or naming a member, label or package
fn is_name_expression(node: Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };

    for field in ["name", "field", "key"] {
        if parent.child_by_field_name(field) == Some(node) {
            return false;
        }
    }

    match parent.kind() {
        "lambda_expression" => parent.child_by_field_name("parameters") != Some(node),
        "method_reference" => parent.named_child(0) == Some(node),
        "scoped_identifier" | "scoped_type_identifier" | "package_declaration"
        | "import_declaration" | "module_declaration" | "inferred_parameters"
        | "labeled_statement" | "break_statement" | "continue_statement"
        | "marker_annotation" | "annotation" => false,
        _ => true,
    }
}

fn is_type_parameter(node: Node) -> bool {
    node.parent()
        .map(|p| p.kind() == "type_parameter")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::parse_units;

    const ORDERS: &str = r#"package com.shop;

public class OrderService {
    private Repository repository;
    private int total = repository.count();

    public Order place(Order order) {
        Order copy = order;
        repository.save(copy);
        this.repository.flush();
        log: for (int i = 0; i < 1; i++) { break log; }
        return copy;
    }
}
"#;

    const REPORTS: &str = r#"package com.shop;

public class ReportJob<Order> {
    public void run(Repository repository) {
        repository.save(null);
    }
}
"#;

    fn units() -> Vec<CompilationUnit> {
        parse_units(&[
            ("src/com/shop/OrderService.java", ORDERS),
            ("src/com/shop/ReportJob.java", REPORTS),
        ])
    }

    #[test]
    fn test_reference_kinds() {
        let units = units();
        let repository = ReferenceFinder::new("repository").find(&units);

        let kinds: Vec<(ReferenceKind, String)> = repository
            .iter()
            .map(|r| (r.reference_type, r.context.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ReferenceKind::VariableAccess, "OrderService".to_string()),
                (ReferenceKind::VariableAccess, "OrderService.place".to_string()),
                (ReferenceKind::FieldAccess, "OrderService.place".to_string()),
                (ReferenceKind::VariableAccess, "ReportJob.run".to_string()),
            ]
        );
        assert_eq!(repository[1].line_content, "repository.save(copy);");
        assert_eq!(repository[1].code_pos, "src/com/shop/OrderService.java:L9:C9");

        let save = ReferenceFinder::new("save").find(&units);
        assert_eq!(save.len(), 2);
        assert!(save.iter().all(|r| r.reference_type == ReferenceKind::Call));
    }

    #[test]
    fn test_type_references_skip_type_parameters() {
        let units = units();
        let order = ReferenceFinder::new("Order").find(&units);

        assert_eq!(order.len(), 3);
        assert!(order.iter().all(|r| r.reference_type == ReferenceKind::TypeReference));
        assert!(order.iter().all(|r| r.code_pos.starts_with("src/com/shop/OrderService.java")));
    }

    #[test]
    fn test_labels_are_not_variables() {
        let units = units();
        assert!(ReferenceFinder::new("log").find(&units).is_empty());
    }

    #[test]
    fn test_line_filter_scopes_results() {
        let units = units();
        let filter = LineFilter {
            file: "OrderService.java".to_string(),
            line: 9,
        };
        let records = ReferenceFinder::new("repository")
            .with_filter(Some(filter))
            .find(&units);

        assert_eq!(records.len(), 1);
        let (file, line, column) = records[0].location().unwrap();
        assert!(file.contains("OrderService.java"));
        assert_eq!((line, column), (9, 9));
    }

    #[test]
    fn test_line_filter_matches_path_fragments() {
        let units = units();
        let filter = LineFilter {
            file: "Service.java".to_string(),
            line: 9,
        };
        let records = ReferenceFinder::new("repository")
            .with_filter(Some(filter))
            .find(&units);

        assert_eq!(records.len(), 1);
        assert!(records[0].code_pos.starts_with("src/com/shop/OrderService.java"));
    }

    #[test]
    fn test_record_json_keys() {
        let units = units();
        let records = ReferenceFinder::new("flush").find(&units);
        let json = serde_json::to_value(&records[0]).unwrap();

        assert_eq!(json["reference_type"], "CALL");
        assert_eq!(json["symbol_name"], "flush");
        assert_eq!(json["context"], "OrderService.place");
        assert_eq!(json["line_content"], "this.repository.flush();");

        let back: ReferenceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, records[0]);
    }

    #[test]
    fn test_line_filter_accepts_by_location() {
        let record = ReferenceRecord {
            symbol_name: "save".to_string(),
            reference_type: ReferenceKind::Call,
            code_pos: "src/com/shop/OrderService.java:L9:C20".to_string(),
            context: "OrderService.place".to_string(),
            line_content: "repository.save(copy);".to_string(),
        };
        let filter = |file: &str, line| LineFilter {
            file: file.to_string(),
            line,
        };

        assert!(filter("OrderService.java", 9).accepts(&record));
        assert!(!filter("OrderService.java", 10).accepts(&record));
        assert!(!filter("ReportJob.java", 9).accepts(&record));

        let garbled = ReferenceRecord {
            code_pos: "nowhere".to_string(),
            ..record
        };
        assert!(!filter("nowhere", 9).accepts(&garbled));
    }
}
