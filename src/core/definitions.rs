//! Declaration lookup by simple name or `Type.member`
//!
//! A lookup containing a dot is split on its last dot into an owning type and
//! a member name. Only units declaring a matching type are searched in that
//! mode, and only members of that type or the type itself can match. A lookup
//! landing on exactly one method is escalated through the interface
//! implementor index to the concrete overrides.

use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::Node;

use super::implementors::InterfaceImplementorIndex;
use super::languages::java::{
    self, declaration_name, declarators, is_type_declaration, modifier_keywords,
};
use super::parser::CompilationUnit;
use super::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefinitionKind {
    Class,
    Interface,
    Enum,
    EnumConstant,
    Method,
    Field,
    Variable,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    pub symbol_name: String,
    pub definition_type: DefinitionKind,

    /// `file:Lstart-Lend`
    pub code_pos: String,

    pub definition_code: String,
    pub signature: String,

    /// Space separated modifier keywords
    #[serde(default)]
    pub modifiers: String,

    /// File path for types, owning type FQN for members, method name for locals
    pub scope: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Simple(String),
    Qualified { owner: String, member: String, full: String },
}

impl Lookup {
    fn parse(symbol: &str) -> Self {
        match symbol.rsplit_once('.') {
            Some((owner, member)) if !owner.is_empty() && !member.is_empty() => Self::Qualified {
                owner: owner.to_string(),
                member: member.to_string(),
                full: symbol.to_string(),
            },
            _ => Self::Simple(symbol.to_string()),
        }
    }
}

/// `fqn` names `target` exactly or ends with `.target`
fn fqn_matches(fqn: &str, target: &str) -> bool {
    fqn == target
        || fqn
            .strip_suffix(target)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}

pub struct DefinitionFinder<'a> {
    implementors: &'a InterfaceImplementorIndex,
}

impl<'a> DefinitionFinder<'a> {
    pub fn new(implementors: &'a InterfaceImplementorIndex) -> Self {
        Self { implementors }
    }

    /// Declarations matching `symbol`, escalated to concrete overrides when
    /// the lookup lands on a single interface method
    pub fn find(&self, units: &[CompilationUnit], symbol: &str) -> Vec<DefinitionRecord> {
        let records = self.search(units, symbol);

        if records.len() != 1 || records[0].definition_type != DefinitionKind::Method {
            return records;
        }

        let interface = records[0].scope.as_str();
        let method = symbol.rsplit('.').next().unwrap_or(symbol);
        let escalated: Vec<DefinitionRecord> = self
            .implementors
            .implementors_of(interface)
            .flat_map(|implementor| self.search(units, &format!("{}.{}", implementor, method)))
            .collect();

        if escalated.is_empty() {
            records
        } else {
            debug!("Escalated {} to {} implementation(s)", symbol, escalated.len());
            escalated
        }
    }

    /// Single pass without escalation
    pub fn search(&self, units: &[CompilationUnit], symbol: &str) -> Vec<DefinitionRecord> {
        let lookup = Lookup::parse(symbol);
        let mut records = Vec::new();

        for unit in units {
            if let Lookup::Qualified { owner, full, .. } = &lookup {
                let declares_owner = unit
                    .declared_types()
                    .iter()
                    .any(|(fqn, _)| fqn_matches(fqn, owner) || fqn_matches(fqn, full));
                if !declares_owner {
                    continue;
                }
            }

            let search = Search {
                unit,
                lookup: &lookup,
                symbol,
            };
            search.visit(unit.root(), &Scope::for_package(&unit.package), &mut records);
        }

        records
    }
}

struct Search<'u> {
    unit: &'u CompilationUnit,
    lookup: &'u Lookup,
    symbol: &'u str,
}

impl<'u> Search<'u> {
    fn source(&self) -> &'u str {
        &self.unit.source
    }

    fn visit(&self, node: Node, scope: &Scope, out: &mut Vec<DefinitionRecord>) {
        let kind = node.kind();
        let mut scope = scope.clone();

        if is_type_declaration(kind) {
            if let Some(name) = declaration_name(node, self.source()) {
                scope = scope.enter_type(name);
                let fqn = scope.type_fqn().unwrap_or(name);
                let matched = match self.lookup {
                    Lookup::Simple(symbol) => name == symbol,
                    Lookup::Qualified { full, .. } => fqn_matches(fqn, full),
                };
                if matched {
                    out.push(self.type_record(node, name));
                }
            }
        } else {
            match kind {
                "method_declaration" => {
                    if let Some(name) = declaration_name(node, self.source()) {
                        if self.member_matches(name, &scope) {
                            out.push(self.method_record(node, &scope));
                        }
                        scope = scope.enter_method(name, None);
                    }
                }
                "constructor_declaration" => {
                    if let Some(name) = declaration_name(node, self.source()) {
                        scope = scope.enter_method(name, None);
                    }
                }
                "field_declaration" | "constant_declaration" => self.fields(node, &scope, out),
                "enum_constant" => {
                    if let Some(name) = declaration_name(node, self.source()) {
                        if self.member_matches(name, &scope) {
                            out.push(self.enum_constant_record(node, name, &scope));
                        }
                    }
                }
                "local_variable_declaration" => self.variables(node, &scope, out),
                "formal_parameter" | "spread_parameter" | "catch_formal_parameter" => {
                    self.parameter(node, &scope, out)
                }
                _ => {}
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, &scope, out);
        }
    }

    fn member_matches(&self, name: &str, scope: &Scope) -> bool {
        match self.lookup {
            Lookup::Simple(symbol) => name == symbol,
            Lookup::Qualified { owner, member, .. } => {
                name == member
                    && scope
                        .type_fqn()
                        .map(|fqn| fqn_matches(fqn, owner))
                        .unwrap_or(false)
            }
        }
    }

    fn simple_symbol(&self) -> Option<&str> {
        match self.lookup {
            Lookup::Simple(symbol) => Some(symbol.as_str()),
            Lookup::Qualified { .. } => None,
        }
    }

    fn record(&self, node: Node, definition_type: DefinitionKind, signature: String, scope: String) -> DefinitionRecord {
        DefinitionRecord {
            symbol_name: self.symbol.to_string(),
            definition_type,
            code_pos: self.unit.span(java::start_line(node), java::end_line(node)),
            definition_code: self.unit.text(node).to_string(),
            signature,
            modifiers: modifier_keywords(node, self.source()).join(" "),
            scope,
            return_type: None,
            parameters: None,
        }
    }

    fn type_record(&self, node: Node, name: &str) -> DefinitionRecord {
        let source = self.source();
        let (definition_type, keyword) = match node.kind() {
            "interface_declaration" => (DefinitionKind::Interface, "interface"),
            "annotation_type_declaration" => (DefinitionKind::Interface, "@interface"),
            "enum_declaration" => (DefinitionKind::Enum, "enum"),
            "record_declaration" => (DefinitionKind::Class, "record"),
            _ => (DefinitionKind::Class, "class"),
        };

        let signature = if definition_type == DefinitionKind::Enum {
            format!("enum {}", name)
        } else {
            let modifiers = modifier_keywords(node, source).join(" ");
            let type_parameters = node
                .child_by_field_name("type_parameters")
                .map(|t| java::normalize_whitespace(self.unit.text(t)))
                .unwrap_or_default();
            let head = format!("{} {}{}", keyword, name, type_parameters);
            if modifiers.is_empty() {
                head
            } else {
                format!("{} {}", modifiers, head)
            }
        };

        self.record(node, definition_type, signature, self.unit.relative_path.clone())
    }

    fn method_record(&self, node: Node, scope: &Scope) -> DefinitionRecord {
        let source = self.source();
        let name = declaration_name(node, source).unwrap_or_default();
        let return_type = java::declared_type(node, source).unwrap_or_default();
        let parameters = java::parameters(node)
            .into_iter()
            .map(|p| {
                format!(
                    "{} {}",
                    java::parameter_type(p, source),
                    java::parameter_name(p, source).unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut record = self.record(
            node,
            DefinitionKind::Method,
            format!("{} {}({})", return_type, name, parameters),
            scope.type_fqn().unwrap_or_default().to_string(),
        );
        record.return_type = Some(return_type);
        record.parameters = Some(parameters);
        record
    }

    fn enum_constant_record(&self, node: Node, name: &str, scope: &Scope) -> DefinitionRecord {
        let mut record = self.record(
            node,
            DefinitionKind::EnumConstant,
            name.to_string(),
            scope.type_fqn().unwrap_or_default().to_string(),
        );
        record.return_type = scope.type_name().map(str::to_string);
        record
    }

    fn fields(&self, node: Node, scope: &Scope, out: &mut Vec<DefinitionRecord>) {
        let source = self.source();
        let type_name = java::declared_type(node, source).unwrap_or_default();

        for declarator in declarators(node) {
            let Some(name) = declaration_name(declarator, source) else {
                continue;
            };
            if self.member_matches(name, scope) {
                let mut record = self.record(
                    node,
                    DefinitionKind::Field,
                    format!("{} {}", type_name, name),
                    scope.type_fqn().unwrap_or_default().to_string(),
                );
                record.return_type = Some(type_name.clone());
                out.push(record);
            }
        }
    }

    fn variables(&self, node: Node, scope: &Scope, out: &mut Vec<DefinitionRecord>) {
        let Some(symbol) = self.simple_symbol() else {
            return;
        };
        let source = self.source();
        let type_name = java::declared_type(node, source).unwrap_or_default();

        for declarator in declarators(node) {
            if declaration_name(declarator, source) != Some(symbol) {
                continue;
            }
            let owner = scope
                .method_name()
                .or_else(|| scope.type_fqn())
                .unwrap_or_default()
                .to_string();
            let mut record = self.record(
                node,
                DefinitionKind::Variable,
                format!("{} {}", type_name, symbol),
                owner,
            );
            record.return_type = Some(type_name.clone());
            out.push(record);
        }
    }

    fn parameter(&self, node: Node, scope: &Scope, out: &mut Vec<DefinitionRecord>) {
        let Some(symbol) = self.simple_symbol() else {
            return;
        };
        let source = self.source();
        let name = java::parameter_name(node, source).or_else(|| declaration_name(node, source));
        if name != Some(symbol) {
            return;
        }

        let type_name = if node.kind() == "catch_formal_parameter" {
            let mut cursor = node.walk();
            let caught = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "catch_type")
                .map(|t| java::normalize_whitespace(self.unit.text(t)))
                .unwrap_or_default();
            caught
        } else {
            java::parameter_type(node, source)
        };

        let mut record = self.record(
            node,
            DefinitionKind::Parameter,
            format!("{} {}", type_name, symbol),
            scope.method_name().unwrap_or_default().to_string(),
        );
        record.return_type = Some(type_name);
        out.push(record);
    }
}
