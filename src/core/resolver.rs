//! Project-wide symbol resolution
//!
//! [`TypeIndex`] records every type declared in the source tree with its
//! members and resolved supertypes. [`ProjectResolver`] answers the questions
//! the analyzers ask through [`SymbolResolver`]: which project type a type
//! expression names, which method a call lands on, which type an
//! instantiation creates. Anything it cannot pin down resolves to `None`.

use std::collections::{HashMap, HashSet, VecDeque};
use tree_sitter::Node;

use super::languages::java::{
    self, argument_count, body_members, declaration_name, declarators, enclosing, erased_type_name,
    is_primitive, parameter_type, parameters,
};
use super::parser::CompilationUnit;
use super::scope::Scope;

/// Answers symbol questions for the analyzers
pub trait SymbolResolver {
    /// Fully qualified name of the type a type expression denotes in `unit`
    fn resolve_type(&self, unit: &CompilationUnit, type_text: &str) -> Option<String>;

    /// `owner.FQN.method(ParamTypes)` of the project method a call invokes
    fn resolve_call(&self, unit: &CompilationUnit, call: Node<'_>, scope: &Scope) -> Option<String>;

    /// Fully qualified name of the type an object creation expression instantiates
    fn resolve_instantiation(&self, unit: &CompilationUnit, creation: Node<'_>) -> Option<String>;

    /// Project type declared under the given fully qualified name
    fn project_type(&self, fqn: &str) -> Option<&TypeInfo>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

impl TypeKind {
    pub fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "class_declaration" => Some(Self::Class),
            "interface_declaration" => Some(Self::Interface),
            "enum_declaration" => Some(Self::Enum),
            "record_declaration" => Some(Self::Record),
            "annotation_type_declaration" => Some(Self::Annotation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub param_types: Vec<String>,

    /// Line of the declaration
    pub line: usize,
}

impl MethodInfo {
    /// Whether a call with `arity` arguments fits this parameter list
    pub fn accepts(&self, arity: usize) -> bool {
        match self.param_types.last() {
            Some(last) if last.ends_with("...") => arity + 1 >= self.param_types.len(),
            _ => arity == self.param_types.len(),
        }
    }

    pub fn qualified_signature(&self, owner: &str) -> String {
        format!("{}.{}({})", owner, self.name, self.param_types.join(", "))
    }
}

/// A project type with its members
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub fqn: String,
    pub simple_name: String,
    pub kind: TypeKind,

    /// Relative path of the declaring compilation unit
    pub unit_path: String,
    pub line: usize,

    /// Resolved supertypes, superclass first
    pub supertypes: Vec<String>,

    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

/// Name resolution context of a single compilation unit.
///
/// Lookup order: types declared in the unit, explicit imports, the unit's own
/// package, wildcard imports, then `java.lang`.
#[derive(Debug, Clone, Default)]
pub struct ImportScope {
    package: String,
    explicit: HashMap<String, String>,
    wildcards: Vec<String>,
    local: HashMap<String, String>,
}

impl ImportScope {
    pub fn for_unit(unit: &CompilationUnit) -> Self {
        let mut scope = Self {
            package: unit.package.clone(),
            ..Self::default()
        };

        for import in unit.imports.iter().filter(|i| !i.is_static) {
            if import.is_wildcard {
                scope.wildcards.push(import.path.clone());
            } else {
                scope
                    .explicit
                    .insert(import.simple_name().to_string(), import.path.clone());
            }
        }

        for (fqn, declared) in unit.declared_types() {
            if let Some(name) = declaration_name(declared.node, &unit.source) {
                scope.local.entry(name.to_string()).or_insert(fqn);
            }
        }

        scope
    }

    pub fn resolve(&self, simple_name: &str, known: &HashMap<String, TypeInfo>) -> Option<String> {
        if let Some(fqn) = self.local.get(simple_name) {
            return Some(fqn.clone());
        }

        if let Some(fqn) = self.explicit.get(simple_name) {
            return Some(fqn.clone());
        }

        let same_package = if self.package.is_empty() {
            simple_name.to_string()
        } else {
            format!("{}.{}", self.package, simple_name)
        };
        if known.contains_key(&same_package) {
            return Some(same_package);
        }

        for wildcard in &self.wildcards {
            let candidate = format!("{}.{}", wildcard, simple_name);
            if known.contains_key(&candidate) {
                return Some(candidate);
            }
        }

        if is_java_lang_class(simple_name) {
            return Some(format!("java.lang.{}", simple_name));
        }

        None
    }
}

fn is_java_lang_class(name: &str) -> bool {
    matches!(
        name,
        "String" | "Object" | "Integer" | "Long" | "Double" | "Float"
            | "Boolean" | "Byte" | "Short" | "Character" | "Number"
            | "Class" | "System" | "Thread" | "Runnable" | "Exception"
            | "RuntimeException" | "Error" | "Throwable" | "StringBuilder"
            | "StringBuffer" | "Math" | "Comparable" | "Iterable" | "Enum"
            | "Override" | "Deprecated" | "SuppressWarnings" | "FunctionalInterface"
    )
}

/// Every type declared in the project
#[derive(Debug, Default)]
pub struct TypeIndex {
    types: HashMap<String, TypeInfo>,
    scopes: HashMap<String, ImportScope>,
}

impl TypeIndex {
    pub fn build(units: &[CompilationUnit]) -> Self {
        let mut index = Self::default();
        let mut raw_supertypes: Vec<(String, Vec<String>)> = Vec::new();

        for unit in units {
            index
                .scopes
                .insert(unit.relative_path.clone(), ImportScope::for_unit(unit));

            for (fqn, declared) in unit.declared_types() {
                let node = declared.node;
                let Some(kind) = TypeKind::from_node_kind(declared.kind) else {
                    continue;
                };
                let simple_name = declaration_name(node, &unit.source)
                    .unwrap_or_default()
                    .to_string();

                let mut info = TypeInfo {
                    fqn: fqn.clone(),
                    simple_name,
                    kind,
                    unit_path: unit.relative_path.clone(),
                    line: java::start_line(node),
                    supertypes: Vec::new(),
                    fields: Vec::new(),
                    methods: Vec::new(),
                };
                collect_members(unit, node, &mut info);

                raw_supertypes.push((fqn.clone(), java::supertypes(node, &unit.source)));
                index.types.entry(fqn).or_insert(info);
            }
        }

        for (fqn, raw) in raw_supertypes {
            let Some(unit_path) = index.types.get(&fqn).map(|t| t.unit_path.clone()) else {
                continue;
            };
            let resolved: Vec<String> = raw
                .iter()
                .filter_map(|name| index.resolve_type_name(&unit_path, name))
                .collect();
            if let Some(info) = index.types.get_mut(&fqn) {
                info.supertypes = resolved;
            }
        }

        index
    }

    pub fn get(&self, fqn: &str) -> Option<&TypeInfo> {
        self.types.get(fqn)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Resolve a type expression as written in the unit at `unit_path`
    pub fn resolve_type_name(&self, unit_path: &str, type_text: &str) -> Option<String> {
        let name = erased_type_name(type_text);
        if name.is_empty() || is_primitive(&name) {
            return None;
        }

        let scope = self.scopes.get(unit_path)?;
        match name.split_once('.') {
            None => scope.resolve(&name, &self.types),
            Some(_) if self.types.contains_key(&name) => Some(name),
            Some((head, rest)) => {
                if head.starts_with(|c: char| c.is_lowercase()) {
                    return Some(name);
                }
                scope
                    .resolve(head, &self.types)
                    .map(|outer| format!("{}.{}", outer, rest))
            }
        }
    }

    /// `fqn` followed by every project supertype, breadth first
    pub fn type_hierarchy(&self, fqn: &str) -> Vec<&TypeInfo> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([fqn.to_string()]);
        let mut hierarchy = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(info) = self.types.get(&current) {
                queue.extend(info.supertypes.iter().cloned());
                hierarchy.push(info);
            }
        }

        hierarchy
    }

    /// First method named `name` accepting `arity` arguments on `owner` or its supertypes
    pub fn find_method(&self, owner: &str, name: &str, arity: usize) -> Option<(&TypeInfo, &MethodInfo)> {
        self.type_hierarchy(owner).into_iter().find_map(|info| {
            info.methods
                .iter()
                .find(|m| m.name == name && m.accepts(arity))
                .map(|m| (info, m))
        })
    }

    /// Declared type of a field visible from `owner`, resolved in its declaring unit
    pub fn field_type(&self, owner: &str, field: &str) -> Option<String> {
        for candidate in enclosing_types(owner) {
            for info in self.type_hierarchy(candidate) {
                if let Some(found) = info.fields.iter().find(|f| f.name == field) {
                    return self.resolve_type_name(&info.unit_path, &found.type_name);
                }
            }
        }
        None
    }
}

/// `a.B.C` yields `a.B.C`, `a.B`, `a`
fn enclosing_types(fqn: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(fqn), |&current| current.rsplit_once('.').map(|(outer, _)| outer))
}

fn collect_members(unit: &CompilationUnit, decl: Node, info: &mut TypeInfo) {
    let source = &unit.source;

    if info.kind == TypeKind::Record {
        for component in parameters(decl) {
            if let Some(name) = java::parameter_name(component, source) {
                info.fields.push(FieldInfo {
                    name: name.to_string(),
                    type_name: parameter_type(component, source),
                });
            }
        }
    }

    for member in body_members(decl) {
        match member.kind() {
            "field_declaration" | "constant_declaration" => {
                let type_name = java::declared_type(member, source).unwrap_or_default();
                for declarator in declarators(member) {
                    if let Some(name) = declaration_name(declarator, source) {
                        info.fields.push(FieldInfo {
                            name: name.to_string(),
                            type_name: type_name.clone(),
                        });
                    }
                }
            }
            "enum_constant" => {
                if let Some(name) = declaration_name(member, source) {
                    info.fields.push(FieldInfo {
                        name: name.to_string(),
                        type_name: info.simple_name.clone(),
                    });
                }
            }
            "method_declaration" => {
                if let Some(name) = declaration_name(member, source) {
                    info.methods.push(MethodInfo {
                        name: name.to_string(),
                        param_types: parameters(member)
                            .into_iter()
                            .map(|p| parameter_type(p, source))
                            .collect(),
                        line: java::start_line(member),
                    });
                }
            }
            _ => {}
        }
    }
}

/// [`SymbolResolver`] over the project's own declarations
#[derive(Debug)]
pub struct ProjectResolver {
    index: TypeIndex,
}

impl ProjectResolver {
    pub fn new(units: &[CompilationUnit]) -> Self {
        Self {
            index: TypeIndex::build(units),
        }
    }

    pub fn index(&self) -> &TypeIndex {
        &self.index
    }

    fn receiver_type(&self, unit: &CompilationUnit, receiver: Node, call: Node, scope: &Scope) -> Option<String> {
        match receiver.kind() {
            "this" => scope.type_fqn().map(str::to_string),
            "super" => scope
                .type_fqn()
                .and_then(|fqn| self.index.get(fqn))
                .and_then(|info| info.supertypes.first().cloned()),
            "identifier" => {
                let name = unit.text(receiver);
                if let Some(type_text) = local_variable_type(unit, call, name) {
                    return self.resolve_type(unit, &type_text);
                }
                if let Some(found) = scope.type_fqn().and_then(|owner| self.index.field_type(owner, name)) {
                    return Some(found);
                }
                if name.starts_with(|c: char| c.is_uppercase()) {
                    return self.resolve_type(unit, name);
                }
                None
            }
            "field_access" => {
                let object = receiver.child_by_field_name("object")?;
                let field = receiver.child_by_field_name("field")?;
                if object.kind() == "this" {
                    let owner = scope.type_fqn()?;
                    return self.index.field_type(owner, unit.text(field));
                }
                self.resolve_type(unit, unit.text(receiver))
            }
            "object_creation_expression" => self.resolve_instantiation(unit, receiver),
            "parenthesized_expression" => {
                let inner = receiver.named_child(0)?;
                self.receiver_type(unit, inner, call, scope)
            }
            _ => None,
        }
    }
}

impl SymbolResolver for ProjectResolver {
    fn resolve_type(&self, unit: &CompilationUnit, type_text: &str) -> Option<String> {
        self.index.resolve_type_name(&unit.relative_path, type_text)
    }

    fn resolve_call(&self, unit: &CompilationUnit, call: Node<'_>, scope: &Scope) -> Option<String> {
        let name = unit.text(call.child_by_field_name("name")?);
        let arity = argument_count(call);

        match call.child_by_field_name("object") {
            Some(receiver) => {
                let owner = self.receiver_type(unit, receiver, call, scope)?;
                let (info, method) = self.index.find_method(&owner, name, arity)?;
                Some(method.qualified_signature(&info.fqn))
            }
            None => {
                let current = scope.type_fqn()?;
                enclosing_types(current).find_map(|owner| {
                    self.index
                        .find_method(owner, name, arity)
                        .map(|(info, method)| method.qualified_signature(&info.fqn))
                })
            }
        }
    }

    fn resolve_instantiation(&self, unit: &CompilationUnit, creation: Node<'_>) -> Option<String> {
        let type_node = creation.child_by_field_name("type")?;
        self.resolve_type(unit, unit.text(type_node))
    }

    fn project_type(&self, fqn: &str) -> Option<&TypeInfo> {
        self.index.get(fqn)
    }
}

/// Declared type of the closest local variable or parameter named `name`
/// visible before `usage` in its enclosing body
fn local_variable_type(unit: &CompilationUnit, usage: Node, name: &str) -> Option<String> {
    let body = enclosing(
        usage,
        &["method_declaration", "constructor_declaration", "static_initializer", "block"],
    )
    .map(|found| {
        enclosing(found, &["method_declaration", "constructor_declaration"]).unwrap_or(found)
    })?;

    let mut best = None;
    find_local(unit, body, usage.start_byte(), name, &mut best);
    best
}

fn find_local(unit: &CompilationUnit, node: Node, before: usize, name: &str, best: &mut Option<String>) {
    if node.start_byte() >= before {
        return;
    }

    let source = &unit.source;
    match node.kind() {
        "formal_parameter" | "spread_parameter" => {
            if java::parameter_name(node, source) == Some(name) {
                *best = Some(parameter_type(node, source));
            }
        }
        "catch_formal_parameter" => {
            if declaration_name(node, source) == Some(name) {
                let mut cursor = node.walk();
                let caught = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "catch_type")
                    .map(|t| unit.text(t).to_string());
                *best = caught;
            }
        }
        "local_variable_declaration" => {
            let declared = java::declared_type(node, source).unwrap_or_default();
            for declarator in declarators(node) {
                if declaration_name(declarator, source) != Some(name) {
                    continue;
                }
                *best = if declared == "var" {
                    declarator
                        .child_by_field_name("value")
                        .filter(|v| v.kind() == "object_creation_expression")
                        .and_then(|v| v.child_by_field_name("type"))
                        .map(|t| unit.text(t).to_string())
                } else {
                    Some(declared.clone())
                };
            }
        }
        "enhanced_for_statement" | "resource" => {
            if declaration_name(node, source) == Some(name) {
                *best = java::declared_type(node, source);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        find_local(unit, child, before, name, best);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::parse_units;

    const REPO: &str = r#"
package com.acme.repo;

import com.acme.model.User;

public interface UserRepository extends BaseRepository {
    User save(User user);
}
"#;

    const BASE: &str = r#"
package com.acme.repo;

public interface BaseRepository {
    void flush();
    int count(String... filters);
}
"#;

    const MODEL: &str = r#"
package com.acme.model;

public class User {
    private String name;
}
"#;

    const SERVICE: &str = r#"
package com.acme.service;

import com.acme.repo.*;
import com.acme.model.User;
import java.util.List;

public class UserService {
    private final UserRepository repository;

    public User register(String name) {
        User user = new User();
        repository.save(user);
        this.repository.flush();
        repository.count();
        audit(name);
        List<User> all = null;
        all.size();
        return user;
    }

    private void audit(String message) {}
}
"#;

    fn units() -> Vec<CompilationUnit> {
        parse_units(&[
            ("com/acme/repo/UserRepository.java", REPO),
            ("com/acme/repo/BaseRepository.java", BASE),
            ("com/acme/model/User.java", MODEL),
            ("com/acme/service/UserService.java", SERVICE),
        ])
    }

    fn calls<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
        if node.kind() == "method_invocation" {
            out.push(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        for child in children {
            calls(child, out);
        }
    }

    #[test]
    fn test_import_scope_order() {
        let units = units();
        let index = TypeIndex::build(&units);
        let path = "com/acme/service/UserService.java";

        assert_eq!(index.resolve_type_name(path, "User"), Some("com.acme.model.User".into()));
        assert_eq!(
            index.resolve_type_name(path, "UserRepository"),
            Some("com.acme.repo.UserRepository".into())
        );
        assert_eq!(index.resolve_type_name(path, "List<User>"), Some("java.util.List".into()));
        assert_eq!(index.resolve_type_name(path, "String"), Some("java.lang.String".into()));
        assert_eq!(index.resolve_type_name(path, "int"), None);
        assert_eq!(index.resolve_type_name(path, "Unknown"), None);
    }

    #[test]
    fn test_supertypes_are_resolved() {
        let units = units();
        let index = TypeIndex::build(&units);
        let repo = index.get("com.acme.repo.UserRepository").unwrap();

        assert_eq!(repo.kind, TypeKind::Interface);
        assert_eq!(repo.supertypes, vec!["com.acme.repo.BaseRepository".to_string()]);
        assert!(index.find_method("com.acme.repo.UserRepository", "flush", 0).is_some());
    }

    #[test]
    fn test_resolve_calls_through_receivers() {
        let units = units();
        let resolver = ProjectResolver::new(&units);
        let service = &units[3];

        let mut found = Vec::new();
        calls(service.root(), &mut found);
        let scope = Scope::for_package("com.acme.service")
            .enter_type("UserService")
            .enter_method("register", None);
        let resolved: Vec<Option<String>> = found
            .iter()
            .map(|call| resolver.resolve_call(service, *call, &scope))
            .collect();

        assert_eq!(
            resolved,
            vec![
                Some("com.acme.repo.UserRepository.save(User)".to_string()),
                Some("com.acme.repo.BaseRepository.flush()".to_string()),
                Some("com.acme.repo.BaseRepository.count(String...)".to_string()),
                Some("com.acme.service.UserService.audit(String)".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_varargs_arity() {
        let method = MethodInfo {
            name: "of".into(),
            param_types: vec!["int".into(), "String...".into()],
            line: 1,
        };
        assert!(method.accepts(1));
        assert!(method.accepts(3));
        assert!(!method.accepts(0));
    }
}
