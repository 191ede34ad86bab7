//! HTTP endpoint extraction
//!
//! Finds controller types by annotation, then turns every mapped method into
//! an [`EndpointInfo`]: verb, combined path, request parameters, the body
//! type and the project symbols the handler touches.
//!
//! [`EndpointExtractor::analyze`] goes one step further and produces a
//! [`ControllerAnalysis`] per controller, where each endpoint's references are
//! ids into a symbol table recording every place the handler uses them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use tree_sitter::Node;

use crate::config::EndpointConfig;
use super::languages::java::{
    self, body_members, declaration_name, declarators, find_annotation, is_type_declaration,
    Annotation,
};
use super::parser::CompilationUnit;
use super::resolver::SymbolResolver;
use super::scope::Scope;

const PATH_KEYS: &[&str] = &["value", "path"];
const NAME_KEYS: &[&str] = &["value", "name"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub controller_name: String,
    pub method_name: String,
    pub code_pos: String,
    pub req: HttpRequest,

    /// Resolved call signatures and project type FQNs, in first-seen order.
    /// Symbol ids when part of a [`ControllerAnalysis`].
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,

    /// Query parameter name to declared type
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,

    /// Path variable name to declared type
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBody {
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqn: Option<String>,

    /// Field name to declared type, populated for project types
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolKind {
    Field,
    Method,
    Class,
}

impl SymbolKind {
    fn id_prefix(self) -> &'static str {
        match self {
            Self::Field => "fie",
            Self::Method => "met",
            Self::Class => "cla",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolScope {
    /// Declared by the controller itself
    ClassLevel,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageKind {
    MethodCall,
    FieldAccess,
    Instantiation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub file_path: String,
    pub line_number: usize,
    pub code_snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolUsage {
    /// Handler method the usage appears in
    pub api_method: String,
    pub usage_type: UsageKind,
    pub usage_line: usize,
    pub usage_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    pub symbol_id: String,
    pub symbol_name: String,
    pub symbol_type: SymbolKind,

    /// Field type FQN, owning type of a method, or the instantiated type
    pub data_type: String,
    pub scope: SymbolScope,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<SymbolLocation>,

    #[serde(default)]
    pub usage_contexts: Vec<SymbolUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub total_apis: usize,
    pub total_symbols: usize,

    /// Calls on controller fields and instantiations that could not be resolved
    #[serde(default)]
    pub unresolved_symbols: Vec<String>,
}

/// Endpoints of one controller together with the symbols they use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerAnalysis {
    pub controller_name: String,
    pub file_path: String,
    pub apis: Vec<EndpointInfo>,
    pub symbol_table: BTreeMap<String, SymbolDefinition>,
    pub metadata: AnalysisMetadata,
}

/// Join a class-level and method-level route.
///
/// Each segment gets a leading `/` and loses trailing ones. The result is
/// never empty and never ends in `/` unless it is exactly `/`.
pub fn combine_paths(class_path: &str, method_path: &str) -> String {
    fn normalize(segment: &str) -> String {
        let trimmed = segment.trim().trim_end_matches('/');
        if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    let combined = format!("{}{}", normalize(class_path), normalize(method_path));
    if combined.is_empty() {
        "/".to_string()
    } else {
        combined
    }
}

/// A controller type found in a compilation unit
struct Controller<'u> {
    unit: &'u CompilationUnit,
    node: Node<'u>,
    scope: Scope,
}

pub struct EndpointExtractor<'a, R: SymbolResolver> {
    config: &'a EndpointConfig,
    resolver: &'a R,
}

impl<'a, R: SymbolResolver> EndpointExtractor<'a, R> {
    pub fn new(config: &'a EndpointConfig, resolver: &'a R) -> Self {
        Self { config, resolver }
    }

    /// Endpoints of every controller in the given units, in traversal order
    pub fn extract(&self, units: &[CompilationUnit]) -> Vec<EndpointInfo> {
        let mut endpoints = Vec::new();
        for controller in self.controllers(units) {
            for (method, mapping) in self.mapped_methods(&controller) {
                let mut endpoint = self.build_endpoint(&controller, method, mapping);
                let method_scope = controller.scope.enter_method(&endpoint.method_name, None);
                endpoint.references = self.collect_references(&controller, method, &method_scope);
                endpoints.push(endpoint);
            }
        }
        debug!("Extracted {} endpoints", endpoints.len());
        endpoints
    }

    /// One [`ControllerAnalysis`] per controller, in traversal order
    pub fn analyze(&self, units: &[CompilationUnit]) -> Vec<ControllerAnalysis> {
        self.controllers(units)
            .iter()
            .map(|controller| self.analyze_controller(controller))
            .collect()
    }

    fn analyze_controller(&self, controller: &Controller) -> ControllerAnalysis {
        let mut collector = SymbolCollector::new(self.resolver, controller);
        collector.register_fields();

        let mut apis = Vec::new();
        for (method, mapping) in self.mapped_methods(controller) {
            let mut endpoint = self.build_endpoint(controller, method, mapping);
            let method_scope = controller.scope.enter_method(&endpoint.method_name, None);
            endpoint.references = collector.collect_handler(method, &endpoint.method_name, &method_scope);
            apis.push(endpoint);
        }

        let SymbolTable {
            symbols, unresolved, ..
        } = collector.table;
        debug!(
            "Analyzed controller {}: {} endpoints, {} symbols",
            controller.scope.type_name().unwrap_or_default(),
            apis.len(),
            symbols.len()
        );

        ControllerAnalysis {
            controller_name: controller.scope.type_name().unwrap_or_default().to_string(),
            file_path: controller.unit.relative_path.clone(),
            metadata: AnalysisMetadata {
                total_apis: apis.len(),
                total_symbols: symbols.len(),
                unresolved_symbols: unresolved,
            },
            apis,
            symbol_table: symbols,
        }
    }

    fn controllers<'u>(&self, units: &'u [CompilationUnit]) -> Vec<Controller<'u>> {
        let mut controllers = Vec::new();
        for unit in units {
            self.find_controllers(unit, unit.root(), &Scope::for_package(&unit.package), &mut controllers);
        }
        controllers
    }

    fn find_controllers<'u>(
        &self,
        unit: &'u CompilationUnit,
        node: Node<'u>,
        scope: &Scope,
        out: &mut Vec<Controller<'u>>,
    ) {
        let mut scope = scope.clone();

        if is_type_declaration(node.kind()) {
            if let Some(name) = declaration_name(node, &unit.source) {
                scope = scope.enter_type(name);
                if self.is_controller(unit, node) {
                    out.push(Controller {
                        unit,
                        node,
                        scope: scope.clone(),
                    });
                }
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.find_controllers(unit, child, &scope, out);
        }
    }

    fn is_controller(&self, unit: &CompilationUnit, node: Node) -> bool {
        matches!(node.kind(), "class_declaration" | "interface_declaration")
            && self
                .config
                .controller_annotations
                .iter()
                .any(|marker| find_annotation(node, &unit.source, marker).is_some())
    }

    /// Direct member methods carrying a mapping annotation, with the first
    /// matching annotation in configured priority order
    fn mapped_methods<'u>(&self, controller: &Controller<'u>) -> Vec<(Node<'u>, Annotation<'u>)> {
        let source = &controller.unit.source;
        body_members(controller.node)
            .into_iter()
            .filter(|m| m.kind() == "method_declaration")
            .filter_map(|method| {
                self.config
                    .mapping_annotations
                    .iter()
                    .find_map(|marker| find_annotation(method, source, marker))
                    .map(|mapping| (method, mapping))
            })
            .collect()
    }

    /// Endpoint description without references
    fn build_endpoint(&self, controller: &Controller, method: Node, mapping: Annotation) -> EndpointInfo {
        let unit = controller.unit;
        let source = &unit.source;
        let class_path = find_annotation(controller.node, source, &self.config.route_annotation)
            .and_then(|route| route.string_value(source, PATH_KEYS))
            .unwrap_or_default();
        let method_name = declaration_name(method, source).unwrap_or_default().to_string();
        let method_path = mapping.string_value(source, PATH_KEYS).unwrap_or_default();

        let start = java::javadoc(method, source)
            .map(java::start_line)
            .unwrap_or_else(|| java::start_line(method));

        let mut req = HttpRequest {
            method: self.http_verb(source, &mapping),
            path: combine_paths(&class_path, &method_path),
            query_params: BTreeMap::new(),
            path_params: BTreeMap::new(),
            body: None,
        };
        self.read_parameters(unit, method, &mut req);

        EndpointInfo {
            controller_name: controller.scope.type_name().unwrap_or_default().to_string(),
            method_name,
            code_pos: unit.span(start, java::end_line(method)),
            req,
            references: Vec::new(),
        }
    }

    /// `GetMapping` maps to `GET`; the route annotation reads its `method`
    /// element and falls back to `ANY`
    fn http_verb(&self, source: &str, mapping: &Annotation) -> String {
        let name = mapping.name(source);

        if name == self.config.route_annotation {
            let Some(value) = mapping.element(source, "method") else {
                return "ANY".to_string();
            };
            let value = if value.kind() == "element_value_array_initializer" {
                match value.named_child(0) {
                    Some(first) => first,
                    None => return "ANY".to_string(),
                }
            } else {
                value
            };
            let text = java::node_text(value, source);
            return text.rsplit('.').next().unwrap_or(text).trim().to_uppercase();
        }

        match name.strip_suffix("Mapping") {
            Some(verb) if !verb.is_empty() => verb.to_uppercase(),
            _ => "ANY".to_string(),
        }
    }

    fn read_parameters(&self, unit: &CompilationUnit, method: Node, req: &mut HttpRequest) {
        let source = &unit.source;

        for param in java::parameters(method) {
            let param_name = java::parameter_name(param, source).unwrap_or_default();
            let param_type = java::parameter_type(param, source);

            if let Some(query) = find_annotation(param, source, &self.config.query_param_annotation) {
                let name = query
                    .string_value(source, NAME_KEYS)
                    .unwrap_or_else(|| param_name.to_string());
                req.query_params.insert(name, param_type);
            } else if let Some(variable) =
                find_annotation(param, source, &self.config.path_variable_annotation)
            {
                let name = variable
                    .string_value(source, NAME_KEYS)
                    .unwrap_or_else(|| param_name.to_string());
                req.path_params.insert(name, param_type);
            } else if find_annotation(param, source, &self.config.body_annotation).is_some() {
                req.body = Some(self.describe_body(unit, &param_type));
            }
        }
    }

    fn describe_body(&self, unit: &CompilationUnit, type_name: &str) -> RequestBody {
        let fqn = self.resolver.resolve_type(unit, type_name);
        let fields: BTreeMap<String, String> = fqn
            .as_deref()
            .and_then(|fqn| self.resolver.project_type(fqn))
            .map(|info| {
                info.fields
                    .iter()
                    .map(|f| (f.name.clone(), f.type_name.clone()))
                    .collect()
            })
            .unwrap_or_default();

        RequestBody {
            type_name: type_name.to_string(),
            fqn,
            fields,
        }
    }

    /// Call signatures and instantiated project types in the handler body,
    /// then the project types of the controller's fields
    fn collect_references(&self, controller: &Controller, method: Node, scope: &Scope) -> Vec<String> {
        let unit = controller.unit;
        let mut references = Vec::new();
        if let Some(body) = method.child_by_field_name("body") {
            self.collect_body_references(unit, body, scope, &mut references);
        }

        for member in body_members(controller.node)
            .into_iter()
            .filter(|m| m.kind() == "field_declaration")
        {
            let Some(type_text) = java::declared_type(member, &unit.source) else {
                continue;
            };
            if declarators(member).is_empty() {
                continue;
            }
            if let Some(fqn) = self.resolver.resolve_type(unit, &type_text) {
                self.push_internal(fqn, &mut references);
            }
        }

        references
    }

    fn collect_body_references(
        &self,
        unit: &CompilationUnit,
        node: Node,
        scope: &Scope,
        references: &mut Vec<String>,
    ) {
        match node.kind() {
            "method_invocation" => {
                // Only project methods resolve, so the signature is internal
                if let Some(signature) = self.resolver.resolve_call(unit, node, scope) {
                    push_unique(signature, references);
                }
            }
            "object_creation_expression" => {
                if let Some(fqn) = self.resolver.resolve_instantiation(unit, node) {
                    self.push_internal(fqn, references);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.collect_body_references(unit, child, scope, references);
        }
    }

    fn push_internal(&self, fqn: String, references: &mut Vec<String>) {
        if self.resolver.project_type(&fqn).is_some() {
            push_unique(fqn, references);
        }
    }
}

fn push_unique(value: String, values: &mut Vec<String>) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Symbols of one controller keyed by a stable id
#[derive(Default)]
struct SymbolTable {
    symbols: BTreeMap<String, SymbolDefinition>,
    ids: HashMap<String, String>,
    unresolved: Vec<String>,
}

impl SymbolTable {
    /// Id of the symbol registered under `key`, creating it on first sight
    fn intern(&mut self, key: String, kind: SymbolKind, create: impl FnOnce(String) -> SymbolDefinition) -> String {
        if let Some(id) = self.ids.get(&key) {
            return id.clone();
        }

        let id = format!("sym_{}_{:03}", kind.id_prefix(), self.symbols.len() + 1);
        self.symbols.insert(id.clone(), create(id.clone()));
        self.ids.insert(key, id.clone());
        id
    }

    fn add_usage(&mut self, id: &str, usage: SymbolUsage) {
        if let Some(symbol) = self.symbols.get_mut(id) {
            symbol.usage_contexts.push(usage);
        }
    }

    fn mark_unresolved(&mut self, name: String) {
        push_unique(name, &mut self.unresolved);
    }
}

/// Handler method being walked
struct Handler<'h> {
    name: &'h str,
    scope: &'h Scope,

    /// Parameters and locals hiding controller fields
    shadowed: HashSet<&'h str>,
}

struct SymbolCollector<'c, R: SymbolResolver> {
    resolver: &'c R,
    unit: &'c CompilationUnit,
    controller: Node<'c>,
    controller_fqn: Option<&'c str>,

    /// Controller field name to symbol id
    fields: HashMap<String, String>,
    table: SymbolTable,
}

impl<'c, R: SymbolResolver> SymbolCollector<'c, R> {
    fn new(resolver: &'c R, controller: &'c Controller<'c>) -> Self {
        Self {
            resolver,
            unit: controller.unit,
            controller: controller.node,
            controller_fqn: controller.scope.type_fqn(),
            fields: HashMap::new(),
            table: SymbolTable::default(),
        }
    }

    /// Controller fields whose type is a project type
    fn register_fields(&mut self) {
        let unit = self.unit;
        let source = &unit.source;

        for member in body_members(self.controller)
            .into_iter()
            .filter(|m| m.kind() == "field_declaration")
        {
            let Some(type_text) = java::declared_type(member, source) else {
                continue;
            };
            let Some(fqn) = self
                .resolver
                .resolve_type(unit, &type_text)
                .filter(|fqn| self.resolver.project_type(fqn).is_some())
            else {
                continue;
            };
            let snippet = java::normalize_whitespace(unit.text(member));

            for declarator in declarators(member) {
                let Some(name) = declaration_name(declarator, source) else {
                    continue;
                };
                let id = self.table.intern(format!("field:{}", name), SymbolKind::Field, |symbol_id| {
                    SymbolDefinition {
                        symbol_id,
                        symbol_name: name.to_string(),
                        symbol_type: SymbolKind::Field,
                        data_type: fqn.clone(),
                        scope: SymbolScope::ClassLevel,
                        definition: Some(SymbolLocation {
                            file_path: unit.relative_path.clone(),
                            line_number: java::start_line(declarator),
                            code_snippet: snippet.clone(),
                        }),
                        usage_contexts: Vec::new(),
                    }
                });
                self.fields.insert(name.to_string(), id);
            }
        }
    }

    /// Walk one handler and return the ids it references, in first-seen order
    fn collect_handler(&mut self, method: Node, name: &str, scope: &Scope) -> Vec<String> {
        let mut references = Vec::new();
        let Some(body) = method.child_by_field_name("body") else {
            return references;
        };

        let mut shadowed: HashSet<&str> = java::parameters(method)
            .into_iter()
            .filter_map(|p| java::parameter_name(p, &self.unit.source))
            .collect();
        collect_locals(self.unit, body, &mut shadowed);

        let handler = Handler {
            name,
            scope,
            shadowed,
        };
        self.walk(body, &handler, &mut references);
        references
    }

    fn walk(&mut self, node: Node, handler: &Handler, references: &mut Vec<String>) {
        if let Some(parent) = receiver_parent(node) {
            if let Some((_, id)) = self.field_reference(node, handler) {
                self.use_symbol(&id, UsageKind::FieldAccess, parent, handler, references);
            }
        }

        match node.kind() {
            "method_invocation" => self.method_call(node, handler, references),
            "object_creation_expression" => self.instantiation(node, handler, references),
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.walk(child, handler, references);
        }
    }

    fn method_call(&mut self, call: Node, handler: &Handler, references: &mut Vec<String>) {
        match self.resolver.resolve_call(self.unit, call, handler.scope) {
            Some(signature) => {
                let id = self.method_symbol(&signature);
                self.use_symbol(&id, UsageKind::MethodCall, call, handler, references);
            }
            None => {
                let receiver = call
                    .child_by_field_name("object")
                    .and_then(|object| self.field_reference(object, handler));
                if let (Some((field, _)), Some(name)) = (receiver, call.child_by_field_name("name")) {
                    self.table
                        .mark_unresolved(format!("{}.{}", field, self.unit.text(name)));
                }
            }
        }
    }

    fn instantiation(&mut self, creation: Node, handler: &Handler, references: &mut Vec<String>) {
        let Some(fqn) = self.resolver.resolve_instantiation(self.unit, creation) else {
            if let Some(type_node) = creation.child_by_field_name("type") {
                self.table
                    .mark_unresolved(java::erased_type_name(self.unit.text(type_node)));
            }
            return;
        };
        let Some(info) = self.resolver.project_type(&fqn) else {
            return;
        };

        let id = self.table.intern(format!("class:{}", fqn), SymbolKind::Class, |symbol_id| SymbolDefinition {
            symbol_id,
            symbol_name: info.simple_name.clone(),
            symbol_type: SymbolKind::Class,
            data_type: fqn.clone(),
            scope: SymbolScope::External,
            definition: Some(SymbolLocation {
                file_path: info.unit_path.clone(),
                line_number: info.line,
                code_snippet: fqn.clone(),
            }),
            usage_contexts: Vec::new(),
        });
        self.use_symbol(&id, UsageKind::Instantiation, creation, handler, references);
    }

    /// Symbol of a resolved `owner.FQN.method(Params)` signature
    fn method_symbol(&mut self, signature: &str) -> String {
        let (owner, name) = signature
            .split_once('(')
            .and_then(|(qualified, _)| qualified.rsplit_once('.'))
            .unwrap_or(("", signature));

        let definition = self.resolver.project_type(owner).and_then(|info| {
            info.methods
                .iter()
                .find(|m| m.qualified_signature(&info.fqn) == signature)
                .map(|m| SymbolLocation {
                    file_path: info.unit_path.clone(),
                    line_number: m.line,
                    code_snippet: signature.to_string(),
                })
        });
        let scope = if Some(owner) == self.controller_fqn {
            SymbolScope::ClassLevel
        } else {
            SymbolScope::External
        };

        self.table.intern(format!("method:{}", signature), SymbolKind::Method, |symbol_id| SymbolDefinition {
            symbol_id,
            symbol_name: name.to_string(),
            symbol_type: SymbolKind::Method,
            data_type: owner.to_string(),
            scope,
            definition,
            usage_contexts: Vec::new(),
        })
    }

    /// Controller field named by `node`, a bare identifier or `this.name`
    fn field_reference(&self, node: Node, handler: &Handler) -> Option<(String, String)> {
        let name = match node.kind() {
            "identifier" => {
                let name = self.unit.text(node);
                if handler.shadowed.contains(name) {
                    return None;
                }
                name
            }
            "field_access" if node.child_by_field_name("object")?.kind() == "this" => {
                self.unit.text(node.child_by_field_name("field")?)
            }
            _ => return None,
        };
        let id = self.fields.get(name)?;
        Some((name.to_string(), id.clone()))
    }

    fn use_symbol(&mut self, id: &str, usage_type: UsageKind, node: Node, handler: &Handler, references: &mut Vec<String>) {
        self.table.add_usage(
            id,
            SymbolUsage {
                api_method: handler.name.to_string(),
                usage_type,
                usage_line: java::start_line(node),
                usage_code: java::normalize_whitespace(self.unit.text(node)),
            },
        );
        push_unique(id.to_string(), references);
    }
}

/// The call or field access `node` is the receiver of
fn receiver_parent(node: Node) -> Option<Node> {
    let parent = node.parent()?;
    let is_receiver = matches!(parent.kind(), "method_invocation" | "field_access")
        && parent.child_by_field_name("object") == Some(node);
    is_receiver.then_some(parent)
}

/// Names of local variables declared anywhere under `node`
fn collect_locals<'s>(unit: &'s CompilationUnit, node: Node, names: &mut HashSet<&'s str>) {
    match node.kind() {
        "local_variable_declaration" => {
            for declarator in declarators(node) {
                if let Some(name) = declaration_name(declarator, &unit.source) {
                    names.insert(name);
                }
            }
        }
        "enhanced_for_statement" | "catch_formal_parameter" | "resource" => {
            if let Some(name) = declaration_name(node, &unit.source) {
                names.insert(name);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_locals(unit, child, names);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::fixtures::parse_units;
    use crate::core::resolver::ProjectResolver;

    const CONTROLLER: &str = r#"
package com.acme.web;

import com.acme.dto.UserForm;
import com.acme.service.UserService;
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/api/v2/advanced")
public class AdvancedController {

    private final UserService userService;

    /**
     * Look a user up.
     */
    @GetMapping("/users/{userId}")
    public String getUser(@PathVariable("userId") Long id, @RequestParam String expand) {
        return userService.find(id);
    }

    @RequestMapping(value = "/users", method = {RequestMethod.POST, RequestMethod.PUT})
    public void create(@RequestBody UserForm form) {
        userService.save(new UserForm());
    }

    @RequestMapping("ping/")
    public String ping() {
        return "pong";
    }

    public void helper() {}
}
"#;

    const SERVICE: &str = r#"
package com.acme.service;

import com.acme.dto.UserForm;

public class UserService {
    public String find(Long id) { return null; }
    public void save(UserForm form) {}
}
"#;

    const FORM: &str = r#"
package com.acme.dto;

public class UserForm {
    private String name;
    private int age;
}
"#;

    fn extract(files: &[(&str, &str)]) -> Vec<EndpointInfo> {
        let units = parse_units(files);
        let resolver = ProjectResolver::new(&units);
        let config = Config::default();
        EndpointExtractor::new(&config.endpoints, &resolver).extract(&units)
    }

    #[test]
    fn test_combine_paths() {
        assert_eq!(combine_paths("api/products", "{id}"), "/api/products/{id}");
        assert_eq!(combine_paths("/api/", "/items/"), "/api/items");
        assert_eq!(combine_paths("", ""), "/");
        assert_eq!(combine_paths("/", "/"), "/");
        assert_eq!(combine_paths("", "health"), "/health");
    }

    #[test]
    fn test_extracts_mapped_methods_only() {
        let endpoints = extract(&[
            ("src/com/acme/web/AdvancedController.java", CONTROLLER),
            ("src/com/acme/service/UserService.java", SERVICE),
            ("src/com/acme/dto/UserForm.java", FORM),
        ]);

        assert_eq!(endpoints.len(), 3);
        let names: Vec<&str> = endpoints.iter().map(|e| e.method_name.as_str()).collect();
        assert_eq!(names, vec!["getUser", "create", "ping"]);
        assert!(endpoints.iter().all(|e| e.controller_name == "AdvancedController"));
    }

    #[test]
    fn test_get_endpoint_details() {
        let endpoints = extract(&[
            ("src/com/acme/web/AdvancedController.java", CONTROLLER),
            ("src/com/acme/service/UserService.java", SERVICE),
            ("src/com/acme/dto/UserForm.java", FORM),
        ]);
        let get = &endpoints[0];

        assert_eq!(get.req.method, "GET");
        assert_eq!(get.req.path, "/api/v2/advanced/users/{userId}");
        assert_eq!(get.req.path_params.get("userId"), Some(&"Long".to_string()));
        assert_eq!(get.req.query_params.get("expand"), Some(&"String".to_string()));
        assert!(get.req.body.is_none());
        // Span starts at the Javadoc
        assert_eq!(get.code_pos, "src/com/acme/web/AdvancedController.java:L14-L20");
        assert_eq!(
            get.references,
            vec![
                "com.acme.service.UserService.find(Long)".to_string(),
                "com.acme.service.UserService".to_string(),
            ]
        );
    }

    #[test]
    fn test_route_annotation_verbs_and_body() {
        let endpoints = extract(&[
            ("src/com/acme/web/AdvancedController.java", CONTROLLER),
            ("src/com/acme/service/UserService.java", SERVICE),
            ("src/com/acme/dto/UserForm.java", FORM),
        ]);

        let create = &endpoints[1];
        assert_eq!(create.req.method, "POST");
        assert_eq!(create.req.path, "/api/v2/advanced/users");
        let body = create.req.body.as_ref().unwrap();
        assert_eq!(body.type_name, "UserForm");
        assert_eq!(body.fqn.as_deref(), Some("com.acme.dto.UserForm"));
        assert_eq!(body.fields.get("age"), Some(&"int".to_string()));
        assert_eq!(
            create.references,
            vec![
                "com.acme.service.UserService.save(UserForm)".to_string(),
                "com.acme.dto.UserForm".to_string(),
                "com.acme.service.UserService".to_string(),
            ]
        );

        let ping = &endpoints[2];
        assert_eq!(ping.req.method, "ANY");
        assert_eq!(ping.req.path, "/api/v2/advanced/ping");
    }

    #[test]
    fn test_non_controllers_are_ignored() {
        let endpoints = extract(&[(
            "Plain.java",
            "public class Plain { @GetMapping(\"/x\") public void x() {} }",
        )]);
        assert!(endpoints.is_empty());
    }

    #[test]
    fn test_endpoint_json_keys() {
        let endpoints = extract(&[(
            "HealthController.java",
            "@Controller public class HealthController { @GetMapping public String up() { return \"\"; } }",
        )]);
        let json = serde_json::to_value(&endpoints[0]).unwrap();

        assert_eq!(json["controller_name"], "HealthController");
        assert_eq!(json["method_name"], "up");
        assert_eq!(json["req"]["method"], "GET");
        assert_eq!(json["req"]["path"], "/");
        assert!(json["req"].get("body").is_none());

        let back: EndpointInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, endpoints[0]);
    }

    #[test]
    fn test_calls_on_same_service_stay_distinct() {
        let endpoints = extract(&[
            (
                "p/C.java",
                r#"package p;
@RestController
public class C {
    private S s;
    @PostMapping("/run")
    public void run() {
        s.find(1L);
        s.save("a");
    }
}"#,
            ),
            (
                "p/S.java",
                "package p; public class S { public void find(Long id) {} public void save(String v) {} }",
            ),
        ]);

        assert_eq!(
            endpoints[0].references,
            vec!["p.S.find(Long)".to_string(), "p.S.save(String)".to_string(), "p.S".to_string()]
        );
    }

    fn analyze(files: &[(&str, &str)]) -> Vec<ControllerAnalysis> {
        let units = parse_units(files);
        let resolver = ProjectResolver::new(&units);
        let config = Config::default();
        EndpointExtractor::new(&config.endpoints, &resolver).analyze(&units)
    }

    #[test]
    fn test_controller_symbol_table() {
        let analyses = analyze(&[
            ("src/com/acme/web/AdvancedController.java", CONTROLLER),
            ("src/com/acme/service/UserService.java", SERVICE),
            ("src/com/acme/dto/UserForm.java", FORM),
        ]);
        assert_eq!(analyses.len(), 1);
        let analysis = &analyses[0];

        assert_eq!(analysis.controller_name, "AdvancedController");
        assert_eq!(analysis.file_path, "src/com/acme/web/AdvancedController.java");
        assert_eq!(analysis.metadata.total_apis, 3);
        assert_eq!(analysis.metadata.total_symbols, 4);
        assert!(analysis.metadata.unresolved_symbols.is_empty());

        let refs: Vec<Vec<&str>> = analysis
            .apis
            .iter()
            .map(|api| api.references.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(
            refs,
            vec![
                vec!["sym_met_002", "sym_fie_001"],
                vec!["sym_met_003", "sym_fie_001", "sym_cla_004"],
                vec![],
            ]
        );

        let field = &analysis.symbol_table["sym_fie_001"];
        assert_eq!(field.symbol_name, "userService");
        assert_eq!(field.symbol_type, SymbolKind::Field);
        assert_eq!(field.scope, SymbolScope::ClassLevel);
        assert_eq!(field.data_type, "com.acme.service.UserService");
        let definition = field.definition.as_ref().unwrap();
        assert_eq!(definition.line_number, 12);
        assert_eq!(definition.code_snippet, "private final UserService userService;");

        let usages: Vec<(&str, usize, &str)> = field
            .usage_contexts
            .iter()
            .map(|u| (u.api_method.as_str(), u.usage_line, u.usage_code.as_str()))
            .collect();
        assert_eq!(
            usages,
            vec![
                ("getUser", 19, "userService.find(id)"),
                ("create", 24, "userService.save(new UserForm())"),
            ]
        );
        assert!(field.usage_contexts.iter().all(|u| u.usage_type == UsageKind::FieldAccess));

        let find = &analysis.symbol_table["sym_met_002"];
        assert_eq!(find.symbol_name, "find");
        assert_eq!(find.data_type, "com.acme.service.UserService");
        assert_eq!(find.scope, SymbolScope::External);
        let definition = find.definition.as_ref().unwrap();
        assert_eq!(definition.file_path, "src/com/acme/service/UserService.java");
        assert_eq!(definition.line_number, 7);
        assert_eq!(definition.code_snippet, "com.acme.service.UserService.find(Long)");

        let form = &analysis.symbol_table["sym_cla_004"];
        assert_eq!(form.symbol_type, SymbolKind::Class);
        assert_eq!(form.symbol_name, "UserForm");
        assert_eq!(form.usage_contexts[0].usage_type, UsageKind::Instantiation);
        assert_eq!(form.usage_contexts[0].usage_code, "new UserForm()");
    }

    #[test]
    fn test_unresolved_and_shadowed_symbols() {
        let analyses = analyze(&[
            (
                "shop/OrderController.java",
                r#"package shop;
@RestController
public class OrderController {
    private Repo repo;
    private Repo archive;

    @GetMapping("/orders")
    public void list(Repo archive) {
        repo.missing();
        archive.load();
        this.repo.load();
        Object ghost = new Ghost();
    }
}"#,
            ),
            ("shop/Repo.java", "package shop; public class Repo { public void load() {} }"),
        ]);
        let analysis = &analyses[0];

        assert_eq!(
            analysis.metadata.unresolved_symbols,
            vec!["repo.missing".to_string(), "Ghost".to_string()]
        );

        let repo = &analysis.symbol_table["sym_fie_001"];
        assert_eq!(repo.symbol_name, "repo");
        let codes: Vec<&str> = repo.usage_contexts.iter().map(|u| u.usage_code.as_str()).collect();
        assert_eq!(codes, vec!["repo.missing()", "this.repo.load()"]);

        // The parameter hides the field of the same name
        let archive = &analysis.symbol_table["sym_fie_002"];
        assert!(archive.usage_contexts.is_empty());

        let load = &analysis.symbol_table["sym_met_003"];
        assert_eq!(load.usage_contexts.len(), 2);
        assert_eq!(analysis.apis[0].references, vec!["sym_fie_001", "sym_met_003"]);
    }

    #[test]
    fn test_controller_analysis_json() {
        let analyses = analyze(&[
            ("src/com/acme/web/AdvancedController.java", CONTROLLER),
            ("src/com/acme/service/UserService.java", SERVICE),
            ("src/com/acme/dto/UserForm.java", FORM),
        ]);
        let json = serde_json::to_value(&analyses[0]).unwrap();

        assert_eq!(json["symbol_table"]["sym_fie_001"]["symbol_type"], "FIELD");
        assert_eq!(json["symbol_table"]["sym_fie_001"]["scope"], "CLASS_LEVEL");
        assert_eq!(
            json["symbol_table"]["sym_fie_001"]["usage_contexts"][0]["usage_type"],
            "FIELD_ACCESS"
        );
        assert_eq!(json["metadata"]["total_apis"], 3);

        let back: ControllerAnalysis = serde_json::from_value(json).unwrap();
        assert_eq!(back, analyses[0]);
    }
}
