// src/core/call_graph/call_graph.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use tree_sitter::Node;

use super::matcher::{CallContext, CallMatcher};
use crate::core::languages::java::{self, declaration_name, is_type_declaration};
use crate::core::parser::CompilationUnit;
use crate::core::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Direct,
}

/// A call observed inside a method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub target_method: String,

    /// `file:Lline:Ccol` of the call expression
    pub code_pos: String,

    pub call_type: CallType,
}

/// A method in the call graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphNode {
    /// `Type.method(ParamType, ...)`
    pub method_signature: String,
    pub class_name: String,
    pub method_name: String,

    /// `file:Lstart-Lend`
    pub code_pos: String,

    #[serde(default)]
    pub callers: Vec<String>,
    #[serde(default)]
    pub callees: Vec<String>,
    #[serde(default)]
    pub call_sites: Vec<CallSite>,
}

impl CallGraphNode {
    pub fn is_isolated(&self) -> bool {
        self.callers.is_empty() && self.callees.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphStats {
    pub total_methods: usize,
    pub total_edges: usize,
    pub total_call_sites: usize,
    pub isolated_methods: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
}

/// Method-level call graph keyed by signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallGraph {
    nodes: BTreeMap<String, CallGraphNode>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every method, then link calls
    pub fn build(units: &[CompilationUnit], matcher: &dyn CallMatcher) -> Self {
        let mut graph = Self::new();

        graph.register(units);
        debug!("Registered {} methods", graph.nodes.len());

        graph.link(units, matcher);

        let stats = graph.get_statistics();
        info!(
            "Call graph: {} methods, {} edges, {} call sites, {} isolated (matcher: {})",
            stats.total_methods,
            stats.total_edges,
            stats.total_call_sites,
            stats.isolated_methods,
            matcher.name()
        );
        debug!(
            "Busiest methods: {} callers, {} callees",
            stats.max_in_degree, stats.max_out_degree
        );

        graph
    }

    /// First pass: add a node for every method declaration not yet known
    pub fn register(&mut self, units: &[CompilationUnit]) {
        for unit in units {
            self.register_node(unit, unit.root(), &Scope::for_package(&unit.package));
        }
    }

    /// Second pass: attach each call to the method the matcher selects
    pub fn link(&mut self, units: &[CompilationUnit], matcher: &dyn CallMatcher) {
        for unit in units {
            self.link_node(unit, unit.root(), &Scope::for_package(&unit.package), matcher);
        }
    }

    fn register_node(&mut self, unit: &CompilationUnit, node: Node, scope: &Scope) {
        let scope = self.descend(unit, node, scope);

        if node.kind() == "method_declaration" {
            if let (Some(signature), Some(class_name), Some(method_name)) = (
                scope.method_signature(),
                scope.type_name(),
                scope.method_name(),
            ) {
                if !self.nodes.contains_key(signature) {
                    self.nodes.insert(
                        signature.to_string(),
                        CallGraphNode {
                            method_signature: signature.to_string(),
                            class_name: class_name.to_string(),
                            method_name: method_name.to_string(),
                            code_pos: unit.span(java::start_line(node), java::end_line(node)),
                            callers: Vec::new(),
                            callees: Vec::new(),
                            call_sites: Vec::new(),
                        },
                    );
                }
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.register_node(unit, child, &scope);
        }
    }

    fn link_node(&mut self, unit: &CompilationUnit, node: Node, scope: &Scope, matcher: &dyn CallMatcher) {
        let scope = self.descend(unit, node, scope);

        if node.kind() == "method_invocation" {
            let current = scope
                .method_signature()
                .filter(|signature| self.nodes.contains_key(*signature));
            let callee = node.child_by_field_name("name").map(|n| unit.text(n));

            if let (Some(current), Some(callee)) = (current, callee) {
                let context = CallContext {
                    unit,
                    call: node,
                    callee,
                    scope: &scope,
                };
                if let Some(target) = matcher.match_call(&context, self) {
                    self.add_edge(current, &target, unit.position(node));
                }
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.link_node(unit, child, &scope, matcher);
        }
    }

    /// Scope for the subtree rooted at `node`
    fn descend(&self, unit: &CompilationUnit, node: Node, scope: &Scope) -> Scope {
        let source = &unit.source;
        match node.kind() {
            kind if is_type_declaration(kind) => match declaration_name(node, source) {
                Some(name) => scope.enter_type(name),
                None => scope.clone(),
            },
            "method_declaration" => match (declaration_name(node, source), scope.type_name()) {
                (Some(name), Some(owner)) => {
                    scope.enter_method(name, Some(method_signature(owner, name, node, source)))
                }
                _ => scope.clone(),
            },
            "constructor_declaration" => match declaration_name(node, source) {
                Some(name) => scope.enter_method(name, None),
                None => scope.clone(),
            },
            _ => scope.clone(),
        }
    }

    /// Record `caller -> callee`; list entries stay unique, call sites accumulate
    pub fn add_edge(&mut self, caller: &str, callee: &str, code_pos: String) {
        if !self.nodes.contains_key(callee) {
            return;
        }

        if let Some(node) = self.nodes.get_mut(caller) {
            if !node.callees.iter().any(|c| c == callee) {
                node.callees.push(callee.to_string());
            }
            node.call_sites.push(CallSite {
                target_method: callee.to_string(),
                code_pos,
                call_type: CallType::Direct,
            });
        } else {
            return;
        }

        if let Some(node) = self.nodes.get_mut(callee) {
            if !node.callers.iter().any(|c| c == caller) {
                node.callers.push(caller.to_string());
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, signature: &str) -> Option<&CallGraphNode> {
        self.nodes.get(signature)
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.nodes.contains_key(signature)
    }

    /// Signatures in sorted order
    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Get statistics about the call graph
    pub fn get_statistics(&self) -> CallGraphStats {
        CallGraphStats {
            total_methods: self.nodes.len(),
            total_edges: self.nodes.values().map(|n| n.callees.len()).sum(),
            total_call_sites: self.nodes.values().map(|n| n.call_sites.len()).sum(),
            isolated_methods: self.nodes.values().filter(|n| n.is_isolated()).count(),
            max_in_degree: self.nodes.values().map(|n| n.callers.len()).max().unwrap_or(0),
            max_out_degree: self.nodes.values().map(|n| n.callees.len()).max().unwrap_or(0),
        }
    }
}

/// `Owner.method(ParamType, ...)` with parameter types as written
pub fn method_signature(owner: &str, name: &str, method: Node, source: &str) -> String {
    let params: Vec<String> = java::parameters(method)
        .into_iter()
        .map(|p| java::parameter_type(p, source))
        .collect();
    format!("{}.{}({})", owner, name, params.join(", "))
}
