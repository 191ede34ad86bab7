// src/core/call_graph/matcher.rs
use tree_sitter::Node;

use super::call_graph::CallGraph;
use crate::core::parser::CompilationUnit;
use crate::core::resolver::SymbolResolver;
use crate::core::scope::Scope;

/// A call expression met during linking
pub struct CallContext<'a> {
    pub unit: &'a CompilationUnit,
    pub call: Node<'a>,

    /// Simple name of the invoked method
    pub callee: &'a str,

    pub scope: &'a Scope,
}

/// Chooses the registered method a call lands on
pub trait CallMatcher {
    fn name(&self) -> &'static str;

    fn match_call(&self, call: &CallContext<'_>, graph: &CallGraph) -> Option<String>;
}

/// First registered signature, in sorted order, containing `.callee(`
#[derive(Debug, Clone, Copy, Default)]
pub struct NameMatcher;

impl CallMatcher for NameMatcher {
    fn name(&self) -> &'static str {
        "name"
    }

    fn match_call(&self, call: &CallContext<'_>, graph: &CallGraph) -> Option<String> {
        let needle = format!(".{}(", call.callee);
        graph
            .signatures()
            .find(|signature| signature.contains(&needle))
            .map(str::to_string)
    }
}

/// Uses receiver types to pick the target, falling back to [`NameMatcher`]
pub struct ResolvedMatcher<'r, R: SymbolResolver> {
    resolver: &'r R,
}

impl<'r, R: SymbolResolver> ResolvedMatcher<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Self { resolver }
    }
}

impl<R: SymbolResolver> CallMatcher for ResolvedMatcher<'_, R> {
    fn name(&self) -> &'static str {
        "resolved"
    }

    fn match_call(&self, call: &CallContext<'_>, graph: &CallGraph) -> Option<String> {
        self.resolver
            .resolve_call(call.unit, call.call, call.scope)
            .and_then(|qualified| graph_key(&qualified))
            .filter(|key| graph.contains(key))
            .or_else(|| NameMatcher.match_call(call, graph))
    }
}

/// `com.x.Outer.Inner.run(int)` to the node key `Inner.run(int)`
fn graph_key(qualified: &str) -> Option<String> {
    let open = qualified.find('(')?;
    let (path, params) = qualified.split_at(open);
    let (owner, method) = path.rsplit_once('.')?;
    let simple = owner.rsplit('.').next().unwrap_or(owner);
    Some(format!("{}.{}{}", simple, method, params))
}
