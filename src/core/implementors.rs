// src/core/implementors.rs
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::languages::java::{declaration_name, implemented_interfaces};
use super::parser::CompilationUnit;

/// Maps an interface FQN to the FQNs of the concrete types implementing it.
///
/// Only direct `implements` clauses are recorded. Interface names resolve
/// through the unit's own declarations, then its explicit imports, and
/// otherwise fall back to the unit's package. Names starting with a lowercase
/// package segment are taken as already qualified.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterfaceImplementorIndex {
    implementors: HashMap<String, BTreeSet<String>>,
}

impl InterfaceImplementorIndex {
    pub fn build(units: &[CompilationUnit]) -> Self {
        let mut index = Self::default();
        for unit in units {
            index.index_unit(unit);
        }
        debug!("Indexed implementors for {} interfaces", index.implementors.len());
        index
    }

    fn index_unit(&mut self, unit: &CompilationUnit) {
        let declared = unit.declared_types();

        let local: HashMap<&str, &str> = declared
            .iter()
            .filter_map(|(fqn, decl)| {
                declaration_name(decl.node, &unit.source).map(|name| (name, fqn.as_str()))
            })
            .collect();
        let imported: HashMap<&str, &str> = unit
            .imports
            .iter()
            .filter(|i| !i.is_static && !i.is_wildcard)
            .map(|i| (i.simple_name(), i.path.as_str()))
            .collect();

        for (fqn, decl) in &declared {
            if decl.kind == "interface_declaration" || decl.kind == "annotation_type_declaration" {
                continue;
            }

            for interface in implemented_interfaces(decl.node, &unit.source) {
                let resolved = resolve_interface(unit, &interface, &local, &imported);

                self.implementors
                    .entry(resolved)
                    .or_default()
                    .insert(fqn.clone());
            }
        }
    }

    /// Implementors of an interface in sorted order
    pub fn implementors_of(&self, interface_fqn: &str) -> impl Iterator<Item = &str> {
        self.implementors
            .get(interface_fqn)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}

fn resolve_interface(
    unit: &CompilationUnit,
    name: &str,
    local: &HashMap<&str, &str>,
    imported: &HashMap<&str, &str>,
) -> String {
    let known = |simple: &str| local.get(simple).or_else(|| imported.get(simple)).copied();

    if let Some(fqn) = known(name) {
        return fqn.to_string();
    }
    match name.split_once('.') {
        Some((head, _)) if head.starts_with(|c: char| c.is_lowercase()) => name.to_string(),
        Some((head, rest)) => match known(head) {
            Some(outer) => format!("{}.{}", outer, rest),
            None => unit.qualify(name),
        },
        None => unit.qualify(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::parse_units;

    #[test]
    fn test_implementors_resolve_through_imports_and_package() {
        let units = parse_units(&[
            (
                "shapes/Shape.java",
                "package com.geo.shapes; public interface Shape { double area(); }",
            ),
            (
                "impl/Circle.java",
                "package com.geo.impl; import com.geo.shapes.Shape; public class Circle implements Shape { public double area() { return 1; } }",
            ),
            (
                "shapes/Square.java",
                "package com.geo.shapes; public class Square implements Shape, Comparable<Square> { public double area() { return 4; } }",
            ),
            (
                "shapes/Solid.java",
                "package com.geo.shapes; public interface Solid extends Shape {}",
            ),
        ]);
        let index = InterfaceImplementorIndex::build(&units);

        let shapes: Vec<&str> = index.implementors_of("com.geo.shapes.Shape").collect();
        assert_eq!(shapes, vec!["com.geo.impl.Circle", "com.geo.shapes.Square"]);

        // Unimported names fall back to the declaring package
        let comparable: Vec<&str> = index.implementors_of("com.geo.shapes.Comparable").collect();
        assert_eq!(comparable, vec!["com.geo.shapes.Square"]);

        assert_eq!(index.implementors_of("com.geo.shapes.Solid").count(), 0);
    }

    #[test]
    fn test_nested_interface_resolves_to_declared_type() {
        let units = parse_units(&[(
            "Outer.java",
            "package p; public class Outer { interface Listener {} static class Impl implements Listener {} }",
        )]);
        let index = InterfaceImplementorIndex::build(&units);

        let found: Vec<&str> = index.implementors_of("p.Outer.Listener").collect();
        assert_eq!(found, vec!["p.Outer.Impl"]);
    }

    #[test]
    fn test_qualified_interface_names_are_kept() {
        let units = parse_units(&[
            ("Shape.java", "package com.x; public interface Shape { double area(); }"),
            (
                "Circle.java",
                "package com.geo; public class Circle implements com.x.Shape { public double area() { return 1; } }",
            ),
            (
                "Events.java",
                "package com.geo; import com.bus.Bus; public class Events implements Bus.Listener {}",
            ),
        ]);
        let index = InterfaceImplementorIndex::build(&units);

        let shapes: Vec<&str> = index.implementors_of("com.x.Shape").collect();
        assert_eq!(shapes, vec!["com.geo.Circle"]);
        assert_eq!(index.implementors_of("com.geo.com.x.Shape").count(), 0);

        let listeners: Vec<&str> = index.implementors_of("com.bus.Bus.Listener").collect();
        assert_eq!(listeners, vec!["com.geo.Events"]);
    }
}
