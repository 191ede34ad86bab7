// src/core/languages/java.rs
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{JavalensError, Result};
use super::LanguageParser;

/// Node kinds that introduce a named type
pub const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

const PRIMITIVE_TYPES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void", "var",
];

/// Java parser backed by tree-sitter
pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let java_language = tree_sitter_java::language();
        parser
            .set_language(&java_language)
            .map_err(|e| JavalensError::Parser(format!("Failed to set Java language: {}", e)))?;

        Ok(Self { parser })
    }
}

impl LanguageParser for JavaParser {
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<Tree> {
        self.parser.parse(content, None).ok_or_else(|| {
            JavalensError::Parser(format!("Failed to parse {}", file_path.display()))
        })
    }

    fn file_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn language_name(&self) -> &str {
        "java"
    }
}

/// An annotation attached to a declaration, keyed by its simple name
#[derive(Debug, Clone, Copy)]
pub struct Annotation<'t> {
    pub node: Node<'t>,
    name_range: (usize, usize),
}

impl<'t> Annotation<'t> {
    /// Simple name of the annotation (`RequestMapping` for `@org.x.RequestMapping`)
    pub fn name<'s>(&self, source: &'s str) -> &'s str {
        let full = &source[self.name_range.0..self.name_range.1];
        full.rsplit('.').next().unwrap_or(full)
    }

    /// First string value of the annotation for any of `keys`.
    ///
    /// A single unnamed argument counts as `value`. Array values yield their
    /// first string element.
    pub fn string_value(&self, source: &str, keys: &[&str]) -> Option<String> {
        let arguments = self.node.child_by_field_name("arguments")?;
        let mut cursor = arguments.walk();
        for argument in arguments.named_children(&mut cursor) {
            match argument.kind() {
                "element_value_pair" => {
                    let (Some(key), Some(value)) = (
                        argument.child_by_field_name("key"),
                        argument.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    if keys.contains(&node_text(key, source)) {
                        if let Some(text) = first_string(value, source) {
                            return Some(text);
                        }
                    }
                }
                _ if keys.contains(&"value") => {
                    if let Some(text) = first_string(argument, source) {
                        return Some(text);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Raw value node of a named element (`method = RequestMethod.GET`)
    pub fn element(&self, source: &str, key: &str) -> Option<Node<'t>> {
        let arguments = self.node.child_by_field_name("arguments")?;
        let mut cursor = arguments.walk();
        let found = arguments
            .named_children(&mut cursor)
            .filter(|argument| argument.kind() == "element_value_pair")
            .find(|pair| {
                pair.child_by_field_name("key")
                    .map(|k| node_text(k, source) == key)
                    .unwrap_or(false)
            })
            .and_then(|pair| pair.child_by_field_name("value"));
        found
    }
}

fn first_string(value: Node, source: &str) -> Option<String> {
    match value.kind() {
        "string_literal" => Some(unquote(node_text(value, source))),
        "element_value_array_initializer" => {
            let mut cursor = value.walk();
            let first = value
                .named_children(&mut cursor)
                .find(|element| element.kind() == "string_literal");
            first.map(|element| unquote(node_text(element, source)))
        }
        _ => None,
    }
}

/// Strip the surrounding quotes of a string literal
pub fn unquote(literal: &str) -> String {
    let trimmed = literal.trim();
    let inner = trimmed
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
        .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(trimmed);
    inner.to_string()
}

/// Source text covered by a node
pub fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// 1-based start line
pub fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// 1-based end line
pub fn end_line(node: Node) -> usize {
    node.end_position().row + 1
}

/// 1-based start column
pub fn start_column(node: Node) -> usize {
    node.start_position().column + 1
}

pub fn is_type_declaration(kind: &str) -> bool {
    TYPE_DECLARATION_KINDS.contains(&kind)
}

pub fn is_comment(kind: &str) -> bool {
    matches!(kind, "line_comment" | "block_comment" | "comment")
}

pub fn is_primitive(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&type_name)
}

/// Text of the `name` field of a declaration
pub fn declaration_name<'s>(node: Node, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name("name").map(|n| node_text(n, source))
}

/// The unnamed `modifiers` child of a declaration
pub fn modifiers_node(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| child.kind() == "modifiers");
    found
}

/// Annotations in a declaration's modifier list, in source order
pub fn annotations(node: Node) -> Vec<Annotation> {
    let Some(modifiers) = modifiers_node(node) else {
        return Vec::new();
    };

    let mut cursor = modifiers.walk();
    let found = modifiers
        .named_children(&mut cursor)
        .filter(|child| matches!(child.kind(), "annotation" | "marker_annotation"))
        .filter_map(|child| {
            let name = child.child_by_field_name("name")?;
            Some(Annotation {
                node: child,
                name_range: (name.start_byte(), name.end_byte()),
            })
        })
        .collect();
    found
}

/// First annotation on `node` with the given simple name
pub fn find_annotation<'t>(node: Node<'t>, source: &str, name: &str) -> Option<Annotation<'t>> {
    annotations(node)
        .into_iter()
        .find(|annotation| annotation.name(source) == name)
}

/// Modifier keywords of a declaration (`public`, `static`, ...), annotations excluded
pub fn modifier_keywords(node: Node, source: &str) -> Vec<String> {
    let Some(modifiers) = modifiers_node(node) else {
        return Vec::new();
    };

    let mut cursor = modifiers.walk();
    let keywords = modifiers
        .children(&mut cursor)
        .filter(|child| {
            !matches!(child.kind(), "annotation" | "marker_annotation") && !is_comment(child.kind())
        })
        .map(|child| node_text(child, source).to_string())
        .collect();
    keywords
}

/// Collapse all whitespace runs to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a type expression to its erased name: `List<User>[]` becomes `List`
pub fn erased_type_name(type_text: &str) -> String {
    let cut = type_text
        .find(|c| c == '<' || c == '[')
        .map(|i| &type_text[..i])
        .unwrap_or(type_text);
    let cut = cut.trim_end_matches("...").trim();
    cut.split_whitespace()
        .filter(|token| !token.starts_with('@'))
        .last()
        .unwrap_or("")
        .to_string()
}

/// Rendered type of a declaration's `type` field
pub fn declared_type(node: Node, source: &str) -> Option<String> {
    node.child_by_field_name("type")
        .map(|t| normalize_whitespace(node_text(t, source)))
}

/// Parameters of a method, constructor or lambda in declaration order
pub fn parameters(node: Node) -> Vec<Node> {
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };

    let mut cursor = list.walk();
    let params = list
        .named_children(&mut cursor)
        .filter(|p| matches!(p.kind(), "formal_parameter" | "spread_parameter"))
        .collect();
    params
}

/// Declared name of a formal or varargs parameter
pub fn parameter_name<'s>(param: Node, source: &'s str) -> Option<&'s str> {
    if param.kind() == "spread_parameter" {
        let mut cursor = param.walk();
        let declarator = param
            .named_children(&mut cursor)
            .find(|child| child.kind() == "variable_declarator")?;
        return declaration_name(declarator, source);
    }
    declaration_name(param, source)
}

/// Rendered type of a parameter; varargs carry a trailing `...`
pub fn parameter_type(param: Node, source: &str) -> String {
    if param.kind() == "spread_parameter" {
        let mut cursor = param.walk();
        let element = param
            .named_children(&mut cursor)
            .find(|child| {
                child.kind() != "modifiers" && child.kind() != "variable_declarator" && !is_comment(child.kind())
            })
            .map(|t| normalize_whitespace(node_text(t, source)))
            .unwrap_or_default();
        return format!("{}...", element);
    }
    declared_type(param, source).unwrap_or_default()
}

/// Javadoc comment directly preceding a declaration
pub fn javadoc<'t>(node: Node<'t>, source: &str) -> Option<Node<'t>> {
    let previous = node.prev_sibling()?;
    if is_comment(previous.kind()) && node_text(previous, source).starts_with("/**") {
        Some(previous)
    } else {
        None
    }
}

/// Erased names listed in a `superclass`, `super_interfaces` or `extends_interfaces` clause
pub fn clause_types(clause: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut inner = child.walk();
            names.extend(
                child
                    .named_children(&mut inner)
                    .map(|t| erased_type_name(node_text(t, source))),
            );
        } else if !is_comment(child.kind()) {
            names.push(erased_type_name(node_text(child, source)));
        }
    }
    names.retain(|n| !n.is_empty());
    names
}

/// Types named in the `implements` clause of a class, enum or record
pub fn implemented_interfaces(decl: Node, source: &str) -> Vec<String> {
    decl.child_by_field_name("interfaces")
        .map(|clause| clause_types(clause, source))
        .unwrap_or_default()
}

/// Every supertype a type declaration names, superclass first
pub fn supertypes(decl: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(superclass) = decl.child_by_field_name("superclass") {
        names.extend(clause_types(superclass, source));
    }
    names.extend(implemented_interfaces(decl, source));

    let mut cursor = decl.walk();
    let extends: Vec<Node> = decl
        .children(&mut cursor)
        .filter(|c| c.kind() == "extends_interfaces")
        .collect();
    for clause in extends {
        names.extend(clause_types(clause, source));
    }
    names
}

/// Direct members of a type body; enum constants and the declarations after them included
pub fn body_members(decl: Node) -> Vec<Node> {
    let Some(body) = decl.child_by_field_name("body") else {
        return Vec::new();
    };

    let mut members = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            members.extend(child.named_children(&mut inner));
        } else {
            members.push(child);
        }
    }
    members
}

/// Names introduced by a `field_declaration` or `local_variable_declaration`
pub fn declarators(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let found = node.children_by_field_name("declarator", &mut cursor).collect();
    found
}

/// Nearest enclosing node of one of the given kinds
pub fn enclosing<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if kinds.contains(&candidate.kind()) {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

/// Number of arguments at a call or instantiation
pub fn argument_count(node: Node) -> usize {
    node.child_by_field_name("arguments")
        .map(|args| {
            let mut cursor = args.walk();
            let count = args
                .named_children(&mut cursor)
                .filter(|a| !is_comment(a.kind()))
                .count();
            count
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Tree {
        let mut parser = JavaParser::new().unwrap();
        parser.parse(source, Path::new("Test.java")).unwrap()
    }

    fn first_method<'t>(node: Node<'t>) -> Option<Node<'t>> {
        if node.kind() == "method_declaration" {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        children.into_iter().find_map(first_method)
    }

    #[test]
    fn test_annotation_values() {
        let source = r#"
class C {
    @RequestMapping(value = {"/a", "/b"}, method = RequestMethod.POST)
    public void handle() {}
}
"#;
        let tree = parse(source);
        let method = first_method(tree.root_node()).unwrap();
        let annotation = find_annotation(method, source, "RequestMapping").unwrap();

        assert_eq!(annotation.string_value(source, &["value", "path"]), Some("/a".to_string()));
        let verb = annotation.element(source, "method").unwrap();
        assert_eq!(node_text(verb, source), "RequestMethod.POST");
        assert_eq!(modifier_keywords(method, source), vec!["public".to_string()]);
    }

    #[test]
    fn test_parameters_and_varargs() {
        let source = "class C { int sum(final int base, String... rest) { return 0; } }";
        let tree = parse(source);
        let method = first_method(tree.root_node()).unwrap();
        let params = parameters(method);

        assert_eq!(params.len(), 2);
        assert_eq!(parameter_name(params[0], source), Some("base"));
        assert_eq!(parameter_type(params[0], source), "int");
        assert_eq!(parameter_name(params[1], source), Some("rest"));
        assert_eq!(parameter_type(params[1], source), "String...");
    }

    #[test]
    fn test_javadoc_lookup() {
        let source = "class C {\n    /** Docs. */\n    void a() {}\n    // plain\n    void b() {}\n}\n";
        let tree = parse(source);
        let method = first_method(tree.root_node()).unwrap();
        let doc = javadoc(method, source).unwrap();
        assert_eq!(start_line(doc), 2);
        assert_eq!(start_line(method), 3);
    }

    #[test]
    fn test_erased_type_name() {
        assert_eq!(erased_type_name("List<User>"), "List");
        assert_eq!(erased_type_name("byte[]"), "byte");
        assert_eq!(erased_type_name("@NonNull com.x.Foo"), "com.x.Foo");
        assert_eq!(unquote("\"/api\""), "/api");
    }
}
