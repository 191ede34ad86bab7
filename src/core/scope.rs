//! Traversal context
//!
//! Every analyzer walks the syntax tree carrying a [`Scope`] that records the
//! innermost enclosing type and method. Entering a declaration produces a new
//! value, so a nested declaration can never leak its context into siblings.

/// Immutable description of where a node sits in its compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    package: String,
    type_name: Option<String>,
    type_fqn: Option<String>,
    method_name: Option<String>,
    method_signature: Option<String>,
}

impl Scope {
    pub fn for_package(package: &str) -> Self {
        Self {
            package: package.to_string(),
            ..Self::default()
        }
    }

    /// Scope inside the body of a named type declared here
    pub fn enter_type(&self, name: &str) -> Self {
        let type_fqn = match (&self.type_fqn, self.package.is_empty()) {
            (Some(outer), _) => format!("{}.{}", outer, name),
            (None, true) => name.to_string(),
            (None, false) => format!("{}.{}", self.package, name),
        };

        Self {
            package: self.package.clone(),
            type_name: Some(name.to_string()),
            type_fqn: Some(type_fqn),
            method_name: None,
            method_signature: None,
        }
    }

    /// Scope inside a method body
    pub fn enter_method(&self, name: &str, signature: Option<String>) -> Self {
        Self {
            method_name: Some(name.to_string()),
            method_signature: signature,
            ..self.clone()
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn type_fqn(&self) -> Option<&str> {
        self.type_fqn.as_deref()
    }

    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    pub fn method_signature(&self) -> Option<&str> {
        self.method_signature.as_deref()
    }

    /// `Type.method` inside a method, `Type` elsewhere in a type
    pub fn context(&self) -> String {
        match (&self.type_name, &self.method_name) {
            (Some(t), Some(m)) => format!("{}.{}", t, m),
            (Some(t), None) => t.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_types_qualify_from_outer() {
        let outer = Scope::for_package("com.acme").enter_type("Outer");
        let inner = outer.enter_method("run", None).enter_type("Inner");

        assert_eq!(outer.type_fqn(), Some("com.acme.Outer"));
        assert_eq!(inner.type_fqn(), Some("com.acme.Outer.Inner"));
        assert_eq!(inner.method_name(), None);
        assert_eq!(inner.context(), "Inner");
    }

    #[test]
    fn test_context_in_default_package() {
        let scope = Scope::for_package("").enter_type("A").enter_method("go", Some("A.go()".into()));
        assert_eq!(scope.type_fqn(), Some("A"));
        assert_eq!(scope.context(), "A.go");
        assert_eq!(scope.method_signature(), Some("A.go()"));
    }
}
