//! Element-attributed schema violations.
//!
//! Every violation found during a pass is collected; the pass fails as a whole
//! and nothing is emitted if any were found.

use serde::Serialize;
use std::fmt;

/// Which half of a getter/setter pair is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorRole {
    Getter,
    Setter,
}

impl AccessorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessorRole::Getter => "getter",
            AccessorRole::Setter => "setter",
        }
    }
}

impl fmt::Display for AccessorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema rule broken by a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("field must not be final")]
    FinalField,

    #[error("private field has no {role}; expected `{expected}`")]
    MissingAccessor { role: AccessorRole, expected: String },

    #[error("type variable `{var}` is unresolved in `{ty}`")]
    UnresolvedTypeVariable { var: String, ty: String },

    #[error("unsupported type `{ty}`: {reason}")]
    UnsupportedShape { ty: String, reason: String },

    #[error("`{ty}` expects {expected} type arguments, found {found}")]
    ArityMismatch {
        ty: String,
        expected: usize,
        found: usize,
    },

    #[error("wire name `{name}` is already used by `{other}`")]
    DuplicateWireName { name: String, other: String },

    #[error("invalid type expression `{input}`: {reason}")]
    InvalidType { input: String, reason: String },

    #[error("inheritance cycle through `{ty}`")]
    InheritanceCycle { ty: String },
}

/// A violation attributed to a type (`com.example.User`) or a field
/// (`com.example.User.name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub element: String,
    pub violation: Violation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {}: {}", self.element, self.violation)
    }
}

/// Collected diagnostics for one pass. Duplicates are dropped on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: impl Into<String>, violation: Violation) {
        let diagnostic = Diagnostic {
            element: element.into(),
            violation,
        };
        if !self.0.contains(&diagnostic) {
            self.0.push(diagnostic);
        }
    }

    pub fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other.0 {
            self.push(diagnostic.element, diagnostic.violation);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was reported, otherwise the whole batch.
    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedups() {
        let mut diags = Diagnostics::new();
        diags.push("a.B.c", Violation::FinalField);
        diags.push("a.B.c", Violation::FinalField);
        diags.push("a.B.d", Violation::FinalField);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_display_lists_each_element() {
        let mut diags = Diagnostics::new();
        diags.push("com.example.User.name", Violation::FinalField);
        diags.push(
            "com.example.User.secret",
            Violation::MissingAccessor {
                role: AccessorRole::Getter,
                expected: "getSecret".into(),
            },
        );
        insta::assert_snapshot!(diags.to_string(), @r"
        error: com.example.User.name: field must not be final
        error: com.example.User.secret: private field has no getter; expected `getSecret`
        ");
    }
}
