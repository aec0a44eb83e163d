//! Sandboxed condition language for notification rules.
//!
//! Administrator-authored conditions such as `doc.status == 'APPROVED'` are
//! tokenized, parsed into an [`Expr`] tree and interpreted against a
//! [`Document`]. The only name in scope is `doc`; the language has field
//! access, literals, lists, comparisons (`== != < <= > >= in`, `not in`) and
//! boolean operators (`and or not`, `&& || !`). There are no calls,
//! assignments or any other way to reach outside the document.

mod eval;
mod lexer;
mod parser;

pub use eval::truthy;
pub use parser::{CompareOp, Expr};

use crate::document::Document;

/// Errors from parsing or evaluating a condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("Unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unknown name '{0}': only 'doc' may be referenced")]
    UnknownName(String),

    #[error("Cannot compare {left} with {right} using '{op}'")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Expression is nested too deeply")]
    TooDeep,

    #[error("Expression is too long ({0} bytes)")]
    TooLong(usize),
}

/// A parsed condition, ready to be evaluated against many documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::Parser::new(tokens, source.len()).parse_complete()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against `doc` and reduce the result to a boolean.
    pub fn evaluate(&self, doc: &Document) -> Result<bool, ConditionError> {
        eval::eval(&self.expr, doc).map(|value| truthy(&value))
    }
}

/// Decide whether an optional rule condition holds for `doc`.
///
/// An absent or blank condition always holds.
pub fn evaluate(condition: Option<&str>, doc: &Document) -> Result<bool, ConditionError> {
    match condition.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(true),
        Some(source) => Condition::parse(source)?.evaluate(doc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_value(
            "Task",
            "TASK-0001",
            json!({
                "status": "APPROVED",
                "priority": "High",
                "progress": 75,
                "tags": ["urgent", "ops"],
                "customer": {"tier": "gold"},
                "assigned_to": null
            }),
        )
    }

    #[test]
    fn absent_or_blank_condition_holds() {
        assert!(evaluate(None, &doc()).unwrap());
        assert!(evaluate(Some("   "), &doc()).unwrap());
    }

    #[test]
    fn status_equality_scenario() {
        assert!(evaluate(Some("doc.status == 'APPROVED'"), &doc()).unwrap());
        assert!(!evaluate(Some("doc.status == \"REJECTED\""), &doc()).unwrap());
    }

    #[test]
    fn boolean_combinations() {
        let d = doc();
        assert!(evaluate(Some("doc.progress >= 50 and doc.priority != 'Low'"), &d).unwrap());
        assert!(evaluate(Some("doc.progress > 90 || 'ops' in doc.tags"), &d).unwrap());
        assert!(evaluate(Some("not doc.assigned_to"), &d).unwrap());
        assert!(evaluate(Some("doc.customer.tier in ['gold', 'platinum']"), &d).unwrap());
        assert!(!evaluate(Some("!(doc.status == 'APPROVED')"), &d).unwrap());
    }

    #[test]
    fn unknown_fields_are_null() {
        assert!(evaluate(Some("doc.missing == None"), &doc()).unwrap());
        assert!(!evaluate(Some("doc.missing"), &doc()).unwrap());
    }

    #[test]
    fn bare_field_uses_truthiness() {
        assert!(evaluate(Some("doc.tags"), &doc()).unwrap());
    }

    #[test]
    fn and_short_circuits_type_errors() {
        // The right-hand side would be a type error; it is never evaluated.
        assert!(!evaluate(Some("doc.missing and doc.missing > 1"), &doc()).unwrap());
    }

    #[test]
    fn type_errors_surface_as_errors() {
        assert_matches!(
            evaluate(Some("doc.assigned_to > 3"), &doc()),
            Err(ConditionError::TypeMismatch { op: ">", .. })
        );
    }

    #[test]
    fn code_injection_attempts_do_not_parse() {
        for src in [
            "__import__('os').system('rm -rf /')",
            "doc.status == 'x'; frappe.db.commit()",
            "doc.save()",
            "doc.status = 'Closed'",
        ] {
            assert!(evaluate(Some(src), &doc()).is_err(), "{src} should be rejected");
        }
    }

    #[test]
    fn parsed_condition_is_reusable() {
        let condition = Condition::parse("doc.progress < 100").unwrap();
        assert_eq!(condition.source(), "doc.progress < 100");
        assert!(condition.evaluate(&doc()).unwrap());
        let done = Document::from_value("Task", "T2", json!({"progress": 100}));
        assert!(!condition.evaluate(&done).unwrap());
    }
}
