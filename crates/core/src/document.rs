//! Typed document context handed to condition evaluation, template
//! rendering, and recipient resolution.
//!
//! A [`Document`] is the host application's record that triggered an event:
//! its type (`doctype`), its unique `name`, and a flat JSON object of field
//! values. Fields are read through [`Document::lookup`] with a [`FieldPath`];
//! unknown fields resolve to `None`, which callers treat as empty/null.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the variable that binds the document in conditions and templates.
pub const DOC_VARIABLE: &str = "doc";

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A triggering document with read-only field access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentParts")]
pub struct Document {
    doctype: String,
    name: String,
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct DocumentParts {
    doctype: String,
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl From<DocumentParts> for Document {
    fn from(parts: DocumentParts) -> Self {
        Document::new(parts.doctype, parts.name, parts.fields)
    }
}

impl Document {
    /// Build a document. `doctype` and `name` are also exposed as fields
    /// unless the field map already carries them.
    pub fn new(
        doctype: impl Into<String>,
        name: impl Into<String>,
        mut fields: Map<String, Value>,
    ) -> Self {
        let doctype = doctype.into();
        let name = name.into();
        fields
            .entry("doctype")
            .or_insert_with(|| Value::String(doctype.clone()));
        fields
            .entry("name")
            .or_insert_with(|| Value::String(name.clone()));
        Self {
            doctype,
            name,
            fields,
        }
    }

    /// Build a document from a JSON value; non-object values yield no fields.
    pub fn from_value(doctype: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(doctype, name, fields)
    }

    pub fn doctype(&self) -> &str {
        &self.doctype
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Read a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a top-level field as a trimmed, non-empty string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Walk `path` through the field map.
    ///
    /// Returns `None` as soon as a segment is missing or the value at that
    /// point cannot be indexed by the segment.
    pub fn lookup(&self, path: &FieldPath) -> Option<&Value> {
        let mut segments = path.segments.iter();
        let mut current = match segments.next()? {
            PathSegment::Key(key) => self.fields.get(key)?,
            PathSegment::Index(_) => return None,
        };
        for segment in segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// FieldPath
// ---------------------------------------------------------------------------

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A field access path below the `doc` variable, e.g. `doc.owner` or
/// `doc.items[0]["item code"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Build a path from segments. A path must name at least one field.
    pub fn new(segments: Vec<PathSegment>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Path addressing a single top-level field.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Key(name.into())],
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(DOC_VARIABLE)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DocumentMethod
// ---------------------------------------------------------------------------

/// Lifecycle hook that fired for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentMethod {
    AfterInsert,
    OnUpdate,
    OnSubmit,
    OnCancel,
    OnChange,
    Other(String),
}

impl DocumentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AfterInsert => "after_insert",
            Self::OnUpdate => "on_update",
            Self::OnSubmit => "on_submit",
            Self::OnCancel => "on_cancel",
            Self::OnChange => "on_change",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for DocumentMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "after_insert" => Self::AfterInsert,
            "on_update" => Self::OnUpdate,
            "on_submit" => Self::OnSubmit,
            "on_cancel" => Self::OnCancel,
            "on_change" => Self::OnChange,
            _ => Self::Other(value),
        }
    }
}

impl From<DocumentMethod> for String {
    fn from(value: DocumentMethod) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DocumentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Document {
        Document::from_value(
            "Task",
            "TASK-0001",
            json!({
                "status": "Open",
                "owner": "ana@example.com",
                "items": [{"item code": "X-1", "qty": 2}],
                "meta": {"priority": "High"}
            }),
        )
    }

    #[test]
    fn doctype_and_name_are_exposed_as_fields() {
        let doc = task();
        assert_eq!(doc.field_str("doctype"), Some("Task"));
        assert_eq!(doc.field_str("name"), Some("TASK-0001"));
    }

    #[test]
    fn explicit_name_field_wins() {
        let doc = Document::from_value("Task", "TASK-1", json!({"name": "custom"}));
        assert_eq!(doc.field_str("name"), Some("custom"));
        assert_eq!(doc.name(), "TASK-1");
    }

    #[test]
    fn nested_lookup_walks_objects_and_arrays() {
        let doc = task();
        let path = FieldPath::new(vec![
            PathSegment::Key("items".into()),
            PathSegment::Index(0),
            PathSegment::Key("item code".into()),
        ])
        .unwrap();
        assert_eq!(doc.lookup(&path), Some(&json!("X-1")));
        assert_eq!(path.to_string(), "doc.items[0].item code");
    }

    #[test]
    fn unknown_fields_resolve_to_none() {
        let doc = task();
        assert!(doc.lookup(&FieldPath::field("missing")).is_none());
        let through_scalar = FieldPath::new(vec![
            PathSegment::Key("status".into()),
            PathSegment::Key("x".into()),
        ])
        .unwrap();
        assert!(doc.lookup(&through_scalar).is_none());
    }

    #[test]
    fn blank_strings_are_not_field_values() {
        let doc = Document::from_value("Task", "T", json!({"assigned_to": "   "}));
        assert_eq!(doc.field_str("assigned_to"), None);
    }

    #[test]
    fn document_deserializes_with_normalised_fields() {
        let doc: Document = serde_json::from_value(json!({
            "doctype": "ToDo",
            "name": "TD-9",
            "fields": {"status": "Open"}
        }))
        .unwrap();
        assert_eq!(doc.field_str("doctype"), Some("ToDo"));
        assert_eq!(doc.field_str("status"), Some("Open"));
    }

    #[test]
    fn methods_parse_from_hook_names() {
        assert_eq!(DocumentMethod::from("on_submit".to_string()), DocumentMethod::OnSubmit);
        assert_eq!(
            DocumentMethod::from("validate".to_string()),
            DocumentMethod::Other("validate".into())
        );
        assert_eq!(DocumentMethod::AfterInsert.to_string(), "after_insert");
    }
}
