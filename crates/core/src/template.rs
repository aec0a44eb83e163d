//! Subject and message template rendering.
//!
//! Templates are Handlebars rendered against `{ "doc": <document fields> }`,
//! so placeholders read `{{doc.subject}}`, `{{doc.customer.name}}` or
//! `{{doc.[due date]}}`. Output is plain text: nothing is HTML-escaped.
//! Missing fields render as the empty string.
//!
//! Helpers available on top of the Handlebars built-ins:
//!
//! | Helper                      | Effect                                     |
//! |-----------------------------|--------------------------------------------|
//! | `upper x`                   | uppercase                                  |
//! | `lower x`                   | lowercase                                  |
//! | `title x`                   | capitalise each word                       |
//! | `trim x`                    | strip surrounding whitespace               |
//! | `default x "text"`          | substitute `text` when `x` is empty        |
//!
//! Helpers nest as subexpressions: `{{upper (default doc.owner "nobody")}}`.

use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::Document;

/// Errors from compiling or rendering a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid template: {0}")]
    Syntax(String),

    #[error("Template rendering failed: {0}")]
    Render(String),
}

#[derive(Serialize)]
struct TemplateContext<'a> {
    doc: &'a Map<String, Value>,
}

/// Plain-text rendering of a value: strings raw, null empty, the rest as JSON.
fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

handlebars_helper!(upper_helper: |value: Json| display(value).to_uppercase());
handlebars_helper!(lower_helper: |value: Json| display(value).to_lowercase());
handlebars_helper!(title_helper: |value: Json| title_case(&display(value)));
handlebars_helper!(trim_helper: |value: Json| display(value).trim().to_string());
handlebars_helper!(default_helper: |value: Json, fallback: str| {
    let text = display(value);
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
});

/// Handlebars registry with the notification helpers installed.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("upper", Box::new(upper_helper));
        registry.register_helper("lower", Box::new(lower_helper));
        registry.register_helper("title", Box::new(title_helper));
        registry.register_helper("trim", Box::new(trim_helper));
        registry.register_helper("default", Box::new(default_helper));
        Self { registry }
    }

    /// Render `source` against `doc`.
    pub fn render(&self, source: &str, doc: &Document) -> Result<String, RenderError> {
        handlebars::Template::compile(source).map_err(|e| RenderError::Syntax(e.to_string()))?;
        self.registry
            .render_template(source, &TemplateContext { doc: doc.fields() })
            .map_err(|e| RenderError::Render(e.to_string()))
    }

    /// Reject templates that cannot render for any document: syntax errors,
    /// unknown helpers and helpers called with the wrong arguments.
    pub fn check(&self, source: &str) -> Result<(), RenderError> {
        let empty = Document::new("", "", Map::new());
        self.render(source, &empty).map(|_| ())
    }
}
