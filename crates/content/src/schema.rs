//! Schema resolution for page creation.
//!
//! Precedence: an explicit schema payload wins, then a named template from
//! the templates directory, then a minimal default with one free-text field.

use serde_json::{Value, json};
use std::path::Path;

use crate::engine::ContentError;

/// Resolve the schema for a new page.
///
/// A named template that does not exist on disk falls through to the
/// default rather than failing creation; templates are a convenience, not a
/// registry.
pub fn resolve_schema(
    templates_dir: &Path,
    explicit: Option<Value>,
    template: Option<&str>,
    title: Option<&str>,
) -> Result<Value, ContentError> {
    if let Some(schema) = explicit {
        return Ok(schema);
    }
    if let Some(name) = template {
        let path = templates_dir.join(format!("{name}.json"));
        if path.exists() {
            return Ok(serde_json::from_reader(std::fs::File::open(path)?)?);
        }
    }
    Ok(default_schema(title))
}

/// Minimal default schema: a title plus one free-text body field.
pub fn default_schema(title: Option<&str>) -> Value {
    json!({
        "title": title.unwrap_or("Untitled"),
        "fields": [
            { "name": "body", "type": "text", "label": "Body" }
        ]
    })
}
