//! Core data structures for canvas documents

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Stable identifier of an element across versions of a diagram.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        ElementId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        ElementId(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        ElementId(id)
    }
}

/// Canvas coordinates of an element's origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        same_coord(self.x, other.x) && same_coord(self.y, other.y)
    }
}

/// Bounding size of a shape. Not every shape kind carries one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl PartialEq for Size {
    fn eq(&self, other: &Self) -> bool {
        same_coord(self.width, other.width) && same_coord(self.height, other.height)
    }
}

/// NaN compares equal to NaN so that a document always equals itself.
fn same_coord(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Style properties (color, stroke, fill, ...). Compared by key→value equality.
pub type StyleMap = BTreeMap<String, String>;

/// One visual shape within a canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    /// Shape kind, e.g. "rectangle", "circle", "arrow".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,
    #[serde(default, rename = "textContent", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, kind: impl Into<String>) -> Self {
        Element {
            id: id.into(),
            kind: kind.into(),
            position: None,
            size: None,
            style: None,
            text: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn sized(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Size { width, height });
        self
    }

    /// Set one style entry, creating the style map if absent.
    pub fn styled(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.style
            .get_or_insert_with(StyleMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// One immutable snapshot of a diagram: elements in insertion order plus note text.
///
/// A new version is always a new value; there are no in-place mutators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "DocumentRepr")]
pub struct CanvasDocument {
    elements: IndexMap<ElementId, Element>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Deserialize)]
struct DocumentRepr {
    #[serde(default)]
    elements: IndexMap<String, Element>,
    #[serde(default)]
    note: Option<String>,
}

impl TryFrom<DocumentRepr> for CanvasDocument {
    type Error = CoreError;

    fn try_from(repr: DocumentRepr) -> Result<Self> {
        let mut elements = IndexMap::with_capacity(repr.elements.len());
        for (key, element) in repr.elements {
            if key != element.id.0 {
                return Err(CoreError::IdMismatch {
                    key,
                    id: element.id.0,
                });
            }
            elements.insert(element.id.clone(), element);
        }
        Ok(CanvasDocument {
            elements,
            note: repr.note,
        })
    }
}

impl CanvasDocument {
    /// Build a document from elements. A repeated id keeps its first position
    /// and takes the last value.
    pub fn new(elements: impl IntoIterator<Item = Element>) -> Self {
        let mut map = IndexMap::new();
        for element in elements {
            map.insert(element.id.clone(), element);
        }
        CanvasDocument {
            elements: map,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Parse a document from JSON. `null` and key/id disagreements are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Err(CoreError::InvalidDocument("document is null".to_string()));
        }
        if !value.is_object() {
            return Err(CoreError::InvalidDocument(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Note text, absent treated as empty.
    pub fn note(&self) -> &str {
        self.note.as_deref().unwrap_or("")
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
