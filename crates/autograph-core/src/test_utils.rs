//! Test utilities for AutoGraph

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::model::{CanvasDocument, Element};

pub fn rect(id: &str, x: f64, y: f64) -> Element {
    Element::new(id, "rectangle").at(x, y).sized(120.0, 60.0)
}

pub fn circle(id: &str, x: f64, y: f64) -> Element {
    Element::new(id, "circle").at(x, y).sized(40.0, 40.0)
}

pub fn doc(elements: impl IntoIterator<Item = Element>) -> CanvasDocument {
    CanvasDocument::new(elements)
}

/// A small flowchart: start → decision → end, with a label and an arrow.
pub fn sample_document() -> CanvasDocument {
    CanvasDocument::new([
        rect("start", 0.0, 0.0)
            .styled("fill", "#ffffff")
            .styled("stroke", "#1e1e1e")
            .with_text("Start"),
        Element::new("decision", "diamond")
            .at(0.0, 120.0)
            .sized(100.0, 100.0)
            .styled("fill", "#fff3bf")
            .with_text("Valid?"),
        rect("end", 0.0, 280.0).styled("strokeWidth", "2").with_text("Done"),
        Element::new("flow-1", "arrow")
            .at(60.0, 60.0)
            .styled("stroke", "#1e1e1e")
            .styled("strokeStyle", "solid"),
    ])
    .with_note("draft")
}

/// Create a temporary directory holding `doc` as pretty JSON under `name`.
pub fn write_document(doc: &CanvasDocument, name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = write_document_in(temp_dir.path(), doc, name);
    (temp_dir, path)
}

pub fn write_document_in(dir: &Path, doc: &CanvasDocument, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
    path
}
