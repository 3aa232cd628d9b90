//! Script templates with `$name$` placeholders.
//!
//! A template is parsed once into literal and placeholder segments and then
//! rendered any number of times. Rendering is a single pass: substituted
//! values are never scanned again, so a value that happens to contain
//! `$something$` cannot trigger a second substitution.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::debug;

/// Placeholder names used by the bundled repair procedure.
pub mod placeholders {
    pub const FILENAME: &str = "filename";
    pub const REMOVE_DOUBLES_TOL: &str = "removeDoublesTOL";
    pub const CREASE_EDGE_ANGLE: &str = "creaseEdgeAngle";
    pub const RESOLVE_TOL: &str = "resolveTOL";
    pub const MIN_EDGE_LENGTH: &str = "minEdgeLength";
    pub const MAX_EDGE_LENGTH: &str = "maxEdgeLength";
    pub const MAX_ADJ_ITER: &str = "maxAdjIter";

    pub const ALL: [&str; 7] = [
        FILENAME,
        REMOVE_DOUBLES_TOL,
        CREASE_EDGE_ANGLE,
        RESOLVE_TOL,
        MIN_EDGE_LENGTH,
        MAX_EDGE_LENGTH,
        MAX_ADJ_ITER,
    ];
}

const BUNDLED_PROCEDURE: &str = include_str!("../resources/optimize-and-repair.lua");

/// Errors from rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unresolved placeholders: {}", .names.join(", "))]
    Unbound { names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Range<usize>),
    /// Byte range of the name, without the surrounding `$`.
    Placeholder(Range<usize>),
}

/// Immutable script text split into literal and placeholder segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    text: String,
    segments: Vec<Segment>,
}

impl ScriptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = parse_segments(&text);
        Self { text, segments }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(range) => Some(&self.text[range.clone()]),
                Segment::Literal(_) => None,
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Substitute every placeholder occurrence with its bound value.
    ///
    /// Fails with [`TemplateError::Unbound`] naming every placeholder that
    /// has no binding. Bindings the template does not use are ignored.
    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.text.len() + 256);
        let mut missing: Vec<String> = Vec::new();
        let mut used: HashSet<&str> = HashSet::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(range) => out.push_str(&self.text[range.clone()]),
                Segment::Placeholder(range) => {
                    let name = &self.text[range.clone()];
                    match bindings.get(name) {
                        Some(value) => {
                            out.push_str(value);
                            used.insert(name);
                        }
                        None => {
                            if !missing.iter().any(|m| m == name) {
                                missing.push(name.to_string());
                            }
                        }
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(TemplateError::Unbound { names: missing });
        }

        for name in bindings.names() {
            if !used.contains(name) {
                debug!(placeholder = name, "binding not used by template");
            }
        }

        Ok(out)
    }
}

/// The bundled optimize-and-repair procedure, parsed once per process.
pub fn bundled_template() -> Arc<ScriptTemplate> {
    static TEMPLATE: OnceLock<Arc<ScriptTemplate>> = OnceLock::new();
    TEMPLATE
        .get_or_init(|| Arc::new(ScriptTemplate::new(BUNDLED_PROCEDURE)))
        .clone()
}

/// Placeholder values, already in their textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind raw text, inserted verbatim.
    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn number(self, name: &str, value: f64) -> Self {
        self.text(name, format_number(value))
    }

    pub fn integer<T: Display>(self, name: &str, value: T) -> Self {
        self.text(name, value.to_string())
    }

    pub fn quoted_path(self, name: &str, path: &Path) -> Self {
        self.text(name, quote_path(path))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Locale-independent text for a number that parses back to the same `f64`.
///
/// Plain decimal for magnitudes in `[1e-4, 1e15)`, scientific otherwise, so
/// tiny tolerances come out as `1e-6` rather than a long run of zeros.
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 {
        "0".to_string()
    } else if (1e-4..1e15).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

/// Double-quoted path literal with backslashes and quotes escaped.
pub fn quote_path(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn parse_segments(text: &str) -> Vec<Segment> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && is_name_start(bytes[i + 1]) {
            let name_start = i + 1;
            let mut j = name_start;
            while j < bytes.len() && is_name_char(bytes[j]) {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'$' {
                if literal_start < i {
                    segments.push(Segment::Literal(literal_start..i));
                }
                segments.push(Segment::Placeholder(name_start..j));
                i = j + 1;
                literal_start = i;
                continue;
            }
        }
        i += 1;
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Literal(literal_start..bytes.len()));
    }
    segments
}
