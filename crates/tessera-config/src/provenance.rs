//! Which layer supplied each field.
//!
//! Provenance is diagnostic only: nothing in loading or validation reads it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::raw::{normalize_key, Layer};
use crate::schema::{
    AuthSection, CacheSection, DatabaseSection, DocsSection, Section, ServerSection,
    TelemetrySection,
};

/// Field path → layer that last set it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Provenance {
    fields: BTreeMap<String, Layer>,
}

impl Provenance {
    /// Provenance with every schema field attributed to [`Layer::Defaults`].
    pub fn defaults() -> Self {
        let mut provenance = Self::default();
        provenance.seed::<ServerSection>();
        provenance.seed::<TelemetrySection>();
        provenance.seed::<DatabaseSection>();
        provenance.seed::<CacheSection>();
        provenance.seed::<AuthSection>();
        provenance.seed::<DocsSection>();
        provenance
    }

    fn seed<S: Section>(&mut self) {
        for field in S::FIELDS {
            self.fields.insert(S::field_path(field), Layer::Defaults);
        }
    }

    /// Record that `layer` set `path`.
    ///
    /// A path that matches a tracked one under key normalization updates the
    /// tracked entry and keeps its spelling.
    pub fn record(&mut self, path: impl Into<String>, layer: Layer) {
        let path = path.into();
        let key = self.tracked_key(&path).unwrap_or(path);
        self.fields.insert(key, layer);
    }

    /// The layer that set `path`, if known. Any spelling of the path works.
    pub fn layer_of(&self, path: &str) -> Option<Layer> {
        self.tracked_key(path)
            .and_then(|key| self.fields.get(&key).copied())
    }

    fn tracked_key(&self, path: &str) -> Option<String> {
        if self.fields.contains_key(path) {
            return Some(path.to_string());
        }
        let wanted = normalize_key(path);
        self.fields
            .keys()
            .find(|key| normalize_key(key) == wanted)
            .cloned()
    }

    /// All fields set by `layer`.
    pub fn fields_from(&self, layer: Layer) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |(_, l)| **l == layer)
            .map(|(path, _)| path.as_str())
    }

    /// Iterate over `(path, layer)` in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Layer)> {
        self.fields.iter().map(|(path, layer)| (path.as_str(), *layer))
    }

    /// Number of tracked fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is tracked.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.fields.keys().map(String::len).max().unwrap_or(0);
        for (path, layer) in &self.fields {
            writeln!(f, "{path:<width$} = {layer}")?;
        }
        Ok(())
    }
}
