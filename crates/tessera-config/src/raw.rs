//! Raw, untyped configuration values.
//!
//! Every source (file, environment, in-process overrides) is first reduced to
//! a [`RawLayer`]: an ordered list of field paths and [`RawValue`]s. Typed
//! parsing happens later, per field, in the section schemas.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{LoadError, ParseError};

fn env_marker(prefix: &str) -> String {
    format!("{}__", prefix.to_uppercase())
}

/// A loosely-typed scalar as it appeared in a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A string (all environment values arrive as strings).
    Str(String),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// An explicit null. Treated as absent during merging.
    Missing,
}

impl RawValue {
    /// Whether this value is absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Interpret as a signed integer.
    pub fn to_i64(&self, field: &str) -> Result<i64, ParseError> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| ParseError::new(field, s.as_str(), "expected an integer")),
            other => Err(ParseError::new(field, other.to_string(), "expected an integer")),
        }
    }

    /// Interpret as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self, field: &str) -> Result<f64, ParseError> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(n) => Ok(*n as f64),
            Self::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| ParseError::new(field, s.as_str(), "expected a number")),
            other => Err(ParseError::new(field, other.to_string(), "expected a number")),
        }
    }

    /// Interpret as a boolean.
    pub fn to_bool(&self, field: &str) -> Result<bool, ParseError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(0) => Ok(false),
            Self::Int(1) => Ok(true),
            Self::Str(s) => parse_bool(s)
                .ok_or_else(|| ParseError::new(field, s.as_str(), "expected a boolean")),
            other => Err(ParseError::new(field, other.to_string(), "expected a boolean")),
        }
    }

    /// Interpret as a string. Scalars are stringified.
    pub fn to_string_value(&self, field: &str) -> Result<String, ParseError> {
        match self {
            Self::Str(s) => Ok(s.clone()),
            Self::Missing => Err(ParseError::new(field, "null", "expected a string")),
            other => Ok(other.to_string()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Missing => f.write_str("null"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for RawValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Parse a boolean from a string.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Normalize a key for matching: ASCII lowercase, `_` and `-` removed.
///
/// `MaxIdleConns`, `max_idle_conns` and `MAX-IDLE-CONNS` all normalize to
/// `maxidleconns`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Configuration layer kinds, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Built-in section defaults.
    Defaults,
    /// A structured file (or in-memory document).
    File,
    /// Environment-derived overrides.
    Environment,
    /// Explicit in-process overrides supplied by the caller.
    Override,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::File => "file",
            Self::Environment => "environment",
            Self::Override => "override",
        })
    }
}

/// A layer kind together with where it came from (file path, env prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// The layer kind.
    pub layer: Layer,
    /// Human-readable origin, e.g. `config/app.toml` or `TESSERA`.
    pub origin: String,
}

impl Source {
    /// Create a new source descriptor.
    pub fn new(layer: Layer, origin: impl Into<String>) -> Self {
        Self {
            layer,
            origin: origin.into(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.origin.is_empty() {
            write!(f, "{} layer", self.layer)
        } else {
            write!(f, "{} layer `{}`", self.layer, self.origin)
        }
    }
}

/// Structured document formats accepted by the file layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// TOML.
    Toml,
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl Format {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        extension
            .parse()
            .map_err(|_| LoadError::unsupported_format(path.display().to_string()))
    }
}

impl FromStr for Format {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(LoadError::unsupported_format(other)),
        }
    }
}

/// One entry of a raw layer: the path segments as written, and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    /// Path segments, e.g. `["DB", "Default", "Host"]`.
    pub path: Vec<String>,
    /// The raw value.
    pub value: RawValue,
}

impl RawEntry {
    /// The path joined with `.`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// A fully-read configuration source, not yet typed.
#[derive(Debug, Clone)]
pub struct RawLayer {
    /// Which layer this is and where it came from.
    pub source: Source,
    /// Entries in document order.
    pub entries: Vec<RawEntry>,
}

impl RawLayer {
    /// Create an empty layer.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            entries: Vec::new(),
        }
    }

    /// Append a value under a dotted path (`DB.Default.Host`).
    pub fn push(&mut self, dotted_path: &str, value: RawValue) {
        self.entries.push(RawEntry {
            path: dotted_path.split('.').map(str::to_string).collect(),
            value,
        });
    }

    /// Parse a structured document into a layer.
    pub fn from_document(content: &str, format: Format, source: Source) -> Result<Self, LoadError> {
        let document: serde_json::Value = match format {
            Format::Toml => toml::from_str(content)
                .map_err(|e| LoadError::syntax(source.clone(), e))?,
            Format::Json => serde_json::from_str(content)
                .map_err(|e| LoadError::syntax(source.clone(), e))?,
            Format::Yaml => {
                if content.trim().is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_yaml::from_str(content)
                        .map_err(|e| LoadError::syntax(source.clone(), e))?
                }
            }
        };

        let serde_json::Value::Object(map) = document else {
            return Err(LoadError::syntax(
                source,
                "top level of a configuration document must be a table",
            ));
        };

        let mut layer = Self::new(source);
        let mut path = Vec::new();
        for (key, value) in map {
            path.push(key);
            layer.flatten(&mut path, value)?;
            path.pop();
        }
        Ok(layer)
    }

    /// Build a layer from `PREFIX__SECTION__FIELD` variables.
    ///
    /// Variables without the prefix are ignored. `__` separates path
    /// segments, so `TESSERA__DB__DEFAULT__HOST` becomes `DB.DEFAULT.HOST`.
    pub fn from_env<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let marker = env_marker(prefix);
        let mut layer = Self::new(Source::new(Layer::Environment, prefix.to_uppercase()));
        let mut entries: Vec<RawEntry> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let rest = key.as_ref().strip_prefix(&marker)?;
                let path: Vec<String> = rest
                    .split("__")
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                (!path.is_empty()).then(|| RawEntry {
                    path,
                    value: RawValue::Str(value.into()),
                })
            })
            .collect();
        // Environment iteration order is unspecified.
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        layer.entries = entries;
        layer
    }

    /// [`RawLayer::from_env`] over the process environment as returned by
    /// [`std::env::vars_os`].
    ///
    /// Names that are not UTF-8 cannot carry the prefix and are skipped.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Parse` naming the variable when a prefixed
    /// variable holds a value that is not UTF-8.
    pub fn from_env_os<I>(prefix: &str, vars: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let marker = env_marker(prefix);
        let mut prefixed = Vec::new();
        for (name, value) in vars {
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&marker) {
                continue;
            }
            match value.into_string() {
                Ok(value) => prefixed.push((name.to_string(), value)),
                Err(_) => {
                    return Err(LoadError::parse(
                        Source::new(Layer::Environment, prefix.to_uppercase()),
                        ParseError::new(name, "<non-UTF-8>", "environment value is not valid UTF-8"),
                    ));
                }
            }
        }
        Ok(Self::from_env(prefix, prefixed))
    }

    fn flatten(&mut self, path: &mut Vec<String>, value: serde_json::Value) -> Result<(), LoadError> {
        let raw = match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    path.push(key);
                    self.flatten(path, child)?;
                    path.pop();
                }
                return Ok(());
            }
            serde_json::Value::Array(_) => {
                return Err(LoadError::parse(
                    self.source.clone(),
                    ParseError::new(path.join("."), "[...]", "arrays are not supported"),
                ));
            }
            serde_json::Value::Null => RawValue::Missing,
            serde_json::Value::Bool(b) => RawValue::Bool(b),
            serde_json::Value::String(s) => RawValue::Str(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
        };
        self.entries.push(RawEntry {
            path: path.clone(),
            value: raw,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_source() -> Source {
        Source::new(Layer::File, "test")
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("MaxIdleConns"), "maxidleconns");
        assert_eq!(normalize_key("max_idle_conns"), "maxidleconns");
        assert_eq!(normalize_key("MAX-IDLE-CONNS"), "maxidleconns");
    }

    #[test]
    fn test_layer_ordering() {
        assert!(Layer::Defaults < Layer::File);
        assert!(Layer::File < Layer::Environment);
        assert!(Layer::Environment < Layer::Override);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_raw_value_conversions() {
        assert_eq!(RawValue::from("42").to_i64("f").unwrap(), 42);
        assert_eq!(RawValue::Int(7).to_i64("f").unwrap(), 7);
        assert!(RawValue::Float(1.5).to_i64("f").is_err());
        assert!(RawValue::Bool(true).to_i64("f").is_err());

        assert!((RawValue::Int(1).to_f64("f").unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(RawValue::from("off").to_bool("f").is_ok_and(|b| !b));
        assert_eq!(RawValue::Int(8080).to_string_value("f").unwrap(), "8080");
        assert!(RawValue::Missing.to_string_value("f").is_err());
    }

    #[test]
    fn test_integer_parse_error_carries_raw_value() {
        let err = RawValue::from("ten").to_i64("DB.Default.MaxIdleConns").unwrap_err();
        assert_eq!(err.field, "DB.Default.MaxIdleConns");
        assert_eq!(err.raw_value, "ten");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a.toml")).unwrap(), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a.JSON")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.yml")).unwrap(), Format::Yaml);
        assert!(Format::from_path(Path::new("a.ini")).is_err());
        assert!(Format::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_flatten_toml() {
        let toml = r#"
            Port = 9000

            [DB.Default]
            Host = "db1"
            MaxIdleConns = 5

            [Swagger]
            Enabled = true
        "#;
        let layer = RawLayer::from_document(toml, Format::Toml, file_source()).unwrap();
        let paths: Vec<String> = layer.entries.iter().map(RawEntry::dotted_path).collect();
        assert!(paths.contains(&"Port".to_string()));
        assert!(paths.contains(&"DB.Default.Host".to_string()));
        assert!(paths.contains(&"DB.Default.MaxIdleConns".to_string()));
        assert!(paths.contains(&"Swagger.Enabled".to_string()));
    }

    #[test]
    fn test_flatten_yaml_and_null() {
        let yaml = "Redis:\n  Host: cache\n  Password: ~\n";
        let layer = RawLayer::from_document(yaml, Format::Yaml, file_source()).unwrap();
        assert_eq!(layer.entries.len(), 2);
        let password = layer
            .entries
            .iter()
            .find(|e| e.dotted_path() == "Redis.Password")
            .unwrap();
        assert!(password.value.is_missing());
    }

    #[test]
    fn test_empty_yaml_is_empty_layer() {
        let layer = RawLayer::from_document("", Format::Yaml, file_source()).unwrap();
        assert!(layer.entries.is_empty());
    }

    #[test]
    fn test_arrays_rejected() {
        let json = r#"{"Server": {"Host": ["a", "b"]}}"#;
        let err = RawLayer::from_document(json, Format::Json, file_source()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("Server.Host"));
    }

    #[test]
    fn test_non_table_document_rejected() {
        let err = RawLayer::from_document("[1, 2]", Format::Json, file_source()).unwrap_err();
        assert!(matches!(err, LoadError::Syntax { .. }));
    }

    #[test]
    fn test_syntax_error() {
        let err = RawLayer::from_document("[server", Format::Toml, file_source()).unwrap_err();
        assert!(matches!(err, LoadError::Syntax { .. }));
    }

    #[test]
    fn test_from_env_filters_prefix() {
        let vars = vec![
            ("TESSERA__DB__DEFAULT__HOST", "db2"),
            ("TESSERA__PORT", "9000"),
            ("OTHER__DB__DEFAULT__HOST", "nope"),
            ("TESSERA", "bare"),
        ];
        let layer = RawLayer::from_env("tessera", vars);
        assert_eq!(layer.source.layer, Layer::Environment);
        assert_eq!(layer.entries.len(), 2);
        assert_eq!(layer.entries[0].dotted_path(), "DB.DEFAULT.HOST");
        assert_eq!(layer.entries[0].value, RawValue::from("db2"));
        assert_eq!(layer.entries[1].dotted_path(), "PORT");
    }

    #[test]
    fn test_from_env_os_skips_unrelated_names() {
        let vars = vec![
            (OsString::from("TESSERA__REDIS__HOST"), OsString::from("cache")),
            (OsString::from("PATH"), OsString::from("/usr/bin")),
        ];
        let layer = RawLayer::from_env_os("tessera", vars).unwrap();
        assert_eq!(layer.entries.len(), 1);
        assert_eq!(layer.entries[0].dotted_path(), "REDIS.HOST");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_env_os_rejects_non_utf8_value() {
        use std::os::unix::ffi::OsStringExt;

        let bad = OsString::from_vec(vec![0xff, 0xfe]);
        let vars = vec![
            (OsString::from_vec(vec![b'X', 0xff]), bad.clone()),
            (OsString::from("OTHER__HOST"), bad.clone()),
            (OsString::from("TESSERA__DB__DEFAULT__HOST"), bad),
        ];

        let err = RawLayer::from_env_os("tessera", vars).unwrap_err();
        match err {
            LoadError::Parse {
                source_layer,
                error,
            } => {
                assert_eq!(source_layer.layer, Layer::Environment);
                assert_eq!(error.field, "TESSERA__DB__DEFAULT__HOST");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_from_env_os_ignores_non_utf8_outside_prefix() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("LANG_GARBAGE"), OsString::from_vec(vec![0xc3, 0x28])),
            (OsString::from("TESSERA__PORT"), OsString::from("9000")),
        ];
        let layer = RawLayer::from_env_os("tessera", vars).unwrap();
        assert_eq!(layer.entries.len(), 1);
    }
}
