//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, environment variables and explicit
//! overrides.
//!
//! Loading moves through `Unloaded → Merging → Validating → {Ready | Rejected}`.
//! The states are carried by types: a [`ConfigLoader`] collects layers,
//! [`ConfigLoader::merge`] yields a [`MergedConfig`], and
//! [`MergedConfig::validate`] yields either a [`ReadyConfig`] or
//! [`ConfigError::Rejected`]. Neither outcome can be patched; retrying means
//! building a new loader.

use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, LoadError, ParseError};
use crate::provenance::Provenance;
use crate::raw::{normalize_key, Format, Layer, RawEntry, RawLayer, RawValue, Source};
use crate::schema::{
    AuthPartial, AuthSection, CachePartial, CacheSection, DatabasePartial, DatabaseSection,
    DocsPartial, DocsSection, Section, ServerPartial, ServerSection, TelemetryPartial,
    TelemetrySection,
};
use crate::validator::{ValidationReport, Validator, Violation};
use crate::TesseraConfig;

/// Lifecycle of one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Layers are being collected.
    Unloaded,
    /// Layers are being merged into the aggregate.
    Merging,
    /// The merged aggregate is being validated.
    Validating,
    /// Validation passed; the aggregate is immutable.
    Ready,
    /// Validation failed; this attempt is over.
    Rejected,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unloaded => "unloaded",
            Self::Merging => "merging",
            Self::Validating => "validating",
            Self::Ready => "ready",
            Self::Rejected => "rejected",
        })
    }
}

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones field by field:
/// 1. Default values (built into the sections)
/// 2. Configuration files (TOML, JSON or YAML)
/// 3. Environment variables
/// 4. Explicit in-process overrides
///
/// Layers are ordered by kind, not by the order of the builder calls.
/// Several layers of the same kind apply in the order they were added.
///
/// # Example
///
/// ```no_run
/// use tessera_config::ConfigLoader;
///
/// # fn main() -> Result<(), tessera_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("etc/api.yaml")?
///     .with_env_prefix("TESSERA")
///     .load()?;
///
/// println!("Server will listen on: {}", config.server.bind_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    layers: Vec<RawLayer>,
    env_prefix: Option<String>,
    strict: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader in strict mode.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            env_prefix: None,
            strict: true,
        }
    }

    /// Start again from built-in defaults, discarding every layer added so far.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.layers.clear();
        self.env_prefix = None;
        self
    }

    /// Set strict mode. Unknown fields fail the load in strict mode and
    /// produce WARN violations otherwise.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Shorthand for `strict(false)`.
    #[must_use]
    pub fn lenient(self) -> Self {
        self.strict(false)
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (`.toml`), JSON (`.json`) and YAML (`.yaml`, `.yml`).
    /// The format is determined by the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file is not valid TOML/JSON/YAML
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LoadError::file_not_found(path).into());
        }

        let format = Format::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| LoadError::read(path, e))?;
        let source = Source::new(Layer::File, path.display().to_string());
        self.layers
            .push(RawLayer::from_document(&content, format, source)?);

        tracing::debug!(path = %path.display(), "read configuration file");
        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load a file-layer document from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::{ConfigLoader, Format};
    ///
    /// let toml = r#"
    ///     [Server]
    ///     Port = 9000
    /// "#;
    ///
    /// let merged = ConfigLoader::new()
    ///     .with_string(toml, Format::Toml)
    ///     .unwrap()
    ///     .merge()
    ///     .unwrap();
    ///
    /// assert_eq!(merged.config().server.port.get(), 9000);
    /// ```
    pub fn with_string(mut self, content: &str, format: Format) -> Result<Self, ConfigError> {
        let source = Source::new(Layer::File, "<string>");
        self.layers
            .push(RawLayer::from_document(content, format, source)?);
        Ok(self)
    }

    /// Read environment overrides at merge time.
    ///
    /// Environment variables use the format `PREFIX__SECTION__FIELD`.
    /// For example, with prefix `TESSERA`:
    /// - `TESSERA__SERVER__PORT=9000`
    /// - `TESSERA__DB__DEFAULT__MAX_IDLE_CONNS=20`
    /// - `TESSERA__AUTH__ACCESS_SECRET=...`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Add an environment layer from an explicit snapshot instead of the
    /// process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.layers.push(RawLayer::from_env(prefix, vars));
        self
    }

    /// Load a `.env` file into the process environment.
    ///
    /// A missing `.env` file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "loaded .env file");
                Ok(self)
            }
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(LoadError::syntax(Source::new(Layer::Environment, ".env"), e).into()),
        }
    }

    /// Set one field explicitly, above every other layer.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let merged = ConfigLoader::new()
    ///     .with_override("DB.Default.Host", "db.internal")
    ///     .merge()
    ///     .unwrap();
    ///
    /// assert_eq!(merged.config().database.host, "db.internal");
    /// ```
    #[must_use]
    pub fn with_override(mut self, path: &str, value: impl Into<RawValue>) -> Self {
        let value = value.into();
        match self
            .layers
            .iter_mut()
            .find(|layer| layer.source.layer == Layer::Override)
        {
            Some(layer) => layer.push(path, value),
            None => {
                let mut layer = RawLayer::new(Source::new(Layer::Override, "overrides"));
                layer.push(path, value);
                self.layers.push(layer);
            }
        }
        self
    }

    /// Set several fields explicitly.
    #[must_use]
    pub fn with_overrides<I, K, V>(self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
    {
        overrides
            .into_iter()
            .fold(self, |loader, (path, value)| loader.with_override(path.as_ref(), value))
    }

    /// Add a pre-built raw layer.
    #[must_use]
    pub fn with_layer(mut self, layer: RawLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Merge every layer over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if a layer holds an unparseable value or
    /// (in strict mode) an unknown field. No part of a failing layer is
    /// applied.
    pub fn merge(mut self) -> Result<MergedConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.layers
                .push(RawLayer::from_env_os(&prefix, std::env::vars_os())?);
        }
        // Stable: same-kind layers keep insertion order.
        self.layers.sort_by_key(|layer| layer.source.layer);

        tracing::debug!(
            state = %LoadState::Merging,
            layers = self.layers.len(),
            strict = self.strict,
            "merging configuration layers"
        );

        let mut merged = MergedConfig {
            config: TesseraConfig::default(),
            provenance: Provenance::defaults(),
            warnings: Vec::new(),
        };
        for layer in &self.layers {
            let staged = StagedLayer::stage(layer, self.strict)?;
            merged.apply(staged, layer.source.layer);
        }
        Ok(merged)
    }

    /// Merge and validate with the baseline rules.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if merging fails, or
    /// `ConfigError::Rejected` with every violation if any is FATAL.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_override("DB.Default.Database", "idrm")
    ///     .with_override("DB.Default.Username", "svc")
    ///     .with_override("Auth.AccessSecret", "0123456789abcdef0123456789abcdef")
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.bind_addr(), "0.0.0.0:8888");
    /// ```
    pub fn load(self) -> Result<ReadyConfig, ConfigError> {
        self.load_with(&Validator::baseline())
    }

    /// Merge and validate with a custom validator.
    ///
    /// # Errors
    ///
    /// See [`ConfigLoader::load`].
    pub fn load_with(self, validator: &Validator) -> Result<ReadyConfig, ConfigError> {
        self.merge()?.validate(validator)
    }

    /// [`ConfigLoader::load`] on a blocking thread, bounded by `limit`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Timeout` if `limit` elapses first, otherwise the
    /// same errors as [`ConfigLoader::load`].
    pub async fn load_with_timeout(self, limit: Duration) -> Result<ReadyConfig, ConfigError> {
        run_with_timeout(limit, move || self.load()).await
    }
}

async fn run_with_timeout<T, F>(limit: Duration, f: F) -> Result<T, ConfigError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ConfigError> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Ok(Err(_)) | Err(_) => {
            tracing::warn!(?limit, "configuration load timed out");
            Err(LoadError::Timeout { limit }.into())
        }
    }
}

/// Sections addressable from a source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Server,
    Telemetry,
    Database,
    Cache,
    Auth,
    Docs,
}

/// Map a path to its section and the key inside it.
///
/// Single-segment paths address the server section, which is embedded at
/// the document root in the service's own files.
fn route(path: &[String]) -> Option<(Target, String)> {
    let (head, rest) = path.split_first()?;
    if rest.is_empty() {
        return Some((Target::Server, head.clone()));
    }
    let target = match normalize_key(head).as_str() {
        "server" | "rest" => Target::Server,
        "telemetry" => Target::Telemetry,
        "db" => {
            let (instance, rest) = rest.split_first()?;
            if normalize_key(instance) != "default" || rest.is_empty() {
                return None;
            }
            return Some((Target::Database, rest.join(".")));
        }
        "database" => Target::Database,
        "redis" | "cache" => Target::Cache,
        "auth" => Target::Auth,
        "swagger" | "docs" => Target::Docs,
        _ => return None,
    };
    Some((target, rest.join(".")))
}

/// A layer parsed in full but not yet applied.
#[derive(Debug, Default)]
struct StagedLayer {
    server: ServerPartial,
    telemetry: TelemetryPartial,
    database: DatabasePartial,
    cache: CachePartial,
    auth: AuthPartial,
    docs: DocsPartial,
    assigned: Vec<String>,
    unknown: Vec<Violation>,
}

impl StagedLayer {
    fn stage(layer: &RawLayer, strict: bool) -> Result<Self, LoadError> {
        let mut staged = Self::default();
        for entry in &layer.entries {
            if entry.value.is_missing() {
                continue;
            }
            let assigned = staged
                .set(entry)
                .map_err(|e| LoadError::parse(layer.source.clone(), e))?;
            match assigned {
                Some(path) => staged.assigned.push(path),
                None if strict => {
                    return Err(LoadError::unknown_field(
                        layer.source.clone(),
                        entry.dotted_path(),
                    ));
                }
                None => {
                    let path = entry.dotted_path();
                    tracing::warn!(field = %path, source = %layer.source, "ignoring unknown configuration field");
                    staged.unknown.push(Violation::warn(
                        [path],
                        format!("unknown field in {}; ignored", layer.source),
                    ));
                }
            }
        }
        Ok(staged)
    }

    fn set(&mut self, entry: &RawEntry) -> Result<Option<String>, ParseError> {
        let Some((target, key)) = route(&entry.path) else {
            return Ok(None);
        };
        let value = &entry.value;
        match target {
            Target::Server => ServerSection::set_field(&mut self.server, &key, value),
            Target::Telemetry => TelemetrySection::set_field(&mut self.telemetry, &key, value),
            Target::Database => DatabaseSection::set_field(&mut self.database, &key, value),
            Target::Cache => CacheSection::set_field(&mut self.cache, &key, value),
            Target::Auth => AuthSection::set_field(&mut self.auth, &key, value),
            Target::Docs => DocsSection::set_field(&mut self.docs, &key, value),
        }
    }
}

/// The aggregate after merging, before validation.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    config: TesseraConfig,
    provenance: Provenance,
    warnings: Vec<Violation>,
}

impl MergedConfig {
    fn apply(&mut self, staged: StagedLayer, layer: Layer) {
        let config = &mut self.config;
        config.server = config.server.apply_overrides(&staged.server);
        config.telemetry = config.telemetry.apply_overrides(&staged.telemetry);
        config.database = config.database.apply_overrides(&staged.database);
        config.cache = config.cache.apply_overrides(&staged.cache);
        config.auth = config.auth.apply_overrides(&staged.auth);
        config.docs = config.docs.apply_overrides(&staged.docs);

        for path in staged.assigned {
            self.provenance.record(path, layer);
        }
        self.warnings.extend(staged.unknown);
    }

    /// The merged, unvalidated aggregate.
    pub fn config(&self) -> &TesseraConfig {
        &self.config
    }

    /// Which layer supplied each field.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// WARN violations raised while merging (unknown fields in lenient mode).
    pub fn warnings(&self) -> &[Violation] {
        &self.warnings
    }

    /// Give up the typestate and take the parts, unvalidated.
    pub fn into_parts(self) -> (TesseraConfig, Provenance) {
        (self.config, self.provenance)
    }

    /// Validate the merged aggregate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Rejected` carrying every violation (WARN and
    /// FATAL) when any violation is FATAL.
    pub fn validate(self, validator: &Validator) -> Result<ReadyConfig, ConfigError> {
        tracing::debug!(state = %LoadState::Validating, "validating configuration");

        let mut report = ValidationReport::new(self.warnings);
        report.extend(validator.validate(&self.config).into_violations());

        if report.is_rejected() {
            tracing::error!(
                state = %LoadState::Rejected,
                fatal = report.fatal().count(),
                warnings = report.warnings().count(),
                "configuration rejected"
            );
            return Err(ConfigError::Rejected(report));
        }

        for warning in report.warnings() {
            tracing::warn!(fields = %warning.fields.join(", "), "{}", warning.message);
        }
        tracing::info!(
            state = %LoadState::Ready,
            warnings = report.warnings().count(),
            "configuration ready"
        );

        Ok(ReadyConfig {
            config: Arc::new(self.config),
            provenance: self.provenance,
            warnings: report.into_violations(),
        })
    }
}

/// A validated, immutable configuration.
///
/// Dereferences to [`TesseraConfig`]; use [`ReadyConfig::shared`] to hand
/// the aggregate to dependent components.
#[derive(Debug, Clone)]
pub struct ReadyConfig {
    config: Arc<TesseraConfig>,
    provenance: Provenance,
    warnings: Vec<Violation>,
}

impl ReadyConfig {
    /// A shared handle to the aggregate.
    pub fn shared(&self) -> Arc<TesseraConfig> {
        Arc::clone(&self.config)
    }

    /// Which layer supplied each field.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// WARN violations that did not block startup.
    pub fn warnings(&self) -> &[Violation] {
        &self.warnings
    }

    /// Take the shared aggregate.
    pub fn into_shared(self) -> Arc<TesseraConfig> {
        self.config
    }
}

impl Deref for ReadyConfig {
    type Target = TesseraConfig;

    fn deref(&self) -> &TesseraConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::ConfigDuration;
    use std::io::Write;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn required() -> ConfigLoader {
        ConfigLoader::new()
            .with_override("DB.Default.Database", "idrm")
            .with_override("DB.Default.Username", "svc")
            .with_override("Auth.AccessSecret", SECRET)
    }

    #[test]
    fn test_loader_new_merges_defaults() {
        let merged = ConfigLoader::new().merge().unwrap();
        assert_eq!(merged.config(), &TesseraConfig::default());
        assert_eq!(merged.provenance().layer_of("Server.Port"), Some(Layer::Defaults));
    }

    #[test]
    fn test_defaults_alone_are_rejected_for_required_fields() {
        let err = ConfigLoader::new().load().unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.fatal().count(), 3);
    }

    #[test]
    fn test_load_with_required_fields() {
        let config = required().load().unwrap();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8888");
        assert!(config.warnings().is_empty());
        assert_eq!(
            config.provenance().layer_of("Auth.AccessSecret"),
            Some(Layer::Override)
        );
    }

    #[test]
    fn test_with_defaults_discards_layers() {
        let merged = ConfigLoader::new()
            .with_override("Server.Port", 9000_i64)
            .with_defaults()
            .merge()
            .unwrap();
        assert_eq!(merged.config().server.port.get(), 8888);
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            [Server]
            Host = "127.0.0.1"
            Port = 3000
        "#;

        let merged = ConfigLoader::new()
            .with_string(toml, Format::Toml)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().server.bind_addr(), "127.0.0.1:3000");
        assert_eq!(merged.provenance().layer_of("Server.Port"), Some(Layer::File));
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"Redis": {"Host": "cache", "DB": 2}}"#;

        let merged = ConfigLoader::new()
            .with_string(json, Format::Json)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().cache.host, "cache");
        assert_eq!(merged.config().cache.db, 2);
    }

    #[test]
    fn test_loader_with_string_yaml_root_server_fields() {
        let yaml = "Name: idrm-api\nHost: 0.0.0.0\nPort: 8889\nSwagger:\n  Enabled: true\n";

        let merged = ConfigLoader::new()
            .with_string(yaml, Format::Yaml)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().server.name, "idrm-api");
        assert_eq!(merged.config().server.port.get(), 8889);
        assert!(merged.config().docs.enabled);
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[DB.Default]\nHost = \"db1\"\n\n[Auth]\nAccessExpire = 3600").unwrap();

        let merged = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().database.host, "db1");
        assert_eq!(merged.config().auth.access_expire, ConfigDuration::from_secs(3600));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/config.toml");
        assert!(matches!(
            result,
            Err(ConfigError::Load(LoadError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_loader_with_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(
            result,
            Err(ConfigError::Load(LoadError::UnsupportedFormat { .. }))
        ));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let merged = ConfigLoader::new()
            .with_optional_file("/nonexistent/config.toml")
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config(), &TesseraConfig::default());
    }

    #[test]
    fn test_env_layer() {
        let merged = ConfigLoader::new()
            .with_env_vars(
                "TEST",
                [
                    ("TEST__DB__DEFAULT__MAX_IDLE_CONNS", "4"),
                    ("TEST__SWAGGER__ENABLED", "true"),
                    ("TEST__PORT", "9000"),
                ],
            )
            .merge()
            .unwrap();

        let config = merged.config();
        assert_eq!(config.database.max_idle_conns, 4);
        assert!(config.docs.enabled);
        assert_eq!(config.server.port.get(), 9000);
        assert_eq!(
            merged.provenance().layer_of("DB.Default.MaxIdleConns"),
            Some(Layer::Environment)
        );
    }

    #[test]
    fn test_env_parse_error_names_layer_field_and_value() {
        let err = ConfigLoader::new()
            .with_env_vars("TEST", [("TEST__REDIS__PORT", "not-a-port")])
            .merge()
            .unwrap_err();

        match err {
            ConfigError::Load(LoadError::Parse {
                source_layer,
                error,
            }) => {
                assert_eq!(source_layer.layer, Layer::Environment);
                assert_eq!(error.field, "Redis.Port");
                assert_eq!(error.raw_value, "not-a-port");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_ignores_call_order() {
        let merged = ConfigLoader::new()
            .with_override("DB.Default.Host", "override")
            .with_env_vars("T", [("T__DB__DEFAULT__HOST", "env")])
            .with_string("[DB.Default]\nHost = \"file\"", Format::Toml)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().database.host, "override");
        assert_eq!(
            merged.provenance().layer_of("DB.Default.Host"),
            Some(Layer::Override)
        );
    }

    #[test]
    fn test_same_kind_layers_apply_in_order() {
        let merged = ConfigLoader::new()
            .with_string("[Redis]\nHost = \"first\"\nDB = 3", Format::Toml)
            .unwrap()
            .with_string("[Redis]\nHost = \"second\"", Format::Toml)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().cache.host, "second");
        assert_eq!(merged.config().cache.db, 3);
    }

    #[test]
    fn test_null_is_absent_not_reset() {
        let merged = ConfigLoader::new()
            .with_string(r#"{"Redis": {"Host": "cache"}}"#, Format::Json)
            .unwrap()
            .with_string(r#"{"Redis": {"Host": null}}"#, Format::Json)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(merged.config().cache.host, "cache");
    }

    #[test]
    fn test_strict_mode_rejects_unknown_field() {
        let result = ConfigLoader::new()
            .with_string("[Server]\nUnknownField = 1", Format::Toml)
            .unwrap()
            .merge();

        match result {
            Err(ConfigError::Load(LoadError::UnknownField { path, source_layer })) => {
                assert_eq!(path, "Server.UnknownField");
                assert_eq!(source_layer.layer, Layer::File);
            }
            other => panic!("expected unknown field error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_sections_and_db_instances() {
        for document in ["[Queue]\nHost = \"x\"", "[DB.Replica]\nHost = \"x\"", "Bogus = 1"] {
            let result = ConfigLoader::new()
                .with_string(document, Format::Toml)
                .unwrap()
                .merge();
            assert!(
                matches!(result, Err(ConfigError::Load(LoadError::UnknownField { .. }))),
                "{document}"
            );
        }
    }

    #[test]
    fn test_lenient_mode_warns_on_unknown_field() {
        let config = required()
            .lenient()
            .with_string("[Server]\nUnknownField = 1", Format::Toml)
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.warnings().len(), 1);
        assert_eq!(config.warnings()[0].fields, vec!["Server.UnknownField"]);
    }

    #[test]
    fn test_telemetry_keys_are_never_unknown() {
        let merged = ConfigLoader::new()
            .with_string("[Telemetry]\nExporterTimeout = \"2s\"", Format::Toml)
            .unwrap()
            .merge()
            .unwrap();

        assert_eq!(
            merged.config().telemetry.extra.get("ExporterTimeout"),
            Some(&RawValue::from("2s"))
        );
    }

    #[test]
    fn test_telemetry_key_spellings_merge_across_layers() {
        let merged = ConfigLoader::new()
            .with_string("[Telemetry]\nExporterTimeout = \"2s\"", Format::Toml)
            .unwrap()
            .with_env_vars("APP", [("APP__TELEMETRY__EXPORTER_TIMEOUT", "9s")])
            .merge()
            .unwrap();

        let telemetry = &merged.config().telemetry;
        assert_eq!(telemetry.extra.len(), 1);
        assert_eq!(telemetry.extra.get("ExporterTimeout"), Some(&RawValue::from("9s")));
        assert_eq!(
            merged.provenance().layer_of("Telemetry.ExporterTimeout"),
            Some(Layer::Environment)
        );
        assert_eq!(
            merged
                .provenance()
                .iter()
                .filter(|(path, _)| path.starts_with("Telemetry.Exporter"))
                .count(),
            1
        );
    }

    #[test]
    fn test_bad_layer_is_not_partially_applied() {
        let result = ConfigLoader::new()
            .with_string("[Redis]\nHost = \"cache\"\nPort = \"nope\"", Format::Toml)
            .unwrap()
            .merge();
        assert!(matches!(result, Err(ConfigError::Load(LoadError::Parse { .. }))));

        let staged = StagedLayer::stage(
            &RawLayer::from_document(
                "[Redis]\nHost = \"cache\"\nPort = \"nope\"",
                Format::Toml,
                Source::new(Layer::File, "t"),
            )
            .unwrap(),
            true,
        );
        assert!(staged.is_err());
    }

    #[test]
    fn test_out_of_range_values_reach_validation() {
        let err = required()
            .with_override("Server.Port", 65536_i64)
            .load()
            .unwrap_err();

        let report = err.report().unwrap();
        assert_eq!(report.fatal().count(), 1);
        assert_eq!(report.violations()[0].fields, vec!["Server.Port"]);
    }

    #[test]
    fn test_rejected_report_includes_warnings() {
        let err = required()
            .with_override("Redis.DB", 20_i64)
            .with_override("Server.Port", 0_i64)
            .load()
            .unwrap_err();

        let report = err.report().unwrap();
        assert_eq!(report.fatal().count(), 1);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_ready_config_shares_one_aggregate() {
        let ready = required().load().unwrap();
        let a = ready.shared();
        let b = ready.shared();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_custom_validator() {
        let validator = Validator::new().with_rule(|config: &TesseraConfig, out: &mut Vec<Violation>| {
            if config.server.name == "tessera-api" {
                out.push(Violation::fatal(["Server.Name"], "set a real service name"));
            }
        });
        assert!(required().load_with(&validator).is_err());
        assert!(required()
            .with_override("Name", "idrm-api")
            .load_with(&validator)
            .is_ok());
    }

    #[test]
    fn test_route() {
        let path = |s: &str| s.split('.').map(str::to_string).collect::<Vec<_>>();
        assert_eq!(route(&path("Port")), Some((Target::Server, "Port".to_string())));
        assert_eq!(
            route(&path("DB.Default.Host")),
            Some((Target::Database, "Host".to_string()))
        );
        assert_eq!(
            route(&path("Telemetry.Log.Level")),
            Some((Target::Telemetry, "Log.Level".to_string()))
        );
        assert_eq!(route(&path("DB.Default")), None);
        assert_eq!(route(&path("Unknown.Field")), None);
    }

    #[tokio::test]
    async fn test_load_with_timeout_succeeds() {
        let config = required()
            .load_with_timeout(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(config.database.database, "idrm");
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_load_error() {
        let result = run_with_timeout(Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(ConfigError::Load(LoadError::Timeout { .. }))
        ));
    }
}
