//! Main configuration types.
//!
//! This module provides the top-level [`TesseraConfig`] aggregate and its
//! builder.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::schema::{
    AuthSection, CacheSection, DatabaseSection, DocsSection, Section, ServerSection,
    TelemetrySection,
};

/// Complete service configuration.
///
/// This is the root type that contains one instance of every section. Use
/// [`ConfigLoader`](crate::ConfigLoader) to load it from layered sources;
/// a loaded and validated configuration is handed out as a
/// [`ReadyConfig`](crate::ReadyConfig) and shared through an `Arc`.
///
/// Serializing a `TesseraConfig` never reveals secret values.
///
/// # Example
///
/// ```
/// use tessera_config::TesseraConfig;
///
/// let config = TesseraConfig::default();
/// assert_eq!(config.server.bind_addr(), "0.0.0.0:8888");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TesseraConfig {
    /// REST listener configuration.
    pub server: ServerSection,

    /// Telemetry configuration.
    pub telemetry: TelemetrySection,

    /// Default database configuration (`DB.Default`).
    pub database: DatabaseSection,

    /// Redis configuration.
    pub cache: CacheSection,

    /// Token authentication configuration.
    pub auth: AuthSection,

    /// Swagger documentation configuration.
    pub docs: DocsSection,
}

impl TesseraConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::{TesseraConfig, ServerSection};
    ///
    /// let config = TesseraConfig::builder()
    ///     .server(ServerSection {
    ///         host: "127.0.0.1".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.server.host, "127.0.0.1");
    /// ```
    #[must_use]
    pub fn builder() -> TesseraConfigBuilder {
        TesseraConfigBuilder::new()
    }

    /// Paths of required fields that are still empty, across all sections.
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing = self.server.missing_required();
        missing.extend(self.telemetry.missing_required());
        missing.extend(self.database.missing_required());
        missing.extend(self.cache.missing_required());
        missing.extend(self.auth.missing_required());
        missing.extend(self.docs.missing_required());
        missing
    }

    /// Pretty JSON for diagnostics. Secrets are redacted.
    pub fn to_redacted_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// TOML for diagnostics. Secrets are redacted.
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Serializes in the document schema: `Server`, `Telemetry`, `DB.Default`,
/// `Redis`, `Auth`, `Swagger`.
impl Serialize for TesseraConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Databases<'a> {
            #[serde(rename = "Default")]
            default: &'a DatabaseSection,
        }

        let mut state = serializer.serialize_struct("TesseraConfig", 6)?;
        state.serialize_field("Server", &self.server)?;
        state.serialize_field("Telemetry", &self.telemetry)?;
        state.serialize_field(
            "DB",
            &Databases {
                default: &self.database,
            },
        )?;
        state.serialize_field("Redis", &self.cache)?;
        state.serialize_field("Auth", &self.auth)?;
        state.serialize_field("Swagger", &self.docs)?;
        state.end()
    }
}

/// Builder for [`TesseraConfig`].
#[derive(Debug, Default)]
pub struct TesseraConfigBuilder {
    server: Option<ServerSection>,
    telemetry: Option<TelemetrySection>,
    database: Option<DatabaseSection>,
    cache: Option<CacheSection>,
    auth: Option<AuthSection>,
    docs: Option<DocsSection>,
}

impl TesseraConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the database section.
    #[must_use]
    pub fn database(mut self, database: DatabaseSection) -> Self {
        self.database = Some(database);
        self
    }

    /// Set the cache section.
    #[must_use]
    pub fn cache(mut self, cache: CacheSection) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the auth section.
    #[must_use]
    pub fn auth(mut self, auth: AuthSection) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the docs section.
    #[must_use]
    pub fn docs(mut self, docs: DocsSection) -> Self {
        self.docs = Some(docs);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> TesseraConfig {
        TesseraConfig {
            server: self.server.unwrap_or_else(ServerSection::defaults),
            telemetry: self.telemetry.unwrap_or_else(TelemetrySection::defaults),
            database: self.database.unwrap_or_else(DatabaseSection::defaults),
            cache: self.cache.unwrap_or_else(CacheSection::defaults),
            auth: self.auth.unwrap_or_else(AuthSection::defaults),
            docs: self.docs.unwrap_or_else(DocsSection::defaults),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::SecretString;

    fn with_secrets() -> TesseraConfig {
        TesseraConfig::builder()
            .database(DatabaseSection {
                database: "idrm".to_string(),
                username: "svc".to_string(),
                password: SecretString::from("db-password-value"),
                ..Default::default()
            })
            .cache(CacheSection {
                password: SecretString::from("redis-password-value"),
                ..Default::default()
            })
            .auth(AuthSection {
                access_secret: SecretString::from("access-secret-value"),
                ..Default::default()
            })
            .build()
    }

    #[test]
    fn test_default_config() {
        let config = TesseraConfig::default();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8888");
        assert_eq!(config.database.max_idle_conns, 10);
        assert_eq!(config.cache.addr(), "127.0.0.1:6379");
        assert!(!config.docs.enabled);
    }

    #[test]
    fn test_builder_keeps_other_sections_default() {
        let config = TesseraConfig::builder()
            .server(ServerSection {
                host: "127.0.0.1".to_string(),
                ..Default::default()
            })
            .build();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database, DatabaseSection::defaults());
        assert_eq!(config.auth, AuthSection::defaults());
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(TesseraConfig::default().missing_required().len(), 3);
        assert!(with_secrets().missing_required().is_empty());
    }

    #[test]
    fn test_json_uses_document_schema() {
        let json: serde_json::Value =
            serde_json::from_str(&with_secrets().to_redacted_json().unwrap()).unwrap();
        assert_eq!(json["DB"]["Default"]["Database"], "idrm");
        assert_eq!(json["Server"]["Port"], 8888);
        assert_eq!(json["Swagger"]["Enabled"], false);
    }

    #[test]
    fn test_redacted_dumps_hide_secrets() {
        let config = with_secrets();
        let json = config.to_redacted_json().unwrap();
        let toml = config.to_redacted_toml().unwrap();
        let debug = format!("{config:?}");

        for dump in [&json, &toml, &debug] {
            assert!(!dump.contains("db-password-value"));
            assert!(!dump.contains("redis-password-value"));
            assert!(!dump.contains("access-secret-value"));
        }
        assert!(json.contains("[REDACTED]"));
        assert!(toml.contains("[Auth]"));
    }
}
