//! Configuration section schemas.
//!
//! Each section is an independent, defaultable and validatable bag of typed
//! fields. Sections never look at each other; rules that span sections live
//! in [`Validator`](crate::Validator).
//!
//! Field names follow the service's document schema (`MaxIdleConns`,
//! `AccessExpire`, ...). Matching is case-insensitive and ignores `_` and
//! `-`, so `max_idle_conns` and `MAX_IDLE_CONNS` address the same field.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;

use crate::error::ParseError;
use crate::primitives::{ByteSize, ConfigDuration, DurationUnit, Port, SecretString};
use crate::raw::{normalize_key, RawValue};
use crate::validator::Violation;

/// Behaviour shared by every configuration section.
pub trait Section: Clone + Debug + Default + Serialize {
    /// Field-wise overrides; every field is optional.
    type Partial: Default + Debug;

    /// Canonical section path, e.g. `DB.Default`.
    const NAME: &'static str;

    /// Canonical field names.
    const FIELDS: &'static [&'static str];

    /// A fully-populated instance with built-in defaults.
    fn defaults() -> Self {
        Self::default()
    }

    /// Return a copy with every field set in `partial` replaced.
    fn apply_overrides(&self, partial: &Self::Partial) -> Self;

    /// Parse `raw` into the partial field addressed by `key`.
    ///
    /// Returns the canonical field path, or `None` when the key names no
    /// field of this section.
    fn set_field(
        partial: &mut Self::Partial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError>;

    /// Intra-section checks.
    fn validate(&self) -> Vec<Violation>;

    /// Paths of required fields that are still empty.
    fn missing_required(&self) -> Vec<String> {
        Vec::new()
    }

    /// Resolve a source key to a canonical field name.
    fn resolve_field(key: &str) -> Option<&'static str> {
        let wanted = normalize_key(key);
        Self::FIELDS
            .iter()
            .copied()
            .find(|field| normalize_key(field) == wanted)
    }

    /// Full path of a field, e.g. `DB.Default.Host`.
    fn field_path(field: &str) -> String {
        format!("{}.{field}", Self::NAME)
    }
}

fn take<T: Clone>(slot: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        slot.clone_from(value);
    }
}

// ============================================================================
// Server
// ============================================================================

/// REST listener settings, consumed by the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSection {
    /// Service name.
    pub name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: Port,
    /// Path prefix for every route, e.g. `/api/v1`.
    pub base_path: String,
    /// Per-request timeout.
    pub timeout: ConfigDuration,
    /// Graceful shutdown timeout.
    pub shutdown_timeout: ConfigDuration,
    /// Maximum concurrent connections.
    pub max_conns: i64,
    /// Maximum request body size.
    pub max_bytes: ByteSize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: "tessera-api".to_string(),
            host: "0.0.0.0".to_string(),
            port: Port::new(8888),
            base_path: "/api/v1".to_string(),
            timeout: ConfigDuration::from_secs(3),
            shutdown_timeout: ConfigDuration::from_secs(30),
            max_conns: 10000,
            max_bytes: ByteSize::from_mib(1),
        }
    }
}

impl ServerSection {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Field-wise overrides for [`ServerSection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ServerPartial {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<Port>,
    pub base_path: Option<String>,
    pub timeout: Option<ConfigDuration>,
    pub shutdown_timeout: Option<ConfigDuration>,
    pub max_conns: Option<i64>,
    pub max_bytes: Option<ByteSize>,
}

impl Section for ServerSection {
    type Partial = ServerPartial;

    const NAME: &'static str = "Server";
    const FIELDS: &'static [&'static str] = &[
        "Name",
        "Host",
        "Port",
        "BasePath",
        "Timeout",
        "ShutdownTimeout",
        "MaxConns",
        "MaxBytes",
    ];

    fn apply_overrides(&self, partial: &ServerPartial) -> Self {
        let mut next = self.clone();
        take(&mut next.name, partial.name.as_ref());
        take(&mut next.host, partial.host.as_ref());
        take(&mut next.port, partial.port.as_ref());
        take(&mut next.base_path, partial.base_path.as_ref());
        take(&mut next.timeout, partial.timeout.as_ref());
        take(&mut next.shutdown_timeout, partial.shutdown_timeout.as_ref());
        take(&mut next.max_conns, partial.max_conns.as_ref());
        take(&mut next.max_bytes, partial.max_bytes.as_ref());
        next
    }

    fn set_field(
        partial: &mut ServerPartial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError> {
        let Some(field) = Self::resolve_field(key) else {
            return Ok(None);
        };
        let path = Self::field_path(field);
        match field {
            "Name" => partial.name = Some(raw.to_string_value(&path)?),
            "Host" => partial.host = Some(raw.to_string_value(&path)?),
            "Port" => partial.port = Some(Port::parse(&path, raw)?),
            "BasePath" => partial.base_path = Some(raw.to_string_value(&path)?),
            "Timeout" => {
                partial.timeout = Some(ConfigDuration::parse(&path, raw, DurationUnit::Millis)?);
            }
            "ShutdownTimeout" => {
                partial.shutdown_timeout =
                    Some(ConfigDuration::parse(&path, raw, DurationUnit::Seconds)?);
            }
            "MaxConns" => partial.max_conns = Some(raw.to_i64(&path)?),
            "MaxBytes" => partial.max_bytes = Some(ByteSize::parse(&path, raw)?),
            _ => return Ok(None),
        }
        Ok(Some(path))
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations: Vec<Violation> = [
            self.port.validate("Server.Port"),
            self.timeout.validate("Server.Timeout"),
            self.shutdown_timeout.validate("Server.ShutdownTimeout"),
            self.max_bytes.validate("Server.MaxBytes"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if self.host.trim().is_empty() {
            violations.push(Violation::fatal(["Server.Host"], "host must not be empty"));
        }
        if self.max_conns < 1 {
            violations.push(Violation::fatal(
                ["Server.MaxConns"],
                format!("max connections must be at least 1, got {}", self.max_conns),
            ));
        }
        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            violations.push(Violation::fatal(
                ["Server.BasePath"],
                format!("base path `{}` must start with `/`", self.base_path),
            ));
        }
        violations
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Telemetry settings.
///
/// Opaque to this crate: known keys are type-checked, anything else is kept
/// verbatim in [`TelemetrySection::extra`] for the exporter to interpret.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetrySection {
    /// Service name reported to the collector.
    pub name: String,
    /// Collector endpoint. Empty disables export.
    pub endpoint: String,
    /// Trace sampling ratio.
    pub sampler: f64,
    /// Exporter kind.
    pub batcher: String,
    /// Reporting window.
    pub report_interval: ConfigDuration,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, RawValue>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            name: "tessera-api".to_string(),
            endpoint: String::new(),
            sampler: 1.0,
            batcher: "otlpgrpc".to_string(),
            report_interval: ConfigDuration::from_secs(5),
            extra: BTreeMap::new(),
        }
    }
}

impl TelemetrySection {
    /// Whether only a fraction of traces is sampled.
    pub fn is_fractional_sampling(&self) -> bool {
        self.sampler > 0.0 && self.sampler < 1.0
    }

    /// The passthrough value stored under any spelling of `key`.
    pub fn extra_value(&self, key: &str) -> Option<&RawValue> {
        self.extra.get(&passthrough_key(&self.extra, key))
    }
}

/// The spelling `key` is stored under in `extra`.
///
/// Passthrough keys follow the same matching rules as schema fields, so the
/// first spelling seen is kept and later spellings address it.
fn passthrough_key(extra: &BTreeMap<String, RawValue>, key: &str) -> String {
    if extra.contains_key(key) {
        return key.to_string();
    }
    let wanted = normalize_key(key);
    extra
        .keys()
        .find(|existing| normalize_key(existing) == wanted)
        .map_or_else(|| key.to_string(), Clone::clone)
}

/// Field-wise overrides for [`TelemetrySection`].
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct TelemetryPartial {
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub sampler: Option<f64>,
    pub batcher: Option<String>,
    pub report_interval: Option<ConfigDuration>,
    pub extra: BTreeMap<String, RawValue>,
}

impl Section for TelemetrySection {
    type Partial = TelemetryPartial;

    const NAME: &'static str = "Telemetry";
    const FIELDS: &'static [&'static str] =
        &["Name", "Endpoint", "Sampler", "Batcher", "ReportInterval"];

    fn apply_overrides(&self, partial: &TelemetryPartial) -> Self {
        let mut next = self.clone();
        take(&mut next.name, partial.name.as_ref());
        take(&mut next.endpoint, partial.endpoint.as_ref());
        take(&mut next.sampler, partial.sampler.as_ref());
        take(&mut next.batcher, partial.batcher.as_ref());
        take(&mut next.report_interval, partial.report_interval.as_ref());
        for (key, value) in &partial.extra {
            let key = passthrough_key(&next.extra, key);
            next.extra.insert(key, value.clone());
        }
        next
    }

    fn set_field(
        partial: &mut TelemetryPartial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError> {
        let Some(field) = Self::resolve_field(key) else {
            let key = passthrough_key(&partial.extra, key);
            partial.extra.insert(key.clone(), raw.clone());
            return Ok(Some(Self::field_path(&key)));
        };
        let path = Self::field_path(field);
        match field {
            "Name" => partial.name = Some(raw.to_string_value(&path)?),
            "Endpoint" => partial.endpoint = Some(raw.to_string_value(&path)?),
            "Sampler" => partial.sampler = Some(raw.to_f64(&path)?),
            "Batcher" => partial.batcher = Some(raw.to_string_value(&path)?),
            "ReportInterval" => {
                partial.report_interval =
                    Some(ConfigDuration::parse(&path, raw, DurationUnit::Seconds)?);
            }
            _ => return Ok(None),
        }
        Ok(Some(path))
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if !(0.0..=1.0).contains(&self.sampler) {
            violations.push(Violation::warn(
                [Self::field_path("Sampler")],
                format!("sampling ratio {} is outside 0..=1", self.sampler),
            ));
        }
        violations
    }
}

// ============================================================================
// Database
// ============================================================================

/// Log levels understood by the persistence pool.
pub const DATABASE_LOG_LEVELS: &[&str] = &["silent", "error", "warn", "info"];

/// Connection and ORM settings for the default database, consumed once when
/// the connection pool is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseSection {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: Port,
    /// Schema name. Required.
    pub database: String,
    /// Login user. Required.
    pub username: String,
    /// Login password.
    pub password: SecretString,
    /// Connection character set.
    pub charset: String,
    /// Idle connections kept in the pool.
    pub max_idle_conns: i64,
    /// Upper bound on open connections.
    pub max_open_conns: i64,
    /// Maximum lifetime of a connection.
    pub conn_max_lifetime: ConfigDuration,
    /// Maximum idle time of a connection.
    pub conn_max_idle_time: ConfigDuration,
    /// ORM log level.
    pub log_level: String,
    /// Queries slower than this are logged.
    pub slow_threshold: ConfigDuration,
    /// Skip the implicit transaction around single writes.
    pub skip_default_txn: bool,
    /// Cache prepared statements.
    pub prepare_stmt: bool,
    /// Use singular table names.
    pub singular_table: bool,
    /// Do not create foreign key constraints during migration.
    pub disable_foreign_key: bool,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: Port::new(3306),
            database: String::new(),
            username: String::new(),
            password: SecretString::default(),
            charset: "utf8mb4".to_string(),
            max_idle_conns: 10,
            max_open_conns: 100,
            conn_max_lifetime: ConfigDuration::from_secs(3600),
            conn_max_idle_time: ConfigDuration::from_secs(600),
            log_level: "warn".to_string(),
            slow_threshold: ConfigDuration::from_millis(200),
            skip_default_txn: false,
            prepare_stmt: false,
            singular_table: false,
            disable_foreign_key: false,
        }
    }
}

impl DatabaseSection {
    /// MySQL-style DSN for the driver. Wrapped as a secret because it embeds
    /// the password.
    pub fn dsn(&self) -> SecretString {
        SecretString::new(format!(
            "{}:{}@tcp({}:{})/{}?charset={}&parseTime=True&loc=Local",
            self.username,
            self.password.expose(),
            self.host,
            self.port,
            self.database,
            self.charset,
        ))
    }
}

/// Field-wise overrides for [`DatabaseSection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DatabasePartial {
    pub host: Option<String>,
    pub port: Option<Port>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub charset: Option<String>,
    pub max_idle_conns: Option<i64>,
    pub max_open_conns: Option<i64>,
    pub conn_max_lifetime: Option<ConfigDuration>,
    pub conn_max_idle_time: Option<ConfigDuration>,
    pub log_level: Option<String>,
    pub slow_threshold: Option<ConfigDuration>,
    pub skip_default_txn: Option<bool>,
    pub prepare_stmt: Option<bool>,
    pub singular_table: Option<bool>,
    pub disable_foreign_key: Option<bool>,
}

impl Section for DatabaseSection {
    type Partial = DatabasePartial;

    const NAME: &'static str = "DB.Default";
    const FIELDS: &'static [&'static str] = &[
        "Host",
        "Port",
        "Database",
        "Username",
        "Password",
        "Charset",
        "MaxIdleConns",
        "MaxOpenConns",
        "ConnMaxLifetime",
        "ConnMaxIdleTime",
        "LogLevel",
        "SlowThreshold",
        "SkipDefaultTxn",
        "PrepareStmt",
        "SingularTable",
        "DisableForeignKey",
    ];

    fn apply_overrides(&self, partial: &DatabasePartial) -> Self {
        let mut next = self.clone();
        take(&mut next.host, partial.host.as_ref());
        take(&mut next.port, partial.port.as_ref());
        take(&mut next.database, partial.database.as_ref());
        take(&mut next.username, partial.username.as_ref());
        take(&mut next.password, partial.password.as_ref());
        take(&mut next.charset, partial.charset.as_ref());
        take(&mut next.max_idle_conns, partial.max_idle_conns.as_ref());
        take(&mut next.max_open_conns, partial.max_open_conns.as_ref());
        take(&mut next.conn_max_lifetime, partial.conn_max_lifetime.as_ref());
        take(&mut next.conn_max_idle_time, partial.conn_max_idle_time.as_ref());
        take(&mut next.log_level, partial.log_level.as_ref());
        take(&mut next.slow_threshold, partial.slow_threshold.as_ref());
        take(&mut next.skip_default_txn, partial.skip_default_txn.as_ref());
        take(&mut next.prepare_stmt, partial.prepare_stmt.as_ref());
        take(&mut next.singular_table, partial.singular_table.as_ref());
        take(&mut next.disable_foreign_key, partial.disable_foreign_key.as_ref());
        next
    }

    fn set_field(
        partial: &mut DatabasePartial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError> {
        let Some(field) = Self::resolve_field(key) else {
            return Ok(None);
        };
        let path = Self::field_path(field);
        let seconds = |raw: &RawValue| ConfigDuration::parse(&path, raw, DurationUnit::Seconds);
        match field {
            "Host" => partial.host = Some(raw.to_string_value(&path)?),
            "Port" => partial.port = Some(Port::parse(&path, raw)?),
            "Database" => partial.database = Some(raw.to_string_value(&path)?),
            "Username" => partial.username = Some(raw.to_string_value(&path)?),
            "Password" => partial.password = Some(SecretString::parse(&path, raw)?),
            "Charset" => partial.charset = Some(raw.to_string_value(&path)?),
            "MaxIdleConns" => partial.max_idle_conns = Some(raw.to_i64(&path)?),
            "MaxOpenConns" => partial.max_open_conns = Some(raw.to_i64(&path)?),
            "ConnMaxLifetime" => partial.conn_max_lifetime = Some(seconds(raw)?),
            "ConnMaxIdleTime" => partial.conn_max_idle_time = Some(seconds(raw)?),
            "LogLevel" => {
                partial.log_level = Some(raw.to_string_value(&path)?.to_lowercase());
            }
            "SlowThreshold" => {
                partial.slow_threshold =
                    Some(ConfigDuration::parse(&path, raw, DurationUnit::Millis)?);
            }
            "SkipDefaultTxn" => partial.skip_default_txn = Some(raw.to_bool(&path)?),
            "PrepareStmt" => partial.prepare_stmt = Some(raw.to_bool(&path)?),
            "SingularTable" => partial.singular_table = Some(raw.to_bool(&path)?),
            "DisableForeignKey" => partial.disable_foreign_key = Some(raw.to_bool(&path)?),
            _ => return Ok(None),
        }
        Ok(Some(path))
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations: Vec<Violation> = [
            self.port.validate("DB.Default.Port"),
            self.conn_max_lifetime.validate("DB.Default.ConnMaxLifetime"),
            self.conn_max_idle_time.validate("DB.Default.ConnMaxIdleTime"),
            self.slow_threshold.validate("DB.Default.SlowThreshold"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if self.max_open_conns < 1 {
            violations.push(Violation::fatal(
                ["DB.Default.MaxOpenConns"],
                format!("max open connections must be at least 1, got {}", self.max_open_conns),
            ));
        }
        if self.max_idle_conns < 0 {
            violations.push(Violation::fatal(
                ["DB.Default.MaxIdleConns"],
                format!("max idle connections must not be negative, got {}", self.max_idle_conns),
            ));
        } else if self.max_open_conns >= 1 && self.max_idle_conns > self.max_open_conns {
            violations.push(Violation::fatal(
                ["DB.Default.MaxIdleConns", "DB.Default.MaxOpenConns"],
                format!(
                    "max idle connections ({}) must not exceed max open connections ({})",
                    self.max_idle_conns, self.max_open_conns
                ),
            ));
        }
        if self.charset.trim().is_empty() {
            violations.push(Violation::fatal(["DB.Default.Charset"], "charset must not be empty"));
        }
        if !DATABASE_LOG_LEVELS.contains(&self.log_level.as_str()) {
            violations.push(Violation::fatal(
                ["DB.Default.LogLevel"],
                format!(
                    "log level `{}` is not one of {}",
                    self.log_level,
                    DATABASE_LOG_LEVELS.join(", ")
                ),
            ));
        }
        violations
    }

    fn missing_required(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.database.trim().is_empty() {
            missing.push(Self::field_path("Database"));
        }
        if self.username.trim().is_empty() {
            missing.push(Self::field_path("Username"));
        }
        missing
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Redis client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheSection {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: Port,
    /// Database index.
    #[serde(rename = "DB")]
    pub db: i64,
    /// `AUTH` password; empty for none.
    pub password: SecretString,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: Port::new(6379),
            db: 0,
            password: SecretString::default(),
        }
    }
}

impl CacheSection {
    /// Highest index in a default Redis deployment.
    pub const DEFAULT_MAX_DB: i64 = 15;

    /// `host:port` of the Redis server.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Field-wise overrides for [`CacheSection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CachePartial {
    pub host: Option<String>,
    pub port: Option<Port>,
    pub db: Option<i64>,
    pub password: Option<SecretString>,
}

impl Section for CacheSection {
    type Partial = CachePartial;

    const NAME: &'static str = "Redis";
    const FIELDS: &'static [&'static str] = &["Host", "Port", "DB", "Password"];

    fn apply_overrides(&self, partial: &CachePartial) -> Self {
        let mut next = self.clone();
        take(&mut next.host, partial.host.as_ref());
        take(&mut next.port, partial.port.as_ref());
        take(&mut next.db, partial.db.as_ref());
        take(&mut next.password, partial.password.as_ref());
        next
    }

    fn set_field(
        partial: &mut CachePartial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError> {
        let Some(field) = Self::resolve_field(key) else {
            return Ok(None);
        };
        let path = Self::field_path(field);
        match field {
            "Host" => partial.host = Some(raw.to_string_value(&path)?),
            "Port" => partial.port = Some(Port::parse(&path, raw)?),
            "DB" => partial.db = Some(raw.to_i64(&path)?),
            "Password" => partial.password = Some(SecretString::parse(&path, raw)?),
            _ => return Ok(None),
        }
        Ok(Some(path))
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations: Vec<Violation> =
            self.port.validate("Redis.Port").into_iter().collect();

        if self.db < 0 {
            violations.push(Violation::fatal(
                ["Redis.DB"],
                format!("database index must not be negative, got {}", self.db),
            ));
        } else if self.db > Self::DEFAULT_MAX_DB {
            violations.push(Violation::warn(
                ["Redis.DB"],
                format!(
                    "database index {} is above {}; the server must be configured with more databases",
                    self.db,
                    Self::DEFAULT_MAX_DB
                ),
            ));
        }
        violations
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Token issuance settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthSection {
    /// Signing secret. Required, never printed.
    pub access_secret: SecretString,
    /// Token lifetime.
    pub access_expire: ConfigDuration,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            access_secret: SecretString::default(),
            access_expire: ConfigDuration::from_secs(7200),
        }
    }
}

impl AuthSection {
    /// Secrets shorter than this are accepted with a warning.
    pub const RECOMMENDED_SECRET_LEN: usize = 32;
}

/// Field-wise overrides for [`AuthSection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AuthPartial {
    pub access_secret: Option<SecretString>,
    pub access_expire: Option<ConfigDuration>,
}

impl Section for AuthSection {
    type Partial = AuthPartial;

    const NAME: &'static str = "Auth";
    const FIELDS: &'static [&'static str] = &["AccessSecret", "AccessExpire"];

    fn apply_overrides(&self, partial: &AuthPartial) -> Self {
        let mut next = self.clone();
        take(&mut next.access_secret, partial.access_secret.as_ref());
        take(&mut next.access_expire, partial.access_expire.as_ref());
        next
    }

    fn set_field(
        partial: &mut AuthPartial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError> {
        let Some(field) = Self::resolve_field(key) else {
            return Ok(None);
        };
        let path = Self::field_path(field);
        match field {
            "AccessSecret" => partial.access_secret = Some(SecretString::parse(&path, raw)?),
            "AccessExpire" => {
                partial.access_expire =
                    Some(ConfigDuration::parse(&path, raw, DurationUnit::Seconds)?);
            }
            _ => return Ok(None),
        }
        Ok(Some(path))
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.access_expire.as_millis() <= 0 {
            violations.push(Violation::fatal(
                ["Auth.AccessExpire"],
                format!("token expiry must be positive, got {}", self.access_expire),
            ));
        }
        if !self.access_secret.is_empty()
            && self.access_secret.len() < Self::RECOMMENDED_SECRET_LEN
        {
            violations.push(Violation::warn(
                ["Auth.AccessSecret"],
                format!(
                    "access secret is shorter than {} bytes",
                    Self::RECOMMENDED_SECRET_LEN
                ),
            ));
        }
        violations
    }

    fn missing_required(&self) -> Vec<String> {
        self.access_secret
            .validate("Auth.AccessSecret")
            .map(|_| Self::field_path("AccessSecret"))
            .into_iter()
            .collect()
    }
}

// ============================================================================
// Docs
// ============================================================================

/// Swagger UI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocsSection {
    /// Serve the documentation UI.
    pub enabled: bool,
    /// Mount path, relative to the server base path.
    pub path: String,
}

impl Default for DocsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/swagger".to_string(),
        }
    }
}

/// Field-wise overrides for [`DocsSection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DocsPartial {
    pub enabled: Option<bool>,
    pub path: Option<String>,
}

impl Section for DocsSection {
    type Partial = DocsPartial;

    const NAME: &'static str = "Swagger";
    const FIELDS: &'static [&'static str] = &["Enabled", "Path"];

    fn apply_overrides(&self, partial: &DocsPartial) -> Self {
        let mut next = self.clone();
        take(&mut next.enabled, partial.enabled.as_ref());
        take(&mut next.path, partial.path.as_ref());
        next
    }

    fn set_field(
        partial: &mut DocsPartial,
        key: &str,
        raw: &RawValue,
    ) -> Result<Option<String>, ParseError> {
        let Some(field) = Self::resolve_field(key) else {
            return Ok(None);
        };
        let path = Self::field_path(field);
        match field {
            "Enabled" => partial.enabled = Some(raw.to_bool(&path)?),
            "Path" => partial.path = Some(raw.to_string_value(&path)?),
            _ => return Ok(None),
        }
        Ok(Some(path))
    }

    fn validate(&self) -> Vec<Violation> {
        if !self.enabled {
            return Vec::new();
        }
        if self.path.trim().is_empty() {
            return vec![Violation::fatal(
                ["Swagger.Enabled", "Swagger.Path"],
                "documentation is enabled but no path is set",
            )];
        }
        if !self.path.starts_with('/') {
            return vec![Violation::fatal(
                ["Swagger.Path"],
                format!("documentation path `{}` must start with `/`", self.path),
            )];
        }
        Vec::new()
    }
}
