//! Typed configuration system for Tessera services.
//!
//! This crate aggregates a service's configuration from layered sources,
//! validates it as a whole, and hands out one immutable snapshot:
//! - TOML, JSON and YAML configuration files
//! - Environment variable overrides
//! - Explicit in-process overrides
//! - Strict mode (fails on unknown fields) or lenient mode (warns)
//! - Layered configuration (defaults → file → env → overrides)
//!
//! # Overview
//!
//! The aggregate is [`TesseraConfig`], one instance of each section:
//!
//! - [`ServerSection`] - REST listener settings (`Server`, or the document root)
//! - [`TelemetrySection`] - Exporter settings, opaque beyond a few known keys
//! - [`DatabaseSection`] - Default database pool and ORM settings (`DB.Default`)
//! - [`CacheSection`] - Redis client settings (`Redis`)
//! - [`AuthSection`] - Token signing settings (`Auth`)
//! - [`DocsSection`] - Swagger UI settings (`Swagger`)
//!
//! Validation produces a [`ValidationReport`] of WARN and FATAL
//! [`Violation`]s. Any FATAL violation rejects the whole configuration; a
//! partially valid configuration is never handed out.
//!
//! # Example
//!
//! ```no_run
//! use tessera_config::ConfigLoader;
//!
//! # fn main() -> Result<(), tessera_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("etc/api.yaml")?
//!     .with_env_prefix("TESSERA")
//!     .load()?;
//!
//! println!("Server will listen on: {}", config.server.bind_addr());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! Name = "idrm-api"
//! Host = "0.0.0.0"
//! Port = 8888
//!
//! [Telemetry]
//! Endpoint = "http://otel-collector:4317"
//! Sampler = 0.5
//!
//! [DB.Default]
//! Host = "mysql"
//! Database = "idrm"
//! Username = "idrm"
//! Password = "..."
//! MaxIdleConns = 10
//! MaxOpenConns = 100
//! ConnMaxLifetime = 3600
//!
//! [Redis]
//! Host = "redis"
//! Port = 6379
//!
//! [Auth]
//! AccessSecret = "..."
//! AccessExpire = 7200
//!
//! [Swagger]
//! Enabled = true
//! ```
//!
//! Durations accept integers in the field's unit or strings such as
//! `"1h 30m"`. Byte sizes accept integers or strings such as `"4MiB"`.
//!
//! # Environment Variable Overrides
//!
//! Any field can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. Keys match field names ignoring case, `_` and `-`:
//!
//! - `TESSERA__PORT=9000`
//! - `TESSERA__DB__DEFAULT__MAX_IDLE_CONNS=20`
//! - `TESSERA__AUTH__ACCESS_SECRET=...`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod primitives;
mod provenance;
mod raw;
mod schema;
mod store;
mod validator;
mod watcher;

pub use config::{TesseraConfig, TesseraConfigBuilder};
pub use error::{ConfigError, LoadError, ParseError};
pub use loader::{ConfigLoader, LoadState, MergedConfig, ReadyConfig};
pub use primitives::{ByteSize, ConfigDuration, DurationUnit, Port, SecretString};
pub use provenance::Provenance;
pub use raw::{normalize_key, Format, Layer, RawEntry, RawLayer, RawValue, Source};
pub use schema::*;
pub use store::{ConfigSnapshot, ConfigStore};
pub use validator::{Rule, Severity, ValidationReport, Validator, Violation};
pub use watcher::{
    ConfigWatcher, ConfigWatcherBuilder, FileChangeEvent, FileChangeKind, LoaderFactory,
    WatchOptions,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TesseraConfig::default();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8888");
        assert_eq!(config.server.shutdown_timeout, ConfigDuration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = TesseraConfig::builder()
            .server(ServerSection {
                host: "127.0.0.1".to_string(),
                port: Port::new(3000),
                ..Default::default()
            })
            .build();

        assert_eq!(config.server.bind_addr(), "127.0.0.1:3000");
    }
}
