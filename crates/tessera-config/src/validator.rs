//! Configuration validation.
//!
//! The [`Validator`] runs every check and collects every violation; it never
//! stops at the first one, so an operator sees the complete list in one pass.
//!
//! Checks run in three phases:
//!
//! 1. Required fields (fields without a default) must be set.
//! 2. Each section's own [`Section::validate`].
//! 3. Cross-section [`Rule`]s, in registration order.
//!
//! Every violation carries a [`Severity`]. FATAL violations reject the
//! configuration; WARN violations are reported but do not block startup.

use std::fmt;

use serde::Serialize;

use crate::config::TesseraConfig;
use crate::schema::Section;

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Reported, does not block startup.
    Warn,
    /// Blocks startup.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "WARN",
            Self::Fatal => "FATAL",
        })
    }
}

/// A breach of one validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Severity of the breach.
    pub severity: Severity,
    /// Field paths involved, e.g. `["DB.Default.MaxIdleConns"]`.
    pub fields: Vec<String>,
    /// What is wrong. Never contains secret values.
    pub message: String,
}

impl Violation {
    /// Create a violation.
    pub fn new<I, S>(severity: Severity, fields: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            severity,
            fields: fields.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Create a FATAL violation.
    pub fn fatal<I, S>(fields: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Severity::Fatal, fields, message)
    }

    /// Create a WARN violation.
    pub fn warn<I, S>(fields: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Severity::Warn, fields, message)
    }

    /// Whether this violation blocks startup.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.fields.join(", "), self.message)
    }
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    /// Create a report.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// All violations, in the order they were found.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// FATAL violations.
    pub fn fatal(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_fatal())
    }

    /// WARN violations.
    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_fatal())
    }

    /// Whether any violation is FATAL.
    pub fn is_rejected(&self) -> bool {
        self.violations.iter().any(Violation::is_fatal)
    }

    /// Whether the report is empty.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Append violations.
    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    /// Consume the report, returning its violations.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {violation}")?;
        }
        Ok(())
    }
}

/// A cross-section check.
///
/// Implemented for closures of the form
/// `Fn(&TesseraConfig, &mut Vec<Violation>)`.
pub trait Rule: Send + Sync {
    /// Push any violations found in `config`.
    fn check(&self, config: &TesseraConfig, violations: &mut Vec<Violation>);
}

impl<F> Rule for F
where
    F: Fn(&TesseraConfig, &mut Vec<Violation>) + Send + Sync,
{
    fn check(&self, config: &TesseraConfig, violations: &mut Vec<Violation>) {
        self(config, violations);
    }
}

/// Runs required-field, section and cross-section checks.
///
/// # Example
///
/// ```
/// use tessera_config::{TesseraConfig, Validator, Violation};
///
/// let validator = Validator::baseline().with_rule(|config: &TesseraConfig, out: &mut Vec<Violation>| {
///     if config.server.name.is_empty() {
///         out.push(Violation::fatal(["Server.Name"], "name must be set"));
///     }
/// });
///
/// let report = validator.validate(&TesseraConfig::default());
/// // Defaults lack the required secrets and database credentials.
/// assert!(report.is_rejected());
/// ```
pub struct Validator {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::baseline()
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Validator {
    /// A validator with required-field and section checks but no
    /// cross-section rules.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// A validator with the built-in cross-section rules.
    #[must_use]
    pub fn baseline() -> Self {
        Self::new()
            .with_rule(auth_expiry_fits_report_window)
            .with_rule(docs_require_base_path)
            .with_rule(skip_default_txn_without_prepare_stmt)
    }

    /// Register an additional cross-section rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Number of cross-section rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run every check and collect all violations.
    pub fn validate(&self, config: &TesseraConfig) -> ValidationReport {
        let mut violations: Vec<Violation> = config
            .missing_required()
            .into_iter()
            .map(|path| Violation::fatal([path], "required field is not set"))
            .collect();

        violations.extend(config.server.validate());
        violations.extend(config.telemetry.validate());
        violations.extend(config.database.validate());
        violations.extend(config.cache.validate());
        violations.extend(config.auth.validate());
        violations.extend(config.docs.validate());

        for rule in &self.rules {
            rule.check(config, &mut violations);
        }

        ValidationReport::new(violations)
    }
}

/// With fractional sampling, a token must live for at least one reporting
/// window, and should span a whole number of windows.
fn auth_expiry_fits_report_window(config: &TesseraConfig, out: &mut Vec<Violation>) {
    if !config.telemetry.is_fractional_sampling() {
        return;
    }
    let window = config.telemetry.report_interval.as_millis();
    let expire = config.auth.access_expire.as_millis();
    if window <= 0 || expire <= 0 {
        // Non-positive values are already reported by the sections.
        return;
    }

    let fields = ["Auth.AccessExpire", "Telemetry.ReportInterval"];
    if expire < window {
        out.push(Violation::fatal(
            fields,
            format!(
                "token expiry {} is shorter than the telemetry reporting window {}",
                config.auth.access_expire, config.telemetry.report_interval
            ),
        ));
    } else if expire % window != 0 {
        out.push(Violation::warn(
            fields,
            format!(
                "token expiry {} is not a whole number of telemetry reporting windows ({})",
                config.auth.access_expire, config.telemetry.report_interval
            ),
        ));
    }
}

fn docs_require_base_path(config: &TesseraConfig, out: &mut Vec<Violation>) {
    if config.docs.enabled && config.server.base_path.trim().is_empty() {
        out.push(Violation::fatal(
            ["Swagger.Enabled", "Server.BasePath"],
            "documentation is enabled but the server has no base path",
        ));
    }
}

fn skip_default_txn_without_prepare_stmt(config: &TesseraConfig, out: &mut Vec<Violation>) {
    if config.database.skip_default_txn && !config.database.prepare_stmt {
        out.push(Violation::warn(
            ["DB.Default.SkipDefaultTxn", "DB.Default.PrepareStmt"],
            "default transactions are skipped but prepared statements are not enabled; \
             set PrepareStmt explicitly if statement caching is expected",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{ConfigDuration, SecretString};
    use crate::schema::{AuthSection, DatabaseSection, DocsSection, ServerSection, TelemetrySection};

    fn valid_config() -> TesseraConfig {
        TesseraConfig::builder()
            .database(DatabaseSection {
                database: "idrm".to_string(),
                username: "svc".to_string(),
                ..Default::default()
            })
            .auth(AuthSection {
                access_secret: SecretString::from("0123456789abcdef0123456789abcdef"),
                ..Default::default()
            })
            .build()
    }

    #[test]
    fn test_valid_config_has_no_violations() {
        let report = Validator::baseline().validate(&valid_config());
        assert!(report.is_empty(), "{report}");
    }

    #[test]
    fn test_defaults_report_missing_required_fields() {
        let report = Validator::baseline().validate(&TesseraConfig::default());
        let fields: Vec<&str> = report
            .fatal()
            .flat_map(|v| v.fields.iter().map(String::as_str))
            .collect();
        assert_eq!(
            fields,
            vec!["DB.Default.Database", "DB.Default.Username", "Auth.AccessSecret"]
        );
    }

    #[test]
    fn test_collects_all_violations() {
        let mut config = valid_config();
        config.server.port = crate::Port::new(0);
        config.database.max_idle_conns = 20;
        config.database.max_open_conns = 10;
        config.auth.access_expire = ConfigDuration::ZERO;

        let report = Validator::baseline().validate(&config);
        assert_eq!(report.fatal().count(), 3);
        assert!(report.is_rejected());
    }

    #[test]
    fn test_idle_above_open_single_fatal() {
        let mut config = valid_config();
        config.database.max_idle_conns = 20;
        config.database.max_open_conns = 10;

        let report = Validator::baseline().validate(&config);
        assert_eq!(report.violations().len(), 1);
        let violation = &report.violations()[0];
        assert!(violation.is_fatal());
        assert_eq!(
            violation.fields,
            vec!["DB.Default.MaxIdleConns", "DB.Default.MaxOpenConns"]
        );
    }

    #[test]
    fn test_docs_without_base_path_is_fatal() {
        let mut config = valid_config();
        config.docs = DocsSection {
            enabled: true,
            ..Default::default()
        };
        config.server = ServerSection {
            base_path: String::new(),
            ..Default::default()
        };

        let report = Validator::baseline().validate(&config);
        assert_eq!(report.fatal().count(), 1);
        assert!(report.violations()[0].fields.contains(&"Server.BasePath".to_string()));
    }

    #[test]
    fn test_skip_default_txn_is_advisory() {
        let mut config = valid_config();
        config.database.skip_default_txn = true;

        let report = Validator::baseline().validate(&config);
        assert!(!report.is_rejected());
        assert_eq!(report.warnings().count(), 1);

        config.database.prepare_stmt = true;
        assert!(Validator::baseline().validate(&config).is_empty());
    }

    #[test]
    fn test_fractional_sampling_vs_expiry() {
        let mut config = valid_config();
        config.telemetry = TelemetrySection {
            sampler: 0.25,
            report_interval: ConfigDuration::from_secs(60),
            ..Default::default()
        };

        config.auth.access_expire = ConfigDuration::from_secs(30);
        let report = Validator::baseline().validate(&config);
        assert_eq!(report.fatal().count(), 1);

        config.auth.access_expire = ConfigDuration::from_secs(90);
        let report = Validator::baseline().validate(&config);
        assert!(!report.is_rejected());
        assert_eq!(report.warnings().count(), 1);

        config.auth.access_expire = ConfigDuration::from_secs(3600);
        assert!(Validator::baseline().validate(&config).is_empty());

        // Full sampling: no constraint.
        config.telemetry.sampler = 1.0;
        config.auth.access_expire = ConfigDuration::from_secs(30);
        assert!(Validator::baseline().validate(&config).is_empty());
    }

    #[test]
    fn test_custom_rule() {
        let validator = Validator::new().with_rule(|config: &TesseraConfig, out: &mut Vec<Violation>| {
            if config.cache.host == "127.0.0.1" {
                out.push(Violation::warn(["Redis.Host"], "cache on loopback"));
            }
        });
        assert_eq!(validator.rule_count(), 1);

        let report = validator.validate(&valid_config());
        assert_eq!(report.warnings().count(), 1);
        assert!(!report.is_rejected());
    }

    #[test]
    fn test_report_display() {
        let report = ValidationReport::new(vec![
            Violation::fatal(["Server.Port"], "port 0 is outside 1..=65535"),
            Violation::warn(["Redis.DB"], "high index"),
        ]);
        let text = report.to_string();
        assert!(text.contains("[FATAL] Server.Port: port 0 is outside 1..=65535"));
        assert!(text.contains("[WARN] Redis.DB: high index"));
    }
}
