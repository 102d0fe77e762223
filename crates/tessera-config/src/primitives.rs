//! Primitive option types.
//!
//! Each type wraps one scalar together with its domain constraint. Parsing
//! only checks that a raw value has the right shape; range checks happen in
//! `validate`, so an out-of-range value survives merging and is reported as
//! a [`Violation`] instead of aborting the load.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ParseError;
use crate::raw::RawValue;
use crate::validator::Violation;

const REDACTED: &str = "[REDACTED]";

/// A TCP port.
///
/// Stored wider than `u16` so that `0` and values above `65535` can be
/// represented and rejected by [`Port::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Port(u32);

impl Port {
    /// Smallest valid port.
    pub const MIN: u32 = 1;
    /// Largest valid port.
    pub const MAX: u32 = 65535;

    /// Wrap a port number without checking its range.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw port number.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The port as `u16`, or `None` if it is out of range.
    pub fn to_u16(self) -> Option<u16> {
        u16::try_from(self.0).ok().filter(|p| *p != 0)
    }

    /// Parse a port from an integer or integer string.
    pub fn parse(field: &str, raw: &RawValue) -> Result<Self, ParseError> {
        let n = raw.to_i64(field)?;
        u32::try_from(n)
            .map(Self)
            .map_err(|_| ParseError::new(field, raw.to_string(), "port must be a non-negative integer"))
    }

    /// Check the port is in `1..=65535`.
    pub fn validate(self, field: &str) -> Option<Violation> {
        (!(Self::MIN..=Self::MAX).contains(&self.0)).then(|| {
            Violation::fatal(
                [field],
                format!("port {} is outside {}..={}", self.0, Self::MIN, Self::MAX),
            )
        })
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unit applied to bare integers when parsing a [`ConfigDuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    /// Whole seconds.
    Seconds,
    /// Milliseconds.
    Millis,
}

/// A signed duration with millisecond resolution.
///
/// Negative values can be written (`"-5s"`, `-5`) so that validation can
/// report them; consumers should call [`ConfigDuration::to_std`] after
/// validation has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConfigDuration {
    millis: i64,
}

impl ConfigDuration {
    /// Zero duration.
    pub const ZERO: Self = Self { millis: 0 };

    /// Create from milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Create from seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            millis: secs.saturating_mul(1000),
        }
    }

    /// Total milliseconds.
    pub const fn as_millis(self) -> i64 {
        self.millis
    }

    /// Whole seconds, truncated toward zero.
    pub const fn as_secs(self) -> i64 {
        self.millis / 1000
    }

    /// Whether the duration is negative.
    pub const fn is_negative(self) -> bool {
        self.millis < 0
    }

    /// Convert to a standard duration; `None` when negative.
    pub fn to_std(self) -> Option<std::time::Duration> {
        u64::try_from(self.millis)
            .ok()
            .map(std::time::Duration::from_millis)
    }

    /// Parse a bare integer in `unit`, or a humantime string like `1h30m`.
    pub fn parse(field: &str, raw: &RawValue, unit: DurationUnit) -> Result<Self, ParseError> {
        let scale = |n: i64| match unit {
            DurationUnit::Seconds => Self::from_secs(n),
            DurationUnit::Millis => Self::from_millis(n),
        };

        let text = match raw {
            RawValue::Int(n) => return Ok(scale(*n)),
            RawValue::Str(s) => s.trim(),
            other => {
                return Err(ParseError::new(
                    field,
                    other.to_string(),
                    "expected an integer or a duration such as `30s`",
                ))
            }
        };

        if let Ok(n) = text.parse::<i64>() {
            return Ok(scale(n));
        }

        let (negative, magnitude) = match text.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, text),
        };
        let parsed = humantime::parse_duration(magnitude)
            .map_err(|e| ParseError::new(field, text, e.to_string()))?;
        let millis = i64::try_from(parsed.as_millis())
            .map_err(|_| ParseError::new(field, text, "duration is too large"))?;

        Ok(Self::from_millis(if negative { -millis } else { millis }))
    }

    /// Check the duration is non-negative.
    pub fn validate(self, field: &str) -> Option<Violation> {
        self.is_negative()
            .then(|| Violation::fatal([field], format!("duration {self} must not be negative")))
    }
}

impl fmt::Display for ConfigDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = std::time::Duration::from_millis(self.millis.unsigned_abs());
        if self.is_negative() {
            f.write_str("-")?;
        }
        write!(f, "{}", humantime::format_duration(magnitude))
    }
}

impl Serialize for ConfigDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A size in bytes, written as a plain count or with a binary unit
/// (`512K`, `1MiB`, `2GB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(u64);

impl ByteSize {
    const KIB: u64 = 1 << 10;
    const MIB: u64 = 1 << 20;
    const GIB: u64 = 1 << 30;

    /// Create from a byte count.
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from mebibytes.
    pub const fn from_mib(mib: u64) -> Self {
        Self(mib * Self::MIB)
    }

    /// The byte count.
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Parse a byte count or a size with a unit suffix.
    pub fn parse(field: &str, raw: &RawValue) -> Result<Self, ParseError> {
        let text = match raw {
            RawValue::Int(n) => {
                return u64::try_from(*n)
                    .map(Self)
                    .map_err(|_| ParseError::new(field, n.to_string(), "size must not be negative"))
            }
            RawValue::Str(s) => s.trim(),
            other => {
                return Err(ParseError::new(
                    field,
                    other.to_string(),
                    "expected a byte count or a size such as `1MiB`",
                ))
            }
        };

        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);
        let count: u64 = digits
            .parse()
            .map_err(|_| ParseError::new(field, text, "expected a byte count or a size such as `1MiB`"))?;
        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => Self::KIB,
            "m" | "mb" | "mib" => Self::MIB,
            "g" | "gb" | "gib" => Self::GIB,
            _ => return Err(ParseError::new(field, text, format!("unknown size unit `{unit}`"))),
        };

        count
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| ParseError::new(field, text, "size is too large"))
    }

    /// Check the size is non-zero.
    pub fn validate(self, field: &str) -> Option<Violation> {
        (self.0 == 0).then(|| Violation::fatal([field], "size must be greater than zero"))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("0B"),
            n if n % Self::GIB == 0 => write!(f, "{}GiB", n / Self::GIB),
            n if n % Self::MIB == 0 => write!(f, "{}MiB", n / Self::MIB),
            n if n % Self::KIB == 0 => write!(f, "{}KiB", n / Self::KIB),
            n => write!(f, "{n}B"),
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A string that must never be printed.
///
/// `Debug`, `Display` and `Serialize` all render `[REDACTED]` (or an empty
/// string when unset). Use [`SecretString::expose`] at the point where the
/// raw value is handed to a collaborator.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is unset.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse a secret. Only string values are accepted, and the raw value is
    /// never echoed in the error.
    pub fn parse(field: &str, raw: &RawValue) -> Result<Self, ParseError> {
        match raw {
            RawValue::Str(s) => Ok(Self(s.clone())),
            _ => Err(ParseError::new(field, REDACTED, "expected a string")),
        }
    }

    /// Check the secret is non-empty.
    pub fn validate(&self, field: &str) -> Option<Violation> {
        self.is_empty()
            .then(|| Violation::fatal([field], "secret must not be empty"))
    }

    fn shown(&self) -> &'static str {
        if self.0.is_empty() {
            ""
        } else {
            REDACTED
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({:?})", self.shown())
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shown())
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.shown())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}
