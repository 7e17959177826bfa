//! Dispatcher configuration.
//!
//! Settings come from defaults, an optional TOML document, and then the
//! environment:
//!
//! ```toml
//! verbose = true
//! view_policy = "gather"
//! inline_copy_threshold = 64
//! ```
//!
//! | Variable                       | Field                   |
//! |--------------------------------|-------------------------|
//! | `MLBIND_VERBOSE`               | `verbose`               |
//! | `MLBIND_VIEW_POLICY`           | `view_policy`           |
//! | `MLBIND_INLINE_COPY_THRESHOLD` | `inline_copy_threshold` |

use crate::{BindError, BindResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element count at or below which native results are copied rather than
/// handed over.
pub const DEFAULT_INLINE_COPY_THRESHOLD: usize = 16;

/// What to do with an array whose order flag contradicts its layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPolicy {
    /// Fail with a layout violation.
    #[default]
    Reject,
    /// Ignore the flag and read the elements by their strides.
    Gather,
}

impl fmt::Display for ViewPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => f.write_str("reject"),
            Self::Gather => f.write_str("gather"),
        }
    }
}

impl FromStr for ViewPolicy {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "gather" => Ok(Self::Gather),
            other => Err(BindError::Config(format!(
                "unknown view policy '{other}' (expected 'reject' or 'gather')"
            ))),
        }
    }
}

/// Dispatcher settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingConfig {
    /// Log a summary of every dispatch at info level.
    pub verbose: bool,
    /// Handling of inconsistent array layouts.
    pub view_policy: ViewPolicy,
    /// Largest result, in elements, that is copied instead of handed over.
    pub inline_copy_threshold: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            view_policy: ViewPolicy::Reject,
            inline_copy_threshold: DEFAULT_INLINE_COPY_THRESHOLD,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> BindResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(BindError::Config(format!("{name}: '{other}' is not a boolean"))),
    }
}

impl BindingConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Toml`] on malformed input or unknown keys.
    pub fn from_toml_str(s: &str) -> BindResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Defaults with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Config`] if a variable holds an invalid value.
    pub fn from_env() -> BindResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `MLBIND_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Config`] if a variable holds an invalid value.
    pub fn with_env_overrides(self) -> BindResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> BindResult<Self> {
        if let Some(v) = lookup("MLBIND_VERBOSE") {
            self.verbose = parse_flag("MLBIND_VERBOSE", &v)?;
        }
        if let Some(v) = lookup("MLBIND_VIEW_POLICY") {
            self.view_policy = v.parse()?;
        }
        if let Some(v) = lookup("MLBIND_INLINE_COPY_THRESHOLD") {
            self.inline_copy_threshold = v.trim().parse().map_err(|e| {
                BindError::Config(format!("MLBIND_INLINE_COPY_THRESHOLD: '{v}': {e}"))
            })?;
        }
        Ok(self)
    }
}
