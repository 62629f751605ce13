//! Type system configuration
//!
//! Holds the compiler version stamped into embedded class metadata and the
//! switches that steer the loaded/source resolvers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::utils::{Error, Result};

/// Compiler version recorded in and checked against class metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Compiler (extension) name
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(name: impl Into<String>, major: u32, minor: u32, patch: u32) -> Self {
        Self { name: name.into(), major, minor, patch }
    }

    /// Compare a `"major.minor[.patch]"` string against this version
    pub fn check(&self, found: &str) -> Compatibility {
        let mut parts = found.trim().split('.').map(str::parse::<u32>);
        let major = match parts.next() {
            Some(Ok(major)) => major,
            _ => return Compatibility::Incompatible,
        };
        let minor = match parts.next() {
            Some(Ok(minor)) => minor,
            None => 0,
            Some(Err(_)) => return Compatibility::Incompatible,
        };
        if major != self.major {
            Compatibility::Incompatible
        } else if minor != self.minor {
            Compatibility::MinorIncompatible
        } else {
            Compatibility::Compatible
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new("jltc", 0, 1, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Result of checking a recorded compiler version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    MinorIncompatible,
    Incompatible,
}

/// Configuration for a [`crate::types::TypeSystem`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSystemConfig {
    pub version: Version,
    /// Permit raw class files without embedded metadata
    pub allow_raw_classes: bool,
    /// Source-aware resolution ignores modification times
    pub ignore_mod_times: bool,
    /// Memoize misses in the system resolver
    pub cache_not_found: bool,
    /// The universal root reference type
    pub root_class: String,
    pub string_class: String,
    /// Interfaces every array type implements
    pub array_interfaces: Vec<String>,
    /// Packages imported on demand into every compilation unit
    pub default_imports: Vec<String>,
}

impl Default for TypeSystemConfig {
    fn default() -> Self {
        Self {
            version: Version::default(),
            allow_raw_classes: true,
            ignore_mod_times: false,
            cache_not_found: true,
            root_class: "java.lang.Object".into(),
            string_class: "java.lang.String".into(),
            array_interfaces: vec!["java.lang.Cloneable".into(), "java.io.Serializable".into()],
            default_imports: vec!["java.lang".into()],
        }
    }
}

impl TypeSystemConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::semantic(format!("invalid configuration {}: {}", path.display(), e), None))
    }
}
