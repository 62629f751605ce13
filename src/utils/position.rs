//! Source position tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a source or class file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// File the position refers to
    pub file: String,
    /// 1-based line, 0 when unknown
    #[serde(default)]
    pub line: u32,
    /// 1-based column, 0 when unknown
    #[serde(default)]
    pub column: u32,
}

impl Position {
    /// Create a new position
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self { file: file.into(), line, column }
    }

    /// A position naming only a file (e.g. a class file)
    pub fn file(file: impl Into<String>) -> Self {
        Self::new(file, 0, 0)
    }

    /// Create a dummy position (for testing)
    pub fn dummy() -> Self {
        Self::new("<dummy>", 0, 0)
    }

    /// Whether a line number is known
    pub fn has_line(&self) -> bool {
        self.line > 0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_line() {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        } else {
            write!(f, "{}", self.file)
        }
    }
}
