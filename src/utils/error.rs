//! Error handling for the type core

use crate::frontend::scheduler::NeedsGoal;
use crate::utils::Position;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Type system error
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ==================== Resolution Errors ====================

    #[error("Class \"{name}\" not found.")]
    NotFound { name: String },

    #[error("Reference to {name} is ambiguous; it is defined in {}.", candidates.join(" and "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
        position: Option<Position>,
    },

    #[error("Type \"{ty}\" is not canonical.")]
    NotCanonical { ty: String },

    #[error("Could not decode type information for \"{class}\": {message}")]
    BadEncoding { class: String, message: String },

    #[error("Class \"{class}\" was compiled by an incompatible version ({found}) of {compiler}; expected {expected}. Try recompiling the class file with {compiler}.")]
    IncompatibleVersion {
        class: String,
        compiler: String,
        found: String,
        expected: String,
    },

    #[error("Type \"{name}\" clashes with package of the same name.")]
    TypePackageClash { name: String, position: Option<Position> },

    #[error("Class \"{name}\" is already imported as \"{previous}\".")]
    ImportConflict {
        name: String,
        previous: String,
        position: Option<Position>,
    },

    // ==================== Scheduling ====================

    #[error("Missing dependency: {0}")]
    MissingDependency(NeedsGoal),

    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    // ==================== Member Errors ====================

    #[error("{kind} \"{name}\" not found in type \"{container}\".")]
    NoSuchMember {
        kind: MemberKind,
        name: String,
        container: String,
    },

    #[error("No valid {kind} call found for {name}({}) in {container}.", args.join(", "))]
    NoApplicableMember {
        kind: MemberKind,
        name: String,
        args: Vec<String>,
        container: String,
    },

    #[error("Reference to {name} is ambiguous, multiple {kind}s match: {}", candidates.join(", "))]
    AmbiguousCall {
        kind: MemberKind,
        name: String,
        candidates: Vec<String>,
    },

    #[error("Cannot access {what} from {from}.")]
    Inaccessible { what: String, from: String },

    // ==================== Algebra Errors ====================

    #[error("No least common ancestor found for types \"{0}\" and \"{1}\".")]
    NoCommonAncestor(String, String),

    #[error("Type \"{0}\" is not numeric.")]
    NotNumeric(String),

    #[error("Circular inheritance involving {class}.")]
    CyclicInheritance { class: String, position: Option<Position> },

    #[error("{message}")]
    InvalidFlags { message: String, position: Option<Position> },

    #[error("{message}")]
    Semantic { message: String, position: Option<Position> },

    #[error("IO error: {0}")]
    Io(String),
}

/// The kind of member a lookup was searching for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
    Constructor,
    MemberClass,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Field => "field",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::MemberClass => "member class",
        })
    }
}

impl Error {
    /// Create a not-found error for a name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a generic semantic error
    pub fn semantic(message: impl Into<String>, position: Option<Position>) -> Self {
        Self::Semantic { message: message.into(), position }
    }

    /// Get the position associated with this error
    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::Ambiguous { position, .. } => position.as_ref(),
            Self::TypePackageClash { position, .. } => position.as_ref(),
            Self::ImportConflict { position, .. } => position.as_ref(),
            Self::CyclicInheritance { position, .. } => position.as_ref(),
            Self::InvalidFlags { position, .. } => position.as_ref(),
            Self::Semantic { position, .. } => position.as_ref(),
            _ => None,
        }
    }

    /// Recoverable miss; compound resolvers fall through on it
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a not-found error for exactly `name`
    pub fn is_not_found_for(&self, name: &str) -> bool {
        matches!(self, Self::NotFound { name: n } if n == name)
    }

    /// Member lookup miss (no such member or nothing found)
    pub fn is_no_such_member(&self) -> bool {
        matches!(self, Self::NoSuchMember { .. } | Self::NotFound { .. })
    }

    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, Self::MissingDependency(_))
    }

    /// The scheduler signal, if this is one
    pub fn missing_dependency(&self) -> Option<&NeedsGoal> {
        match self {
            Self::MissingDependency(need) => Some(need),
            _ => None,
        }
    }
}

impl From<NeedsGoal> for Error {
    fn from(need: NeedsGoal) -> Self {
        Self::MissingDependency(need)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
