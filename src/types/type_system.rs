//! Type entities
//!
//! - Primitive kinds and their numeric ordering
//! - The `Type` variant set (primitive, null, array, class, package, unknown)
//! - Packages and named entities returned by resolvers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a class in the type system's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ==================== Primitives ====================

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Void,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        Self::Void,
        Self::Boolean,
        Self::Char,
        Self::Byte,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
    ];

    /// Look up a primitive by its keyword
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Look up a primitive by its class-file descriptor character
    pub fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'V' => Self::Void,
            'Z' => Self::Boolean,
            'C' => Self::Char,
            'B' => Self::Byte,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            _ => return None,
        })
    }

    pub fn descriptor(self) -> char {
        match self {
            Self::Void => 'V',
            Self::Boolean => 'Z',
            Self::Char => 'C',
            Self::Byte => 'B',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Void | Self::Boolean)
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Self::Char | Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Targets reachable by one or more widening steps (excluding self)
    pub fn widens_to(self) -> &'static [PrimitiveKind] {
        use PrimitiveKind::*;
        match self {
            Byte => &[Short, Int, Long, Float, Double],
            Short | Char => &[Int, Long, Float, Double],
            Int => &[Long, Float, Double],
            Long => &[Float, Double],
            Float => &[Double],
            Double | Void | Boolean => &[],
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ==================== Packages ====================

/// A package, identified by its full dotted name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Package {
    full_name: String,
}

impl Package {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self { full_name: full_name.into() }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last component of the name
    pub fn name(&self) -> &str {
        short_name(&self.full_name)
    }

    /// The enclosing package, if any
    pub fn prefix(&self) -> Option<Package> {
        container_name(&self.full_name).map(Package::new)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

// ==================== Types ====================

/// A type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    /// The type of `null`
    Null,
    Array(Box<Type>),
    Class(ClassId),
    Package(Package),
    /// Ambiguous name not yet disambiguated
    Unknown(String),
}

impl Type {
    pub fn int() -> Self {
        Self::Primitive(PrimitiveKind::Int)
    }

    pub fn void() -> Self {
        Self::Primitive(PrimitiveKind::Void)
    }

    pub fn boolean() -> Self {
        Self::Primitive(PrimitiveKind::Boolean)
    }

    pub fn double() -> Self {
        Self::Primitive(PrimitiveKind::Double)
    }

    pub fn array_of(base: Type) -> Self {
        Self::Array(Box::new(base))
    }

    /// Wrap `base` in `dims` array dimensions
    pub fn array_of_dims(base: Type, dims: usize) -> Self {
        (0..dims).fold(base, |acc, _| Type::array_of(acc))
    }

    /// Contains no unresolved placeholder anywhere in its structure
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Unknown(_) => false,
            Self::Array(base) => base.is_canonical(),
            _ => true,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().map_or(false, PrimitiveKind::is_numeric)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveKind::Void))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Classes, interfaces, arrays and the null type
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Null | Self::Array(_) | Self::Class(_))
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Self::Class(_))
    }

    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Self::Class(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array_base(&self) -> Option<&Type> {
        match self {
            Self::Array(base) => Some(base),
            _ => None,
        }
    }

    /// The innermost element type of an array
    pub fn ultimate_base(&self) -> &Type {
        match self {
            Self::Array(base) => base.ultimate_base(),
            other => other,
        }
    }
}

impl From<PrimitiveKind> for Type {
    fn from(p: PrimitiveKind) -> Self {
        Self::Primitive(p)
    }
}

impl From<ClassId> for Type {
    fn from(id: ClassId) -> Self {
        Self::Class(id)
    }
}

// ==================== Named Entities ====================

/// An entity a resolver can return
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Named {
    Class(ClassId),
    Package(Package),
}

impl Named {
    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Self::Class(id) => Some(*id),
            Self::Package(_) => None,
        }
    }

    pub fn into_type(self) -> Type {
        match self {
            Self::Class(id) => Type::Class(id),
            Self::Package(p) => Type::Package(p),
        }
    }
}

// ==================== Name Helpers ====================

/// Last dotted component of a name
pub fn short_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, short)| short)
}

/// Everything before the last dot
pub fn container_name(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(container, _)| container)
}

pub fn is_short_name(name: &str) -> bool {
    !name.contains('.')
}

/// Split a written type such as `java.lang.String[][]` into base and dimensions
pub fn split_array_dims(name: &str) -> (&str, usize) {
    let mut base = name.trim();
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
        dims += 1;
    }
    (base, dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical() {
        assert!(Type::array_of(Type::int()).is_canonical());
        assert!(!Type::array_of(Type::Unknown("Foo".into())).is_canonical());
        assert!(Type::Null.is_reference());
        assert!(!Type::int().is_reference());
    }

    #[test]
    fn test_names() {
        assert_eq!(short_name("a.b.C"), "C");
        assert_eq!(container_name("a.b.C"), Some("a.b"));
        assert_eq!(container_name("C"), None);
        assert_eq!(Package::new("a.b").prefix(), Some(Package::new("a")));
        assert_eq!(split_array_dims("String [] []"), ("String", 2));
    }

    #[test]
    fn test_primitive_lookup() {
        for p in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_name(p.name()), Some(p));
            assert_eq!(PrimitiveKind::from_descriptor(p.descriptor()), Some(p));
        }
    }
}
