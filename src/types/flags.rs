//! Modifier flags
//!
//! An immutable set over a fixed, ordered vocabulary. Bit values follow the
//! class-file access flags so raw modifiers convert directly. Package access
//! is the absence of all three access flags.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{Error, Position, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Flags(u16);

/// Printing order and keyword of every flag
const VOCABULARY: [(Flags, &str); 12] = [
    (Flags::PUBLIC, "public"),
    (Flags::PRIVATE, "private"),
    (Flags::PROTECTED, "protected"),
    (Flags::STATIC, "static"),
    (Flags::FINAL, "final"),
    (Flags::SYNCHRONIZED, "synchronized"),
    (Flags::TRANSIENT, "transient"),
    (Flags::NATIVE, "native"),
    (Flags::INTERFACE, "interface"),
    (Flags::ABSTRACT, "abstract"),
    (Flags::VOLATILE, "volatile"),
    (Flags::STRICTFP, "strictfp"),
];

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const PUBLIC: Flags = Flags(0x0001);
    pub const PRIVATE: Flags = Flags(0x0002);
    pub const PROTECTED: Flags = Flags(0x0004);
    pub const STATIC: Flags = Flags(0x0008);
    pub const FINAL: Flags = Flags(0x0010);
    pub const SYNCHRONIZED: Flags = Flags(0x0020);
    pub const VOLATILE: Flags = Flags(0x0040);
    pub const TRANSIENT: Flags = Flags(0x0080);
    pub const NATIVE: Flags = Flags(0x0100);
    pub const INTERFACE: Flags = Flags(0x0200);
    pub const ABSTRACT: Flags = Flags(0x0400);
    pub const STRICTFP: Flags = Flags(0x0800);

    /// Class-file bits that keep their meaning on classes (0x0020 is ACC_SUPER)
    const CLASS_BITS: u16 = 0x0001 | 0x0002 | 0x0004 | 0x0008 | 0x0010 | 0x0200 | 0x0400;
    const FIELD_BITS: u16 = 0x0001 | 0x0002 | 0x0004 | 0x0008 | 0x0010 | 0x0040 | 0x0080;
    /// 0x0040 and 0x0080 are ACC_BRIDGE and ACC_VARARGS on methods
    const METHOD_BITS: u16 = 0x0001 | 0x0002 | 0x0004 | 0x0008 | 0x0010 | 0x0020 | 0x0100 | 0x0400 | 0x0800;

    /// Flags from the access bits of a class or inner-class entry
    pub fn from_class_bits(bits: u16) -> Self {
        Flags(bits & Self::CLASS_BITS)
    }

    pub fn from_field_bits(bits: u16) -> Self {
        Flags(bits & Self::FIELD_BITS)
    }

    /// Flags from the access bits of a method or constructor
    pub fn from_method_bits(bits: u16) -> Self {
        Flags(bits & Self::METHOD_BITS)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union
    pub fn set(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }

    /// Remove `other`
    pub fn clear(self, other: Flags) -> Flags {
        Flags(self.0 & !other.0)
    }

    /// Intersection
    pub fn retain(self, other: Flags) -> Flags {
        Flags(self.0 & other.0)
    }

    /// All of `other` are present
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    /// No access flag at all
    pub fn is_package(self) -> bool {
        !self.intersects(Self::ACCESS)
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    pub fn is_native(self) -> bool {
        self.contains(Self::NATIVE)
    }

    /// Only the access flags
    pub fn access(self) -> Flags {
        self.retain(Self::ACCESS)
    }

    fn keywords(self) -> impl Iterator<Item = &'static str> {
        VOCABULARY
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }

    fn from_keyword(word: &str) -> Option<Flags> {
        VOCABULARY.iter().find(|(_, name)| *name == word).map(|(flag, _)| *flag)
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.set(rhs)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<_> = self.keywords().collect();
        f.write_str(&words.join(" "))
    }
}

impl TryFrom<Vec<String>> for Flags {
    type Error = String;

    fn try_from(words: Vec<String>) -> std::result::Result<Self, Self::Error> {
        words.iter().try_fold(Flags::NONE, |acc, word| {
            Flags::from_keyword(word)
                .map(|flag| acc.set(flag))
                .ok_or_else(|| format!("unknown flag \"{}\"", word))
        })
    }
}

impl From<Flags> for Vec<String> {
    fn from(flags: Flags) -> Self {
        flags.keywords().map(String::from).collect()
    }
}

// ==================== Legal Flag Sets ====================

impl Flags {
    pub const ACCESS: Flags = Flags(0x0007);
    pub const TOP_LEVEL_CLASS: Flags =
        Flags(Self::PUBLIC.0 | Self::ABSTRACT.0 | Self::FINAL.0 | Self::STRICTFP.0 | Self::INTERFACE.0);
    pub const MEMBER_CLASS: Flags = Flags(
        Self::ACCESS.0 | Self::ABSTRACT.0 | Self::FINAL.0 | Self::STATIC.0 | Self::STRICTFP.0 | Self::INTERFACE.0,
    );
    pub const LOCAL_CLASS: Flags = Flags(Self::ABSTRACT.0 | Self::FINAL.0 | Self::STRICTFP.0);
    pub const INTERFACE_MEMBER: Flags = Flags(Self::ACCESS.0 | Self::ABSTRACT.0 | Self::INTERFACE.0 | Self::STATIC.0);
    pub const FIELD: Flags =
        Flags(Self::ACCESS.0 | Self::STATIC.0 | Self::FINAL.0 | Self::TRANSIENT.0 | Self::VOLATILE.0);
    pub const CONSTRUCTOR: Flags = Self::ACCESS;
    pub const INITIALIZER: Flags = Self::STATIC;
    pub const METHOD: Flags = Flags(
        Self::ACCESS.0
            | Self::ABSTRACT.0
            | Self::STATIC.0
            | Self::FINAL.0
            | Self::NATIVE.0
            | Self::SYNCHRONIZED.0
            | Self::STRICTFP.0,
    );
    pub const ABSTRACT_METHOD: Flags = Flags(Self::ACCESS.0 | Self::ABSTRACT.0);
    pub const LOCAL_VARIABLE: Flags = Self::FINAL;
}

fn reject_illegal(flags: Flags, legal: Flags, what: &str, position: &Option<Position>) -> Result<()> {
    let illegal = flags.clear(legal);
    if illegal.is_empty() {
        return Ok(());
    }
    Err(Error::InvalidFlags {
        message: format!("Cannot declare {} with flags {}.", what, illegal),
        position: position.clone(),
    })
}

/// At most one of public, private and protected
pub fn check_access_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    if flags.access().bits().count_ones() > 1 {
        return Err(Error::InvalidFlags {
            message: "Only one of \"public\", \"private\" or \"protected\" may be specified.".into(),
            position: position.clone(),
        });
    }
    Ok(())
}

pub fn check_top_level_class_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::TOP_LEVEL_CLASS, "a top-level class", position)?;
    check_access_flags(flags, position)
}

pub fn check_member_class_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::MEMBER_CLASS, "a member class", position)?;
    check_access_flags(flags, position)
}

pub fn check_local_class_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    if flags.is_interface() {
        return Err(Error::InvalidFlags {
            message: "Cannot declare a local interface.".into(),
            position: position.clone(),
        });
    }
    reject_illegal(flags, Flags::LOCAL_CLASS, "a local class", position)
}

pub fn check_field_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::FIELD, "a field", position)?;
    check_access_flags(flags, position)
}

pub fn check_constructor_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::CONSTRUCTOR, "a constructor", position)?;
    check_access_flags(flags, position)
}

pub fn check_initializer_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::INITIALIZER, "an initializer block", position)
}

pub fn check_method_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::METHOD, "a method", position)?;
    if flags.is_abstract() {
        reject_illegal(flags, Flags::ABSTRACT_METHOD, "an abstract method", position)?;
    }
    check_access_flags(flags, position)
}

pub fn check_local_variable_flags(flags: Flags, position: &Option<Position>) -> Result<()> {
    reject_illegal(flags, Flags::LOCAL_VARIABLE, "a local variable", position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ordered_display() {
        let flags = Flags::FINAL | Flags::STATIC | Flags::PUBLIC;
        assert_eq!(flags.to_string(), "public static final");
        assert_eq!(Flags::NONE.to_string(), "");
    }

    #[test]
    fn test_set_operations() {
        let flags = Flags::PUBLIC | Flags::STATIC;
        assert!(flags.contains(Flags::STATIC));
        assert!(!flags.clear(Flags::STATIC).is_static());
        assert_eq!(flags.retain(Flags::ACCESS), Flags::PUBLIC);
        assert!(flags.intersects(Flags::ACCESS));
        assert!(Flags::STATIC.is_package());
    }

    #[test]
    fn test_serde_keywords() {
        let flags: Flags = serde_json::from_str(r#"["abstract", "public"]"#).unwrap();
        assert_eq!(flags, Flags::PUBLIC | Flags::ABSTRACT);
        assert_eq!(serde_json::to_string(&flags).unwrap(), r#"["public","abstract"]"#);
        assert!(serde_json::from_str::<Flags>(r#"["sealed"]"#).is_err());
    }

    #[test]
    fn test_access_bits() {
        assert_eq!(Flags::from_class_bits(0x0411), Flags::PUBLIC | Flags::FINAL | Flags::ABSTRACT);
        assert_eq!(Flags::from_class_bits(0x1001), Flags::PUBLIC);
        // ACC_SUPER on a class, ACC_BRIDGE and ACC_VARARGS on a method
        assert_eq!(Flags::from_class_bits(0x0021), Flags::PUBLIC);
        assert_eq!(Flags::from_method_bits(0x00e1), Flags::PUBLIC | Flags::SYNCHRONIZED);
        assert_eq!(Flags::from_method_bits(0x0109), Flags::PUBLIC | Flags::STATIC | Flags::NATIVE);
        assert_eq!(Flags::from_field_bits(0x00c2), Flags::PRIVATE | Flags::VOLATILE | Flags::TRANSIENT);
        assert_eq!(Flags::from_field_bits(0x1021), Flags::PUBLIC);
    }

    #[test]
    fn test_checks() {
        assert!(check_access_flags(Flags::PUBLIC | Flags::PRIVATE, &None).is_err());
        assert!(check_top_level_class_flags(Flags::PUBLIC | Flags::FINAL, &None).is_ok());
        assert!(check_top_level_class_flags(Flags::PRIVATE, &None).is_err());
        assert!(check_member_class_flags(Flags::PRIVATE | Flags::STATIC, &None).is_ok());
        assert!(check_local_class_flags(Flags::INTERFACE, &None).is_err());
        assert!(check_method_flags(Flags::ABSTRACT | Flags::FINAL, &None).is_err());
        assert!(check_method_flags(Flags::PUBLIC | Flags::ABSTRACT, &None).is_ok());
        assert!(check_field_flags(Flags::SYNCHRONIZED, &None).is_err());
        assert!(check_local_variable_flags(Flags::FINAL, &None).is_ok());
    }
}
