//! Member instances
//!
//! Fields, methods, constructors, initializers and local variables are
//! immutable values. Updates go through `with_*` and return a new instance.
//! Equality and hashing cover container, flags and signature; the source
//! position does not take part.

use std::hash::{Hash, Hasher};

use crate::types::{Flags, Type};
use crate::utils::Position;

/// Shared view of anything declared inside a reference type
pub trait MemberInstance {
    /// The declaring reference type
    fn container(&self) -> &Type;
    fn flags(&self) -> Flags;
    fn position(&self) -> Option<&Position>;
    /// All types in the signature are canonical
    fn is_canonical(&self) -> bool;
}

/// Methods and constructors
pub trait ProcedureInstance: MemberInstance + Clone {
    fn formal_types(&self) -> &[Type];
    fn throw_types(&self) -> &[Type];
    /// Name used in diagnostics
    fn designator(&self) -> &str;

    /// Same formal types, in order
    fn has_formals(&self, formals: &[Type]) -> bool {
        self.formal_types() == formals
    }
}

fn all_canonical(types: &[Type]) -> bool {
    types.iter().all(Type::is_canonical)
}

// ==================== Fields ====================

#[derive(Debug, Clone)]
pub struct FieldInstance {
    container: Type,
    flags: Flags,
    ty: Type,
    name: String,
    position: Option<Position>,
}

impl FieldInstance {
    pub fn new(container: Type, flags: Flags, ty: Type, name: impl Into<String>) -> Self {
        Self { container, flags, ty, name: name.into(), position: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn with_container(&self, container: Type) -> Self {
        Self { container, ..self.clone() }
    }

    pub fn with_flags(&self, flags: Flags) -> Self {
        Self { flags, ..self.clone() }
    }

    pub fn with_type(&self, ty: Type) -> Self {
        Self { ty, ..self.clone() }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }

    pub fn with_position(&self, position: Option<Position>) -> Self {
        Self { position, ..self.clone() }
    }
}

impl MemberInstance for FieldInstance {
    fn container(&self) -> &Type {
        &self.container
    }

    fn flags(&self) -> Flags {
        self.flags
    }

    fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    fn is_canonical(&self) -> bool {
        self.container.is_canonical() && self.ty.is_canonical()
    }
}

impl PartialEq for FieldInstance {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
            && self.flags == other.flags
            && self.ty == other.ty
            && self.name == other.name
    }
}

impl Eq for FieldInstance {}

impl Hash for FieldInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.flags.hash(state);
        self.ty.hash(state);
        self.name.hash(state);
    }
}

// ==================== Methods ====================

#[derive(Debug, Clone)]
pub struct MethodInstance {
    container: Type,
    flags: Flags,
    return_type: Type,
    name: String,
    formals: Vec<Type>,
    throws: Vec<Type>,
    position: Option<Position>,
}

impl MethodInstance {
    pub fn new(
        container: Type,
        flags: Flags,
        return_type: Type,
        name: impl Into<String>,
        formals: Vec<Type>,
        throws: Vec<Type>,
    ) -> Self {
        Self {
            container,
            flags,
            return_type,
            name: name.into(),
            formals,
            throws,
            position: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn with_container(&self, container: Type) -> Self {
        Self { container, ..self.clone() }
    }

    pub fn with_flags(&self, flags: Flags) -> Self {
        Self { flags, ..self.clone() }
    }

    pub fn with_return_type(&self, return_type: Type) -> Self {
        Self { return_type, ..self.clone() }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }

    pub fn with_formals(&self, formals: Vec<Type>) -> Self {
        Self { formals, ..self.clone() }
    }

    pub fn with_throws(&self, throws: Vec<Type>) -> Self {
        Self { throws, ..self.clone() }
    }

    pub fn with_position(&self, position: Option<Position>) -> Self {
        Self { position, ..self.clone() }
    }

    /// Same name and formal types
    pub fn is_same_method(&self, other: &MethodInstance) -> bool {
        self.name == other.name && self.formals == other.formals
    }
}

impl MemberInstance for MethodInstance {
    fn container(&self) -> &Type {
        &self.container
    }

    fn flags(&self) -> Flags {
        self.flags
    }

    fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    fn is_canonical(&self) -> bool {
        self.container.is_canonical()
            && self.return_type.is_canonical()
            && all_canonical(&self.formals)
            && all_canonical(&self.throws)
    }
}

impl ProcedureInstance for MethodInstance {
    fn formal_types(&self) -> &[Type] {
        &self.formals
    }

    fn throw_types(&self) -> &[Type] {
        &self.throws
    }

    fn designator(&self) -> &str {
        &self.name
    }
}

impl PartialEq for MethodInstance {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
            && self.flags == other.flags
            && self.return_type == other.return_type
            && self.name == other.name
            && self.formals == other.formals
            && self.throws == other.throws
    }
}

impl Eq for MethodInstance {}

impl Hash for MethodInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.flags.hash(state);
        self.return_type.hash(state);
        self.name.hash(state);
        self.formals.hash(state);
        self.throws.hash(state);
    }
}

// ==================== Constructors ====================

#[derive(Debug, Clone)]
pub struct ConstructorInstance {
    container: Type,
    flags: Flags,
    formals: Vec<Type>,
    throws: Vec<Type>,
    position: Option<Position>,
    /// Simple name of the declaring class, for diagnostics
    class_name: String,
}

impl ConstructorInstance {
    pub fn new(
        container: Type,
        class_name: impl Into<String>,
        flags: Flags,
        formals: Vec<Type>,
        throws: Vec<Type>,
    ) -> Self {
        Self {
            container,
            flags,
            formals,
            throws,
            position: None,
            class_name: class_name.into(),
        }
    }

    pub fn with_flags(&self, flags: Flags) -> Self {
        Self { flags, ..self.clone() }
    }

    pub fn with_formals(&self, formals: Vec<Type>) -> Self {
        Self { formals, ..self.clone() }
    }

    pub fn with_throws(&self, throws: Vec<Type>) -> Self {
        Self { throws, ..self.clone() }
    }

    pub fn with_position(&self, position: Option<Position>) -> Self {
        Self { position, ..self.clone() }
    }
}

impl MemberInstance for ConstructorInstance {
    fn container(&self) -> &Type {
        &self.container
    }

    fn flags(&self) -> Flags {
        self.flags
    }

    fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    fn is_canonical(&self) -> bool {
        self.container.is_canonical() && all_canonical(&self.formals) && all_canonical(&self.throws)
    }
}

impl ProcedureInstance for ConstructorInstance {
    fn formal_types(&self) -> &[Type] {
        &self.formals
    }

    fn throw_types(&self) -> &[Type] {
        &self.throws
    }

    fn designator(&self) -> &str {
        &self.class_name
    }
}

impl PartialEq for ConstructorInstance {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
            && self.flags == other.flags
            && self.formals == other.formals
            && self.throws == other.throws
    }
}

impl Eq for ConstructorInstance {}

impl Hash for ConstructorInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.flags.hash(state);
        self.formals.hash(state);
        self.throws.hash(state);
    }
}

// ==================== Initializers & Locals ====================

/// A static or instance initializer block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InitializerInstance {
    pub container: Type,
    pub flags: Flags,
}

/// A local variable or formal parameter
#[derive(Debug, Clone)]
pub struct LocalInstance {
    flags: Flags,
    ty: Type,
    name: String,
    position: Option<Position>,
}

impl LocalInstance {
    pub fn new(flags: Flags, ty: Type, name: impl Into<String>) -> Self {
        Self { flags, ty, name: name.into(), position: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn with_type(&self, ty: Type) -> Self {
        Self { ty, ..self.clone() }
    }

    pub fn with_position(&self, position: Option<Position>) -> Self {
        Self { position, ..self.clone() }
    }
}

impl PartialEq for LocalInstance {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags && self.ty == other.ty && self.name == other.name
    }
}

impl Eq for LocalInstance {}

/// Anything a simple name in an expression can denote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarInstance {
    Local(LocalInstance),
    Field(FieldInstance),
}

impl VarInstance {
    pub fn name(&self) -> &str {
        match self {
            Self::Local(li) => li.name(),
            Self::Field(fi) => fi.name(),
        }
    }

    pub fn ty(&self) -> &Type {
        match self {
            Self::Local(li) => li.ty(),
            Self::Field(fi) => fi.ty(),
        }
    }
}

/// The body-bearing member a code frame belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeInstance {
    Method(MethodInstance),
    Constructor(ConstructorInstance),
    Initializer(InitializerInstance),
}

impl CodeInstance {
    pub fn flags(&self) -> Flags {
        match self {
            Self::Method(mi) => mi.flags(),
            Self::Constructor(ci) => ci.flags(),
            Self::Initializer(ii) => ii.flags,
        }
    }

    pub fn container(&self) -> &Type {
        match self {
            Self::Method(mi) => mi.container(),
            Self::Constructor(ci) => ci.container(),
            Self::Initializer(ii) => &ii.container,
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags().is_static()
    }
}
