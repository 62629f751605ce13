//! Class shells
//!
//! - `ClassKind`: top-level, member, local or anonymous, with the enclosing class
//! - `Stage`/`Stages`: the monotonic completion state machine
//! - `ClassData`: one arena slot, populated in place as stages complete
//! - `ClassBuilder`: direct construction of fully populated classes

use std::fmt;
use std::rc::Rc;

use crate::context::ScopeId;
use crate::frontend::scheduler::JobId;
use crate::types::initializer::{DeserializedClassInitializer, LazyClassInitializer};
use crate::types::{
    ClassId, ConstructorInstance, FieldInstance, Flags, InitializerInstance, MethodInstance, Package, Type,
    TypeSystem,
};
use crate::utils::Position;

/// How a class is nested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    TopLevel,
    Member { outer: ClassId },
    Local { outer: ClassId, scope: Option<ScopeId> },
    Anonymous { outer: ClassId },
}

impl ClassKind {
    /// The lexically enclosing class
    pub fn outer(&self) -> Option<ClassId> {
        match *self {
            Self::TopLevel => None,
            Self::Member { outer } | Self::Local { outer, .. } | Self::Anonymous { outer } => Some(outer),
        }
    }

    pub fn is_top_level(&self) -> bool {
        matches!(self, Self::TopLevel)
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member { .. })
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }

    pub fn is_nested(&self) -> bool {
        !self.is_top_level()
    }
}

// ==================== Completion Stages ====================

/// A completion stage of a class shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Supertype and interfaces are set
    SupertypesResolved,
    /// Member lists exist, possibly with non-canonical signatures
    MembersAdded,
    /// Every member signature is canonical
    SignaturesResolved,
    /// Members of this class and all of its supertypes are complete
    AllMembersAdded,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Self::SupertypesResolved,
        Self::MembersAdded,
        Self::SignaturesResolved,
        Self::AllMembersAdded,
    ];

    /// Stages of the same class that must complete first
    pub fn prerequisites(self) -> &'static [Stage] {
        match self {
            Self::SupertypesResolved | Self::MembersAdded => &[],
            Self::SignaturesResolved => &[Self::MembersAdded],
            Self::AllMembersAdded => &[Self::SupertypesResolved, Self::SignaturesResolved],
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SupertypesResolved => "SupertypesResolved",
            Self::MembersAdded => "MembersAdded",
            Self::SignaturesResolved => "SignaturesResolved",
            Self::AllMembersAdded => "AllMembersAdded",
        })
    }
}

/// Set of completed stages; bits are only ever added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stages(u8);

impl Stages {
    pub fn complete() -> Self {
        Stage::ALL.iter().fold(Stages::default(), |s, stage| s.with(*stage))
    }

    pub fn contains(self, stage: Stage) -> bool {
        self.0 & stage.bit() != 0
    }

    pub fn with(self, stage: Stage) -> Self {
        Stages(self.0 | stage.bit())
    }

    pub fn is_complete(self) -> bool {
        self == Self::complete()
    }
}

// ==================== Class Data ====================

/// One class in the arena
#[derive(Debug, Clone)]
pub struct ClassData {
    /// Simple name; empty for anonymous classes
    pub name: String,
    pub package: Option<Package>,
    pub kind: ClassKind,
    pub flags: Flags,
    pub position: Option<Position>,
    /// Name of the class file this class was loaded from
    pub binary_name: Option<String>,
    /// Local or anonymous class declared in a static context
    pub in_static_context: bool,
    pub super_type: Option<Type>,
    pub interfaces: Vec<Type>,
    pub member_classes: Vec<ClassId>,
    pub fields: Vec<FieldInstance>,
    pub methods: Vec<MethodInstance>,
    pub constructors: Vec<ConstructorInstance>,
    pub initializers: Vec<InitializerInstance>,
    /// Job producing this class from source, if any
    pub job: Option<JobId>,
    pub(crate) stages: Stages,
    pub(crate) initializer: Option<Rc<dyn LazyClassInitializer>>,
}

impl ClassData {
    /// An empty shell guarded by `initializer`
    pub fn shell(
        name: impl Into<String>,
        package: Option<Package>,
        kind: ClassKind,
        flags: Flags,
        initializer: Rc<dyn LazyClassInitializer>,
    ) -> Self {
        Self {
            name: name.into(),
            package,
            kind,
            flags,
            position: None,
            binary_name: None,
            in_static_context: false,
            super_type: None,
            interfaces: Vec::new(),
            member_classes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            initializers: Vec::new(),
            job: None,
            stages: Stages::default(),
            initializer: Some(initializer),
        }
    }

    pub fn stages(&self) -> Stages {
        self.stages
    }

    /// All member signatures are canonical
    pub fn signatures_canonical(&self) -> bool {
        use crate::types::MemberInstance;
        self.fields.iter().all(|f| f.is_canonical())
            && self.methods.iter().all(|m| m.is_canonical())
            && self.constructors.iter().all(|c| c.is_canonical())
    }
}

// ==================== Builder ====================

/// Builds a fully populated class directly, bypassing resolution
pub struct ClassBuilder {
    name: String,
    package: Option<Package>,
    kind: ClassKind,
    flags: Flags,
    position: Option<Position>,
    super_type: Option<Type>,
    interfaces: Vec<Type>,
    fields: Vec<(Flags, Type, String)>,
    methods: Vec<(Flags, Type, String, Vec<Type>, Vec<Type>)>,
    constructors: Vec<(Flags, Vec<Type>)>,
    in_static_context: bool,
}

impl ClassBuilder {
    /// A top-level class from its full name
    pub fn new(full_name: &str) -> Self {
        let (package, name) = match full_name.rsplit_once('.') {
            Some((package, name)) => (Some(Package::new(package)), name),
            None => (None, full_name),
        };
        Self {
            name: name.to_string(),
            package,
            kind: ClassKind::TopLevel,
            flags: Flags::NONE,
            position: None,
            super_type: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            in_static_context: false,
        }
    }

    /// A member class of `outer`
    pub fn member(ts: &TypeSystem, outer: ClassId, name: &str) -> Self {
        Self::nested(ts, ClassKind::Member { outer }, name)
    }

    /// A local class declared in a method of `outer`
    pub fn local(ts: &TypeSystem, outer: ClassId, name: &str) -> Self {
        Self::nested(ts, ClassKind::Local { outer, scope: None }, name)
    }

    pub fn anonymous(ts: &TypeSystem, outer: ClassId) -> Self {
        Self::nested(ts, ClassKind::Anonymous { outer }, "")
    }

    fn nested(ts: &TypeSystem, kind: ClassKind, name: &str) -> Self {
        let mut builder = Self::new(name);
        builder.package = kind.outer().and_then(|outer| ts.package(outer));
        builder.kind = kind;
        builder
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn static_context(mut self) -> Self {
        self.in_static_context = true;
        self
    }

    pub fn extends(mut self, super_type: impl Into<Type>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<Type>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn field(mut self, flags: Flags, ty: impl Into<Type>, name: &str) -> Self {
        self.fields.push((flags, ty.into(), name.to_string()));
        self
    }

    pub fn method(mut self, flags: Flags, ret: impl Into<Type>, name: &str, formals: Vec<Type>) -> Self {
        self.methods.push((flags, ret.into(), name.to_string(), formals, Vec::new()));
        self
    }

    pub fn throwing_method(
        mut self,
        flags: Flags,
        ret: impl Into<Type>,
        name: &str,
        formals: Vec<Type>,
        throws: Vec<Type>,
    ) -> Self {
        self.methods.push((flags, ret.into(), name.to_string(), formals, throws));
        self
    }

    pub fn constructor(mut self, flags: Flags, formals: Vec<Type>) -> Self {
        self.constructors.push((flags, formals));
        self
    }

    /// Allocate the class; member classes register with their outer class
    pub fn build(self, ts: &TypeSystem) -> ClassId {
        let initializer: Rc<dyn LazyClassInitializer> = Rc::new(DeserializedClassInitializer);
        let mut data = ClassData::shell(self.name, self.package, self.kind, self.flags, initializer);
        data.position = self.position;
        data.in_static_context = self.in_static_context;
        let id = ts.add_class(data);
        let this = Type::Class(id);
        let class_name = ts.class_name(id);

        let fields = self
            .fields
            .into_iter()
            .map(|(flags, ty, name)| FieldInstance::new(this.clone(), flags, ty, name))
            .collect();
        let methods = self
            .methods
            .into_iter()
            .map(|(flags, ret, name, formals, throws)| {
                MethodInstance::new(this.clone(), flags, ret, name, formals, throws)
            })
            .collect();
        let constructors = self
            .constructors
            .into_iter()
            .map(|(flags, formals)| ConstructorInstance::new(this.clone(), class_name.clone(), flags, formals, vec![]))
            .collect();
        ts.update_class(id, |c| {
            c.super_type = self.super_type;
            c.interfaces = self.interfaces;
            c.fields = fields;
            c.methods = methods;
            c.constructors = constructors;
        });
        if let ClassKind::Member { outer } = self.kind {
            ts.update_class(outer, |c| c.member_classes.push(id));
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_monotonic() {
        let s = Stages::default().with(Stage::MembersAdded);
        assert!(s.contains(Stage::MembersAdded));
        assert!(!s.contains(Stage::SignaturesResolved));
        let t = s.with(Stage::MembersAdded);
        assert_eq!(s, t);
        assert!(Stages::complete().is_complete());
        assert!(!t.is_complete());
    }

    #[test]
    fn test_stage_prerequisites() {
        assert_eq!(Stage::SignaturesResolved.prerequisites(), &[Stage::MembersAdded]);
        assert!(Stage::MembersAdded.prerequisites().is_empty());
    }

    #[test]
    fn test_kind_outer() {
        let outer = ClassId(3);
        assert_eq!(ClassKind::Member { outer }.outer(), Some(outer));
        assert_eq!(ClassKind::TopLevel.outer(), None);
        assert!(ClassKind::Anonymous { outer }.is_nested());
    }
}
