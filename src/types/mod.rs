//! Type system
//!
//! The `TypeSystem` owns the class arena, the system resolver and the
//! scheduler handle. Class shells are mutated in place through short
//! `RefCell` borrows; no borrow is held across a call that can re-enter
//! resolution or initialization.

mod type_system;
mod flags;
mod class_type;
mod members;
pub mod initializer;
mod algebra;
mod access;
mod lookup;

pub use type_system::{
    container_name, is_short_name, short_name, split_array_dims, ClassId, Named, Package, PrimitiveKind, Type,
};
pub use flags::{
    check_access_flags, check_constructor_flags, check_field_flags, check_initializer_flags,
    check_local_class_flags, check_local_variable_flags, check_member_class_flags, check_method_flags,
    check_top_level_class_flags, Flags,
};
pub use class_type::{ClassBuilder, ClassData, ClassKind, Stage, Stages};
pub use members::{
    CodeInstance, ConstructorInstance, FieldInstance, InitializerInstance, LocalInstance, MemberInstance,
    MethodInstance, ProcedureInstance, VarInstance,
};
pub use initializer::LazyClassInitializer;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::TypeSystemConfig;
use crate::frontend::scheduler::Scheduler;
use crate::resolve::{CachingResolver, ClassContextResolver, Resolver, SystemResolver, TopLevelResolver};
use crate::utils::{Error, Position, Result};

/// The type system for one compilation session
pub struct TypeSystem {
    config: TypeSystemConfig,
    classes: RefCell<Vec<ClassData>>,
    system: SystemResolver,
    scheduler: Rc<dyn Scheduler>,
    root: Cell<Option<ClassId>>,
    member_resolvers: RefCell<HashMap<ClassId, Rc<CachingResolver>>>,
}

impl TypeSystem {
    pub fn new(config: TypeSystemConfig, resolver: Rc<dyn TopLevelResolver>, scheduler: Rc<dyn Scheduler>) -> Self {
        let system = SystemResolver::new(resolver, config.cache_not_found);
        Self {
            config,
            classes: RefCell::new(Vec::new()),
            system,
            scheduler,
            root: Cell::new(None),
            member_resolvers: RefCell::new(HashMap::new()),
        }
    }

    /// Member-class resolver of a class, memoizing hits
    pub fn member_class_resolver(&self, id: ClassId) -> Rc<CachingResolver> {
        let mut resolvers = self.member_resolvers.borrow_mut();
        let resolver = resolvers
            .entry(id)
            .or_insert_with(|| Rc::new(CachingResolver::new(Rc::new(ClassContextResolver::new(id)), false)));
        Rc::clone(resolver)
    }

    pub fn config(&self) -> &TypeSystemConfig {
        &self.config
    }

    /// The process-wide system resolver
    pub fn system(&self) -> &SystemResolver {
        &self.system
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::clone(&self.scheduler)
    }

    // ==================== Arena ====================

    /// Allocate a new class
    pub fn add_class(&self, data: ClassData) -> ClassId {
        let mut classes = self.classes.borrow_mut();
        let id = ClassId(classes.len() as u32);
        log::debug!("new class {} {}", id, data.name);
        classes.push(data);
        id
    }

    pub fn class_count(&self) -> usize {
        self.classes.borrow().len()
    }

    /// Read class data without triggering initialization
    pub fn with_class<R>(&self, id: ClassId, f: impl FnOnce(&ClassData) -> R) -> R {
        f(&self.classes.borrow()[id.index()])
    }

    /// Mutate class data in place
    pub fn update_class<R>(&self, id: ClassId, f: impl FnOnce(&mut ClassData) -> R) -> R {
        f(&mut self.classes.borrow_mut()[id.index()])
    }

    pub fn class_name(&self, id: ClassId) -> String {
        self.with_class(id, |c| c.name.clone())
    }

    pub fn kind(&self, id: ClassId) -> ClassKind {
        self.with_class(id, |c| c.kind)
    }

    pub fn flags(&self, id: ClassId) -> Flags {
        self.with_class(id, |c| c.flags)
    }

    pub fn package(&self, id: ClassId) -> Option<Package> {
        self.with_class(id, |c| c.package.clone())
    }

    pub fn position(&self, id: ClassId) -> Option<Position> {
        self.with_class(id, |c| c.position.clone())
    }

    pub fn outer(&self, id: ClassId) -> Option<ClassId> {
        self.kind(id).outer()
    }

    pub fn is_interface(&self, id: ClassId) -> bool {
        self.flags(id).is_interface()
    }

    /// Enclosing classes, innermost first
    pub fn outers(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = self.outer(id);
        while let Some(outer) = current {
            chain.push(outer);
            current = self.outer(outer);
        }
        chain
    }

    pub fn top_level_of(&self, id: ClassId) -> ClassId {
        self.outers(id).last().copied().unwrap_or(id)
    }

    /// Qualified source name: `p.C.I` for members, the simple name for locals
    pub fn full_name(&self, id: ClassId) -> String {
        let (name, package, kind) = self.with_class(id, |c| (c.name.clone(), c.package.clone(), c.kind));
        match kind {
            ClassKind::TopLevel => match package {
                Some(p) => format!("{}.{}", p.full_name(), name),
                None => name,
            },
            ClassKind::Member { outer } => format!("{}.{}", self.full_name(outer), name),
            ClassKind::Local { .. } => name,
            ClassKind::Anonymous { outer } => format!("<anonymous subclass in {}>", self.full_name(outer)),
        }
    }

    /// Binary name: `p.C$I` for members, `None` for local and anonymous classes
    pub fn transformed_class_name(&self, id: ClassId) -> Option<String> {
        if let Some(binary) = self.with_class(id, |c| c.binary_name.clone()) {
            return Some(binary);
        }
        match self.kind(id) {
            ClassKind::TopLevel => Some(self.full_name(id)),
            ClassKind::Member { outer } => {
                Some(format!("{}${}", self.transformed_class_name(outer)?, self.class_name(id)))
            }
            ClassKind::Local { .. } | ClassKind::Anonymous { .. } => None,
        }
    }

    /// Printable name of any type
    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Primitive(p) => p.name().to_string(),
            Type::Null => "null".to_string(),
            Type::Array(base) => format!("{}[]", self.type_name(base)),
            Type::Class(id) => self.full_name(*id),
            Type::Package(p) => p.full_name().to_string(),
            Type::Unknown(name) => name.clone(),
        }
    }

    pub fn type_names(&self, types: &[Type]) -> Vec<String> {
        types.iter().map(|t| self.type_name(t)).collect()
    }

    // ==================== Well-Known Classes ====================

    /// Whether `id` is the universal root class
    pub fn is_root(&self, id: ClassId) -> bool {
        if let Some(root) = self.root.get() {
            return root == id;
        }
        self.kind(id).is_top_level() && self.full_name(id) == self.config.root_class
    }

    /// The universal root class
    pub fn object(&self) -> Result<ClassId> {
        if let Some(root) = self.root.get() {
            return Ok(root);
        }
        let id = self.class_for_name(&self.config.root_class)?;
        self.root.set(Some(id));
        Ok(id)
    }

    pub fn object_type(&self) -> Result<Type> {
        self.object().map(Type::Class)
    }

    /// Resolve a fully qualified name to a class through the system resolver
    ///
    /// A name such as `p.C.I` that is not installed is tried as member class
    /// `I` of `p.C`.
    pub fn class_for_name(&self, name: &str) -> Result<ClassId> {
        match self.system.find(self, name) {
            Ok(Named::Class(id)) => Ok(id),
            Ok(Named::Package(_)) => Err(Error::semantic(format!("\"{}\" is a package, not a class.", name), None)),
            Err(e) if e.is_not_found_for(name) => match container_name(name) {
                Some(container) => match self.member_class_for_name(container, short_name(name)) {
                    Ok(id) => Ok(id),
                    Err(inner) if inner.is_missing_dependency() => Err(inner),
                    Err(_) => Err(e),
                },
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    fn member_class_for_name(&self, container: &str, name: &str) -> Result<ClassId> {
        match self.system.find(self, container)? {
            Named::Class(outer) => self.find_member_class(outer, name, None),
            Named::Package(_) => Err(Error::not_found(name)),
        }
    }

    /// Resolve a written type name (`int`, `p.C[]`) through the system resolver
    pub fn type_for_name(&self, name: &str) -> Result<Type> {
        let (base, dims) = split_array_dims(name);
        let base_type = match base {
            "null" => Type::Null,
            _ => match PrimitiveKind::from_name(base) {
                Some(p) => Type::Primitive(p),
                None => Type::Class(self.class_for_name(base)?),
            },
        };
        Ok(Type::array_of_dims(base_type, dims))
    }

    // ==================== Stage Gates ====================

    pub fn has_stage(&self, id: ClassId, stage: Stage) -> bool {
        self.with_class(id, |c| c.stages.contains(stage))
    }

    /// Flip a stage to complete; the initializer is released once all are
    pub fn mark_stage(&self, id: ClassId, stage: Stage) {
        self.update_class(id, |c| {
            if !c.stages.contains(stage) {
                log::debug!("{} {} reached {}", id, c.name, stage);
            }
            c.stages = c.stages.with(stage);
            if c.stages.is_complete() {
                c.initializer = None;
            }
        });
    }

    /// Bring a class to `stage`, running its initializer if needed
    pub fn ensure_stage(&self, id: ClassId, stage: Stage) -> Result<()> {
        if self.has_stage(id, stage) {
            return Ok(());
        }
        for prerequisite in stage.prerequisites() {
            self.ensure_stage(id, *prerequisite)?;
        }
        let initializer = self.with_class(id, |c| c.initializer.clone());
        match initializer {
            Some(init) => init.initialize(self, id, stage)?,
            None => self.mark_stage(id, stage),
        }
        Ok(())
    }

    pub fn super_type(&self, id: ClassId) -> Result<Option<Type>> {
        self.ensure_stage(id, Stage::SupertypesResolved)?;
        Ok(self.with_class(id, |c| c.super_type.clone()))
    }

    pub fn interfaces(&self, id: ClassId) -> Result<Vec<Type>> {
        self.ensure_stage(id, Stage::SupertypesResolved)?;
        Ok(self.with_class(id, |c| c.interfaces.clone()))
    }

    pub fn member_classes(&self, id: ClassId) -> Result<Vec<ClassId>> {
        self.ensure_stage(id, Stage::MembersAdded)?;
        Ok(self.with_class(id, |c| c.member_classes.clone()))
    }

    pub fn member_class_named(&self, id: ClassId, name: &str) -> Result<Option<ClassId>> {
        let members = self.member_classes(id)?;
        Ok(members.into_iter().find(|m| self.class_name(*m) == name))
    }

    pub fn fields(&self, id: ClassId) -> Result<Vec<FieldInstance>> {
        self.ensure_stage(id, Stage::SignaturesResolved)?;
        Ok(self.with_class(id, |c| c.fields.clone()))
    }

    /// Only forces signature resolution when the match is not canonical
    pub fn field_named(&self, id: ClassId, name: &str) -> Result<Option<FieldInstance>> {
        self.ensure_stage(id, Stage::MembersAdded)?;
        let lookup = |c: &ClassData| c.fields.iter().find(|f| f.name() == name).cloned();
        match self.with_class(id, lookup) {
            Some(fi) if !fi.is_canonical() => {
                self.ensure_stage(id, Stage::SignaturesResolved)?;
                Ok(self.with_class(id, lookup))
            }
            found => Ok(found),
        }
    }

    pub fn methods(&self, id: ClassId) -> Result<Vec<MethodInstance>> {
        self.ensure_stage(id, Stage::SignaturesResolved)?;
        Ok(self.with_class(id, |c| c.methods.clone()))
    }

    /// Only forces signature resolution when a match is not canonical
    pub fn methods_named(&self, id: ClassId, name: &str) -> Result<Vec<MethodInstance>> {
        self.ensure_stage(id, Stage::MembersAdded)?;
        let lookup = |c: &ClassData| c.methods.iter().filter(|m| m.name() == name).cloned().collect::<Vec<_>>();
        let found = self.with_class(id, lookup);
        if found.iter().all(|m| m.is_canonical()) {
            return Ok(found);
        }
        self.ensure_stage(id, Stage::SignaturesResolved)?;
        Ok(self.with_class(id, lookup))
    }

    pub fn constructors(&self, id: ClassId) -> Result<Vec<ConstructorInstance>> {
        self.ensure_stage(id, Stage::SignaturesResolved)?;
        Ok(self.with_class(id, |c| c.constructors.clone()))
    }

    /// Members of the class and all of its supertypes are complete
    pub fn ensure_all_members(&self, id: ClassId) -> Result<()> {
        self.ensure_stage(id, Stage::AllMembersAdded)
    }

    /// Current method list without any gate, possibly stale
    pub fn methods_unchecked(&self, id: ClassId) -> Vec<MethodInstance> {
        self.with_class(id, |c| c.methods.clone())
    }

    /// Current supertypes without any gate, possibly stale
    pub fn supertypes_unchecked(&self, id: ClassId) -> (Option<Type>, Vec<Type>) {
        self.with_class(id, |c| (c.super_type.clone(), c.interfaces.clone()))
    }
}

#[cfg(test)]
pub(crate) mod test_support;
