//! Member and overload resolution
//!
//! Field, method and constructor lookup over the supertype graph, with
//! most-specific selection among applicable procedures. An `accessor` of
//! `None` skips access checks.

use std::collections::{HashSet, VecDeque};

use crate::resolve::{AccessControlResolver, ClassContextResolver, Resolver};
use crate::types::{
    ClassId, ConstructorInstance, FieldInstance, Flags, MemberInstance, MethodInstance, Named, ProcedureInstance,
    Type, TypeSystem,
};
use crate::utils::{Error, MemberKind, Result};

impl TypeSystem {
    // ==================== Supertype Graph ====================

    /// Direct supertypes of a reference type; arrays extend the root and
    /// implement the configured array interfaces
    fn direct_supertypes(&self, ty: &Type) -> Result<Vec<Type>> {
        match ty {
            Type::Class(id) => {
                let mut supers: Vec<Type> = self.super_type(*id)?.into_iter().collect();
                supers.extend(self.interfaces(*id)?);
                Ok(supers)
            }
            Type::Array(_) => {
                let mut supers = vec![self.object_type()?];
                for name in &self.config().array_interfaces {
                    match self.class_for_name(name) {
                        Ok(id) => supers.push(Type::Class(id)),
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(supers)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn declared_methods_named(&self, ty: &Type, name: &str) -> Result<Vec<MethodInstance>> {
        match ty {
            Type::Class(id) => self.methods_named(*id, name),
            Type::Array(_) if name == "clone" => {
                let object = self.object_type()?;
                Ok(vec![MethodInstance::new(ty.clone(), Flags::PUBLIC, object, "clone", vec![], vec![])])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn declared_field_named(&self, ty: &Type, name: &str) -> Result<Option<FieldInstance>> {
        match ty {
            Type::Class(id) => self.field_named(*id, name),
            Type::Array(_) if name == "length" => Ok(Some(FieldInstance::new(
                ty.clone(),
                Flags::PUBLIC | Flags::FINAL,
                Type::int(),
                "length",
            ))),
            _ => Ok(None),
        }
    }

    /// Procedure signature for diagnostics
    pub fn signature(&self, p: &impl ProcedureInstance) -> String {
        format!("{}({})", p.designator(), self.type_names(p.formal_types()).join(", "))
    }

    // ==================== Fields ====================

    /// Find a field by name in `container` or its supertypes
    pub fn find_field(&self, container: &Type, name: &str, accessor: Option<ClassId>) -> Result<FieldInstance> {
        let mut found = Vec::new();
        self.collect_fields(container, name, &mut HashSet::new(), &mut found)?;
        let field = match found.as_slice() {
            [] => {
                return Err(Error::NoSuchMember {
                    kind: MemberKind::Field,
                    name: name.to_string(),
                    container: self.type_name(container),
                })
            }
            [only] => only.clone(),
            [first, second, ..] => {
                return Err(Error::Ambiguous {
                    name: format!("field {}", name),
                    candidates: vec![self.type_name(first.container()), self.type_name(second.container())],
                    position: None,
                })
            }
        };
        if let Some(accessor) = accessor {
            if !self.is_accessible_in(&field, container, accessor)? {
                return Err(Error::Inaccessible {
                    what: format!("field {}", field.name()),
                    from: self.full_name(accessor),
                });
            }
        }
        Ok(field)
    }

    fn collect_fields(
        &self,
        ty: &Type,
        name: &str,
        visited: &mut HashSet<Type>,
        found: &mut Vec<FieldInstance>,
    ) -> Result<()> {
        if !visited.insert(ty.clone()) {
            return Ok(());
        }
        if let Some(field) = self.declared_field_named(ty, name)? {
            if !found.contains(&field) {
                found.push(field);
            }
            return Ok(());
        }
        for sup in self.direct_supertypes(ty)? {
            self.collect_fields(&sup, name, visited, found)?;
        }
        Ok(())
    }

    // ==================== Member Classes ====================

    /// Find a member class of `container`, inherited ones included
    pub fn find_member_class(&self, container: ClassId, name: &str, accessor: Option<ClassId>) -> Result<ClassId> {
        let named = match accessor {
            Some(_) => ClassContextResolver::new(container).find_for(self, name, accessor)?,
            None => self.member_class_resolver(container).find(self, name)?,
        };
        match named {
            Named::Class(id) => Ok(id),
            Named::Package(_) => Err(Error::NoSuchMember {
                kind: MemberKind::MemberClass,
                name: name.to_string(),
                container: self.full_name(container),
            }),
        }
    }

    // ==================== Applicability ====================

    /// Same arity and each argument widens to its formal
    pub fn call_valid(&self, p: &impl ProcedureInstance, args: &[Type]) -> Result<bool> {
        let formals = p.formal_types();
        if formals.len() != args.len() {
            return Ok(false);
        }
        for (arg, formal) in args.iter().zip(formals) {
            if !self.is_implicit_cast_valid(arg, formal)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn method_call_valid(&self, mi: &MethodInstance, name: &str, args: &[Type]) -> Result<bool> {
        Ok(mi.name() == name && self.call_valid(mi, args)?)
    }

    /// `p1` is at least as specific as `p2`
    pub fn more_specific<P: ProcedureInstance>(&self, p1: &P, p2: &P) -> Result<bool> {
        let (c1, c2) = (p1.container(), p2.container());
        let related = match (c1, c2) {
            (Type::Class(a), Type::Class(b)) => self.is_subtype(c1, c2)? || self.is_enclosed(*a, *b),
            _ => self.is_subtype(c1, c2)?,
        };
        Ok(related && self.call_valid(p2, p1.formal_types())?)
    }

    /// Maximal elements under [`more_specific`](Self::more_specific)
    fn most_specific<P: ProcedureInstance>(&self, acceptable: Vec<P>) -> Result<Vec<P>> {
        let mut maximal = Vec::new();
        for (i, p) in acceptable.iter().enumerate() {
            let mut is_max = true;
            for (j, q) in acceptable.iter().enumerate() {
                if i != j && self.more_specific(q, p)? && !self.more_specific(p, q)? {
                    is_max = false;
                    break;
                }
            }
            if is_max {
                maximal.push(p.clone());
            }
        }
        if maximal.len() > 1 {
            let concrete: Vec<P> = maximal.iter().filter(|p| !p.flags().is_abstract()).cloned().collect();
            if concrete.len() == 1 {
                return Ok(concrete);
            }
            if concrete.is_empty() {
                let first = &maximal[0];
                if maximal.iter().all(|p| p.has_formals(first.formal_types())) {
                    return Ok(vec![first.clone()]);
                }
            }
        }
        Ok(maximal)
    }

    fn select<P: ProcedureInstance>(&self, kind: MemberKind, name: &str, acceptable: Vec<P>) -> Result<P> {
        let mut maximal = self.most_specific(acceptable)?;
        if maximal.len() > 1 {
            return Err(Error::AmbiguousCall {
                kind,
                name: name.to_string(),
                candidates: maximal
                    .iter()
                    .map(|p| format!("{}.{}", self.type_name(p.container()), self.signature(p)))
                    .collect(),
            });
        }
        maximal.pop().ok_or_else(|| Error::semantic(format!("No {} named {}", kind, name), None))
    }

    fn no_applicable(&self, kind: MemberKind, name: &str, args: &[Type], container: &Type) -> Error {
        Error::NoApplicableMember {
            kind,
            name: name.to_string(),
            args: self.type_names(args),
            container: self.type_name(container),
        }
    }

    // ==================== Methods ====================

    /// Applicable, accessible methods named `name`, breadth first from `container`
    fn find_acceptable_methods(
        &self,
        container: &Type,
        name: &str,
        args: &[Type],
        accessor: Option<ClassId>,
    ) -> Result<Vec<MethodInstance>> {
        let mut acceptable = Vec::new();
        let mut unacceptable = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([container.clone()]);

        while let Some(ty) = queue.pop_front() {
            if !visited.insert(ty.clone()) {
                continue;
            }
            if !ty.is_reference() {
                return Err(Error::semantic(
                    format!("Cannot call method in non-reference type {}.", self.type_name(&ty)),
                    None,
                ));
            }
            for mi in self.declared_methods_named(&ty, name)? {
                if !self.call_valid(&mi, args)? {
                    continue;
                }
                let accessible = match accessor {
                    Some(accessor) => self.is_accessible_in(&mi, container, accessor)?,
                    None => true,
                };
                log::trace!("{} {} for {}", if accessible { "accepting" } else { "rejecting" }, self.signature(&mi), name);
                if accessible {
                    acceptable.push(mi);
                } else {
                    unacceptable.push(mi);
                }
            }
            queue.extend(self.direct_supertypes(&ty)?);
        }

        // An inaccessible override hides what it overrides.
        for mi in &unacceptable {
            let hidden = self.overrides(mi)?;
            acceptable.retain(|m| !hidden.contains(m));
        }
        Ok(acceptable)
    }

    /// Select the most specific method named `name` applicable to `args`
    pub fn find_method(
        &self,
        container: &Type,
        name: &str,
        args: &[Type],
        accessor: Option<ClassId>,
    ) -> Result<MethodInstance> {
        let acceptable = self.find_acceptable_methods(container, name, args, accessor)?;
        if acceptable.is_empty() {
            return Err(self.no_applicable(MemberKind::Method, name, args, container));
        }
        let mi = self.select(MemberKind::Method, name, acceptable)?;
        log::debug!("selected {} for call to {}", self.signature(&mi), name);
        Ok(mi)
    }

    /// Select the most specific constructor of `container` applicable to `args`
    pub fn find_constructor(
        &self,
        container: ClassId,
        args: &[Type],
        accessor: Option<ClassId>,
    ) -> Result<ConstructorInstance> {
        let mut acceptable = Vec::new();
        for ci in self.constructors(container)? {
            if !self.call_valid(&ci, args)? {
                continue;
            }
            match accessor {
                Some(accessor) if !self.is_accessible(&ci, accessor)? => {}
                _ => acceptable.push(ci),
            }
        }
        let name = self.class_name(container);
        if acceptable.is_empty() {
            return Err(self.no_applicable(MemberKind::Constructor, &name, args, &Type::Class(container)));
        }
        self.select(MemberKind::Constructor, &name, acceptable)
    }

    pub fn has_method_named(&self, container: &Type, name: &str) -> Result<bool> {
        self.any_method_named(container, name, None)
    }

    pub fn has_accessible_method_named(&self, container: &Type, name: &str, accessor: ClassId) -> Result<bool> {
        self.any_method_named(container, name, Some(accessor))
    }

    fn any_method_named(&self, container: &Type, name: &str, accessor: Option<ClassId>) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([container.clone()]);
        while let Some(ty) = queue.pop_front() {
            if !visited.insert(ty.clone()) {
                continue;
            }
            for mi in self.declared_methods_named(&ty, name)? {
                match accessor {
                    Some(accessor) if !self.is_accessible_in(&mi, container, accessor)? => {}
                    _ => return Ok(true),
                }
            }
            queue.extend(self.direct_supertypes(&ty)?);
        }
        Ok(false)
    }

    // ==================== Overriding ====================

    /// Methods with the same name and formals along the superclass chain,
    /// `mi` itself included
    pub fn overrides(&self, mi: &MethodInstance) -> Result<Vec<MethodInstance>> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(mi.container().clone());
        while let Some(ty) = current.take() {
            if !visited.insert(ty.clone()) {
                break;
            }
            found.extend(
                self.declared_methods_named(&ty, mi.name())?
                    .into_iter()
                    .filter(|m| m.has_formals(mi.formal_types())),
            );
            current = match &ty {
                Type::Class(id) => self.super_type(*id)?,
                Type::Array(_) => Some(self.object_type()?),
                _ => None,
            };
        }
        Ok(found)
    }

    /// Every checked exception `p1` throws is covered by one `p2` throws
    pub fn throws_subset(&self, p1: &impl ProcedureInstance, p2: &impl ProcedureInstance) -> Result<bool> {
        for thrown in p1.throw_types() {
            if self.is_unchecked_exception(thrown)? {
                continue;
            }
            let mut covered = false;
            for allowed in p2.throw_types() {
                if self.is_subtype(thrown, allowed)? {
                    covered = true;
                    break;
                }
            }
            if !covered {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_unchecked_exception(&self, ty: &Type) -> Result<bool> {
        for name in ["java.lang.Error", "java.lang.RuntimeException"] {
            match self.class_for_name(name) {
                Ok(id) => {
                    if self.is_subtype(ty, &Type::Class(id))? {
                        return Ok(true);
                    }
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// A concrete method of `class` or its superclasses that implements `mi`
    pub fn find_implementing_method(&self, class: ClassId, mi: &MethodInstance) -> Result<Option<MethodInstance>> {
        let mut current = Some(class);
        let mut visited = HashSet::new();
        while let Some(id) = current.take() {
            if !visited.insert(id) {
                break;
            }
            for mj in self.methods_named(id, mi.name())? {
                if !mj.has_formals(mi.formal_types()) || mj.flags().is_abstract() {
                    continue;
                }
                let implementor = mj.container().as_class().unwrap_or(class);
                let visible_from_class = self.is_accessible(mi, class)? && self.is_accessible(&mj, class)?;
                if visible_from_class || self.is_accessible(mi, implementor)? {
                    return Ok(Some(mj));
                }
            }
            // Nothing above the declaring class can implement it.
            if Some(id) == mi.container().as_class() {
                break;
            }
            current = self.super_type(id)?.and_then(|t| t.as_class());
        }
        Ok(None)
    }

    /// A concrete class implements every abstract method it inherits
    pub fn check_class_conformance(&self, class: ClassId) -> Result<()> {
        if self.flags(class).is_abstract() {
            return Ok(());
        }
        let mut sources = Vec::new();
        self.abstract_super_interfaces(class, &mut sources)?;
        for source in sources {
            for mi in self.methods(source)? {
                if !mi.flags().is_abstract() {
                    continue;
                }
                if self.find_implementing_method(class, &mi)?.is_none() {
                    return Err(Error::semantic(
                        format!(
                            "{} should be declared abstract; it does not define {}, which is declared in {}",
                            self.full_name(class),
                            self.signature(&mi),
                            self.full_name(source),
                        ),
                        self.position(class),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The class, its interfaces, and its abstract superclasses with theirs
    fn abstract_super_interfaces(&self, class: ClassId, out: &mut Vec<ClassId>) -> Result<()> {
        if out.contains(&class) {
            return Ok(());
        }
        out.push(class);
        for interface in self.interfaces(class)?.iter().filter_map(Type::as_class) {
            self.abstract_super_interfaces(interface, out)?;
        }
        if let Some(sup) = self.super_type(class)?.and_then(|t| t.as_class()) {
            if self.flags(sup).is_abstract() {
                self.abstract_super_interfaces(sup, out)?;
            }
        }
        Ok(())
    }
}
