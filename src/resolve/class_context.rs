//! Class context resolver
//!
//! Resolves a short name as a member class of one class, searching its
//! supertypes when the class itself does not declare it.

use std::collections::HashSet;

use crate::resolve::{AccessControlResolver, Resolver};
use crate::types::{is_short_name, ClassId, Named, TypeSystem};
use crate::utils::{Error, MemberKind, Result};

#[derive(Debug, Clone, Copy)]
pub struct ClassContextResolver {
    class: ClassId,
}

impl ClassContextResolver {
    pub fn new(class: ClassId) -> Self {
        Self { class }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    /// A member class declared directly in this class
    fn declared(&self, ts: &TypeSystem, name: &str) -> Result<Option<ClassId>> {
        let class = self.class;
        let full = format!("{}.{}", ts.full_name(class), name);
        let raw = ts.transformed_class_name(class).map(|r| format!("{}${}", r, name));

        let mut found = ts.system().check(&full);
        if found.is_none() {
            found = raw.as_deref().and_then(|r| ts.system().check(r));
        }
        if found.is_none() {
            found = ts.member_class_named(class, name)?.map(Named::Class);
        }
        if found.is_none() && ts.with_class(class, |c| c.job.is_none()) {
            // Compiled classes may not list every member; ask the class path.
            if let Some(raw) = raw {
                match ts.system().find(ts, &raw) {
                    Ok(named) => found = Some(named),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(found
            .and_then(|named| named.as_class())
            .filter(|member| ts.outer(*member) == Some(class) && ts.kind(*member).is_member()))
    }

    fn find_in(
        &self,
        ts: &TypeSystem,
        name: &str,
        accessor: Option<ClassId>,
        visited: &mut HashSet<ClassId>,
    ) -> Result<Named> {
        let class = self.class;
        if !visited.insert(class) {
            return Err(self.no_such_member(ts, name));
        }
        log::trace!("looking for member class {} in {}", name, ts.full_name(class));

        if let Some(member) = self.declared(ts, name)? {
            if let Some(accessor) = accessor {
                if !ts.class_accessible(member, accessor)? {
                    return Err(Error::Inaccessible {
                        what: format!("member class {}", ts.full_name(member)),
                        from: ts.full_name(accessor),
                    });
                }
            }
            return Ok(Named::Class(member));
        }

        let mut supers = Vec::new();
        supers.extend(ts.super_type(class)?);
        supers.extend(ts.interfaces(class)?);

        let mut results: Vec<ClassId> = Vec::new();
        let mut inaccessible = None;
        for sup in supers.iter().filter_map(|t| t.as_class()) {
            match ClassContextResolver::new(sup).find_in(ts, name, accessor, visited) {
                Ok(Named::Class(found)) => {
                    if !results.contains(&found) {
                        results.push(found);
                    }
                }
                Ok(Named::Package(_)) => {}
                Err(e @ Error::Inaccessible { .. }) => inaccessible = Some(e),
                Err(e) if e.is_no_such_member() => {}
                Err(e) => return Err(e),
            }
        }

        match results.as_slice() {
            [] => Err(inaccessible.unwrap_or_else(|| self.no_such_member(ts, name))),
            [only] => Ok(Named::Class(*only)),
            many => Err(Error::Ambiguous {
                name: name.to_string(),
                candidates: many
                    .iter()
                    .filter_map(|m| ts.outer(*m))
                    .map(|container| ts.full_name(container))
                    .collect(),
                position: ts.position(class),
            }),
        }
    }

    fn no_such_member(&self, ts: &TypeSystem, name: &str) -> Error {
        Error::NoSuchMember {
            kind: MemberKind::MemberClass,
            name: name.to_string(),
            container: ts.full_name(self.class),
        }
    }
}

impl Resolver for ClassContextResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        self.find_for(ts, name, None)
    }
}

impl AccessControlResolver for ClassContextResolver {
    fn find_for(&self, ts: &TypeSystem, name: &str, accessor: Option<ClassId>) -> Result<Named> {
        if !is_short_name(name) {
            return Err(Error::semantic(format!("Cannot lookup qualified name {}", name), None));
        }
        self.find_in(ts, name, accessor, &mut HashSet::new())
    }
}
