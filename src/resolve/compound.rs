//! Compound resolver

use std::rc::Rc;

use crate::resolve::{Resolver, TopLevelResolver};
use crate::types::{Named, TypeSystem};
use crate::utils::{Error, Result};

/// Tries each resolver in order, falling through only when the name itself
/// is not found; a missing dependency of a found class is a real failure
pub struct CompoundResolver {
    resolvers: Vec<Rc<dyn TopLevelResolver>>,
}

impl CompoundResolver {
    pub fn new(resolvers: Vec<Rc<dyn TopLevelResolver>>) -> Self {
        Self { resolvers }
    }
}

impl Resolver for CompoundResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        for resolver in &self.resolvers {
            match resolver.find(ts, name) {
                Err(e) if e.is_not_found_for(name) => continue,
                other => return other,
            }
        }
        Err(Error::not_found(name))
    }
}

impl TopLevelResolver for CompoundResolver {
    fn package_exists(&self, ts: &TypeSystem, name: &str) -> bool {
        self.resolvers.iter().any(|r| r.package_exists(ts, name))
    }
}
