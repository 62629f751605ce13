//! Table resolver

use std::cell::RefCell;
use std::collections::HashMap;

use crate::resolve::{Resolver, TopLevelResolver};
use crate::types::{Named, Package, TypeSystem};
use crate::utils::{Error, Result};

/// Plain name→entity map; lookups are never ambiguous
#[derive(Debug, Default)]
pub struct TableResolver {
    table: RefCell<HashMap<String, Named>>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_named(&self, name: impl Into<String>, named: Named) {
        let name = name.into();
        log::debug!("table: adding {}", name);
        self.table.borrow_mut().insert(name, named);
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }
}

impl Resolver for TableResolver {
    fn find(&self, _ts: &TypeSystem, name: &str) -> Result<Named> {
        self.table.borrow().get(name).cloned().ok_or_else(|| Error::not_found(name))
    }
}

impl TopLevelResolver for TableResolver {
    fn package_exists(&self, ts: &TypeSystem, name: &str) -> bool {
        let packages: Vec<Package> = self
            .table
            .borrow()
            .values()
            .filter_map(|named| match named {
                Named::Class(id) => Some(*id),
                Named::Package(_) => None,
            })
            .filter_map(|id| ts.package(id))
            .collect();
        packages.iter().any(|p| {
            let mut current = Some(p.clone());
            while let Some(package) = current {
                if package.full_name() == name {
                    return true;
                }
                current = package.prefix();
            }
            false
        })
    }
}
