//! Import table
//!
//! One per compilation unit. Single-type imports are kept as names until the
//! first short-name lookup, so creating a table never forces another unit.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::resolve::Resolver;
use crate::types::{is_short_name, short_name, Named, Package, TypeSystem};
use crate::utils::{Error, Position, Result};

#[derive(Debug, Default)]
pub struct ImportTable {
    package: Option<Package>,
    position: Option<Position>,
    /// Single-type imports, by full name
    class_imports: Vec<String>,
    /// Explicit on-demand imports, by package name
    package_imports: Vec<String>,
    default_imports: Vec<String>,
    /// Single-type imports by short name, filled on materialization
    imported: RefCell<HashMap<String, (String, Named)>>,
    materialized: Cell<bool>,
    memo: RefCell<HashMap<String, Named>>,
}

impl ImportTable {
    pub fn new(ts: &TypeSystem, package: Option<Package>, position: Option<Position>) -> Self {
        Self {
            package,
            position,
            default_imports: ts.config().default_imports.clone(),
            ..Default::default()
        }
    }

    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn add_class_import(&mut self, name: impl Into<String>) {
        let name = name.into();
        log::trace!("import {}", name);
        self.class_imports.push(name);
        self.materialized.set(false);
    }

    pub fn add_package_import(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.package_imports.contains(&name) {
            self.package_imports.push(name);
        }
    }

    /// Add `a.b.C` or `a.b.*`
    pub fn add_import(&mut self, import: &str) {
        match import.strip_suffix(".*") {
            Some(package) => self.add_package_import(package),
            None => self.add_class_import(import),
        }
    }

    pub fn class_imports(&self) -> &[String] {
        &self.class_imports
    }

    pub fn package_imports(&self) -> &[String] {
        &self.package_imports
    }

    /// Resolve every single-type import; conflicting imports are an error
    pub fn materialize(&self, ts: &TypeSystem) -> Result<()> {
        if self.materialized.get() {
            return Ok(());
        }
        for full in &self.class_imports {
            let short = short_name(full).to_string();
            if self.imported.borrow().get(&short).map_or(false, |(previous, _)| previous == full) {
                continue;
            }
            let named = ts.system().find(ts, full)?;
            let previous = self.imported.borrow().get(&short).cloned();
            if let Some((previous, prev_named)) = previous {
                if prev_named != named {
                    return Err(Error::ImportConflict {
                        name: full.clone(),
                        previous,
                        position: self.position.clone(),
                    });
                }
            }
            self.imported.borrow_mut().insert(short, (full.clone(), named));
        }
        self.materialized.set(true);
        Ok(())
    }

    /// Non-class entities are always visible; a class must be public or
    /// in the importing unit's package
    fn is_visible(&self, ts: &TypeSystem, named: &Named) -> bool {
        match named {
            Named::Package(_) => true,
            Named::Class(class) => ts.class_accessible_from_package(*class, self.package.as_ref()),
        }
    }

    fn lookup_in(&self, ts: &TypeSystem, package: &str, name: &str) -> Result<Option<Named>> {
        let full = format!("{}.{}", package, name);
        match ts.system().find(ts, &full) {
            Ok(named) => Ok(Some(named)),
            Err(e) if e.is_not_found_for(&full) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remember(&self, name: &str, named: Named) -> Named {
        self.memo.borrow_mut().insert(name.to_string(), named.clone());
        named
    }
}

impl Resolver for ImportTable {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        if !is_short_name(name) {
            return ts.system().find(ts, name);
        }
        if let Some(named) = self.memo.borrow().get(name) {
            return Ok(named.clone());
        }

        self.materialize(ts)?;
        let imported = self.imported.borrow().get(name).map(|(_, named)| named.clone());
        if let Some(named) = imported {
            return Ok(self.remember(name, named));
        }

        let candidates = self
            .package
            .iter()
            .map(|p| p.full_name().to_string())
            .chain(self.default_imports.iter().cloned())
            .chain(self.package_imports.iter().cloned());
        for package in candidates {
            if let Some(named) = self.lookup_in(ts, &package, name)? {
                if self.is_visible(ts, &named) {
                    log::trace!("{} resolved through package {}", name, package);
                    return Ok(self.remember(name, named));
                }
                log::trace!("{}.{} is not visible here", package, name);
            }
        }

        let named = ts.system().find(ts, name)?;
        if !self.is_visible(ts, &named) {
            return Err(Error::not_found(name));
        }
        Ok(self.remember(name, named))
    }
}
