//! Package context resolver

use crate::resolve::{AccessControlResolver, Resolver};
use crate::types::{is_short_name, ClassId, Named, Package, TypeSystem};
use crate::utils::{Error, Result};

/// Resolves a short name inside one package
///
/// A name that is not a class is taken to be a subpackage.
#[derive(Debug, Clone)]
pub struct PackageContextResolver {
    package: Package,
}

impl PackageContextResolver {
    pub fn new(package: Package) -> Self {
        Self { package }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }
}

impl Resolver for PackageContextResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        self.find_for(ts, name, None)
    }
}

impl AccessControlResolver for PackageContextResolver {
    fn find_for(&self, ts: &TypeSystem, name: &str, accessor: Option<ClassId>) -> Result<Named> {
        if !is_short_name(name) {
            return Err(Error::semantic(format!("Cannot lookup qualified name {}", name), None));
        }
        let full = format!("{}.{}", self.package.full_name(), name);
        match ts.system().find(ts, &full) {
            Ok(Named::Class(class)) => {
                if let Some(accessor) = accessor {
                    if !ts.class_accessible(class, accessor)? {
                        return Err(Error::Inaccessible { what: ts.full_name(class), from: ts.full_name(accessor) });
                    }
                }
                Ok(Named::Class(class))
            }
            Ok(named) => Ok(named),
            Err(e) if e.is_not_found_for(&full) => Ok(Named::Package(Package::new(full))),
            Err(e) => Err(e),
        }
    }
}
