//! System resolver
//!
//! The root cache of a session, organised as a stack of layers. `fork`
//! pushes an overlay; everything installed while it is on top is logged as
//! "just added". `commit` replays that log into the layer below and `discard`
//! drops it, so a speculative load never leaves partial entries behind.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::resolve::{CacheEntry, Resolver, TopLevelResolver};
use crate::types::{container_name, Named, Package, TypeSystem};
use crate::utils::{Error, Result};

#[derive(Debug, Default)]
struct Layer {
    cache: HashMap<String, CacheEntry>,
    packages: HashMap<String, bool>,
    just_added: Vec<(String, Named)>,
}

pub struct SystemResolver {
    inner: Rc<dyn TopLevelResolver>,
    layers: RefCell<Vec<Layer>>,
    cache_not_found: bool,
}

impl SystemResolver {
    pub fn new(inner: Rc<dyn TopLevelResolver>, cache_not_found: bool) -> Self {
        Self {
            inner,
            layers: RefCell::new(vec![Layer::default()]),
            cache_not_found,
        }
    }

    /// Number of layers; 1 when nothing is forked
    pub fn depth(&self) -> usize {
        self.layers.borrow().len()
    }

    fn lookup(&self, name: &str) -> Option<CacheEntry> {
        self.layers
            .borrow()
            .iter()
            .rev()
            .find_map(|layer| layer.cache.get(name).cloned())
    }

    /// Cached hit only; never consults the inner resolver
    pub fn check(&self, name: &str) -> Option<Named> {
        match self.lookup(name) {
            Some(CacheEntry::Found(named)) => Some(named),
            _ => None,
        }
    }

    /// Record `named` in the top layer
    pub fn install(&self, ts: &TypeSystem, name: &str, named: Named) -> Result<()> {
        if let Named::Class(id) = &named {
            if self.package_exists(ts, name) {
                return Err(Error::TypePackageClash {
                    name: name.to_string(),
                    position: ts.position(*id),
                });
            }
        }
        self.insert_top(name, named);
        Ok(())
    }

    fn insert_top(&self, name: &str, named: Named) {
        let mut layers = self.layers.borrow_mut();
        let forked = layers.len() > 1;
        if let Some(top) = layers.last_mut() {
            log::debug!("system: installing {}", name);
            if forked {
                top.just_added.push((name.to_string(), named.clone()));
            }
            top.cache.insert(name.to_string(), CacheEntry::Found(named));
        }
    }

    /// Record `named` in every layer
    pub fn install_in_all(&self, ts: &TypeSystem, name: &str, named: Named) -> Result<()> {
        self.install(ts, name, named.clone())?;
        let mut layers = self.layers.borrow_mut();
        let depth = layers.len();
        for (i, layer) in layers.iter_mut().enumerate().take(depth - 1) {
            if i > 0 {
                layer.just_added.push((name.to_string(), named.clone()));
            }
            layer.cache.insert(name.to_string(), CacheEntry::Found(named.clone()));
        }
        Ok(())
    }

    /// Whether every layer maps `name` to `named`
    pub fn installed_in_all(&self, name: &str, named: &Named) -> bool {
        self.layers.borrow().iter().all(|layer| {
            matches!(layer.cache.get(name), Some(CacheEntry::Found(found)) if found == named)
        })
    }

    /// Install, plus the containers implied by the entity
    ///
    /// A top-level class brings its package; a member class installed under
    /// its source name brings its outer class under the container name.
    pub fn add_named(&self, ts: &TypeSystem, name: &str, named: Named) -> Result<()> {
        self.install(ts, name, named.clone())?;
        match named {
            Named::Class(id) => {
                let kind = ts.kind(id);
                let container = container_name(name);
                if kind.is_top_level() {
                    if let Some(package) = ts.package(id) {
                        self.cache_package(&package);
                        if container == Some(package.full_name()) {
                            self.insert_top(package.full_name(), Named::Package(package.clone()));
                        }
                    }
                } else if let (true, Some(outer), Some(container)) = (kind.is_member(), kind.outer(), container) {
                    if name == ts.full_name(id) && self.check(container).is_none() {
                        self.add_named(ts, container, Named::Class(outer))?;
                    }
                }
            }
            Named::Package(package) => self.cache_package(&package),
        }
        Ok(())
    }

    /// Mark a package and all of its prefixes as existing
    pub fn cache_package(&self, package: &Package) {
        let mut layers = self.layers.borrow_mut();
        if let Some(top) = layers.last_mut() {
            let mut current = Some(package.clone());
            while let Some(p) = current {
                current = p.prefix();
                top.packages.insert(p.full_name().to_string(), true);
            }
        }
    }

    fn cached_package(&self, name: &str) -> Option<bool> {
        self.layers
            .borrow()
            .iter()
            .rev()
            .find_map(|layer| layer.packages.get(name).copied())
    }

    /// Package existence, cached; a missing prefix implies a missing package
    pub fn package_exists(&self, ts: &TypeSystem, name: &str) -> bool {
        if let Some(known) = self.cached_package(name) {
            return known;
        }
        if let Some(prefix) = container_name(name) {
            if self.cached_package(prefix) == Some(false) {
                self.set_package(name, false);
                return false;
            }
        }
        let exists = self.inner.package_exists(ts, name);
        self.set_package(name, exists);
        exists
    }

    fn set_package(&self, name: &str, exists: bool) {
        if let Some(top) = self.layers.borrow_mut().last_mut() {
            top.packages.insert(name.to_string(), exists);
        }
    }

    // ==================== Layers ====================

    /// Push an overlay layer
    pub fn fork(&self) {
        log::debug!("system: fork at depth {}", self.depth());
        self.layers.borrow_mut().push(Layer::default());
    }

    /// Pop the overlay and replay its additions into the layer below
    pub fn commit(&self) -> Result<()> {
        let layer = self.pop_overlay()?;
        log::debug!("system: commit {} entries", layer.just_added.len());
        self.put_all(layer.just_added);
        let mut layers = self.layers.borrow_mut();
        if let Some(top) = layers.last_mut() {
            for (name, exists) in layer.packages.into_iter().filter(|(_, exists)| *exists) {
                top.packages.insert(name, exists);
            }
        }
        Ok(())
    }

    /// Pop the overlay and drop its additions
    pub fn discard(&self) -> Result<()> {
        let layer = self.pop_overlay()?;
        log::debug!("system: discard {} entries", layer.just_added.len());
        Ok(())
    }

    fn pop_overlay(&self) -> Result<Layer> {
        let mut layers = self.layers.borrow_mut();
        if layers.len() < 2 {
            return Err(Error::semantic("system resolver has no forked layer", None));
        }
        layers.pop().ok_or_else(|| Error::semantic("system resolver has no layers", None))
    }

    /// Install a batch of entries into the top layer
    pub fn put_all(&self, entries: Vec<(String, Named)>) {
        for (name, named) in entries {
            self.insert_top(&name, named);
        }
    }

    /// Entries installed in the top overlay since it was forked
    pub fn just_added(&self) -> Vec<(String, Named)> {
        self.layers
            .borrow()
            .last()
            .map(|layer| layer.just_added.clone())
            .unwrap_or_default()
    }

    pub fn clear_added(&self) {
        if let Some(top) = self.layers.borrow_mut().last_mut() {
            top.just_added.clear();
        }
    }
}

impl Resolver for SystemResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        match self.lookup(name) {
            Some(CacheEntry::Found(named)) => return Ok(named),
            Some(CacheEntry::Missing(err)) => return Err(err),
            None => {}
        }
        match self.inner.find(ts, name) {
            Ok(named) => {
                // Loading may already have installed it under this name.
                if self.check(name).as_ref() != Some(&named) {
                    self.add_named(ts, name, named.clone())?;
                }
                Ok(named)
            }
            Err(err) => {
                if err.is_not_found_for(name) && self.cache_not_found {
                    if let Some(top) = self.layers.borrow_mut().last_mut() {
                        top.cache.insert(name.to_string(), CacheEntry::Missing(err.clone()));
                    }
                }
                Err(err)
            }
        }
    }
}

impl TopLevelResolver for SystemResolver {
    fn package_exists(&self, ts: &TypeSystem, name: &str) -> bool {
        SystemResolver::package_exists(self, ts, name)
    }
}
