//! Caching resolver

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::resolve::Resolver;
use crate::types::{Named, TypeSystem};
use crate::utils::{Error, Result};

/// A memoized lookup outcome
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Found(Named),
    /// The not-found error to report again
    Missing(Error),
}

/// Memoizes hits and, optionally, misses of an inner resolver
pub struct CachingResolver {
    inner: Rc<dyn Resolver>,
    cache: RefCell<HashMap<String, CacheEntry>>,
    cache_not_found: bool,
}

impl CachingResolver {
    pub fn new(inner: Rc<dyn Resolver>, cache_not_found: bool) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
            cache_not_found,
        }
    }

    /// Cached hit only; never consults the inner resolver
    pub fn check(&self, name: &str) -> Option<Named> {
        match self.cache.borrow().get(name) {
            Some(CacheEntry::Found(named)) => Some(named.clone()),
            _ => None,
        }
    }

    /// Record `named` under `name`, replacing any cached miss
    pub fn install(&self, name: impl Into<String>, named: Named) {
        let name = name.into();
        log::debug!("cache: installing {}", name);
        self.cache.borrow_mut().insert(name, CacheEntry::Found(named));
    }

    /// Cached names, sorted
    pub fn dump(&self) -> Vec<String> {
        let mut names: Vec<_> = self.cache.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Resolver for CachingResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        let cached = self.cache.borrow().get(name).cloned();
        match cached {
            Some(CacheEntry::Found(named)) => return Ok(named),
            Some(CacheEntry::Missing(err)) => return Err(err),
            None => {}
        }
        match self.inner.find(ts, name) {
            Ok(named) => {
                self.install(name, named.clone());
                Ok(named)
            }
            Err(err) => {
                if err.is_not_found_for(name) && self.cache_not_found {
                    self.cache
                        .borrow_mut()
                        .insert(name.to_string(), CacheEntry::Missing(err.clone()));
                }
                Err(err)
            }
        }
    }
}
