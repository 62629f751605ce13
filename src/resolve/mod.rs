//! Resolver chain
//!
//! - `TableResolver`: classes produced from parsed source
//! - `CompoundResolver`: first resolver that does not report not-found
//! - `CachingResolver`: memoizing wrapper
//! - `SystemResolver`: the layered root cache with fork/commit/discard
//! - `LoadedClassResolver` / `SourceClassResolver`: binaries, then source
//! - `ClassContextResolver` / `PackageContextResolver`: member namespaces
//! - `ImportTable`: per compilation unit

mod table;
mod compound;
mod caching;
mod system;
mod loaded;
mod source;
mod class_context;
mod package_context;
mod import_table;

pub use table::TableResolver;
pub use compound::CompoundResolver;
pub use caching::{CacheEntry, CachingResolver};
pub use system::SystemResolver;
pub use loaded::LoadedClassResolver;
pub use source::SourceClassResolver;
pub use class_context::ClassContextResolver;
pub use package_context::PackageContextResolver;
pub use import_table::ImportTable;

use crate::types::{ClassId, Named, TypeSystem};
use crate::utils::Result;

/// Maps a name to an entity
pub trait Resolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named>;
}

/// Resolves fully qualified names
pub trait TopLevelResolver: Resolver {
    fn package_exists(&self, ts: &TypeSystem, name: &str) -> bool;
}

/// Resolves names on behalf of an accessing class
pub trait AccessControlResolver: Resolver {
    /// `accessor` of `None` skips access checks
    fn find_for(&self, ts: &TypeSystem, name: &str, accessor: Option<ClassId>) -> Result<Named>;
}
