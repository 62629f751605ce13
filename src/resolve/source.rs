//! Source-aware class resolver
//!
//! Chooses between a compiled class and its source. Metadata is used only
//! when it is at least as new as the source and written by a compatible
//! compiler; otherwise the source is scheduled for compilation and the
//! caller is told which goal to wait for.

use std::rc::Rc;

use crate::config::Compatibility;
use crate::frontend::class_file::ClassPath;
use crate::frontend::scheduler::{Goal, NeedsGoal};
use crate::frontend::source::{SourceFile, SourceLoader};
use crate::resolve::{LoadedClassResolver, Resolver, TopLevelResolver};
use crate::types::{Named, TypeSystem};
use crate::utils::{Error, Result};

pub struct SourceClassResolver {
    loaded: LoadedClassResolver,
    sources: Rc<dyn SourceLoader>,
}

impl SourceClassResolver {
    pub fn new(class_path: Rc<dyn ClassPath>, sources: Rc<dyn SourceLoader>) -> Self {
        Self { loaded: LoadedClassResolver::new(class_path), sources }
    }

    /// Classes of a scheduled source exist once its types are initialized
    pub fn get_type_from_source(&self, ts: &TypeSystem, source: &Rc<SourceFile>, name: &str) -> Result<Named> {
        let scheduler = ts.scheduler();
        let job = scheduler.load_source(source);
        if let Some(named) = ts.system().check(name) {
            return Ok(named);
        }
        let goal = Goal::TypesInitialized(job);
        if !scheduler.reached(ts, &goal) {
            log::debug!("{} needs {} from {}", name, goal, source.path);
            return Err(NeedsGoal::new(goal).into());
        }
        Err(Error::not_found(name))
    }
}

impl Resolver for SourceClassResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        let source = match self.sources.class_source(name) {
            Some(source) => source,
            None => return self.loaded.find(ts, name),
        };
        if ts.scheduler().source_has_job(&source) {
            return self.get_type_from_source(ts, &source, name);
        }

        if let Some(file) = self.loaded.load_file(name) {
            let config = ts.config();
            let mut use_encoded = file.encoded_metadata(&config.version).is_some();
            if use_encoded && !config.ignore_mod_times && file.source_last_modified() < source.last_modified {
                log::debug!("source {} is newer than the compiled {}", source.path, file.name());
                use_encoded = false;
            }
            if use_encoded && self.loaded.compatibility(ts, &*file) != Compatibility::Compatible {
                log::debug!("{} was compiled by another version; recompiling {}", file.name(), source.path);
                use_encoded = false;
            }
            if use_encoded {
                match self.loaded.get_encoded_type(ts, &*file, name) {
                    Ok(id) => return Ok(Named::Class(id)),
                    Err(e @ Error::IncompatibleVersion { .. }) => log::debug!("{}", e),
                    Err(e) => return Err(e),
                }
            }
        }
        self.get_type_from_source(ts, &source, name)
    }
}

impl TopLevelResolver for SourceClassResolver {
    fn package_exists(&self, ts: &TypeSystem, name: &str) -> bool {
        self.sources.package_exists(name) || self.loaded.package_exists(ts, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeSystemConfig;
    use crate::frontend::class_file::MemoryClassFile;
    use crate::frontend::scheduler::require;
    use crate::types::test_support::Fixture;
    use crate::types::Type;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn source(last_modified: u64) -> SourceFile {
        serde_json::from_str(&format!(
            r#"{{
                "path": "s/Shape.java",
                "package": "s",
                "last_modified": {},
                "classes": [ {{ "name": "Shape", "flags": ["public"],
                                "methods": [ {{ "name": "area", "returns": "double" }} ] }} ]
            }}"#,
            last_modified
        ))
        .unwrap()
    }

    fn compiled(fx: &Fixture, source_last_modified: u64) -> Rc<MemoryClassFile> {
        let mut encoded = HashMap::new();
        encoded.insert(
            fx.ts.config().version.name.clone(),
            r#"{"version":"0.1.0","name":"s.Shape","flags":["public"],"super_type":"java.lang.Object",
                "methods":[{"name":"area","returns":"int"}]}"#
                .to_string(),
        );
        Rc::new(MemoryClassFile {
            name: "s.Shape".into(),
            encoded,
            source_last_modified,
            compiler_version: Some("0.1.0".into()),
            ..Default::default()
        })
    }

    fn area_return(fx: &Fixture) -> Type {
        let ts = &fx.ts;
        let shape = require(ts, || ts.class_for_name("s.Shape")).unwrap();
        let methods = require(ts, || ts.methods(shape)).unwrap();
        methods[0].return_type().clone()
    }

    #[test]
    fn test_up_to_date_class_file_wins() {
        let fx = Fixture::new();
        fx.sources.borrow_mut().add(source(10));
        fx.class_path.borrow_mut().add(compiled(&fx, 10));
        assert_eq!(area_return(&fx), Type::int());
        assert_eq!(fx.scheduler.job_count(), 0);
    }

    #[test]
    fn test_newer_source_wins() {
        let fx = Fixture::new();
        fx.sources.borrow_mut().add(source(20));
        fx.class_path.borrow_mut().add(compiled(&fx, 10));
        assert_eq!(area_return(&fx), Type::double());
        assert_eq!(fx.scheduler.job_count(), 1);
    }

    #[test]
    fn test_ignore_mod_times() {
        let fx = Fixture::with_config(TypeSystemConfig { ignore_mod_times: true, ..Default::default() });
        fx.sources.borrow_mut().add(source(20));
        fx.class_path.borrow_mut().add(compiled(&fx, 10));
        assert_eq!(area_return(&fx), Type::int());
    }

    #[test]
    fn test_source_signals_types_initialized() {
        let fx = Fixture::new();
        fx.sources.borrow_mut().add(source(0));
        let err = fx.ts.class_for_name("s.Shape").unwrap_err();
        match err.missing_dependency() {
            Some(need) => assert!(matches!(need.goal, Goal::TypesInitialized(_))),
            None => panic!("expected a missing dependency, got {:?}", err),
        }
        assert!(fx.ts.system().check("s.Shape").is_none());
        let shape = require(&fx.ts, || fx.ts.class_for_name("s.Shape")).unwrap();
        assert_eq!(fx.ts.full_name(shape), "s.Shape");
    }
}
