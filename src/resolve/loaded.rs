//! Loaded class resolver
//!
//! Finds classes on the class path. Embedded metadata from a compatible
//! compiler is preferred; raw structure is the fallback when permitted.

use std::rc::Rc;

use crate::config::Compatibility;
use crate::frontend::class_file::{ClassFile, ClassPath};
use crate::frontend::encoding::TypeDecoder;
use crate::resolve::{Resolver, TopLevelResolver};
use crate::types::initializer::ClassFileInitializer;
use crate::types::{ClassId, Named, TypeSystem};
use crate::utils::{Error, Result};

pub struct LoadedClassResolver {
    class_path: Rc<dyn ClassPath>,
}

impl LoadedClassResolver {
    pub fn new(class_path: Rc<dyn ClassPath>) -> Self {
        Self { class_path }
    }

    pub fn load_file(&self, name: &str) -> Option<Rc<dyn ClassFile>> {
        let file = self.class_path.load_file(name);
        match &file {
            Some(f) => log::trace!("class file {} found for {}", f.name(), name),
            None => log::trace!("no class file for {}", name),
        }
        file
    }

    /// How the recorded compiler version compares with ours; an unversioned file is incompatible
    pub fn compatibility(&self, ts: &TypeSystem, file: &dyn ClassFile) -> Compatibility {
        file.compiler_version()
            .map_or(Compatibility::Incompatible, |found| ts.config().version.check(found))
    }

    /// Decode embedded metadata inside a forked system layer
    pub fn get_encoded_type(&self, ts: &TypeSystem, file: &dyn ClassFile, name: &str) -> Result<ClassId> {
        let version = &ts.config().version;
        match self.compatibility(ts, file) {
            Compatibility::Incompatible => {
                return Err(Error::IncompatibleVersion {
                    class: name.to_string(),
                    compiler: version.name.clone(),
                    found: file.compiler_version().unwrap_or("unknown").to_string(),
                    expected: version.to_string(),
                })
            }
            Compatibility::MinorIncompatible => log::warn!(
                "{} was compiled by version {} of {}; current version is {}",
                name,
                file.compiler_version().unwrap_or("unknown"),
                version.name,
                version
            ),
            Compatibility::Compatible => {}
        }
        let text = file.encoded_metadata(version).ok_or_else(|| Error::BadEncoding {
            class: name.to_string(),
            message: format!("no metadata for {}", version.name),
        })?;

        log::debug!("using encoded class type for {}", name);
        let system = ts.system();
        system.fork();
        match TypeDecoder::new(ts).decode(text, file.name()) {
            Ok(id) => {
                system.commit()?;
                Ok(id)
            }
            Err(e) => {
                system.discard()?;
                Err(e)
            }
        }
    }

    /// Derive a class from the raw class-file structure
    pub fn get_raw_type(&self, ts: &TypeSystem, file: Rc<dyn ClassFile>) -> Result<ClassId> {
        if let Some(Named::Class(id)) = ts.system().check(file.name()) {
            return Ok(id);
        }
        log::debug!("using raw class file for {}", file.name());
        ClassFileInitializer::create(ts, file)
    }

    pub(crate) fn no_suitable_definition(ts: &TypeSystem, name: &str) -> Error {
        Error::semantic(
            format!(
                "Unable to find a suitable definition of \"{}\". A class file was found, but it did not contain \
                 appropriate information for the {} compiler.",
                name,
                ts.config().version.name
            ),
            None,
        )
    }

    fn find_in_file(&self, ts: &TypeSystem, name: &str, file: Rc<dyn ClassFile>) -> Result<Named> {
        let allow_raw = ts.config().allow_raw_classes && file.raw_member_info().is_some();
        if file.encoded_metadata(&ts.config().version).is_some() {
            match self.get_encoded_type(ts, &*file, name) {
                Ok(id) => return Ok(Named::Class(id)),
                Err(e @ (Error::BadEncoding { .. } | Error::IncompatibleVersion { .. })) if allow_raw => {
                    log::warn!("{}; falling back to the raw class file", e);
                }
                Err(e) => return Err(e),
            }
        }
        if allow_raw {
            return self.get_raw_type(ts, file).map(Named::Class);
        }
        Err(Self::no_suitable_definition(ts, name))
    }
}

impl Resolver for LoadedClassResolver {
    fn find(&self, ts: &TypeSystem, name: &str) -> Result<Named> {
        let file = self.load_file(name).ok_or_else(|| Error::not_found(name))?;
        self.find_in_file(ts, name, file)
    }
}

impl TopLevelResolver for LoadedClassResolver {
    fn package_exists(&self, _ts: &TypeSystem, name: &str) -> bool {
        self.class_path.package_exists(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeSystemConfig;
    use crate::frontend::class_file::{MemoryClassFile, RawClassInfo};
    use crate::types::test_support::Fixture;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn raw(name: &str) -> RawClassInfo {
        RawClassInfo {
            name: name.into(),
            access_flags: 0x0001,
            super_class: None,
            interfaces: vec![],
            inner_classes: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    fn encoded(fx: &Fixture, text: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(fx.ts.config().version.name.clone(), text.to_string());
        map
    }

    #[test]
    fn test_incompatible_metadata_falls_back_to_raw() {
        let fx = Fixture::new();
        let text = r#"{"version":"9.0.0","name":"l.Old","super_type":"java.lang.Object"}"#;
        fx.class_path.borrow_mut().add(Rc::new(MemoryClassFile {
            name: "l.Old".into(),
            encoded: encoded(&fx, text),
            raw: Some(raw("l.Old")),
            compiler_version: Some("9.0.0".into()),
            ..Default::default()
        }));
        let ts = &fx.ts;
        let id = ts.class_for_name("l.Old").unwrap();
        assert!(ts.with_class(id, |c| c.initializer.as_ref().map_or(false, |i| i.from_class_file())));
        assert_eq!(ts.super_type(id).unwrap(), Some(crate::types::Type::Class(fx.object)));
    }

    #[test]
    fn test_incompatible_without_raw() {
        let fx = Fixture::with_config(TypeSystemConfig { allow_raw_classes: false, ..Default::default() });
        fx.class_path.borrow_mut().add(Rc::new(MemoryClassFile {
            name: "l.Old".into(),
            encoded: encoded(&fx, r#"{"version":"9.0.0","name":"l.Old"}"#),
            raw: Some(raw("l.Old")),
            compiler_version: Some("9.0.0".into()),
            ..Default::default()
        }));
        let err = fx.ts.class_for_name("l.Old").unwrap_err();
        assert!(matches!(err, Error::IncompatibleVersion { .. }), "{:?}", err);
    }

    #[test]
    fn test_bad_metadata_discards_layer() {
        let fx = Fixture::with_config(TypeSystemConfig { allow_raw_classes: false, ..Default::default() });
        fx.class_path.borrow_mut().add(Rc::new(MemoryClassFile {
            name: "l.Bad".into(),
            encoded: encoded(&fx, r#"{"version":"0.1.0","name":"l.Bad","super_type":"l.Missing"}"#),
            compiler_version: Some("0.1.0".into()),
            ..Default::default()
        }));
        let ts = &fx.ts;
        assert!(ts.class_for_name("l.Bad").unwrap_err().is_not_found_for("l.Missing"));
        assert_eq!(ts.system().depth(), 1);
        assert_eq!(ts.system().check("l.Bad"), None);
    }

    #[test]
    fn test_minor_version_mismatch_still_decodes() {
        let fx = Fixture::with_config(TypeSystemConfig { allow_raw_classes: false, ..Default::default() });
        fx.class_path.borrow_mut().add(Rc::new(MemoryClassFile {
            name: "l.Minor".into(),
            encoded: encoded(&fx, r#"{"version":"0.2.0","name":"l.Minor","super_type":"java.lang.Object"}"#),
            compiler_version: Some("0.2.0".into()),
            ..Default::default()
        }));
        let ts = &fx.ts;
        let file = fx.class_path.borrow().load_file("l.Minor").unwrap();
        let loaded = LoadedClassResolver::new(fx.class_path.clone());
        assert_eq!(loaded.compatibility(ts, &*file), Compatibility::MinorIncompatible);

        let id = ts.class_for_name("l.Minor").unwrap();
        assert_eq!(ts.full_name(id), "l.Minor");
        assert_eq!(ts.super_type(id).unwrap(), Some(crate::types::Type::Class(fx.object)));
    }

    #[test]
    fn test_unversioned_metadata_rejected() {
        let fx = Fixture::with_config(TypeSystemConfig { allow_raw_classes: false, ..Default::default() });
        fx.class_path.borrow_mut().add(Rc::new(MemoryClassFile {
            name: "l.NoVer".into(),
            encoded: encoded(&fx, r#"{"version":"0.1.0","name":"l.NoVer","super_type":"java.lang.Object"}"#),
            ..Default::default()
        }));
        let ts = &fx.ts;
        let file = fx.class_path.borrow().load_file("l.NoVer").unwrap();
        let loaded = LoadedClassResolver::new(fx.class_path.clone());
        assert_eq!(loaded.compatibility(ts, &*file), Compatibility::Incompatible);

        let err = ts.class_for_name("l.NoVer").unwrap_err();
        assert!(matches!(err, Error::IncompatibleVersion { ref found, .. } if found == "unknown"), "{:?}", err);
        assert_eq!(ts.system().check("l.NoVer"), None);
    }

    #[test]
    fn test_no_suitable_definition() {
        let fx = Fixture::with_config(TypeSystemConfig { allow_raw_classes: false, ..Default::default() });
        fx.class_path.borrow_mut().add(Rc::new(MemoryClassFile {
            name: "l.Plain".into(),
            raw: Some(raw("l.Plain")),
            ..Default::default()
        }));
        let err = fx.ts.class_for_name("l.Plain").unwrap_err();
        assert!(err.to_string().starts_with("Unable to find a suitable definition of \"l.Plain\""));
    }
}
