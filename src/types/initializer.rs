//! Lazy class initializers
//!
//! Every class shell holds one initializer that brings it to a requested
//! stage. Four strategies:
//!
//! - `EncodedClassInitializer`: decoded from embedded metadata, complete on arrival
//! - `SchedulerClassInitializer`: parsed from source; a stage is available only
//!   once the scheduler has run the matching goal
//! - `DeserializedClassInitializer`: built in-process; the first touch completes
//!   the class and all of its member classes
//! - `ClassFileInitializer`: derived from raw class-file structure on demand
//!
//! An initializer either installs all data for a stage and marks it, or
//! installs nothing.

use std::fmt;
use std::rc::Rc;

use crate::frontend::class_file::{dotted, parse_field_descriptor, parse_method_descriptor, ClassFile, Descriptor};
use crate::frontend::scheduler::NeedsGoal;
use crate::types::{
    ClassData, ClassId, ClassKind, ConstructorInstance, FieldInstance, Flags, MethodInstance, Named, Package,
    Stage, Type, TypeSystem,
};
use crate::utils::{Error, Position, Result};

/// Populates a class shell stage by stage
pub trait LazyClassInitializer: fmt::Debug {
    /// Bring `id` to `stage`; same-class prerequisites are already complete
    fn initialize(&self, ts: &TypeSystem, id: ClassId, stage: Stage) -> Result<()>;

    fn from_class_file(&self) -> bool {
        false
    }
}

// ==================== Encoded ====================

/// Classes decoded from embedded metadata are fully resolved already
#[derive(Debug, Default)]
pub struct EncodedClassInitializer;

impl LazyClassInitializer for EncodedClassInitializer {
    fn initialize(&self, ts: &TypeSystem, id: ClassId, stage: Stage) -> Result<()> {
        ts.mark_stage(id, stage);
        Ok(())
    }

    fn from_class_file(&self) -> bool {
        true
    }
}

// ==================== Scheduler ====================

/// Stages of source classes are produced by scheduler goals
#[derive(Debug, Default)]
pub struct SchedulerClassInitializer;

impl SchedulerClassInitializer {
    /// Ok if `stage` has been produced, otherwise the goal that produces it
    pub fn check(&self, ts: &TypeSystem, id: ClassId, stage: Stage) -> std::result::Result<(), NeedsGoal> {
        if ts.has_stage(id, stage) {
            return Ok(());
        }
        if stage == Stage::SignaturesResolved
            && ts.has_stage(id, Stage::MembersAdded)
            && ts.with_class(id, ClassData::signatures_canonical)
        {
            ts.mark_stage(id, stage);
            return Ok(());
        }
        Err(NeedsGoal::stage(id, stage))
    }
}

impl LazyClassInitializer for SchedulerClassInitializer {
    fn initialize(&self, ts: &TypeSystem, id: ClassId, stage: Stage) -> Result<()> {
        Ok(self.check(ts, id, stage)?)
    }
}

// ==================== Deserialized ====================

/// Completes the whole nest of member classes on first touch
#[derive(Debug, Default)]
pub struct DeserializedClassInitializer;

impl DeserializedClassInitializer {
    fn complete(ts: &TypeSystem, id: ClassId) {
        for stage in Stage::ALL {
            ts.mark_stage(id, stage);
        }
        let members = ts.with_class(id, |c| c.member_classes.clone());
        for member in members {
            Self::complete(ts, member);
        }
    }
}

impl LazyClassInitializer for DeserializedClassInitializer {
    fn initialize(&self, ts: &TypeSystem, id: ClassId, _stage: Stage) -> Result<()> {
        Self::complete(ts, id);
        Ok(())
    }
}

// ==================== Class File ====================

/// Derives a class from raw class-file structure
pub struct ClassFileInitializer {
    file: Rc<dyn ClassFile>,
}

impl fmt::Debug for ClassFileInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassFileInitializer").field("file", &self.file.name()).finish()
    }
}

impl ClassFileInitializer {
    /// Create and install the shell for a raw class file
    ///
    /// The shell is installed under both its binary and source names before
    /// anything else is resolved, so references back to it terminate.
    pub fn create(ts: &TypeSystem, file: Rc<dyn ClassFile>) -> Result<ClassId> {
        let raw = file.raw_member_info().ok_or_else(|| Error::BadEncoding {
            class: file.name().to_string(),
            message: "no structural information".into(),
        })?;
        let name = dotted(&raw.name);
        log::debug!("creating class type for raw class {}", name);

        let (package, class_name) = match name.rsplit_once('.') {
            Some((package, short)) => (Some(Package::new(package)), short.to_string()),
            None => (None, name.clone()),
        };

        // Longest outer prefix that resolves wins; a '$' may be part of a name.
        let mut outer = None;
        let mut inner = String::new();
        let mut outer_name = name.as_str();
        while let Some(dollar) = outer_name.rfind('$') {
            outer_name = &name[..dollar];
            match ts.class_for_name(outer_name) {
                Ok(found) => {
                    outer = Some(found);
                    inner = name[dollar + 1..].to_string();
                    break;
                }
                Err(e) if e.is_not_found() => log::trace!("no outer class {} for {}", outer_name, name),
                Err(e) => return Err(e),
            }
        }

        let (kind, simple) = match outer {
            None => (ClassKind::TopLevel, class_name),
            Some(outer) => nested_kind(outer, &class_name, &inner),
        };

        let bits = raw
            .inner_classes
            .iter()
            .find(|ic| dotted(&ic.name) == name)
            .map_or(raw.access_flags, |ic| ic.access_flags);

        let initializer: Rc<dyn LazyClassInitializer> = Rc::new(ClassFileInitializer { file: Rc::clone(&file) });
        let mut data = ClassData::shell(simple, package, kind, Flags::from_class_bits(bits), initializer);
        data.binary_name = Some(name.clone());
        data.position = Some(Position::file(format!("{}.class", name.replace('.', "/"))));
        let id = ts.add_class(data);

        ts.system().add_named(ts, &name, Named::Class(id))?;
        let full = ts.full_name(id);
        if full != name && !kind.is_anonymous() && !kind.is_local() {
            ts.system().add_named(ts, &full, Named::Class(id))?;
        }
        Ok(id)
    }

    fn raw(&self) -> Result<&crate::frontend::class_file::RawClassInfo> {
        self.file.raw_member_info().ok_or_else(|| Error::BadEncoding {
            class: self.file.name().to_string(),
            message: "no structural information".into(),
        })
    }

    fn init_supertypes(&self, ts: &TypeSystem, id: ClassId) -> Result<()> {
        let raw = self.raw()?;
        let super_type = if ts.is_root(id) {
            None
        } else {
            match &raw.super_class {
                Some(name) => Some(Type::Class(ts.class_for_name(&dotted(name))?)),
                None => Some(ts.object_type()?),
            }
        };
        let interfaces = raw
            .interfaces
            .iter()
            .map(|name| ts.class_for_name(&dotted(name)).map(Type::Class))
            .collect::<Result<Vec<_>>>()?;
        ts.update_class(id, |c| {
            c.super_type = super_type;
            c.interfaces = interfaces;
        });
        ts.mark_stage(id, Stage::SupertypesResolved);
        Ok(())
    }

    fn init_members(&self, ts: &TypeSystem, id: ClassId) -> Result<()> {
        let raw = self.raw()?;
        let this_name = dotted(&raw.name);
        let this = Type::Class(id);

        let mut member_classes = Vec::new();
        for ic in &raw.inner_classes {
            let inner_name = dotted(&ic.name);
            if ic.outer.as_deref().map(dotted).as_deref() != Some(this_name.as_str()) {
                continue;
            }
            let anonymous = inner_name
                .rsplit_once('$')
                .map_or(false, |(_, last)| last.starts_with(|c: char| c.is_ascii_digit()));
            if anonymous {
                continue;
            }
            let member = ts.class_for_name(&inner_name)?;
            if ts.kind(member).is_member() {
                member_classes.push(member);
            }
        }

        let mut fields = Vec::new();
        for field in &raw.fields {
            if field.name.starts_with("jlc$") || field.synthetic {
                continue;
            }
            let ty = descriptor_type(ts, &parse_field_descriptor(&field.descriptor)?)?;
            let flags = Flags::from_field_bits(field.access_flags);
            fields.push(FieldInstance::new(this.clone(), flags, ty, field.name.clone()).with_position(ts.position(id)));
        }

        let synthetic_fields = raw.fields.iter().filter(|f| f.synthetic).count();
        let inner = ts.kind(id).is_nested() && !ts.flags(id).is_static();
        let class_name = ts.class_name(id);

        let mut methods = Vec::new();
        let mut constructors = Vec::new();
        for method in &raw.methods {
            if method.synthetic || method.name == "<clinit>" {
                continue;
            }
            let (params, ret) = parse_method_descriptor(&method.descriptor)?;
            let mut formals = params
                .iter()
                .map(|d| descriptor_type(ts, d))
                .collect::<Result<Vec<_>>>()?;
            let throws = method
                .exceptions
                .iter()
                .map(|e| ts.class_for_name(&dotted(e)).map(Type::Class))
                .collect::<Result<Vec<_>>>()?;
            let flags = Flags::from_method_bits(method.access_flags);
            if method.name == "<init>" {
                // Leading parameters of inner-class constructors feed synthetic fields.
                if inner && synthetic_fields <= formals.len() {
                    formals.drain(..synthetic_fields);
                }
                constructors.push(ConstructorInstance::new(this.clone(), class_name.clone(), flags, formals, throws));
            } else {
                let ret = descriptor_type(ts, &ret)?;
                methods.push(MethodInstance::new(this.clone(), flags, ret, method.name.clone(), formals, throws));
            }
        }

        ts.update_class(id, |c| {
            c.member_classes = member_classes;
            c.fields = fields;
            c.methods = methods;
            c.constructors = constructors;
        });
        ts.mark_stage(id, Stage::MembersAdded);
        ts.mark_stage(id, Stage::SignaturesResolved);
        Ok(())
    }

    fn init_all_members(&self, ts: &TypeSystem, id: ClassId) -> Result<()> {
        let mut supers = ts.interfaces(id)?;
        supers.extend(ts.super_type(id)?);
        for sup in supers.iter().filter_map(Type::as_class) {
            ts.ensure_all_members(sup)?;
        }
        ts.mark_stage(id, Stage::AllMembersAdded);
        Ok(())
    }
}

impl LazyClassInitializer for ClassFileInitializer {
    fn initialize(&self, ts: &TypeSystem, id: ClassId, stage: Stage) -> Result<()> {
        match stage {
            Stage::SupertypesResolved => self.init_supertypes(ts, id),
            Stage::MembersAdded | Stage::SignaturesResolved => self.init_members(ts, id),
            Stage::AllMembersAdded => self.init_all_members(ts, id),
        }
    }

    fn from_class_file(&self) -> bool {
        true
    }
}

/// Kind and simple name of a nested class from its `$`-separated binary name
fn nested_kind(outer: ClassId, class_name: &str, inner: &str) -> (ClassKind, String) {
    let mut kind = ClassKind::TopLevel;
    for token in class_name.split('$').filter(|t| !t.is_empty()) {
        let digits = token.chars().take_while(char::is_ascii_digit).count();
        kind = if digits == token.len() {
            ClassKind::Anonymous { outer }
        } else if digits > 0 || kind.is_anonymous() {
            ClassKind::Local { outer, scope: None }
        } else {
            ClassKind::Member { outer }
        };
    }
    let simple = match kind {
        ClassKind::Anonymous { .. } => String::new(),
        _ => inner.trim_start_matches(|c: char| c.is_ascii_digit()).to_string(),
    };
    (kind, simple)
}

fn descriptor_type(ts: &TypeSystem, descriptor: &Descriptor) -> Result<Type> {
    Ok(match descriptor {
        Descriptor::Primitive(p) => Type::Primitive(*p),
        Descriptor::Class(name) => Type::Class(ts.class_for_name(name)?),
        Descriptor::Array(base) => Type::array_of(descriptor_type(ts, base)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::class_file::{MemoryClassFile, RawClassInfo, RawInnerClass, RawMember};
    use crate::types::test_support::Fixture;
    use crate::types::MemberInstance;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_kind() {
        let outer = ClassId(0);
        assert_eq!(nested_kind(outer, "C$I", "I"), (ClassKind::Member { outer }, "I".into()));
        assert_eq!(nested_kind(outer, "C$1", "1"), (ClassKind::Anonymous { outer }, String::new()));
        assert_eq!(
            nested_kind(outer, "C$1$D", "D"),
            (ClassKind::Local { outer, scope: None }, "D".into())
        );
        assert_eq!(
            nested_kind(outer, "C$1Local", "1Local"),
            (ClassKind::Local { outer, scope: None }, "Local".into())
        );
    }

    #[test]
    fn test_scheduler_initializer_signals_once() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let shell = ClassData::shell(
            "S",
            None,
            ClassKind::TopLevel,
            Flags::NONE,
            Rc::new(SchedulerClassInitializer),
        );
        let id = ts.add_class(shell);
        let init = SchedulerClassInitializer;

        let need = init.check(ts, id, Stage::SupertypesResolved).unwrap_err();
        assert_eq!(need, NeedsGoal::stage(id, Stage::SupertypesResolved));
        match ts.super_type(id) {
            Err(Error::MissingDependency(n)) => assert_eq!(n, need),
            other => panic!("expected missing dependency, got {:?}", other),
        }

        ts.update_class(id, |c| c.super_type = Some(Type::Class(fx.object)));
        ts.mark_stage(id, Stage::SupertypesResolved);
        assert!(init.check(ts, id, Stage::SupertypesResolved).is_ok());
        assert_eq!(ts.super_type(id).unwrap(), Some(Type::Class(fx.object)));
        assert_eq!(ts.super_type(id).unwrap(), Some(Type::Class(fx.object)));
    }

    #[test]
    fn test_scheduler_signatures_from_canonical_members() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let id = ts.add_class(ClassData::shell(
            "S",
            None,
            ClassKind::TopLevel,
            Flags::NONE,
            Rc::new(SchedulerClassInitializer),
        ));
        ts.update_class(id, |c| c.fields.push(FieldInstance::new(Type::Class(id), Flags::NONE, Type::int(), "x")));
        ts.mark_stage(id, Stage::MembersAdded);
        assert_eq!(ts.fields(id).unwrap().len(), 1);
        assert!(ts.has_stage(id, Stage::SignaturesResolved));
    }

    #[test]
    fn test_raw_class_file() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let raw = RawClassInfo {
            name: "r.Raw".into(),
            access_flags: 0x0021,
            super_class: Some("java/lang/Object".into()),
            interfaces: vec![],
            inner_classes: vec![],
            fields: vec![
                RawMember {
                    name: "count".into(),
                    descriptor: "I".into(),
                    access_flags: 0x0001,
                    synthetic: false,
                    exceptions: vec![],
                },
                RawMember {
                    name: "jlc$ClassType$jltc".into(),
                    descriptor: "Ljava/lang/String;".into(),
                    access_flags: 0x0019,
                    synthetic: false,
                    exceptions: vec![],
                },
            ],
            methods: vec![
                RawMember {
                    name: "<init>".into(),
                    descriptor: "()V".into(),
                    access_flags: 0x0001,
                    synthetic: false,
                    exceptions: vec![],
                },
                RawMember {
                    name: "names".into(),
                    descriptor: "(I)[Ljava/lang/String;".into(),
                    access_flags: 0x0081,
                    synthetic: false,
                    exceptions: vec![],
                },
            ],
        };
        let file: Rc<dyn ClassFile> = Rc::new(MemoryClassFile {
            name: "r.Raw".into(),
            raw: Some(raw),
            ..Default::default()
        });
        let id = ClassFileInitializer::create(ts, file).unwrap();
        assert_eq!(ts.system().check("r.Raw"), Some(Named::Class(id)));
        assert_eq!(ts.super_type(id).unwrap(), Some(Type::Class(fx.object)));
        let fields = ts.fields(id).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].ty(), &Type::int());
        let methods = ts.methods(id).unwrap();
        assert_eq!(methods[0].return_type(), &Type::array_of(Type::Class(fx.string)));
        assert_eq!(methods[0].flags(), Flags::PUBLIC);
        assert_eq!(ts.flags(id), Flags::PUBLIC);
        assert_eq!(ts.constructors(id).unwrap().len(), 1);
        ts.ensure_all_members(id).unwrap();
    }

    #[test]
    fn test_raw_member_class() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let inner_entry = RawInnerClass {
            name: "r/Out$In".into(),
            outer: Some("r/Out".into()),
            access_flags: 0x0009,
        };
        let outer = MemoryClassFile {
            name: "r.Out".into(),
            raw: Some(RawClassInfo {
                name: "r/Out".into(),
                access_flags: 0x0001,
                super_class: None,
                interfaces: vec![],
                inner_classes: vec![inner_entry.clone()],
                fields: vec![],
                methods: vec![],
            }),
            ..Default::default()
        };
        let inner = MemoryClassFile {
            name: "r.Out$In".into(),
            raw: Some(RawClassInfo {
                name: "r/Out$In".into(),
                access_flags: 0x0001,
                super_class: None,
                interfaces: vec![],
                inner_classes: vec![inner_entry],
                fields: vec![],
                methods: vec![],
            }),
            ..Default::default()
        };
        fx.class_path.borrow_mut().add(Rc::new(outer));
        fx.class_path.borrow_mut().add(Rc::new(inner));

        let out = ts.class_for_name("r.Out").unwrap();
        let members = ts.member_classes(out).unwrap();
        assert_eq!(members.len(), 1);
        let inn = members[0];
        assert_eq!(ts.kind(inn), ClassKind::Member { outer: out });
        assert_eq!(ts.full_name(inn), "r.Out.In");
        assert!(ts.flags(inn).is_static());
        assert_eq!(ts.class_for_name("r.Out.In").unwrap(), inn);
    }
}
