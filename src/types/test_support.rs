//! Shared fixture for type system tests

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::TypeSystemConfig;
use crate::frontend::class_file::MemoryClassPath;
use crate::frontend::source::MemorySourceLoader;
use crate::frontend::worklist::WorklistScheduler;
use crate::resolve::TableResolver;
use crate::session::Session;
use crate::types::{ClassBuilder, ClassId, Flags, MethodInstance, Named, Type, TypeSystem};

/// A session preloaded with `Object`, `String`, `Cloneable` and `Serializable`
pub struct Fixture {
    pub ts: TypeSystem,
    pub table: Rc<TableResolver>,
    pub class_path: Rc<RefCell<MemoryClassPath>>,
    pub sources: Rc<RefCell<MemorySourceLoader>>,
    pub scheduler: Rc<WorklistScheduler>,
    pub object: ClassId,
    pub string: ClassId,
    pub cloneable: ClassId,
    pub serializable: ClassId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(TypeSystemConfig::default())
    }

    pub fn with_config(config: TypeSystemConfig) -> Self {
        let Session { ts, table, class_path, sources, scheduler } = Session::new(config);
        let interface = Flags::PUBLIC | Flags::INTERFACE | Flags::ABSTRACT;

        let object = ClassBuilder::new("java.lang.Object")
            .flags(Flags::PUBLIC)
            .constructor(Flags::PUBLIC, vec![])
            .build(&ts);
        let cloneable = ClassBuilder::new("java.lang.Cloneable").flags(interface).build(&ts);
        let serializable = ClassBuilder::new("java.io.Serializable").flags(interface).build(&ts);
        let string = ClassBuilder::new("java.lang.String")
            .flags(Flags::PUBLIC | Flags::FINAL)
            .extends(object)
            .implements(serializable)
            .constructor(Flags::PUBLIC, vec![])
            .build(&ts);

        // Object's own signatures need Object and String to exist first.
        let this = Type::Class(object);
        let methods = vec![
            MethodInstance::new(this.clone(), Flags::PUBLIC, Type::boolean(), "equals", vec![this.clone()], vec![]),
            MethodInstance::new(this.clone(), Flags::PUBLIC, Type::Class(string), "toString", vec![], vec![]),
            MethodInstance::new(this.clone(), Flags::PUBLIC, Type::int(), "hashCode", vec![], vec![]),
            MethodInstance::new(this.clone(), Flags::PROTECTED, this.clone(), "clone", vec![], vec![]),
        ];
        ts.update_class(object, |c| c.methods = methods);

        for id in [object, string, cloneable, serializable] {
            table.add_named(ts.full_name(id), Named::Class(id));
        }
        Self { ts, table, class_path, sources, scheduler, object, string, cloneable, serializable }
    }
}
