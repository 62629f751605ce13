//! Declaration passes
//!
//! Populates source class shells from the declarations of a `SourceFile`,
//! one goal at a time:
//!
//! - `TypesInitialized`: shells for every class of the job, installed by name
//! - `SupertypesResolved`: names in `extends`/`implements`, resolved in the
//!   enclosing scope, then checked for inheritance cycles
//! - `MembersAdded`: fields, methods and constructors with written types
//! - `SignaturesResolved`: written types resolved in the class body scope
//! - `AllMembersAdded`: supertypes complete, abstract methods implemented

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::Context;
use crate::frontend::scheduler::{require_or_stale, Goal, JobId};
use crate::frontend::source::{ClassDecl, SourceFile};
use crate::frontend::worklist::{GoalRunner, WorklistScheduler};
use crate::resolve::{ImportTable, TableResolver};
use crate::types::initializer::SchedulerClassInitializer;
use crate::types::{
    check_constructor_flags, check_field_flags, check_member_class_flags, check_method_flags,
    check_top_level_class_flags, split_array_dims, ClassData, ClassId, ClassKind, ConstructorInstance, FieldInstance,
    Flags, MethodInstance, Named, Package, PrimitiveKind, ProcedureInstance, Stage, Type, TypeSystem,
};
use crate::utils::{Error, Position, Result};

pub struct DeclPasses {
    table: Rc<TableResolver>,
    imports: RefCell<HashMap<JobId, Rc<ImportTable>>>,
    decls: RefCell<HashMap<ClassId, Rc<ClassDecl>>>,
}

impl DeclPasses {
    /// Source classes are recorded in `table` as they are declared
    pub fn new(table: Rc<TableResolver>) -> Self {
        Self {
            table,
            imports: RefCell::new(HashMap::new()),
            decls: RefCell::new(HashMap::new()),
        }
    }

    fn decl(&self, ts: &TypeSystem, class: ClassId) -> Result<Rc<ClassDecl>> {
        self.decls
            .borrow()
            .get(&class)
            .cloned()
            .ok_or_else(|| Error::semantic(format!("No declaration recorded for {}", ts.full_name(class)), None))
    }

    fn import_table(&self, ts: &TypeSystem, class: ClassId) -> Result<Rc<ImportTable>> {
        let job = ts.with_class(class, |c| c.job);
        job.and_then(|job| self.imports.borrow().get(&job).cloned())
            .ok_or_else(|| Error::semantic(format!("{} does not belong to a source job", ts.full_name(class)), None))
    }

    /// Scope of the class header: the source file and the enclosing classes
    fn header_context<'ts>(&self, ts: &'ts TypeSystem, class: ClassId) -> Result<Context<'ts>> {
        let mut cx = Context::new(ts);
        cx.push_source(self.import_table(ts, class)?);
        for outer in ts.outers(class).into_iter().rev() {
            cx.push_class(outer);
        }
        Ok(cx)
    }

    fn body_context<'ts>(&self, ts: &'ts TypeSystem, class: ClassId) -> Result<Context<'ts>> {
        let mut cx = self.header_context(ts, class)?;
        cx.push_class(class);
        Ok(cx)
    }

    // ==================== TypesInitialized ====================

    fn init_types(&self, ts: &TypeSystem, scheduler: &WorklistScheduler, job: JobId) -> Result<bool> {
        let source = scheduler
            .job_source(job)
            .ok_or_else(|| Error::semantic(format!("No source file for {}", job), None))?;
        let package = source.package.as_deref().map(Package::new);

        let mut imports = ImportTable::new(ts, package.clone(), Some(source.position()));
        for import in &source.imports {
            imports.add_import(import);
        }
        self.imports.borrow_mut().insert(job, Rc::new(imports));

        for decl in &source.classes {
            let full = match &package {
                Some(package) => format!("{}.{}", package.full_name(), decl.name),
                None => decl.name.clone(),
            };
            if let Some(Named::Class(existing)) = ts.system().check(&full) {
                if ts.with_class(existing, |c| c.job == Some(job)) {
                    continue;
                }
            }
            self.declare(ts, job, &source, decl, ClassKind::TopLevel, package.clone(), full)?;
        }
        log::debug!("{} declared the classes of {}", job, source.path);
        Ok(true)
    }

    fn declare(
        &self,
        ts: &TypeSystem,
        job: JobId,
        source: &SourceFile,
        decl: &ClassDecl,
        kind: ClassKind,
        package: Option<Package>,
        full: String,
    ) -> Result<ClassId> {
        let position = Some(Position::new(source.path.clone(), decl.line, 0));
        let mut flags = decl.flags;
        if flags.is_interface() {
            flags = flags.set(Flags::ABSTRACT);
        }
        match kind {
            ClassKind::Member { outer } => {
                if ts.is_interface(outer) {
                    flags = flags.set(Flags::PUBLIC | Flags::STATIC);
                }
                check_member_class_flags(flags, &position)?;
            }
            _ => check_top_level_class_flags(flags, &position)?,
        }

        let mut data = ClassData::shell(decl.name.clone(), package.clone(), kind, flags, Rc::new(SchedulerClassInitializer));
        data.position = position;
        data.job = Some(job);
        let id = ts.add_class(data);
        self.decls.borrow_mut().insert(id, Rc::new(decl.clone()));
        self.table.add_named(full.clone(), Named::Class(id));
        ts.system().add_named(ts, &full, Named::Class(id))?;

        for member in &decl.members {
            let name = format!("{}.{}", full, member.name);
            let child = self.declare(ts, job, source, member, ClassKind::Member { outer: id }, package.clone(), name)?;
            ts.update_class(id, |c| c.member_classes.push(child));
        }
        Ok(id)
    }

    // ==================== SupertypesResolved ====================

    fn resolve_supertypes(&self, ts: &TypeSystem, class: ClassId) -> Result<()> {
        let decl = self.decl(ts, class)?;
        let cx = self.header_context(ts, class)?;
        let position = ts.position(class);
        let is_interface = ts.is_interface(class);

        let super_type = match &decl.extends {
            Some(name) => {
                let sup = cx.resolve_type(name)?;
                let sup_id = sup
                    .as_class()
                    .filter(|id| !ts.is_interface(*id))
                    .ok_or_else(|| Error::semantic(format!("Cannot extend non-class type {}.", name), position.clone()))?;
                if is_interface {
                    return Err(Error::semantic("Interfaces cannot extend classes.", position));
                }
                if ts.flags(sup_id).is_final() {
                    return Err(Error::semantic(format!("Cannot extend final class {}.", name), position));
                }
                Some(sup)
            }
            None if is_interface || ts.is_root(class) => None,
            None => Some(ts.object_type()?),
        };
        let mut interfaces = Vec::new();
        for name in &decl.implements {
            let interface = cx.resolve_type(name)?;
            if !interface.as_class().map_or(false, |id| ts.is_interface(id)) {
                return Err(Error::semantic(format!("Cannot implement non-interface type {}.", name), position));
            }
            interfaces.push(interface);
        }

        let previous = ts.update_class(class, |c| {
            let previous = (c.super_type.take(), std::mem::take(&mut c.interfaces));
            c.super_type = super_type;
            c.interfaces = interfaces;
            previous
        });
        if let Err(e) = ts.check_cycles(class) {
            ts.update_class(class, |c| {
                c.super_type = previous.0;
                c.interfaces = previous.1;
            });
            return Err(e);
        }
        ts.mark_stage(class, Stage::SupertypesResolved);
        Ok(())
    }

    // ==================== MembersAdded ====================

    fn add_members(&self, ts: &TypeSystem, class: ClassId) -> Result<()> {
        let decl = self.decl(ts, class)?;
        let this = Type::Class(class);
        let position = ts.position(class);
        let class_flags = ts.flags(class);
        let is_interface = class_flags.is_interface();

        let mut fields = Vec::new();
        for f in &decl.fields {
            let mut flags = f.flags;
            if is_interface {
                flags = flags.set(Flags::PUBLIC | Flags::STATIC | Flags::FINAL);
            }
            check_field_flags(flags, &position)?;
            fields.push(FieldInstance::new(this.clone(), flags, written_type(&f.ty), &f.name).with_position(position.clone()));
        }

        let mut methods = Vec::new();
        for m in &decl.methods {
            let mut flags = m.flags;
            if is_interface {
                flags = flags.set(Flags::PUBLIC | Flags::ABSTRACT);
            }
            check_method_flags(flags, &position)?;
            if flags.is_abstract() && !class_flags.is_abstract() {
                return Err(Error::semantic(
                    format!("Cannot declare abstract method {} in non-abstract class {}.", m.name, ts.full_name(class)),
                    position,
                ));
            }
            let formals = m.params.iter().map(|p| written_type(p)).collect();
            let throws = m.throws.iter().map(|t| written_type(t)).collect();
            methods.push(
                MethodInstance::new(this.clone(), flags, written_type(&m.returns), &m.name, formals, throws)
                    .with_position(position.clone()),
            );
        }

        let class_name = ts.class_name(class);
        let mut constructors = Vec::new();
        for c in &decl.constructors {
            if is_interface {
                return Err(Error::semantic("Interfaces cannot have constructors.", position));
            }
            check_constructor_flags(c.flags, &position)?;
            let formals = c.params.iter().map(|p| written_type(p)).collect();
            let throws = c.throws.iter().map(|t| written_type(t)).collect();
            constructors.push(
                ConstructorInstance::new(this.clone(), class_name.clone(), c.flags, formals, throws)
                    .with_position(position.clone()),
            );
        }
        if constructors.is_empty() && !is_interface {
            let flags = class_flags.access();
            constructors.push(ConstructorInstance::new(this.clone(), class_name, flags, vec![], vec![]));
        }

        ts.update_class(class, |c| {
            c.fields = fields;
            c.methods = methods;
            c.constructors = constructors;
        });
        ts.mark_stage(class, Stage::MembersAdded);
        Ok(())
    }

    // ==================== SignaturesResolved ====================

    fn resolve_signatures(&self, ts: &TypeSystem, class: ClassId) -> Result<()> {
        let cx = self.body_context(ts, class)?;
        let (fields, methods, constructors) =
            ts.with_class(class, |c| (c.fields.clone(), c.methods.clone(), c.constructors.clone()));

        let fields = fields
            .iter()
            .map(|f| Ok(f.with_type(resolve(&cx, f.ty())?)))
            .collect::<Result<Vec<_>>>()?;
        let methods = methods
            .iter()
            .map(|m| {
                Ok(m.with_return_type(resolve(&cx, m.return_type())?)
                    .with_formals(resolve_all(&cx, m.formal_types())?)
                    .with_throws(resolve_all(&cx, m.throw_types())?))
            })
            .collect::<Result<Vec<_>>>()?;
        let constructors = constructors
            .iter()
            .map(|c| {
                Ok(c.with_formals(resolve_all(&cx, c.formal_types())?)
                    .with_throws(resolve_all(&cx, c.throw_types())?))
            })
            .collect::<Result<Vec<_>>>()?;

        ts.update_class(class, |c| {
            c.fields = fields;
            c.methods = methods;
            c.constructors = constructors;
        });
        ts.mark_stage(class, Stage::SignaturesResolved);
        Ok(())
    }

    // ==================== AllMembersAdded ====================

    fn check_all_members(&self, ts: &TypeSystem, class: ClassId) -> Result<()> {
        let mut supers: Vec<Type> = ts.super_type(class)?.into_iter().collect();
        supers.extend(ts.interfaces(class)?);
        for sup in supers.iter().filter_map(Type::as_class) {
            require_or_stale(ts, || ts.ensure_all_members(sup), || ())?;
        }
        ts.check_class_conformance(class)?;
        ts.mark_stage(class, Stage::AllMembersAdded);
        Ok(())
    }
}

impl GoalRunner for DeclPasses {
    fn run(&self, ts: &TypeSystem, scheduler: &WorklistScheduler, goal: &Goal) -> Result<bool> {
        let (class, stage) = match *goal {
            Goal::TypesInitialized(job) => return self.init_types(ts, scheduler, job),
            Goal::Class { class, stage } => (class, stage),
        };
        if ts.has_stage(class, stage) {
            return Ok(true);
        }
        match stage {
            Stage::SupertypesResolved => self.resolve_supertypes(ts, class)?,
            Stage::MembersAdded => self.add_members(ts, class)?,
            Stage::SignaturesResolved => self.resolve_signatures(ts, class)?,
            Stage::AllMembersAdded => self.check_all_members(ts, class)?,
        }
        Ok(true)
    }
}

/// A written type before resolution; only primitives are known up front
fn written_type(name: &str) -> Type {
    let (base, dims) = split_array_dims(name.trim());
    match PrimitiveKind::from_name(base) {
        Some(p) => Type::array_of_dims(Type::Primitive(p), dims),
        None => Type::Unknown(name.trim().to_string()),
    }
}

fn resolve(cx: &Context<'_>, ty: &Type) -> Result<Type> {
    match ty {
        Type::Unknown(name) => cx.resolve_type(name),
        other => Ok(other.clone()),
    }
}

fn resolve_all(cx: &Context<'_>, types: &[Type]) -> Result<Vec<Type>> {
    types.iter().map(|t| resolve(cx, t)).collect()
}
