//! Scope stack
//!
//! A strict stack of frames mirroring the traversal of a declaration:
//! outer, source, class, code and block. Lookups walk outward from the
//! innermost frame. A class frame answers for the members its class
//! declares or inherits; the set of names is collected lazily on the first
//! lookup that reaches the frame.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::resolve::{AccessControlResolver, ClassContextResolver, ImportTable, PackageContextResolver, Resolver};
use crate::types::{
    is_short_name, ClassId, CodeInstance, FieldInstance, LocalInstance, MethodInstance, Named, Package, Stage, Type,
    TypeSystem, VarInstance,
};
use crate::utils::{Error, MemberKind, Result};

/// Identity of one frame, used to place local classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone)]
enum FrameKind {
    Outer,
    Source(Rc<ImportTable>),
    Class(ClassId),
    Code(CodeInstance),
    Block,
}

/// Member names a class frame answers for
#[derive(Debug, Default)]
struct ClassNames {
    types: HashSet<String>,
    fields: HashSet<String>,
    methods: HashSet<String>,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    scope: ScopeId,
    static_context: bool,
    types: HashMap<String, Named>,
    vars: HashMap<String, LocalInstance>,
    names: RefCell<Option<Rc<ClassNames>>>,
}

impl Frame {
    fn new(kind: FrameKind, scope: ScopeId, static_context: bool) -> Self {
        Self {
            kind,
            scope,
            static_context,
            types: HashMap::new(),
            vars: HashMap::new(),
            names: RefCell::new(None),
        }
    }
}

pub struct Context<'ts> {
    ts: &'ts TypeSystem,
    frames: Vec<Frame>,
    next_scope: usize,
}

impl<'ts> Context<'ts> {
    pub fn new(ts: &'ts TypeSystem) -> Self {
        Self {
            ts,
            frames: vec![Frame::new(FrameKind::Outer, ScopeId(0), false)],
            next_scope: 1,
        }
    }

    fn push(&mut self, kind: FrameKind, static_context: bool) {
        let scope = ScopeId(self.next_scope);
        self.next_scope += 1;
        self.frames.push(Frame::new(kind, scope, static_context));
    }

    fn innermost(&self) -> &Frame {
        // The outer frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn innermost_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    // ==================== Push / Pop ====================

    pub fn push_source(&mut self, imports: Rc<ImportTable>) {
        self.push(FrameKind::Source(imports), false);
    }

    /// Enter the body of `class`; the class can name itself
    pub fn push_class(&mut self, class: ClassId) {
        self.push(FrameKind::Class(class), false);
        if !self.ts.kind(class).is_anonymous() {
            let name = self.ts.class_name(class);
            self.innermost_mut().types.insert(name, Named::Class(class));
        }
    }

    pub fn push_code(&mut self, code: CodeInstance) {
        let is_static = code.is_static();
        self.push(FrameKind::Code(code), is_static);
    }

    pub fn push_block(&mut self) {
        let is_static = self.innermost().static_context;
        self.push(FrameKind::Block, is_static);
    }

    /// A block in a static context, such as a field initializer
    pub fn push_static(&mut self) {
        self.push(FrameKind::Block, true);
    }

    /// Leave the innermost frame; a local class becomes visible in the
    /// enclosing block once its body is done
    pub fn pop(&mut self) -> Result<()> {
        if self.frames.len() == 1 {
            return Err(Error::semantic("Cannot pop the outermost scope.", None));
        }
        let frame = self.frames.pop();
        if let Some(Frame { kind: FrameKind::Class(class), .. }) = frame {
            if self.ts.kind(class).is_local() {
                self.add_named(class);
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ==================== Declarations ====================

    pub fn add_variable(&mut self, local: LocalInstance) {
        log::trace!("declaring local {}", local.name());
        self.innermost_mut().vars.insert(local.name().to_string(), local);
    }

    /// Declare a local class in the innermost frame
    pub fn add_named(&mut self, class: ClassId) {
        let name = self.ts.class_name(class);
        self.innermost_mut().types.insert(name, Named::Class(class));
    }

    // ==================== Queries ====================

    pub fn current_scope(&self) -> ScopeId {
        self.innermost().scope
    }

    pub fn current_class(&self) -> Option<ClassId> {
        self.frames.iter().rev().find_map(|f| match f.kind {
            FrameKind::Class(class) => Some(class),
            _ => None,
        })
    }

    /// Innermost code frame inside the current class
    pub fn current_code(&self) -> Option<&CodeInstance> {
        for frame in self.frames.iter().rev() {
            match &frame.kind {
                FrameKind::Code(code) => return Some(code),
                FrameKind::Class(_) => return None,
                _ => {}
            }
        }
        None
    }

    pub fn in_static_context(&self) -> bool {
        self.innermost().static_context
    }

    pub fn package(&self) -> Option<Package> {
        self.frames.iter().rev().find_map(|f| match &f.kind {
            FrameKind::Source(imports) => imports.package().cloned(),
            _ => None,
        })
    }

    fn import_table(&self) -> Option<&Rc<ImportTable>> {
        self.frames.iter().rev().find_map(|f| match &f.kind {
            FrameKind::Source(imports) => Some(imports),
            _ => None,
        })
    }

    /// Member names of the class of a class frame, collected on first use
    fn class_names(&self, frame: &Frame, class: ClassId) -> Result<Rc<ClassNames>> {
        if let Some(names) = frame.names.borrow().as_ref() {
            return Ok(Rc::clone(names));
        }
        let mut names = ClassNames::default();
        self.collect_names(class, &mut names, &mut HashSet::new())?;
        let names = Rc::new(names);
        *frame.names.borrow_mut() = Some(Rc::clone(&names));
        Ok(names)
    }

    fn collect_names(&self, class: ClassId, names: &mut ClassNames, visited: &mut HashSet<ClassId>) -> Result<()> {
        if !visited.insert(class) {
            return Ok(());
        }
        let ts = self.ts;
        ts.ensure_stage(class, Stage::MembersAdded)?;
        ts.with_class(class, |c| {
            names.fields.extend(c.fields.iter().map(|f| f.name().to_string()));
            names.methods.extend(c.methods.iter().map(|m| m.name().to_string()));
        });
        for member in ts.member_classes(class)? {
            if ts.kind(member).is_member() {
                names.types.insert(ts.class_name(member));
            }
        }
        let mut supers: Vec<Type> = ts.super_type(class)?.into_iter().collect();
        supers.extend(ts.interfaces(class)?);
        for sup in supers.iter().filter_map(Type::as_class) {
            self.collect_names(sup, names, visited)?;
        }
        Ok(())
    }

    /// Resolve a type name, short or qualified
    pub fn find_type(&self, name: &str) -> Result<Named> {
        let ts = self.ts;
        if !is_short_name(name) {
            return match ts.system().find(ts, name) {
                Err(e) if e.is_not_found_for(name) => match self.find_qualified(name)? {
                    Named::Package(p) if !ts.system().package_exists(ts, p.full_name()) => Err(e),
                    named => Ok(named),
                },
                other => other,
            };
        }
        let accessor = self.current_class();
        for frame in self.frames.iter().rev() {
            if let Some(named) = frame.types.get(name) {
                return Ok(named.clone());
            }
            match &frame.kind {
                FrameKind::Class(class) => {
                    if self.class_names(frame, *class)?.types.contains(name) {
                        return ClassContextResolver::new(*class).find_for(ts, name, accessor);
                    }
                }
                FrameKind::Source(imports) => return imports.find(ts, name),
                FrameKind::Outer => return ts.system().find(ts, name),
                FrameKind::Code(_) | FrameKind::Block => {}
            }
        }
        Err(Error::not_found(name))
    }

    /// Walk a dotted name from its first segment as seen in this scope
    fn find_qualified(&self, name: &str) -> Result<Named> {
        let ts = self.ts;
        let accessor = self.current_class();
        let mut segments = name.split('.');
        let first = segments.next().unwrap_or(name);
        let mut current = match self.find_type(first) {
            Err(e) if e.is_not_found_for(first) => Named::Package(Package::new(first)),
            other => other?,
        };
        for segment in segments {
            current = match current {
                Named::Class(class) => Named::Class(ts.find_member_class(class, segment, accessor)?),
                Named::Package(package) => PackageContextResolver::new(package).find_for(ts, segment, accessor)?,
            };
        }
        Ok(current)
    }

    /// Resolve a written type (`int`, `List`, `p.C[][]`) to a canonical type
    pub fn resolve_type(&self, written: &str) -> Result<Type> {
        let (base, dims) = crate::types::split_array_dims(written.trim());
        let base_type = match crate::types::PrimitiveKind::from_name(base) {
            Some(p) => Type::Primitive(p),
            None => match self.find_type(base)? {
                Named::Class(id) => Type::Class(id),
                Named::Package(p) => {
                    return Err(Error::semantic(format!("\"{}\" is a package, not a type.", p.full_name()), None))
                }
            },
        };
        Ok(Type::array_of_dims(base_type, dims))
    }

    /// A local variable or a field visible from the innermost frame
    pub fn find_variable(&self, name: &str) -> Result<VarInstance> {
        for frame in self.frames.iter().rev() {
            if let Some(local) = frame.vars.get(name) {
                return Ok(VarInstance::Local(local.clone()));
            }
            if let FrameKind::Class(class) = frame.kind {
                if self.class_names(frame, class)?.fields.contains(name) {
                    let field = self.ts.find_field(&Type::Class(class), name, self.current_class())?;
                    return Ok(VarInstance::Field(field));
                }
            }
        }
        Err(Error::semantic(format!("Variable \"{}\" not found.", name), None))
    }

    /// A local variable, never a field
    pub fn find_local(&self, name: &str) -> Result<LocalInstance> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.vars.get(name).cloned())
            .ok_or_else(|| Error::semantic(format!("Local variable \"{}\" not found.", name), None))
    }

    /// `name` is a local declared inside the current class body
    pub fn is_local(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            if frame.vars.contains_key(name) {
                return true;
            }
            if matches!(frame.kind, FrameKind::Class(_)) {
                return false;
            }
        }
        false
    }

    /// Code that declares the local `name`
    pub fn defining_code(&self, name: &str) -> Option<CodeInstance> {
        let index = self.frames.iter().rposition(|f| f.vars.contains_key(name))?;
        self.frames[..=index].iter().rev().find_map(|f| match &f.kind {
            FrameKind::Code(code) => Some(code.clone()),
            _ => None,
        })
    }

    /// Innermost class whose members include a field `name`
    pub fn find_field_scope(&self, name: &str) -> Result<ClassId> {
        for frame in self.frames.iter().rev() {
            if let FrameKind::Class(class) = frame.kind {
                if self.class_names(frame, class)?.fields.contains(name) {
                    return Ok(class);
                }
            }
        }
        Err(Error::NoSuchMember {
            kind: MemberKind::Field,
            name: name.to_string(),
            container: self.scope_description(),
        })
    }

    pub fn find_field(&self, name: &str) -> Result<FieldInstance> {
        let scope = self.find_field_scope(name)?;
        self.ts.find_field(&Type::Class(scope), name, self.current_class())
    }

    /// Innermost class with a method `name` accessible from the current class
    pub fn find_method_scope(&self, name: &str) -> Result<ClassId> {
        let accessor = self.current_class();
        for frame in self.frames.iter().rev() {
            if let FrameKind::Class(class) = frame.kind {
                if !self.class_names(frame, class)?.methods.contains(name) {
                    continue;
                }
                let container = Type::Class(class);
                let visible = match accessor {
                    Some(accessor) => self.ts.has_accessible_method_named(&container, name, accessor)?,
                    None => self.ts.has_method_named(&container, name)?,
                };
                if visible {
                    return Ok(class);
                }
            }
        }
        Err(Error::NoSuchMember {
            kind: MemberKind::Method,
            name: name.to_string(),
            container: self.scope_description(),
        })
    }

    /// Resolve an unqualified call `name(args)`
    pub fn find_method(&self, name: &str, args: &[Type]) -> Result<MethodInstance> {
        let scope = self.find_method_scope(name)?;
        self.ts.find_method(&Type::Class(scope), name, args, self.current_class())
    }

    fn scope_description(&self) -> String {
        match self.current_class() {
            Some(class) => self.ts.full_name(class),
            None => match self.import_table().and_then(|t| t.package()) {
                Some(package) => package.full_name().to_string(),
                None => "the default package".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::Fixture;
    use crate::types::{ClassBuilder, ClassKind, Flags, InitializerInstance, MemberInstance};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scopes_nest() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let class = ClassBuilder::new("cx.Holder")
            .extends(fx.object)
            .field(Flags::NONE, Type::int(), "count")
            .method(Flags::STATIC, Type::void(), "tick", vec![])
            .build(ts);
        let mut cx = Context::new(ts);
        cx.push_source(Rc::new(ImportTable::new(ts, Some(Package::new("cx")), None)));
        cx.push_class(class);
        let tick = ts.methods_named(class, "tick").unwrap().remove(0);
        cx.push_code(CodeInstance::Method(tick.clone()));
        cx.push_block();
        cx.add_variable(LocalInstance::new(Flags::NONE, Type::boolean(), "count"));

        assert!(cx.in_static_context());
        assert_eq!(cx.current_class(), Some(class));
        assert!(cx.is_local("count"));
        assert!(matches!(cx.find_variable("count").unwrap(), VarInstance::Local(_)));
        assert_eq!(cx.defining_code("count"), Some(CodeInstance::Method(tick)));

        cx.pop().unwrap();
        assert!(!cx.is_local("count"));
        match cx.find_variable("count").unwrap() {
            VarInstance::Field(field) => assert_eq!(field.container(), &Type::Class(class)),
            other => panic!("expected a field, got {:?}", other),
        }
        assert_eq!(cx.find_method_scope("tick").unwrap(), class);
        assert_eq!(cx.find_method("equals", &[Type::Class(class)]).unwrap().name(), "equals");
        assert_eq!(cx.package(), Some(Package::new("cx")));
        assert!(cx.find_local("count").is_err());

        cx.pop().unwrap();
        cx.pop().unwrap();
        cx.push_static();
        assert!(cx.in_static_context());
    }

    #[test]
    fn test_type_lookup_walks_outward() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let base = ClassBuilder::new("cx.Base").flags(Flags::PUBLIC).extends(fx.object).build(ts);
        let entry = ClassBuilder::member(ts, base, "Entry").flags(Flags::PUBLIC).extends(fx.object).build(ts);
        let derived = ClassBuilder::new("cx.Derived").extends(base).build(ts);

        let mut cx = Context::new(ts);
        cx.push_source(Rc::new(ImportTable::new(ts, Some(Package::new("cx")), None)));
        cx.push_class(derived);
        assert_eq!(cx.find_type("Entry").unwrap(), Named::Class(entry));
        assert_eq!(cx.find_type("Derived").unwrap(), Named::Class(derived));
        assert_eq!(cx.find_type("String").unwrap(), Named::Class(fx.string));
        assert_eq!(cx.resolve_type("String[]").unwrap(), Type::array_of(Type::Class(fx.string)));
        assert_eq!(cx.resolve_type("long").unwrap(), Type::Primitive(crate::types::PrimitiveKind::Long));
        assert!(cx.find_type("Nowhere").unwrap_err().is_not_found());

        fx.table.add_named("cx.Base", Named::Class(base));
        assert_eq!(cx.find_type("Base.Entry").unwrap(), Named::Class(entry));
        assert_eq!(cx.resolve_type("cx.Base.Entry").unwrap(), Type::Class(entry));
        assert!(cx.find_type("nowhere.Thing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_local_class_visible_after_body() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let outer = ClassBuilder::new("cx.Outer").extends(fx.object).build(ts);
        let mut cx = Context::new(ts);
        cx.push_class(outer);
        cx.push_code(CodeInstance::Initializer(InitializerInstance {
            container: Type::Class(outer),
            flags: Flags::NONE,
        }));
        cx.push_block();
        let scope = cx.current_scope();
        let local = ts.add_class(crate::types::ClassData::shell(
            "Helper",
            None,
            ClassKind::Local { outer, scope: Some(scope) },
            Flags::NONE,
            Rc::new(crate::types::initializer::DeserializedClassInitializer),
        ));
        ts.update_class(local, |c| c.super_type = Some(Type::Class(fx.object)));

        cx.push_class(local);
        assert_eq!(cx.find_type("Helper").unwrap(), Named::Class(local));
        cx.pop().unwrap();
        assert_eq!(cx.find_type("Helper").unwrap(), Named::Class(local));
        cx.pop().unwrap();
        assert!(cx.find_type("Helper").is_err());
    }
}
