//! Access control
//!
//! Member and class visibility from an accessing class or package.
//! Enclosing relationships ignore protection entirely: anything declared
//! within the same outermost class is visible.

use crate::types::{ClassId, Flags, MemberInstance, Package, Type, TypeSystem};
use crate::utils::Result;

impl TypeSystem {
    /// Whether `member` can be referenced from code in `accessor`
    pub fn is_accessible(&self, member: &impl MemberInstance, accessor: ClassId) -> Result<bool> {
        self.is_accessible_in(member, member.container(), accessor)
    }

    /// Like [`is_accessible`](Self::is_accessible), for a member reached
    /// through `container`, a subtype of its declaring type
    pub fn is_accessible_in(&self, member: &impl MemberInstance, container: &Type, accessor: ClassId) -> Result<bool> {
        let declared = member.container();
        let flags = member.flags();
        let target = if declared.is_class() && flags.is_public() && self.descends_from(container, declared)? {
            container
        } else {
            declared
        };
        self.flags_accessible(flags, target, accessor)
    }

    fn flags_accessible(&self, flags: Flags, target: &Type, accessor: ClassId) -> Result<bool> {
        let target = match target {
            Type::Class(id) => *id,
            // Array members are all public.
            _ => return Ok(flags.is_public()),
        };
        if !self.class_accessible(target, accessor)? {
            return Ok(false);
        }
        if target == accessor || self.is_enclosed(target, accessor) || self.is_enclosed(accessor, target) {
            return Ok(true);
        }
        if self.outers(accessor).into_iter().any(|outer| self.is_enclosed(target, outer)) {
            return Ok(true);
        }
        if flags.is_protected() {
            let target_ty = Type::Class(target);
            for class in std::iter::once(accessor).chain(self.outers(accessor)) {
                if self.descends_from(&Type::Class(class), &target_ty)? {
                    return Ok(true);
                }
            }
        }
        Ok(self.accessible_from_package(flags, self.package(target).as_ref(), self.package(accessor).as_ref()))
    }

    /// Whether the class `target` can be named from code in `accessor`
    pub fn class_accessible(&self, target: ClassId, accessor: ClassId) -> Result<bool> {
        let kind = self.kind(target);
        if let Some(outer) = kind.outer().filter(|_| kind.is_member()) {
            return self.flags_accessible(self.flags(target), &Type::Class(outer), accessor);
        }
        if !kind.is_top_level() {
            return Ok(true);
        }
        if target == accessor || self.is_enclosed(accessor, target) {
            return Ok(true);
        }
        Ok(self.class_accessible_from_package(target, self.package(accessor).as_ref()))
    }

    /// Whether `target` can be named from the outermost scope of `package`
    ///
    /// Local and anonymous classes never can.
    pub fn class_accessible_from_package(&self, target: ClassId, package: Option<&Package>) -> bool {
        let kind = self.kind(target);
        if kind.is_member() {
            match kind.outer() {
                Some(outer) if self.class_accessible_from_package(outer, package) => {}
                _ => return false,
            }
        } else if !kind.is_top_level() {
            return false;
        }
        self.accessible_from_package(self.flags(target), self.package(target).as_ref(), package)
    }

    /// Package-level visibility of `flags` declared in `declared_in`
    pub fn accessible_from_package(&self, flags: Flags, declared_in: Option<&Package>, from: Option<&Package>) -> bool {
        if flags.is_public() {
            return true;
        }
        (flags.is_package() || flags.is_protected()) && declared_in == from
    }
}

#[cfg(test)]
mod tests {
    use crate::types::test_support::Fixture;
    use crate::types::{ClassBuilder, Flags, Package, Type};

    #[test]
    fn test_private_field_access() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let a = ClassBuilder::new("acc.A").extends(fx.object).field(Flags::PRIVATE, Type::int(), "secret").build(ts);
        let b = ClassBuilder::new("acc.B").extends(fx.object).build(ts);
        let nested = ClassBuilder::member(ts, a, "Nested").flags(Flags::STATIC).extends(fx.object).build(ts);
        let deep = ClassBuilder::local(ts, nested, "Deep").extends(fx.object).build(ts);
        let secret = ts.field_named(a, "secret").unwrap().unwrap();

        assert!(ts.is_accessible(&secret, a).unwrap());
        assert!(!ts.is_accessible(&secret, b).unwrap());
        assert!(ts.is_accessible(&secret, nested).unwrap());
        assert!(ts.is_accessible(&secret, deep).unwrap());
    }

    #[test]
    fn test_sibling_nested_classes_share_privates() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let top = ClassBuilder::new("acc.Top").extends(fx.object).build(ts);
        let left = ClassBuilder::member(ts, top, "Left")
            .flags(Flags::PRIVATE)
            .extends(fx.object)
            .method(Flags::PRIVATE, Type::void(), "hidden", vec![])
            .build(ts);
        let right = ClassBuilder::member(ts, top, "Right").extends(fx.object).build(ts);
        let hidden = ts.methods_named(left, "hidden").unwrap().remove(0);
        assert!(ts.class_accessible(left, right).unwrap());
        assert!(ts.is_accessible(&hidden, right).unwrap());
    }

    #[test]
    fn test_protected_and_package_access() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let base = ClassBuilder::new("one.Base")
            .flags(Flags::PUBLIC)
            .extends(fx.object)
            .field(Flags::PROTECTED, Type::int(), "count")
            .field(Flags::NONE, Type::int(), "local")
            .build(ts);
        let derived = ClassBuilder::new("two.Derived").flags(Flags::PUBLIC).extends(base).build(ts);
        let stranger = ClassBuilder::new("two.Stranger").extends(fx.object).build(ts);
        let neighbour = ClassBuilder::new("one.Neighbour").extends(fx.object).build(ts);
        let count = ts.field_named(base, "count").unwrap().unwrap();
        let local = ts.field_named(base, "local").unwrap().unwrap();

        assert!(ts.is_accessible(&count, derived).unwrap());
        assert!(!ts.is_accessible(&count, stranger).unwrap());
        assert!(ts.is_accessible(&count, neighbour).unwrap());
        assert!(ts.is_accessible(&local, neighbour).unwrap());
        assert!(!ts.is_accessible(&local, derived).unwrap());
    }

    #[test]
    fn test_class_accessible_from_package() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let hidden = ClassBuilder::new("pk.Hidden").extends(fx.object).build(ts);
        let shown = ClassBuilder::new("pk.Shown").flags(Flags::PUBLIC).extends(fx.object).build(ts);
        let inner = ClassBuilder::member(ts, shown, "Inner").flags(Flags::PUBLIC).extends(fx.object).build(ts);
        let local = ClassBuilder::local(ts, shown, "Local").extends(fx.object).build(ts);
        let pk = Package::new("pk");
        let other = Package::new("elsewhere");

        assert!(ts.class_accessible_from_package(hidden, Some(&pk)));
        assert!(!ts.class_accessible_from_package(hidden, Some(&other)));
        assert!(!ts.class_accessible_from_package(hidden, None));
        assert!(ts.class_accessible_from_package(inner, Some(&other)));
        assert!(!ts.class_accessible_from_package(local, Some(&pk)));
    }
}
