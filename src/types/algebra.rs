//! Type algebra
//!
//! Identity, subtyping, cast legality, least common ancestors and numeric
//! promotion over canonical types. Class hierarchy queries go through the
//! gated accessors, so they may signal a missing dependency.

use std::collections::HashSet;

use crate::types::{ClassId, PrimitiveKind, Type, TypeSystem};
use crate::utils::{Error, Result};

impl TypeSystem {
    fn assert_canonical(&self, ty: &Type) -> Result<()> {
        if ty.is_canonical() {
            Ok(())
        } else {
            Err(Error::NotCanonical { ty: self.type_name(ty) })
        }
    }

    /// Structural type identity
    pub fn is_same(&self, a: &Type, b: &Type) -> Result<bool> {
        self.assert_canonical(a)?;
        self.assert_canonical(b)?;
        Ok(a == b)
    }

    /// `child` and `ancestor` are distinct and `child` inherits from `ancestor`
    pub fn descends_from(&self, child: &Type, ancestor: &Type) -> Result<bool> {
        self.assert_canonical(child)?;
        self.assert_canonical(ancestor)?;
        if child == ancestor || ancestor.is_null() || !ancestor.is_reference() {
            return Ok(false);
        }
        match child {
            Type::Null => Ok(true),
            Type::Array(base) => match ancestor {
                Type::Array(ancestor_base) => {
                    if base.is_reference() && ancestor_base.is_reference() {
                        self.is_subtype(base, ancestor_base)
                    } else {
                        Ok(false)
                    }
                }
                Type::Class(id) => Ok(self.is_root(*id) || self.is_array_interface(*id)),
                _ => Ok(false),
            },
            Type::Class(id) => self.class_descends_from(*id, ancestor),
            Type::Primitive(_) | Type::Package(_) | Type::Unknown(_) => Ok(false),
        }
    }

    fn class_descends_from(&self, child: ClassId, ancestor: &Type) -> Result<bool> {
        let ancestor_id = match ancestor {
            Type::Class(id) => *id,
            _ => return Ok(false),
        };
        if self.is_root(ancestor_id) {
            return Ok(true);
        }
        if !self.is_interface(child) {
            if self.is_root(child) {
                return Ok(false);
            }
            if let Some(sup) = self.super_type(child)? {
                if self.is_subtype(&sup, ancestor)? {
                    return Ok(true);
                }
            }
        }
        for interface in self.interfaces(child)? {
            if self.is_subtype(&interface, ancestor)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_array_interface(&self, id: ClassId) -> bool {
        let name = self.full_name(id);
        self.config().array_interfaces.iter().any(|i| *i == name)
    }

    pub fn is_subtype(&self, a: &Type, b: &Type) -> Result<bool> {
        Ok(self.is_same(a, b)? || self.descends_from(a, b)?)
    }

    /// Legality of an explicit cast
    pub fn is_cast_valid(&self, from: &Type, to: &Type) -> Result<bool> {
        self.assert_canonical(from)?;
        self.assert_canonical(to)?;
        match from {
            Type::Primitive(f) => Ok(match to.as_primitive() {
                Some(t) if *f == PrimitiveKind::Void || t == PrimitiveKind::Void => false,
                Some(t) => *f == t || (f.is_numeric() && t.is_numeric()),
                None => false,
            }),
            Type::Null => Ok(to.is_reference()),
            Type::Array(from_base) => match to {
                Type::Array(to_base) => {
                    if from_base.is_primitive() {
                        return Ok(to_base == from_base);
                    }
                    if to_base.is_primitive() || from_base.is_null() || to_base.is_null() {
                        return Ok(false);
                    }
                    self.is_cast_valid(from_base, to_base)
                }
                Type::Class(_) => self.is_subtype(from, to),
                _ => Ok(false),
            },
            Type::Class(from_id) => match to {
                // Only the root and the array interfaces can hold an array.
                Type::Array(_) => self.is_subtype(to, from),
                Type::Class(to_id) => self.class_cast_valid(*from_id, *to_id),
                _ => Ok(false),
            },
            Type::Package(_) | Type::Unknown(_) => Ok(false),
        }
    }

    fn class_cast_valid(&self, from: ClassId, to: ClassId) -> Result<bool> {
        let (from_ty, to_ty) = (Type::Class(from), Type::Class(to));
        let (from_flags, to_flags) = (self.flags(from), self.flags(to));
        match (from_flags.is_interface(), to_flags.is_interface()) {
            (false, false) => Ok(self.is_subtype(&from_ty, &to_ty)? || self.is_subtype(&to_ty, &from_ty)?),
            (false, true) if from_flags.is_final() => self.is_subtype(&from_ty, &to_ty),
            (false, true) => Ok(true),
            (true, false) if to_flags.is_final() => self.is_subtype(&to_ty, &from_ty),
            (true, _) => Ok(true),
        }
    }

    /// Widening conversions only
    pub fn is_implicit_cast_valid(&self, from: &Type, to: &Type) -> Result<bool> {
        self.assert_canonical(from)?;
        self.assert_canonical(to)?;
        match from {
            Type::Primitive(f) => Ok(match to.as_primitive() {
                Some(t) => *f == t || f.widens_to().contains(&t),
                None => false,
            }),
            Type::Null => Ok(to.is_reference()),
            Type::Array(from_base) => match to {
                Type::Array(to_base) => {
                    if from_base.is_primitive() || to_base.is_primitive() {
                        Ok(from_base == to_base)
                    } else {
                        self.is_implicit_cast_valid(from_base, to_base)
                    }
                }
                _ => self.is_subtype(from, to),
            },
            Type::Class(_) => match to {
                Type::Class(_) => self.is_subtype(from, to),
                _ => Ok(false),
            },
            Type::Package(_) | Type::Unknown(_) => Ok(false),
        }
    }

    /// Least common ancestor of two types
    pub fn least_common_ancestor(&self, a: &Type, b: &Type) -> Result<Type> {
        self.assert_canonical(a)?;
        self.assert_canonical(b)?;
        if a == b {
            return Ok(a.clone());
        }
        let no_ancestor = || Error::NoCommonAncestor(self.type_name(a), self.type_name(b));

        if let (Some(p), Some(q)) = (a.as_primitive(), b.as_primitive()) {
            if !p.is_numeric() || !q.is_numeric() {
                return Err(no_ancestor());
            }
            if p.widens_to().contains(&q) {
                return Ok(b.clone());
            }
            if q.widens_to().contains(&p) {
                return Ok(a.clone());
            }
            use PrimitiveKind::{Byte, Char, Short};
            return match (p, q) {
                (Char, Byte) | (Byte, Char) | (Char, Short) | (Short, Char) => Ok(Type::int()),
                _ => Err(no_ancestor()),
            };
        }

        if let (Type::Array(a_base), Type::Array(b_base)) = (a, b) {
            if a_base.is_primitive() || b_base.is_primitive() {
                return self.object_type();
            }
            return Ok(Type::array_of(self.least_common_ancestor(a_base, b_base)?));
        }

        if a.is_reference() && b.is_null() {
            return Ok(a.clone());
        }
        if b.is_reference() && a.is_null() {
            return Ok(b.clone());
        }

        if a.is_reference() && b.is_reference() {
            let object = self.object_type()?;
            // Interfaces are not searched.
            let is_interface = |t: &Type| t.as_class().map_or(false, |id| self.is_interface(id));
            if is_interface(a) || is_interface(b) {
                return Ok(object);
            }
            if *a == object {
                return Ok(a.clone());
            }
            if *b == object {
                return Ok(b.clone());
            }
            if self.is_subtype(a, b)? {
                return Ok(b.clone());
            }
            if self.is_subtype(b, a)? {
                return Ok(a.clone());
            }
            let left = self.least_common_ancestor(&self.reference_super(a)?, b)?;
            let right = self.least_common_ancestor(&self.reference_super(b)?, a)?;
            return Ok(if left == right { left } else { object });
        }

        Err(no_ancestor())
    }

    /// Supertype of a non-root reference type; arrays extend the root
    fn reference_super(&self, ty: &Type) -> Result<Type> {
        match ty {
            Type::Class(id) => match self.super_type(*id)? {
                Some(sup) => Ok(sup),
                None => self.object_type(),
            },
            _ => self.object_type(),
        }
    }

    /// Unary numeric promotion
    pub fn promote(&self, ty: &Type) -> Result<Type> {
        use PrimitiveKind::{Byte, Char, Short};
        match ty.as_primitive() {
            Some(Byte | Short | Char) => Ok(Type::int()),
            Some(p) if p.is_numeric() => Ok(ty.clone()),
            _ => Err(Error::NotNumeric(self.type_name(ty))),
        }
    }

    /// Binary numeric promotion
    pub fn promote_binary(&self, a: &Type, b: &Type) -> Result<Type> {
        use PrimitiveKind::{Double, Float, Long};
        let p = self.promote(a)?.as_primitive();
        let q = self.promote(b)?.as_primitive();
        let wider = [Double, Float, Long].into_iter().find(|k| p == Some(*k) || q == Some(*k));
        Ok(wider.map_or_else(Type::int, Type::Primitive))
    }

    /// Whether an integral literal `value` fits in `ty`
    pub fn numeric_conversion_valid(&self, ty: &Type, value: i64) -> bool {
        match ty.as_primitive() {
            Some(PrimitiveKind::Long) => true,
            Some(PrimitiveKind::Int) => i32::try_from(value).is_ok(),
            Some(PrimitiveKind::Char) => u16::try_from(value).is_ok(),
            Some(PrimitiveKind::Short) => i16::try_from(value).is_ok(),
            Some(PrimitiveKind::Byte) => i8::try_from(value).is_ok(),
            _ => false,
        }
    }

    // ==================== Nesting ====================

    /// `inner` is lexically nested, at any depth, inside `outer`
    pub fn is_enclosed(&self, inner: ClassId, outer: ClassId) -> bool {
        self.outers(inner).contains(&outer)
    }

    /// A nested class that is not static
    pub fn is_inner_class(&self, id: ClassId) -> bool {
        let kind = self.kind(id);
        kind.is_nested() && !(kind.is_member() && self.flags(id).is_static())
    }

    /// Instances of `inner` carry an enclosing instance of `encl`
    pub fn has_enclosing_instance(&self, inner: ClassId, encl: ClassId) -> bool {
        if inner == encl {
            return true;
        }
        if !self.is_inner_class(inner) || self.with_class(inner, |c| c.in_static_context) {
            return false;
        }
        self.outer(inner).map_or(false, |outer| self.has_enclosing_instance(outer, encl))
    }

    /// Reject inheritance cycles through supertypes, interfaces and outer classes
    ///
    /// Walks whatever supertypes are currently known, so it can run while the
    /// hierarchy is still being resolved.
    pub fn check_cycles(&self, goal: ClassId) -> Result<()> {
        let mut visited = HashSet::new();
        self.check_cycles_from(goal, goal, &mut visited)
    }

    fn check_cycles_from(&self, current: ClassId, goal: ClassId, visited: &mut HashSet<ClassId>) -> Result<()> {
        if !visited.insert(current) {
            return Ok(());
        }
        let (super_type, interfaces) = self.supertypes_unchecked(current);
        let parents = super_type
            .iter()
            .chain(interfaces.iter())
            .filter_map(Type::as_class)
            .collect::<Vec<_>>();
        if parents.contains(&goal) {
            return Err(Error::CyclicInheritance {
                class: self.full_name(goal),
                position: self.position(current),
            });
        }
        for parent in parents {
            self.check_cycles_from(parent, goal, visited)?;
        }
        if let Some(outer) = self.outer(current) {
            self.check_cycles_from(outer, goal, visited)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::Fixture;
    use crate::types::{ClassBuilder, Flags};
    use pretty_assertions::assert_eq;

    fn prim(kind: PrimitiveKind) -> Type {
        Type::Primitive(kind)
    }

    #[test]
    fn test_primitive_widening() {
        use PrimitiveKind::*;
        let fx = Fixture::new();
        let ts = &fx.ts;
        for p in PrimitiveKind::ALL {
            assert!(ts.is_implicit_cast_valid(&prim(p), &prim(p)).unwrap(), "{:?}", p);
        }
        assert!(ts.is_implicit_cast_valid(&prim(Byte), &prim(Short)).unwrap());
        assert!(ts.is_implicit_cast_valid(&prim(Char), &prim(Int)).unwrap());
        assert!(ts.is_implicit_cast_valid(&prim(Long), &prim(Float)).unwrap());
        assert!(!ts.is_implicit_cast_valid(&prim(Char), &prim(Short)).unwrap());
        assert!(!ts.is_implicit_cast_valid(&prim(Short), &prim(Char)).unwrap());
        assert!(!ts.is_implicit_cast_valid(&prim(Int), &prim(Boolean)).unwrap());
        assert!(!ts.is_implicit_cast_valid(&prim(Double), &prim(Float)).unwrap());
        assert!(!ts.is_implicit_cast_valid(&prim(Int), &Type::Class(fx.object)).unwrap());

        // Transitive along the chain.
        for a in PrimitiveKind::ALL {
            for b in PrimitiveKind::ALL {
                for c in PrimitiveKind::ALL {
                    let ab = ts.is_implicit_cast_valid(&prim(a), &prim(b)).unwrap();
                    let bc = ts.is_implicit_cast_valid(&prim(b), &prim(c)).unwrap();
                    if ab && bc {
                        assert!(ts.is_implicit_cast_valid(&prim(a), &prim(c)).unwrap(), "{:?} {:?} {:?}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_subtyping() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let shape = ClassBuilder::new("g.Shape").flags(Flags::PUBLIC).extends(fx.object).build(ts);
        let circle = ClassBuilder::new("g.Circle").extends(shape).implements(fx.cloneable).build(ts);
        let types = vec![
            Type::Class(fx.object),
            Type::Class(shape),
            Type::Class(circle),
            Type::Class(fx.cloneable),
            Type::Class(fx.string),
            Type::Null,
            Type::array_of(Type::Class(circle)),
            Type::array_of(Type::Class(shape)),
            Type::array_of(Type::int()),
        ];
        for a in &types {
            assert!(ts.is_subtype(a, a).unwrap());
            for b in &types {
                for c in &types {
                    if ts.is_subtype(a, b).unwrap() && ts.is_subtype(b, c).unwrap() {
                        assert!(ts.is_subtype(a, c).unwrap());
                    }
                }
            }
        }
        assert!(ts.is_subtype(&Type::Class(circle), &Type::Class(fx.cloneable)).unwrap());
        assert!(ts.is_subtype(&types[6], &types[7]).unwrap());
        assert!(ts.is_subtype(&types[8], &Type::Class(fx.serializable)).unwrap());
        assert!(!ts.is_subtype(&types[8], &Type::array_of(Type::Class(fx.object))).unwrap());
        assert!(ts.is_subtype(&Type::Null, &types[8]).unwrap());
        assert!(!ts.descends_from(&Type::Class(fx.object), &Type::Class(fx.object)).unwrap());
    }

    #[test]
    fn test_not_canonical() {
        let fx = Fixture::new();
        let err = fx.ts.is_subtype(&Type::Unknown("a.b".into()), &Type::Class(fx.object)).unwrap_err();
        assert!(matches!(err, Error::NotCanonical { .. }));
    }

    #[test]
    fn test_cast_matrix() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let open = ClassBuilder::new("g.Open").extends(fx.object).build(ts);
        let sealed = ClassBuilder::new("g.Sealed").flags(Flags::FINAL).extends(fx.object).build(ts);
        let runnable = ClassBuilder::new("g.Runnable").flags(Flags::INTERFACE | Flags::ABSTRACT).build(ts);
        let (open, sealed, runnable) = (Type::Class(open), Type::Class(sealed), Type::Class(runnable));
        let string = Type::Class(fx.string);
        let object = Type::Class(fx.object);

        assert!(ts.is_cast_valid(&open, &runnable).unwrap());
        assert!(!ts.is_cast_valid(&sealed, &runnable).unwrap());
        assert!(ts.is_cast_valid(&runnable, &open).unwrap());
        assert!(!ts.is_cast_valid(&runnable, &sealed).unwrap());
        assert!(ts.is_cast_valid(&runnable, &Type::Class(fx.cloneable)).unwrap());
        assert!(ts.is_cast_valid(&object, &string).unwrap());
        assert!(!ts.is_cast_valid(&open, &string).unwrap());
        assert!(ts.is_cast_valid(&Type::double(), &Type::int()).unwrap());
        assert!(!ts.is_cast_valid(&Type::boolean(), &Type::int()).unwrap());
        assert!(!ts.is_cast_valid(&Type::int(), &object).unwrap());
        assert!(ts.is_cast_valid(&object, &Type::array_of(Type::int())).unwrap());
        assert!(!ts.is_cast_valid(&Type::array_of(Type::int()), &Type::array_of(Type::double())).unwrap());
        assert!(ts.is_cast_valid(&Type::array_of(object.clone()), &Type::array_of(string)).unwrap());
    }

    #[test]
    fn test_least_common_ancestor() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let animal = ClassBuilder::new("z.Animal").extends(fx.object).build(ts);
        let cat = ClassBuilder::new("z.Cat").extends(animal).build(ts);
        let dog = ClassBuilder::new("z.Dog").extends(animal).build(ts);
        let puppy = ClassBuilder::new("z.Puppy").extends(dog).build(ts);
        let types = [
            Type::Class(animal),
            Type::Class(cat),
            Type::Class(dog),
            Type::Class(puppy),
            Type::Class(fx.string),
            Type::Class(fx.cloneable),
            Type::Null,
            Type::array_of(Type::Class(cat)),
            Type::array_of(Type::int()),
        ];
        for a in &types {
            for b in &types {
                let ab = ts.least_common_ancestor(a, b).unwrap();
                assert_eq!(ab, ts.least_common_ancestor(b, a).unwrap());
                assert!(ts.is_subtype(a, &ab).unwrap(), "{:?} <: {:?}", a, ab);
            }
        }
        assert_eq!(
            ts.least_common_ancestor(&Type::Class(puppy), &Type::Class(cat)).unwrap(),
            Type::Class(animal)
        );
        assert_eq!(
            ts.least_common_ancestor(&Type::array_of(Type::int()), &Type::array_of(Type::double())).unwrap(),
            Type::Class(fx.object)
        );
        assert_eq!(
            ts.least_common_ancestor(&prim(PrimitiveKind::Char), &prim(PrimitiveKind::Short)).unwrap(),
            Type::int()
        );
        assert_eq!(ts.least_common_ancestor(&Type::int(), &Type::double()).unwrap(), Type::double());
        assert!(matches!(
            ts.least_common_ancestor(&Type::boolean(), &Type::int()),
            Err(Error::NoCommonAncestor(..))
        ));
    }

    #[test]
    fn test_promotion() {
        use PrimitiveKind::*;
        let fx = Fixture::new();
        let ts = &fx.ts;
        assert_eq!(ts.promote(&prim(Char)).unwrap(), Type::int());
        assert_eq!(ts.promote(&prim(Long)).unwrap(), prim(Long));
        assert!(matches!(ts.promote(&Type::boolean()), Err(Error::NotNumeric(_))));
        assert_eq!(ts.promote_binary(&prim(Byte), &prim(Short)).unwrap(), Type::int());
        assert_eq!(ts.promote_binary(&prim(Int), &prim(Float)).unwrap(), prim(Float));
        assert_eq!(ts.promote_binary(&prim(Long), &prim(Double)).unwrap(), prim(Double));
        assert!(ts.numeric_conversion_valid(&prim(Byte), 127));
        assert!(!ts.numeric_conversion_valid(&prim(Byte), 128));
        assert!(ts.numeric_conversion_valid(&prim(Char), 65535));
        assert!(!ts.numeric_conversion_valid(&prim(Char), -1));
        assert!(!ts.numeric_conversion_valid(&prim(Float), 1));
    }

    #[test]
    fn test_enclosing_instances() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let outer = ClassBuilder::new("n.Outer").extends(fx.object).build(ts);
        let inner = ClassBuilder::member(ts, outer, "Inner").extends(fx.object).build(ts);
        let nested = ClassBuilder::member(ts, outer, "Nested").flags(Flags::STATIC).extends(fx.object).build(ts);
        let local = ClassBuilder::local(ts, inner, "Local").extends(fx.object).build(ts);
        let static_local = ClassBuilder::local(ts, outer, "Quiet").static_context().extends(fx.object).build(ts);

        assert!(ts.is_enclosed(local, outer));
        assert!(!ts.is_enclosed(outer, local));
        assert!(ts.has_enclosing_instance(local, outer));
        assert!(ts.has_enclosing_instance(inner, outer));
        assert!(!ts.has_enclosing_instance(nested, outer));
        assert!(!ts.has_enclosing_instance(static_local, outer));
    }

    #[test]
    fn test_check_cycles() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let a = ClassBuilder::new("cy.A").extends(fx.object).build(ts);
        let b = ClassBuilder::new("cy.B").extends(a).build(ts);
        assert!(ts.check_cycles(b).is_ok());
        ts.update_class(a, |c| c.super_type = Some(Type::Class(b)));
        assert!(matches!(ts.check_cycles(a), Err(Error::CyclicInheritance { .. })));
    }
}
