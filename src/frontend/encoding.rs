//! Embedded class metadata
//!
//! A compiled class carries its fully resolved signature as a JSON document
//! keyed by compiler name. Type references are written as source names and
//! resolved through the system resolver on the way back in.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::frontend::source::{ConstructorDecl, FieldDecl, MethodDecl};
use crate::types::initializer::EncodedClassInitializer;
use crate::types::{
    ClassData, ClassId, ClassKind, ConstructorInstance, FieldInstance, Flags, MemberInstance, MethodInstance, Named,
    Package, ProcedureInstance, Stage, Type, TypeSystem,
};
use crate::utils::{Error, Position, Result};

/// The metadata document of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedClass {
    pub version: String,
    /// Binary name, `p.C$I`
    pub name: String,
    /// Binary name of the enclosing class of a member class
    #[serde(default)]
    pub outer: Option<String>,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub super_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    /// Binary names of member classes
    #[serde(default)]
    pub member_classes: Vec<String>,
}

// ==================== Encoder ====================

pub struct TypeEncoder<'ts> {
    ts: &'ts TypeSystem,
}

impl<'ts> TypeEncoder<'ts> {
    pub fn new(ts: &'ts TypeSystem) -> Self {
        Self { ts }
    }

    /// Snapshot a resolved top-level or member class
    pub fn encode_class(&self, id: ClassId) -> Result<EncodedClass> {
        let ts = self.ts;
        let name = match ts.kind(id) {
            ClassKind::TopLevel | ClassKind::Member { .. } => ts.transformed_class_name(id),
            ClassKind::Local { .. } | ClassKind::Anonymous { .. } => None,
        }
        .ok_or_else(|| Error::semantic(format!("Cannot encode {}.", ts.full_name(id)), ts.position(id)))?;
        let outer = ts.outer(id).and_then(|o| ts.transformed_class_name(o));

        let super_type = ts.super_type(id)?.map(|t| ts.type_name(&t));
        let interfaces = ts.type_names(&ts.interfaces(id)?);
        let fields = ts
            .fields(id)?
            .iter()
            .map(|f| FieldDecl { name: f.name().to_string(), flags: f.flags(), ty: ts.type_name(f.ty()) })
            .collect();
        let methods = ts
            .methods(id)?
            .iter()
            .map(|m| MethodDecl {
                name: m.name().to_string(),
                flags: m.flags(),
                returns: ts.type_name(m.return_type()),
                params: ts.type_names(m.formal_types()),
                throws: ts.type_names(m.throw_types()),
            })
            .collect();
        let constructors = ts
            .constructors(id)?
            .iter()
            .map(|c| ConstructorDecl {
                flags: c.flags(),
                params: ts.type_names(c.formal_types()),
                throws: ts.type_names(c.throw_types()),
            })
            .collect();
        let member_classes = ts
            .member_classes(id)?
            .into_iter()
            .filter_map(|m| ts.transformed_class_name(m))
            .collect();

        Ok(EncodedClass {
            version: ts.config().version.to_string(),
            name,
            outer,
            flags: ts.flags(id),
            super_type,
            interfaces,
            fields,
            methods,
            constructors,
            member_classes,
        })
    }

    pub fn encode(&self, id: ClassId) -> Result<String> {
        let encoded = self.encode_class(id)?;
        serde_json::to_string(&encoded).map_err(|e| Error::BadEncoding { class: encoded.name, message: e.to_string() })
    }
}

// ==================== Decoder ====================

pub struct TypeDecoder<'ts> {
    ts: &'ts TypeSystem,
}

impl<'ts> TypeDecoder<'ts> {
    pub fn new(ts: &'ts TypeSystem) -> Self {
        Self { ts }
    }

    /// Rebuild the class stored in `text`, expected to be `binary_name`
    ///
    /// The shell is installed before any referenced type is resolved, so
    /// cycles through the system resolver come back to it.
    pub fn decode(&self, text: &str, binary_name: &str) -> Result<ClassId> {
        let ts = self.ts;
        let bad = |message: String| Error::BadEncoding { class: binary_name.to_string(), message };
        let enc: EncodedClass = serde_json::from_str(text).map_err(|e| bad(e.to_string()))?;
        if enc.name != binary_name {
            return Err(bad(format!("metadata describes \"{}\"", enc.name)));
        }
        log::debug!("decoding {}", enc.name);

        let (kind, package, simple) = match &enc.outer {
            Some(outer_name) => {
                let outer = ts.class_for_name(outer_name)?;
                // Loading the outer class may have loaded this one.
                if let Some(Named::Class(id)) = ts.system().check(&enc.name) {
                    return Ok(id);
                }
                let simple = enc
                    .name
                    .strip_prefix(outer_name.as_str())
                    .and_then(|rest| rest.strip_prefix('$'))
                    .ok_or_else(|| bad(format!("\"{}\" is not a member of \"{}\"", enc.name, outer_name)))?;
                (ClassKind::Member { outer }, ts.package(outer), simple.to_string())
            }
            None => match enc.name.rsplit_once('.') {
                Some((package, simple)) => (ClassKind::TopLevel, Some(Package::new(package)), simple.to_string()),
                None => (ClassKind::TopLevel, None, enc.name.clone()),
            },
        };

        let mut data = ClassData::shell(simple, package, kind, enc.flags, Rc::new(EncodedClassInitializer));
        data.binary_name = Some(enc.name.clone());
        data.position = Some(Position::file(format!("{}.class", enc.name.replace('.', "/"))));
        let id = ts.add_class(data);
        ts.system().add_named(ts, &enc.name, Named::Class(id))?;
        let full = ts.full_name(id);
        if full != enc.name {
            ts.system().add_named(ts, &full, Named::Class(id))?;
        }

        self.populate(id, &enc)?;
        Ok(id)
    }

    fn populate(&self, id: ClassId, enc: &EncodedClass) -> Result<()> {
        let ts = self.ts;
        let this = Type::Class(id);
        let types = |names: &[String]| names.iter().map(|n| ts.type_for_name(n)).collect::<Result<Vec<_>>>();

        let super_type = enc.super_type.as_deref().map(|n| ts.type_for_name(n)).transpose()?;
        let interfaces = types(&enc.interfaces)?;
        let fields = enc
            .fields
            .iter()
            .map(|f| Ok(FieldInstance::new(this.clone(), f.flags, ts.type_for_name(&f.ty)?, f.name.clone())))
            .collect::<Result<Vec<_>>>()?;
        let methods = enc
            .methods
            .iter()
            .map(|m| {
                Ok(MethodInstance::new(
                    this.clone(),
                    m.flags,
                    ts.type_for_name(&m.returns)?,
                    m.name.clone(),
                    types(&m.params)?,
                    types(&m.throws)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let class_name = ts.class_name(id);
        let constructors = enc
            .constructors
            .iter()
            .map(|c| {
                Ok(ConstructorInstance::new(
                    this.clone(),
                    class_name.clone(),
                    c.flags,
                    types(&c.params)?,
                    types(&c.throws)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let member_classes = enc
            .member_classes
            .iter()
            .map(|n| ts.class_for_name(n))
            .collect::<Result<Vec<_>>>()?;

        ts.update_class(id, |c| {
            c.super_type = super_type;
            c.interfaces = interfaces;
            c.fields = fields;
            c.methods = methods;
            c.constructors = constructors;
            c.member_classes = member_classes;
        });
        for stage in [Stage::SupertypesResolved, Stage::MembersAdded, Stage::SignaturesResolved] {
            ts.mark_stage(id, stage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::class_file::MemoryClassFile;
    use crate::types::test_support::Fixture;
    use crate::types::ClassBuilder;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn class_file(fx: &Fixture, name: &str, text: String) -> Rc<MemoryClassFile> {
        let mut encoded = HashMap::new();
        encoded.insert(fx.ts.config().version.name.clone(), text);
        Rc::new(MemoryClassFile {
            name: name.into(),
            encoded,
            compiler_version: Some(fx.ts.config().version.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_encode_member_class() {
        let fx = Fixture::new();
        let ts = &fx.ts;
        let outer = ClassBuilder::new("e.Outer")
            .flags(Flags::PUBLIC)
            .extends(fx.object)
            .method(Flags::PUBLIC, Type::Class(fx.string), "name", vec![Type::int()])
            .build(ts);
        let inner = ClassBuilder::member(ts, outer, "In").flags(Flags::STATIC).extends(fx.object).build(ts);
        let enc = TypeEncoder::new(ts).encode_class(inner).unwrap();
        assert_eq!(enc.name, "e.Outer$In");
        assert_eq!(enc.outer.as_deref(), Some("e.Outer"));
        let enc = TypeEncoder::new(ts).encode_class(outer).unwrap();
        assert_eq!(enc.member_classes, vec!["e.Outer$In".to_string()]);
        assert_eq!(enc.methods[0].returns, "java.lang.String");
        assert_eq!(enc.methods[0].params, vec!["int".to_string()]);
        assert_eq!(enc.super_type.as_deref(), Some("java.lang.Object"));
    }

    #[test]
    fn test_decode_self_referencing_nest() {
        let source = Fixture::new();
        let outer = ClassBuilder::new("e.Node")
            .flags(Flags::PUBLIC)
            .extends(source.object)
            .build(&source.ts);
        let inner = ClassBuilder::member(&source.ts, outer, "Link")
            .flags(Flags::PUBLIC | Flags::STATIC)
            .extends(source.object)
            .field(Flags::PUBLIC, Type::Class(outer), "owner")
            .build(&source.ts);
        source.ts.update_class(outer, |c| {
            c.fields.push(FieldInstance::new(Type::Class(outer), Flags::PUBLIC, Type::Class(inner), "next"));
        });
        let outer_text = TypeEncoder::new(&source.ts).encode(outer).unwrap();
        let inner_text = TypeEncoder::new(&source.ts).encode(inner).unwrap();

        let fx = Fixture::new();
        fx.class_path.borrow_mut().add(class_file(&fx, "e.Node", outer_text));
        fx.class_path.borrow_mut().add(class_file(&fx, "e.Node$Link", inner_text));
        let ts = &fx.ts;

        let link = ts.class_for_name("e.Node.Link").unwrap();
        let node = ts.class_for_name("e.Node").unwrap();
        assert_eq!(ts.kind(link), ClassKind::Member { outer: node });
        assert_eq!(ts.member_classes(node).unwrap(), vec![link]);
        assert_eq!(ts.fields(node).unwrap()[0].ty(), &Type::Class(link));
        assert_eq!(ts.fields(link).unwrap()[0].ty(), &Type::Class(node));
        assert_eq!(ts.system().depth(), 1);
        assert_eq!(ts.system().check("e.Node$Link"), Some(Named::Class(link)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let fx = Fixture::new();
        let err = TypeDecoder::new(&fx.ts).decode("{not json", "e.X").unwrap_err();
        assert!(matches!(err, Error::BadEncoding { .. }));
        let err = TypeDecoder::new(&fx.ts)
            .decode(r#"{"version":"0.1.0","name":"e.Y"}"#, "e.X")
            .unwrap_err();
        assert!(matches!(err, Error::BadEncoding { .. }));
    }
}
