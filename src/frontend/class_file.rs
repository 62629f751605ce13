//! Class file collaborators
//!
//! The binary reader itself is external; the type system only consumes what
//! a `ClassFile` exposes: optional embedded metadata, structural member info,
//! the recorded source timestamp and the compiler version that wrote it.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::Version;
use crate::types::PrimitiveKind;
use crate::utils::{Error, Result};

/// A loaded binary class
pub trait ClassFile {
    /// Binary name, `p.q.C$I`
    fn name(&self) -> &str;

    /// Embedded type metadata written by a compiler of `version.name`
    fn encoded_metadata(&self, version: &Version) -> Option<&str>;

    fn raw_member_info(&self) -> Option<&RawClassInfo>;

    /// Modification time of the source the class was compiled from
    fn source_last_modified(&self) -> u64;

    fn compiler_version(&self) -> Option<&str>;
}

/// Locates class files by name
pub trait ClassPath {
    fn load_file(&self, name: &str) -> Option<Rc<dyn ClassFile>>;

    fn package_exists(&self, name: &str) -> bool;
}

/// Structural information of a raw class file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClassInfo {
    /// Binary name with dots, `p.q.C$I`
    pub name: String,
    #[serde(default)]
    pub access_flags: u16,
    /// Internal or dotted binary name of the superclass
    #[serde(default)]
    pub super_class: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub inner_classes: Vec<RawInnerClass>,
    #[serde(default)]
    pub fields: Vec<RawMember>,
    #[serde(default)]
    pub methods: Vec<RawMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInnerClass {
    pub name: String,
    #[serde(default)]
    pub outer: Option<String>,
    #[serde(default)]
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access_flags: u16,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

/// Normalize an internal name (`java/lang/Object`) to dotted form
pub fn dotted(name: &str) -> String {
    name.replace('/', ".")
}

// ==================== Descriptors ====================

/// Element of a field or method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Primitive(PrimitiveKind),
    /// Dotted binary class name
    Class(String),
    Array(Box<Descriptor>),
}

/// Parse a sequence of concatenated field descriptors, e.g. `IJ[Ljava/lang/String;`
pub fn parse_descriptor_list(text: &str) -> Result<Vec<Descriptor>> {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;
    let mut out = Vec::new();
    while pos < chars.len() {
        out.push(parse_one(&chars, &mut pos, text)?);
    }
    Ok(out)
}

/// Parse one field descriptor
pub fn parse_field_descriptor(text: &str) -> Result<Descriptor> {
    let mut list = parse_descriptor_list(text)?;
    match list.len() {
        1 => Ok(list.remove(0)),
        _ => Err(bad_descriptor(text)),
    }
}

/// Parse a method descriptor `(params)return`
pub fn parse_method_descriptor(text: &str) -> Result<(Vec<Descriptor>, Descriptor)> {
    let rest = text.strip_prefix('(').ok_or_else(|| bad_descriptor(text))?;
    let (params, ret) = rest.split_once(')').ok_or_else(|| bad_descriptor(text))?;
    Ok((parse_descriptor_list(params)?, parse_field_descriptor(ret)?))
}

fn parse_one(chars: &[char], pos: &mut usize, text: &str) -> Result<Descriptor> {
    let c = *chars.get(*pos).ok_or_else(|| bad_descriptor(text))?;
    *pos += 1;
    match c {
        '[' => Ok(Descriptor::Array(Box::new(parse_one(chars, pos, text)?))),
        'L' => {
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != ';' {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err(bad_descriptor(text));
            }
            let name: String = chars[start..*pos].iter().collect();
            *pos += 1;
            Ok(Descriptor::Class(dotted(&name)))
        }
        other => PrimitiveKind::from_descriptor(other)
            .map(Descriptor::Primitive)
            .ok_or_else(|| bad_descriptor(text)),
    }
}

fn bad_descriptor(text: &str) -> Error {
    Error::BadEncoding {
        class: String::new(),
        message: format!("malformed descriptor \"{}\"", text),
    }
}

// ==================== In-Memory Class Path ====================

/// A class file held in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryClassFile {
    pub name: String,
    /// Embedded metadata keyed by compiler name
    #[serde(default)]
    pub encoded: HashMap<String, String>,
    #[serde(default)]
    pub raw: Option<RawClassInfo>,
    #[serde(default)]
    pub source_last_modified: u64,
    #[serde(default)]
    pub compiler_version: Option<String>,
}

impl ClassFile for MemoryClassFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn encoded_metadata(&self, version: &Version) -> Option<&str> {
        self.encoded.get(&version.name).map(String::as_str)
    }

    fn raw_member_info(&self) -> Option<&RawClassInfo> {
        self.raw.as_ref()
    }

    fn source_last_modified(&self) -> u64 {
        self.source_last_modified
    }

    fn compiler_version(&self) -> Option<&str> {
        self.compiler_version.as_deref()
    }
}

/// Class files indexed by binary name
#[derive(Default)]
pub struct MemoryClassPath {
    files: HashMap<String, Rc<dyn ClassFile>>,
}

impl MemoryClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: Rc<dyn ClassFile>) {
        self.files.insert(file.name().to_string(), file);
    }

    /// Candidate binary names for a source name: `p.C.I` also tries `p.C$I` and `p$C$I`
    fn candidates(name: &str) -> Vec<String> {
        let mut out = vec![name.to_string()];
        let mut current = name.to_string();
        while let Some(dot) = current.rfind('.') {
            current.replace_range(dot..=dot, "$");
            out.push(current.clone());
        }
        out
    }
}

impl ClassPath for MemoryClassPath {
    fn load_file(&self, name: &str) -> Option<Rc<dyn ClassFile>> {
        Self::candidates(name).iter().find_map(|n| self.files.get(n).cloned())
    }

    fn package_exists(&self, name: &str) -> bool {
        self.files.keys().any(|f| f.starts_with(name) && f[name.len()..].starts_with('.'))
    }
}

impl<T: ClassPath> ClassPath for RefCell<T> {
    fn load_file(&self, name: &str) -> Option<Rc<dyn ClassFile>> {
        self.borrow().load_file(name)
    }

    fn package_exists(&self, name: &str) -> bool {
        self.borrow().package_exists(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_descriptors() {
        assert_eq!(
            parse_descriptor_list("I[Ljava/lang/String;[[J").unwrap(),
            vec![
                Descriptor::Primitive(PrimitiveKind::Int),
                Descriptor::Array(Box::new(Descriptor::Class("java.lang.String".into()))),
                Descriptor::Array(Box::new(Descriptor::Array(Box::new(Descriptor::Primitive(PrimitiveKind::Long))))),
            ]
        );
        let (params, ret) = parse_method_descriptor("(ZLp/C;)V").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(ret, Descriptor::Primitive(PrimitiveKind::Void));
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_method_descriptor("I)V").is_err());
        assert!(parse_field_descriptor("Q").is_err());
    }

    #[test]
    fn test_class_path_member_names() {
        let mut cp = MemoryClassPath::new();
        cp.add(Rc::new(MemoryClassFile { name: "p.C$I".into(), ..Default::default() }));
        assert!(cp.load_file("p.C.I").is_some());
        assert!(cp.load_file("p.C$I").is_some());
        assert!(cp.load_file("p.D").is_none());
        assert!(cp.package_exists("p"));
        assert!(!cp.package_exists("q"));
    }
}
