//! Source files and class declarations
//!
//! A `SourceFile` carries the declarations a parser would produce for one
//! compilation unit: its package, imports and class headers with member
//! signatures written as unresolved type names.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::Flags;
use crate::utils::Position;

/// One compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    #[serde(default)]
    pub package: Option<String>,
    /// `a.b.C` for a single-type import, `a.b.*` for an on-demand import
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub last_modified: u64,
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
}

impl SourceFile {
    /// Full names of every class declared in the file, member classes included
    pub fn declared_names(&self) -> Vec<String> {
        fn walk(prefix: &str, decls: &[ClassDecl], out: &mut Vec<String>) {
            for decl in decls {
                let name = if prefix.is_empty() {
                    decl.name.clone()
                } else {
                    format!("{}.{}", prefix, decl.name)
                };
                walk(&name, &decl.members, out);
                out.push(name);
            }
        }
        let mut names = Vec::new();
        walk(self.package.as_deref().unwrap_or(""), &self.classes, &mut names);
        names
    }

    pub fn position(&self) -> Position {
        Position::file(self.path.clone())
    }
}

/// A class declaration header with member signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    /// Member classes
    #[serde(default)]
    pub members: Vec<ClassDecl>,
    #[serde(default)]
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(default)]
    pub flags: Flags,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default = "void_name")]
    pub returns: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub throws: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub throws: Vec<String>,
}

fn void_name() -> String {
    "void".to_string()
}

// ==================== Source Loading ====================

/// Finds the source file declaring a class
pub trait SourceLoader {
    fn class_source(&self, name: &str) -> Option<Rc<SourceFile>>;

    fn package_exists(&self, name: &str) -> bool;
}

/// Source files held in memory, indexed by declared class name
#[derive(Debug, Default)]
pub struct MemorySourceLoader {
    by_class: HashMap<String, Rc<SourceFile>>,
    packages: Vec<String>,
}

impl MemorySourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: SourceFile) {
        let source = Rc::new(source);
        if let Some(package) = &source.package {
            self.packages.push(package.clone());
        }
        for name in source.declared_names() {
            self.by_class.insert(name, Rc::clone(&source));
        }
    }
}

impl SourceLoader for MemorySourceLoader {
    fn class_source(&self, name: &str) -> Option<Rc<SourceFile>> {
        self.by_class.get(name).cloned()
    }

    fn package_exists(&self, name: &str) -> bool {
        self.packages
            .iter()
            .any(|p| p == name || p.starts_with(name) && p[name.len()..].starts_with('.'))
    }
}

impl<T: SourceLoader> SourceLoader for RefCell<T> {
    fn class_source(&self, name: &str) -> Option<Rc<SourceFile>> {
        self.borrow().class_source(name)
    }

    fn package_exists(&self, name: &str) -> bool {
        self.borrow().package_exists(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> SourceFile {
        serde_json::from_str(
            r#"{
                "path": "a/b/Outer.java",
                "package": "a.b",
                "classes": [
                    { "name": "Outer", "flags": ["public"],
                      "members": [ { "name": "Inner", "flags": ["static"] } ],
                      "methods": [ { "name": "f", "params": ["int"] } ] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_declared_names() {
        assert_eq!(sample().declared_names(), vec!["a.b.Outer.Inner", "a.b.Outer"]);
        assert_eq!(sample().classes[0].methods[0].returns, "void");
    }

    #[test]
    fn test_loader() {
        let mut loader = MemorySourceLoader::new();
        loader.add(sample());
        assert!(loader.class_source("a.b.Outer.Inner").is_some());
        assert!(loader.class_source("a.b.Other").is_none());
        assert!(loader.package_exists("a"));
        assert!(loader.package_exists("a.b"));
        assert!(!loader.package_exists("a.bc"));
    }
}
