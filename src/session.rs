//! Compilation session
//!
//! Wires the resolver chain, the worklist scheduler and the declaration
//! passes around one `TypeSystem`. A session is built empty or from a
//! universe file listing source declarations and compiled class files.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::config::TypeSystemConfig;
use crate::frontend::class_file::{MemoryClassFile, MemoryClassPath};
use crate::frontend::decl::DeclPasses;
use crate::frontend::scheduler::require;
use crate::frontend::source::{MemorySourceLoader, SourceFile};
use crate::frontend::worklist::WorklistScheduler;
use crate::resolve::{CompoundResolver, SourceClassResolver, TableResolver, TopLevelResolver};
use crate::types::{ClassId, Type, TypeSystem};
use crate::utils::{Error, Result};

/// Declarations available to a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Universe {
    pub sources: Vec<SourceFile>,
    pub class_files: Vec<MemoryClassFile>,
}

impl Universe {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::semantic(format!("invalid universe {}: {}", path.display(), e), None))
    }
}

pub struct Session {
    pub ts: TypeSystem,
    /// Classes declared from source
    pub table: Rc<TableResolver>,
    pub class_path: Rc<RefCell<MemoryClassPath>>,
    pub sources: Rc<RefCell<MemorySourceLoader>>,
    pub scheduler: Rc<WorklistScheduler>,
}

impl Session {
    pub fn new(config: TypeSystemConfig) -> Self {
        let table = Rc::new(TableResolver::new());
        let class_path = Rc::new(RefCell::new(MemoryClassPath::new()));
        let sources = Rc::new(RefCell::new(MemorySourceLoader::new()));
        let source_resolver = SourceClassResolver::new(class_path.clone(), sources.clone());
        let chain: Vec<Rc<dyn TopLevelResolver>> = vec![table.clone(), Rc::new(source_resolver)];
        let scheduler = Rc::new(WorklistScheduler::new(Rc::new(DeclPasses::new(table.clone()))));
        let ts = TypeSystem::new(config, Rc::new(CompoundResolver::new(chain)), scheduler.clone());
        Self { ts, table, class_path, sources, scheduler }
    }

    pub fn from_universe(config: TypeSystemConfig, universe: Universe) -> Self {
        let session = Self::new(config);
        log::info!(
            "universe: {} source files, {} class files",
            universe.sources.len(),
            universe.class_files.len()
        );
        for source in universe.sources {
            session.sources.borrow_mut().add(source);
        }
        for file in universe.class_files {
            session.class_path.borrow_mut().add(Rc::new(file));
        }
        session
    }

    /// Look up a class, scheduling whatever source work it needs
    pub fn class(&self, name: &str) -> Result<ClassId> {
        require(&self.ts, || self.ts.class_for_name(name))
    }

    /// Parse a written type such as `int[]` or `java.lang.String`
    pub fn type_named(&self, name: &str) -> Result<Type> {
        require(&self.ts, || self.ts.type_for_name(name))
    }

    /// Bring every scheduled source class to completion
    pub fn compile_all(&self) -> Result<()> {
        self.scheduler.compile_all(&self.ts)
    }
}
