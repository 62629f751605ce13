//! JL Type Core
//!
//! Type algebra, resolver chain and lazy class initialization for a
//! Java-like compiler framework.

pub mod config;
pub mod context;
pub mod frontend;
pub mod resolve;
pub mod session;
pub mod types;
pub mod utils;

pub use config::TypeSystemConfig;
pub use session::{Session, Universe};
pub use types::{ClassId, Type, TypeSystem};
pub use utils::{Error, Result};
