//! Frontend module - scheduling, class files, sources and declaration passes

pub mod scheduler;
pub mod worklist;
pub mod source;
pub mod class_file;
pub mod encoding;
pub mod decl;
