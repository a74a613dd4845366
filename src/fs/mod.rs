//! Filesystem abstraction so catalogs and the dependency graph can run
//! against an in-memory tree in tests.

mod mock;
mod real;
mod r#trait;

pub use mock::MockFileSystem;
pub use r#trait::{DirEntry, EntryKind, FileSystem};
pub use real::RealFileSystem;
