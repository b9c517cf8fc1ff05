//! The store: entity ownership, indices, traversal and autosave.

mod autosave;
mod cmdb;
mod index;
mod traversal;

pub use cmdb::Cmdb;
