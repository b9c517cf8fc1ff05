//! # cmdb
//!
//! An in-memory configuration management database: configuration items
//! (CIs) arranged on named levels, connected by typed and weighted
//! relationships, persisted to a flat binary file.
//!
//! ## Core Principles
//!
//! - **Explicit ownership**: one [`Cmdb`] handle owns all entities and indices
//! - **Indexed lookups**: property and reverse-dependency indices stay in step
//!   with every mutation
//! - **Crash-safe saves**: a rename guard keeps the previous snapshot readable
//!   until the new one is fully written
//! - **Background flush**: dirty state is saved periodically and on shutdown
//!
//! ## Architecture
//!
//! ```text
//! HTTP adapter (cmdb-server)
//!     ↓
//! Store (levels, CIs, relationships, queries, autosave)
//!     ↓
//! Snapshot codec (little-endian binary)
//!     ↓
//! Storage Backend (file, memory)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use cmdb::{Ci, Cmdb, CiFilter};
//!
//! let cmdb = Cmdb::open("./cmdb.bin").unwrap();
//! let physical = cmdb.add_level("Physical Layer").unwrap();
//! cmdb.add_ci(
//!     Ci::new("srv-1", "Host 1", "Server")
//!         .with_level(physical)
//!         .with_property("os", "linux"),
//! )
//! .unwrap();
//!
//! let linux = cmdb.find_cis(&CiFilter::new().has_property("os"));
//! assert_eq!(linux.len(), 1);
//! cmdb.close().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod storage;
pub mod store;

// Re-export main types
pub use config::{StoreConfig, DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_LEVELS, MIN_AUTOSAVE_INTERVAL};
pub use error::{CmdbError, Result};
pub use model::{
    Ci, CiUpdate, PropertyMap, Relationship, DEFAULT_WEIGHT, MAX_LEVELS, WILDCARD,
};
pub use query::{CiFilter, RelationshipFilter};
pub use storage::codec::Snapshot;
pub use storage::{FileBackend, MemoryBackend, StorageBackend};
pub use store::Cmdb;
