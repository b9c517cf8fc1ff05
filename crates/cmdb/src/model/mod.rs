//! Entity types managed by the store.
//!
//! - [`Ci`]: a configuration item with id, name, type, level and properties
//! - [`Relationship`]: a typed, weighted, directed edge between two CIs
//! - [`PropertyMap`]: string-valued CI metadata

mod ci;
mod property;
mod relationship;

pub use ci::{Ci, CiUpdate, MAX_LEVELS};
pub use property::PropertyMap;
pub use relationship::{Relationship, DEFAULT_WEIGHT, WILDCARD};
