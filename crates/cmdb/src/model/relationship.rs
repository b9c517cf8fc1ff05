//! Typed, weighted, directed edges between configuration items.

use crate::error::Result;
use crate::storage::codec::{Decoder, Encoder};
use serde_json::{json, Value};

/// Value that matches any id or type in relationship filters.
pub const WILDCARD: &str = "*";

/// Default weight of a new relationship.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A directed relationship `source -> destination` of a given type.
///
/// Relationships have no identity of their own and are never mutated. The
/// store removes and re-adds them instead. Nothing here checks that the
/// endpoints exist; the store does that on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    source: String,
    destination: String,
    rel_type: String,
    weight: f64,
}

impl Relationship {
    /// Create a relationship with the default weight.
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            rel_type: rel_type.into(),
            weight: DEFAULT_WEIGHT,
        }
    }

    /// Builder pattern: set the weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Id of the originating CI.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Id of the target CI.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Relationship type, e.g. `runs_on`.
    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    /// Edge weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Whether this relationship touches the given CI at either end.
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.destination == id
    }

    /// Match against optional criteria; `None` and `"*"` match anything.
    pub fn matches(
        &self,
        source: Option<&str>,
        destination: Option<&str>,
        rel_type: Option<&str>,
    ) -> bool {
        fn field_matches(criterion: Option<&str>, value: &str) -> bool {
            match criterion {
                None => true,
                Some(WILDCARD) => true,
                Some(expected) => expected == value,
            }
        }

        field_matches(source, &self.source)
            && field_matches(destination, &self.destination)
            && field_matches(rel_type, &self.rel_type)
    }

    /// Structured representation used at the JSON boundary.
    pub fn as_structured(&self) -> Value {
        json!({
            "type": self.rel_type,
            "source": self.source,
            "destination": self.destination,
            "weight": self.weight,
        })
    }

    /// Append the binary encoding of this relationship.
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_str(&self.rel_type);
        enc.put_str(&self.source);
        enc.put_str(&self.destination);
        enc.put_f64(self.weight);
    }

    /// Read one relationship from the decoder.
    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let rel_type = dec.read_str()?;
        let source = dec.read_str()?;
        let destination = dec.read_str()?;
        let weight = dec.read_f64()?;
        Ok(Self {
            source,
            destination,
            rel_type,
            weight,
        })
    }
}
