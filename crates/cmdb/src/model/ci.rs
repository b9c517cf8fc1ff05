//! Configuration items and their partial-update payload.

use super::property::PropertyMap;
use crate::error::{CmdbError, Result};
use crate::storage::codec::{Decoder, Encoder};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Upper bound on the number of levels, set by the `i32` level field of the
/// snapshot format.
pub const MAX_LEVELS: usize = i32::MAX as usize;

/// A configuration item: a tracked entity such as a server or application.
///
/// The id is fixed at construction. Every setter reports whether the stored
/// state actually changed, so no-op writes can be told apart from mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ci {
    id: String,
    name: String,
    ci_type: String,
    level: usize,
    properties: PropertyMap,
}

impl Ci {
    /// Create a CI at level 0 with no properties.
    pub fn new(id: impl Into<String>, name: impl Into<String>, ci_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ci_type: ci_type.into(),
            level: 0,
            properties: PropertyMap::new(),
        }
    }

    /// Builder pattern: set the level index.
    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    /// Builder pattern: replace all properties.
    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    /// Builder pattern: add one property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form category.
    pub fn ci_type(&self) -> &str {
        &self.ci_type
    }

    /// Index into the store's level list.
    pub fn level(&self) -> usize {
        self.level
    }

    /// All properties.
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Value of one property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    /// Whether the property is present.
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Set the name. Returns `true` if it changed.
    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.name == name {
            return false;
        }
        self.name = name;
        true
    }

    /// Set the level index. Returns `true` if it changed.
    pub fn set_level(&mut self, level: usize) -> bool {
        if self.level == level {
            return false;
        }
        self.level = level;
        true
    }

    /// Set (`Some`) or delete (`None`) a property. Returns `true` if it changed.
    pub fn set_property(&mut self, key: &str, value: Option<&str>) -> bool {
        match value {
            None => self.properties.remove(key).is_some(),
            Some(value) => {
                if self.properties.get(key) == Some(value) {
                    return false;
                }
                self.properties.insert(key, value);
                true
            }
        }
    }

    /// Delete a property. Returns `true` if it existed.
    pub fn remove_property(&mut self, key: &str) -> bool {
        self.set_property(key, None)
    }

    /// Replace all properties. Returns `true` if the set differs from before.
    pub fn set_properties(&mut self, properties: PropertyMap) -> bool {
        if self.properties == properties {
            return false;
        }
        self.properties = properties;
        true
    }

    /// Apply a validated partial update. Returns `true` if anything changed.
    pub fn apply_update(&mut self, update: &CiUpdate) -> bool {
        let mut changed = false;
        if let Some(name) = &update.name {
            changed |= self.set_name(name.as_str());
        }
        if let Some(level) = update.level {
            changed |= self.set_level(level);
        }
        for (key, value) in &update.properties {
            changed |= self.set_property(key, value.as_deref());
        }
        changed
    }

    /// Validate a structured update addressed to this CI and apply it.
    ///
    /// The payload must carry this CI's `id`. Nothing is applied unless the
    /// whole payload is valid.
    pub fn apply_json_update(&mut self, payload: &Value) -> Result<bool> {
        let (id, update) = CiUpdate::from_json_with_id(payload)?;
        if id != self.id {
            return Err(CmdbError::validation(format!(
                "update addressed to '{id}' cannot be applied to '{}'",
                self.id
            )));
        }
        Ok(self.apply_update(&update))
    }

    /// Structured representation used at the JSON boundary.
    pub fn as_structured(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        json!({
            "id": self.id,
            "name": self.name,
            "type": self.ci_type,
            "level": self.level,
            "properties": properties,
        })
    }

    /// Append the binary encoding of this CI.
    ///
    /// The level is stored as an `i32`. A store never holds a level at or
    /// above [`MAX_LEVELS`], so it always fits.
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_str(&self.name);
        enc.put_str(&self.ci_type);
        enc.put_i32(i32::try_from(self.level).unwrap_or(i32::MAX));
        enc.put_len(self.properties.len());
        for (key, value) in self.properties.iter() {
            enc.put_str(key);
            enc.put_str(value);
        }
    }

    /// Read one CI from the decoder.
    ///
    /// A failed decode leaves the decoder at an unspecified position; the
    /// caller must abandon the whole snapshot.
    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let id = dec.read_str()?;
        if id.is_empty() {
            return Err(CmdbError::serialization(
                "CI with empty id",
                None::<std::io::Error>,
            ));
        }
        let name = dec.read_str()?;
        let ci_type = dec.read_str()?;
        let raw_level = dec.read_i32()?;
        let level = usize::try_from(raw_level).map_err(|e| {
            CmdbError::serialization(format!("CI '{id}' has negative level {raw_level}"), Some(e))
        })?;

        let count = dec.read_count(16)?;
        let mut properties = PropertyMap::new();
        for _ in 0..count {
            let key = dec.read_str()?;
            let value = dec.read_str()?;
            properties.insert(key, value);
        }

        Ok(Self {
            id,
            name,
            ci_type,
            level,
            properties,
        })
    }
}

/// A validated partial update of a CI.
///
/// Only fields that are present are applied. A property mapped to `None` is
/// deleted, one mapped to `Some` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CiUpdate {
    /// New name
    pub name: Option<String>,
    /// New level index
    pub level: Option<usize>,
    /// Property changes
    pub properties: BTreeMap<String, Option<String>>,
}

impl CiUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: change the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder pattern: change the level.
    pub fn level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    /// Builder pattern: set a property.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), Some(value.into()));
        self
    }

    /// Builder pattern: delete a property.
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.properties.insert(key.into(), None);
        self
    }

    /// Whether the update carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.level.is_none() && self.properties.is_empty()
    }

    /// Parse `{name?, level?, properties?}`. Unknown keys are ignored.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| CmdbError::validation("update must be a JSON object"))?;

        let name = match object.get("name") {
            None => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(_) => return Err(CmdbError::validation("field 'name' must be a string")),
        };

        let level = match object.get("level") {
            None => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|l| usize::try_from(l).ok())
                    .ok_or_else(|| {
                        CmdbError::validation("field 'level' must be a non-negative integer")
                    })?,
            ),
        };

        let mut properties = BTreeMap::new();
        match object.get("properties") {
            None => {}
            Some(Value::Object(props)) => {
                for (key, value) in props {
                    let value = match value {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        _ => {
                            return Err(CmdbError::validation(format!(
                                "invalid value for property '{key}': expected a string or null"
                            )))
                        }
                    };
                    properties.insert(key.clone(), value);
                }
            }
            Some(_) => return Err(CmdbError::validation("field 'properties' must be an object")),
        }

        Ok(Self {
            name,
            level,
            properties,
        })
    }

    /// Parse an update that must also name its target with a string `id`.
    pub fn from_json_with_id(payload: &Value) -> Result<(String, Self)> {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CmdbError::validation("field 'id' is required and must be a string"))?
            .to_string();
        Ok((id, Self::from_json(payload)?))
    }
}
