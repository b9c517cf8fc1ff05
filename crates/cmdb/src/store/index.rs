//! Primary collections and their secondary indices.
//!
//! [`CiTables`] and [`RelationshipTables`] each sit behind their own lock in
//! the store. Every mutation goes through methods here so the indices never
//! drift from the primary collections.

use crate::error::{CmdbError, Result};
use crate::model::{Ci, Relationship};
use log::trace;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Levels, CIs and the indices derived from CIs.
#[derive(Debug, Default)]
pub(crate) struct CiTables {
    pub(crate) levels: Vec<String>,
    // Insertion order is observable through `get_cis`.
    cis: Vec<Ci>,
    positions: HashMap<String, usize>,
    // Property name -> ids of CIs carrying it. Buckets are never empty.
    by_property: HashMap<String, HashSet<String>>,
}

impl CiTables {
    pub(crate) fn new(levels: Vec<String>) -> Self {
        Self {
            levels,
            ..Self::default()
        }
    }

    /// Build tables from decoded collections, rebuilding every index.
    pub(crate) fn from_snapshot(levels: Vec<String>, cis: Vec<Ci>) -> Result<Self> {
        let mut tables = Self::new(levels);
        for ci in cis {
            if tables.positions.contains_key(ci.id()) {
                return Err(CmdbError::serialization(
                    format!("snapshot contains CI '{}' twice", ci.id()),
                    None::<std::io::Error>,
                ));
            }
            if ci.level() >= tables.levels.len() {
                return Err(CmdbError::serialization(
                    format!(
                        "CI '{}' references level {} but only {} levels exist",
                        ci.id(),
                        ci.level(),
                        tables.levels.len()
                    ),
                    None::<std::io::Error>,
                ));
            }
            tables.insert(ci);
        }
        Ok(tables)
    }

    pub(crate) fn len(&self) -> usize {
        self.cis.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cis.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Ci> {
        self.cis.iter()
    }

    pub(crate) fn as_slice(&self) -> &[Ci] {
        &self.cis
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Ci> {
        self.positions.get(id).map(|&pos| &self.cis[pos])
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Append a CI. The caller has already checked id uniqueness and level range.
    pub(crate) fn insert(&mut self, ci: Ci) {
        let id = ci.id().to_string();
        for key in ci.properties().keys() {
            self.index_property(key, &id);
        }
        self.positions.insert(id, self.cis.len());
        self.cis.push(ci);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Ci> {
        let pos = self.positions.remove(id)?;
        let ci = self.cis.remove(pos);
        for later in &self.cis[pos..] {
            if let Some(p) = self.positions.get_mut(later.id()) {
                *p -= 1;
            }
        }
        for key in ci.properties().keys() {
            self.unindex_property(key, id);
        }
        Some(ci)
    }

    /// Mutate a CI in place and reconcile the property index afterwards.
    ///
    /// Returns `None` if the id is unknown, otherwise whatever `f` returned.
    pub(crate) fn modify<F>(&mut self, id: &str, f: F) -> Option<bool>
    where
        F: FnOnce(&mut Ci) -> bool,
    {
        let pos = *self.positions.get(id)?;
        let before: HashSet<String> = self.cis[pos]
            .properties()
            .keys()
            .map(str::to_string)
            .collect();

        let changed = f(&mut self.cis[pos]);
        if !changed {
            return Some(false);
        }

        let after: HashSet<String> = self.cis[pos]
            .properties()
            .keys()
            .map(str::to_string)
            .collect();
        for key in before.difference(&after) {
            self.unindex_property(key, id);
        }
        for key in after.difference(&before) {
            self.index_property(key, id);
        }
        Some(true)
    }

    /// CIs carrying every listed property, in insertion order.
    ///
    /// An empty list yields no CIs. An unindexed name short-circuits to empty.
    pub(crate) fn with_all_properties<S: AsRef<str>>(&self, names: &[S]) -> Vec<&Ci> {
        let mut buckets = Vec::with_capacity(names.len());
        for name in names {
            match self.by_property.get(name.as_ref()) {
                Some(bucket) => buckets.push(bucket),
                None => return Vec::new(),
            }
        }
        buckets.sort_by_key(|bucket| bucket.len());

        let Some((smallest, rest)) = buckets.split_first() else {
            return Vec::new();
        };
        let mut positions: Vec<usize> = Vec::with_capacity(smallest.len());
        for id in smallest.iter() {
            if rest.iter().all(|bucket| bucket.contains(id)) {
                if let Some(&pos) = self.positions.get(id) {
                    positions.push(pos);
                }
            }
        }
        positions.sort_unstable();
        positions.into_iter().map(|pos| &self.cis[pos]).collect()
    }

    /// Property names currently in use, sorted.
    pub(crate) fn property_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.by_property.keys().collect();
        names.into_iter().cloned().collect()
    }

    pub(crate) fn count_at_level(&self, level: usize) -> usize {
        self.cis.iter().filter(|ci| ci.level() == level).count()
    }

    /// Move every CI above `removed` down one level so it keeps its level name.
    pub(crate) fn shift_levels_above(&mut self, removed: usize) -> usize {
        let mut shifted = 0;
        for ci in self.cis.iter_mut().filter(|ci| ci.level() > removed) {
            let level = ci.level();
            ci.set_level(level - 1);
            shifted += 1;
        }
        shifted
    }

    pub(crate) fn clear(&mut self) {
        self.cis.clear();
        self.positions.clear();
        self.by_property.clear();
    }

    fn index_property(&mut self, key: &str, id: &str) {
        trace!("Indexing property '{key}' for CI '{id}'");
        self.by_property
            .entry(key.to_string())
            .or_default()
            .insert(id.to_string());
    }

    fn unindex_property(&mut self, key: &str, id: &str) {
        trace!("Unindexing property '{key}' for CI '{id}'");
        if let Some(bucket) = self.by_property.get_mut(key) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.by_property.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn indexed_ids(&self, key: &str) -> Option<&HashSet<String>> {
        self.by_property.get(key)
    }
}

/// Relationship multimap keyed by source plus the destination reverse index.
#[derive(Debug, Default)]
pub(crate) struct RelationshipTables {
    by_source: BTreeMap<String, Vec<Relationship>>,
    // Destination -> sources with at least one relationship pointing at it.
    dependents: HashMap<String, HashSet<String>>,
    count: usize,
}

impl RelationshipTables {
    pub(crate) fn from_snapshot(relationships: Vec<Relationship>) -> Self {
        let mut tables = Self::default();
        for relationship in relationships {
            tables.insert(relationship);
        }
        tables
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.by_source.values().flatten()
    }

    pub(crate) fn from_source(&self, source: &str) -> &[Relationship] {
        self.by_source
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn insert(&mut self, relationship: Relationship) {
        self.dependents
            .entry(relationship.destination().to_string())
            .or_default()
            .insert(relationship.source().to_string());
        self.by_source
            .entry(relationship.source().to_string())
            .or_default()
            .push(relationship);
        self.count += 1;
    }

    /// Relationships whose destination is `id`, resolved via the reverse index.
    pub(crate) fn pointing_at(&self, id: &str) -> Vec<&Relationship> {
        let Some(sources) = self.dependents.get(id) else {
            return Vec::new();
        };
        let sources: BTreeSet<&String> = sources.iter().collect();
        sources
            .into_iter()
            .flat_map(|source| self.from_source(source))
            .filter(|rel| rel.destination() == id)
            .collect()
    }

    /// Remove the first relationship from `source` satisfying `pred`.
    pub(crate) fn remove_first<P>(&mut self, source: &str, pred: P) -> Option<Relationship>
    where
        P: Fn(&Relationship) -> bool,
    {
        let bucket = self.by_source.get_mut(source)?;
        let pos = bucket.iter().position(|rel| pred(rel))?;
        let removed = bucket.remove(pos);
        self.after_removal(std::slice::from_ref(&removed));
        Some(removed)
    }

    /// Remove every relationship satisfying `pred`, restricted to one source
    /// bucket when `source` is given.
    pub(crate) fn remove_where<P>(&mut self, source: Option<&str>, pred: P) -> Vec<Relationship>
    where
        P: Fn(&Relationship) -> bool,
    {
        let sources: Vec<String> = match source {
            Some(source) => vec![source.to_string()],
            None => self.by_source.keys().cloned().collect(),
        };
        self.remove_from_sources(sources, pred)
    }

    /// Remove every relationship that starts or ends at `id`.
    pub(crate) fn remove_touching(&mut self, id: &str) -> Vec<Relationship> {
        let mut sources: Vec<String> = self
            .dependents
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        sources.push(id.to_string());
        self.remove_from_sources(sources, |rel| rel.touches(id))
    }

    pub(crate) fn clear(&mut self) {
        self.by_source.clear();
        self.dependents.clear();
        self.count = 0;
    }

    fn remove_from_sources<P>(&mut self, sources: Vec<String>, pred: P) -> Vec<Relationship>
    where
        P: Fn(&Relationship) -> bool,
    {
        let mut removed = Vec::new();
        for source in sources {
            let Some(bucket) = self.by_source.get_mut(&source) else {
                continue;
            };
            let (gone, kept): (Vec<_>, Vec<_>) = bucket.drain(..).partition(|rel| pred(rel));
            *bucket = kept;
            removed.extend(gone);
        }
        self.after_removal(&removed);
        removed
    }

    // Drop empty buckets and reverse-index entries that no longer have a backing edge.
    fn after_removal(&mut self, removed: &[Relationship]) {
        self.count -= removed.len();
        for rel in removed {
            let (source, destination) = (rel.source(), rel.destination());
            let still_linked = self
                .from_source(source)
                .iter()
                .any(|other| other.destination() == destination);
            if !still_linked {
                if let Some(set) = self.dependents.get_mut(destination) {
                    set.remove(source);
                    if set.is_empty() {
                        self.dependents.remove(destination);
                    }
                }
            }
            if self.by_source.get(source).is_some_and(Vec::is_empty) {
                self.by_source.remove(source);
            }
            trace!("Unlinked relationship {source} -> {destination}");
        }
    }

    #[cfg(test)]
    fn dependent_sources(&self, id: &str) -> Option<&HashSet<String>> {
        self.dependents.get(id)
    }
}
