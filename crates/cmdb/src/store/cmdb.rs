//! Main Cmdb interface for store operations.

use super::autosave::AutoSave;
use super::index::{CiTables, RelationshipTables};
use super::traversal;
use crate::config::StoreConfig;
use crate::error::{CmdbError, Result};
use crate::model::{
    Ci, CiUpdate, PropertyMap, Relationship, DEFAULT_WEIGHT, MAX_LEVELS, WILDCARD,
};
use crate::query::{CiFilter, RelationshipFilter};
use crate::storage::codec::{self, Snapshot};
use crate::storage::{FileBackend, MemoryBackend, StorageBackend};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The configuration management database.
///
/// `Cmdb` owns every level, CI and relationship together with the indices
/// that keep lookups fast. All operations take `&self`; share the handle
/// across threads with an `Arc`.
///
/// Lookups return owned copies, so a result never changes under the caller
/// when another thread mutates the store.
///
/// # Locking
///
/// CI tables (levels, CIs, property index) and relationship tables
/// (multimap, reverse index) have separate locks. Operations that need both
/// always take the CI lock first, then the relationship lock, then the
/// backend lock.
///
/// # Examples
///
/// ```
/// use cmdb::{Ci, Cmdb};
///
/// # fn example() -> cmdb::Result<()> {
/// let cmdb = Cmdb::in_memory()?;
/// cmdb.add_ci(Ci::new("srv-1", "Host 1", "Server").with_level(3))?;
/// cmdb.add_ci(Ci::new("app-1", "Billing", "Application").with_level(1))?;
/// cmdb.add_relationship("app-1", "srv-1", "runs_on")?;
///
/// assert_eq!(cmdb.get_dependent_cis("srv-1").len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Cmdb {
    inner: Arc<Inner>,
    autosave: Option<AutoSave>,
    // Set once the shutdown save has been attempted.
    closed: bool,
}

struct Inner {
    location: String,
    cis: Mutex<CiTables>,
    relationships: Mutex<RelationshipTables>,
    backend: Mutex<Box<dyn StorageBackend>>,
    // True iff there are mutations not yet written by a successful save.
    modified: AtomicBool,
    // Held by the autosave thread while a save is in flight.
    saving: AtomicBool,
}

impl Inner {
    fn mark_modified(&self) {
        self.modified.store(true, Ordering::SeqCst);
    }

    fn save(&self) -> Result<()> {
        let cis = self.cis.lock();
        let relationships = self.relationships.lock();

        let rels: Vec<&Relationship> = relationships.iter().collect();
        let bytes = codec::encode_snapshot(&cis.levels, cis.as_slice(), &rels);
        self.backend.lock().write_snapshot(&bytes)?;

        // Cleared while both table locks are held, so no mutation can slip in
        // between the snapshot and the flag.
        self.modified.store(false, Ordering::SeqCst);
        info!(
            "Saved {} levels, {} CIs and {} relationships to {}",
            cis.levels.len(),
            cis.len(),
            relationships.len(),
            self.location
        );
        Ok(())
    }

    fn autosave_tick(&self) {
        if !self.modified.load(Ordering::SeqCst) {
            trace!("Autosave: nothing to do");
            return;
        }
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Autosave: previous save still in flight, skipping");
            return;
        }

        if let Err(e) = self.save() {
            error!("Autosave to {} failed: {e}", self.location);
        }
        self.saving.store(false, Ordering::SeqCst);
    }
}

impl Cmdb {
    /// Open a store backed by the file at `path`, with default configuration.
    ///
    /// An existing file is loaded; a missing one starts an empty store seeded
    /// with the default levels. Autosave runs every 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Storage`] if the file cannot be read and
    /// [`CmdbError::Serialization`] if it is corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open a file-backed store with explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`Cmdb::open`].
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        info!("Opening CMDB at path: {:?}", path.as_ref());
        let backend = FileBackend::new(path.as_ref());
        Self::with_backend(Box::new(backend), config)
    }

    /// Create an in-memory store without autosave, for testing.
    ///
    /// **Warning**: All data is lost when the store is dropped.
    pub fn in_memory() -> Result<Self> {
        Self::with_backend(
            Box::new(MemoryBackend::new()),
            StoreConfig::without_autosave(),
        )
    }

    /// Create a store over an arbitrary backend.
    ///
    /// If the backend holds a snapshot it is loaded and the store starts
    /// clean. Otherwise the configured default levels are seeded and the
    /// store starts modified, so the first save creates the snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be read or decoded, or if the autosave
    /// thread cannot be spawned. A failed load is never papered over with an
    /// empty store; the caller decides how to proceed.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: StoreConfig) -> Result<Self> {
        let location = backend.describe();

        let (cis, relationships, modified) = match backend.read_snapshot()? {
            Some(bytes) => {
                let (cis, relationships) = build_tables(codec::decode_snapshot(&bytes)?)?;
                info!(
                    "Loaded {} CIs and {} relationships from {location}",
                    cis.len(),
                    relationships.len()
                );
                (cis, relationships, false)
            }
            None => {
                let mut levels: Vec<String> = Vec::with_capacity(config.default_levels.len());
                for level in &config.default_levels {
                    if !levels.contains(level) {
                        levels.push(level.clone());
                    }
                }
                info!("No snapshot at {location}, starting with {} default levels", levels.len());
                (CiTables::new(levels), RelationshipTables::default(), true)
            }
        };

        let inner = Arc::new(Inner {
            location,
            cis: Mutex::new(cis),
            relationships: Mutex::new(relationships),
            backend: Mutex::new(backend),
            modified: AtomicBool::new(modified),
            saving: AtomicBool::new(false),
        });

        let autosave = if config.autosave_enabled {
            let worker = Arc::clone(&inner);
            Some(AutoSave::spawn(config.autosave_interval, move || {
                worker.autosave_tick()
            })?)
        } else {
            None
        };

        Ok(Self {
            inner,
            autosave,
            closed: false,
        })
    }

    // ===== Levels =====

    /// Append a level, or return the index of an existing level with this name.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Validation`] if `name` is empty or the store
    /// already has [`MAX_LEVELS`] levels.
    pub fn add_level(&self, name: &str) -> Result<usize> {
        if name.is_empty() {
            return Err(CmdbError::validation("level name must not be empty"));
        }
        let mut cis = self.inner.cis.lock();
        if let Some(index) = cis.levels.iter().position(|level| level == name) {
            return Ok(index);
        }
        check_level_capacity(cis.levels.len() + 1)?;
        cis.levels.push(name.to_string());
        self.inner.mark_modified();
        debug!("Added level '{name}' at index {}", cis.levels.len() - 1);
        Ok(cis.levels.len() - 1)
    }

    /// Add several levels, each idempotently. Returns their indices in order.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Validation`] if any name is empty; levels before
    /// it have already been added.
    pub fn add_levels<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names.iter().map(|name| self.add_level(name.as_ref())).collect()
    }

    /// Rename the level at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::LevelNotFound`] for an unknown index and
    /// [`CmdbError::Validation`] if the name is empty or used by another level.
    pub fn rename_level(&self, index: usize, new_name: &str) -> Result<()> {
        if new_name.is_empty() {
            return Err(CmdbError::validation("level name must not be empty"));
        }
        let mut cis = self.inner.cis.lock();
        let count = cis.levels.len();
        if index >= count {
            return Err(CmdbError::LevelNotFound { index, count });
        }
        if cis.levels[index] == new_name {
            return Ok(());
        }
        if cis.levels.iter().any(|level| level == new_name) {
            return Err(CmdbError::validation(format!(
                "level '{new_name}' already exists"
            )));
        }
        debug!("Renaming level {index} '{}' to '{new_name}'", cis.levels[index]);
        cis.levels[index] = new_name.to_string();
        self.inner.mark_modified();
        Ok(())
    }

    /// Remove the level at `index` and return its name.
    ///
    /// CIs at higher levels move down one index, so each CI keeps the level
    /// name it had before.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::LevelNotFound`] for an unknown index and
    /// [`CmdbError::LevelInUse`] if any CI is at that level.
    pub fn remove_level(&self, index: usize) -> Result<String> {
        let mut cis = self.inner.cis.lock();
        let count = cis.levels.len();
        if index >= count {
            return Err(CmdbError::LevelNotFound { index, count });
        }
        let ci_count = cis.count_at_level(index);
        if ci_count > 0 {
            return Err(CmdbError::LevelInUse { index, ci_count });
        }

        let name = cis.levels.remove(index);
        let shifted = cis.shift_levels_above(index);
        self.inner.mark_modified();
        debug!("Removed level {index} '{name}', re-pointed {shifted} CIs");
        Ok(name)
    }

    /// Replace the whole level list. Only allowed while the store has no CIs.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::LevelsLocked`] if any CI exists and
    /// [`CmdbError::Validation`] if a name is empty or repeated.
    pub fn set_levels<S: AsRef<str>>(&self, levels: &[S]) -> Result<()> {
        let mut new_levels: Vec<String> = Vec::with_capacity(levels.len());
        for level in levels {
            let level = level.as_ref();
            if level.is_empty() {
                return Err(CmdbError::validation("level name must not be empty"));
            }
            if new_levels.iter().any(|l| l == level) {
                return Err(CmdbError::validation(format!("level '{level}' listed twice")));
            }
            new_levels.push(level.to_string());
        }
        check_level_capacity(new_levels.len())?;

        let mut cis = self.inner.cis.lock();
        if !cis.is_empty() {
            return Err(CmdbError::LevelsLocked {
                ci_count: cis.len(),
            });
        }
        debug!("Replacing {} levels with {}", cis.levels.len(), new_levels.len());
        cis.levels = new_levels;
        self.inner.mark_modified();
        Ok(())
    }

    /// Name of the level at `index`.
    pub fn level_name(&self, index: usize) -> Option<String> {
        self.inner.cis.lock().levels.get(index).cloned()
    }

    /// Index of the level called `name`.
    pub fn level_index(&self, name: &str) -> Option<usize> {
        self.inner.cis.lock().levels.iter().position(|l| l == name)
    }

    /// All level names in index order.
    pub fn levels(&self) -> Vec<String> {
        self.inner.cis.lock().levels.clone()
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.inner.cis.lock().levels.len()
    }

    // ===== CIs =====

    /// Register a new CI.
    ///
    /// # Errors
    ///
    /// - [`CmdbError::Validation`] if the id is empty
    /// - [`CmdbError::DuplicateCi`] if the id is taken
    /// - [`CmdbError::LevelNotFound`] if the level index is out of range
    pub fn add_ci(&self, ci: Ci) -> Result<()> {
        if ci.id().is_empty() {
            return Err(CmdbError::validation("CI id must not be empty"));
        }
        let mut cis = self.inner.cis.lock();
        if cis.contains(ci.id()) {
            return Err(CmdbError::DuplicateCi {
                id: ci.id().to_string(),
            });
        }
        check_level(&cis, ci.level())?;

        debug!("Adding CI: id={}, type={}, level={}", ci.id(), ci.ci_type(), ci.level());
        cis.insert(ci);
        self.inner.mark_modified();
        Ok(())
    }

    /// Remove a CI together with every relationship that touches it.
    ///
    /// Returns the removed CI.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if the id is unknown.
    pub fn remove_ci(&self, id: &str) -> Result<Ci> {
        let mut cis = self.inner.cis.lock();
        let mut relationships = self.inner.relationships.lock();

        let ci = cis.remove(id).ok_or_else(|| not_found(id))?;
        let dropped = relationships.remove_touching(id);
        self.inner.mark_modified();
        debug!("Removed CI '{id}' and {} relationships", dropped.len());
        Ok(ci)
    }

    /// Look up a CI by id.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if the id is unknown.
    pub fn get_ci(&self, id: &str) -> Result<Ci> {
        self.inner
            .cis
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Whether a CI with this id exists.
    pub fn contains_ci(&self, id: &str) -> bool {
        self.inner.cis.lock().contains(id)
    }

    /// Number of CIs.
    pub fn ci_count(&self) -> usize {
        self.inner.cis.lock().len()
    }

    /// Replace all properties of a CI. Returns `true` if anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if the id is unknown.
    pub fn replace_properties(&self, id: &str, properties: PropertyMap) -> Result<bool> {
        self.modify_ci(id, |ci| ci.set_properties(properties))
    }

    /// Replace name, level and properties of a CI wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] for an unknown id and
    /// [`CmdbError::LevelNotFound`] for an out-of-range level.
    pub fn replace_ci(
        &self,
        id: &str,
        name: &str,
        level: usize,
        properties: PropertyMap,
    ) -> Result<bool> {
        let mut cis = self.inner.cis.lock();
        check_level(&cis, level)?;
        let changed = cis
            .modify(id, |ci| {
                ci.set_name(name) | ci.set_level(level) | ci.set_properties(properties)
            })
            .ok_or_else(|| not_found(id))?;
        self.after_ci_change(id, changed);
        Ok(changed)
    }

    /// Apply a partial update to a CI.
    ///
    /// The update is checked in full before anything is applied.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] for an unknown id and
    /// [`CmdbError::LevelNotFound`] if the update names an out-of-range level.
    pub fn update_ci(&self, id: &str, update: &CiUpdate) -> Result<bool> {
        let mut cis = self.inner.cis.lock();
        if let Some(level) = update.level {
            check_level(&cis, level)?;
        }
        let changed = cis
            .modify(id, |ci| ci.apply_update(update))
            .ok_or_else(|| not_found(id))?;
        self.after_ci_change(id, changed);
        Ok(changed)
    }

    /// Parse a structured update carrying its target `id` and apply it.
    ///
    /// Returns the target id and whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Validation`] for a malformed payload, otherwise
    /// the errors of [`Cmdb::update_ci`].
    pub fn apply_json_update(&self, payload: &Value) -> Result<(String, bool)> {
        let (id, update) = CiUpdate::from_json_with_id(payload)?;
        let changed = self.update_ci(&id, &update)?;
        Ok((id, changed))
    }

    /// Set (`Some`) or delete (`None`) one property of a CI.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if the id is unknown.
    pub fn set_property(&self, id: &str, key: &str, value: Option<&str>) -> Result<bool> {
        self.modify_ci(id, |ci| ci.set_property(key, value))
    }

    /// Delete one property of a CI. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if the id is unknown.
    pub fn remove_property(&self, id: &str, key: &str) -> Result<bool> {
        self.set_property(id, key, None)
    }

    // ===== CI queries =====

    /// All CIs in insertion order.
    pub fn get_cis(&self) -> Vec<Ci> {
        self.collect_cis(|_| true)
    }

    /// CIs at a level.
    pub fn get_cis_at_level(&self, level: usize) -> Vec<Ci> {
        self.collect_cis(|ci| ci.level() == level)
    }

    /// CIs at a level with a given type.
    pub fn get_cis_at_level_of_type(&self, level: usize, ci_type: &str) -> Vec<Ci> {
        self.collect_cis(|ci| ci.level() == level && ci.ci_type() == ci_type)
    }

    /// CIs of a given type.
    pub fn get_cis_of_type(&self, ci_type: &str) -> Vec<Ci> {
        self.collect_cis(|ci| ci.ci_type() == ci_type)
    }

    /// CIs matching a filter.
    ///
    /// Required properties are resolved through the property index before the
    /// equality criteria are applied.
    pub fn find_cis(&self, filter: &CiFilter) -> Vec<Ci> {
        let cis = self.inner.cis.lock();
        let candidates: Vec<&Ci> = if filter.required_properties().is_empty() {
            cis.iter().collect()
        } else {
            cis.with_all_properties(filter.required_properties())
        };
        candidates
            .into_iter()
            .filter(|ci| filter.matches(ci))
            .cloned()
            .collect()
    }

    /// CIs carrying every listed property.
    ///
    /// An empty list, or any name no CI carries, yields no CIs.
    pub fn get_cis_with_properties<S: AsRef<str>>(&self, names: &[S]) -> Vec<Ci> {
        self.inner
            .cis
            .lock()
            .with_all_properties(names)
            .into_iter()
            .cloned()
            .collect()
    }

    /// CIs first reached exactly `steps` hops from `start` along outgoing
    /// relationships, in breadth-first order.
    ///
    /// An unknown start or `steps == 0` yields no CIs.
    pub fn get_cis_at_distance(&self, start: &str, steps: usize) -> Vec<Ci> {
        let cis = self.inner.cis.lock();
        let relationships = self.inner.relationships.lock();
        if !cis.contains(start) {
            return Vec::new();
        }
        traversal::ids_at_distance(&relationships, start, steps)
            .iter()
            .filter_map(|id| cis.get(id).cloned())
            .collect()
    }

    /// Names of all properties carried by at least one CI, sorted.
    pub fn property_names(&self) -> Vec<String> {
        self.inner.cis.lock().property_names()
    }

    // ===== Relationships =====

    /// Add a relationship with the default weight.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if either endpoint is unknown.
    pub fn add_relationship(&self, from: &str, to: &str, rel_type: &str) -> Result<()> {
        self.add_weighted_relationship(from, to, rel_type, DEFAULT_WEIGHT)
    }

    /// Add a relationship with an explicit weight.
    ///
    /// Identical relationships are not merged; each call adds one more.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::CiNotFound`] if either endpoint is unknown.
    pub fn add_weighted_relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
        weight: f64,
    ) -> Result<()> {
        let cis = self.inner.cis.lock();
        for id in [from, to] {
            if !cis.contains(id) {
                return Err(not_found(id));
            }
        }
        let mut relationships = self.inner.relationships.lock();
        debug!("Adding relationship: {from} -[{rel_type}]-> {to}, weight={weight}");
        relationships.insert(Relationship::new(from, to, rel_type).with_weight(weight));
        self.inner.mark_modified();
        Ok(())
    }

    /// Remove the first relationship `from -> to` of any type.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::RelationshipNotFound`] if there is none.
    pub fn remove_relationship(&self, from: &str, to: &str) -> Result<Relationship> {
        self.remove_first_relationship(from, to, |rel| rel.destination() == to)
    }

    /// Remove the first relationship `from -> to` of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::RelationshipNotFound`] if there is none.
    pub fn remove_relationship_typed(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
    ) -> Result<Relationship> {
        self.remove_first_relationship(from, to, |rel| {
            rel.destination() == to && rel.rel_type() == rel_type
        })
    }

    /// Remove every relationship matching the filter. Returns how many went.
    pub fn remove_relationships(&self, filter: &RelationshipFilter) -> usize {
        let mut relationships = self.inner.relationships.lock();
        let source = filter.source_id().filter(|s| *s != WILDCARD);
        let removed = relationships.remove_where(source, |rel| filter.matches(rel));
        if !removed.is_empty() {
            self.inner.mark_modified();
            debug!("Removed {} relationships by filter", removed.len());
        }
        removed.len()
    }

    /// All relationships, grouped by source id.
    pub fn get_relationships(&self) -> Vec<Relationship> {
        self.inner.relationships.lock().iter().cloned().collect()
    }

    /// Relationships starting at `from`.
    pub fn get_relationships_from(&self, from: &str) -> Vec<Relationship> {
        self.inner.relationships.lock().from_source(from).to_vec()
    }

    /// Relationships `from -> to` of any type.
    pub fn get_relationships_between(&self, from: &str, to: &str) -> Vec<Relationship> {
        self.inner
            .relationships
            .lock()
            .from_source(from)
            .iter()
            .filter(|rel| rel.destination() == to)
            .cloned()
            .collect()
    }

    /// Relationships matching all three criteria, where `"*"` matches anything.
    pub fn get_relationships_matching(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
    ) -> Vec<Relationship> {
        self.find_relationships(
            &RelationshipFilter::new()
                .source(from)
                .destination(to)
                .rel_type(rel_type),
        )
    }

    /// Relationships matching a filter.
    pub fn find_relationships(&self, filter: &RelationshipFilter) -> Vec<Relationship> {
        let relationships = self.inner.relationships.lock();
        match filter.source_id().filter(|s| *s != WILDCARD) {
            Some(source) => relationships
                .from_source(source)
                .iter()
                .filter(|rel| filter.matches(rel))
                .cloned()
                .collect(),
            None => relationships
                .iter()
                .filter(|rel| filter.matches(rel))
                .cloned()
                .collect(),
        }
    }

    /// Relationships pointing at `id`, found through the reverse index.
    pub fn get_dependent_cis(&self, id: &str) -> Vec<Relationship> {
        self.inner
            .relationships
            .lock()
            .pointing_at(id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Number of relationships.
    pub fn relationship_count(&self) -> usize {
        self.inner.relationships.lock().len()
    }

    // ===== Persistence =====

    /// Consistent copy of levels, CIs and relationships.
    pub fn snapshot(&self) -> Snapshot {
        let cis = self.inner.cis.lock();
        let relationships = self.inner.relationships.lock();
        Snapshot {
            levels: cis.levels.clone(),
            cis: cis.as_slice().to_vec(),
            relationships: relationships.iter().cloned().collect(),
        }
    }

    /// Write the current state to the backend.
    ///
    /// Both table locks are held for the whole write, so the snapshot is
    /// consistent.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Storage`] if the write fails. The previously saved
    /// snapshot stays intact and the store stays modified.
    pub fn save(&self) -> Result<()> {
        self.inner.save()
    }

    /// Replace the in-memory state with the backend's snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Storage`] if there is no snapshot or it cannot be
    /// read, and [`CmdbError::Serialization`] if it is corrupt. On error the
    /// in-memory state is left untouched.
    pub fn load(&self) -> Result<()> {
        let mut cis = self.inner.cis.lock();
        let mut relationships = self.inner.relationships.lock();

        let bytes = self.inner.backend.lock().read_snapshot()?.ok_or_else(|| {
            CmdbError::storage(
                format!("No snapshot at {}", self.inner.location),
                None::<std::io::Error>,
            )
        })?;
        let (new_cis, new_relationships) = build_tables(codec::decode_snapshot(&bytes)?)?;

        *cis = new_cis;
        *relationships = new_relationships;
        self.inner.modified.store(false, Ordering::SeqCst);
        info!(
            "Loaded {} CIs and {} relationships from {}",
            cis.len(),
            relationships.len(),
            self.inner.location
        );
        Ok(())
    }

    /// Remove every CI and relationship. Levels are kept.
    pub fn clear(&self) {
        let mut cis = self.inner.cis.lock();
        let mut relationships = self.inner.relationships.lock();
        if cis.is_empty() && relationships.is_empty() {
            return;
        }
        cis.clear();
        relationships.clear();
        self.inner.mark_modified();
        debug!("Cleared all CIs and relationships");
    }

    /// Whether there are changes not yet saved.
    pub fn is_modified(&self) -> bool {
        self.inner.modified.load(Ordering::SeqCst)
    }

    /// Where snapshots are stored, for display.
    pub fn path(&self) -> &str {
        &self.inner.location
    }

    /// Stop autosave and save any remaining changes.
    ///
    /// Dropping the store does the same but can only log a failed save.
    ///
    /// # Errors
    ///
    /// Returns the error of the final save.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    // Private helper methods

    fn shutdown(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        if let Some(mut autosave) = self.autosave.take() {
            autosave.shutdown();
        }
        if self.is_modified() {
            info!("Saving pending changes to {} before shutdown", self.inner.location);
            self.inner.save()?;
        }
        Ok(())
    }

    fn collect_cis<P>(&self, predicate: P) -> Vec<Ci>
    where
        P: Fn(&Ci) -> bool,
    {
        self.inner
            .cis
            .lock()
            .iter()
            .filter(|ci| predicate(ci))
            .cloned()
            .collect()
    }

    fn modify_ci<F>(&self, id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Ci) -> bool,
    {
        let changed = self
            .inner
            .cis
            .lock()
            .modify(id, f)
            .ok_or_else(|| not_found(id))?;
        self.after_ci_change(id, changed);
        Ok(changed)
    }

    fn after_ci_change(&self, id: &str, changed: bool) {
        if changed {
            self.inner.mark_modified();
            debug!("Updated CI '{id}'");
        } else {
            trace!("Update of CI '{id}' changed nothing");
        }
    }

    fn remove_first_relationship<P>(&self, from: &str, to: &str, pred: P) -> Result<Relationship>
    where
        P: Fn(&Relationship) -> bool,
    {
        let removed = self
            .inner
            .relationships
            .lock()
            .remove_first(from, pred)
            .ok_or_else(|| CmdbError::RelationshipNotFound {
                source_id: from.to_string(),
                destination_id: to.to_string(),
            })?;
        self.inner.mark_modified();
        debug!("Removed relationship {from} -[{}]-> {to}", removed.rel_type());
        Ok(removed)
    }
}

impl Drop for Cmdb {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to save {} on shutdown: {e}", self.inner.location);
        }
    }
}

impl std::fmt::Debug for Cmdb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmdb")
            .field("location", &self.inner.location)
            .field("modified", &self.is_modified())
            .field("autosave", &self.autosave.is_some())
            .finish()
    }
}

fn not_found(id: &str) -> CmdbError {
    CmdbError::CiNotFound { id: id.to_string() }
}

fn check_level_capacity(count: usize) -> Result<()> {
    if count > MAX_LEVELS {
        return Err(CmdbError::validation(format!(
            "a store holds at most {MAX_LEVELS} levels"
        )));
    }
    Ok(())
}

fn check_level(cis: &CiTables, level: usize) -> Result<()> {
    let count = cis.levels.len();
    if level >= count {
        return Err(CmdbError::LevelNotFound { index: level, count });
    }
    Ok(())
}

// Rebuild every index from decoded collections. Relationships whose
// endpoints are missing are dropped so no dangling edge enters the store.
fn build_tables(snapshot: Snapshot) -> Result<(CiTables, RelationshipTables)> {
    let cis = CiTables::from_snapshot(snapshot.levels, snapshot.cis)?;

    let total = snapshot.relationships.len();
    let relationships: Vec<Relationship> = snapshot
        .relationships
        .into_iter()
        .filter(|rel| cis.contains(rel.source()) && cis.contains(rel.destination()))
        .collect();
    if relationships.len() != total {
        warn!(
            "Dropped {} relationships that reference unknown CIs",
            total - relationships.len()
        );
    }

    Ok((cis, RelationshipTables::from_snapshot(relationships)))
}
