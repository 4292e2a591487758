//! In-memory catalog of configured indices.
//!
//! Readers load an immutable snapshot; writers build a complete new snapshot
//! and publish it in one store, so a reader never observes a half-applied
//! update. Writers are serialized by a mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::info;

use content_indexer_repository::{validate_index_name, versioned_index_name};
use content_indexer_shared::IndexDefinition;

use crate::errors::IndexerError;
use crate::strategy::{IndexingStrategy, StrategyRegistry};

/// One registered index and the strategy instance bound to it.
#[derive(Clone)]
pub struct RegisteredIndex {
    pub definition: Arc<IndexDefinition>,
    pub strategy: Arc<dyn IndexingStrategy>,
}

impl RegisteredIndex {
    pub fn name(&self) -> &str {
        &self.definition.index_name
    }

    /// The engine alias that serves this logical index.
    pub fn alias(&self) -> String {
        alias_name(&self.definition.index_name)
    }
}

impl std::fmt::Debug for RegisteredIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredIndex")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// The engine alias for a logical index name.
pub fn alias_name(logical_name: &str) -> String {
    logical_name.trim().to_lowercase()
}

#[derive(Default)]
struct Snapshot {
    entries: Vec<RegisteredIndex>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<i32, usize>,
}

impl Snapshot {
    fn get(&self, name: &str) -> Option<&RegisteredIndex> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.entries[i])
    }

    fn get_by_id(&self, id: i32) -> Option<&RegisteredIndex> {
        self.by_id.get(&id).map(|&i| &self.entries[i])
    }

    /// Append an entry, rejecting name and identifier collisions.
    fn insert(&mut self, entry: RegisteredIndex) -> Result<(), IndexerError> {
        let key = entry.definition.index_name.to_lowercase();
        let id = entry.definition.identifier;
        if self.by_name.contains_key(&key) {
            return Err(IndexerError::already_registered(format!(
                "name '{}'",
                entry.definition.index_name
            )));
        }
        if self.by_id.contains_key(&id) {
            return Err(IndexerError::already_registered(format!("identifier {}", id)));
        }
        self.by_name.insert(key, self.entries.len());
        self.by_id.insert(id, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }
}

/// Process-wide index catalog.
pub struct IndexRegistry {
    snapshot: ArcSwap<Snapshot>,
    strategies: Arc<StrategyRegistry>,
    write_lock: Mutex<()>,
}

impl IndexRegistry {
    /// An empty registry resolving strategies through `strategies`.
    pub fn new(strategies: Arc<StrategyRegistry>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            strategies,
            write_lock: Mutex::new(()),
        }
    }

    /// Case-insensitive lookup by logical name.
    pub fn get_index(&self, name: &str) -> Option<RegisteredIndex> {
        self.snapshot.load().get(name).cloned()
    }

    pub fn get_index_by_id(&self, identifier: i32) -> Option<RegisteredIndex> {
        self.snapshot.load().get_by_id(identifier).cloned()
    }

    /// Like [`get_index`](Self::get_index), but a missing index is an error.
    pub fn get_required_index(&self, name: &str) -> Result<RegisteredIndex, IndexerError> {
        self.get_index(name)
            .ok_or_else(|| IndexerError::not_registered(name))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.snapshot.load().get(name).is_some()
    }

    /// All registered indices in registration order.
    pub fn indices(&self) -> Vec<RegisteredIndex> {
        self.snapshot.load().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register one more index.
    ///
    /// # Errors
    ///
    /// * `InvalidDefinition` - empty name, no languages, or a name that cannot be an alias
    /// * `UnknownStrategy` - the strategy key is not registered
    /// * `AlreadyRegistered` - name or identifier collides with an existing entry
    pub fn add_index(&self, definition: IndexDefinition) -> Result<(), IndexerError> {
        let entry = self.build_entry(definition)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot.load_full();
        let mut next = Snapshot::default();
        for existing in &current.entries {
            next.insert(existing.clone())?;
        }
        let name = entry.definition.index_name.clone();
        next.insert(entry)?;
        self.snapshot.store(Arc::new(next));

        info!(index = %name, "Registered index");
        Ok(())
    }

    /// Replace the whole catalog.
    ///
    /// The new set is validated as a whole; if any definition is rejected the
    /// previous catalog stays in place.
    pub fn set_indices(&self, definitions: Vec<IndexDefinition>) -> Result<(), IndexerError> {
        let next = self.build_snapshot(definitions)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let count = next.entries.len();
        self.snapshot.store(Arc::new(next));

        info!(count = count, "Replaced index registry");
        Ok(())
    }

    /// Check that `definitions` would be accepted by [`set_indices`](Self::set_indices)
    /// without changing the catalog.
    pub fn validate_indices(&self, definitions: &[IndexDefinition]) -> Result<(), IndexerError> {
        self.build_snapshot(definitions.to_vec()).map(|_| ())
    }

    fn build_snapshot(&self, definitions: Vec<IndexDefinition>) -> Result<Snapshot, IndexerError> {
        let mut next = Snapshot::default();
        for definition in definitions {
            next.insert(self.build_entry(definition)?)?;
        }
        Ok(next)
    }

    fn build_entry(&self, definition: IndexDefinition) -> Result<RegisteredIndex, IndexerError> {
        validate_definition(&definition)?;
        let strategy = self.strategies.build(&definition)?;
        Ok(RegisteredIndex {
            definition: Arc::new(definition),
            strategy,
        })
    }
}

fn validate_definition(definition: &IndexDefinition) -> Result<(), IndexerError> {
    if definition.index_name.trim().is_empty() {
        return Err(IndexerError::invalid_definition("index name is empty"));
    }
    if definition.languages.is_empty() {
        return Err(IndexerError::invalid_definition(format!(
            "index '{}' has no languages",
            definition.index_name
        )));
    }
    let alias = alias_name(&definition.index_name);
    validate_index_name(&alias).map_err(|e| {
        IndexerError::invalid_definition(format!(
            "index '{}' cannot be used as an alias: {}",
            definition.index_name, e
        ))
    })?;
    // Physical indices carry a version suffix; the longest one must still fit.
    validate_index_name(&versioned_index_name(&alias, u64::MAX)).map_err(|e| {
        IndexerError::invalid_definition(format!(
            "index '{}' is too long for its physical indices: {}",
            definition.index_name, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> IndexRegistry {
        IndexRegistry::new(Arc::new(StrategyRegistry::with_defaults()))
    }

    fn definition(id: i32, name: &str) -> IndexDefinition {
        IndexDefinition::new(id, name, "main").with_languages(["en"])
    }

    #[test]
    fn test_add_then_get_any_case() {
        let registry = registry();
        registry.add_index(definition(1, "Articles")).unwrap();

        for name in ["Articles", "articles", "ARTICLES"] {
            let entry = registry.get_index(name).unwrap();
            assert_eq!(entry.definition.identifier, 1);
        }
        assert_eq!(registry.get_index_by_id(1).unwrap().name(), "Articles");
        assert_eq!(registry.get_index("Articles").unwrap().alias(), "articles");
    }

    #[test]
    fn test_add_duplicate_name_or_id() {
        let registry = registry();
        registry.add_index(definition(1, "Articles")).unwrap();

        assert!(matches!(
            registry.add_index(definition(2, "ARTICLES")),
            Err(IndexerError::AlreadyRegistered(_))
        ));
        assert!(matches!(
            registry.add_index(definition(1, "News")),
            Err(IndexerError::AlreadyRegistered(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_invalid_definitions() {
        let registry = registry();

        assert!(matches!(
            registry.add_index(definition(1, "  ")),
            Err(IndexerError::InvalidDefinition(_))
        ));
        assert!(matches!(
            registry.add_index(IndexDefinition::new(2, "NoLanguages", "main")),
            Err(IndexerError::InvalidDefinition(_))
        ));
        assert!(matches!(
            registry.add_index(definition(3, "has space")),
            Err(IndexerError::InvalidDefinition(_))
        ));
        assert!(matches!(
            registry.add_index(definition(5, &"a".repeat(240))),
            Err(IndexerError::InvalidDefinition(_))
        ));
        assert!(matches!(
            registry.add_index(definition(4, "Custom").with_strategy("nope")),
            Err(IndexerError::UnknownStrategy(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_required_index() {
        let registry = registry();
        assert!(matches!(
            registry.get_required_index("missing"),
            Err(IndexerError::NotRegistered(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_set_indices_replaces_catalog() {
        let registry = registry();
        registry.add_index(definition(1, "Articles")).unwrap();

        registry
            .set_indices(vec![definition(2, "News"), definition(3, "Docs")])
            .unwrap();

        assert!(registry.get_index("Articles").is_none());
        assert!(registry.get_index("news").is_some());
        let names: Vec<String> = registry.indices().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["News", "Docs"]);
    }

    #[test]
    fn test_rejected_set_keeps_previous_catalog() {
        let registry = registry();
        registry.add_index(definition(1, "Articles")).unwrap();

        let result = registry.set_indices(vec![definition(2, "News"), definition(3, "news")]);

        assert!(matches!(result, Err(IndexerError::AlreadyRegistered(_))));
        assert!(registry.get_index("Articles").is_some());
        assert!(registry.get_index("News").is_none());
    }

    #[test]
    fn test_validate_indices_does_not_register() {
        let registry = registry();
        registry
            .validate_indices(&[definition(1, "Articles"), definition(2, "News")])
            .unwrap();
        assert!(registry.is_empty());

        let invalid = IndexDefinition::new(3, "Docs", "main");
        assert!(matches!(
            registry.validate_indices(&[invalid]),
            Err(IndexerError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_readers_see_whole_snapshots() {
        let registry = Arc::new(registry());
        let first: Vec<_> = (0..20).map(|i| definition(i, &format!("a{}", i))).collect();
        let second: Vec<_> = (100..120).map(|i| definition(i, &format!("b{}", i))).collect();
        registry.set_indices(first.clone()).unwrap();

        let reader = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let names: Vec<String> =
                        registry.indices().iter().map(|e| e.name().to_string()).collect();
                    assert_eq!(names.len(), 20);
                    let all_a = names.iter().all(|n| n.starts_with('a'));
                    let all_b = names.iter().all(|n| n.starts_with('b'));
                    assert!(all_a || all_b);
                }
            })
        };

        for _ in 0..50 {
            registry.set_indices(second.clone()).unwrap();
            registry.set_indices(first.clone()).unwrap();
        }
        reader.join().unwrap();
    }

    #[test]
    fn test_name_must_leave_room_for_version_suffix() {
        let registry = registry();

        let result = registry.add_index(definition(1, &"a".repeat(234)));
        assert!(matches!(result, Err(IndexerError::InvalidDefinition(_))));

        registry.add_index(definition(2, &"b".repeat(233))).unwrap();
        let alias = registry.get_index_by_id(2).unwrap().alias();
        assert!(validate_index_name(&versioned_index_name(&alias, u64::MAX)).is_ok());
    }
}
