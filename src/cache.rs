// Explicit memoization of loader output.
//
// Entries are keyed by the pair of source paths and live until they are
// invalidated by the caller; nothing here watches the files.
use crate::error::ReportResult;
use crate::loader::{self, Dataset, LoadReport};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub monthly: PathBuf,
    pub benchmark: PathBuf,
}

impl SourceKey {
    pub fn new(monthly: impl AsRef<Path>, benchmark: impl AsRef<Path>) -> Self {
        Self {
            monthly: monthly.as_ref().to_path_buf(),
            benchmark: benchmark.as_ref().to_path_buf(),
        }
    }
}

#[derive(Clone)]
pub struct CachedDataset {
    pub dataset: Arc<Dataset>,
    pub report: LoadReport,
}

#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<SourceKey, CachedDataset>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SourceKey) -> Option<CachedDataset> {
        self.entries.get(key).cloned()
    }

    /// Return the cached dataset for `key`, loading it with `load` on a miss.
    /// A failed load leaves the cache untouched.
    pub fn get_or_load_with<F>(&mut self, key: &SourceKey, load: F) -> ReportResult<CachedDataset>
    where
        F: FnOnce(&SourceKey) -> ReportResult<(Dataset, LoadReport)>,
    {
        if let Some(hit) = self.entries.get(key) {
            debug!("dataset cache hit for {}", key.monthly.display());
            return Ok(hit.clone());
        }
        let (dataset, report) = load(key)?;
        let entry = CachedDataset {
            dataset: Arc::new(dataset),
            report,
        };
        self.entries.insert(key.clone(), entry.clone());
        Ok(entry)
    }

    pub fn get_or_load(&mut self, key: &SourceKey) -> ReportResult<CachedDataset> {
        self.get_or_load_with(key, |k| loader::load_dataset(&k.monthly, &k.benchmark))
    }

    /// Drop one entry. Returns whether anything was cached for `key`.
    pub fn invalidate(&mut self, key: &SourceKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn loads_once_until_invalidated() {
        let mut cache = DatasetCache::new();
        let key = SourceKey::new("monthly.csv", "bench.csv");
        let calls = Cell::new(0);
        let load = |_: &SourceKey| {
            calls.set(calls.get() + 1);
            Ok((Dataset::default(), LoadReport::default()))
        };

        let first = cache.get_or_load_with(&key, load).unwrap();
        let second = cache.get_or_load_with(&key, load).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first.dataset, &second.dataset));

        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        cache.get_or_load_with(&key, load).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache = DatasetCache::new();
        let key = SourceKey::new("a.csv", "b.csv");
        let res = cache.get_or_load_with(&key, |_| {
            Err(crate::error::ReportError::DataConsistency("empty".into()))
        });
        assert!(res.is_err());
        assert!(cache.is_empty());
    }
}
