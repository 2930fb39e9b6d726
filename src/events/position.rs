//! Persisted read positions per (host, entity class, entity).
//!
//! Positions make event waits monotonic: a later wait never re-matches a
//! line an earlier wait on the same class already consumed. Each position
//! is mirrored to a small file for debugging; the in-memory map is the
//! authority within a run.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::topology::EntityClass;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PositionKey {
    pub host: String,
    pub class: EntityClass,
    pub label: String,
}

pub struct PositionStore {
    dir: PathBuf,
    positions: HashMap<PositionKey, usize>,
}

impl PositionStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            positions: HashMap::new(),
        })
    }

    fn file_for(&self, key: &PositionKey) -> PathBuf {
        let sanitized: String = key
            .label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("pos-{}-{}-{}", key.host, key.class, sanitized))
    }

    /// Current position of one entity, creating it if this (class, entity)
    /// combination has not been observed yet. A new entity joining an
    /// existing class starts at the class's high-water mark for that host
    /// so it does not rescan history; the first entity of a class starts at
    /// the host-wide mark.
    pub(crate) fn ensure(&mut self, key: &PositionKey) -> usize {
        if let Some(&pos) = self.positions.get(key) {
            return pos;
        }
        let start = self
            .class_high_water(&key.host, key.class)
            .unwrap_or_else(|| self.host_high_water(&key.host));
        self.positions.insert(key.clone(), start);
        self.persist(key, start);
        start
    }

    pub(crate) fn get(&self, key: &PositionKey) -> usize {
        self.positions.get(key).copied().unwrap_or(0)
    }

    /// Advance one entity's position. Never moves backwards.
    pub(crate) fn advance(&mut self, key: &PositionKey, to: usize) {
        let entry = self.positions.entry(key.clone()).or_insert(0);
        if to > *entry {
            *entry = to;
            let snapshot = *entry;
            self.persist(key, snapshot);
        }
    }

    /// Highest consumed position of a class on one host, if the class has
    /// been waited on at all.
    fn class_high_water(&self, host: &str, class: EntityClass) -> Option<usize> {
        self.positions
            .iter()
            .filter(|(k, _)| k.host == host && k.class == class)
            .map(|(_, &pos)| pos)
            .max()
    }

    /// Highest consumed position across all classes on one host.
    fn host_high_water(&self, host: &str) -> usize {
        self.positions
            .iter()
            .filter(|(k, _)| k.host == host)
            .map(|(_, &pos)| pos)
            .max()
            .unwrap_or(0)
    }

    /// Re-base every position of `class` on `host` to the host-wide
    /// high-water mark. Called when the waited-on entity class changes so
    /// events already consumed under another class are not double-counted.
    pub(crate) fn rebase_class(&mut self, host: &str, class: EntityClass) {
        let target = self.host_high_water(host);
        let keys: Vec<PositionKey> = self
            .positions
            .keys()
            .filter(|k| k.host == host && k.class == class)
            .cloned()
            .collect();
        for key in keys {
            self.advance(&key, target);
        }
        debug!(host, %class, target, "re-based class positions");
    }

    fn persist(&self, key: &PositionKey, position: usize) {
        // best effort; the files exist for post-mortem debugging only
        let _ = fs::write(self.file_for(key), format!("{} {}\n", position, key.label));
    }
}
