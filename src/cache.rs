//! Latest result per analysis kind, with the time it was captured.
//!
//! Entries are held as JSON so one map serves every payload type. The persistence store is
//! optional and best effort: a failing store degrades to an in-memory cache with a warning.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::CacheError;
use crate::jobs::unix_now;
use crate::store::PersistenceStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Outdated,
    Audit,
    Dependencies,
    Toolchain,
    Licenses,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Outdated,
        AnalysisKind::Audit,
        AnalysisKind::Dependencies,
        AnalysisKind::Toolchain,
        AnalysisKind::Licenses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Outdated => "outdated",
            AnalysisKind::Audit => "audit",
            AnalysisKind::Dependencies => "dependencies",
            AnalysisKind::Toolchain => "toolchain",
            AnalysisKind::Licenses => "licenses",
        }
    }

    /// Key under which the entry is persisted.
    pub fn store_key(&self) -> String {
        format!("cache.{}", self.as_str())
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown analysis kind '{}'", s))
    }
}

/// A cached value and its capture time (unix seconds).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedResult<T> {
    pub value: T,
    pub captured_at: u64,
}

pub struct ResultCache {
    entries: Mutex<HashMap<AnalysisKind, CachedResult<serde_json::Value>>>,
    store: Option<Arc<dyn PersistenceStore>>,
}

impl ResultCache {
    pub fn new(store: Option<Arc<dyn PersistenceStore>>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AnalysisKind, CachedResult<serde_json::Value>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pull every kind from the store into memory. Returns how many entries were loaded;
    /// unreadable entries are skipped with a warning.
    pub fn load(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let mut entries = self.lock();
        for kind in AnalysisKind::ALL {
            let raw = match store.get(&kind.store_key()) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("cache load {}: {:#}", kind, e);
                    continue;
                }
            };
            match serde_json::from_str::<CachedResult<serde_json::Value>>(&raw) {
                Ok(entry) => {
                    entries.insert(kind, entry);
                }
                Err(source) => warn!(
                    "{}",
                    CacheError::Deserialize {
                        kind: kind.as_str(),
                        source
                    }
                ),
            }
        }
        debug!("cache loaded {} entries", entries.len());
        entries.len()
    }

    /// Latest value for `kind`, or `None` when absent or not decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, kind: AnalysisKind) -> Option<CachedResult<T>> {
        let entry = self.lock().get(&kind).cloned()?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(CachedResult {
                value,
                captured_at: entry.captured_at,
            }),
            Err(source) => {
                warn!(
                    "{}",
                    CacheError::Deserialize {
                        kind: kind.as_str(),
                        source
                    }
                );
                None
            }
        }
    }

    /// Capture time of the entry for `kind`, if any.
    pub fn captured_at(&self, kind: AnalysisKind) -> Option<u64> {
        self.lock().get(&kind).map(|e| e.captured_at)
    }

    /// Replace the entry for `kind` and persist it. Returns the capture timestamp.
    pub fn save<T: Serialize>(&self, kind: AnalysisKind, value: &T) -> Result<u64, CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Serialize {
            kind: kind.as_str(),
            source,
        })?;
        let entry = CachedResult {
            value,
            captured_at: unix_now(),
        };
        let captured_at = entry.captured_at;

        let mut entries = self.lock();
        if let Some(store) = &self.store {
            match serde_json::to_string(&entry) {
                Ok(raw) => {
                    if let Err(e) = store.set(&kind.store_key(), &raw) {
                        warn!("cache persist {}: {:#}", kind, e);
                    }
                }
                Err(source) => warn!(
                    "{}",
                    CacheError::Serialize {
                        kind: kind.as_str(),
                        source
                    }
                ),
            }
        }
        entries.insert(kind, entry);
        Ok(captured_at)
    }
}
