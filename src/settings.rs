//! User preferences: favorite and hidden projects, recently opened projects, scan root.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::store::PersistenceStore;
use crate::utils::config::RECENT_PROJECTS_MAX;

const SETTINGS_KEY: &str = "settings";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsData {
    #[serde(default)]
    pub favorites: BTreeSet<PathBuf>,
    #[serde(default)]
    pub hidden: BTreeSet<PathBuf>,
    /// Most recent first.
    #[serde(default)]
    pub recent: Vec<PathBuf>,
    pub scan_root: Option<PathBuf>,
}

fn toggle(set: &mut BTreeSet<PathBuf>, path: &Path) -> bool {
    if set.remove(path) {
        false
    } else {
        set.insert(path.to_path_buf())
    }
}

pub struct Settings {
    data: Mutex<SettingsData>,
    store: Option<Arc<dyn PersistenceStore>>,
}

impl Settings {
    /// Load from `store` (defaults when absent or unreadable).
    pub fn load(store: Option<Arc<dyn PersistenceStore>>) -> Self {
        let data = store
            .as_ref()
            .and_then(|s| match s.get(SETTINGS_KEY) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("settings load: {:#}", e);
                    None
                }
            })
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("settings decode: {}", e);
                    None
                }
            })
            .unwrap_or_default();
        Self {
            data: Mutex::new(data),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SettingsData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and persist the result.
    fn update<R>(&self, f: impl FnOnce(&mut SettingsData) -> R) -> R {
        let mut data = self.lock();
        let out = f(&mut data);
        if let Some(store) = &self.store {
            let res = serde_json::to_string(&*data)
                .map_err(anyhow::Error::from)
                .and_then(|raw| store.set(SETTINGS_KEY, &raw));
            if let Err(e) = res {
                warn!("settings persist: {:#}", e);
            }
        }
        out
    }

    pub fn snapshot(&self) -> SettingsData {
        self.lock().clone()
    }

    pub fn is_favorite(&self, path: &Path) -> bool {
        self.lock().favorites.contains(path)
    }

    pub fn set_favorite(&self, path: &Path, favorite: bool) {
        self.update(|d| {
            if favorite {
                d.favorites.insert(path.to_path_buf());
            } else {
                d.favorites.remove(path);
            }
        });
    }

    /// Flip the favorite flag; returns the new state.
    pub fn toggle_favorite(&self, path: &Path) -> bool {
        self.update(|d| toggle(&mut d.favorites, path))
    }

    pub fn is_hidden(&self, path: &Path) -> bool {
        self.lock().hidden.contains(path)
    }

    pub fn set_hidden(&self, path: &Path, hidden: bool) {
        self.update(|d| {
            if hidden {
                d.hidden.insert(path.to_path_buf());
            } else {
                d.hidden.remove(path);
            }
        });
    }

    pub fn toggle_hidden(&self, path: &Path) -> bool {
        self.update(|d| toggle(&mut d.hidden, path))
    }

    /// Move `path` to the front of the recent list, keeping at most `RECENT_PROJECTS_MAX`.
    pub fn add_recent(&self, path: &Path) {
        self.update(|d| {
            d.recent.retain(|p| p != path);
            d.recent.insert(0, path.to_path_buf());
            d.recent.truncate(RECENT_PROJECTS_MAX);
        });
    }

    pub fn recent(&self) -> Vec<PathBuf> {
        self.lock().recent.clone()
    }

    pub fn scan_root(&self) -> Option<PathBuf> {
        self.lock().scan_root.clone()
    }

    pub fn set_scan_root(&self, path: &Path) {
        self.update(|d| d.scan_root = Some(path.to_path_buf()));
    }
}
