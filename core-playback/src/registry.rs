//! # Preload Registry
//!
//! Named pools of backends fetched ahead of time, keyed by
//! `(category, clip name)`.
//!
//! Preloading never checks for duplicates: preloading a name twice appends
//! a second entry, which lets a caller refresh an entry it suspects is stale.
//! Lookups return the first entry whose backend is still alive (loading,
//! ready or paused). Torn-down entries are pruned on lookup.

use std::collections::HashMap;
use tracing::debug;

use crate::backend::{BackendId, PlaybackBackend};
use crate::clip::{AudioCategory, AudioClip};

/// A preloaded clip and the backend holding its media.
#[derive(Debug)]
pub struct PreloadEntry {
    pub clip: AudioClip,
    pub backend: PlaybackBackend,
}

#[derive(Debug, Default)]
pub struct PreloadRegistry {
    entries: HashMap<AudioCategory, Vec<PreloadEntry>>,
}

impl PreloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `backend` for `clip` under `category`.
    pub fn preload(&mut self, category: AudioCategory, clip: AudioClip, backend: PlaybackBackend) -> BackendId {
        let id = backend.id();
        debug!(%category, clip = %clip.name, backend = %id, "Preloading clip");
        self.entries
            .entry(category)
            .or_default()
            .push(PreloadEntry { clip, backend });
        id
    }

    /// First live backend preloaded for `name`.
    pub fn find(&mut self, category: AudioCategory, name: &str) -> Option<&mut PlaybackBackend> {
        let entries = self.entries.get_mut(&category)?;
        prune_dead(entries);
        entries
            .iter_mut()
            .find(|e| e.clip.name == name)
            .map(|e| &mut e.backend)
    }

    /// Remove and return the first live entry for `name`.
    ///
    /// A channel claims the backend it is about to play so that the backend
    /// has a single owner.
    pub fn claim(&mut self, category: AudioCategory, name: &str) -> Option<PreloadEntry> {
        let entries = self.entries.get_mut(&category)?;
        prune_dead(entries);
        let index = entries.iter().position(|e| e.clip.name == name)?;
        Some(entries.remove(index))
    }

    pub fn contains(&mut self, category: AudioCategory, name: &str) -> bool {
        self.find(category, name).is_some()
    }

    /// Backend with `id`, in any category and any state.
    pub fn get_mut(&mut self, id: BackendId) -> Option<(AudioCategory, &mut PreloadEntry)> {
        self.entries.iter_mut().find_map(|(category, entries)| {
            entries
                .iter_mut()
                .find(|e| e.backend.id() == id)
                .map(|e| (*category, e))
        })
    }

    /// Number of entries under `category`, dead ones included.
    pub fn len(&self, category: AudioCategory) -> usize {
        self.entries.get(&category).map(Vec::len).unwrap_or(0)
    }

    pub fn total_len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// URLs of entries whose load failed.
    pub fn errored_urls(&self) -> Vec<String> {
        self.entries
            .values()
            .flatten()
            .filter(|e| e.backend.is_errored())
            .map(|e| e.backend.url().to_string())
            .collect()
    }

    /// Drop every torn-down entry and return how many were removed.
    pub fn prune(&mut self) -> usize {
        self.entries.values_mut().map(prune_dead).sum()
    }

    /// Stop and drop every entry.
    pub fn clear(&mut self) {
        for entry in self.entries.values_mut().flat_map(|e| e.iter_mut()) {
            entry.backend.stop();
        }
        self.entries.clear();
    }
}

fn prune_dead(entries: &mut Vec<PreloadEntry>) -> usize {
    let before = entries.len();
    entries.retain(|e| e.backend.is_alive());
    before - entries.len()
}
