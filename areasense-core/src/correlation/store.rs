//! Profile map and persistence interface
//!
//! The core never performs I/O. A host supplies a [`ProfileStore`]; replace
//! semantics (atomic or otherwise) belong to the implementation.

use core::convert::Infallible;
use std::collections::BTreeMap;

use crate::model::AreaId;

use super::AreaProfile;

/// All learned room profiles, keyed by stable room id
pub type AreaProfileMap = BTreeMap<AreaId, AreaProfile>;

/// Loads and saves the profile map
pub trait ProfileStore {
    /// Error type of the backing storage
    type Error: core::fmt::Display;

    /// Load every stored profile
    ///
    /// An empty map is a valid result for a store that has never been saved.
    fn load(&mut self) -> Result<AreaProfileMap, Self::Error>;

    /// Replace the stored profiles with `profiles`
    fn save(&mut self, profiles: &AreaProfileMap) -> Result<(), Self::Error>;
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    profiles: AreaProfileMap,
    saves: u32,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `profiles`
    pub fn with_profiles(profiles: AreaProfileMap) -> Self {
        Self { profiles, saves: 0 }
    }

    /// Currently stored profiles
    pub fn profiles(&self) -> &AreaProfileMap {
        &self.profiles
    }

    /// Number of completed saves
    pub fn save_count(&self) -> u32 {
        self.saves
    }
}

impl ProfileStore for MemoryStore {
    type Error = Infallible;

    fn load(&mut self) -> Result<AreaProfileMap, Self::Error> {
        Ok(self.profiles.clone())
    }

    fn save(&mut self, profiles: &AreaProfileMap) -> Result<(), Self::Error> {
        self.profiles = profiles.clone();
        self.saves = self.saves.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut profiles = AreaProfileMap::new();
        profiles.insert("kitchen".into(), AreaProfile::new("kitchen".into()));

        let mut store = MemoryStore::new();
        assert!(store.load().map(|m| m.is_empty()).unwrap_or(false));

        store.save(&profiles).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), profiles);
    }
}
