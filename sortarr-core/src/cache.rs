use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::media::{Identity, MediaType, ProviderId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    Movie(ProviderId),
    Season { show_id: ProviderId, season: u32 },
    /// Folder holding a show's files, aliasing its identity.
    ShowFolder(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("identity of kind {actual} cannot be stored under {key:?}")]
    KindMismatch { key: CacheKey, actual: MediaType },

    #[error("season entry {key:?} needs the complete episode listing")]
    MissingSeason { key: CacheKey },

    #[error("identity {actual} does not belong under {key:?}")]
    IdentityMismatch { key: CacheKey, actual: ProviderId },
}

/// In-process store of confirmed identities.
///
/// Values are immutable `Arc<Identity>`s and a commit swaps the whole value,
/// so a reader sees either the previous entry or the new complete one.
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    entries: Arc<DashMap<CacheKey, Arc<Identity>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<Identity>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Stores `identity` under `key` after checking it is complete for that
    /// key.
    pub fn commit(&self, key: CacheKey, identity: Identity) -> Result<Arc<Identity>, CacheError> {
        let identity = Arc::new(identity);
        self.commit_shared(key, Arc::clone(&identity))?;
        Ok(identity)
    }

    /// Like [`commit`](Self::commit) for an identity that is already shared.
    pub fn commit_shared(&self, key: CacheKey, identity: Arc<Identity>) -> Result<(), CacheError> {
        validate(&key, &identity)?;
        debug!(key = ?key, title = identity.title(), "committing identity");
        self.entries.insert(key, identity);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

fn validate(key: &CacheKey, identity: &Identity) -> Result<(), CacheError> {
    let expected_kind = match key {
        CacheKey::Movie(_) => MediaType::Movie,
        CacheKey::Season { .. } | CacheKey::ShowFolder(_) => MediaType::Tv,
    };
    if identity.kind() != expected_kind {
        return Err(CacheError::KindMismatch {
            key: key.clone(),
            actual: identity.kind(),
        });
    }

    match key {
        CacheKey::Movie(id) if id != identity.provider_id() => Err(CacheError::IdentityMismatch {
            key: key.clone(),
            actual: identity.provider_id().clone(),
        }),
        CacheKey::Season { show_id, season } => {
            if show_id != identity.provider_id() {
                return Err(CacheError::IdentityMismatch {
                    key: key.clone(),
                    actual: identity.provider_id().clone(),
                });
            }
            match identity.season() {
                Some(listing) if listing.season_number() == *season && !listing.is_empty() => Ok(()),
                _ => Err(CacheError::MissingSeason { key: key.clone() }),
            }
        }
        _ => Ok(()),
    }
}
