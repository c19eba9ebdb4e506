//! Owner profile lookup.

use crate::generation::OwnerProfile;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Source of owner profiles. `Ok(None)` means the owner has not completed a profile yet.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn fetch_profile(&self, owner_id: &str) -> Result<Option<OwnerProfile>>;
}

/// In-process profile table.
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: RwLock<HashMap<String, OwnerProfile>>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: OwnerProfile) -> Self {
        self.upsert(profile);
        self
    }

    pub fn upsert(&self, profile: OwnerProfile) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.owner_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileProvider for StaticProfiles {
    async fn fetch_profile(&self, owner_id: &str) -> Result<Option<OwnerProfile>> {
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner_id)
            .cloned())
    }
}
