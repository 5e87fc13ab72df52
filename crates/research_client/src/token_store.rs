use std::sync::Arc;

use research_core::{CacheEntry, Credential, UserProfile, PROFILE_TTL_MS};

use crate::clock::Clock;
use crate::store::{load_json, save_json, KeyValueStore, StoreError};

const ACCESS_TOKEN_KEY: &str = "access_token";
const USER_DATA_KEY: &str = "user_data";

/// Owns the bearer credential and the last resolved user profile.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Overwrites the stored credential in one key write.
    pub fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), ACCESS_TOKEN_KEY, credential)
    }

    /// Returns the stored credential without judging its expiry.
    pub fn read(&self) -> Result<Option<Credential>, StoreError> {
        load_json(self.store.as_ref(), ACCESS_TOKEN_KEY)
    }

    /// Removes the credential and the cached profile. Idempotent.
    pub fn clear(&self) -> Result<(), StoreError> {
        let token = self.store.remove(ACCESS_TOKEN_KEY);
        let profile = self.store.remove(USER_DATA_KEY);
        token.and(profile)
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let entry = CacheEntry::new(profile, (self.clock)());
        save_json(self.store.as_ref(), USER_DATA_KEY, &entry)
    }

    /// The cached profile if it is younger than an hour.
    pub fn fresh_profile(&self) -> Result<Option<UserProfile>, StoreError> {
        let now = (self.clock)();
        Ok(self
            .load_profile()?
            .and_then(|entry| entry.into_fresh(now, PROFILE_TTL_MS)))
    }

    /// The cached profile regardless of age; the fallback when resolution fails.
    pub fn any_profile(&self) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.load_profile()?.map(|entry| entry.payload))
    }

    /// Drops the cached profile so the next resolution asks the backend.
    pub fn forget_profile(&self) -> Result<(), StoreError> {
        self.store.remove(USER_DATA_KEY)
    }

    fn load_profile(&self) -> Result<Option<CacheEntry<UserProfile>>, StoreError> {
        load_json(self.store.as_ref(), USER_DATA_KEY)
    }
}
