//! In-process platform emulator
//!
//! Implements the table, procedure, storage and auth contracts in memory.
//! Used by the test suites and by `hdims serve` with the `memory` backend.

mod auth;
mod procedures;
mod storage;
mod store;

pub use auth::{MemoryAuth, MIN_PASSWORD_LEN};
pub use procedures::MemoryProcedures;
pub use storage::{MemoryObjectStorage, StoredObject};
pub use store::MemoryStore;

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use hdims_core::{Collection, Role, UserProfile};

use crate::error::DbResult;
use crate::facade::{AuthProvider, DataStore, Platform};

/// Default public URL of the emulated platform
pub const DEFAULT_BASE_URL: &str = "http://localhost:54321";

/// Default document bucket
pub const DEFAULT_BUCKET: &str = "documents";

/// Account details for [`MemoryPlatform::create_user`]
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: String::new(),
            role,
            facility_id: None,
            district_id: None,
            state_id: None,
        }
    }

    pub fn full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = name.into();
        self
    }

    pub fn facility(mut self, id: Uuid) -> Self {
        self.facility_id = Some(id);
        self
    }

    pub fn district(mut self, id: Uuid) -> Self {
        self.district_id = Some(id);
        self
    }

    pub fn state(mut self, id: Uuid) -> Self {
        self.state_id = Some(id);
        self
    }
}

/// Emulated platform: tables, procedures, bucket and auth sharing state
#[derive(Debug, Clone)]
pub struct MemoryPlatform {
    pub store: MemoryStore,
    pub procedures: MemoryProcedures,
    pub storage: MemoryObjectStorage,
    pub auth: MemoryAuth,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::with_storage(DEFAULT_BASE_URL, DEFAULT_BUCKET)
    }

    pub fn with_storage(base_url: &str, bucket: &str) -> Self {
        let store = MemoryStore::new();
        Self {
            procedures: MemoryProcedures::new(store.clone()),
            storage: MemoryObjectStorage::new(base_url, bucket),
            auth: MemoryAuth::new(),
            store,
        }
    }

    /// Trait-object handle over the shared state
    pub fn platform(&self) -> Platform {
        Platform {
            store: Arc::new(self.store.clone()),
            rpc: Arc::new(self.procedures.clone()),
            storage: Arc::new(self.storage.clone()),
            auth: Arc::new(self.auth.clone()),
        }
    }

    /// Register an account and write its profile row
    pub async fn create_user(&self, user: NewUser) -> DbResult<UserProfile> {
        let account = self.auth.sign_up(&user.email, &user.password).await?;
        let profile = UserProfile {
            id: account.id,
            email: account.email,
            full_name: user.full_name,
            role: user.role,
            facility_id: user.facility_id,
            district_id: user.district_id,
            state_id: user.state_id,
            is_active: true,
        };
        self.store
            .insert(Collection::Profiles, serde_json::to_value(&profile)?)
            .await?;
        Ok(profile)
    }

    /// Insert a state, district and facility chain, returning their ids
    pub async fn seed_location(
        &self,
        state: &str,
        district: &str,
        facility: &str,
    ) -> DbResult<(Uuid, Uuid, Uuid)> {
        let state_id = Uuid::new_v4();
        let district_id = Uuid::new_v4();
        let facility_id = Uuid::new_v4();
        self.store
            .insert(Collection::States, json!({ "id": state_id, "name": state }))
            .await?;
        self.store
            .insert(
                Collection::Districts,
                json!({ "id": district_id, "name": district, "state_id": state_id }),
            )
            .await?;
        self.store
            .insert(
                Collection::Facilities,
                json!({
                    "id": facility_id,
                    "name": facility,
                    "district_id": district_id,
                    "facility_type": "primary_health_centre",
                }),
            )
            .await?;
        Ok((state_id, district_id, facility_id))
    }
}
