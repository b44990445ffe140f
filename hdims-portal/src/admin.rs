//! Location and user management
//!
//! Super-admin operations over states, districts, facilities and user
//! profiles. Deleting a state or district removes its children through the
//! store's cascade.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use hdims_core::{
    Collection, DistrictRecord, FacilityRecord, FacilityType, Permission, StateRecord, UserProfile,
};
use hdims_db::{DataStore, DbError, Order, Query};

use crate::error::{PortalError, PortalResult};
use crate::session::CurrentUser;

/// Fields to change on a location; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub facility_type: Option<FacilityType>,
}

impl LocationPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn facility_type(mut self, facility_type: FacilityType) -> Self {
        self.facility_type = Some(facility_type);
        self
    }

    fn to_value(&self) -> PortalResult<Value> {
        let mut patch = Map::new();
        if let Some(name) = &self.name {
            patch.insert("name".into(), json!(required_name(name)?));
        }
        if let Some(code) = &self.code {
            patch.insert("code".into(), json!(code.trim()));
        }
        if let Some(facility_type) = self.facility_type {
            patch.insert("facility_type".into(), json!(facility_type));
        }
        if patch.is_empty() {
            return Err(DbError::InvalidQuery("nothing to update".into()).into());
        }
        Ok(Value::Object(patch))
    }
}

fn required_name(name: &str) -> PortalResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(hdims_core::ValidationError::MissingFields(vec!["name".into()]).into());
    }
    Ok(name)
}

/// Admin operations run as one signed-in user
pub struct AdminService {
    store: Arc<dyn DataStore>,
    actor: CurrentUser,
}

impl AdminService {
    /// Requires the location and user management permissions
    pub fn new(store: Arc<dyn DataStore>, actor: CurrentUser) -> PortalResult<Self> {
        actor.require(Permission::ManageLocations)?;
        actor.require(Permission::ManageUsers)?;
        Ok(Self { store, actor })
    }

    async fn list<T: DeserializeOwned>(&self, table: Collection, query: Query) -> PortalResult<Vec<T>> {
        self.store
            .select(table, &query.order("name", Order::Asc))
            .await?
            .data
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(PortalError::from))
            .collect()
    }

    async fn create<T: DeserializeOwned>(&self, table: Collection, row: Value) -> PortalResult<T> {
        let stored = self.store.insert(table, row).await?;
        info!(table = %table, actor = %self.actor.profile.id, "Location created");
        Ok(serde_json::from_value(stored)?)
    }

    async fn patch<T: DeserializeOwned>(&self, table: Collection, id: Uuid, patch: Value) -> PortalResult<T> {
        let row = self
            .store
            .update(table, patch, &Query::new().eq("id", id.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(format!("{} {}", table, id)))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn remove(&self, table: Collection, id: Uuid) -> PortalResult<()> {
        let removed = self
            .store
            .delete(table, &Query::new().eq("id", id.to_string()))
            .await?;
        if removed.is_empty() {
            return Err(DbError::not_found(format!("{} {}", table, id)).into());
        }
        info!(table = %table, id = %id, actor = %self.actor.profile.id, "Location deleted");
        Ok(())
    }

    // States

    pub async fn list_states(&self) -> PortalResult<Vec<StateRecord>> {
        self.list(Collection::States, Query::new()).await
    }

    pub async fn create_state(&self, name: &str, code: Option<&str>) -> PortalResult<StateRecord> {
        let row = json!({ "name": required_name(name)?, "code": code.map(str::trim) });
        self.create(Collection::States, row).await
    }

    pub async fn update_state(&self, id: Uuid, patch: &LocationPatch) -> PortalResult<StateRecord> {
        self.patch(Collection::States, id, patch.to_value()?).await
    }

    pub async fn set_state_active(&self, id: Uuid, active: bool) -> PortalResult<StateRecord> {
        self.patch(Collection::States, id, json!({ "is_active": active })).await
    }

    /// Delete a state with its districts and facilities
    pub async fn delete_state(&self, id: Uuid) -> PortalResult<()> {
        self.remove(Collection::States, id).await
    }

    // Districts

    pub async fn list_districts(&self, state_id: Uuid) -> PortalResult<Vec<DistrictRecord>> {
        self.list(
            Collection::Districts,
            Query::new().eq("state_id", state_id.to_string()),
        )
        .await
    }

    pub async fn create_district(
        &self,
        state_id: Uuid,
        name: &str,
        code: Option<&str>,
    ) -> PortalResult<DistrictRecord> {
        let row = json!({
            "name": required_name(name)?,
            "state_id": state_id,
            "code": code.map(str::trim),
        });
        self.create(Collection::Districts, row).await
    }

    pub async fn update_district(&self, id: Uuid, patch: &LocationPatch) -> PortalResult<DistrictRecord> {
        self.patch(Collection::Districts, id, patch.to_value()?).await
    }

    pub async fn set_district_active(&self, id: Uuid, active: bool) -> PortalResult<DistrictRecord> {
        self.patch(Collection::Districts, id, json!({ "is_active": active }))
            .await
    }

    /// Delete a district with its facilities
    pub async fn delete_district(&self, id: Uuid) -> PortalResult<()> {
        self.remove(Collection::Districts, id).await
    }

    // Facilities

    pub async fn list_facilities(&self, district_id: Uuid) -> PortalResult<Vec<FacilityRecord>> {
        self.list(
            Collection::Facilities,
            Query::new().eq("district_id", district_id.to_string()),
        )
        .await
    }

    pub async fn create_facility(
        &self,
        district_id: Uuid,
        name: &str,
        facility_type: FacilityType,
    ) -> PortalResult<FacilityRecord> {
        let row = json!({
            "name": required_name(name)?,
            "district_id": district_id,
            "facility_type": facility_type,
        });
        self.create(Collection::Facilities, row).await
    }

    pub async fn update_facility(&self, id: Uuid, patch: &LocationPatch) -> PortalResult<FacilityRecord> {
        self.patch(Collection::Facilities, id, patch.to_value()?).await
    }

    pub async fn set_facility_active(&self, id: Uuid, active: bool) -> PortalResult<FacilityRecord> {
        self.patch(Collection::Facilities, id, json!({ "is_active": active }))
            .await
    }

    pub async fn delete_facility(&self, id: Uuid) -> PortalResult<()> {
        self.remove(Collection::Facilities, id).await
    }

    // Users

    pub async fn list_users(&self) -> PortalResult<Vec<UserProfile>> {
        self.store
            .select(
                Collection::Profiles,
                &Query::new().order("email", Order::Asc),
            )
            .await?
            .data
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(PortalError::from))
            .collect()
    }

    /// Activate or deactivate an account; admins cannot deactivate themselves
    pub async fn set_user_active(&self, user_id: Uuid, active: bool) -> PortalResult<UserProfile> {
        if !active && user_id == self.actor.profile.id {
            return Err(PortalError::forbidden("cannot deactivate your own account"));
        }
        let profile: UserProfile = self
            .patch(Collection::Profiles, user_id, json!({ "is_active": active }))
            .await?;
        info!(user_id = %user_id, active, actor = %self.actor.profile.id, "User status changed");
        Ok(profile)
    }
}
