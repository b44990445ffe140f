//! Location hierarchy: State → District → Facility

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A state (top of the administrative hierarchy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A district, belonging to one state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    pub id: Uuid,
    pub name: String,
    pub state_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Facility category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    DistrictHospital,
    SubDistrictHospital,
    CommunityHealthCentre,
    PrimaryHealthCentre,
    SubCentre,
    #[default]
    Other,
}

impl FacilityType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "district_hospital" | "dh" => Some(Self::DistrictHospital),
            "sub_district_hospital" | "sdh" => Some(Self::SubDistrictHospital),
            "community_health_centre" | "community_health_center" | "chc" => {
                Some(Self::CommunityHealthCentre)
            }
            "primary_health_centre" | "primary_health_center" | "phc" => {
                Some(Self::PrimaryHealthCentre)
            }
            "sub_centre" | "sub_center" | "sc" => Some(Self::SubCentre),
            "other" | "" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A healthcare facility, belonging to one district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: Uuid,
    pub name: String,
    pub district_id: Uuid,
    #[serde(default)]
    pub facility_type: FacilityType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_type_aliases() {
        assert_eq!(FacilityType::from_str("PHC"), Some(FacilityType::PrimaryHealthCentre));
        assert_eq!(
            FacilityType::from_str("Community Health Center"),
            Some(FacilityType::CommunityHealthCentre)
        );
        assert_eq!(FacilityType::from_str("spaceship"), None);
    }

    #[test]
    fn test_active_defaults_to_true() {
        let district: DistrictRecord = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Pune",
            "state_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert!(district.is_active);
    }
}
