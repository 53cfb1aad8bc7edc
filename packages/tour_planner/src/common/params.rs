//! Structs representing a tour planning request. UserPlanTourParameters
//! mirrors the JSON body exactly as it is received from the API, and is
//! validated into PlanTourParameters before any planning takes place.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::str::FromStr;

use crate::common::config::RoutingProfile;
use crate::common::tour::TrackPoint;
use crate::error::PlanningError;

/// Raw coordinates supplied for a single waypoint
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaypointLocation {
    pub id: String,
    pub map_location: TrackPoint,
}

/// Stores the user's requested tour exactly as it is received from the API
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPlanTourParameters {
    pub waypoint_id_list: Vec<String>,
    #[serde(default)]
    pub waypoint_location_list: Vec<WaypointLocation>,
    #[serde(default)]
    pub routing_profile: Option<String>,
}

/// Stores a validated tour request. Waypoints are visited in the order they
/// appear in `waypoint_ids`, coordinates for any waypoint are looked up in
/// `locations` by id
#[derive(Debug, Clone, PartialEq)]
pub struct PlanTourParameters {
    pub waypoint_ids: Vec<String>,
    pub locations: FxHashMap<String, TrackPoint>,
    pub profile: RoutingProfile,
}

impl PlanTourParameters {
    pub fn new(waypoint_ids: Vec<String>, profile: RoutingProfile) -> Self {
        PlanTourParameters {
            waypoint_ids,
            locations: FxHashMap::default(),
            profile,
        }
    }

    pub fn with_location(mut self, id: &str, point: TrackPoint) -> Self {
        self.locations.insert(id.to_string(), point);
        self
    }
}

impl TryFrom<UserPlanTourParameters> for PlanTourParameters {
    type Error = PlanningError;

    fn try_from(user: UserPlanTourParameters) -> Result<Self, Self::Error> {
        if user.waypoint_id_list.len() < 2 {
            return Err(PlanningError::InvalidParameters(format!(
                "at least 2 waypoints are required, got {}",
                user.waypoint_id_list.len()
            )));
        }

        if let Some(blank) = user
            .waypoint_id_list
            .iter()
            .position(|id| id.trim().is_empty())
        {
            return Err(PlanningError::InvalidParameters(format!(
                "waypoint at position {blank} has an empty id"
            )));
        }

        let profile = match user.routing_profile.as_deref() {
            Some(raw) => RoutingProfile::from_str(raw)
                .map_err(PlanningError::InvalidParameters)?,
            None => RoutingProfile::default(),
        };

        let mut locations = FxHashMap::<String, TrackPoint>::default();
        for location in user.waypoint_location_list {
            if !location.map_location.is_finite() {
                return Err(PlanningError::InvalidParameters(format!(
                    "waypoint '{}' has a non-finite location",
                    location.id
                )));
            }
            locations.insert(location.id, location.map_location);
        }

        Ok(PlanTourParameters {
            waypoint_ids: user.waypoint_id_list,
            locations,
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_user_params() -> UserPlanTourParameters {
        UserPlanTourParameters {
            waypoint_id_list: vec!["graph:a".to_string(), "home".to_string()],
            waypoint_location_list: vec![WaypointLocation {
                id: "home".to_string(),
                map_location: TrackPoint::new(47.1, 11.2, Some(600.0)),
            }],
            routing_profile: Some("foot-walking".to_string()),
        }
    }

    /// Check conversion from the user parameters retains all of the
    /// necessary information
    #[test]
    fn test_user_params_to_params() {
        let result =
            PlanTourParameters::try_from(get_test_user_params()).unwrap();

        let target = PlanTourParameters::new(
            vec!["graph:a".to_string(), "home".to_string()],
            RoutingProfile::FootWalking,
        )
        .with_location("home", TrackPoint::new(47.1, 11.2, Some(600.0)));

        assert_eq!(result, target);
    }

    /// The request body should be accepted in its camelCase form, with the
    /// optional fields left out
    #[test]
    fn test_deserialize_minimal() {
        let body = r#"{"waypointIdList": ["graph:a", "graph:b"]}"#;

        let result: UserPlanTourParameters =
            serde_json::from_str(body).unwrap();
        let params = PlanTourParameters::try_from(result).unwrap();

        assert_eq!(params.profile, RoutingProfile::FootHiking);
        assert!(params.locations.is_empty());
    }

    #[test]
    fn test_deserialize_locations() {
        let body = r#"{
            "waypointIdList": ["x", "y"],
            "waypointLocationList": [
                {"id": "x", "mapLocation": {"lat": 1.0, "lon": 2.0}},
                {"id": "y", "mapLocation": {"lat": 3.0, "lon": 4.0, "alt": 5.0}}
            ],
            "routingProfile": "cycling-mountain"
        }"#;

        let result: UserPlanTourParameters =
            serde_json::from_str(body).unwrap();
        let params = PlanTourParameters::try_from(result).unwrap();

        assert_eq!(params.locations["y"], TrackPoint::new(3.0, 4.0, Some(5.0)));
        assert_eq!(params.profile, RoutingProfile::CyclingMountain);
    }

    mod test_validation {
        use super::*;

        /// A single waypoint can't form a tour
        #[test]
        fn test_single_waypoint() {
            let mut user = get_test_user_params();
            user.waypoint_id_list.truncate(1);

            let result = PlanTourParameters::try_from(user);

            assert!(matches!(result, Err(PlanningError::InvalidParameters(_))));
        }

        #[test]
        fn test_empty_waypoints() {
            let mut user = get_test_user_params();
            user.waypoint_id_list.clear();

            let result = PlanTourParameters::try_from(user);

            assert!(matches!(result, Err(PlanningError::InvalidParameters(_))));
        }

        #[test]
        fn test_unknown_profile() {
            let mut user = get_test_user_params();
            user.routing_profile = Some("driving-car".to_string());

            let result = PlanTourParameters::try_from(user);

            assert!(matches!(result, Err(PlanningError::InvalidParameters(_))));
        }

        #[test]
        fn test_non_finite_location() {
            let mut user = get_test_user_params();
            user.waypoint_location_list[0].map_location.lat = f64::NAN;

            let result = PlanTourParameters::try_from(user);

            assert!(matches!(result, Err(PlanningError::InvalidParameters(_))));
        }
    }
}
