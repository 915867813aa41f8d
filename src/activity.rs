//! Published activity documents.
//!
//! An [`ActivityDefinition`] pairs descriptive metadata with exactly one kind of
//! geometry. The serialized form uses a `mode` tag and camelCase keys so it can be
//! stored as-is by the document database.

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;
use crate::geo_utils::{bounding_ring_points, compute_bounds, polyline_length};
use crate::path_recorder::RecordedTrack;
use crate::spot::{SpotDefinition, SpotKind};
use crate::{Bounds, GeoPoint, Meters};

/// Geometry kind of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "camelCase")]
pub enum ActivityMode {
    Path,
    Spot,
    Checkpoints,
}

impl ActivityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityMode::Path => "path",
            ActivityMode::Spot => "spot",
            ActivityMode::Checkpoints => "checkpoints",
        }
    }
}

/// The geometric target of an activity.
///
/// Serialized through `GeometryDocument`, which carries the derived fields
/// other clients read (`location`, `distanceKm`, `timerMinutes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(from = "GeometryDocument", into = "GeometryDocument")]
pub enum ActivityGeometry {
    /// Follow a recorded route to its last point.
    Path { route: Vec<GeoPoint> },
    /// Reach (and for timed zones, stay inside) a circular area.
    Spot {
        location: GeoPoint,
        spot_radius: Meters,
        spot_mode: SpotKind,
        dwell_seconds: Option<u32>,
    },
    /// Visit waypoints in order.
    Checkpoints { checkpoints: Vec<GeoPoint> },
}

/// Stored layout of [`ActivityGeometry`].
///
/// On read, `dwellSeconds` wins over `timerMinutes`; `location` and
/// `distanceKm` are recomputed from the points and ignored.
#[derive(Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum GeometryDocument {
    Path {
        route: Vec<GeoPoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<GeoPoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_km: Option<f64>,
    },
    Spot {
        location: GeoPoint,
        spot_radius: Meters,
        spot_mode: SpotKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timer_minutes: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dwell_seconds: Option<u32>,
    },
    Checkpoints {
        checkpoints: Vec<GeoPoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<GeoPoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_km: Option<f64>,
    },
}

fn rounded_km(points: &[GeoPoint]) -> f64 {
    (polyline_length(points).kilometers() * 100.0).round() / 100.0
}

impl From<GeometryDocument> for ActivityGeometry {
    fn from(doc: GeometryDocument) -> Self {
        match doc {
            GeometryDocument::Path { route, .. } => ActivityGeometry::Path { route },
            GeometryDocument::Spot {
                location,
                spot_radius,
                spot_mode,
                timer_minutes,
                dwell_seconds,
            } => ActivityGeometry::Spot {
                location,
                spot_radius,
                spot_mode,
                dwell_seconds: dwell_seconds.or_else(|| timer_minutes.map(|m| m.saturating_mul(60))),
            },
            GeometryDocument::Checkpoints { checkpoints, .. } => ActivityGeometry::Checkpoints { checkpoints },
        }
    }
}

impl From<ActivityGeometry> for GeometryDocument {
    fn from(geometry: ActivityGeometry) -> Self {
        match geometry {
            ActivityGeometry::Path { route } => GeometryDocument::Path {
                location: route.first().copied(),
                distance_km: Some(rounded_km(&route)),
                route,
            },
            ActivityGeometry::Spot {
                location,
                spot_radius,
                spot_mode,
                dwell_seconds,
            } => GeometryDocument::Spot {
                location,
                spot_radius,
                spot_mode,
                timer_minutes: dwell_seconds
                    .filter(|secs| spot_mode == SpotKind::TimedZone && secs % 60 == 0)
                    .map(|secs| secs / 60),
                dwell_seconds,
            },
            ActivityGeometry::Checkpoints { checkpoints } => GeometryDocument::Checkpoints {
                location: checkpoints.first().copied(),
                distance_km: Some(rounded_km(&checkpoints)),
                checkpoints,
            },
        }
    }
}

impl ActivityGeometry {
    pub fn mode(&self) -> ActivityMode {
        match self {
            ActivityGeometry::Path { .. } => ActivityMode::Path,
            ActivityGeometry::Spot { .. } => ActivityMode::Spot,
            ActivityGeometry::Checkpoints { .. } => ActivityMode::Checkpoints,
        }
    }

    /// Reject geometry that is missing what its mode requires.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        match self {
            ActivityGeometry::Path { route } => {
                if route.is_empty() {
                    return Err(DefinitionError::EmptyRoute);
                }
                check_coordinates(route)
            }
            ActivityGeometry::Spot { location, spot_radius, .. } => {
                if !(spot_radius.value() > 0.0) {
                    return Err(DefinitionError::NonPositiveRadius { radius: spot_radius.value() });
                }
                check_coordinates(std::slice::from_ref(location))
            }
            ActivityGeometry::Checkpoints { checkpoints } => {
                if checkpoints.len() < 2 {
                    return Err(DefinitionError::TooFewCheckpoints { found: checkpoints.len() as u32 });
                }
                check_coordinates(checkpoints)
            }
        }
    }

    /// Where a participant begins: the route start, the spot center, or the first checkpoint.
    pub fn start_point(&self) -> Option<GeoPoint> {
        match self {
            ActivityGeometry::Path { route } => route.first().copied(),
            ActivityGeometry::Spot { location, .. } => Some(*location),
            ActivityGeometry::Checkpoints { checkpoints } => checkpoints.first().copied(),
        }
    }

    /// Route or course length. Spots have none.
    pub fn distance(&self) -> Option<Meters> {
        match self {
            ActivityGeometry::Path { route } => Some(polyline_length(route)),
            ActivityGeometry::Spot { .. } => None,
            ActivityGeometry::Checkpoints { checkpoints } => Some(polyline_length(checkpoints)),
        }
    }

    /// Points a map viewport must contain to show the whole activity.
    pub fn display_points(&self) -> Vec<GeoPoint> {
        match self {
            ActivityGeometry::Path { route } => route.clone(),
            ActivityGeometry::Spot { location, spot_radius, .. } => {
                bounding_ring_points(location, *spot_radius).to_vec()
            }
            ActivityGeometry::Checkpoints { checkpoints } => checkpoints.clone(),
        }
    }

    pub fn display_bounds(&self) -> Option<Bounds> {
        compute_bounds(&self.display_points())
    }
}

fn check_coordinates(points: &[GeoPoint]) -> Result<(), DefinitionError> {
    match points.iter().position(|p| !p.is_valid()) {
        Some(index) => Err(DefinitionError::InvalidCoordinate { index: index as u32 }),
        None => Ok(()),
    }
}

impl From<&RecordedTrack> for ActivityGeometry {
    fn from(track: &RecordedTrack) -> Self {
        ActivityGeometry::Path { route: track.points.clone() }
    }
}

impl From<SpotDefinition> for ActivityGeometry {
    fn from(spot: SpotDefinition) -> Self {
        ActivityGeometry::Spot {
            location: spot.center,
            spot_radius: spot.radius,
            spot_mode: spot.kind,
            dwell_seconds: spot.dwell_minutes.map(|m| m.saturating_mul(60)),
        }
    }
}

/// Difficulty rating from 1 (easy) to 5 (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Difficulty(u8);

#[cfg(feature = "ffi")]
uniffi::custom_type!(Difficulty, u8, {
    lower: |d| d.level(),
    try_lift: |v| Ok(Difficulty::new(v)),
});

impl Difficulty {
    /// Clamp `level` into 1..=5.
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 5))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Easy",
            2 => "Easy-Moderate",
            3 => "Moderate",
            4 => "Moderate-Hard",
            _ => "Hard",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u8> for Difficulty {
    fn from(level: u8) -> Self {
        Difficulty::new(level)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

/// Descriptive payload carried alongside the geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityMetadata {
    pub title: String,
    pub description: String,
    pub tips: String,
    pub category: String,
    pub activity_type: String,
    pub difficulty: Difficulty,
    pub gallery: Vec<String>,
}

/// A publishable activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct ActivityDefinition {
    #[serde(flatten)]
    pub metadata: ActivityMetadata,
    #[serde(flatten)]
    pub geometry: ActivityGeometry,
}

impl ActivityDefinition {
    pub fn new(metadata: ActivityMetadata, geometry: ActivityGeometry) -> Self {
        Self { metadata, geometry }
    }

    pub fn mode(&self) -> ActivityMode {
        self.geometry.mode()
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.geometry.validate()
    }

    pub fn start_point(&self) -> Option<GeoPoint> {
        self.geometry.start_point()
    }
}

/// Composite document key: category, activity type and item id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct ActivityKey {
    pub category: String,
    pub activity_type: String,
    pub item_id: String,
}

impl ActivityKey {
    pub fn new(category: &str, activity_type: &str, item_id: &str) -> Self {
        Self {
            category: category.to_string(),
            activity_type: activity_type.to_string(),
            item_id: item_id.to_string(),
        }
    }

    /// Document path in the hosted database.
    pub fn document_path(&self) -> String {
        format!(
            "categories/{}/activities/{}/items/{}",
            self.category, self.activity_type, self.item_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> ActivityMetadata {
        ActivityMetadata {
            title: "Harbour loop".to_string(),
            category: "Land".to_string(),
            activity_type: "hiking".to_string(),
            difficulty: Difficulty::new(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_rejects_missing_geometry() {
        assert_eq!(
            ActivityGeometry::Path { route: vec![] }.validate(),
            Err(DefinitionError::EmptyRoute)
        );
        assert_eq!(
            ActivityGeometry::Checkpoints { checkpoints: vec![GeoPoint::new(0.0, 0.0)] }.validate(),
            Err(DefinitionError::TooFewCheckpoints { found: 1 })
        );
        let spot = ActivityGeometry::Spot {
            location: GeoPoint::new(0.0, 0.0),
            spot_radius: Meters(0.0),
            spot_mode: SpotKind::GeoHunt,
            dwell_seconds: None,
        };
        assert!(matches!(spot.validate(), Err(DefinitionError::NonPositiveRadius { .. })));
        assert_eq!(
            ActivityGeometry::Path { route: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(95.0, 0.0)] }.validate(),
            Err(DefinitionError::InvalidCoordinate { index: 1 })
        );
    }

    #[test]
    fn test_start_points() {
        let a = GeoPoint::new(1.0, 2.0);
        let b = GeoPoint::new(1.001, 2.0);
        assert_eq!(ActivityGeometry::Path { route: vec![a, b] }.start_point(), Some(a));
        assert_eq!(ActivityGeometry::Checkpoints { checkpoints: vec![b, a] }.start_point(), Some(b));
    }

    #[test]
    fn test_spot_display_bounds_cover_radius() {
        let spot = ActivityGeometry::Spot {
            location: GeoPoint::new(0.0, 0.0),
            spot_radius: Meters(111.0),
            spot_mode: SpotKind::TimedZone,
            dwell_seconds: Some(60),
        };
        let bounds = spot.display_bounds().unwrap();
        assert!((bounds.max_lat - 0.001).abs() < 1e-12);
        assert!((bounds.min_lng + 0.001).abs() < 1e-12);
        assert_eq!(spot.distance(), None);
    }

    #[test]
    fn test_spot_definition_converts_minutes() {
        let spot = SpotDefinition {
            kind: SpotKind::TimedZone,
            center: GeoPoint::new(10.0, 10.0),
            radius: Meters(30.0),
            locked: true,
            dwell_minutes: Some(2),
        };
        match ActivityGeometry::from(spot) {
            ActivityGeometry::Spot { dwell_seconds, spot_radius, .. } => {
                assert_eq!(dwell_seconds, Some(120));
                assert_eq!(spot_radius, Meters(30.0));
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_difficulty_labels_and_clamp() {
        assert_eq!(Difficulty::new(0).level(), 1);
        assert_eq!(Difficulty::new(9).label(), "Hard");
        assert_eq!(Difficulty::new(2).label(), "Easy-Moderate");
    }

    #[test]
    fn test_document_shape() {
        let def = ActivityDefinition::new(
            sample_metadata(),
            ActivityGeometry::Checkpoints {
                checkpoints: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.001)],
            },
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["mode"], "checkpoints");
        assert_eq!(json["activityType"], "hiking");
        assert_eq!(json["difficulty"], 3);
        assert_eq!(json["checkpoints"][1]["longitude"], 0.001);

        assert_eq!(json["location"]["latitude"], 0.0);
        assert_eq!(json["distanceKm"], 0.11);

        let back: ActivityDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_timed_zone_document_writes_minutes() {
        let def = ActivityDefinition::new(
            sample_metadata(),
            ActivityGeometry::Spot {
                location: GeoPoint::new(43.0, 5.0),
                spot_radius: Meters(40.0),
                spot_mode: SpotKind::TimedZone,
                dwell_seconds: Some(300),
            },
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["timerMinutes"], 5);
        assert_eq!(json["dwellSeconds"], 300);
        assert!(json.get("distanceKm").is_none());
    }

    #[test]
    fn test_builder_layout_parses() {
        let json = serde_json::json!({
            "title": "Old harbour",
            "category": "Water",
            "activityType": "swimming",
            "difficulty": 1,
            "mode": "spot",
            "location": { "latitude": 43.2951, "longitude": 5.3625 },
            "spotRadius": 50,
            "spotMode": "timedZone",
            "timerMinutes": 5
        });
        let def: ActivityDefinition = serde_json::from_value(json).unwrap();
        match def.geometry {
            ActivityGeometry::Spot { dwell_seconds, spot_radius, .. } => {
                assert_eq!(dwell_seconds, Some(300));
                assert_eq!(spot_radius, Meters(50.0));
            }
            other => panic!("unexpected geometry {:?}", other),
        }

        let json = serde_json::json!({
            "title": "Ridge",
            "mode": "path",
            "route": [
                { "latitude": 0.0, "longitude": 0.0 },
                { "latitude": 0.0, "longitude": 0.002 }
            ],
            "location": { "latitude": 0.0, "longitude": 0.0 },
            "distanceKm": 0.22
        });
        let def: ActivityDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.geometry.start_point(), Some(GeoPoint::new(0.0, 0.0)));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_spot_document_parses() {
        let json = serde_json::json!({
            "title": "Lighthouse",
            "category": "Water",
            "activityType": "kayaking",
            "difficulty": 2,
            "mode": "spot",
            "location": { "latitude": 43.0, "longitude": 5.0 },
            "spotRadius": 40.0,
            "spotMode": "timedZone",
            "dwellSeconds": 300
        });
        let def: ActivityDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.mode(), ActivityMode::Spot);
        assert_eq!(def.metadata.title, "Lighthouse");
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_document_path() {
        let key = ActivityKey::new("Land", "hiking", "abc123");
        assert_eq!(key.document_path(), "categories/Land/activities/hiking/items/abc123");
    }
}
