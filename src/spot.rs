//! Spot and zone definition.
//!
//! Two authoring flows share one definer, selected by [`SpotKind`]:
//!
//! - **Geo Hunt**: place a marker, drop the radius on it, optionally drag the
//!   detection center anywhere within one radius of the marker, then lock.
//! - **Timed Zone**: drop the radius at the current position and set how many
//!   minutes the participant must stay inside.
//!
//! The radius is adjusted through a [`RadiusDial`], which turns a continuous drag
//! delta into whole steps clamped to the dial's range.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::distance_meters;
use crate::{GeoPoint, Meters, Precondition, Rejection};

/// Which spot flow is being authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "camelCase")]
pub enum SpotKind {
    GeoHunt,
    TimedZone,
}

/// Maps a drag gesture onto stepped radius changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct RadiusDial {
    pub min_radius: Meters,
    pub max_radius: Meters,
    /// Radius change per discrete increment.
    pub step: Meters,
    /// Drag distance (in input units, e.g. points) per increment.
    pub sensitivity: f64,
}

impl RadiusDial {
    /// 5–1000 m in 5 m steps.
    pub fn geo_hunt() -> Self {
        Self {
            min_radius: Meters(5.0),
            max_radius: Meters(1000.0),
            step: Meters(5.0),
            sensitivity: 2.0,
        }
    }

    /// 10–1000 m in 10 m steps.
    pub fn timed_zone() -> Self {
        Self {
            min_radius: Meters(10.0),
            max_radius: Meters(1000.0),
            step: Meters(10.0),
            sensitivity: 2.0,
        }
    }

    /// Radius after dragging `delta` from `current`.
    pub fn apply(&self, current: Meters, delta: f64) -> Meters {
        let increments = if self.sensitivity > 0.0 {
            (delta / self.sensitivity).round()
        } else {
            0.0
        };
        let next = current.value() + increments * self.step.value();
        Meters(next.max(self.min_radius.value()).min(self.max_radius.value()))
    }
}

/// Dials for both spot flows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default, rename_all = "camelCase")]
pub struct SpotConfig {
    pub geo_hunt_dial: RadiusDial,
    pub timed_zone_dial: RadiusDial,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            geo_hunt_dial: RadiusDial::geo_hunt(),
            timed_zone_dial: RadiusDial::timed_zone(),
        }
    }
}

impl SpotConfig {
    pub fn dial(&self, kind: SpotKind) -> &RadiusDial {
        match kind {
            SpotKind::GeoHunt => &self.geo_hunt_dial,
            SpotKind::TimedZone => &self.timed_zone_dial,
        }
    }
}

/// Authoring phase of a spot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SpotPhase {
    Empty,
    /// Geo Hunt: marker placed, radius not yet dropped.
    MarkerPlaced { marker: GeoPoint },
    /// Geo Hunt: detection center may roam within one radius of the marker.
    Adjustable { marker: GeoPoint, center: GeoPoint },
    /// Geo Hunt: frozen.
    Locked { marker: GeoPoint, center: GeoPoint },
    /// Timed Zone: radius dropped, dwell set once `dwell_minutes` is present.
    ZoneDropped { center: GeoPoint, dwell_minutes: Option<u32> },
}

impl SpotPhase {
    fn name(&self) -> &'static str {
        match self {
            SpotPhase::Empty => "empty",
            SpotPhase::MarkerPlaced { .. } => "marker placed",
            SpotPhase::Adjustable { .. } => "adjustable",
            SpotPhase::Locked { .. } => "locked",
            SpotPhase::ZoneDropped { .. } => "zone dropped",
        }
    }
}

/// A usable spot: center, radius and (for timed zones) dwell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct SpotDefinition {
    pub kind: SpotKind,
    pub center: GeoPoint,
    pub radius: Meters,
    pub locked: bool,
    pub dwell_minutes: Option<u32>,
}

/// An authoring session for one spot or zone.
#[derive(Debug, Clone)]
pub struct SpotDefiner {
    kind: SpotKind,
    dial: RadiusDial,
    radius: Meters,
    phase: SpotPhase,
}

impl SpotDefiner {
    /// Start a definer whose radius begins at the dial minimum.
    pub fn new(kind: SpotKind, config: &SpotConfig) -> Self {
        let dial = *config.dial(kind);
        Self {
            kind,
            dial,
            radius: dial.min_radius,
            phase: SpotPhase::Empty,
        }
    }

    /// Geo Hunt only: set the marker.
    pub fn place_marker(&mut self, point: GeoPoint) -> Result<(), Rejection> {
        if self.kind != SpotKind::GeoHunt || self.phase != SpotPhase::Empty {
            return Err(Rejection::invalid("place a marker", self.phase.name()));
        }
        if !point.is_valid() {
            return Err(Precondition::InvalidPosition.into());
        }
        debug!("[SpotDefiner] Marker placed at {:?}", point);
        self.phase = SpotPhase::MarkerPlaced { marker: point };
        Ok(())
    }

    /// Drop the detection radius.
    ///
    /// Geo Hunt drops it on the marker and ignores `current`; Timed Zone drops it
    /// at `current`, which must be known.
    pub fn drop_radius(&mut self, current: Option<GeoPoint>) -> Result<(), Rejection> {
        match (self.kind, self.phase) {
            (SpotKind::GeoHunt, SpotPhase::MarkerPlaced { marker }) => {
                self.phase = SpotPhase::Adjustable { marker, center: marker };
            }
            (SpotKind::GeoHunt, SpotPhase::Empty) => return Err(Precondition::MarkerNotPlaced.into()),
            (SpotKind::TimedZone, SpotPhase::Empty) => {
                let center = current.ok_or(Rejection::PreconditionNotMet { missing: Precondition::NoPosition })?;
                if !center.is_valid() {
                    return Err(Precondition::InvalidPosition.into());
                }
                self.phase = SpotPhase::ZoneDropped { center, dwell_minutes: None };
            }
            (_, phase) => return Err(Rejection::invalid("drop the radius", phase.name())),
        }
        info!("[SpotDefiner] Radius {} dropped ({:?})", self.radius, self.kind);
        Ok(())
    }

    /// Geo Hunt only: move the detection center, staying within one radius of the marker.
    pub fn move_center(&mut self, point: GeoPoint) -> Result<(), Rejection> {
        match self.phase {
            SpotPhase::Adjustable { marker, .. } => {
                let offset = distance_meters(&marker, &point);
                if !offset.within(self.radius) {
                    return Err(Rejection::too_far(offset, self.radius));
                }
                self.phase = SpotPhase::Adjustable { marker, center: point };
                Ok(())
            }
            phase => Err(Rejection::invalid("move the center", phase.name())),
        }
    }

    /// Apply a drag to the radius. Disabled before the radius is dropped and once locked.
    pub fn adjust_radius(&mut self, delta: f64) -> Result<Meters, Rejection> {
        match self.phase {
            SpotPhase::Adjustable { marker, center } => {
                self.radius = self.dial.apply(self.radius, delta);
                if !distance_meters(&marker, &center).within(self.radius) {
                    debug!("[SpotDefiner] Radius shrank past center offset; re-centering on marker");
                    self.phase = SpotPhase::Adjustable { marker, center: marker };
                }
                Ok(self.radius)
            }
            SpotPhase::ZoneDropped { .. } => {
                self.radius = self.dial.apply(self.radius, delta);
                Ok(self.radius)
            }
            SpotPhase::Empty | SpotPhase::MarkerPlaced { .. } => Err(Precondition::RadiusNotDropped.into()),
            SpotPhase::Locked { .. } => Err(Rejection::invalid("adjust the radius", "locked")),
        }
    }

    /// Geo Hunt only: freeze center and radius permanently.
    pub fn lock(&mut self) -> Result<(), Rejection> {
        match self.phase {
            SpotPhase::Adjustable { marker, center } => {
                info!("[SpotDefiner] Locked at {:?} with radius {}", center, self.radius);
                self.phase = SpotPhase::Locked { marker, center };
                Ok(())
            }
            SpotPhase::Empty | SpotPhase::MarkerPlaced { .. } => Err(Precondition::RadiusNotDropped.into()),
            phase => Err(Rejection::invalid("lock", phase.name())),
        }
    }

    /// Timed Zone only: minutes the participant must stay inside. Values below 1 are raised to 1.
    pub fn set_dwell_duration(&mut self, minutes: u32) -> Result<u32, Rejection> {
        match self.phase {
            SpotPhase::ZoneDropped { center, .. } => {
                let minutes = minutes.max(1);
                self.phase = SpotPhase::ZoneDropped { center, dwell_minutes: Some(minutes) };
                Ok(minutes)
            }
            SpotPhase::Empty => Err(Precondition::RadiusNotDropped.into()),
            phase => Err(Rejection::invalid("set the dwell duration", phase.name())),
        }
    }

    /// Step back one phase. A locked spot cannot be undone.
    pub fn undo(&mut self) -> Result<(), Rejection> {
        self.phase = match self.phase {
            SpotPhase::Adjustable { marker, .. } => SpotPhase::MarkerPlaced { marker },
            SpotPhase::MarkerPlaced { .. } | SpotPhase::ZoneDropped { .. } => SpotPhase::Empty,
            phase @ (SpotPhase::Empty | SpotPhase::Locked { .. }) => {
                return Err(Rejection::invalid("undo", phase.name()));
            }
        };
        Ok(())
    }

    pub fn kind(&self) -> SpotKind {
        self.kind
    }

    pub fn phase(&self) -> &SpotPhase {
        &self.phase
    }

    pub fn radius(&self) -> Meters {
        self.radius
    }

    /// Current detection center, once the radius is dropped.
    pub fn center(&self) -> Option<GeoPoint> {
        match self.phase {
            SpotPhase::Adjustable { center, .. }
            | SpotPhase::Locked { center, .. }
            | SpotPhase::ZoneDropped { center, .. } => Some(center),
            SpotPhase::Empty | SpotPhase::MarkerPlaced { .. } => None,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.definition().is_ok()
    }

    /// The finished spot, once locked (Geo Hunt) or once dwell is set (Timed Zone).
    pub fn definition(&self) -> Result<SpotDefinition, Rejection> {
        match (self.kind, self.phase) {
            (SpotKind::GeoHunt, SpotPhase::Locked { center, .. }) => Ok(SpotDefinition {
                kind: SpotKind::GeoHunt,
                center,
                radius: self.radius,
                locked: true,
                dwell_minutes: None,
            }),
            (SpotKind::GeoHunt, SpotPhase::Empty | SpotPhase::MarkerPlaced { .. }) => {
                Err(Precondition::RadiusNotDropped.into())
            }
            (SpotKind::GeoHunt, _) => Err(Precondition::NotLocked.into()),
            (SpotKind::TimedZone, SpotPhase::ZoneDropped { center, dwell_minutes: Some(minutes) }) => {
                Ok(SpotDefinition {
                    kind: SpotKind::TimedZone,
                    center,
                    radius: self.radius,
                    locked: true,
                    dwell_minutes: Some(minutes),
                })
            }
            (SpotKind::TimedZone, SpotPhase::ZoneDropped { .. }) => Err(Precondition::DwellNotSet.into()),
            (SpotKind::TimedZone, _) => Err(Precondition::RadiusNotDropped.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::destination_point;

    fn marker() -> GeoPoint {
        GeoPoint::new(60.1699, 24.9384)
    }

    fn offset(bearing: f64, meters: f64) -> GeoPoint {
        destination_point(&marker(), bearing, Meters(meters))
    }

    fn adjustable_geo_hunt(radius_drag: f64) -> SpotDefiner {
        let mut definer = SpotDefiner::new(SpotKind::GeoHunt, &SpotConfig::default());
        definer.place_marker(marker()).unwrap();
        definer.drop_radius(None).unwrap();
        definer.adjust_radius(radius_drag).unwrap();
        definer
    }

    #[test]
    fn test_dial_steps_and_clamps() {
        let dial = RadiusDial::geo_hunt();
        assert_eq!(dial.apply(Meters(5.0), 10.0), Meters(30.0));
        assert_eq!(dial.apply(Meters(30.0), -4.0), Meters(20.0));
        assert_eq!(dial.apply(Meters(30.0), -1000.0), Meters(5.0));
        assert_eq!(dial.apply(Meters(30.0), 10_000.0), Meters(1000.0));
        assert_eq!(dial.apply(Meters(30.0), 0.4), Meters(30.0));
    }

    #[test]
    fn test_radius_requires_marker() {
        let mut definer = SpotDefiner::new(SpotKind::GeoHunt, &SpotConfig::default());
        assert_eq!(
            definer.drop_radius(None),
            Err(Rejection::PreconditionNotMet { missing: Precondition::MarkerNotPlaced })
        );
        assert!(definer.adjust_radius(10.0).is_err());
    }

    #[test]
    fn test_center_roams_within_radius() {
        // 5 m + 9 increments of 5 m = 50 m
        let mut definer = adjustable_geo_hunt(18.0);
        assert_eq!(definer.radius(), Meters(50.0));

        assert!(definer.move_center(offset(45.0, 40.0)).is_ok());
        assert_eq!(definer.center(), Some(offset(45.0, 40.0)));

        match definer.move_center(offset(45.0, 60.0)) {
            Err(Rejection::TooFar { excess, .. }) => assert!((excess.value() - 10.0).abs() < 1e-6),
            other => panic!("expected TooFar, got {:?}", other),
        }
        assert_eq!(definer.center(), Some(offset(45.0, 40.0)));
    }

    #[test]
    fn test_shrinking_radius_recenters() {
        let mut definer = adjustable_geo_hunt(18.0);
        definer.move_center(offset(0.0, 40.0)).unwrap();
        definer.adjust_radius(-10.0).unwrap(); // 50 -> 25 m
        assert_eq!(definer.center(), Some(marker()));
    }

    #[test]
    fn test_locked_spot_is_immutable() {
        let mut definer = adjustable_geo_hunt(18.0);
        definer.lock().unwrap();
        let before = definer.definition().unwrap();

        assert!(definer.move_center(offset(90.0, 10.0)).is_err());
        assert!(definer.adjust_radius(20.0).is_err());
        assert!(definer.undo().is_err());
        assert!(definer.lock().is_err());

        assert_eq!(definer.definition().unwrap(), before);
        assert_eq!(before.center, marker());
        assert!(before.locked);
    }

    #[test]
    fn test_geo_hunt_needs_lock() {
        let definer = adjustable_geo_hunt(0.0);
        assert_eq!(
            definer.definition(),
            Err(Rejection::PreconditionNotMet { missing: Precondition::NotLocked })
        );
        assert!(!definer.is_usable());
    }

    #[test]
    fn test_undo_steps_back() {
        let mut definer = adjustable_geo_hunt(0.0);
        definer.undo().unwrap();
        assert_eq!(definer.phase(), &SpotPhase::MarkerPlaced { marker: marker() });
        definer.undo().unwrap();
        assert_eq!(definer.phase(), &SpotPhase::Empty);
        assert!(definer.undo().is_err());
    }

    #[test]
    fn test_timed_zone_flow() {
        let mut definer = SpotDefiner::new(SpotKind::TimedZone, &SpotConfig::default());
        assert_eq!(definer.radius(), Meters(10.0));
        assert!(definer.place_marker(marker()).is_err());
        assert_eq!(
            definer.drop_radius(None),
            Err(Rejection::PreconditionNotMet { missing: Precondition::NoPosition })
        );

        definer.drop_radius(Some(marker())).unwrap();
        assert_eq!(
            definer.definition(),
            Err(Rejection::PreconditionNotMet { missing: Precondition::DwellNotSet })
        );
        assert!(definer.move_center(offset(0.0, 1.0)).is_err());

        assert_eq!(definer.adjust_radius(8.0), Ok(Meters(50.0)));
        assert_eq!(definer.set_dwell_duration(0), Ok(1));
        assert_eq!(definer.set_dwell_duration(5), Ok(5));

        let spot = definer.definition().unwrap();
        assert_eq!(spot.center, marker());
        assert_eq!(spot.radius, Meters(50.0));
        assert_eq!(spot.dwell_minutes, Some(5));

        definer.undo().unwrap();
        assert_eq!(definer.phase(), &SpotPhase::Empty);
    }
}
