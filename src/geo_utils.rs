//! # Geographic Utilities
//!
//! Core geographic computation utilities for live-position tracking.
//!
//! Every distance in this crate is expressed as [`Meters`]. There is exactly one
//! distance function ([`distance_meters`]) and one Earth radius
//! ([`EARTH_RADIUS_METERS`]), so recorder gates, tracker thresholds and zone radii
//! can never drift into different units.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_meters`] | Great-circle distance between two points (haversine) |
//! | [`bearing_degrees`] | Initial compass bearing from one point to another |
//! | [`destination_point`] | Point reached by travelling a distance along a bearing |
//! | [`bounding_ring_points`] | Center plus N/E/S/W offsets enclosing a circular zone |
//! | [`polyline_length`] | Total length of a point sequence |
//! | [`compute_bounds`] | Bounding box of a point sequence |
//!
//! ## Example
//!
//! ```rust
//! use geo_progress::{GeoPoint, geo_utils};
//!
//! let start = GeoPoint::new(46.5197, 6.6323);
//! let summit = GeoPoint::new(46.5290, 6.6400);
//!
//! let distance = geo_utils::distance_meters(&start, &summit);
//! let bearing = geo_utils::bearing_degrees(&start, &summit);
//! println!("{} at {:.0}°", distance, bearing);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances assume a spherical Earth of radius 6,371,000 m. This is accurate to
//! within 0.3% for the short hops seen between consecutive GPS fixes.
//!
//! ### Flat Degree Conversion
//!
//! [`bounding_ring_points`] converts meters to degrees with a fixed
//! 111,000 m/degree factor on both axes. This is a display-only approximation: away
//! from the equator the east/west offsets under-cover the true circle slightly,
//! which map padding absorbs.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use geo::{Bearing, BoundingRect, Haversine, MultiPoint, Point};
use serde::{Deserialize, Serialize};

use crate::{Bounds, GeoPoint};

/// Mean Earth radius used by every distance computation.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Flat meters-per-degree factor used for display bounding boxes.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Tolerance applied at distance gates so boundary values survive float rounding.
const GATE_EPSILON_METERS: f64 = 1e-6;

// =============================================================================
// Meters
// =============================================================================

/// A distance along the Earth's surface, in meters.
///
/// Returned by [`distance_meters`] and accepted by every threshold in the crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meters(pub f64);

#[cfg(feature = "ffi")]
uniffi::custom_newtype!(Meters, f64);

impl Meters {
    pub const ZERO: Meters = Meters(0.0);

    /// Raw value in meters.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Value converted to kilometers.
    #[inline]
    pub fn kilometers(self) -> f64 {
        self.0 / 1000.0
    }

    /// `self >= threshold`, tolerant of sub-micrometer rounding.
    #[inline]
    pub fn reaches(self, threshold: Meters) -> bool {
        self.0 + GATE_EPSILON_METERS >= threshold.0
    }

    /// `self <= limit`, tolerant of sub-micrometer rounding.
    #[inline]
    pub fn within(self, limit: Meters) -> bool {
        self.0 <= limit.0 + GATE_EPSILON_METERS
    }

    /// Distance still missing to reach `threshold` (never negative).
    #[inline]
    pub fn shortfall_to(self, threshold: Meters) -> Meters {
        Meters((threshold.0 - self.0).max(0.0))
    }

    pub fn min(self, other: Meters) -> Meters {
        Meters(self.0.min(other.0))
    }

    pub fn max(self, other: Meters) -> Meters {
        Meters(self.0.max(other.0))
    }
}

impl Add for Meters {
    type Output = Meters;

    fn add(self, rhs: Meters) -> Meters {
        Meters(self.0 + rhs.0)
    }
}

impl AddAssign for Meters {
    fn add_assign(&mut self, rhs: Meters) {
        self.0 += rhs.0;
    }
}

impl Sub for Meters {
    type Output = Meters;

    fn sub(self, rhs: Meters) -> Meters {
        Meters(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Meters {
    fn sum<I: Iterator<Item = Meters>>(iter: I) -> Meters {
        Meters(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Meters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}m", self.0)
    }
}

// =============================================================================
// Distance and Bearing
// =============================================================================

/// Calculate the great-circle distance between two points using the haversine formula.
///
/// Computed on [`EARTH_RADIUS_METERS`] rather than `geo`'s mean radius
/// (6,371,008.8 m), so it agrees with [`destination_point`] and every threshold.
///
/// # Arguments
///
/// * `a` - First point
/// * `b` - Second point
///
/// # Returns
///
/// Distance along the Earth's surface. Symmetric, and exactly zero for identical points.
///
/// # Example
///
/// ```rust
/// use geo_progress::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::distance_meters(&london, &paris);
/// assert!((distance.value() - 343_500.0).abs() < 2_000.0);
/// ```
#[inline]
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> Meters {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    Meters(EARTH_RADIUS_METERS * c)
}

/// Initial compass bearing (forward azimuth) from `from` to `to`.
///
/// Returns degrees in `[0, 360)`, where 0 is north and 90 is east. Identical
/// points yield 0. Bearing is independent of the sphere's radius, so this is
/// `geo`'s [`Haversine`] bearing.
///
/// # Example
///
/// ```rust
/// use geo_progress::{GeoPoint, geo_utils};
///
/// let origin = GeoPoint::new(0.0, 0.0);
/// let east = GeoPoint::new(0.0, 1.0);
/// assert!((geo_utils::bearing_degrees(&origin, &east) - 90.0).abs() < 1e-9);
/// ```
pub fn bearing_degrees(from: &GeoPoint, to: &GeoPoint) -> f64 {
    Haversine::bearing(Point::from(*from), Point::from(*to))
}

/// Point reached from `origin` after travelling `distance` along `bearing` degrees.
///
/// Inverse of [`distance_meters`]/[`bearing_degrees`] on the same sphere, so a
/// point produced here measures back to `distance` up to float rounding.
pub fn destination_point(origin: &GeoPoint, bearing: f64, distance: Meters) -> GeoPoint {
    let angular = distance.value() / EARTH_RADIUS_METERS;
    let theta = bearing.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Normalise longitude to [-180, 180)
    let lon2 = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;
    GeoPoint::new(lat2.to_degrees(), lon2)
}

/// Calculate the total length of a point sequence.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point sequences return zero.
pub fn polyline_length(points: &[GeoPoint]) -> Meters {
    if points.len() < 2 {
        return Meters::ZERO;
    }

    points
        .windows(2)
        .map(|w| distance_meters(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Center plus four points offset by `radius` north, east, south and west.
///
/// Fitting a map viewport to these five points guarantees the whole circular
/// zone is visible. Uses the flat [`METERS_PER_DEGREE`] conversion.
///
/// # Example
///
/// ```rust
/// use geo_progress::{GeoPoint, Meters, geo_utils};
///
/// let ring = geo_utils::bounding_ring_points(&GeoPoint::new(10.0, 20.0), Meters(111.0));
/// assert_eq!(ring[0], GeoPoint::new(10.0, 20.0));
/// assert!((ring[1].latitude - 10.001).abs() < 1e-12); // north
/// assert!((ring[4].longitude - 19.999).abs() < 1e-12); // west
/// ```
pub fn bounding_ring_points(center: &GeoPoint, radius: Meters) -> [GeoPoint; 5] {
    let offset = radius.value() / METERS_PER_DEGREE;

    [
        *center,
        GeoPoint::new(center.latitude + offset, center.longitude),
        GeoPoint::new(center.latitude, center.longitude + offset),
        GeoPoint::new(center.latitude - offset, center.longitude),
        GeoPoint::new(center.latitude, center.longitude - offset),
    ]
}

/// Compute the bounding box of a point sequence.
///
/// Returns `None` for empty input.
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    let multi: MultiPoint<f64> = points.iter().map(|p| Point::from(*p)).collect::<Vec<_>>().into();
    let rect = multi.bounding_rect()?;

    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
