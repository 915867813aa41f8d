//! Nearby-activity discovery.
//!
//! Ranks published activities by the great-circle distance from the user to
//! each activity's start point. When a search radius is given, an R-tree over
//! start points discards far-away activities before any haversine is computed.

use std::cmp::Ordering;

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::activity::{ActivityDefinition, ActivityMode};
use crate::geo_utils::{distance_meters, EARTH_RADIUS_METERS};
use crate::{GeoPoint, Meters};

/// A published activity and its document id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ActivityListing {
    pub id: String,
    pub definition: ActivityDefinition,
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct NearbyActivity {
    pub id: String,
    pub title: String,
    pub mode: ActivityMode,
    pub start: GeoPoint,
    pub distance: Meters,
}

/// Start point of listing `index`, indexed as `[lng, lat]`.
struct StartEntry {
    index: usize,
    point: GeoPoint,
}

impl RTreeObject for StartEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.longitude, self.point.latitude])
    }
}

/// Degree envelope that contains every point within `radius` of `origin`.
///
/// The longitude half-width is the exact extent of a spherical cap,
/// `asin(sin(r / R) / cos(lat))`. Returns `None` when the cap reaches a pole or
/// crosses the antimeridian, in which case callers scan everything.
fn search_envelope(origin: &GeoPoint, radius: Meters) -> Option<AABB<[f64; 2]>> {
    // 1% padding absorbs rounding at the gate.
    let angular = radius.value() / EARTH_RADIUS_METERS * 1.01;
    let spread = angular.sin() / origin.latitude.to_radians().cos();
    if !(spread < 1.0) {
        return None;
    }
    let dlat = angular.to_degrees();
    let dlng = spread.asin().to_degrees();
    let (min_lat, max_lat) = (origin.latitude - dlat, origin.latitude + dlat);
    let (min_lng, max_lng) = (origin.longitude - dlng, origin.longitude + dlng);
    if min_lat < -90.0 || max_lat > 90.0 || min_lng < -180.0 || max_lng > 180.0 {
        return None;
    }
    Some(AABB::from_corners([min_lng, min_lat], [max_lng, max_lat]))
}

/// Indices of listings whose start could be within `max_distance`.
fn candidates(origin: &GeoPoint, starts: &[(usize, GeoPoint)], max_distance: Option<Meters>) -> Vec<(usize, GeoPoint)> {
    let Some(envelope) = max_distance.and_then(|radius| search_envelope(origin, radius)) else {
        return starts.to_vec();
    };
    let tree = RTree::bulk_load(
        starts
            .iter()
            .map(|&(index, point)| StartEntry { index, point })
            .collect(),
    );
    tree.locate_in_envelope(&envelope)
        .map(|entry| (entry.index, entry.point))
        .collect()
}

fn start_points(listings: &[ActivityListing]) -> Vec<(usize, GeoPoint)> {
    listings
        .iter()
        .enumerate()
        .filter_map(|(i, l)| l.definition.start_point().filter(GeoPoint::is_valid).map(|p| (i, p)))
        .collect()
}

fn ranked(origin: &GeoPoint, listing: &ActivityListing, start: GeoPoint, max_distance: Option<Meters>) -> Option<NearbyActivity> {
    let distance = distance_meters(origin, &start);
    if let Some(limit) = max_distance {
        if !distance.within(limit) {
            return None;
        }
    }
    Some(NearbyActivity {
        id: listing.id.clone(),
        title: listing.definition.metadata.title.clone(),
        mode: listing.definition.mode(),
        start,
        distance,
    })
}

fn by_distance(a: &NearbyActivity, b: &NearbyActivity) -> Ordering {
    a.distance
        .value()
        .partial_cmp(&b.distance.value())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

/// Listings ordered nearest-first, optionally limited to `max_distance`.
///
/// Listings without a valid start point are skipped.
///
/// # Example
///
/// ```rust
/// use geo_progress::{GeoPoint, Meters};
/// use geo_progress::activity::{ActivityDefinition, ActivityGeometry, ActivityMetadata};
/// use geo_progress::discovery::{rank_by_distance, ActivityListing};
///
/// let listing = ActivityListing {
///     id: "pier".to_string(),
///     definition: ActivityDefinition::new(
///         ActivityMetadata::default(),
///         ActivityGeometry::Path { route: vec![GeoPoint::new(0.0, 0.001)] },
///     ),
/// };
/// let nearby = rank_by_distance(&GeoPoint::new(0.0, 0.0), &[listing], Some(Meters(500.0)));
/// assert_eq!(nearby.len(), 1);
/// ```
pub fn rank_by_distance(origin: &GeoPoint, listings: &[ActivityListing], max_distance: Option<Meters>) -> Vec<NearbyActivity> {
    let starts = start_points(listings);
    let mut results: Vec<NearbyActivity> = candidates(origin, &starts, max_distance)
        .into_iter()
        .filter_map(|(i, start)| ranked(origin, &listings[i], start, max_distance))
        .collect();
    results.sort_by(by_distance);
    debug!("[Discovery] {} of {} activities in range", results.len(), listings.len());
    results
}

/// Same as [`rank_by_distance`] but computes distances with rayon.
#[cfg(feature = "parallel")]
pub fn rank_by_distance_parallel(
    origin: &GeoPoint,
    listings: &[ActivityListing],
    max_distance: Option<Meters>,
) -> Vec<NearbyActivity> {
    use rayon::prelude::*;

    let starts = start_points(listings);
    let mut results: Vec<NearbyActivity> = candidates(origin, &starts, max_distance)
        .into_par_iter()
        .filter_map(|(i, start)| ranked(origin, &listings[i], start, max_distance))
        .collect();
    results.par_sort_by(by_distance);
    debug!("[Discovery] {} of {} activities in range (parallel)", results.len(), listings.len());
    results
}
