//! # Geo Progress
//!
//! Live-position progress tracking and activity authoring for outdoor trails,
//! zones and checkpoint courses.
//!
//! This library provides:
//! - Recorders that turn a live position stream into an activity definition
//!   (freehand paths, checkpoint courses, spots and timed zones)
//! - A progress tracker that evaluates a live position stream against a
//!   published activity and reports guidance, dwell countdowns and completion
//! - Plain data boundaries for position sources, document storage and
//!   reverse geocoding
//!
//! Every session is an explicit state machine. Recorders and the tracker are
//! pure reducers (`state, input -> state, outcome`) wrapped in small `&mut self`
//! session types; none of them blocks, spawns or owns a timer.
//!
//! ## Features
//!
//! - **`parallel`** - Rank nearby activities with rayon
//! - **`http`** - Enable the reverse geocoding HTTP client
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use geo_progress::{
//!     ActivityDefinition, ActivityGeometry, ActivityMetadata, ActivityTracker,
//!     GeoPoint, PositionFix, TrackerConfig, TrackerEvent,
//! };
//!
//! let course = ActivityDefinition::new(
//!     ActivityMetadata { title: "Harbour run".to_string(), ..Default::default() },
//!     ActivityGeometry::Checkpoints {
//!         checkpoints: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.001)],
//!     },
//! );
//!
//! let mut tracker = ActivityTracker::start(course, TrackerConfig::default(), 0).unwrap();
//! let events = tracker.on_fix(PositionFix::new(GeoPoint::new(0.0, 0.0), 0)).unwrap();
//! assert!(events.contains(&TrackerEvent::CheckpointReached { index: 0, remaining: 1 }));
//! ```

use serde::{Deserialize, Serialize};

pub mod activity;
pub mod checkpoints;
pub mod config;
pub mod discovery;
pub mod error;
pub mod geo_utils;
pub mod geocode;
pub mod path_recorder;
pub mod source;
pub mod spot;
pub mod store;
pub mod tracker;

pub use activity::{ActivityDefinition, ActivityGeometry, ActivityKey, ActivityMetadata, ActivityMode, Difficulty};
pub use checkpoints::{CheckpointConfig, CheckpointEdit, CheckpointRecorder, CheckpointRole, PendingRemoval};
pub use config::{ConfigError, EngineConfig};
pub use discovery::{rank_by_distance, ActivityListing, NearbyActivity};
pub use error::{DefinitionError, Precondition, Rejection};
pub use geo_utils::Meters;
pub use path_recorder::{PathRecorder, RecordedTrack, RecorderConfig, RecorderEvent, RecorderPhase};
pub use source::{FixHandler, PositionFix, PositionListener, PositionSource, SessionFeed};
pub use spot::{RadiusDial, SpotConfig, SpotDefiner, SpotDefinition, SpotKind, SpotPhase};
pub use store::{ActivityStore, CompletionRecord};
pub use tracker::{ActivityTracker, TrackerConfig, TrackerEvent, TrackerStatus, TrackingSummary};

#[cfg(feature = "parallel")]
pub use discovery::rank_by_distance_parallel;

#[cfg(feature = "http")]
pub use geocode::ReverseGeocoder;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("GeoProgressRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

/// Result of a user action on a recorder: an optional event, or a structured refusal.
pub type Outcome<E> = Result<Option<E>, Rejection>;

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in degrees.
///
/// # Example
/// ```
/// use geo_progress::GeoPoint;
/// let point = GeoPoint::new(46.5197, 6.6323); // Lausanne
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

/// Bounding box for map viewports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Viewport deltas `(lat, lng)` with `padding` as a fraction of each span.
    pub fn deltas(&self, padding: f64) -> (f64, f64) {
        (
            (self.max_lat - self.min_lat) * (1.0 + padding),
            (self.max_lng - self.min_lng) * (1.0 + padding),
        )
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use std::sync::{Arc, Mutex, MutexGuard};

    use log::{debug, info};

    use super::*;

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // Geo math and documents
    // ========================================================================

    #[uniffi::export]
    pub fn ffi_distance_meters(a: GeoPoint, b: GeoPoint) -> Meters {
        geo_utils::distance_meters(&a, &b)
    }

    #[uniffi::export]
    pub fn ffi_bearing_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
        geo_utils::bearing_degrees(&from, &to)
    }

    #[uniffi::export]
    pub fn ffi_bounding_ring_points(center: GeoPoint, radius: Meters) -> Vec<GeoPoint> {
        geo_utils::bounding_ring_points(&center, radius).to_vec()
    }

    #[uniffi::export]
    pub fn default_engine_config() -> EngineConfig {
        EngineConfig::default()
    }

    #[uniffi::export]
    pub fn ffi_validate_activity(definition: ActivityDefinition) -> Result<(), DefinitionError> {
        init_logging();
        definition.validate()
    }

    #[uniffi::export]
    pub fn ffi_activity_start_point(definition: ActivityDefinition) -> Option<GeoPoint> {
        definition.start_point()
    }

    #[uniffi::export]
    pub fn ffi_activity_display_bounds(definition: ActivityDefinition) -> Option<Bounds> {
        definition.geometry.display_bounds()
    }

    #[uniffi::export]
    pub fn ffi_document_path(key: ActivityKey) -> String {
        key.document_path()
    }

    #[uniffi::export]
    pub fn ffi_completion_record(
        activity_id: String,
        definition: ActivityDefinition,
        summary: TrackingSummary,
        completed_at: i64,
    ) -> CompletionRecord {
        CompletionRecord::from_summary(&activity_id, &definition, &summary, completed_at)
    }

    #[uniffi::export]
    pub fn ffi_format_duration(total_secs: u64) -> String {
        store::format_duration(total_secs)
    }

    #[uniffi::export]
    pub fn ffi_share_message(app_name: String, record: CompletionRecord) -> String {
        store::share_message(&app_name, &record)
    }

    #[uniffi::export]
    pub fn ffi_rank_nearby(
        origin: GeoPoint,
        listings: Vec<ActivityListing>,
        max_distance: Option<Meters>,
    ) -> Vec<NearbyActivity> {
        init_logging();
        info!("[GeoProgressRust] rank_nearby called with {} listings", listings.len());
        let start = std::time::Instant::now();
        let ranked = discovery::rank_by_distance_parallel(&origin, &listings, max_distance);
        info!("[GeoProgressRust] Ranked {} nearby in {:?}", ranked.len(), start.elapsed());
        ranked
    }

    #[uniffi::export]
    pub fn ffi_coordinates_label(point: GeoPoint) -> String {
        geocode::format_coordinates(&point)
    }

    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn ffi_reverse_geocode(api_key: String, point: GeoPoint) -> String {
        init_logging();
        geocode::reverse_geocode_sync(&api_key, point)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Live tracking session for a published activity.
    #[derive(uniffi::Object)]
    pub struct TrackerSession {
        inner: Mutex<ActivityTracker>,
    }

    #[uniffi::export]
    impl TrackerSession {
        #[uniffi::constructor]
        pub fn new(
            definition: ActivityDefinition,
            config: TrackerConfig,
            started_at_ms: i64,
        ) -> Result<Arc<Self>, DefinitionError> {
            init_logging();
            let tracker = ActivityTracker::start(definition, config, started_at_ms)?;
            Ok(Arc::new(Self { inner: Mutex::new(tracker) }))
        }

        pub fn on_fix(&self, fix: PositionFix) -> Result<Vec<TrackerEvent>, Rejection> {
            let events = lock(&self.inner).on_fix(fix)?;
            debug!("[GeoProgressRust] Fix produced {} events", events.len());
            Ok(events)
        }

        pub fn tick(&self, now_ms: i64) -> Result<Vec<TrackerEvent>, Rejection> {
            lock(&self.inner).tick(now_ms)
        }

        pub fn pause(&self, at_ms: i64) -> Result<Vec<TrackerEvent>, Rejection> {
            lock(&self.inner).pause(at_ms)
        }

        pub fn resume(&self, at_ms: i64) -> Result<Vec<TrackerEvent>, Rejection> {
            lock(&self.inner).resume(at_ms)
        }

        pub fn cancel(&self, at_ms: i64) -> Result<Vec<TrackerEvent>, Rejection> {
            lock(&self.inner).cancel(at_ms)
        }

        pub fn dispose(&self) {
            lock(&self.inner).dispose();
        }

        pub fn status(&self) -> TrackerStatus {
            lock(&self.inner).status()
        }

        pub fn current_index(&self) -> u32 {
            lock(&self.inner).current_index()
        }

        pub fn elapsed_secs(&self, now_ms: i64) -> u64 {
            lock(&self.inner).elapsed_secs(now_ms)
        }

        pub fn dwell_remaining_secs(&self, now_ms: i64) -> Option<u64> {
            lock(&self.inner).dwell_remaining_secs(now_ms)
        }
    }

    /// Freehand path authoring session.
    #[derive(uniffi::Object)]
    pub struct PathRecorderSession {
        inner: Mutex<PathRecorder>,
    }

    #[uniffi::export]
    impl PathRecorderSession {
        #[uniffi::constructor]
        pub fn new(config: RecorderConfig) -> Arc<Self> {
            init_logging();
            Arc::new(Self { inner: Mutex::new(PathRecorder::new(config)) })
        }

        pub fn on_fix(&self, point: GeoPoint) -> Option<RecorderEvent> {
            lock(&self.inner).on_fix(point)
        }

        pub fn start(&self) -> Result<Option<RecorderEvent>, Rejection> {
            lock(&self.inner).start()
        }

        pub fn pause(&self) -> Result<Option<RecorderEvent>, Rejection> {
            lock(&self.inner).pause()
        }

        pub fn resume(&self) -> Result<Option<RecorderEvent>, Rejection> {
            lock(&self.inner).resume()
        }

        pub fn finish(&self) -> Result<Option<RecorderEvent>, Rejection> {
            lock(&self.inner).finish()
        }

        pub fn delete_recorded_path(&self) -> Result<Option<RecorderEvent>, Rejection> {
            lock(&self.inner).delete_recorded_path()
        }

        pub fn dispose(&self) {
            lock(&self.inner).dispose();
        }

        pub fn path(&self) -> Vec<GeoPoint> {
            lock(&self.inner).path().to_vec()
        }

        pub fn distance(&self) -> Meters {
            lock(&self.inner).distance()
        }

        pub fn recorded(&self) -> Result<RecordedTrack, Rejection> {
            lock(&self.inner).recorded().cloned()
        }
    }

    /// Checkpoint course authoring session.
    #[derive(uniffi::Object)]
    pub struct CheckpointSession {
        inner: Mutex<CheckpointRecorder>,
    }

    #[uniffi::export]
    impl CheckpointSession {
        #[uniffi::constructor]
        pub fn new(config: CheckpointConfig) -> Arc<Self> {
            init_logging();
            Arc::new(Self { inner: Mutex::new(CheckpointRecorder::new(config)) })
        }

        pub fn add_checkpoint(&self, point: GeoPoint) -> Result<CheckpointEdit, Rejection> {
            lock(&self.inner).add_checkpoint(point)
        }

        pub fn request_remove_last(&self) -> Result<PendingRemoval, Rejection> {
            lock(&self.inner).request_remove_last()
        }

        pub fn confirm_removal(&self) -> Result<CheckpointEdit, Rejection> {
            lock(&self.inner).confirm_removal()
        }

        pub fn cancel_removal(&self) {
            lock(&self.inner).cancel_removal();
        }

        pub fn clear_all(&self) {
            lock(&self.inner).clear_all();
        }

        pub fn checkpoints(&self) -> Vec<GeoPoint> {
            lock(&self.inner).checkpoints().to_vec()
        }

        pub fn total_distance(&self) -> Meters {
            lock(&self.inner).total_distance()
        }

        pub fn is_complete(&self) -> bool {
            lock(&self.inner).is_complete()
        }

        pub fn role(&self, index: u32) -> Option<CheckpointRole> {
            lock(&self.inner).role(index as usize)
        }
    }

    /// Spot or timed zone authoring session.
    #[derive(uniffi::Object)]
    pub struct SpotSession {
        inner: Mutex<SpotDefiner>,
    }

    #[uniffi::export]
    impl SpotSession {
        #[uniffi::constructor]
        pub fn new(kind: SpotKind, config: SpotConfig) -> Arc<Self> {
            init_logging();
            Arc::new(Self { inner: Mutex::new(SpotDefiner::new(kind, &config)) })
        }

        pub fn place_marker(&self, point: GeoPoint) -> Result<(), Rejection> {
            lock(&self.inner).place_marker(point)
        }

        pub fn drop_radius(&self, current: Option<GeoPoint>) -> Result<(), Rejection> {
            lock(&self.inner).drop_radius(current)
        }

        pub fn move_center(&self, point: GeoPoint) -> Result<(), Rejection> {
            lock(&self.inner).move_center(point)
        }

        pub fn adjust_radius(&self, delta: f64) -> Result<Meters, Rejection> {
            lock(&self.inner).adjust_radius(delta)
        }

        pub fn lock_spot(&self) -> Result<(), Rejection> {
            lock(&self.inner).lock()
        }

        pub fn set_dwell_duration(&self, minutes: u32) -> Result<u32, Rejection> {
            lock(&self.inner).set_dwell_duration(minutes)
        }

        pub fn undo(&self) -> Result<(), Rejection> {
            lock(&self.inner).undo()
        }

        pub fn phase(&self) -> SpotPhase {
            *lock(&self.inner).phase()
        }

        pub fn radius(&self) -> Meters {
            lock(&self.inner).radius()
        }

        pub fn definition(&self) -> Result<SpotDefinition, Rejection> {
            lock(&self.inner).definition()
        }
    }
}
