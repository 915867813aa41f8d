//! # Activity Progress Tracker
//!
//! Evaluates a live position stream against a published activity and reports
//! progress and completion.
//!
//! ## Per-mode behaviour
//!
//! | Mode | Target | Completes when |
//! |------|--------|----------------|
//! | Path | final route point | a fix is closer than `path_finish_threshold` |
//! | Spot | zone center | a continuous dwell inside the radius lasts `dwell_seconds` (`default_dwell_seconds` when unset) |
//! | Checkpoints | `checkpoints[current_index]` | the last checkpoint is reached in order |
//!
//! ## Time
//!
//! The tracker owns no timers. Dwell progress is a function of the latest fix
//! and the timestamp of the latest input, so a zone can only complete while the
//! most recent fix was inside. Hosts that want the countdown to tick between
//! fixes feed [`TrackerInput::Tick`]. Paused time is excluded from the elapsed
//! time and any dwell in progress is dropped on pause.
//!
//! The state transition is a pure function ([`TrackingState::reduce`]); the
//! [`ActivityTracker`] wrapper owns the state for callers that prefer `&mut self`.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityDefinition, ActivityGeometry, ActivityMode};
use crate::error::DefinitionError;
use crate::geo_utils::{bearing_degrees, distance_meters};
use crate::source::{FixHandler, PositionFix};
use crate::{GeoPoint, Meters, Precondition, Rejection};

// ============================================================================
// Configuration
// ============================================================================

/// Arrival thresholds for tracking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// A path activity completes once a fix is closer than this to the final route point.
    /// Default: 30 meters
    pub path_finish_threshold: Meters,

    /// A checkpoint counts as reached once a fix is closer than this.
    /// Default: 20 meters
    pub checkpoint_arrival_threshold: Meters,

    /// Dwell applied to spots published without one.
    /// Default: 60 seconds
    pub default_dwell_seconds: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            path_finish_threshold: Meters(30.0),
            checkpoint_arrival_threshold: Meters(20.0),
            default_dwell_seconds: 60,
        }
    }
}

// ============================================================================
// Inputs, events and state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerInput {
    Fix(PositionFix),
    /// Clock advance with no new position.
    Tick { now_ms: i64 },
    Pause { at_ms: i64 },
    Resume { at_ms: i64 },
    Cancel { at_ms: i64 },
}

/// Totals reported on a terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct TrackingSummary {
    pub mode: ActivityMode,
    /// Active time, excluding pauses.
    pub elapsed_secs: u64,
    pub traveled: Meters,
    pub checkpoints_reached: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackerEvent {
    /// Direction to the current target, for an on-screen arrow.
    Guidance {
        target: GeoPoint,
        distance: Meters,
        bearing_degrees: f64,
        checkpoint_index: Option<u32>,
    },
    ZoneEntered { dwell_remaining_secs: u64 },
    DwellCountdown { remaining_secs: u64 },
    /// Left the zone before the dwell finished; the countdown starts over on re-entry.
    OutOfBounds { distance_outside: Meters },
    CheckpointReached { index: u32, remaining: u32 },
    Completed { summary: TrackingSummary },
    Cancelled { summary: TrackingSummary },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackerStatus {
    #[default]
    Active,
    Paused { since_ms: i64 },
    Completed,
    Cancelled,
}

impl TrackerStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerStatus::Active => "tracking",
            TrackerStatus::Paused { .. } => "paused",
            TrackerStatus::Completed => "completed",
            TrackerStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerStatus::Completed | TrackerStatus::Cancelled)
    }
}

/// Geometry resolved once from a validated definition.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackTarget {
    Finish(GeoPoint),
    Zone {
        center: GeoPoint,
        radius: Meters,
        dwell_ms: i64,
    },
    Course(Vec<GeoPoint>),
}

impl TrackTarget {
    pub fn from_definition(definition: &ActivityDefinition, config: &TrackerConfig) -> Result<Self, DefinitionError> {
        definition.validate()?;
        Ok(match &definition.geometry {
            ActivityGeometry::Path { route } => {
                TrackTarget::Finish(*route.last().ok_or(DefinitionError::EmptyRoute)?)
            }
            ActivityGeometry::Spot {
                location,
                spot_radius,
                dwell_seconds,
                ..
            } => TrackTarget::Zone {
                center: *location,
                radius: *spot_radius,
                dwell_ms: i64::from(dwell_seconds.unwrap_or(config.default_dwell_seconds)) * 1000,
            },
            ActivityGeometry::Checkpoints { checkpoints } => TrackTarget::Course(checkpoints.clone()),
        })
    }

    fn mode(&self) -> ActivityMode {
        match self {
            TrackTarget::Finish(_) => ActivityMode::Path,
            TrackTarget::Zone { .. } => ActivityMode::Spot,
            TrackTarget::Course(_) => ActivityMode::Checkpoints,
        }
    }
}

/// Runtime state of one tracking session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingState {
    pub status: TrackerStatus,
    /// Index of the checkpoint being approached. Never decreases.
    pub current_index: u32,
    /// When the current uninterrupted dwell began; `None` while outside the zone.
    pub dwell_started_ms: Option<i64>,
    pub last_fix: Option<GeoPoint>,
    pub last_event_ms: i64,
    pub started_ms: i64,
    pub paused_total_ms: i64,
    pub traveled: Meters,
    pub checkpoints_reached: u32,
}

type Step = Result<Vec<TrackerEvent>, Rejection>;

fn remaining_secs(remaining_ms: i64) -> u64 {
    (remaining_ms.max(0) as u64).div_ceil(1000)
}

impl TrackingState {
    pub fn new(started_ms: i64) -> Self {
        Self {
            started_ms,
            last_event_ms: started_ms,
            ..Default::default()
        }
    }

    /// Active seconds between the start and `now_ms`, excluding pauses.
    pub fn elapsed_secs(&self, now_ms: i64) -> u64 {
        let mut paused = self.paused_total_ms;
        if let TrackerStatus::Paused { since_ms } = self.status {
            paused += (now_ms - since_ms).max(0);
        }
        ((now_ms - self.started_ms - paused).max(0) / 1000) as u64
    }

    fn summary(&self, mode: ActivityMode, now_ms: i64) -> TrackingSummary {
        TrackingSummary {
            mode,
            elapsed_secs: self.elapsed_secs(now_ms),
            traveled: self.traveled,
            checkpoints_reached: self.checkpoints_reached,
        }
    }

    /// Compute the next state for `input`.
    ///
    /// On rejection the returned state equals `self`. Once completed or
    /// cancelled, every input is ignored.
    pub fn reduce(mut self, input: TrackerInput, target: &TrackTarget, config: &TrackerConfig) -> (Self, Step) {
        if self.status.is_terminal() {
            return (self, Ok(Vec::new()));
        }

        match input {
            TrackerInput::Fix(fix) => {
                if !matches!(self.status, TrackerStatus::Active) {
                    return (self, Ok(Vec::new()));
                }
                if fix.timestamp_ms < self.last_event_ms {
                    warn!(
                        "[Tracker] Dropping stale fix at {} (last event {})",
                        fix.timestamp_ms, self.last_event_ms
                    );
                    return (self, Ok(Vec::new()));
                }
                if !fix.point.is_valid() {
                    return (self, Err(Precondition::InvalidPosition.into()));
                }
                let events = self.apply_fix(&fix, target, config);
                (self, Ok(events))
            }
            TrackerInput::Tick { now_ms } => {
                if !matches!(self.status, TrackerStatus::Active) || now_ms < self.last_event_ms {
                    return (self, Ok(Vec::new()));
                }
                self.last_event_ms = now_ms;
                let events = match target {
                    TrackTarget::Zone { dwell_ms, .. } => self.check_dwell(*dwell_ms, now_ms, target.mode()),
                    _ => Vec::new(),
                };
                (self, Ok(events))
            }
            TrackerInput::Pause { at_ms } => match self.status {
                TrackerStatus::Active => {
                    info!("[Tracker] Paused");
                    self.status = TrackerStatus::Paused { since_ms: at_ms };
                    self.dwell_started_ms = None;
                    self.last_fix = None;
                    self.last_event_ms = self.last_event_ms.max(at_ms);
                    (self, Ok(Vec::new()))
                }
                status => (self, Err(Rejection::invalid("pause", status.name()))),
            },
            TrackerInput::Resume { at_ms } => match self.status {
                TrackerStatus::Paused { since_ms } => {
                    info!("[Tracker] Resumed");
                    self.paused_total_ms += (at_ms - since_ms).max(0);
                    self.status = TrackerStatus::Active;
                    self.last_event_ms = self.last_event_ms.max(at_ms);
                    (self, Ok(Vec::new()))
                }
                status => (self, Err(Rejection::invalid("resume", status.name()))),
            },
            TrackerInput::Cancel { at_ms } => {
                let summary = self.summary(target.mode(), at_ms);
                info!("[Tracker] Cancelled after {}s", summary.elapsed_secs);
                self.status = TrackerStatus::Cancelled;
                self.dwell_started_ms = None;
                (self, Ok(vec![TrackerEvent::Cancelled { summary }]))
            }
        }
    }

    fn apply_fix(&mut self, fix: &PositionFix, target: &TrackTarget, config: &TrackerConfig) -> Vec<TrackerEvent> {
        let point = fix.point;
        let now = fix.timestamp_ms;
        if let Some(previous) = self.last_fix {
            self.traveled += distance_meters(&previous, &point);
        }
        self.last_fix = Some(point);
        self.last_event_ms = now;

        let mode = target.mode();
        let mut events = Vec::new();
        match target {
            TrackTarget::Finish(finish) => {
                let distance = distance_meters(&point, finish);
                events.push(guidance(&point, finish, distance, None));
                if distance.value() < config.path_finish_threshold.value() {
                    events.push(self.complete(mode, now));
                }
            }
            TrackTarget::Zone { center, radius, dwell_ms } => {
                let distance = distance_meters(&point, center);
                events.push(guidance(&point, center, distance, None));
                if distance.value() < radius.value() {
                    if self.dwell_started_ms.is_none() {
                        debug!("[Tracker] Entered zone, dwell {}ms", dwell_ms);
                        self.dwell_started_ms = Some(now);
                        events.push(TrackerEvent::ZoneEntered {
                            dwell_remaining_secs: remaining_secs(*dwell_ms),
                        });
                    }
                    events.extend(self.check_dwell(*dwell_ms, now, mode));
                } else if self.dwell_started_ms.take().is_some() {
                    debug!("[Tracker] Left zone, dwell reset");
                    events.push(TrackerEvent::OutOfBounds {
                        distance_outside: distance - *radius,
                    });
                }
            }
            TrackTarget::Course(checkpoints) => {
                let index = self.current_index as usize;
                let Some(next) = checkpoints.get(index) else {
                    return events;
                };
                let distance = distance_meters(&point, next);
                if distance.value() < config.checkpoint_arrival_threshold.value() {
                    self.checkpoints_reached += 1;
                    if index + 1 == checkpoints.len() {
                        events.push(self.complete(mode, now));
                        return events;
                    }
                    self.current_index += 1;
                    let remaining = (checkpoints.len() - index - 1) as u32;
                    info!("[Tracker] Checkpoint {} reached, {} remaining", index, remaining);
                    events.push(TrackerEvent::CheckpointReached {
                        index: index as u32,
                        remaining,
                    });
                    let upcoming = &checkpoints[index + 1];
                    events.push(guidance(&point, upcoming, distance_meters(&point, upcoming), Some(self.current_index)));
                } else {
                    events.push(guidance(&point, next, distance, Some(self.current_index)));
                }
            }
        }
        events
    }

    /// Dwell progress against the clock, valid only while the latest fix was inside.
    fn check_dwell(&mut self, dwell_ms: i64, now_ms: i64, mode: ActivityMode) -> Vec<TrackerEvent> {
        let Some(entered) = self.dwell_started_ms else {
            return Vec::new();
        };
        let inside_for = now_ms - entered;
        if inside_for >= dwell_ms {
            vec![self.complete(mode, now_ms)]
        } else if inside_for > 0 {
            vec![TrackerEvent::DwellCountdown {
                remaining_secs: remaining_secs(dwell_ms - inside_for),
            }]
        } else {
            Vec::new()
        }
    }

    fn complete(&mut self, mode: ActivityMode, now_ms: i64) -> TrackerEvent {
        self.status = TrackerStatus::Completed;
        self.dwell_started_ms = None;
        let summary = self.summary(mode, now_ms);
        info!(
            "[Tracker] Completed {} activity in {}s, traveled {}",
            mode.as_str(),
            summary.elapsed_secs,
            summary.traveled
        );
        TrackerEvent::Completed { summary }
    }
}

fn guidance(from: &GeoPoint, target: &GeoPoint, distance: Meters, checkpoint_index: Option<u32>) -> TrackerEvent {
    TrackerEvent::Guidance {
        target: *target,
        distance,
        bearing_degrees: bearing_degrees(from, target),
        checkpoint_index,
    }
}

// ============================================================================
// Session wrapper
// ============================================================================

/// A tracking session over one published activity.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    definition: ActivityDefinition,
    target: TrackTarget,
    config: TrackerConfig,
    state: TrackingState,
}

impl ActivityTracker {
    /// Begin tracking. Fails if the definition lacks the geometry its mode requires.
    pub fn start(
        definition: ActivityDefinition,
        config: TrackerConfig,
        started_at_ms: i64,
    ) -> Result<Self, DefinitionError> {
        let target = TrackTarget::from_definition(&definition, &config)?;
        info!(
            "[Tracker] Started {} activity '{}'",
            definition.mode().as_str(),
            definition.metadata.title
        );
        Ok(Self {
            definition,
            target,
            config,
            state: TrackingState::new(started_at_ms),
        })
    }

    pub fn handle(&mut self, input: TrackerInput) -> Step {
        let current = std::mem::take(&mut self.state);
        let (next, step) = current.reduce(input, &self.target, &self.config);
        self.state = next;
        step
    }

    pub fn on_fix(&mut self, fix: PositionFix) -> Step {
        self.handle(TrackerInput::Fix(fix))
    }

    pub fn tick(&mut self, now_ms: i64) -> Step {
        self.handle(TrackerInput::Tick { now_ms })
    }

    pub fn pause(&mut self, at_ms: i64) -> Step {
        self.handle(TrackerInput::Pause { at_ms })
    }

    pub fn resume(&mut self, at_ms: i64) -> Step {
        self.handle(TrackerInput::Resume { at_ms })
    }

    pub fn cancel(&mut self, at_ms: i64) -> Step {
        self.handle(TrackerInput::Cancel { at_ms })
    }

    /// End the session without emitting anything. No completion can follow.
    pub fn dispose(&mut self) {
        if !self.state.status.is_terminal() {
            debug!("[Tracker] Disposed while {}", self.state.status.name());
            self.state.status = TrackerStatus::Cancelled;
            self.state.dwell_started_ms = None;
        }
    }

    pub fn definition(&self) -> &ActivityDefinition {
        &self.definition
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn status(&self) -> TrackerStatus {
        self.state.status
    }

    pub fn current_index(&self) -> u32 {
        self.state.current_index
    }

    pub fn traveled(&self) -> Meters {
        self.state.traveled
    }

    pub fn elapsed_secs(&self, now_ms: i64) -> u64 {
        self.state.elapsed_secs(now_ms)
    }

    /// Seconds left in the current dwell, if inside the zone.
    pub fn dwell_remaining_secs(&self, now_ms: i64) -> Option<u64> {
        match (&self.target, self.state.dwell_started_ms) {
            (TrackTarget::Zone { dwell_ms, .. }, Some(entered)) => {
                Some(remaining_secs(dwell_ms - (now_ms - entered)))
            }
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.status.is_terminal()
    }
}

impl FixHandler for ActivityTracker {
    type Event = TrackerEvent;

    fn handle_fix(&mut self, fix: &PositionFix) -> Vec<TrackerEvent> {
        self.on_fix(*fix).unwrap_or_else(|rejection| {
            debug!("[Tracker] Fix rejected: {}", rejection);
            Vec::new()
        })
    }
}
