//! Freehand path capture for authoring trail activities.
//!
//! A recording moves through `Idle -> Recording <-> Paused -> Stopped`. Every
//! transition is computed by [`PathRecording::reduce`], a pure function of the
//! current state, the input and the [`RecorderConfig`]. [`PathRecorder`] owns one
//! recording and forwards inputs through that reducer, so the accumulated path can
//! never be mutated re-entrantly from a position callback.
//!
//! Gates:
//! - a fix is appended only once it is at least `step_threshold` from the last
//!   accepted point
//! - resume is allowed only within `resume_tolerance` of the last accepted point
//! - finish is allowed only once `min_finish_distance` from the first point

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::distance_meters;
use crate::{GeoPoint, Meters, Outcome, Precondition, Rejection};

/// Gate thresholds for path recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Minimum movement from the last accepted point before a fix is recorded.
    /// Default: 1 meter
    pub step_threshold: Meters,

    /// Maximum distance from the last accepted point at which resume is allowed.
    /// Default: 3 meters
    pub resume_tolerance: Meters,

    /// Minimum distance from the first point before the recording can be finished.
    /// Default: 10 meters
    pub min_finish_distance: Meters,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            step_threshold: Meters(1.0),
            resume_tolerance: Meters(3.0),
            min_finish_distance: Meters(10.0),
        }
    }
}

/// Points accepted so far and their cumulative length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RecordedTrack {
    pub points: Vec<GeoPoint>,
    pub distance: Meters,
}

impl RecordedTrack {
    fn starting_at(origin: GeoPoint) -> Self {
        Self {
            points: vec![origin],
            distance: Meters::ZERO,
        }
    }

    /// Last accepted point, used for step gating and resume hysteresis.
    pub fn last_accepted(&self) -> Option<&GeoPoint> {
        self.points.last()
    }

    pub fn first(&self) -> Option<&GeoPoint> {
        self.points.first()
    }
}

/// Lifecycle phase of a path recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RecorderPhase {
    #[default]
    Idle,
    Recording(RecordedTrack),
    Paused(RecordedTrack),
    Stopped(RecordedTrack),
    Disposed,
}

impl RecorderPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RecorderPhase::Idle => "idle",
            RecorderPhase::Recording(_) => "recording",
            RecorderPhase::Paused(_) => "paused",
            RecorderPhase::Stopped(_) => "stopped",
            RecorderPhase::Disposed => "disposed",
        }
    }

    pub fn track(&self) -> Option<&RecordedTrack> {
        match self {
            RecorderPhase::Recording(t) | RecorderPhase::Paused(t) | RecorderPhase::Stopped(t) => Some(t),
            RecorderPhase::Idle | RecorderPhase::Disposed => None,
        }
    }
}

/// Inputs accepted by the recorder reducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecorderInput {
    /// A position from the live stream.
    Fix(GeoPoint),
    Start,
    Pause,
    Resume,
    Finish,
    /// Discard everything recorded and return to idle.
    Delete,
}

/// Notable effects of a recorder transition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RecorderEvent {
    Started { origin: GeoPoint },
    PointAccepted { point: GeoPoint, total: Meters },
    Paused,
    Resumed,
    Finished { point_count: u32, distance: Meters },
    Deleted,
}

/// Complete recorder state: the phase plus the latest known position.
///
/// The latest position is tracked even while paused or idle so that start,
/// resume and finish can be evaluated against where the user actually is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathRecording {
    pub phase: RecorderPhase,
    pub last_fix: Option<GeoPoint>,
}

impl PathRecording {
    /// Compute the next state for `input`.
    ///
    /// On rejection the returned state equals `self`.
    pub fn reduce(self, input: RecorderInput, config: &RecorderConfig) -> (Self, Outcome<RecorderEvent>) {
        let PathRecording { phase, last_fix } = self;

        match (phase, input) {
            (RecorderPhase::Disposed, input) => (
                PathRecording { phase: RecorderPhase::Disposed, last_fix },
                Err(Rejection::invalid(input_name(&input), "disposed")),
            ),

            (phase, RecorderInput::Fix(fix)) if !fix.is_valid() => {
                debug!("[PathRecorder] Ignored invalid fix {:?}", fix);
                (PathRecording { phase, last_fix }, Err(Precondition::InvalidPosition.into()))
            }

            (RecorderPhase::Recording(mut track), RecorderInput::Fix(fix)) => {
                let event = accept_step(&mut track, fix, config.step_threshold);
                (
                    PathRecording { phase: RecorderPhase::Recording(track), last_fix: Some(fix) },
                    Ok(event),
                )
            }

            // Paused, idle and stopped recordings only remember where the user is.
            (phase, RecorderInput::Fix(fix)) => (PathRecording { phase, last_fix: Some(fix) }, Ok(None)),

            (RecorderPhase::Idle, RecorderInput::Start) => match last_fix {
                Some(origin) => {
                    info!("[PathRecorder] Recording started at {:?}", origin);
                    (
                        PathRecording {
                            phase: RecorderPhase::Recording(RecordedTrack::starting_at(origin)),
                            last_fix,
                        },
                        Ok(Some(RecorderEvent::Started { origin })),
                    )
                }
                None => (
                    PathRecording { phase: RecorderPhase::Idle, last_fix },
                    Err(Precondition::NoPosition.into()),
                ),
            },

            (RecorderPhase::Recording(track), RecorderInput::Pause) => {
                debug!("[PathRecorder] Paused with {} points", track.points.len());
                (
                    PathRecording { phase: RecorderPhase::Paused(track), last_fix },
                    Ok(Some(RecorderEvent::Paused)),
                )
            }

            (RecorderPhase::Paused(track), RecorderInput::Resume) => {
                let gate = match (last_fix, track.last_accepted()) {
                    (None, _) => Err(Precondition::NoPosition.into()),
                    (Some(here), Some(last)) => {
                        let away = distance_meters(&here, last);
                        if away.within(config.resume_tolerance) {
                            Ok(())
                        } else {
                            Err(Rejection::too_far(away, config.resume_tolerance))
                        }
                    }
                    (Some(_), None) => Ok(()),
                };

                match gate {
                    Ok(()) => {
                        debug!("[PathRecorder] Resumed");
                        (
                            PathRecording { phase: RecorderPhase::Recording(track), last_fix },
                            Ok(Some(RecorderEvent::Resumed)),
                        )
                    }
                    Err(rejection) => (PathRecording { phase: RecorderPhase::Paused(track), last_fix }, Err(rejection)),
                }
            }

            (phase @ (RecorderPhase::Recording(_) | RecorderPhase::Paused(_)), RecorderInput::Finish) => {
                let gate = match (last_fix, phase.track().and_then(|t| t.first())) {
                    (None, _) => Err(Precondition::NoPosition.into()),
                    (Some(here), Some(start)) => {
                        let from_start = distance_meters(start, &here);
                        if from_start.reaches(config.min_finish_distance) {
                            Ok(())
                        } else {
                            Err(Rejection::too_close(from_start, config.min_finish_distance))
                        }
                    }
                    (Some(_), None) => Ok(()),
                };

                match (gate, phase) {
                    (Ok(()), RecorderPhase::Recording(track) | RecorderPhase::Paused(track)) => {
                        info!(
                            "[PathRecorder] Recording finished: {} points, {}",
                            track.points.len(),
                            track.distance
                        );
                        let event = RecorderEvent::Finished {
                            point_count: track.points.len() as u32,
                            distance: track.distance,
                        };
                        (PathRecording { phase: RecorderPhase::Stopped(track), last_fix }, Ok(Some(event)))
                    }
                    (Ok(()), phase) => (PathRecording { phase, last_fix }, Ok(None)),
                    (Err(rejection), phase) => (PathRecording { phase, last_fix }, Err(rejection)),
                }
            }

            (
                RecorderPhase::Recording(_) | RecorderPhase::Paused(_) | RecorderPhase::Stopped(_),
                RecorderInput::Delete,
            ) => {
                info!("[PathRecorder] Recorded path deleted");
                (
                    PathRecording { phase: RecorderPhase::Idle, last_fix },
                    Ok(Some(RecorderEvent::Deleted)),
                )
            }

            (phase, input) => {
                let rejection = Rejection::invalid(input_name(&input), phase.name());
                (PathRecording { phase, last_fix }, Err(rejection))
            }
        }
    }
}

fn accept_step(track: &mut RecordedTrack, fix: GeoPoint, step_threshold: Meters) -> Option<RecorderEvent> {
    let Some(last) = track.last_accepted() else {
        track.points.push(fix);
        return Some(RecorderEvent::PointAccepted { point: fix, total: track.distance });
    };

    let step = distance_meters(last, &fix);
    if !step.reaches(step_threshold) {
        return None;
    }

    track.points.push(fix);
    track.distance += step;
    Some(RecorderEvent::PointAccepted { point: fix, total: track.distance })
}

fn input_name(input: &RecorderInput) -> &'static str {
    match input {
        RecorderInput::Fix(_) => "record a fix",
        RecorderInput::Start => "start",
        RecorderInput::Pause => "pause",
        RecorderInput::Resume => "resume",
        RecorderInput::Finish => "finish",
        RecorderInput::Delete => "delete",
    }
}

/// An authoring session that records one path.
#[derive(Debug, Clone, Default)]
pub struct PathRecorder {
    config: RecorderConfig,
    recording: PathRecording,
}

impl PathRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            recording: PathRecording::default(),
        }
    }

    /// Feed one input through the reducer and keep the resulting state.
    pub fn handle(&mut self, input: RecorderInput) -> Outcome<RecorderEvent> {
        let current = std::mem::take(&mut self.recording);
        let (next, outcome) = current.reduce(input, &self.config);
        self.recording = next;
        outcome
    }

    pub fn on_fix(&mut self, fix: GeoPoint) -> Option<RecorderEvent> {
        self.handle(RecorderInput::Fix(fix)).ok().flatten()
    }

    pub fn start(&mut self) -> Outcome<RecorderEvent> {
        self.handle(RecorderInput::Start)
    }

    pub fn pause(&mut self) -> Outcome<RecorderEvent> {
        self.handle(RecorderInput::Pause)
    }

    pub fn resume(&mut self) -> Outcome<RecorderEvent> {
        self.handle(RecorderInput::Resume)
    }

    pub fn finish(&mut self) -> Outcome<RecorderEvent> {
        self.handle(RecorderInput::Finish)
    }

    pub fn delete_recorded_path(&mut self) -> Outcome<RecorderEvent> {
        self.handle(RecorderInput::Delete)
    }

    /// Detach the session. Every later input is rejected.
    pub fn dispose(&mut self) {
        self.recording.phase = RecorderPhase::Disposed;
    }

    pub fn phase(&self) -> &RecorderPhase {
        &self.recording.phase
    }

    pub fn path(&self) -> &[GeoPoint] {
        self.recording.phase.track().map_or(&[], |t| t.points.as_slice())
    }

    pub fn distance(&self) -> Meters {
        self.recording.phase.track().map_or(Meters::ZERO, |t| t.distance)
    }

    pub fn last_fix(&self) -> Option<GeoPoint> {
        self.recording.last_fix
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.recording.phase, RecorderPhase::Recording(_))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.recording.phase, RecorderPhase::Paused(_))
    }

    /// The finished track, available once the recording is stopped.
    pub fn recorded(&self) -> Result<&RecordedTrack, Rejection> {
        match &self.recording.phase {
            RecorderPhase::Stopped(track) => Ok(track),
            _ => Err(Precondition::NotStopped.into()),
        }
    }
}

impl crate::source::FixHandler for PathRecorder {
    type Event = RecorderEvent;

    fn handle_fix(&mut self, fix: &crate::PositionFix) -> Vec<RecorderEvent> {
        self.on_fix(fix.point).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::destination_point;

    fn origin() -> GeoPoint {
        GeoPoint::new(46.5197, 6.6323)
    }

    fn north(meters: f64) -> GeoPoint {
        destination_point(&origin(), 0.0, Meters(meters))
    }

    fn recording_at_origin() -> PathRecorder {
        let mut recorder = PathRecorder::new(RecorderConfig::default());
        recorder.on_fix(origin());
        recorder.start().unwrap();
        recorder
    }

    #[test]
    fn test_start_requires_position() {
        let mut recorder = PathRecorder::new(RecorderConfig::default());
        assert_eq!(
            recorder.start(),
            Err(Rejection::PreconditionNotMet { missing: Precondition::NoPosition })
        );
        assert_eq!(recorder.phase(), &RecorderPhase::Idle);
    }

    #[test]
    fn test_start_seeds_path_with_current_position() {
        let recorder = recording_at_origin();
        assert!(recorder.is_recording());
        assert_eq!(recorder.path(), &[origin()]);
        assert_eq!(recorder.distance(), Meters::ZERO);
    }

    #[test]
    fn test_sub_step_fixes_are_not_recorded() {
        let mut recorder = recording_at_origin();
        for m in [0.3, 0.6, 0.9] {
            assert_eq!(recorder.on_fix(north(m)), None);
        }
        assert_eq!(recorder.path().len(), 1);

        let event = recorder.on_fix(north(1.2));
        assert!(matches!(event, Some(RecorderEvent::PointAccepted { .. })));
        assert_eq!(recorder.path().len(), 2);
        assert!((recorder.distance().value() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_no_duplicate_points() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(5.0));
        recorder.on_fix(north(5.0));
        recorder.on_fix(north(5.0));
        assert_eq!(recorder.path().len(), 2);
    }

    #[test]
    fn test_paused_fixes_are_ignored() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(5.0));
        recorder.pause().unwrap();

        recorder.on_fix(north(20.0));
        recorder.on_fix(north(40.0));
        assert_eq!(recorder.path().len(), 2);
        assert!((recorder.distance().value() - 5.0).abs() < 1e-6);
        assert_eq!(recorder.last_fix(), Some(north(40.0)));
    }

    #[test]
    fn test_resume_within_tolerance() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(10.0));
        recorder.pause().unwrap();
        recorder.on_fix(north(12.9));

        assert_eq!(recorder.resume(), Ok(Some(RecorderEvent::Resumed)));
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_resume_at_exact_tolerance() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(10.0));
        recorder.pause().unwrap();
        recorder.on_fix(north(13.0));

        assert_eq!(recorder.resume(), Ok(Some(RecorderEvent::Resumed)));
    }

    #[test]
    fn test_invalid_fix_is_not_remembered() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(10.0));
        recorder.pause().unwrap();

        assert_eq!(
            recorder.handle(RecorderInput::Fix(GeoPoint::new(f64::NAN, 0.0))),
            Err(Rejection::PreconditionNotMet { missing: Precondition::InvalidPosition })
        );
        assert!(recorder.handle(RecorderInput::Fix(GeoPoint::new(91.0, 0.0))).is_err());
        assert_eq!(recorder.last_fix(), Some(north(10.0)));
        assert_eq!(recorder.resume(), Ok(Some(RecorderEvent::Resumed)));
        assert_eq!(recorder.path().len(), 2);

        let mut idle = PathRecorder::new(RecorderConfig::default());
        idle.on_fix(GeoPoint::new(0.0, 200.0));
        assert_eq!(
            idle.start(),
            Err(Rejection::PreconditionNotMet { missing: Precondition::NoPosition })
        );
    }

    #[test]
    fn test_resume_too_far_reports_excess() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(10.0));
        recorder.pause().unwrap();
        recorder.on_fix(north(13.01));

        match recorder.resume() {
            Err(Rejection::TooFar { distance, allowed, excess }) => {
                assert!((distance.value() - 3.01).abs() < 1e-6);
                assert_eq!(allowed, Meters(3.0));
                assert!((excess.value() - 0.01).abs() < 1e-6);
            }
            other => panic!("expected TooFar, got {:?}", other),
        }
        assert!(recorder.is_paused());
    }

    #[test]
    fn test_resume_without_pause_is_invalid() {
        let mut recorder = recording_at_origin();
        assert!(matches!(recorder.resume(), Err(Rejection::InvalidTransition { .. })));
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_finish_requires_distance_from_start() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(9.0));

        match recorder.finish() {
            Err(Rejection::TooClose { shortfall, .. }) => {
                assert!((shortfall.value() - 1.0).abs() < 1e-6);
            }
            other => panic!("expected TooClose, got {:?}", other),
        }
        assert!(recorder.is_recording());

        recorder.on_fix(north(10.0));
        let event = recorder.finish().unwrap();
        assert!(matches!(event, Some(RecorderEvent::Finished { point_count: 3, .. })));
        assert!(matches!(recorder.phase(), RecorderPhase::Stopped(_)));
        assert_eq!(recorder.recorded().unwrap().points.len(), 3);
    }

    #[test]
    fn test_finish_from_paused() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(15.0));
        recorder.pause().unwrap();
        assert!(recorder.finish().is_ok());
        assert!(recorder.recorded().is_ok());
    }

    #[test]
    fn test_delete_returns_to_idle() {
        let mut recorder = recording_at_origin();
        recorder.on_fix(north(15.0));
        recorder.finish().unwrap();

        assert_eq!(recorder.delete_recorded_path(), Ok(Some(RecorderEvent::Deleted)));
        assert_eq!(recorder.phase(), &RecorderPhase::Idle);
        assert!(recorder.path().is_empty());
        assert_eq!(recorder.distance(), Meters::ZERO);

        // A fresh recording can start from wherever the user now is.
        assert!(recorder.start().is_ok());
        assert_eq!(recorder.path(), &[north(15.0)]);
    }

    #[test]
    fn test_delete_when_idle_is_invalid() {
        let mut recorder = PathRecorder::new(RecorderConfig::default());
        assert!(matches!(
            recorder.delete_recorded_path(),
            Err(Rejection::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_disposed_rejects_everything() {
        let mut recorder = recording_at_origin();
        recorder.dispose();
        assert!(recorder.handle(RecorderInput::Fix(north(5.0))).is_err());
        assert!(recorder.pause().is_err());
        assert!(recorder.path().is_empty());
    }

    #[test]
    fn test_reducer_is_pure_on_rejection() {
        let state = PathRecording::default();
        let (next, outcome) = state.clone().reduce(RecorderInput::Pause, &RecorderConfig::default());
        assert!(outcome.is_err());
        assert_eq!(next, state);
    }
}
