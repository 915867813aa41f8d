//! Ordered waypoint capture for checkpoint courses.
//!
//! Checkpoints are appended in order and must keep a minimum spacing from every
//! existing checkpoint. Removing the tail is a two-step request/confirm so a
//! stray tap cannot silently drop a waypoint.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{distance_meters, polyline_length};
use crate::{GeoPoint, Meters, Precondition, Rejection};

/// Spacing and completeness rules for checkpoint capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default, rename_all = "camelCase")]
pub struct CheckpointConfig {
    /// A new checkpoint must be at least this far from every existing one.
    /// Default: 5 meters
    pub min_spacing: Meters,

    /// Number of checkpoints needed before the course is complete.
    /// Default: 2
    pub min_checkpoints: u32,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            min_spacing: Meters(5.0),
            min_checkpoints: 2,
        }
    }
}

/// Role of a checkpoint within its course, used for marker labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum CheckpointRole {
    Start,
    /// Intermediate checkpoint, numbered from 1.
    Intermediate { number: u32 },
    Finish,
}

impl CheckpointRole {
    pub fn for_index(index: usize, total: usize) -> Self {
        if index == 0 {
            CheckpointRole::Start
        } else if index + 1 == total {
            CheckpointRole::Finish
        } else {
            CheckpointRole::Intermediate { number: index as u32 }
        }
    }

    pub fn title(&self) -> String {
        match self {
            CheckpointRole::Start => "Start".to_string(),
            CheckpointRole::Intermediate { number } => format!("Checkpoint {}", number),
            CheckpointRole::Finish => "Finish".to_string(),
        }
    }
}

/// A destructive edit waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PendingRemoval {
    /// Remove the checkpoint at `index` (always the tail).
    Last { index: u32 },
}

/// Result of a successful edit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CheckpointEdit {
    pub count: u32,
    pub total_distance: Meters,
}

/// An authoring session that captures an ordered checkpoint course.
#[derive(Debug, Clone, Default)]
pub struct CheckpointRecorder {
    config: CheckpointConfig,
    checkpoints: Vec<GeoPoint>,
    total_distance: Meters,
    pending: Option<PendingRemoval>,
}

impl CheckpointRecorder {
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Append `point` unless it is closer than `min_spacing` to any existing checkpoint.
    ///
    /// A pending removal is cancelled, since the tail it refers to changes.
    pub fn add_checkpoint(&mut self, point: GeoPoint) -> Result<CheckpointEdit, Rejection> {
        if !point.is_valid() {
            return Err(Precondition::InvalidPosition.into());
        }

        let nearest = self
            .checkpoints
            .iter()
            .map(|c| distance_meters(&point, c))
            .fold(None, |acc: Option<Meters>, d| Some(acc.map_or(d, |a| a.min(d))));

        if let Some(nearest) = nearest {
            if !nearest.reaches(self.config.min_spacing) {
                debug!("[Checkpoints] Rejected point {} from nearest checkpoint", nearest);
                return Err(Rejection::too_close(nearest, self.config.min_spacing));
            }
        }

        self.pending = None;
        self.checkpoints.push(point);
        Ok(self.recompute())
    }

    /// Ask to remove the last checkpoint. Nothing changes until [`confirm_removal`](Self::confirm_removal).
    pub fn request_remove_last(&mut self) -> Result<PendingRemoval, Rejection> {
        if self.checkpoints.is_empty() {
            return Err(Precondition::NoCheckpoints.into());
        }
        let pending = PendingRemoval::Last { index: (self.checkpoints.len() - 1) as u32 };
        self.pending = Some(pending);
        Ok(pending)
    }

    /// Commit the pending removal.
    pub fn confirm_removal(&mut self) -> Result<CheckpointEdit, Rejection> {
        match self.pending.take() {
            Some(PendingRemoval::Last { index }) => {
                if let Some(removed) = self.checkpoints.pop() {
                    debug!("[Checkpoints] Removed checkpoint {} at {:?}", index, removed);
                }
                Ok(self.recompute())
            }
            None => Err(Precondition::NothingToConfirm.into()),
        }
    }

    pub fn cancel_removal(&mut self) {
        self.pending = None;
    }

    pub fn clear_all(&mut self) {
        info!("[Checkpoints] Cleared {} checkpoints", self.checkpoints.len());
        self.checkpoints.clear();
        self.pending = None;
        self.total_distance = Meters::ZERO;
    }

    fn recompute(&mut self) -> CheckpointEdit {
        self.total_distance = polyline_length(&self.checkpoints);
        CheckpointEdit {
            count: self.checkpoints.len() as u32,
            total_distance: self.total_distance,
        }
    }

    pub fn checkpoints(&self) -> &[GeoPoint] {
        &self.checkpoints
    }

    pub fn total_distance(&self) -> Meters {
        self.total_distance
    }

    pub fn pending(&self) -> Option<PendingRemoval> {
        self.pending
    }

    pub fn is_complete(&self) -> bool {
        self.checkpoints.len() >= self.config.min_checkpoints as usize
    }

    pub fn role(&self, index: usize) -> Option<CheckpointRole> {
        (index < self.checkpoints.len()).then(|| CheckpointRole::for_index(index, self.checkpoints.len()))
    }

    /// The finished course, available once enough checkpoints are placed.
    pub fn course(&self) -> Result<&[GeoPoint], Rejection> {
        if self.is_complete() {
            Ok(&self.checkpoints)
        } else {
            Err(Precondition::TooFewCheckpoints.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::destination_point;

    fn origin() -> GeoPoint {
        GeoPoint::new(-33.8568, 151.2153)
    }

    fn east(meters: f64) -> GeoPoint {
        destination_point(&origin(), 90.0, Meters(meters))
    }

    #[test]
    fn test_spacing_boundary() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        recorder.add_checkpoint(origin()).unwrap();

        match recorder.add_checkpoint(east(4.9)) {
            Err(Rejection::TooClose { shortfall, .. }) => {
                assert!((shortfall.value() - 0.1).abs() < 1e-6);
            }
            other => panic!("expected TooClose, got {:?}", other),
        }
        assert_eq!(recorder.checkpoints().len(), 1);

        let edit = recorder.add_checkpoint(east(5.0)).unwrap();
        assert_eq!(edit.count, 2);
        assert!((edit.total_distance.value() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_spacing_checks_every_checkpoint() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        recorder.add_checkpoint(origin()).unwrap();
        recorder.add_checkpoint(east(50.0)).unwrap();

        // Far from the tail but near the first checkpoint.
        assert!(recorder.add_checkpoint(east(2.0)).is_err());
    }

    #[test]
    fn test_total_distance_tracks_edits() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        recorder.add_checkpoint(origin()).unwrap();
        recorder.add_checkpoint(east(100.0)).unwrap();
        recorder.add_checkpoint(east(250.0)).unwrap();
        assert!((recorder.total_distance().value() - 250.0).abs() < 1e-6);

        recorder.request_remove_last().unwrap();
        let edit = recorder.confirm_removal().unwrap();
        assert_eq!(edit.count, 2);
        assert!((edit.total_distance.value() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_remove_requires_confirmation() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        recorder.add_checkpoint(origin()).unwrap();
        recorder.add_checkpoint(east(20.0)).unwrap();

        assert_eq!(recorder.request_remove_last(), Ok(PendingRemoval::Last { index: 1 }));
        assert_eq!(recorder.checkpoints().len(), 2);

        recorder.cancel_removal();
        assert_eq!(
            recorder.confirm_removal(),
            Err(Rejection::PreconditionNotMet { missing: Precondition::NothingToConfirm })
        );
        assert_eq!(recorder.checkpoints().len(), 2);
    }

    #[test]
    fn test_add_cancels_pending_removal() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        recorder.add_checkpoint(origin()).unwrap();
        recorder.request_remove_last().unwrap();
        recorder.add_checkpoint(east(20.0)).unwrap();

        assert_eq!(recorder.pending(), None);
        assert!(recorder.confirm_removal().is_err());
    }

    #[test]
    fn test_remove_from_empty() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        assert_eq!(
            recorder.request_remove_last(),
            Err(Rejection::PreconditionNotMet { missing: Precondition::NoCheckpoints })
        );
    }

    #[test]
    fn test_completeness_and_clear() {
        let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
        recorder.add_checkpoint(origin()).unwrap();
        assert!(!recorder.is_complete());
        assert!(recorder.course().is_err());

        recorder.add_checkpoint(east(30.0)).unwrap();
        assert!(recorder.is_complete());
        assert_eq!(recorder.course().unwrap().len(), 2);

        recorder.clear_all();
        assert!(recorder.checkpoints().is_empty());
        assert_eq!(recorder.total_distance(), Meters::ZERO);
    }

    #[test]
    fn test_roles() {
        assert_eq!(CheckpointRole::for_index(0, 4), CheckpointRole::Start);
        assert_eq!(CheckpointRole::for_index(2, 4), CheckpointRole::Intermediate { number: 2 });
        assert_eq!(CheckpointRole::for_index(3, 4).title(), "Finish");
        assert_eq!(CheckpointRole::for_index(1, 4).title(), "Checkpoint 1");
    }
}
