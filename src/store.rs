//! Persistence boundary.
//!
//! Activities and user records live in a hosted document database owned by the
//! host application. The engine only produces and consumes the plain data that
//! crosses that boundary; [`ActivityStore`] is the seam a host implements.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityDefinition, ActivityKey, ActivityMode};
use crate::tracker::TrackingSummary;
use crate::Rejection;

/// Entry appended to a user's completed activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub activity_id: String,
    pub title: String,
    pub category: String,
    /// Milliseconds since the Unix epoch.
    pub completed_at: i64,
    /// Active seconds.
    pub duration: u64,
    /// Kilometers, rounded to two decimals.
    pub distance: f64,
    pub mode: ActivityMode,
}

impl CompletionRecord {
    pub fn from_summary(
        activity_id: &str,
        definition: &ActivityDefinition,
        summary: &TrackingSummary,
        completed_at: i64,
    ) -> Self {
        Self {
            activity_id: activity_id.to_string(),
            title: definition.metadata.title.clone(),
            category: definition.metadata.category.clone(),
            completed_at,
            duration: summary.elapsed_secs,
            distance: (summary.traveled.kilometers() * 100.0).round() / 100.0,
            mode: summary.mode,
        }
    }
}

/// Format seconds as `H:MM:SS`.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Text shared after finishing an activity.
pub fn share_message(app_name: &str, record: &CompletionRecord) -> String {
    let hours = record.duration / 3600;
    let minutes = (record.duration % 3600) / 60;
    let time = if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, record.duration % 60)
    };
    format!(
        "I just completed \"{}\" on {}!\nDistance: {:.2} km\nTime: {}\nDownload {} to join the adventure!",
        record.title, app_name, record.distance, time, app_name
    )
}

/// Document reads and writes the engine's callers rely on.
///
/// Every failure is an [`Rejection::ExternalFailure`] and may be retried.
pub trait ActivityStore {
    fn load_activity(&self, key: &ActivityKey) -> Result<ActivityDefinition, Rejection>;

    fn save_activity(&self, key: &ActivityKey, definition: &ActivityDefinition) -> Result<(), Rejection>;

    fn append_completion(&self, user_id: &str, record: CompletionRecord) -> Result<(), Rejection>;
}

/// In-memory store keyed by document path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: Mutex<HashMap<String, ActivityDefinition>>,
    completions: Mutex<HashMap<String, Vec<CompletionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self, user_id: &str) -> Vec<CompletionRecord> {
        self.completions
            .lock()
            .map(|c| c.get(user_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Every stored activity with its key path, for discovery.
    pub fn activities(&self) -> Vec<(String, ActivityDefinition)> {
        self.activities
            .lock()
            .map(|a| a.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> Rejection {
    Rejection::ExternalFailure("store lock poisoned".to_string())
}

impl ActivityStore for MemoryStore {
    fn load_activity(&self, key: &ActivityKey) -> Result<ActivityDefinition, Rejection> {
        let path = key.document_path();
        debug!("[Store] Loading {}", path);
        self.activities
            .lock()
            .map_err(poisoned)?
            .get(&path)
            .cloned()
            .ok_or_else(|| Rejection::ExternalFailure(format!("no document at {}", path)))
    }

    fn save_activity(&self, key: &ActivityKey, definition: &ActivityDefinition) -> Result<(), Rejection> {
        let path = key.document_path();
        info!("[Store] Saving {} activity at {}", definition.mode().as_str(), path);
        self.activities
            .lock()
            .map_err(poisoned)?
            .insert(path, definition.clone());
        Ok(())
    }

    fn append_completion(&self, user_id: &str, record: CompletionRecord) -> Result<(), Rejection> {
        info!("[Store] Recording completion of {} for {}", record.activity_id, user_id);
        self.completions
            .lock()
            .map_err(poisoned)?
            .entry(user_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityGeometry, ActivityMetadata};
    use crate::{GeoPoint, Meters};

    fn definition() -> ActivityDefinition {
        ActivityDefinition::new(
            ActivityMetadata {
                title: "Ridge walk".to_string(),
                category: "Land".to_string(),
                activity_type: "hiking".to_string(),
                ..Default::default()
            },
            ActivityGeometry::Path {
                route: vec![GeoPoint::new(45.0, 7.0), GeoPoint::new(45.01, 7.0)],
            },
        )
    }

    fn summary() -> TrackingSummary {
        TrackingSummary {
            mode: ActivityMode::Path,
            elapsed_secs: 3725,
            traveled: Meters(1234.567),
            checkpoints_reached: 0,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(3725), "1:02:05");
        assert_eq!(format_duration(59), "0:00:59");
    }

    #[test]
    fn test_completion_record_rounds_kilometers() {
        let record = CompletionRecord::from_summary("abc", &definition(), &summary(), 1_700_000_000_000);
        assert_eq!(record.distance, 1.23);
        assert_eq!(record.duration, 3725);
        assert_eq!(record.title, "Ridge walk");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["activityId"], "abc");
        assert_eq!(json["completedAt"], 1_700_000_000_000i64);
        assert_eq!(json["mode"], "path");
    }

    #[test]
    fn test_share_message() {
        let mut record = CompletionRecord::from_summary("abc", &definition(), &summary(), 0);
        let text = share_message("Explorien", &record);
        assert!(text.starts_with("I just completed \"Ridge walk\" on Explorien!"));
        assert!(text.contains("Distance: 1.23 km"));
        assert!(text.contains("Time: 1h 2m"));

        record.duration = 125;
        assert!(share_message("Explorien", &record).contains("Time: 2m 5s"));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let key = ActivityKey::new("Land", "hiking", "ridge");
        assert!(matches!(store.load_activity(&key), Err(Rejection::ExternalFailure(_))));

        store.save_activity(&key, &definition()).unwrap();
        assert_eq!(store.load_activity(&key).unwrap(), definition());

        let record = CompletionRecord::from_summary("ridge", &definition(), &summary(), 0);
        store.append_completion("user-1", record.clone()).unwrap();
        assert_eq!(store.completions("user-1"), vec![record]);
        assert!(store.completions("user-2").is_empty());
    }
}
