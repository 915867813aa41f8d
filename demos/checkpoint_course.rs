//! Author a checkpoint course, publish it, then walk it with the tracker.
//!
//! Run with: cargo run --example checkpoint_course

use std::sync::{Arc, Mutex};

use geo_progress::store::{format_duration, share_message, MemoryStore};
use geo_progress::{
    ActivityDefinition, ActivityGeometry, ActivityKey, ActivityMetadata, ActivityStore, ActivityTracker,
    CheckpointConfig, CheckpointRecorder, CompletionRecord, Difficulty, GeoPoint, PositionFix, PositionSource,
    Rejection, SessionFeed, TrackerConfig, TrackerEvent,
};
use geo_progress::source::ReplaySource;

fn main() {
    println!("Checkpoint Course Example\n");

    // 1. Authoring: place checkpoints along the equator, 0.001° apart (~111m)
    let mut recorder = CheckpointRecorder::new(CheckpointConfig::default());
    for lng in [0.0, 0.001, 0.002] {
        let edit = recorder.add_checkpoint(GeoPoint::new(0.0, lng)).unwrap();
        println!("Added checkpoint {} (course length {})", edit.count, edit.total_distance);
    }

    // A stray tap right next to the last checkpoint is refused
    match recorder.add_checkpoint(GeoPoint::new(0.0, 0.00201)) {
        Err(Rejection::TooClose { shortfall, .. }) => println!("Rejected stray tap: move {} further", shortfall),
        other => println!("Unexpected: {:?}", other),
    }

    for (i, _) in recorder.checkpoints().iter().enumerate() {
        if let Some(role) = recorder.role(i) {
            println!("  #{} {}", i, role.title());
        }
    }

    // 2. Publish
    let definition = ActivityDefinition::new(
        ActivityMetadata {
            title: "Equator dash".to_string(),
            category: "Land".to_string(),
            activity_type: "running".to_string(),
            difficulty: Difficulty::new(2),
            ..Default::default()
        },
        ActivityGeometry::Checkpoints {
            checkpoints: recorder.course().unwrap().to_vec(),
        },
    );
    let store = MemoryStore::new();
    let key = ActivityKey::new("Land", "running", "equator-dash");
    store.save_activity(&key, &definition).unwrap();
    println!("\nPublished at {}", key.document_path());

    // 3. Track: replay a walk in 0.0001° steps, one fix every 10 seconds
    let loaded = store.load_activity(&key).unwrap();
    let tracker = ActivityTracker::start(loaded, TrackerConfig::default(), 0).unwrap();

    let completed = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&completed);

    let source = ReplaySource::new();
    let feed = SessionFeed::new(tracker, move |event| match event {
        TrackerEvent::CheckpointReached { index, remaining } => {
            println!("Reached checkpoint {} ({} to go)", index, remaining)
        }
        TrackerEvent::Completed { summary } => {
            println!("Completed in {} over {}", format_duration(summary.elapsed_secs), summary.traveled);
            *slot.lock().unwrap() = Some(summary);
        }
        _ => {}
    });
    let id = source.subscribe(feed.clone()).unwrap();

    source.replay((0..=20).map(|i| PositionFix::new(GeoPoint::new(0.0, i as f64 * 0.0001), i * 10_000)));
    source.unsubscribe(id);

    // 4. Record the completion for the user
    let summary = completed.lock().unwrap().expect("course completed");
    println!("Tracker current index: {}", feed.with_session(|t| t.current_index()));
    let record = CompletionRecord::from_summary(&key.item_id, &definition, &summary, 1_700_000_000_000);
    store.append_completion("demo-user", record.clone()).unwrap();

    println!("\n{}", share_message("Explorien", &record));
}
