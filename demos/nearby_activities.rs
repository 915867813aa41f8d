//! Rank a large catalog of activities by distance from the user.
//!
//! Run with: cargo run --example nearby_activities --features parallel

use std::time::Instant;

use geo_progress::geo_utils::destination_point;
use geo_progress::{
    rank_by_distance, rank_by_distance_parallel, ActivityDefinition, ActivityGeometry, ActivityListing,
    ActivityMetadata, GeoPoint, Meters, SpotKind,
};

fn main() {
    println!("Nearby Activities Example\n");

    let user = GeoPoint::new(45.8326, 6.8652); // Chamonix

    // Scatter activities on a spiral out to ~40km
    let listings: Vec<ActivityListing> = (0..5000)
        .map(|i| {
            let start = destination_point(&user, (i as f64 * 137.5) % 360.0, Meters(i as f64 * 8.0));
            let geometry = match i % 3 {
                0 => ActivityGeometry::Path {
                    route: vec![start, destination_point(&start, 0.0, Meters(500.0))],
                },
                1 => ActivityGeometry::Spot {
                    location: start,
                    spot_radius: Meters(50.0),
                    spot_mode: SpotKind::GeoHunt,
                    dwell_seconds: None,
                },
                _ => ActivityGeometry::Checkpoints {
                    checkpoints: vec![start, destination_point(&start, 90.0, Meters(300.0))],
                },
            };
            ActivityListing {
                id: format!("activity-{}", i),
                definition: ActivityDefinition::new(
                    ActivityMetadata {
                        title: format!("Activity {}", i),
                        ..Default::default()
                    },
                    geometry,
                ),
            }
        })
        .collect();

    let radius = Some(Meters(2000.0));

    let start = Instant::now();
    let sequential = rank_by_distance(&user, &listings, radius);
    println!("Sequential: {} within 2km in {:?}", sequential.len(), start.elapsed());

    let start = Instant::now();
    let parallel = rank_by_distance_parallel(&user, &listings, radius);
    println!("Parallel:   {} within 2km in {:?}", parallel.len(), start.elapsed());

    assert_eq!(sequential, parallel);

    println!("\nClosest five:");
    for nearby in parallel.iter().take(5) {
        println!("  {:<16} {:<12} {}", nearby.id, nearby.mode.as_str(), nearby.distance);
    }
}
