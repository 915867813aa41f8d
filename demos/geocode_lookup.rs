//! Reverse geocode a few activity start points.
//!
//! Run with: GOOGLE_API_KEY=... cargo run --example geocode_lookup --features http
//!
//! Without a key (or without network) every lookup falls back to coordinates.

use geo_progress::{GeoPoint, ReverseGeocoder};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Reverse Geocoding Example\n");

    let api_key = std::env::var("GOOGLE_API_KEY").unwrap_or_default();
    let geocoder = ReverseGeocoder::new(&api_key)
        .expect("Failed to create geocoder")
        .with_max_retries(1);

    let points = [
        ("Venice", GeoPoint::new(45.4408, 12.3155)),
        ("Mont Blanc", GeoPoint::new(45.8326, 6.8652)),
        ("Mid-Atlantic", GeoPoint::new(30.0, -40.0)),
    ];

    for (label, point) in points {
        let name = geocoder.reverse_geocode(&point).await;
        println!("{:<14} -> {}", label, name);
    }
}
