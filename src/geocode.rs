//! Reverse geocoding for presentation.
//!
//! Turns coordinates into a short place name ("Venice, Italy") for activity
//! cards and start/finish labels. The tracking core never depends on it; every
//! failure falls back to the raw coordinates printed to six decimals.
//!
//! Response parsing is always available. The HTTP client against the Google
//! Geocoding API requires the `http` feature.

use serde::Deserialize;

use crate::GeoPoint;

/// Subset of a Google Geocoding API response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeocodeResponse {
    pub status: String,
    pub results: Vec<GeocodeResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressComponent {
    pub long_name: String,
    pub types: Vec<String>,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&str> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
            .map(|c| c.long_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// "City, Country" from the first result, else its formatted address.
pub fn place_name(response: &GeocodeResponse) -> Option<String> {
    if response.status != "OK" {
        return None;
    }
    let result = response.results.first()?;
    match (result.component("locality"), result.component("country")) {
        (Some(city), Some(country)) => Some(format!("{}, {}", city, country)),
        _ if !result.formatted_address.is_empty() => Some(result.formatted_address.clone()),
        _ => None,
    }
}

pub fn format_coordinates(point: &GeoPoint) -> String {
    format!("{:.6}, {:.6}", point.latitude, point.longitude)
}

/// Place name if the response has one, otherwise the coordinates.
pub fn display_name_or_coordinates(response: Option<&GeocodeResponse>, point: &GeoPoint) -> String {
    response
        .and_then(place_name)
        .unwrap_or_else(|| format_coordinates(point))
}

#[cfg(feature = "http")]
pub use client::{reverse_geocode_sync, ReverseGeocoder};

#[cfg(feature = "http")]
mod client {
    use std::time::Duration;

    use log::{debug, info, warn};
    use reqwest::Client;

    use super::{display_name_or_coordinates, GeocodeResponse};
    use crate::{GeoPoint, Rejection};

    const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
    const MAX_RETRIES: u32 = 3;

    /// Client for the Google Geocoding API with retry on transient failures.
    pub struct ReverseGeocoder {
        client: Client,
        api_key: String,
        base_url: String,
        max_retries: u32,
    }

    impl ReverseGeocoder {
        pub fn new(api_key: &str) -> Result<Self, Rejection> {
            let client = Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| Rejection::ExternalFailure(format!("Failed to create HTTP client: {}", e)))?;

            Ok(Self {
                client,
                api_key: api_key.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                max_retries: MAX_RETRIES,
            })
        }

        pub fn with_base_url(mut self, base_url: &str) -> Self {
            self.base_url = base_url.to_string();
            self
        }

        pub fn with_max_retries(mut self, max_retries: u32) -> Self {
            self.max_retries = max_retries;
            self
        }

        /// Fetch and parse the geocoding response for `point`.
        ///
        /// Request errors, 429 and 5xx responses are retried with exponential
        /// backoff; other HTTP errors fail immediately.
        pub async fn lookup(&self, point: &GeoPoint) -> Result<GeocodeResponse, Rejection> {
            let latlng = format!("{},{}", point.latitude, point.longitude);
            let mut retries = 0;

            loop {
                let response = self
                    .client
                    .get(&self.base_url)
                    .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
                    .send()
                    .await;

                let failure = match response {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            let body = resp
                                .bytes()
                                .await
                                .map_err(|e| Rejection::ExternalFailure(format!("Body download error: {}", e)))?;
                            let parsed: GeocodeResponse = serde_json::from_slice(&body)
                                .map_err(|e| Rejection::ExternalFailure(format!("JSON parse error: {}", e)))?;
                            debug!("[Geocode] {} -> status {}", latlng, parsed.status);
                            if let Some(message) = &parsed.error_message {
                                warn!("[Geocode] API error for {}: {}", latlng, message);
                            }
                            return Ok(parsed);
                        }
                        if status != reqwest::StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                            return Err(Rejection::ExternalFailure(format!("HTTP {}", status)));
                        }
                        format!("HTTP {}", status)
                    }
                    Err(e) => format!("Request error: {}", e),
                };

                retries += 1;
                if retries > self.max_retries {
                    return Err(Rejection::ExternalFailure(failure));
                }
                let wait = Duration::from_millis(200 * (1 << retries));
                warn!("[Geocode] {} for {}, retry {} after {:?}", failure, latlng, retries, wait);
                tokio::time::sleep(wait).await;
            }
        }

        /// Display name for `point`, never failing.
        pub async fn reverse_geocode(&self, point: &GeoPoint) -> String {
            match self.lookup(point).await {
                Ok(response) => display_name_or_coordinates(Some(&response), point),
                Err(e) => {
                    warn!("[Geocode] Falling back to coordinates: {}", e);
                    display_name_or_coordinates(None, point)
                }
            }
        }
    }

    /// Blocking variant for hosts without an async runtime.
    pub fn reverse_geocode_sync(api_key: &str, point: GeoPoint) -> String {
        use tokio::runtime::Builder;

        info!("[Geocode] reverse_geocode_sync for {:?}", point);
        let rt = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Failed to create tokio runtime: {}", e);
                return display_name_or_coordinates(None, &point);
            }
        };
        match ReverseGeocoder::new(api_key) {
            Ok(geocoder) => rt.block_on(geocoder.reverse_geocode(&point)),
            Err(e) => {
                warn!("Failed to create geocoder: {}", e);
                display_name_or_coordinates(None, &point)
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GeocodeResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_city_and_country() {
        let response = parse(
            r#"{
                "status": "OK",
                "results": [{
                    "formatted_address": "Piazza San Marco, 30124 Venezia VE, Italy",
                    "address_components": [
                        {"long_name": "Venice", "types": ["locality", "political"]},
                        {"long_name": "Italy", "types": ["country", "political"]}
                    ]
                }]
            }"#,
        );
        assert_eq!(place_name(&response).as_deref(), Some("Venice, Italy"));
    }

    #[test]
    fn test_formatted_address_without_locality() {
        let response = parse(
            r#"{
                "status": "OK",
                "results": [{
                    "formatted_address": "Mont Blanc, France",
                    "address_components": [
                        {"long_name": "France", "types": ["country"]}
                    ]
                }]
            }"#,
        );
        assert_eq!(place_name(&response).as_deref(), Some("Mont Blanc, France"));
    }

    #[test]
    fn test_failed_status_falls_back_to_coordinates() {
        let response = parse(r#"{"status": "REQUEST_DENIED", "results": [], "error_message": "bad key"}"#);
        let point = GeoPoint::new(-33.8568, 151.2153);
        assert_eq!(place_name(&response), None);
        assert_eq!(
            display_name_or_coordinates(Some(&response), &point),
            "-33.856800, 151.215300"
        );
        assert_eq!(display_name_or_coordinates(None, &point), "-33.856800, 151.215300");
    }
}
