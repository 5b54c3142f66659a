//! Reverse geocoding: device coordinates to a place name.
//!
//! Two third-party providers are supported. Access keys are passed in by the
//! caller (the binary reads them from the environment); none live in source.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use civic_types::models::{Coordinates, Place};

pub const MAPBOX_BASE_URL: &str = "https://api.mapbox.com";
pub const LOCATIONIQ_BASE_URL: &str = "https://us1.locationiq.com";

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("coordinates out of range: {0}, {1}")]
    InvalidCoordinates(f64, f64),

    #[error("{provider}: network error: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: lookup failed ({status})")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider}: no place found")]
    NotFound { provider: &'static str },

    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no geocoding provider configured")]
    NoProviders,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeoError>;
}

fn check(at: Coordinates) -> Result<(), GeoError> {
    if at.is_valid() {
        Ok(())
    } else {
        Err(GeoError::InvalidCoordinates(at.latitude, at.longitude))
    }
}

async fn fetch<T: DeserializeOwned>(
    provider: &'static str,
    req: reqwest::RequestBuilder,
) -> Result<Option<T>, GeoError> {
    let resp = req
        .send()
        .await
        .map_err(|source| GeoError::Transport { provider, source })?;

    let status = resp.status();
    // LocationIQ answers 404 for "nothing here", which is not a failure of the lookup itself.
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(GeoError::Status {
            provider,
            status: status.as_u16(),
        });
    }

    let body = resp
        .json::<T>()
        .await
        .map_err(|source| GeoError::Transport { provider, source })?;
    Ok(Some(body))
}

// -- Mapbox --

pub struct MapboxGeocoder {
    http: Client,
    base_url: Url,
    access_token: String,
}

#[derive(Deserialize)]
struct MapboxResponse {
    #[serde(default)]
    features: Vec<MapboxFeature>,
}

#[derive(Deserialize)]
struct MapboxFeature {
    place_name: String,
}

impl MapboxGeocoder {
    pub fn new(http: Client, base_url: &str, access_token: impl Into<String>) -> Result<Self, GeoError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for MapboxGeocoder {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeoError> {
        check(at)?;

        // Mapbox takes "lon,lat", longitude first.
        let query = format!("{},{}.json", at.longitude, at.latitude);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeoError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places", query.as_str()]);
        debug!("mapbox reverse lookup {}", url.path());

        let req = self
            .http
            .get(url)
            .query(&[("access_token", self.access_token.as_str()), ("limit", "1")]);

        let resp: Option<MapboxResponse> = fetch(self.name(), req).await?;
        let name = resp
            .and_then(|r| r.features.into_iter().next())
            .map(|f| f.place_name)
            .ok_or(GeoError::NotFound { provider: self.name() })?;

        Ok(Place {
            name,
            coordinates: at,
            provider: self.name().to_string(),
        })
    }
}

// -- LocationIQ --

pub struct LocationIqGeocoder {
    http: Client,
    base_url: Url,
    key: String,
}

#[derive(Deserialize)]
struct LocationIqResponse {
    #[serde(default)]
    display_name: Option<String>,
}

impl LocationIqGeocoder {
    pub fn new(http: Client, base_url: &str, key: impl Into<String>) -> Result<Self, GeoError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            key: key.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for LocationIqGeocoder {
    fn name(&self) -> &'static str {
        "locationiq"
    }

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeoError> {
        check(at)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeoError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["v1", "reverse"]);
        debug!("locationiq reverse lookup {}", url.path());

        let lat = at.latitude.to_string();
        let lon = at.longitude.to_string();
        let req = self.http.get(url).query(&[
            ("key", self.key.as_str()),
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("format", "json"),
        ]);

        let resp: Option<LocationIqResponse> = fetch(self.name(), req).await?;
        let name = resp
            .and_then(|r| r.display_name)
            .filter(|n| !n.is_empty())
            .ok_or(GeoError::NotFound { provider: self.name() })?;

        Ok(Place {
            name,
            coordinates: at,
            provider: self.name().to_string(),
        })
    }
}

// -- Fallback chain --

/// Tries each provider in order and returns the first place found.
pub struct FallbackGeocoder {
    providers: Vec<Arc<dyn ReverseGeocoder>>,
}

impl FallbackGeocoder {
    pub fn new(providers: Vec<Arc<dyn ReverseGeocoder>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl ReverseGeocoder for FallbackGeocoder {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeoError> {
        check(at)?;

        let mut last_err = GeoError::NoProviders;
        for provider in &self.providers {
            match provider.reverse(at).await {
                Ok(place) => return Ok(place),
                Err(e) => {
                    warn!("Reverse geocoding via {} failed: {}", provider.name(), e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
