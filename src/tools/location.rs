//! `get_location`: approximate device coordinates

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::Tool;
use crate::llm::FunctionDeclaration;
use crate::{Error, Result};

/// Default IP geolocation endpoint
pub const DEFAULT_GEO_URL: &str = "https://ipapi.co/json/";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Where coordinates come from
#[derive(Debug, Clone)]
pub enum GeoLocator {
    /// Configured coordinates
    Fixed { latitude: f64, longitude: f64 },
    /// IP-based lookup against a JSON endpoint exposing `latitude`/`longitude`
    IpLookup { client: reqwest::Client, url: String },
}

impl GeoLocator {
    /// IP lookup against `url`
    #[must_use]
    pub fn ip_lookup(url: impl Into<String>) -> Self {
        Self::IpLookup {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Resolve the current coordinates
    ///
    /// # Errors
    ///
    /// Returns error if the lookup fails or returns no coordinates
    pub async fn locate(&self) -> Result<(f64, f64)> {
        match self {
            Self::Fixed {
                latitude,
                longitude,
            } => Ok((*latitude, *longitude)),
            Self::IpLookup { client, url } => {
                #[derive(Deserialize)]
                struct GeoResponse {
                    latitude: Option<f64>,
                    longitude: Option<f64>,
                }

                let response = client.get(url).timeout(LOOKUP_TIMEOUT).send().await?;
                if !response.status().is_success() {
                    return Err(Error::Tool(format!(
                        "location lookup failed: {}",
                        response.status()
                    )));
                }

                let geo: GeoResponse = response.json().await?;
                match (geo.latitude, geo.longitude) {
                    (Some(lat), Some(lon)) => Ok((lat, lon)),
                    _ => Err(Error::Tool(
                        "location lookup returned no coordinates".to_string(),
                    )),
                }
            }
        }
    }
}

/// Reports the device's approximate position
#[derive(Debug, Clone)]
pub struct LocationTool {
    locator: GeoLocator,
}

impl LocationTool {
    #[must_use]
    pub const fn new(locator: GeoLocator) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl Tool for LocationTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "get_location".to_string(),
            description: "Gets the current geographical location of the device.".to_string(),
            parameters: None,
        }
    }

    async fn invoke(&self, _args: &Value) -> Result<Value> {
        let (latitude, longitude) = self.locator.locate().await?;
        Ok(serde_json::json!({
            "latitude": latitude,
            "longitude": longitude,
        }))
    }
}
