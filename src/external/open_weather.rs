use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::external::WeatherService;
use crate::models::driver::Coordinate;

#[derive(Clone)]
pub struct OpenWeatherClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(http: reqwest::Client, api_base: String, api_key: String) -> Self {
        Self {
            http,
            api_base,
            api_key,
        }
    }

    async fn fetch(&self, at: Coordinate) -> Result<WeatherResponse, reqwest::Error> {
        let url = format!("https://{}/data/2.5/weather", self.api_base);

        self.http
            .get(url)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .json()
            .await
    }
}

#[derive(Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    cod: serde_json::Value,
    rain: Option<Rain>,
}

#[derive(Deserialize)]
struct Rain {
    #[serde(rename = "1h", default)]
    one_hour: f64,
}

impl WeatherResponse {
    /// `cod` comes back as a number on success and a string on errors.
    fn rain_mm(&self) -> f64 {
        let ok = match &self.cod {
            serde_json::Value::Number(n) => n.as_u64() == Some(200),
            serde_json::Value::String(s) => s == "200",
            _ => false,
        };

        match (&self.rain, ok) {
            (Some(rain), true) if rain.one_hour.is_finite() => rain.one_hour.max(0.0),
            _ => 0.0,
        }
    }
}

#[async_trait]
impl WeatherService for OpenWeatherClient {
    async fn precipitation(&self, at: Coordinate) -> f64 {
        match self.fetch(at).await {
            Ok(data) => data.rain_mm(),
            Err(err) => {
                warn!(error = %err, lat = at.lat, lng = at.lng, "weather lookup failed; assuming no rain");
                0.0
            }
        }
    }
}
