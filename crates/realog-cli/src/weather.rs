//! Weather lookup
//!
//! Fetches the day's weather for an entry's GPS position from the
//! OpenWeatherMap forecast API, using the key stored in the journal
//! settings.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use realog_core::models::{GeoPoint, WeatherSnapshot};

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// Fetch timeout in seconds
const FETCH_TIMEOUT: u64 = 10;

#[derive(Debug, Deserialize)]
struct Forecast {
    list: Vec<ForecastItem>,
    city: City,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    /// Unix seconds
    dt: i64,
    main: Reading,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Reading {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct City {
    name: String,
}

/// Fetch today's weather at `point`
///
/// Returns None on any failure (graceful degradation).
pub async fn fetch_weather(api_key: &str, point: GeoPoint) -> Option<WeatherSnapshot> {
    match fetch_weather_inner(api_key, point).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Weather lookup failed: {}", e);
            None
        }
    }
}

async fn fetch_weather_inner(api_key: &str, point: GeoPoint) -> Result<Option<WeatherSnapshot>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT))
        .build()?;

    let response = client
        .get(FORECAST_URL)
        .query(&[
            ("lat", point.lat.to_string()),
            ("lon", point.lon.to_string()),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        debug!("Weather API answered {}", response.status());
        return Ok(None);
    }

    let forecast: Forecast = response.json().await?;
    Ok(summarize(&forecast, Utc::now().date_naive()))
}

/// Reduce a 3-hourly forecast to one reading for `today` (UTC)
///
/// The temperature is the day's maximum, rounded; the condition comes from
/// the middle reading of the day. Late at night the day may have no
/// readings left, in which case the first one is used.
fn summarize(forecast: &Forecast, today: NaiveDate) -> Option<WeatherSnapshot> {
    let todays: Vec<&ForecastItem> = forecast
        .list
        .iter()
        .filter(|item| {
            DateTime::from_timestamp(item.dt, 0).is_some_and(|dt| dt.date_naive() == today)
        })
        .collect();

    let items = if todays.is_empty() {
        forecast.list.first().into_iter().collect()
    } else {
        todays
    };

    let max_temp = items
        .iter()
        .map(|item| item.main.temp)
        .fold(f64::NEG_INFINITY, f64::max);
    let middle = items.get(items.len() / 2)?;
    let condition = middle.weather.first()?;

    Some(WeatherSnapshot {
        temp: max_temp.round(),
        condition: condition.description.clone(),
        location: forecast.city.name.clone(),
        icon: condition.icon.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(json: &str) -> Forecast {
        serde_json::from_str(json).unwrap()
    }

    // 2024-05-01T00:00:00Z
    const MAY_FIRST: i64 = 1_714_521_600;

    #[test]
    fn test_summarize_uses_daily_max_and_midday_condition() {
        let forecast = forecast(&format!(
            r#"{{
                "city": {{"name": "Budapest"}},
                "list": [
                    {{"dt": {}, "main": {{"temp": 11.2}}, "weather": [{{"description": "clear sky", "icon": "01n"}}]}},
                    {{"dt": {}, "main": {{"temp": 18.6}}, "weather": [{{"description": "few clouds", "icon": "02d"}}]}},
                    {{"dt": {}, "main": {{"temp": 16.0}}, "weather": [{{"description": "light rain", "icon": "10d"}}]}},
                    {{"dt": {}, "main": {{"temp": 25.0}}, "weather": [{{"description": "hot", "icon": "01d"}}]}}
                ]
            }}"#,
            MAY_FIRST,
            MAY_FIRST + 12 * 3600,
            MAY_FIRST + 18 * 3600,
            MAY_FIRST + 30 * 3600,
        ));

        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let snapshot = summarize(&forecast, today).unwrap();

        // Tomorrow's 25.0 is not part of today
        assert_eq!(snapshot.temp, 19.0);
        assert_eq!(snapshot.condition, "few clouds");
        assert_eq!(snapshot.location, "Budapest");
        assert_eq!(snapshot.icon.as_deref(), Some("02d"));
    }

    #[test]
    fn test_summarize_falls_back_to_first_reading() {
        let forecast = forecast(&format!(
            r#"{{
                "city": {{"name": "Szeged"}},
                "list": [
                    {{"dt": {}, "main": {{"temp": 7.4}}, "weather": [{{"description": "mist"}}]}}
                ]
            }}"#,
            MAY_FIRST + 24 * 3600,
        ));

        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let snapshot = summarize(&forecast, today).unwrap();
        assert_eq!(snapshot.temp, 7.0);
        assert_eq!(snapshot.condition, "mist");
        assert!(snapshot.icon.is_none());
    }

    #[test]
    fn test_summarize_empty_forecast() {
        let forecast = forecast(r#"{"city": {"name": "Nowhere"}, "list": []}"#);
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(summarize(&forecast, today).is_none());
    }
}
