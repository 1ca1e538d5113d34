use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields a current-conditions reply can carry, in display order.
pub const CURRENT_FIELDS: &[&str] = &[
    "temperature",
    "feels_like",
    "humidity",
    "pressure",
    "description",
    "wind_speed",
    "wind_direction",
    "visibility",
    "sunrise",
    "sunset",
];

pub const MAX_FORECAST_DAYS: u8 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    #[serde(alias = "standard")]
    Kelvin,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Kelvin => "kelvin",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Kelvin => "K",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Kelvin => "m/s",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Kelvin]
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "kelvin" | "standard" => Ok(Units::Kelvin),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial, kelvin."
            )),
        }
    }
}

/// Request for current conditions at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherRequest {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    /// Requested field names. `None` or an empty set selects everything available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeSet<String>>,
    #[serde(default)]
    pub save_to_file: bool,
}

impl WeatherRequest {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            units: None,
            fields: None,
            save_to_file: false,
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn saving_to_file(mut self) -> Self {
        self.save_to_file = true;
        self
    }

    /// Requested field names, trimmed and lowercased. Empty means "all".
    pub fn requested_fields(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .flatten()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect()
    }
}

fn default_forecast_days() -> u8 {
    MAX_FORECAST_DAYS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub location: String,
    #[serde(default = "default_forecast_days")]
    pub days: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    #[serde(default)]
    pub save_to_file: bool,
}

impl ForecastRequest {
    pub fn new(location: impl Into<String>, days: u8) -> Self {
        Self {
            location: location.into(),
            days,
            units: None,
            save_to_file: false,
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }

    pub fn saving_to_file(mut self) -> Self {
        self.save_to_file = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Partial,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    ProviderUnavailable,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reply to exactly one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub location: String,
    pub units: Units,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<DailyForecast>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    pub observed_at: DateTime<Utc>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactInfo>,
}

impl WeatherResponse {
    /// An error-status reply carrying no weather data.
    pub fn failure(location: impl Into<String>, units: Units, error: ErrorInfo) -> Self {
        Self {
            location: location.into(),
            units,
            fields: BTreeMap::new(),
            forecast: None,
            missing_fields: Vec::new(),
            observed_at: Utc::now(),
            status: Status::Error,
            summary: None,
            error: Some(error),
            artifact: None,
        }
    }
}

/// Location as resolved by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub name: String,
    pub country: Option<String>,
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.country.as_deref().filter(|c| !c.is_empty()) {
            Some(country) => write!(f, "{}, {}", self.name, country),
            None => f.write_str(&self.name),
        }
    }
}

/// Current conditions normalized across providers, already in the requested units.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub location: ResolvedLocation,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure_hpa: Option<f64>,
    pub description: String,
    pub wind_speed: f64,
    pub wind_direction: Option<u16>,
    pub visibility_km: Option<f64>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

impl Conditions {
    /// Every field this observation carries, keyed by its wire name.
    pub fn field_values(&self) -> BTreeMap<&'static str, Value> {
        let mut out = BTreeMap::new();
        out.insert("temperature", Value::from(self.temperature));
        out.insert("feels_like", Value::from(self.feels_like));
        out.insert("humidity", Value::from(self.humidity));
        out.insert("description", Value::from(self.description.clone()));
        out.insert("wind_speed", Value::from(self.wind_speed));
        if let Some(p) = self.pressure_hpa {
            out.insert("pressure", Value::from(p));
        }
        if let Some(d) = self.wind_direction {
            out.insert("wind_direction", Value::from(d));
        }
        if let Some(v) = self.visibility_km {
            out.insert("visibility", Value::from(v));
        }
        if let Some(t) = self.sunrise {
            out.insert("sunrise", Value::from(t.to_rfc3339()));
        }
        if let Some(t) = self.sunset {
            out.insert("sunset", Value::from(t.to_rfc3339()));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub description: String,
    pub humidity: u8,
    pub wind_speed: f64,
    pub precipitation_probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub location: ResolvedLocation,
    /// Time of the first forecast entry.
    pub starts_at: DateTime<Utc>,
    pub days: Vec<DailyForecast>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_parse_accepts_aliases_and_case() {
        assert_eq!("Metric".parse::<Units>().unwrap(), Units::Metric);
        assert_eq!(" imperial ".parse::<Units>().unwrap(), Units::Imperial);
        assert_eq!("standard".parse::<Units>().unwrap(), Units::Kelvin);

        let err = "celsius".parse::<Units>().unwrap_err();
        assert!(err.to_string().contains("Unknown units"));
    }

    #[test]
    fn units_deserialize_rejects_unknown_value() {
        let ok: Units = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(ok, Units::Kelvin);
        assert!(serde_json::from_str::<Units>("\"celsius\"").is_err());
    }

    #[test]
    fn requested_fields_are_normalized() {
        let req = WeatherRequest::new("Paris").with_fields([" Temperature", "HUMIDITY", "  "]);
        let fields = req.requested_fields();

        assert_eq!(fields.len(), 2);
        assert!(fields.contains("temperature"));
        assert!(fields.contains("humidity"));
    }

    #[test]
    fn resolved_location_display_skips_missing_country() {
        let with_country = ResolvedLocation {
            name: "Paris".into(),
            country: Some("FR".into()),
        };
        let without = ResolvedLocation {
            name: "Atlantis".into(),
            country: None,
        };

        assert_eq!(with_country.to_string(), "Paris, FR");
        assert_eq!(without.to_string(), "Atlantis");
    }

    #[test]
    fn failure_response_serializes_error_kind() {
        let resp = WeatherResponse::failure(
            "Nowhere",
            Units::Metric,
            ErrorInfo {
                kind: ErrorKind::NotFound,
                message: "no such place".into(),
            },
        );
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "not_found");
        assert!(json.get("forecast").is_none());
        assert!(json.get("missing_fields").is_none());
    }
}
