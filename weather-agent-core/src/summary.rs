//! Human-readable renderings of replies.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{DailyForecast, Units};

fn number(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Summary of current conditions. Only fields present in `fields` produce a line.
pub fn current_summary(location: &str, units: Units, fields: &BTreeMap<String, Value>) -> String {
    let temp = units.temperature_symbol();
    let get = |name: &str| fields.get(name).and_then(number);

    let mut lines = vec![format!("Current weather in {location}:")];

    match (get("temperature"), get("feels_like")) {
        (Some(t), Some(f)) => {
            lines.push(format!("• Temperature: {t}{temp} (feels like {f}{temp})"))
        }
        (Some(t), None) => lines.push(format!("• Temperature: {t}{temp}")),
        (None, Some(f)) => lines.push(format!("• Feels like: {f}{temp}")),
        (None, None) => {}
    }
    if let Some(d) = get("description") {
        lines.push(format!("• Conditions: {d}"));
    }
    if let Some(h) = get("humidity") {
        lines.push(format!("• Humidity: {h}%"));
    }
    if let Some(p) = get("pressure") {
        lines.push(format!("• Pressure: {p} hPa"));
    }
    if let Some(w) = get("wind_speed") {
        let direction = get("wind_direction")
            .map(|d| format!(" from {d}°"))
            .unwrap_or_default();
        lines.push(format!("• Wind: {w} {}{direction}", units.speed_symbol()));
    }
    if let Some(v) = get("visibility") {
        lines.push(format!("• Visibility: {v} km"));
    }

    lines.join("\n")
}

/// Summary of a multi-day forecast.
pub fn forecast_summary(location: &str, units: Units, days: &[DailyForecast]) -> String {
    let temp = units.temperature_symbol();
    let mut blocks = Vec::with_capacity(days.len());

    for day in days {
        let mut block = format!(
            "• {}: {}\n  High: {:.1}{temp}, Low: {:.1}{temp}",
            day.date.format("%A, %B %d"),
            day.description,
            day.temperature_max,
            day.temperature_min,
        );
        if day.precipitation_probability > 0.0 {
            block.push_str(&format!(
                "\n  Precipitation: {:.0}% chance",
                day.precipitation_probability
            ));
        }
        blocks.push(block);
    }

    format!(
        "Weather forecast for {location}:\n\n{}",
        blocks.join("\n\n")
    )
}
