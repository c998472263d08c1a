use super::TrackStub;
use crate::catalog_store::{valid_bpm, valid_duration, Intensity};
use serde_json::Value;

/// Parse a completion into track stubs.
///
/// Accepts `{"tracks": [...]}` or a bare array, optionally inside a Markdown
/// code fence. Items without a title or an artist are dropped. An `Err`
/// means the response did not have the expected shape at all.
pub fn parse_suggestions(content: &str) -> Result<Vec<TrackStub>, String> {
    let body = strip_code_fence(content);
    if body.is_empty() {
        return Err("empty response".to_string());
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("response is not JSON: {}", e))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("tracks") {
            Some(Value::Array(items)) => items,
            _ => return Err("expected a \"tracks\" array".to_string()),
        },
        _ => return Err("expected a JSON object or array".to_string()),
    };

    Ok(items.iter().filter_map(stub_from_value).collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

fn text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(item: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// Energy on a 1 to 10 scale, as services tend to report it.
fn intensity_from_energy(energy: f64) -> Option<Intensity> {
    match energy {
        e if !(1.0..=10.0).contains(&e) => None,
        e if e < 4.0 => Some(Intensity::Low),
        e if e < 7.0 => Some(Intensity::Medium),
        e if e < 9.0 => Some(Intensity::High),
        _ => Some(Intensity::Extreme),
    }
}

fn stub_from_value(item: &Value) -> Option<TrackStub> {
    let title = text(item, &["title", "name"])?;
    let artist = text(item, &["artist", "artists"])?;
    let intensity = text(item, &["intensity"])
        .and_then(|s| Intensity::from_db_str(&s))
        .or_else(|| number(item, &["energy_level", "energy"]).and_then(intensity_from_energy));

    Some(TrackStub {
        title,
        artist,
        duration_minutes: valid_duration(number(item, &["duration_minutes", "duration"])),
        bpm: valid_bpm(number(item, &["bpm", "estimated_bpm"])),
        intensity,
        focus_area: text(item, &["focus_area", "segment"]),
        notes: text(item, &["notes", "reason"]),
    })
}
