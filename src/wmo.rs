//! WMO weather-code lookups and wind-direction naming.
//!
//! See: https://open-meteo.com/en/docs#weathervariables

use std::collections::HashMap;
use std::sync::LazyLock;

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const UNKNOWN_EMOJI: &str = "🌡️";

/// Code → (label, emoji). Built once on first use and never mutated.
static WMO_TABLE: LazyLock<HashMap<i32, (&'static str, &'static str)>> = LazyLock::new(|| {
    HashMap::from([
        (0, ("Clear sky", "☀️")),
        (1, ("Mainly clear", "🌤️")),
        (2, ("Partly cloudy", "⛅")),
        (3, ("Overcast", "☁️")),
        (45, ("Foggy", "🌫️")),
        (48, ("Icy fog", "🌫️")),
        (51, ("Light drizzle", "🌦️")),
        (53, ("Moderate drizzle", "🌦️")),
        (55, ("Heavy drizzle", "🌧️")),
        (61, ("Slight rain", "🌧️")),
        (63, ("Moderate rain", "🌧️")),
        (65, ("Heavy rain", "🌧️")),
        (71, ("Slight snow", "❄️")),
        (73, ("Moderate snow", "❄️")),
        (75, ("Heavy snow", "❄️")),
        (77, ("Snow grains", "🌨️")),
        (80, ("Slight showers", "🌦️")),
        (81, ("Moderate showers", "🌧️")),
        (82, ("Violent showers", "⛈️")),
        (85, ("Slight snow showers", "🌨️")),
        (86, ("Heavy snow showers", "🌨️")),
        (95, ("Thunderstorm", "⛈️")),
        (96, ("Thunderstorm with hail", "⛈️")),
        (99, ("Thunderstorm with heavy hail", "⛈️")),
    ])
});

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Human-readable label for a WMO code.
pub fn label(code: i32) -> &'static str {
    WMO_TABLE.get(&code).map_or(UNKNOWN_LABEL, |&(label, _)| label)
}

pub fn emoji(code: i32) -> &'static str {
    WMO_TABLE.get(&code).map_or(UNKNOWN_EMOJI, |&(_, emoji)| emoji)
}

/// 16-point compass name for a bearing in degrees.
pub fn compass_direction(degrees: f64) -> &'static str {
    if !degrees.is_finite() {
        return COMPASS[0];
    }
    let idx = (degrees / 22.5).round().rem_euclid(16.0) as usize;
    COMPASS[idx % 16]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_labels_and_emoji() {
        assert_eq!(label(0), "Clear sky");
        assert_eq!(emoji(0), "☀️");
        assert_eq!(label(63), "Moderate rain");
        assert_eq!(label(99), "Thunderstorm with heavy hail");
    }

    #[test]
    fn unknown_codes_degrade() {
        for code in [7, -1, 4, 100, 999] {
            assert_eq!(label(code), UNKNOWN_LABEL);
            assert_eq!(emoji(code), UNKNOWN_EMOJI);
        }
    }

    #[test]
    fn compass_cardinal_points() {
        assert_eq!(compass_direction(0.0), "N");
        assert_eq!(compass_direction(22.5), "NNE");
        assert_eq!(compass_direction(90.0), "E");
        assert_eq!(compass_direction(180.0), "S");
        assert_eq!(compass_direction(270.0), "W");
    }

    #[test]
    fn compass_wraps_to_north() {
        assert_eq!(compass_direction(348.75), "N");
        assert_eq!(compass_direction(355.0), "N");
        assert_eq!(compass_direction(360.0), "N");
        assert_eq!(compass_direction(348.7), "NNW");
    }

    #[test]
    fn compass_normalises_out_of_range_bearings() {
        assert_eq!(compass_direction(-90.0), "W");
        assert_eq!(compass_direction(450.0), "E");
        assert_eq!(compass_direction(f64::NAN), "N");
    }
}
