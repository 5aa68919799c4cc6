//! Report formatting
//!
//! Turns condition snapshots into the text payloads the tools return:
//! WMO weather-code table, eight-sector wind compass, pressure conversion
//! and the current/forecast/search report templates. Everything here is
//! pure string work, deterministic for a given input.

use super::types::{CurrentConditions, ForecastDay, GeoCandidate};

const COMPASS_SECTORS: [&str; 8] = [
    "north",
    "northeast",
    "east",
    "southeast",
    "south",
    "southwest",
    "west",
    "northwest",
];

/// Label and emoji for a WMO weather interpretation code
///
/// Codes outside the WMO 4677 table fall back to a neutral label rather
/// than failing; upstream occasionally grows new codes.
pub fn condition(code: u8) -> (&'static str, &'static str) {
    match code {
        0 => ("clear sky", "☀️"),
        1 => ("mainly clear", "🌤️"),
        2 => ("partly cloudy", "⛅"),
        3 => ("overcast", "☁️"),
        45 => ("fog", "🌫️"),
        48 => ("depositing rime fog", "🌫️"),
        51 => ("light drizzle", "🌦️"),
        53 => ("moderate drizzle", "🌦️"),
        55 => ("dense drizzle", "🌦️"),
        56 => ("light freezing drizzle", "🌨️"),
        57 => ("dense freezing drizzle", "🌨️"),
        61 => ("slight rain", "🌧️"),
        63 => ("moderate rain", "🌧️"),
        65 => ("heavy rain", "🌧️"),
        66 => ("light freezing rain", "🌨️"),
        67 => ("heavy freezing rain", "🌨️"),
        71 => ("slight snowfall", "❄️"),
        73 => ("moderate snowfall", "❄️"),
        75 => ("heavy snowfall", "❄️"),
        77 => ("snow grains", "❄️"),
        80 => ("slight rain showers", "🌧️"),
        81 => ("moderate rain showers", "🌧️"),
        82 => ("violent rain showers", "🌧️"),
        85 => ("slight snow showers", "❄️"),
        86 => ("heavy snow showers", "❄️"),
        95 => ("thunderstorm", "⛈️"),
        96 => ("thunderstorm with slight hail", "⛈️"),
        99 => ("thunderstorm with heavy hail", "⛈️"),
        _ => ("unknown conditions", "🌤️"),
    }
}

/// Compass name for a meteorological wind direction
pub fn wind_compass(degrees: f64) -> &'static str {
    let normalized = degrees.rem_euclid(360.0);
    let sector = ((normalized + 22.5) / 45.0) as usize % 8;
    COMPASS_SECTORS[sector]
}

/// Convert mean sea-level pressure from hPa to mm Hg
pub fn hpa_to_mmhg(hpa: f64) -> f64 {
    hpa * 0.750062
}

fn is_rainy(code: u8) -> bool {
    matches!(code, 51..=57 | 61..=67 | 80..=82)
}

fn is_snowy(code: u8) -> bool {
    matches!(code, 71..=77 | 85 | 86)
}

fn is_stormy(code: u8) -> bool {
    matches!(code, 95 | 96 | 99)
}

/// Clothing and precipitation advice for a temperature/condition pair
pub fn recommendation(temperature_c: f64, weather_code: u8) -> String {
    let clothing = if temperature_c < -10.0 {
        "Very cold! Wear warm winter clothing"
    } else if temperature_c < 0.0 {
        "Cold. Wear a warm jacket"
    } else if temperature_c < 10.0 {
        "Chilly. Take a jacket"
    } else if temperature_c < 20.0 {
        "Take a light jacket or sweater"
    } else if temperature_c < 25.0 {
        "Warm. Light clothing will be comfortable"
    } else {
        "Hot. Dress light"
    };

    let extra = if is_rainy(weather_code) {
        Some("and take an umbrella! ☂️")
    } else if is_snowy(weather_code) {
        Some("and wear warm shoes")
    } else if is_stormy(weather_code) {
        Some("and be careful outside")
    } else {
        None
    };

    match extra {
        Some(extra) => format!("{} {}", clothing, extra),
        None => clothing.to_string(),
    }
}

/// Render the current-conditions report
pub fn format_current(location: &str, current: &CurrentConditions) -> String {
    let (condition_label, emoji) = condition(current.weather_code);
    let tip = recommendation(current.temperature_c, current.weather_code);

    let mut report = format!(
        "{} Weather in {}\n\
         ━━━━━━━━━━━━━━━━━━━━━━━\n\
         🌡️  Temperature: {}°C\n\
         ☁️  Conditions: {}\n\
         💧 Humidity: {}%\n\
         📊 Pressure: {} hPa ({} mm Hg)\n\
         💨 Wind: {:.1} km/h, {}",
        emoji,
        location,
        current.temperature_c.round() as i64,
        condition_label,
        current.humidity_percent.round() as i64,
        current.pressure_hpa.round() as i64,
        hpa_to_mmhg(current.pressure_hpa).round() as i64,
        current.wind_speed_kmh,
        wind_compass(current.wind_direction_deg),
    );

    if let Some(observed_at) = current.observed_at {
        report.push_str(&format!("\n🕐 Updated: {}", observed_at.format("%H:%M")));
    }
    report.push_str(&format!("\n\n💡 Tip: {}", tip));
    report
}

/// Render the multi-day forecast report
pub fn format_forecast(location: &str, days: &[ForecastDay]) -> String {
    let mut report = format!(
        "📅 Weather forecast for {}, {} day(s)\n\
         ━━━━━━━━━━━━━━━━━━━━━━━\n\n",
        location,
        days.len()
    );

    for day in days {
        let (condition_label, emoji) = condition(day.weather_code);
        report.push_str(&format!(
            "{} {} ({})\n",
            emoji,
            day.date.format("%d.%m.%Y"),
            day.date.format("%a")
        ));
        report.push_str(&format!(
            "   🌡️  {}°C / {}°C\n",
            day.temperature_min_c.round() as i64,
            day.temperature_max_c.round() as i64
        ));
        report.push_str(&format!("   ☁️  {}\n", condition_label));
        if day.precipitation_mm > 0.0 {
            report.push_str(&format!(
                "   🌧️  Precipitation: {:.1} mm\n",
                day.precipitation_mm
            ));
        }
        if let Some(humidity) = day.humidity_max_percent {
            report.push_str(&format!("   💧 Humidity: {}%\n", humidity.round() as i64));
        }
        report.push('\n');
    }

    report.trim_end().to_string()
}

/// Render the geocoding-candidates report
pub fn format_candidates(query: &str, candidates: &[GeoCandidate]) -> String {
    let mut report = format!("🔍 Locations matching '{}':\n", query);
    for candidate in candidates {
        report.push_str(&format!(
            "\n📍 {}\n   Coordinates: {}, {}\n",
            candidate.full_name(),
            candidate.latitude,
            candidate.longitude
        ));
    }
    report.trim_end().to_string()
}
