//! Unit conversion into the canonical unit set (°F, hPa, mph)

/// Standard sea-level pressure in hPa
pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;

/// Convert Celsius to Fahrenheit
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Pascals to hectopascals
#[must_use]
pub fn pascals_to_hpa(pascals: f64) -> f64 {
    pascals / 100.0
}

/// Convert inches of mercury to hectopascals
#[must_use]
pub fn inhg_to_hpa(inches: f64) -> f64 {
    inches * 33.8639
}

/// Convert meters per second to miles per hour
#[must_use]
pub fn ms_to_mph(meters_per_second: f64) -> f64 {
    meters_per_second * 2.237
}

/// Convert kilometers per hour to miles per hour
#[must_use]
pub fn kmh_to_mph(kilometers_per_hour: f64) -> f64 {
    kilometers_per_hour * 0.621_371
}

/// Round to one decimal place
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Convert a cardinal direction ("N", "WSW", ...) to degrees
#[must_use]
pub fn cardinal_to_degrees(direction: &str) -> Option<f64> {
    let degrees = match direction.trim().to_uppercase().as_str() {
        "N" => 0.0,
        "NNE" => 22.5,
        "NE" => 45.0,
        "ENE" => 67.5,
        "E" => 90.0,
        "ESE" => 112.5,
        "SE" => 135.0,
        "SSE" => 157.5,
        "S" => 180.0,
        "SSW" => 202.5,
        "SW" => 225.0,
        "WSW" => 247.5,
        "W" => 270.0,
        "WNW" => 292.5,
        "NW" => 315.0,
        "NNW" => 337.5,
        _ => return None,
    };
    Some(degrees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 32.0)]
    #[case(100.0, 212.0)]
    #[case(-40.0, -40.0)]
    #[case(21.5, 70.7)]
    fn test_celsius_to_fahrenheit(#[case] celsius: f64, #[case] expected: f64) {
        assert_eq!(round1(celsius_to_fahrenheit(celsius)), expected);
    }

    #[test]
    fn test_pressure_conversions() {
        assert_eq!(pascals_to_hpa(101_325.0), 1013.25);
        assert_eq!(round1(inhg_to_hpa(29.92)), 1013.2);
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(1.0, 2.2)]
    #[case(10.0, 22.4)]
    fn test_ms_to_mph(#[case] ms: f64, #[case] expected: f64) {
        assert_eq!(round1(ms_to_mph(ms)), expected);
    }

    #[test]
    fn test_kmh_to_mph() {
        assert_eq!(round1(kmh_to_mph(16.0934)), 10.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(1013.25), 1013.3);
        assert_eq!(round1(-2.04), -2.0);
        assert_eq!(round1(7.0), 7.0);
    }

    #[test]
    fn test_cardinal_to_degrees() {
        assert_eq!(cardinal_to_degrees("N"), Some(0.0));
        assert_eq!(cardinal_to_degrees("wsw"), Some(247.5));
        assert_eq!(cardinal_to_degrees(" NW "), Some(315.0));
        assert_eq!(cardinal_to_degrees("calm"), None);
    }
}
