//! Parameter recognition and unit canonicalisation for the Coverage-JSON
//! domain mapping (§4.5). Grounded in `covjson2bufr.cpp`'s prefix/suffix
//! matching and ad-hoc `hPa`/`degC` conversions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    StationPressure,
    MslPressure,
    AirTemperature,
    DewPoint,
    RelativeHumidity,
    WindSpeed,
    WindDirection,
    Precipitation1h,
    Precipitation12h,
    Precipitation24h,
    LongwaveRadiation1h,
    LongwaveRadiation12h,
}

const LONGWAVE_PREFIX: &str =
    "integral_wrt_time_of_surface_downwelling_longwave_flux_in_air";

/// Classifies a `ranges`/`parameters` key by the prefix/suffix table in
/// §4.5. Returns `None` for anything not recognised (passed through
/// untouched by the builder, i.e. simply not emitted into a descriptor).
pub fn classify(param: &str) -> Option<ParamKind> {
    if param.starts_with("air_pressure_at_mean_sea_level:") {
        return Some(ParamKind::MslPressure);
    }
    if param.starts_with("air_pressure:") {
        return Some(ParamKind::StationPressure);
    }
    if param.starts_with("air_temperature") {
        return Some(ParamKind::AirTemperature);
    }
    if param.starts_with("dew_point_temperature") {
        return Some(ParamKind::DewPoint);
    }
    if param.starts_with("relative_humidity") {
        return Some(ParamKind::RelativeHumidity);
    }
    if param.starts_with("wind_speed") {
        return Some(ParamKind::WindSpeed);
    }
    if param.starts_with("wind_from_direction") {
        return Some(ParamKind::WindDirection);
    }
    if param.starts_with("precipitation_amount") {
        if param.ends_with(":sum:PT1H") {
            return Some(ParamKind::Precipitation1h);
        }
        if param.ends_with(":sum:PT12H") {
            return Some(ParamKind::Precipitation12h);
        }
        if param.ends_with(":sum:PT24H") {
            return Some(ParamKind::Precipitation24h);
        }
    }
    if param.starts_with(LONGWAVE_PREFIX) {
        if param.ends_with(":sum:PT1H") {
            return Some(ParamKind::LongwaveRadiation1h);
        }
        if param.ends_with(":sum:PT12H") {
            return Some(ParamKind::LongwaveRadiation12h);
        }
    }
    None
}

/// Converts a raw `(value, unit)` pair into the BUFR-canonical unit for its
/// parameter kind. Each parameter's unit is read independently — the
/// dew-point-borrows-temperature's-unit behaviour in the original is not
/// reproduced (§9 Open Question).
pub fn canonicalize(kind: ParamKind, value: f64, unit: &str) -> f64 {
    match kind {
        ParamKind::StationPressure | ParamKind::MslPressure => {
            if unit.eq_ignore_ascii_case("hPa") {
                value * 100.0
            } else {
                value
            }
        }
        ParamKind::AirTemperature | ParamKind::DewPoint => {
            if unit.eq_ignore_ascii_case("K") {
                value
            } else {
                value + 273.16
            }
        }
        ParamKind::RelativeHumidity => value / 100.0,
        _ => value,
    }
}

/// Extracts the substring between the first and second `:` in a parameter
/// name, e.g. `"air_temperature:2.0:point:PT0S"` -> `"2.0"`.
pub fn sensor_level(param: &str) -> Option<&str> {
    let first = param.find(':')?;
    let rest = &param[first + 1..];
    let second = rest.find(':')?;
    Some(&rest[..second])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_precipitation_by_prefix_and_suffix() {
        assert_eq!(
            classify("precipitation_amount:0.0:sum:PT1H"),
            Some(ParamKind::Precipitation1h)
        );
        assert_eq!(
            classify("precipitation_amount:0.0:sum:PT24H"),
            Some(ParamKind::Precipitation24h)
        );
        assert_eq!(classify("precipitation_amount:0.0:point:PT0S"), None);
    }

    #[test]
    fn canonicalizes_pressure_and_temperature() {
        assert_eq!(
            canonicalize(ParamKind::StationPressure, 1013.25, "hPa"),
            101325.0
        );
        assert_eq!(
            canonicalize(ParamKind::AirTemperature, 15.0, "degC"),
            288.16
        );
        assert_eq!(canonicalize(ParamKind::AirTemperature, 288.16, "K"), 288.16);
        assert_eq!(canonicalize(ParamKind::RelativeHumidity, 80.0, "percent"), 0.8);
    }

    #[test]
    fn extracts_sensor_level_between_first_two_colons() {
        assert_eq!(
            sensor_level("air_temperature:2.0:point:PT0S"),
            Some("2.0")
        );
        assert_eq!(sensor_level("no_colons_here"), None);
    }
}
