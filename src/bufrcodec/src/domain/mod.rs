//! The Coverage-JSON -> BUFR domain mapping (§4.5): pivots an observation
//! document into one `(descriptor -> value queue)` map per `(station,
//! time)` pair, ready to drive [`crate::codec::encode_subset_keyed`]
//! against the fixed top-level descriptor sequence below. A descriptor's
//! queue normally holds one value; the longwave-radiation slot holds two,
//! since the sequence's trailing delayed-replication group (`1 01 000,
//! 0 31 001, 3 02 045`) visits the same descriptor once per period.

pub mod coverage;
pub mod units;

use std::collections::HashMap;

use crate::descriptor::Descriptor;
use crate::oscar::OscarDirectory;
use crate::value::Value;

use coverage::StationSeries;
use units::ParamKind;

pub const WIGOS_SERIES: Descriptor = Descriptor::new(0, 1, 125);
pub const WIGOS_ISSUER: Descriptor = Descriptor::new(0, 1, 126);
pub const WIGOS_ISSUE_NUMBER: Descriptor = Descriptor::new(0, 1, 127);
pub const WIGOS_LOCAL_ID: Descriptor = Descriptor::new(0, 1, 128);

pub const YEAR: Descriptor = Descriptor::new(0, 4, 1);
pub const MONTH: Descriptor = Descriptor::new(0, 4, 2);
pub const DAY: Descriptor = Descriptor::new(0, 4, 3);
pub const HOUR: Descriptor = Descriptor::new(0, 4, 4);
pub const MINUTE: Descriptor = Descriptor::new(0, 4, 5);
pub const SECOND: Descriptor = Descriptor::new(0, 4, 6);

pub const LATITUDE: Descriptor = Descriptor::new(0, 5, 1);
pub const LONGITUDE: Descriptor = Descriptor::new(0, 6, 1);

pub const BLOCK_NUMBER: Descriptor = Descriptor::new(0, 1, 1);
pub const STATION_NUMBER: Descriptor = Descriptor::new(0, 1, 2);
pub const STATION_HEIGHT: Descriptor = Descriptor::new(0, 7, 1);
pub const SENSOR_HEIGHT: Descriptor = Descriptor::new(0, 7, 32);

pub const STATION_PRESSURE: Descriptor = Descriptor::new(0, 10, 4);
pub const MSL_PRESSURE: Descriptor = Descriptor::new(0, 10, 51);
pub const AIR_TEMPERATURE: Descriptor = Descriptor::new(0, 12, 101);
pub const DEW_POINT: Descriptor = Descriptor::new(0, 12, 103);
pub const RELATIVE_HUMIDITY: Descriptor = Descriptor::new(0, 13, 3);
pub const WIND_SPEED: Descriptor = Descriptor::new(0, 11, 2);
pub const WIND_DIRECTION: Descriptor = Descriptor::new(0, 11, 1);
pub const PRECIP_1H: Descriptor = Descriptor::new(0, 13, 19);
pub const PRECIP_12H: Descriptor = Descriptor::new(0, 13, 20);
pub const PRECIP_24H: Descriptor = Descriptor::new(0, 13, 21);
/// The one descriptor the trailing delayed-replication group visits twice
/// — once for the 1 h period, once for the 12 h period — per §4.5's
/// longwave-radiation row.
pub const LONGWAVE_RADIATION: Descriptor = Descriptor::new(0, 14, 2);
/// Delayed-replication count trigger for the longwave-radiation group.
/// Always 2: one repeat per period this builder reports.
pub const LONGWAVE_PERIOD_COUNT: Descriptor = Descriptor::new(0, 31, 1);

fn param_descriptor(kind: ParamKind) -> Option<Descriptor> {
    use ParamKind::*;
    Some(match kind {
        StationPressure => STATION_PRESSURE,
        MslPressure => MSL_PRESSURE,
        AirTemperature => AIR_TEMPERATURE,
        DewPoint => DEW_POINT,
        RelativeHumidity => RELATIVE_HUMIDITY,
        WindSpeed => WIND_SPEED,
        WindDirection => WIND_DIRECTION,
        Precipitation1h => PRECIP_1H,
        Precipitation12h => PRECIP_12H,
        Precipitation24h => PRECIP_24H,
        LongwaveRadiation1h | LongwaveRadiation12h => LONGWAVE_RADIATION,
    })
}

/// The fixed top-level descriptor sequence every emitted subset is
/// structured by (§4.5), plus the terminating `0 00 000` marker the
/// builder appends after it.
pub fn top_level_descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor::new(3, 1, 150),
        Descriptor::new(3, 1, 90),
        Descriptor::new(3, 2, 31),
        Descriptor::new(3, 2, 35),
        Descriptor::new(3, 2, 36),
        Descriptor::new(3, 2, 42),
        Descriptor::new(3, 2, 40),
        Descriptor::new(1, 1, 0),
        Descriptor::new(0, 31, 1),
        Descriptor::new(3, 2, 45),
        Descriptor::new(0, 0, 0),
    ]
}

fn insert(out: &mut HashMap<Descriptor, Vec<Value>>, d: Descriptor, v: Value) {
    out.insert(d, vec![v]);
}

/// Splits a WIGOS identifier on `-` into at most four components, per
/// §4.5, mapping to `[WIGOS_SERIES, WIGOS_ISSUER, WIGOS_ISSUE_NUMBER,
/// WIGOS_LOCAL_ID]` in order. Fewer than four components leaves the
/// trailing descriptors unset (MISSING).
fn split_wigos(wigos_id: &str) -> HashMap<Descriptor, Vec<Value>> {
    let mut out = HashMap::new();
    let parts: Vec<&str> = wigos_id.splitn(4, '-').collect();
    let descriptors = [WIGOS_SERIES, WIGOS_ISSUER, WIGOS_ISSUE_NUMBER, WIGOS_LOCAL_ID];
    for (i, d) in descriptors.iter().enumerate() {
        if let Some(part) = parts.get(i) {
            let value = if *d == WIGOS_LOCAL_ID {
                Value::Text((*part).to_string())
            } else {
                match part.parse::<f64>() {
                    Ok(n) => Value::Numeric(n),
                    Err(_) => Value::Text((*part).to_string()),
                }
            };
            insert(&mut out, *d, value);
        }
    }
    out
}

/// Parses an ISO-8601 `YYYY-MM-DDTHH:MM:SS` timestamp (fractional seconds
/// and a trailing `Z`/offset are tolerated and ignored) into its six BUFR
/// date/time fields.
fn split_timestamp(timestamp: &str) -> Option<HashMap<Descriptor, Vec<Value>>> {
    let (date, time) = timestamp.split_once('T')?;
    let mut date_parts = date.split('-');
    let year: f64 = date_parts.next()?.parse().ok()?;
    let month: f64 = date_parts.next()?.parse().ok()?;
    let day: f64 = date_parts.next()?.parse().ok()?;

    let time = time.trim_end_matches('Z');
    let time = time.split(['+', '-']).next().unwrap_or(time);
    let mut time_parts = time.split(':');
    let hour: f64 = time_parts.next()?.parse().ok()?;
    let minute: f64 = time_parts.next()?.parse().ok()?;
    let second: f64 = time_parts
        .next()
        .and_then(|s| s.split('.').next())
        .unwrap_or("0")
        .parse()
        .ok()?;

    let mut out = HashMap::new();
    insert(&mut out, YEAR, Value::Numeric(year));
    insert(&mut out, MONTH, Value::Numeric(month));
    insert(&mut out, DAY, Value::Numeric(day));
    insert(&mut out, HOUR, Value::Numeric(hour));
    insert(&mut out, MINUTE, Value::Numeric(minute));
    insert(&mut out, SECOND, Value::Numeric(second));
    Some(out)
}

/// Builds one `(descriptor -> value queue)` map per `(station, time)` pair
/// across every parsed coverage, enriching station identification from
/// `oscar` when the WIGOS id is known there.
pub fn build_subset_values(
    stations: &[StationSeries],
    oscar: &OscarDirectory,
) -> Vec<HashMap<Descriptor, Vec<Value>>> {
    let mut subsets = Vec::new();
    for station in stations {
        let wigos_fields = split_wigos(&station.wigos_id);
        let oscar_record = oscar.lookup(&station.wigos_id);

        for (time_index, timestamp) in station.times.iter().enumerate() {
            let mut values: HashMap<Descriptor, Vec<Value>> = HashMap::new();
            values.extend(wigos_fields.clone());
            if let Some(dt) = split_timestamp(timestamp) {
                values.extend(dt);
            }
            insert(&mut values, LATITUDE, Value::Numeric(station.lat));
            insert(&mut values, LONGITUDE, Value::Numeric(station.lon));

            insert(
                &mut values,
                BLOCK_NUMBER,
                oscar_record
                    .block
                    .map(|b| Value::Numeric(b as f64))
                    .unwrap_or(Value::Missing),
            );
            insert(
                &mut values,
                STATION_NUMBER,
                oscar_record
                    .station
                    .map(|s| Value::Numeric(s as f64))
                    .unwrap_or(Value::Missing),
            );
            insert(
                &mut values,
                STATION_HEIGHT,
                oscar_record
                    .elevation
                    .map(Value::Numeric)
                    .unwrap_or(Value::Missing),
            );
            insert(&mut values, LONGWAVE_PERIOD_COUNT, Value::Numeric(2.0));

            let mut longwave = [Value::Missing, Value::Missing];

            for (param_name, series) in &station.series {
                let Some(kind) = units::classify(param_name) else {
                    continue;
                };
                let Some(descriptor) = param_descriptor(kind) else {
                    continue;
                };
                let raw = series.get(time_index).copied().flatten();
                let value = match raw {
                    Some(v) => {
                        let unit = station.units.get(param_name).map(String::as_str).unwrap_or("");
                        Value::Numeric(units::canonicalize(kind, v, unit))
                    }
                    None => Value::Missing,
                };

                match kind {
                    ParamKind::LongwaveRadiation1h => longwave[0] = value,
                    ParamKind::LongwaveRadiation12h => longwave[1] = value,
                    _ => insert(&mut values, descriptor, value),
                }

                if let Some(level) = units::sensor_level(param_name).and_then(|l| l.parse::<f64>().ok())
                {
                    values
                        .entry(SENSOR_HEIGHT)
                        .or_insert_with(|| vec![Value::Numeric(level)]);
                }
            }

            values.insert(LONGWAVE_RADIATION, longwave.to_vec());
            subsets.push(values);
        }
    }
    subsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_station() -> StationSeries {
        let mut series = HashMap::new();
        series.insert(
            "air_pressure:0.0:point:PT0S".to_string(),
            vec![Some(1013.25)],
        );
        series.insert("relative_humidity:2.0:point:PT0S".to_string(), vec![Some(80.0)]);
        series.insert(
            "air_temperature:2.0:point:PT0S".to_string(),
            vec![Some(15.0)],
        );
        let mut units = HashMap::new();
        units.insert("air_pressure:0.0:point:PT0S".to_string(), "hPa".to_string());
        units.insert("air_temperature:2.0:point:PT0S".to_string(), "degC".to_string());
        StationSeries {
            wigos_id: "0-20000-0-12345".to_string(),
            lat: 52.1,
            lon: 4.3,
            times: vec!["2026-07-30T12:00:00Z".to_string()],
            series,
            units,
        }
    }

    #[test]
    fn testable_property_scenario_six() {
        let stations = vec![sample_station()];
        let oscar = OscarDirectory::new();
        let subsets = build_subset_values(&stations, &oscar);
        assert_eq!(subsets.len(), 1);
        let values = &subsets[0];
        assert_eq!(values[&STATION_PRESSURE], vec![Value::Numeric(101325.0)]);
        assert_eq!(values[&RELATIVE_HUMIDITY], vec![Value::Numeric(0.8)]);
        assert_eq!(values[&AIR_TEMPERATURE], vec![Value::Numeric(288.16)]);
    }

    #[test]
    fn absent_parameter_emits_missing() {
        let mut station = sample_station();
        station.series.remove("air_pressure:0.0:point:PT0S");
        let oscar = OscarDirectory::new();
        let subsets = build_subset_values(&[station], &oscar);
        assert_eq!(subsets[0][&STATION_PRESSURE], vec![Value::Missing]);
    }

    #[test]
    fn wigos_id_splits_into_at_most_four_components() {
        let fields = split_wigos("0-20000-0-12345");
        assert_eq!(fields[&WIGOS_SERIES], vec![Value::Numeric(0.0)]);
        assert_eq!(fields[&WIGOS_ISSUER], vec![Value::Numeric(20000.0)]);
        assert_eq!(fields[&WIGOS_ISSUE_NUMBER], vec![Value::Numeric(0.0)]);
        assert_eq!(
            fields[&WIGOS_LOCAL_ID],
            vec![Value::Text("12345".to_string())]
        );
    }

    #[test]
    fn timestamp_splits_into_six_date_time_fields() {
        let fields = split_timestamp("2026-07-30T12:34:56Z").unwrap();
        assert_eq!(fields[&YEAR], vec![Value::Numeric(2026.0)]);
        assert_eq!(fields[&HOUR], vec![Value::Numeric(12.0)]);
        assert_eq!(fields[&SECOND], vec![Value::Numeric(56.0)]);
    }

    #[test]
    fn longwave_radiation_queues_both_periods_in_order() {
        let mut station = sample_station();
        station
            .series
            .insert(
                "integral_wrt_time_of_surface_downwelling_longwave_flux_in_air:sum:PT1H"
                    .to_string(),
                vec![Some(100.0)],
            );
        station.series.insert(
            "integral_wrt_time_of_surface_downwelling_longwave_flux_in_air:sum:PT12H"
                .to_string(),
            vec![Some(200.0)],
        );
        let oscar = OscarDirectory::new();
        let subsets = build_subset_values(&[station], &oscar);
        assert_eq!(
            subsets[0][&LONGWAVE_RADIATION],
            vec![Value::Numeric(100.0), Value::Numeric(200.0)]
        );
        assert_eq!(subsets[0][&LONGWAVE_PERIOD_COUNT], vec![Value::Numeric(2.0)]);
    }
}
