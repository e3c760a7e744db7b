//! Coverage-JSON parsing and pivoting (§4.5). Grounded in
//! `covjson2bufr.cpp`'s walk over `coverages[].domain.axes` /
//! `.ranges` / `.parameters`; reimplemented here over `serde_json::Value`
//! rather than a bespoke JSON tree, since the domain inputs are small and
//! the shape is read once per coverage, not hot-path decoded.

use serde_json::Value as Json;

use crate::diagnostics;
use crate::error::{BufrError, Result};

/// One coverage's pivoted content: a single station, every timestep it
/// reports, and per-parameter series aligned 1:1 with `times`.
#[derive(Debug, Clone)]
pub struct StationSeries {
    pub wigos_id: String,
    pub lat: f64,
    pub lon: f64,
    pub times: Vec<String>,
    /// parameter name (as registered in `ranges`) -> one value per time,
    /// `None` where the range reports `null`.
    pub series: std::collections::HashMap<String, Vec<Option<f64>>>,
    /// parameter name -> unit symbol, read from `parameters[name].unit`.
    pub units: std::collections::HashMap<String, String>,
}

/// Parses the top-level `{"coverages": [...]}` document into one
/// [`StationSeries`] per coverage. A coverage that is missing a required
/// field (WIGOS id, domain axes) is skipped with a diagnostic line rather
/// than aborting the whole document — consistent with the table loaders'
/// skip-and-log policy (§7).
pub fn parse_coverage_json(bytes: &[u8]) -> Result<Vec<StationSeries>> {
    let root: Json = serde_json::from_slice(bytes)?;
    let coverages = root
        .get("coverages")
        .and_then(Json::as_array)
        .ok_or_else(|| BufrError::DomainInputError("missing 'coverages' array".to_string()))?;

    let mut out = Vec::with_capacity(coverages.len());
    for (idx, coverage) in coverages.iter().enumerate() {
        match parse_one(coverage) {
            Some(series) => out.push(series),
            None => diagnostics::push(format!(
                "coverages[{idx}]: missing wigosId, domain axes, or unparseable shape, skipped"
            )),
        }
    }
    Ok(out)
}

fn parse_one(coverage: &Json) -> Option<StationSeries> {
    let wigos_id = coverage.get("rodeo:wigosId")?.as_str()?.to_string();
    let axes = coverage.get("domain")?.get("axes")?;
    let lat = first_axis_value(axes, "x")?;
    let lon = first_axis_value(axes, "y")?;
    let times = axes
        .get("t")?
        .get("values")?
        .as_array()?
        .iter()
        .filter_map(Json::as_str)
        .map(str::to_string)
        .collect::<Vec<_>>();
    if times.is_empty() {
        return None;
    }

    let mut units = std::collections::HashMap::new();
    if let Some(params) = coverage.get("parameters").and_then(Json::as_object) {
        for (name, def) in params {
            if let Some(symbol) = unit_symbol(def) {
                units.insert(name.clone(), symbol);
            }
        }
    }

    let mut series = std::collections::HashMap::new();
    if let Some(ranges) = coverage.get("ranges").and_then(Json::as_object) {
        for (name, range) in ranges {
            let Some(values) = range.get("values").and_then(Json::as_array) else {
                continue;
            };
            let parsed: Vec<Option<f64>> = values.iter().map(Json::as_f64).collect();
            series.insert(name.clone(), parsed);
        }
    }

    Some(StationSeries {
        wigos_id,
        lat,
        lon,
        times,
        series,
        units,
    })
}

fn first_axis_value(axes: &Json, name: &str) -> Option<f64> {
    axes.get(name)?.get("values")?.as_array()?.first()?.as_f64()
}

fn unit_symbol(param_def: &Json) -> Option<String> {
    let unit = param_def.get("unit")?;
    if let Some(s) = unit.get("symbol").and_then(Json::as_str) {
        return Some(s.to_string());
    }
    if let Some(s) = unit
        .get("symbol")
        .and_then(|s| s.get("value"))
        .and_then(Json::as_str)
    {
        return Some(s.to_string());
    }
    unit.get("label")
        .and_then(|l| l.get("en"))
        .and_then(Json::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Vec<u8> {
        serde_json::json!({
            "coverages": [{
                "rodeo:wigosId": "0-20000-0-12345",
                "domain": {
                    "domainType": "PointSeries",
                    "axes": {
                        "x": {"values": [52.1]},
                        "y": {"values": [4.3]},
                        "t": {"values": ["2026-07-30T12:00:00Z"]}
                    }
                },
                "parameters": {
                    "air_pressure:0.0:point:PT0S": {"unit": {"symbol": "hPa"}}
                },
                "ranges": {
                    "air_pressure:0.0:point:PT0S": {"values": [1013.25]}
                }
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn parses_single_station_single_time_coverage() {
        let series = parse_coverage_json(&sample_doc()).unwrap();
        assert_eq!(series.len(), 1);
        let s = &series[0];
        assert_eq!(s.wigos_id, "0-20000-0-12345");
        assert_eq!(s.lat, 52.1);
        assert_eq!(s.lon, 4.3);
        assert_eq!(s.times, vec!["2026-07-30T12:00:00Z"]);
        assert_eq!(
            s.series["air_pressure:0.0:point:PT0S"],
            vec![Some(1013.25)]
        );
        assert_eq!(s.units["air_pressure:0.0:point:PT0S"], "hPa");
    }

    #[test]
    fn missing_coverages_key_is_domain_input_error() {
        let err = parse_coverage_json(b"{}").unwrap_err();
        assert!(matches!(err, BufrError::DomainInputError(_)));
    }

    #[test]
    fn coverage_missing_wigos_id_is_skipped_not_fatal() {
        let doc = serde_json::json!({"coverages": [{"domain": {}}]})
            .to_string()
            .into_bytes();
        let series = parse_coverage_json(&doc).unwrap();
        assert!(series.is_empty());
    }
}
