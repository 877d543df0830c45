use std::{collections::HashSet, str::FromStr};

use miette::Diagnostic;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// One hourly sample of a PVGIS `seriescalc` series.
///
/// Field names follow the service's JSON keys. Only `time` and `power` are
/// looked at by the aggregation, the others are carried along as-is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyRecord {
    /// `YYYYMMDD:HHMM`, UTC.
    pub time: String,
    /// AC output in W. `None` when the service sent `null` or omitted it.
    #[serde(rename = "P", default)]
    pub power: Option<f64>,
    /// Global irradiance on the inclined plane, W/m².
    #[serde(rename = "G(i)")]
    pub irradiance: f64,
    /// Sun height, degrees.
    #[serde(rename = "H_sun")]
    pub sun_height: f64,
    /// Air temperature at 2 m, °C.
    #[serde(rename = "T2m")]
    pub temperature: f64,
    /// Wind speed at 10 m, m/s.
    #[serde(rename = "WS10m")]
    pub wind_speed: f64,
    #[serde(rename = "Int")]
    pub incidence_angle: f64,
}

impl HourlyRecord {
    /// A record with the given timestamp and power and zeroed weather fields.
    pub fn with_power(time: impl Into<String>, power: f64) -> Self {
        Self {
            time: time.into(),
            power: Some(power),
            irradiance: 0.0,
            sun_height: 0.0,
            temperature: 0.0,
            wind_speed: 0.0,
            incidence_angle: 0.0,
        }
    }
}

/// Body of a `seriescalc` response requested with `outputformat=json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub inputs: Option<Inputs>,
    pub outputs: Outputs,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Outputs {
    pub hourly: Vec<HourlyRecord>,
}

/// Echo of the request as resolved by the service.
///
/// `mounting_system` and `pv_module` are kept as raw JSON: their layout
/// depends on the tracking type, and they are only compared or read by path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Inputs {
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub meteo_data: Option<MeteoData>,
    #[serde(default)]
    pub mounting_system: Option<Value>,
    #[serde(default)]
    pub pv_module: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeteoData {
    pub radiation_db: String,
    pub year_min: i32,
    pub year_max: i32,
}

#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum MergeError {
    #[error("Series are for different sites: {left:?} and {right:?}")]
    #[diagnostic(
        code(solar_profile::record::merge_location),
        help("only merge downloads made for the same coordinates")
    )]
    Location { left: Location, right: Location },
    #[error("Series are for different mountings: {left} and {right}")]
    #[diagnostic(
        code(solar_profile::record::merge_mounting),
        help("only merge downloads made with the same tracking, tilt and azimuth")
    )]
    Mounting { left: Value, right: Value },
    #[error("Series are for different PV modules: {left} and {right}")]
    #[diagnostic(
        code(solar_profile::record::merge_module),
        help("only merge downloads made with the same technology, peak power and losses")
    )]
    PvModule { left: Value, right: Value },
    #[error("Both series contain the hour {time}")]
    #[diagnostic(
        code(solar_profile::record::merge_overlap),
        help("merge downloads covering distinct years, overlapping ones would count twice")
    )]
    Overlap { time: String },
}

impl SeriesResponse {
    pub fn records(&self) -> &[HourlyRecord] {
        &self.outputs.hourly
    }

    pub fn location(&self) -> Option<Location> {
        self.inputs.as_ref().and_then(|inputs| inputs.location)
    }

    pub fn elevation(&self) -> Option<f64> {
        self.location().map(|location| location.elevation)
    }

    /// First and last year of the simulated period.
    pub fn years(&self) -> Option<(i32, i32)> {
        self.inputs
            .as_ref()
            .and_then(|inputs| inputs.meteo_data.as_ref())
            .map(|meteo| (meteo.year_min, meteo.year_max))
    }

    /// Slope and azimuth of a fixed mounting, in degrees.
    pub fn fixed_angles(&self) -> Option<(f64, f64)> {
        let mounting = self.inputs.as_ref()?.mounting_system.as_ref()?;
        let slope = mounting.pointer("/fixed/slope/value")?.as_f64()?;
        let azimuth = mounting.pointer("/fixed/azimuth/value")?.as_f64()?;

        Some((slope, azimuth))
    }

    /// Appends the records of `other`, e.g. several single-year downloads of
    /// one system. Whatever both describe of the system (location, mounting,
    /// module) must match, and no hour may be present in both.
    pub fn merge(&mut self, mut other: Self) -> Result<(), MergeError> {
        if let (Some(left), Some(right)) = (self.inputs.as_ref(), other.inputs.as_ref()) {
            if let (Some(l), Some(r)) = (left.location, right.location) {
                if l != r {
                    return Err(MergeError::Location { left: l, right: r });
                }
            }
            if let (Some(l), Some(r)) = (&left.mounting_system, &right.mounting_system) {
                if l != r {
                    return Err(MergeError::Mounting {
                        left: l.clone(),
                        right: r.clone(),
                    });
                }
            }
            if let (Some(l), Some(r)) = (&left.pv_module, &right.pv_module) {
                if l != r {
                    return Err(MergeError::PvModule {
                        left: l.clone(),
                        right: r.clone(),
                    });
                }
            }
        }

        let known: HashSet<&str> = self.records().iter().map(|r| r.time.as_str()).collect();
        if let Some(record) = other.records().iter().find(|r| known.contains(r.time.as_str())) {
            return Err(MergeError::Overlap {
                time: record.time.clone(),
            });
        }

        self.outputs.hourly.append(&mut other.outputs.hourly);
        match (&mut self.inputs, other.inputs) {
            (None, inputs) => self.inputs = inputs,
            (Some(mine), Some(theirs)) => mine.absorb(theirs),
            (Some(_), None) => (),
        }

        Ok(())
    }
}

impl Inputs {
    /// Fills what is unknown here from `other` and widens the year range.
    fn absorb(&mut self, other: Inputs) {
        self.location = self.location.or(other.location);
        self.mounting_system = self.mounting_system.take().or(other.mounting_system);
        self.pv_module = self.pv_module.take().or(other.pv_module);
        self.meteo_data = match (self.meteo_data.take(), other.meteo_data) {
            (Some(mut mine), Some(theirs)) => {
                mine.year_min = mine.year_min.min(theirs.year_min);
                mine.year_max = mine.year_max.max(theirs.year_max);
                Some(mine)
            }
            (mine, theirs) => mine.or(theirs),
        };
    }
}

impl FromStr for SeriesResponse {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_service_payload_and_ignores_unknown_keys() {
        let body = r#"{
            "inputs": {
                "location": {"latitude": 45.0, "longitude": 8.0, "elevation": 250.0},
                "meteo_data": {"radiation_db": "PVGIS-SARAH3", "year_min": 2023, "year_max": 2023, "use_horizon": true},
                "mounting_system": {"fixed": {"slope": {"value": 35}}}
            },
            "outputs": {
                "hourly": [
                    {"time": "20230101:0010", "P": 0.0, "G(i)": 0.0, "H_sun": 0.0, "T2m": 3.12, "WS10m": 1.24, "Int": 0.0},
                    {"time": "20230101:1210", "P": 512.3, "G(i)": 601.2, "H_sun": 21.8, "T2m": 7.5, "WS10m": 2.1, "Int": 0.0, "extra": 1}
                ]
            },
            "meta": {"inputs": {}, "outputs": {}}
        }"#;

        let response: SeriesResponse = body.parse().unwrap();
        assert_eq!(response.elevation(), Some(250.0));
        assert_eq!(
            response.inputs.as_ref().and_then(|i| i.meteo_data.as_ref()).map(|m| m.radiation_db.as_str()),
            Some("PVGIS-SARAH3")
        );

        assert_eq!(response.fixed_angles(), None);

        let records = response.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].time, "20230101:1210");
        assert_eq!(records[1].power, Some(512.3));
        assert_eq!(records[1].irradiance, 601.2);
        assert_eq!(records[1].sun_height, 21.8);
        assert_eq!(records[1].temperature, 7.5);
        assert_eq!(records[1].wind_speed, 2.1);
    }

    #[test]
    fn null_or_missing_power_decodes_as_absent() {
        let body = r#"{"outputs": {"hourly": [
            {"time": "20230101:0010", "P": null, "G(i)": 0.0, "H_sun": 0.0, "T2m": 3.1, "WS10m": 1.2, "Int": 0.0},
            {"time": "20230101:0110", "G(i)": 0.0, "H_sun": 0.0, "T2m": 3.0, "WS10m": 1.1, "Int": 0.0}
        ]}}"#;

        let response: SeriesResponse = body.parse().unwrap();
        assert_eq!(response.inputs, None);
        assert_eq!(response.elevation(), None);
        assert!(response.records().iter().all(|record| record.power.is_none()));
    }

    fn one_record(location: &str, time: &str) -> SeriesResponse {
        format!(
            r#"{{{location}"outputs": {{"hourly": [{{"time": "{time}", "P": 1.0, "G(i)": 0.0, "H_sun": 0.0, "T2m": 0.0, "WS10m": 0.0, "Int": 0.0}}]}}}}"#
        )
        .parse()
        .unwrap()
    }

    #[test]
    fn merges_downloads_of_the_same_site() {
        let here = r#""inputs": {"location": {"latitude": 45.0, "longitude": 8.0, "elevation": 250.0}},"#;
        let mut merged = one_record("", "20220601:1210");
        merged.merge(one_record(here, "20230601:1210")).unwrap();
        merged.merge(one_record(here, "20240601:1210")).unwrap();

        assert_eq!(merged.elevation(), Some(250.0));
        let times: Vec<&str> = merged.records().iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, ["20220601:1210", "20230601:1210", "20240601:1210"]);

        let elsewhere = r#""inputs": {"location": {"latitude": 46.0, "longitude": 8.0, "elevation": 900.0}},"#;
        assert!(matches!(
            merged.merge(one_record(elsewhere, "20230601:1210")),
            Err(MergeError::Location { .. })
        ));
        assert_eq!(merged.records().len(), 3);
    }

    fn with_inputs(inputs: &str, times: &[&str]) -> SeriesResponse {
        let hourly: Vec<String> = times
            .iter()
            .map(|time| {
                format!(
                    r#"{{"time": "{time}", "P": 1.0, "G(i)": 0.0, "H_sun": 0.0, "T2m": 0.0, "WS10m": 0.0, "Int": 0.0}}"#
                )
            })
            .collect();
        format!(r#"{{"inputs": {inputs}, "outputs": {{"hourly": [{}]}}}}"#, hourly.join(","))
            .parse()
            .unwrap()
    }

    const FIXED_25: &str = r#"{"fixed": {"slope": {"value": 25, "optimal": false}, "azimuth": {"value": -10, "optimal": false}, "type": "free-standing"}}"#;
    const FIXED_40: &str = r#"{"fixed": {"slope": {"value": 40, "optimal": false}, "azimuth": {"value": -10, "optimal": false}, "type": "free-standing"}}"#;
    const CRYST_SI: &str = r#"{"technology": "c-Si", "peak_power": 1.0, "system_loss": 14.0}"#;
    const CDTE: &str = r#"{"technology": "CdTe", "peak_power": 1.0, "system_loss": 14.0}"#;

    #[test]
    fn reads_fixed_mounting_angles() {
        let response = with_inputs(&format!(r#"{{"mounting_system": {FIXED_25}}}"#), &[]);
        assert_eq!(response.fixed_angles(), Some((25.0, -10.0)));

        let tracker = with_inputs(
            r#"{"mounting_system": {"two_axis": {"type": "free-standing"}}}"#,
            &[],
        );
        assert_eq!(tracker.fixed_angles(), None);
    }

    #[test]
    fn refuses_to_merge_other_mountings() {
        let mut merged = with_inputs(&format!(r#"{{"mounting_system": {FIXED_25}}}"#), &["20220601:1210"]);
        let steeper = with_inputs(&format!(r#"{{"mounting_system": {FIXED_40}}}"#), &["20230601:1210"]);

        assert!(matches!(merged.merge(steeper), Err(MergeError::Mounting { .. })));
        assert_eq!(merged.records().len(), 1);
    }

    #[test]
    fn refuses_to_merge_other_modules() {
        let mut merged = with_inputs(&format!(r#"{{"pv_module": {CRYST_SI}}}"#), &["20220601:1210"]);
        let thin_film = with_inputs(&format!(r#"{{"pv_module": {CDTE}}}"#), &["20230601:1210"]);

        assert!(matches!(merged.merge(thin_film), Err(MergeError::PvModule { .. })));
        assert_eq!(merged.records().len(), 1);
    }

    #[test]
    fn refuses_to_count_an_hour_twice() {
        let mut merged = with_inputs("{}", &["20230601:1010", "20230601:1110"]);
        let again = with_inputs("{}", &["20230602:1010", "20230601:1110"]);

        assert_eq!(
            merged.merge(again),
            Err(MergeError::Overlap {
                time: String::from("20230601:1110")
            })
        );
        assert_eq!(merged.records().len(), 2);
    }

    #[test]
    fn merged_years_span_every_download() {
        let inputs = |year: i32| {
            format!(
                r#"{{"meteo_data": {{"radiation_db": "PVGIS-SARAH3", "year_min": {year}, "year_max": {year}}}, "mounting_system": {FIXED_25}, "pv_module": {CRYST_SI}}}"#
            )
        };
        let mut merged = with_inputs(&inputs(2022), &["20220601:1210"]);
        merged.merge(with_inputs(&inputs(2020), &["20200601:1210"])).unwrap();
        merged.merge(with_inputs(&inputs(2023), &["20230601:1210"])).unwrap();

        assert_eq!(merged.years(), Some((2020, 2023)));
        assert_eq!(merged.fixed_angles(), Some((25.0, -10.0)));
        assert_eq!(merged.records().len(), 3);
    }

    #[test]
    fn missing_outputs_is_a_decode_error() {
        assert!("{}".parse::<SeriesResponse>().is_err());
        assert!(r#"{"message": "Location over the sea"}"#.parse::<SeriesResponse>().is_err());
    }
}
