use std::{fmt, str::FromStr};

use miette::Diagnostic;
use thiserror::Error;

pub const DEFAULT_YEAR: i32 = 2023;
pub const DEFAULT_LOSS: f64 = 14.0;
pub const DEFAULT_RADIATION_DATABASE: &str = "PVGIS-SARAH3";

/// How the array is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    Fixed,
    SingleAxis,
    DualAxis,
}

impl TrackingMode {
    /// User-facing codes, as accepted on the command line: 0, 1 or 2.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Fixed),
            1 => Some(Self::SingleAxis),
            2 => Some(Self::DualAxis),
            _ => None,
        }
    }

    /// Value of the PVGIS `trackingtype` parameter.
    pub fn pvgis_code(self) -> u8 {
        match self {
            Self::Fixed => 0,
            Self::SingleAxis => 1,
            Self::DualAxis => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fixed => "Fixed",
            Self::SingleAxis => "Single-axis tracking",
            Self::DualAxis => "Dual-axis tracking",
        }
    }

    /// Fixed arrays need both a tilt and an azimuth, trackers orient themselves.
    pub fn requires_angles(self) -> bool {
        self == Self::Fixed
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "fixed" => Some(Self::Fixed),
            "single-axis" => Some(Self::SingleAxis),
            "dual-axis" => Some(Self::DualAxis),
            code => code.parse().ok().and_then(Self::from_code),
        };

        mode.ok_or_else(|| {
            format!("Unknown tracking mode {s}. Expecting 0 (fixed), 1 (single-axis) or 2 (dual-axis)")
        })
    }
}

/// PV module technology, as named by the `pvtechchoice` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PvTechnology {
    #[default]
    CrystallineSilicon,
    Cis,
    CdTe,
    Unknown,
}

impl PvTechnology {
    pub fn pvgis_name(self) -> &'static str {
        match self {
            Self::CrystallineSilicon => "crystSi",
            Self::Cis => "CIS",
            Self::CdTe => "CdTe",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PvTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pvgis_name())
    }
}

impl FromStr for PvTechnology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crystSi" => Ok(Self::CrystallineSilicon),
            "CIS" => Ok(Self::Cis),
            "CdTe" => Ok(Self::CdTe),
            "Unknown" => Ok(Self::Unknown),
            s => Err(format!(
                "Unknown PV technology {s}. Expecting crystSi, CIS, CdTe or Unknown"
            )),
        }
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum RequestError {
    #[error("{tracking} mounting needs a {angle} angle")]
    #[diagnostic(
        code(solar_profile::request::missing_angle),
        help("pass --tilt and --azimuth, or pick a tracking mode")
    )]
    MissingAngle {
        tracking: TrackingMode,
        angle: &'static str,
    },
    #[error("{name} must be within {min}..={max}, got {value}")]
    #[diagnostic(code(solar_profile::request::out_of_range))]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("start year {start} is after end year {end}")]
    #[diagnostic(code(solar_profile::request::years))]
    Years { start: i32, end: i32 },
}

/// Everything PVGIS needs to simulate the hourly output of one PV system.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub tracking: TrackingMode,
    /// Degrees from horizontal, 0-90.
    pub tilt: Option<f64>,
    /// Degrees from south, east negative, -180..=180.
    pub azimuth: Option<f64>,
    pub start_year: i32,
    pub end_year: i32,
    /// Nominal power in kWp.
    pub peak_power: f64,
    /// System losses in percent.
    pub loss: f64,
    pub technology: PvTechnology,
    pub radiation_database: String,
}

impl SeriesRequest {
    /// A unit-peak-power request for one year of data with the usual defaults.
    pub fn new(latitude: f64, longitude: f64, tracking: TrackingMode) -> Self {
        Self {
            latitude,
            longitude,
            tracking,
            tilt: None,
            azimuth: None,
            start_year: DEFAULT_YEAR,
            end_year: DEFAULT_YEAR,
            peak_power: 1.0,
            loss: DEFAULT_LOSS,
            technology: PvTechnology::default(),
            radiation_database: DEFAULT_RADIATION_DATABASE.to_string(),
        }
    }

    pub fn with_angles(mut self, tilt: Option<f64>, azimuth: Option<f64>) -> Self {
        self.tilt = tilt;
        self.azimuth = azimuth;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        if let Some(tilt) = self.tilt {
            check_range("tilt", tilt, 0.0, 90.0)?;
        }
        if let Some(azimuth) = self.azimuth {
            check_range("azimuth", azimuth, -180.0, 180.0)?;
        }
        check_range("loss", self.loss, 0.0, 100.0)?;
        if !(self.peak_power > 0.0 && self.peak_power.is_finite()) {
            return Err(RequestError::OutOfRange {
                name: "peak power",
                value: self.peak_power,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        if self.start_year > self.end_year {
            return Err(RequestError::Years {
                start: self.start_year,
                end: self.end_year,
            });
        }

        if self.tracking.requires_angles() {
            if self.tilt.is_none() {
                return Err(RequestError::MissingAngle {
                    tracking: self.tracking,
                    angle: "tilt",
                });
            }
            if self.azimuth.is_none() {
                return Err(RequestError::MissingAngle {
                    tracking: self.tracking,
                    angle: "azimuth",
                });
            }
        }

        Ok(())
    }

    /// Query string parameters of the `seriescalc` call.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
            ("trackingtype", self.tracking.pvgis_code().to_string()),
        ];
        if let Some(tilt) = self.tilt {
            pairs.push(("angle", tilt.to_string()));
        }
        if let Some(azimuth) = self.azimuth {
            pairs.push(("aspect", azimuth.to_string()));
        }
        pairs.extend([
            ("startyear", self.start_year.to_string()),
            ("endyear", self.end_year.to_string()),
            ("pvcalculation", "1".to_string()),
            ("peakpower", self.peak_power.to_string()),
            ("loss", self.loss.to_string()),
            ("pvtechchoice", self.technology.pvgis_name().to_string()),
            ("raddatabase", self.radiation_database.clone()),
            ("outputformat", "json".to_string()),
        ]);
        pairs
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), RequestError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RequestError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
