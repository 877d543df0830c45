//! Average daily production curve of a photovoltaic system for one month,
//! built from the hourly series simulated by PVGIS.

pub mod plot;
pub mod profile;
pub mod record;
pub mod request;
pub mod source;
pub mod timestamp;

pub use plot::{render, ChartLabels, RenderError};
pub use profile::{aggregate, MonthlyProfile, HOURS_PER_DAY};
pub use record::{HourlyRecord, MergeError, SeriesResponse};
pub use request::{PvTechnology, RequestError, SeriesRequest, TrackingMode};
pub use source::{JsonFileSource, PvgisSource, RecordSource, SourceError};
pub use timestamp::TimestampError;
