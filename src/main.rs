use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{ArgAction, Parser};
use miette::{IntoDiagnostic, Result, WrapErr};
use solar_profile::{
    aggregate, render, source::DEFAULT_BASE_URL, ChartLabels, HourlyRecord, JsonFileSource,
    MonthlyProfile, PvTechnology, PvgisSource, RecordSource, SeriesRequest, SeriesResponse,
    SourceError, TrackingMode,
};
use time::Month;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Plot the average hourly production of a PV system for one month, via PVGIS.
#[derive(Debug, Parser)]
#[command(name = "solar-profile", version, about, allow_negative_numbers = true)]
struct Cli {
    /// Latitude in decimal degrees, south negative
    latitude: f64,
    /// Longitude in decimal degrees, west negative
    longitude: f64,
    /// Month (1-12) to average over
    #[arg(value_parser = clap::value_parser!(u8).range(1..=12))]
    month: u8,
    /// Mounting: 0 or fixed, 1 or single-axis, 2 or dual-axis
    tracking: TrackingMode,

    /// Tilt angle in degrees (0-90), required for fixed mounting
    #[arg(long)]
    tilt: Option<f64>,
    /// Azimuth in degrees (-180 to 180, 0 = south, east negative), required for fixed mounting
    #[arg(long)]
    azimuth: Option<f64>,
    /// Installed peak power in kWp, the unit-peak simulation is scaled by it
    #[arg(long, default_value_t = 1.0, value_parser = positive)]
    peak_power: f64,
    /// System losses in percent
    #[arg(long, default_value_t = solar_profile::request::DEFAULT_LOSS)]
    loss: f64,
    #[arg(long, default_value_t = solar_profile::request::DEFAULT_YEAR)]
    start_year: i32,
    #[arg(long, default_value_t = solar_profile::request::DEFAULT_YEAR)]
    end_year: i32,
    /// PV technology: crystSi, CIS, CdTe or Unknown
    #[arg(long, default_value_t = PvTechnology::default())]
    technology: PvTechnology,
    /// Radiation database
    #[arg(long, default_value = solar_profile::request::DEFAULT_RADIATION_DATABASE)]
    database: String,

    /// PVGIS API root
    #[arg(long, env = "PVGIS_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
    /// Read saved seriescalc JSON responses instead of calling PVGIS, repeat to merge several.
    /// Labels then come from the saved system description, and --tilt/--azimuth are optional
    #[arg(long)]
    input: Vec<PathBuf>,
    /// Save the raw JSON response fetched from PVGIS to this file
    #[arg(long)]
    save_raw: Option<PathBuf>,
    /// Write the chart to this file (.svg, otherwise bitmap). Without it only the hourly table is printed
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the first N hourly records as received
    #[arg(long, value_name = "N")]
    preview: Option<usize>,

    /// More logs on stderr, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn series_request(&self) -> SeriesRequest {
        SeriesRequest {
            start_year: self.start_year,
            end_year: self.end_year,
            loss: self.loss,
            technology: self.technology,
            radiation_database: self.database.clone(),
            ..SeriesRequest::new(self.latitude, self.longitude, self.tracking)
                .with_angles(self.tilt, self.azimuth)
        }
    }

    /// Installed capacity, applied to the unit-peak simulation.
    fn scale_factor(&self) -> f64 {
        self.peak_power
    }

    /// Fetches from PVGIS, or merges the saved responses given with `--input`.
    fn load_response(&self) -> Result<SeriesResponse> {
        if self.input.is_empty() {
            let request = self.series_request();
            request.validate()?;
            debug!(?request, "series request");

            let timeout = Duration::from_secs(self.timeout);
            let source = PvgisSource::with_base_url(&self.api_url, timeout, request);
            return load(&source, self.save_raw.as_deref());
        }

        if self.save_raw.is_some() {
            warn!("--save-raw only applies to responses fetched from PVGIS");
        }
        let mut response = SeriesResponse::default();
        for path in &self.input {
            response
                .merge(load(&JsonFileSource::new(path), None)?)
                .wrap_err_with(|| format!("Could not merge {}", path.display()))?;
        }

        Ok(response)
    }

    /// Chart header. What the response says about the system wins over the
    /// command line, since saved responses may come from another query.
    fn labels(&self, response: &SeriesResponse) -> ChartLabels {
        let month = Month::try_from(self.month)
            .map(|month| month.to_string())
            .unwrap_or_else(|_| self.month.to_string());
        let (start, end) = response.years().unwrap_or((self.start_year, self.end_year));
        let years = if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        };
        let (latitude, longitude) = response
            .location()
            .map_or((self.latitude, self.longitude), |l| (l.latitude, l.longitude));
        let (tilt, azimuth) = response
            .fixed_angles()
            .map_or((self.tilt, self.azimuth), |(tilt, azimuth)| (Some(tilt), Some(azimuth)));

        let mut subtitle = format!(
            "{latitude:.3}°, {longitude:.3}° | {} | {} kWp",
            self.tracking,
            self.scale_factor()
        );
        if let Some(elevation) = response.elevation() {
            subtitle.push_str(&format!(" | {elevation} m"));
        }

        ChartLabels {
            title: Some(format!("Average hourly PV production, {month} {years}")),
            subtitle: Some(subtitle),
            tilt,
            azimuth,
        }
    }
}

fn positive(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(value) if value > 0.0 && value.is_finite() => Ok(value),
        Ok(value) => Err(format!("{value} is not a positive number")),
        Err(e) => Err(e.to_string()),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_preview(records: &[HourlyRecord], count: usize) {
    println!("{:>20} | {:>10} | {:>11} | {:>8}", "Time", "P [W]", "G(i) [W/m²]", "T2m [°C]");
    println!("{}", "-".repeat(60));
    for record in records.iter().take(count) {
        let power = record
            .power
            .map(|power| format!("{power:.2}"))
            .unwrap_or_else(|| String::from("---"));
        println!(
            "{:>20} | {:>10} | {:>11.1} | {:>8.1}",
            record.time, power, record.irradiance, record.temperature
        );
    }
    println!();
}

fn print_profile(profile: &MonthlyProfile) {
    println!("Hour | Avg power [W]");
    println!("-----+--------------");
    for (hour, value) in profile.hourly() {
        println!("  {hour:02} | {value:>13.2}");
    }
    let (peak_hour, peak) = profile.peak();
    println!();
    println!("Peak: {peak:.2} W at {peak_hour:02}:00 UTC");
    println!("Average day: {:.3} kWh", profile.daily_energy() / 1000.0);
}

fn load(source: &dyn RecordSource, save_raw: Option<&Path>) -> Result<SeriesResponse> {
    let raw = source.fetch_raw()?;
    if let Some(path) = save_raw {
        fs::write(path, &raw)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not save the response to {}", path.display()))?;
        info!(path = %path.display(), "raw response saved");
    }

    Ok(raw.parse::<SeriesResponse>().map_err(SourceError::Decode)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let response = cli.load_response()?;
    info!(records = response.records().len(), "hourly records decoded");

    if let Some(count) = cli.preview {
        print_preview(response.records(), count);
    }

    let profile = aggregate(response.records(), cli.month, cli.scale_factor());
    if profile.is_all_zero() {
        warn!(month = cli.month, "no production found for the selected month");
    }
    print_profile(&profile);

    match &cli.output {
        Some(output) => render(&profile, &cli.labels(&response), output)?,
        None => info!("no --output given, chart not written"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("solar-profile").chain(args.iter().copied())).unwrap()
    }

    fn fixture() -> String {
        format!("{}/tests/fixtures/seriescalc_45_8.json", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn arguments_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn peak_power_must_be_positive() {
        assert_eq!(positive("2.5"), Ok(2.5));
        assert!(positive("0").is_err());
        assert!(positive("-1").is_err());
        assert!(positive("NaN").is_err());
        assert!(positive("inf").is_err());
        assert!(positive("kWp").is_err());

        assert!(Cli::try_parse_from(["solar-profile", "45", "8", "6", "2", "--peak-power", "0"]).is_err());
        assert!(Cli::try_parse_from(["solar-profile", "45", "8", "6", "2", "--peak-power", "-3"]).is_err());
    }

    #[test]
    fn peak_power_scales_instead_of_being_queried() {
        let cli = cli(&["45", "8", "6", "fixed", "--tilt", "25", "--azimuth", "0", "--peak-power", "5"]);
        let request = cli.series_request();

        assert_eq!(request.peak_power, 1.0);
        assert_eq!(request.tilt, Some(25.0));
        assert_eq!(cli.scale_factor(), 5.0);
        assert!(request.query_pairs().contains(&("peakpower", String::from("1"))));
    }

    #[test]
    fn labels_from_the_command_line() {
        let single = cli(&["45", "8", "6", "dual-axis", "--peak-power", "5"]);
        let labels = single.labels(&SeriesResponse::default());
        assert_eq!(
            labels.title.as_deref(),
            Some("Average hourly PV production, June 2023")
        );
        assert_eq!(
            labels.subtitle.as_deref(),
            Some("45.000°, 8.000° | Dual-axis tracking | 5 kWp")
        );
        assert_eq!((labels.tilt, labels.azimuth), (None, None));

        let range = cli(&["45", "8", "12", "1", "--start-year", "2020", "--end-year", "2022"]);
        assert_eq!(
            range.labels(&SeriesResponse::default()).title.as_deref(),
            Some("Average hourly PV production, December 2020-2022")
        );
    }

    #[test]
    fn labels_prefer_what_the_response_describes() {
        let cli = cli(&["45.2", "8.1", "6", "fixed", "--tilt", "40", "--azimuth", "10"]);
        let response: SeriesResponse = r#"{
            "inputs": {
                "location": {"latitude": 45.0, "longitude": 8.0, "elevation": 250.0},
                "meteo_data": {"radiation_db": "PVGIS-SARAH3", "year_min": 2005, "year_max": 2020},
                "mounting_system": {"fixed": {"slope": {"value": 25, "optimal": false}, "azimuth": {"value": -5, "optimal": false}}}
            },
            "outputs": {"hourly": []}
        }"#
        .parse()
        .unwrap();

        let labels = cli.labels(&response);
        assert_eq!(
            labels.title.as_deref(),
            Some("Average hourly PV production, June 2005-2020")
        );
        assert_eq!(
            labels.subtitle.as_deref(),
            Some("45.000°, 8.000° | Fixed | 1 kWp | 250 m")
        );
        assert_eq!((labels.tilt, labels.azimuth), (Some(25.0), Some(-5.0)));
    }

    #[test]
    fn saved_responses_need_no_angles() {
        let fixture = fixture();
        let cli = cli(&["--input", &fixture, "45", "8", "6", "fixed"]);

        let response = cli.load_response().unwrap();
        assert_eq!(response.records().len(), 74);

        let labels = cli.labels(&response);
        assert_eq!((labels.tilt, labels.azimuth), (Some(25.0), Some(0.0)));
    }

    #[test]
    fn the_same_saved_response_twice_is_refused() {
        let fixture = fixture();
        let cli = cli(&["--input", &fixture, "--input", &fixture, "45", "8", "6", "fixed"]);

        assert!(cli.load_response().is_err());
    }

    #[test]
    fn output_help_says_what_happens_without_it() {
        let command = Cli::command();
        let output = command
            .get_arguments()
            .find(|arg| arg.get_id() == "output")
            .unwrap();

        let help = output.get_help().unwrap().to_string();
        assert!(help.contains("only the hourly table is printed"), "{help}");
    }
}
