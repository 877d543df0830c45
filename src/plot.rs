use std::path::Path;

use miette::Diagnostic;
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use thiserror::Error;
use tracing::info;

use crate::profile::MonthlyProfile;

const SIZE: (u32, u32) = (1600, 900);
const HEADER_HEIGHT: u32 = 160;

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("Could not draw {path}: {reason}")]
    #[diagnostic(
        code(solar_profile::plot::draw),
        help("check that the output directory exists and the extension is svg, png, jpg or bmp")
    )]
    Draw { path: String, reason: String },
}

/// Texts printed above the chart. Every one is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartLabels {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub tilt: Option<f64>,
    pub azimuth: Option<f64>,
}

impl ChartLabels {
    /// `Tilt: 35° | Azimuth: -10°`, with whichever angles are known.
    pub fn info_line(&self) -> Option<String> {
        let parts: Vec<String> = [
            self.tilt.map(|tilt| format!("Tilt: {tilt}°")),
            self.azimuth.map(|azimuth| format!("Azimuth: {azimuth}°")),
        ]
        .into_iter()
        .flatten()
        .collect();

        (!parts.is_empty()).then(|| parts.join(" | "))
    }
}

/// Draws the profile as a line chart, in SVG when `path` ends with `.svg` and
/// as a bitmap otherwise.
pub fn render(profile: &MonthlyProfile, labels: &ChartLabels, path: &Path) -> Result<(), RenderError> {
    let is_svg = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("svg"));

    let drawn = if is_svg {
        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        draw(&root, profile, labels).map_err(|e| e.to_string())
    } else {
        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        draw(&root, profile, labels).map_err(|e| e.to_string())
    };

    drawn.map_err(|reason| RenderError::Draw {
        path: path.display().to_string(),
        reason,
    })?;
    info!(path = %path.display(), "chart written");

    Ok(())
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    profile: &MonthlyProfile,
    labels: &ChartLabels,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    let (header, body) = root.split_vertically(HEADER_HEIGHT);

    let center = (header.dim_in_pixel().0 / 2) as i32;
    let centered = Pos::new(HPos::Center, VPos::Top);
    let lines = [
        (labels.title.clone(), 48, 10),
        (labels.subtitle.clone(), 32, 70),
        (labels.info_line(), 26, 115),
    ];
    for (text, size, y) in lines {
        if let Some(text) = text {
            let style = TextStyle::from(("sans-serif", size).into_font()).pos(centered);
            header.draw_text(&text, &style, (center, y))?;
        }
    }

    let mut chart = ChartBuilder::on(&body)
        .margin(20)
        .x_label_area_size(70)
        .y_label_area_size(100)
        .build_cartesian_2d(0i32..23i32, 0f64..value_ceiling(profile))?;

    chart
        .configure_mesh()
        .x_labels(24)
        .x_desc("Hour of day")
        .y_desc("Average power (W)")
        .axis_desc_style(("sans-serif", 28))
        .label_style(("sans-serif", 22))
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    chart.draw_series(LineSeries::new(
        profile.hourly().map(|(hour, value)| (hour as i32, value)),
        BLUE.stroke_width(3),
    ))?;
    chart.draw_series(
        profile
            .hourly()
            .map(|(hour, value)| Circle::new((hour as i32, value), 4, BLUE.filled())),
    )?;

    root.present()?;

    Ok(())
}

/// Upper bound of the y axis: 10% of headroom above the peak, or 1 W for a
/// profile without any production.
fn value_ceiling(profile: &MonthlyProfile) -> f64 {
    let (_, peak) = profile.peak();
    if peak > 0.0 {
        peak * 1.1
    } else {
        1.0
    }
}
