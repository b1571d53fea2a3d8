//! Rendering a [`CompositeFigure`](super::CompositeFigure) to a PNG artifact.
//!
//! This is the only module that touches the plotting backend. Everything it
//! draws comes pre-assembled from the figure builder; rendering adds no data
//! decisions beyond axis padding and styling.

use std::ops::Range;
use std::path::{Path, PathBuf};

use log::info;
use plotters::prelude::*;
use thiserror::Error;

use super::color::metallicity_rgb;
use super::CompositeFigure;

const FIGURE_WIDTH: u32 = 1200;
const FIGURE_HEIGHT: u32 = 1500;

/// Errors raised while rendering an artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The output directory could not be created.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    /// The drawing backend reported a failure.
    #[error("Drawing failed for '{identifier}': {reason}")]
    Draw { identifier: String, reason: String },
}

/// Render `figure` to a PNG under `output_dir`.
///
/// The filename derives deterministically from the stellar identifier. The
/// file appears only after a fully successful render; a failed render leaves
/// nothing behind.
pub fn save_png(figure: &CompositeFigure, output_dir: &Path) -> Result<PathBuf, RenderError> {
    std::fs::create_dir_all(output_dir).map_err(|source| RenderError::OutputDir {
        path: output_dir.display().to_string(),
        source,
    })?;

    let path = output_dir.join(figure.artifact_filename());
    let tmp = path.with_extension("png.part");

    let result = draw(&tmp, figure).and_then(|()| {
        std::fs::rename(&tmp, &path).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    });

    match result {
        Ok(()) => {
            info!("Wrote {}", path.display());
            Ok(path)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(RenderError::Draw {
                identifier: figure.identifier.clone(),
                reason: e.to_string(),
            })
        }
    }
}

fn draw(path: &Path, figure: &CompositeFigure) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (FIGURE_WIDTH, FIGURE_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.margin(10, 10, 10, 10);

    let panel_height = (FIGURE_HEIGHT as i32 - 20) / 3;
    if let Some(population) = &figure.population {
        let (top, rest) = root.split_vertically(panel_height);
        let (middle, bottom) = rest.split_vertically(panel_height);
        draw_population_panel(&top, figure, population)?;
        draw_spectrum_panel(&middle, figure)?;
        draw_light_curve_panel(&bottom, figure)?;
    } else {
        let (top, bottom) = root.split_vertically((FIGURE_HEIGHT as i32 - 20) / 2);
        draw_spectrum_panel(&top, figure)?;
        draw_light_curve_panel(&bottom, figure)?;
    }

    root.present()?;
    Ok(())
}

fn draw_population_panel(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    figure: &CompositeFigure,
    panel: &super::PopulationPanel,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = &panel.catalog;
    let target = &panel.target;

    let teff_range = padded(bounds_with(
        catalog.teff_k.iter().copied(),
        target.teff_k,
    ));
    let logg_range = padded(bounds_with(catalog.logg.iter().copied(), target.logg));

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{}: population context ([M/H] color scale -1.0..0.5)", figure.identifier),
            ("sans-serif", 28).into_font().color(&BLACK),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(teff_range, logg_range)?;

    chart
        .configure_mesh()
        .x_desc("Effective temperature (K)")
        .y_desc("log g")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .draw()?;

    chart.draw_series((0..catalog.len()).map(|i| {
        let (r, g, b) = metallicity_rgb(catalog.m_h[i]);
        Circle::new(
            (catalog.teff_k[i], catalog.logg[i]),
            3,
            RGBColor(r, g, b).filled(),
        )
    }))?;

    // Target star as a distinguished marker on top of the population
    chart.draw_series(std::iter::once(Cross::new(
        (target.teff_k, target.logg),
        10,
        BLACK.stroke_width(3),
    )))?;

    Ok(())
}

fn draw_spectrum_panel(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    figure: &CompositeFigure,
) -> Result<(), Box<dyn std::error::Error>> {
    let panel = &figure.spectrum;
    let x_range = padded(panel.wavelength_bounds);
    let y_range = padded(panel.flux_bounds);

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{}: APOGEE combined spectrum", figure.identifier),
            ("sans-serif", 28).into_font().color(&BLACK),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Wavelength (Å)")
        .y_desc("Flux")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .draw()?;

    // One line series per contiguous run keeps masked pixels as gaps
    for (i, run) in panel.runs.iter().enumerate() {
        let observed = chart.draw_series(LineSeries::new(
            run.wavelengths
                .iter()
                .zip(run.observed.iter())
                .map(|(&w, &f)| (w, f)),
            BLUE,
        ))?;
        if i == 0 {
            observed.label("Observed").legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2))
            });
        }

        let model = chart.draw_series(LineSeries::new(
            run.wavelengths
                .iter()
                .zip(run.model.iter())
                .map(|(&w, &f)| (w, f)),
            RED,
        ))?;
        if i == 0 {
            model.label("Model fit").legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2))
            });
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .draw()?;

    Ok(())
}

fn draw_light_curve_panel(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    figure: &CompositeFigure,
) -> Result<(), Box<dyn std::error::Error>> {
    let panel = &figure.light_curve;
    let x_range = padded(panel.time_bounds);
    let y_range = padded(panel.flux_bounds);
    let (y_lo, y_hi) = (y_range.start, y_range.end);

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{}: TESS light curve", figure.identifier),
            ("sans-serif", 28).into_font().color(&BLACK),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Time (days)")
        .y_desc("Flux")
        .axis_desc_style(("sans-serif", 18))
        .label_style(("sans-serif", 14))
        .draw()?;

    // Whole-day reference gridlines
    for &day in &panel.gridlines {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(day, y_lo), (day, y_hi)],
            RGBColor(160, 160, 160),
        )))?;
    }

    chart.draw_series(LineSeries::new(panel.samples.iter().copied(), BLUE))?;
    chart.draw_series(
        panel
            .samples
            .iter()
            .map(|&(t, f)| Circle::new((t, f), 2, BLUE.filled())),
    )?;

    Ok(())
}

/// Bounds over `values` extended to include `extra`.
fn bounds_with(values: impl Iterator<Item = f64>, extra: f64) -> (f64, f64) {
    values
        .chain(std::iter::once(extra))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Pad a closed interval by 5% on each side for axis ranges.
///
/// Degenerate intervals (single value) widen by a fixed fraction of the
/// value's magnitude so the chart always has a drawable span.
fn padded((lo, hi): (f64, f64)) -> Range<f64> {
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        lo.abs().max(1.0) * 0.05
    };
    (lo - pad)..(hi + pad)
}
