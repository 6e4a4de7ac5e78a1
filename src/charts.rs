//! Static HTML charts: speed over time and the route coloured by speed.
//!
//! Both render to SVG via plotters and are wrapped in a standalone HTML page.
//! The route map needs coordinates; when it cannot be drawn the caller
//! gets an error and the rest of the report is unaffected.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use plotters::prelude::*;

use crate::error::{AnalyzerError, Result};
use crate::types::{seconds_between, ConditionedSample};

pub const SPEED_CHART_FILE: &str = "speed_over_time.html";
pub const ROUTE_MAP_FILE: &str = "route_map.html";

const CHART_SIZE: (u32, u32) = (1280, 720);
const MAP_SIZE: (u32, u32) = (900, 900);

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Write `speed_over_time.html`, and `route_map.html` when the series has
/// coordinates. A failed map is logged and skipped.
pub fn write_charts(
    out_dir: impl AsRef<Path>,
    series: &[ConditionedSample],
) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let speed_path = out_dir.join(SPEED_CHART_FILE);
    fs::write(&speed_path, render_speed_chart(series)?)?;
    let mut written = vec![speed_path];

    match render_route_map(series) {
        Ok(html) => {
            let map_path = out_dir.join(ROUTE_MAP_FILE);
            fs::write(&map_path, html)?;
            written.push(map_path);
        }
        Err(e) => warn!("Route map skipped: {}", e),
    }

    Ok(written)
}

pub fn render_speed_chart(series: &[ConditionedSample]) -> Result<String> {
    let points: Vec<(f64, f64)> = match series.first() {
        Some(first) => series
            .iter()
            .filter_map(|s| {
                s.speed_smooth
                    .map(|v| (seconds_between(first.timestamp, s.timestamp), v))
            })
            .collect(),
        None => Vec::new(),
    };

    let mut svg = String::new();
    draw_speed(&mut svg, &points).map_err(|e| AnalyzerError::Chart(e.to_string()))?;
    Ok(html_page("Speed over Time", &svg))
}

fn draw_speed(svg: &mut String, points: &[(f64, f64)]) -> DrawResult<()> {
    let x_max = points.iter().map(|p| p.0).fold(1.0, f64::max);
    let y_max = points.iter().map(|p| p.1).fold(10.0, f64::max) * 1.1;

    let area = SVGBackend::with_string(svg, CHART_SIZE).into_drawing_area();
    area.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&area)
        .caption("Speed over Time", ("sans-serif", 28))
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Elapsed (s)")
        .y_desc("Smoothed speed (km/h)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        &RGBColor(30, 144, 255),
    ))?;

    area.present()?;
    Ok(())
}

pub fn render_route_map(series: &[ConditionedSample]) -> Result<String> {
    let points: Vec<(f64, f64, f64)> = series
        .iter()
        .filter_map(|s| match (s.longitude, s.latitude) {
            (Some(lon), Some(lat)) => Some((lon, lat, s.speed_smooth.unwrap_or(0.0))),
            _ => None,
        })
        .collect();

    if points.is_empty() {
        return Err(AnalyzerError::Chart(
            "no samples with both latitude and longitude".into(),
        ));
    }

    let mut svg = String::new();
    draw_route(&mut svg, &points).map_err(|e| AnalyzerError::Chart(e.to_string()))?;
    Ok(html_page("Route Map", &svg))
}

fn draw_route(svg: &mut String, points: &[(f64, f64, f64)]) -> DrawResult<()> {
    let (lon_min, lon_max) = padded_range(points.iter().map(|p| p.0));
    let (lat_min, lat_max) = padded_range(points.iter().map(|p| p.1));
    let top_speed = points.iter().map(|p| p.2).fold(1.0, f64::max);

    let area = SVGBackend::with_string(svg, MAP_SIZE).into_drawing_area();
    area.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&area)
        .caption("Route (colour = smoothed speed)", ("sans-serif", 24))
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(lon_min..lon_max, lat_min..lat_max)?;

    chart
        .configure_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .x_label_formatter(&|v| format!("{:.4}", v))
        .y_label_formatter(&|v| format!("{:.4}", v))
        .draw()?;

    chart.draw_series(points.iter().map(|&(lon, lat, speed)| {
        Circle::new((lon, lat), 3, speed_colour(speed / top_speed).filled())
    }))?;

    area.present()?;
    Ok(())
}

/// Blue when stopped through to red at the trip's top speed.
fn speed_colour(fraction: f64) -> HSLColor {
    let fraction = fraction.clamp(0.0, 1.0);
    HSLColor((1.0 - fraction) * 0.66, 0.85, 0.5)
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = ((max - min) * 0.05).max(1e-3);
    (min - pad, max + pad)
}

fn html_page(title: &str, svg: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n{svg}\n</body>\n</html>\n"
    )
}
