use std::path::Path;

use common::{
    plot::Renderer,
    report::{Panel, Report},
};
use eyre::{Result, bail};
use plotters::{coord::Shift, prelude::*};

/// Draws reports as a grid of stacked bar charts into a bitmap
#[derive(Debug, Default, Clone, Copy)]
pub struct PlottersRenderer;

const BAR_WIDTH: f64 = 0.8;

/// Shared range if the panel has one, otherwise zero to just above the tallest bar
pub(crate) fn y_bounds(panel: &Panel) -> (f64, f64) {
    if let Some(range) = panel.y_range {
        return range;
    }
    let top = if panel.stacked {
        panel.totals().into_iter().fold(0.0, f64::max)
    } else {
        panel
            .series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    };
    (0.0, if top > 0.0 { top * 1.1 } else { 1.0 })
}

/// Bar positions are indices, this maps a tick back to its `hosts` value
pub(crate) fn x_tick_label(x: &[f64], tick: f64) -> String {
    let idx = tick.round();
    if (tick - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    x.get(idx as usize).map(|v| v.to_string()).unwrap_or_default()
}

fn draw_panel(area: &DrawingArea<BitMapBackend<'_>, Shift>, panel: &Panel) -> Result<()> {
    let bars = panel.x.len();
    let (y_min, y_max) = y_bounds(panel);
    let mut chart = ChartBuilder::on(area)
        .caption(&panel.name, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(-0.5f64..(bars.max(1) as f64 - 0.5), y_min..y_max)?;

    let x_formatter = |tick: &f64| x_tick_label(&panel.x, *tick);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.max(1))
        .x_label_formatter(&x_formatter)
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_deref().unwrap_or_default())
        .draw()?;

    let segments = panel.series.len().max(1) as f64;
    let mut bottoms = vec![0.0; bars];
    for (idx, series) in panel.series.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.9);
        let mut rects = Vec::with_capacity(bars);
        for (i, value) in series.values.iter().enumerate() {
            let value = if value.is_finite() { *value } else { 0.0 };
            let center = i as f64;
            let rect = if panel.stacked {
                let bottom = bottoms[i];
                bottoms[i] += value;
                [
                    (center - BAR_WIDTH / 2.0, bottom),
                    (center + BAR_WIDTH / 2.0, bottom + value),
                ]
            } else {
                let width = BAR_WIDTH / segments;
                let left = center - BAR_WIDTH / 2.0 + width * idx as f64;
                [(left, 0.0), (left + width, value)]
            };
            rects.push(Rectangle::new(rect, color.filled()));
        }
        chart
            .draw_series(rects)?
            .label(series.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    if !panel.series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}

impl Renderer for PlottersRenderer {
    fn render(&self, report: &Report, path: &Path) -> Result<()> {
        let (rows, cols) = report.grid;
        if rows == 0 || cols == 0 {
            bail!("Empty {rows}x{cols} grid for {}", report.title);
        }

        let root = BitMapBackend::new(path, report.size).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(&format!("{} ({})", report.title, report.key), ("sans-serif", 24))?;
        let areas = root.split_evenly((rows, cols));
        for panel in &report.panels {
            let (row, col) = panel.cell;
            let Some(area) = areas.get(row * cols + col) else {
                bail!("Panel {} at {:?} is outside the grid", panel.name, panel.cell);
            };
            draw_panel(area, panel)?;
        }
        root.present()?;
        Ok(())
    }
}
