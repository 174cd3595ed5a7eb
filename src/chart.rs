use std::fmt::Display;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;

use crate::backtest::ChartSeries;

const SIZE: (u32, u32) = (1280, 640);

fn draw_err(e: impl Display) -> anyhow::Error {
    anyhow!("chart drawing failed: {}", e)
}

fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(1e-9);
    (lo - pad)..(hi + pad)
}

fn draw_two_lines(
    path: &Path,
    caption: &str,
    first: (&str, Vec<(usize, f64)>),
    second: (&str, Vec<(usize, f64)>),
    len: usize,
) -> Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let y = value_range(first.1.iter().chain(&second.1).map(|(_, v)| v));
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 28).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0usize..len.max(1), y)
        .map_err(draw_err)?;
    chart.configure_mesh().draw().map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(first.1, &BLUE))
        .map_err(draw_err)?
        .label(first.0)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .draw_series(LineSeries::new(second.1, &RED))
        .map_err(draw_err)?
        .label(second.0)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .draw()
        .map_err(draw_err)?;
    root.present().map_err(draw_err)?;
    Ok(())
}

/// Write `<label>_forecast.png` and `<label>_backtest.png` into `dir`.
pub fn render_charts(dir: &Path, label: &str, ticker: &str, title: &str, series: &ChartSeries) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let len = series.close.len();

    let forecast_path = dir.join(format!("{}_forecast.png", label));
    draw_two_lines(
        &forecast_path,
        &format!("{} - Price", ticker),
        (ticker, series.close.iter().copied().enumerate().collect()),
        (
            "Predictions",
            series
                .predicted
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.map(|v| (i, v)))
                .collect(),
        ),
        len,
    )
    .with_context(|| format!("failed to render {}", forecast_path.display()))?;

    let backtest_path = dir.join(format!("{}_backtest.png", label));
    draw_two_lines(
        &backtest_path,
        &format!("{} - Backtest {}", ticker, title),
        ("Buy & Hold", series.cumulative_market.iter().copied().enumerate().collect()),
        ("Strategy", series.cumulative_strategy.iter().copied().enumerate().collect()),
        len,
    )
    .with_context(|| format!("failed to render {}", backtest_path.display()))?;

    Ok(vec![forecast_path, backtest_path])
}
