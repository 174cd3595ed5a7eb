use chrono::{Duration, TimeZone, Utc};

use market_forecaster::config::Config;
use market_forecaster::model::bar::{Bar, BarSeries};
use market_forecaster::model::indicator::IndicatorSpec;
use market_forecaster::model::signal::Signal;
use market_forecaster::pipeline::{run_batch, run_pair};

fn series(ticker: &str, closes: &[f64]) -> BarSeries {
    let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, c)| Bar {
            timestamp: start + Duration::days(i as i64),
            close: *c,
            volume: 10_000.0 + 500.0 * ((i % 7) as f64),
        })
        .collect();
    BarSeries::new(ticker, bars).unwrap()
}

fn ramp(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            40.0 + 3.0 * (t / 6.0).sin() + 1.5 * (t / 2.3).cos() + 0.02 * t
        })
        .collect()
}

fn spec(method: &str, params: &[f64]) -> IndicatorSpec {
    IndicatorSpec::parse(method, params.to_vec()).unwrap()
}

#[test]
/// Verifies the end-to-end ramp:
/// linear regression tracks a linear trend, so no sell is ever emitted.
fn linear_ramp_end_to_end() {
    let cfg = Config::default();
    let s = series("PETR4", &ramp(150));
    let run = run_pair(&s, &spec("LR", &[0.0, 0.0, 5.0]), &cfg).unwrap();

    assert_eq!(run.predictions.len(), 150);
    // Training window plus the lag warm-up of the test window.
    assert!(run.predictions[..105].iter().all(Option::is_none));
    for (i, p) in run.predictions.iter().enumerate().skip(105) {
        let p = p.unwrap();
        assert!((p - (100.0 + i as f64)).abs() < 1e-6, "bar {} predicted {}", i, p);
    }
    assert!(run.signals.signal.iter().all(|s| *s != Signal::Sell));
    assert!(run.summary.return_strategy.is_finite());
    assert!((run.summary.return_market - 249.0 / 199.0).abs() < 1e-9);
    assert_eq!(run.summary.label, "PETR4_LR_0_0_5");
    assert!((run.alert.predicted_next_close - 250.0).abs() < 1e-6);
    assert_eq!(run.alert.last_close, 249.0);
    assert_eq!(run.metrics.samples, 45);
}

#[test]
/// Verifies no lookahead:
/// rewriting prices after bar k leaves every position up to k+1 untouched.
fn future_prices_do_not_change_past_positions() {
    let cfg = Config::default();
    let indicator = spec("DT", &[0.0, 4.0, 5.0]);
    let closes = wave(160);
    let k = 130;
    let mut altered = closes.clone();
    for c in altered.iter_mut().skip(k + 1) {
        *c *= 1.5;
    }

    let a = run_pair(&series("VALE3", &closes), &indicator, &cfg).unwrap();
    let b = run_pair(&series("VALE3", &altered), &indicator, &cfg).unwrap();

    assert_eq!(a.predictions[..=k + 1], b.predictions[..=k + 1]);
    assert_eq!(a.signals.signal[..=k], b.signals.signal[..=k]);
    assert_eq!(a.backtest.position[..=k + 1], b.backtest.position[..=k + 1]);
}

#[test]
fn batch_skips_failing_pairs_without_touching_siblings() {
    let cfg = Config::default();
    let series = vec![series("ITUB4", &wave(150)), series("ABEV3", &wave(60))];
    let indicators = vec![spec("LR", &[0.0, 0.0, 5.0]), spec("KNN", &[500.0, 0.0, 5.0])];

    let batch = run_batch(&series, &indicators, &cfg);

    assert_eq!(batch.runs.len(), 1);
    assert_eq!(batch.runs[0].summary.label, "ITUB4_LR_0_0_5");
    assert_eq!(batch.results.len(), 1);
    assert_eq!(batch.results["ITUB4"].len(), 1);
    assert_eq!(batch.skipped.len(), 3);
    let skipped: Vec<(&str, &str)> = batch
        .skipped
        .iter()
        .map(|s| (s.ticker.as_str(), s.indicator.as_str()))
        .collect();
    assert_eq!(
        skipped,
        vec![
            ("ITUB4", "KNN_500_0_5"),
            ("ABEV3", "LR_0_0_5"),
            ("ABEV3", "KNN_500_0_5"),
        ]
    );
}

#[test]
fn batch_is_reproducible() {
    let cfg = Config::default();
    let series = vec![series("BBDC4", &wave(170))];
    let indicators = vec![
        spec("RF", &[8.0, 4.0, 5.0]),
        spec("ET", &[8.0, 4.0, 5.0]),
        spec("GB", &[8.0, 3.0, 5.0]),
        spec("ARIMA", &[1.0, 1.0, 0.0]),
    ];
    let first = run_batch(&series, &indicators, &cfg);
    let second = run_batch(&series, &indicators, &cfg);
    assert!(first.skipped.is_empty());
    assert_eq!(first.results["BBDC4"].len(), 4);
    for (a, b) in first.runs.iter().zip(&second.runs) {
        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.summary.trades, b.summary.trades);
        assert_eq!(a.summary.return_strategy.to_bits(), b.summary.return_strategy.to_bits());
    }
}

#[test]
fn alert_snapshot_reflects_last_bar() {
    let cfg = Config::default();
    let closes = wave(140);
    let run = run_pair(&series("ABEV3", &closes), &spec("RR", &[0.0, 0.0, 5.0]), &cfg).unwrap();
    assert_eq!(run.alert.ticker, "ABEV3");
    assert_eq!(run.alert.last_close, *closes.last().unwrap());
    assert_eq!(run.alert.last_signal, *run.signals.signal.last().unwrap());
    assert_eq!(run.alert.last_entry_price, run.backtest.last_entry_price());
    assert!(run.alert.predicted_next_close.is_finite());
    assert!(run.alert.last_volume_strength.is_some());
}

#[test]
fn repeated_grid_entries_run_once() {
    let cfg = Config::default();
    let series = vec![series("petr4", &wave(150)), series("PETR4", &wave(150))];
    let lr = spec("LR", &[0.0, 0.0, 5.0]);
    let batch = run_batch(&series, &[lr.clone(), lr], &cfg);
    assert_eq!(batch.runs.len(), 1);
    assert_eq!(batch.results["PETR4"].len(), 1);
    assert!(batch.skipped.is_empty());
}
