use std::collections::BTreeMap;

use market_forecaster::backtest::BacktestSummary;
use market_forecaster::export::{write_results, ResultsExport};
use market_forecaster::model::indicator::IndicatorSpec;
use market_forecaster::pipeline::{BatchOutcome, SkippedPair};
use market_forecaster::scoring::{score_and_rank, Preset, WeightOverrides};

fn summary(ticker: &str, method: &str, ret: f64, sharpe: f64) -> BacktestSummary {
    let indicator = IndicatorSpec::parse(method, vec![]).unwrap();
    BacktestSummary {
        ticker: ticker.to_string(),
        label: format!("{}_{}", ticker, indicator.label()),
        indicator,
        return_market: 1.0,
        return_strategy: ret,
        trades: 1,
        sharpe,
        max_drawdown: 0.05,
        score: 0.0,
    }
}

fn ranked_batch() -> BatchOutcome {
    let mut results = BTreeMap::new();
    results.insert(
        "PETR4".to_string(),
        vec![summary("PETR4", "LR", 1.02, 0.4), summary("PETR4", "RF", 1.15, 0.9)],
    );
    results.insert("VALE3".to_string(), vec![summary("VALE3", "KNN", 0.97, f64::NAN)]);
    score_and_rank(&mut results, "aggressive", &WeightOverrides::default()).unwrap();
    BatchOutcome {
        results,
        runs: Vec::new(),
        skipped: vec![SkippedPair {
            ticker: "ITUB4".to_string(),
            indicator: "ARIMA_1_1_0".to_string(),
            error: "insufficient data: need at least 101 bars, got 40".to_string(),
        }],
    }
}

#[test]
/// Verifies the results document:
/// one file per run, named by run id, with top entry per ticker and skipped pairs.
fn results_file_holds_ranking_and_skipped_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let export = ResultsExport::from_batch(&ranked_batch(), Preset::Aggressive.name(), Preset::Aggressive.weights());

    let path = write_results(&dir.path().join("results"), &export).unwrap();
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()).unwrap(),
        format!("results_{}.json", export.run_id)
    );
    assert!(uuid::Uuid::parse_str(&export.run_id).is_ok());

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["run_id"], export.run_id.as_str());
    assert_eq!(doc["preset"], "aggressive");
    assert!(doc["generated_at"].is_string());

    let ranking = doc["ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0]["label"], "PETR4_RF");
    assert_eq!(ranking[1]["label"], "VALE3_KNN");
    assert_eq!(doc["results"]["PETR4"].as_array().unwrap().len(), 2);

    let skipped = doc["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["ticker"], "ITUB4");
    assert_eq!(skipped[0]["indicator"], "ARIMA_1_1_0");
}

#[test]
fn nan_scores_are_written_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let export = ResultsExport::from_batch(&ranked_batch(), "aggressive", Preset::Aggressive.weights());
    assert!(export.ranking[1].score.is_nan());

    let path = write_results(dir.path(), &export).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(doc["ranking"][1]["score"].is_null());
    assert!(doc["results"]["VALE3"][0]["sharpe"].is_null());
    assert!(doc["ranking"][0]["score"].is_number());
}

#[test]
fn each_export_gets_its_own_run_id() {
    let batch = ranked_batch();
    let a = ResultsExport::from_batch(&batch, "basic", Preset::Basic.weights());
    let b = ResultsExport::from_batch(&batch, "basic", Preset::Basic.weights());
    assert_ne!(a.run_id, b.run_id);
}
