//! Configuration loading and validation tests.

use concentration_core::{
    config::{CalibrationStrategy, MAX_COUNT, MAX_HISTOGRAM_BINS, MAX_MONTHS},
    rng::SequenceKind,
    ConcentrationEngine, EngineError, GenerationConfig,
};
use std::io::Write;

fn rejected_field(config: &GenerationConfig) -> &'static str {
    match config.validate() {
        Err(EngineError::Configuration { field, .. }) => field,
        other => panic!("Expected a configuration error, got {other:?}"),
    }
}

#[test]
fn documented_defaults() {
    let cfg = GenerationConfig::default();
    assert_eq!(cfg.seed, 9);
    assert_eq!(cfg.count, 520);
    assert_eq!(cfg.anchor_population_share_pct, 60.0);
    assert_eq!(cfg.target_magnitude_share_pct, 40.0);
    assert_eq!(cfg.months, 12);
    assert_eq!(cfg.histogram_bins, 12);
    assert_eq!(cfg.sequence, SequenceKind::Lcg);
    assert_eq!(cfg.strategy, CalibrationStrategy::PiecewiseRescale);
}

#[test]
fn non_positive_sizes_are_rejected() {
    let base = GenerationConfig::default();
    assert_eq!(rejected_field(&GenerationConfig { count: 0, ..base.clone() }), "count");
    assert_eq!(rejected_field(&GenerationConfig { months: 0, ..base.clone() }), "months");
    assert_eq!(
        rejected_field(&GenerationConfig { histogram_bins: 0, ..base }),
        "histogramBins"
    );
}

#[test]
fn shares_must_be_strictly_inside_zero_and_one_hundred() {
    let base = GenerationConfig::default();
    for bad in [0.0, 100.0, -5.0, 120.0, f64::NAN, f64::INFINITY] {
        assert_eq!(
            rejected_field(&GenerationConfig {
                anchor_population_share_pct: bad,
                ..base.clone()
            }),
            "anchorPopulationSharePct",
            "anchor {bad} accepted"
        );
        assert_eq!(
            rejected_field(&GenerationConfig {
                target_magnitude_share_pct: bad,
                ..base.clone()
            }),
            "targetMagnitudeSharePct",
            "target {bad} accepted"
        );
    }
}

#[test]
fn sizes_have_an_upper_limit() {
    let base = GenerationConfig::default();
    assert_eq!(
        rejected_field(&GenerationConfig { count: MAX_COUNT + 1, ..base.clone() }),
        "count"
    );
    assert_eq!(
        rejected_field(&GenerationConfig { months: u32::MAX, ..base.clone() }),
        "months"
    );
    GenerationConfig { months: MAX_MONTHS, ..base.clone() }.validate().unwrap();

    let mut cfg = GenerationConfig {
        histogram_bins: MAX_HISTOGRAM_BINS + 1,
        ..base
    };
    cfg.histogram.start_count = u32::MAX;
    assert_eq!(rejected_field(&cfg), "histogramBins");
}

#[test]
fn shrinking_monthly_values_are_rejected() {
    for rate in [-0.99, -0.5, -1e-9] {
        let mut cfg = GenerationConfig { months: 40, ..Default::default() };
        cfg.monthly.initial_rate = rate;
        cfg.monthly.rate_decay = 1.0;
        assert_eq!(rejected_field(&cfg), "monthly.initialRate", "rate {rate} accepted");
    }

    let mut flat = GenerationConfig { months: 40, ..Default::default() };
    flat.monthly.initial_rate = 0.0;
    let result = ConcentrationEngine::generate(&flat).unwrap();
    for w in result.monthly.windows(2) {
        assert!(
            w[1].cumulative_share_pct > w[0].cumulative_share_pct,
            "Monthly share stalls at period {}",
            w[1].period_index
        );
    }
}

#[test]
fn seed_must_fit_in_32_bits() {
    let ok = GenerationConfig { seed: u32::MAX as u64, ..Default::default() };
    ok.validate().unwrap();
    let too_wide = GenerationConfig { seed: 1 << 40, ..Default::default() };
    assert_eq!(rejected_field(&too_wide), "seed");
}

#[test]
fn tuning_values_are_checked() {
    let mut cfg = GenerationConfig::default();
    cfg.skew.jump_probability = 1.5;
    assert_eq!(rejected_field(&cfg), "skew.jumpProbability");

    let mut cfg = GenerationConfig::default();
    cfg.skew.floor = 0.0;
    assert_eq!(rejected_field(&cfg), "skew.floor");

    let mut cfg = GenerationConfig::default();
    cfg.monthly.initial_rate = -1.0;
    assert_eq!(rejected_field(&cfg), "monthly.initialRate");

    let mut cfg = GenerationConfig::default();
    cfg.histogram.count_decay = 1.0;
    assert_eq!(rejected_field(&cfg), "histogram.countDecay");

    let mut cfg = GenerationConfig::default();
    cfg.histogram.bucket_growth = 0.9;
    assert_eq!(rejected_field(&cfg), "histogram.bucketGrowth");

    let mut cfg = GenerationConfig::default();
    cfg.parametric.max_iterations = 0;
    assert_eq!(rejected_field(&cfg), "parametric.maxIterations");
}

#[test]
fn json_with_camel_case_keys_loads() {
    let json = r#"{
        "seed": 17,
        "count": 300,
        "anchorPopulationSharePct": 50,
        "targetMagnitudeSharePct": 25,
        "sequence": "pcg",
        "strategy": "parametric",
        "skew": { "jumpProbability": 0.1 },
        "histogram": { "startCount": 90 }
    }"#;
    let cfg = GenerationConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.seed, 17);
    assert_eq!(cfg.count, 300);
    assert_eq!(cfg.sequence, SequenceKind::Pcg);
    assert_eq!(cfg.strategy, CalibrationStrategy::Parametric);
    assert_eq!(cfg.skew.jump_probability, 0.1);
    assert_eq!(cfg.skew.log_spread, 1.05);
    assert_eq!(cfg.histogram.start_count, 90);
    assert_eq!(cfg.months, 12);
}

#[test]
fn invalid_json_values_are_rejected_on_parse() {
    let err = GenerationConfig::from_json_str(r#"{"targetMagnitudeSharePct": 120}"#).unwrap_err();
    assert!(matches!(err, EngineError::Configuration { field: "targetMagnitudeSharePct", .. }));

    let err = GenerationConfig::from_json_str(r#"{"count": -3}"#).unwrap_err();
    assert!(matches!(err, EngineError::Serialization(_)));
}

#[test]
fn load_reads_a_config_file() {
    let path = std::env::temp_dir().join(format!("concentration-config-{}.json", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"seed": 5, "months": 6}}"#).unwrap();
    }
    let cfg = GenerationConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(cfg.seed, 5);
    assert_eq!(cfg.months, 6);
}

#[test]
fn load_reports_missing_file() {
    let err = GenerationConfig::load("/definitely/not/here.json").unwrap_err();
    assert!(err.to_string().contains("Cannot read"), "unexpected error: {err}");
}
