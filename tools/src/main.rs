//! story-runner: headless generator for the concentration story.
//!
//! Usage:
//!   story-runner --seed 9 --count 520 --anchor 60 --target 40 --pretty
//!   story-runner --config story.json --strategy parametric
//!   story-runner --ipc-mode

use anyhow::{bail, Result};
use concentration_core::{
    config::CalibrationStrategy,
    curve::nearest_point,
    pulse::PulseClock,
    rng::SequenceKind,
    snapshot::GenerationSnapshot,
    GenerationConfig, GenerationResult,
};
use std::collections::{HashMap, VecDeque};
use std::env;
use std::io::{self, BufRead, Write};
use std::time::Duration;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Generate {
        #[serde(default)]
        config: GenerationConfig,
    },
    Pulse {
        elapsed_ms: u64,
    },
    Quit,
}

/// Most distinct configs kept in the IPC session memo.
const MEMO_CAPACITY: usize = 64;

/// Per-session results keyed by config JSON. Evicts the oldest entry
/// once `capacity` distinct configs are held.
struct ResultMemo {
    capacity: usize,
    entries: HashMap<String, GenerationResult>,
    order: VecDeque<String>,
}

impl ResultMemo {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&GenerationResult> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: String, result: GenerationResult) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, result);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(serde::Serialize)]
struct PulseState {
    phase: bool,
    opacity: f64,
    flips: u32,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let pretty = args.iter().any(|a| a == "--pretty");

    let config = build_config(&args)?;

    if ipc_mode {
        return run_ipc_loop();
    }

    let snapshot = GenerationSnapshot::capture(config)?;
    print_summary(&snapshot.config, &snapshot.result);
    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{json}");
    Ok(())
}

fn build_config(args: &[String]) -> Result<GenerationConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => GenerationConfig::load(path)?,
        None => GenerationConfig::default(),
    };

    config.seed = parse_arg(args, "--seed", config.seed);
    config.count = parse_arg(args, "--count", config.count);
    config.anchor_population_share_pct =
        parse_arg(args, "--anchor", config.anchor_population_share_pct);
    config.target_magnitude_share_pct =
        parse_arg(args, "--target", config.target_magnitude_share_pct);
    config.months = parse_arg(args, "--months", config.months);
    config.histogram_bins = parse_arg(args, "--bins", config.histogram_bins);

    if let Some(strategy) = flag_value(args, "--strategy") {
        config.strategy = match strategy {
            "piecewise" => CalibrationStrategy::PiecewiseRescale,
            "parametric" => CalibrationStrategy::Parametric,
            other => bail!("unknown strategy '{other}' (expected piecewise|parametric)"),
        };
    }
    if let Some(sequence) = flag_value(args, "--sequence") {
        config.sequence = match sequence {
            "lcg" => SequenceKind::Lcg,
            "pcg" => SequenceKind::Pcg,
            other => bail!("unknown sequence '{other}' (expected lcg|pcg)"),
        };
    }

    config.validate()?;
    Ok(config)
}

/// Serve generation requests line by line until EOF or `quit`.
/// Results are memoized per config for the session, up to `MEMO_CAPACITY`.
fn run_ipc_loop() -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();
    let mut cache = ResultMemo::new(MEMO_CAPACITY);
    let mut pulse = PulseClock::default();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Generate { config } => {
                let key = serde_json::to_string(&config)?;
                if let Some(result) = cache.get(&key) {
                    log::debug!("ipc: cache hit for seed={}", config.seed);
                    writeln!(stdout, "{}", serde_json::to_string(result)?)?;
                } else {
                    match concentration_core::generate(&config) {
                        Ok(result) => {
                            writeln!(stdout, "{}", serde_json::to_string(&result)?)?;
                            cache.insert(key, result);
                            log::debug!("ipc: memo holds {} results", cache.len());
                        }
                        Err(e) => write_error(&mut stdout, &e.to_string())?,
                    }
                }
            }
            IpcCommand::Pulse { elapsed_ms } => {
                let flips = pulse.advance(Duration::from_millis(elapsed_ms));
                let state = PulseState {
                    phase: pulse.phase,
                    opacity: pulse.opacity(),
                    flips,
                };
                writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(out, "{err_json}")?;
    out.flush()?;
    Ok(())
}

fn print_summary(config: &GenerationConfig, result: &GenerationResult) {
    let summary = &result.anchor_summary;
    let report = &result.calibration;
    eprintln!("=== GENERATION SUMMARY ===");
    eprintln!("  seed:           {}", config.seed);
    eprintln!("  entities:       {}", config.count);
    eprintln!("  sequence:       {}", config.sequence.name());
    eprintln!("  strategy:       {}", config.strategy.name());
    eprintln!(
        "  anchor:         {:.0}% of population -> {:.2}% of revenue (raw {:.2}%)",
        summary.population_share_pct, summary.magnitude_share_pct, report.raw_share_at_anchor
    );
    eprintln!(
        "  complement:     {:.0}% of population -> {:.2}% of revenue",
        summary.complement_population_share_pct, summary.complement_magnitude_share_pct
    );
    if let Some(p) = nearest_point(&result.curve, summary.population_share_pct) {
        eprintln!(
            "  nearest point:  ({:.2}%, {:.2}%)",
            p.population_share_pct, p.cumulative_magnitude_share_pct
        );
    }
    eprintln!("  concentration:  {:.3}", summary.concentration_index);
    if !report.converged {
        eprintln!(
            "  WARNING: calibration did not converge (residual {:.4} pp)",
            report.residual_pct
        );
    }
    eprintln!();
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_for(seed: u64) -> (String, GenerationResult) {
        let config = GenerationConfig {
            seed,
            count: 40,
            ..Default::default()
        };
        let key = serde_json::to_string(&config).unwrap();
        (key, concentration_core::generate(&config).unwrap())
    }

    #[test]
    fn memo_evicts_oldest_at_capacity() {
        let mut memo = ResultMemo::new(2);
        let (k1, r1) = result_for(1);
        let (k2, r2) = result_for(2);
        let (k3, r3) = result_for(3);

        memo.insert(k1.clone(), r1);
        memo.insert(k2.clone(), r2);
        memo.insert(k3.clone(), r3);

        assert_eq!(memo.len(), 2);
        assert!(memo.get(&k1).is_none());
        assert!(memo.get(&k2).is_some());
        assert!(memo.get(&k3).is_some());
    }

    #[test]
    fn memo_ignores_repeated_keys() {
        let mut memo = ResultMemo::new(2);
        let (k1, r1) = result_for(1);
        memo.insert(k1.clone(), r1.clone());
        memo.insert(k1.clone(), r1);
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.order.len(), 1);
    }
}
