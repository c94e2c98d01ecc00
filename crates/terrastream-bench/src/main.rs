use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use terrastream_bench::report;
use terrastream_bench::runner::BenchmarkRunner;
use terrastream_bench::scenes;
use terrastream_world::StreamingConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut baseline_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut regression_threshold = 10.0f64;
    let mut frame_count = 240u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(PathBuf::from(value(&args, &mut i, "--config")));
            }
            "--baseline" => {
                baseline_path = Some(PathBuf::from(value(&args, &mut i, "--baseline")));
            }
            "--output" => {
                output_path = Some(PathBuf::from(value(&args, &mut i, "--output")));
            }
            "--regression-threshold" => {
                regression_threshold = parsed(&args, &mut i, "--regression-threshold");
            }
            "--frames" => {
                frame_count = parsed(&args, &mut i, "--frames");
            }
            "--help" | "-h" => {
                eprintln!("Usage: stream-runner [OPTIONS]");
                eprintln!("  --config <path>                Streaming config (RON)");
                eprintln!("  --baseline <path>              Load baseline JSON for comparison");
                eprintln!("  --output <path>                Save current results as JSON baseline");
                eprintln!(
                    "  --regression-threshold <pct>   Regression threshold percentage (default: 10)"
                );
                eprintln!("  --frames <n>                   Frames per scene (default: 240)");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => match StreamingConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => StreamingConfig {
            save_root: std::env::temp_dir().join(format!("stream-runner-{}", process::id())),
            ..StreamingConfig::default()
        },
    };

    let runner = BenchmarkRunner::new(config, frame_count);
    let mut results = Vec::new();

    for scene in &scenes::standard_scenes() {
        match runner.run_scene(scene) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("Scene '{}' failed: {e}", scene.name);
                process::exit(1);
            }
        }
    }

    println!("\n## Streaming Benchmark Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let baseline = report::Baseline {
            timestamp: run_label(),
            results: results.clone(),
        };
        if let Err(e) = report::save_baseline(path, &baseline) {
            eprintln!("Failed to save baseline {}: {e}", path.display());
            process::exit(1);
        }
        log::info!("Saved baseline to {}", path.display());
    }

    if let Some(ref path) = baseline_path {
        if let Some(baseline) = report::load_baseline(path) {
            let regressions = report::compare(&results, &baseline, regression_threshold);
            println!(
                "{}",
                report::format_comparison(&regressions, regression_threshold)
            );
            if !regressions.is_empty() {
                eprintln!(
                    "ERROR: {} regressions detected, exiting with code 1",
                    regressions.len()
                );
                process::exit(1);
            }
        } else {
            log::warn!("Baseline file not found: {}", path.display());
        }
    }

    log::info!("Benchmark complete.");
}

/// The argument following the flag at `i`, advancing past it.
fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            eprintln!("Missing value for {flag}");
            process::exit(1);
        }
    }
}

fn parsed<T: FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    let raw = value(args, i, flag);
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Invalid {flag} value: {raw}");
            process::exit(1);
        }
    }
}

/// Seconds since the epoch, enough to tell baselines apart.
fn run_label() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("bench-{secs}")
}
