//! twin-runner: headless runner for the swap-station decision twin.
//!
//! Usage:
//!   twin-runner --data-dir ./data --db twin.db --samples
//!   twin-runner --data-dir ./data --scenarios
//!   twin-runner --data-dir ./data --ipc-mode
//!
//! Without --samples or --scenarios both are run.

use anyhow::Result;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use swaptwin_core::{
    config::TwinConfig,
    engine::simulate_network_with,
    intervention::Intervention,
    pipeline::{AnalysisReport, Pipeline},
    queue_math::Coordinate,
    snapshot::NetworkSimulationResult,
    station::Station,
    store::AnalysisStore,
    transcript::Transcript,
};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Analyze {
        call_id: String,
        transcript: String,
        #[serde(default)]
        driver_origin: Option<Coordinate>,
    },
    Simulate {
        #[serde(default)]
        interventions: Vec<Intervention>,
    },
    Stats,
    Quit,
}

#[derive(serde::Serialize)]
struct SimulationSummary {
    run_id: String,
    total_swaps: u64,
    total_lost_swaps: u64,
    avg_wait_minutes: f64,
    lost_by_hour: Vec<u64>,
}

impl From<&NetworkSimulationResult> for SimulationSummary {
    fn from(result: &NetworkSimulationResult) -> Self {
        Self {
            run_id: result.run_id.clone(),
            total_swaps: result.total_swaps,
            total_lost_swaps: result.total_lost_swaps,
            avg_wait_minutes: result.avg_wait_minutes,
            lost_by_hour: result.lost_by_hour(),
        }
    }
}

#[derive(serde::Deserialize)]
struct SampleFile {
    samples: Vec<Sample>,
}

#[derive(serde::Deserialize)]
struct Sample {
    call_id: String,
    #[serde(default)]
    driver_origin: Option<Coordinate>,
    transcript: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let samples = args.iter().any(|a| a == "--samples");
    let scenarios = args.iter().any(|a| a == "--scenarios");
    let db = string_arg(&args, "--db", ":memory:");
    let data_dir = string_arg(&args, "--data-dir", "./data");

    let config = TwinConfig::load(data_dir)?;
    let pipeline = Pipeline::from_config(&config)?;
    let store = AnalysisStore::open(db)?;
    store.migrate()?;

    if ipc_mode {
        return run_ipc_loop(&pipeline, &config, &store);
    }

    println!("Swap-station decision twin: twin-runner");
    println!("  started:   {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  stations:  {}", config.stations.len());
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let run_all = !samples && !scenarios;
    if samples || run_all {
        run_samples(&pipeline, &store, data_dir)?;
    }
    if scenarios || run_all {
        run_scenarios(&config, &store)?;
    }
    print_stats(&store)?;
    Ok(())
}

fn run_ipc_loop(pipeline: &Pipeline, config: &TwinConfig, store: &AnalysisStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

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

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Analyze { call_id, transcript, driver_origin } => {
                analyze_and_store(pipeline, store, &call_id, &transcript, driver_origin)
                    .and_then(|report| Ok(serde_json::to_value(&report)?))
            }
            IpcCommand::Simulate { interventions } => {
                simulate_and_store(config, store, &interventions)
                    .and_then(|result| Ok(serde_json::to_value(SimulationSummary::from(&result))?))
            }
            IpcCommand::Stats => store
                .aggregated_stats()
                .map_err(anyhow::Error::from)
                .and_then(|stats| Ok(serde_json::to_value(&stats)?)),
        };

        match response {
            Ok(value) => writeln!(stdout, "{value}")?,
            Err(e) => {
                log::warn!("ipc command failed: {e}");
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn write_error(stdout: &mut io::Stdout, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(stdout, "{err_json}")?;
    stdout.flush()?;
    Ok(())
}

fn analyze_and_store(
    pipeline: &Pipeline,
    store: &AnalysisStore,
    call_id: &str,
    raw_transcript: &str,
    driver_origin: Option<Coordinate>,
) -> Result<AnalysisReport> {
    let transcript = Transcript::parse(raw_transcript);
    let report = pipeline.analyze(&transcript, call_id, driver_origin)?;
    store.append_analysis(&report)?;
    Ok(report)
}

fn simulate_and_store(
    config: &TwinConfig,
    store: &AnalysisStore,
    interventions: &[Intervention],
) -> Result<NetworkSimulationResult> {
    let result = simulate_network_with(&config.stations, interventions, &config.network)?;
    store.save_network_run(&result, interventions)?;
    Ok(result)
}

fn run_samples(pipeline: &Pipeline, store: &AnalysisStore, data_dir: &str) -> Result<()> {
    let path = Path::new(data_dir).join("transcripts.json");
    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    let file: SampleFile = serde_json::from_str(&content)?;

    println!("=== CALL ANALYSIS ({} samples) ===", file.samples.len());
    for sample in &file.samples {
        let report = analyze_and_store(
            pipeline,
            store,
            &sample.call_id,
            &sample.transcript,
            sample.driver_origin,
        )?;
        println!();
        println!("--- {} [{}] ---", report.call_id, report.decision.decision_type.as_str());
        print!("{}", report.insight.formatted_output);
        println!("{}", report.insight.simulation_narrative);
    }
    println!();
    Ok(())
}

fn run_scenarios(config: &TwinConfig, store: &AnalysisStore) -> Result<()> {
    let surge = Intervention::ShiftDemand { factor: 1.5, hour_window: (8, 22) };
    let mut mitigation = vec![surge.clone()];
    if let Some(busiest) = busiest_station(&config.stations) {
        mitigation.push(Intervention::ModifyChargers {
            station_id: busiest.id.clone(),
            new_count: i64::from(busiest.capacity) * 2,
        });
    }

    let scenarios: Vec<(&str, Vec<Intervention>)> = vec![
        ("baseline", Vec::new()),
        ("surge x1.5 08-22", vec![surge]),
        ("surge + chargers", mitigation),
    ];

    println!("=== NETWORK SCENARIOS (24h) ===");
    println!("  {:<20} {:>8} {:>8} {:>10}", "scenario", "swaps", "lost", "avg wait");
    for (name, interventions) in &scenarios {
        let result = simulate_and_store(config, store, interventions)?;
        println!(
            "  {:<20} {:>8} {:>8} {:>9.1}m",
            name, result.total_swaps, result.total_lost_swaps, result.avg_wait_minutes
        );
    }
    println!();
    Ok(())
}

/// Station with the highest baseline load ratio.
fn busiest_station(stations: &[Station]) -> Option<&Station> {
    stations.iter().max_by(|a, b| {
        let ra = a.baseline_load as f64 / a.capacity.max(1) as f64;
        let rb = b.baseline_load as f64 / b.capacity.max(1) as f64;
        ra.total_cmp(&rb).then_with(|| b.id.cmp(&a.id))
    })
}

fn print_stats(store: &AnalysisStore) -> Result<()> {
    let stats = store.aggregated_stats()?;
    println!("=== SUMMARY ===");
    println!("  calls analysed:   {}", stats.total_calls);
    println!(
        "  flagged calls:    {} ({:.0}%)",
        stats.flagged_calls,
        stats.flagged_share_pct()
    );
    for (issue, count) in &stats.issue_counts {
        println!("    {issue:<24} {count}");
    }
    println!("  avg wait saving:  {:.1}%", stats.avg_wait_reduction_pct);
    println!("  network runs:     {}", store.network_run_count()?);
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}
