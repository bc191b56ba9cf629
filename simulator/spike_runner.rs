// Spike Runner - Load and execute load-spike scenario YAML files
//
// Usage:
//   cargo run --bin spike_runner scenarios/flash_crowd.yaml
//   cargo run --bin spike_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin spike_runner scenarios/flash_crowd.yaml --seed 0x1234...

use std::env;
use std::fs;
use std::path::Path;

use load_spike::{capacity_tps, LoadSpikeSimulation, SimConfig, Spike, SpikeProfile};
use simple_logger::SimpleLogger;

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Configuration overrides
    config: ScenarioConfig,

    /// Load profile driving the arrival rate
    profile: Vec<Spike>,

    /// Output settings
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ScenarioConfig {
    num_blocks: u64,

    num_iterations: u64,

    #[serde(default = "default_block_size")]
    block_size_bytes: i64,

    #[serde(default = "default_txn_size")]
    txn_size_bytes: i64,

    /// Blocks per second; defaults to one block every 10 minutes
    #[serde(default = "default_block_rate")]
    block_rate: f64,

    /// Arrival rate at load 1.0; defaults to the capacity throughput of the
    /// configured block size and rate
    #[serde(default)]
    max_tps: Option<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct OutputConfig {
    prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "data/load-spike".to_string(),
        }
    }
}

fn default_block_size() -> i64 {
    load_spike::DEFAULT_BLOCK_SIZE
}

fn default_txn_size() -> i64 {
    load_spike::BITCOIN_TRANSACTION_SIZE
}

fn default_block_rate() -> f64 {
    load_spike::BITCOIN_BLOCK_RATE
}

fn main() {
    SimpleLogger::new().init().unwrap();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX]",
            args[0]
        );
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/flash_crowd.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/flash_crowd.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    // Parse optional seed
    let seed: Option<[u8; 32]> = if args.len() >= 4 && args[2] == "--seed" {
        Some(parse_seed_hex(&args[3]))
    } else {
        None
    };

    if path.is_file() {
        run_scenario_file(path, seed);
    } else if path.is_dir() {
        run_scenario_directory(path, seed);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("yaml")
                || path.extension().and_then(|s| s.to_str()) == Some("yml")
            {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!(
            "\n{}/{} Running: {}\n",
            i + 1,
            scenarios.len(),
            scenario_path.display()
        );
        run_scenario_file(scenario_path, seed);
    }

    println!("\nAll scenarios complete!");
}

fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) {
    println!("Loading scenario from: {}", path.display());

    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    if let Some(ref name) = scenario.meta.name {
        println!("\nScenario: {}", name);
    }
    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    // Build configuration
    let mut config = SimConfig::default();
    config.num_blocks = scenario.config.num_blocks;
    config.num_iterations = scenario.config.num_iterations;
    config.block_size_bytes = scenario.config.block_size_bytes;
    config.txn_size_bytes = scenario.config.txn_size_bytes;
    config.block_rate = scenario.config.block_rate;
    config.max_tps = scenario.config.max_tps.unwrap_or_else(|| {
        capacity_tps(
            scenario.config.block_size_bytes,
            scenario.config.txn_size_bytes,
            scenario.config.block_rate,
        )
    });
    config.seed = seed;

    let profile = SpikeProfile {
        spikes: scenario.profile,
    };

    println!("Configuration:");
    println!("  Blocks per repetition: {}", config.num_blocks);
    println!("  Repetitions: {}", config.num_iterations);
    println!("  Block size: {} bytes", config.block_size_bytes);
    println!("  Txn size: {} bytes", config.txn_size_bytes);
    println!("  Max throughput: {:.4} txns/s", config.max_tps);
    println!("  Spikes: {}", profile.num_spikes());
    println!("\nStarting simulation...\n");

    let num_blocks = config.num_blocks;
    let num_iterations = config.num_iterations;

    let mut sim = LoadSpikeSimulation::new(config)
        .use_spike_profile(profile)
        .add_cumulative_logger(&scenario.output.prefix);

    if let Err(e) = sim.run() {
        eprintln!("Simulation failed: {}", e);
        std::process::exit(1);
    }

    println!("Confirmed {} txns; writing output files", sim.txn_count());

    write_reports(&sim, num_blocks, num_iterations);

    println!("\nScenario complete!\n");
}

/// Write one file per logger and regime:
/// `<prefix>-<descriptor>-<numBlocks>-<numIterations>.<suffix>`
fn write_reports(sim: &LoadSpikeSimulation, num_blocks: u64, num_iterations: u64) {
    for report in sim.reports() {
        if let Some(parent) = Path::new(&report.prefix).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    eprintln!("Failed to create {}: {}", parent.display(), e);
                    std::process::exit(1);
                });
            }
        }

        for regime in &report.regimes {
            let filename = format!(
                "{}-{}-{}-{}.{}",
                report.prefix, regime.descriptor, num_blocks, num_iterations, report.suffix
            );

            fs::write(&filename, &regime.body).unwrap_or_else(|e| {
                eprintln!("Failed to write {}: {}", filename, e);
                std::process::exit(1);
            });
            println!("  wrote {}", filename);
        }
    }
}

fn parse_seed_hex(hex: &str) -> [u8; 32] {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte_str = std::str::from_utf8(chunk).unwrap();
        seed[i] = u8::from_str_radix(byte_str, 16).unwrap_or_else(|e| {
            eprintln!("Invalid hex seed: {}", e);
            std::process::exit(1);
        });
    }

    seed
}
