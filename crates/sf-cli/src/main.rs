//! ScratchForge command line
//!
//! Usage:
//!   scratchforge resolve game.json --seed 42          - Resolve one round
//!   scratchforge stats game.json                      - Theoretical RTP / hit rate / variance
//!   scratchforge export game.json -o schema.json      - Certification schema
//!   scratchforge certify game.json -o schema.json     - Schema with integrity block
//!   scratchforge verify schema.json                   - Check a certified schema
//!   scratchforge simulate game.json --rounds 1000000  - Monte Carlo run
//!   scratchforge check game.json                      - Validation + diagnostics

mod certify;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sf_math::{
    GameMathConfig, RgsMathSchema, RoundEngine, Seed, SimulationOptions, compute_stats,
    derive_round_seed, simulate, transform_to_rgs,
};

#[derive(Parser)]
#[command(name = "scratchforge", version, about = "Scratch game math engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve rounds and print each outcome as a JSON line
    Resolve {
        /// Game config (.json / .yaml / .yml)
        config: PathBuf,
        /// Round seed: an integer or any string
        #[arg(short, long)]
        seed: String,
        /// Number of rounds; seeds after the first are derived from the base seed
        #[arg(short, long, default_value_t = 1)]
        rounds: u64,
    },
    /// Print theoretical statistics
    Stats {
        config: PathBuf,
    },
    /// Export the certification schema
    Export {
        config: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export the schema and stamp its integrity block
    Certify {
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify the integrity block of a certified schema
    Verify {
        schema: PathBuf,
    },
    /// Monte Carlo simulation against the theoretical stats
    Simulate {
        config: PathBuf,
        #[arg(short, long, default_value_t = 100_000)]
        rounds: u64,
        /// Base seed (random when omitted)
        #[arg(short, long)]
        seed: Option<u32>,
        /// Worker threads (rayon default when omitted)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Skip per-round grid audits
        #[arg(long)]
        no_audit: bool,
    },
    /// Validate a config and list diagnostics
    Check {
        config: PathBuf,
        /// Treat diagnostics as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { config, seed, rounds } => resolve(&config, &seed, rounds),
        Commands::Stats { config } => stats(&config),
        Commands::Export { config, output } => export(&config, output.as_deref(), false),
        Commands::Certify { config, output } => export(&config, output.as_deref(), true),
        Commands::Verify { schema } => verify(&schema),
        Commands::Simulate {
            config,
            rounds,
            seed,
            threads,
            no_audit,
        } => run_simulation(&config, rounds, seed, threads, !no_audit),
        Commands::Check { config, strict } => check(&config, strict),
    }
}

fn load(path: &Path) -> Result<GameMathConfig> {
    GameMathConfig::from_path(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn resolve(path: &Path, seed: &str, rounds: u64) -> Result<()> {
    let config = load(path)?;
    let engine = RoundEngine::new(&config);
    let seed = Seed::parse(seed);

    if rounds <= 1 {
        let outcome = engine.resolve(seed);
        println!("{}", serde_json::to_string(&outcome)?);
        return Ok(());
    }

    let base = seed.to_u32();
    for i in 0..rounds {
        let outcome = engine.resolve(derive_round_seed(base, i));
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}

fn stats(path: &Path) -> Result<()> {
    let config = load(path)?;
    let stats = compute_stats(&config);
    log::info!(
        "RTP {:.2}%, hit rate {:.2}%, volatility {}",
        stats.rtp_percent(),
        stats.hit_rate_percent(),
        stats.volatility.display_name()
    );
    emit(&stats, None)
}

fn export(path: &Path, output: Option<&Path>, seal: bool) -> Result<()> {
    let config = load(path)?;
    let warnings = config.diagnostics();
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    let mut schema = transform_to_rgs(&config);
    if seal {
        if !warnings.is_empty() {
            log::warn!("Certifying a config with {} diagnostic(s)", warnings.len());
        }
        schema = certify::seal(schema)?;
        log::info!(
            "Sealed schema: {} {}",
            certify::ALGORITHM,
            schema.integrity.content_hash.as_deref().unwrap_or_default()
        );
    }
    emit(&schema, output)
}

fn verify(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let schema: RgsMathSchema =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?;

    if !schema.integrity.is_sealed() {
        bail!("{} has no integrity block", path.display());
    }
    if !certify::verify(&schema)? {
        bail!("Content hash mismatch in {}", path.display());
    }

    let rederived = schema.rederive_stats();
    if (rederived.rtp - schema.stats.rtp).abs() > 1e-9 {
        bail!(
            "Stated RTP {} does not match prize table ({})",
            schema.stats.rtp,
            rederived.rtp
        );
    }
    println!("✅ {} verified", path.display());
    Ok(())
}

fn run_simulation(
    path: &Path,
    rounds: u64,
    seed: Option<u32>,
    threads: Option<usize>,
    audit: bool,
) -> Result<()> {
    let config = load(path)?;
    let mut options = SimulationOptions::default()
        .with_rounds(rounds)
        .with_seed(seed.unwrap_or_else(rand::random))
        .with_grid_audit(audit);
    if let Some(threads) = threads {
        options = options.with_threads(threads);
    }

    let report = simulate(&config, &options);
    log::info!(
        "RTP delta {:+.5} over {} rounds (seed {})",
        report.rtp_delta,
        report.rounds,
        report.base_seed
    );
    emit(&report, None)
}

fn check(path: &Path, strict: bool) -> Result<()> {
    let config = load(path)?;
    let warnings = config.diagnostics();

    if warnings.is_empty() {
        println!("✅ {} is valid", path.display());
        return Ok(());
    }
    for warning in &warnings {
        println!("⚠️  {}", warning);
    }
    if strict {
        bail!("{} diagnostic(s) in {}", warnings.len(), path.display());
    }
    Ok(())
}
