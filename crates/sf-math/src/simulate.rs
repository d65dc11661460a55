//! Monte Carlo batch simulation
//!
//! Resolves many rounds and compares observed RTP and hit rate with the
//! theoretical stats. Round `i` uses `derive_round_seed(base, i)`, and the
//! tally is integer counts per tier, so the report is identical whatever
//! the thread count.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_LOSE_TIER_ID, GameMathConfig};
use crate::rng::derive_round_seed;
use crate::round::RoundEngine;
use crate::stats::{MathStats, compute_stats};

/// Simulation options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOptions {
    /// Rounds to resolve
    pub rounds: u64,
    /// Base seed for per-round seed derivation
    pub base_seed: u32,
    /// Worker threads (None = rayon default)
    pub threads: Option<usize>,
    /// Audit every reveal map against its tier
    pub audit_grids: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            rounds: 100_000,
            base_seed: 0,
            threads: None,
            audit_grids: true,
        }
    }
}

impl SimulationOptions {
    /// Builder: set round count
    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    /// Builder: set base seed
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.base_seed = seed;
        self
    }

    /// Builder: set thread count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    /// Builder: toggle grid auditing
    pub fn with_grid_audit(mut self, audit: bool) -> Self {
        self.audit_grids = audit;
        self
    }
}

/// Aggregate over a simulated batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub rounds: u64,
    pub base_seed: u32,
    /// Total stake (`rounds × ticketPrice`)
    pub wagered: f64,
    /// Total paid out
    pub paid: f64,
    pub observed_rtp: f64,
    pub observed_hit_rate: f64,
    /// Largest single payout
    pub max_prize: f64,
    /// Hits per tier id, implicit losing tier included
    pub tier_hits: BTreeMap<String, u64>,
    /// Rounds whose reveal map failed the audit
    pub grid_violations: u64,
    /// Theoretical stats of the same table
    pub expected: MathStats,
    /// `observed_rtp − expected.rtp`
    pub rtp_delta: f64,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    /// Index = tier index; last slot = implicit losing tier
    hits: Vec<u64>,
    wins: u64,
    violations: u64,
}

impl Tally {
    fn new(slots: usize) -> Self {
        Self {
            hits: vec![0; slots],
            wins: 0,
            violations: 0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.hits.iter_mut().zip(other.hits) {
            *a += b;
        }
        self.wins += other.wins;
        self.violations += other.violations;
        self
    }
}

/// Simulate `options.rounds` rounds of a config
pub fn simulate(config: &GameMathConfig, options: &SimulationOptions) -> SimulationReport {
    let engine = RoundEngine::new(config);
    let tiers = config.prize_table();
    let slots = tiers.len() + 1;

    let run = || {
        (0..options.rounds)
            .into_par_iter()
            .fold(
                || Tally::new(slots),
                |mut tally, i| {
                    let outcome = engine.resolve(derive_round_seed(options.base_seed, i));
                    let slot = tiers
                        .iter()
                        .position(|t| t.id == outcome.tier_id)
                        .unwrap_or(slots - 1);
                    tally.hits[slot] += 1;
                    if outcome.is_win && outcome.multiplier > 0.0 {
                        tally.wins += 1;
                    }
                    if options.audit_grids && engine.audit(&outcome).is_err() {
                        tally.violations += 1;
                    }
                    tally
                },
            )
            .reduce(|| Tally::new(slots), Tally::merge)
    };

    let tally = match options.threads {
        Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                log::warn!("Failed to build {} thread pool ({}); using global pool", threads, e);
                run()
            }
        },
        None => run(),
    };

    let price = config.ticket_price();
    let mut tier_hits = BTreeMap::new();
    let mut paid = 0.0;
    let mut max_prize: f64 = 0.0;
    for (i, tier) in tiers.iter().enumerate() {
        let hits = tally.hits[i];
        tier_hits.insert(tier.id.clone(), hits);
        let prize = tier.payout_multiplier() * price;
        paid += hits as f64 * prize;
        if hits > 0 {
            max_prize = max_prize.max(prize);
        }
    }
    tier_hits.insert(DEFAULT_LOSE_TIER_ID.to_string(), tally.hits[slots - 1]);

    let wagered = options.rounds as f64 * price;
    let observed_rtp = if wagered > 0.0 { paid / wagered } else { 0.0 };
    let observed_hit_rate = if options.rounds > 0 {
        tally.wins as f64 / options.rounds as f64
    } else {
        0.0
    };
    let expected = compute_stats(config);

    if tally.violations > 0 {
        log::warn!("{} of {} simulated grids failed the audit", tally.violations, options.rounds);
    }
    log::info!(
        "Simulated {} rounds: RTP {:.4} (expected {:.4}), hit rate {:.4}",
        options.rounds,
        observed_rtp,
        expected.rtp,
        observed_hit_rate
    );

    SimulationReport {
        rounds: options.rounds,
        base_seed: options.base_seed,
        wagered,
        paid,
        observed_rtp,
        observed_hit_rate,
        max_prize,
        tier_hits,
        grid_violations: tally.violations,
        expected,
        rtp_delta: observed_rtp - expected.rtp,
    }
}
