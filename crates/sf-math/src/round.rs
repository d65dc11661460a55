//! Round resolution
//!
//! `resolve_round(config, seed)` is a pure function: it builds its own
//! generator from the seed, so any number of rounds may resolve at once
//! against the same shared config.

use serde::{Deserialize, Serialize};

use crate::config::GameMathConfig;
use crate::grid::{GridMaterializer, GridReveal, GridViolation};
use crate::resolver::{OutcomeResolver, ResolvedTier};
use crate::rng::{Mulberry32, RandomSource, Seed};

/// Result of one round; never mutated after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOutcome {
    /// Round identifier, derived from the seed
    pub round_id: String,
    /// Seed the round was resolved from
    pub seed: Seed,
    /// Prize tier that fired
    pub tier_id: String,
    pub is_win: bool,
    /// Payout as a multiple of the ticket price
    pub multiplier: f64,
    /// Payout in currency (`multiplier × ticketPrice`)
    pub final_prize: f64,
    /// Row-major symbol ids, length `rows × columns`
    pub reveal_map: Vec<String>,
    pub winning_symbol: Option<String>,
    pub winning_cells: Vec<usize>,
    /// Cosmetic playback seed, decoupled from the financial draw
    pub presentation_seed: u32,
}

/// Resolver and materializer prepared once for a config
#[derive(Debug, Clone)]
pub struct RoundEngine<'a> {
    config: &'a GameMathConfig,
    resolver: OutcomeResolver,
    materializer: GridMaterializer<'a>,
}

impl<'a> RoundEngine<'a> {
    pub fn new(config: &'a GameMathConfig) -> Self {
        Self {
            config,
            resolver: OutcomeResolver::new(config),
            materializer: GridMaterializer::new(config),
        }
    }

    pub fn config(&self) -> &GameMathConfig {
        self.config
    }

    pub fn resolver(&self) -> &OutcomeResolver {
        &self.resolver
    }

    pub fn materializer(&self) -> &GridMaterializer<'a> {
        &self.materializer
    }

    /// Resolve one round from a seed
    pub fn resolve(&self, seed: impl Into<Seed>) -> ResolvedOutcome {
        let seed = seed.into();
        let mut rng = Mulberry32::from_seed(&seed);
        self.resolve_with(seed, &mut rng)
    }

    /// Resolve one round drawing from an explicit source.
    ///
    /// Draw order: tier roll, grid, presentation seed, round id.
    pub fn resolve_with<R: RandomSource>(&self, seed: Seed, rng: &mut R) -> ResolvedOutcome {
        let tier = self.resolver.draw(rng);
        let reveal = self.materializer.materialize(&tier, rng);
        let presentation_seed = rng.next_u32();
        let round_id = format!("rnd-{:08x}-{:08x}", seed.to_u32(), rng.next_u32());

        log::debug!(
            "Round {} → tier '{}' (roll {:.6}, win {})",
            round_id,
            tier.tier_id,
            tier.roll,
            tier.is_win
        );

        ResolvedOutcome {
            round_id,
            seed,
            final_prize: tier.multiplier * self.config.ticket_price(),
            multiplier: tier.multiplier,
            is_win: tier.is_win,
            tier_id: tier.tier_id,
            reveal_map: reveal.cells,
            winning_symbol: reveal.winning_symbol,
            winning_cells: reveal.winning_cells,
            presentation_seed,
        }
    }

    /// Check an outcome's reveal map against the tier it claims
    pub fn audit(&self, outcome: &ResolvedOutcome) -> Result<(), GridViolation> {
        let tier = ResolvedTier {
            tier_index: self
                .config
                .prize_table()
                .iter()
                .position(|t| t.id == outcome.tier_id),
            tier_id: outcome.tier_id.clone(),
            multiplier: outcome.multiplier,
            is_win: outcome.is_win,
            roll: 0.0,
        };
        let reveal = GridReveal {
            cells: outcome.reveal_map.clone(),
            winning_symbol: outcome.winning_symbol.clone(),
            winning_cells: outcome.winning_cells.clone(),
        };
        self.materializer.audit(&tier, &reveal)
    }
}

/// Resolve one round: same config and seed give the same outcome
pub fn resolve_round(config: &GameMathConfig, seed: impl Into<Seed>) -> ResolvedOutcome {
    RoundEngine::new(config).resolve(seed)
}
