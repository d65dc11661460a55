//! Outcome resolver: draws exactly one prize tier per round

use crate::config::{DEFAULT_LOSE_TIER_ID, GameMathConfig};
use crate::odds::OddsTable;
use crate::rng::RandomSource;

/// The tier a round landed on
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTier {
    /// Index into the prize table; `None` for the implicit losing tier
    pub tier_index: Option<usize>,
    pub tier_id: String,
    /// Payout multiplier (0 for losing tiers)
    pub multiplier: f64,
    pub is_win: bool,
    /// The roll that selected this tier
    pub roll: f64,
}

impl ResolvedTier {
    /// Implicit losing tier carrying the residual probability mass
    pub fn default_lose(roll: f64) -> Self {
        Self {
            tier_index: None,
            tier_id: DEFAULT_LOSE_TIER_ID.to_string(),
            multiplier: 0.0,
            is_win: false,
            roll,
        }
    }
}

/// Cumulative-probability walk over a normalized prize table
#[derive(Debug, Clone)]
pub struct OutcomeResolver {
    odds: OddsTable,
}

impl OutcomeResolver {
    /// Build a resolver for the config's prize table
    pub fn new(config: &GameMathConfig) -> Self {
        Self {
            odds: OddsTable::from_config(config),
        }
    }

    /// Wrap an already-normalized table
    pub fn from_odds(odds: OddsTable) -> Self {
        Self { odds }
    }

    pub fn odds(&self) -> &OddsTable {
        &self.odds
    }

    /// Draw one tier. Consumes exactly one `next_f64` from the source.
    pub fn draw<R: RandomSource>(&self, rng: &mut R) -> ResolvedTier {
        let roll = rng.next_f64();
        self.select(roll)
    }

    /// Select the tier owning `roll`.
    ///
    /// Each entry owns `[cumulative_before, cumulative_after)`; a roll past the
    /// last entry lands on the implicit losing tier.
    pub fn select(&self, roll: f64) -> ResolvedTier {
        let mut cumulative = 0.0;
        for entry in self.odds.entries() {
            cumulative += entry.probability;
            if roll < cumulative {
                return ResolvedTier {
                    tier_index: Some(entry.tier_index),
                    tier_id: entry.tier_id.clone(),
                    multiplier: entry.multiplier,
                    is_win: entry.is_win,
                    roll,
                };
            }
        }
        ResolvedTier::default_lose(roll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MathConfigDocument, MathMode, PrizeTier};
    use crate::rng::{Mulberry32, ScriptedSource};

    fn unlimited() -> GameMathConfig {
        MathConfigDocument::new(3, 3, MathMode::Unlimited)
            .with_win_symbols(["a", "b", "c"])
            .with_lose_symbols(["x", "y", "z"])
            .with_tier(PrizeTier::with_probability("first", 5.0, 0.25))
            .with_tier(PrizeTier::with_probability("second", 2.0, 0.25))
            .build()
            .unwrap()
    }

    #[test]
    fn test_table_order_owns_boundaries() {
        let resolver = OutcomeResolver::new(&unlimited());
        assert_eq!(resolver.select(0.0).tier_id, "first");
        assert_eq!(resolver.select(0.249_999).tier_id, "first");
        assert_eq!(resolver.select(0.25).tier_id, "second");
        assert_eq!(resolver.select(0.499_999).tier_id, "second");
        assert_eq!(resolver.select(0.5).tier_id, DEFAULT_LOSE_TIER_ID);
        assert_eq!(resolver.select(0.999_999).tier_index, None);
    }

    #[test]
    fn test_draw_uses_source() {
        let resolver = OutcomeResolver::new(&unlimited());
        let mut rng = ScriptedSource::from_fractions(&[0.3]);
        let tier = resolver.draw(&mut rng);
        assert_eq!(tier.tier_id, "second");
        assert_eq!(tier.multiplier, 2.0);
        assert!(tier.is_win);
    }

    #[test]
    fn test_empty_table_always_loses() {
        let config = MathConfigDocument::new(2, 2, MathMode::Unlimited)
            .with_win_symbols(["a"])
            .with_lose_symbols(["x", "y"])
            .build()
            .unwrap();
        let resolver = OutcomeResolver::new(&config);
        let mut rng = Mulberry32::new(1);
        for _ in 0..100 {
            let tier = resolver.draw(&mut rng);
            assert_eq!(tier.tier_id, DEFAULT_LOSE_TIER_ID);
            assert!(!tier.is_win);
            assert_eq!(tier.multiplier, 0.0);
        }
    }

    #[test]
    fn test_zero_weight_tier_never_fires() {
        let config = MathConfigDocument::new(3, 3, MathMode::Pool)
            .with_win_symbols(["a", "b", "c"])
            .with_lose_symbols(["x", "y", "z"])
            .with_total_tickets(10)
            .with_tier(PrizeTier::weighted("never", 50.0, 0))
            .with_tier(PrizeTier::weighted("always", 1.0, 10))
            .build()
            .unwrap();
        let resolver = OutcomeResolver::new(&config);
        let mut rng = Mulberry32::new(9);
        for _ in 0..1000 {
            assert_eq!(resolver.draw(&mut rng).tier_id, "always");
        }
    }
}
