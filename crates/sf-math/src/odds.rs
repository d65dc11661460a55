//! Prize table normalization
//!
//! Turns a configured paytable into an ordered probability distribution.
//! Table order is kept: the resolver walks entries front to back, so the
//! entry listed first owns any shared boundary.

use serde::{Deserialize, Serialize};

use crate::config::{GameMathConfig, MathMode, PROBABILITY_EPSILON};

/// How the table was normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `weight / totalTickets`
    Deck,
    /// Probabilities taken as-is
    Direct,
    /// Pool weights exceeded the deck; divided by the assigned total
    OverAllocatedDeck,
    /// Probabilities summed above 1; divided by their sum
    Rescaled,
    /// Odds fields did not match the math mode; raw values divided by their sum
    RawFallback,
}

/// One tier's share of the distribution
#[derive(Debug, Clone, PartialEq)]
pub struct OddsEntry {
    /// Index into the config's prize table
    pub tier_index: usize,
    pub tier_id: String,
    /// Payout multiplier (0 for losing tiers)
    pub multiplier: f64,
    pub is_win: bool,
    /// Ticket count when the tier is weighted
    pub weight: Option<u64>,
    pub probability: f64,
}

/// Normalized distribution over a prize table plus the implicit losing mass
#[derive(Debug, Clone, PartialEq)]
pub struct OddsTable {
    entries: Vec<OddsEntry>,
    residual: f64,
    residual_weight: Option<u64>,
    normalization: Normalization,
}

impl OddsTable {
    /// Normalize the config's prize table for its math mode
    pub fn from_config(config: &GameMathConfig) -> Self {
        let tiers = config.prize_table();
        if tiers.is_empty() {
            return Self {
                entries: Vec::new(),
                residual: 1.0,
                residual_weight: config.total_tickets(),
                normalization: match config.math_mode() {
                    MathMode::Pool => Normalization::Deck,
                    MathMode::Unlimited => Normalization::Direct,
                },
            };
        }

        let entry = |index: usize, weight: Option<u64>, probability: f64| {
            let tier = &tiers[index];
            OddsEntry {
                tier_index: index,
                tier_id: tier.id.clone(),
                multiplier: tier.payout_multiplier(),
                is_win: tier.is_win,
                weight,
                probability,
            }
        };

        if !config.odds_consistent() {
            let total: f64 = tiers.iter().map(|t| t.odds.raw()).sum();
            log::warn!(
                "Prize table odds do not match {} mode; normalizing raw values against {}",
                config.math_mode().as_str(),
                total
            );
            let entries = tiers
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let p = if total > 0.0 { t.odds.raw() / total } else { 0.0 };
                    entry(i, t.odds.weight(), p)
                })
                .collect();
            let table = Self {
                entries,
                residual: if total > 0.0 { 0.0 } else { 1.0 },
                residual_weight: None,
                normalization: Normalization::RawFallback,
            };
            return match (config.math_mode(), config.total_tickets()) {
                (MathMode::Pool, Some(deck)) => table.fit_to_deck(deck),
                _ => table,
            };
        }

        match config.math_mode() {
            MathMode::Pool => {
                let deck = config.total_tickets().unwrap_or(0);
                let assigned: u64 = tiers.iter().filter_map(|t| t.odds.weight()).sum();
                let (denominator, normalization) = if assigned > deck {
                    log::warn!(
                        "Pool assigns {} tickets to a {} ticket deck; normalizing against the assigned total",
                        assigned,
                        deck
                    );
                    (assigned, Normalization::OverAllocatedDeck)
                } else {
                    (deck, Normalization::Deck)
                };
                let residual_weight = deck.saturating_sub(assigned);
                let entries = tiers
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let w = t.odds.weight().unwrap_or(0);
                        entry(i, Some(w), ratio(w, denominator))
                    })
                    .collect();
                let table = Self {
                    entries,
                    residual: ratio(residual_weight, denominator),
                    residual_weight: Some(residual_weight),
                    normalization,
                };
                if normalization == Normalization::OverAllocatedDeck {
                    table.fit_to_deck(deck)
                } else {
                    table
                }
            }
            MathMode::Unlimited => {
                let sum: f64 = tiers.iter().filter_map(|t| t.odds.probability()).sum();
                let (scale, normalization) = if sum > 1.0 + PROBABILITY_EPSILON {
                    log::warn!("Tier probabilities sum to {}; rescaling to 1", sum);
                    (sum, Normalization::Rescaled)
                } else {
                    (1.0, Normalization::Direct)
                };
                let entries = tiers
                    .iter()
                    .enumerate()
                    .map(|(i, t)| entry(i, None, t.odds.probability().unwrap_or(0.0) / scale))
                    .collect();
                Self {
                    entries,
                    residual: if scale > 1.0 { 0.0 } else { (1.0 - sum).max(0.0) },
                    residual_weight: None,
                    normalization,
                }
            }
        }
    }

    /// Re-express a normalized table as whole tickets of a `deck`-ticket
    /// deck (largest remainder, ties to table order). Weights and the losing
    /// remainder sum to `deck`; probabilities become `weight / deck`.
    fn fit_to_deck(mut self, deck: u64) -> Self {
        let mut shares: Vec<f64> = self.entries.iter().map(|e| e.probability).collect();
        shares.push(self.residual);
        let tickets = apportion(&shares, deck);

        for (entry, &weight) in self.entries.iter_mut().zip(&tickets) {
            entry.weight = Some(weight);
            entry.probability = ratio(weight, deck);
        }
        let lose = tickets.last().copied().unwrap_or(deck);
        self.residual_weight = Some(lose);
        self.residual = ratio(lose, deck);
        self
    }

    /// Tier entries in table order
    pub fn entries(&self) -> &[OddsEntry] {
        &self.entries
    }

    /// Probability of the implicit losing outcome
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Unassigned tickets (pool mode with a consistent table)
    pub fn residual_weight(&self) -> Option<u64> {
        self.residual_weight
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Sum of all entry probabilities plus the residual
    pub fn total_probability(&self) -> f64 {
        self.entries.iter().map(|e| e.probability).sum::<f64>() + self.residual
    }

    /// (multiplier, probability) pairs, residual included
    pub fn payout_points(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self
            .entries
            .iter()
            .map(|e| (e.multiplier, e.probability))
            .collect();
        if self.residual > 0.0 {
            points.push((0.0, self.residual));
        }
        points
    }
}

/// Split `total` into whole units proportional to `shares` (largest remainder)
fn apportion(shares: &[f64], total: u64) -> Vec<u64> {
    let quotas: Vec<f64> = shares.iter().map(|s| s.max(0.0) * total as f64).collect();
    let mut units: Vec<u64> = quotas.iter().map(|q| q.floor() as u64).collect();
    let assigned: u64 = units.iter().sum();
    if assigned > total || units.is_empty() {
        return units;
    }

    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &i in order.iter().cycle().take((total - assigned) as usize) {
        units[i] += 1;
    }
    units
}

#[inline]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MathConfigDocument, PrizeTier};
    use approx::assert_abs_diff_eq;

    fn base(mode: MathMode) -> MathConfigDocument {
        MathConfigDocument::new(3, 3, mode)
            .with_win_symbols(["a", "b", "c"])
            .with_lose_symbols(["x", "y", "z"])
    }

    #[test]
    fn test_pool_deck_normalization() {
        let config = base(MathMode::Pool)
            .with_total_tickets(100)
            .with_tier(PrizeTier::weighted("big", 10.0, 5))
            .with_tier(PrizeTier::weighted("small", 1.0, 20))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.normalization(), Normalization::Deck);
        assert_abs_diff_eq!(odds.entries()[0].probability, 0.05);
        assert_abs_diff_eq!(odds.entries()[1].probability, 0.20);
        assert_eq!(odds.residual_weight(), Some(75));
        assert_abs_diff_eq!(odds.residual(), 0.75);
        assert_abs_diff_eq!(odds.total_probability(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unlimited_residual_mass() {
        let config = base(MathMode::Unlimited)
            .with_tier(PrizeTier::with_probability("big", 10.0, 0.01))
            .with_tier(PrizeTier::with_probability("small", 1.0, 0.3))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.normalization(), Normalization::Direct);
        assert_abs_diff_eq!(odds.residual(), 0.69, epsilon = 1e-12);
        assert_eq!(odds.payout_points().len(), 3);
    }

    #[test]
    fn test_unlimited_overflow_rescales() {
        let config = base(MathMode::Unlimited)
            .with_tier(PrizeTier::with_probability("a", 2.0, 0.8))
            .with_tier(PrizeTier::with_probability("b", 1.0, 0.8))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.normalization(), Normalization::Rescaled);
        assert_abs_diff_eq!(odds.entries()[0].probability, 0.5);
        assert_abs_diff_eq!(odds.residual(), 0.0);
    }

    #[test]
    fn test_mismatch_falls_back_to_raw_weights() {
        let config = base(MathMode::Pool)
            .with_total_tickets(1000)
            .with_tier(PrizeTier::weighted("a", 2.0, 3))
            .with_tier(PrizeTier::with_probability("b", 1.0, 1.0))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.normalization(), Normalization::RawFallback);
        assert_abs_diff_eq!(odds.entries()[0].probability, 0.75);
        assert_abs_diff_eq!(odds.entries()[1].probability, 0.25);
        assert_abs_diff_eq!(odds.residual(), 0.0);
    }

    #[test]
    fn test_over_allocated_pool_fits_deck() {
        let config = base(MathMode::Pool)
            .with_total_tickets(10)
            .with_tier(PrizeTier::weighted("big", 5.0, 8))
            .with_tier(PrizeTier::weighted("small", 1.0, 8))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.normalization(), Normalization::OverAllocatedDeck);
        assert_eq!(odds.entries()[0].weight, Some(5));
        assert_eq!(odds.entries()[1].weight, Some(5));
        assert_eq!(odds.residual_weight(), Some(0));
        assert_abs_diff_eq!(odds.entries()[0].probability, 0.5);
        assert_abs_diff_eq!(odds.total_probability(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_raw_fallback_pool_uses_whole_tickets() {
        let config = base(MathMode::Pool)
            .with_total_tickets(10)
            .with_tier(PrizeTier::weighted("t1", 1.0, 1))
            .with_tier(PrizeTier::weighted("t2", 1.0, 1))
            .with_tier(PrizeTier::with_probability("t3", 1.0, 1.0))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.normalization(), Normalization::RawFallback);
        let weights: Vec<Option<u64>> = odds.entries().iter().map(|e| e.weight).collect();
        assert_eq!(weights, vec![Some(4), Some(3), Some(3)]);
        assert_eq!(odds.residual_weight(), Some(0));
        for entry in odds.entries() {
            assert_abs_diff_eq!(entry.probability, entry.weight.unwrap() as f64 / 10.0);
        }
    }

    #[test]
    fn test_apportion_conserves_total() {
        assert_eq!(apportion(&[0.5, 0.5, 0.0], 10), vec![5, 5, 0]);
        assert_eq!(apportion(&[1.0 / 3.0; 3], 10), vec![4, 3, 3]);
        assert_eq!(apportion(&[0.0, 0.0, 1.0], 7), vec![0, 0, 7]);
        let units = apportion(&[0.123, 0.456, 0.421], 997);
        assert_eq!(units.iter().sum::<u64>(), 997);
    }

    #[test]
    fn test_losing_tier_pays_nothing() {
        let config = base(MathMode::Unlimited)
            .with_tier(PrizeTier::with_probability("consolation", 3.0, 0.5).with_win_flag(false))
            .build()
            .unwrap();
        let odds = OddsTable::from_config(&config);
        assert_eq!(odds.entries()[0].multiplier, 0.0);
        assert!(!odds.entries()[0].is_win);
    }

    #[test]
    fn test_empty_table_is_all_residual() {
        let config = base(MathMode::Pool).with_total_tickets(50).build().unwrap();
        let odds = OddsTable::from_config(&config);
        assert!(odds.entries().is_empty());
        assert_eq!(odds.residual(), 1.0);
        assert_eq!(odds.residual_weight(), Some(50));
    }
}
