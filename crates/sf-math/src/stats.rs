//! Statistics calculator: theoretical RTP, hit rate, variance, max win
//!
//! Pure functions of a payout distribution. Nothing here is cached: callers
//! recompute from the current paytable.

use serde::{Deserialize, Serialize};

use crate::config::GameMathConfig;
use crate::odds::OddsTable;

/// Volatility class derived from the payout standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    /// σ < 3×
    Low,
    /// σ < 10×
    Medium,
    /// σ < 30×
    High,
    /// σ ≥ 30×
    Extreme,
}

impl Volatility {
    pub fn from_std_dev(std_dev: f64) -> Self {
        match std_dev {
            s if s < 3.0 => Self::Low,
            s if s < 10.0 => Self::Medium,
            s if s < 30.0 => Self::High,
            _ => Self::Extreme,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Extreme => "Extreme",
        }
    }
}

/// Long-run behavior of a paytable, in multiples of the ticket price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MathStats {
    /// Return to player: Σ multiplier × probability
    pub rtp: f64,
    /// Probability of a paying round
    pub hit_rate: f64,
    /// Σ probability × (multiplier − rtp)², losing mass included
    pub variance: f64,
    pub standard_deviation: f64,
    /// Largest multiplier among paying tiers, reachable or not
    pub max_win: f64,
    /// One paying round in N (`None` when nothing pays)
    pub hit_frequency: Option<f64>,
    pub volatility: Volatility,
}

impl Default for MathStats {
    fn default() -> Self {
        Self {
            rtp: 0.0,
            hit_rate: 0.0,
            variance: 0.0,
            standard_deviation: 0.0,
            max_win: 0.0,
            hit_frequency: None,
            volatility: Volatility::Low,
        }
    }
}

impl MathStats {
    /// Compute from `(multiplier, probability)` points.
    ///
    /// Probability mass missing from the points (sum below 1) is treated as
    /// a losing outcome with multiplier 0.
    pub fn from_distribution(points: &[(f64, f64)]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let mut rtp = 0.0;
        let mut hit_rate = 0.0;
        let mut max_win: f64 = 0.0;
        let mut mass = 0.0;
        for &(multiplier, probability) in points {
            rtp += multiplier * probability;
            mass += probability;
            if multiplier > 0.0 {
                hit_rate += probability;
                max_win = max_win.max(multiplier);
            }
        }

        let implicit_lose = (1.0 - mass).max(0.0);
        let mut variance = implicit_lose * rtp * rtp;
        for &(multiplier, probability) in points {
            let delta = multiplier - rtp;
            variance += probability * delta * delta;
        }

        let standard_deviation = variance.sqrt();
        Self {
            rtp,
            hit_rate,
            variance,
            standard_deviation,
            max_win,
            hit_frequency: (hit_rate > 0.0).then(|| 1.0 / hit_rate),
            volatility: Volatility::from_std_dev(standard_deviation),
        }
    }

    /// Compute from a normalized table
    pub fn from_odds(odds: &OddsTable) -> Self {
        Self::from_distribution(&odds.payout_points())
    }

    /// RTP as a percentage
    pub fn rtp_percent(&self) -> f64 {
        self.rtp * 100.0
    }

    /// Hit rate as a percentage
    pub fn hit_rate_percent(&self) -> f64 {
        self.hit_rate * 100.0
    }
}

/// Theoretical statistics of a config's prize table
pub fn compute_stats(config: &GameMathConfig) -> MathStats {
    MathStats::from_odds(&OddsTable::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MathConfigDocument, MathMode, PrizeTier};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_empty_distribution_is_zero() {
        let stats = MathStats::from_distribution(&[]);
        assert_eq!(stats.rtp, 0.0);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.variance, 0.0);
        assert_eq!(stats.max_win, 0.0);
        assert!(stats.hit_frequency.is_none());
    }

    #[test]
    fn test_single_tier_closed_form() {
        // 10× with p = 0.05: rtp 0.5, variance p(1−p)·10²
        let stats = MathStats::from_distribution(&[(10.0, 0.05)]);
        assert_abs_diff_eq!(stats.rtp, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.hit_rate, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.variance, 0.05 * 0.95 * 100.0, epsilon = 1e-9);
        assert_eq!(stats.max_win, 10.0);
        assert_abs_diff_eq!(stats.hit_frequency.unwrap(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_explicit_lose_row_changes_nothing() {
        let implicit = MathStats::from_distribution(&[(4.0, 0.1), (1.0, 0.3)]);
        let explicit = MathStats::from_distribution(&[(4.0, 0.1), (1.0, 0.3), (0.0, 0.6)]);
        assert_abs_diff_eq!(implicit.rtp, explicit.rtp, epsilon = 1e-12);
        assert_abs_diff_eq!(implicit.variance, explicit.variance, epsilon = 1e-12);
        assert_abs_diff_eq!(implicit.hit_rate, explicit.hit_rate, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_probability_tier_counts_for_max_win() {
        let stats = MathStats::from_distribution(&[(1000.0, 0.0), (2.0, 0.5)]);
        assert_eq!(stats.max_win, 1000.0);
        assert_abs_diff_eq!(stats.rtp, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compute_stats_from_config() {
        let config = MathConfigDocument::new(3, 3, MathMode::Pool)
            .with_win_symbols(["a", "b", "c"])
            .with_lose_symbols(["x", "y", "z"])
            .with_total_tickets(1000)
            .with_tier(PrizeTier::weighted("top", 50.0, 2))
            .with_tier(PrizeTier::weighted("mid", 5.0, 40))
            .with_tier(PrizeTier::weighted("low", 1.0, 200))
            .build()
            .unwrap();
        let stats = compute_stats(&config);
        assert_abs_diff_eq!(stats.rtp, 0.1 + 0.2 + 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.hit_rate, 0.242, epsilon = 1e-12);
        assert_eq!(stats.max_win, 50.0);
        assert_eq!(stats.volatility, Volatility::Low);
    }

    #[test]
    fn test_volatility_bands() {
        assert_eq!(Volatility::from_std_dev(1.0), Volatility::Low);
        assert_eq!(Volatility::from_std_dev(5.0), Volatility::Medium);
        assert_eq!(Volatility::from_std_dev(12.0), Volatility::High);
        assert_eq!(Volatility::from_std_dev(100.0), Volatility::Extreme);
    }
}
