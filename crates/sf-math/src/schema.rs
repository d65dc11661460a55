//! Certification schema exporter
//!
//! `transform_to_rgs` snapshots a config into a self-describing
//! [`RgsMathSchema`]. The flattened `prize_table` always closes: pool mode
//! carries an explicit `LOSE` row with the unassigned tickets, unlimited mode
//! adds one for any probability mass below 1. Stats are computed from the
//! flattened rows, so a third party re-derives the same numbers from
//! `prize_table` alone.

use serde::{Deserialize, Serialize};

use crate::config::{GameMathConfig, MathMode, SCHEMA_LOSE_TIER_ID, WinCondition, WinLogic};
use crate::odds::{Normalization, OddsTable};
use crate::stats::MathStats;

/// Version of the schema layout
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Producing engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
}

impl Default for EngineInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Mechanic family of a scratch game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanicKind {
    /// Every paying tier reveals N matching symbols
    MatchN,
    /// Every paying tier reveals a single target symbol
    FindTarget,
    /// Both condition families present
    Mixed,
    /// No paying tiers
    LoseOnly,
}

/// Mechanic descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicDescriptor {
    pub kind: MechanicKind,
    pub rows: u32,
    pub columns: u32,
    pub cells: usize,
    /// Distinct match counts across paying tiers, ascending
    pub match_counts: Vec<u32>,
    pub win_symbols: Vec<String>,
    pub lose_symbols: Vec<String>,
}

impl MechanicDescriptor {
    /// Classify a config's mechanic
    pub fn classify(config: &GameMathConfig) -> Self {
        let conditions: Vec<WinCondition> = config
            .prize_table()
            .iter()
            .filter_map(|t| t.effective_condition())
            .collect();
        let has_match = conditions
            .iter()
            .any(|c| matches!(c, WinCondition::Match { .. }));
        let has_find = conditions
            .iter()
            .any(|c| matches!(c, WinCondition::FindTarget { .. }));
        let kind = match (has_match, has_find) {
            (true, true) => MechanicKind::Mixed,
            (true, false) => MechanicKind::MatchN,
            (false, true) => MechanicKind::FindTarget,
            (false, false) => MechanicKind::LoseOnly,
        };

        let mut match_counts: Vec<u32> = conditions.iter().map(|c| c.match_count()).collect();
        match_counts.sort_unstable();
        match_counts.dedup();

        Self {
            kind,
            rows: config.rows(),
            columns: config.columns(),
            cells: config.cells(),
            match_counts,
            win_symbols: config.win_symbols().to_vec(),
            lose_symbols: config.lose_symbols().to_vec(),
        }
    }
}

/// One flattened paytable row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPrizeRow {
    pub tier: String,
    pub multiplier: f64,
    /// Tickets in the deck (pool mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    pub probability: f64,
    pub is_win: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Integrity block; filled in at certification time, never by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    pub content_hash: Option<String>,
    pub algorithm: Option<String>,
    pub certified_at: Option<String>,
}

impl Integrity {
    pub fn is_sealed(&self) -> bool {
        self.content_hash.is_some()
    }
}

/// Audit-ready math schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgsMathSchema {
    pub schema_version: String,
    pub engine: EngineInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    pub mechanic: MechanicDescriptor,
    pub math_mode: MathMode,
    pub win_logic: WinLogic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tickets: Option<u64>,
    pub ticket_price: f64,
    pub normalization: Normalization,
    pub prize_table: Vec<SchemaPrizeRow>,
    pub stats: MathStats,
    pub integrity: Integrity,
}

impl RgsMathSchema {
    /// Recompute stats from `prize_table` only
    pub fn rederive_stats(&self) -> MathStats {
        let points: Vec<(f64, f64)> = self
            .prize_table
            .iter()
            .map(|r| (r.multiplier, r.probability))
            .collect();
        MathStats::from_distribution(&points)
    }

    /// Sum of row weights (pool mode), `LOSE` included
    pub fn total_weight(&self) -> Option<u64> {
        match self.math_mode {
            MathMode::Pool => Some(self.prize_table.iter().filter_map(|r| r.weight).sum()),
            MathMode::Unlimited => None,
        }
    }

    /// Sum of row probabilities, `LOSE` included
    pub fn total_probability(&self) -> f64 {
        self.prize_table.iter().map(|r| r.probability).sum()
    }

    /// The synthetic losing row, if present
    pub fn lose_row(&self) -> Option<&SchemaPrizeRow> {
        self.prize_table.iter().find(|r| r.tier == SCHEMA_LOSE_TIER_ID)
    }

    /// Compact JSON with the integrity block cleared; the hashing input
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let mut unsealed = self.clone();
        unsealed.integrity = Integrity::default();
        serde_json::to_string(&unsealed)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Snapshot a config into a certification schema
pub fn transform_to_rgs(config: &GameMathConfig) -> RgsMathSchema {
    let odds = OddsTable::from_config(config);
    let mut prize_table: Vec<SchemaPrizeRow> = odds
        .entries()
        .iter()
        .map(|entry| {
            let condition = config.prize_table()[entry.tier_index].effective_condition();
            SchemaPrizeRow {
                tier: entry.tier_id.clone(),
                multiplier: entry.multiplier,
                weight: entry.weight,
                probability: entry.probability,
                is_win: entry.is_win,
                match_count: condition.as_ref().map(|c| c.match_count()),
                symbol: condition.as_ref().and_then(|c| c.symbol().map(str::to_string)),
            }
        })
        .collect();

    match config.math_mode() {
        MathMode::Pool => {
            // Pool tables are already in whole tickets of the deck
            let deck = config.total_tickets().unwrap_or(0);
            let assigned: u64 = prize_table.iter().filter_map(|r| r.weight).sum();
            prize_table.push(lose_row(
                Some(odds.residual_weight().unwrap_or(deck.saturating_sub(assigned))),
                odds.residual(),
            ));
        }
        MathMode::Unlimited => {
            if odds.residual() > 0.0 {
                prize_table.push(lose_row(None, odds.residual()));
            }
        }
    }

    let mut schema = RgsMathSchema {
        schema_version: SCHEMA_VERSION.to_string(),
        engine: EngineInfo::default(),
        game_id: config.game_id().map(str::to_string),
        mechanic: MechanicDescriptor::classify(config),
        math_mode: config.math_mode(),
        win_logic: config.win_logic(),
        total_tickets: config.total_tickets(),
        ticket_price: config.ticket_price(),
        normalization: odds.normalization(),
        prize_table,
        stats: MathStats::default(),
        integrity: Integrity::default(),
    };
    schema.stats = schema.rederive_stats();
    log::debug!(
        "Exported schema: {} rows, RTP {:.4}, hit rate {:.4}",
        schema.prize_table.len(),
        schema.stats.rtp,
        schema.stats.hit_rate
    );
    schema
}

fn lose_row(weight: Option<u64>, probability: f64) -> SchemaPrizeRow {
    SchemaPrizeRow {
        tier: SCHEMA_LOSE_TIER_ID.to_string(),
        multiplier: 0.0,
        weight,
        probability,
        is_win: false,
        match_count: None,
        symbol: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MathConfigDocument, PrizeTier};
    use crate::stats::compute_stats;
    use approx::assert_abs_diff_eq;

    fn pool() -> GameMathConfig {
        MathConfigDocument::new(3, 3, MathMode::Pool)
            .with_game_id("lucky-gems")
            .with_win_symbols(["gem", "coin", "star"])
            .with_lose_symbols(["rock", "leaf", "shell"])
            .with_total_tickets(500)
            .with_tier(PrizeTier::weighted("top", 100.0, 1))
            .with_tier(
                PrizeTier::weighted("find", 2.0, 60)
                    .with_condition(WinCondition::FindTarget { symbol: Some("star".into()) }),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_pool_schema_has_lose_row() {
        let schema = transform_to_rgs(&pool());
        assert_eq!(schema.prize_table.len(), 3);
        let lose = schema.lose_row().unwrap();
        assert_eq!(lose.weight, Some(439));
        assert_eq!(schema.total_weight(), Some(500));
        assert_eq!(schema.mechanic.kind, MechanicKind::Mixed);
        assert_eq!(schema.mechanic.match_counts, vec![1, 3]);
        assert_eq!(schema.game_id.as_deref(), Some("lucky-gems"));
        assert!(!schema.integrity.is_sealed());
    }

    #[test]
    fn test_schema_stats_match_calculator() {
        let config = pool();
        let schema = transform_to_rgs(&config);
        let direct = compute_stats(&config);
        assert_abs_diff_eq!(schema.stats.rtp, direct.rtp, epsilon = 1e-12);
        assert_abs_diff_eq!(schema.stats.variance, direct.variance, epsilon = 1e-12);
        assert_eq!(schema.rederive_stats(), schema.stats);
    }

    #[test]
    fn test_unlimited_lose_row_only_below_one() {
        let full = MathConfigDocument::new(2, 2, MathMode::Unlimited)
            .with_win_symbols(["a"])
            .with_lose_symbols(["x", "y"])
            .with_tier(PrizeTier::with_probability("all", 1.0, 1.0))
            .build()
            .unwrap();
        assert!(transform_to_rgs(&full).lose_row().is_none());

        let mut partial = full
            .to_document()
            .with_tier(PrizeTier::with_probability("extra", 0.0, 0.0).with_win_flag(false));
        partial.prize_table[0].probability = Some(0.4);
        let schema = transform_to_rgs(&GameMathConfig::new(partial).unwrap());
        assert_abs_diff_eq!(schema.lose_row().unwrap().probability, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(schema.total_probability(), 1.0, epsilon = 1e-12);
    }

    fn assert_rows_match_deck(schema: &RgsMathSchema, deck: u64) {
        assert_eq!(schema.total_weight(), Some(deck));
        for row in &schema.prize_table {
            let weight = row.weight.unwrap();
            assert_abs_diff_eq!(row.probability, weight as f64 / deck as f64, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(schema.total_probability(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_over_allocated_pool_conserves_tickets() {
        let config = MathConfigDocument::new(3, 3, MathMode::Pool)
            .with_win_symbols(["gem", "coin", "star"])
            .with_lose_symbols(["rock", "leaf"])
            .with_total_tickets(10)
            .with_tier(PrizeTier::weighted("big", 5.0, 8))
            .with_tier(PrizeTier::weighted("small", 1.0, 8))
            .build()
            .unwrap();
        let schema = transform_to_rgs(&config);
        assert_eq!(schema.normalization, Normalization::OverAllocatedDeck);
        assert_rows_match_deck(&schema, 10);
        assert_eq!(schema.lose_row().unwrap().weight, Some(0));
        assert_abs_diff_eq!(schema.stats.rtp, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_raw_fallback_rows_agree_with_weights() {
        let config = MathConfigDocument::new(3, 3, MathMode::Pool)
            .with_win_symbols(["gem", "coin", "star"])
            .with_lose_symbols(["rock", "leaf"])
            .with_total_tickets(10)
            .with_tier(PrizeTier::weighted("t1", 2.0, 1))
            .with_tier(PrizeTier::weighted("t2", 2.0, 1))
            .with_tier(PrizeTier::with_probability("t3", 2.0, 1.0))
            .build()
            .unwrap();
        let schema = transform_to_rgs(&config);
        assert_eq!(schema.normalization, Normalization::RawFallback);
        assert_rows_match_deck(&schema, 10);
        assert_eq!(schema.rederive_stats(), compute_stats(&config));
    }

    #[test]
    fn test_canonical_json_ignores_integrity() {
        let mut schema = transform_to_rgs(&pool());
        let before = schema.canonical_json().unwrap();
        schema.integrity.content_hash = Some("abc".into());
        assert_eq!(schema.canonical_json().unwrap(), before);
    }

    #[test]
    fn test_schema_json_shape() {
        let schema = transform_to_rgs(&pool());
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["math_mode"], "pool");
        assert_eq!(value["win_logic"], "single-win");
        assert_eq!(value["mechanic"]["kind"], "mixed");
        assert_eq!(value["prize_table"][2]["tier"], "LOSE");
        assert!(value["integrity"]["content_hash"].is_null());
        assert!(value["stats"]["rtp"].is_number());
    }

    #[test]
    fn test_lose_only_mechanic() {
        let config = MathConfigDocument::new(2, 2, MathMode::Pool)
            .with_win_symbols(["a"])
            .with_lose_symbols(["x", "y"])
            .with_total_tickets(10)
            .build()
            .unwrap();
        let schema = transform_to_rgs(&config);
        assert_eq!(schema.mechanic.kind, MechanicKind::LoseOnly);
        assert_eq!(schema.prize_table.len(), 1);
        assert_eq!(schema.total_weight(), Some(10));
        assert_eq!(schema.stats, MathStats::default());
    }
}
