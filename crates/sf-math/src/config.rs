//! Game math configuration
//!
//! `MathConfigDocument` is the wire form handed over by the authoring layer
//! (camelCase JSON/YAML). `GameMathConfig` is the validated, immutable value
//! the engine reads. Prize odds are carried as a tagged [`TierOdds`] chosen by
//! the config's [`MathMode`] when the document is converted.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ConfigError, MathError, MathResult};

/// Minimum number of equal symbols that reads as a match
pub const MIN_MATCH: u32 = 3;

/// Tier id of the implicit losing outcome produced by the resolver
pub const DEFAULT_LOSE_TIER_ID: &str = "default_lose";

/// Tier id of the synthetic losing row in the certification schema
pub const SCHEMA_LOSE_TIER_ID: &str = "LOSE";

/// Upper bound on grid cells
pub const MAX_GRID_CELLS: u64 = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// How many tier conditions one grid may satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinLogic {
    /// Exactly one winning pattern per grid
    #[default]
    SingleWin,
    /// Secondary patterns tolerated
    MultiWin,
}

/// How prize odds are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    /// Finite deck: integer ticket counts out of `totalTickets`
    Pool,
    /// Fixed per-round probabilities
    Unlimited,
}

impl MathMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::Unlimited => "unlimited",
        }
    }
}

/// Win condition of a prize tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WinCondition {
    /// Reveal `count` copies of one symbol
    Match {
        count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
    },
    /// Reveal a single target symbol
    FindTarget {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
    },
}

impl WinCondition {
    /// Classic match-3 with a symbol drawn from the win pool
    pub fn match_three() -> Self {
        Self::Match {
            count: MIN_MATCH,
            symbol: None,
        }
    }

    /// Number of prize symbols placed on the grid
    pub fn match_count(&self) -> u32 {
        match self {
            Self::Match { count, .. } => *count,
            Self::FindTarget { .. } => 1,
        }
    }

    /// Fixed prize symbol, if the condition names one
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Match { symbol, .. } | Self::FindTarget { symbol } => symbol.as_deref(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRIZE TIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Odds of a prize tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierOdds {
    /// Ticket count out of the deck (pool mode)
    Weighted(u64),
    /// Per-round probability (unlimited mode)
    Probability(f64),
}

impl TierOdds {
    /// Does this variant belong to the given math mode?
    pub fn matches(&self, mode: MathMode) -> bool {
        matches!(
            (self, mode),
            (Self::Weighted(_), MathMode::Pool) | (Self::Probability(_), MathMode::Unlimited)
        )
    }

    /// The bare numeric field, used for the mismatch fallback
    pub fn raw(&self) -> f64 {
        match self {
            Self::Weighted(weight) => *weight as f64,
            Self::Probability(probability) => *probability,
        }
    }

    pub fn weight(&self) -> Option<u64> {
        match self {
            Self::Weighted(weight) => Some(*weight),
            Self::Probability(_) => None,
        }
    }

    pub fn probability(&self) -> Option<f64> {
        match self {
            Self::Weighted(_) => None,
            Self::Probability(probability) => Some(*probability),
        }
    }
}

/// One paytable row
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeTier {
    /// Tier identifier
    pub id: String,
    /// Prize as a multiplier of the ticket price
    pub value: f64,
    /// Odds of this tier
    pub odds: TierOdds,
    /// Does this tier pay?
    pub is_win: bool,
    /// Pattern revealed when this tier fires
    pub win_condition: Option<WinCondition>,
}

impl PrizeTier {
    /// Pool-mode tier with a ticket count
    pub fn weighted(id: impl Into<String>, value: f64, weight: u64) -> Self {
        Self {
            id: id.into(),
            value,
            odds: TierOdds::Weighted(weight),
            is_win: value > 0.0,
            win_condition: None,
        }
    }

    /// Unlimited-mode tier with a per-round probability
    pub fn with_probability(id: impl Into<String>, value: f64, probability: f64) -> Self {
        Self {
            id: id.into(),
            value,
            odds: TierOdds::Probability(probability),
            is_win: value > 0.0,
            win_condition: None,
        }
    }

    /// Builder: set win condition
    pub fn with_condition(mut self, condition: WinCondition) -> Self {
        self.win_condition = Some(condition);
        self
    }

    /// Builder: override the win flag
    pub fn with_win_flag(mut self, is_win: bool) -> Self {
        self.is_win = is_win;
        self
    }

    /// Condition used to build the grid; winning tiers default to match-3
    pub fn effective_condition(&self) -> Option<WinCondition> {
        if !self.is_win {
            return None;
        }
        Some(
            self.win_condition
                .clone()
                .unwrap_or_else(WinCondition::match_three),
        )
    }

    /// Payout multiplier (0 for losing tiers)
    pub fn payout_multiplier(&self) -> f64 {
        if self.is_win { self.value } else { 0.0 }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Wire form of a prize tier: both odds fields optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeTierDocument {
    pub id: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_win: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_condition: Option<WinCondition>,
}

impl From<&PrizeTier> for PrizeTierDocument {
    fn from(tier: &PrizeTier) -> Self {
        Self {
            id: tier.id.clone(),
            value: tier.value,
            probability: tier.odds.probability(),
            weight: tier.odds.weight().map(|w| w as f64),
            is_win: Some(tier.is_win),
            win_condition: tier.win_condition.clone(),
        }
    }
}

fn default_ticket_price() -> f64 {
    1.0
}

/// Wire form of a game math configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    pub rows: u32,
    pub columns: u32,
    pub win_symbols: Vec<String>,
    pub lose_symbols: Vec<String>,
    #[serde(default)]
    pub win_logic: WinLogic,
    pub math_mode: MathMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tickets: Option<u64>,
    #[serde(default = "default_ticket_price")]
    pub ticket_price: f64,
    #[serde(default)]
    pub prize_table: Vec<PrizeTierDocument>,
}

impl MathConfigDocument {
    /// Start a document for a `rows × columns` grid
    pub fn new(rows: u32, columns: u32, math_mode: MathMode) -> Self {
        Self {
            game_id: None,
            rows,
            columns,
            win_symbols: Vec::new(),
            lose_symbols: Vec::new(),
            win_logic: WinLogic::default(),
            math_mode,
            total_tickets: None,
            ticket_price: default_ticket_price(),
            prize_table: Vec::new(),
        }
    }

    /// Builder: set game id
    pub fn with_game_id(mut self, id: impl Into<String>) -> Self {
        self.game_id = Some(id.into());
        self
    }

    /// Builder: set win symbol pool
    pub fn with_win_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.win_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set lose symbol pool
    pub fn with_lose_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lose_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set win logic
    pub fn with_win_logic(mut self, logic: WinLogic) -> Self {
        self.win_logic = logic;
        self
    }

    /// Builder: set deck size (pool mode)
    pub fn with_total_tickets(mut self, total: u64) -> Self {
        self.total_tickets = Some(total);
        self
    }

    /// Builder: set ticket price
    pub fn with_ticket_price(mut self, price: f64) -> Self {
        self.ticket_price = price;
        self
    }

    /// Builder: append a prize tier
    pub fn with_tier(mut self, tier: PrizeTier) -> Self {
        self.prize_table.push(PrizeTierDocument::from(&tier));
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<GameMathConfig, ConfigError> {
        GameMathConfig::new(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME MATH CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated, read-only game math configuration.
///
/// Edits go through [`GameMathConfig::to_document`] and a fresh
/// [`GameMathConfig::new`]; a value in use is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MathConfigDocument", into = "MathConfigDocument")]
pub struct GameMathConfig {
    game_id: Option<String>,
    rows: u32,
    columns: u32,
    win_symbols: Vec<String>,
    lose_symbols: Vec<String>,
    win_logic: WinLogic,
    math_mode: MathMode,
    total_tickets: Option<u64>,
    ticket_price: f64,
    prize_table: Vec<PrizeTier>,
    /// Tiers left out of `prize_table`, reported through `diagnostics`
    dropped_tiers: Vec<ConfigWarning>,
}

impl GameMathConfig {
    /// Validate a wire document
    pub fn new(doc: MathConfigDocument) -> Result<Self, ConfigError> {
        if doc.rows == 0 || doc.columns == 0 {
            return Err(ConfigError::EmptyGrid {
                rows: doc.rows,
                columns: doc.columns,
            });
        }
        let cells = doc.rows as u64 * doc.columns as u64;
        if cells > MAX_GRID_CELLS {
            return Err(ConfigError::GridTooLarge {
                cells,
                max: MAX_GRID_CELLS,
            });
        }

        let win_symbols = dedup_symbols(doc.win_symbols, "winSymbols")?;
        let lose_symbols = dedup_symbols(doc.lose_symbols, "loseSymbols")?;

        let total_tickets = match doc.math_mode {
            MathMode::Pool => match doc.total_tickets {
                Some(total) if total > 0 => Some(total),
                _ => return Err(ConfigError::MissingTotalTickets),
            },
            MathMode::Unlimited => doc.total_tickets,
        };

        if !doc.ticket_price.is_finite() || doc.ticket_price <= 0.0 {
            return Err(ConfigError::InvalidTicketPrice(doc.ticket_price));
        }

        // A malformed tier is dropped, never fatal: the rest of the table
        // still resolves and an empty table always loses.
        let mut seen = HashSet::new();
        let mut prize_table = Vec::with_capacity(doc.prize_table.len());
        let mut dropped_tiers = Vec::new();
        for (index, tier) in doc.prize_table.into_iter().enumerate() {
            let id = tier.id.clone();
            let checked = convert_tier(tier, doc.math_mode).and_then(|tier| {
                if seen.insert(tier.id.clone()) {
                    Ok(tier)
                } else {
                    Err(TierDefect::DuplicateId)
                }
            });
            match checked {
                Ok(tier) => prize_table.push(tier),
                Err(defect) => {
                    log::warn!("Dropping prize tier #{} '{}': {}", index, id, defect);
                    dropped_tiers.push(ConfigWarning::MalformedTier {
                        index,
                        tier: id,
                        defect,
                    });
                }
            }
        }

        Ok(Self {
            game_id: doc.game_id,
            rows: doc.rows,
            columns: doc.columns,
            win_symbols,
            lose_symbols,
            win_logic: doc.win_logic,
            math_mode: doc.math_mode,
            total_tickets,
            ticket_price: doc.ticket_price,
            prize_table,
            dropped_tiers,
        })
    }

    /// Parse and validate JSON
    pub fn from_json(json: &str) -> MathResult<Self> {
        let doc: MathConfigDocument = serde_json::from_str(json)?;
        Ok(Self::new(doc)?)
    }

    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> MathResult<Self> {
        let doc: MathConfigDocument = serde_yml::from_str(yaml)?;
        Ok(Self::new(doc)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: impl AsRef<Path>) -> MathResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            other => Err(MathError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Back to the editable wire form
    pub fn to_document(&self) -> MathConfigDocument {
        MathConfigDocument::from(self.clone())
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// Total grid cells (`rows × columns`)
    pub fn cells(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn win_symbols(&self) -> &[String] {
        &self.win_symbols
    }

    pub fn lose_symbols(&self) -> &[String] {
        &self.lose_symbols
    }

    pub fn win_logic(&self) -> WinLogic {
        self.win_logic
    }

    pub fn math_mode(&self) -> MathMode {
        self.math_mode
    }

    /// Deck size (always `Some` in pool mode)
    pub fn total_tickets(&self) -> Option<u64> {
        self.total_tickets
    }

    pub fn ticket_price(&self) -> f64 {
        self.ticket_price
    }

    pub fn prize_table(&self) -> &[PrizeTier] {
        &self.prize_table
    }

    /// Do all tiers carry the odds field matching the math mode?
    pub fn odds_consistent(&self) -> bool {
        self.prize_table
            .iter()
            .all(|t| t.odds.matches(self.math_mode))
    }

    /// Non-fatal configuration issues for the authoring layer
    pub fn diagnostics(&self) -> Vec<ConfigWarning> {
        let mut warnings = self.dropped_tiers.clone();
        let cells = self.cells();

        for tier in &self.prize_table {
            if !tier.odds.matches(self.math_mode) {
                warnings.push(ConfigWarning::OddsModeMismatch {
                    tier: tier.id.clone(),
                    mode: self.math_mode,
                });
            }
            if tier.is_win && tier.odds.raw() <= 0.0 {
                warnings.push(ConfigWarning::UnreachableTier {
                    tier: tier.id.clone(),
                });
            }
            if tier.is_win != (tier.value > 0.0) {
                warnings.push(ConfigWarning::WinFlagMismatch {
                    tier: tier.id.clone(),
                    value: tier.value,
                    is_win: tier.is_win,
                });
            }
            if let Some(condition) = tier.effective_condition() {
                let count = condition.match_count() as usize;
                if count > cells {
                    warnings.push(ConfigWarning::MatchCountExceedsGrid {
                        tier: tier.id.clone(),
                        count,
                        cells,
                    });
                }
                if let Some(symbol) = condition.symbol() {
                    if !self.win_symbols.iter().any(|s| s == symbol) {
                        warnings.push(ConfigWarning::ForeignPrizeSymbol {
                            tier: tier.id.clone(),
                            symbol: symbol.to_string(),
                        });
                    }
                }
            }
        }

        if self.odds_consistent() {
            match self.math_mode {
                MathMode::Pool => {
                    let assigned: u64 = self
                        .prize_table
                        .iter()
                        .filter_map(|t| t.odds.weight())
                        .sum();
                    let total = self.total_tickets.unwrap_or(0);
                    if assigned > total {
                        warnings.push(ConfigWarning::PoolOverAllocated { assigned, total });
                    }
                }
                MathMode::Unlimited => {
                    let sum: f64 = self
                        .prize_table
                        .iter()
                        .filter_map(|t| t.odds.probability())
                        .sum();
                    if sum > 1.0 + PROBABILITY_EPSILON {
                        warnings.push(ConfigWarning::ProbabilityOverflow { sum });
                    }
                }
            }
        }

        let shared: Vec<String> = self
            .win_symbols
            .iter()
            .filter(|s| self.lose_symbols.contains(s))
            .cloned()
            .collect();
        if !shared.is_empty() {
            warnings.push(ConfigWarning::OverlappingSymbolPools { symbols: shared });
        }

        let capacity = crate::grid::SymbolCaps::from_config(self).losing_capacity();
        if capacity < cells {
            warnings.push(ConfigWarning::LosingGridUnsatisfiable { cells, capacity });
        }

        warnings
    }
}

/// Tolerance for probability sums
pub const PROBABILITY_EPSILON: f64 = 1e-9;

impl From<GameMathConfig> for MathConfigDocument {
    fn from(config: GameMathConfig) -> Self {
        Self {
            game_id: config.game_id,
            rows: config.rows,
            columns: config.columns,
            win_symbols: config.win_symbols,
            lose_symbols: config.lose_symbols,
            win_logic: config.win_logic,
            math_mode: config.math_mode,
            total_tickets: config.total_tickets,
            ticket_price: config.ticket_price,
            prize_table: config.prize_table.iter().map(PrizeTierDocument::from).collect(),
        }
    }
}

impl TryFrom<MathConfigDocument> for GameMathConfig {
    type Error = ConfigError;

    fn try_from(doc: MathConfigDocument) -> Result<Self, Self::Error> {
        Self::new(doc)
    }
}

fn dedup_symbols(symbols: Vec<String>, pool: &'static str) -> Result<Vec<String>, ConfigError> {
    if symbols.is_empty() {
        return Err(ConfigError::EmptySymbolPool(pool));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if symbol.trim().is_empty() {
            return Err(ConfigError::BlankSymbol(pool));
        }
        if seen.insert(symbol.clone()) {
            out.push(symbol);
        }
    }
    Ok(out)
}

/// Pick the odds variant for the mode; the other field only fills in when
/// the matching one is absent.
fn convert_tier(doc: PrizeTierDocument, mode: MathMode) -> Result<PrizeTier, TierDefect> {
    if doc.id.trim().is_empty() {
        return Err(TierDefect::BlankId);
    }
    if doc.id == DEFAULT_LOSE_TIER_ID || doc.id == SCHEMA_LOSE_TIER_ID {
        return Err(TierDefect::ReservedId);
    }
    if !doc.value.is_finite() || doc.value < 0.0 {
        return Err(TierDefect::InvalidValue { value: doc.value });
    }

    let weighted = |weight: f64| {
        if !weight.is_finite() || weight < 0.0 || weight.fract() != 0.0 {
            return Err(TierDefect::InvalidWeight { weight });
        }
        Ok(TierOdds::Weighted(weight as u64))
    };
    let probable = |probability: f64| {
        if !probability.is_finite() || probability < 0.0 {
            return Err(TierDefect::InvalidProbability { probability });
        }
        Ok(TierOdds::Probability(probability))
    };

    let odds = match (mode, doc.weight, doc.probability) {
        (MathMode::Pool, Some(w), _) => weighted(w)?,
        (MathMode::Pool, None, Some(p)) => probable(p)?,
        (MathMode::Pool, None, None) => TierOdds::Weighted(0),
        (MathMode::Unlimited, _, Some(p)) => probable(p)?,
        (MathMode::Unlimited, Some(w), None) => weighted(w)?,
        (MathMode::Unlimited, None, None) => TierOdds::Probability(0.0),
    };

    if let Some(WinCondition::Match { count: 0, .. }) = doc.win_condition {
        return Err(TierDefect::ZeroMatchCount);
    }

    Ok(PrizeTier {
        is_win: doc.is_win.unwrap_or(doc.value > 0.0),
        id: doc.id,
        value: doc.value,
        odds,
        win_condition: doc.win_condition,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a prize tier was left out of the table
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDefect {
    #[error("empty id")]
    BlankId,

    #[error("id is reserved for the losing outcome")]
    ReservedId,

    #[error("id already used by an earlier tier")]
    DuplicateId,

    #[error("value must be finite and non-negative (got {value})")]
    InvalidValue { value: f64 },

    #[error("probability must be finite and non-negative (got {probability})")]
    InvalidProbability { probability: f64 },

    #[error("weight must be a non-negative whole ticket count (got {weight})")]
    InvalidWeight { weight: f64 },

    #[error("match count must be at least 1")]
    ZeroMatchCount,
}

/// Recoverable configuration issue; the engine degrades instead of failing
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    #[error("Tier '{tier}' does not carry the odds field for {mode:?} mode; table falls back to raw-weight normalization")]
    OddsModeMismatch { tier: String, mode: MathMode },

    #[error("Prize tier #{index} '{tier}' dropped: {defect}")]
    MalformedTier { index: usize, tier: String, defect: TierDefect },

    #[error("Winning tier '{tier}' has zero odds and can never fire")]
    UnreachableTier { tier: String },

    #[error("Tier '{tier}' has value {value} but isWin = {is_win}")]
    WinFlagMismatch { tier: String, value: f64, is_win: bool },

    #[error("Tier '{tier}' needs {count} symbols but the grid has {cells} cells")]
    MatchCountExceedsGrid { tier: String, count: usize, cells: usize },

    #[error("Tier '{tier}' names prize symbol '{symbol}' outside winSymbols")]
    ForeignPrizeSymbol { tier: String, symbol: String },

    #[error("Pool assigns {assigned} tickets but the deck holds {total}")]
    PoolOverAllocated { assigned: u64, total: u64 },

    #[error("Tier probabilities sum to {sum} (> 1); table is normalized")]
    ProbabilityOverflow { sum: f64 },

    #[error("Symbols {symbols:?} are in both winSymbols and loseSymbols")]
    OverlappingSymbolPools { symbols: Vec<String> },

    #[error("Symbol pools cover {capacity} cells without a match but the grid has {cells}")]
    LosingGridUnsatisfiable { cells: usize, capacity: usize },
}
