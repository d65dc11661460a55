//! Grid materializer: builds the reveal map for a resolved tier
//!
//! A losing grid must not read as any tier's win; a winning grid shows the
//! prize symbol exactly `matchCount` times and, under single-win logic, no
//! second pattern. Both rules reduce to per-symbol caps: the most copies of a
//! symbol that can appear without completing a condition.
//!
//! ```text
//! ResolvedTier ──► win?  ──► place prize × N ──► fill (capped) ──► GridReveal
//!                  lose? ──► fill from lose pool ──► corrective pass ─┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{GameMathConfig, MIN_MATCH, PrizeTier, WinCondition, WinLogic};
use crate::resolver::ResolvedTier;
use crate::rng::RandomSource;

/// Cap for symbols no tier names: one short of a match
const DEFAULT_CAP: usize = (MIN_MATCH - 1) as usize;

// ═══════════════════════════════════════════════════════════════════════════════
// SYMBOL CAPS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum non-winning occurrences per symbol
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolCaps {
    caps: HashMap<String, usize>,
    /// Lose pool first, then win pool; replacement search order
    order: Vec<String>,
}

impl SymbolCaps {
    /// Derive caps from every winning tier's condition.
    ///
    /// A named symbol with an N-match condition is capped at N−1; an unnamed
    /// condition caps every win symbol the same way.
    pub fn from_config(config: &GameMathConfig) -> Self {
        let mut order: Vec<String> = Vec::new();
        for symbol in config.lose_symbols().iter().chain(config.win_symbols()) {
            if !order.contains(symbol) {
                order.push(symbol.clone());
            }
        }

        let mut caps: HashMap<String, usize> =
            order.iter().map(|s| (s.clone(), DEFAULT_CAP)).collect();

        for tier in config.prize_table() {
            let Some(condition) = tier.effective_condition() else {
                continue;
            };
            let limit = condition.match_count().saturating_sub(1) as usize;
            match condition.symbol() {
                Some(symbol) => {
                    let cap = caps.entry(symbol.to_string()).or_insert(DEFAULT_CAP);
                    *cap = (*cap).min(limit);
                }
                None => {
                    for symbol in config.win_symbols() {
                        if let Some(cap) = caps.get_mut(symbol) {
                            *cap = (*cap).min(limit);
                        }
                    }
                }
            }
        }

        Self { caps, order }
    }

    /// Cap for a symbol
    pub fn cap(&self, symbol: &str) -> usize {
        self.caps.get(symbol).copied().unwrap_or(DEFAULT_CAP)
    }

    /// Replacement search order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Cells a losing grid can fill without any symbol exceeding its cap
    pub fn losing_capacity(&self) -> usize {
        self.order.iter().map(|s| self.cap(s)).sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRID REVEAL
// ═══════════════════════════════════════════════════════════════════════════════

/// A materialized grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridReveal {
    /// Row-major symbol ids, length `rows × columns`
    pub cells: Vec<String>,
    /// Prize symbol on a winning grid
    pub winning_symbol: Option<String>,
    /// Sorted cell indices holding the prize symbol
    pub winning_cells: Vec<usize>,
}

/// Grid that breaks the reveal invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridViolation {
    #[error("Grid has {actual} cells, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Losing grid shows {count} × '{symbol}' (cap {cap})")]
    AccidentalMatch { symbol: String, count: usize, cap: usize },

    #[error("Winning grid shows {actual} × prize '{symbol}', expected {expected}")]
    PrizeCount { symbol: String, expected: usize, actual: usize },

    #[error("Winning grid shows secondary pattern {count} × '{symbol}' (cap {cap})")]
    SecondaryMatch { symbol: String, count: usize, cap: usize },

    #[error("Prize pattern '{symbol}' also satisfies tier '{tier}'")]
    OverlappingPrize { symbol: String, tier: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATERIALIZER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds reveal maps consistent with exactly one resolved tier
#[derive(Debug, Clone)]
pub struct GridMaterializer<'a> {
    config: &'a GameMathConfig,
    caps: SymbolCaps,
}

impl<'a> GridMaterializer<'a> {
    pub fn new(config: &'a GameMathConfig) -> Self {
        Self {
            caps: SymbolCaps::from_config(config),
            config,
        }
    }

    pub fn caps(&self) -> &SymbolCaps {
        &self.caps
    }

    /// Condition to render for a tier, `None` when the grid must lose
    fn condition_for(&self, tier: &ResolvedTier) -> Option<WinCondition> {
        if !tier.is_win {
            return None;
        }
        tier.tier_index
            .and_then(|i| self.config.prize_table().get(i))
            .and_then(|t| t.effective_condition())
    }

    /// Build the grid for a resolved tier
    pub fn materialize<R: RandomSource>(&self, tier: &ResolvedTier, rng: &mut R) -> GridReveal {
        match self.condition_for(tier) {
            Some(condition) => self.winning_grid(tier.tier_index, &condition, rng),
            None => GridReveal {
                cells: self.losing_grid(rng),
                winning_symbol: None,
                winning_cells: Vec::new(),
            },
        }
    }

    /// Fill from the lose pool, then break any accidental match
    pub fn losing_grid<R: RandomSource>(&self, rng: &mut R) -> Vec<String> {
        let pool = self.config.lose_symbols();
        let mut cells: Vec<String> = (0..self.config.cells())
            .map(|_| pool[rng.index(pool.len())].clone())
            .collect();
        break_accidental_matches(&mut cells, &self.caps, &pool[0]);
        cells
    }

    /// First winning tier other than `tier_index` whose condition is met by
    /// `count` copies of `symbol`
    fn claimant(&self, tier_index: Option<usize>, symbol: &str, count: usize) -> Option<&PrizeTier> {
        let in_win_pool = self.config.win_symbols().iter().any(|s| s == symbol);
        self.config
            .prize_table()
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != tier_index)
            .map(|(_, t)| t)
            .find(|t| match t.effective_condition() {
                Some(WinCondition::Match { count: n, symbol: named }) => {
                    count >= n as usize && named.as_deref().map_or(in_win_pool, |s| s == symbol)
                }
                Some(WinCondition::FindTarget { symbol: named }) => {
                    named.as_deref().map_or(in_win_pool, |s| s == symbol)
                }
                None => false,
            })
    }

    /// Win symbols an unnamed condition may place `count` times.
    ///
    /// Under single-win, symbols whose pattern would also satisfy another
    /// tier are left out; if that leaves nothing, the whole pool is used.
    fn prize_candidates(&self, tier_index: Option<usize>, count: usize) -> Vec<&String> {
        let pool: Vec<&String> = self.config.win_symbols().iter().collect();
        if self.config.win_logic() == WinLogic::MultiWin {
            return pool;
        }
        let free: Vec<&String> = pool
            .iter()
            .copied()
            .filter(|s| self.claimant(tier_index, s, count).is_none())
            .collect();
        if free.is_empty() {
            log::warn!(
                "Every win symbol × {} also satisfies another tier; prize drawn from the full pool",
                count
            );
            pool
        } else {
            free
        }
    }

    /// Place the prize symbol `matchCount` times and fill the rest
    pub fn winning_grid<R: RandomSource>(
        &self,
        tier_index: Option<usize>,
        condition: &WinCondition,
        rng: &mut R,
    ) -> GridReveal {
        let total = self.config.cells();
        let count = (condition.match_count() as usize).clamp(1, total);
        let prize = match condition.symbol() {
            Some(symbol) => symbol.to_string(),
            None => {
                let candidates = self.prize_candidates(tier_index, count);
                candidates[rng.index(candidates.len())].clone()
            }
        };

        let positions = sample_positions(rng, total, count);
        let mut grid: Vec<Option<String>> = vec![None; total];
        for &p in &positions {
            grid[p] = Some(prize.clone());
        }

        let mut candidates: Vec<&String> = Vec::new();
        for symbol in self.config.win_symbols().iter().chain(self.config.lose_symbols()) {
            if *symbol != prize && !candidates.contains(&symbol) {
                candidates.push(symbol);
            }
        }

        // First lose symbol that is not the prize; the prize only when the
        // pools hold nothing else
        let fallback = self
            .config
            .lose_symbols()
            .iter()
            .chain(self.config.win_symbols())
            .find(|s| **s != prize)
            .unwrap_or(&prize);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut cells = Vec::with_capacity(total);
        for slot in grid {
            let symbol = match slot {
                Some(symbol) => symbol,
                None => {
                    let chosen = self.pick_filler(&candidates, &counts, rng).unwrap_or_else(|| {
                        log::warn!("No filler passes the guard; using '{}'", fallback);
                        fallback
                    });
                    *counts.entry(chosen.as_str()).or_insert(0) += 1;
                    chosen.clone()
                }
            };
            cells.push(symbol);
        }

        GridReveal {
            cells,
            winning_symbol: Some(prize),
            winning_cells: positions,
        }
    }

    /// Choose a filler symbol.
    ///
    /// Single-win prefers symbols not yet on the grid, then symbols still
    /// under their cap. Multi-win draws from every candidate.
    fn pick_filler<'c, R: RandomSource>(
        &self,
        candidates: &[&'c String],
        counts: &HashMap<&str, usize>,
        rng: &mut R,
    ) -> Option<&'c String> {
        if candidates.is_empty() {
            return None;
        }
        if self.config.win_logic() == WinLogic::MultiWin {
            return Some(candidates[rng.index(candidates.len())]);
        }

        let count = |s: &str| counts.get(s).copied().unwrap_or(0);
        let strict: Vec<&'c String> = candidates
            .iter()
            .copied()
            .filter(|s| count(s) == 0 && self.caps.cap(s) >= 1)
            .collect();
        if !strict.is_empty() {
            return Some(strict[rng.index(strict.len())]);
        }
        let relaxed: Vec<&'c String> = candidates
            .iter()
            .copied()
            .filter(|s| count(s) < self.caps.cap(s))
            .collect();
        if relaxed.is_empty() {
            None
        } else {
            Some(relaxed[rng.index(relaxed.len())])
        }
    }

    /// Check a reveal against the tier it was built for
    pub fn audit(&self, tier: &ResolvedTier, reveal: &GridReveal) -> Result<(), GridViolation> {
        let expected = self.config.cells();
        if reveal.cells.len() != expected {
            return Err(GridViolation::WrongLength {
                expected,
                actual: reveal.cells.len(),
            });
        }

        let counts = tally(&reveal.cells);
        let over_cap = |skip: Option<&str>| {
            // Walk cells, not the map, so the reported symbol is deterministic
            reveal.cells.iter().find_map(|s| {
                let count = counts[s.as_str()];
                let cap = self.caps.cap(s);
                (Some(s.as_str()) != skip && count > cap).then(|| (s.clone(), count, cap))
            })
        };

        match self.condition_for(tier) {
            None => match over_cap(None) {
                Some((symbol, count, cap)) => Err(GridViolation::AccidentalMatch { symbol, count, cap }),
                None => Ok(()),
            },
            Some(condition) => {
                let prize = reveal.winning_symbol.clone().unwrap_or_default();
                let want = (condition.match_count() as usize).clamp(1, expected);
                let actual = counts.get(prize.as_str()).copied().unwrap_or(0);
                if actual != want {
                    return Err(GridViolation::PrizeCount {
                        symbol: prize,
                        expected: want,
                        actual,
                    });
                }
                if self.config.win_logic() == WinLogic::SingleWin {
                    if let Some((symbol, count, cap)) = over_cap(Some(prize.as_str())) {
                        return Err(GridViolation::SecondaryMatch { symbol, count, cap });
                    }
                    if condition.symbol().is_none()
                        && !self.prize_candidates(tier.tier_index, want).contains(&&prize)
                    {
                        let other = self
                            .claimant(tier.tier_index, &prize, want)
                            .map(|t| t.id.clone())
                            .unwrap_or_default();
                        return Err(GridViolation::OverlappingPrize { symbol: prize, tier: other });
                    }
                }
                Ok(())
            }
        }
    }
}

/// Single left-to-right corrective pass over a losing grid.
///
/// The first `cap` occurrences of each symbol stay; every later one is
/// swapped for the first symbol in search order still under its cap. When
/// the caps cover at least as many cells as the grid, an over-cap symbol
/// implies another symbol is under its cap, so the pass always succeeds.
/// Otherwise the occurrence becomes `fallback`.
pub fn break_accidental_matches(cells: &mut [String], caps: &SymbolCaps, fallback: &str) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for symbol in cells.iter() {
        *counts.entry(symbol.clone()).or_insert(0) += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();

    for cell in cells.iter_mut() {
        let symbol = cell.clone();
        let occurrence = {
            let n = seen.entry(symbol.clone()).or_insert(0);
            *n += 1;
            *n
        };
        if occurrence <= caps.cap(&symbol) {
            continue;
        }

        let replacement = caps
            .order()
            .iter()
            .find(|c| **c != symbol && counts.get(*c).copied().unwrap_or(0) < caps.cap(c))
            .cloned()
            .unwrap_or_else(|| {
                log::warn!("Symbol pools exhausted; '{}' falls back to '{}'", symbol, fallback);
                fallback.to_string()
            });
        if replacement == symbol {
            continue;
        }

        if let Some(n) = counts.get_mut(&symbol) {
            *n -= 1;
        }
        if let Some(n) = seen.get_mut(&symbol) {
            *n -= 1;
        }
        *counts.entry(replacement.clone()).or_insert(0) += 1;
        *seen.entry(replacement.clone()).or_insert(0) += 1;
        *cell = replacement;
    }
}

/// Uniform sample of `count` distinct cell indices (partial Fisher–Yates), sorted
fn sample_positions<R: RandomSource>(rng: &mut R, total: usize, count: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..total).collect();
    for i in 0..count {
        let j = rng.range(i as u32, (total - 1) as u32) as usize;
        indices.swap(i, j);
    }
    indices.truncate(count);
    indices.sort_unstable();
    indices
}

/// Occurrences per symbol
pub fn tally(cells: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for symbol in cells {
        *counts.entry(symbol.as_str()).or_insert(0) += 1;
    }
    counts
}
