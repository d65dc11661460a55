//! # sf-math — Scratch game outcome and math-certification engine
//!
//! Decides whether a scratch-card round wins, what it pays and which symbols
//! it reveals, and computes the aggregate guarantees (RTP, hit rate,
//! variance, max win) a paytable produces.
//!
//! ## Features
//!
//! - **Deterministic rounds**: same config + seed ⇒ identical outcome, on any platform
//! - **Pool and unlimited odds**: finite ticket decks or fixed per-round probabilities
//! - **Consistent grids**: losing grids never show a match, winning grids show exactly one
//! - **Certification export**: self-describing schema with closed prize table and stats
//! - **Monte Carlo**: parallel batch simulation against the theoretical stats
//!
//! ## Architecture
//!
//! ```text
//! resolve_round(config, seed)
//!     │
//!     ├── Mulberry32 (seed → uniform stream)
//!     ├── OutcomeResolver (OddsTable walk → ResolvedTier)
//!     └── GridMaterializer (tier → reveal map)
//!           │
//!           v
//!     ResolvedOutcome
//!
//! compute_stats(config) ──► MathStats
//! transform_to_rgs(config) ──► RgsMathSchema
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod odds;
pub mod resolver;
pub mod rng;
pub mod round;
pub mod schema;
pub mod simulate;
pub mod stats;

pub use config::*;
pub use error::*;
pub use grid::*;
pub use odds::*;
pub use resolver::*;
pub use rng::*;
pub use round::*;
pub use schema::*;
pub use simulate::*;
pub use stats::*;
