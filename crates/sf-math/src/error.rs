//! Error types for the math engine

use thiserror::Error;

/// Structural configuration errors, raised when a `GameMathConfig` is built.
///
/// Defects confined to one prize tier are not errors; see
/// [`TierDefect`](crate::config::TierDefect).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Grid must have at least one row and one column (got {rows}×{columns})")]
    EmptyGrid { rows: u32, columns: u32 },

    #[error("Grid too large: {cells} cells > {max}")]
    GridTooLarge { cells: u64, max: u64 },

    #[error("Symbol pool '{0}' is empty")]
    EmptySymbolPool(&'static str),

    #[error("Symbol pool '{0}' contains an empty identifier")]
    BlankSymbol(&'static str),

    #[error("Pool mode requires totalTickets > 0")]
    MissingTotalTickets,

    #[error("Ticket price must be finite and positive (got {0})")]
    InvalidTicketPrice(f64),
}

/// Engine error type
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias
pub type MathResult<T> = Result<T, MathError>;
