use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no match data could be obtained for rounds 1-{max_round}")]
    Unavailable { max_round: u32 },
    #[error("round {round} failed: {failure}")]
    RoundAborted { round: u32, failure: RoundFailure },
}

/// Why a single round contributed no rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundFailure {
    #[error("provider request failed: {0}")]
    Provider(String),
    #[error("no known score columns; available: {available:?}")]
    NoScoreColumns { available: Vec<String> },
    #[error("team columns missing; available: {available:?}")]
    MissingTeamColumns { available: Vec<String> },
    #[error("row {row}: column {column} has unusable value {value}")]
    BadValue {
        column: String,
        row: usize,
        value: String,
    },
    #[error("could not write round cache: {0}")]
    CacheWrite(String),
}
