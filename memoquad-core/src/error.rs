use thiserror::Error;

/// A rejected integration setting. The previous value stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SettingsError {
    #[error("tolerance must be positive, got {0}")]
    NonPositiveTolerance(f64),

    #[error("maximum number of evaluations must be positive")]
    ZeroEvaluations,
}

pub type Result<T> = std::result::Result<T, SettingsError>;
