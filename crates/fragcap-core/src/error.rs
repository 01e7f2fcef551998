// Error types for the scoring and lineup engine.

use thiserror::Error;

use crate::role::Role;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A stat record or a call argument cannot be scored. Recoverable at the
    /// unit level: the aggregator skips the unit and keeps going.
    #[error("invalid input ({context}): {message}")]
    InvalidInput { context: String, message: String },

    /// A lineup slot cannot be filled because its role bucket is too small.
    #[error("insufficient roster: role `{role}` needs {required} player(s), {available} available")]
    InsufficientRoster {
        role: Role,
        required: usize,
        available: usize,
    },

    #[error("invalid lineup template: {0}")]
    InvalidTemplate(String),

    #[error("no cost configured for player `{player}`")]
    MissingCost { player: String },

    #[error("unknown role `{0}`")]
    UnknownRole(String),

    #[error("unknown sort field `{0}`")]
    UnknownSortField(String),
}

impl CoreError {
    pub(crate) fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            context: context.into(),
            message: message.into(),
        }
    }
}
