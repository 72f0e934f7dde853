use thiserror::Error;

/// Errors raised while constructing a `ConcurrentMap`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// A sizing hint violates the map's preconditions.
    #[error("invalid argument: {name} = {value}")]
    InvalidArgument { name: &'static str, value: String },
}

/// Result type alias for map construction.
pub type MapResult<T> = Result<T, MapError>;

impl MapError {
    pub fn invalid_argument(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidArgument {
            name,
            value: value.to_string(),
        }
    }
}
