//! Stock computation errors

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Could not resolve visible store locations: {0}")]
    Visibility(String),

    #[error("Invalid unit configuration: {0}")]
    Configuration(String),

    #[error("Store location {location_id} is its own ancestor")]
    HierarchyCycle { location_id: i64 },

    #[error("Store location tree below {location_id} is deeper than {max_depth} levels")]
    DepthExceeded { location_id: i64, max_depth: usize },

    #[error("Stock computation cancelled")]
    Cancelled,

    #[error("Stock worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StockError {
    /// Errors that describe bad data rather than an interrupted call
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StockError::Configuration(_)
                | StockError::HierarchyCycle { .. }
                | StockError::DepthExceeded { .. }
        )
    }
}

pub type StockResult<T> = Result<T, StockError>;
