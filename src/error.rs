use thiserror::Error;

use crate::models::Category;

/// Errors raised by the aggregation engine for inputs that break its contract.
#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("{category} rating {value} on evaluation {evaluation_code} is outside {min}..={max}")]
    RatingOutOfRange {
        evaluation_code: String,
        category: Category,
        value: i16,
        min: i16,
        max: i16,
    },
}
