//! HTTP handlers for the quiz service.

pub mod answers;
pub mod health;
pub mod metrics;
pub mod questions;

use service_core::error::AppError;

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
