//! Persistence seam for questions and answer records.

use crate::models::{AnswerRecord, NewAnswerRecord, NewQuestion, Question};
use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

/// Storage used by the generator and evaluator.
///
/// Failures are reported as `AppError::UpstreamStoreError`.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Insert all questions atomically and return the stored rows in input order.
    async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<Question>, AppError>;

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError>;

    /// Insert one answer record. Fails if the referenced question does not exist.
    async fn insert_answer(&self, answer: &NewAnswerRecord) -> Result<AnswerRecord, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
