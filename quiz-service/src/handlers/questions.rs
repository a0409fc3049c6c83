use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::models::Question;
use crate::services::QuestionBatch;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

pub const MAX_QUESTIONS_PER_REQUEST: u32 = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuestionRequest {
    #[validate(length(min = 1, message = "topic is required"))]
    pub topic: String,
    #[validate(length(min = 1, message = "difficulty is required"))]
    pub difficulty: String,
    #[validate(length(min = 1, message = "ukmla_domain is required"))]
    pub ukmla_domain: String,
    /// Defaults to 1.
    #[validate(range(min = 1, max = 20, message = "count must be between 1 and 20"))]
    pub count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GenerateQuestionResponse {
    pub success: bool,
    pub questions: Vec<Question>,
}

pub async fn generate_question(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<GenerateQuestionRequest>,
) -> Result<Json<GenerateQuestionResponse>, AppError> {
    let batch = QuestionBatch {
        topic: req.topic,
        difficulty: req.difficulty,
        ukmla_domain: req.ukmla_domain,
        count: req.count.unwrap_or(1),
    };

    let questions = state.generator.generate(&batch).await?;

    Ok(Json(GenerateQuestionResponse {
        success: true,
        questions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(count: Option<u32>) -> GenerateQuestionRequest {
        GenerateQuestionRequest {
            topic: "Sepsis".into(),
            difficulty: "hard".into(),
            ukmla_domain: "Acute Care".into(),
            count,
        }
    }

    #[test]
    fn count_is_bounded() {
        assert!(request(None).validate().is_ok());
        assert!(request(Some(1)).validate().is_ok());
        assert!(request(Some(MAX_QUESTIONS_PER_REQUEST)).validate().is_ok());
        assert!(request(Some(0)).validate().is_err());
        assert!(request(Some(MAX_QUESTIONS_PER_REQUEST + 1)).validate().is_err());
    }

    #[test]
    fn blank_topic_is_rejected() {
        let mut req = request(None);
        req.topic = String::new();
        assert!(req.validate().is_err());
    }
}
