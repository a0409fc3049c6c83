use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AnswerRecord, Evaluation};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct EvaluateAnswerRequest {
    /// Kept as text so an id that is not a UUID is reported like any other
    /// unknown question.
    #[validate(length(min = 1, message = "question_id is required"))]
    pub question_id: String,
    #[validate(length(min = 1, message = "user_answer is required"))]
    pub user_answer: String,
    #[validate(length(min = 1, message = "session_id is required"))]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct EvaluateAnswerResponse {
    pub success: bool,
    pub evaluation: Evaluation,
    pub answer_record: AnswerRecord,
}

pub async fn evaluate_answer(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EvaluateAnswerRequest>,
) -> Result<Json<EvaluateAnswerResponse>, AppError> {
    let question_id = Uuid::parse_str(&req.question_id).map_err(|_| {
        AppError::UpstreamStoreError(anyhow::anyhow!("Question {} not found", req.question_id))
    })?;

    let (evaluation, answer_record) = state
        .evaluator
        .evaluate(question_id, &req.user_answer, &req.session_id)
        .await?;

    Ok(Json(EvaluateAnswerResponse {
        success: true,
        evaluation,
        answer_record,
    }))
}
