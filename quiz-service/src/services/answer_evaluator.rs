//! Answer evaluation pipeline: load question, mark with the model, record.

use crate::models::{AnswerRecord, Evaluation, NewAnswerRecord};
use crate::services::prompts::answer_evaluation_prompt;
use crate::services::providers::{GenerationParams, TextProvider};
use crate::services::response_parser::{parse_ai_json, ResponseParseError};
use crate::services::store::QuizStore;
use metrics::counter;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AnswerEvaluator {
    store: Arc<dyn QuizStore>,
    provider: Arc<dyn TextProvider>,
}

impl AnswerEvaluator {
    pub fn new(store: Arc<dyn QuizStore>, provider: Arc<dyn TextProvider>) -> Self {
        Self { store, provider }
    }

    /// Mark `user_answer` against a stored question and persist the result.
    ///
    /// The model is not called if the question does not exist.
    #[instrument(skip(self, user_answer), fields(model = %self.provider.model()))]
    pub async fn evaluate(
        &self,
        question_id: Uuid,
        user_answer: &str,
        session_id: &str,
    ) -> Result<(Evaluation, AnswerRecord), AppError> {
        let result = self.run(question_id, user_answer, session_id).await;

        match &result {
            Ok(_) => counter!("quiz_answers_evaluated_total").increment(1),
            Err(e) => {
                counter!("quiz_pipeline_failures_total", "pipeline" => "evaluate", "code" => e.code())
                    .increment(1);
            }
        }

        result
    }

    async fn run(
        &self,
        question_id: Uuid,
        user_answer: &str,
        session_id: &str,
    ) -> Result<(Evaluation, AnswerRecord), AppError> {
        let question = self.store.get_question(question_id).await?.ok_or_else(|| {
            AppError::UpstreamStoreError(anyhow::anyhow!("Question {} not found", question_id))
        })?;

        let prompt = answer_evaluation_prompt(&question, user_answer);
        let response = self.provider.generate(&prompt, &GenerationParams::json()).await?;
        let text = response
            .text
            .ok_or_else(|| AppError::UpstreamAIError("AI response contained no text".to_string()))?;

        // The model's object is recorded verbatim; the typed view only drives scoring
        let ai_feedback: serde_json::Value = parse_ai_json(&text)?;
        let evaluation: Evaluation = serde_json::from_value(ai_feedback.clone())
            .map_err(|e| ResponseParseError::Malformed(e.to_string()))?;

        // Stored as given; the model's arithmetic is not second-guessed
        if !evaluation.within_marks(question.total_marks) {
            warn!(
                score = evaluation.score,
                total_marks = question.total_marks,
                "AI score outside question's mark range"
            );
        }

        let record = self
            .store
            .insert_answer(&NewAnswerRecord {
                session_id: session_id.to_string(),
                question_id,
                user_answer: user_answer.to_string(),
                ai_feedback,
                score: evaluation.score,
            })
            .await?;

        info!(answer_id = %record.id, score = record.score, "Answer evaluated");

        Ok((evaluation, record))
    }
}
