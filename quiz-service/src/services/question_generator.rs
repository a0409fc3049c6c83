//! Question generation pipeline: prompt, model call, parse, store.

use crate::models::{GeneratedQuestion, NewQuestion, Question};
use crate::services::prompts::question_generation_prompt;
use crate::services::providers::{GenerationParams, TextProvider};
use crate::services::response_parser::{parse_ai_json, OneOrMany};
use crate::services::store::QuizStore;
use metrics::counter;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Classification of the questions to generate.
#[derive(Debug, Clone)]
pub struct QuestionBatch {
    pub topic: String,
    pub difficulty: String,
    pub ukmla_domain: String,
    pub count: u32,
}

#[derive(Clone)]
pub struct QuestionGenerator {
    store: Arc<dyn QuizStore>,
    provider: Arc<dyn TextProvider>,
}

impl QuestionGenerator {
    pub fn new(store: Arc<dyn QuizStore>, provider: Arc<dyn TextProvider>) -> Self {
        Self { store, provider }
    }

    /// Generate, validate and persist `batch.count` questions.
    ///
    /// Nothing is written unless every returned question is usable.
    #[instrument(skip(self), fields(model = %self.provider.model()))]
    pub async fn generate(&self, batch: &QuestionBatch) -> Result<Vec<Question>, AppError> {
        let result = self.run(batch).await;

        match &result {
            Ok(questions) => {
                counter!("quiz_questions_generated_total").increment(questions.len() as u64);
            }
            Err(e) => {
                counter!("quiz_pipeline_failures_total", "pipeline" => "generate", "code" => e.code())
                    .increment(1);
            }
        }

        result
    }

    async fn run(&self, batch: &QuestionBatch) -> Result<Vec<Question>, AppError> {
        let prompt =
            question_generation_prompt(&batch.topic, &batch.difficulty, &batch.ukmla_domain, batch.count);

        let response = self.provider.generate(&prompt, &GenerationParams::json()).await?;
        let text = response
            .text
            .ok_or_else(|| AppError::UpstreamAIError("AI response contained no text".to_string()))?;

        let generated = parse_ai_json::<OneOrMany<GeneratedQuestion>>(&text)?.into_vec();
        let generated = reconcile_count(generated, batch.count)?;

        let rows = generated
            .into_iter()
            .enumerate()
            .map(|(i, q)| -> Result<NewQuestion, AppError> {
                q.check().map_err(|reason| {
                    AppError::UpstreamAIError(format!("Generated question {} rejected: {}", i, reason))
                })?;
                Ok(q.into_new_question(&batch.topic, &batch.difficulty, &batch.ukmla_domain))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let questions = self.store.insert_questions(&rows).await?;

        info!(count = questions.len(), topic = %batch.topic, "Questions generated");

        Ok(questions)
    }
}

/// Drop any surplus; accept a short batch with a warning; reject an empty one.
fn reconcile_count(
    mut generated: Vec<GeneratedQuestion>,
    requested: u32,
) -> Result<Vec<GeneratedQuestion>, AppError> {
    let requested = requested as usize;

    if generated.is_empty() {
        return Err(AppError::UpstreamAIError(
            "AI response contained no questions".to_string(),
        ));
    }

    if generated.len() > requested {
        warn!(requested, returned = generated.len(), "Dropping surplus generated questions");
        generated.truncate(requested);
    } else if generated.len() < requested {
        warn!(requested, returned = generated.len(), "AI returned fewer questions than requested");
    }

    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryQuizStore;
    use crate::services::providers::mock::{MockReply, MockTextProvider};

    fn question_json(marks: i32) -> String {
        format!(
            r#"{{"question": "A 30-year-old presents with wheeze.", "model_answer": "Salbutamol.", "marking_criteria": ["1 mark: bronchodilator"], "keywords": ["asthma"], "total_marks": {}}}"#,
            marks
        )
    }

    fn batch(count: u32) -> QuestionBatch {
        QuestionBatch {
            topic: "Asthma".to_string(),
            difficulty: "easy".to_string(),
            ukmla_domain: "Respiratory".to_string(),
            count,
        }
    }

    fn generator(store: Arc<MemoryQuizStore>, reply: MockReply) -> QuestionGenerator {
        QuestionGenerator::new(store, Arc::new(MockTextProvider::new(vec![reply])))
    }

    #[tokio::test]
    async fn surplus_questions_are_dropped() {
        let store = Arc::new(MemoryQuizStore::new());
        let text = format!("[{},{},{}]", question_json(5), question_json(4), question_json(3));
        let questions = generator(store.clone(), MockReply::Text(text))
            .generate(&batch(2))
            .await
            .unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(store.question_count(), 2);
        assert_eq!(questions[0].topic, "Asthma");
        assert_eq!(questions[1].total_marks, 4);
    }

    #[tokio::test]
    async fn short_batch_is_accepted() {
        let store = Arc::new(MemoryQuizStore::new());
        let text = format!("[{}]", question_json(5));
        let questions = generator(store, MockReply::Text(text))
            .generate(&batch(3))
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[tokio::test]
    async fn zero_mark_question_rejects_whole_batch() {
        let store = Arc::new(MemoryQuizStore::new());
        let text = format!("[{},{}]", question_json(5), question_json(0));
        let err = generator(store.clone(), MockReply::Text(text))
            .generate(&batch(2))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UpstreamAIError(_)));
        assert_eq!(store.question_count(), 0);
    }

    #[tokio::test]
    async fn empty_array_is_an_ai_error() {
        let store = Arc::new(MemoryQuizStore::new());
        let err = generator(store, MockReply::Text("[]".to_string()))
            .generate(&batch(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamAIError(_)));
    }

    #[tokio::test]
    async fn missing_text_is_an_ai_error() {
        let store = Arc::new(MemoryQuizStore::new());
        let err = generator(store, MockReply::Empty)
            .generate(&batch(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamAIError(_)));
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let store = Arc::new(MemoryQuizStore::new());
        store.fail_writes(true);
        let err = generator(store, MockReply::Text(question_json(5)))
            .generate(&batch(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamStoreError(_)));
    }
}
