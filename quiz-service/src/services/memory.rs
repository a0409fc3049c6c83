//! In-process store for tests and local runs without PostgreSQL.

use crate::models::{AnswerRecord, NewAnswerRecord, NewQuestion, Question};
use crate::services::store::QuizStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Mirrors the PostgreSQL store's contract, including the foreign key from
/// answers to questions.
#[derive(Default)]
pub struct MemoryQuizStore {
    questions: DashMap<Uuid, Question>,
    answers: DashMap<Uuid, AnswerRecord>,
    fail_writes: AtomicBool,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail, to exercise store error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    pub fn answers_for_session(&self, session_id: &str) -> Vec<AnswerRecord> {
        self.answers
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamStoreError(anyhow::anyhow!(
                "Store is rejecting writes"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<Question>, AppError> {
        self.check_writable()?;

        let now = Utc::now();
        let stored: Vec<Question> = questions
            .iter()
            .cloned()
            .map(|q| q.into_question(Uuid::new_v4(), now))
            .collect();

        for question in &stored {
            self.questions.insert(question.id, question.clone());
        }

        Ok(stored)
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        Ok(self.questions.get(&id).map(|q| q.value().clone()))
    }

    async fn insert_answer(&self, answer: &NewAnswerRecord) -> Result<AnswerRecord, AppError> {
        self.check_writable()?;

        if !self.questions.contains_key(&answer.question_id) {
            return Err(AppError::UpstreamStoreError(anyhow::anyhow!(
                "Question {} does not exist",
                answer.question_id
            )));
        }

        let record = answer.clone().into_record(Uuid::new_v4(), Utc::now());
        self.answers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_question() -> NewQuestion {
        NewQuestion {
            topic: "Asthma".into(),
            difficulty: "easy".into(),
            ukmla_domain: "Respiratory".into(),
            question_text: "Outline acute asthma management.".into(),
            model_answer: "Oxygen, salbutamol, ipratropium, steroids.".into(),
            marking_criteria: vec!["1 mark: salbutamol".into()],
            keywords: vec!["asthma".into()],
            total_marks: 1,
        }
    }

    #[tokio::test]
    async fn answer_requires_existing_question() {
        let store = MemoryQuizStore::new();
        let result = store
            .insert_answer(&NewAnswerRecord {
                session_id: "s1".into(),
                question_id: Uuid::new_v4(),
                user_answer: "salbutamol".into(),
                ai_feedback: serde_json::json!({}),
                score: 1.0,
            })
            .await;

        assert!(matches!(result, Err(AppError::UpstreamStoreError(_))));
        assert_eq!(store.answer_count(), 0);
    }

    #[tokio::test]
    async fn stored_question_round_trips() {
        let store = MemoryQuizStore::new();
        let stored = store.insert_questions(&[new_question()]).await.unwrap();
        let fetched = store.get_question(stored[0].id).await.unwrap().unwrap();
        assert_eq!(fetched, stored[0]);
    }

    #[tokio::test]
    async fn failing_writes_leave_store_untouched() {
        let store = MemoryQuizStore::new();
        store.fail_writes(true);
        assert!(store.insert_questions(&[new_question()]).await.is_err());
        assert_eq!(store.question_count(), 0);
    }
}
