//! Short-answer question model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored question. Immutable once written.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub topic: String,
    pub difficulty: String,
    pub ukmla_domain: String,
    pub question_text: String,
    pub model_answer: String,
    pub marking_criteria: Vec<String>,
    pub keywords: Vec<String>,
    pub total_marks: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a question; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub topic: String,
    pub difficulty: String,
    pub ukmla_domain: String,
    pub question_text: String,
    pub model_answer: String,
    pub marking_criteria: Vec<String>,
    pub keywords: Vec<String>,
    pub total_marks: i32,
}

impl NewQuestion {
    pub fn into_question(self, id: Uuid, created_at: DateTime<Utc>) -> Question {
        Question {
            id,
            topic: self.topic,
            difficulty: self.difficulty,
            ukmla_domain: self.ukmla_domain,
            question_text: self.question_text,
            model_answer: self.model_answer,
            marking_criteria: self.marking_criteria,
            keywords: self.keywords,
            total_marks: self.total_marks,
            created_at,
        }
    }
}

/// One question object as the model is asked to emit it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(alias = "question_text")]
    pub question: String,
    pub model_answer: String,
    pub marking_criteria: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub total_marks: i32,
}

impl GeneratedQuestion {
    /// Reject questions that could never be marked.
    pub fn check(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.total_marks <= 0 {
            return Err(format!("total_marks must be positive, got {}", self.total_marks));
        }
        if self.marking_criteria.is_empty() {
            return Err("marking_criteria is empty".to_string());
        }
        Ok(())
    }

    /// Attach the request's classification to build a storage row.
    pub fn into_new_question(self, topic: &str, difficulty: &str, ukmla_domain: &str) -> NewQuestion {
        NewQuestion {
            topic: topic.to_string(),
            difficulty: difficulty.to_string(),
            ukmla_domain: ukmla_domain.to_string(),
            question_text: self.question,
            model_answer: self.model_answer,
            marking_criteria: self.marking_criteria,
            keywords: self.keywords,
            total_marks: self.total_marks,
        }
    }
}
