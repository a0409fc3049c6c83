//! Answer record and AI evaluation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Structured feedback returned by the model for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub missing_points: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl Evaluation {
    pub fn within_marks(&self, total_marks: i32) -> bool {
        self.score >= 0.0 && self.score <= f64::from(total_marks)
    }
}

/// A persisted evaluation of one student answer. Written once, never updated.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: Uuid,
    pub session_id: String,
    pub question_id: Uuid,
    pub user_answer: String,
    pub ai_feedback: serde_json::Value,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnswerRecord {
    pub session_id: String,
    pub question_id: Uuid,
    pub user_answer: String,
    pub ai_feedback: serde_json::Value,
    pub score: f64,
}

impl NewAnswerRecord {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> AnswerRecord {
        AnswerRecord {
            id,
            session_id: self.session_id,
            question_id: self.question_id,
            user_answer: self.user_answer,
            ai_feedback: self.ai_feedback,
            score: self.score,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_lists_default_to_empty() {
        let eval: Evaluation =
            serde_json::from_str(r#"{"score": 3, "feedback": "Good start"}"#).unwrap();
        assert_eq!(eval.score, 3.0);
        assert!(eval.missing_points.is_empty());
        assert!(eval.strengths.is_empty());
        assert!(eval.improvements.is_empty());
    }

    #[test]
    fn score_is_required() {
        let result = serde_json::from_str::<Evaluation>(r#"{"feedback": "Good start"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn within_marks_bounds() {
        let mut eval = Evaluation {
            score: 5.0,
            feedback: String::new(),
            missing_points: vec![],
            strengths: vec![],
            improvements: vec![],
        };
        assert!(eval.within_marks(5));
        eval.score = 5.5;
        assert!(!eval.within_marks(5));
        eval.score = -1.0;
        assert!(!eval.within_marks(5));
    }
}
