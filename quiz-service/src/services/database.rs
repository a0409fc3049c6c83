//! PostgreSQL store for quiz-service.

use crate::models::{AnswerRecord, NewAnswerRecord, NewQuestion, Question};
use crate::services::store::QuizStore;
use async_trait::async_trait;
use metrics::histogram;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use uuid::Uuid;

const QUESTION_COLUMNS: &str = "id, topic, difficulty, ukmla_domain, question_text, model_answer, marking_criteria, keywords, total_marks, created_at";
const ANSWER_COLUMNS: &str =
    "id, session_id, question_id, user_answer, ai_feedback, score, created_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn store_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::UpstreamStoreError(anyhow::anyhow!("{}: {}", context, err))
}

fn observe(operation: &'static str, table: &'static str, start: Instant) {
    histogram!(
        "db_operation_duration_seconds",
        "operation" => operation,
        "table" => table
    )
    .record(start.elapsed().as_secs_f64());
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "quiz-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| store_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::UpstreamStoreError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl QuizStore for Database {
    #[instrument(skip(self, questions), fields(count = questions.len()))]
    async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<Question>, AppError> {
        let start = Instant::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin transaction", e))?;

        let sql = format!(
            r#"
            INSERT INTO questions (id, topic, difficulty, ukmla_domain, question_text, model_answer, marking_criteria, keywords, total_marks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );

        let mut inserted = Vec::with_capacity(questions.len());
        for question in questions {
            let row = sqlx::query_as::<_, Question>(&sql)
                .bind(Uuid::new_v4())
                .bind(&question.topic)
                .bind(&question.difficulty)
                .bind(&question.ukmla_domain)
                .bind(&question.question_text)
                .bind(&question.model_answer)
                .bind(&question.marking_criteria)
                .bind(&question.keywords)
                .bind(question.total_marks)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| store_error("Failed to insert question", e))?;
            inserted.push(row);
        }

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit questions", e))?;

        observe("insert", "questions", start);
        info!(count = inserted.len(), "Questions stored");

        Ok(inserted)
    }

    #[instrument(skip(self), fields(question_id = %id))]
    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        let start = Instant::now();

        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to get question", e))?;

        observe("select", "questions", start);

        Ok(question)
    }

    #[instrument(skip(self, answer), fields(question_id = %answer.question_id, session_id = %answer.session_id))]
    async fn insert_answer(&self, answer: &NewAnswerRecord) -> Result<AnswerRecord, AppError> {
        let start = Instant::now();

        let record = sqlx::query_as::<_, AnswerRecord>(&format!(
            r#"
            INSERT INTO user_answers (id, session_id, question_id, user_answer, ai_feedback, score)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&answer.session_id)
        .bind(answer.question_id)
        .bind(&answer.user_answer)
        .bind(&answer.ai_feedback)
        .bind(answer.score)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::UpstreamStoreError(anyhow::anyhow!(
                    "Question {} does not exist",
                    answer.question_id
                ))
            }
            _ => store_error("Failed to insert answer", e),
        })?;

        observe("insert", "user_answers", start);
        info!(answer_id = %record.id, "Answer record stored");

        Ok(record)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Health check failed", e))?;
        Ok(())
    }
}
