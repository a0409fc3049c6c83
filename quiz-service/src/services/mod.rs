pub mod answer_evaluator;
pub mod database;
pub mod memory;
pub mod prompts;
pub mod providers;
pub mod question_generator;
pub mod response_parser;
pub mod store;
pub mod token;

pub use answer_evaluator::AnswerEvaluator;
pub use database::Database;
pub use memory::MemoryQuizStore;
pub use question_generator::{QuestionBatch, QuestionGenerator};
pub use store::QuizStore;
