//! Domain models for the quiz service.

pub mod answer;
pub mod question;

pub use answer::{AnswerRecord, Evaluation, NewAnswerRecord};
pub use question::{GeneratedQuestion, NewQuestion, Question};
