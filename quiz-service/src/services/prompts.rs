//! Prompt templates sent to the model.

use crate::models::Question;

/// Prompt asking for `count` UKMLA short-answer questions as a JSON array.
pub fn question_generation_prompt(
    topic: &str,
    difficulty: &str,
    ukmla_domain: &str,
    count: u32,
) -> String {
    format!(
        r#"Generate {count} UKMLA SAQ question(s) for:
Topic: {topic}
Difficulty: {difficulty}
UKMLA Domain: {ukmla_domain}

Requirements:
- Clinical scenario-based question
- 3-5 mark question structure
- Clear marking criteria with specific points
- Realistic patient presentation
- UK medical practice context

Return JSON array format:
[{{
  "question": "Clinical scenario and question text",
  "model_answer": "Comprehensive model answer",
  "marking_criteria": ["1 mark: specific point", "1 mark: another point"],
  "keywords": ["keyword1", "keyword2"],
  "total_marks": 5
}}]"#
    )
}

/// Prompt asking the model to mark `user_answer` against `question`.
pub fn answer_evaluation_prompt(question: &Question, user_answer: &str) -> String {
    format!(
        r#"Evaluate this UKMLA SAQ answer:

Question: {question_text}
Model Answer: {model_answer}
Student Answer: {user_answer}
Marking Criteria: {criteria}
Total Marks: {total_marks}

Provide detailed feedback in JSON format:
{{
  "score": 3,
  "feedback": "Detailed feedback on what was correct/incorrect",
  "missing_points": ["What key points were missed"],
  "strengths": ["What the student did well"],
  "improvements": ["Specific suggestions for improvement"]
}}"#,
        question_text = question.question_text,
        model_answer = question.model_answer,
        criteria = question.marking_criteria.join(", "),
        total_marks = question.total_marks,
    )
}
