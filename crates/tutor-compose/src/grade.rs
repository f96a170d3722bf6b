use serde::Serialize;

use crate::quiz::Quiz;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionResult {
    pub prompt: String,
    pub response: Option<String>,
    pub correct: bool,
    pub answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub results: Vec<QuestionResult>,
    pub score: usize,
    pub total: usize,
}

/// Score `responses` against `quiz` in question order. Comparison ignores case
/// and whitespace; a missing response counts as wrong.
pub fn grade(quiz: &Quiz, responses: &[String]) -> Grade {
    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let response = responses.get(i).cloned();
            QuestionResult {
                prompt: q.prompt.clone(),
                correct: response.as_deref().is_some_and(|r| q.is_correct(r)),
                response,
                answer: q.answer.clone(),
                explanation: q.explanation.clone(),
            }
        })
        .collect();
    Grade { score: results.iter().filter(|r| r.correct).count(), total: results.len(), results }
}
