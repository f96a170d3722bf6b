//! Validation and normalization of generated multiple-choice questions.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Mcq,
}

/// A validated multiple-choice question. `answer` is always one of `choices`,
/// spelled exactly as the choice is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(rename = "q")]
    pub prompt: String,
    pub choices: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// Why a generated candidate was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("candidate is not a JSON object")]
    NotAnObject,
    #[error("question type '{0}' is not mcq")]
    WrongType(String),
    #[error("empty question prompt")]
    EmptyPrompt,
    #[error("fewer than two distinct non-empty choices")]
    TooFewChoices,
    #[error("answer '{0}' is not one of the choices")]
    AnswerNotAChoice(String),
}

impl QuizQuestion {
    /// Validate one generated candidate.
    ///
    /// Choices are trimmed, empty ones dropped and case-insensitive duplicates
    /// collapsed (first spelling wins). An answer that matches a choice only
    /// up to case and whitespace is rewritten to that choice.
    pub fn from_raw(raw: &Value) -> Result<Self, Rejection> {
        let obj = raw.as_object().ok_or(Rejection::NotAnObject)?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::trim).unwrap_or("");

        let kind = text("type");
        if !kind.eq_ignore_ascii_case("mcq") { return Err(Rejection::WrongType(kind.to_string())); }
        let prompt = text("q");
        if prompt.is_empty() { return Err(Rejection::EmptyPrompt); }

        let mut seen = HashSet::new();
        let choices: Vec<String> = obj
            .get("choices")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::trim).filter(|c| !c.is_empty()).filter(|c| seen.insert(c.to_lowercase())).map(str::to_string).collect())
            .unwrap_or_default();
        if choices.len() < 2 { return Err(Rejection::TooFewChoices); }

        let raw_answer = text("answer");
        let answer = match choices.iter().find(|c| c.as_str() == raw_answer) {
            Some(exact) => exact.clone(),
            None => {
                let wanted = fold(raw_answer);
                choices.iter().find(|c| !wanted.is_empty() && fold(c) == wanted).cloned().ok_or_else(|| Rejection::AnswerNotAChoice(raw_answer.to_string()))?
            }
        };

        Ok(Self { kind: QuestionKind::Mcq, prompt: prompt.to_string(), choices, answer, explanation: text("explanation").to_string() })
    }

    pub fn dedup_key(&self) -> (String, Vec<String>) { (self.prompt.to_lowercase(), self.choices.iter().map(|c| c.to_lowercase()).collect()) }

    pub fn is_correct(&self, response: &str) -> bool { fold(response) == fold(&self.answer) }

    /// Map a 1-based choice number to its text; anything else is returned as typed.
    pub fn choice_for(&self, input: &str) -> String {
        let input = input.trim();
        match input.parse::<usize>() {
            Ok(i) if (1..=self.choices.len()).contains(&i) => self.choices[i - 1].clone(),
            _ => input.to_string(),
        }
    }

    pub fn shuffle_choices<R: Rng + ?Sized>(&mut self, rng: &mut R) { self.choices.shuffle(rng); }

    pub fn explanation_words(&self) -> usize { self.explanation.split_whitespace().count() }
}

/// Lowercase and collapse whitespace runs, for lenient comparison.
pub(crate) fn fold(s: &str) -> String { s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase() }

/// Keep the first question for every dedup key, preserving order.
pub fn dedup(questions: Vec<QuizQuestion>) -> Vec<QuizQuestion> {
    let mut seen = HashSet::new();
    questions.into_iter().filter(|q| seen.insert(q.dedup_key())).collect()
}
