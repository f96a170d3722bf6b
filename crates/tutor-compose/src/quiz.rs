//! Quiz generation: one primary request, at most one top-up for the shortfall,
//! optional explanation enrichment.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::question::{dedup, QuestionKind, QuizQuestion};
use tutor_core::config::QuizSettings;
use tutor_core::traits::Completer;
use tutor_core::types::{ChatMessage, CompletionRequest, Difficulty, Hit};
use tutor_core::{Error, Result};
use tutor_index::Retriever;

const GENERATE_SYSTEM: &str = "You write multiple-choice quizzes and reply with strict JSON only. \
Every explanation is a clear, self-contained mini-lesson of roughly 120-180 words.";

const ENRICH_SYSTEM: &str = "You rewrite explanations for multiple-choice questions and follow the instructions exactly.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    pub count: usize,
    pub requested: usize,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
}

impl Quiz {
    pub fn new(questions: Vec<QuizQuestion>, requested: usize) -> Self {
        Self { count: questions.len(), questions, requested, kind: QuestionKind::Mcq }
    }

    pub fn shuffle_choices<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for q in &mut self.questions { q.shuffle_choices(rng); }
    }
}

#[derive(Debug, Clone)]
pub struct QuizOptions {
    pub n: usize,
    pub difficulty: Difficulty,
    pub enrich: bool,
}

impl Default for QuizOptions {
    fn default() -> Self { Self { n: 5, difficulty: Difficulty::Easy, enrich: false } }
}

pub struct QuizComposer {
    retriever: Arc<Retriever>,
    completer: Arc<dyn Completer>,
    model: String,
    enrich_model: String,
    settings: QuizSettings,
}

impl QuizComposer {
    pub fn new(retriever: Arc<Retriever>, completer: Arc<dyn Completer>, model: impl Into<String>, enrich_model: impl Into<String>, settings: QuizSettings) -> Self {
        Self { retriever, completer, model: model.into(), enrich_model: enrich_model.into(), settings }
    }

    /// Up to `opts.n` (at least 1) validated, distinct questions on `topic`.
    ///
    /// Makes at most two generation requests. A failed or unusable request
    /// shrinks the quiz; when every request made fails at the service level
    /// the last such error is returned. Retrieval failures (a missing index
    /// included) propagate.
    pub async fn make_quiz(&self, topic: &str, opts: &QuizOptions) -> Result<Quiz> {
        let n = opts.n.max(1);
        let hits = self.retriever.retrieve(topic, self.settings.k).await?;
        let context = context_text(&hits, self.settings.context_chars);

        let mut attempts = Attempts::default();
        let mut questions = normalize_all(attempts.settle(self.request_mcqs(topic, opts.difficulty, n, &context).await));
        if questions.len() < n {
            let missing = n - questions.len();
            debug!(have = questions.len(), missing, "topping up quiz");
            questions.extend(normalize_all(attempts.settle(self.request_mcqs(topic, opts.difficulty, missing, "").await)));
            questions = dedup(questions);
        }
        if let Some(e) = attempts.into_total_failure() { return Err(e); }
        questions.truncate(n);

        if opts.enrich { self.enrich_explanations(&mut questions, &context).await; }
        info!(topic, requested = n, count = questions.len(), "quiz ready");
        Ok(Quiz::new(questions, n))
    }

    /// Raw candidates from one generation request. Unparseable output yields
    /// none; service failures are returned.
    async fn request_mcqs(&self, topic: &str, difficulty: Difficulty, n: usize, context: &str) -> Result<Vec<Value>> {
        let prompt = format!(
            "Write exactly {n} multiple-choice questions (MCQs) about the topic below.\n\
             Difficulty: {difficulty}. Draw on the context where it helps.\n\
             Reply with a JSON object whose key \"questions\" holds a list of objects, each with:\n\
             type=\"mcq\", q, choices (3-5 strings), answer (identical to one of the choices), \
             explanation (120-180 words: define the concept, justify the correct choice, briefly refute each wrong choice, \
             and add a short example, rule or equation when relevant).\n\n\
             Topic: {topic}\n\nContext:\n{}",
            if context.is_empty() { "(no context)" } else { context }
        );
        let request = CompletionRequest::new(&self.model, vec![ChatMessage::system(GENERATE_SYSTEM), ChatMessage::user(prompt)], self.settings.temperature)
            .with_timeout(Duration::from_secs(self.settings.timeout_secs))
            .json();
        let reply = self.completer.complete(&request).await?;
        Ok(parse_candidates(&reply).unwrap_or_else(|e| {
            warn!(error = %e, "quiz generation returned unusable output");
            Vec::new()
        }))
    }

    async fn enrich_explanations(&self, questions: &mut [QuizQuestion], context: &str) {
        for q in questions.iter_mut().filter(|q| q.explanation_words() < self.settings.min_explanation_words) {
            let prompt = format!(
                "Rewrite the explanation for this multiple-choice question as a 120-220 word mini-lesson.\n\
                 - Open with the concept in plain language.\n\
                 - Give a quick example, rule or equation if relevant.\n\
                 - Briefly refute each incorrect choice.\n\
                 - Stay factual and grounded in the context.\n\n\
                 Question: {}\nChoices: {}\nCorrect answer: {}\n\n\
                 Current explanation (may be short): {}\n\nContext:\n{}",
                q.prompt,
                q.choices.join(" | "),
                q.answer,
                q.explanation,
                if context.is_empty() { "(no context)" } else { context }
            );
            let request = CompletionRequest::new(&self.enrich_model, vec![ChatMessage::system(ENRICH_SYSTEM), ChatMessage::user(prompt)], 0.2);
            match self.completer.complete(&request).await {
                Ok(text) if !text.trim().is_empty() => q.explanation = text.trim().to_string(),
                Ok(_) => debug!(question = %q.prompt, "empty enrichment; keeping original"),
                Err(e) => warn!(error = %e, question = %q.prompt, "enrichment failed; keeping original"),
            }
        }
    }
}

/// Outcome of the generation requests made for one quiz.
#[derive(Default)]
struct Attempts {
    replies: usize,
    last_failure: Option<Error>,
}

impl Attempts {
    fn settle(&mut self, outcome: Result<Vec<Value>>) -> Vec<Value> {
        match outcome {
            Ok(candidates) => {
                self.replies += 1;
                candidates
            }
            Err(e) => {
                warn!(error = %e, "quiz generation failed");
                self.last_failure = Some(e);
                Vec::new()
            }
        }
    }

    /// The last service error, when no request got a reply at all.
    fn into_total_failure(self) -> Option<Error> {
        if self.replies == 0 { self.last_failure } else { None }
    }
}

fn normalize_all(raw: Vec<Value>) -> Vec<QuizQuestion> {
    let accepted = raw
        .iter()
        .filter_map(|candidate| match QuizQuestion::from_raw(candidate) {
            Ok(q) => Some(q),
            Err(reason) => {
                debug!(%reason, "discarding generated question");
                None
            }
        })
        .collect();
    dedup(accepted)
}

/// The `questions` list of a generation reply (a bare list is accepted too).
fn parse_candidates(reply: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(reply.trim()).map_err(|e| Error::MalformedOutput(format!("quiz reply is not JSON: {e}")))?;
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => return Err(Error::MalformedOutput("quiz reply has no 'questions' list".into())),
        },
        _ => return Err(Error::MalformedOutput("quiz reply is neither an object nor a list".into())),
    };
    Ok(list.into_iter().filter(Value::is_object).collect())
}

/// Trimmed hit texts joined by blank lines, stopping before the first one that
/// would push the total past `budget` characters.
pub fn context_text(hits: &[Hit], budget: usize) -> String {
    let mut blocks = Vec::new();
    let mut total = 0;
    for text in hits.iter().map(|h| h.text.trim()).filter(|t| !t.is_empty()) {
        let len = text.chars().count();
        if total + len > budget { break; }
        blocks.push(text);
        total += len;
    }
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str) -> Hit { Hit { text: text.into(), source: "s".into(), ordinal: 0, score: 1.0, lexical: 0.0 } }

    #[test]
    fn context_respects_budget_and_skips_blanks() {
        let hits = vec![hit(" aaaa "), hit("   "), hit("bbbb"), hit("cccc")];
        assert_eq!(context_text(&hits, 10), "aaaa\n\nbbbb");
        assert_eq!(context_text(&hits, 3), "");
    }

    #[test]
    fn only_all_failed_attempts_are_a_failure() {
        let mut attempts = Attempts::default();
        attempts.settle(Err(Error::CompletionService("down".into())));
        attempts.settle(Ok(Vec::new()));
        assert!(attempts.into_total_failure().is_none());

        let mut attempts = Attempts::default();
        attempts.settle(Err(Error::CompletionService("first".into())));
        attempts.settle(Err(Error::CompletionService("second".into())));
        assert!(matches!(attempts.into_total_failure(), Some(Error::CompletionService(m)) if m == "second"));
    }

    #[test]
    fn candidates_from_object_or_list() {
        assert_eq!(parse_candidates(r#"{"questions":[{"q":"a"}, 3]}"#).unwrap().len(), 1);
        assert_eq!(parse_candidates(r#"[{"q":"a"},{"q":"b"}]"#).unwrap().len(), 2);
        assert!(matches!(parse_candidates(r#"{"items":[]}"#), Err(Error::MalformedOutput(_))));
        assert!(matches!(parse_candidates("Sure! Here is your quiz"), Err(Error::MalformedOutput(_))));
    }
}
