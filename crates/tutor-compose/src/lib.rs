//! Grounded answers and quizzes over the retrieval index, plus the `Tutor`
//! facade that wires configuration to backends.

pub mod answer;
pub mod grade;
pub mod question;
pub mod quiz;
pub mod tutor;

pub use answer::{format_context, preview, Answer, AnswerComposer};
pub use grade::{grade, Grade, QuestionResult};
pub use question::{dedup, QuizQuestion, Rejection};
pub use quiz::{context_text, Quiz, QuizComposer, QuizOptions};
pub use tutor::{ReindexError, ReindexStep, Tutor};
