//! Study material derived from a summary: multiple-choice quizzes and
//! flashcards.
//!
//! Model output is parsed best-effort. The JSON array between the first `[`
//! and the last `]` is taken and entries that don't fit the expected shape
//! are dropped, so a sloppy reply yields fewer items rather than an error.

use eyre::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generate::{GenerationRequest, TextGenerator};

pub const DEFAULT_QUIZ_QUESTIONS: usize = 5;
pub const DEFAULT_FLASHCARDS: usize = 10;
pub const QUIZ_OPTIONS: usize = 4;

const QUIZ_TEMPERATURE: f32 = 0.7;
const FLASHCARD_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

fn quiz_prompt(summary: &str, n: usize) -> String {
    format!(
        r#"Create a JSON array of {n} quiz questions about the following summary:
"""{summary}"""
Each question object should look like:
{{
  "question": "The question text",
  "options": ["Option A", "Option B", "Option C", "Option D"],
  "correctAnswer": 0
}}
where correctAnswer is the integer index of the correct option.
Output only valid JSON:
[
  {{ "question": "...", "options": ["...","...","...","..."], "correctAnswer": 0 }},
  ...
]
"#
    )
}

fn flashcard_prompt(summary: &str, n: usize) -> String {
    format!(
        r#"You are a study aid creator that makes effective flashcards to help users remember key concepts.
Based on the following summary, create {n} flashcards.

For each flashcard:
1. The front should contain a specific question, concept name, or term from the summary
2. The back should contain a concise but comprehensive answer or explanation
3. Focus on the most important concepts, facts, definitions, and relationships
4. Each card should cover a single, distinct concept
5. The cards should help with active recall and spaced repetition

Return the flashcards in the following JSON format:
[
  {{
    "front": "What is [concept]?",
    "back": "Clear explanation of the concept"
  }},
  {{
    "front": "Define [term]:",
    "back": "Definition of the term"
  }}
]

SUMMARY:
{summary}

Output only the JSON array without any additional text or explanations.
"#
    )
}

pub async fn generate_quiz(generator: &dyn TextGenerator, summary: &str, n: usize) -> Result<Vec<QuizQuestion>> {
    let request = GenerationRequest::new(quiz_prompt(summary, n)).temperature(QUIZ_TEMPERATURE);
    let reply = generator.generate(&request).await?;
    debug!("Quiz reply: {} chars", reply.len());
    Ok(parse_quiz(&reply, n))
}

pub async fn generate_flashcards(generator: &dyn TextGenerator, summary: &str, n: usize) -> Result<Vec<Flashcard>> {
    let request = GenerationRequest::new(flashcard_prompt(summary, n)).temperature(FLASHCARD_TEMPERATURE);
    let reply = generator.generate(&request).await?;
    debug!("Flashcard reply: {} chars", reply.len());
    Ok(parse_flashcards(&reply, n))
}

/// Valid questions from a model reply, at most `n`
pub fn parse_quiz(reply: &str, n: usize) -> Vec<QuizQuestion> {
    json_entries(reply)
        .into_iter()
        .filter_map(|v| serde_json::from_value::<QuizQuestion>(v).ok())
        .filter(|q| q.options.len() == QUIZ_OPTIONS && q.correct_answer < QUIZ_OPTIONS)
        .take(n)
        .collect()
}

/// Cards with both sides from a model reply, at most `n`
pub fn parse_flashcards(reply: &str, n: usize) -> Vec<Flashcard> {
    json_entries(reply)
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Flashcard>(v).ok())
        .take(n)
        .collect()
}

/// Elements of the outermost JSON array in `reply`; empty when there is none
fn json_entries(reply: &str) -> Vec<Value> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        warn!("No JSON array in model reply");
        return Vec::new();
    };
    if end < start {
        warn!("No JSON array in model reply");
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&reply[start..=end]) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not parse JSON array in model reply: {e}");
            Vec::new()
        }
    }
}
