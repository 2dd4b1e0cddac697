use eyre::Result;
use serde::Serialize;

use crate::chain::Acquired;
use crate::service::VideoSummary;
use crate::study::{Flashcard, QuizQuestion};

#[derive(Serialize)]
struct TranscriptJson<'a> {
    video_id: &'a str,
    language: &'a str,
    requested_language: &'a str,
    strategy: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    #[serde(flatten)]
    summary: &'a VideoSummary,
    #[serde(skip_serializing_if = "is_empty")]
    questions: &'a [QuizQuestion],
    #[serde(skip_serializing_if = "is_empty")]
    flashcards: &'a [Flashcard],
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// Render a transcript as plain text
pub fn render_text(acquired: &Acquired) -> String {
    acquired.text.clone()
}

/// Render a transcript with its provenance as pretty JSON
pub fn render_json(acquired: &Acquired) -> Result<String> {
    let doc = TranscriptJson {
        video_id: acquired.video_id.as_str(),
        language: &acquired.language,
        requested_language: &acquired.requested_language,
        strategy: acquired.strategy.name(),
        text: &acquired.text,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn render_summary_text(summary: &VideoSummary, questions: &[QuizQuestion], flashcards: &[Flashcard]) -> String {
    let mut out = format!("{}\n\n{}", summary.video_title, summary.summary);

    if !questions.is_empty() {
        out.push_str("\n\n--- Quiz ---");
        for (i, q) in questions.iter().enumerate() {
            out.push_str(&format!("\n\n{}. {}", i + 1, q.question));
            for (j, option) in q.options.iter().enumerate() {
                let marker = if j == q.correct_answer { '*' } else { ' ' };
                out.push_str(&format!("\n  {marker} {}) {option}", (b'A' + j as u8) as char));
            }
        }
    }

    if !flashcards.is_empty() {
        out.push_str("\n\n--- Flashcards ---");
        for card in flashcards {
            out.push_str(&format!("\n\nQ: {}\nA: {}", card.front, card.back));
        }
    }

    out
}

pub fn render_summary_json(summary: &VideoSummary, questions: &[QuizQuestion], flashcards: &[Flashcard]) -> Result<String> {
    let doc = SummaryJson {
        summary,
        questions,
        flashcards,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}
