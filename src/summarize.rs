use eyre::{Result, bail};
use log::debug;

use crate::generate::{GenerationRequest, TextGenerator};

/// Output budget for a summary unless `summary_max_tokens` overrides it
pub const DEFAULT_MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

/// Build the summary prompt for a transcript
pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "You are a helpful assistant that summarizes video content. Please provide a concise summary of the \
following video transcript. Focus on the main points, key insights, and important details. Make the summary \
clear, informative, and well-structured. Do not change the language of the text, the summary must have the same \
language as the input text.
You need to summarize following this OUTPUT format:

OUTPUT:

-Heading of the Text
-Short Introduction
-Main Point
-Final Conclusion
or this if the text is Vietnamese:
-Tiêu đề của văn bản
-Giới thiệu ngắn gọn
-Thông tin chính
-Kết luận

Each section should be separated from the next by two blank lines.

TRANSCRIPT:
{transcript}
"
    )
}

/// Summarize a transcript, keeping the transcript's language
pub async fn summarize(generator: &dyn TextGenerator, transcript: &str, max_tokens: u32) -> Result<String> {
    debug!("Summarizing {} chars of transcript", transcript.chars().count());

    let request = GenerationRequest::new(summary_prompt(transcript))
        .max_tokens(max_tokens)
        .temperature(TEMPERATURE);
    let summary = generator.generate(&request).await?;

    let summary = summary.trim();
    if summary.is_empty() {
        bail!("summarizer returned an empty summary");
    }
    Ok(summary.to_string())
}
