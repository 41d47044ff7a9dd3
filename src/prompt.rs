//! Prompt assembly.
//!
//! Pure and deterministic: the same question, chunks, and history always
//! produce the same prompt text.

use crate::models::{Chunk, ConversationTurn};

/// Build the generation prompt.
///
/// Layout: instructions, a `Context:` block with chunk texts separated by
/// blank lines, a `Chat History:` block with one `Human:`/`Assistant:`
/// pair per turn (oldest first), then the new question.
pub fn assemble(question: &str, chunks: &[Chunk], history: &[ConversationTurn]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut history_text = String::new();
    for turn in history {
        history_text.push_str("Human: ");
        history_text.push_str(&turn.question);
        history_text.push('\n');
        history_text.push_str("Assistant: ");
        history_text.push_str(&turn.answer);
        history_text.push('\n');
    }

    format!(
        "\nYou are a helpful AI assistant.\n\
         Answer strictly using the provided context.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Chat History:\n\
         {history_text}\n\
         \n\
         Human: {question}\n\
         Assistant:\n"
    )
}
